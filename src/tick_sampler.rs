/// Evenly spaced label positions over a timeline of `len` points.
///
/// Indices come from linear interpolation over `[0, len - 1]`, rounded to
/// the nearest integer. When `len >= tick_count >= 2` both endpoints are
/// included and exactly `tick_count` strictly increasing indices come back.
/// Shorter timelines get every index.
pub fn sample_ticks(len: usize, tick_count: usize) -> Vec<usize> {
    if len == 0 || tick_count == 0 {
        return Vec::new();
    }
    if len <= tick_count {
        return (0..len).collect();
    }
    if tick_count == 1 {
        return vec![0];
    }

    let last = len - 1;
    let step = last as f64 / (tick_count - 1) as f64;

    let mut ticks: Vec<usize> = (0..tick_count)
        .map(|i| ((i as f64 * step).round() as usize).min(last))
        .collect();
    // Pin the end against float drift.
    ticks[tick_count - 1] = last;
    ticks.dedup();
    ticks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thousand_points_eleven_ticks() {
        assert_eq!(
            sample_ticks(1000, 11),
            vec![0, 100, 200, 300, 400, 500, 599, 699, 799, 899, 999]
        );
    }

    #[test]
    fn endpoints_count_and_order_hold_for_many_shapes() {
        for len in 2..300 {
            for k in 2..=len.min(40) {
                let ticks = sample_ticks(len, k);
                assert_eq!(ticks.len(), k, "len={len} k={k}");
                assert_eq!(ticks[0], 0);
                assert_eq!(*ticks.last().unwrap(), len - 1);
                assert!(ticks.windows(2).all(|w| w[0] < w[1]), "len={len} k={k}");
                assert_eq!(sample_ticks(len, k), ticks);
            }
        }
    }

    #[test]
    fn short_timelines_return_every_index() {
        assert_eq!(sample_ticks(4, 11), vec![0, 1, 2, 3]);
        assert_eq!(sample_ticks(1, 11), vec![0]);
    }

    #[test]
    fn degenerate_requests() {
        assert!(sample_ticks(0, 11).is_empty());
        assert!(sample_ticks(10, 0).is_empty());
        assert_eq!(sample_ticks(10, 1), vec![0]);
    }
}
