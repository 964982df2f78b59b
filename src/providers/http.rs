//! The single request step shared by every provider, plus lenient number
//! parsing for upstream payloads.

use crate::error::FetchError;
use reqwest::{Client, StatusCode};
use serde::Deserializer;
use serde::de::{self, DeserializeOwned, Visitor};
use std::fmt;

/// Issues one GET and decodes the JSON body. No retries.
pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &Client,
    provider: &'static str,
    instrument: &str,
    url: &str,
    query: &[(&str, String)],
) -> Result<T, FetchError> {
    let response = client
        .get(url)
        .query(query)
        .send()
        .await
        .map_err(|e| FetchError::UpstreamUnavailable {
            provider,
            reason: transport_reason(&e),
        })?;

    let status = response.status();
    tracing::debug!(provider, instrument, %status, "upstream responded");

    // 418 is what Binance-style APIs answer once an IP is banned for
    // ignoring 429s; treat both as throttling.
    if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::IM_A_TEAPOT {
        return Err(FetchError::UpstreamRateLimited { provider });
    }

    if status == StatusCode::NOT_FOUND {
        return Err(FetchError::InvalidInstrument {
            instrument: instrument.to_string(),
            reason: format!("{provider} does not know this symbol"),
        });
    }

    if !status.is_success() {
        return Err(FetchError::UpstreamUnavailable {
            provider,
            reason: format!("API request failed with status {}", status.as_u16()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| FetchError::UpstreamUnavailable {
            provider,
            reason: transport_reason(&e),
        })?;

    serde_json::from_slice(&bytes).map_err(|e| FetchError::MalformedResponse {
        provider,
        reason: e.to_string(),
    })
}

fn transport_reason(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "request timed out".to_string()
    } else {
        format!("network error: {e}")
    }
}

// --- Lenient numbers ---
// Upstreams disagree on whether numbers are floats, integers or strings.

struct LenientF64Visitor;

impl<'de> Visitor<'de> for LenientF64Visitor {
    type Value = f64;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a float, an integer, or a string representing a number")
    }

    fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E> {
        Ok(v)
    }

    fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E> {
        Ok(v as f64)
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
        Ok(v as f64)
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        v.trim().parse::<f64>().map_err(E::custom)
    }
}

pub(crate) fn deserialize_f64_lenient<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(LenientF64Visitor)
}

/// Epoch milliseconds, accepting the float form some APIs emit
/// (`1640995200000.0`). Fractional milliseconds are truncated.
pub(crate) fn deserialize_epoch_ms<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = deserializer.deserialize_any(LenientF64Visitor)?;
    if !value.is_finite() || value < i64::MIN as f64 || value > i64::MAX as f64 {
        return Err(de::Error::custom(format!("{value} is not a valid timestamp")));
    }
    Ok(value as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Point {
        #[serde(deserialize_with = "deserialize_epoch_ms")]
        t: i64,
        #[serde(deserialize_with = "deserialize_f64_lenient")]
        c: f64,
    }

    #[test]
    fn numbers_parse_in_every_upstream_shape() {
        let p: Point = serde_json::from_str(r#"{"t": 1640995200000, "c": 5}"#).unwrap();
        assert_eq!((p.t, p.c), (1_640_995_200_000, 5.0));

        let p: Point = serde_json::from_str(r#"{"t": 1640995200000.0, "c": "0.25"}"#).unwrap();
        assert_eq!((p.t, p.c), (1_640_995_200_000, 0.25));

        assert!(serde_json::from_str::<Point>(r#"{"t": "soon", "c": 1}"#).is_err());
        assert!(serde_json::from_str::<Point>(r#"{"t": 1, "c": null}"#).is_err());
    }
}
