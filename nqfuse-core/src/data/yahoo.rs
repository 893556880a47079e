//! Yahoo Finance reference provider.
//!
//! Fetches today's one-minute bars (pre/post session included) from Yahoo's v8
//! chart API. One request per call: the feed's poll cadence is the only retry.
//!
//! Yahoo Finance has no official API and is subject to unannounced format changes;
//! a decoding failure surfaces as `ResponseFormatChanged`.

use super::provider::{DataError, ReferenceProvider};
use crate::clock::epoch_to_local;
use crate::domain::Bar;
use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://query2.finance.yahoo.com";

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<u64>>,
}

/// Yahoo Finance intraday provider.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
    base_url: String,
    tz: Tz,
}

impl YahooProvider {
    /// Provider converting bar times into `tz` (the exchange feed timezone).
    pub fn new(tz: Tz) -> Result<Self, DataError> {
        Self::with_base_url(DEFAULT_BASE_URL, tz)
    }

    pub fn with_base_url(base_url: impl Into<String>, tz: Tz) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            tz,
        })
    }

    /// Build the chart API URL for today's minute bars.
    fn chart_url(&self, symbol: &str) -> String {
        format!(
            "{}/v8/finance/chart/{symbol}?range=1d&interval=1m&includePrePost=true",
            self.base_url.trim_end_matches('/')
        )
    }

    /// Parse the chart API response into minute bars of `session`.
    ///
    /// Bars with any missing OHLC value are dropped; a missing volume becomes 0.
    fn parse_response(
        symbol: &str,
        resp: ChartResponse,
        tz: Tz,
        session: NaiveDate,
    ) -> Result<Vec<Bar>, DataError> {
        let result = resp.chart.result.ok_or_else(|| {
            if let Some(err) = resp.chart.error {
                if err.code == "Not Found" {
                    DataError::SymbolNotFound {
                        symbol: symbol.to_string(),
                    }
                } else {
                    DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
                }
            } else {
                DataError::ResponseFormatChanged("empty result with no error".into())
            }
        })?;

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into()))?;

        // Yahoo omits timestamps entirely when the range has no trades yet.
        let Some(timestamps) = data.timestamp else {
            return Ok(Vec::new());
        };

        let quote = data.indicators.quote.into_iter().next().unwrap_or_default();

        let mut bars = Vec::with_capacity(timestamps.len());
        for (i, &epoch) in timestamps.iter().enumerate() {
            let ts = epoch_to_local(epoch, tz).ok_or_else(|| {
                DataError::ResponseFormatChanged(format!("invalid timestamp: {epoch}"))
            })?;
            if ts.date() != session {
                continue;
            }

            let field = |v: &Vec<Option<f64>>| v.get(i).copied().flatten();
            let (Some(open), Some(high), Some(low), Some(close)) = (
                field(&quote.open),
                field(&quote.high),
                field(&quote.low),
                field(&quote.close),
            ) else {
                continue;
            };

            bars.push(Bar {
                ts,
                open,
                high,
                low,
                close,
                volume: quote.volume.get(i).copied().flatten().unwrap_or(0),
            });
        }

        Ok(bars)
    }
}

impl ReferenceProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch_intraday(&self, symbol: &str, session: NaiveDate) -> Result<Vec<Bar>, DataError> {
        let url = self.chart_url(symbol);
        let resp = self.client.get(&url).send().map_err(|e| {
            if e.is_timeout() {
                DataError::NetworkUnreachable(format!("timeout: {e}"))
            } else {
                DataError::NetworkUnreachable(e.to_string())
            }
        })?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(DataError::RateLimited {
                retry_after_secs: retry_after,
            });
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }
        if !status.is_success() {
            return Err(DataError::Other(format!("HTTP {status} for {symbol}")));
        }

        let chart: ChartResponse = resp.json().map_err(|e| {
            DataError::ResponseFormatChanged(format!("failed to parse response for {symbol}: {e}"))
        })?;

        let bars = Self::parse_response(symbol, chart, self.tz, session)?;
        debug!(symbol, bars = bars.len(), "fetched intraday bars");
        Ok(bars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NY: Tz = chrono_tz::America::New_York;

    fn session() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
    }

    fn parse(json: &str) -> Result<Vec<Bar>, DataError> {
        let resp: ChartResponse = serde_json::from_str(json).unwrap();
        YahooProvider::parse_response("NQ=F", resp, NY, session())
    }

    #[test]
    fn parses_minute_bars_in_feed_timezone() {
        // 14:30 and 14:31 UTC on 2024-03-04 → 09:30 and 09:31 EST
        let bars = parse(
            r#"{"chart":{"result":[{"timestamp":[1709562600,1709562660],
            "indicators":{"quote":[{"open":[18000.0,18001.0],"high":[18002.0,18003.5],
            "low":[17999.0,18000.25],"close":[18001.0,18003.0],"volume":[1200,null]}]}}],
            "error":null}}"#,
        )
        .unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].ts, session().and_hms_opt(9, 30, 0).unwrap());
        assert_eq!(bars[1].ts, session().and_hms_opt(9, 31, 0).unwrap());
        assert_eq!(bars[0].volume, 1200);
        assert_eq!(bars[1].volume, 0);
        assert_eq!(bars[1].close, 18003.0);
    }

    #[test]
    fn drops_incomplete_and_other_session_bars() {
        // second bar lacks a close; third is the previous evening (19:00 EST on 03-03)
        let bars = parse(
            r#"{"chart":{"result":[{"timestamp":[1709562600,1709562660,1709510400],
            "indicators":{"quote":[{"open":[1.0,2.0,3.0],"high":[1.0,2.0,3.0],
            "low":[1.0,2.0,3.0],"close":[1.0,null,3.0],"volume":[1,1,1]}]}}],"error":null}}"#,
        )
        .unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].close, 1.0);
    }

    #[test]
    fn missing_timestamps_is_empty() {
        let bars = parse(
            r#"{"chart":{"result":[{"indicators":{"quote":[{}]}}],"error":null}}"#,
        )
        .unwrap();
        assert!(bars.is_empty());
    }

    #[test]
    fn not_found_error() {
        let err = parse(
            r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found"}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, DataError::SymbolNotFound { .. }));
    }

    #[test]
    fn chart_url_shape() {
        let p = YahooProvider::with_base_url("http://localhost:9/", NY).unwrap();
        assert_eq!(
            p.chart_url("NQ=F"),
            "http://localhost:9/v8/finance/chart/NQ=F?range=1d&interval=1m&includePrePost=true"
        );
    }
}
