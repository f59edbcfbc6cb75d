//! Parsing and windowing of columnar APY history.

use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::resolve::coerce_number;
use crate::HistoricalPoint;

/// Points kept for the default "Last 7 Days" view.
pub const WEEK_POINTS: usize = 7;

/// Converts a `{timestamp: [...], impliedApy: [...], baseApy: [...]}` series
/// into points ordered by timestamp.
///
/// Timestamps are Unix seconds and APYs fractions; the output is in
/// milliseconds and percent. An index whose timestamp or APY is missing or not
/// numeric is dropped. A missing or non-array `timestamp` column yields an
/// empty series.
pub fn parse_series(raw: Option<&Value>) -> Vec<HistoricalPoint> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    let Some(timestamps) = raw.get("timestamp").and_then(Value::as_array) else {
        return Vec::new();
    };
    let apys = raw.get("impliedApy").and_then(Value::as_array);
    let base_apys = raw.get("baseApy").and_then(Value::as_array);

    let mut points = timestamps
        .iter()
        .enumerate()
        .filter_map(|(i, ts)| {
            let secs = coerce_number(ts)?;
            let apy = apys.and_then(|a| a.get(i)).and_then(coerce_number)?;
            let base_apy = base_apys
                .and_then(|a| a.get(i))
                .and_then(coerce_number)
                .map(|v| v * 100.0);

            let timestamp = (secs * 1000.0) as i64;
            let date = DateTime::from_timestamp_millis(timestamp)?;
            Some(HistoricalPoint {
                timestamp,
                date: date.format("%b %-d").to_string(),
                apy: apy * 100.0,
                base_apy,
            })
        })
        .collect::<Vec<_>>();

    if points.len() < timestamps.len() {
        tracing::debug!(
            dropped = timestamps.len() - points.len(),
            kept = points.len(),
            "dropped unparseable history points"
        );
    }

    points.sort_by_key(|p| p.timestamp);
    points
}

/// The chart window shown for the selected market.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeFrame {
    #[default]
    #[serde(rename = "7d")]
    LastWeek,
    #[serde(rename = "30d")]
    LastMonth,
    #[serde(rename = "90d")]
    LastQuarter,
}

impl TimeFrame {
    pub fn days(self) -> i64 {
        match self {
            TimeFrame::LastWeek => 7,
            TimeFrame::LastMonth => 30,
            TimeFrame::LastQuarter => 90,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TimeFrame::LastWeek => "Last 7 Days",
            TimeFrame::LastMonth => "Last 30 Days",
            TimeFrame::LastQuarter => "Last 90 Days",
        }
    }

    /// Selects the points to chart from an already-parsed series.
    ///
    /// The week view is the last [`WEEK_POINTS`] points regardless of their
    /// age; wider views keep every point newer than `now - days`.
    pub fn apply(self, points: &[HistoricalPoint], now: DateTime<Utc>) -> Vec<HistoricalPoint> {
        match self {
            TimeFrame::LastWeek => tail(points, WEEK_POINTS).to_vec(),
            _ => {
                let cutoff = (now - Duration::days(self.days())).timestamp_millis();
                points
                    .iter()
                    .filter(|p| p.timestamp >= cutoff)
                    .cloned()
                    .collect()
            }
        }
    }
}

impl fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TimeFrame {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "7d" | "week" => Ok(TimeFrame::LastWeek),
            "30d" | "month" => Ok(TimeFrame::LastMonth),
            "90d" | "quarter" => Ok(TimeFrame::LastQuarter),
            other => Err(anyhow!("invalid time frame: {} (expected 7d, 30d or 90d)", other)),
        }
    }
}

/// The last `n` points of a series.
pub fn tail(points: &[HistoricalPoint], n: usize) -> &[HistoricalPoint] {
    &points[points.len().saturating_sub(n)..]
}
