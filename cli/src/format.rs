use chrono::NaiveDate;

/// Compact USD amount: `$1.3M`, `$250K`, `$42`.
pub fn usd(amount: f64) -> String {
    if !amount.is_finite() {
        return "$0".to_string();
    }
    if amount >= 1_000_000.0 {
        format!("${:.1}M", amount / 1_000_000.0)
    } else if amount >= 1_000.0 {
        format!("${:.0}K", amount / 1_000.0)
    } else {
        format!("${:.0}", amount)
    }
}

pub fn percent(value: f64) -> String {
    format!("{:.2}%", value)
}

pub fn maturity(date: Option<NaiveDate>) -> String {
    date.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string())
}
