use crate::{AggregateMetrics, HistoricalPoint, Market, TrendIndicator};

/// Count, mean APY (percent), and summed liquidity over `markets`.
pub fn aggregate(markets: &[Market]) -> AggregateMetrics {
    let total_markets = markets.len();
    let avg_apy = if total_markets == 0 {
        0.0
    } else {
        markets.iter().map(Market::apy_percent).sum::<f64>() / total_markets as f64
    };

    AggregateMetrics {
        total_markets,
        avg_apy,
        total_liquidity: markets.iter().map(|m| m.liquidity).sum(),
    }
}

/// Percent change between the last two points of `series`.
///
/// Fewer than two points gives the neutral indicator. A previous APY of zero
/// has no defined ratio, so the magnitude is reported as zero and only the
/// direction is kept.
pub fn trend(series: &[HistoricalPoint]) -> TrendIndicator {
    let [.., previous, last] = series else {
        return TrendIndicator::default();
    };

    let change = last.apy - previous.apy;
    let magnitude = if previous.apy == 0.0 {
        0.0
    } else {
        (change / previous.apy * 100.0).abs()
    };

    TrendIndicator {
        magnitude: if magnitude.is_finite() { magnitude } else { 0.0 },
        is_positive: change >= 0.0,
    }
}
