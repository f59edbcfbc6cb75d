use anyhow::{anyhow, Result};
use chrono::Utc;
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::{
    io::{IsTerminal, Write},
    sync::Arc,
    time::Duration,
};
use url::Url;
use yield_tracker::{
    chain::{chain_name, Chain},
    client::{MarketSource, PendleClient},
    config::{ClientConfig, DashboardConfig},
    dashboard::{Dashboard, DashboardSnapshot, RefreshOutcome},
    history::{parse_series, TimeFrame},
    Market,
};

mod format;

/// Column where `summary` values start.
const LABEL_WIDTH: usize = 17;

/// Terminal color codes - empty strings if not outputting to terminal
fn get_colors() -> (&'static str, &'static str, &'static str, &'static str) {
    if std::io::stdout().is_terminal() {
        ("\x1b[90m", "\x1b[32m", "\x1b[31m", "\x1b[0m") // gray, green, red, reset
    } else {
        ("", "", "", "") // no colors when piped
    }
}

#[derive(Parser)]
#[command(name = "cli")]
/// Pendle yield market dashboard in the terminal
struct Args {
    #[command(flatten)]
    api: ApiArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ClapArgs)]
struct ApiArgs {
    /// Chain id or name (e.g. "8453", "base", "arbitrum")
    #[arg(long, short = 'c', global = true, default_value = "base")]
    chain: Chain,

    /// Override the API root (defaults to PENDLE_API_URL or the public API)
    #[arg(long, global = true)]
    base_url: Option<Url>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// List active markets with APY, liquidity and maturity
    Markets(MarketsArgs),
    /// Print the APY history of one market
    History(HistoryArgs),
    /// Print aggregate metrics and the APY trend of a market
    Summary(SummaryArgs),
    /// List supported chains
    Chains,
}

#[derive(Parser)]
/// List active markets with APY, liquidity and maturity
struct MarketsArgs {
    /// Optional market name filter (case-insensitive)
    filter: Option<String>,

    /// Only enrich the first N markets of the list
    #[arg(long, short = 'n')]
    limit: Option<usize>,

    /// Show built-in fallback markets if the API is unreachable
    #[arg(long, default_value_t = false)]
    fallback: bool,

    /// Print raw JSON (default: false)
    #[arg(long, default_value_t = false)]
    raw: bool,

    /// Print as CSV (default: false)
    #[arg(long, default_value_t = false)]
    csv: bool,
}

#[derive(Parser)]
/// Print the APY history of one market
struct HistoryArgs {
    /// Market address
    address: String,

    /// Window to show: 7d, 30d or 90d
    #[arg(long, short = 'w', default_value = "7d")]
    window: TimeFrame,

    /// Path to the output CSV file (defaults to a table on stdout)
    #[arg(long, short)]
    output: Option<String>,
}

#[derive(Parser)]
/// Print aggregate metrics and the APY trend of a market
struct SummaryArgs {
    /// Market to chart (defaults to the first listed market)
    #[arg(long, short = 'm')]
    market: Option<String>,

    /// Window to compute the trend over: 7d, 30d or 90d
    #[arg(long, short = 'w', default_value = "7d")]
    window: TimeFrame,

    /// Only enrich the first N markets of the list
    #[arg(long, short = 'n')]
    limit: Option<usize>,

    /// Print the full dashboard snapshot as JSON (default: false)
    #[arg(long, default_value_t = false)]
    raw: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_string()))
        .init();

    let args = Args::parse();

    match &args.command {
        Commands::Markets(markets_args) => run_markets(&args.api, markets_args).await,
        Commands::History(history_args) => run_history(&args.api, history_args).await,
        Commands::Summary(summary_args) => run_summary(&args.api, summary_args).await,
        Commands::Chains => run_chains(),
    }
}

fn build_client(api: &ApiArgs) -> Result<PendleClient> {
    let mut config = ClientConfig::from_env()?;
    if let Some(url) = api.base_url.clone() {
        config = config.with_base_url(url);
    }
    if let Some(secs) = api.timeout {
        config = config.with_timeout(Duration::from_secs(secs));
    }
    PendleClient::new(config)
}

fn build_dashboard(
    api: &ApiArgs,
    limit: Option<usize>,
    fallback: bool,
    time_frame: TimeFrame,
) -> Result<Dashboard<PendleClient>> {
    let mut config = DashboardConfig::from_env()?
        .with_chain_id(api.chain.id())
        .with_time_frame(time_frame)
        .with_fallback_on_error(fallback);
    if let Some(limit) = limit {
        config = config.with_max_markets(limit);
    }
    Ok(Dashboard::new(Arc::new(build_client(api)?), config))
}

async fn run_markets(api: &ApiArgs, args: &MarketsArgs) -> Result<()> {
    let dashboard = build_dashboard(api, args.limit, args.fallback, TimeFrame::default())?;
    let outcome = dashboard.refresh().await;
    let snapshot = dashboard.snapshot().await;
    if let RefreshOutcome::Failed(message) = &outcome {
        eprintln!("{}", message);
        if snapshot.markets.is_empty() {
            std::process::exit(1);
        }
        eprintln!("showing fallback markets");
    }

    let markets = snapshot.markets.iter().filter(|m| match args.filter.as_ref() {
        Some(filter) => m.name.to_lowercase().contains(&filter.to_lowercase()),
        None => true,
    });

    if args.raw {
        let markets: Vec<&Market> = markets.collect();
        println!("{}", serde_json::to_string(&markets)?);
    } else if args.csv {
        let mut writer = csv::Writer::from_writer(std::io::stdout());
        writer.write_record(["id", "name", "chain_id", "apy_percent", "liquidity", "maturity"])?;
        for market in markets {
            writer.write_record([
                market.id.clone(),
                market.name.clone(),
                market.chain_id.to_string(),
                market.apy_percent().to_string(),
                market.liquidity.to_string(),
                market.maturity.map(|d| d.to_string()).unwrap_or_default(),
            ])?;
        }
        writer.flush()?;
    } else {
        print_markets(markets);
    }
    Ok(())
}

fn print_markets<'a>(markets: impl Iterator<Item = &'a Market>) {
    let (gray, green, _, reset) = get_colors();
    for market in markets {
        println!("{}", market.name);
        println!("  {}{}{}", gray, market.id, reset);
        println!(
            "  {}{:>8}{}  {:>8}  {}",
            green,
            format::percent(market.apy_percent()),
            reset,
            format::usd(market.liquidity),
            format::maturity(market.maturity)
        );
    }
}

async fn run_history(api: &ApiArgs, args: &HistoryArgs) -> Result<()> {
    let client = build_client(api)?;
    let raw = client.historical_data(api.chain.id(), &args.address).await?;
    let points = parse_series(Some(&raw));
    if points.is_empty() {
        return Err(anyhow!("no valid historical data points found for {}", args.address));
    }
    let points = args.window.apply(&points, Utc::now());

    if let Some(output) = args.output.clone() {
        let mut writer = csv::Writer::from_path(&output)?;
        writer.write_record(["timestamp", "date", "apy", "base_apy"])?;
        for point in &points {
            writer.write_record([
                point.timestamp.to_string(),
                point.date.clone(),
                point.apy.to_string(),
                point.base_apy.map(|v| v.to_string()).unwrap_or_default(),
            ])?;
        }
        writer.flush()?;
        eprintln!("wrote {} points to {}", points.len(), output);
        return Ok(());
    }

    let (gray, green, _, reset) = get_colors();
    println!("{} {}{}{}", args.address, gray, args.window, reset);
    for point in &points {
        print!("  {:<8}{}{:>8}{}", point.date, green, format::percent(point.apy), reset);
        match point.base_apy {
            Some(base) => println!("  {}base {}{}", gray, format::percent(base), reset),
            None => println!(),
        }
    }
    Ok(())
}

async fn run_summary(api: &ApiArgs, args: &SummaryArgs) -> Result<()> {
    let dashboard = build_dashboard(api, args.limit, false, args.window)?;

    if let RefreshOutcome::Failed(message) = dashboard.refresh().await {
        return Err(anyhow!(message));
    }
    if let Some(market) = args.market.as_deref() {
        if let Err(e) = dashboard.select_market(market).await {
            eprintln!("{}", e);
        }
    }

    let snapshot = dashboard.snapshot().await;
    if args.raw {
        println!("{}", serde_json::to_string(&snapshot)?);
    } else {
        print_summary(&snapshot)?;
    }
    Ok(())
}

fn print_summary(snapshot: &DashboardSnapshot) -> Result<()> {
    write_summary(&mut std::io::stdout().lock(), snapshot, get_colors())
}

fn write_summary(
    out: &mut impl Write,
    snapshot: &DashboardSnapshot,
    (gray, green, red, reset): (&str, &str, &str, &str),
) -> Result<()> {
    writeln!(out, "{} ({})", chain_name(snapshot.chain_id), snapshot.chain_id)?;
    writeln!(out, "  {:<LABEL_WIDTH$}{}", "markets", snapshot.metrics.total_markets)?;
    writeln!(out, "  {:<LABEL_WIDTH$}{}", "avg APY", format::percent(snapshot.metrics.avg_apy))?;
    writeln!(
        out,
        "  {:<LABEL_WIDTH$}{}",
        "total liquidity",
        format::usd(snapshot.metrics.total_liquidity)
    )?;

    let Some(market) = snapshot.selected() else {
        return Ok(());
    };
    writeln!(out)?;
    writeln!(out, "{} {}{}{}", market.name, gray, snapshot.time_frame, reset)?;
    match snapshot.chart_data.last() {
        Some(last) => {
            let (color, arrow) = if snapshot.trend.is_positive {
                (green, "↗")
            } else {
                (red, "↘")
            };
            writeln!(
                out,
                "  {:<LABEL_WIDTH$}{} {}{} {}{}",
                "current APY",
                format::percent(last.apy),
                color,
                arrow,
                format::percent(snapshot.trend.magnitude),
                reset
            )?;
        }
        None => writeln!(
            out,
            "  {}{}{}",
            gray,
            snapshot.history_error.as_deref().unwrap_or("no chart data"),
            reset
        )?,
    }
    writeln!(out, "  {:<LABEL_WIDTH$}{}", "liquidity", format::usd(market.liquidity))?;
    writeln!(out, "  {:<LABEL_WIDTH$}{}", "maturity", format::maturity(market.maturity))?;
    Ok(())
}

fn run_chains() -> Result<()> {
    let (gray, _, _, reset) = get_colors();
    for chain in Chain::ALL {
        println!("{:<10} {}{:>6}  {}{}", chain.name(), gray, chain.id(), chain.slug(), reset);
    }
    Ok(())
}
