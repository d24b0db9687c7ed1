use std::error::Error;
use std::path::PathBuf;

use clap::Parser;
use serde::Serialize;

use card_misuse_analytics::{
    LatestTransactionsReader, RiskLevel, Settings, Store,
    dashboard::{DashboardSummary, FilterOptions, TransactionFilter, format_count, format_rupees},
    logging::setup_logging,
};

/// Summarise the latest card transactions in the risk database.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path of the SQLite database.
    #[arg(long, short)]
    db_path: PathBuf,

    /// An optional TOML file with the reader settings.
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// The log level, overridden by `RUST_LOG`.
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Only include transactions whose customer, city or channel contains
    /// this text.
    #[arg(long)]
    search: Option<String>,

    /// Only include this customer.
    #[arg(long)]
    customer_id: Option<String>,

    /// Only include this risk level, e.g. "High Risk".
    #[arg(long, value_parser = parse_risk_level)]
    risk_level: Option<RiskLevel>,

    /// Only include this channel.
    #[arg(long)]
    channel: Option<String>,

    /// Only include this city.
    #[arg(long)]
    city: Option<String>,

    /// Print the summary as JSON instead of text.
    #[arg(long)]
    json: bool,
}

fn parse_risk_level(label: &str) -> Result<RiskLevel, String> {
    RiskLevel::from_label(label).ok_or_else(|| {
        let labels: Vec<_> = RiskLevel::ALL.iter().map(RiskLevel::as_str).collect();
        format!("expected one of: {}", labels.join(", "))
    })
}

#[derive(Serialize)]
struct Report<'a> {
    filter: &'a TransactionFilter,
    options: FilterOptions,
    summary: DashboardSummary,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    setup_logging(&args.log_level, None)?;

    let settings = Settings::load(args.config.as_deref())?;
    let store = Store::open(&args.db_path)?;
    let reader = LatestTransactionsReader::new(settings.reader.cache_ttl());

    let filter = TransactionFilter {
        search: args.search,
        customer_id: args.customer_id,
        risk_level: args.risk_level,
        channel: args.channel,
        city: args.city,
    };

    let transactions = reader.read(&store)?;
    let options = FilterOptions::from_transactions(transactions.iter());
    let summary = DashboardSummary::from_transactions(filter.apply(&transactions));

    if args.json {
        let report = Report {
            filter: &filter,
            options,
            summary,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&summary);
    }

    store.close()?;

    Ok(())
}

fn print_summary(summary: &DashboardSummary) {
    println!("Transactions:  {}", format_count(summary.total_transactions));
    println!("Total amount:  {}", format_rupees(summary.total_amount));
    println!("Normal:        {}", format_count(summary.normal_transactions));
    println!("High Risk:     {}", format_count(summary.high_risk_transactions));

    println!("\nBy risk level");
    for risk in &summary.by_risk_level {
        println!("  {:<14}{}", risk.risk_level.as_str(), format_count(risk.count));
    }

    if !summary.by_year.is_empty() {
        println!("\nBy year");
        for year in &summary.by_year {
            println!("  {:<14}{}", year.year, format_count(year.count));
        }
    }

    if !summary.top_cities.is_empty() {
        println!("\nTop cities");
        for city in &summary.top_cities {
            println!("  {:<14}{}", city.label, format_count(city.count));
        }
    }

    if !summary.by_channel.is_empty() {
        println!("\nBy channel");
        for channel in &summary.by_channel {
            println!("  {:<14}{}", channel.label, format_count(channel.count));
        }
    }
}
