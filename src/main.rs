use anyhow::{Context, Result};
use clap::Parser;
use reqwest::Client;
use retail::{
    config::{SourceConfig, DEFAULT_URL},
    fetch, parse_select, source, FormatOptions, Grouping, HeaderMode, IndexMode, Level, RawTable,
    RetailData, Selection, Style,
};
use std::{path::PathBuf, process::ExitCode, time::Duration};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "US retail electricity sales, revenue and prices by state and year"
)]
struct Args {
    /// Constraints as Field:Value pairs, e.g. State:CA,Year:2020
    #[arg(long, value_name = "FIELD:VALUE,...")]
    select: Option<String>,
    /// Output data for STATE only
    #[arg(long)]
    state: Option<String>,
    /// Output data for YEAR only
    #[arg(long)]
    year: Option<String>,
    /// Output data for MONTH only
    #[arg(long)]
    month: Option<String>,
    /// Output data for SECTOR only
    #[arg(long)]
    sector: Option<String>,
    /// Output data for METRIC only (Revenue, Sales, Customers, Price)
    #[arg(long)]
    metric: Option<String>,
    /// Aggregate rows over a level: Year, Month or State with sum, mean, min, max, count, first or last
    #[arg(long, value_name = "LEVEL:AGG")]
    group: Option<String>,
    /// List the values of the given levels (Year, Month, State, Sector, Metric); all when empty
    #[arg(long, num_args = 0..=1, default_missing_value = "", value_name = "LEVEL,...")]
    keys: Option<String>,
    /// List the unit of each metric
    #[arg(long)]
    units: bool,
    /// Output style: csv, table, json or yaml
    #[arg(long, default_value = "csv")]
    format: String,
    /// Column header layout: pack, unpack or none
    #[arg(long, default_value = "pack")]
    header: String,
    /// Key column layout: columns, or pack into one `State:Year:Month` column
    #[arg(long, num_args = 0..=1, default_value = "columns", default_missing_value = "columns")]
    index: String,
    /// Round values to this many decimal places
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=15))]
    precision: Option<u32>,
    /// Run data validation checks and exit
    #[arg(long)]
    validate: bool,
    /// Read a local .xlsx or long-format .csv file instead of downloading
    #[arg(long)]
    input: Option<PathBuf>,
    #[arg(long, env = "RETAIL_URL", default_value = DEFAULT_URL)]
    url: String,
    #[arg(long, env = "RETAIL_CACHE_DIR", default_value = ".")]
    cache_dir: PathBuf,
    /// Maximum age of the cached download
    #[arg(long, default_value_t = 86_400)]
    refresh_secs: u64,
    /// Verbose logging
    #[arg(long)]
    debug: bool,
}

fn init_logging(debug: bool) {
    let env = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,retail=info"))
    };
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();
}

async fn load(args: &Args) -> Result<RawTable> {
    let path = match &args.input {
        Some(path) => path.clone(),
        None => {
            let cfg = SourceConfig {
                url: args.url.clone(),
                cache_dir: args.cache_dir.clone(),
                refresh: Duration::from_secs(args.refresh_secs),
            };
            fetch::fetch_source(&Client::new(), &cfg).await?
        }
    };
    source::load_path(&path).with_context(|| format!("loading {}", path.display()))
}

fn print_keys(data: &RetailData, wanted: &str) -> Result<()> {
    let levels: Vec<Level> = if wanted.trim().is_empty() {
        Level::ALL.to_vec()
    } else {
        wanted.split(',')
            .map(|s| s.parse::<Level>())
            .collect::<retail::Result<_>>()?
    };
    let bare = levels.len() == 1 && !wanted.contains(',');
    for level in levels {
        let values = data.levels(level).join(",");
        if bare {
            println!("{}", values);
        } else {
            println!("{}={}", level, values);
        }
    }
    Ok(())
}

async fn run(args: Args) -> Result<ExitCode> {
    // reject bad output options before any download
    let opts = FormatOptions {
        style: args.format.parse::<Style>()?,
        header: args.header.parse::<HeaderMode>()?,
        index: args.index.parse::<IndexMode>()?,
        precision: args.precision,
    };
    let grouping = args
        .group
        .as_deref()
        .map(str::parse::<Grouping>)
        .transpose()?;
    let mut constraints = match &args.select {
        Some(text) => parse_select(text)?,
        None => Vec::new(),
    };
    for (field, value) in [
        ("State", &args.state),
        ("Year", &args.year),
        ("Month", &args.month),
        ("Sector", &args.sector),
        ("Metric", &args.metric),
    ] {
        if let Some(v) = value {
            constraints.push((field.to_string(), v.clone()));
        }
    }
    let pairs = || constraints.iter().map(|(f, v)| (f.as_str(), v.as_str()));
    Selection::parse(pairs())?;

    let data = RetailData::new(load(&args).await?)?;
    info!(keys = data.keys().len(), records = data.index().len(), "data ready");

    if args.validate {
        let report = data.validate();
        for issue in &report.issues {
            println!("{}", issue);
        }
        if !report.is_ok() {
            warn!(issues = report.issues.len(), "validation failed");
            return Ok(ExitCode::FAILURE);
        }
        info!("validation passed");
        return Ok(ExitCode::SUCCESS);
    }
    if let Some(wanted) = &args.keys {
        print_keys(&data, wanted)?;
        return Ok(ExitCode::SUCCESS);
    }
    if args.units {
        for (metric, unit) in data.units() {
            println!("{}={}", metric, unit);
        }
        return Ok(ExitCode::SUCCESS);
    }

    let table = data.query(pairs())?;
    if table.is_empty() {
        warn!(?constraints, "no data matches the selection");
    }
    match grouping {
        Some(grouping) => print!("{}", data.render_with(&data.group(&table, grouping), &opts)?),
        None => print!("{}", data.render_with(&table, &opts)?),
    }
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.debug);

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("ERROR [retail]: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
