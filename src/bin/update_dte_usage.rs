use std::{error::Error, path::Path, path::PathBuf, process};

use clap::Parser;
use dte_usage::{
    config::Config,
    feed::client::{download_feed, feed_url, read_feed_file},
    influx::{InfluxSink, WriteMode, Writer},
    job::process_feed,
};
use log::{error, info};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Log the points instead of writing them to InfluxDB
    #[arg(long)]
    dry_run: bool,

    /// Environment name, e.g., test, prod.  Loads `.env/<env>.env` first
    #[arg(short, long)]
    env: Option<String>,

    /// JSON5 config file, optional if everything is set in the environment
    #[arg(short, long, default_value = "config.json5")]
    config: PathBuf,

    /// Read the feed from a saved XML file instead of downloading it
    #[arg(short, long)]
    input: Option<PathBuf>,
}

fn run(args: &Args) -> Result<(), dte_usage::Error> {
    let config = Config::load(&args.config)?;

    let bytes = match &args.input {
        Some(path) => read_feed_file(path)?,
        None => download_feed(&feed_url(&config.feed_base_url, &config.account))?,
    };

    let mode = if args.dry_run {
        WriteMode::DryRun
    } else {
        WriteMode::Persist
    };
    let mut writer = Writer::new(InfluxSink::new(&config.influx)?, mode);
    process_feed(&config, &bytes, &mut writer)?;
    Ok(())
}

/// Run this job once a day, DTE publishes the previous day's intervals overnight
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Some(env) = &args.env {
        dotenvy::from_path(Path::new(format!(".env/{}.env", env).as_str()))?;
    }

    if args.dry_run {
        info!("Dry run, nothing will be written to InfluxDB");
    }
    if let Err(e) = run(&args) {
        error!("{}", e);
        process::exit(1);
    }
    Ok(())
}
