use anyhow::{bail, Result};
use clap::Parser;
use exowiki::config::{PipelineConfig, AVAILABLE_SOURCES};
use exowiki::ingest::{CsvFileCollector, SourceCollector};
use exowiki::pipeline::{create_output_directories, run_pipeline, PipelineOptions};
use exowiki::status::WikipediaChecker;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "exowiki")]
#[command(about = "Consolidates exoplanet catalogs and generates wiki article drafts")]
struct Args {
    /// Comma-separated catalog sources to consolidate
    #[arg(long, value_delimiter = ',', default_values_t = AVAILABLE_SOURCES.iter().map(|s| s.to_string()).collect::<Vec<_>>())]
    sources: Vec<String>,

    /// Directory holding per-source CSV snapshots
    /// (<source>_planets.csv, <source>_stars.csv)
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Directory for consolidated exports and statistics
    #[arg(long, default_value = "output")]
    output_dir: PathBuf,

    /// Directory for generated article drafts
    #[arg(long, default_value = "output/drafts")]
    drafts_dir: PathBuf,

    /// Optional JSON config overriding merge and statistics defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Treat every article as missing instead of querying the wiki
    #[arg(long)]
    skip_existence_check: bool,

    /// Disable exoplanet draft generation
    #[arg(long)]
    no_exoplanet_drafts: bool,

    /// Disable star draft generation
    #[arg(long)]
    no_star_drafts: bool,

    /// Wiki language subdomain for existence checks
    #[arg(long)]
    language: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(language) = args.language {
        config.existence.language = language;
    }

    for source in &args.sources {
        if !AVAILABLE_SOURCES.contains(&source.as_str()) {
            bail!(
                "Unknown source '{}'; available sources: {}",
                source,
                AVAILABLE_SOURCES.join(", ")
            );
        }
    }

    info!("exowiki starting...");
    info!("Sources: {}", args.sources.join(", "));

    let mut collectors: Vec<Box<dyn SourceCollector>> = Vec::new();
    for source in &args.sources {
        let planets_path = args.data_dir.join(format!("{}_planets.csv", source));
        let stars_path = args.data_dir.join(format!("{}_stars.csv", source));
        collectors.push(Box::new(CsvFileCollector::new(
            source.clone(),
            planets_path,
            stars_path.exists().then_some(stars_path),
        )));
    }

    let checker = Arc::new(WikipediaChecker::new(&config.existence)?);

    let options = PipelineOptions {
        output_dir: args.output_dir,
        drafts_dir: args.drafts_dir,
        skip_existence_check: args.skip_existence_check,
        exoplanet_drafts: !args.no_exoplanet_drafts,
        star_drafts: !args.no_star_drafts,
    };
    create_output_directories(&options.output_dir, &options.drafts_dir)?;

    let summary = run_pipeline(&config, collectors, checker, &options).await?;

    info!(
        "Done: {} planets, {} stars consolidated.",
        summary.planets_total, summary.stars_total
    );
    Ok(())
}
