//! Pipeline orchestration
//!
//! Drives one full run: collect raw batches per source, ingest and merge
//! into the canonical collection, export the consolidated data, generate
//! statistics, resolve article status and persist drafts. Per-source and
//! per-row failures are recovered locally; only a merge or statistics
//! invariant violation aborts the run.

use crate::config::PipelineConfig;
use crate::consolidate::{ConsolidationEngine, IngestReport};
use crate::draft::{synthesize_exoplanet, synthesize_star};
use crate::entity::canonical_key;
use crate::error::{PipelineError, Result};
use crate::export::{
    export_exoplanets_csv, export_statistics_json, export_stars_csv, persist_drafts,
};
use crate::ingest::SourceCollector;
use crate::stats::{
    generate_exoplanet_statistics, generate_star_statistics, log_statistics, RunStatistics,
};
use crate::status::{ArticleExistence, StatusPartition, StatusResolver};
use chrono::Local;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Run-level switches, mapped from the CLI.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub output_dir: PathBuf,
    pub drafts_dir: PathBuf,
    /// Generate every draft as "missing" without querying the
    /// encyclopedia.
    pub skip_existence_check: bool,
    pub exoplanet_drafts: bool,
    pub star_drafts: bool,
}

/// Final run summary, also logged line by line.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub ingest_reports: Vec<IngestReport>,
    pub skipped_sources: Vec<String>,
    pub planets_total: usize,
    pub stars_total: usize,
    pub drafts_written: usize,
}

/// Execute the full pipeline over the given collectors.
pub async fn run_pipeline(
    config: &PipelineConfig,
    collectors: Vec<Box<dyn SourceCollector>>,
    checker: Arc<dyn ArticleExistence>,
    options: &PipelineOptions,
) -> Result<RunSummary> {
    let mut engine = ConsolidationEngine::new(config.merge.clone());
    let mut summary = RunSummary::default();
    let mut used_sources = Vec::new();

    // Collection and ingestion. A failing source is skipped with a
    // warning; the pipeline continues with the others.
    for collector in &collectors {
        let source = collector.source_id().to_string();
        info!("Collecting data from {}...", source);
        let (planet_rows, star_rows) = match collector.collect_entities_from_source().await {
            Ok(batch) => batch,
            Err(e) => {
                let err = PipelineError::SourceCollection {
                    source_name: source.clone(),
                    reason: e.to_string(),
                };
                warn!("{}", err);
                summary.skipped_sources.push(source);
                continue;
            }
        };
        used_sources.push(source.clone());

        if planet_rows.is_empty() {
            info!("No planet rows collected from {}.", source);
        } else {
            let report = engine.ingest_exoplanets(&source, &planet_rows);
            info!(
                "Ingested {} planet rows from {} ({} rejected)",
                report.accepted, source, report.rejected
            );
            summary.ingest_reports.push(report);
        }

        match star_rows {
            Some(rows) if !rows.is_empty() => {
                let report = engine.ingest_stars(&source, &rows);
                info!(
                    "Ingested {} star rows from {} ({} rejected)",
                    report.accepted, source, report.rejected
                );
                summary.ingest_reports.push(report);
            }
            _ => info!("No star rows collected from {}.", source),
        }
    }

    // Single deterministic merge pass; invariant violations are fatal.
    let merge_report = engine.merge_into_canonical()?;
    engine.derive_star_discovery_years();
    summary.planets_total = merge_report.planets_total;
    summary.stars_total = merge_report.stars_total;

    let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let stem = config.source_file_stem(&used_sources);

    // Consolidated exports.
    let consolidated_dir = options.output_dir.join("consolidated");
    export_exoplanets_csv(
        engine.planets(),
        &consolidated_dir.join(format!("{}_{}_exoplanets.csv", stem, timestamp)),
    )?;
    export_stars_csv(
        engine.stars(),
        &consolidated_dir.join(format!("{}_{}_stars.csv", stem, timestamp)),
    )?;

    // Statistics.
    let planets: Vec<_> = engine.planets().map(|r| &r.entity).collect();
    let stars: Vec<_> = engine.stars().map(|r| &r.entity).collect();
    let stats = RunStatistics {
        exoplanet: generate_exoplanet_statistics(&planets, &config.statistics)?,
        star: generate_star_statistics(&stars)?,
    };
    log_statistics(&stats);
    export_statistics_json(
        &stats,
        &options
            .output_dir
            .join("statistics")
            .join(format!("statistics_{}_{}.json", stem, timestamp)),
    )?;

    // Drafts, grouped by article status.
    summary.drafts_written = generate_drafts(config, &engine, checker, options).await?;

    log_summary(&summary);
    Ok(summary)
}

async fn generate_drafts(
    config: &PipelineConfig,
    engine: &ConsolidationEngine,
    checker: Arc<dyn ArticleExistence>,
    options: &PipelineOptions,
) -> Result<usize> {
    let mut written = 0usize;
    let resolver = StatusResolver::new(
        checker,
        config.existence.concurrency,
        Duration::from_secs(config.existence.lookup_timeout_secs),
    );
    let by_host = engine.planets_by_host();

    if options.exoplanet_drafts {
        let names: Vec<String> = engine
            .planets()
            .map(|r| r.entity.pl_name.clone())
            .collect();
        let partition = resolve_or_skip(&resolver, &names, options.skip_existence_check).await;

        let mut missing: BTreeMap<String, String> = BTreeMap::new();
        let mut existing: BTreeMap<String, String> = BTreeMap::new();
        for record in engine.planets() {
            let planet = &record.entity;
            let siblings: Vec<_> = planet
                .st_name
                .as_ref()
                .and_then(|host| by_host.get(&canonical_key(host)))
                .map(|members| members.to_vec())
                .unwrap_or_default();
            let draft = synthesize_exoplanet(planet, &siblings);
            if partition.existing.contains(&planet.pl_name) {
                existing.insert(planet.pl_name.clone(), draft);
            } else {
                missing.insert(planet.pl_name.clone(), draft);
            }
        }
        written += persist_drafts(&missing, &options.drafts_dir, "missing", "exoplanet")?;
        written += persist_drafts(&existing, &options.drafts_dir, "existing", "exoplanet")?;
    } else {
        info!("Exoplanet draft generation disabled.");
    }

    if options.star_drafts {
        let names: Vec<String> = engine.stars().map(|r| r.entity.st_name.clone()).collect();
        let partition = resolve_or_skip(&resolver, &names, options.skip_existence_check).await;

        let mut missing: BTreeMap<String, String> = BTreeMap::new();
        let mut existing: BTreeMap<String, String> = BTreeMap::new();
        for record in engine.stars() {
            let star = &record.entity;
            let planets: Vec<_> = by_host
                .get(&canonical_key(&star.st_name))
                .map(|members| members.to_vec())
                .unwrap_or_default();
            let draft = synthesize_star(star, &planets);
            if partition.existing.contains(&star.st_name) {
                existing.insert(star.st_name.clone(), draft);
            } else {
                missing.insert(star.st_name.clone(), draft);
            }
        }
        written += persist_drafts(&missing, &options.drafts_dir, "missing", "star")?;
        written += persist_drafts(&existing, &options.drafts_dir, "existing", "star")?;
    } else {
        info!("Star draft generation disabled.");
    }

    Ok(written)
}

/// Resolve article status, or classify everything as missing when the
/// check is skipped.
async fn resolve_or_skip(
    resolver: &StatusResolver,
    names: &[String],
    skip: bool,
) -> StatusPartition {
    if skip {
        let mut partition = StatusPartition::default();
        partition.missing.extend(names.iter().cloned());
        return partition;
    }
    resolver.resolve(names).await
}

/// Create the run's output directory layout.
pub fn create_output_directories(output_dir: &Path, drafts_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(output_dir.join("consolidated"))?;
    std::fs::create_dir_all(output_dir.join("statistics"))?;
    std::fs::create_dir_all(drafts_dir)?;
    Ok(())
}

fn log_summary(summary: &RunSummary) {
    info!("Run summary:");
    for report in &summary.ingest_reports {
        info!(
            "  {}: {} accepted, {} rejected",
            report.source, report.accepted, report.rejected
        );
    }
    for source in &summary.skipped_sources {
        info!("  {}: skipped (collection failed)", source);
    }
    info!(
        "  Canonical collection: {} planets, {} stars",
        summary.planets_total, summary.stars_total
    );
    info!("  Drafts written: {}", summary.drafts_written);
}
