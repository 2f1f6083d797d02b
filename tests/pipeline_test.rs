use anyhow::Result;
use async_trait::async_trait;
use exowiki::config::PipelineConfig;
use exowiki::ingest::{CsvFileCollector, SourceCollector};
use exowiki::pipeline::{create_output_directories, run_pipeline, PipelineOptions};
use exowiki::status::ArticleExistence;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Checker answering from a fixed set of known titles.
struct FixedChecker {
    known: BTreeSet<String>,
}

#[async_trait]
impl ArticleExistence for FixedChecker {
    async fn exists(&self, canonical_name: &str) -> Result<bool> {
        Ok(self.known.contains(canonical_name))
    }
}

/// Collector whose collection always fails, standing in for an
/// unreachable catalog.
struct BrokenCollector;

#[async_trait]
impl SourceCollector for BrokenCollector {
    async fn collect_entities_from_source(&self) -> Result<(Vec<Value>, Option<Vec<Value>>)> {
        anyhow::bail!("connection refused")
    }

    fn source_id(&self) -> &str {
        "exoplanet_eu"
    }
}

/// In-memory collector fed with prebuilt JSON rows.
struct StaticCollector {
    source_id: String,
    planets: Vec<Value>,
    stars: Option<Vec<Value>>,
}

#[async_trait]
impl SourceCollector for StaticCollector {
    async fn collect_entities_from_source(&self) -> Result<(Vec<Value>, Option<Vec<Value>>)> {
        Ok((self.planets.clone(), self.stars.clone()))
    }

    fn source_id(&self) -> &str {
        &self.source_id
    }
}

fn scratch_dir(label: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "exowiki_pipeline_{}_{}",
        label,
        std::process::id()
    ));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_source_csvs(data_dir: &Path) {
    fs::write(
        data_dir.join("nasa_exoplanet_archive_planets.csv"),
        "pl_name,hostname,discoverymethod,disc_year,pl_masse,pl_masseerr1,pl_masseerr2,pl_rade,pl_orbsmax\n\
         K2-18 b,K2-18,Transit,2015,8.63,1.35,-1.35,2.61,0.1591\n\
         K2-18 c,K2-18,Radial Velocity,2019,7.5,1.0,-1.0,,0.06\n",
    )
    .unwrap();
    fs::write(
        data_dir.join("nasa_exoplanet_archive_stars.csv"),
        "hostname,st_spectype,st_teff,sy_pnum,sy_dist\n\
         K2-18,M2.5V,3457,2,38.1\n",
    )
    .unwrap();
    // same planet under different casing, less precise mass, extra alias
    fs::write(
        data_dir.join("exoplanet_eu_planets.csv"),
        "pl_name,st_name,disc_method,disc_year,pl_masse,pl_masseerr1,pl_masseerr2,alt_names\n\
         k2-18  B,K2-18,Transit,2015,8.92,2.0,-2.0,EPIC 201912552 b\n",
    )
    .unwrap();
}

fn options(root: &Path) -> PipelineOptions {
    PipelineOptions {
        output_dir: root.join("output"),
        drafts_dir: root.join("output/drafts"),
        skip_existence_check: false,
        exoplanet_drafts: true,
        star_drafts: true,
    }
}

fn find_export(dir: &Path, suffix: &str) -> PathBuf {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .find(|p| p.to_string_lossy().ends_with(suffix))
        .unwrap_or_else(|| panic!("no {} export under {}", suffix, dir.display()))
}

#[tokio::test]
async fn test_two_source_run_merges_and_exports() {
    let root = scratch_dir("merge");
    write_source_csvs(&root);

    let collectors: Vec<Box<dyn SourceCollector>> = vec![
        Box::new(CsvFileCollector::new(
            "nasa_exoplanet_archive".to_string(),
            root.join("nasa_exoplanet_archive_planets.csv"),
            Some(root.join("nasa_exoplanet_archive_stars.csv")),
        )),
        Box::new(CsvFileCollector::new(
            "exoplanet_eu".to_string(),
            root.join("exoplanet_eu_planets.csv"),
            None,
        )),
    ];
    let checker = Arc::new(FixedChecker {
        known: BTreeSet::from(["K2-18".to_string()]),
    });

    let config = PipelineConfig::default();
    let opts = options(&root);
    create_output_directories(&opts.output_dir, &opts.drafts_dir).unwrap();
    let summary = run_pipeline(&config, collectors, checker, &opts)
        .await
        .unwrap();

    // identity resolution folds "k2-18  B" into "K2-18 b"
    assert_eq!(summary.planets_total, 2);
    assert_eq!(summary.stars_total, 1);
    assert!(summary.skipped_sources.is_empty());

    let planets_csv =
        fs::read_to_string(find_export(&opts.output_dir.join("consolidated"), "_exoplanets.csv"))
            .unwrap();
    // more precise archive mass wins over the wider eu bounds
    assert!(planets_csv.contains("m1|8.63|1.35|1.35|nasa_exoplanet_archive"));
    assert!(!planets_csv.contains("8.92"));
    // alias contributed only by the eu row survives the merge
    assert!(planets_csv.contains("l1|EPIC 201912552 b"));

    // drafts are partitioned by article status
    assert!(opts
        .drafts_dir
        .join("missing/exoplanet/K2-18 b.wiki")
        .exists());
    assert!(opts
        .drafts_dir
        .join("missing/exoplanet/K2-18 c.wiki")
        .exists());
    assert!(opts.drafts_dir.join("existing/star/K2-18.wiki").exists());
    assert_eq!(summary.drafts_written, 3);

    let _ = fs::remove_dir_all(&root);
}

#[tokio::test]
async fn test_failing_source_is_skipped_not_fatal() {
    let root = scratch_dir("skip");
    write_source_csvs(&root);

    let collectors: Vec<Box<dyn SourceCollector>> = vec![
        Box::new(CsvFileCollector::new(
            "nasa_exoplanet_archive".to_string(),
            root.join("nasa_exoplanet_archive_planets.csv"),
            Some(root.join("nasa_exoplanet_archive_stars.csv")),
        )),
        Box::new(BrokenCollector),
    ];
    let checker = Arc::new(FixedChecker {
        known: BTreeSet::new(),
    });

    let config = PipelineConfig::default();
    let mut opts = options(&root);
    opts.skip_existence_check = true;
    create_output_directories(&opts.output_dir, &opts.drafts_dir).unwrap();
    let summary = run_pipeline(&config, collectors, checker, &opts)
        .await
        .unwrap();

    assert_eq!(summary.skipped_sources, vec!["exoplanet_eu".to_string()]);
    assert_eq!(summary.planets_total, 2);

    // the surviving source's data is still exported, under its stem only
    let export = find_export(&opts.output_dir.join("consolidated"), "_exoplanets.csv");
    let file_name = export.file_name().unwrap().to_string_lossy().to_string();
    assert!(file_name.starts_with("nea_"));
    assert!(!file_name.contains("eu_"));

    let _ = fs::remove_dir_all(&root);
}

#[tokio::test]
async fn test_system_section_lists_all_siblings() {
    let root = scratch_dir("system");

    let planets = vec![
        json!({"pl_name": "TRAPPIST-1 b", "hostname": "TRAPPIST-1", "pl_orbsmax": 0.0115, "disc_year": 2016}),
        json!({"pl_name": "TRAPPIST-1 c", "hostname": "TRAPPIST-1", "pl_orbsmax": 0.0158, "disc_year": 2016}),
        json!({"pl_name": "TRAPPIST-1 d", "hostname": "TRAPPIST-1", "pl_orbsmax": 0.0223, "disc_year": 2016}),
    ];
    let stars = vec![json!({"hostname": "TRAPPIST-1", "st_spectype": "M8V", "sy_pnum": 7})];
    let collectors: Vec<Box<dyn SourceCollector>> = vec![Box::new(StaticCollector {
        source_id: "nasa_exoplanet_archive".to_string(),
        planets,
        stars: Some(stars),
    })];
    let checker = Arc::new(FixedChecker {
        known: BTreeSet::new(),
    });

    let config = PipelineConfig::default();
    let mut opts = options(&root);
    opts.skip_existence_check = true;
    create_output_directories(&opts.output_dir, &opts.drafts_dir).unwrap();
    run_pipeline(&config, collectors, checker, &opts)
        .await
        .unwrap();

    let draft = fs::read_to_string(
        opts.drafts_dir.join("missing/exoplanet/TRAPPIST-1 c.wiki"),
    )
    .unwrap();
    assert!(draft.contains("== Planetary system =="));
    // siblings ordered by semi-major axis, target row included
    let b = draft.find("TRAPPIST-1 b").unwrap();
    let c = draft.rfind("TRAPPIST-1 c").unwrap();
    let d = draft.find("TRAPPIST-1 d").unwrap();
    assert!(b < c && c < d);

    // discovery year of the host star is derived from the earliest planet
    let star_draft =
        fs::read_to_string(opts.drafts_dir.join("missing/star/TRAPPIST-1.wiki")).unwrap();
    assert!(star_draft.contains("2016"));

    let _ = fs::remove_dir_all(&root);
}
