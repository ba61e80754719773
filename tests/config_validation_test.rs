use propfinder::config::{AppConfig, IndexSection, LogFormat};
use propfinder::resolver::NamingRule;
use propfinder::types::Category;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn default_config_is_valid() {
    let config = AppConfig::default();
    config.validate().expect("defaults should validate");

    assert_eq!(config.index.features.len(), 6);
    assert_eq!(config.index.features[0], "RPM");
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.logging.format, LogFormat::Text);
    assert_eq!(
        config.bundle_path(),
        PathBuf::from("./output").join("propfinder.bundle")
    );
}

#[test]
fn categorical_feature_is_rejected() {
    let config = AppConfig {
        index: IndexSection {
            features: vec!["RPM".into(), "prop_type".into()],
            ..Default::default()
        },
        ..Default::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn empty_feature_list_is_rejected() {
    let config = AppConfig {
        index: IndexSection {
            features: Vec::new(),
            ..Default::default()
        },
        ..Default::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn empty_suffix_is_rejected() {
    let mut config = AppConfig::default();
    config.corpus.geometry_rule = NamingRule::new("", "");
    assert!(config.validate().is_err());
}

#[test]
fn toml_overrides_defaults() {
    let config = AppConfig::from_toml_str(
        r#"
        [corpus]
        performance_root = "/data/apc/performance"

        [corpus.geometry_rule]
        prefix = "GEO_"
        suffix = ".PE0"

        [index]
        features = ["speed", "max_thrust", "maxPower (W)"]
        output_dir = "/tmp/propfinder"

        [logging]
        level = "propfinder=debug"
        format = "json"
        "#,
    )
    .expect("TOML should parse");

    config.validate().expect("config should validate");
    assert_eq!(
        config.corpus.performance_root,
        PathBuf::from("/data/apc/performance")
    );
    assert_eq!(config.corpus.geometry_rule, NamingRule::new("GEO_", ".PE0"));
    assert_eq!(config.corpus.performance_rule, NamingRule::performance());
    assert_eq!(config.index.features.len(), 3);
    assert_eq!(config.index.catalog_file, "catalog.parquet");
    assert_eq!(config.logging.format, LogFormat::Json);
    assert_eq!(
        config.report_path(),
        PathBuf::from("/tmp/propfinder/build_report.json")
    );
}

#[test]
fn corpus_uses_configured_roots() {
    let temp_dir = TempDir::new().unwrap();
    let geometry = temp_dir.path().join("geometry");
    std::fs::create_dir_all(&geometry).unwrap();
    std::fs::write(geometry.join("GEO_9x6.PE0"), "geometry").unwrap();

    let mut config = AppConfig::default();
    config.corpus.geometry_root = geometry.clone();
    config.corpus.geometry_rule = NamingRule::new("GEO_", ".PE0");

    let corpus = config.corpus();
    let path = corpus
        .resolve("9x6", Category::Geometry)
        .expect("geometry file should resolve");
    assert_eq!(path, geometry.join("GEO_9x6.PE0"));
}
