use std::env;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::index::resolve_features;
use crate::resolver::{Corpus, IdentifierResolver, NamingRule};
use crate::types::{Category, Column};

/// Top-level application configuration loaded from file + environment.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub corpus: CorpusSection,
    pub index: IndexSection,
    pub logging: LoggingSection,
}

impl AppConfig {
    /// Load configuration from disk and environment.
    ///
    /// The file path comes from `PROPFINDER_CONFIG` (default
    /// `propfinder.toml`); a missing file is not an error. Environment
    /// variables such as `PROPFINDER_INDEX__OUTPUT_DIR` override it.
    pub fn load() -> Result<Self> {
        let config_path =
            env::var("PROPFINDER_CONFIG").unwrap_or_else(|_| "propfinder.toml".to_string());

        let mut builder = config::Config::builder();

        if Path::new(&config_path).exists() {
            builder = builder.add_source(config::File::from(PathBuf::from(&config_path)));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("PROPFINDER")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("index.features")
                .try_parsing(true),
        );

        let settings = builder.build()?;
        let config: Self = settings
            .try_deserialize()
            .with_context(|| format!("invalid configuration (file: {})", config_path))?;

        Ok(config.normalized())
    }

    /// Parse configuration from TOML text without consulting the environment.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?;
        let config: Self = settings.try_deserialize()?;
        Ok(config.normalized())
    }

    fn normalized(mut self) -> Self {
        if self.logging.level.trim().is_empty() {
            self.logging.level = "info".to_string();
        }
        self
    }

    /// Check the settings the build pipeline depends on.
    pub fn validate(&self) -> Result<()> {
        resolve_features(&self.index.features).context("invalid index.features")?;

        for (section, rule) in [
            ("corpus.geometry_rule", &self.corpus.geometry_rule),
            ("corpus.performance_rule", &self.corpus.performance_rule),
        ] {
            if rule.suffix.trim().is_empty() {
                bail!("{}.suffix must not be empty", section);
            }
        }

        for (key, name) in [
            ("index.bundle_file", &self.index.bundle_file),
            ("index.catalog_file", &self.index.catalog_file),
            ("index.report_file", &self.index.report_file),
        ] {
            if name.trim().is_empty() {
                bail!("{} must not be empty", key);
            }
        }

        Ok(())
    }

    pub fn corpus(&self) -> Corpus {
        Corpus::new(
            IdentifierResolver::new(
                &self.corpus.geometry_root,
                Category::Geometry,
                self.corpus.geometry_rule.clone(),
            ),
            IdentifierResolver::new(
                &self.corpus.performance_root,
                Category::Performance,
                self.corpus.performance_rule.clone(),
            ),
        )
    }

    pub fn bundle_path(&self) -> PathBuf {
        self.index.output_dir.join(&self.index.bundle_file)
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.index.output_dir.join(&self.index.catalog_file)
    }

    pub fn report_path(&self) -> PathBuf {
        self.index.output_dir.join(&self.index.report_file)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CorpusSection {
    pub geometry_root: PathBuf,
    pub performance_root: PathBuf,
    #[serde(default = "NamingRule::geometry")]
    pub geometry_rule: NamingRule,
    #[serde(default = "NamingRule::performance")]
    pub performance_rule: NamingRule,
}

impl Default for CorpusSection {
    fn default() -> Self {
        Self {
            geometry_root: PathBuf::from("./data/geometry"),
            performance_root: PathBuf::from("./data/performance"),
            geometry_rule: NamingRule::geometry(),
            performance_rule: NamingRule::performance(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndexSection {
    /// Column names the spatial index is built over
    pub features: Vec<String>,
    pub output_dir: PathBuf,
    pub bundle_file: String,
    pub catalog_file: String,
    pub report_file: String,
}

impl Default for IndexSection {
    fn default() -> Self {
        Self {
            features: Column::DEFAULT_FEATURES
                .iter()
                .map(|c| c.name().to_string())
                .collect(),
            output_dir: PathBuf::from("./output"),
            bundle_file: "propfinder.bundle".to_string(),
            catalog_file: "catalog.parquet".to_string(),
            report_file: "build_report.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Text,
}
