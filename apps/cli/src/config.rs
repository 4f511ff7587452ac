//! CLI configuration: defaults, optional `mapbuilder.{toml,yaml,json}`, then `MAPBUILDER__*`
//! environment variables.

use mapbuilder_definitions::{IndexConfig, DEFAULT_REGISTRIES};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct CliConfig {
    pub fhir: FhirConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FhirConfig {
    /// Defaults to `~/.fhir`.
    #[serde(default)]
    pub home: Option<PathBuf>,
    #[serde(default)]
    pub cache_root: Option<PathBuf>,
    #[serde(default)]
    pub settings_path: Option<PathBuf>,
    #[serde(default = "default_registries")]
    pub registries: Vec<String>,
    #[serde(default = "default_fetch_timeout_seconds")]
    pub fetch_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_registries() -> Vec<String> {
    DEFAULT_REGISTRIES.iter().map(|s| s.to_string()).collect()
}

fn default_fetch_timeout_seconds() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            fhir: FhirConfig {
                home: None,
                cache_root: None,
                settings_path: None,
                registries: default_registries(),
                fetch_timeout_seconds: default_fetch_timeout_seconds(),
            },
            logging: LoggingConfig {
                level: default_log_level(),
                json: false,
            },
        }
    }
}

impl CliConfig {
    /// Load configuration from defaults, config file and environment
    pub fn load() -> anyhow::Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .set_default("fhir.registries", default_registries())?
            .set_default(
                "fhir.fetch_timeout_seconds",
                default_fetch_timeout_seconds() as i64,
            )?
            .set_default("logging.level", default_log_level())?
            .set_default("logging.json", false)?
            .add_source(config::File::with_name("mapbuilder").required(false))
            // Example: MAPBUILDER__FHIR__HOME -> fhir.home
            .add_source(
                config::Environment::with_prefix("MAPBUILDER")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("fhir.registries")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Index configuration; `home_override` (from the command line) wins over the configured
    /// home.
    pub fn index_config(&self, home_override: Option<&Path>) -> IndexConfig {
        let home = home_override
            .map(Path::to_path_buf)
            .or_else(|| self.fhir.home.clone())
            .unwrap_or_else(IndexConfig::default_fhir_home);

        let mut index = IndexConfig::from_fhir_home(home);
        if let Some(cache_root) = &self.fhir.cache_root {
            index.cache_root = cache_root.clone();
        }
        if let Some(settings_path) = &self.fhir.settings_path {
            index.settings_path = settings_path.clone();
        }
        if !self.fhir.registries.is_empty() {
            index.default_registries = self.fhir.registries.clone();
        }
        index.fetch_timeout = Duration::from_secs(self.fhir.fetch_timeout_seconds);
        index
    }
}
