use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub attachments: AttachmentConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub database_url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default)]
    pub seed_demo_data: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AttachmentConfig {
    #[serde(default = "default_attachment_dir")]
    pub dir: PathBuf,
}

impl Default for AttachmentConfig {
    fn default() -> Self {
        Self {
            dir: default_attachment_dir(),
        }
    }
}

fn default_max_connections() -> u32 { 5 }

fn default_attachment_dir() -> PathBuf { PathBuf::from("attachments") }

impl Config {
    /// Loads `config/` relative to the working directory, layered for `RUN_MODE`.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        Self::load_from(Path::new("config"), &run_mode)
    }

    /// Later sources win: `default`, then `{run_mode}`, then `local`, then
    /// `SKYVAULT__*` environment variables.
    pub fn load_from(dir: &Path, run_mode: &str) -> Result<Self, config::ConfigError> {
        let s = config::Config::builder()
            .add_source(config::File::from(dir.join("default")))
            .add_source(config::File::from(dir.join(run_mode)).required(false))
            // Per-machine overrides, e.g. a different database file.
            .add_source(config::File::from(dir.join("local")).required(false))
            // Eg.. `SKYVAULT__STORE__DATABASE_URL=sqlite:prod.db`
            .add_source(config::Environment::with_prefix("SKYVAULT").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    /// Builds a configuration from an inline TOML document.
    pub fn from_toml(document: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(document, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}
