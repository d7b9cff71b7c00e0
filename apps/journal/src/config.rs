use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use axum::http::HeaderValue;
use serde::Deserialize;

use crate::fields::{Block, Registry};

/// Where the configuration document is read from, relative to the working directory.
pub const CONFIG_PATH: &str = "configs/myconfig.yaml";

/// The `app` section of the configuration document.
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_font_size")]
    pub font_size: u32,
    #[serde(default = "default_data_file")]
    pub data_file: PathBuf,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Browser origin allowed to call the API cross-site. Unset means same-origin only.
    #[serde(default)]
    pub allowed_origin: Option<String>,
}

fn default_title() -> String {
    "Daily Health & Performance Log".to_string()
}

fn default_font_size() -> u32 {
    24
}

fn default_data_file() -> PathBuf {
    PathBuf::from("./wellness_data.csv")
}

fn default_port() -> u16 {
    8501
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize)]
struct ConfigDocument {
    app: AppSettings,
    blocks: Vec<Block>,
}

/// Application configuration, loaded once at startup and never mutated.
#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppSettings,
    pub registry: Registry,
}

impl Config {
    /// Reads and validates the configuration document. Any failure is fatal.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read configuration file '{}'", path.display()))?;
        Self::from_yaml(&text)
            .with_context(|| format!("Invalid configuration file '{}'", path.display()))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let doc: ConfigDocument =
            serde_yaml::from_str(text).context("Configuration document is not valid YAML")?;
        if let Some(origin) = &doc.app.allowed_origin {
            if HeaderValue::from_str(origin).is_err() {
                bail!("app.allowed_origin '{origin}' is not a valid origin");
            }
        }
        let registry = Registry::new(doc.blocks)?;
        Ok(Config {
            app: doc.app,
            registry,
        })
    }
}
