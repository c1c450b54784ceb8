use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use log::warn;
use serde::Deserialize;

use crate::validation::SessionOptions;

pub const DEFAULT_CONFIG_FILE: &str = "tls-validation.json";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// JSON document describing the web server's sites and bindings.
    pub server_config_path: PathBuf,
    pub certificate_store_path: PathBuf,
    pub options: SessionOptions,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            server_config_path: PathBuf::from("server.json"),
            certificate_store_path: PathBuf::from("validation-certificates.sqlite"),
            options: SessionOptions::default(),
        }
    }
}

/// Loads the config from `path`, or from `./tls-validation.json` when present,
/// then applies environment overrides.
pub fn load_config(path: Option<&Path>) -> Result<ValidationConfig> {
    let path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => {
            let p = Path::new(DEFAULT_CONFIG_FILE);
            if p.exists() { Some(p.to_path_buf()) } else { None }
        }
    };
    let mut config = match path {
        Some(path) => {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse config {}", path.display()))?
        }
        None => ValidationConfig::default(),
    };
    validate_options(&config.options)?;
    apply_env_overrides(&mut config.options, |key| env::var(key).ok());
    Ok(config)
}

fn validate_options(options: &SessionOptions) -> Result<()> {
    if options.https_port == 0 {
        bail!("options.https_port cannot be 0");
    }
    if options.http_port == 0 {
        bail!("options.http_port cannot be 0");
    }
    Ok(())
}

fn apply_env_overrides<F>(options: &mut SessionOptions, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(port) = parse_override::<u16>(&lookup, "TLS_VALIDATION_HTTPS_PORT") {
        if port == 0 {
            warn!(
                "[config] TLS_VALIDATION_HTTPS_PORT cannot be 0; keeping {}",
                options.https_port
            );
        } else {
            options.https_port = port;
        }
    }
    if let Some(major) = parse_override::<u32>(&lookup, "TLS_VALIDATION_MIN_SERVER_MAJOR") {
        options.min_server_major_version = major;
    }
}

fn parse_override<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("[config] ignoring invalid {key} value '{raw}'");
            None
        }
    }
}
