//! This module is in charge of defining the configuration format with types
//! and reading the configuration.
//!
//! Grounded on the teacher's `config.rs` (a toml file named by the first
//! CLI argument, parsed into an `EnvironmentConfig` struct), but with
//! `clap::Parser` doing the argument handling the teacher's dependency
//! list implies and with every OAuth/avatar/grafana secret trimmed —
//! authentication is an external adapter (§1), so this crate's config
//! never carries a secret.

use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "match-coordinator")]
struct Cli {
    /// Path to the toml config file.
    #[arg(default_value = "dev-config.toml")]
    config_file: PathBuf,
}

#[derive(Clone, Deserialize)]
pub struct EnvironmentConfig {
    /// Socket address axum binds the websocket/HTTP surface to.
    pub bind: String,
    /// sqlite DSN, e.g. `sqlite://match-coordinator.db`.
    pub database_path: String,
    /// Path the rotating debug log is written to.
    pub log_file: String,

    /// §6 constants. Defaulted to the spec's values but overridable for
    /// tuning/testing without a recompile.
    #[serde(default = "default_delete_cushion_millis")]
    pub delete_cushion_millis: i64,
    #[serde(default = "default_disconnect_forgiveness_millis")]
    pub disconnect_forgiveness_millis: i64,
    #[serde(default = "default_afk_auto_resign_millis")]
    pub afk_auto_resign_millis: i64,
    #[serde(default = "default_auto_resign_by_choice_millis")]
    pub auto_resign_by_choice_millis: i64,
    #[serde(default = "default_auto_resign_not_by_choice_millis")]
    pub auto_resign_not_by_choice_millis: i64,
}

fn default_delete_cushion_millis() -> i64 {
    8_000
}
fn default_disconnect_forgiveness_millis() -> i64 {
    5_000
}
fn default_afk_auto_resign_millis() -> i64 {
    20_000
}
fn default_auto_resign_by_choice_millis() -> i64 {
    20_000
}
fn default_auto_resign_not_by_choice_millis() -> i64 {
    60_000
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        EnvironmentConfig {
            bind: "0.0.0.0:8080".to_string(),
            database_path: "sqlite://match-coordinator.db".to_string(),
            log_file: "match-coordinator.log".to_string(),
            delete_cushion_millis: default_delete_cushion_millis(),
            disconnect_forgiveness_millis: default_disconnect_forgiveness_millis(),
            afk_auto_resign_millis: default_afk_auto_resign_millis(),
            auto_resign_by_choice_millis: default_auto_resign_by_choice_millis(),
            auto_resign_not_by_choice_millis: default_auto_resign_not_by_choice_millis(),
        }
    }
}

/// Loads the config named by the first CLI argument (`dev-config.toml` if
/// omitted). Unlike the teacher's loader, there is no secrets file to
/// merge in afterwards.
pub fn load_config() -> EnvironmentConfig {
    match load_config_inner() {
        Ok(config) => config,
        Err(err) => {
            // Logging isn't up yet here, so a plain eprintln is correct.
            eprintln!("Error loading config: {err}");
            std::process::exit(1);
        }
    }
}

fn load_config_inner() -> Result<EnvironmentConfig, String> {
    let cli = Cli::parse();

    let config_text = fs::read_to_string(&cli.config_file).map_err(|_| {
        format!("Could not read config file at path: {}", cli.config_file.display())
    })?;

    log::info!("Loaded config file: {}", cli.config_file.display());

    toml::from_str(&config_text).map_err(|e| {
        format!(
            "Could not parse config file at path: {}\nCaused by: {e:?}",
            cli.config_file.display()
        )
    })
}
