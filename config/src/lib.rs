//! Configuration for tog: env defaults from XDG `config.toml` and a project `.env`,
//! applied to the process environment with priority **existing env > .env > XDG**.
//!
//! The same `config.toml` may carry `[tog]`, `[llm]` and `[embedding]` tables;
//! [`load_settings`] returns them for the CLI to layer under its flags.
//!
//! ```toml
//! [env]
//! OPENAI_MODEL = "gpt-4o-mini"
//!
//! [tog]
//! search_width = 3
//! pruning_method = "bm25"
//! ```

mod dotenv_file;
mod settings;
mod xdg_toml;

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use thiserror::Error;

pub use settings::{EmbeddingSettings, LlmSettings, Settings, TogSettings};
pub use xdg_toml::load_settings;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("xdg config path: {0}")]
    XdgPath(String),
    #[error("read xdg config: {0}")]
    XdgRead(std::io::Error),
    #[error("parse xdg toml: {0}")]
    XdgParse(#[from] toml::de::Error),
    #[error("read .env: {0}")]
    Dotenv(String),
}

/// Variables to set: `.env` over XDG, skipping keys for which `is_set` is true.
/// Sorted by key.
fn pending_env(
    xdg: HashMap<String, String>,
    dotenv: HashMap<String, String>,
    is_set: impl Fn(&str) -> bool,
) -> Vec<(String, String)> {
    let mut merged: BTreeMap<String, String> = xdg.into_iter().collect();
    merged.extend(dotenv);
    merged.into_iter().filter(|(k, _)| !is_set(k)).collect()
}

/// Reads `~/.config/<app_name>/config.toml` `[env]` and `.env` (from `override_dir`,
/// else the current directory) and sets every variable not already present.
pub fn load_and_apply(app_name: &str, override_dir: Option<&Path>) -> Result<(), LoadError> {
    let xdg = xdg_toml::load_env_map(app_name)?;
    let dotenv = dotenv_file::load_env_map(override_dir)?;
    for (key, value) in pending_env(xdg, dotenv, |k| std::env::var_os(k).is_some()) {
        std::env::set_var(key, value);
    }
    Ok(())
}

/// Serializes tests that point `XDG_CONFIG_HOME` at a temp dir.
#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
