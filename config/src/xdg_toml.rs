//! Read `$XDG_CONFIG_HOME/<app>/config.toml`: the `[env]` table and the run settings tables.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::settings::Settings;
use crate::LoadError;

/// `$XDG_CONFIG_HOME` when set, else the platform config dir.
fn config_home() -> Result<PathBuf, LoadError> {
    if let Some(dir) = std::env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    dirs::config_dir().ok_or_else(|| LoadError::XdgPath("no config directory for this user".into()))
}

/// Path of the app's `config.toml`, if the file exists.
pub(crate) fn xdg_config_path(app_name: &str) -> Result<Option<PathBuf>, LoadError> {
    let path = config_home()?.join(app_name).join("config.toml");
    if path.is_file() {
        Ok(Some(path))
    } else {
        Ok(None)
    }
}

#[derive(serde::Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    env: HashMap<String, String>,
    #[serde(flatten)]
    settings: Settings,
}

fn read_config(app_name: &str) -> Result<Option<ConfigFile>, LoadError> {
    let path = match xdg_config_path(app_name)? {
        Some(p) => p,
        None => return Ok(None),
    };
    let content = std::fs::read_to_string(&path).map_err(LoadError::XdgRead)?;
    Ok(Some(toml::from_str(&content)?))
}

/// Returns env key-value pairs from `[env]` section. Missing file or empty section returns empty map.
pub fn load_env_map(app_name: &str) -> Result<HashMap<String, String>, LoadError> {
    Ok(read_config(app_name)?.map(|c| c.env).unwrap_or_default())
}

/// Returns the `[tog]`, `[llm]` and `[embedding]` tables. Missing file yields defaults.
pub fn load_settings(app_name: &str) -> Result<Settings, LoadError> {
    Ok(read_config(app_name)?.map(|c| c.settings).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    /// Writes `content` as `<tmp>/<app>/config.toml`, points `XDG_CONFIG_HOME` at `<tmp>`
    /// while `f` runs, then restores it.
    fn with_config<T>(app: &str, content: &str, f: impl FnOnce() -> T) -> T {
        let dir = tempfile::tempdir().unwrap();
        let app_dir = dir.path().join(app);
        std::fs::create_dir_all(&app_dir).unwrap();
        std::fs::write(app_dir.join("config.toml"), content).unwrap();

        let _guard = crate::ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let prev = env::var("XDG_CONFIG_HOME").ok();
        env::set_var("XDG_CONFIG_HOME", dir.path());
        let out = f();
        match prev {
            Some(p) => env::set_var("XDG_CONFIG_HOME", p),
            None => env::remove_var("XDG_CONFIG_HOME"),
        }
        out
    }

    #[test]
    fn missing_config_yields_defaults() {
        let (env_map, settings) = with_config("present", "", || {
            (
                load_env_map("tog-config-test-absent").unwrap(),
                load_settings("tog-config-test-absent").unwrap(),
            )
        });
        assert!(env_map.is_empty());
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn other_tables_are_ignored() {
        let map = with_config("noenv", "[other]\nkey = \"ignored\"\n", || load_env_map("noenv"));
        assert!(map.unwrap().is_empty());
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        let result = with_config("badapp", "not valid toml [[[\n", || load_env_map("badapp"));
        assert!(matches!(result, Err(LoadError::XdgParse(_))));
    }

    #[test]
    fn settings_tables_are_read_next_to_env() {
        let content = r#"
[env]
OPENAI_MODEL = "gpt-4o-mini"

[tog]
search_width = 4
pruning_method = "bm25"
enable_sufficiency_check = false
timeout_secs = 20

[llm]
model = "gpt-4o"
temperature = 0.2

[embedding]
model = "text-embedding-3-small"
"#;
        let (settings, env_map) = with_config("settingsapp", content, || {
            (load_settings("settingsapp"), load_env_map("settingsapp"))
        });

        let settings = settings.unwrap();
        assert_eq!(settings.tog.search_width, Some(4));
        assert_eq!(settings.tog.search_depth, None);
        assert_eq!(settings.tog.pruning_method.as_deref(), Some("bm25"));
        assert_eq!(settings.tog.enable_sufficiency_check, Some(false));
        assert_eq!(settings.tog.timeout_secs, Some(20));
        assert_eq!(settings.llm.model.as_deref(), Some("gpt-4o"));
        assert_eq!(settings.llm.temperature, Some(0.2));
        assert_eq!(
            settings.embedding.model.as_deref(),
            Some("text-embedding-3-small")
        );
        assert_eq!(
            env_map.unwrap().get("OPENAI_MODEL"),
            Some(&"gpt-4o-mini".to_string())
        );
    }

    #[test]
    fn misspelled_settings_key_is_a_parse_error() {
        let result = with_config("typoapp", "[tog]\nserch_width = 3\n", || load_settings("typoapp"));
        assert!(matches!(result, Err(LoadError::XdgParse(_))));
    }
}
