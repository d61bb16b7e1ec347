//! TOML configuration for Relay.
//!
//! Reads configuration with precedence: CLI flags > env vars > config file >
//! defaults. The model credential comes from the environment only and is
//! resolved before any server subprocess is launched.

use relay_mcp::ServerRegistry;
use relay_types::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The default model to use.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// The default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.0;

/// Accepted credential environment variables, in lookup order. The first one
/// present wins.
pub const API_KEY_ENV_VARS: [&str; 2] = ["GOOGLE_GEMINI_API_KEY", "GOOGLE_API_KEY"];

/// Resolved configuration for a Relay session.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: Option<u32>,
    pub api_base_url: String,
    pub registry: ServerRegistry,
    pub persist_sessions: bool,
    pub sessions_dir: PathBuf,
}

/// Settings that can be read from a `relay.toml` file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsFile {
    #[serde(default)]
    pub api: ApiSettings,
    #[serde(flatten)]
    pub registry: ServerRegistry,
    #[serde(default)]
    pub session: SessionSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiSettings {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub base_url: Option<String>,
}

/// Session persistence section of the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionSettings {
    #[serde(default)]
    pub persist: bool,
    pub dir: Option<PathBuf>,
}

/// CLI overrides that take highest precedence.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub model: Option<String>,
}

impl RelayConfig {
    /// Load configuration from all sources, applying precedence rules.
    ///
    /// Fails fast on a missing credential — before any server subprocess is
    /// launched.
    pub fn load(overrides: CliOverrides) -> Result<Self, ConfigError> {
        let api_key = resolve_api_key_from(|var| std::env::var(var).ok())?;

        let config_dir = config_dir();
        let settings = match &overrides.config_path {
            Some(path) => read_settings_file(path)?,
            None => load_default_settings(&config_dir.join("relay.toml")),
        };

        let model = overrides
            .model
            .or_else(|| std::env::var("RELAY_MODEL").ok())
            .or(settings.api.model)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let api_base_url = settings
            .api
            .base_url
            .unwrap_or_else(|| relay_api::DEFAULT_BASE_URL.to_string());

        let sessions_dir = settings
            .session
            .dir
            .unwrap_or_else(|| config_dir.join("sessions"));

        Ok(RelayConfig {
            api_key,
            model,
            temperature: settings.api.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            max_output_tokens: settings.api.max_output_tokens,
            api_base_url,
            registry: settings.registry,
            persist_sessions: settings.session.persist,
            sessions_dir,
        })
    }
}

/// Resolve the model credential from an environment lookup.
/// `GOOGLE_GEMINI_API_KEY` wins over `GOOGLE_API_KEY`; empty values count as
/// unset.
pub fn resolve_api_key_from<F>(lookup: F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    for var in API_KEY_ENV_VARS {
        if let Some(value) = lookup(var) {
            if !value.is_empty() {
                return Ok(value);
            }
        }
    }
    Err(ConfigError::MissingKey {
        key: "GOOGLE_GEMINI_API_KEY (or GOOGLE_API_KEY)".into(),
    })
}

/// The Relay config directory (~/.relay/ unless RELAY_CONFIG_DIR is set).
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("RELAY_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    dirs_next::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".relay")
}

/// Read and parse an explicitly named settings file. Errors surface.
fn read_settings_file(path: &Path) -> Result<SettingsFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    toml::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Load the default-location settings file, returning defaults when it is
/// absent or unparseable.
fn load_default_settings(path: &Path) -> SettingsFile {
    match std::fs::read_to_string(path) {
        Ok(content) => toml::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!("Failed to parse {}: {}", path.display(), e);
            SettingsFile::default()
        }),
        Err(_) => SettingsFile::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings() {
        let settings = SettingsFile::default();
        assert!(settings.api.model.is_none());
        assert!(settings.registry.servers.is_empty());
        assert!(!settings.session.persist);
    }

    #[test]
    fn settings_toml_parse() {
        let toml_str = r#"
[api]
model = "gemini-2.5-flash"
temperature = 0.2

[servers.weather]
command = "python3"
args = ["weather_server.py"]

[servers.tasks]
command = "python3"
args = ["tasklist_server.py"]

[session]
persist = true
"#;
        let settings: SettingsFile = toml::from_str(toml_str).unwrap();
        assert_eq!(settings.api.model.as_deref(), Some("gemini-2.5-flash"));
        assert_eq!(settings.registry.servers.len(), 2);
        assert_eq!(settings.registry.names(), vec!["tasks", "weather"]);
        assert!(settings.session.persist);
    }

    #[test]
    fn missing_sections_default_to_empty() {
        let settings: SettingsFile = toml::from_str(
            r#"
[servers.weather]
command = "python3"
"#,
        )
        .unwrap();
        assert!(settings.api.model.is_none());
        assert_eq!(settings.registry.servers.len(), 1);
    }

    #[test]
    fn first_credential_var_wins() {
        let key = resolve_api_key_from(|var| match var {
            "GOOGLE_GEMINI_API_KEY" => Some("primary".to_string()),
            "GOOGLE_API_KEY" => Some("fallback".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(key, "primary");
    }

    #[test]
    fn fallback_credential_var_is_used() {
        let key = resolve_api_key_from(|var| match var {
            "GOOGLE_API_KEY" => Some("fallback".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(key, "fallback");
    }

    #[test]
    fn empty_credential_counts_as_unset() {
        let result = resolve_api_key_from(|var| match var {
            "GOOGLE_GEMINI_API_KEY" => Some(String::new()),
            _ => None,
        });
        assert!(matches!(result, Err(ConfigError::MissingKey { .. })));
    }

    #[test]
    fn missing_credential_is_a_config_error() {
        let result = resolve_api_key_from(|_| None);
        match result {
            Err(ConfigError::MissingKey { key }) => {
                assert!(key.contains("GOOGLE_GEMINI_API_KEY"));
            }
            other => panic!("Expected MissingKey, got {other:?}"),
        }
    }

    #[test]
    fn explicit_config_path_errors_surface() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("relay.toml");

        // Missing file
        assert!(matches!(
            read_settings_file(&path),
            Err(ConfigError::Parse { .. })
        ));

        // Unparseable file
        std::fs::write(&path, "not [valid toml").unwrap();
        assert!(matches!(
            read_settings_file(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
