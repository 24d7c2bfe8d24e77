use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use arkaios_providers::{ApiConfig, DEFAULT_MODEL};
use arkaios_tools::ToolSettings;
use arkaios_types::ApiKey;

use crate::SessionSettings;

#[derive(Debug, Default, Deserialize)]
pub struct ArkaiosConfig {
    pub app: Option<AppConfig>,
    pub gemini: Option<GeminiConfig>,
    pub tools: Option<ToolsConfig>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    /// First MODEL message shown at startup.
    pub greeting: Option<String>,
    /// Maximum tool rounds per user turn.
    pub max_chain_depth: Option<u32>,
    /// Prompt used when only an image is sent.
    pub image_only_prompt: Option<String>,
}

#[derive(Default, Deserialize)]
pub struct GeminiConfig {
    /// Supports `${VAR}` expansion.
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_output_tokens: Option<u32>,
    /// Trailing transcript messages sent as context.
    pub context_messages: Option<usize>,
    pub request_timeout_secs: Option<u64>,
    pub base_url: Option<String>,
    pub system_prompt: Option<String>,
}

// Manual Debug impl to prevent leaking API keys in logs.
impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field(
                "api_key",
                &if self.api_key.is_some() {
                    "[REDACTED]"
                } else {
                    "None"
                },
            )
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("context_messages", &self.context_messages)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("base_url", &self.base_url)
            .field("system_prompt", &self.system_prompt.as_ref().map(String::len))
            .finish()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ToolsConfig {
    /// Cap on `read_file` output in bytes.
    pub max_read_bytes: Option<usize>,
    /// Directory mounted at startup. Supports `${VAR}` expansion.
    pub workspace: Option<String>,
}

/// Replace `${VAR}` with the variable's value (empty when unset).
///
/// An unclosed `${` is kept literally.
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        let Some(end_rel) = rest[start + 2..].find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        let var = &rest[start + 2..start + 2 + end_rel];
        if !var.is_empty() {
            out.push_str(&env::var(var).unwrap_or_default());
        }
        rest = &rest[start + 2 + end_rel + 1..];
    }

    out.push_str(rest);
    out
}

impl ArkaiosConfig {
    /// Load `~/.arkaios/config.toml`. A missing file is `Ok(None)`.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(None),
        }
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(Some(config)),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    /// Configured key if it expands to something non-empty, else `fallback`.
    #[must_use]
    pub fn resolve_api_key(&self, fallback: ApiKey) -> ApiKey {
        self.gemini
            .as_ref()
            .and_then(|gemini| gemini.api_key.as_deref())
            .map(|raw| ApiKey::new(expand_env_vars(raw)))
            .filter(|key| !key.is_empty())
            .unwrap_or(fallback)
    }

    /// Backend settings; `fallback_key` is used when the file names no key.
    #[must_use]
    pub fn api_config(&self, fallback_key: ApiKey) -> ApiConfig {
        let gemini = self.gemini.as_ref();
        let model = gemini
            .and_then(|g| g.model.clone())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let mut config = ApiConfig::new(self.resolve_api_key(fallback_key), model)
            .with_system_prompt(
                gemini
                    .and_then(|g| g.system_prompt.clone())
                    .unwrap_or_else(|| crate::prompts::DEFAULT_SYSTEM_PROMPT.to_string()),
            );

        let Some(gemini) = gemini else {
            return config;
        };
        if let Some(temperature) = gemini.temperature {
            config = config.with_temperature(temperature);
        }
        if let Some(tokens) = gemini.max_output_tokens {
            config = config.with_max_output_tokens(tokens);
        }
        if let Some(count) = gemini.context_messages {
            config = config.with_context_messages(count);
        }
        if let Some(secs) = gemini.request_timeout_secs {
            config = config.with_request_timeout(Duration::from_secs(secs));
        }
        if let Some(base_url) = &gemini.base_url {
            config = config.with_base_url(expand_env_vars(base_url));
        }
        config
    }

    #[must_use]
    pub fn session_settings(&self) -> SessionSettings {
        let mut settings = SessionSettings::default();
        let Some(app) = &self.app else {
            return settings;
        };
        if let Some(greeting) = &app.greeting {
            settings.greeting.clone_from(greeting);
        }
        if let Some(depth) = app.max_chain_depth {
            settings.max_chain_depth = depth;
        }
        if let Some(prompt) = app.image_only_prompt.as_ref().filter(|p| !p.trim().is_empty()) {
            settings.image_only_prompt.clone_from(prompt);
        }
        settings
    }

    #[must_use]
    pub fn tool_settings(&self) -> ToolSettings {
        let mut settings = ToolSettings::default();
        if let Some(max) = self.tools.as_ref().and_then(|t| t.max_read_bytes) {
            settings.max_read_bytes = max;
        }
        settings
    }

    /// Startup workspace directory, if configured.
    #[must_use]
    pub fn workspace_path(&self) -> Option<PathBuf> {
        self.tools
            .as_ref()
            .and_then(|t| t.workspace.as_deref())
            .map(expand_env_vars)
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from)
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".arkaios").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_text: &str) -> ArkaiosConfig {
        toml::from_str(toml_text).unwrap()
    }

    // expand_env_vars tests

    #[test]
    fn expand_env_vars_no_vars() {
        assert_eq!(expand_env_vars("hello world"), "hello world");
    }

    #[test]
    fn expand_env_vars_single_var() {
        unsafe {
            std::env::set_var("ARKAIOS_TEST_CONFIG_VAR", "replaced");
        }
        let result = expand_env_vars("prefix ${ARKAIOS_TEST_CONFIG_VAR} suffix");
        assert_eq!(result, "prefix replaced suffix");
        unsafe {
            std::env::remove_var("ARKAIOS_TEST_CONFIG_VAR");
        }
    }

    #[test]
    fn expand_env_vars_missing_var_becomes_empty() {
        unsafe {
            std::env::remove_var("ARKAIOS_MISSING_VAR_FOR_TEST");
        }
        let result = expand_env_vars("before ${ARKAIOS_MISSING_VAR_FOR_TEST} after");
        assert_eq!(result, "before  after");
    }

    #[test]
    fn expand_env_vars_unclosed_brace_preserved() {
        assert_eq!(expand_env_vars("test ${UNCLOSED"), "test ${UNCLOSED");
    }

    #[test]
    fn expand_env_vars_empty_var_name_dropped() {
        assert_eq!(expand_env_vars("test ${} more"), "test  more");
    }

    #[test]
    fn expand_env_vars_multibyte_text_survives() {
        assert_eq!(expand_env_vars("héllo ${} wörld"), "héllo  wörld");
    }

    // file loading

    #[test]
    fn missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = ArkaiosConfig::load_from(&dir.path().join("config.toml")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn invalid_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[gemini\nmodel = ").unwrap();
        let err = ArkaiosConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert_eq!(err.path(), &path);
    }

    #[test]
    fn loads_all_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[app]
greeting = "hello"
max_chain_depth = 3

[gemini]
model = "gemini-2.5-pro"
temperature = 0.2
max_output_tokens = 1024
context_messages = 5
request_timeout_secs = 30
base_url = "http://127.0.0.1:8080/v1beta/"
system_prompt = "Be brief."

[tools]
max_read_bytes = 4096
workspace = "/tmp/project"
"#,
        )
        .unwrap();

        let config = ArkaiosConfig::load_from(&path).unwrap().unwrap();
        let api = config.api_config(ApiKey::new("env-key"));
        assert_eq!(api.model(), "gemini-2.5-pro");
        assert_eq!(api.api_key().expose_secret(), "env-key");
        assert!((api.temperature() - 0.2).abs() < f64::EPSILON);
        assert_eq!(api.max_output_tokens(), 1024);
        assert_eq!(api.context_messages(), 5);
        assert_eq!(api.request_timeout(), Duration::from_secs(30));
        assert_eq!(api.base_url(), "http://127.0.0.1:8080/v1beta");
        assert_eq!(api.system_prompt(), Some("Be brief."));

        let session = config.session_settings();
        assert_eq!(session.greeting, "hello");
        assert_eq!(session.max_chain_depth, 3);
        assert_eq!(session.image_only_prompt, crate::prompts::DEFAULT_IMAGE_ONLY_PROMPT);

        assert_eq!(config.tool_settings().max_read_bytes, 4096);
        assert_eq!(config.workspace_path(), Some(PathBuf::from("/tmp/project")));
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = ArkaiosConfig::default();
        let api = config.api_config(ApiKey::default());
        assert_eq!(api.model(), DEFAULT_MODEL);
        assert_eq!(api.context_messages(), 3);
        assert_eq!(api.system_prompt(), Some(crate::prompts::DEFAULT_SYSTEM_PROMPT));
        assert!(api.api_key().is_empty());
        assert_eq!(config.session_settings().max_chain_depth, 8);
        assert_eq!(config.tool_settings().max_read_bytes, 256 * 1024);
        assert!(config.workspace_path().is_none());
    }

    #[test]
    fn configured_key_expands_and_wins() {
        unsafe {
            std::env::set_var("ARKAIOS_TEST_KEY_VAR", "from-env-var");
        }
        let config = parse("[gemini]\napi_key = \"${ARKAIOS_TEST_KEY_VAR}\"\n");
        assert_eq!(
            config.resolve_api_key(ApiKey::new("fallback")).expose_secret(),
            "from-env-var"
        );
        unsafe {
            std::env::remove_var("ARKAIOS_TEST_KEY_VAR");
        }

        let unset = parse("[gemini]\napi_key = \"${ARKAIOS_TEST_UNSET_KEY}\"\n");
        assert_eq!(
            unset.resolve_api_key(ApiKey::new("fallback")).expose_secret(),
            "fallback"
        );
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = parse("[gemini]\napi_key = \"sk-very-secret\"\n");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk-very-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
