use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub registry: RegistryConfig,
    pub negotiation: NegotiationConfig,
    pub loads: LoadsConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// Shared secret expected in `x-api-key`. Absent means the server is
    /// misconfigured; authenticated routes refuse to serve.
    pub api_key: Option<SecretString>,
}

#[derive(Clone, Debug)]
pub struct RegistryConfig {
    pub mode: VerificationMode,
    pub web_key: Option<SecretString>,
    pub base_url: String,
    pub timeout_secs: u64,
    pub cache_ttl_secs: u64,
}

#[derive(Clone, Debug)]
pub struct NegotiationConfig {
    pub policy: PolicyKind,
    pub max_rounds: u32,
    pub min_accept_pct: Decimal,
    pub max_over_pct: Decimal,
    pub state_ttl_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoadsConfig {
    pub file: PathBuf,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationMode {
    Strict,
    Auto,
    Simulated,
}

impl fmt::Display for VerificationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Strict => "strict",
            Self::Auto => "auto",
            Self::Simulated => "simulated",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    PercentageFloor,
    Ceiling,
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PercentageFloor => "percentage_floor",
            Self::Ceiling => "ceiling",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub api_key: Option<String>,
    pub registry_mode: Option<VerificationMode>,
    pub registry_web_key: Option<String>,
    pub loads_file: Option<PathBuf>,
    pub negotiation_policy: Option<PolicyKind>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig { bind_address: "127.0.0.1".to_string(), port: 8000 },
            auth: AuthConfig { api_key: None },
            registry: RegistryConfig {
                mode: VerificationMode::Auto,
                web_key: None,
                base_url: "https://mobile.fmcsa.dot.gov/qc/services/".to_string(),
                timeout_secs: 8,
                cache_ttl_secs: 24 * 3600,
            },
            negotiation: NegotiationConfig {
                policy: PolicyKind::PercentageFloor,
                max_rounds: 3,
                min_accept_pct: Decimal::new(85, 2),
                max_over_pct: Decimal::new(10, 2),
                state_ttl_secs: 24 * 3600,
            },
            loads: LoadsConfig { file: PathBuf::from("./data/loads.json") },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for VerificationMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "auto" => Ok(Self::Auto),
            "simulated" => Ok(Self::Simulated),
            other => Err(ConfigError::Validation(format!(
                "unsupported verification mode `{other}` (expected strict|auto|simulated)"
            ))),
        }
    }
}

impl std::str::FromStr for PolicyKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "percentage_floor" => Ok(Self::PercentageFloor),
            "ceiling" => Ok(Self::Ceiling),
            other => Err(ConfigError::Validation(format!(
                "unsupported negotiation policy `{other}` (expected percentage_floor|ceiling)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("loadline.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides)?;
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
        }

        if let Some(auth) = patch.auth {
            if let Some(api_key_value) = auth.api_key {
                self.auth.api_key = Some(api_key_value.into());
            }
        }

        if let Some(registry) = patch.registry {
            if let Some(mode) = registry.mode {
                self.registry.mode = mode;
            }
            if let Some(web_key_value) = registry.web_key {
                self.registry.web_key = Some(web_key_value.into());
            }
            if let Some(base_url) = registry.base_url {
                self.registry.base_url = base_url;
            }
            if let Some(timeout_secs) = registry.timeout_secs {
                self.registry.timeout_secs = timeout_secs;
            }
            if let Some(cache_ttl_secs) = registry.cache_ttl_secs {
                self.registry.cache_ttl_secs = cache_ttl_secs;
            }
        }

        if let Some(negotiation) = patch.negotiation {
            if let Some(policy) = negotiation.policy {
                self.negotiation.policy = policy;
            }
            if let Some(max_rounds) = negotiation.max_rounds {
                self.negotiation.max_rounds = max_rounds;
            }
            if let Some(min_accept_pct) = negotiation.min_accept_pct {
                self.negotiation.min_accept_pct = min_accept_pct;
            }
            if let Some(max_over_pct) = negotiation.max_over_pct {
                self.negotiation.max_over_pct = max_over_pct;
            }
            if let Some(state_ttl_secs) = negotiation.state_ttl_secs {
                self.negotiation.state_ttl_secs = state_ttl_secs;
            }
        }

        if let Some(loads) = patch.loads {
            if let Some(file) = loads.file {
                self.loads.file = file;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("LOADLINE_API_KEY") {
            self.auth.api_key = Some(value.into());
        }
        if let Some(value) = read_env("LOADLINE_REGISTRY_MODE") {
            self.registry.mode = value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
                key: "LOADLINE_REGISTRY_MODE".to_string(),
                value,
            })?;
        }
        if let Some(value) = read_env("LOADLINE_REGISTRY_WEBKEY") {
            self.registry.web_key = Some(value.into());
        }
        if let Some(value) = read_env("LOADLINE_LOADS_FILE") {
            self.loads.file = PathBuf::from(value);
        }
        if let Some(value) = read_env("LOADLINE_NEGOTIATION_POLICY") {
            self.negotiation.policy =
                value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
                    key: "LOADLINE_NEGOTIATION_POLICY".to_string(),
                    value,
                })?;
        }
        if let Some(value) = read_env("LOADLINE_MIN_ACCEPT_PCT") {
            self.negotiation.min_accept_pct =
                value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
                    key: "LOADLINE_MIN_ACCEPT_PCT".to_string(),
                    value,
                })?;
        }
        if let Some(value) = read_env("LOADLINE_LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = read_env("LOADLINE_LOG_FORMAT") {
            self.logging.format = value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
                key: "LOADLINE_LOG_FORMAT".to_string(),
                value,
            })?;
        }
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) -> Result<(), ConfigError> {
        if let Some(api_key_value) = overrides.api_key {
            self.auth.api_key = Some(api_key_value.into());
        }
        if let Some(mode) = overrides.registry_mode {
            self.registry.mode = mode;
        }
        if let Some(web_key_value) = overrides.registry_web_key {
            self.registry.web_key = Some(web_key_value.into());
        }
        if let Some(file) = overrides.loads_file {
            self.loads.file = file;
        }
        if let Some(policy) = overrides.negotiation_policy {
            self.negotiation.policy = policy;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("server.port must be non-zero".to_string()));
        }
        if self.negotiation.max_rounds == 0 {
            return Err(ConfigError::Validation(
                "negotiation.max_rounds must be at least 1".to_string(),
            ));
        }
        let pct = self.negotiation.min_accept_pct;
        if pct <= Decimal::ZERO || pct > Decimal::ONE {
            return Err(ConfigError::Validation(format!(
                "negotiation.min_accept_pct must be within (0, 1], got {pct}"
            )));
        }
        if self.negotiation.max_over_pct < Decimal::ZERO {
            return Err(ConfigError::Validation(format!(
                "negotiation.max_over_pct must be non-negative, got {}",
                self.negotiation.max_over_pct
            )));
        }
        if self.registry.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "registry.timeout_secs must be non-zero".to_string(),
            ));
        }
        // Strict mode refuses to synthesize, so it is unusable without a key.
        if self.registry.mode == VerificationMode::Strict && self.registry.web_key.is_none() {
            return Err(ConfigError::Validation(
                "registry.mode = strict requires registry.web_key".to_string(),
            ));
        }
        Ok(())
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn resolve_config_path(requested: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = requested {
        return path.exists().then(|| path.to_path_buf());
    }
    let default = PathBuf::from("loadline.toml");
    default.exists().then_some(default)
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    toml::from_str(&raw)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    server: Option<ServerPatch>,
    auth: Option<AuthPatch>,
    registry: Option<RegistryPatch>,
    negotiation: Option<NegotiationPatch>,
    loads: Option<LoadsPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct AuthPatch {
    api_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RegistryPatch {
    mode: Option<VerificationMode>,
    web_key: Option<String>,
    base_url: Option<String>,
    timeout_secs: Option<u64>,
    cache_ttl_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct NegotiationPatch {
    policy: Option<PolicyKind>,
    max_rounds: Option<u32>,
    min_accept_pct: Option<Decimal>,
    max_over_pct: Option<Decimal>,
    state_ttl_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoadsPatch {
    file: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};

    use rust_decimal::Decimal;
    use secrecy::ExposeSecret;

    use super::{
        AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat, PolicyKind,
        VerificationMode,
    };

    // Environment variables are process-global, so every test that calls
    // AppConfig::load holds this lock.
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        match ENV_LOCK.get_or_init(|| Mutex::new(())).lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    #[test]
    fn defaults_are_valid_and_simulation_friendly() {
        let _guard = env_lock();
        let config = AppConfig::load(LoadOptions::default()).expect("defaults load");
        assert_eq!(config.negotiation.max_rounds, 3);
        assert_eq!(config.negotiation.min_accept_pct, Decimal::new(85, 2));
        assert_eq!(config.registry.mode, VerificationMode::Auto);
        assert!(config.auth.api_key.is_none());
    }

    #[test]
    fn toml_file_patches_defaults() {
        let _guard = env_lock();
        let mut file = tempfile::NamedTempFile::new().expect("temp config");
        write!(
            file,
            r#"
            [auth]
            api_key = "secret-key"

            [registry]
            mode = "strict"
            web_key = "fmcsa-web-key"
            timeout_secs = 10

            [negotiation]
            policy = "ceiling"
            max_over_pct = 0.15
            "#
        )
        .expect("write config");

        let config = AppConfig::load(LoadOptions {
            config_path: Some(file.path().to_path_buf()),
            require_file: true,
            ..LoadOptions::default()
        })
        .expect("config loads");

        assert_eq!(
            config.auth.api_key.as_ref().map(|key| key.expose_secret().to_string()),
            Some("secret-key".to_string())
        );
        assert_eq!(config.registry.mode, VerificationMode::Strict);
        assert_eq!(config.registry.timeout_secs, 10);
        assert_eq!(config.negotiation.policy, PolicyKind::Ceiling);
        assert_eq!(config.negotiation.max_over_pct, Decimal::new(15, 2));
    }

    #[test]
    fn missing_required_file_is_an_error() {
        let _guard = env_lock();
        let result = AppConfig::load(LoadOptions {
            config_path: Some(PathBuf::from("/nonexistent/loadline.toml")),
            require_file: true,
            ..LoadOptions::default()
        });
        assert!(matches!(result, Err(ConfigError::MissingConfigFile(_))));
    }

    #[test]
    fn environment_overrides_patch_logging_and_secrets() {
        let _guard = env_lock();
        env::set_var("LOADLINE_API_KEY", "key-from-env");
        env::set_var("LOADLINE_LOG_LEVEL", "warn");
        env::set_var("LOADLINE_LOG_FORMAT", "pretty");

        let result = AppConfig::load(LoadOptions::default());
        clear_vars(&["LOADLINE_API_KEY", "LOADLINE_LOG_LEVEL", "LOADLINE_LOG_FORMAT"]);

        let config = result.expect("env overrides apply");
        assert_eq!(
            config.auth.api_key.as_ref().map(|key| key.expose_secret().to_string()),
            Some("key-from-env".to_string())
        );
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn unparseable_environment_values_are_rejected() {
        let _guard = env_lock();
        env::set_var("LOADLINE_LOG_FORMAT", "yaml");

        let result = AppConfig::load(LoadOptions::default());
        clear_vars(&["LOADLINE_LOG_FORMAT"]);

        assert!(matches!(result, Err(ConfigError::InvalidEnvOverride { .. })));
    }

    #[test]
    fn programmatic_overrides_win_over_defaults() {
        let _guard = env_lock();
        let config = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                api_key: Some("test-key".to_string()),
                registry_mode: Some(VerificationMode::Simulated),
                negotiation_policy: Some(PolicyKind::Ceiling),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .expect("overrides apply");

        assert_eq!(config.registry.mode, VerificationMode::Simulated);
        assert_eq!(config.negotiation.policy, PolicyKind::Ceiling);
    }

    #[test]
    fn mode_and_policy_parsers_reject_unknown_values() {
        assert!("somewhat-strict".parse::<VerificationMode>().is_err());
        assert!("midpoint".parse::<PolicyKind>().is_err());
        assert!("auto".parse::<VerificationMode>().is_ok());
        assert!("percentage_floor".parse::<PolicyKind>().is_ok());
    }

    #[test]
    fn strict_mode_without_a_web_key_fails_validation() {
        let _guard = env_lock();
        let result = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                registry_mode: Some(VerificationMode::Strict),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        });
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn out_of_range_acceptance_percentage_fails_validation() {
        let _guard = env_lock();
        let mut file = tempfile::NamedTempFile::new().expect("temp config");
        write!(
            file,
            r#"
            [negotiation]
            min_accept_pct = 1.5
            "#
        )
        .expect("write config");

        let result = AppConfig::load(LoadOptions {
            config_path: Some(file.path().to_path_buf()),
            require_file: true,
            ..LoadOptions::default()
        });
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }
}
