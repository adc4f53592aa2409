use crate::assessment::ScoringPolicy;
use crate::model::TrainingOptions;
use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub model: ModelConfig,
    pub training: TrainingOptions,
    pub training_limits: TrainingLimits,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_format = match env::var("APP_LOG_FORMAT") {
            Ok(raw) => LogFormat::parse(&raw).ok_or(ConfigError::InvalidValue {
                var: "APP_LOG_FORMAT",
                value: raw,
            })?,
            Err(_) => LogFormat::Compact,
        };

        let bundle_path = env::var("APP_MODEL_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_MODEL_PATH));
        let policy = match env::var("APP_SCORING_POLICY") {
            Ok(raw) => ScoringPolicy::parse(&raw).ok_or(ConfigError::InvalidValue {
                var: "APP_SCORING_POLICY",
                value: raw,
            })?,
            Err(_) => ScoringPolicy::default(),
        };

        let defaults = TrainingOptions::default();
        let training = TrainingOptions {
            samples: parse_var("APP_TRAINING_SAMPLES", defaults.samples)?,
            seed: parse_var("APP_TRAINING_SEED", defaults.seed)?,
            folds: parse_var("APP_CV_FOLDS", defaults.folds)?,
            ..defaults
        };
        let limits = TrainingLimits::default();
        let training_limits = TrainingLimits {
            max_samples: parse_var("APP_TRAINING_MAX_SAMPLES", limits.max_samples)?,
            max_folds: parse_var("APP_CV_MAX_FOLDS", limits.max_folds)?,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                format: log_format,
            },
            model: ModelConfig {
                bundle_path,
                policy,
            },
            training,
            training_limits,
        })
    }
}

const DEFAULT_MODEL_PATH: &str = "biosecurity_model.bin";

fn parse_var<T: std::str::FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue { var, value: raw }),
        Err(_) => Ok(default),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" | "text" => Some(Self::Compact),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Where the serving bundle lives and how scoring treats its absence.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub bundle_path: PathBuf,
    pub policy: ScoringPolicy,
}

/// Upper bounds on retraining requests that arrive over HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainingLimits {
    pub max_samples: usize,
    pub max_folds: usize,
}

impl Default for TrainingLimits {
    fn default() -> Self {
        Self {
            max_samples: 20_000,
            max_folds: 10,
        }
    }
}

impl TrainingLimits {
    /// Describes the first bound `options` exceeds.
    pub fn check(&self, options: &TrainingOptions) -> Result<(), String> {
        if options.samples > self.max_samples {
            return Err(format!(
                "samples must be at most {}, got {}",
                self.max_samples, options.samples
            ));
        }
        if options.folds > self.max_folds {
            return Err(format!(
                "folds must be at most {}, got {}",
                self.max_folds, options.folds
            ));
        }
        Ok(())
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidValue { var: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidValue { var, value } => {
                write!(f, "{var} has an unsupported value '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidValue { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for var in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "APP_LOG_FORMAT",
            "APP_MODEL_PATH",
            "APP_SCORING_POLICY",
            "APP_TRAINING_SAMPLES",
            "APP_TRAINING_SEED",
            "APP_CV_FOLDS",
            "APP_TRAINING_MAX_SAMPLES",
            "APP_CV_MAX_FOLDS",
        ] {
            env::remove_var(var);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.telemetry.format, LogFormat::Compact);
        assert_eq!(config.model.bundle_path, PathBuf::from(DEFAULT_MODEL_PATH));
        assert_eq!(config.model.policy, ScoringPolicy::ModelWithRuleFallback);
        assert_eq!(config.training.samples, 2000);
        assert_eq!(config.training.seed, 42);
        assert_eq!(config.training.folds, 5);
        assert_eq!(config.training_limits, TrainingLimits::default());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn reads_model_and_training_overrides() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_MODEL_PATH", "/tmp/bundle.bin");
        env::set_var("APP_SCORING_POLICY", "rules_only");
        env::set_var("APP_TRAINING_SAMPLES", "500");
        env::set_var("APP_CV_FOLDS", "3");
        env::set_var("APP_LOG_FORMAT", "json");

        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.model.bundle_path, PathBuf::from("/tmp/bundle.bin"));
        assert_eq!(config.model.policy, ScoringPolicy::RulesOnly);
        assert_eq!(config.training.samples, 500);
        assert_eq!(config.training.folds, 3);
        assert_eq!(config.telemetry.format, LogFormat::Json);
        reset_env();
    }

    #[test]
    fn rejects_unparseable_sample_count() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_TRAINING_SAMPLES", "plenty");

        let err = AppConfig::load().expect_err("invalid count rejected");
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                var: "APP_TRAINING_SAMPLES",
                ..
            }
        ));
        assert!(err.to_string().contains("plenty"));
        reset_env();
    }

    #[test]
    fn training_limits_bound_requests() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_TRAINING_MAX_SAMPLES", "5000");
        env::set_var("APP_CV_MAX_FOLDS", "6");

        let limits = AppConfig::load().expect("config loads").training_limits;
        assert_eq!(limits.max_samples, 5000);
        assert_eq!(limits.max_folds, 6);

        let within = TrainingOptions {
            samples: 5000,
            folds: 6,
            ..TrainingOptions::default()
        };
        assert_eq!(limits.check(&within), Ok(()));
        let too_many = TrainingOptions {
            samples: 5001,
            ..within.clone()
        };
        assert!(limits
            .check(&too_many)
            .expect_err("over the sample cap")
            .contains("5000"));
        let too_many_folds = TrainingOptions { folds: 7, ..within };
        assert!(limits.check(&too_many_folds).is_err());
        reset_env();
    }
}
