use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::eligibility::heuristics::Heuristics;

#[derive(Clone, Debug, Serialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub heuristics: Heuristics,
    pub submission: SubmissionConfig,
}

#[derive(Clone, Debug, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Debug, Serialize)]
pub struct SubmissionConfig {
    /// Directory where frozen submission payloads are written as JSON files.
    pub outbox_dir: PathBuf,
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
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub outbox_dir: Option<PathBuf>,
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
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://reliefpath.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
            heuristics: Heuristics::default(),
            submission: SubmissionConfig { outbox_dir: PathBuf::from("outbox") },
        }
    }
}

impl FromStr for LogFormat {
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
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from("reliefpath.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
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

        if let Some(heuristics) = patch.heuristics {
            heuristics.apply_to(&mut self.heuristics);
        }

        if let Some(submission) = patch.submission {
            if let Some(outbox_dir) = submission.outbox_dir {
                self.submission.outbox_dir = outbox_dir;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("RELIEFPATH_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("RELIEFPATH_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_env("RELIEFPATH_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("RELIEFPATH_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_env("RELIEFPATH_DATABASE_TIMEOUT_SECS", &value)?;
        }

        let log_level =
            read_env("RELIEFPATH_LOGGING_LEVEL").or_else(|| read_env("RELIEFPATH_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("RELIEFPATH_LOGGING_FORMAT").or_else(|| read_env("RELIEFPATH_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        let heuristics = &mut self.heuristics;
        if let Some(value) = read_env("RELIEFPATH_HEURISTICS_STANDARD_MONTHLY_ALLOWANCE") {
            heuristics.standard_monthly_allowance =
                parse_env("RELIEFPATH_HEURISTICS_STANDARD_MONTHLY_ALLOWANCE", &value)?;
        }
        if let Some(value) = read_env("RELIEFPATH_HEURISTICS_COLLECTION_HORIZON_MONTHS") {
            heuristics.collection_horizon_months =
                parse_env("RELIEFPATH_HEURISTICS_COLLECTION_HORIZON_MONTHS", &value)?;
        }
        if let Some(value) = read_env("RELIEFPATH_HEURISTICS_QUICK_SALE_FACTOR") {
            heuristics.quick_sale_factor =
                parse_env::<Decimal>("RELIEFPATH_HEURISTICS_QUICK_SALE_FACTOR", &value)?;
        }
        if let Some(value) = read_env("RELIEFPATH_HEURISTICS_HARDSHIP_LIQUID_CEILING") {
            heuristics.hardship_liquid_ceiling =
                parse_env("RELIEFPATH_HEURISTICS_HARDSHIP_LIQUID_CEILING", &value)?;
        }
        if let Some(value) = read_env("RELIEFPATH_HEURISTICS_HIGH_THRESHOLD") {
            heuristics.thresholds.high = parse_env("RELIEFPATH_HEURISTICS_HIGH_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("RELIEFPATH_HEURISTICS_MEDIUM_THRESHOLD") {
            heuristics.thresholds.medium =
                parse_env("RELIEFPATH_HEURISTICS_MEDIUM_THRESHOLD", &value)?;
        }

        if let Some(value) = read_env("RELIEFPATH_SUBMISSION_OUTBOX_DIR") {
            self.submission.outbox_dir = PathBuf::from(value);
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(outbox_dir) = overrides.outbox_dir {
            self.submission.outbox_dir = outbox_dir;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_logging(&self.logging)?;
        self.heuristics.validate().map_err(ConfigError::Validation)?;
        validate_submission(&self.submission)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("reliefpath.toml"), PathBuf::from("config/reliefpath.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn validate_submission(submission: &SubmissionConfig) -> Result<(), ConfigError> {
    if submission.outbox_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "submission.outbox_dir must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    logging: Option<LoggingPatch>,
    heuristics: Option<HeuristicsPatch>,
    submission: Option<SubmissionPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[derive(Debug, Default, Deserialize)]
struct SubmissionPatch {
    outbox_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct HeuristicsPatch {
    standard_monthly_allowance: Option<Decimal>,
    collection_horizon_months: Option<u32>,
    quick_sale_factor: Option<Decimal>,
    retirement_factor: Option<Decimal>,
    hardship_liquid_ceiling: Option<Decimal>,
    streamlined_installment_ceiling: Option<Decimal>,
    max_installment_term_months: Option<u32>,
    installment_annual_rate_pct: Option<Decimal>,
    settlement_minimum_debt: Option<Decimal>,
    high_threshold: Option<f64>,
    medium_threshold: Option<f64>,
}

impl HeuristicsPatch {
    fn apply_to(self, heuristics: &mut Heuristics) {
        if let Some(value) = self.standard_monthly_allowance {
            heuristics.standard_monthly_allowance = value;
        }
        if let Some(value) = self.collection_horizon_months {
            heuristics.collection_horizon_months = value;
        }
        if let Some(value) = self.quick_sale_factor {
            heuristics.quick_sale_factor = value;
        }
        if let Some(value) = self.retirement_factor {
            heuristics.retirement_factor = value;
        }
        if let Some(value) = self.hardship_liquid_ceiling {
            heuristics.hardship_liquid_ceiling = value;
        }
        if let Some(value) = self.streamlined_installment_ceiling {
            heuristics.streamlined_installment_ceiling = value;
        }
        if let Some(value) = self.max_installment_term_months {
            heuristics.max_installment_term_months = value;
        }
        if let Some(value) = self.installment_annual_rate_pct {
            heuristics.installment_annual_rate_pct = value;
        }
        if let Some(value) = self.settlement_minimum_debt {
            heuristics.settlement_minimum_debt = value;
        }
        if let Some(value) = self.high_threshold {
            heuristics.thresholds.high = value;
        }
        if let Some(value) = self.medium_threshold {
            heuristics.thresholds.medium = value;
        }
    }
}
