use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use reliefpath_core::config::{AppConfig, LoadOptions};
use toml::Value;

struct Field<'a> {
    key: &'a str,
    value: String,
    env_keys: &'a [&'a str],
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let heuristics = &config.heuristics;

    let fields = [
        Field {
            key: "database.url",
            value: config.database.url.clone(),
            env_keys: &["RELIEFPATH_DATABASE_URL"],
        },
        Field {
            key: "database.max_connections",
            value: config.database.max_connections.to_string(),
            env_keys: &["RELIEFPATH_DATABASE_MAX_CONNECTIONS"],
        },
        Field {
            key: "database.timeout_secs",
            value: config.database.timeout_secs.to_string(),
            env_keys: &["RELIEFPATH_DATABASE_TIMEOUT_SECS"],
        },
        Field {
            key: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["RELIEFPATH_LOGGING_LEVEL", "RELIEFPATH_LOG_LEVEL"],
        },
        Field {
            key: "logging.format",
            value: format!("{:?}", config.logging.format),
            env_keys: &["RELIEFPATH_LOGGING_FORMAT", "RELIEFPATH_LOG_FORMAT"],
        },
        Field {
            key: "heuristics.standard_monthly_allowance",
            value: heuristics.standard_monthly_allowance.to_string(),
            env_keys: &["RELIEFPATH_HEURISTICS_STANDARD_MONTHLY_ALLOWANCE"],
        },
        Field {
            key: "heuristics.collection_horizon_months",
            value: heuristics.collection_horizon_months.to_string(),
            env_keys: &["RELIEFPATH_HEURISTICS_COLLECTION_HORIZON_MONTHS"],
        },
        Field {
            key: "heuristics.quick_sale_factor",
            value: heuristics.quick_sale_factor.to_string(),
            env_keys: &["RELIEFPATH_HEURISTICS_QUICK_SALE_FACTOR"],
        },
        Field {
            key: "heuristics.retirement_factor",
            value: heuristics.retirement_factor.to_string(),
            env_keys: &[],
        },
        Field {
            key: "heuristics.hardship_liquid_ceiling",
            value: heuristics.hardship_liquid_ceiling.to_string(),
            env_keys: &["RELIEFPATH_HEURISTICS_HARDSHIP_LIQUID_CEILING"],
        },
        Field {
            key: "heuristics.streamlined_installment_ceiling",
            value: heuristics.streamlined_installment_ceiling.to_string(),
            env_keys: &[],
        },
        Field {
            key: "heuristics.max_installment_term_months",
            value: heuristics.max_installment_term_months.to_string(),
            env_keys: &[],
        },
        Field {
            key: "heuristics.installment_annual_rate_pct",
            value: heuristics.installment_annual_rate_pct.to_string(),
            env_keys: &[],
        },
        Field {
            key: "heuristics.settlement_minimum_debt",
            value: heuristics.settlement_minimum_debt.to_string(),
            env_keys: &[],
        },
        Field {
            key: "heuristics.high_threshold",
            value: heuristics.thresholds.high.to_string(),
            env_keys: &["RELIEFPATH_HEURISTICS_HIGH_THRESHOLD"],
        },
        Field {
            key: "heuristics.medium_threshold",
            value: heuristics.thresholds.medium.to_string(),
            env_keys: &["RELIEFPATH_HEURISTICS_MEDIUM_THRESHOLD"],
        },
        Field {
            key: "submission.outbox_dir",
            value: config.submission.outbox_dir.display().to_string(),
            env_keys: &["RELIEFPATH_SUBMISSION_OUTBOX_DIR"],
        },
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in &fields {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    ["reliefpath.toml", "config/reliefpath.toml"].into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
