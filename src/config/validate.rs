// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile, WalkerConfig};
use crate::errors::{FlowscopeError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::FlowscopeError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_walker_config(&raw.walker)?;
        Ok(ConfigFile::new_unchecked(raw.walker))
    }
}

/// Check a `[walker]` section on its own (e.g. one built in code).
pub fn validate_walker_config(cfg: &WalkerConfig) -> Result<()> {
    ensure_non_empty(cfg)?;
    ensure_distinct_functions(cfg)?;
    Ok(())
}

fn ensure_non_empty(cfg: &WalkerConfig) -> Result<()> {
    let fields = [
        ("default_worker", &cfg.default_worker),
        ("worker_function", &cfg.worker_function),
        ("stage_function", &cfg.stage_function),
        ("stage_name_argument", &cfg.stage_name_argument),
        ("parallel_function", &cfg.parallel_function),
    ];

    for (key, value) in fields {
        if value.trim().is_empty() {
            return Err(FlowscopeError::ConfigError(format!(
                "[walker].{} must not be empty",
                key
            )));
        }
    }
    Ok(())
}

fn ensure_distinct_functions(cfg: &WalkerConfig) -> Result<()> {
    let functions = [
        &cfg.worker_function,
        &cfg.stage_function,
        &cfg.parallel_function,
    ];

    for (i, a) in functions.iter().enumerate() {
        if functions[i + 1..].contains(a) {
            return Err(FlowscopeError::ConfigError(format!(
                "function name '{}' is used for more than one block kind in [walker]",
                a
            )));
        }
    }
    Ok(())
}
