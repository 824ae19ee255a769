// src/config/model.rs

use serde::Deserialize;

/// Label used for steps allocated to the controller's own executor, i.e. a
/// worker block whose recorded worker name is missing or empty.
pub const BUILT_IN_WORKER: &str = "(built-in)";

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [walker]
/// default_worker = "(built-in)"
/// worker_function = "node"
/// stage_function = "stage"
/// stage_name_argument = "name"
/// parallel_function = "parallel"
/// ```
///
/// Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub walker: WalkerConfig,
}

/// Validated configuration. Only constructible through
/// `ConfigFile::try_from(RawConfigFile)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub walker: WalkerConfig,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(walker: WalkerConfig) -> Self {
        Self { walker }
    }
}

/// `[walker]` section: the names the graph producer uses for the blocks the
/// walker attributes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WalkerConfig {
    /// Substituted when a worker block carries no (or an empty) worker name.
    #[serde(default = "default_default_worker")]
    pub default_worker: String,

    /// Function name of the block-start that allocates a worker.
    #[serde(default = "default_worker_function")]
    pub worker_function: String,

    /// Function name of the block-start that opens a named stage.
    #[serde(default = "default_stage_function")]
    pub stage_function: String,

    /// Argument key holding a stage's display name.
    #[serde(default = "default_stage_name_argument")]
    pub stage_name_argument: String,

    /// Function name of parallel fork and branch block-starts.
    #[serde(default = "default_parallel_function")]
    pub parallel_function: String,
}

fn default_default_worker() -> String {
    BUILT_IN_WORKER.to_string()
}

fn default_worker_function() -> String {
    "node".to_string()
}

fn default_stage_function() -> String {
    "stage".to_string()
}

fn default_stage_name_argument() -> String {
    "name".to_string()
}

fn default_parallel_function() -> String {
    "parallel".to_string()
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            default_worker: default_default_worker(),
            worker_function: default_worker_function(),
            stage_function: default_stage_function(),
            stage_name_argument: default_stage_name_argument(),
            parallel_function: default_parallel_function(),
        }
    }
}
