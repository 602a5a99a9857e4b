//! Pipeline configuration.
//!
//! Keys use kebab-case so that a `[pipeline]` table in the config file reads
//! like `safety.content-filter.check-sensitive-words = true`.

use serde::{Deserialize, Serialize};

/// Which direction of traffic the content filters inspect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterScope {
    /// Inbound messages only.
    InputMsg,
    /// Outbound replies only.
    OutputMsg,
    /// Inbound messages only (legacy name).
    IncomeMsg,
    /// Both directions.
    #[default]
    All,
}

impl FilterScope {
    /// Returns true if inbound messages are filtered.
    pub fn filters_input(self) -> bool {
        !matches!(self, FilterScope::OutputMsg)
    }

    /// Returns true if outbound replies are filtered.
    pub fn filters_output(self) -> bool {
        !matches!(self, FilterScope::InputMsg | FilterScope::IncomeMsg)
    }
}

/// Root of the pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PipelineConfig {
    pub safety: SafetyConfig,
    pub trigger: TriggerConfig,
    pub command: CommandConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SafetyConfig {
    pub content_filter: ContentFilterConfig,
}

/// Content filter selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ContentFilterConfig {
    pub scope: FilterScope,
    /// Enables the `ban-word-filter`.
    pub check_sensitive_words: bool,
    /// Enables the `baidu-cloud-examine` filter.
    pub external_moderation: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TriggerConfig {
    pub ignore_rules: IgnoreRules,
}

/// Messages matching any of these rules are dropped before processing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IgnoreRules {
    pub prefix: Vec<String>,
    pub regexp: Vec<String>,
}

/// Command routing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    /// Prefixes that mark a message as a command, tested in order.
    pub prefix: Vec<String>,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            prefix: vec!["!".to_string(), "！".to_string()],
        }
    }
}
