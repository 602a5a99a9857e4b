//! Explicit registry of filter constructors.
//!
//! Filters are registered by name at startup. The content filter stage asks
//! the registry for the filters the configuration requires and receives them
//! in registration order.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};

use super::ContentFilter;
use super::ignore::ContentIgnore;

/// Built-in ignore-rules filter; always required.
pub const CONTENT_IGNORE: &str = "content-ignore";
/// Sensitive-word filter; required when `check-sensitive-words` is set.
pub const BAN_WORD_FILTER: &str = "ban-word-filter";
/// External moderation filter; required when `external-moderation` is set.
pub const BAIDU_CLOUD_EXAMINE: &str = "baidu-cloud-examine";

/// Builds a filter from the pipeline configuration.
pub type FilterFactory = Arc<dyn Fn(&PipelineConfig) -> Box<dyn ContentFilter> + Send + Sync>;

/// Ordered collection of named filter constructors.
#[derive(Clone, Default)]
pub struct FilterRegistry {
    entries: Vec<(String, FilterFactory)>,
}

impl FilterRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Creates a registry with the built-in filters registered.
    pub fn with_builtin() -> Self {
        Self::new().with(CONTENT_IGNORE, |config: &PipelineConfig| {
            Box::new(ContentIgnore::new(config.trigger.ignore_rules.clone()))
                as Box<dyn ContentFilter>
        })
    }

    /// Registers a constructor under `name`.
    ///
    /// Re-registering a name replaces the constructor and keeps its position.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&PipelineConfig) -> Box<dyn ContentFilter> + Send + Sync + 'static,
    {
        let name = name.into();
        let factory: FilterFactory = Arc::new(factory);
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = factory,
            None => self.entries.push((name, factory)),
        }
    }

    /// Registers a constructor (builder pattern).
    pub fn with<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&PipelineConfig) -> Box<dyn ContentFilter> + Send + Sync + 'static,
    {
        self.register(name, factory);
        self
    }

    /// Returns true if a constructor is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    /// Names of the filters `config` requires.
    pub fn required_filters(config: &PipelineConfig) -> Vec<&'static str> {
        let content_filter = &config.safety.content_filter;
        let mut required = vec![CONTENT_IGNORE];
        if content_filter.check_sensitive_words {
            required.push(BAN_WORD_FILTER);
        }
        if content_filter.external_moderation {
            required.push(BAIDU_CLOUD_EXAMINE);
        }
        required
    }

    /// Instantiates the required filters in registration order.
    ///
    /// Fails with [`PipelineError::FilterNotRegistered`] if a required name
    /// has no constructor.
    pub fn build(&self, config: &PipelineConfig) -> PipelineResult<Vec<Box<dyn ContentFilter>>> {
        let required = Self::required_filters(config);

        if let Some(missing) = required.iter().find(|name| !self.contains(name)) {
            return Err(PipelineError::FilterNotRegistered((*missing).to_string()));
        }

        let filters: Vec<Box<dyn ContentFilter>> = self
            .entries
            .iter()
            .filter(|(name, _)| required.iter().any(|r| *r == name.as_str()))
            .map(|(_, factory)| factory(config))
            .collect();

        debug!(
            filters = ?filters.iter().map(|f| f.name().to_string()).collect::<Vec<_>>(),
            "Content filter chain assembled"
        );
        Ok(filters)
    }
}

impl fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterRegistry")
            .field("names", &self.names().collect::<Vec<_>>())
            .finish()
    }
}
