//! The built-in `content-ignore` filter.

use async_trait::async_trait;
use regex::Regex;

use crate::config::{IgnoreRules, PipelineConfig};
use crate::error::BoxError;
use crate::query::Query;

use super::{ContentFilter, EnableStage, FilterResult};
use super::registry::CONTENT_IGNORE;

/// Silently drops inbound messages matching the configured ignore rules.
///
/// A match blocks with an empty user notice, so nothing is sent back.
#[derive(Debug)]
pub struct ContentIgnore {
    rules: IgnoreRules,
    patterns: Vec<Regex>,
}

impl ContentIgnore {
    pub fn new(rules: IgnoreRules) -> Self {
        Self {
            rules,
            patterns: Vec::new(),
        }
    }
}

#[async_trait]
impl ContentFilter for ContentIgnore {
    fn name(&self) -> &str {
        CONTENT_IGNORE
    }

    fn enable_stages(&self) -> &[EnableStage] {
        &[EnableStage::Pre]
    }

    async fn initialize(&mut self, _config: &PipelineConfig) -> Result<(), BoxError> {
        self.patterns = self
            .rules
            .regexp
            .iter()
            .map(|pattern| Regex::new(pattern))
            .collect::<Result<_, _>>()?;
        Ok(())
    }

    async fn process(&self, _query: &Query, message: &str) -> Result<FilterResult, BoxError> {
        if let Some(prefix) = self
            .rules
            .prefix
            .iter()
            .find(|p| !p.is_empty() && message.starts_with(p.as_str()))
        {
            return Ok(FilterResult::block(
                "",
                format!("ignored by prefix rule '{prefix}'"),
            ));
        }

        if let Some(pattern) = self.patterns.iter().find(|re| re.is_match(message)) {
            return Ok(FilterResult::block(
                "",
                format!("ignored by regexp rule '{}'", pattern.as_str()),
            ));
        }

        Ok(FilterResult::pass(message))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::filter::ResultLevel;
    use crate::query::SessionInfo;
    use chatflow_message::MessageChain;
    use std::sync::Arc;

    fn query() -> Query {
        Query::new(
            1,
            SessionInfo::person("u"),
            MessageChain::new(),
            Arc::new(PipelineConfig::default()),
        )
    }

    async fn filter(prefix: &[&str], regexp: &[&str]) -> ContentIgnore {
        let mut filter = ContentIgnore::new(IgnoreRules {
            prefix: prefix.iter().map(|s| s.to_string()).collect(),
            regexp: regexp.iter().map(|s| s.to_string()).collect(),
        });
        filter.initialize(&PipelineConfig::default()).await.unwrap();
        filter
    }

    #[tokio::test]
    async fn test_prefix_rule_blocks_silently() {
        let filter = filter(&["#"], &[]).await;
        let result = filter.process(&query(), "#note").await.unwrap();
        assert_eq!(result.level, ResultLevel::Block);
        assert_eq!(result.user_notice.as_deref(), Some(""));
        assert!(result.console_notice.unwrap().contains("prefix"));
    }

    #[tokio::test]
    async fn test_regexp_rule_blocks() {
        let filter = filter(&[], &["^ping$"]).await;
        let result = filter.process(&query(), "ping").await.unwrap();
        assert_eq!(result.level, ResultLevel::Block);
        assert!(result.console_notice.unwrap().contains("^ping$"));
    }

    #[tokio::test]
    async fn test_other_messages_pass_unchanged() {
        let filter = filter(&["#"], &["^ping$"]).await;
        let result = filter.process(&query(), "ping pong").await.unwrap();
        assert_eq!(result, FilterResult::pass("ping pong"));
    }

    #[tokio::test]
    async fn test_empty_prefix_matches_nothing() {
        let filter = filter(&["", "#"], &[]).await;
        let result = filter.process(&query(), "hello").await.unwrap();
        assert_eq!(result, FilterResult::pass("hello"));

        let result = filter.process(&query(), "#note").await.unwrap();
        assert_eq!(result.level, ResultLevel::Block);
        assert!(result.console_notice.unwrap().contains("'#'"));
    }

    #[tokio::test]
    async fn test_invalid_regexp_fails_initialization() {
        let mut filter = ContentIgnore::new(IgnoreRules {
            prefix: Vec::new(),
            regexp: vec!["(unclosed".to_string()],
        });
        assert!(filter.initialize(&PipelineConfig::default()).await.is_err());
    }

    #[test]
    fn test_pre_stage_only() {
        let filter = ContentIgnore::new(IgnoreRules::default());
        assert_eq!(filter.enable_stages(), &[EnableStage::Pre]);
    }
}
