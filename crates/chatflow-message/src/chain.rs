//! The message chain: an ordered, mutable sequence of components.
//!
//! [`MessageChain`] dereferences to `[MessageComponent]`, so indexing,
//! slicing, iteration, `reverse` and friends come from the slice API. The
//! methods here add the queries that pipeline stages need: lookup by
//! [`ComponentKind`] or by value, bounded exclusion, and flattening
//! construction from mixed parts.

use std::fmt;
use std::ops::{Add, AddAssign, Bound, Deref, DerefMut, Mul, RangeBounds};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::component::{ComponentKind, Id, MessageComponent, SourceData};
use crate::error::{MessageError, MessageResult};

// ============================================================================
// Selector
// ============================================================================

/// Selects components either by kind or by structural equality.
#[derive(Debug, Clone, Copy)]
pub enum Selector<'a> {
    /// Any component of the given kind.
    Kind(ComponentKind),
    /// Components equal to the given one.
    Value(&'a MessageComponent),
}

impl Selector<'_> {
    /// Returns true if `component` is selected.
    pub fn matches(&self, component: &MessageComponent) -> bool {
        match self {
            Selector::Kind(kind) => component.kind() == *kind,
            Selector::Value(value) => component == *value,
        }
    }
}

impl From<ComponentKind> for Selector<'_> {
    fn from(kind: ComponentKind) -> Self {
        Selector::Kind(kind)
    }
}

impl<'a> From<&'a MessageComponent> for Selector<'a> {
    fn from(value: &'a MessageComponent) -> Self {
        Selector::Value(value)
    }
}

// ============================================================================
// ChainPart
// ============================================================================

/// Something that can be flattened into a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainPart {
    Component(MessageComponent),
    Text(String),
    Chain(MessageChain),
}

impl From<MessageComponent> for ChainPart {
    fn from(component: MessageComponent) -> Self {
        ChainPart::Component(component)
    }
}

impl From<&str> for ChainPart {
    fn from(text: &str) -> Self {
        ChainPart::Text(text.to_string())
    }
}

impl From<String> for ChainPart {
    fn from(text: String) -> Self {
        ChainPart::Text(text)
    }
}

impl From<MessageChain> for ChainPart {
    fn from(chain: MessageChain) -> Self {
        ChainPart::Chain(chain)
    }
}

// ============================================================================
// MessageChain
// ============================================================================

/// An ordered sequence of message components.
///
/// The chain's `Display` output is the concatenation of each component's
/// text contribution; non-text components render as placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct MessageChain {
    components: Vec<MessageComponent>,
}

impl MessageChain {
    /// Creates a new empty chain.
    pub const fn new() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    /// Creates a chain from a vector of components.
    pub fn from_components(components: Vec<MessageComponent>) -> Self {
        Self { components }
    }

    /// Creates a flat chain from mixed parts.
    ///
    /// Text becomes `Plain`; nested chains are spliced in place.
    pub fn from_parts<I, P>(parts: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<ChainPart>,
    {
        let mut chain = Self::new();
        for part in parts {
            match part.into() {
                ChainPart::Component(c) => chain.components.push(c),
                ChainPart::Text(t) => chain.components.push(MessageComponent::plain(t)),
                ChainPart::Chain(c) => chain.components.extend(c.components),
            }
        }
        chain
    }

    /// Concatenates several part sequences into one chain.
    pub fn join<I, J, P>(sequences: I) -> Self
    where
        I: IntoIterator<Item = J>,
        J: IntoIterator<Item = P>,
        P: Into<ChainPart>,
    {
        Self::from_parts(sequences.into_iter().flatten())
    }

    /// Parses a chain from its JSON wire form.
    ///
    /// Elements may be component records, bare strings (wrapped as `Plain`),
    /// or nested arrays, which are flattened.
    pub fn parse(raw: &Value) -> MessageResult<Self> {
        let Value::Array(items) = raw else {
            return Err(MessageError::invalid_field(
                "<chain>",
                format!("expected an array, got {raw}"),
            ));
        };

        let mut chain = Self::new();
        chain.parse_into(items)?;
        Ok(chain)
    }

    fn parse_into(&mut self, items: &[Value]) -> MessageResult<()> {
        for item in items {
            match item {
                Value::String(text) => self.components.push(MessageComponent::plain(text.clone())),
                Value::Array(nested) => self.parse_into(nested)?,
                other => self.components.push(MessageComponent::parse(other)?),
            }
        }
        Ok(())
    }

    /// Consumes the chain and returns the inner components.
    pub fn into_components(self) -> Vec<MessageComponent> {
        self.components
    }

    // ==================== Queries ====================

    /// Returns true if any component is selected.
    pub fn has<'a>(&self, selector: impl Into<Selector<'a>>) -> bool {
        let selector = selector.into();
        self.components.iter().any(|c| selector.matches(c))
    }

    pub fn has_kind(&self, kind: ComponentKind) -> bool {
        self.has(kind)
    }

    /// Returns the first component of the given kind.
    pub fn first_of(&self, kind: ComponentKind) -> Option<&MessageComponent> {
        self.components.iter().find(|c| c.kind() == kind)
    }

    /// Iterates over all components of the given kind.
    pub fn all_of(&self, kind: ComponentKind) -> impl Iterator<Item = &MessageComponent> {
        self.components.iter().filter(move |c| c.kind() == kind)
    }

    /// Returns the index of the first selected component.
    pub fn index_of<'a>(&self, selector: impl Into<Selector<'a>>) -> Option<usize> {
        self.index_in(selector, ..)
    }

    /// Returns the index of the first selected component within `range`.
    ///
    /// The range is clamped to the chain's length.
    pub fn index_in<'a>(
        &self,
        selector: impl Into<Selector<'a>>,
        range: impl RangeBounds<usize>,
    ) -> Option<usize> {
        let selector = selector.into();
        let len = self.components.len();
        let start = match range.start_bound() {
            Bound::Included(&s) => s,
            Bound::Excluded(&s) => s.saturating_add(1),
            Bound::Unbounded => 0,
        };
        let end = match range.end_bound() {
            Bound::Included(&e) => e.saturating_add(1),
            Bound::Excluded(&e) => e,
            Bound::Unbounded => len,
        }
        .min(len);

        (start..end).find(|&i| selector.matches(&self.components[i]))
    }

    /// Counts the selected components.
    pub fn count<'a>(&self, selector: impl Into<Selector<'a>>) -> usize {
        let selector = selector.into();
        self.components.iter().filter(|c| selector.matches(c)).count()
    }

    /// Returns the components in `range` as a new chain, or `None` if the
    /// range is out of bounds.
    pub fn sub_chain(&self, range: impl RangeBounds<usize>) -> Option<Self> {
        let bounds = (range.start_bound().cloned(), range.end_bound().cloned());
        self.components.get(bounds).map(|s| Self::from_components(s.to_vec()))
    }

    /// Concatenates the text of all `Plain` components.
    pub fn plain_text(&self) -> String {
        self.components
            .iter()
            .filter_map(MessageComponent::as_text)
            .collect()
    }

    /// Returns the `Source` metadata, if present.
    pub fn source(&self) -> Option<&SourceData> {
        self.components.iter().find_map(|c| match c {
            MessageComponent::Source(data) => Some(data),
            _ => None,
        })
    }

    /// Returns the message id from the `Source` component, or `-1`.
    pub fn message_id(&self) -> Id {
        self.source()
            .map(|s| s.id.clone())
            .unwrap_or(Id::Int(-1))
    }

    // ==================== Mutation ====================

    /// Adds a component to the end of the chain.
    pub fn push(&mut self, component: impl Into<MessageComponent>) {
        self.components.push(component.into());
    }

    /// Consumes the chain and adds a component (builder pattern).
    pub fn with(mut self, component: impl Into<MessageComponent>) -> Self {
        self.push(component);
        self
    }

    /// Inserts a component at `index`, clamped to the chain's length.
    pub fn insert(&mut self, index: usize, component: impl Into<MessageComponent>) {
        let index = index.min(self.components.len());
        self.components.insert(index, component.into());
    }

    /// Removes and returns the component at `index`.
    pub fn remove_at(&mut self, index: usize) -> Option<MessageComponent> {
        (index < self.components.len()).then(|| self.components.remove(index))
    }

    /// Removes and returns the last component.
    pub fn pop(&mut self) -> Option<MessageComponent> {
        self.components.pop()
    }

    /// Removes the first selected component.
    pub fn remove_first<'a>(
        &mut self,
        selector: impl Into<Selector<'a>>,
    ) -> Option<MessageComponent> {
        let index = self.index_of(selector)?;
        Some(self.components.remove(index))
    }

    /// Returns a copy without up to `limit` selected components.
    ///
    /// `None` removes every match. Relative order is preserved.
    pub fn exclude<'a>(&self, selector: impl Into<Selector<'a>>, limit: Option<usize>) -> Self {
        let selector = selector.into();
        let mut remaining = limit.unwrap_or(usize::MAX);
        let components = self
            .components
            .iter()
            .filter(|c| {
                if remaining > 0 && selector.matches(c) {
                    remaining -= 1;
                    false
                } else {
                    true
                }
            })
            .cloned()
            .collect();
        Self { components }
    }

    /// Returns the chain repeated `times` times.
    pub fn repeat(&self, times: usize) -> Self {
        (0..times)
            .flat_map(|_| self.components.iter().cloned())
            .collect()
    }

    /// Removes every component.
    pub fn clear(&mut self) {
        self.components.clear();
    }
}

// ============================================================================
// Deref / Display / serde
// ============================================================================

impl Deref for MessageChain {
    type Target = [MessageComponent];

    fn deref(&self) -> &Self::Target {
        &self.components
    }
}

impl DerefMut for MessageChain {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.components
    }
}

impl fmt::Display for MessageChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for component in &self.components {
            write!(f, "{component}")?;
        }
        Ok(())
    }
}

impl<'de> Deserialize<'de> for MessageChain {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Conversions
// ============================================================================

impl From<Vec<MessageComponent>> for MessageChain {
    fn from(components: Vec<MessageComponent>) -> Self {
        Self::from_components(components)
    }
}

impl From<MessageComponent> for MessageChain {
    fn from(component: MessageComponent) -> Self {
        Self::from_components(vec![component])
    }
}

impl From<&str> for MessageChain {
    fn from(text: &str) -> Self {
        Self::from(MessageComponent::plain(text))
    }
}

impl From<String> for MessageChain {
    fn from(text: String) -> Self {
        Self::from(MessageComponent::plain(text))
    }
}

impl FromIterator<MessageComponent> for MessageChain {
    fn from_iter<I: IntoIterator<Item = MessageComponent>>(iter: I) -> Self {
        Self {
            components: iter.into_iter().collect(),
        }
    }
}

impl Extend<MessageComponent> for MessageChain {
    fn extend<I: IntoIterator<Item = MessageComponent>>(&mut self, iter: I) {
        self.components.extend(iter);
    }
}

impl IntoIterator for MessageChain {
    type Item = MessageComponent;
    type IntoIter = std::vec::IntoIter<MessageComponent>;

    fn into_iter(self) -> Self::IntoIter {
        self.components.into_iter()
    }
}

impl<'a> IntoIterator for &'a MessageChain {
    type Item = &'a MessageComponent;
    type IntoIter = std::slice::Iter<'a, MessageComponent>;

    fn into_iter(self) -> Self::IntoIter {
        self.components.iter()
    }
}

impl<P: Into<ChainPart>> Add<P> for MessageChain {
    type Output = MessageChain;

    fn add(mut self, rhs: P) -> Self::Output {
        self += rhs;
        self
    }
}

impl<P: Into<ChainPart>> AddAssign<P> for MessageChain {
    fn add_assign(&mut self, rhs: P) {
        let tail = MessageChain::from_parts([rhs]);
        self.components.extend(tail.components);
    }
}

impl Mul<usize> for MessageChain {
    type Output = MessageChain;

    fn mul(self, rhs: usize) -> Self::Output {
        self.repeat(rhs)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn sample() -> MessageChain {
        MessageChain::from_parts([
            ChainPart::from(MessageComponent::source(99, Utc::now())),
            "hello ".into(),
            MessageComponent::at(1).into(),
            " world".into(),
            MessageComponent::image_url("http://example.com/x.png").into(),
        ])
    }

    #[test]
    fn test_display_concatenates_components() {
        assert_eq!(sample().to_string(), "hello @1 world[image]");
    }

    #[test]
    fn test_parse_flattens_nested_arrays() {
        let chain = MessageChain::parse(&json!([
            "a",
            [{"type": "Plain", "text": "b"}, ["c"]],
            {"type": "AtAll"}
        ]))
        .unwrap();
        assert_eq!(chain.len(), 4);
        assert_eq!(chain.to_string(), "abc@all");
    }

    #[test]
    fn test_parse_fails_fast_on_unknown_type() {
        let err = MessageChain::parse(&json!(["a", {"type": "Nope"}])).unwrap_err();
        assert!(matches!(err, MessageError::UnknownVariant(_)));
        assert!(MessageChain::parse(&json!({"type": "Plain"})).is_err());
    }

    #[test]
    fn test_serde_round_trip() {
        let chain = sample();
        let json = serde_json::to_string(&chain).unwrap();
        let back: MessageChain = serde_json::from_str(&json).unwrap();
        assert_eq!(back, chain);
    }

    #[test]
    fn test_from_parts_splices_chains() {
        let inner = MessageChain::from("x").with("y");
        let chain = MessageChain::from_parts([ChainPart::from("a"), inner.into(), "b".into()]);
        assert_eq!(chain.to_string(), "axyb");
        assert_eq!(chain.len(), 4);
    }

    #[test]
    fn test_join() {
        let chain = MessageChain::join([vec!["a", "b"], vec!["c"]]);
        assert_eq!(chain.to_string(), "abc");
        assert_eq!(chain.len(), 3);
    }

    #[test]
    fn test_kind_and_value_queries() {
        let chain = sample();
        assert!(chain.has(ComponentKind::At));
        assert!(!chain.has(ComponentKind::Voice));
        assert!(chain.has(&MessageComponent::plain(" world")));
        assert!(chain.contains(&MessageComponent::plain(" world")));
        assert!(chain.has_kind(ComponentKind::Image));

        assert_eq!(chain.first_of(ComponentKind::Plain), Some(&MessageComponent::plain("hello ")));
        assert_eq!(chain.index_of(ComponentKind::Image), Some(4));
        assert_eq!(chain.index_in(ComponentKind::Plain, 2..), Some(3));
        assert_eq!(chain.index_in(ComponentKind::Plain, 2..3), None);
        assert_eq!(chain.count(ComponentKind::Plain), 2);
        assert_eq!(chain.all_of(ComponentKind::Plain).count(), 2);
    }

    #[test]
    fn test_exclude_with_limit() {
        let chain = MessageChain::from_parts(["a", "b", "c"]).with(MessageComponent::at(1));

        let all = chain.exclude(ComponentKind::Plain, None);
        assert_eq!(all.to_string(), "@1");

        let one = chain.exclude(ComponentKind::Plain, Some(1));
        assert_eq!(one.to_string(), "bc@1");

        let b = MessageComponent::plain("b");
        assert_eq!(chain.exclude(&b, None).to_string(), "ac@1");
        assert_eq!(chain.len(), 4);
    }

    #[test]
    fn test_mutation_preserves_order() {
        let mut chain = MessageChain::from_parts(["a", "c"]);
        chain.insert(1, "b");
        chain.insert(100, "d");
        assert_eq!(chain.to_string(), "abcd");

        assert_eq!(chain.remove_at(0), Some(MessageComponent::plain("a")));
        assert_eq!(chain.remove_at(10), None);
        assert_eq!(chain.pop(), Some(MessageComponent::plain("d")));

        chain.push(MessageComponent::at_all());
        assert_eq!(
            chain.remove_first(ComponentKind::AtAll),
            Some(MessageComponent::AtAll)
        );
        assert_eq!(chain.to_string(), "bc");

        chain.reverse();
        assert_eq!(chain.to_string(), "cb");
        chain[0] = MessageComponent::plain("z");
        assert_eq!(chain.to_string(), "zb");
    }

    #[test]
    fn test_concat_and_repeat() {
        let chain = MessageChain::from("ab") + "c" + MessageComponent::at_all();
        assert_eq!(chain.to_string(), "abc@all");

        let mut acc = MessageChain::new();
        acc += MessageChain::from("x");
        acc += "y";
        assert_eq!((acc * 2).to_string(), "xyxy");
    }

    #[test]
    fn test_sub_chain() {
        let chain = MessageChain::from_parts(["a", "b", "c"]);
        assert_eq!(chain.sub_chain(1..).unwrap().to_string(), "bc");
        assert!(chain.sub_chain(2..5).is_none());
    }

    #[test]
    fn test_source_and_message_id() {
        assert_eq!(sample().message_id(), Id::Int(99));
        assert_eq!(MessageChain::from("x").message_id(), Id::Int(-1));
        assert_eq!(sample().plain_text(), "hello  world");
    }
}
