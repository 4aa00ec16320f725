//! Rule-based privacy leak classification
//!
//! A flow is checked against an ordered chain of rules and labelled by the
//! first rule that matches. Matching is plain substring and regex search, so
//! classification is pure and runs in bounded time. It is a monitoring aid:
//! false positives and negatives are expected.

pub mod content;
pub mod rules;

pub use rules::{Matcher, Rule};

use crate::types::leak::Leak;
use crate::types::record::TransactionRecord;
use std::sync::LazyLock;

static DEFAULT_CLASSIFIER: LazyLock<Classifier> = LazyLock::new(Classifier::new);

/// Classify a record with the default rule chain
pub fn classify(record: &TransactionRecord) -> Option<Leak> {
    DEFAULT_CLASSIFIER.classify(record)
}

/// Lower-cased view of a record shared by all rules during one classification
pub struct Subject<'a> {
    pub record: &'a TransactionRecord,
    /// Host followed by path, so host names like `location.example.com`
    /// count for the keyword rules
    pub url: String,
    pub host: String,
}

impl<'a> Subject<'a> {
    pub fn new(record: &'a TransactionRecord) -> Self {
        let host = record.host.to_lowercase();
        let mut url = String::with_capacity(host.len() + record.url.len());
        url.push_str(&host);
        url.push_str(&record.url.to_lowercase());
        Self { record, url, host }
    }

    pub fn body(&self) -> Option<&'a str> {
        self.record.body.as_deref()
    }
}

/// Ordered rule chain; the first matching rule wins
pub struct Classifier {
    rules: Vec<Rule>,
}

impl Classifier {
    /// Create a classifier with the default rule chain
    pub fn new() -> Self {
        Self::with_rules(rules::default_rules())
    }

    /// Create a classifier with a custom rule chain, evaluated in order
    pub fn with_rules(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Label a record, or `None` when no rule matches
    pub fn classify(&self, record: &TransactionRecord) -> Option<Leak> {
        let subject = Subject::new(record);
        self.rules.iter().find_map(|rule| rule.evaluate(&subject))
    }

    /// Get the number of rules
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Get rule names in evaluation order
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(Rule::name).collect()
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}
