//! Static FAQ matching — the free tier of the `faq` branch.
//!
//! Every tenant starts from a default FAQ set and can add custom entries.
//! Matching is lowercase substring over the question keyword and its
//! variation phrases; anything smarter falls through to knowledge retrieval.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// One FAQ entry: a keyword, trigger variations, and the canned answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaqEntry {
    pub question: String,
    pub variations: Vec<String>,
    pub answer: String,
}

impl FaqEntry {
    pub fn new(question: &str, variations: &[&str], answer: &str) -> Self {
        Self {
            question: question.to_lowercase(),
            variations: variations.iter().map(|v| v.to_lowercase()).collect(),
            answer: answer.to_string(),
        }
    }

    fn matches(&self, query_lower: &str) -> bool {
        query_lower.contains(&self.question)
            || self.variations.iter().any(|v| query_lower.contains(v))
    }
}

fn default_faqs() -> Vec<FaqEntry> {
    vec![
        FaqEntry::new(
            "rules",
            &["what are the rules", "server rules", "guidelines"],
            "Check the rules channel for our community guidelines! The main ones: \
             be respectful, no spam, and have fun.",
        ),
        FaqEntry::new(
            "roles",
            &["how do i get roles", "color roles", "assign roles"],
            "You can pick up roles in the roles channel or ask a moderator.",
        ),
        FaqEntry::new(
            "help",
            &["support", "i need help", "assistance"],
            "I'm here to help! Tell me what you need, or ping a moderator if it's urgent.",
        ),
        FaqEntry::new(
            "pricing",
            &["how much", "price", "cost", "is it free", "subscription"],
            "The Pro tier is $49/mo and Business is $99/mo, both with unlimited responses.",
        ),
        FaqEntry::new(
            "bot",
            &["what is this bot", "who are you", "what do you do"],
            "I'm the community assistant! I answer questions, help with moderation, \
             and keep track of community stats.",
        ),
    ]
}

/// Per-tenant FAQ sets with defaults.
pub struct FaqIndex {
    entries: DashMap<String, Vec<FaqEntry>>,
    defaults: Vec<FaqEntry>,
}

impl FaqIndex {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            defaults: default_faqs(),
        }
    }

    /// Find the canned answer for `query`, if any entry matches.
    pub fn find_answer(&self, tenant_id: &str, query: &str) -> Option<String> {
        let query_lower = query.to_lowercase();
        match self.entries.get(tenant_id) {
            Some(entries) => entries
                .iter()
                .find(|e| e.matches(&query_lower))
                .map(|e| e.answer.clone()),
            None => self
                .defaults
                .iter()
                .find(|e| e.matches(&query_lower))
                .map(|e| e.answer.clone()),
        }
    }

    /// Add a custom FAQ for a tenant. The tenant's set is seeded from the
    /// defaults on first customization.
    pub fn add(&self, tenant_id: &str, entry: FaqEntry) {
        self.entries
            .entry(tenant_id.to_string())
            .or_insert_with(default_faqs)
            .push(entry);
    }

    /// All FAQ entries visible to a tenant.
    pub fn all(&self, tenant_id: &str) -> Vec<FaqEntry> {
        self.entries
            .get(tenant_id)
            .map(|e| e.clone())
            .unwrap_or_else(|| self.defaults.clone())
    }
}

impl Default for FaqIndex {
    fn default() -> Self {
        Self::new()
    }
}
