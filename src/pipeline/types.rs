//! Shared types for the triage pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::personas::Persona;

// ── Inbound message ─────────────────────────────────────────────────

/// A single chat message as handed to the pipeline by the gateway.
///
/// Immutable input; the core never persists it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Community/server the message belongs to. All cached and retrieved
    /// data is scoped to this id.
    pub tenant_id: String,
    /// Platform-native sender id.
    pub user_id: String,
    /// Display name of the sender.
    pub username: String,
    /// Channel the message was posted in.
    pub channel_id: String,
    /// Raw message text.
    pub text: String,
    /// When the gateway received the message.
    pub received_at: DateTime<Utc>,
}

/// Caller-supplied context that travels with a message through the pipeline:
/// tenant display name plus the persona the reply should speak as.
///
/// Persona selection is the caller's policy (see [`crate::personas::select`]);
/// the pipeline only consumes the result.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub tenant_name: String,
    pub persona: Persona,
}

// ── Classification ──────────────────────────────────────────────────

/// Closed set of message categories.
///
/// The classifier collaborator returns a raw string; [`Category::coerce`]
/// maps it into this set, with anything unrecognized collapsing to
/// `Complex` so a confused model fails toward the capable path, never
/// toward silence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Greeting,
    Junk,
    Faq,
    RulesIntent,
    Toxic,
    Complex,
    // Detector-assigned categories; never produced by the classifier.
    Pii,
    Phishing,
    Zalgo,
    Spam,
    Raid,
}

impl Category {
    /// Coerce a raw classifier label into the closed set.
    pub fn coerce(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "greeting" => Self::Greeting,
            "junk" => Self::Junk,
            "faq" => Self::Faq,
            "rules_intent" => Self::RulesIntent,
            "toxic" => Self::Toxic,
            "complex" => Self::Complex,
            _ => Self::Complex,
        }
    }

    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::Junk => "junk",
            Self::Faq => "faq",
            Self::RulesIntent => "rules_intent",
            Self::Toxic => "toxic",
            Self::Complex => "complex",
            Self::Pii => "pii",
            Self::Phishing => "phishing",
            Self::Zalgo => "zalgo",
            Self::Spam => "spam",
            Self::Raid => "raid",
        }
    }
}

// ── Outcome ─────────────────────────────────────────────────────────

/// Moderation action the platform-side enforcement collaborator should take.
///
/// The core never deletes messages or times users out itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationAction {
    None,
    Delete,
    Timeout,
}

/// Where a response came from, for cost attribution and analytics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    /// Response cache hit.
    Cache,
    /// Canned text (greetings, moderation notices).
    Canned,
    /// Static FAQ match.
    Faq,
    /// Knowledge-grounded generation.
    Knowledge,
    /// Full expensive generation.
    Generated,
    /// Instant detector verdict.
    Moderation,
    /// Deliberately dropped (junk).
    Filtered,
    /// Fail-safe apology.
    Fallback,
}

/// Result of one pipeline run. Produced once per message, never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct TriageOutcome {
    /// Text to deliver, if any. `None` for silent outcomes.
    pub response: Option<String>,
    pub source: ResponseSource,
    /// Classification when one was made (detector or classifier).
    pub classification: Option<Category>,
    pub moderation: ModerationAction,
    /// Cost incurred by this message alone.
    pub cost_units: f64,
    pub latency_ms: u64,
}

impl TriageOutcome {
    /// True when the outcome asks the enforcement collaborator to act.
    pub fn is_moderated(&self) -> bool {
        self.moderation != ModerationAction::None
    }
}

// ── Events ──────────────────────────────────────────────────────────

/// Fire-and-forget event emitted after a pipeline run reaches a terminal
/// state. Consumed by observability / moderation-execution collaborators;
/// the pipeline never depends on delivery.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriageEvent {
    /// A message was answered (or silently dropped).
    Processed {
        tenant_id: String,
        user_id: String,
        channel_id: String,
        source: ResponseSource,
        classification: Option<Category>,
        cost_units: f64,
        latency_ms: u64,
    },
    /// A message was moderated; enforcement should act on `action`.
    Moderated {
        tenant_id: String,
        user_id: String,
        channel_id: String,
        classification: Category,
        action: ModerationAction,
    },
}
