//! Agent personas.
//!
//! A closed set of voices the responder can speak as. Selection is a pure
//! keyword function over the message text, kept outside the pipeline so
//! display policy can evolve without touching triage.

use serde::{Deserialize, Serialize};

/// The persona roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Persona {
    /// Community guide; default voice.
    Welcome,
    /// Moderation specialist; delivers warnings and rules answers.
    Moderation,
    /// Data/reporting voice.
    Analytics,
    /// Rules specialist used by the rules-intent branch.
    Rules,
}

impl Persona {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Welcome => "Otter",
            Self::Moderation => "Bear",
            Self::Analytics => "Owl",
            Self::Rules => "Bear",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Welcome => "playful, helpful community guide",
            Self::Moderation => "protective, fair moderation specialist",
            Self::Analytics => "wise, data-driven insights and reporting",
            Self::Rules => "community rules specialist who cites the server rules",
        }
    }

    pub fn tone(&self) -> &'static str {
        match self {
            Self::Welcome => "warm, bubbly, enthusiastic",
            Self::Moderation => "firm but kind, protective, fair",
            Self::Analytics => "analytical, precise, thoughtful",
            Self::Rules => "clear, firm, helpful",
        }
    }
}

const MODERATION_KEYWORDS: &[&str] = &["ban", "report", "toxic", "harass", "spam", "raid"];
const ANALYTICS_KEYWORDS: &[&str] = &["stats", "analytics", "data", "growth", "metrics"];
const WELCOME_KEYWORDS: &[&str] = &["welcome", "hello", "hi ", "new here", "joining"];

/// Pick the persona that should front a reply to `text`.
///
/// Moderation keywords win over analytics, which win over welcome; anything
/// else falls back to the welcome guide.
pub fn select(text: &str) -> Persona {
    let lower = text.to_lowercase();

    if MODERATION_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        return Persona::Moderation;
    }
    if ANALYTICS_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        return Persona::Analytics;
    }
    if WELCOME_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        return Persona::Welcome;
    }

    Persona::Welcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moderation_keywords_pick_moderation() {
        assert_eq!(select("someone is trying to raid us"), Persona::Moderation);
        assert_eq!(select("please BAN this user"), Persona::Moderation);
    }

    #[test]
    fn analytics_keywords_pick_analytics() {
        assert_eq!(select("show me the server stats"), Persona::Analytics);
    }

    #[test]
    fn greeting_picks_welcome() {
        assert_eq!(select("hello everyone, new here!"), Persona::Welcome);
    }

    #[test]
    fn default_is_welcome() {
        assert_eq!(select("how do I configure my widget?"), Persona::Welcome);
    }

    #[test]
    fn moderation_beats_analytics() {
        // Contains both "report" (moderation) and "data" (analytics).
        assert_eq!(select("report this data leak"), Persona::Moderation);
    }
}
