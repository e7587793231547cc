//! Stateless content detectors: PII, phishing lookalikes, obfuscated text.
//!
//! Regexes are compiled once at construction and evaluated on every message,
//! so each family stays anchored and cheap — these run before any paid call.

use regex::Regex;

/// A compiled PII pattern family.
#[derive(Debug)]
struct PiiRule {
    /// Family name for logging ("phone", "email", ...).
    family: &'static str,
    regex: Regex,
}

/// Deceptive domain fragments and scam phrases, matched as lowercase
/// substrings. Typosquats of the platform's own domain first.
const PHISHING_FRAGMENTS: &[&str] = &[
    "dlscord",
    "discorcl",
    "disc0rd",
    "discrod",
    "discordgift",
    "discord-airdrop",
    "free nitro",
    "nitro for free",
    "nitro giveaway",
    "steamcommunlty",
    "steamcomminity",
    "claim your prize",
    "account verification required",
    "verify your account here",
];

/// Stateless pattern bank.
#[derive(Debug)]
pub struct PatternBank {
    pii_rules: Vec<PiiRule>,
}

impl PatternBank {
    pub fn new() -> Self {
        let pii_rules = vec![
            PiiRule {
                family: "phone",
                regex: Regex::new(r"\b\(?\d{3}\)?[-. ]\d{3}[-. ]\d{4}\b").unwrap(),
            },
            PiiRule {
                family: "email",
                regex: Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}").unwrap(),
            },
            PiiRule {
                family: "national_id",
                regex: Regex::new(r"\b\d{3}-\d{2}-\d{4}\b|\b\d{9}\b").unwrap(),
            },
            PiiRule {
                family: "street_address",
                regex: Regex::new(
                    r"(?i)\b\d{1,5}\s+\w+(\s+\w+)?\s+(street|st|avenue|ave|road|rd|boulevard|blvd|lane|ln|drive|dr|court|ct|way)\b",
                )
                .unwrap(),
            },
        ];

        Self { pii_rules }
    }

    /// Check for personally identifying information. Returns the matching
    /// family name.
    pub fn check_pii(&self, text: &str) -> Option<&'static str> {
        self.pii_rules
            .iter()
            .find(|rule| rule.regex.is_match(text))
            .map(|rule| rule.family)
    }

    /// Check for phishing lookalikes. Returns the matching fragment.
    pub fn check_phishing(&self, text: &str) -> Option<&'static str> {
        let lower = text.to_lowercase();
        PHISHING_FRAGMENTS
            .iter()
            .find(|fragment| lower.contains(*fragment))
            .copied()
    }
}

impl Default for PatternBank {
    fn default() -> Self {
        Self::new()
    }
}

/// Number of consecutive combining code points that flags obfuscation.
const ZALGO_RUN_THRESHOLD: usize = 3;

fn is_combining(c: char) -> bool {
    matches!(
        c,
        '\u{0300}'..='\u{036F}'
            | '\u{1AB0}'..='\u{1AFF}'
            | '\u{1DC0}'..='\u{1DFF}'
            | '\u{20D0}'..='\u{20FF}'
            | '\u{FE20}'..='\u{FE2F}'
    )
}

/// Detect zalgo-style obfuscation: a run of combining diacritics long enough
/// that the text is being stacked rather than accented.
pub fn has_zalgo(text: &str) -> bool {
    let mut run = 0usize;
    for c in text.chars() {
        if is_combining(c) {
            run += 1;
            if run >= ZALGO_RUN_THRESHOLD {
                return true;
            }
        } else {
            run = 0;
        }
    }
    false
}
