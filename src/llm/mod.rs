//! Model collaborator interfaces.
//!
//! The pipeline never talks to a model vendor directly — it depends on
//! three narrow traits: a cheap `Classifier`, an expensive `Responder`
//! (generation + severity assessment), and an `Embedder` for knowledge
//! retrieval. `HttpLlm` implements all three over an OpenAI-format HTTP
//! endpoint for real deployments; tests supply mocks.

pub mod http;

pub use http::{HttpLlm, HttpLlmConfig};

use async_trait::async_trait;

use crate::error::LlmError;
use crate::personas::Persona;

// ── Traits ──────────────────────────────────────────────────────────

/// Cheap message classifier. Returns the raw category label; the pipeline
/// coerces it into the closed [`crate::pipeline::types::Category`] set.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<String, LlmError>;
}

/// Expensive generative model.
#[async_trait]
pub trait Responder: Send + Sync {
    /// Generate a persona-voiced reply for the given context.
    async fn generate(&self, context: &PromptContext) -> Result<String, LlmError>;

    /// Assess toxicity severity; expected to return a JSON object
    /// `{"severity": 1-10, "reason": "...", "action": "..."}` (tolerantly
    /// parsed by the pipeline).
    async fn assess(&self, text: &str) -> Result<String, LlmError>;
}

/// Text embedding collaborator. Vectors have a fixed dimensionality decided
/// by the provider.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError>;
}

// ── Prompt context ──────────────────────────────────────────────────

/// Everything the responder needs to speak in character.
#[derive(Debug, Clone)]
pub struct PromptContext {
    pub persona: Persona,
    pub tenant_name: String,
    pub username: String,
    /// The user's message text.
    pub message: String,
    /// Retrieved knowledge the answer must be grounded in, when present.
    pub grounding: Option<String>,
}

impl PromptContext {
    /// Render the full generation prompt.
    pub fn render(&self) -> String {
        let mut prompt = String::with_capacity(512);

        prompt.push_str(&format!(
            "You are {}, {}.\nTone: {}\n\n",
            self.persona.name(),
            self.persona.description(),
            self.persona.tone(),
        ));
        prompt.push_str(&format!(
            "Server: {}\nUser: {}\n\n",
            self.tenant_name, self.username
        ));

        if let Some(ref grounding) = self.grounding {
            prompt.push_str("Relevant server knowledge:\n");
            prompt.push_str(grounding);
            prompt.push_str(
                "\n\nAnswer ONLY from the knowledge above. If it does not \
                 contain the answer, say you don't know and suggest asking a \
                 moderator.\n\n",
            );
        }

        prompt.push_str(&format!("User message: \"{}\"\n\n", self.message));
        prompt.push_str("Respond naturally in character. Be helpful but concise (max 2 sentences).");
        prompt
    }
}

// ── Prompt builders used by adapters ────────────────────────────────

/// Classification prompt for the cheap model.
pub fn classify_prompt(text: &str) -> String {
    format!(
        "Classify this chat message into ONE category:\n\
         - greeting: \"hi\", \"hello\", \"hey\", \"sup\", \"yo\", \"morning\", \"lol\"\n\
         - junk: spam, random characters, nonsensical\n\
         - faq: questions about rules, pricing, how-to, refunds\n\
         - rules_intent: asking to add, change, or explain server rules\n\
         - toxic: insults, harassment, threats, slurs\n\
         - complex: everything else that needs a real answer\n\n\
         Message: \"{text}\"\n\n\
         Respond with ONLY the category word (greeting/junk/faq/rules_intent/toxic/complex):"
    )
}

/// Severity-assessment prompt for the expensive model.
pub fn severity_prompt(text: &str) -> String {
    format!(
        "You are a moderation assistant. Rate the severity of this message \
         on a 1-10 scale (1 = mildly rude, 10 = threats or slurs).\n\n\
         Message: \"{text}\"\n\n\
         Respond with ONLY a JSON object:\n\
         {{\"severity\": <1-10>, \"reason\": \"...\", \"action\": \"warn|delete|timeout|escalate\"}}"
    )
}
