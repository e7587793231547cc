//! Triage pipeline orchestrator.
//!
//! One run per message, terminal states `Answered`, `Silent`, `Moderated`,
//! `FailedSafe`. The public `process` entry point never returns an error:
//! anything that escapes the staged handling becomes a fail-safe apology
//! with zero attributed cost.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use rand::seq::SliceRandom;
use rust_decimal::Decimal;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::accounting::{CHEAP_CALL_COST, CostTracker, EXPENSIVE_CALL_COST, cost_units};
use crate::analytics::AnalyticsTracker;
use crate::cache::{KvStore, ResponseCache};
use crate::config::TriageConfig;
use crate::detectors::DetectorBank;
use crate::error::PipelineError;
use crate::faq::{FaqEntry, FaqIndex};
use crate::knowledge::KnowledgeBase;
use crate::llm::{Classifier, Embedder, PromptContext, Responder};
use crate::personas::Persona;
use crate::pipeline::types::{
    Category, InboundMessage, ModerationAction, RequestContext, ResponseSource, TriageEvent,
    TriageOutcome,
};
use crate::store::ChunkStore;

/// Fixed apology used whenever generation fails or a stage escapes.
const FALLBACK_RESPONSE: &str =
    "I'm having trouble right now. Please try again in a moment!";

/// Canned greetings; no paid call for a hello.
const GREETINGS: &[&str] = &[
    "Hey there! How can I help?",
    "Hello! Welcome to the community!",
    "Hi! What's up?",
    "Hey! Good to see you!",
];

const TOXIC_FIRM_NOTICE: &str =
    "That message crossed the line and has been removed. Continued behavior \
     like this will lead to a ban.";
const TOXIC_SOFT_NOTICE: &str =
    "That message was removed. Please keep things respectful here.";

/// Broadcast capacity for outcome events.
const EVENT_CAPACITY: usize = 256;

// ── Severity assessment ─────────────────────────────────────────────

/// Parsed severity verdict for a toxic message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeverityVerdict {
    pub severity: u8,
    pub reason: String,
    pub action: String,
}

impl SeverityVerdict {
    /// Conservative default when the assessment is unparsable: mid severity,
    /// escalate for human review.
    fn fallback() -> Self {
        Self {
            severity: 5,
            reason: "unparsable assessment".into(),
            action: "escalate".into(),
        }
    }
}

#[derive(Debug, serde::Deserialize)]
struct SeverityResponse {
    severity: i64,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    action: String,
}

/// Parse a severity assessment, tolerating markdown wrapping and surrounding
/// prose. Falls back to [`SeverityVerdict::fallback`] on any failure.
fn parse_severity(raw: &str) -> SeverityVerdict {
    let json = extract_json_object(raw);
    match serde_json::from_str::<SeverityResponse>(&json) {
        Ok(response) => SeverityVerdict {
            severity: response.severity.clamp(1, 10) as u8,
            reason: response.reason,
            action: if response.action.is_empty() {
                "escalate".into()
            } else {
                response.action
            },
        },
        Err(e) => {
            warn!(raw_response = %raw, error = %e, "Unparsable severity assessment, using default");
            SeverityVerdict::fallback()
        }
    }
}

/// Extract a JSON object from model output (handles markdown wrapping).
fn extract_json_object(text: &str) -> String {
    let trimmed = text.trim();

    if trimmed.starts_with('{') {
        return trimmed.to_string();
    }

    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with('{') {
                return inner.to_string();
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && end > start
    {
        return trimmed[start..=end].to_string();
    }

    trimmed.to_string()
}

// ── Pipeline ────────────────────────────────────────────────────────

/// The triage pipeline. One instance per process; `process` may be called
/// from any number of concurrent message tasks.
pub struct TriagePipeline {
    config: TriageConfig,
    detectors: Arc<DetectorBank>,
    cache: ResponseCache,
    knowledge: Arc<KnowledgeBase>,
    faq: Arc<FaqIndex>,
    classifier: Arc<dyn Classifier>,
    responder: Arc<dyn Responder>,
    accounting: Arc<CostTracker>,
    analytics: Arc<AnalyticsTracker>,
    events: broadcast::Sender<TriageEvent>,
}

impl TriagePipeline {
    /// Wire up a pipeline. `kv_store`/`chunk_store` may be `None`; caching
    /// and persistence degrade accordingly.
    pub fn new(
        config: TriageConfig,
        classifier: Arc<dyn Classifier>,
        responder: Arc<dyn Responder>,
        embedder: Arc<dyn Embedder>,
        kv_store: Option<Arc<dyn KvStore>>,
        chunk_store: Option<Arc<dyn ChunkStore>>,
    ) -> Self {
        let detectors = Arc::new(DetectorBank::new(&config));
        let cache = ResponseCache::new(kv_store, config.cache_ttl, config.call_timeout);
        let knowledge = Arc::new(KnowledgeBase::new(embedder, chunk_store, &config));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            config,
            detectors,
            cache,
            knowledge,
            faq: Arc::new(FaqIndex::new()),
            classifier,
            responder,
            accounting: Arc::new(CostTracker::new()),
            analytics: Arc::new(AnalyticsTracker::new()),
            events,
        }
    }

    /// Subscribe to terminal-state events (observability, moderation
    /// enforcement). Delivery is fire-and-forget.
    pub fn subscribe(&self) -> broadcast::Receiver<TriageEvent> {
        self.events.subscribe()
    }

    pub fn accounting(&self) -> &CostTracker {
        &self.accounting
    }

    pub fn analytics(&self) -> &AnalyticsTracker {
        &self.analytics
    }

    pub fn detectors(&self) -> &Arc<DetectorBank> {
        &self.detectors
    }

    pub fn knowledge(&self) -> &Arc<KnowledgeBase> {
        &self.knowledge
    }

    /// Ingest a knowledge document and invalidate the tenant's cached
    /// responses, which may now be stale.
    pub async fn ingest_knowledge(&self, tenant_id: &str, content: &str, name: &str) -> usize {
        let stored = self.knowledge.ingest(tenant_id, content, name).await;
        self.cache.invalidate_tenant(tenant_id);
        stored
    }

    /// Clear a tenant's knowledge and invalidate its cached responses.
    pub async fn clear_knowledge(&self, tenant_id: &str) -> usize {
        let removed = self.knowledge.clear(tenant_id).await;
        self.cache.invalidate_tenant(tenant_id);
        removed
    }

    /// Add a custom FAQ entry and invalidate the tenant's cached responses.
    pub fn add_faq(&self, tenant_id: &str, entry: FaqEntry) {
        self.faq.add(tenant_id, entry);
        self.cache.invalidate_tenant(tenant_id);
    }

    /// Start the periodic detector eviction sweep.
    pub fn spawn_sweeper(&self) -> tokio::task::JoinHandle<()> {
        self.detectors.spawn_sweeper(self.config.sweep_interval)
    }

    /// Process one message through the full staged flow.
    ///
    /// Never fails: any error that escapes the stages becomes a fail-safe
    /// apology outcome with zero attributed cost.
    pub async fn process(
        &self,
        message: &InboundMessage,
        context: &RequestContext,
    ) -> TriageOutcome {
        let started = Instant::now();

        // Even a panicking collaborator must not take the message task down
        // with an unhandled error; anything that escapes the staged handling
        // becomes a fail-safe apology.
        let result = AssertUnwindSafe(self.run_stages(message, context, started))
            .catch_unwind()
            .await;

        let outcome = match result {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                error!(
                    tenant = %message.tenant_id,
                    user = %message.user_id,
                    error = %e,
                    "Pipeline stage failed, failing safe"
                );
                self.fail_safe(started)
            }
            Err(_) => {
                error!(
                    tenant = %message.tenant_id,
                    user = %message.user_id,
                    "Pipeline stage panicked, failing safe"
                );
                self.fail_safe(started)
            }
        };

        self.analytics
            .track_message(&message.tenant_id, outcome.classification);
        if outcome.source == ResponseSource::Fallback {
            self.analytics
                .track_unanswered(&message.tenant_id, &message.user_id, &message.text);
        }
        self.emit(message, &outcome);

        info!(
            tenant = %message.tenant_id,
            user = %message.username,
            source = ?outcome.source,
            classification = outcome.classification.map(|c| c.label()).unwrap_or("-"),
            latency_ms = outcome.latency_ms,
            "Message triaged"
        );

        outcome
    }

    /// The fail-safe terminal outcome: generic apology, zero attributed cost.
    fn fail_safe(&self, started: Instant) -> TriageOutcome {
        TriageOutcome {
            response: Some(FALLBACK_RESPONSE.to_string()),
            source: ResponseSource::Fallback,
            classification: None,
            moderation: ModerationAction::None,
            cost_units: 0.0,
            latency_ms: started.elapsed().as_millis() as u64,
        }
    }

    async fn run_stages(
        &self,
        message: &InboundMessage,
        context: &RequestContext,
        started: Instant,
    ) -> Result<TriageOutcome, PipelineError> {
        // Stage 0: instant detectors — free, first match wins.
        if let Some(detection) = self.detectors.check(message) {
            return Ok(TriageOutcome {
                response: Some(detection.response),
                source: ResponseSource::Moderation,
                classification: Some(detection.classification),
                moderation: detection.action,
                cost_units: 0.0,
                latency_ms: started.elapsed().as_millis() as u64,
            });
        }

        // Stage 1: response cache — free.
        if let Some(cached) = self.cache.get(&message.tenant_id, &message.text).await {
            self.accounting.record_cache_hit();
            return Ok(TriageOutcome {
                response: Some(cached),
                source: ResponseSource::Cache,
                classification: None,
                moderation: ModerationAction::None,
                cost_units: 0.0,
                latency_ms: started.elapsed().as_millis() as u64,
            });
        }
        self.accounting.record_cache_miss();

        // Stage 2: cheap classification. Cost is counted whether or not the
        // call succeeds; failures coerce to Complex.
        let category = self.classify(&message.text).await;
        let mut cost = CHEAP_CALL_COST;

        // Stage 3: category branch.
        let (response, source, moderation) = match category {
            Category::Greeting => {
                let greeting = GREETINGS
                    .choose(&mut rand::thread_rng())
                    .copied()
                    .unwrap_or(GREETINGS[0]);
                (
                    Some(greeting.to_string()),
                    ResponseSource::Canned,
                    ModerationAction::None,
                )
            }
            Category::Junk => (None, ResponseSource::Filtered, ModerationAction::None),
            Category::Faq => {
                self.answer_faq(message, context, &mut cost).await
            }
            Category::RulesIntent => {
                let prompt = PromptContext {
                    persona: Persona::Rules,
                    tenant_name: context.tenant_name.clone(),
                    username: message.username.clone(),
                    message: message.text.clone(),
                    grounding: None,
                };
                cost += EXPENSIVE_CALL_COST;
                match self.generate(&prompt).await {
                    Some(text) => (
                        Some(text),
                        ResponseSource::Generated,
                        ModerationAction::None,
                    ),
                    None => (
                        Some(FALLBACK_RESPONSE.to_string()),
                        ResponseSource::Fallback,
                        ModerationAction::None,
                    ),
                }
            }
            Category::Toxic => {
                cost += EXPENSIVE_CALL_COST;
                let verdict = self.assess_severity(&message.text).await;
                debug!(
                    tenant = %message.tenant_id,
                    severity = verdict.severity,
                    action = %verdict.action,
                    reason = %verdict.reason,
                    "Toxicity assessed"
                );
                if verdict.severity <= 3 {
                    // Monitor only.
                    (None, ResponseSource::Filtered, ModerationAction::None)
                } else if verdict.severity >= 7 {
                    (
                        Some(TOXIC_FIRM_NOTICE.to_string()),
                        ResponseSource::Moderation,
                        ModerationAction::Delete,
                    )
                } else {
                    (
                        Some(TOXIC_SOFT_NOTICE.to_string()),
                        ResponseSource::Moderation,
                        ModerationAction::Delete,
                    )
                }
            }
            // Complex and every detector-only category that cannot occur here.
            _ => {
                let prompt = PromptContext {
                    persona: context.persona,
                    tenant_name: context.tenant_name.clone(),
                    username: message.username.clone(),
                    message: message.text.clone(),
                    grounding: None,
                };
                cost += EXPENSIVE_CALL_COST;
                match self.generate(&prompt).await {
                    Some(text) => (
                        Some(text),
                        ResponseSource::Generated,
                        ModerationAction::None,
                    ),
                    None => (
                        Some(FALLBACK_RESPONSE.to_string()),
                        ResponseSource::Fallback,
                        ModerationAction::None,
                    ),
                }
            }
        };

        // Stage 4: cache write-back — answered outcomes only, never
        // moderation notices or apologies.
        if moderation == ModerationAction::None
            && source != ResponseSource::Fallback
            && source != ResponseSource::Filtered
            && let Some(ref text) = response
        {
            self.cache.put(&message.tenant_id, &message.text, text).await;
        }

        Ok(TriageOutcome {
            response,
            source,
            classification: Some(category),
            moderation,
            cost_units: cost_units(cost),
            latency_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// FAQ branch: static match (free) → knowledge-grounded generation →
    /// full generation.
    async fn answer_faq(
        &self,
        message: &InboundMessage,
        context: &RequestContext,
        cost: &mut Decimal,
    ) -> (Option<String>, ResponseSource, ModerationAction) {
        if let Some(answer) = self.faq.find_answer(&message.tenant_id, &message.text) {
            debug!(tenant = %message.tenant_id, "Static FAQ match");
            return (Some(answer), ResponseSource::Faq, ModerationAction::None);
        }

        let chunks = self
            .knowledge
            .search(&message.tenant_id, &message.text, self.config.search_top_k)
            .await;

        let (grounding, source) = if chunks.is_empty() {
            (None, ResponseSource::Generated)
        } else {
            (Some(chunks.join("\n---\n")), ResponseSource::Knowledge)
        };

        let prompt = PromptContext {
            persona: context.persona,
            tenant_name: context.tenant_name.clone(),
            username: message.username.clone(),
            message: message.text.clone(),
            grounding,
        };
        *cost += EXPENSIVE_CALL_COST;
        match self.generate(&prompt).await {
            Some(text) => (Some(text), source, ModerationAction::None),
            None => (
                Some(FALLBACK_RESPONSE.to_string()),
                ResponseSource::Fallback,
                ModerationAction::None,
            ),
        }
    }

    /// Classify with a bounded timeout. Errors, timeouts, and unknown labels
    /// all coerce to `Complex`; the cheap call is counted regardless.
    async fn classify(&self, text: &str) -> Category {
        let result =
            tokio::time::timeout(self.config.call_timeout, self.classifier.classify(text)).await;
        self.accounting.record_cheap_call();

        match result {
            Ok(Ok(raw)) => Category::coerce(&raw),
            Ok(Err(e)) => {
                warn!(error = %e, "Classifier failed, coercing to complex");
                Category::Complex
            }
            Err(_) => {
                warn!(timeout = ?self.config.call_timeout, "Classifier timed out, coercing to complex");
                Category::Complex
            }
        }
    }

    /// Generate with a bounded timeout. `None` means the caller should use
    /// the fixed fallback; the expensive call is counted regardless.
    async fn generate(&self, context: &PromptContext) -> Option<String> {
        let result =
            tokio::time::timeout(self.config.call_timeout, self.responder.generate(context)).await;
        self.accounting.record_expensive_call();

        match result {
            Ok(Ok(text)) if !text.trim().is_empty() => Some(text),
            Ok(Ok(_)) => {
                warn!("Responder returned empty text");
                None
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Responder failed");
                None
            }
            Err(_) => {
                warn!(timeout = ?self.config.call_timeout, "Responder timed out");
                None
            }
        }
    }

    /// Severity assessment with a bounded timeout; any failure produces the
    /// conservative default verdict. The expensive call is counted.
    async fn assess_severity(&self, text: &str) -> SeverityVerdict {
        let result =
            tokio::time::timeout(self.config.call_timeout, self.responder.assess(text)).await;
        self.accounting.record_expensive_call();

        match result {
            Ok(Ok(raw)) => parse_severity(&raw),
            Ok(Err(e)) => {
                warn!(error = %e, "Severity assessment failed, using default");
                SeverityVerdict::fallback()
            }
            Err(_) => {
                warn!("Severity assessment timed out, using default");
                SeverityVerdict::fallback()
            }
        }
    }

    fn emit(&self, message: &InboundMessage, outcome: &TriageOutcome) {
        let event = match (outcome.is_moderated(), outcome.classification) {
            (true, Some(classification)) => TriageEvent::Moderated {
                tenant_id: message.tenant_id.clone(),
                user_id: message.user_id.clone(),
                channel_id: message.channel_id.clone(),
                classification,
                action: outcome.moderation,
            },
            _ => TriageEvent::Processed {
                tenant_id: message.tenant_id.clone(),
                user_id: message.user_id.clone(),
                channel_id: message.channel_id.clone(),
                source: outcome.source,
                classification: outcome.classification,
                cost_units: outcome.cost_units,
                latency_ms: outcome.latency_ms,
            },
        };
        // Fire-and-forget — ok if no receivers are listening.
        let _ = self.events.send(event);
    }
}
