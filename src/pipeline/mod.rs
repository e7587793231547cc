//! The staged triage pipeline.
//!
//! Every inbound message flows through, in order:
//! 1. Instant detector bank — free, never suspends, may short-circuit
//! 2. Response cache lookup — free
//! 3. Cheap classification — paid, small
//! 4. Category branch — may consult knowledge or the expensive responder
//! 5. Cache write-back (answered outcomes only)
//! 6. Accounting
//!
//! Cheap checks always precede paid ones, and any failure degrades to a
//! safe default instead of reaching the caller.

pub mod triage;
pub mod types;

pub use triage::TriagePipeline;
pub use types::{
    Category, InboundMessage, ModerationAction, RequestContext, ResponseSource, TriageEvent,
    TriageOutcome,
};
