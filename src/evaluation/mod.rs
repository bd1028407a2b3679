//! Flag evaluation engine.
//!
//! Given a flag's [`EvaluationOptions`] and a request's [`EvaluationContext`],
//! decides whether the flag is enabled and which variation it serves. The
//! engine is a pure function of its inputs plus an injected clock and zone
//! database; it holds no state and does no I/O.

pub mod access;
pub mod bucketing;
pub mod clock;
pub mod context;
pub mod error;
pub mod mode;
pub mod pipeline;
pub mod schedule;
pub mod targeting;
pub mod window;

pub use access::{AccessBasis, AccessControl, AccessDecision};
pub use bucketing::{bucket, in_rollout};
pub use clock::{Clock, FixedClock, SystemClock};
pub use context::{EvaluationContext, EvaluationOptions, EvaluationResult, Variations};
pub use error::EvaluationError;
pub use mode::{EvaluationMode, ModeSet};
pub use pipeline::{evaluate_at, evaluate_with, reasons, Evaluator};
pub use schedule::{SchedulePhase, UtcSchedule};
pub use targeting::{Operator, RuleMatch, TargetingRule};
pub use window::{IanaZones, UtcTimeWindow, WindowVerdict, ZoneResolver};
