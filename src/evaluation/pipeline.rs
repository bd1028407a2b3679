use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::collections::BTreeMap;

use super::access::{AccessControl, AccessDecision};
use super::clock::{Clock, SystemClock};
use super::context::{EvaluationContext, EvaluationOptions, EvaluationResult};
use super::error::EvaluationError;
use super::mode::EvaluationMode;
use super::schedule::SchedulePhase;
use super::targeting::resolve;
use super::window::{IanaZones, ZoneResolver};

/// Values of `EvaluationResult::reason`.
pub mod reasons {
    pub const MODE_OFF: &str = "mode-off";
    pub const MODE_ON: &str = "mode-on";
    pub const NO_ACTIVE_MODE: &str = "no-active-mode";
    pub const OUTSIDE_SCHEDULE: &str = "outside-schedule";
    pub const OUTSIDE_WINDOW: &str = "outside-window";
    pub const NO_TARGETING_MATCH: &str = "no-targeting-match";
    pub const USER_BLOCKED: &str = "user-blocked";
    pub const TENANT_BLOCKED: &str = "tenant-blocked";
    pub const MISSING_USER_CONTEXT: &str = "missing-user-context";
    pub const MISSING_TENANT_CONTEXT: &str = "missing-tenant-context";
    pub const USER_ROLLOUT_EXCLUDED: &str = "user-rollout-excluded";
    pub const TENANT_ROLLOUT_EXCLUDED: &str = "tenant-rollout-excluded";
    pub const TARGETING_MATCH: &str = "targeting-match";
    pub const GATES_PASSED: &str = "gates-passed";
}

#[derive(Debug, Clone, Copy)]
enum Dimension {
    User,
    Tenant,
}

impl Dimension {
    fn blocked(self) -> &'static str {
        match self {
            Dimension::User => reasons::USER_BLOCKED,
            Dimension::Tenant => reasons::TENANT_BLOCKED,
        }
    }

    fn missing(self) -> &'static str {
        match self {
            Dimension::User => reasons::MISSING_USER_CONTEXT,
            Dimension::Tenant => reasons::MISSING_TENANT_CONTEXT,
        }
    }

    fn rollout_excluded(self) -> &'static str {
        match self {
            Dimension::User => reasons::USER_ROLLOUT_EXCLUDED,
            Dimension::Tenant => reasons::TENANT_ROLLOUT_EXCLUDED,
        }
    }

    fn bucket_key(self) -> &'static str {
        match self {
            Dimension::User => "user_bucket",
            Dimension::Tenant => "tenant_bucket",
        }
    }

    fn select<'a>(
        self,
        options: &'a EvaluationOptions,
        context: &'a EvaluationContext,
    ) -> (&'a AccessControl, Option<&'a str>) {
        match self {
            Dimension::User => (&options.user_access_control, context.user_id()),
            Dimension::Tenant => (&options.tenant_access_control, context.tenant_id()),
        }
    }
}

/// Outcome of a single gate.
enum Verdict {
    Pass,
    /// Targeting chose a variation; later gates still run.
    Selected(String),
    Fail(&'static str),
}

/// Collects per-gate verdicts into the result metadata.
struct Trace {
    metadata: BTreeMap<String, Value>,
    verdicts: Vec<Value>,
}

impl Trace {
    fn new(options: &EvaluationOptions, now: DateTime<Utc>) -> Self {
        let modes: Vec<&str> = options.mode_set.iter().map(|m| m.as_str()).collect();
        let mut metadata = BTreeMap::new();
        metadata.insert("flag_key".to_string(), json!(options.key));
        metadata.insert("evaluated_at".to_string(), json!(now.to_rfc3339()));
        metadata.insert("modes".to_string(), json!(modes));
        Self {
            metadata,
            verdicts: Vec::new(),
        }
    }

    fn record(&mut self, mode: EvaluationMode, verdict: &str) {
        tracing::debug!(mode = %mode, verdict, "gate evaluated");
        self.verdicts.push(json!({ "mode": mode.as_str(), "verdict": verdict }));
    }

    fn note(&mut self, key: &str, value: Value) {
        self.metadata.insert(key.to_string(), value);
    }

    fn finish(mut self) -> BTreeMap<String, Value> {
        self.metadata.insert("verdicts".to_string(), Value::Array(self.verdicts));
        self.metadata
    }
}

/// Runs the pipeline against an injected clock and zone database.
#[derive(Debug, Clone, Default)]
pub struct Evaluator<C = SystemClock, Z = IanaZones> {
    clock: C,
    zones: Z,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<C: Clock, Z: ZoneResolver> Evaluator<C, Z> {
    pub fn with_parts(clock: C, zones: Z) -> Self {
        Self { clock, zones }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn evaluate(
        &self,
        options: &EvaluationOptions,
        context: &EvaluationContext,
    ) -> Result<EvaluationResult, EvaluationError> {
        self.evaluate_at(options, context, self.clock.now())
    }

    /// Evaluates against a caller-captured instant, so a batch of flags
    /// shares one `now`.
    pub fn evaluate_at(
        &self,
        options: &EvaluationOptions,
        context: &EvaluationContext,
        now: DateTime<Utc>,
    ) -> Result<EvaluationResult, EvaluationError> {
        evaluate_with(options, context, now, &self.zones)
    }
}

/// Evaluates a flag at `now` using the compiled IANA zone database.
pub fn evaluate_at(
    options: &EvaluationOptions,
    context: &EvaluationContext,
    now: DateTime<Utc>,
) -> Result<EvaluationResult, EvaluationError> {
    evaluate_with(options, context, now, &IanaZones)
}

/// Decides whether a flag is enabled for a context and which variation it
/// serves.
///
/// `Off` wins over everything. `On` alone enables the flag. Otherwise every
/// gating mode present must pass, consulted in the order of
/// [`EvaluationMode::GATE_ORDER`], and the first failure decides the reason.
pub fn evaluate_with(
    options: &EvaluationOptions,
    context: &EvaluationContext,
    now: DateTime<Utc>,
    zones: &impl ZoneResolver,
) -> Result<EvaluationResult, EvaluationError> {
    let modes = &options.mode_set;
    let mut trace = Trace::new(options, now);

    if modes.is_off() {
        trace.record(EvaluationMode::Off, "forced-off");
        return Ok(finish_disabled(options, reasons::MODE_OFF, trace));
    }
    if modes.is_empty() {
        return Ok(finish_disabled(options, reasons::NO_ACTIVE_MODE, trace));
    }
    if !modes.has_gating_modes() {
        trace.record(EvaluationMode::On, "forced-on");
        let variation = options.variations.default_variation.clone();
        return Ok(finish_enabled(options, variation, reasons::MODE_ON, trace));
    }

    let attributes = if modes.contains(EvaluationMode::TargetingRules) {
        match context.attributes.as_ref() {
            Some(attributes) => Some(attributes),
            None => {
                return Err(EvaluationError::MissingAttributes {
                    flag_key: options.key.clone(),
                })
            }
        }
    } else {
        None
    };
    let targeting_only =
        modes.gates().count() == 1 && modes.contains(EvaluationMode::TargetingRules);

    let mut selected: Option<String> = None;
    for mode in modes.gates() {
        let verdict = match mode {
            EvaluationMode::Scheduled => {
                let phase = options.schedule.phase(now);
                trace.record(mode, phase.as_str());
                match phase {
                    SchedulePhase::Upcoming | SchedulePhase::Expired => {
                        Verdict::Fail(reasons::OUTSIDE_SCHEDULE)
                    }
                    SchedulePhase::Active | SchedulePhase::NotApplicable => Verdict::Pass,
                }
            }
            EvaluationMode::TimeWindow => {
                let window = options.operational_window.check(now, zones);
                trace.record(mode, window.as_str());
                if window.is_open() {
                    Verdict::Pass
                } else {
                    Verdict::Fail(reasons::OUTSIDE_WINDOW)
                }
            }
            EvaluationMode::TargetingRules => {
                let Some(attributes) = attributes else {
                    continue;
                };
                match resolve(&options.targeting_rules, attributes) {
                    Some(matched) => {
                        trace.record(mode, "matched");
                        trace.note("matched_rule", json!(matched.index));
                        Verdict::Selected(matched.variation.to_string())
                    }
                    None => {
                        trace.record(mode, "no-match");
                        if targeting_only && !options.variations.has_default() {
                            Verdict::Fail(reasons::NO_TARGETING_MATCH)
                        } else {
                            Verdict::Pass
                        }
                    }
                }
            }
            EvaluationMode::UserTargeted => {
                targeted_gate(Dimension::User, mode, options, context, &mut trace)
            }
            EvaluationMode::TenantTargeted => {
                targeted_gate(Dimension::Tenant, mode, options, context, &mut trace)
            }
            EvaluationMode::UserRolloutPercentage => {
                rollout_gate(Dimension::User, mode, options, context, &mut trace)
            }
            EvaluationMode::TenantRolloutPercentage => {
                rollout_gate(Dimension::Tenant, mode, options, context, &mut trace)
            }
            EvaluationMode::Off | EvaluationMode::On => Verdict::Pass,
        };

        match verdict {
            Verdict::Pass => {}
            Verdict::Selected(variation) => selected = Some(variation),
            Verdict::Fail(reason) => return Ok(finish_disabled(options, reason, trace)),
        }
    }

    let (variation, reason) = match selected {
        Some(variation) => (variation, reasons::TARGETING_MATCH),
        None => (options.variations.default_variation.clone(), reasons::GATES_PASSED),
    };
    Ok(finish_enabled(options, variation, reason, trace))
}

fn targeted_gate(
    dimension: Dimension,
    mode: EvaluationMode,
    options: &EvaluationOptions,
    context: &EvaluationContext,
    trace: &mut Trace,
) -> Verdict {
    let (control, identifier) = dimension.select(options, context);
    let (decision, basis) = control.decide(identifier, &options.key);
    trace.record(mode, basis.as_str());
    match decision {
        AccessDecision::Allow => Verdict::Pass,
        AccessDecision::Block => Verdict::Fail(dimension.blocked()),
        AccessDecision::Undetermined => Verdict::Fail(dimension.missing()),
    }
}

fn rollout_gate(
    dimension: Dimension,
    mode: EvaluationMode,
    options: &EvaluationOptions,
    context: &EvaluationContext,
    trace: &mut Trace,
) -> Verdict {
    let (control, identifier) = dimension.select(options, context);
    let (admitted, bucket) = control.admits_by_rollout(identifier, &options.key);
    let label = match bucket {
        Some(bucket) => {
            trace.note(dimension.bucket_key(), json!(bucket));
            if admitted {
                "in-rollout"
            } else {
                "outside-rollout"
            }
        }
        None => "missing-identifier",
    };
    trace.record(mode, label);
    if admitted {
        Verdict::Pass
    } else {
        Verdict::Fail(dimension.rollout_excluded())
    }
}

fn finish_disabled(options: &EvaluationOptions, reason: &str, trace: Trace) -> EvaluationResult {
    tracing::debug!(flag = %options.key, reason, "flag disabled");
    EvaluationResult::disabled(reason, trace.finish())
}

fn finish_enabled(
    options: &EvaluationOptions,
    variation: String,
    reason: &str,
    trace: Trace,
) -> EvaluationResult {
    let value = options.variations.value_of(&variation).cloned();
    tracing::debug!(flag = %options.key, %variation, reason, "flag enabled");
    EvaluationResult::enabled(variation, value, reason, trace.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::{
        AccessControl, FixedClock, ModeSet, Operator, TargetingRule, UtcSchedule, UtcTimeWindow,
        Variations,
    };
    use chrono::{Duration, NaiveTime, TimeZone};
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap()
    }

    fn flag(modes: &[EvaluationMode]) -> EvaluationOptions {
        EvaluationOptions {
            key: "checkout-v2".to_string(),
            mode_set: modes.iter().copied().collect::<ModeSet>(),
            variations: Variations::new("on").with_value("on", json!(true)),
            ..EvaluationOptions::default()
        }
    }

    fn user(id: &str) -> EvaluationContext {
        EvaluationContext::new().with_user_id(id)
    }

    fn verdicts(result: &EvaluationResult) -> Vec<(String, String)> {
        result.metadata["verdicts"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| {
                let mode = v["mode"].as_str().unwrap().to_string();
                (mode, v["verdict"].as_str().unwrap().to_string())
            })
            .collect()
    }

    #[test]
    fn test_off_dominates_everything() {
        let options = flag(&[EvaluationMode::Off, EvaluationMode::On, EvaluationMode::UserTargeted])
            .with_user_access(AccessControl::unrestricted().with_allowed("u1"));

        let result = evaluate_at(&options, &user("u1"), now()).unwrap();
        assert!(!result.is_enabled);
        assert_eq!(result.reason, reasons::MODE_OFF);
        assert!(result.variation.is_empty());
    }

    #[test]
    fn test_off_with_targeting_and_no_attributes_is_not_an_error() {
        let options = flag(&[EvaluationMode::Off, EvaluationMode::TargetingRules]);
        let result = evaluate_at(&options, &EvaluationContext::new(), now()).unwrap();
        assert_eq!(result.reason, reasons::MODE_OFF);
    }

    #[test]
    fn test_empty_mode_set_is_disabled() {
        let result = evaluate_at(&flag(&[]), &user("u1"), now()).unwrap();
        assert!(!result.is_enabled);
        assert_eq!(result.reason, reasons::NO_ACTIVE_MODE);
    }

    #[test]
    fn test_on_alone_serves_default_variation() {
        let options = flag(&[EvaluationMode::On]);
        let result = evaluate_at(&options, &EvaluationContext::new(), now()).unwrap();
        assert!(result.is_enabled);
        assert_eq!(result.variation, "on");
        assert_eq!(result.value, Some(json!(true)));
        assert_eq!(result.reason, reasons::MODE_ON);
    }

    #[test]
    fn test_on_does_not_bypass_gates() {
        let options = flag(&[EvaluationMode::On, EvaluationMode::Scheduled])
            .with_schedule(UtcSchedule::new(now() + Duration::days(1), now() + Duration::days(2)));

        let result = evaluate_at(&options, &user("u1"), now()).unwrap();
        assert!(!result.is_enabled);
        assert_eq!(result.reason, reasons::OUTSIDE_SCHEDULE);
    }

    #[test]
    fn test_scheduled_without_schedule_passes() {
        let result = evaluate_at(&flag(&[EvaluationMode::Scheduled]), &user("u1"), now()).unwrap();
        assert!(result.is_enabled);
        assert_eq!(result.reason, reasons::GATES_PASSED);
        assert_eq!(
            verdicts(&result),
            vec![("Scheduled".to_string(), "not-applicable".to_string())]
        );
    }

    #[test]
    fn test_window_closed_disables() {
        let window = UtcTimeWindow::new(
            NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(2, 0, 0).unwrap(),
            "UTC",
            crate::evaluation::window::ALL_WEEKDAYS,
        );
        let options = flag(&[EvaluationMode::TimeWindow]).with_window(window);

        let result = evaluate_at(&options, &user("u1"), now()).unwrap();
        assert_eq!(result.reason, reasons::OUTSIDE_WINDOW);
    }

    #[test]
    fn test_targeting_selects_variation_and_later_gates_still_run() {
        let options = flag(&[EvaluationMode::TargetingRules, EvaluationMode::UserTargeted])
            .with_rule(TargetingRule::new("plan", Operator::Equals, vec!["pro".into()], "gold"))
            .with_user_access(AccessControl::unrestricted().with_blocked("u1"));

        let pro = |id: &str| user(id).with_attribute("plan", "pro");
        let allowed = evaluate_at(&options, &pro("u2"), now()).unwrap();
        assert!(allowed.is_enabled);
        assert_eq!(allowed.variation, "gold");
        assert_eq!(allowed.value, None);
        assert_eq!(allowed.reason, reasons::TARGETING_MATCH);
        assert_eq!(allowed.metadata["matched_rule"], json!(0));

        let blocked = evaluate_at(&options, &pro("u1"), now()).unwrap();
        assert!(!blocked.is_enabled);
        assert_eq!(blocked.reason, reasons::USER_BLOCKED);
    }

    #[test]
    fn test_sole_targeting_without_match_or_default_is_disabled() {
        let mut options = flag(&[EvaluationMode::TargetingRules])
            .with_rule(TargetingRule::new("plan", Operator::Equals, vec!["pro".into()], "gold"));
        options.variations = Variations::default();

        let ctx = EvaluationContext::new().with_attribute("plan", "free");
        let result = evaluate_at(&options, &ctx, now()).unwrap();
        assert!(!result.is_enabled);
        assert_eq!(result.reason, reasons::NO_TARGETING_MATCH);
    }

    #[test]
    fn test_sole_targeting_without_match_falls_back_to_default() {
        let options = flag(&[EvaluationMode::TargetingRules])
            .with_rule(TargetingRule::new("plan", Operator::Equals, vec!["pro".into()], "gold"));

        let ctx = EvaluationContext::new().with_attribute("plan", "free");
        let result = evaluate_at(&options, &ctx, now()).unwrap();
        assert!(result.is_enabled);
        assert_eq!(result.variation, "on");
    }

    #[test]
    fn test_targeting_miss_defers_to_later_gates() {
        let mut options = flag(&[EvaluationMode::TargetingRules, EvaluationMode::UserTargeted])
            .with_rule(TargetingRule::new("plan", Operator::Equals, vec!["pro".into()], "gold"));
        options.variations = Variations::default();

        let result = evaluate_at(&options, &user("u1").with_attribute("plan", "free"), now())
            .unwrap();
        assert!(result.is_enabled);
        assert_eq!(result.reason, reasons::GATES_PASSED);
        assert!(result.variation.is_empty());
        assert_eq!(result.value, None);
        assert!(!result.metadata.contains_key("matched_rule"));
        assert_eq!(
            verdicts(&result),
            vec![
                ("TargetingRules".to_string(), "no-match".to_string()),
                ("UserTargeted".to_string(), "in-rollout".to_string()),
            ]
        );
    }

    #[test]
    fn test_targeting_without_attributes_is_a_contract_violation() {
        let options = flag(&[EvaluationMode::TargetingRules]);
        let err = evaluate_at(&options, &user("u1"), now()).unwrap_err();
        assert_eq!(
            err,
            EvaluationError::MissingAttributes {
                flag_key: "checkout-v2".to_string()
            }
        );
    }

    #[test]
    fn test_missing_user_context_fails_closed() {
        let options = flag(&[EvaluationMode::UserTargeted]);
        let result = evaluate_at(&options, &EvaluationContext::new(), now()).unwrap();
        assert!(!result.is_enabled);
        assert_eq!(result.reason, reasons::MISSING_USER_CONTEXT);

        let options = flag(&[EvaluationMode::TenantTargeted]);
        let result = evaluate_at(&options, &user("u1"), now()).unwrap();
        assert_eq!(result.reason, reasons::MISSING_TENANT_CONTEXT);
    }

    #[test]
    fn test_tenant_block_list_disables() {
        let options = flag(&[EvaluationMode::TenantTargeted])
            .with_tenant_access(AccessControl::unrestricted().with_blocked("t1"));

        let blocked = evaluate_at(&options, &user("u1").with_tenant_id("t1"), now()).unwrap();
        assert!(!blocked.is_enabled);
        assert_eq!(blocked.reason, reasons::TENANT_BLOCKED);
        assert!(blocked.variation.is_empty());
        assert_eq!(
            verdicts(&blocked),
            vec![("TenantTargeted".to_string(), "block-list".to_string())]
        );

        let other = evaluate_at(&options, &user("u1").with_tenant_id("t2"), now()).unwrap();
        assert!(other.is_enabled);
    }

    #[test]
    fn test_rollout_ignores_allow_list() {
        let access = AccessControl::unrestricted()
            .with_rollout_percentage(0)
            .with_allowed("vip");
        let options = flag(&[EvaluationMode::UserRolloutPercentage]).with_user_access(access);

        let result = evaluate_at(&options, &user("vip"), now()).unwrap();
        assert!(!result.is_enabled);
        assert_eq!(result.reason, reasons::USER_ROLLOUT_EXCLUDED);
        assert!(result.metadata.contains_key("user_bucket"));
    }

    #[test]
    fn test_tenant_rollout_requires_tenant() {
        let options = flag(&[EvaluationMode::TenantRolloutPercentage]);

        let missing = evaluate_at(&options, &user("u1"), now()).unwrap();
        assert_eq!(missing.reason, reasons::TENANT_ROLLOUT_EXCLUDED);

        let present = evaluate_at(&options, &user("u1").with_tenant_id("acme"), now()).unwrap();
        assert!(present.is_enabled);
        assert!(present.metadata.contains_key("tenant_bucket"));
    }

    #[test]
    fn test_gates_run_in_fixed_order() {
        let options = flag(&[
            EvaluationMode::TenantRolloutPercentage,
            EvaluationMode::UserTargeted,
            EvaluationMode::Scheduled,
            EvaluationMode::TimeWindow,
        ]);
        let ctx = user("u1").with_tenant_id("acme");

        let result = evaluate_at(&options, &ctx, now()).unwrap();
        let modes: Vec<String> = verdicts(&result).into_iter().map(|(m, _)| m).collect();
        assert_eq!(
            modes,
            vec!["Scheduled", "TimeWindow", "UserTargeted", "TenantRolloutPercentage"]
        );
    }

    #[test]
    fn test_evaluator_uses_injected_clock() {
        let schedule = UtcSchedule::new(now(), now() + Duration::hours(1));
        let options = flag(&[EvaluationMode::Scheduled]).with_schedule(schedule);

        let inside = Evaluator::with_parts(FixedClock(now()), IanaZones);
        let outside = Evaluator::with_parts(FixedClock(now() + Duration::hours(2)), IanaZones);

        assert!(inside.evaluate(&options, &user("u1")).unwrap().is_enabled);
        assert!(!outside.evaluate(&options, &user("u1")).unwrap().is_enabled);
    }

    #[test]
    fn test_evaluator_at_captured_instant() {
        let schedule = UtcSchedule::new(now(), now() + Duration::hours(1));
        let options = flag(&[EvaluationMode::Scheduled]).with_schedule(schedule);
        let evaluator = Evaluator::with_parts(FixedClock(now() + Duration::hours(2)), IanaZones);

        assert_eq!(evaluator.now(), now() + Duration::hours(2));
        assert!(evaluator.evaluate_at(&options, &user("u1"), now()).unwrap().is_enabled);
    }

    #[test]
    fn test_metadata_is_always_populated() {
        let options = flag(&[EvaluationMode::On]);
        let result = evaluate_at(&options, &EvaluationContext::new(), now()).unwrap();
        assert_eq!(result.metadata["flag_key"], json!("checkout-v2"));
        assert_eq!(result.metadata["modes"], json!(["On"]));
        assert!(result.metadata.contains_key("evaluated_at"));
        assert!(result.metadata.contains_key("verdicts"));
    }
}
