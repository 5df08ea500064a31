//! The routing engine: evaluator registry, condition-tree evaluation,
//! priority selection, and fan-out (spec §4.D).
//!
//! Grounded on `ferrex-core::query::decision_engine` for the registry-of-
//! named-strategies shape (dispatch by capability, not inheritance — see
//! `ferrex-core/src/query/decision_engine/{mod,analyzers,types}.rs`) and on
//! `ferrex-core::query::filtering` for condition-tree evaluation idioms.

use std::collections::HashSet;

use regex::RegexBuilder;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use relaybridge_model::{
    ApprovalRequirement, ApprovalTrigger, BoolOp, Condition, Criteria, DownstreamInstance,
    DownstreamKind, InstanceId, Operator, RoutingBundle, RoutingDecision, RoutingSpec, RuleId,
    RouterRule, WatchlistItem, DEFAULT_ROUTING_PRIORITY,
};

#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("no default instance configured for {0:?}")]
    NoDefaultInstance(DownstreamKind),

    #[error("rule {0} references unknown instance {1}")]
    UnknownInstance(RuleId, InstanceId),
}

pub type Result<T> = std::result::Result<T, RoutingError>;

/// Context an evaluator needs beyond the item itself — the content's target
/// type and anything a field comparison must read (spec §4.D).
#[derive(Debug, Clone)]
pub struct EvaluationContext<'a> {
    pub item: &'a WatchlistItem,
    pub target_type: DownstreamKind,
}

/// A named evaluator capability (spec §4.D, §9 "plugin-like evaluators"): a
/// single capability set every concrete evaluator (genre, language,
/// certification, year, user, season-count, rating, streaming-provider)
/// implements; dispatch is by capability, never by inheritance.
pub trait Evaluator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fields this evaluator knows how to compare.
    fn supported_fields(&self) -> &'static [&'static str];

    /// Whether this evaluator applies to `ctx` at all; concrete evaluators
    /// override this to narrow by content type or other context.
    fn can_evaluate(&self, _ctx: &EvaluationContext<'_>) -> bool {
        true
    }

    /// Resolves a single comparison value out of the item for `field`.
    fn field_value(&self, field: &str, item: &WatchlistItem) -> Option<Value>;
}

/// A registry of evaluators indexed by name, consulted by the engine when a
/// condition leaf's field matches one of their `supported_fields`.
#[derive(Default)]
pub struct EvaluatorRegistry {
    evaluators: Vec<Box<dyn Evaluator>>,
}

impl EvaluatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, evaluator: Box<dyn Evaluator>) -> &mut Self {
        self.evaluators.push(evaluator);
        self
    }

    fn resolve_field(&self, field: &str, item: &WatchlistItem) -> Option<Value> {
        self.evaluators.iter().find_map(|e| {
            if e.supported_fields().contains(&field) {
                e.field_value(field, item)
            } else {
                None
            }
        })
    }
}

/// Compiles `pattern` with a bounded size budget, rejecting patterns that
/// could cause catastrophic backtracking (spec §4.D "Regex patterns are
/// validated for safety").
fn safe_regex(pattern: &str) -> Option<regex::Regex> {
    RegexBuilder::new(pattern)
        .size_limit(1 << 20)
        .dfa_size_limit(1 << 20)
        .build()
        .ok()
}

/// Case-insensitive string form of a JSON scalar/array element, for
/// comparisons (spec §4.D "Normalization: string comparisons are case-
/// insensitive").
fn as_compare_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.to_lowercase()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn as_string_set(value: &Value) -> Option<HashSet<String>> {
    match value {
        Value::Array(items) => Some(items.iter().filter_map(as_compare_string).collect()),
        other => as_compare_string(other).map(|s| HashSet::from([s])),
    }
}

/// Evaluates one `(operator, actual, expected)` triple. A missing, empty, or
/// wrong-type criterion value disqualifies the rule (returns `false`); an
/// unsafe regex evaluates to `false` with a warning, never raises (spec
/// §4.D, §7, §8).
fn evaluate_operator(operator: Operator, actual: &Value, expected: &Value) -> bool {
    match operator {
        Operator::Equals => as_compare_string(actual) == as_compare_string(expected),
        Operator::NotEquals => as_compare_string(actual) != as_compare_string(expected),
        Operator::Contains | Operator::NotContains => {
            let found = match (as_string_set(actual), as_compare_string(expected)) {
                (Some(set), Some(needle)) => set.contains(&needle),
                _ => false,
            };
            if operator == Operator::Contains {
                found
            } else {
                !found
            }
        }
        Operator::In | Operator::NotIn => {
            let found = match (as_compare_string(actual), as_string_set(expected)) {
                (Some(needle), Some(set)) => set.contains(&needle),
                _ => false,
            };
            if operator == Operator::In {
                found
            } else {
                !found
            }
        }
        Operator::Regex => {
            let (Some(actual), Some(pattern)) = (as_compare_string(actual), expected.as_str()) else {
                return false;
            };
            match safe_regex(pattern) {
                Some(re) => re.is_match(&actual),
                None => {
                    warn!(pattern, "rejecting unsafe or invalid regex, evaluating to false");
                    false
                }
            }
        }
    }
}

/// Evaluation behavior for a condition tree. Defined locally (rather than as
/// an inherent impl) because `Condition` lives in `relaybridge-model`.
trait ConditionEval {
    fn evaluate(&self, registry: &EvaluatorRegistry, item: &WatchlistItem) -> bool;
    fn negate(&self) -> bool;
}

impl ConditionEval for Condition {
    /// Evaluates this condition tree against `item`, short-circuiting AND/OR
    /// groups and applying `negate` exactly once at the node where it
    /// appears (spec §4.D, §9).
    fn evaluate(&self, registry: &EvaluatorRegistry, item: &WatchlistItem) -> bool {
        let raw = match self {
            Condition::Leaf { field, operator, value, .. } => {
                match registry.resolve_field(field, item) {
                    Some(actual) => evaluate_operator(*operator, &actual, value),
                    None => false,
                }
            }
            Condition::Group { op, children, .. } => match op {
                BoolOp::And => children.iter().all(|c| c.evaluate(registry, item)),
                BoolOp::Or => children.iter().any(|c| c.evaluate(registry, item)),
            },
        };
        if self.negate() {
            !raw
        } else {
            raw
        }
    }

    fn negate(&self) -> bool {
        match self {
            Condition::Leaf { negate, .. } | Condition::Group { negate, .. } => *negate,
        }
    }
}

/// Whether `rule` matches `item`, dispatching simple criteria to the
/// evaluator whose `evaluator_name` matches (spec §4.D).
fn rule_matches(rule: &RouterRule, registry: &EvaluatorRegistry, item: &WatchlistItem) -> bool {
    match &rule.criteria {
        Criteria::Conditional(condition) => condition.evaluate(registry, item),
        Criteria::Simple { field, operator, value } => match registry.resolve_field(field, item) {
            Some(actual) => evaluate_operator(*operator, &actual, value),
            None => false,
        },
    }
}

/// Finds the default instance for `target_type` (spec §4.D "falls back to
/// the default instance for that target_type").
fn default_instance(instances: &[DownstreamInstance], target_type: DownstreamKind) -> Option<&DownstreamInstance> {
    instances.iter().find(|i| i.target_type == target_type && i.is_default)
}

fn instance_by_id(instances: &[DownstreamInstance], id: InstanceId) -> Option<&DownstreamInstance> {
    instances.iter().find(|i| i.id == id)
}

fn priority_of(rule: &RouterRule) -> i32 {
    rule.order
}

/// Builds the fan-out [`RoutingBundle`] for `primary` (using the winning
/// rule's overrides when present) plus each of its synced instances (using
/// their own defaults — spec §9 Open Question i) (spec §4.D "Outputs").
fn build_bundle(
    primary: &DownstreamInstance,
    rule: Option<&RouterRule>,
    instances: &[DownstreamInstance],
) -> RoutingBundle {
    let priority = rule.map(priority_of).unwrap_or(DEFAULT_ROUTING_PRIORITY);
    let primary_spec = RoutingSpec {
        instance_type: primary.target_type,
        instance_id: primary.id,
        root_folder: rule.and_then(|r| r.root_folder.clone()).or_else(|| primary.defaults.root_folder.clone()),
        quality_profile: rule
            .and_then(|r| r.quality_profile.clone())
            .or_else(|| primary.defaults.quality_profile.clone()),
        tags: rule.map(|r| r.tags.clone()).filter(|t| !t.is_empty()).unwrap_or_else(|| primary.defaults.tags.clone()),
        search_on_add: rule.and_then(|r| r.search_on_add).or(primary.defaults.search_on_add),
        season_monitoring: rule.and_then(|r| r.season_monitoring).or(primary.defaults.season_monitoring),
        series_type: rule.and_then(|r| r.series_type).or(primary.defaults.series_type),
        minimum_availability: rule.and_then(|r| r.minimum_availability).or(primary.defaults.minimum_availability),
        synced_instances: primary.synced_instances.clone(),
        priority,
    };

    let mut specs = vec![primary_spec];
    for synced_id in &primary.synced_instances {
        if let Some(synced) = instance_by_id(instances, *synced_id) {
            specs.push(RoutingSpec::from_instance_defaults(
                synced.target_type,
                synced.id,
                &synced.defaults,
                priority,
            ));
        }
    }
    RoutingBundle { specs }
}

/// Evaluates every enabled rule targeting `item.target_type()`, selects the
/// winner by `(max order, min id)`, and returns the resulting
/// [`RoutingDecision`] — never `RequireApproval` on its own; callers layer
/// approval/quota requirements (§4.E) on top of a `Route` decision (spec
/// §4.D "Selection & fan-out").
pub fn route(
    item: &WatchlistItem,
    rules: &[RouterRule],
    instances: &[DownstreamInstance],
    registry: &EvaluatorRegistry,
) -> Result<RoutingDecision> {
    let target_type = item.target_type();
    let mut matching: Vec<&RouterRule> = rules
        .iter()
        .filter(|r| r.enabled && r.target_type == target_type)
        .filter(|r| rule_matches(r, registry, item))
        .collect();

    matching.sort_by(|a, b| b.order.cmp(&a.order).then_with(|| a.id.cmp(&b.id)));

    let Some(winner) = matching.first() else {
        let Some(fallback) = default_instance(instances, target_type) else {
            return Err(RoutingError::NoDefaultInstance(target_type));
        };
        return Ok(RoutingDecision::Route(build_bundle(fallback, None, instances)));
    };

    let Some(primary) = instance_by_id(instances, winner.target_instance_id) else {
        return Err(RoutingError::UnknownInstance(winner.id, winner.target_instance_id));
    };

    Ok(RoutingDecision::Route(build_bundle(primary, Some(winner), instances)))
}

/// Wraps a `Route` decision into a `RequireApproval` one, snapshotting the
/// proposed routing verbatim (spec §4.E "A rule's require_approval includes
/// proposed_routing so the decision is fully captured").
pub fn require_approval(
    decision: RoutingDecision,
    reason: impl Into<String>,
    triggered_by: ApprovalTrigger,
) -> RoutingDecision {
    match decision {
        RoutingDecision::Route(bundle) => RoutingDecision::RequireApproval(ApprovalRequirement {
            reason: reason.into(),
            triggered_by,
            proposed_routing: bundle,
        }),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use relaybridge_model::{ContentType, InstanceDefaults, UserId, WatchlistItemId, WatchlistStatus};

    struct GenreEvaluator;
    impl Evaluator for GenreEvaluator {
        fn name(&self) -> &'static str {
            "genre"
        }
        fn supported_fields(&self) -> &'static [&'static str] {
            &["genre", "genres"]
        }
        fn field_value(&self, _field: &str, item: &WatchlistItem) -> Option<Value> {
            Some(Value::Array(item.genres.iter().cloned().map(Value::String).collect()))
        }
    }

    fn registry() -> EvaluatorRegistry {
        let mut r = EvaluatorRegistry::new();
        r.register(Box::new(GenreEvaluator));
        r
    }

    fn sample_item(genres: &[&str]) -> WatchlistItem {
        WatchlistItem {
            id: WatchlistItemId::new(),
            user_id: UserId::new(),
            key: "1".into(),
            title: "Show".into(),
            content_type: ContentType::Show,
            thumb: None,
            added: None,
            guids: Vec::new(),
            genres: genres.iter().map(|s| s.to_string()).collect(),
            status: WatchlistStatus::Pending,
            series_status: None,
            movie_status: None,
            sonarr_instance_id: None,
            radarr_instance_id: None,
            last_notified_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn instance(id: InstanceId, is_default: bool, synced: Vec<InstanceId>) -> DownstreamInstance {
        DownstreamInstance {
            id,
            name: "sonarr".into(),
            target_type: DownstreamKind::Sonarr,
            base_url: url::Url::parse("http://localhost:8989").unwrap(),
            api_key: relaybridge_model::ApiKey::new("key"),
            is_default,
            synced_instances: synced,
            defaults: InstanceDefaults::default(),
        }
    }

    #[test]
    fn falls_back_to_default_when_no_rule_matches() {
        let default_id = InstanceId::new();
        let instances = vec![instance(default_id, true, Vec::new())];
        let item = sample_item(&["Drama"]);
        let decision = route(&item, &[], &instances, &registry()).unwrap();
        match decision {
            RoutingDecision::Route(bundle) => assert_eq!(bundle.specs[0].instance_id, default_id),
            _ => panic!("expected route"),
        }
    }

    #[test]
    fn higher_order_rule_wins_and_fans_out_to_synced() {
        let default_id = InstanceId::new();
        let anime_id = InstanceId::new();
        let synced_id = InstanceId::new();
        let instances = vec![
            instance(default_id, true, Vec::new()),
            instance(anime_id, false, vec![synced_id]),
            instance(synced_id, false, Vec::new()),
        ];
        let rule = RouterRule {
            id: RuleId::new(),
            name: "anime".into(),
            evaluator_name: Some("genre".into()),
            criteria: Criteria::Simple { field: "genre".into(), operator: Operator::Contains, value: Value::String("anime".into()) },
            target_type: DownstreamKind::Sonarr,
            target_instance_id: anime_id,
            root_folder: None,
            quality_profile: None,
            tags: Vec::new(),
            order: 80,
            enabled: true,
            search_on_add: None,
            season_monitoring: None,
            series_type: None,
            minimum_availability: None,
            metadata: None,
        };
        let item = sample_item(&["Anime", "Action"]);
        let decision = route(&item, &[rule], &instances, &registry()).unwrap();
        match decision {
            RoutingDecision::Route(bundle) => {
                assert_eq!(bundle.specs.len(), 2);
                assert_eq!(bundle.specs[0].instance_id, anime_id);
                assert_eq!(bundle.specs[1].instance_id, synced_id);
            }
            _ => panic!("expected route"),
        }
    }

    #[test]
    fn ties_broken_by_lowest_rule_id() {
        let instance_a = InstanceId::new();
        let instance_b = InstanceId::new();
        let instances = vec![instance(instance_a, false, Vec::new()), instance(instance_b, false, Vec::new())];

        fn make_rule(target_instance_id: InstanceId) -> RouterRule {
            RouterRule {
                id: RuleId::new(),
                name: "a".into(),
                evaluator_name: Some("genre".into()),
                criteria: Criteria::Simple {
                    field: "genre".into(),
                    operator: Operator::Contains,
                    value: Value::String("drama".into()),
                },
                target_type: DownstreamKind::Sonarr,
                target_instance_id,
                root_folder: None,
                quality_profile: None,
                tags: Vec::new(),
                order: 50,
                enabled: true,
                search_on_add: None,
                season_monitoring: None,
                series_type: None,
                minimum_availability: None,
                metadata: None,
            }
        }

        let rule_a = make_rule(instance_a);
        let rule_b = make_rule(instance_b);
        let expected_instance = if rule_a.id < rule_b.id { instance_a } else { instance_b };
        let item = sample_item(&["Drama"]);
        let decision = route(&item, &[rule_a, rule_b], &instances, &registry()).unwrap();
        match decision {
            RoutingDecision::Route(bundle) => assert_eq!(bundle.specs[0].instance_id, expected_instance),
            _ => panic!("expected route"),
        }
    }

    #[test]
    fn unsafe_regex_evaluates_false_not_panic() {
        let leaf = Condition::Leaf {
            field: "genre".into(),
            operator: Operator::Regex,
            value: Value::String("(a+)+$".into()),
            negate: false,
        };
        let item = sample_item(&["a"]);
        assert!(!leaf.evaluate(&registry(), &item));
    }
}
