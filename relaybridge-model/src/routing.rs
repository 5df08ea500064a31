//! Router rules, condition trees, and routing decisions (spec §3, §4.D).

use serde_json::Value;

use crate::ids::{InstanceId, RuleId};
use crate::instance::{InstanceDefaults, MinimumAvailability, SeasonMonitoring, SeriesType};
use crate::watchlist::DownstreamKind;

/// Comparison operators a condition leaf may use (spec §4.D).
///
/// A missing operator on a persisted rule defaults to [`Operator::Equals`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum Operator {
    #[default]
    Equals,
    NotEquals,
    Contains,
    NotContains,
    In,
    NotIn,
    Regex,
}

/// A rule's criteria, expressed either as a single-evaluator shorthand or as
/// a full condition tree (spec §3 "conditional rules carry a `condition`
/// tree").
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Criteria {
    /// `{field, operator?, value}` matched by the evaluator named in
    /// [`RouterRule::evaluator_name`].
    Simple { field: String, operator: Operator, value: Value },
    /// A full [`Condition`] tree, used when `type == "conditional"`.
    Conditional(Condition),
}

/// A condition tree node: either a leaf comparison or a boolean group.
///
/// Invariant (spec §4.D, §9): negation applies exactly once at the node
/// where it appears. [`Condition::evaluate`] in the routing engine is the
/// single place negation is applied; this type only carries the flag.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum Condition {
    Leaf {
        field: String,
        operator: Operator,
        value: Value,
        #[cfg_attr(feature = "serde", serde(default))]
        negate: bool,
    },
    Group {
        op: BoolOp,
        children: Vec<Condition>,
        #[cfg_attr(feature = "serde", serde(default))]
        negate: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BoolOp {
    And,
    Or,
}

/// A persisted routing rule (spec §3).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RouterRule {
    pub id: RuleId,
    pub name: String,
    /// Evaluator name (e.g. `"genre"`), or `None` for a conditional rule.
    pub evaluator_name: Option<String>,
    pub criteria: Criteria,
    pub target_type: DownstreamKind,
    pub target_instance_id: InstanceId,
    pub root_folder: Option<String>,
    pub quality_profile: Option<String>,
    pub tags: Vec<String>,
    /// Priority; higher wins (spec §3, §4.D selection: `(max order, min id)`).
    pub order: i32,
    pub enabled: bool,
    pub search_on_add: Option<bool>,
    pub season_monitoring: Option<SeasonMonitoring>,
    pub series_type: Option<SeriesType>,
    pub minimum_availability: Option<MinimumAvailability>,
    pub metadata: Option<Value>,
}

/// Default priority applied to a [`RoutingSpec`] when the winning rule left
/// `order` unset (spec §4.D "Outputs").
pub const DEFAULT_ROUTING_PRIORITY: i32 = 50;

/// Fully resolved routing target for one instance (primary or synced).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RoutingSpec {
    pub instance_type: DownstreamKind,
    pub instance_id: InstanceId,
    pub root_folder: Option<String>,
    pub quality_profile: Option<String>,
    pub tags: Vec<String>,
    pub search_on_add: Option<bool>,
    pub season_monitoring: Option<SeasonMonitoring>,
    pub series_type: Option<SeriesType>,
    pub minimum_availability: Option<MinimumAvailability>,
    pub synced_instances: Vec<InstanceId>,
    pub priority: i32,
}

impl RoutingSpec {
    /// Builds a synced-target spec that always uses `defaults`, never the
    /// primary rule's overrides (spec §9 Open Question i: resolved in favor
    /// of "their own defaults" for correctness and consistency).
    pub fn from_instance_defaults(
        instance_type: DownstreamKind,
        instance_id: InstanceId,
        defaults: &InstanceDefaults,
        priority: i32,
    ) -> Self {
        Self {
            instance_type,
            instance_id,
            root_folder: defaults.root_folder.clone(),
            quality_profile: defaults.quality_profile.clone(),
            tags: defaults.tags.clone(),
            search_on_add: defaults.search_on_add,
            season_monitoring: defaults.season_monitoring,
            series_type: defaults.series_type,
            minimum_availability: defaults.minimum_availability,
            synced_instances: Vec::new(),
            priority,
        }
    }
}

/// Reason an approval was triggered (spec §3, §4.E).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ApprovalTrigger {
    QuotaExceeded,
    RouterRule,
    UserRequiresApproval,
    Manual,
}

/// Outcome of an approval requirement (spec §4.D, §4.E).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ApprovalRequirement {
    pub reason: String,
    pub triggered_by: ApprovalTrigger,
    pub proposed_routing: RoutingBundle,
}

/// The full set of [`RoutingSpec`]s (primary + synced) for one item, as
/// produced by the routing engine and, when approval is required, snapshotted
/// verbatim onto the [`crate::approval::ApprovalRequest`] (spec §3
/// "proposed_router_decision").
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RoutingBundle {
    pub specs: Vec<RoutingSpec>,
}

/// A routing decision (spec §4.D, GLOSSARY): skip, route, or require
/// approval.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RoutingDecision {
    Skip,
    Route(RoutingBundle),
    RequireApproval(ApprovalRequirement),
}
