//! Downstream Sonarr/Radarr instance configuration (spec §3).

use crate::ids::InstanceId;
use crate::watchlist::DownstreamKind;

/// Rolling-monitoring-aware monitor setting for shows (spec §4.D).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum SeasonMonitoring {
    All,
    Future,
    Missing,
    Existing,
    Pilot,
    FirstSeason,
    LatestSeason,
    /// Starts minimal, expands as the user watches (spec §4.D, §4.F).
    PilotRolling,
    FirstSeasonRolling,
    None,
}

impl SeasonMonitoring {
    /// Translates a rolling policy to the closest concrete value for
    /// submission to Sonarr (spec §4.D: "translated at submission time").
    pub fn to_concrete(self) -> SeasonMonitoring {
        match self {
            SeasonMonitoring::PilotRolling => SeasonMonitoring::Pilot,
            SeasonMonitoring::FirstSeasonRolling => SeasonMonitoring::FirstSeason,
            other => other,
        }
    }

    pub fn is_rolling(self) -> bool {
        matches!(
            self,
            SeasonMonitoring::PilotRolling | SeasonMonitoring::FirstSeasonRolling
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum SeriesType {
    Standard,
    Daily,
    Anime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum MinimumAvailability {
    Announced,
    InCinemas,
    Released,
}

/// Per-instance defaults applied when no rule override is present, or when a
/// synced instance fans out (spec §4.D: synced targets use their own
/// defaults, never the primary rule's overrides).
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InstanceDefaults {
    pub root_folder: Option<String>,
    pub quality_profile: Option<String>,
    pub tags: Vec<String>,
    pub search_on_add: Option<bool>,
    pub season_monitoring: Option<SeasonMonitoring>,
    pub series_type: Option<SeriesType>,
    pub minimum_availability: Option<MinimumAvailability>,
}

/// A configured Sonarr or Radarr instance (spec §3).
///
/// Invariant: at most one default per [`DownstreamKind`]; a non-default
/// instance cannot carry `synced_instances`. Enforced by the router/instance
/// repository on write, not by this type alone (spec §4.K: whitelisted-update
/// validation lives at the persistence boundary).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DownstreamInstance {
    pub id: InstanceId,
    pub name: String,
    pub target_type: DownstreamKind,
    pub base_url: url::Url,
    /// Zeroized on drop; never logged or included in `Debug` output verbatim.
    pub api_key: ApiKey,
    pub is_default: bool,
    pub synced_instances: Vec<InstanceId>,
    pub defaults: InstanceDefaults,
}

/// A secret credential that scrubs itself from memory on drop.
///
/// Grounded on the teacher's workspace-wide `zeroize` dependency, used here
/// for the one piece of this model that is a live credential.
#[derive(Clone, zeroize::Zeroize, zeroize::ZeroizeOnDrop)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(\"***\")")
    }
}

impl DownstreamInstance {
    /// True if `other` is reachable as a synced fan-out target of `self`.
    pub fn syncs_to(&self, other: InstanceId) -> bool {
        self.synced_instances.contains(&other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rolling_monitoring_translates_to_concrete() {
        assert_eq!(
            SeasonMonitoring::PilotRolling.to_concrete(),
            SeasonMonitoring::Pilot
        );
        assert_eq!(
            SeasonMonitoring::FirstSeasonRolling.to_concrete(),
            SeasonMonitoring::FirstSeason
        );
        assert_eq!(SeasonMonitoring::All.to_concrete(), SeasonMonitoring::All);
    }

    #[test]
    fn api_key_debug_never_leaks() {
        let key = ApiKey::new("super-secret");
        assert_eq!(format!("{key:?}"), "ApiKey(\"***\")");
    }
}
