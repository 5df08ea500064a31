use uuid::Uuid;

macro_rules! uuid_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub struct $name(pub Uuid);

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl $name {
            /// Generates a new time-ordered identifier.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }
    };
}

uuid_id!(UserId, "Identifies a watchlist-owning user.");
uuid_id!(WatchlistItemId, "Identifies a watchlist item.");
uuid_id!(RuleId, "Identifies a router rule.");
uuid_id!(InstanceId, "Identifies a downstream Sonarr/Radarr instance.");
uuid_id!(ApprovalId, "Identifies an approval request.");
uuid_id!(ScheduledJobId, "Identifies a scheduled job.");
uuid_id!(NotificationId, "Identifies a notification record.");

impl UserId {
    /// The reserved "System" user id (spec §3: "id 0, never deleted").
    ///
    /// Every other id in this crate is a fresh UUIDv7; the System user is the
    /// one entity with a fixed, well-known identity, so it is pinned to the
    /// nil UUID rather than a freshly generated one.
    pub const SYSTEM: UserId = UserId(Uuid::nil());

    /// True when this is the reserved, undeletable System user.
    pub fn is_system(&self) -> bool {
        *self == Self::SYSTEM
    }
}
