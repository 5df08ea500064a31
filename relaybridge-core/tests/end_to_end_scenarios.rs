use chrono::Utc;

use relaybridge_contracts::persistence::{ApprovalRepository, QuotaRepository};
use relaybridge_core::approval;
use relaybridge_core::persistence::InMemoryStore;
use relaybridge_model::{
    ApprovalTrigger, ContentType, Guid, MonthEndPolicy, QuotaRecord, QuotaWindow, RoutingBundle,
    RoutingDecision, RoutingSpec, User, UserId,
};

fn sample_user(requires_approval: bool) -> User {
    let now = Utc::now();
    User {
        id: UserId::new(),
        name: "alice".into(),
        plex_uuid: None,
        alias: None,
        email: None,
        chat_id: None,
        notify_flags: relaybridge_model::NotifyFlags::default(),
        can_sync: true,
        is_primary_token: false,
        requires_approval,
        created_at: now,
        updated_at: now,
    }
}

fn routed_decision() -> RoutingDecision {
    RoutingDecision::Route(RoutingBundle {
        specs: vec![RoutingSpec::from_instance_defaults(
            relaybridge_model::DownstreamKind::Radarr,
            relaybridge_model::InstanceId::new(),
            &relaybridge_model::InstanceDefaults::default(),
            0,
        )],
    })
}

/// Scenario 3 (quota + approval): a user at their monthly limit gets a
/// pending approval on the next request, and approving it records one more
/// unit of usage.
#[tokio::test]
async fn quota_exceeded_requires_approval_then_records_usage_on_approve() {
    let store = InMemoryStore::new();
    let user = sample_user(false);
    let quota = QuotaRecord {
        user_id: user.id,
        content_type: ContentType::Movie,
        window: QuotaWindow::Monthly { reset_day: 1, month_end_policy: MonthEndPolicy::NextMonth },
        limit: 3,
        bypass_approval: false,
    };
    let now = Utc::now();
    for _ in 0..3 {
        store.record_usage(&relaybridge_model::UsageEvent { user_id: user.id, content_type: ContentType::Movie, ts: now }).await.unwrap();
    }

    let decision = approval::resolve_trigger(&user, ContentType::Movie, routed_decision(), &[quota], &store, now).await.unwrap();
    let RoutingDecision::RequireApproval(requirement) = decision else {
        panic!("expected an approval requirement once quota is exceeded");
    };
    assert_eq!(requirement.triggered_by, ApprovalTrigger::QuotaExceeded);
    assert_eq!(requirement.reason, "monthly quota exceeded (3/3)");

    let request = approval::request_approval(
        &store,
        user.id,
        ContentType::Movie,
        "Another Movie".into(),
        "tmdb:99".into(),
        vec![Guid::parse("tmdb:99").unwrap()],
        requirement.reason,
        requirement.triggered_by,
        requirement.proposed_routing,
        None,
    )
    .await
    .unwrap();

    let (approved, fulfilled) = approval::approve_with_fulfillment(&store, request.id, Some(user.id)).await.unwrap();
    assert_eq!(approved.status, relaybridge_model::ApprovalStatus::Approved);
    assert!(fulfilled.is_empty());

    approval::record_usage(&store, user.id, ContentType::Movie).await.unwrap();
    let usage = store.usage_since(user.id, ContentType::Movie, now - chrono::Duration::hours(1)).await.unwrap();
    assert_eq!(usage, 4);
}

/// Scenario 4 (cross-user fulfillment): two users pending approval for the
/// same content; approving one auto-approves the other with a note, and
/// neither approval is ever double-resolved.
#[tokio::test]
async fn approving_one_user_fulfills_the_other_pending_request_for_same_content() {
    let store = InMemoryStore::new();
    let user_c = sample_user(false);
    let user_d = sample_user(false);
    let shared_guid = Guid::parse("tmdb:42").unwrap();

    let request_c = approval::request_approval(
        &store,
        user_c.id,
        ContentType::Movie,
        "Shared Movie".into(),
        "tmdb:42".into(),
        vec![shared_guid.clone()],
        "manual".into(),
        ApprovalTrigger::Manual,
        RoutingBundle { specs: vec![] },
        None,
    )
    .await
    .unwrap();

    let request_d = approval::request_approval(
        &store,
        user_d.id,
        ContentType::Movie,
        "Shared Movie".into(),
        "tmdb:42".into(),
        vec![shared_guid],
        "manual".into(),
        ApprovalTrigger::Manual,
        RoutingBundle { specs: vec![] },
        None,
    )
    .await
    .unwrap();
    assert_ne!(request_c.id, request_d.id);

    let (approved_c, fulfilled) = approval::approve_with_fulfillment(&store, request_c.id, Some(user_c.id)).await.unwrap();
    assert_eq!(approved_c.status, relaybridge_model::ApprovalStatus::Approved);
    assert_eq!(fulfilled.len(), 1);
    assert_eq!(fulfilled[0].id, request_d.id);
    assert_eq!(fulfilled[0].approval_notes.as_deref(), Some("content already available"));

    let refetched_d = store.get(request_d.id).await.unwrap();
    assert_eq!(refetched_d.status, relaybridge_model::ApprovalStatus::Approved);

    // D's already-resolved request cannot be resolved a second time.
    let err = approval::reject(&store, request_d.id, None).await;
    assert!(err.is_err());
}

/// Scenario 3 boundary: creating an approval, expiring it, then requesting
/// the same content again reuses the row instead of inserting a duplicate.
#[tokio::test]
async fn expired_approval_is_reused_not_duplicated() {
    let store = InMemoryStore::new();
    let user = sample_user(false);

    let first = approval::request_approval(
        &store,
        user.id,
        ContentType::Movie,
        "Movie".into(),
        "tmdb:7".into(),
        vec![],
        "manual".into(),
        ApprovalTrigger::Manual,
        RoutingBundle { specs: vec![] },
        Some(Utc::now() - chrono::Duration::hours(1)),
    )
    .await
    .unwrap();

    let expired_count = approval::expire_overdue(&store, Utc::now()).await.unwrap();
    assert_eq!(expired_count, 1);

    let second = approval::request_approval(
        &store,
        user.id,
        ContentType::Movie,
        "Movie".into(),
        "tmdb:7".into(),
        vec![],
        "manual".into(),
        ApprovalTrigger::Manual,
        RoutingBundle { specs: vec![] },
        None,
    )
    .await
    .unwrap();

    assert_eq!(second.id, first.id);
    assert_eq!(second.status, relaybridge_model::ApprovalStatus::Pending);
}
