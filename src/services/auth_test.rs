use super::*;
use crate::state::test_helpers;

#[tokio::test]
async fn missing_token_resolves_anonymous() {
    let state = test_helpers::test_app_state();
    let identity = authenticate(&state.pool, None).await;
    assert_eq!(identity, Identity::Anonymous);
}

#[tokio::test]
async fn store_failure_downgrades_to_anonymous() {
    // Lazy pool, no live database: the lookup errors and the connection
    // continues anonymously instead of being rejected.
    let state = test_helpers::test_app_state();
    let identity = authenticate(&state.pool, Some("some-session-token")).await;
    assert_eq!(identity, Identity::Anonymous);
}

#[test]
fn anonymous_identity_fields() {
    let identity = Identity::Anonymous;
    assert_eq!(identity.user_id(), ANONYMOUS_ID);
    assert_eq!(identity.name(), ANONYMOUS_NAME);
    assert_eq!(identity.email(), "");
    assert_eq!(identity.uuid(), None);
    assert!(identity.is_anonymous());
}

#[test]
fn authenticated_identity_fields() {
    let id = Uuid::new_v4();
    let identity = Identity::Authenticated {
        id,
        name: "Ada".into(),
        email: "ada@example.com".into(),
    };
    assert_eq!(identity.user_id(), id.to_string());
    assert_eq!(identity.name(), "Ada");
    assert_eq!(identity.email(), "ada@example.com");
    assert_eq!(identity.uuid(), Some(id));
    assert!(!identity.is_anonymous());
}
