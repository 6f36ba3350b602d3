use super::*;
use crate::state::test_helpers;
use tokio::time::{Duration, timeout};

const BOARD: &str = "507f1f77bcf86cd799439011";

fn identity(name: &str) -> Identity {
    Identity::Authenticated {
        id: Uuid::new_v4(),
        name: name.into(),
        email: format!("{name}@example.com"),
    }
}

fn participant(identity: &Identity) -> Participant {
    Participant {
        id: identity.user_id(),
        name: identity.name().to_string(),
        email: identity.email().to_string(),
        joined_at: 1,
    }
}

async fn recv(rx: &mut mpsc::Receiver<ServerEvent>) -> ServerEvent {
    timeout(Duration::from_millis(500), rx.recv())
        .await
        .expect("event receive timed out")
        .expect("channel closed unexpectedly")
}

async fn assert_silent(rx: &mut mpsc::Receiver<ServerEvent>) {
    assert!(
        timeout(Duration::from_millis(80), rx.recv()).await.is_err(),
        "expected no event"
    );
}

fn error_message(events: &[ServerEvent]) -> &str {
    match events {
        [ServerEvent::Error { message }] => message,
        other => panic!("expected a single error event, got {other:?}"),
    }
}

#[tokio::test]
async fn invalid_json_gets_an_error_reply() {
    let state = test_helpers::test_app_state();
    let identity = Identity::Anonymous;
    let (tx, _rx) = mpsc::channel(8);
    let mut current_board = None;

    let replies = process_inbound_text(
        &state,
        &mut current_board,
        Uuid::new_v4(),
        &identity,
        &tx,
        "{not json",
    )
    .await;

    assert!(error_message(&replies).starts_with("invalid event"));
    assert_eq!(current_board, None);
}

#[tokio::test]
async fn malformed_board_id_is_rejected_before_lookup() {
    // No live database behind the pool: a store lookup would error, so the
    // exact message proves the id check fired first.
    let state = test_helpers::test_app_state();
    let identity = Identity::Anonymous;
    let (tx, _rx) = mpsc::channel(8);
    let mut current_board = None;

    let replies = process_inbound_text(
        &state,
        &mut current_board,
        Uuid::new_v4(),
        &identity,
        &tx,
        r#"{"event":"join-board","data":"not a board id"}"#,
    )
    .await;

    assert_eq!(error_message(&replies), "Invalid board ID format");
    assert_eq!(current_board, None);
}

#[tokio::test]
async fn join_degrades_to_an_error_when_the_store_is_down() {
    let state = test_helpers::test_app_state();
    let identity = Identity::Anonymous;
    let (tx, _rx) = mpsc::channel(8);
    let mut current_board = None;

    let replies = process_inbound_text(
        &state,
        &mut current_board,
        Uuid::new_v4(),
        &identity,
        &tx,
        &format!(r#"{{"event":"join-board","data":"{BOARD}"}}"#),
    )
    .await;

    assert_eq!(error_message(&replies), "Failed to join board");
    assert_eq!(current_board, None);
}

#[tokio::test]
async fn mutations_before_join_are_silently_ignored() {
    let state = test_helpers::test_app_state();
    let sender = identity("alice");
    let (sender_tx, mut sender_rx) = mpsc::channel(8);
    let mut current_board = None;

    // A peer on some board must not see the pre-join message either.
    let bystander = identity("bob");
    let (bystander_tx, mut bystander_rx) = mpsc::channel(8);
    state.registry.join(BOARD, Uuid::new_v4(), participant(&bystander), bystander_tx).await;

    let replies = process_inbound_text(
        &state,
        &mut current_board,
        Uuid::new_v4(),
        &sender,
        &sender_tx,
        r#"{"event":"chat-message","data":{"message":"hello?"}}"#,
    )
    .await;

    assert!(replies.is_empty());
    assert_silent(&mut sender_rx).await;
    assert_silent(&mut bystander_rx).await;
}

#[tokio::test]
async fn leave_before_join_is_a_noop() {
    let state = test_helpers::test_app_state();
    let identity = Identity::Anonymous;
    let (tx, _rx) = mpsc::channel(8);
    let mut current_board = None;

    let replies = process_inbound_text(
        &state,
        &mut current_board,
        Uuid::new_v4(),
        &identity,
        &tx,
        r#"{"event":"leave-board"}"#,
    )
    .await;

    assert!(replies.is_empty());
    assert_eq!(state.registry.board_count().await, 0);
}

#[tokio::test]
async fn joined_sessions_relay_to_peers() {
    let state = test_helpers::test_app_state();
    let sender = identity("alice");
    let peer = identity("bob");
    let (sender_tx, mut sender_rx) = mpsc::channel(8);
    let (peer_tx, mut peer_rx) = mpsc::channel(8);
    let sender_session = Uuid::new_v4();

    state.registry.join(BOARD, sender_session, participant(&sender), sender_tx.clone()).await;
    state.registry.join(BOARD, Uuid::new_v4(), participant(&peer), peer_tx).await;
    let mut current_board = Some(BOARD.to_string());

    let replies = process_inbound_text(
        &state,
        &mut current_board,
        sender_session,
        &sender,
        &sender_tx,
        r#"{"event":"chat-message","data":{"message":"hi"}}"#,
    )
    .await;

    assert!(replies.is_empty());
    assert!(matches!(recv(&mut peer_rx).await, ServerEvent::ChatMessage(_)));
    assert_silent(&mut sender_rx).await;
}

#[tokio::test]
async fn leave_announces_to_remaining_members() {
    let state = test_helpers::test_app_state();
    let leaver = identity("alice");
    let stayer = identity("bob");
    let (leaver_tx, _leaver_rx) = mpsc::channel(8);
    let (stayer_tx, mut stayer_rx) = mpsc::channel(8);
    let leaver_session = Uuid::new_v4();

    state.registry.join(BOARD, leaver_session, participant(&leaver), leaver_tx.clone()).await;
    state.registry.join(BOARD, Uuid::new_v4(), participant(&stayer), stayer_tx).await;
    let mut current_board = Some(BOARD.to_string());

    let replies = process_inbound_text(
        &state,
        &mut current_board,
        leaver_session,
        &leaver,
        &leaver_tx,
        r#"{"event":"leave-board"}"#,
    )
    .await;

    assert!(replies.is_empty());
    assert_eq!(current_board, None);
    assert!(matches!(recv(&mut stayer_rx).await, ServerEvent::UserLeft { .. }));
    let ServerEvent::UsersUpdate(users) = recv(&mut stayer_rx).await else {
        panic!("expected users-update");
    };
    assert_eq!(users.len(), 1);
}
