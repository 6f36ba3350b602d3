use super::*;
use crate::event::Participant;
use crate::state::test_helpers;
use serde_json::json;
use tokio::sync::mpsc;
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

#[tokio::test]
async fn joiner_gets_snapshot_then_roster() {
    let state = test_helpers::test_app_state();
    let joiner = identity("bob");
    let (tx, mut rx) = mpsc::channel(8);
    let session = uuid::Uuid::new_v4();
    state.registry.join(BOARD, session, participant(&joiner), tx).await;

    let mut data = BoardData::default();
    data.lines.push(json!({"id": "L1"}));
    announce_join(&state, BOARD, session, &joiner, data.clone()).await;

    let ServerEvent::BoardState { board, users } = recv(&mut rx).await else {
        panic!("expected board-state first");
    };
    assert_eq!(board, data);
    assert_eq!(users.len(), 1);

    let ServerEvent::UsersUpdate(users) = recv(&mut rx).await else {
        panic!("expected users-update second");
    };
    assert_eq!(users.len(), 1);
}

#[tokio::test]
async fn peers_get_announcement_then_roster() {
    let state = test_helpers::test_app_state();
    let resident = identity("alice");
    let joiner = identity("bob");
    let (resident_tx, mut resident_rx) = mpsc::channel(8);
    let (joiner_tx, _joiner_rx) = mpsc::channel(8);
    let resident_session = uuid::Uuid::new_v4();
    let joiner_session = uuid::Uuid::new_v4();

    state.registry.join(BOARD, resident_session, participant(&resident), resident_tx).await;
    state.registry.join(BOARD, joiner_session, participant(&joiner), joiner_tx).await;

    announce_join(&state, BOARD, joiner_session, &joiner, BoardData::default()).await;

    let ServerEvent::UserJoined { user } = recv(&mut resident_rx).await else {
        panic!("expected user-joined first");
    };
    assert_eq!(user.name, "bob");
    assert_eq!(user.id, joiner.user_id());

    let ServerEvent::UsersUpdate(users) = recv(&mut resident_rx).await else {
        panic!("expected users-update second");
    };
    assert_eq!(users.len(), 2);
}

#[tokio::test]
async fn departure_announces_then_refreshes_roster() {
    let state = test_helpers::test_app_state();
    let stayer = identity("alice");
    let leaver = identity("bob");
    let (stayer_tx, mut stayer_rx) = mpsc::channel(8);
    let (leaver_tx, _leaver_rx) = mpsc::channel(8);
    let stayer_session = uuid::Uuid::new_v4();
    let leaver_session = uuid::Uuid::new_v4();

    state.registry.join(BOARD, stayer_session, participant(&stayer), stayer_tx).await;
    state.registry.join(BOARD, leaver_session, participant(&leaver), leaver_tx).await;

    state.registry.leave(BOARD, leaver_session).await;
    announce_leave(&state, BOARD, &leaver).await;

    let ServerEvent::UserLeft { user } = recv(&mut stayer_rx).await else {
        panic!("expected user-left first");
    };
    assert_eq!(user.name, "bob");

    let ServerEvent::UsersUpdate(users) = recv(&mut stayer_rx).await else {
        panic!("expected users-update second");
    };
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].name, "alice");
}

#[tokio::test]
async fn last_departure_has_no_targets() {
    let state = test_helpers::test_app_state();
    let leaver = identity("alice");
    let (tx, _rx) = mpsc::channel(8);
    let session = uuid::Uuid::new_v4();

    state.registry.join(BOARD, session, participant(&leaver), tx).await;
    state.registry.leave(BOARD, session).await;

    // Board entry is already reclaimed; announcing must not panic.
    announce_leave(&state, BOARD, &leaver).await;
    assert_eq!(state.registry.board_count().await, 0);
}
