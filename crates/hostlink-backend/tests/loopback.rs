//! Integration tests for the loopback backend with delayed delivery.
//!
//! Runs on a paused Tokio clock so delays are exact and instant.

use std::time::Duration;

use hostlink_backend::{
    BackendEvent, Completion, Credentials, EventReceiver, IdentityBackend, LoginStatus,
    LoopbackBackend, LoopbackConfig, OnlineSessionState, OperationKind, PlayerId, SessionBackend,
    SessionName, SessionRequest, SessionSettings, UserSlot, event_channel,
};

// =========================================================================
// Helpers
// =========================================================================

fn settings(allow_join_in_progress: bool) -> SessionSettings {
    SessionSettings {
        num_public_connections: 2,
        should_advertise: true,
        uses_presence: false,
        allow_join_via_presence: false,
        allow_join_via_presence_friends_only: false,
        allow_invites: false,
        allow_join_in_progress,
        is_dedicated: true,
        use_lobbies_if_available: false,
        use_lobbies_voice_chat_if_available: false,
        uses_stats: true,
        attributes: Default::default(),
    }
}

fn create(allow_join_in_progress: bool) -> SessionRequest {
    SessionRequest::Create {
        host: UserSlot(0),
        session: SessionName::default(),
        settings: settings(allow_join_in_progress),
    }
}

fn register(ids: &[&str]) -> SessionRequest {
    SessionRequest::RegisterPlayers {
        session: SessionName::default(),
        players: ids.iter().map(|id| PlayerId::new(*id)).collect(),
        was_invited: false,
    }
}

fn start() -> SessionRequest {
    SessionRequest::Start {
        session: SessionName::default(),
    }
}

fn immediate() -> (LoopbackBackend, EventReceiver) {
    let (tx, rx) = event_channel();
    (LoopbackBackend::new(LoopbackConfig::immediate(), tx), rx)
}

fn next_session(rx: &mut EventReceiver) -> Completion {
    match rx.try_recv() {
        Ok(BackendEvent::Session(c)) => c,
        other => panic!("expected a session completion, got {other:?}"),
    }
}

// =========================================================================
// Delivery timing
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_completion_arrives_after_delay() {
    let (tx, mut rx) = event_channel();
    let mut backend = LoopbackBackend::new(LoopbackConfig::default(), tx);

    assert!(backend.issue(create(false)));
    assert!(rx.try_recv().is_err());

    tokio::time::sleep(Duration::from_millis(49)).await;
    assert!(rx.try_recv().is_err());

    tokio::time::sleep(Duration::from_millis(2)).await;
    let completion = next_session(&mut rx);
    assert_eq!(completion.kind, OperationKind::Create);
    assert!(completion.success);
}

#[tokio::test(start_paused = true)]
async fn test_jittered_completions_all_arrive() {
    let (tx, mut rx) = event_channel();
    let config = LoopbackConfig {
        completion_delay: Duration::from_millis(10),
        jitter: Duration::from_millis(40),
        auto_login: None,
    };
    let mut backend = LoopbackBackend::new(config, tx);

    assert!(backend.issue(create(false)));
    assert!(backend.issue(register(&["p1"])));
    assert!(backend.issue(start()));

    tokio::time::sleep(Duration::from_millis(51)).await;
    let mut kinds = Vec::new();
    while let Ok(BackendEvent::Session(c)) = rx.try_recv() {
        kinds.push(c.kind);
    }
    kinds.sort();
    assert_eq!(
        kinds,
        vec![
            OperationKind::Create,
            OperationKind::Register,
            OperationKind::Start
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_jitter_beyond_u64_micros_saturates() {
    let (tx, mut rx) = event_channel();
    let config = LoopbackConfig {
        completion_delay: Duration::from_millis(10),
        jitter: Duration::MAX,
        auto_login: None,
    };
    let mut backend = LoopbackBackend::new(config, tx);

    assert!(backend.issue(create(false)));
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_dropped_receiver_does_not_panic() {
    let (mut backend, rx) = immediate();
    drop(rx);
    assert!(backend.issue(create(false)));
}

// =========================================================================
// Session table
// =========================================================================

#[test]
fn test_session_walks_through_backend_states() {
    let (mut backend, mut rx) = immediate();
    let name = SessionName::default();

    assert_eq!(backend.session_state(&name), OnlineSessionState::NonExistent);
    backend.issue(create(false));
    assert_eq!(backend.session_state(&name), OnlineSessionState::Pending);
    backend.issue(start());
    assert_eq!(backend.session_state(&name), OnlineSessionState::InProgress);
    backend.issue(SessionRequest::End {
        session: name.clone(),
    });
    assert_eq!(backend.session_state(&name), OnlineSessionState::Ended);
    backend.issue(SessionRequest::Destroy {
        session: name.clone(),
    });
    assert_eq!(backend.session_state(&name), OnlineSessionState::NonExistent);

    for _ in 0..4 {
        assert!(next_session(&mut rx).success);
    }
}

#[test]
fn test_create_twice_fails_in_completion() {
    let (mut backend, mut rx) = immediate();
    assert!(backend.issue(create(false)));
    assert!(backend.issue(create(false)));
    assert!(next_session(&mut rx).success);
    assert!(!next_session(&mut rx).success);
}

#[test]
fn test_register_in_progress_needs_join_in_progress() {
    let (mut backend, mut rx) = immediate();
    backend.issue(create(false));
    backend.issue(start());
    backend.issue(register(&["late"]));
    next_session(&mut rx);
    next_session(&mut rx);
    assert!(!next_session(&mut rx).success);

    let (mut backend, mut rx) = immediate();
    backend.issue(create(true));
    backend.issue(start());
    backend.issue(register(&["late"]));
    next_session(&mut rx);
    next_session(&mut rx);
    let completion = next_session(&mut rx);
    assert!(completion.success);
    assert_eq!(completion.players, vec![PlayerId::new("late")]);
}

#[test]
fn test_register_empty_batch_is_rejected() {
    let (mut backend, _rx) = immediate();
    backend.issue(create(false));
    assert!(!backend.issue(register(&[])));
    assert_eq!(backend.issued_count(OperationKind::Register), 0);
}

#[test]
fn test_zero_connections_is_rejected() {
    let (mut backend, _rx) = immediate();
    let mut request = create(false);
    if let SessionRequest::Create { settings, .. } = &mut request {
        settings.num_public_connections = 0;
    }
    assert!(!backend.issue(request));
}

#[test]
fn test_injected_reject_applies_once() {
    let (mut backend, mut rx) = immediate();
    backend.reject_next(OperationKind::Create);
    assert!(!backend.issue(create(false)));
    assert!(rx.try_recv().is_err());
    assert!(backend.issue(create(false)));
    assert!(next_session(&mut rx).success);
}

#[test]
fn test_injected_failure_leaves_table_untouched() {
    let (mut backend, mut rx) = immediate();
    backend.fail_next(OperationKind::Create);
    assert!(backend.issue(create(false)));
    assert!(!next_session(&mut rx).success);
    assert_eq!(
        backend.session_state(&SessionName::default()),
        OnlineSessionState::NonExistent
    );
}

// =========================================================================
// Identity
// =========================================================================

#[test]
fn test_developer_login_succeeds() {
    let (mut backend, mut rx) = immediate();
    let slot = UserSlot(0);
    assert_eq!(backend.login_status(slot), LoginStatus::NotLoggedIn);

    assert!(backend.login(slot, &Credentials::dev_fallback()));
    match rx.try_recv() {
        Ok(BackendEvent::Login(c)) => {
            assert!(c.success);
            assert_eq!(c.identity, backend.unique_player_id(slot));
        }
        other => panic!("expected a login completion, got {other:?}"),
    }
    assert_eq!(backend.login_status(slot), LoginStatus::LoggedIn);
}

#[test]
fn test_login_without_kind_is_rejected() {
    let (mut backend, mut rx) = immediate();
    let creds = Credentials {
        kind: String::new(),
        id: String::new(),
        token: String::new(),
    };
    assert!(!backend.login(UserSlot(0), &creds));
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_auto_login_without_environment_fails_in_completion() {
    let (mut backend, mut rx) = immediate();
    assert!(backend.auto_login(UserSlot(0)));
    match rx.try_recv() {
        Ok(BackendEvent::Login(c)) => {
            assert!(!c.success);
            assert!(!c.error.is_empty());
            assert_eq!(c.identity, None);
        }
        other => panic!("expected a login completion, got {other:?}"),
    }
    assert_eq!(backend.unique_player_id(UserSlot(0)), None);
}
