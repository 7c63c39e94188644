//! Integration tests for the host driver and the async login helper.
//!
//! All tests run on a paused Tokio clock: sleeps complete instantly and
//! backend delays are exact.

use std::time::Duration;

use hostlink::prelude::*;
use tokio::time::Instant;

// =========================================================================
// Helpers
// =========================================================================

/// Accepts every request and never completes any of them.
struct SilentBackend {
    _sink: EventSender,
}

impl SessionBackend for SilentBackend {
    fn issue(&mut self, _request: SessionRequest) -> bool {
        true
    }

    fn session_state(&self, _session: &SessionName) -> OnlineSessionState {
        OnlineSessionState::NonExistent
    }
}

impl IdentityBackend for SilentBackend {
    fn login(&mut self, _slot: UserSlot, _credentials: &Credentials) -> bool {
        true
    }

    fn auto_login(&mut self, _slot: UserSlot) -> bool {
        true
    }

    fn login_status(&self, _slot: UserSlot) -> LoginStatus {
        LoginStatus::NotLoggedIn
    }

    fn unique_player_id(&self, _slot: UserSlot) -> Option<PlayerId> {
        None
    }
}

fn loopback_host(config: &HostConfig) -> (HostHandle, tokio::task::JoinHandle<SessionSnapshot>) {
    let (tx, rx) = event_channel();
    let backend = LoopbackBackend::new(LoopbackConfig::default(), tx);
    let manager = SessionLifecycleManager::new(backend, config.session.clone(), config.role);
    Host::spawn(manager, rx, config)
}

fn silent_host(config: &HostConfig) -> (HostHandle, tokio::task::JoinHandle<SessionSnapshot>) {
    let (tx, rx) = event_channel();
    let manager =
        SessionLifecycleManager::new(SilentBackend { _sink: tx }, config.session.clone(), config.role);
    Host::spawn(manager, rx, config)
}

fn pid(id: &str) -> PlayerId {
    PlayerId::new(id)
}

// =========================================================================
// Host driver
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_host_runs_full_match() {
    let config = HostConfig::default();
    let (host, task) = loopback_host(&config);

    host.started().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(host.snapshot().await.unwrap().state, SessionState::Created);

    host.player_joined(pid("p1")).await.unwrap();
    host.player_joined(pid("p2")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    let snap = host.snapshot().await.unwrap();
    assert_eq!(snap.state, SessionState::InProgress);
    assert_eq!(snap.registered_players, 2);

    host.player_left(Some(pid("p1"))).await.unwrap();
    host.player_left(Some(pid("p2"))).await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    let snap = host.snapshot().await.unwrap();
    assert_eq!(snap.state, SessionState::Ended);
    assert_eq!(snap.registered_players, 0);

    let last = host.shutdown().await.unwrap();
    assert_eq!(last.state, SessionState::NonExistent);
    assert!(last.pending.is_empty());
    assert_eq!(task.await.unwrap().state, SessionState::NonExistent);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_waits_for_destroy_completion() {
    let config = HostConfig::default();
    let (host, _task) = loopback_host(&config);
    host.started().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let before = Instant::now();
    let last = host.shutdown().await.unwrap();
    assert_eq!(last.state, SessionState::NonExistent);
    assert!(before.elapsed() >= Duration::from_millis(50));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_gives_up_after_grace() {
    let config = HostConfig {
        shutdown_grace_ms: 200,
        ..HostConfig::default()
    };
    let (host, _task) = silent_host(&config);
    host.started().await.unwrap();

    let before = Instant::now();
    let last = host.shutdown().await.unwrap();
    assert_eq!(last.state, SessionState::Destroying);
    assert!(last.is_pending(OperationKind::Destroy));
    assert!(before.elapsed() >= Duration::from_millis(200));
}

#[tokio::test(start_paused = true)]
async fn test_sweep_expires_stalled_create() {
    let mut config = HostConfig {
        sweep_interval_ms: 500,
        ..HostConfig::default()
    };
    config.session.completion_timeout_secs = 2;
    let (host, _task) = silent_host(&config);

    host.started().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(host.snapshot().await.unwrap().state, SessionState::Creating);

    tokio::time::sleep(Duration::from_secs(3)).await;
    let snap = host.snapshot().await.unwrap();
    assert_eq!(snap.state, SessionState::NonExistent);
    assert!(snap.pending.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stopping_event_stops_host() {
    let config = HostConfig::default();
    let (host, task) = loopback_host(&config);
    host.started().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    host.send(HostEvent::Stopping).await.unwrap();
    let last = task.await.unwrap();
    assert_eq!(last.state, SessionState::NonExistent);
    assert!(matches!(
        host.snapshot().await,
        Err(HostlinkError::HostStopped)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_dropping_every_handle_destroys_session() {
    let config = HostConfig::default();
    let (host, task) = loopback_host(&config);
    host.started().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    drop(host);
    assert_eq!(task.await.unwrap().state, SessionState::NonExistent);
}

#[tokio::test(start_paused = true)]
async fn test_listen_server_host_never_touches_backend() {
    let config = HostConfig {
        role: DeploymentRole::ListenServer,
        ..HostConfig::default()
    };
    let (host, _task) = loopback_host(&config);
    host.started().await.unwrap();
    host.player_joined(pid("p1")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let snap = host.snapshot().await.unwrap();
    assert_eq!(snap.state, SessionState::NonExistent);
    assert_eq!(snap.registered_players, 0);
}

// =========================================================================
// Login helper
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_log_in_with_fallback_credentials() {
    let (tx, mut rx) = event_channel();
    let backend = LoopbackBackend::new(LoopbackConfig::default(), tx);
    let mut controller = IdentityController::new(backend, LaunchArgs::default());

    let identity = log_in(&mut controller, &mut rx).await.unwrap();
    assert_eq!(controller.identity(), Some(identity.clone()));

    // Already logged in: returns the same identity without a new login.
    assert_eq!(log_in(&mut controller, &mut rx).await.unwrap(), identity);
}

#[tokio::test(start_paused = true)]
async fn test_log_in_times_out() {
    let (tx, mut rx) = event_channel();
    let mut controller = IdentityController::new(SilentBackend { _sink: tx }, LaunchArgs::default())
        .with_timeout(Duration::from_secs(1));

    let err = log_in(&mut controller, &mut rx).await.unwrap_err();
    assert!(matches!(
        err,
        HostlinkError::Identity(IdentityError::TimedOut(_))
    ));
    assert!(!controller.is_pending());
}
