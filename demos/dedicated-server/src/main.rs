//! Scripted dedicated-server match against the loopback backend.
//!
//! Usage: `dedicated-server [config.json] [-AUTH_TYPE=...]`
//!
//! Two players log in, join, play a short match and leave; then the host
//! shuts down. Run with `RUST_LOG=debug` to see every request and
//! completion.

use std::time::Duration;

use hostlink::prelude::*;

/// Completion delay and jitter for the loopback backend. Jitter makes
/// completions overtake each other now and then.
const BACKEND_DELAY: Duration = Duration::from_millis(40);
const BACKEND_JITTER: Duration = Duration::from_millis(60);

/// How long the demo match runs once the session is in progress.
const MATCH_LENGTH: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> Result<(), HostlinkError> {
    init_tracing();

    let config = match std::env::args().nth(1).filter(|arg| !arg.starts_with('-')) {
        Some(path) => HostConfig::from_json_file(path)?,
        None => HostConfig::default(),
    };
    config.process_auto_login();

    // Each client logs in against its own backend connection.
    let args = LaunchArgs::from_env();
    let alice = client_login(&args, "Client1").await?;
    let bob = client_login(&args, "Client2").await?;

    let (tx, rx) = event_channel();
    let backend = LoopbackBackend::new(loopback_config(&args), tx);
    let manager = SessionLifecycleManager::new(backend, config.session.clone(), config.role);
    let (host, task) = Host::spawn(manager, rx, &config);

    host.started().await?;
    tokio::time::sleep(Duration::from_millis(200)).await;

    host.player_joined(alice.clone()).await?;
    host.player_joined(bob).await?;
    tokio::time::sleep(Duration::from_millis(400)).await;
    let snapshot = host.snapshot().await?;
    tracing::info!(
        state = %snapshot.state,
        players = snapshot.registered_players,
        "match running"
    );

    tokio::time::sleep(MATCH_LENGTH).await;

    host.player_left(Some(alice)).await?;
    // Bob drops without a clean disconnect.
    host.player_left(None).await?;
    tokio::time::sleep(Duration::from_millis(400)).await;

    let last = host.shutdown().await?;
    tracing::info!(state = %last.state, "host shut down");
    let _ = task.await;
    Ok(())
}

fn loopback_config(args: &LaunchArgs) -> LoopbackConfig {
    LoopbackConfig {
        completion_delay: BACKEND_DELAY,
        jitter: BACKEND_JITTER,
        auto_login: args.credentials(),
    }
}

/// Logs one client in and returns its identity.
async fn client_login(args: &LaunchArgs, credential_name: &str) -> Result<PlayerId, HostlinkError> {
    let (tx, mut rx) = event_channel();
    let backend = LoopbackBackend::new(loopback_config(args), tx);
    let mut controller = IdentityController::new(backend, args.clone())
        .with_fallback(Credentials::developer("127.0.0.1:8081", credential_name));
    let identity = log_in(&mut controller, &mut rx).await?;
    tracing::info!(%identity, credential_name, "client ready");
    Ok(identity)
}
