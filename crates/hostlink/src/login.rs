//! Async wrapper around the identity controller.

use hostlink_backend::{BackendError, BackendEvent, EventReceiver, IdentityBackend, PlayerId};
use hostlink_identity::{Activation, IdentityController, IdentityError, Notifier};

use crate::HostlinkError;

/// Logs the controller's user in and waits for the result.
///
/// Session completions that arrive on `events` in the meantime are
/// skipped. If no login completion arrives within the controller's
/// timeout, the pending login is expired and
/// [`IdentityError::TimedOut`] is returned.
pub async fn log_in<B, N>(
    controller: &mut IdentityController<B, N>,
    events: &mut EventReceiver,
) -> Result<PlayerId, HostlinkError>
where
    B: IdentityBackend,
    N: Notifier,
{
    let method = match controller.activate()? {
        Activation::AlreadyLoggedIn(identity) => return Ok(identity),
        Activation::Started(method) => method,
    };
    tracing::debug!(%method, "waiting for login completion");

    let timeout = controller.timeout();
    let wait = async {
        loop {
            match events.recv().await {
                Some(BackendEvent::Login(completion)) => match controller.handle_login(completion) {
                    Ok(Some(identity)) => return Ok(identity),
                    Ok(None) => {}
                    Err(e) => return Err(HostlinkError::from(e)),
                },
                Some(BackendEvent::Session(completion)) => {
                    tracing::debug!(kind = %completion.kind, "session completion while logging in, skipping");
                }
                None => return Err(HostlinkError::from(BackendError::ChannelClosed)),
            }
        }
    };

    let result: Result<Result<PlayerId, HostlinkError>, _> =
        tokio::time::timeout(timeout, wait).await;
    match result {
        Ok(outcome) => outcome,
        Err(_) => {
            controller.expire_overdue();
            Err(IdentityError::TimedOut(controller.slot()).into())
        }
    }
}
