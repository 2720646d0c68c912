//! Timeout and cancellation wrappers for pending completions
//!
//! A completion only resolves while telemetry keeps flowing. These wrappers
//! give callers a way out when it stops.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use super::gate::Completion;
use crate::error::{ClientError, Result};

/// Await a completion, giving up after `timeout` (if any)
pub async fn await_completion(
    completion: Completion,
    timeout: Option<Duration>,
    command: &'static str,
) -> Result<()> {
    let Some(timeout) = timeout else {
        return completion.await;
    };

    match tokio::time::timeout(timeout, completion).await {
        Ok(result) => result,
        Err(_) => {
            warn!("[COMMAND] {} not followed by telemetry within {:?}", command, timeout);
            Err(ClientError::CommandTimeout { command, timeout })
        }
    }
}

/// Await a completion unless `cancel` resolves first.
/// A completion that is already released wins over a simultaneous cancel.
pub async fn await_until<C>(completion: Completion, cancel: C, command: &'static str) -> Result<()>
where
    C: Future<Output = ()>,
{
    tokio::select! {
        biased;
        result = completion => result,
        _ = cancel => Err(ClientError::Cancelled(command)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandGate;
    use tokio::sync::oneshot;

    #[tokio::test(start_paused = true)]
    async fn test_timeout_when_telemetry_stalls() {
        let (_gate, handle) = CommandGate::new();
        let completion = handle.arm().unwrap();

        let result = await_completion(completion, Some(Duration::from_millis(200)), "rgb_all").await;
        assert!(matches!(
            result,
            Err(ClientError::CommandTimeout { command: "rgb_all", .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_released_before_timeout() {
        let (mut gate, handle) = CommandGate::new();
        let completion = handle.arm().unwrap();
        gate.begin_tick();
        gate.on_tick();

        let result = await_completion(completion, Some(Duration::from_millis(200)), "rgb_all").await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_cancel_signal() {
        let (_gate, handle) = CommandGate::new();
        let completion = handle.arm().unwrap();
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();

        cancel_tx.send(()).unwrap();
        let result = await_until(completion, async { let _ = cancel_rx.await; }, "head_pan").await;
        assert!(matches!(result, Err(ClientError::Cancelled("head_pan"))));
    }

    #[tokio::test]
    async fn test_release_wins_over_cancel() {
        let (mut gate, handle) = CommandGate::new();
        let completion = handle.arm().unwrap();
        gate.begin_tick();
        gate.on_tick();

        let result = await_until(completion, std::future::ready(()), "head_pan").await;
        assert!(result.is_ok());
    }
}
