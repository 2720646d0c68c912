//! Command gate
//!
//! Ties command completion to telemetry arrival. The robot never
//! acknowledges commands, so a command counts as done once the next
//! qualifying telemetry packet has been processed after it was sent.
//!
//! Waiters form a FIFO queue: each qualifying packet releases exactly one
//! waiter, the oldest one whose caller is still waiting. Callers that gave up
//! (dropped their [`Completion`]) are skipped without consuming a packet.
//!
//! A tick is two-phase. [`CommandGate::begin_tick`] freezes the waiters armed
//! before the packet is dispatched; [`CommandGate::on_tick`] releases only
//! from those. Waiters armed during the fan-out (e.g. from an observer) wait
//! for the next packet.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::{mpsc, oneshot};

use crate::error::{ClientError, Result};

type Waiter = oneshot::Sender<()>;

/// Resolves once the gate releases it on a telemetry tick.
/// Dropping it cancels the wait.
#[must_use = "a completion does nothing unless awaited"]
#[derive(Debug)]
pub struct Completion {
    rx: oneshot::Receiver<()>,
}

impl Future for Completion {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|released| released.map_err(|_| ClientError::Disconnected))
    }
}

/// Cloneable handle used by callers to arm waiters
#[derive(Clone)]
pub struct GateHandle {
    tx: mpsc::UnboundedSender<Waiter>,
}

impl GateHandle {
    /// Queue a waiter behind any already armed ones
    pub fn arm(&self) -> Result<Completion> {
        let (tx, rx) = oneshot::channel();
        self.tx.send(tx).map_err(|_| ClientError::Disconnected)?;
        Ok(Completion { rx })
    }

    /// Whether the gate behind this handle is gone
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Releases armed waiters, one per qualifying telemetry packet
pub struct CommandGate {
    waiters: VecDeque<Waiter>,
    armed: mpsc::UnboundedReceiver<Waiter>,
    /// Waiters at the front of the queue that the current tick may release
    eligible: usize,
    released: u64,
}

impl CommandGate {
    pub fn new() -> (Self, GateHandle) {
        let (tx, armed) = mpsc::unbounded_channel();
        let gate = Self {
            waiters: VecDeque::new(),
            armed,
            eligible: 0,
            released: 0,
        };
        (gate, GateHandle { tx })
    }

    /// Waiters queued and not yet released, including abandoned ones
    pub fn pending(&mut self) -> usize {
        self.collect_armed();
        self.waiters.len()
    }

    /// Total waiters released so far
    pub fn released(&self) -> u64 {
        self.released
    }

    /// Freeze the waiters armed so far as the candidates for the packet
    /// about to be dispatched
    pub fn begin_tick(&mut self) {
        self.collect_armed();
        self.eligible = self.waiters.len();
    }

    /// Release the oldest live waiter frozen by [`begin_tick`](Self::begin_tick).
    /// Returns `false` if none was waiting.
    pub fn on_tick(&mut self) -> bool {
        while self.eligible > 0 {
            self.eligible -= 1;
            let Some(waiter) = self.waiters.pop_front() else {
                break;
            };
            if waiter.send(()).is_ok() {
                self.released += 1;
                self.eligible = 0;
                return true;
            }
            // Caller dropped its completion; try the next one on this tick
        }
        self.eligible = 0;
        false
    }

    /// Fail every queued waiter with `Disconnected` and refuse new ones.
    /// Returns how many callers were still waiting.
    pub fn abandon_all(&mut self) -> usize {
        self.armed.close();
        self.collect_armed();

        let waiting = self.waiters.iter().filter(|w| !w.is_closed()).count();
        self.waiters.clear();
        self.eligible = 0;
        waiting
    }

    fn collect_armed(&mut self) {
        while let Ok(waiter) = self.armed.try_recv() {
            self.waiters.push_back(waiter);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    fn tick(gate: &mut CommandGate) -> bool {
        gate.begin_tick();
        gate.on_tick()
    }

    #[test]
    fn test_completion_waits_for_tick() {
        let (mut gate, handle) = CommandGate::new();
        let mut completion = handle.arm().unwrap();

        assert!((&mut completion).now_or_never().is_none());

        assert!(tick(&mut gate));
        assert!(matches!(completion.now_or_never(), Some(Ok(()))));
    }

    #[test]
    fn test_tick_without_waiters_is_noop() {
        let (mut gate, handle) = CommandGate::new();
        assert!(!tick(&mut gate));

        // Arming after a tick is not released by that earlier tick
        let mut completion = handle.arm().unwrap();
        assert!((&mut completion).now_or_never().is_none());
        assert_eq!(gate.pending(), 1);
    }

    #[test]
    fn test_overlapping_waiters_release_in_fifo_order() {
        let (mut gate, handle) = CommandGate::new();
        let mut first = handle.arm().unwrap();
        let mut second = handle.arm().unwrap();

        tick(&mut gate);
        assert!(matches!((&mut first).now_or_never(), Some(Ok(()))));
        assert!((&mut second).now_or_never().is_none());

        tick(&mut gate);
        assert!(matches!(second.now_or_never(), Some(Ok(()))));
        assert_eq!(gate.released(), 2);
    }

    #[test]
    fn test_cancelled_waiter_does_not_consume_tick() {
        let (mut gate, handle) = CommandGate::new();
        let cancelled = handle.arm().unwrap();
        let mut live = handle.arm().unwrap();
        drop(cancelled);

        assert!(tick(&mut gate));
        assert!(matches!((&mut live).now_or_never(), Some(Ok(()))));
        assert_eq!(gate.pending(), 0);
    }

    #[test]
    fn test_abandon_all_fails_waiters() {
        let (mut gate, handle) = CommandGate::new();
        let completion = handle.arm().unwrap();
        let gone = handle.arm().unwrap();
        drop(gone);

        assert_eq!(gate.abandon_all(), 1);
        assert!(matches!(
            completion.now_or_never(),
            Some(Err(ClientError::Disconnected))
        ));
        assert!(matches!(handle.arm(), Err(ClientError::Disconnected)));
    }

    #[test]
    fn test_waiter_armed_during_fan_out_waits_for_next_tick() {
        let (mut gate, handle) = CommandGate::new();

        gate.begin_tick();
        // Armed while the packet is being dispatched
        let mut completion = handle.arm().unwrap();
        assert!(!gate.on_tick());
        assert!((&mut completion).now_or_never().is_none());

        assert!(tick(&mut gate));
        assert!(matches!(completion.now_or_never(), Some(Ok(()))));
    }

    #[test]
    fn test_on_tick_releases_at_most_one_per_begin() {
        let (mut gate, handle) = CommandGate::new();
        let _first = handle.arm().unwrap();
        let mut second = handle.arm().unwrap();

        gate.begin_tick();
        assert!(gate.on_tick());
        assert!(!gate.on_tick());
        assert!((&mut second).now_or_never().is_none());
    }
}
