//! Shutdown coordination for the launcher.

use std::sync::Arc;

use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Running,
    Requested,
    Interrupted,
}

/// Error returned when a wait ends without an orderly shutdown request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("shutdown wait was interrupted")]
pub struct Interrupted;

/// Shutdown token shared by the orchestrator and the signal listener.
///
/// Clones observe the same token. `trigger` requests an orderly stop;
/// `interrupt` wakes waiters with an error instead.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<Phase>>,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Phase::Running);
        Self { tx: Arc::new(tx) }
    }

    /// Request an orderly shutdown. Later calls have no effect.
    pub fn trigger(&self) {
        self.tx.send_if_modified(|phase| {
            if *phase == Phase::Running {
                *phase = Phase::Requested;
                true
            } else {
                false
            }
        });
    }

    /// Wake every waiter with [`Interrupted`] unless shutdown was already requested.
    pub fn interrupt(&self) {
        self.tx.send_if_modified(|phase| {
            if *phase == Phase::Running {
                *phase = Phase::Interrupted;
                true
            } else {
                false
            }
        });
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow() == Phase::Requested
    }

    /// Wait until shutdown is requested.
    pub async fn wait(&self) -> Result<(), Interrupted> {
        let mut rx = self.tx.subscribe();
        let phase = rx
            .wait_for(|phase| *phase != Phase::Running)
            .await
            .map_err(|_| Interrupted)?;
        match *phase {
            Phase::Requested => Ok(()),
            _ => Err(Interrupted),
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn trigger_releases_waiters() {
        let shutdown = Shutdown::new();
        let waiter = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { shutdown.wait().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        shutdown.trigger();
        assert_eq!(waiter.await.unwrap(), Ok(()));
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn interrupt_fails_waiters() {
        let shutdown = Shutdown::new();
        shutdown.interrupt();
        assert_eq!(shutdown.wait().await, Err(Interrupted));
        // An interrupted token cannot be turned into an orderly stop.
        shutdown.trigger();
        assert!(!shutdown.is_triggered());
    }

    #[tokio::test]
    async fn wait_after_trigger_returns_immediately() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        shutdown.interrupt();
        assert_eq!(shutdown.wait().await, Ok(()));
    }
}
