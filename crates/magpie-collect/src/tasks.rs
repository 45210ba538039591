//! Named scheduling of future worker commands.
//!
//! Scheduled calls are tracked by name so shutdown can cancel everything
//! outstanding, and so re-scheduling under the same name replaces the
//! previous call instead of stacking a second one.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::debug;

use crate::command::CollectorCommand;

pub(crate) struct TaskRegistry {
    commands: mpsc::Sender<CollectorCommand>,
    tasks: HashMap<String, AbortHandle>,
}

impl TaskRegistry {
    pub(crate) fn new(commands: mpsc::Sender<CollectorCommand>) -> Self {
        Self {
            commands,
            tasks: HashMap::new(),
        }
    }

    /// Deliver `command` to the worker after `delay`, replacing any
    /// outstanding call registered under the same name.
    pub(crate) fn call_later(
        &mut self,
        name: impl Into<String>,
        delay: Duration,
        command: CollectorCommand,
    ) {
        self.prune();
        let commands = self.commands.clone();
        let handle = tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let _ = commands.send(command).await;
        });
        self.register(name.into(), handle.abort_handle());
    }

    /// Deliver the command produced by `make` every `interval`, starting
    /// immediately.
    pub(crate) fn call_in_loop(
        &mut self,
        name: impl Into<String>,
        interval: Duration,
        make: impl Fn() -> CollectorCommand + Send + 'static,
    ) {
        self.prune();
        let commands = self.commands.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if commands.send(make()).await.is_err() {
                    break;
                }
            }
        });
        self.register(name.into(), handle.abort_handle());
    }

    /// Abort every outstanding scheduled call.
    pub(crate) fn cancel_all(&mut self) {
        let count = self.tasks.len();
        for (_, handle) in self.tasks.drain() {
            handle.abort();
        }
        debug!(count, "cancelled scheduled tasks");
    }

    fn register(&mut self, name: String, handle: AbortHandle) {
        if let Some(previous) = self.tasks.insert(name, handle) {
            previous.abort();
        }
    }

    fn prune(&mut self) {
        self.tasks.retain(|_, handle| !handle.is_finished());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::QueueId;
    use tokio::time::timeout;

    fn wake(queue: QueueId) -> CollectorCommand {
        CollectorCommand::RequesterWake { queue }
    }

    #[tokio::test]
    async fn call_later_delivers_the_command() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut registry = TaskRegistry::new(tx);
        registry.call_later("wake", Duration::from_millis(5), wake(QueueId::Thumbnail));

        let received = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("scheduled command not delivered")
            .expect("channel closed");
        assert!(matches!(
            received,
            CollectorCommand::RequesterWake {
                queue: QueueId::Thumbnail
            }
        ));
    }

    #[tokio::test]
    async fn same_name_replaces_the_previous_call() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut registry = TaskRegistry::new(tx);
        registry.call_later(
            "wake",
            Duration::from_millis(50),
            wake(QueueId::Transfer(0)),
        );
        registry.call_later("wake", Duration::from_millis(5), wake(QueueId::Thumbnail));

        let received = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("scheduled command not delivered")
            .expect("channel closed");
        assert!(matches!(
            received,
            CollectorCommand::RequesterWake {
                queue: QueueId::Thumbnail
            }
        ));

        // The replaced call must never fire.
        assert!(
            timeout(Duration::from_millis(100), rx.recv())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn cancel_all_stops_pending_calls() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut registry = TaskRegistry::new(tx);
        registry.call_later(
            "wake",
            Duration::from_millis(20),
            wake(QueueId::Transfer(1)),
        );
        registry.call_in_loop("loop", Duration::from_millis(10), || {
            CollectorCommand::CheckOverflow
        });
        registry.cancel_all();

        // The recurring task may already have delivered its immediate first
        // tick; after cancellation the stream must go quiet.
        while timeout(Duration::from_millis(60), rx.recv())
            .await
            .is_ok_and(|received| received.is_some())
        {}
        assert!(
            timeout(Duration::from_millis(60), rx.recv())
                .await
                .is_err()
        );
    }
}
