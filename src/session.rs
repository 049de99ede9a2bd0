//! Presentation-side session model.
//!
//! [`ModelPublisher`] is the subscriber handed to `LiveChannel::open`. It owns
//! the [`SessionViewModel`], applies every event through the reducer, and
//! publishes a [`SessionSnapshot`] on a `watch` channel. The paired
//! [`ModelWatch`] is what renderers read; they never mutate the model.

use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::channel::{
    Applied, CompletionEvent, ConnectionState, ErrorEvent, Event, LogEvent, ProgressEvent,
    SessionSubscriber, SessionViewModel,
};
use crate::errors::TransportError;

/// View model plus connectivity, as seen by renderers.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub model: SessionViewModel,
    pub connection: ConnectionState,
    pub last_transport_error: Option<TransportError>,
}

/// How a watched session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    Succeeded,
    Failed,
    /// The transport gave up before a completion arrived.
    GaveUp,
    /// The channel went away without a completion (closed by the consumer).
    Ended,
}

impl SessionOutcome {
    pub fn is_success(self) -> bool {
        self == SessionOutcome::Succeeded
    }

    /// Process exit code for this outcome.
    pub fn exit_code(self) -> i32 {
        if self.is_success() { 0 } else { 1 }
    }
}

impl SessionSnapshot {
    /// `Some` once nothing more can change for this session.
    pub fn outcome(&self) -> Option<SessionOutcome> {
        match self.model.outcome() {
            Some(true) => Some(SessionOutcome::Succeeded),
            Some(false) => Some(SessionOutcome::Failed),
            None => match self.connection {
                ConnectionState::Disconnected => Some(SessionOutcome::GaveUp),
                ConnectionState::Closed => Some(SessionOutcome::Ended),
                _ => None,
            },
        }
    }
}

/// Subscriber that reduces events into a published view model.
pub struct ModelPublisher {
    snapshot: watch::Sender<SessionSnapshot>,
    transport_errors: mpsc::UnboundedSender<TransportError>,
}

/// Read side of a [`ModelPublisher`].
pub struct ModelWatch {
    snapshot: watch::Receiver<SessionSnapshot>,
    transport_errors: mpsc::UnboundedReceiver<TransportError>,
}

impl ModelPublisher {
    /// New publisher/watch pair. `max_log_entries` caps the retained log
    /// (`None` keeps everything).
    pub fn new(max_log_entries: Option<usize>) -> (Self, ModelWatch) {
        let initial = SessionSnapshot {
            model: SessionViewModel::with_log_cap(max_log_entries),
            connection: ConnectionState::Connecting,
            last_transport_error: None,
        };
        let (snapshot_tx, snapshot_rx) = watch::channel(initial);
        let (errors_tx, errors_rx) = mpsc::unbounded_channel();
        (
            Self {
                snapshot: snapshot_tx,
                transport_errors: errors_tx,
            },
            ModelWatch {
                snapshot: snapshot_rx,
                transport_errors: errors_rx,
            },
        )
    }

    /// Apply one event and publish the result. Events ignored by the reducer
    /// do not wake watchers.
    pub fn apply(&mut self, event: &Event) {
        self.snapshot.send_if_modified(|snap| {
            snap.model.apply(event) == Applied::Updated
        });
    }
}

impl SessionSubscriber for ModelPublisher {
    fn on_progress(&mut self, event: &ProgressEvent) {
        self.apply(&Event::Progress(event.clone()));
    }

    fn on_log(&mut self, event: &LogEvent) {
        self.apply(&Event::Log(event.clone()));
    }

    fn on_error(&mut self, event: &ErrorEvent) {
        self.apply(&Event::Error(event.clone()));
    }

    fn on_completion(&mut self, event: &CompletionEvent) {
        self.apply(&Event::Completion(event.clone()));
    }

    fn on_connection_state(&mut self, state: ConnectionState) {
        self.snapshot.send_if_modified(|snap| {
            if snap.connection == state {
                return false;
            }
            snap.connection = state;
            true
        });
    }

    fn on_transport_error(&mut self, error: &TransportError) {
        if self.transport_errors.send(error.clone()).is_err() {
            debug!(error = %error, "transport error dropped, watcher gone");
        }
        self.snapshot.send_modify(|snap| {
            snap.last_transport_error = Some(error.clone());
        });
    }
}

impl ModelWatch {
    /// Current snapshot (cloned).
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Wait for the next published change. Returns `false` once the publisher
    /// has been dropped.
    pub async fn changed(&mut self) -> bool {
        self.snapshot.changed().await.is_ok()
    }

    /// Next transport error not yet taken, if any.
    pub fn try_transport_error(&mut self) -> Option<TransportError> {
        self.transport_errors.try_recv().ok()
    }

    /// Wait until the session settles, calling `on_change` with every
    /// snapshot seen along the way (including the current one) and the
    /// transport errors queued since the previous call.
    pub async fn settled(
        &mut self,
        mut on_change: impl FnMut(&SessionSnapshot, &[TransportError]),
    ) -> SessionOutcome {
        loop {
            let mut errors = Vec::new();
            while let Some(err) = self.try_transport_error() {
                errors.push(err);
            }
            let current = self.snapshot();
            on_change(&current, &errors);
            if let Some(outcome) = current.outcome() {
                return outcome;
            }
            if !self.changed().await {
                let last = self.snapshot();
                return last.outcome().unwrap_or(SessionOutcome::Ended);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::LogLevel;
    use serde_json::json;

    #[test]
    fn test_publisher_reduces_events() {
        let (mut publisher, watch) = ModelPublisher::new(None);
        publisher.on_progress(&ProgressEvent {
            percent: 40,
            status: "executing".into(),
            message: "compiling".into(),
        });
        if let Event::Log(line) = Event::log("cargo build", LogLevel::Info) {
            publisher.on_log(&line);
        }

        let snap = watch.snapshot();
        assert_eq!(snap.model.percent, 40);
        assert_eq!(snap.model.status, "executing");
        assert_eq!(snap.model.log.len(), 1);
        assert_eq!(snap.outcome(), None);
    }

    #[test]
    fn test_publisher_respects_log_cap() {
        let (mut publisher, watch) = ModelPublisher::new(Some(1));
        for text in ["one", "two"] {
            publisher.apply(&Event::log(text, LogLevel::Info));
        }
        let snap = watch.snapshot();
        assert_eq!(snap.model.log.len(), 1);
        assert_eq!(snap.model.log_dropped, 1);
    }

    #[test]
    fn test_outcome_from_completion_and_connection() {
        let (mut publisher, watch) = ModelPublisher::new(None);
        publisher.on_connection_state(ConnectionState::Connected);
        assert_eq!(watch.snapshot().outcome(), None);

        publisher.apply(&Event::completion(false, json!({"error": "tests failed"})));
        assert_eq!(watch.snapshot().outcome(), Some(SessionOutcome::Failed));

        let (mut publisher, watch) = ModelPublisher::new(None);
        publisher.on_connection_state(ConnectionState::Disconnected);
        assert_eq!(watch.snapshot().outcome(), Some(SessionOutcome::GaveUp));
    }

    #[test]
    fn test_completion_outranks_disconnect() {
        let (mut publisher, watch) = ModelPublisher::new(None);
        publisher.apply(&Event::completion(true, json!({})));
        publisher.on_connection_state(ConnectionState::Disconnected);
        assert_eq!(watch.snapshot().outcome(), Some(SessionOutcome::Succeeded));
        assert_eq!(SessionOutcome::Succeeded.exit_code(), 0);
        assert_eq!(SessionOutcome::GaveUp.exit_code(), 1);
    }

    #[test]
    fn test_transport_errors_are_queued_and_remembered() {
        let (mut publisher, mut watch) = ModelPublisher::new(None);
        let err = TransportError::RetriesExhausted { attempts: 3 };
        publisher.on_transport_error(&err);

        assert_eq!(watch.try_transport_error(), Some(err.clone()));
        assert_eq!(watch.try_transport_error(), None);
        assert_eq!(watch.snapshot().last_transport_error, Some(err));
        assert_eq!(watch.snapshot().model.status, "connecting");
    }

    #[tokio::test]
    async fn test_settled_waits_for_completion() {
        let (mut publisher, mut watch) = ModelPublisher::new(None);
        let task = tokio::spawn(async move {
            publisher.on_connection_state(ConnectionState::Connected);
            tokio::task::yield_now().await;
            publisher.apply(&Event::progress(60, "executing", "midway"));
            tokio::task::yield_now().await;
            publisher.apply(&Event::completion(true, json!({"files": 12})));
            publisher
        });

        let mut seen = Vec::new();
        let outcome = watch
            .settled(|snap, _| seen.push(snap.model.percent))
            .await;
        assert_eq!(outcome, SessionOutcome::Succeeded);
        assert_eq!(seen.last(), Some(&100));
        drop(task.await.unwrap());
    }

    #[tokio::test]
    async fn test_settled_when_publisher_dropped() {
        let (publisher, mut watch) = ModelPublisher::new(None);
        drop(publisher);
        assert_eq!(watch.settled(|_, _| {}).await, SessionOutcome::Ended);
    }

    #[tokio::test]
    async fn test_settled_hands_over_transport_errors() {
        let (mut publisher, mut watch) = ModelPublisher::new(None);
        let err = TransportError::RetriesExhausted { attempts: 2 };
        publisher.on_transport_error(&err);
        publisher.on_connection_state(ConnectionState::Disconnected);

        let mut reported = Vec::new();
        let outcome = watch
            .settled(|_, errors| reported.extend_from_slice(errors))
            .await;
        assert_eq!(outcome, SessionOutcome::GaveUp);
        assert_eq!(reported, vec![err]);
        assert_eq!(watch.try_transport_error(), None);
    }
}
