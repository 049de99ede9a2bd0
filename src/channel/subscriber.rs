//! Typed subscription interface for live channel consumers.
//!
//! A subscriber is registered once, at `LiveChannel::open`, and is then owned
//! by that channel's driver task. Every callback runs on that task, in
//! receipt order, so one subscriber is never invoked concurrently.

use super::event::{CompletionEvent, ErrorEvent, LogEvent, ProgressEvent};
use super::state::ConnectionState;
use crate::errors::TransportError;

/// Receives the decoded events and connectivity changes of one channel.
/// Every method defaults to a no-op.
pub trait SessionSubscriber: Send + 'static {
    fn on_progress(&mut self, _event: &ProgressEvent) {}

    fn on_log(&mut self, _event: &LogEvent) {}

    fn on_error(&mut self, _event: &ErrorEvent) {}

    fn on_completion(&mut self, _event: &CompletionEvent) {}

    fn on_connection_state(&mut self, _state: ConnectionState) {}

    fn on_transport_error(&mut self, _error: &TransportError) {}
}

type Callback<T> = Box<dyn FnMut(&T) + Send>;

/// Closure-based subscriber.
///
/// ```
/// use yago::channel::Subscriptions;
///
/// let subscriber = Subscriptions::new()
///     .on_progress(|p| println!("{}% {}", p.percent, p.status))
///     .on_completion(|c| println!("done: {}", c.success));
/// # drop(subscriber);
/// ```
#[derive(Default)]
pub struct Subscriptions {
    progress: Option<Callback<ProgressEvent>>,
    log: Option<Callback<LogEvent>>,
    error: Option<Callback<ErrorEvent>>,
    completion: Option<Callback<CompletionEvent>>,
    connection: Option<Callback<ConnectionState>>,
    transport_error: Option<Callback<TransportError>>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_progress(mut self, f: impl FnMut(&ProgressEvent) + Send + 'static) -> Self {
        self.progress = Some(Box::new(f));
        self
    }

    pub fn on_log(mut self, f: impl FnMut(&LogEvent) + Send + 'static) -> Self {
        self.log = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl FnMut(&ErrorEvent) + Send + 'static) -> Self {
        self.error = Some(Box::new(f));
        self
    }

    pub fn on_completion(mut self, f: impl FnMut(&CompletionEvent) + Send + 'static) -> Self {
        self.completion = Some(Box::new(f));
        self
    }

    pub fn on_connection_state(
        mut self,
        f: impl FnMut(&ConnectionState) + Send + 'static,
    ) -> Self {
        self.connection = Some(Box::new(f));
        self
    }

    pub fn on_transport_error(
        mut self,
        f: impl FnMut(&TransportError) + Send + 'static,
    ) -> Self {
        self.transport_error = Some(Box::new(f));
        self
    }
}

impl SessionSubscriber for Subscriptions {
    fn on_progress(&mut self, event: &ProgressEvent) {
        if let Some(f) = self.progress.as_mut() {
            f(event);
        }
    }

    fn on_log(&mut self, event: &LogEvent) {
        if let Some(f) = self.log.as_mut() {
            f(event);
        }
    }

    fn on_error(&mut self, event: &ErrorEvent) {
        if let Some(f) = self.error.as_mut() {
            f(event);
        }
    }

    fn on_completion(&mut self, event: &CompletionEvent) {
        if let Some(f) = self.completion.as_mut() {
            f(event);
        }
    }

    fn on_connection_state(&mut self, state: ConnectionState) {
        if let Some(f) = self.connection.as_mut() {
            f(&state);
        }
    }

    fn on_transport_error(&mut self, error: &TransportError) {
        if let Some(f) = self.transport_error.as_mut() {
            f(error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::event::Event;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_subscriptions_route_by_event_class() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (p, c, t) = (seen.clone(), seen.clone(), seen.clone());
        let mut subscriber = Subscriptions::new()
            .on_progress(move |e| p.lock().unwrap().push(format!("progress:{}", e.percent)))
            .on_completion(move |e| c.lock().unwrap().push(format!("completion:{}", e.success)))
            .on_transport_error(move |e| t.lock().unwrap().push(format!("transport:{}", e)));

        if let Event::Progress(p) = Event::progress(15, "executing", "") {
            SessionSubscriber::on_progress(&mut subscriber, &p);
        }
        if let Event::Completion(c) = Event::completion(true, serde_json::Value::Null) {
            SessionSubscriber::on_completion(&mut subscriber, &c);
        }
        SessionSubscriber::on_transport_error(
            &mut subscriber,
            &TransportError::ConnectionLost("reset".into()),
        );

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0], "progress:15");
        assert_eq!(seen[1], "completion:true");
        assert!(seen[2].starts_with("transport:Connection lost"));
    }

    #[test]
    fn test_unregistered_callbacks_are_no_ops() {
        let mut subscriber = Subscriptions::new();
        if let Event::Error(e) = Event::error("ignored") {
            SessionSubscriber::on_error(&mut subscriber, &e);
        }
        SessionSubscriber::on_connection_state(&mut subscriber, ConnectionState::Connected);
    }
}
