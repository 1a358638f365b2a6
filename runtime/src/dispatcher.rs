//! Ordered subscription table.
//!
//! Registration happens once, at construction. Every `(kind, priority)`
//! declared by every subscriber becomes one entry; the table is sorted by
//! descending priority with ties kept in registration order, so dispatch is a
//! plain iteration.

use courier_core::event::{EventKind, PipelineEvent};
use courier_core::message::RequestId;
use courier_core::subscriber::Subscriber;
use courier_core::Result;
use std::cmp::Reverse;
use std::fmt;
use std::sync::Arc;

struct Listener {
    kind: EventKind,
    priority: i32,
    subscriber: Arc<dyn Subscriber>,
}

/// Fires lifecycle events at registered subscribers in priority order.
///
/// # Example
///
/// ```
/// use courier_core::event::{EventKind, PipelineEvent};
/// use courier_core::message::{HttpMethod, Request};
/// use courier_runtime::dispatcher::EventDispatcher;
/// use courier_runtime::subscribers::LoggerSubscriber;
///
/// let dispatcher = EventDispatcher::builder()
///     .subscriber(LoggerSubscriber::new())
///     .build();
///
/// assert_eq!(dispatcher.listeners(EventKind::RequestSent), vec!["logger"]);
///
/// let mut event = PipelineEvent::request_created(Request::new(HttpMethod::Get, "https://example.com"));
/// assert!(dispatcher.dispatch(&mut event).is_ok());
/// ```
pub struct EventDispatcher {
    listeners: Vec<Listener>,
    subscribers: Vec<Arc<dyn Subscriber>>,
}

impl EventDispatcher {
    /// Start building a dispatcher.
    #[must_use]
    pub fn builder() -> EventDispatcherBuilder {
        EventDispatcherBuilder::default()
    }

    /// Hand `event` to every subscriber of its kind, highest priority first.
    ///
    /// # Errors
    ///
    /// The first subscriber error stops dispatch and is returned unchanged.
    pub fn dispatch(&self, event: &mut PipelineEvent) -> Result<()> {
        let kind = event.kind();
        for listener in self.listeners.iter().filter(|l| l.kind == kind) {
            tracing::trace!(
                event = %kind,
                subscriber = listener.subscriber.name(),
                priority = listener.priority,
                "Dispatching event"
            );

            if let Err(error) = listener.subscriber.handle(event) {
                tracing::debug!(
                    event = %kind,
                    subscriber = listener.subscriber.name(),
                    error = %error,
                    "Subscriber aborted dispatch"
                );
                return Err(error);
            }
        }
        Ok(())
    }

    /// Tell every registered subscriber, once each and in registration
    /// order, that `ids` will not complete.
    pub fn abandon(&self, ids: &[RequestId]) {
        if ids.is_empty() {
            return;
        }
        tracing::debug!(count = ids.len(), "Abandoning requests");
        for subscriber in &self.subscribers {
            subscriber.on_abandoned(ids);
        }
    }

    /// Names of the subscribers of `kind`, in firing order.
    #[must_use]
    pub fn listeners(&self, kind: EventKind) -> Vec<&'static str> {
        self.listeners
            .iter()
            .filter(|l| l.kind == kind)
            .map(|l| l.subscriber.name())
            .collect()
    }

    /// Whether anything subscribes to `kind`.
    #[must_use]
    pub fn has_listeners(&self, kind: EventKind) -> bool {
        self.listeners.iter().any(|l| l.kind == kind)
    }

    /// Total number of `(kind, subscriber)` entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Whether no subscriptions are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries: Vec<_> = self
            .listeners
            .iter()
            .map(|l| (l.kind.as_str(), l.subscriber.name(), l.priority))
            .collect();
        f.debug_struct("EventDispatcher")
            .field("listeners", &entries)
            .finish()
    }
}

/// Builder for [`EventDispatcher`].
#[derive(Default)]
pub struct EventDispatcherBuilder {
    subscribers: Vec<Arc<dyn Subscriber>>,
}

impl EventDispatcherBuilder {
    /// Register a subscriber.
    #[must_use]
    pub fn subscriber<S: Subscriber + 'static>(self, subscriber: S) -> Self {
        self.shared(Arc::new(subscriber))
    }

    /// Register a subscriber the caller keeps a handle to.
    #[must_use]
    pub fn shared(mut self, subscriber: Arc<dyn Subscriber>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Build the sorted table.
    #[must_use]
    pub fn build(self) -> EventDispatcher {
        let mut listeners: Vec<Listener> = self
            .subscribers
            .iter()
            .flat_map(|subscriber| {
                subscriber
                    .subscribed_events()
                    .into_iter()
                    .map(move |subscription| Listener {
                        kind: subscription.kind,
                        priority: subscription.priority,
                        subscriber: Arc::clone(subscriber),
                    })
            })
            .collect();

        // sort_by_key is stable: equal priorities keep registration order.
        listeners.sort_by_key(|l| Reverse(l.priority));

        EventDispatcher {
            listeners,
            subscribers: self.subscribers,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use courier_core::message::{HttpMethod, Request};
    use courier_core::subscriber::Subscription;
    use courier_core::PipelineError;
    use std::sync::Mutex;

    struct Tagger {
        name: &'static str,
        priority: i32,
        log: Arc<Mutex<Vec<&'static str>>>,
        fail: bool,
    }

    impl Subscriber for Tagger {
        fn name(&self) -> &'static str {
            self.name
        }

        fn subscribed_events(&self) -> Vec<Subscription> {
            vec![Subscription::new(EventKind::RequestCreated, self.priority)]
        }

        fn on_request_created(&self, _event: &mut PipelineEvent) -> Result<()> {
            self.log.lock().unwrap().push(self.name);
            if self.fail {
                return Err(PipelineError::Subscriber {
                    subscriber: self.name.to_string(),
                    reason: "boom".to_string(),
                });
            }
            Ok(())
        }
    }

    fn tagger(name: &'static str, priority: i32, log: &Arc<Mutex<Vec<&'static str>>>) -> Tagger {
        Tagger {
            name,
            priority,
            log: Arc::clone(log),
            fail: false,
        }
    }

    fn created() -> PipelineEvent {
        PipelineEvent::request_created(Request::new(HttpMethod::Get, "https://example.com"))
    }

    #[test]
    fn fires_by_descending_priority_then_registration() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = EventDispatcher::builder()
            .subscriber(tagger("low", -10, &log))
            .subscriber(tagger("first_tie", 5, &log))
            .subscriber(tagger("high", 100, &log))
            .subscriber(tagger("second_tie", 5, &log))
            .build();

        dispatcher.dispatch(&mut created()).unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["high", "first_tie", "second_tie", "low"]
        );
        assert_eq!(
            dispatcher.listeners(EventKind::RequestCreated),
            vec!["high", "first_tie", "second_tie", "low"]
        );
    }

    #[test]
    fn error_stops_remaining_subscribers() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut failing = tagger("failing", 10, &log);
        failing.fail = true;

        let dispatcher = EventDispatcher::builder()
            .subscriber(failing)
            .subscriber(tagger("after", 0, &log))
            .build();

        let error = dispatcher.dispatch(&mut created()).unwrap_err();

        assert!(matches!(error, PipelineError::Subscriber { .. }));
        assert_eq!(*log.lock().unwrap(), vec!["failing"]);
    }

    #[test]
    fn other_kinds_are_not_dispatched() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = EventDispatcher::builder()
            .subscriber(tagger("created_only", 0, &log))
            .build();

        let request = Request::new(HttpMethod::Get, "https://example.com");
        let mut event = PipelineEvent::multi_request_created(vec![request]);
        dispatcher.dispatch(&mut event).unwrap();

        assert!(log.lock().unwrap().is_empty());
        assert!(!dispatcher.has_listeners(EventKind::MultiRequestCreated));
        assert_eq!(dispatcher.len(), 1);
    }

    struct Releaser {
        released: Arc<Mutex<Vec<RequestId>>>,
    }

    impl Subscriber for Releaser {
        fn name(&self) -> &'static str {
            "releaser"
        }

        fn subscribed_events(&self) -> Vec<Subscription> {
            EventKind::ALL
                .iter()
                .map(|kind| Subscription::new(*kind, 0))
                .collect()
        }

        fn on_abandoned(&self, ids: &[RequestId]) {
            self.released.lock().unwrap().extend_from_slice(ids);
        }
    }

    #[test]
    fn abandon_reaches_each_subscriber_once() {
        let released = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = EventDispatcher::builder()
            .subscriber(Releaser {
                released: Arc::clone(&released),
            })
            .subscriber(tagger("untouched", 0, &log))
            .build();

        let id = RequestId::new();
        dispatcher.abandon(&[id]);
        dispatcher.abandon(&[]);

        assert_eq!(*released.lock().unwrap(), vec![id]);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn empty_dispatcher_accepts_everything() {
        let dispatcher = EventDispatcher::default();
        assert!(dispatcher.is_empty());
        assert!(dispatcher.dispatch(&mut created()).is_ok());
    }
}
