use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, warn};

/// Boxed future returned by a handler invocation
pub type HandlerFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

type Handler<P> = Arc<dyn Fn(P) -> HandlerFuture + Send + Sync>;

/// Identifies one subscription on one notifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscriber<P> {
    id: SubscriptionId,
    tx: UnboundedSender<P>,
}

struct Inner<P> {
    name: String,
    subscribers: Mutex<Vec<Subscriber<P>>>,
    next_id: AtomicU64,
    parent: Option<Notifier<P>>,
}

/// A named signal channel
///
/// Cloning a `Notifier` yields another handle on the same channel.
pub struct Notifier<P> {
    inner: Arc<Inner<P>>,
}

impl<P> Clone for Notifier<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P> fmt::Debug for Notifier<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self
            .inner
            .subscribers
            .lock()
            .map(|subs| subs.len())
            .unwrap_or_default();
        f.debug_struct("Notifier")
            .field("name", &self.inner.name)
            .field("handlers", &handlers)
            .field("has_parent", &self.inner.parent.is_some())
            .finish()
    }
}

impl<P> Notifier<P>
where
    P: Clone + Send + 'static,
{
    pub fn new(name: impl Into<String>) -> Self {
        Self::build(name.into(), None)
    }

    /// Creates a notifier whose publishes are also delivered to `parent`'s subscribers
    pub fn with_parent(name: impl Into<String>, parent: &Notifier<P>) -> Self {
        Self::build(name.into(), Some(parent.clone()))
    }

    fn build(name: String, parent: Option<Notifier<P>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                name,
                subscribers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
                parent,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers().len()
    }

    fn subscribers(&self) -> MutexGuard<'_, Vec<Subscriber<P>>> {
        // the list stays consistent even if a holder panicked
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Registers `handler` for every future publish on this notifier
    ///
    /// Subscribing the same closure twice registers it twice; use the
    /// returned id with [`Notifier::unsubscribe`] to remove one registration.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn subscribe<F, Fut>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let handler: Handler<P> =
            Arc::new(move |payload: P| -> HandlerFuture { Box::pin(handler(payload)) });
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = unbounded_channel();

        tokio::spawn(deliver(self.inner.name.clone(), id, handler, rx));

        self.subscribers().push(Subscriber { id, tx });
        debug!(signal = %self.inner.name, subscription = id.0, "Handler subscribed");
        id
    }

    /// Removes one subscription; returns `false` if it was not registered here
    ///
    /// Payloads already queued for that subscriber are still delivered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers();
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        before != subscribers.len()
    }

    /// Schedules every handler with `payload` and returns immediately
    pub fn publish(&self, payload: P) {
        {
            let mut subscribers = self.subscribers();
            subscribers.retain(|s| s.tx.send(payload.clone()).is_ok());
        }
        if let Some(parent) = &self.inner.parent {
            parent.publish(payload);
        }
    }
}

/// Delivery loop of one subscriber. Ends when the notifier drops the sender.
async fn deliver<P>(
    signal: String,
    id: SubscriptionId,
    handler: Handler<P>,
    mut rx: UnboundedReceiver<P>,
) where
    P: Send + 'static,
{
    while let Some(payload) = rx.recv().await {
        let handler = Arc::clone(&handler);
        let invocation = tokio::spawn(async move { handler(payload).await });

        match invocation.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!(signal = %signal, subscription = id.0, "Handler failed: {err:#}");
            }
            Err(join_err) if join_err.is_panic() => {
                error!(signal = %signal, subscription = id.0, "Handler panicked");
            }
            Err(join_err) => {
                debug!(signal = %signal, subscription = id.0, "Handler cancelled: {join_err}");
            }
        }
    }
    debug!(signal = %signal, subscription = id.0, "Subscriber closed");
}
