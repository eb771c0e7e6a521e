use parking_lot::Mutex;
use std::sync::Arc;

/// Handle returned by [`Subscribers::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// A list of callbacks notified of values of type `T`.
///
/// Callbacks run synchronously on the emitting thread, in subscription order.
/// The list is snapshotted before dispatch, so a callback may subscribe or
/// unsubscribe without deadlocking.
pub struct Subscribers<T> {
    inner: Mutex<SubscriberList<T>>,
}

struct SubscriberList<T> {
    next_id: u64,
    callbacks: Vec<(SubscriptionId, Callback<T>)>,
}

impl<T> Default for Subscribers<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Subscribers<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(SubscriberList {
                next_id: 0,
                callbacks: Vec::new(),
            }),
        }
    }

    pub fn subscribe(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> SubscriptionId {
        let mut inner = self.inner.lock();
        let id = SubscriptionId(inner.next_id);
        inner.next_id += 1;
        inner.callbacks.push((id, Arc::new(callback)));
        id
    }

    /// Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.callbacks.len();
        inner.callbacks.retain(|(existing, _)| *existing != id);
        inner.callbacks.len() != before
    }

    pub fn emit(&self, value: &T) {
        let callbacks: Vec<Callback<T>> = {
            let inner = self.inner.lock();
            inner.callbacks.iter().map(|(_, cb)| cb.clone()).collect()
        };
        for callback in callbacks {
            callback(value);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callbacks_run_in_subscription_order() {
        let subscribers = Subscribers::<u32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let first = seen.clone();
        subscribers.subscribe(move |v| first.lock().push(("first", *v)));
        let second = seen.clone();
        subscribers.subscribe(move |v| second.lock().push(("second", *v)));

        subscribers.emit(&7);
        assert_eq!(*seen.lock(), vec![("first", 7), ("second", 7)]);
    }

    #[test]
    fn unsubscribed_callback_is_not_called() {
        let subscribers = Subscribers::<()>::new();
        let count = Arc::new(Mutex::new(0));

        let counter = count.clone();
        let id = subscribers.subscribe(move |_| *counter.lock() += 1);
        subscribers.emit(&());
        assert!(subscribers.unsubscribe(id));
        assert!(!subscribers.unsubscribe(id));
        subscribers.emit(&());

        assert_eq!(*count.lock(), 1);
        assert!(subscribers.is_empty());
    }

    #[test]
    fn callback_may_subscribe_during_emit() {
        let subscribers = Arc::new(Subscribers::<u8>::new());
        let inner = subscribers.clone();
        subscribers.subscribe(move |_| {
            inner.subscribe(|_| {});
        });

        subscribers.emit(&1);
        assert_eq!(subscribers.len(), 2);
    }
}
