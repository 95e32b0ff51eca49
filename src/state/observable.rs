//! Observable value holders for the presentation layer

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Inner<T> {
    value: T,
    next_id: u64,
    listeners: Vec<(u64, Listener<T>)>,
}

/// A value that notifies its subscribers synchronously whenever it changes.
///
/// Clones share the same value and listener list.
pub struct Observable<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for Observable<T>
where
    T: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = lock(&self.inner);
        f.debug_struct("Observable")
            .field("value", &inner.value)
            .field("listeners", &inner.listeners.len())
            .finish()
    }
}

fn lock<T>(inner: &Mutex<Inner<T>>) -> MutexGuard<'_, Inner<T>> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T> Observable<T>
where
    T: Clone + PartialEq + Send + 'static,
{
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                value,
                next_id: 0,
                listeners: Vec::new(),
            })),
        }
    }

    /// Current value
    pub fn get(&self) -> T {
        lock(&self.inner).value.clone()
    }

    /// Replace the value, notifying listeners if it changed.
    ///
    /// Returns whether the value changed. Listeners run after the internal
    /// lock is released, on the calling thread.
    pub fn set(&self, value: T) -> bool {
        let listeners: Vec<Listener<T>> = {
            let mut inner = lock(&self.inner);
            if inner.value == value {
                return false;
            }
            inner.value = value.clone();
            inner.listeners.iter().map(|(_, l)| Arc::clone(l)).collect()
        };

        for listener in listeners {
            listener(&value);
        }
        true
    }

    /// Register a listener. It receives the current value straight away and
    /// every later change until the returned [`Subscription`] is dropped.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let listener: Listener<T> = Arc::new(listener);
        let (id, current) = {
            let mut inner = lock(&self.inner);
            let id = inner.next_id;
            inner.next_id += 1;
            inner.listeners.push((id, Arc::clone(&listener)));
            (id, inner.value.clone())
        };
        listener(&current);

        let weak: Weak<Mutex<Inner<T>>> = Arc::downgrade(&self.inner);
        Subscription {
            unsubscribe: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    lock(&inner).listeners.retain(|(lid, _)| *lid != id);
                }
            })),
        }
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner).listeners.len()
    }
}

/// Keeps a listener registered; dropping it unsubscribes
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Remove the listener now
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<u64>>>, impl Fn(&u64) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |v: &u64| sink.lock().unwrap().push(*v))
    }

    #[test]
    fn test_subscribe_delivers_current_then_changes() {
        let value = Observable::new(3u64);
        let (seen, listener) = recorder();
        let _sub = value.subscribe(listener);

        assert!(value.set(4));
        assert!(!value.set(4));
        assert!(value.set(0));

        assert_eq!(*seen.lock().unwrap(), vec![3, 4, 0]);
        assert_eq!(value.get(), 0);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let value = Observable::new(0u64);
        let (seen, listener) = recorder();
        let sub = value.subscribe(listener);
        assert_eq!(value.subscriber_count(), 1);

        drop(sub);
        assert_eq!(value.subscriber_count(), 0);
        value.set(9);
        assert_eq!(*seen.lock().unwrap(), vec![0]);
    }

    #[test]
    fn test_explicit_unsubscribe_leaves_others() {
        let value = Observable::new(0u64);
        let (first, l1) = recorder();
        let (second, l2) = recorder();
        let sub1 = value.subscribe(l1);
        let _sub2 = value.subscribe(l2);

        sub1.unsubscribe();
        value.set(1);

        assert_eq!(*first.lock().unwrap(), vec![0]);
        assert_eq!(*second.lock().unwrap(), vec![0, 1]);
    }

    #[test]
    fn test_listener_may_read_holder() {
        let value = Observable::new(false);
        let reader = value.clone();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = value.subscribe(move |_| sink.lock().unwrap().push(reader.get()));

        value.set(true);
        assert_eq!(*seen.lock().unwrap(), vec![false, true]);
    }

    #[test]
    fn test_subscription_outliving_holder() {
        let value = Observable::new(1u64);
        let (_, listener) = recorder();
        let sub = value.subscribe(listener);
        drop(value);
        drop(sub);
    }
}
