//! Minimal synchronous reactive primitives.
//!
//! A [`Subject`] delivers each emitted value to its listeners in subscription
//! order, on the caller's stack. A [`Control`] pairs a current value with a
//! subject of user edits, the way a form field does: [`Control::set_value`]
//! emits, [`Control::seed`] does not. Listeners are removed when their
//! [`Subscription`] is dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

type Listener<T> = Box<dyn FnMut(&T) + Send>;

struct Entry<T> {
    active: Arc<AtomicBool>,
    listener: Listener<T>,
}

/// Synchronous multicast of values.
pub struct Subject<T> {
    listeners: Arc<Mutex<Vec<Entry<T>>>>,
}

impl<T> Clone for Subject<T> {
    fn clone(&self) -> Self {
        Self {
            listeners: self.listeners.clone(),
        }
    }
}

impl<T> Default for Subject<T> {
    fn default() -> Self {
        Self {
            listeners: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<T> Subject<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: impl FnMut(&T) + Send + 'static) -> Subscription {
        let active = Arc::new(AtomicBool::new(true));
        self.listeners.lock().push(Entry {
            active: active.clone(),
            listener: Box::new(listener),
        });
        Subscription { active }
    }

    /// Deliver `value` to every live listener.
    ///
    /// A listener must not emit on the subject it is registered with; such
    /// nested emissions reach only listeners added during the outer emission.
    pub fn emit(&self, value: &T) {
        let mut running = std::mem::take(&mut *self.listeners.lock());
        for entry in running.iter_mut() {
            if entry.active.load(Ordering::Acquire) {
                (entry.listener)(value);
            }
        }

        let mut listeners = self.listeners.lock();
        running.append(&mut listeners);
        running.retain(|e| e.active.load(Ordering::Acquire));
        *listeners = running;
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .iter()
            .filter(|e| e.active.load(Ordering::Acquire))
            .count()
    }
}

/// Keeps a listener registered; dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    active: Arc<AtomicBool>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
    }
}

/// A writable field with a stream of user edits.
pub struct Control<T> {
    value: Arc<Mutex<T>>,
    changes: Subject<T>,
}

impl<T> Clone for Control<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            changes: self.changes.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> Control<T> {
    pub fn new(initial: T) -> Self {
        Self {
            value: Arc::new(Mutex::new(initial)),
            changes: Subject::new(),
        }
    }

    pub fn value(&self) -> T {
        self.value.lock().clone()
    }

    /// Store `value` and emit it as an edit, even if unchanged.
    pub fn set_value(&self, value: T) {
        *self.value.lock() = value.clone();
        self.changes.emit(&value);
    }

    /// Store `value` without emitting.
    pub fn seed(&self, value: T) {
        *self.value.lock() = value;
    }

    pub fn value_changes(&self) -> &Subject<T> {
        &self.changes
    }
}

/// Wrap `f` so it only runs when the value differs from the previous one it saw.
pub fn distinct_until_changed<T, F>(mut f: F) -> impl FnMut(&T) + Send + 'static
where
    T: PartialEq + Clone + Send + 'static,
    F: FnMut(&T) + Send + 'static,
{
    let mut last: Option<T> = None;
    move |value: &T| {
        if last.as_ref() == Some(value) {
            return;
        }
        last = Some(value.clone());
        f(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_in_subscription_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let subject = Subject::<u32>::new();
        let a = seen.clone();
        let _s1 = subject.subscribe(move |v| a.lock().push(("a", *v)));
        let b = seen.clone();
        let _s2 = subject.subscribe(move |v| b.lock().push(("b", *v)));

        subject.emit(&1);
        subject.emit(&2);

        assert_eq!(*seen.lock(), vec![("a", 1), ("b", 1), ("a", 2), ("b", 2)]);
    }

    #[test]
    fn dropped_subscription_stops_delivery() {
        let count = Arc::new(Mutex::new(0));
        let subject = Subject::<()>::new();
        let c = count.clone();
        let sub = subject.subscribe(move |_| *c.lock() += 1);

        subject.emit(&());
        drop(sub);
        subject.emit(&());

        assert_eq!(*count.lock(), 1);
        assert_eq!(subject.listener_count(), 0);
    }

    #[test]
    fn listener_added_during_emit_is_kept() {
        let subject = Subject::<u8>::new();
        let inner = subject.clone();
        let held = Arc::new(Mutex::new(Vec::new()));
        let h = held.clone();
        let _outer = subject.subscribe(move |_| {
            h.lock().push(inner.subscribe(|_| {}));
        });

        subject.emit(&0);
        assert_eq!(subject.listener_count(), 2);
    }

    #[test]
    fn seed_does_not_emit() {
        let control = Control::new(false);
        let count = Arc::new(Mutex::new(0));
        let c = count.clone();
        let _sub = control.value_changes().subscribe(move |_| *c.lock() += 1);

        control.seed(true);
        assert!(control.value());
        assert_eq!(*count.lock(), 0);

        control.set_value(false);
        assert_eq!(*count.lock(), 1);
    }

    #[test]
    fn distinct_skips_repeats_only_against_previous() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let mut f = distinct_until_changed(move |v: &u8| s.lock().push(*v));
        for v in [1, 1, 2, 2, 1] {
            f(&v);
        }
        assert_eq!(*seen.lock(), vec![1, 2, 1]);
    }
}
