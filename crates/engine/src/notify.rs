//! Renderer-facing "needs update" notifications.
//!
//! Listeners are called synchronously after an output actually changes
//! (a composite publish or a displacement edit), never on every mutation;
//! the painting hot path stays free of notification fan-out.

use layers::NodeId;
use parking_lot::Mutex;

/// Which engine output changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateKind {
    /// The published composite surface was replaced.
    Composite,
    /// A layer's height field / normal map changed.
    Displacement(NodeId),
}

/// Handle for removing a listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn Fn(UpdateKind) + Send + Sync>;

#[derive(Default)]
pub(crate) struct Notifier {
    listeners: Mutex<Vec<(SubscriptionId, Listener)>>,
    next_id: Mutex<u64>,
}

impl Notifier {
    pub fn subscribe(&self, listener: Listener) -> SubscriptionId {
        let mut next = self.next_id.lock();
        let id = SubscriptionId(*next);
        *next += 1;
        self.listeners.lock().push((id, listener));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.listeners.lock().retain(|(sid, _)| *sid != id);
    }

    pub fn emit(&self, kind: UpdateKind) {
        for (_, listener) in self.listeners.lock().iter() {
            listener(kind);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_subscribe_emit_unsubscribe() {
        let notifier = Notifier::default();
        let count = Arc::new(AtomicUsize::new(0));

        let c = count.clone();
        let id = notifier.subscribe(Box::new(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        }));

        notifier.emit(UpdateKind::Composite);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        notifier.unsubscribe(id);
        notifier.emit(UpdateKind::Composite);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
