//! Per-domain pub/sub for progressive icon updates
//!
//! An explicit observer list with synchronous delivery: UI layers adapt
//! this to whatever reactivity primitive they use. The registry is owned
//! here and never persisted.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{trace, warn};

type IconUpdateCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Handle returned by [`IconUpdateBroadcaster::subscribe`]; pass it back
/// to `unsubscribe`. Dropping it without unsubscribing leaves the
/// subscription active (component unmount is expected to unsubscribe).
#[derive(Debug, Clone)]
pub struct IconSubscription {
    id: u64,
    domain: String,
}

#[derive(Default)]
pub struct IconUpdateBroadcaster {
    subscribers: Mutex<HashMap<String, Vec<(u64, IconUpdateCallback)>>>,
    next_id: AtomicU64,
}

impl IconUpdateBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for one domain. Multiple subscribers per
    /// domain are allowed; delivery happens in registration order.
    pub fn subscribe(
        &self,
        domain: &str,
        callback: impl Fn(&str) + Send + Sync + 'static,
    ) -> IconSubscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .lock()
            .unwrap()
            .entry(domain.to_string())
            .or_default()
            .push((id, Arc::new(callback)));
        trace!("Subscribed {} to icon updates for {}", id, domain);
        IconSubscription {
            id,
            domain: domain.to_string(),
        }
    }

    /// Remove a subscription. Idempotent: unsubscribing twice is a no-op.
    pub fn unsubscribe(&self, subscription: &IconSubscription) {
        let mut subscribers = self.subscribers.lock().unwrap();
        if let Some(list) = subscribers.get_mut(&subscription.domain) {
            list.retain(|(id, _)| *id != subscription.id);
            if list.is_empty() {
                subscribers.remove(&subscription.domain);
            }
        }
    }

    /// Invoke all current subscribers for the domain synchronously, in
    /// registration order. A panicking callback is caught and logged and
    /// must not block delivery to the rest.
    pub fn publish(&self, domain: &str, url: &str) {
        let callbacks: Vec<IconUpdateCallback> = {
            let subscribers = self.subscribers.lock().unwrap();
            match subscribers.get(domain) {
                Some(list) => list.iter().map(|(_, cb)| Arc::clone(cb)).collect(),
                None => return,
            }
        };

        trace!(
            "Publishing icon update for {} to {} subscriber(s): {}",
            domain,
            callbacks.len(),
            url
        );
        for callback in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(url))).is_err() {
                warn!("Icon update subscriber for {} panicked; continuing", domain);
            }
        }
    }

    pub fn subscriber_count(&self, domain: &str) -> usize {
        self.subscribers
            .lock()
            .unwrap()
            .get(domain)
            .map(|list| list.len())
            .unwrap_or(0)
    }
}
