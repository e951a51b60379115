use std::sync::{Arc, Mutex, Weak};

use tracing::debug;

type Slot = Arc<Mutex<Option<bool>>>;

/// Reports whether the layout is compact, derived from the viewport width.
///
/// Every subscriber owns a single slot holding the latest undelivered
/// compactness. Publishing overwrites the slot, so a slow consumer only ever
/// sees the most recent state.
#[derive(Debug)]
pub struct Viewport {
    breakpoint: u16,
    current: Option<bool>,
    subscribers: Vec<Weak<Mutex<Option<bool>>>>,
}

impl Viewport {
    /// Widths strictly below `breakpoint` are compact.
    pub fn new(breakpoint: u16) -> Self {
        Self {
            breakpoint,
            current: None,
            subscribers: Vec::new(),
        }
    }

    pub fn is_compact_width(&self, width: u16) -> bool {
        width < self.breakpoint
    }

    pub fn is_compact(&self) -> Option<bool> {
        self.current
    }

    /// New subscription, primed with the current state if one is known.
    pub fn subscribe(&mut self) -> ViewportSubscription {
        let slot: Slot = Arc::new(Mutex::new(self.current));
        self.subscribers.push(Arc::downgrade(&slot));
        ViewportSubscription { slot }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .iter()
            .filter(|s| s.strong_count() > 0)
            .count()
    }

    /// Feeds a new width. Subscribers are only notified when compactness
    /// changes.
    pub fn publish_width(&mut self, width: u16) {
        let compact = self.is_compact_width(width);
        if self.current == Some(compact) {
            return;
        }
        debug!("Viewport width {} -> compact: {}", width, compact);
        self.current = Some(compact);

        // Dropped subscriptions are unsubscribed here
        self.subscribers.retain(|weak| match weak.upgrade() {
            Some(slot) => {
                if let Ok(mut latest) = slot.lock() {
                    *latest = Some(compact);
                }
                true
            }
            None => false,
        });
    }
}

/// Receiving end of a viewport subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct ViewportSubscription {
    slot: Slot,
}

impl ViewportSubscription {
    /// Latest compactness not yet taken, if any.
    pub fn take(&self) -> Option<bool> {
        self.slot.lock().ok().and_then(|mut latest| latest.take())
    }
}
