//! Per-instance publish/subscribe.
//!
//! Each image handler owns one [`EventBus`]. Delivery is synchronous and in
//! subscription order; nothing is buffered or replayed, so a listener only
//! sees events published after it subscribed.
//!
//! # Invariants
//!
//! 1. `publish` calls every listener registered for the topic at the moment
//!    `publish` starts, in registration order.
//! 2. A listener added during a publish is not called for that publish.
//! 3. A listener cancelled during a publish is not called if it has not
//!    been reached yet.
//! 4. Dropping a [`Subscription`] cancels it, unless it was [`kept`](Subscription::keep).
//!
//! The bus is single-threaded (`Rc<RefCell<..>>`), like the UI thread it
//! serves.

use crate::geometry::Dimensions;
use serde::Serialize;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// The raster finished decoding and is drawn into the source surface.
    Load,
    /// A lens was attached.
    LoadLens,
    /// Surfaces that mirror the source size must resize.
    SetLensDimensions,
}

impl Topic {
    pub fn as_str(self) -> &'static str {
        match self {
            Topic::Load => "load",
            Topic::LoadLens => "load-lens",
            Topic::SetLensDimensions => "set-lens-dimensions",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of a `load` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadInfo {
    pub url: String,
    pub dimensions: Dimensions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "topic", rename_all = "kebab-case")]
pub enum Event {
    Load(LoadInfo),
    /// Carries the attached lens' size.
    LoadLens(Dimensions),
    /// Carries the source surface size.
    SetLensDimensions(Dimensions),
}

impl Event {
    pub fn topic(&self) -> Topic {
        match self {
            Event::Load(_) => Topic::Load,
            Event::LoadLens(_) => Topic::LoadLens,
            Event::SetLensDimensions(_) => Topic::SetLensDimensions,
        }
    }
}

type Listener = Rc<RefCell<dyn FnMut(&Event)>>;

struct Registration {
    id: u64,
    topic: Topic,
    listener: Listener,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    registrations: Vec<Registration>,
}

impl Registry {
    fn contains(&self, id: u64) -> bool {
        self.registrations.iter().any(|r| r.id == id)
    }
}

/// Cloning yields another handle to the same bus.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Rc<RefCell<Registry>>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.registry.borrow().registrations.len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for future publishes on `topic`.
    pub fn subscribe<F>(&self, topic: Topic, callback: F) -> Subscription
    where
        F: FnMut(&Event) + 'static,
    {
        let mut registry = self.registry.borrow_mut();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.registrations.push(Registration {
            id,
            topic,
            listener: Rc::new(RefCell::new(callback)),
        });

        Subscription {
            id,
            topic,
            registry: Rc::downgrade(&self.registry),
            active: true,
        }
    }

    /// Deliver `event` to the current subscribers of its topic. Returns how
    /// many listeners were called; publishing to nobody is not an error.
    pub fn publish(&self, event: &Event) -> usize {
        let topic = event.topic();
        let snapshot: Vec<(u64, Listener)> = self
            .registry
            .borrow()
            .registrations
            .iter()
            .filter(|r| r.topic == topic)
            .map(|r| (r.id, Rc::clone(&r.listener)))
            .collect();

        let mut delivered = 0;
        for (id, listener) in snapshot {
            if !self.registry.borrow().contains(id) {
                continue;
            }
            match listener.try_borrow_mut() {
                Ok(mut callback) => {
                    (&mut *callback)(event);
                    delivered += 1;
                }
                Err(_) => {
                    log::warn!("skipping re-entrant delivery of '{topic}' to listener {id}");
                }
            }
        }
        delivered
    }

    pub fn listener_count(&self, topic: Topic) -> usize {
        self.registry
            .borrow()
            .registrations
            .iter()
            .filter(|r| r.topic == topic)
            .count()
    }
}

/// Handle to one registered listener. Dropping it unsubscribes.
#[derive(Debug)]
#[must_use = "dropping a Subscription unsubscribes it immediately; call `keep()` to leave it installed"]
pub struct Subscription {
    id: u64,
    topic: Topic,
    registry: Weak<RefCell<Registry>>,
    active: bool,
}

impl Subscription {
    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// Remove the listener now.
    pub fn cancel(self) {}

    /// Leave the listener installed for the lifetime of the bus.
    pub fn keep(mut self) {
        self.active = false;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if !self.active {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry
                .borrow_mut()
                .registrations
                .retain(|r| r.id != self.id);
        }
    }
}
