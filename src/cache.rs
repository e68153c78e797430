//! Keyed store for map instances and their elements, so long-lived maps
//! survive the components that created them.
//!
//! Entries are saved as an {element, handle} pair and re-parented into the
//! next mount instead of rebuilding the map, which is what makes navigating
//! away and back cheap.
//!
//! # Slot states
//! - `Pending`: a fresh load for the key is in flight. The slot pins the
//!   element and collects waiters so a racing mount for the same key attaches
//!   to the in-flight load rather than starting a second one.
//! - `Ready`: the map has loaded; the slot owns the cached pair until the
//!   controller that registered the key evicts it.
//!
//! At most one slot exists per key. Registering over a live slot is an
//! explicit error, not a silent replacement.

use crate::surface::MapHost;
use crate::{MapHandle, MapsError};
use log::{debug, warn};
use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

/// A cached {element, handle} pair.
pub struct CachedMap<H: MapHost> {
    pub element: H::Element,
    pub handle: Rc<MapHandle<H::Surface>>,
}

impl<H: MapHost> Clone for CachedMap<H> {
    fn clone(&self) -> Self {
        Self {
            element: self.element.clone(),
            handle: self.handle.clone(),
        }
    }
}

/// A mount waiting on another mount's in-flight load for the same key.
///
/// `alive` is flipped off when the waiting mount unmounts; the notification
/// is dropped rather than delivered to a dead mount.
pub(crate) struct Waiter<H: MapHost> {
    pub alive: Rc<Cell<bool>>,
    pub notify: Box<dyn FnOnce(&Rc<MapHandle<H::Surface>>)>,
}

enum Slot<H: MapHost> {
    Pending {
        element: H::Element,
        waiters: Vec<Waiter<H>>,
    },
    Ready(CachedMap<H>),
}

/// Process-wide (per host thread) store of cached maps, keyed by `map_id`.
///
/// Mutated only by [`MapController`](crate::map::MapController); single
/// threaded cooperative access, no internal locking.
pub struct MapCache<H: MapHost> {
    slots: HashMap<String, Slot<H>>,
}

impl<H: MapHost> Default for MapCache<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: MapHost> MapCache<H> {
    pub fn new() -> Self {
        Self {
            slots: HashMap::new(),
        }
    }

    /// True if any slot (pending or ready) exists for `key`.
    pub fn has(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    /// Lookup of a ready entry. No side effects.
    pub fn get(&self, key: &str) -> Option<&CachedMap<H>> {
        match self.slots.get(key) {
            Some(Slot::Ready(entry)) => Some(entry),
            _ => None,
        }
    }

    /// The element pinned by an in-flight load for `key`, if one exists.
    pub fn pending_element(&self, key: &str) -> Option<&H::Element> {
        match self.slots.get(key) {
            Some(Slot::Pending { element, .. }) => Some(element),
            _ => None,
        }
    }

    /// Register a ready pair for `key`.
    pub fn insert(
        &mut self,
        key: String,
        element: H::Element,
        handle: Rc<MapHandle<H::Surface>>,
    ) -> Result<(), MapsError> {
        if self.slots.contains_key(&key) {
            return Err(MapsError::DuplicateMap(key));
        }
        debug!("caching map '{}'", key);
        self.slots.insert(key, Slot::Ready(CachedMap { element, handle }));
        Ok(())
    }

    /// Claim `key` for a load that has just begun. The element is pinned so
    /// racing mounts can re-parent it while the map is still constructing.
    pub(crate) fn begin_pending(
        &mut self,
        key: String,
        element: H::Element,
    ) -> Result<(), MapsError> {
        if self.slots.contains_key(&key) {
            return Err(MapsError::DuplicateMap(key));
        }
        debug!("pending cache slot for map '{}'", key);
        self.slots.insert(
            key,
            Slot::Pending {
                element,
                waiters: Vec::new(),
            },
        );
        Ok(())
    }

    /// Attach a waiter to the in-flight load for `key`. Returns false if the
    /// key has no pending slot.
    pub(crate) fn subscribe(&mut self, key: &str, waiter: Waiter<H>) -> bool {
        match self.slots.get_mut(key) {
            Some(Slot::Pending { waiters, .. }) => {
                waiters.push(waiter);
                true
            }
            _ => false,
        }
    }

    /// Promote the pending slot for `key` to ready, handing back the waiters
    /// for the caller to notify once its own mount has been told.
    pub(crate) fn complete(
        &mut self,
        key: &str,
        handle: Rc<MapHandle<H::Surface>>,
    ) -> Vec<Waiter<H>> {
        match self.slots.remove(key) {
            Some(Slot::Pending { element, waiters }) => {
                debug!("map '{}' loaded; cache slot ready", key);
                self.slots
                    .insert(key.to_string(), Slot::Ready(CachedMap { element, handle }));
                waiters
            }
            Some(Slot::Ready(prev)) => {
                warn!("map '{}' completed over an existing ready slot", key);
                self.slots.insert(
                    key.to_string(),
                    Slot::Ready(CachedMap {
                        element: prev.element,
                        handle,
                    }),
                );
                Vec::new()
            }
            None => {
                debug!("load for map '{}' finished after eviction", key);
                Vec::new()
            }
        }
    }

    /// Evict `key`. Returns whether a slot existed.
    pub fn delete(&mut self, key: &str) -> bool {
        self.slots.remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
