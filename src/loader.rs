//! Cancellation-aware wrapper around the host's asynchronous map
//! construction.

use crate::surface::MapHost;
use log::debug;
use serde_json::Value;
use std::cell::Cell;
use std::rc::Rc;

/// Starts one map load and lets the owning mount cancel it.
///
/// Exactly one of `on_complete`/`on_error` fires on success/failure; neither
/// fires after [`cancel`](MapLoader::cancel). A suppressed completion mutates
/// nothing — the stale callback is simply dropped.
pub struct MapLoader<H: MapHost> {
    host: Rc<H>,
    cancelled: Rc<Cell<bool>>,
    finished: Rc<Cell<bool>>,
}

impl<H: MapHost> Clone for MapLoader<H> {
    fn clone(&self) -> Self {
        Self {
            host: self.host.clone(),
            cancelled: self.cancelled.clone(),
            finished: self.finished.clone(),
        }
    }
}

impl<H: MapHost> MapLoader<H> {
    pub fn new(host: Rc<H>) -> Self {
        Self {
            host,
            cancelled: Rc::new(Cell::new(false)),
            finished: Rc::new(Cell::new(false)),
        }
    }

    /// Begin construction of a map inside `element`.
    ///
    /// `options` must already be merged (environment defaults + per-mount
    /// overrides); the access token travels separately so hosts can apply it
    /// before constructing.
    pub fn load<F, E>(
        &self,
        access_token: &str,
        options: &Value,
        element: &H::Element,
        on_complete: F,
        on_error: E,
    ) where
        F: FnOnce(H::Surface) + 'static,
        E: FnOnce(String) + 'static,
    {
        let cancelled = self.cancelled.clone();
        let finished = self.finished.clone();
        self.host.begin_load(
            access_token,
            options,
            element,
            Box::new(move |result| {
                if cancelled.get() {
                    debug!("map load completion suppressed after cancel");
                    return;
                }
                finished.set(true);
                match result {
                    Ok(surface) => on_complete(surface),
                    Err(message) => on_error(message),
                }
            }),
        );
    }

    /// Suppress the eventual completion. Idempotent; a no-op once the load
    /// has already finished.
    pub fn cancel(&self) {
        if self.finished.get() || self.cancelled.get() {
            return;
        }
        debug!("map load cancelled");
        self.cancelled.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}
