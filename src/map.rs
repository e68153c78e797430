//! Map lifecycle controller: decides per mount whether a map is created
//! fresh, reused from the cache, or attached to an in-flight load, and
//! tears it down (or does not) on unmount.

use crate::cache::{MapCache, Waiter};
use crate::config::{merge_options, EnvironmentConfig};
use crate::loader::MapLoader;
use crate::surface::{MapHost, MapSurface};
use crate::{MapHandle, MapsError};
use log::{debug, warn};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Per-mount configuration.
#[derive(Clone, Debug, Default)]
pub struct MapConfig {
    /// Cache key. Required when `long_lived`.
    pub map_id: Option<String>,
    /// Keep the map and its element alive in the cache across unmounts.
    pub long_lived: bool,
    /// Construction options layered over the environment's map defaults.
    pub init_options: Value,
}

enum MountState<H: MapHost> {
    Unmounted,
    /// A fresh load owned by this mount is in flight.
    FreshLoading,
    /// Attached to another mount's in-flight load for the same key.
    ReusedPending,
    Mounted(Rc<MapHandle<H::Surface>>),
    Failed(String),
}

struct Inner<H: MapHost> {
    config: MapConfig,
    state: MountState<H>,
    /// Flipped off on unmount; every deferred or asynchronous effect checks
    /// it before touching this mount.
    alive: Rc<Cell<bool>>,
    loader: Option<MapLoader<H>>,
    element: Option<H::Element>,
    /// Whether this controller put the current cache entry there.
    registered: bool,
}

type HandleCallback<H> = Rc<dyn Fn(&Rc<MapHandle<<H as MapHost>::Surface>>)>;

/// Orchestrates one map slot through mount / config change / unmount.
///
/// The host drives it from its own component lifecycle; the controller never
/// schedules work except through [`MapHost::defer`] and the load callback.
pub struct MapController<H: MapHost> {
    host: Rc<H>,
    cache: Rc<RefCell<MapCache<H>>>,
    env: Rc<EnvironmentConfig>,
    inner: Rc<RefCell<Inner<H>>>,
    on_loaded: Option<HandleCallback<H>>,
    on_reloaded: Option<HandleCallback<H>>,
    on_failed: Option<Rc<dyn Fn(&str)>>,
}

impl<H: MapHost> MapController<H> {
    pub fn new(
        host: Rc<H>,
        cache: Rc<RefCell<MapCache<H>>>,
        env: Rc<EnvironmentConfig>,
        config: MapConfig,
    ) -> Self {
        Self {
            host,
            cache,
            env,
            inner: Rc::new(RefCell::new(Inner {
                config,
                state: MountState::Unmounted,
                alive: Rc::new(Cell::new(false)),
                loader: None,
                element: None,
                registered: false,
            })),
            on_loaded: None,
            on_reloaded: None,
            on_failed: None,
        }
    }

    /// Notification for a map becoming ready for the first time under this
    /// mount. At most once per mount.
    pub fn on_loaded(mut self, callback: impl Fn(&Rc<MapHandle<H::Surface>>) + 'static) -> Self {
        self.on_loaded = Some(Rc::new(callback));
        self
    }

    /// Notification for reuse of a cached, already-loaded map. At most once
    /// per mount, fired synchronously during `mount`.
    pub fn on_reloaded(mut self, callback: impl Fn(&Rc<MapHandle<H::Surface>>) + 'static) -> Self {
        self.on_reloaded = Some(Rc::new(callback));
        self
    }

    /// Notification for a failed load; the mount is terminally failed.
    pub fn on_failed(mut self, callback: impl Fn(&str) + 'static) -> Self {
        self.on_failed = Some(Rc::new(callback));
        self
    }

    pub fn handle(&self) -> Option<Rc<MapHandle<H::Surface>>> {
        match &self.inner.borrow().state {
            MountState::Mounted(handle) => Some(handle.clone()),
            _ => None,
        }
    }

    pub fn is_mounted(&self) -> bool {
        !matches!(
            self.inner.borrow().state,
            MountState::Unmounted | MountState::Failed(_)
        )
    }

    pub fn failure(&self) -> Option<MapsError> {
        match &self.inner.borrow().state {
            MountState::Failed(message) => Some(MapsError::LoadFailed(message.clone())),
            _ => None,
        }
    }

    /// Mount into `container`: reuse a cached map for the key, attach to an
    /// in-flight load, or begin a fresh one.
    pub fn mount(&self, container: &H::Element) -> Result<(), MapsError> {
        let (long_lived, map_id, init_options) = {
            let inner = self.inner.borrow();
            if !matches!(inner.state, MountState::Unmounted | MountState::Failed(_)) {
                return Err(MapsError::AlreadyMounted);
            }
            (
                inner.config.long_lived,
                inner.config.map_id.clone(),
                inner.config.init_options.clone(),
            )
        };
        if long_lived && map_id.is_none() {
            return Err(MapsError::MissingMapId);
        }
        if self.env.access_token.is_empty() {
            return Err(MapsError::MissingAccessToken);
        }

        // fresh liveness token per mount; stale callbacks from an earlier
        // mount of this controller hold the old one
        let alive = Rc::new(Cell::new(true));
        self.inner.borrow_mut().alive = alive.clone();

        if long_lived {
            if let Some(key) = &map_id {
                // cache borrows end before any callback can re-enter
                let ready = self.cache.borrow().get(key).cloned();
                if let Some(entry) = ready {
                    return self.mount_reused(container, entry);
                }
                let pending = self.cache.borrow().pending_element(key).cloned();
                if let Some(element) = pending {
                    return self.mount_onto_pending(container, key, element, alive);
                }
            }
        }
        self.mount_fresh(container, long_lived, map_id, init_options, alive)
    }

    /// Cache hit on a ready entry: re-parent and announce synchronously.
    fn mount_reused(
        &self,
        container: &H::Element,
        entry: crate::cache::CachedMap<H>,
    ) -> Result<(), MapsError> {
        debug!("reusing cached map");
        self.host.attach(container, &entry.element);
        {
            let mut inner = self.inner.borrow_mut();
            inner.element = Some(entry.element.clone());
            inner.state = MountState::Mounted(entry.handle.clone());
        }
        if let Some(callback) = &self.on_reloaded {
            callback(&entry.handle);
        }
        // resizing resets the map's own just-loaded signal, so it must come
        // after the loaded bookkeeping and the notification
        entry.handle.surface().resize();
        Ok(())
    }

    /// Cache hit on a pending slot: take the element now, hear about the
    /// handle when the owning mount's load completes.
    fn mount_onto_pending(
        &self,
        container: &H::Element,
        key: &str,
        element: H::Element,
        alive: Rc<Cell<bool>>,
    ) -> Result<(), MapsError> {
        debug!("attaching to in-flight load for map '{}'", key);
        self.host.attach(container, &element);
        {
            let mut inner = self.inner.borrow_mut();
            inner.element = Some(element);
            inner.state = MountState::ReusedPending;
        }
        let inner = self.inner.clone();
        let on_loaded = self.on_loaded.clone();
        self.cache.borrow_mut().subscribe(
            key,
            Waiter {
                alive,
                notify: Box::new(move |handle| {
                    inner.borrow_mut().state = MountState::Mounted(handle.clone());
                    if let Some(callback) = &on_loaded {
                        callback(handle);
                    }
                    handle.surface().resize();
                }),
            },
        );
        Ok(())
    }

    /// Cache miss: new element, new load, and — for long-lived mounts — a
    /// pending registration that racing mounts can attach to.
    fn mount_fresh(
        &self,
        container: &H::Element,
        long_lived: bool,
        map_id: Option<String>,
        init_options: Value,
        alive: Rc<Cell<bool>>,
    ) -> Result<(), MapsError> {
        let element = self.host.create_element();
        self.host.attach(container, &element);

        if long_lived {
            if let Some(key) = &map_id {
                self.cache
                    .borrow_mut()
                    .begin_pending(key.clone(), element.clone())?;
            }
        }

        let loader = MapLoader::new(self.host.clone());
        {
            let mut inner = self.inner.borrow_mut();
            inner.element = Some(element.clone());
            inner.loader = Some(loader.clone());
            inner.registered = long_lived;
            inner.state = MountState::FreshLoading;
        }

        let options = merge_options(&self.env.map, &init_options);
        debug!("creating map{}", map_id.as_deref().map(|id| format!(" '{}'", id)).unwrap_or_default());

        let inner = self.inner.clone();
        let cache = self.cache.clone();
        let on_loaded = self.on_loaded.clone();
        let key = map_id.clone();
        let complete_alive = alive.clone();
        let on_complete = move |surface: H::Surface| {
            let handle = Rc::new(MapHandle::new(surface));
            handle.mark_loaded();
            let waiters = match &key {
                Some(key) if long_lived => cache.borrow_mut().complete(key, handle.clone()),
                _ => Vec::new(),
            };
            if complete_alive.get() {
                inner.borrow_mut().state = MountState::Mounted(handle.clone());
                if let Some(callback) = &on_loaded {
                    callback(&handle);
                }
                // strictly after the loaded flag and notification
                handle.surface().resize();
            } else {
                debug!("map loaded after its mount went away");
            }
            for waiter in waiters {
                if waiter.alive.get() {
                    (waiter.notify)(&handle);
                }
            }
        };

        let inner = self.inner.clone();
        let cache = self.cache.clone();
        let on_failed = self.on_failed.clone();
        let key = map_id;
        let on_error = move |message: String| {
            warn!("map load failed: {}", message);
            if let Some(key) = &key {
                if long_lived {
                    cache.borrow_mut().delete(key);
                }
            }
            if alive.get() {
                {
                    let mut inner = inner.borrow_mut();
                    inner.state = MountState::Failed(message.clone());
                    inner.registered = false;
                }
                if let Some(callback) = &on_failed {
                    callback(&message);
                }
            }
        };

        loader.load(&self.env.access_token, &options, &element, on_complete, on_error);
        Ok(())
    }

    /// Replace the mount configuration. Identity (`map_id`, `long_lived`)
    /// is frozen while mounted; option changes apply on the next mount.
    pub fn update_config(&self, config: MapConfig) -> Result<(), MapsError> {
        let mut inner = self.inner.borrow_mut();
        match inner.state {
            MountState::Unmounted | MountState::Failed(_) => {
                inner.config = config;
                Ok(())
            }
            _ => {
                if config.map_id != inner.config.map_id
                    || config.long_lived != inner.config.long_lived
                {
                    return Err(MapsError::MountedIdentityChange);
                }
                if config.init_options != inner.config.init_options {
                    warn!("map init options changed while mounted; they apply on the next mount");
                }
                inner.config = config;
                Ok(())
            }
        }
    }

    /// Unmount. Long-lived maps stay cached untouched; anything else is
    /// cancelled, unregistered and torn down one tick later.
    pub fn unmount(&self) {
        let (long_lived, map_id, handle, loader, registered) = {
            let mut inner = self.inner.borrow_mut();
            if matches!(inner.state, MountState::Unmounted) {
                return;
            }
            inner.alive.set(false);
            let handle = match &inner.state {
                MountState::Mounted(handle) => Some(handle.clone()),
                _ => None,
            };
            let loader = inner.loader.take();
            let snapshot = (
                inner.config.long_lived,
                inner.config.map_id.clone(),
                handle,
                loader,
                inner.registered,
            );
            inner.state = MountState::Unmounted;
            inner.element = None;
            snapshot
        };

        if long_lived {
            // the cache entry (ready or still pending) outlives this mount;
            // an in-flight load keeps running and completes into the cache
            debug!("unmounting long-lived map; cache entry kept");
            return;
        }

        if let Some(loader) = &loader {
            loader.cancel();
        }
        if registered {
            if let Some(key) = &map_id {
                self.cache.borrow_mut().delete(key);
            }
            self.inner.borrow_mut().registered = false;
        }
        if let Some(handle) = handle {
            // consumers (plugins) may still be finishing their own cleanup,
            // so the map is detached on the next tick, not during unmount
            debug!("deferring map teardown one tick");
            self.host
                .defer(Box::new(move || handle.surface().remove()));
        }
    }
}
