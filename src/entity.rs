//! Shared mount/update/unmount decision core for everything attached to a
//! map by name: sources, layers and controls.
//!
//! One binding drives one named slot in the map's own registry. The kind
//! modules supply the imperative operations; this module owns the decisions:
//! add vs unhide on mount, update vs re-add on attribute change, hide vs
//! remove on unmount.

use crate::config::EnvironmentConfig;
use crate::surface::MapHost;
use crate::{next_binding_id, MapHandle, MapsError};
use log::debug;
use std::cell::Cell;
use std::rc::Rc;

/// Kind-specific operations against the map's internal registry.
///
/// All methods are stateless; per-binding state (id, options, long-lived
/// flag) lives in [`EntityBinding`].
pub trait EntityOps<H: MapHost>: 'static {
    /// Kind label used for synthesized ids and error messages.
    const KIND: &'static str;
    /// Whether removal must wait for the current pass to finish (sources,
    /// which dependent layers may still reference).
    const DEFERRED_REMOVAL: bool = false;

    type Options: Clone;

    fn validate(_options: &Self::Options) -> Result<(), MapsError> {
        Ok(())
    }

    /// An id carried inside the options themselves (layers), if any.
    fn id_from(_options: &Self::Options) -> Option<String> {
        None
    }

    /// Options that mean "nothing to attach" / "detach what is attached".
    fn is_removal(_options: &Self::Options) -> bool {
        false
    }

    fn exists(handle: &MapHandle<H::Surface>, id: &str) -> bool;
    fn add(
        env: &EnvironmentConfig,
        handle: &MapHandle<H::Surface>,
        id: &str,
        options: &Self::Options,
    );
    /// Re-show a slot that survived a previous unmount.
    fn show(handle: &MapHandle<H::Surface>, id: &str, options: &Self::Options);
    fn update(
        env: &EnvironmentConfig,
        handle: &MapHandle<H::Surface>,
        id: &str,
        options: &Self::Options,
    );
    fn hide(handle: &MapHandle<H::Surface>, id: &str);
    fn remove(handle: &MapHandle<H::Surface>, id: &str);
}

/// Per-mount configuration for an attached entity.
#[derive(Clone, Debug)]
pub struct EntityConfig<O> {
    /// Stable identity inside the map's registry. Required when
    /// `long_lived`; synthesized per mount otherwise.
    pub id_name: Option<String>,
    /// Hide instead of remove on unmount, so a later mount with the same
    /// id finds the slot again.
    pub long_lived: bool,
    pub options: O,
}

/// Decision logic binding one named sub-resource to a live map.
pub struct EntityBinding<H: MapHost, K: EntityOps<H>> {
    host: Rc<H>,
    env: Rc<EnvironmentConfig>,
    handle: Rc<MapHandle<H::Surface>>,
    id: String,
    long_lived: bool,
    options: K::Options,
    mounted: bool,
    present: bool,
    /// Bumped on every mount; deferred removals check it so a remount
    /// between unmount and the next tick keeps its freshly added slot.
    epoch: Rc<Cell<u64>>,
}

impl<H: MapHost, K: EntityOps<H>> EntityBinding<H, K> {
    pub fn new(
        host: Rc<H>,
        env: Rc<EnvironmentConfig>,
        handle: Rc<MapHandle<H::Surface>>,
        config: EntityConfig<K::Options>,
    ) -> Result<Self, MapsError> {
        K::validate(&config.options)?;
        if config.long_lived && config.id_name.is_none() && K::id_from(&config.options).is_none() {
            return Err(MapsError::MissingIdName(K::KIND));
        }
        let id = config
            .id_name
            .or_else(|| K::id_from(&config.options))
            .unwrap_or_else(|| next_binding_id(K::KIND));
        Ok(Self {
            host,
            env,
            handle,
            id,
            long_lived: config.long_lived,
            options: config.options,
            mounted: false,
            present: false,
            epoch: Rc::new(Cell::new(0)),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Attach to the map: unhide the existing slot when one survives under
    /// this id, add a fresh one otherwise.
    pub fn mount(&mut self) -> Result<(), MapsError> {
        if self.mounted {
            return Err(MapsError::AlreadyMounted);
        }
        self.epoch.set(self.epoch.get() + 1);
        if K::is_removal(&self.options) {
            // nothing to attach yet; a later update may supply options
            self.mounted = true;
            return Ok(());
        }
        if K::exists(&self.handle, &self.id) {
            debug!("unhiding {} '{}'", K::KIND, self.id);
            K::show(&self.handle, &self.id, &self.options);
        } else {
            debug!("adding {} '{}'", K::KIND, self.id);
            K::add(&self.env, &self.handle, &self.id, &self.options);
        }
        self.mounted = true;
        self.present = true;
        Ok(())
    }

    /// Apply new options in place. The registry slot itself is kept; only a
    /// removal payload detaches it.
    pub fn update(&mut self, options: K::Options) -> Result<(), MapsError> {
        K::validate(&options)?;
        self.options = options;
        if !self.mounted {
            return Ok(());
        }
        if K::is_removal(&self.options) {
            if self.present {
                debug!("removing {} '{}' on empty options", K::KIND, self.id);
                K::remove(&self.handle, &self.id);
                self.present = false;
            }
        } else if self.present {
            K::update(&self.env, &self.handle, &self.id, &self.options);
        } else {
            K::add(&self.env, &self.handle, &self.id, &self.options);
            self.present = true;
        }
        Ok(())
    }

    /// Detach from the map: hide when long-lived, remove otherwise.
    pub fn unmount(&mut self) {
        if !self.mounted {
            return;
        }
        self.mounted = false;
        if !self.present {
            return;
        }
        if self.long_lived {
            debug!("hiding {} '{}'", K::KIND, self.id);
            K::hide(&self.handle, &self.id);
            return;
        }
        self.present = false;
        if K::DEFERRED_REMOVAL {
            // wait out the current pass so dependents detach first
            let epoch = self.epoch.clone();
            let scheduled_at = epoch.get();
            let handle = self.handle.clone();
            let id = self.id.clone();
            self.host.defer(Box::new(move || {
                if epoch.get() == scheduled_at {
                    K::remove(&handle, &id);
                } else {
                    debug!("skipping stale removal of {} '{}'", K::KIND, id);
                }
            }));
        } else {
            debug!("removing {} '{}'", K::KIND, self.id);
            K::remove(&self.handle, &self.id);
        }
    }
}
