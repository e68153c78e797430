use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;

pub mod cache;
pub mod config;
pub mod control;
pub mod entity;
pub mod layer;
pub mod loader;
pub mod map;
#[cfg(target_arch = "wasm32")]
pub mod mapbox;
pub mod source;
pub mod surface;

#[cfg(test)]
pub(crate) mod mock;

pub use cache::{CachedMap, MapCache};
pub use config::{merge_options, EnvironmentConfig, LayerDefaults};
pub use control::{ControlBinding, ControlConfig, ControlOps};
pub use entity::{EntityBinding, EntityConfig, EntityOps};
pub use layer::{LayerBinding, LayerConfig, LayerOps};
pub use loader::MapLoader;
pub use map::{MapConfig, MapController};
pub use source::{SourceBinding, SourceConfig, SourceOps};
pub use surface::{MapHost, MapSurface};

/// Errors raised by the binding controllers.
///
/// Configuration problems are reported synchronously at mount time and fail
/// that mount; they are never retried internally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapsError {
    /// A long-lived map mount did not supply a `map_id`.
    MissingMapId,
    /// The environment config carries no access token.
    MissingAccessToken,
    /// A long-lived source/layer/control binding did not supply an id.
    MissingIdName(&'static str),
    /// Layer options without an `id` string.
    MissingLayerId,
    /// Layer options without a `type` string.
    MissingLayerType,
    /// Source options without a `type` string.
    MissingSourceType,
    /// A cache key was registered while a prior entry was still live.
    DuplicateMap(String),
    /// `mount` called on a controller that is already mounted.
    AlreadyMounted,
    /// `map_id`/`long_lived` changed while the map is mounted.
    MountedIdentityChange,
    /// Asynchronous map construction failed; the mount is terminally failed.
    LoadFailed(String),
}

impl fmt::Display for MapsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapsError::MissingMapId => {
                write!(f, "a long-lived map requires a map_id")
            }
            MapsError::MissingAccessToken => {
                write!(f, "environment config must carry an access token")
            }
            MapsError::MissingIdName(kind) => {
                write!(f, "a long-lived {} requires an id_name", kind)
            }
            MapsError::MissingLayerId => write!(f, "layer options need an id"),
            MapsError::MissingLayerType => write!(f, "layer options need a type"),
            MapsError::MissingSourceType => write!(f, "source options need a type"),
            MapsError::DuplicateMap(key) => {
                write!(f, "map '{}' is already registered in the cache", key)
            }
            MapsError::AlreadyMounted => write!(f, "controller is already mounted"),
            MapsError::MountedIdentityChange => {
                write!(f, "map_id and long_lived cannot change while mounted")
            }
            MapsError::LoadFailed(message) => write!(f, "map load failed: {}", message),
        }
    }
}

impl std::error::Error for MapsError {}

/// One live map instance: the external surface plus the state this crate
/// tracks for it (first-load flag and the control side-table).
///
/// Shared between the cache and whichever controller currently has the map
/// mounted; `Rc<MapHandle<_>>` is the unit of sharing.
pub struct MapHandle<S: MapSurface> {
    surface: S,
    loaded: Cell<bool>,
    controls: RefCell<HashMap<String, S::Control>>,
}

impl<S: MapSurface> MapHandle<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            loaded: Cell::new(false),
            controls: RefCell::new(HashMap::new()),
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Whether the underlying map has fired its first ready event.
    pub fn is_loaded(&self) -> bool {
        self.loaded.get()
    }

    pub(crate) fn mark_loaded(&self) {
        self.loaded.set(true);
    }

    /// Look up a control by binding id in the side-table.
    pub fn control(&self, id: &str) -> Option<S::Control> {
        self.controls.borrow().get(id).cloned()
    }

    pub(crate) fn insert_control(&self, id: &str, control: S::Control) {
        self.controls.borrow_mut().insert(id.to_string(), control);
    }

    pub(crate) fn take_control(&self, id: &str) -> Option<S::Control> {
        self.controls.borrow_mut().remove(id)
    }
}

thread_local! {
    static BINDING_SEQ: Cell<u64> = Cell::new(0);
}

/// Synthesize a per-mount id for bindings that did not supply one.
pub(crate) fn next_binding_id(prefix: &str) -> String {
    BINDING_SEQ.with(|seq| {
        let n = seq.get() + 1;
        seq.set(n);
        format!("{}-{}", prefix, n)
    })
}
