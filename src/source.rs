//! Source binding: data sources attached to a map by id.

use crate::config::EnvironmentConfig;
use crate::entity::{EntityBinding, EntityOps};
use crate::surface::{MapHost, MapSurface};
use crate::{MapHandle, MapsError};
use serde_json::{json, Value};

/// Per-mount source options.
#[derive(Clone, Debug)]
pub struct SourceConfig {
    /// The source spec object passed through to the map (`type`, `data`,
    /// `coordinates`, ...). `Value::Null` means detach.
    pub options: Value,
    /// Leave data untouched on remount of a surviving source, so the map
    /// re-renders exactly as it was left.
    pub skip_set_data_on_remount: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            options: Value::Null,
            skip_set_data_on_remount: false,
        }
    }
}

pub struct SourceOps;

pub type SourceBinding<H> = EntityBinding<H, SourceOps>;

impl<H: MapHost> EntityOps<H> for SourceOps {
    const KIND: &'static str = "source";
    // layers driven by their own unmount must detach before the source goes
    const DEFERRED_REMOVAL: bool = true;

    type Options = SourceConfig;

    fn validate(options: &Self::Options) -> Result<(), MapsError> {
        if options.options.is_null() {
            return Ok(());
        }
        match options.options.get("type").and_then(Value::as_str) {
            Some(t) if !t.is_empty() => Ok(()),
            _ => Err(MapsError::MissingSourceType),
        }
    }

    fn is_removal(options: &Self::Options) -> bool {
        options.options.is_null()
    }

    fn exists(handle: &MapHandle<H::Surface>, id: &str) -> bool {
        handle.surface().has_source(id)
    }

    fn add(_env: &EnvironmentConfig, handle: &MapHandle<H::Surface>, id: &str, options: &Self::Options) {
        let mut spec = options.options.clone();
        let is_geojson = spec.get("type").and_then(Value::as_str) == Some("geojson");
        let has_data = spec.get("data").map_or(false, |d| !d.is_null());
        if is_geojson && !has_data {
            // Let the source exist before its data does, so dependent layers
            // can mount immediately; real data arrives as an update.
            spec["data"] = json!({ "type": "FeatureCollection", "features": [] });
        }
        handle.surface().add_source(id, &spec);
    }

    fn show(handle: &MapHandle<H::Surface>, id: &str, options: &Self::Options) {
        if options.skip_set_data_on_remount {
            return;
        }
        // Push data on remount only when the caller actually has some;
        // otherwise the surviving source keeps rendering what it had.
        if let Some(data) = options.options.get("data") {
            if data.get("features").is_some() {
                handle.surface().set_source_data(id, data);
            }
        }
    }

    fn update(_env: &EnvironmentConfig, handle: &MapHandle<H::Surface>, id: &str, options: &Self::Options) {
        if let Some(data) = options.options.get("data").filter(|d| !d.is_null()) {
            handle.surface().set_source_data(id, data);
        } else if let Some(coordinates) = options
            .options
            .get("coordinates")
            .filter(|c| !c.is_null())
        {
            // image and video sources move via coordinates
            handle.surface().set_source_coordinates(id, coordinates);
        }
    }

    fn hide(_handle: &MapHandle<H::Surface>, _id: &str) {
        // sources have no visibility; data stays in place for the next mount
    }

    fn remove(handle: &MapHandle<H::Surface>, id: &str) {
        handle.surface().remove_source(id);
    }
}
