//! Layer binding: styled layers attached to a map by id, with
//! environment-level defaults merged in per layer type.

use crate::config::{merge_options, EnvironmentConfig};
use crate::entity::{EntityBinding, EntityOps};
use crate::surface::{MapHost, MapSurface};
use crate::{MapHandle, MapsError};
use serde_json::{json, Value};

/// Per-mount layer options.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    /// The layer spec object (`id`, `type`, `source`, `layout`, `paint`,
    /// `filter`, `minzoom`, `maxzoom`, ...). Extra keys pass through.
    pub layer: Value,
    /// Insert before this existing layer id; appended when absent.
    pub before: Option<String>,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            layer: Value::Null,
            before: None,
        }
    }
}

pub struct LayerOps;

pub type LayerBinding<H> = EntityBinding<H, LayerOps>;

/// The layer spec with environment defaults for its type folded into
/// `layout` and `paint`, shallow per key, per-mount values winning.
fn merged_layer(env: &EnvironmentConfig, id: &str, config: &LayerConfig) -> Value {
    let layer_type = config
        .layer
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let defaults = env.layer_defaults_for(layer_type);

    let layout = merge_options(
        defaults.map_or(&Value::Null, |d| &d.layout),
        config.layer.get("layout").unwrap_or(&Value::Null),
    );
    let paint = merge_options(
        defaults.map_or(&Value::Null, |d| &d.paint),
        config.layer.get("paint").unwrap_or(&Value::Null),
    );

    // carry every other key (source, filter, zoom range, metadata, ...)
    let mut merged = config.layer.clone();
    merged["id"] = json!(id);
    if !layout.is_null() {
        merged["layout"] = layout;
    }
    if !paint.is_null() {
        merged["paint"] = paint;
    }
    merged
}

impl<H: MapHost> EntityOps<H> for LayerOps {
    const KIND: &'static str = "layer";

    type Options = LayerConfig;

    fn validate(options: &Self::Options) -> Result<(), MapsError> {
        match options.layer.get("id").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => {}
            _ => return Err(MapsError::MissingLayerId),
        }
        match options.layer.get("type").and_then(Value::as_str) {
            Some(t) if !t.is_empty() => Ok(()),
            _ => Err(MapsError::MissingLayerType),
        }
    }

    fn id_from(options: &Self::Options) -> Option<String> {
        options
            .layer
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    fn exists(handle: &MapHandle<H::Surface>, id: &str) -> bool {
        handle.surface().has_layer(id)
    }

    fn add(env: &EnvironmentConfig, handle: &MapHandle<H::Surface>, id: &str, options: &Self::Options) {
        let layer = merged_layer(env, id, options);
        handle.surface().add_layer(&layer, options.before.as_deref());
    }

    fn show(handle: &MapHandle<H::Surface>, id: &str, _options: &Self::Options) {
        handle
            .surface()
            .set_layout_property(id, "visibility", &json!("visible"));
    }

    fn update(env: &EnvironmentConfig, handle: &MapHandle<H::Surface>, id: &str, options: &Self::Options) {
        let layer = merged_layer(env, id, options);
        let surface = handle.surface();

        if let Some(layout) = layer.get("layout").and_then(Value::as_object) {
            for (name, value) in layout {
                surface.set_layout_property(id, name, value);
            }
        }
        if let Some(paint) = layer.get("paint").and_then(Value::as_object) {
            for (name, value) in paint {
                surface.set_paint_property(id, name, value);
            }
        }
        // an absent filter key leaves the current filter alone; an explicit
        // null clears it
        if let Some(filter) = layer.get("filter") {
            surface.set_filter(id, if filter.is_null() { None } else { Some(filter) });
        }
        surface.set_layer_zoom_range(
            id,
            layer.get("minzoom").and_then(Value::as_f64),
            layer.get("maxzoom").and_then(Value::as_f64),
        );
    }

    fn hide(handle: &MapHandle<H::Surface>, id: &str) {
        handle
            .surface()
            .set_layout_property(id, "visibility", &json!("none"));
    }

    fn remove(handle: &MapHandle<H::Surface>, id: &str) {
        handle.surface().remove_layer(id);
    }
}
