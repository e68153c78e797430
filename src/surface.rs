//! Collaborator seams towards the mapping library and the host page.
//!
//! The crate never talks to Mapbox GL or the DOM directly; everything goes
//! through these two traits so the lifecycle logic stays testable off-browser.
//! `mapbox.rs` provides the wasm implementations.

use serde_json::Value;

/// The imperative surface of one live map instance.
///
/// Mirrors the subset of the Mapbox GL `Map` API the bindings consume:
/// source/layer/control registries, property setters, `resize` and `remove`.
/// Style, source and layer payloads are opaque JSON passed through unchanged.
pub trait MapSurface: 'static {
    /// Opaque control instance supplied by the caller (a JS object in the
    /// browser implementation).
    type Control: Clone + 'static;

    fn add_source(&self, id: &str, options: &Value);
    fn has_source(&self, id: &str) -> bool;
    fn set_source_data(&self, id: &str, data: &Value);
    /// Used by image and video sources instead of `set_source_data`.
    fn set_source_coordinates(&self, id: &str, coordinates: &Value);
    fn remove_source(&self, id: &str);

    fn add_layer(&self, layer: &Value, before: Option<&str>);
    fn has_layer(&self, id: &str) -> bool;
    fn remove_layer(&self, id: &str);
    fn set_layout_property(&self, layer_id: &str, name: &str, value: &Value);
    fn set_paint_property(&self, layer_id: &str, name: &str, value: &Value);
    /// `None` clears the current filter. Callers that want the filter left
    /// untouched simply do not call this.
    fn set_filter(&self, layer_id: &str, filter: Option<&Value>);
    fn set_layer_zoom_range(&self, layer_id: &str, minzoom: Option<f64>, maxzoom: Option<f64>);

    fn add_control(&self, control: &Self::Control, position: Option<&str>);
    fn remove_control(&self, control: &Self::Control);
    fn set_control_hidden(&self, control: &Self::Control, hidden: bool);

    fn resize(&self);
    /// Detach the map instance from its element and release its resources.
    fn remove(&self);
}

/// Host environment: element creation, re-parenting, asynchronous map
/// construction and the deferred-tick queue.
///
/// All operations run on one logical thread; `defer` schedules onto the
/// host run loop and must preserve FIFO order between same-tick tasks.
pub trait MapHost: 'static {
    /// Detachable container node a map renders into (a `div` in the browser).
    type Element: Clone + 'static;
    type Surface: MapSurface;

    fn create_element(&self) -> Self::Element;
    /// Re-parent `element` as the first child of `container`.
    fn attach(&self, container: &Self::Element, element: &Self::Element);
    /// Begin asynchronous construction of a map inside `element`.
    ///
    /// `done` fires exactly once, on the host run loop, with the ready
    /// surface or a failure message. Cancellation is layered on top by
    /// [`MapLoader`](crate::loader::MapLoader); implementations just report.
    fn begin_load(
        &self,
        access_token: &str,
        options: &Value,
        element: &Self::Element,
        done: Box<dyn FnOnce(Result<Self::Surface, String>)>,
    );
    /// Queue `task` to run after the current pass.
    fn defer(&self, task: Box<dyn FnOnce()>);
}
