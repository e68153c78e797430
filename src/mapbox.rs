//! JavaScript interop for Mapbox GL JS.
//! Provides the browser implementations of the `MapSurface`/`MapHost` seams
//! plus the process-wide map cache.

use crate::cache::MapCache;
use crate::surface::{MapHost, MapSurface};
use gloo_timers::callback::Timeout;
use gloo_utils::document;
use js_sys::Reflect;
use log::debug;
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::Element;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = mapboxgl, js_name = Map)]
    type MapboxGlMap;

    #[wasm_bindgen(constructor, js_namespace = mapboxgl, js_class = "Map")]
    fn new(options: &JsValue) -> MapboxGlMap;

    #[wasm_bindgen(method)]
    fn once(this: &MapboxGlMap, event: &str, listener: &js_sys::Function);

    #[wasm_bindgen(method, js_name = addSource)]
    fn add_source(this: &MapboxGlMap, id: &str, options: &JsValue);

    #[wasm_bindgen(method, js_name = getSource)]
    fn get_source(this: &MapboxGlMap, id: &str) -> JsValue;

    #[wasm_bindgen(method, js_name = removeSource)]
    fn remove_source(this: &MapboxGlMap, id: &str);

    #[wasm_bindgen(method, js_name = addLayer)]
    fn add_layer(this: &MapboxGlMap, layer: &JsValue, before: Option<&str>);

    #[wasm_bindgen(method, js_name = getLayer)]
    fn get_layer(this: &MapboxGlMap, id: &str) -> JsValue;

    #[wasm_bindgen(method, js_name = removeLayer)]
    fn remove_layer(this: &MapboxGlMap, id: &str);

    #[wasm_bindgen(method, js_name = setLayoutProperty)]
    fn set_layout_property(this: &MapboxGlMap, layer_id: &str, name: &str, value: &JsValue);

    #[wasm_bindgen(method, js_name = setPaintProperty)]
    fn set_paint_property(this: &MapboxGlMap, layer_id: &str, name: &str, value: &JsValue);

    #[wasm_bindgen(method, js_name = setFilter)]
    fn set_filter(this: &MapboxGlMap, layer_id: &str, filter: &JsValue);

    #[wasm_bindgen(method, js_name = setLayerZoomRange)]
    fn set_layer_zoom_range(
        this: &MapboxGlMap,
        layer_id: &str,
        minzoom: Option<f64>,
        maxzoom: Option<f64>,
    );

    #[wasm_bindgen(method, js_name = addControl)]
    fn add_control(this: &MapboxGlMap, control: &JsValue, position: Option<&str>);

    #[wasm_bindgen(method, js_name = removeControl)]
    fn remove_control(this: &MapboxGlMap, control: &JsValue);

    #[wasm_bindgen(method)]
    fn resize(this: &MapboxGlMap);

    #[wasm_bindgen(method)]
    fn remove(this: &MapboxGlMap);

    #[wasm_bindgen(js_namespace = mapboxgl)]
    fn supported() -> bool;

    /// A source instance returned by `getSource`.
    type MapboxGlSource;

    #[wasm_bindgen(method, js_name = setData)]
    fn set_data(this: &MapboxGlSource, data: &JsValue);

    #[wasm_bindgen(method, js_name = setCoordinates)]
    fn set_coordinates(this: &MapboxGlSource, coordinates: &JsValue);
}

/// `mapboxgl.accessToken = token`, which the library reads at construction.
fn apply_access_token(token: &str) {
    let namespace = Reflect::get(&js_sys::global(), &JsValue::from_str("mapboxgl"))
        .unwrap_or(JsValue::UNDEFINED);
    let _ = Reflect::set(
        &namespace,
        &JsValue::from_str("accessToken"),
        &JsValue::from_str(token),
    );
}

fn to_js(value: &Value) -> JsValue {
    serde_wasm_bindgen::to_value(value).unwrap_or(JsValue::NULL)
}

/// The DOM container a control renders into, when the control exposes one.
fn control_container(control: &JsValue) -> Option<Element> {
    Reflect::get(control, &JsValue::from_str("_container"))
        .ok()?
        .dyn_into::<Element>()
        .ok()
}

/// One live Mapbox GL map.
pub struct MapboxSurface {
    map: MapboxGlMap,
}

impl MapSurface for MapboxSurface {
    type Control = JsValue;

    fn add_source(&self, id: &str, options: &Value) {
        self.map.add_source(id, &to_js(options));
    }

    fn has_source(&self, id: &str) -> bool {
        !self.map.get_source(id).is_undefined()
    }

    fn set_source_data(&self, id: &str, data: &Value) {
        let source = self.map.get_source(id);
        if source.is_undefined() {
            debug!("set_source_data on unknown source '{}'", id);
            return;
        }
        source.unchecked_into::<MapboxGlSource>().set_data(&to_js(data));
    }

    fn set_source_coordinates(&self, id: &str, coordinates: &Value) {
        let source = self.map.get_source(id);
        if source.is_undefined() {
            debug!("set_source_coordinates on unknown source '{}'", id);
            return;
        }
        source
            .unchecked_into::<MapboxGlSource>()
            .set_coordinates(&to_js(coordinates));
    }

    fn remove_source(&self, id: &str) {
        self.map.remove_source(id);
    }

    fn add_layer(&self, layer: &Value, before: Option<&str>) {
        self.map.add_layer(&to_js(layer), before);
    }

    fn has_layer(&self, id: &str) -> bool {
        !self.map.get_layer(id).is_undefined()
    }

    fn remove_layer(&self, id: &str) {
        self.map.remove_layer(id);
    }

    fn set_layout_property(&self, layer_id: &str, name: &str, value: &Value) {
        self.map.set_layout_property(layer_id, name, &to_js(value));
    }

    fn set_paint_property(&self, layer_id: &str, name: &str, value: &Value) {
        self.map.set_paint_property(layer_id, name, &to_js(value));
    }

    fn set_filter(&self, layer_id: &str, filter: Option<&Value>) {
        let filter = filter.map(to_js).unwrap_or(JsValue::NULL);
        self.map.set_filter(layer_id, &filter);
    }

    fn set_layer_zoom_range(&self, layer_id: &str, minzoom: Option<f64>, maxzoom: Option<f64>) {
        self.map.set_layer_zoom_range(layer_id, minzoom, maxzoom);
    }

    fn add_control(&self, control: &JsValue, position: Option<&str>) {
        self.map.add_control(control, position);
    }

    fn remove_control(&self, control: &JsValue) {
        self.map.remove_control(control);
    }

    fn set_control_hidden(&self, control: &JsValue, hidden: bool) {
        if let Some(container) = control_container(control) {
            let class_list = container.class_list();
            let _ = if hidden {
                class_list.add_1("hide")
            } else {
                class_list.remove_1("hide")
            };
        }
    }

    fn resize(&self) {
        self.map.resize();
    }

    fn remove(&self) {
        self.map.remove();
    }
}

/// Browser host: real DOM elements, Mapbox GL construction and a zero-delay
/// timeout as the deferred tick.
pub struct BrowserHost;

impl MapHost for BrowserHost {
    type Element = Element;
    type Surface = MapboxSurface;

    fn create_element(&self) -> Element {
        document().create_element("div").unwrap_throw()
    }

    fn attach(&self, container: &Element, element: &Element) {
        container.prepend_with_node_1(element).unwrap_throw();
    }

    fn begin_load(
        &self,
        access_token: &str,
        options: &Value,
        element: &Element,
        done: Box<dyn FnOnce(Result<MapboxSurface, String>)>,
    ) {
        if !supported() {
            done(Err("mapbox-gl is not supported in this browser".to_string()));
            return;
        }
        apply_access_token(access_token);

        let options = to_js(options);
        let _ = Reflect::set(
            &options,
            &JsValue::from_str("container"),
            &JsValue::from(element.clone()),
        );
        let map = MapboxGlMap::new(&options);

        // whichever of load/error fires first consumes the callback
        let done = Rc::new(RefCell::new(Some(done)));

        let on_load = {
            let done = done.clone();
            let map = map.clone();
            Closure::once(move || {
                if let Some(done) = done.borrow_mut().take() {
                    done(Ok(MapboxSurface { map }));
                }
            })
        };
        map.once("load", on_load.as_ref().unchecked_ref());
        on_load.forget();

        let on_error = Closure::once(move |event: JsValue| {
            if let Some(done) = done.borrow_mut().take() {
                let message = Reflect::get(&event, &JsValue::from_str("error"))
                    .ok()
                    .and_then(|error| Reflect::get(&error, &JsValue::from_str("message")).ok())
                    .and_then(|message| message.as_string())
                    .unwrap_or_else(|| "map failed to load".to_string());
                done(Err(message));
            }
        });
        map.once("error", on_error.as_ref().unchecked_ref());
        on_error.forget();
    }

    fn defer(&self, task: Box<dyn FnOnce()>) {
        Timeout::new(0, move || task()).forget();
    }
}

thread_local! {
    /// Cache surviving component lifetimes, shared by every controller on
    /// this thread.
    static SHARED_CACHE: Rc<RefCell<MapCache<BrowserHost>>> =
        Rc::new(RefCell::new(MapCache::new()));
}

/// The thread's shared map cache.
pub fn shared_cache() -> Rc<RefCell<MapCache<BrowserHost>>> {
    SHARED_CACHE.with(Rc::clone)
}
