//! Test doubles for the host and surface seams.
//!
//! The surface records every imperative call into one shared, ordered log so
//! tests can assert not just what happened but in which order. Loads and
//! deferred tasks are queued and driven explicitly (`complete_load`,
//! `fail_load`, `run_deferred`) to model the cooperative run loop.

use crate::config::EnvironmentConfig;
use crate::surface::{MapHost, MapSurface};
use crate::MapHandle;
use serde_json::{json, Value};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

type LoadCallback = Box<dyn FnOnce(Result<MockSurface, String>)>;

pub(crate) struct PendingLoad {
    token: String,
    options: Value,
    done: Option<LoadCallback>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct MockElement(pub u32);

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct MockControl(pub String);

impl MockControl {
    pub fn new(name: &str) -> Self {
        Self(name.to_string())
    }
}

pub(crate) struct MockHost {
    pub ops: Rc<RefCell<Vec<String>>>,
    deferred: RefCell<VecDeque<Box<dyn FnOnce()>>>,
    loads: RefCell<Vec<PendingLoad>>,
    element_seq: Cell<u32>,
}

impl MockHost {
    pub fn new() -> Self {
        Self {
            ops: Rc::new(RefCell::new(Vec::new())),
            deferred: RefCell::new(VecDeque::new()),
            loads: RefCell::new(Vec::new()),
            element_seq: Cell::new(0),
        }
    }

    pub fn create_mock_element(&self) -> MockElement {
        let n = self.element_seq.get() + 1;
        self.element_seq.set(n);
        MockElement(n)
    }

    pub fn elements_created(&self) -> u32 {
        self.element_seq.get()
    }

    pub fn ops_log(&self) -> Vec<String> {
        self.ops.borrow().clone()
    }

    pub fn load_count(&self) -> usize {
        self.loads.borrow().len()
    }

    pub fn load_options(&self, index: usize) -> Value {
        self.loads.borrow()[index].options.clone()
    }

    pub fn load_token(&self, index: usize) -> String {
        self.loads.borrow()[index].token.clone()
    }

    /// Drive load `index` to success, handing the mount a fresh surface.
    pub fn complete_load(&self, index: usize) {
        let done = self.loads.borrow_mut()[index].done.take();
        if let Some(done) = done {
            done(Ok(MockSurface::detached(self)));
        }
    }

    /// Drive load `index` to failure.
    pub fn fail_load(&self, index: usize, message: &str) {
        let done = self.loads.borrow_mut()[index].done.take();
        if let Some(done) = done {
            done(Err(message.to_string()));
        }
    }

    /// Run one tick: everything deferred so far, in order. Tasks deferred
    /// while running land in the next tick.
    pub fn run_deferred(&self) {
        let batch: Vec<_> = self.deferred.borrow_mut().drain(..).collect();
        for task in batch {
            task();
        }
    }
}

impl MapHost for MockHost {
    type Element = MockElement;
    type Surface = MockSurface;

    fn create_element(&self) -> MockElement {
        self.create_mock_element()
    }

    fn attach(&self, container: &MockElement, element: &MockElement) {
        self.ops
            .borrow_mut()
            .push(format!("attach element#{} into #{}", element.0, container.0));
    }

    fn begin_load(
        &self,
        access_token: &str,
        options: &Value,
        _element: &MockElement,
        done: Box<dyn FnOnce(Result<MockSurface, String>)>,
    ) {
        self.loads.borrow_mut().push(PendingLoad {
            token: access_token.to_string(),
            options: options.clone(),
            done: Some(done),
        });
    }

    fn defer(&self, task: Box<dyn FnOnce()>) {
        self.deferred.borrow_mut().push_back(task);
    }
}

/// Fake map surface sharing the host's op log.
pub(crate) struct MockSurface {
    ops: Rc<RefCell<Vec<String>>>,
    sources: RefCell<HashMap<String, Value>>,
    layers: RefCell<HashMap<String, Value>>,
}

impl MockSurface {
    /// A surface not driven through `begin_load`; for cache/entity tests.
    pub fn detached(host: &MockHost) -> Self {
        Self {
            ops: host.ops.clone(),
            sources: RefCell::new(HashMap::new()),
            layers: RefCell::new(HashMap::new()),
        }
    }

    fn log(&self, entry: String) {
        self.ops.borrow_mut().push(entry);
    }

    pub fn source_options(&self, id: &str) -> Option<Value> {
        self.sources.borrow().get(id).cloned()
    }

    pub fn layer_options(&self, id: &str) -> Option<Value> {
        self.layers.borrow().get(id).cloned()
    }
}

impl MapSurface for MockSurface {
    type Control = MockControl;

    fn add_source(&self, id: &str, options: &Value) {
        self.log(format!("add_source {}", id));
        self.sources.borrow_mut().insert(id.to_string(), options.clone());
    }

    fn has_source(&self, id: &str) -> bool {
        self.sources.borrow().contains_key(id)
    }

    fn set_source_data(&self, id: &str, data: &Value) {
        self.log(format!("set_source_data {}", id));
        if let Some(source) = self.sources.borrow_mut().get_mut(id) {
            source["data"] = data.clone();
        }
    }

    fn set_source_coordinates(&self, id: &str, coordinates: &Value) {
        self.log(format!("set_source_coordinates {}", id));
        if let Some(source) = self.sources.borrow_mut().get_mut(id) {
            source["coordinates"] = coordinates.clone();
        }
    }

    fn remove_source(&self, id: &str) {
        self.log(format!("remove_source {}", id));
        self.sources.borrow_mut().remove(id);
    }

    fn add_layer(&self, layer: &Value, before: Option<&str>) {
        let id = layer
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or("?")
            .to_string();
        match before {
            Some(before) => self.log(format!("add_layer {} before {}", id, before)),
            None => self.log(format!("add_layer {}", id)),
        }
        self.layers.borrow_mut().insert(id, layer.clone());
    }

    fn has_layer(&self, id: &str) -> bool {
        self.layers.borrow().contains_key(id)
    }

    fn remove_layer(&self, id: &str) {
        self.log(format!("remove_layer {}", id));
        self.layers.borrow_mut().remove(id);
    }

    fn set_layout_property(&self, layer_id: &str, name: &str, value: &Value) {
        self.log(format!("set_layout_property {} {}", layer_id, name));
        if let Some(layer) = self.layers.borrow_mut().get_mut(layer_id) {
            layer["layout"][name] = value.clone();
        }
    }

    fn set_paint_property(&self, layer_id: &str, name: &str, value: &Value) {
        self.log(format!("set_paint_property {} {}", layer_id, name));
        if let Some(layer) = self.layers.borrow_mut().get_mut(layer_id) {
            layer["paint"][name] = value.clone();
        }
    }

    fn set_filter(&self, layer_id: &str, filter: Option<&Value>) {
        match filter {
            Some(_) => self.log(format!("set_filter {} set", layer_id)),
            None => self.log(format!("set_filter {} clear", layer_id)),
        }
    }

    fn set_layer_zoom_range(&self, layer_id: &str, minzoom: Option<f64>, maxzoom: Option<f64>) {
        self.log(format!(
            "set_layer_zoom_range {} {:?} {:?}",
            layer_id, minzoom, maxzoom
        ));
    }

    fn add_control(&self, control: &MockControl, position: Option<&str>) {
        match position {
            Some(position) => self.log(format!("add_control {} at {}", control.0, position)),
            None => self.log(format!("add_control {}", control.0)),
        }
    }

    fn remove_control(&self, control: &MockControl) {
        self.log(format!("remove_control {}", control.0));
    }

    fn set_control_hidden(&self, control: &MockControl, hidden: bool) {
        self.log(format!("set_control_hidden {} {}", control.0, hidden));
    }

    fn resize(&self) {
        self.log("resize".to_string());
    }

    fn remove(&self) {
        self.log("remove_map".to_string());
    }
}

/// Environment config most tests share.
pub(crate) fn test_env() -> EnvironmentConfig {
    EnvironmentConfig {
        access_token: "pk.test".to_string(),
        map: json!({ "style": "mapbox://styles/test" }),
        ..EnvironmentConfig::default()
    }
}

/// Host + env + a handle around a detached surface, for entity tests that
/// do not need the full map lifecycle.
pub(crate) fn mounted_map() -> (
    Rc<MockHost>,
    Rc<EnvironmentConfig>,
    Rc<MapHandle<MockSurface>>,
) {
    mounted_map_with_env(test_env())
}

pub(crate) fn mounted_map_with_env(
    env: EnvironmentConfig,
) -> (
    Rc<MockHost>,
    Rc<EnvironmentConfig>,
    Rc<MapHandle<MockSurface>>,
) {
    let host = Rc::new(MockHost::new());
    let handle = Rc::new(MapHandle::new(MockSurface::detached(&host)));
    handle.mark_loaded();
    (host, Rc::new(env), handle)
}
