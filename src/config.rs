//! Environment-level configuration and the shallow option merge used
//! throughout the bindings.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Baseline `layout`/`paint` values applied to every layer of one type.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LayerDefaults {
    #[serde(default)]
    pub layout: Value,
    #[serde(default)]
    pub paint: Value,
}

/// Configuration the host passes into the controllers once, replacing the
/// per-framework environment lookup of typical map component stacks.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Access credential applied before any map construction. Required.
    pub access_token: String,
    /// Baseline map construction options, overridden per mount.
    pub map: Value,
    /// Per-layer-type defaults, keyed by the Mapbox layer `type` string
    /// ("circle", "fill", ...).
    pub layer_defaults: HashMap<String, LayerDefaults>,
    /// Defaults for popup wrappers the host may build on top of these
    /// bindings. Carried here so hosts share one config object.
    pub popup: Value,
}

impl EnvironmentConfig {
    pub fn layer_defaults_for(&self, layer_type: &str) -> Option<&LayerDefaults> {
        self.layer_defaults.get(layer_type)
    }
}

/// Shallow per-key merge of two JSON option objects; `overrides` wins.
///
/// Non-object inputs follow assignment semantics: a null override keeps the
/// base, anything else replaces it wholesale.
pub fn merge_options(base: &Value, overrides: &Value) -> Value {
    match (base, overrides) {
        (Value::Object(b), Value::Object(o)) => {
            let mut out = b.clone();
            for (key, value) in o {
                out.insert(key.clone(), value.clone());
            }
            Value::Object(out)
        }
        (_, Value::Null) => base.clone(),
        _ => overrides.clone(),
    }
}
