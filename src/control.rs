//! Control binding: caller-supplied control instances, tracked in a
//! side-table on the handle so a surviving control is found by id instead of
//! by scanning the map's internal control list.

use crate::config::EnvironmentConfig;
use crate::entity::{EntityBinding, EntityOps};
use crate::surface::{MapHost, MapSurface};
use crate::MapHandle;

/// Per-mount control options.
#[derive(Clone, Debug)]
pub struct ControlConfig<C> {
    /// The control instance to attach. `None` detaches the current one.
    pub control: Option<C>,
    /// Corner placement ("top-left", ...); the map's default when absent.
    pub position: Option<String>,
}

impl<C> Default for ControlConfig<C> {
    fn default() -> Self {
        Self {
            control: None,
            position: None,
        }
    }
}

pub struct ControlOps;

pub type ControlBinding<H> =
    EntityBinding<H, ControlOps>;

impl<H: MapHost> EntityOps<H> for ControlOps {
    const KIND: &'static str = "control";

    type Options = ControlConfig<<H::Surface as MapSurface>::Control>;

    fn is_removal(options: &Self::Options) -> bool {
        options.control.is_none()
    }

    fn exists(handle: &MapHandle<H::Surface>, id: &str) -> bool {
        handle.control(id).is_some()
    }

    fn add(_env: &EnvironmentConfig, handle: &MapHandle<H::Surface>, id: &str, options: &Self::Options) {
        if let Some(control) = &options.control {
            handle
                .surface()
                .add_control(control, options.position.as_deref());
            handle.insert_control(id, control.clone());
        }
    }

    fn show(handle: &MapHandle<H::Surface>, id: &str, _options: &Self::Options) {
        // unhide the instance that survived, not the one passed in
        if let Some(control) = handle.control(id) {
            handle.surface().set_control_hidden(&control, false);
        }
    }

    fn update(env: &EnvironmentConfig, handle: &MapHandle<H::Surface>, id: &str, options: &Self::Options) {
        // controls have no in-place property API; swap the instance
        if let Some(prev) = handle.take_control(id) {
            handle.surface().remove_control(&prev);
        }
        <Self as EntityOps<H>>::add(env, handle, id, options);
    }

    fn hide(handle: &MapHandle<H::Surface>, id: &str) {
        if let Some(control) = handle.control(id) {
            handle.surface().set_control_hidden(&control, true);
        }
    }

    fn remove(handle: &MapHandle<H::Surface>, id: &str) {
        if let Some(control) = handle.take_control(id) {
            handle.surface().remove_control(&control);
        }
    }
}
