//! In-process surface that renders nothing and records every call.
//!
//! The factory and every surface it creates share one [`HeadlessProbe`], so a
//! host (or a test) can flip readiness, inject failures and inspect the call
//! log even after the controller has taken ownership of the surface.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use formats::FeatureCollection;
use layers::{Expression, FogSpec, LayerSpec};
use serde::Serialize;

use crate::surface::{
    FlyToOptions, RotateOptions, Surface, SurfaceError, SurfaceFactory, Viewport,
};

/// One successful call against the surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum SurfaceCall {
    Create {
        container: String,
        style: String,
        viewport: Viewport,
    },
    AddSource {
        id: String,
        data: FeatureCollection,
    },
    SetSource {
        id: String,
        data: FeatureCollection,
    },
    AddLayer {
        id: String,
    },
    SetPaint {
        layer_id: String,
        property: String,
        value: Expression,
    },
    SetFog,
    FlyTo(FlyToOptions),
    RotateTo {
        bearing: f64,
        options: RotateOptions,
    },
    Destroy,
}

impl SurfaceCall {
    pub fn name(&self) -> &'static str {
        match self {
            SurfaceCall::Create { .. } => "create",
            SurfaceCall::AddSource { .. } => "add_source",
            SurfaceCall::SetSource { .. } => "set_source",
            SurfaceCall::AddLayer { .. } => "add_layer",
            SurfaceCall::SetPaint { .. } => "set_paint",
            SurfaceCall::SetFog => "set_fog",
            SurfaceCall::FlyTo(_) => "fly_to",
            SurfaceCall::RotateTo { .. } => "rotate_to",
            SurfaceCall::Destroy => "destroy",
        }
    }
}

#[derive(Debug, Default)]
struct ProbeState {
    calls: Vec<SurfaceCall>,
    ready: bool,
    fail_mutations: u32,
    fail_create: bool,
    destroyed: bool,
    zoom: f64,
    bearing: f64,
    sources: BTreeSet<String>,
    layers: BTreeSet<String>,
}

#[derive(Debug, Clone, Default)]
pub struct HeadlessProbe {
    state: Rc<RefCell<ProbeState>>,
}

impl HeadlessProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_ready(&self, ready: bool) {
        self.state.borrow_mut().ready = ready;
    }

    /// The next `n` mutation calls fail with an engine error.
    pub fn fail_next_mutations(&self, n: u32) {
        self.state.borrow_mut().fail_mutations = n;
    }

    pub fn fail_next_create(&self) {
        self.state.borrow_mut().fail_create = true;
    }

    /// Simulates the user zooming with the mouse wheel.
    pub fn set_zoom(&self, zoom: f64) {
        self.state.borrow_mut().zoom = zoom;
    }

    pub fn zoom(&self) -> f64 {
        self.state.borrow().zoom
    }

    pub fn bearing(&self) -> f64 {
        self.state.borrow().bearing
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.borrow().destroyed
    }

    pub fn has_layer(&self, id: &str) -> bool {
        self.state.borrow().layers.contains(id)
    }

    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.state.borrow().calls.clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|c| c.name() == name)
            .count()
    }

    pub fn calls_named(&self, name: &str) -> Vec<SurfaceCall> {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|c| c.name() == name)
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    /// Records `call` if the surface accepts mutations right now.
    fn mutate(
        &self,
        call: SurfaceCall,
        apply: impl FnOnce(&mut ProbeState) -> Result<(), SurfaceError>,
    ) -> Result<(), SurfaceError> {
        let mut st = self.state.borrow_mut();
        if st.destroyed {
            return Err(SurfaceError::Gone);
        }
        if st.fail_mutations > 0 {
            st.fail_mutations -= 1;
            return Err(SurfaceError::Engine(format!("injected {} failure", call.name())));
        }
        apply(&mut *st)?;
        st.calls.push(call);
        Ok(())
    }
}

#[derive(Debug)]
pub struct HeadlessSurface {
    probe: HeadlessProbe,
}

impl Surface for HeadlessSurface {
    fn add_source(&mut self, id: &str, data: &FeatureCollection) -> Result<(), SurfaceError> {
        let call = SurfaceCall::AddSource {
            id: id.to_string(),
            data: data.clone(),
        };
        self.probe.mutate(call, |st| {
            st.sources.insert(id.to_string());
            Ok(())
        })
    }

    fn set_source(&mut self, id: &str, data: &FeatureCollection) -> Result<(), SurfaceError> {
        let call = SurfaceCall::SetSource {
            id: id.to_string(),
            data: data.clone(),
        };
        self.probe.mutate(call, |st| {
            if st.sources.contains(id) {
                Ok(())
            } else {
                Err(SurfaceError::MissingSource(id.to_string()))
            }
        })
    }

    fn add_layer(&mut self, spec: &LayerSpec) -> Result<(), SurfaceError> {
        let call = SurfaceCall::AddLayer {
            id: spec.id.to_string(),
        };
        self.probe.mutate(call, |st| {
            if !st.sources.contains(spec.source) {
                return Err(SurfaceError::MissingSource(spec.source.to_string()));
            }
            st.layers.insert(spec.id.to_string());
            Ok(())
        })
    }

    fn has_layer(&self, id: &str) -> bool {
        self.probe.has_layer(id)
    }

    fn set_paint(
        &mut self,
        layer_id: &str,
        property: &str,
        value: &Expression,
    ) -> Result<(), SurfaceError> {
        let call = SurfaceCall::SetPaint {
            layer_id: layer_id.to_string(),
            property: property.to_string(),
            value: value.clone(),
        };
        self.probe.mutate(call, |st| {
            if st.layers.contains(layer_id) {
                Ok(())
            } else {
                Err(SurfaceError::MissingLayer(layer_id.to_string()))
            }
        })
    }

    fn set_fog(&mut self, _fog: &FogSpec) -> Result<(), SurfaceError> {
        self.probe.mutate(SurfaceCall::SetFog, |_| Ok(()))
    }

    fn fly_to(&mut self, options: &FlyToOptions) -> Result<(), SurfaceError> {
        let zoom = options.zoom;
        self.probe
            .mutate(SurfaceCall::FlyTo(options.clone()), |st| {
                // Headless flights land instantly.
                st.zoom = zoom;
                Ok(())
            })
    }

    fn rotate_to(&mut self, bearing_deg: f64, options: &RotateOptions) -> Result<(), SurfaceError> {
        let call = SurfaceCall::RotateTo {
            bearing: bearing_deg,
            options: options.clone(),
        };
        self.probe.mutate(call, |st| {
            st.bearing = bearing_deg;
            Ok(())
        })
    }

    fn bearing(&self) -> f64 {
        self.probe.bearing()
    }

    fn zoom(&self) -> f64 {
        self.probe.zoom()
    }

    fn is_ready(&self) -> bool {
        let st = self.probe.state.borrow();
        st.ready && !st.destroyed
    }

    fn destroy(&mut self) {
        let mut st = self.probe.state.borrow_mut();
        if st.destroyed {
            return;
        }
        st.destroyed = true;
        st.ready = false;
        st.calls.push(SurfaceCall::Destroy);
    }
}

#[derive(Debug, Clone, Default)]
pub struct HeadlessFactory {
    probe: HeadlessProbe,
}

impl HeadlessFactory {
    pub fn new(probe: HeadlessProbe) -> Self {
        Self { probe }
    }
}

impl SurfaceFactory for HeadlessFactory {
    type Surface = HeadlessSurface;

    fn create_surface(
        &mut self,
        container: &str,
        style: &str,
        viewport: &Viewport,
    ) -> Result<HeadlessSurface, SurfaceError> {
        let mut st = self.probe.state.borrow_mut();
        if std::mem::take(&mut st.fail_create) {
            return Err(SurfaceError::Engine(format!(
                "container {container:?} not found"
            )));
        }
        st.destroyed = false;
        st.zoom = viewport.zoom;
        st.bearing = viewport.bearing;
        st.sources.clear();
        st.layers.clear();
        st.calls.push(SurfaceCall::Create {
            container: container.to_string(),
            style: style.to_string(),
            viewport: viewport.clone(),
        });
        drop(st);

        Ok(HeadlessSurface {
            probe: self.probe.clone(),
        })
    }
}
