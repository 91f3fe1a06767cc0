// Copyright @yucwang 2026

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::core::ticket::TraceTicket;
use crate::math::constants::{Float, Vector3f};
use crate::math::ray::Ray3f;
use crate::math::spectrum::RGBSpectrum;

/// Raised when the host asks a render to stop. Unwinds through the tracer and
/// the radiosity recursion as an ordinary `Err`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderAbort;

impl fmt::Display for RenderAbort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "render aborted by user request")
    }
}

impl std::error::Error for RenderAbort {}

/// Polled by the tracer during long recursive traces.
pub trait CooperateFunctor: Sync {
    fn cooperate(&self) -> Result<(), RenderAbort>;
}

pub struct NeverAbort;

impl CooperateFunctor for NeverAbort {
    fn cooperate(&self) -> Result<(), RenderAbort> {
        Ok(())
    }
}

/// Abort switch shared between the render loop and its workers.
#[derive(Default)]
pub struct AbortFlag {
    requested: AtomicBool,
}

impl AbortFlag {
    pub fn new() -> Self {
        Self { requested: AtomicBool::new(false) }
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::Relaxed);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Relaxed)
    }
}

impl CooperateFunctor for AbortFlag {
    fn cooperate(&self) -> Result<(), RenderAbort> {
        if self.is_requested() {
            Err(RenderAbort)
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TraceResult {
    pub colour: RGBSpectrum,
    /// Distance to the first hit, `Float::INFINITY` when nothing was hit.
    pub distance: Float,
}

impl TraceResult {
    pub fn miss(colour: RGBSpectrum) -> Self {
        Self { colour, distance: Float::INFINITY }
    }
}

/// Ambient light lookup used by the tracer at every diffuse hit.
pub trait AmbientProvider {
    fn compute_ambient(&mut self,
                       point: &Vector3f,
                       raw_normal: &Vector3f,
                       layer_normal: &Vector3f,
                       brilliance: Float,
                       weight: Float,
                       ticket: &mut TraceTicket) -> Result<RGBSpectrum, RenderAbort>;

    /// Whether `compute_ambient` may be called for `ticket`. When it may not,
    /// the tracer falls back to the scene's flat ambient light.
    fn check_radiosity_trace_level(&self, ticket: &TraceTicket) -> bool;
}

/// Constant ambient term; used when radiosity is disabled. Never gathers,
/// so the constant is available at every trace level.
pub struct NoRadiosity {
    pub ambient: RGBSpectrum,
}

impl NoRadiosity {
    pub fn new(ambient: RGBSpectrum) -> Self {
        Self { ambient }
    }
}

impl AmbientProvider for NoRadiosity {
    fn compute_ambient(&mut self,
                       _point: &Vector3f,
                       _raw_normal: &Vector3f,
                       _layer_normal: &Vector3f,
                       _brilliance: Float,
                       _weight: Float,
                       _ticket: &mut TraceTicket) -> Result<RGBSpectrum, RenderAbort> {
        Ok(self.ambient)
    }

    fn check_radiosity_trace_level(&self, _ticket: &TraceTicket) -> bool {
        true
    }
}

/// The generic ray tracer as seen by the radiosity code.
pub trait SampleTracer: Sync {
    fn trace_ray(&self,
                 ray: &Ray3f,
                 ticket: &mut TraceTicket,
                 weight: Float,
                 ambient: &mut dyn AmbientProvider) -> Result<TraceResult, RenderAbort>;
}
