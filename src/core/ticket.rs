// Copyright @yucwang 2026

use crate::math::constants::Float;

/// Mutable per-path state threaded through every recursive trace call.
///
/// The generic tracer does not know about indirect-light bounces; the
/// radiosity code increments `radiosity_recursion_depth` around each sample
/// ray it shoots and overrides the trace level and bailout for the duration
/// of a gather. A negative `radiosity_importance_queried` means the current
/// ray does not ask for the importance of what it hits.
#[derive(Debug, Clone)]
pub struct TraceTicket {
    pub trace_level: u32,
    pub max_allowed_trace_level: u32,
    pub adc_bailout: Float,
    pub radiosity_recursion_depth: usize,
    pub radiosity_quality: Float,
    pub radiosity_importance_queried: Float,
    pub radiosity_importance_found: Float,
    pub alpha_background: bool,
}

impl TraceTicket {
    pub fn new(max_allowed_trace_level: u32, adc_bailout: Float) -> Self {
        Self {
            trace_level: 0,
            max_allowed_trace_level,
            adc_bailout,
            radiosity_recursion_depth: 0,
            radiosity_quality: 1.0,
            radiosity_importance_queried: -1.0,
            radiosity_importance_found: 1.0,
            alpha_background: true,
        }
    }
}

impl Default for TraceTicket {
    fn default() -> Self {
        Self::new(5, 1.0 / 255.0)
    }
}
