// Copyright @yucwang 2026

use std::fmt;
use std::fs;
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::math::constants::Float;

pub const DEFAULT_DIRECTION_POOL_SIZE: usize = 1600;
pub const MAX_RECURSION_LIMIT: usize = 20;
pub const MAX_NEAREST_COUNT: usize = 20;

/// Settings effective for one bounce depth, derived from the scene settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RadiosityRecursionSettings {
    /// Number of sample rays to shoot per sample.
    pub rays_per_sample: usize,
    /// Number of samples required for re-use.
    pub reuse_count: usize,
    /// Governs spacing of samples in general.
    pub error_bound_factor: Float,
    /// Governs minimum spacing of samples in creases.
    pub min_reuse_factor: Float,
    /// Governs maximum spacing of samples in open areas.
    pub max_reuse_factor: Float,
    /// Balances octree false positives against false negatives.
    pub octree_overfill_factor: Float,
    /// Base trace level for secondary rays.
    pub trace_level: u32,
    /// Base weight for secondary rays.
    pub weight: Float,

    pub max_error_bound: Float,
    /// Effective radius factor for filing samples in the octree.
    pub octree_address_factor: Float,
}

/// Radiosity settings as given by the scene.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneRadiositySettings {
    pub brightness: Float,
    pub count: usize,
    pub direction_pool_size: usize,
    pub error_bound: Float,
    pub gray_threshold: Float,
    pub low_error_factor: Float,
    pub minimum_reuse: Float,
    pub maximum_reuse: Float,
    pub nearest_count: usize,
    /// Target reuse per query for adaptive pretrace; 0 disables it.
    pub nearest_count_apt: usize,
    pub recursion_limit: usize,
    /// Per-ray brightness clamp; non-positive disables it.
    pub max_sample: Float,
    pub adc_bailout: Float,
    /// Use the perturbed normal rather than the raw geometric one.
    pub normal: bool,
    pub pretrace_start: Float,
    pub pretrace_end: Float,
    pub always_sample: bool,
    pub default_importance: Float,
    /// Respect surface brilliance when sampling and reusing.
    pub brilliance: bool,
}

impl Default for SceneRadiositySettings {
    fn default() -> Self {
        Self {
            brightness: 1.0,
            count: 35,
            direction_pool_size: DEFAULT_DIRECTION_POOL_SIZE,
            error_bound: 1.8,
            gray_threshold: 0.0,
            low_error_factor: 0.5,
            minimum_reuse: 0.015,
            maximum_reuse: 0.2,
            nearest_count: 5,
            nearest_count_apt: 0,
            recursion_limit: 2,
            max_sample: -1.0,
            adc_bailout: 0.01,
            normal: false,
            pretrace_start: 0.08,
            pretrace_end: 0.04,
            always_sample: false,
            default_importance: 1.0,
            brilliance: false,
        }
    }
}

impl SceneRadiositySettings {
    /// Clamps values into the ranges the engine supports.
    pub fn validate(&mut self) {
        if self.recursion_limit < 1 || self.recursion_limit > MAX_RECURSION_LIMIT {
            log::warn!("Radiosity recursion_limit {} out of range, clamping to 1..{}.",
                       self.recursion_limit, MAX_RECURSION_LIMIT);
            self.recursion_limit = self.recursion_limit.clamp(1, MAX_RECURSION_LIMIT);
        }
        if self.nearest_count < 1 || self.nearest_count > MAX_NEAREST_COUNT {
            log::warn!("Radiosity nearest_count {} out of range, clamping to 1..{}.",
                       self.nearest_count, MAX_NEAREST_COUNT);
            self.nearest_count = self.nearest_count.clamp(1, MAX_NEAREST_COUNT);
        }
        if self.nearest_count_apt > MAX_NEAREST_COUNT {
            self.nearest_count_apt = MAX_NEAREST_COUNT;
        }
        if self.count < 1 {
            self.count = 1;
        }
        if self.direction_pool_size < 1 {
            self.direction_pool_size = DEFAULT_DIRECTION_POOL_SIZE;
        }
        if self.minimum_reuse > self.maximum_reuse {
            log::warn!("Radiosity minimum_reuse {} exceeds maximum_reuse {}; raising maximum_reuse.",
                       self.minimum_reuse, self.maximum_reuse);
            self.maximum_reuse = self.minimum_reuse;
        }
        if self.pretrace_end > self.pretrace_start {
            self.pretrace_end = self.pretrace_start;
        }
        self.gray_threshold = self.gray_threshold.clamp(0.0, 1.0);
    }

    /// One entry per bounce depth below `recursion_limit`.
    pub fn recursion_settings(&self) -> Vec<RadiosityRecursionSettings> {
        (0..self.recursion_limit).map(|depth| {
            let scale = (2.0 as Float).powi(depth as i32);

            // Halve the ray count per bounce, keeping at least 5 rays.
            let rays_per_sample = ((self.count as Float * (0.5 as Float).powi(depth as i32)) as usize).max(5);

            let reuse_count = match depth {
                0 => self.nearest_count,
                1 => self.nearest_count.min(2),
                _ => 1,
            };

            let octree_overfill_factor = if depth == 0 { 1.0 } else { 8.0 };

            let error_bound_factor = scale;
            let max_error_bound = self.error_bound * error_bound_factor;

            RadiosityRecursionSettings {
                rays_per_sample,
                reuse_count,
                error_bound_factor,
                min_reuse_factor: self.minimum_reuse * scale,
                max_reuse_factor: self.maximum_reuse * scale,
                octree_overfill_factor,
                trace_level: (1.5 * (depth as Float + 1.0)) as u32,
                weight: (0.5 * self.brightness).powi(depth as i32 + 1),
                max_error_bound,
                octree_address_factor: max_error_bound / octree_overfill_factor,
            }
        }).collect()
    }
}

#[derive(Debug)]
pub enum SettingsLoadError {
    Io(std::io::Error),
    Parse(String),
}

impl From<std::io::Error> for SettingsLoadError {
    fn from(err: std::io::Error) -> Self {
        SettingsLoadError::Io(err)
    }
}

impl fmt::Display for SettingsLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsLoadError::Io(e) => write!(f, "cannot read radiosity settings: {}", e),
            SettingsLoadError::Parse(msg) => write!(f, "invalid radiosity settings: {}", msg),
        }
    }
}

impl std::error::Error for SettingsLoadError {}

pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<SceneRadiositySettings, SettingsLoadError> {
    let xml = fs::read_to_string(path.as_ref())?;
    log::info!("Loading radiosity settings from: {}.", path.as_ref().display());
    parse_settings(&xml)
}

/// Reads the attributes of the first `<radiosity>` element; everything else
/// in the document is ignored.
pub fn parse_settings(xml: &str) -> Result<SceneRadiositySettings, SettingsLoadError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();

    let mut settings = SceneRadiositySettings::default();
    let mut found = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                if e.name().as_ref() == b"radiosity" && !found {
                    found = true;
                    for attr in e.attributes().flatten() {
                        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
                        let value = attr.unescape_value()
                            .map_err(|e| SettingsLoadError::Parse(e.to_string()))?
                            .to_string();
                        apply_attribute(&mut settings, &key, &value)?;
                    }
                }
            }
            Err(e) => {
                return Err(SettingsLoadError::Parse(e.to_string()));
            }
            _ => {}
        }

        buf.clear();
    }

    if !found {
        log::warn!("No <radiosity> element found, using default radiosity settings.");
    }

    settings.validate();
    Ok(settings)
}

fn apply_attribute(settings: &mut SceneRadiositySettings, key: &str, value: &str) -> Result<(), SettingsLoadError> {
    match key {
        "brightness" => settings.brightness = parse_float(value)?,
        "count" => settings.count = parse_usize(value)?,
        "direction_pool_size" => settings.direction_pool_size = parse_usize(value)?,
        "error_bound" => settings.error_bound = parse_float(value)?,
        "gray_threshold" => settings.gray_threshold = parse_float(value)?,
        "low_error_factor" => settings.low_error_factor = parse_float(value)?,
        "minimum_reuse" => settings.minimum_reuse = parse_float(value)?,
        "maximum_reuse" => settings.maximum_reuse = parse_float(value)?,
        "nearest_count" => settings.nearest_count = parse_usize(value)?,
        "nearest_count_apt" => settings.nearest_count_apt = parse_usize(value)?,
        "recursion_limit" => settings.recursion_limit = parse_usize(value)?,
        "max_sample" => settings.max_sample = parse_float(value)?,
        "adc_bailout" => settings.adc_bailout = parse_float(value)?,
        "normal" => settings.normal = parse_bool(value)?,
        "pretrace_start" => settings.pretrace_start = parse_float(value)?,
        "pretrace_end" => settings.pretrace_end = parse_float(value)?,
        "always_sample" => settings.always_sample = parse_bool(value)?,
        "default_importance" => settings.default_importance = parse_float(value)?,
        "brilliance" => settings.brilliance = parse_bool(value)?,
        _ => log::warn!("Ignoring unknown radiosity setting '{}'.", key),
    }
    Ok(())
}

fn parse_float(value: &str) -> Result<Float, SettingsLoadError> {
    value.trim().parse::<Float>().map_err(|_| SettingsLoadError::Parse(format!("invalid float: {}", value)))
}

fn parse_usize(value: &str) -> Result<usize, SettingsLoadError> {
    value.trim().parse::<usize>().map_err(|_| SettingsLoadError::Parse(format!("invalid integer: {}", value)))
}

fn parse_bool(value: &str) -> Result<bool, SettingsLoadError> {
    match value.trim() {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        _ => Err(SettingsLoadError::Parse(format!("invalid boolean: {}", value))),
    }
}
