use std::fmt;

use serde::{Deserialize, Serialize};
use utilities::interval::translate_interval;

/// Device-native limits of one control axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisRange {
    pub min: f32,
    pub max: f32,
}

impl AxisRange {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Maps a normalized `[0, 1]` value to the native range.
    pub fn to_native(&self, fraction: f32) -> f32 {
        translate_interval(fraction, 0.0, self.min, 1.0, self.max)
    }

    /// Maps a native value back to `[0, 1]`.
    pub fn to_fraction(&self, native: f32) -> f32 {
        translate_interval(native, self.min, 0.0, self.max, 1.0)
    }

    pub fn contains(&self, native: f32) -> bool {
        let (low, high) = if self.min <= self.max {
            (self.min, self.max)
        } else {
            (self.max, self.min)
        };
        (low..=high).contains(&native)
    }

    pub fn clamp(&self, native: f32) -> f32 {
        native.clamp(self.min.min(self.max), self.min.max(self.max))
    }

    pub fn is_degenerate(&self) -> bool {
        (self.max - self.min).abs() <= f32::EPSILON
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisRanges {
    pub pan: AxisRange,
    pub tilt: AxisRange,
    pub zoom: AxisRange,
}

impl Default for AxisRanges {
    fn default() -> Self {
        Self {
            pan: AxisRange::new(-1.0, 1.0),
            tilt: AxisRange::new(-1.0, 1.0),
            zoom: AxisRange::new(0.0, 1.0),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PtzVector {
    pub pan: f32,
    pub tilt: f32,
    pub zoom: f32,
}

impl PtzVector {
    pub const fn new(pan: f32, tilt: f32, zoom: f32) -> Self {
        Self { pan, tilt, zoom }
    }
}

impl fmt::Display for PtzVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pan={:.3} tilt={:.3} zoom={:.3}",
            self.pan, self.tilt, self.zoom
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IrMode {
    On,
    Off,
    Auto,
}

impl fmt::Display for IrMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrMode::On => write!(f, "ON"),
            IrMode::Off => write!(f, "OFF"),
            IrMode::Auto => write!(f, "AUTO"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImagingSettings {
    pub brightness: Option<f32>,
    pub contrast: Option<f32>,
    pub color_saturation: Option<f32>,
    pub sharpness: Option<f32>,
    pub ir_cut_filter: Option<IrMode>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    pub manufacturer: String,
    pub model: String,
    pub firmware_version: String,
    pub serial_number: String,
    pub hardware_id: String,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} (firmware {}, serial {}, hardware {})",
            self.manufacturer,
            self.model,
            self.firmware_version,
            self.serial_number,
            self.hardware_id
        )
    }
}

/// Service endpoints advertised by the device plus its axis limits.
#[derive(Debug, Clone, PartialEq)]
pub struct Capabilities {
    pub media_endpoint: Option<String>,
    pub ptz_endpoint: Option<String>,
    pub imaging_endpoint: Option<String>,
    pub ranges: AxisRanges,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub token: String,
    pub video_source_token: String,
}
