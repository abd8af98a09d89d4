use std::{
    thread,
    time::{Duration, Instant},
};

use tracing::{debug, trace};

use crate::{
    AxisRange, AxisRanges, Capabilities, DeviceClient, DeviceError, DeviceInfo, ImagingSettings,
    IrMode, Profile, PtzVector, Result,
};

/// In-memory camera that answers every request locally.
///
/// Continuous moves are integrated lazily: a normalized speed of 1 crosses half of the axis
/// range per second. Relative steps are fractions of the full axis range and saturate at the
/// limits. Absolute targets outside the advertised range are rejected.
#[derive(Debug)]
pub struct SimulatedCamera {
    name: String,
    ranges: AxisRanges,
    latency: Duration,
    connected: bool,
    position: PtzVector,
    velocity: (f32, f32),
    last_update: Instant,
    imaging: ImagingSettings,
}

impl SimulatedCamera {
    pub fn new(name: impl Into<String>) -> Self {
        let ranges = AxisRanges::default();
        Self {
            name: name.into(),
            position: PtzVector::new(
                ranges.pan.to_native(0.5),
                ranges.tilt.to_native(0.5),
                ranges.zoom.min,
            ),
            ranges,
            latency: Duration::ZERO,
            connected: false,
            velocity: (0.0, 0.0),
            last_update: Instant::now(),
            imaging: ImagingSettings {
                brightness: Some(50.0),
                contrast: Some(50.0),
                color_saturation: Some(50.0),
                sharpness: Some(50.0),
                ir_cut_filter: Some(IrMode::Auto),
            },
        }
    }

    /// Replaces the advertised ranges and recentres pan and tilt.
    pub fn with_ranges(mut self, ranges: AxisRanges) -> Self {
        self.ranges = ranges;
        self.position = PtzVector::new(
            ranges.pan.to_native(0.5),
            ranges.tilt.to_native(0.5),
            ranges.zoom.min,
        );
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn request(&mut self, what: &str) -> Result<()> {
        if !self.connected {
            return Err(DeviceError::NotConnected);
        }
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }
        trace!(camera = %self.name, request = what, "Simulated request");
        Ok(())
    }

    fn integrate(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f32();
        self.last_update = now;

        let (pan_speed, tilt_speed) = self.velocity;
        if pan_speed == 0.0 && tilt_speed == 0.0 {
            return;
        }
        self.position.pan = step(self.ranges.pan, self.position.pan, pan_speed * elapsed * 0.5);
        self.position.tilt = step(
            self.ranges.tilt,
            self.position.tilt,
            tilt_speed * elapsed * 0.5,
        );
    }
}

fn step(range: AxisRange, current: f32, fraction: f32) -> f32 {
    range.clamp(current + fraction * (range.max - range.min))
}

fn check(axis: &'static str, range: AxisRange, value: f32) -> Result<()> {
    if range.contains(value) {
        Ok(())
    } else {
        Err(DeviceError::OutOfRange {
            axis,
            value,
            min: range.min,
            max: range.max,
        })
    }
}

impl DeviceClient for SimulatedCamera {
    fn handshake(&mut self) -> Result<DeviceInfo> {
        self.connected = true;
        self.request("GetDeviceInformation")?;
        debug!(camera = %self.name, "Simulated camera connected");
        Ok(DeviceInfo {
            manufacturer: "Simulated".to_string(),
            model: self.name.clone(),
            firmware_version: env!("CARGO_PKG_VERSION").to_string(),
            serial_number: "SIM-0001".to_string(),
            hardware_id: "sim".to_string(),
        })
    }

    fn get_capabilities(&mut self) -> Result<Capabilities> {
        self.request("GetCapabilities")?;
        Ok(Capabilities {
            media_endpoint: Some("sim://media".to_string()),
            ptz_endpoint: Some("sim://ptz".to_string()),
            imaging_endpoint: Some("sim://imaging".to_string()),
            ranges: self.ranges,
        })
    }

    fn get_profile(&mut self) -> Result<Profile> {
        self.request("GetProfiles")?;
        Ok(Profile {
            token: "profile_1".to_string(),
            video_source_token: "video_source_1".to_string(),
        })
    }

    fn continuous_move(&mut self, pan_speed: f32, tilt_speed: f32) -> Result<()> {
        self.request("ContinuousMove")?;
        self.integrate();
        self.velocity = (pan_speed.clamp(-1.0, 1.0), tilt_speed.clamp(-1.0, 1.0));
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.request("Stop")?;
        self.integrate();
        self.velocity = (0.0, 0.0);
        Ok(())
    }

    fn relative_move(&mut self, pan: f32, tilt: f32, zoom: f32) -> Result<()> {
        self.request("RelativeMove")?;
        self.integrate();
        self.position = PtzVector::new(
            step(self.ranges.pan, self.position.pan, pan),
            step(self.ranges.tilt, self.position.tilt, tilt),
            step(self.ranges.zoom, self.position.zoom, zoom),
        );
        Ok(())
    }

    fn absolute_move(&mut self, pan: f32, tilt: f32, zoom: f32) -> Result<()> {
        self.request("AbsoluteMove")?;
        check("pan", self.ranges.pan, pan)?;
        check("tilt", self.ranges.tilt, tilt)?;
        check("zoom", self.ranges.zoom, zoom)?;
        self.integrate();
        self.velocity = (0.0, 0.0);
        self.position = PtzVector::new(pan, tilt, zoom);
        Ok(())
    }

    fn get_position(&mut self) -> Result<PtzVector> {
        self.request("GetStatus")?;
        self.integrate();
        Ok(self.position)
    }

    fn get_imaging_settings(&mut self) -> Result<ImagingSettings> {
        self.request("GetImagingSettings")?;
        Ok(self.imaging.clone())
    }

    fn set_imaging_settings(&mut self, settings: &ImagingSettings) -> Result<()> {
        self.request("SetImagingSettings")?;
        self.imaging = settings.clone();
        Ok(())
    }

    fn release(&mut self) {
        self.connected = false;
        self.velocity = (0.0, 0.0);
        debug!(camera = %self.name, "Simulated camera released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected() -> SimulatedCamera {
        let mut camera = SimulatedCamera::new("test");
        camera.handshake().unwrap();
        camera
    }

    #[test]
    fn requests_before_handshake_fail() {
        let mut camera = SimulatedCamera::new("test");
        assert!(matches!(camera.stop(), Err(DeviceError::NotConnected)));
    }

    #[test]
    fn relative_zoom_saturates() {
        let mut camera = connected();
        camera.relative_move(0.0, 0.0, 0.25).unwrap();
        assert!((camera.get_position().unwrap().zoom - 0.25).abs() < 1e-6);
        camera.relative_move(0.0, 0.0, 5.0).unwrap();
        assert_eq!(camera.get_position().unwrap().zoom, 1.0);
    }

    #[test]
    fn absolute_move_rejects_out_of_range_target() {
        let mut camera = connected();
        let err = camera.absolute_move(2.0, 0.0, 0.0).unwrap_err();
        assert!(matches!(err, DeviceError::OutOfRange { axis: "pan", .. }));
    }

    #[test]
    fn continuous_move_advances_until_stopped() {
        let mut camera = connected();
        camera.continuous_move(1.0, 0.0).unwrap();
        thread::sleep(Duration::from_millis(50));
        camera.stop().unwrap();
        let stopped = camera.get_position().unwrap();
        assert!(stopped.pan > 0.0);

        thread::sleep(Duration::from_millis(20));
        assert_eq!(camera.get_position().unwrap(), stopped);
    }

    #[test]
    fn release_disconnects() {
        let mut camera = connected();
        camera.release();
        assert!(matches!(
            camera.get_position(),
            Err(DeviceError::NotConnected)
        ));
    }
}
