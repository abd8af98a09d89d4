pub mod error;
pub mod models;
pub mod simulator;

pub use error::{DeviceError, Result};
pub use models::{
    AxisRange, AxisRanges, Capabilities, DeviceInfo, ImagingSettings, IrMode, Profile, PtzVector,
};
pub use simulator::SimulatedCamera;

/// Blocking control surface of a PTZ camera.
///
/// Implementations are driven from a single worker thread, one request at a time. Speeds and
/// relative steps are normalized values in `[-1, 1]`; absolute targets and positions are in
/// the device-native ranges reported by [`DeviceClient::get_capabilities`].
pub trait DeviceClient: Send {
    fn handshake(&mut self) -> Result<DeviceInfo>;

    fn get_capabilities(&mut self) -> Result<Capabilities>;

    fn get_profile(&mut self) -> Result<Profile>;

    fn continuous_move(&mut self, pan_speed: f32, tilt_speed: f32) -> Result<()>;

    /// Halts any pan, tilt or zoom motion.
    fn stop(&mut self) -> Result<()>;

    fn relative_move(&mut self, pan: f32, tilt: f32, zoom: f32) -> Result<()>;

    fn absolute_move(&mut self, pan: f32, tilt: f32, zoom: f32) -> Result<()>;

    fn get_position(&mut self) -> Result<PtzVector>;

    fn get_imaging_settings(&mut self) -> Result<ImagingSettings>;

    fn set_imaging_settings(&mut self, settings: &ImagingSettings) -> Result<()>;

    /// Frees protocol resources. Called once when the owning session ends.
    fn release(&mut self) {}
}

impl<T: DeviceClient + ?Sized> DeviceClient for Box<T> {
    fn handshake(&mut self) -> Result<DeviceInfo> {
        (**self).handshake()
    }

    fn get_capabilities(&mut self) -> Result<Capabilities> {
        (**self).get_capabilities()
    }

    fn get_profile(&mut self) -> Result<Profile> {
        (**self).get_profile()
    }

    fn continuous_move(&mut self, pan_speed: f32, tilt_speed: f32) -> Result<()> {
        (**self).continuous_move(pan_speed, tilt_speed)
    }

    fn stop(&mut self) -> Result<()> {
        (**self).stop()
    }

    fn relative_move(&mut self, pan: f32, tilt: f32, zoom: f32) -> Result<()> {
        (**self).relative_move(pan, tilt, zoom)
    }

    fn absolute_move(&mut self, pan: f32, tilt: f32, zoom: f32) -> Result<()> {
        (**self).absolute_move(pan, tilt, zoom)
    }

    fn get_position(&mut self) -> Result<PtzVector> {
        (**self).get_position()
    }

    fn get_imaging_settings(&mut self) -> Result<ImagingSettings> {
        (**self).get_imaging_settings()
    }

    fn set_imaging_settings(&mut self, settings: &ImagingSettings) -> Result<()> {
        (**self).set_imaging_settings(settings)
    }

    fn release(&mut self) {
        (**self).release()
    }
}
