#![allow(dead_code)]

use std::{
    sync::{
        Arc, Condvar, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use ptz_controller::command_executor::{
    commands::{PtzCommand, PtzStatus},
    runner::Runner,
};
use ptz_device::{
    AxisRange, AxisRanges, Capabilities, DeviceClient, DeviceError, DeviceInfo, ImagingSettings,
    IrMode, Profile, PtzVector, Result,
};

pub const TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Handshake,
    Capabilities,
    Profile,
    ContinuousMove(f32, f32),
    Stop,
    RelativeMove(f32, f32, f32),
    AbsoluteMove(f32, f32, f32),
    GetPosition,
    GetImaging,
    SetImaging(ImagingSettings),
    Release,
}

/// State shared between a [`MockCamera`] and the test driving it.
pub struct MockState {
    pub ranges: AxisRanges,
    calls: Mutex<Vec<Call>>,
    position: Mutex<PtzVector>,
    imaging: Mutex<ImagingSettings>,
    fail_handshake: AtomicBool,
    without_imaging: AtomicBool,
    fail_relative_move: AtomicBool,
    relative_move_times_out: AtomicBool,
    gate_closed: Mutex<bool>,
    gate: Condvar,
}

impl MockState {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls made after session initialization.
    pub fn command_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| {
                !matches!(
                    call,
                    Call::Handshake | Call::Capabilities | Call::Profile | Call::Release
                )
            })
            .collect()
    }

    pub fn has_call(&self, call: &Call) -> bool {
        self.calls.lock().unwrap().contains(call)
    }

    pub fn set_position(&self, position: PtzVector) {
        *self.position.lock().unwrap() = position;
    }

    pub fn set_imaging(&self, settings: ImagingSettings) {
        *self.imaging.lock().unwrap() = settings;
    }

    pub fn imaging(&self) -> ImagingSettings {
        self.imaging.lock().unwrap().clone()
    }

    pub fn set_fail_handshake(&self, fail: bool) {
        self.fail_handshake.store(fail, Ordering::SeqCst);
    }

    pub fn set_without_imaging(&self, missing: bool) {
        self.without_imaging.store(missing, Ordering::SeqCst);
    }

    /// Makes `relative_move` fail with a device fault, or a timeout when `timeout` is set.
    pub fn set_fail_relative_move(&self, fail: bool, timeout: bool) {
        self.relative_move_times_out.store(timeout, Ordering::SeqCst);
        self.fail_relative_move.store(fail, Ordering::SeqCst);
    }

    /// While closed, every command request blocks after being recorded.
    pub fn close_gate(&self) {
        *self.gate_closed.lock().unwrap() = true;
    }

    pub fn open_gate(&self) {
        *self.gate_closed.lock().unwrap() = false;
        self.gate.notify_all();
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn request(&self, call: Call) {
        self.record(call);
        let closed = self.gate_closed.lock().unwrap();
        let _open = self.gate.wait_while(closed, |closed| *closed).unwrap();
    }
}

pub struct MockCamera {
    state: Arc<MockState>,
}

impl MockCamera {
    pub fn new() -> Self {
        Self::with_ranges(AxisRanges {
            pan: AxisRange::new(-170.0, 170.0),
            tilt: AxisRange::new(-30.0, 90.0),
            zoom: AxisRange::new(1.0, 30.0),
        })
    }

    pub fn with_ranges(ranges: AxisRanges) -> Self {
        Self {
            state: Arc::new(MockState {
                ranges,
                calls: Mutex::new(Vec::new()),
                position: Mutex::new(PtzVector::new(0.0, 0.0, 1.0)),
                imaging: Mutex::new(ImagingSettings {
                    brightness: Some(40.0),
                    contrast: Some(55.0),
                    color_saturation: None,
                    sharpness: Some(10.0),
                    ir_cut_filter: Some(IrMode::Auto),
                }),
                fail_handshake: AtomicBool::new(false),
                without_imaging: AtomicBool::new(false),
                fail_relative_move: AtomicBool::new(false),
                relative_move_times_out: AtomicBool::new(false),
                gate_closed: Mutex::new(false),
                gate: Condvar::new(),
            }),
        }
    }

    pub fn state(&self) -> Arc<MockState> {
        Arc::clone(&self.state)
    }
}

impl DeviceClient for MockCamera {
    fn handshake(&mut self) -> Result<DeviceInfo> {
        self.state.record(Call::Handshake);
        if self.state.fail_handshake.load(Ordering::SeqCst) {
            return Err(DeviceError::Timeout(Duration::from_secs(30)));
        }
        Ok(DeviceInfo {
            manufacturer: "Mock".to_string(),
            model: "PTZ-1".to_string(),
            firmware_version: "1.0".to_string(),
            serial_number: "0001".to_string(),
            hardware_id: "mock".to_string(),
        })
    }

    fn get_capabilities(&mut self) -> Result<Capabilities> {
        self.state.record(Call::Capabilities);
        let imaging = (!self.state.without_imaging.load(Ordering::SeqCst))
            .then(|| "http://mock/imaging".to_string());
        Ok(Capabilities {
            media_endpoint: Some("http://mock/media".to_string()),
            ptz_endpoint: Some("http://mock/ptz".to_string()),
            imaging_endpoint: imaging,
            ranges: self.state.ranges,
        })
    }

    fn get_profile(&mut self) -> Result<Profile> {
        self.state.record(Call::Profile);
        Ok(Profile {
            token: "main".to_string(),
            video_source_token: "source".to_string(),
        })
    }

    fn continuous_move(&mut self, pan_speed: f32, tilt_speed: f32) -> Result<()> {
        self.state.request(Call::ContinuousMove(pan_speed, tilt_speed));
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.state.request(Call::Stop);
        Ok(())
    }

    fn relative_move(&mut self, pan: f32, tilt: f32, zoom: f32) -> Result<()> {
        self.state.request(Call::RelativeMove(pan, tilt, zoom));
        if self.state.fail_relative_move.load(Ordering::SeqCst) {
            if self.state.relative_move_times_out.load(Ordering::SeqCst) {
                return Err(DeviceError::Timeout(Duration::from_secs(30)));
            }
            return Err(DeviceError::fault("ter:Action", "relative move rejected"));
        }
        Ok(())
    }

    fn absolute_move(&mut self, pan: f32, tilt: f32, zoom: f32) -> Result<()> {
        self.state.request(Call::AbsoluteMove(pan, tilt, zoom));
        self.state.set_position(PtzVector::new(pan, tilt, zoom));
        Ok(())
    }

    fn get_position(&mut self) -> Result<PtzVector> {
        self.state.request(Call::GetPosition);
        Ok(*self.state.position.lock().unwrap())
    }

    fn get_imaging_settings(&mut self) -> Result<ImagingSettings> {
        self.state.request(Call::GetImaging);
        Ok(self.state.imaging())
    }

    fn set_imaging_settings(&mut self, settings: &ImagingSettings) -> Result<()> {
        self.state.request(Call::SetImaging(settings.clone()));
        self.state.set_imaging(settings.clone());
        Ok(())
    }

    fn release(&mut self) {
        self.state.record(Call::Release);
    }
}

/// Runner that records every notification it receives.
#[derive(Default)]
pub struct RecordingRunner {
    events: Mutex<Vec<String>>,
    statuses: Mutex<Vec<PtzStatus>>,
}

impl RecordingRunner {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn has_event(&self, event: &str) -> bool {
        self.events.lock().unwrap().iter().any(|e| e == event)
    }

    pub fn statuses(&self) -> Vec<PtzStatus> {
        self.statuses.lock().unwrap().clone()
    }

    fn push(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }
}

impl Runner for RecordingRunner {
    fn start_continuous_move_done(&self) {
        self.push("start");
    }

    fn stop_continuous_move_done(&self) {
        self.push("stop");
    }

    fn relative_move_done(&self) {
        self.push("relative");
    }

    fn absolute_move_done(&self) {
        self.push("absolute");
    }

    fn status_done(&self, status: &PtzStatus) {
        self.statuses.lock().unwrap().push(*status);
        self.push("status");
    }

    fn imaging_mode_done(&self, mode: IrMode) {
        self.push(format!("imaging {mode}"));
    }

    fn discarded(&self, command: &PtzCommand) {
        self.push(format!("discarded {}", command.name()));
    }

    fn failed(&self, command: &PtzCommand, _err: &DeviceError) {
        self.push(format!("failed {}", command.name()));
    }
}

/// Polls `condition` until it holds or `TIMEOUT` elapses.
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + TIMEOUT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

pub fn assert_close(actual: f32, expected: f32) {
    assert!(
        (actual - expected).abs() < 1e-4,
        "expected {expected}, got {actual}"
    );
}
