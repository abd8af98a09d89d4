//! Turns pointer, wheel and slider input into camera commands.
//!
//! Wheel ticks and pointer moves arrive far faster than the camera answers, so each goes
//! through its own [`CoalescingChannel`]. Wheel deltas are summed; while a zoom step is in
//! flight the zoom channel stays paused and further ticks pile up into the next step. Pointer
//! moves keep only the latest position.

use std::{
    io,
    sync::{Arc, Weak},
};

use ptz_device::{DeviceError, IrMode};
use tracing::{debug, info, trace, warn};
use utilities::coalescing_channel::{ChannelHandle, CoalescingChannel};

use crate::{
    command_executor::{
        CommandQueue,
        commands::{Command, PtzCommand, PtzStatus},
        runner::Runner,
    },
    config::InputConfig,
    error::QueueError,
};

/// Receives the normalized position after every status refresh.
pub trait StatusListener: Send + Sync {
    fn status_changed(&self, status: &PtzStatus);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Pan,
    Tilt,
    Zoom,
}

/// Zoom step for an accumulated wheel delta, clamped to `[-1, 1]`.
pub fn zoom_step(wheel_sum: i32, settings: &InputConfig) -> f32 {
    let step = wheel_sum as f32 * settings.zoom_sensitivity as f32
        / (20.0 * settings.wheel_delta as f32);
    step.clamp(-1.0, 1.0)
}

/// Pan and tilt velocity for a pointer at `(x, y)` in a `width` by `height` viewport.
///
/// The viewport centre is at rest and the edges map to full speed before sensitivity is
/// applied. Returns `None` when the pointer is outside the viewport.
pub fn pointer_velocity(
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    settings: &InputConfig,
) -> Option<(f32, f32)> {
    if width <= 0.0 || height <= 0.0 {
        return None;
    }
    if !(0.0..=width).contains(&x) || !(0.0..=height).contains(&y) {
        return None;
    }

    let dx = 2.0 * ((x - width / 2.0) / width) * settings.pan_sensitivity();
    let dy = -2.0 * ((y - height / 2.0) / height) * settings.tilt_sensitivity();
    Some((dx.clamp(-1.0, 1.0), dy.clamp(-1.0, 1.0)))
}

struct InputRunner {
    me: Weak<InputRunner>,
    queue: Weak<CommandQueue>,
    zoom: ChannelHandle<i32>,
    listener: Option<Arc<dyn StatusListener>>,
}

impl InputRunner {
    fn refresh(&self) {
        let (Some(queue), Some(me)) = (self.queue.upgrade(), self.me.upgrade()) else {
            return;
        };
        if let Err(err) = queue.enqueue(Command::get_status(me)) {
            debug!(%err, "Status refresh not queued");
        }
    }
}

impl Runner for InputRunner {
    fn start_continuous_move_done(&self) {
        trace!("Continuous move started");
    }

    fn stop_continuous_move_done(&self) {
        self.refresh();
    }

    fn relative_move_done(&self) {
        self.zoom.resume();
    }

    fn absolute_move_done(&self) {
        self.refresh();
    }

    fn status_done(&self, status: &PtzStatus) {
        if let Some(listener) = &self.listener {
            listener.status_changed(status);
        }
    }

    fn imaging_mode_done(&self, mode: IrMode) {
        info!(%mode, "Imaging mode applied");
    }

    fn discarded(&self, command: &PtzCommand) {
        if let PtzCommand::RelativeMove { .. } = command {
            self.zoom.resume();
        }
    }

    fn failed(&self, command: &PtzCommand, err: &DeviceError) {
        warn!(%command, %err, "Camera request failed");
        if let PtzCommand::RelativeMove { .. } = command {
            self.zoom.resume();
        }
    }
}

/// Input front end of one camera session.
pub struct PtzInput {
    queue: Arc<CommandQueue>,
    settings: InputConfig,
    runner: Arc<InputRunner>,
    zoom: CoalescingChannel<i32>,
    pointer: CoalescingChannel<(f32, f32)>,
}

impl PtzInput {
    pub fn new(
        queue: Arc<CommandQueue>,
        settings: InputConfig,
        listener: Option<Arc<dyn StatusListener>>,
    ) -> Self {
        let zoom = CoalescingChannel::new("zoom");
        let pointer = CoalescingChannel::new("pointer");
        let zoom_handle = zoom.handle();
        let runner = Arc::new_cyclic(|me| InputRunner {
            me: me.clone(),
            queue: Arc::downgrade(&queue),
            zoom: zoom_handle,
            listener,
        });

        Self {
            queue,
            settings,
            runner,
            zoom,
            pointer,
        }
    }

    /// Starts both channel workers.
    pub fn start(&self) -> io::Result<()> {
        let queue = Arc::downgrade(&self.queue);
        let runner: Arc<dyn Runner> = self.runner.clone();
        let zoom = self.zoom.handle();
        let settings = self.settings.clone();
        self.zoom.run(
            |sum: i32, delta: i32| sum.saturating_add(delta),
            move |sum: i32| {
                if sum == 0 {
                    return;
                }
                let Some(queue) = queue.upgrade() else {
                    return;
                };
                let step = zoom_step(sum, &settings);
                zoom.pause();
                if let Err(err) = queue.enqueue(Command::relative_move(0.0, 0.0, step, runner.clone())) {
                    warn!(%err, "Zoom step not queued");
                }
            },
        )?;

        let queue = Arc::downgrade(&self.queue);
        let runner: Arc<dyn Runner> = self.runner.clone();
        self.pointer.run(
            |_: (f32, f32), velocity: (f32, f32)| velocity,
            move |(pan_speed, tilt_speed): (f32, f32)| {
                let Some(queue) = queue.upgrade() else {
                    return;
                };
                let command = Command::start_continuous_move(pan_speed, tilt_speed, runner.clone());
                if let Err(err) = queue.enqueue(command) {
                    warn!(%err, "Continuous move not queued");
                }
            },
        )
    }

    /// Feeds one wheel event. Positive deltas zoom in.
    pub fn wheel(&self, delta: i32) {
        self.zoom.push(delta);
    }

    /// Steers the camera towards the pointer. Returns `false` when the pointer is outside the
    /// viewport and the event was ignored.
    pub fn pointer_moved(&self, x: f32, y: f32, width: f32, height: f32) -> bool {
        match pointer_velocity(x, y, width, height, &self.settings) {
            Some(velocity) => {
                self.pointer.push(velocity);
                true
            }
            None => false,
        }
    }

    pub fn pointer_released(&self) -> Result<(), QueueError> {
        self.queue
            .enqueue(Command::stop_continuous_move(self.runner.clone()))
    }

    /// Moves a single axis to `fraction` of its range. The other axes stay where they are.
    pub fn slider_moved(&self, axis: Axis, fraction: f32) -> Result<(), QueueError> {
        let fraction = Some(fraction.clamp(0.0, 1.0));
        let (pan, tilt, zoom) = match axis {
            Axis::Pan => (fraction, None, None),
            Axis::Tilt => (None, fraction, None),
            Axis::Zoom => (None, None, fraction),
        };
        self.queue
            .enqueue(Command::absolute_move(pan, tilt, zoom, self.runner.clone()))
    }

    pub fn set_imaging_mode(&self, mode: IrMode) -> Result<(), QueueError> {
        self.queue
            .enqueue(Command::set_imaging_mode(mode, self.runner.clone()))
    }

    pub fn refresh(&self) -> Result<(), QueueError> {
        self.queue
            .enqueue(Command::get_status(self.runner.clone()))
    }

    pub fn zoom_paused(&self) -> bool {
        self.zoom.is_paused()
    }

    /// Stops both channel workers. Pending input is dropped.
    pub fn shutdown(&self) {
        self.zoom.shutdown();
        self.pointer.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_notch_is_a_twentieth_of_the_range() {
        let settings = InputConfig::default();
        assert!((zoom_step(120, &settings) - 0.05).abs() < 1e-6);
        assert!((zoom_step(-240, &settings) + 0.1).abs() < 1e-6);
    }

    #[test]
    fn zoom_step_is_clamped() {
        let settings = InputConfig {
            zoom_sensitivity: 10,
            ..InputConfig::default()
        };
        assert_eq!(zoom_step(120 * 10, &settings), 1.0);
        assert_eq!(zoom_step(-120 * 10, &settings), -1.0);
    }

    #[test]
    fn pointer_centre_is_at_rest() {
        let settings = InputConfig::default();
        let (dx, dy) = pointer_velocity(100.0, 50.0, 200.0, 100.0, &settings).unwrap();
        assert_eq!(dx, 0.0);
        assert_eq!(dy, 0.0);
    }

    #[test]
    fn pointer_maps_to_scaled_velocity() {
        let settings = InputConfig::default();
        let (dx, dy) = pointer_velocity(200.0, 0.0, 200.0, 100.0, &settings).unwrap();
        assert!((dx - 1.0).abs() < 1e-6);
        assert!((dy - 0.6).abs() < 1e-6);

        let fast = InputConfig {
            pan_tilt_sensitivity: 4.0,
            ..InputConfig::default()
        };
        let (dx, dy) = pointer_velocity(150.0, 100.0, 200.0, 100.0, &fast).unwrap();
        assert_eq!(dx, 1.0);
        assert_eq!(dy, -1.0);
    }

    #[test]
    fn pointer_outside_viewport_is_ignored() {
        let settings = InputConfig::default();
        assert!(pointer_velocity(-1.0, 10.0, 200.0, 100.0, &settings).is_none());
        assert!(pointer_velocity(10.0, 101.0, 200.0, 100.0, &settings).is_none());
        assert!(pointer_velocity(10.0, 10.0, 0.0, 100.0, &settings).is_none());
    }
}
