use std::{fmt, sync::Arc};

use ptz_device::{AxisRange, AxisRanges, DeviceClient, DeviceError, IrMode, PtzVector};

use super::runner::Runner;

/// Camera position normalized to `[0, 1]` on every axis.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PtzStatus {
    pub pan: f32,
    pub tilt: f32,
    pub zoom: f32,
}

impl PtzStatus {
    pub fn from_native(position: PtzVector, ranges: &AxisRanges) -> Self {
        Self {
            pan: ranges.pan.to_fraction(position.pan),
            tilt: ranges.tilt.to_fraction(position.tilt),
            zoom: ranges.zoom.to_fraction(position.zoom),
        }
    }
}

impl fmt::Display for PtzStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pan={:.3} tilt={:.3} zoom={:.3}",
            self.pan, self.tilt, self.zoom
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PtzCommand {
    /// Normalized pan and tilt velocity in `[-1, 1]`.
    StartContinuousMove { pan_speed: f32, tilt_speed: f32 },
    StopContinuousMove,
    RelativeMove { pan: f32, tilt: f32, zoom: f32 },
    /// Targets are `[0, 1]` fractions of the axis range. Unset axes keep their current value.
    AbsoluteMove {
        pan: Option<f32>,
        tilt: Option<f32>,
        zoom: Option<f32>,
    },
    GetStatus,
    SetImagingMode(IrMode),
}

impl PtzCommand {
    pub fn name(&self) -> &'static str {
        match self {
            PtzCommand::StartContinuousMove { .. } => "StartContinuousMove",
            PtzCommand::StopContinuousMove => "StopContinuousMove",
            PtzCommand::RelativeMove { .. } => "RelativeMove",
            PtzCommand::AbsoluteMove { .. } => "AbsoluteMove",
            PtzCommand::GetStatus => "GetStatus",
            PtzCommand::SetImagingMode(_) => "SetImagingMode",
        }
    }
}

impl fmt::Display for PtzCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PtzCommand::StartContinuousMove {
                pan_speed,
                tilt_speed,
            } => write!(f, "StartContinuousMove({pan_speed:.3}, {tilt_speed:.3})"),
            PtzCommand::RelativeMove { pan, tilt, zoom } => {
                write!(f, "RelativeMove({pan:.3}, {tilt:.3}, {zoom:.3})")
            }
            PtzCommand::AbsoluteMove { pan, tilt, zoom } => {
                write!(f, "AbsoluteMove({pan:?}, {tilt:?}, {zoom:?})")
            }
            PtzCommand::SetImagingMode(mode) => write!(f, "SetImagingMode({mode})"),
            other => f.write_str(other.name()),
        }
    }
}

/// What a command needs from the session while it runs.
pub struct DeviceContext<'a> {
    pub client: &'a mut dyn DeviceClient,
    pub ranges: &'a AxisRanges,
}

/// A device request paired with the runner that hears about its completion.
///
/// `process` and `discard` both consume the command, so it reaches exactly one of the two.
pub struct Command {
    kind: PtzCommand,
    runner: Arc<dyn Runner>,
}

impl Command {
    pub fn new(kind: PtzCommand, runner: Arc<dyn Runner>) -> Self {
        Self { kind, runner }
    }

    pub fn start_continuous_move(pan_speed: f32, tilt_speed: f32, runner: Arc<dyn Runner>) -> Self {
        Self::new(
            PtzCommand::StartContinuousMove {
                pan_speed,
                tilt_speed,
            },
            runner,
        )
    }

    pub fn stop_continuous_move(runner: Arc<dyn Runner>) -> Self {
        Self::new(PtzCommand::StopContinuousMove, runner)
    }

    pub fn relative_move(pan: f32, tilt: f32, zoom: f32, runner: Arc<dyn Runner>) -> Self {
        Self::new(PtzCommand::RelativeMove { pan, tilt, zoom }, runner)
    }

    pub fn absolute_move(
        pan: Option<f32>,
        tilt: Option<f32>,
        zoom: Option<f32>,
        runner: Arc<dyn Runner>,
    ) -> Self {
        Self::new(PtzCommand::AbsoluteMove { pan, tilt, zoom }, runner)
    }

    pub fn get_status(runner: Arc<dyn Runner>) -> Self {
        Self::new(PtzCommand::GetStatus, runner)
    }

    pub fn set_imaging_mode(mode: IrMode, runner: Arc<dyn Runner>) -> Self {
        Self::new(PtzCommand::SetImagingMode(mode), runner)
    }

    pub fn kind(&self) -> &PtzCommand {
        &self.kind
    }

    /// Runs the request and fires the matching hook on success, or [`Runner::failed`] when
    /// the device refused it.
    pub fn process(self, ctx: &mut DeviceContext<'_>) -> Result<(), DeviceError> {
        let result = self.execute(ctx);
        if let Err(err) = &result {
            self.runner.failed(&self.kind, err);
        }
        result
    }

    fn execute(&self, ctx: &mut DeviceContext<'_>) -> Result<(), DeviceError> {
        let client = &mut *ctx.client;
        let ranges = ctx.ranges;

        match self.kind {
            PtzCommand::StartContinuousMove {
                pan_speed,
                tilt_speed,
            } => {
                client.continuous_move(pan_speed, tilt_speed)?;
                self.runner.start_continuous_move_done();
            }
            PtzCommand::StopContinuousMove => {
                client.stop()?;
                self.runner.stop_continuous_move_done();
            }
            PtzCommand::RelativeMove { pan, tilt, zoom } => {
                client.relative_move(pan, tilt, zoom)?;
                self.runner.relative_move_done();
            }
            PtzCommand::AbsoluteMove { pan, tilt, zoom } => {
                let current = if pan.is_none() || tilt.is_none() || zoom.is_none() {
                    client.get_position()?
                } else {
                    PtzVector::default()
                };

                // f32 rounding can put a full-scale fraction just past the range limit.
                let native =
                    |range: AxisRange, fraction: f32| range.clamp(range.to_native(fraction));
                let target = PtzVector::new(
                    pan.map_or(current.pan, |fraction| native(ranges.pan, fraction)),
                    tilt.map_or(current.tilt, |fraction| native(ranges.tilt, fraction)),
                    zoom.map_or(current.zoom, |fraction| native(ranges.zoom, fraction)),
                );
                client.absolute_move(target.pan, target.tilt, target.zoom)?;
                self.runner.absolute_move_done();
            }
            PtzCommand::GetStatus => {
                let position = client.get_position()?;
                let status = PtzStatus::from_native(position, ranges);
                self.runner.status_done(&status);
            }
            PtzCommand::SetImagingMode(mode) => {
                let mut settings = client.get_imaging_settings()?;
                settings.ir_cut_filter = Some(mode);
                client.set_imaging_settings(&settings)?;
                self.runner.imaging_mode_done(mode);
            }
        }

        Ok(())
    }

    /// Drops the command unexecuted and tells its runner.
    pub fn discard(self) {
        self.runner.discarded(&self.kind);
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command").field("kind", &self.kind).finish()
    }
}
