use ptz_device::{DeviceError, IrMode};
use tracing::error;

use super::commands::{PtzCommand, PtzStatus};

/// Completion hooks, one per command kind.
///
/// Every hook runs on the session worker thread right after the device accepted the request,
/// so a hook must not wait on anything the worker itself has to produce. Enqueuing follow-up
/// commands from a hook is fine.
///
/// The provided hooks treat a call as a wiring defect: they log and panic, which takes the
/// session down. Override the hooks your command kinds need, or use [`NoopRunner`].
pub trait Runner: Send + Sync {
    fn start_continuous_move_done(&self) {
        unimplemented_hook("start_continuous_move_done")
    }

    fn stop_continuous_move_done(&self) {
        unimplemented_hook("stop_continuous_move_done")
    }

    fn relative_move_done(&self) {
        unimplemented_hook("relative_move_done")
    }

    fn absolute_move_done(&self) {
        unimplemented_hook("absolute_move_done")
    }

    fn status_done(&self, _status: &PtzStatus) {
        unimplemented_hook("status_done")
    }

    fn imaging_mode_done(&self, _mode: IrMode) {
        unimplemented_hook("imaging_mode_done")
    }

    /// Called when a command is dropped without being executed.
    fn discarded(&self, _command: &PtzCommand) {}

    /// Called when the device refused or never answered the request. Whether the session
    /// survives is up to the queue's [`FailurePolicy`](super::FailurePolicy).
    fn failed(&self, _command: &PtzCommand, _err: &DeviceError) {}
}

fn unimplemented_hook(hook: &'static str) -> ! {
    error!(hook, "Runner hook is not implemented");
    panic!("runner hook `{hook}` is not implemented")
}

/// Runner that accepts no completions at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct RunnerAdapter;

impl Runner for RunnerAdapter {}

/// Runner that ignores every completion.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRunner;

impl Runner for NoopRunner {
    fn start_continuous_move_done(&self) {}

    fn stop_continuous_move_done(&self) {}

    fn relative_move_done(&self) {}

    fn absolute_move_done(&self) {}

    fn status_done(&self, _status: &PtzStatus) {}

    fn imaging_mode_done(&self, _mode: IrMode) {}
}
