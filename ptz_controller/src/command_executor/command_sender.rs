use std::sync::{Arc, Mutex, PoisonError};

use ptz_device::{DeviceError, IrMode};
use tokio::sync::oneshot;

use crate::error::SendError;

use super::{
    CommandQueue,
    commands::{Command, PtzCommand, PtzStatus},
    runner::Runner,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Completion {
    StartContinuousMove,
    StopContinuousMove,
    RelativeMove,
    AbsoluteMove,
    Status(PtzStatus),
    ImagingMode(IrMode),
}

type Outcome = Result<Completion, SendError>;

/// Runner that forwards the single completion of its command into a oneshot channel.
struct CompletionRunner {
    response_ch: Mutex<Option<oneshot::Sender<Outcome>>>,
}

impl CompletionRunner {
    fn new(response_ch: oneshot::Sender<Outcome>) -> Self {
        Self {
            response_ch: Mutex::new(Some(response_ch)),
        }
    }

    fn take(&self) -> Option<oneshot::Sender<Outcome>> {
        self.response_ch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn send(&self, outcome: Outcome) {
        if let Some(response_ch) = self.take() {
            let _ = response_ch.send(outcome);
        }
    }

    fn complete(&self, completion: Completion) {
        self.send(Ok(completion));
    }
}

impl Runner for CompletionRunner {
    fn start_continuous_move_done(&self) {
        self.complete(Completion::StartContinuousMove);
    }

    fn stop_continuous_move_done(&self) {
        self.complete(Completion::StopContinuousMove);
    }

    fn relative_move_done(&self) {
        self.complete(Completion::RelativeMove);
    }

    fn absolute_move_done(&self) {
        self.complete(Completion::AbsoluteMove);
    }

    fn status_done(&self, status: &PtzStatus) {
        self.complete(Completion::Status(*status));
    }

    fn imaging_mode_done(&self, mode: IrMode) {
        self.complete(Completion::ImagingMode(mode));
    }

    fn discarded(&self, _command: &PtzCommand) {
        self.take();
    }

    fn failed(&self, _command: &PtzCommand, err: &DeviceError) {
        self.send(Err(SendError::Failed {
            reason: err.to_string(),
            retryable: err.is_retryable(),
        }));
    }
}

/// Async front end to a [`CommandQueue`]: each call resolves when its command completes.
#[derive(Clone)]
pub struct PtzCommandSender {
    queue: Arc<CommandQueue>,
}

impl PtzCommandSender {
    pub fn new(queue: Arc<CommandQueue>) -> Self {
        Self { queue }
    }

    pub fn queue(&self) -> &Arc<CommandQueue> {
        &self.queue
    }

    pub async fn send_command(&self, kind: PtzCommand) -> Result<Completion, SendError> {
        let (response_ch, response_rx) = oneshot::channel();
        let command = Command::new(kind, Arc::new(CompletionRunner::new(response_ch)));

        let queue = Arc::clone(&self.queue);
        tokio::task::spawn_blocking(move || queue.enqueue(command)).await??;

        response_rx.await.map_err(|_| SendError::Discarded)?
    }

    pub async fn start_continuous_move(
        &self,
        pan_speed: f32,
        tilt_speed: f32,
    ) -> Result<(), SendError> {
        let response = self
            .send_command(PtzCommand::StartContinuousMove {
                pan_speed,
                tilt_speed,
            })
            .await?;

        match response {
            Completion::StartContinuousMove => Ok(()),
            _ => Err(SendError::UnexpectedCompletion),
        }
    }

    pub async fn stop(&self) -> Result<(), SendError> {
        let response = self.send_command(PtzCommand::StopContinuousMove).await?;

        match response {
            Completion::StopContinuousMove => Ok(()),
            _ => Err(SendError::UnexpectedCompletion),
        }
    }

    pub async fn relative_move(&self, pan: f32, tilt: f32, zoom: f32) -> Result<(), SendError> {
        let response = self
            .send_command(PtzCommand::RelativeMove { pan, tilt, zoom })
            .await?;

        match response {
            Completion::RelativeMove => Ok(()),
            _ => Err(SendError::UnexpectedCompletion),
        }
    }

    pub async fn absolute_move(
        &self,
        pan: Option<f32>,
        tilt: Option<f32>,
        zoom: Option<f32>,
    ) -> Result<(), SendError> {
        let response = self
            .send_command(PtzCommand::AbsoluteMove { pan, tilt, zoom })
            .await?;

        match response {
            Completion::AbsoluteMove => Ok(()),
            _ => Err(SendError::UnexpectedCompletion),
        }
    }

    pub async fn status(&self) -> Result<PtzStatus, SendError> {
        let response = self.send_command(PtzCommand::GetStatus).await?;

        match response {
            Completion::Status(status) => Ok(status),
            _ => Err(SendError::UnexpectedCompletion),
        }
    }

    pub async fn set_imaging_mode(&self, mode: IrMode) -> Result<IrMode, SendError> {
        let response = self.send_command(PtzCommand::SetImagingMode(mode)).await?;

        match response {
            Completion::ImagingMode(mode) => Ok(mode),
            _ => Err(SendError::UnexpectedCompletion),
        }
    }
}
