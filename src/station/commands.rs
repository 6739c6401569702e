//! Commands accepted by the station and the handle that sends them

use super::events::StationEvent;
use crate::utils::{AppError, AppResult};
use tokio::sync::{broadcast, mpsc, oneshot};

/// A user action injected into the control loop
#[derive(Debug)]
pub enum StationCommand {
    SetOnAir(bool),
    SetRecording(bool),
    /// Select a channel by name
    SetChannel(String),
    /// Ask for the last tape log line
    LastLogLine(oneshot::Sender<Option<String>>),
    /// Stop recording and playback, then end the loop
    Shutdown,
}

/// Cloneable front door to a running station
#[derive(Debug, Clone)]
pub struct StationHandle {
    commands: mpsc::Sender<StationCommand>,
    events: broadcast::Sender<StationEvent>,
}

impl StationHandle {
    pub(crate) fn new(
        commands: mpsc::Sender<StationCommand>,
        events: broadcast::Sender<StationEvent>,
    ) -> Self {
        Self { commands, events }
    }

    /// Subscribe to station events
    pub fn subscribe(&self) -> broadcast::Receiver<StationEvent> {
        self.events.subscribe()
    }

    pub async fn send(&self, command: StationCommand) -> AppResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| AppError::Station("station is not running".to_string()))
    }

    pub async fn set_on_air(&self, on_air: bool) -> AppResult<()> {
        self.send(StationCommand::SetOnAir(on_air)).await
    }

    pub async fn set_recording(&self, recording: bool) -> AppResult<()> {
        self.send(StationCommand::SetRecording(recording)).await
    }

    pub async fn set_channel(&self, name: impl Into<String>) -> AppResult<()> {
        self.send(StationCommand::SetChannel(name.into())).await
    }

    /// The last tape log line, for copying to the clipboard
    pub async fn last_log_line(&self) -> AppResult<Option<String>> {
        let (tx, rx) = oneshot::channel();
        self.send(StationCommand::LastLogLine(tx)).await?;
        rx.await
            .map_err(|_| AppError::Station("station dropped the request".to_string()))
    }

    pub async fn shutdown(&self) -> AppResult<()> {
        self.send(StationCommand::Shutdown).await
    }
}
