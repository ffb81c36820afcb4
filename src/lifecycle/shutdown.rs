//! Signal handling for termination requests

use tokio::signal::unix::{signal, SignalKind};
use tracing::debug;

/// Waits for the process to be asked to terminate (SIGTERM or SIGINT).
#[derive(Default)]
pub struct ShutdownSignal;

impl ShutdownSignal {
    pub fn new() -> Self {
        Self
    }

    /// Resolve when either termination signal arrives.
    pub async fn wait(&self) {
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");
        let mut sigint =
            signal(SignalKind::interrupt()).expect("failed to register SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => debug!("received SIGTERM"),
            _ = sigint.recv() => debug!("received SIGINT"),
        }
    }
}
