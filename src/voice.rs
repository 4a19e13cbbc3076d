//! Capabilities the supervisor needs from the voice-chat platform.

use crate::{error::BridgeError, pipeline::AudioPipeline};
use async_trait::async_trait;
use tokio::sync::oneshot;

/// How a playback ended, as reported by the platform's completion callback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlaybackEnd {
    Finished,
    Errored(String),
}

pub type PlaybackDone = oneshot::Receiver<PlaybackEnd>;

#[async_trait]
pub trait VoiceConnector: Send + Sync {
    type Session: VoiceSession;

    /// Join the voice channel with local playback muted.
    async fn connect(&self, channel_id: u64) -> Result<Self::Session, BridgeError>;
}

#[async_trait]
pub trait VoiceSession: Send {
    /// Hand the pipeline to the platform, which pulls one frame every 20ms.
    ///
    /// The returned receiver resolves once playback finishes or fails.
    async fn play(&mut self, pipeline: AudioPipeline) -> Result<PlaybackDone, BridgeError>;

    /// Stop the current playback, dropping the pipeline.
    async fn stop(&mut self);

    async fn disconnect(self) -> Result<(), BridgeError>;

    fn is_connected(&self) -> bool;
}
