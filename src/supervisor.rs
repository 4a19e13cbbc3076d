//! Outer control loop tying the pipe, the presence gate and the voice session together.
//!
//! The supervisor is an explicit state machine:
//!
//! ```text
//! AwaitingPipe -> AwaitingStream -> AwaitingPresence -> Playing -> Teardown
//!       ^               ^  |  ^            |                           |
//!       |               +--+  +------------+                           |
//!       +-------------- (pipe vanished) <------------------------------+
//! ```
//!
//! Any error from a state forcibly disconnects, waits for the error backoff and
//! starts over from [`SupervisorState::AwaitingPipe`].

use crate::{
    config::Config,
    constants::{ERROR_BACKOFF, PIPE_POLL_INTERVAL, PRESENCE_POLL_INTERVAL, SOURCE_FRAME_BYTES},
    encoder::{Codec, FrameEncoder},
    error::{BridgeError, EncodeError},
    gain::GainStage,
    pipe::{self, FrameSource},
    pipeline::AudioPipeline,
    presence::{ChannelDirectory, PresenceGate},
    voice::{PlaybackDone, PlaybackEnd, VoiceConnector, VoiceSession},
};
use std::{fs::File, path::PathBuf, sync::Arc, time::Duration};
use tokio::time::{interval, sleep, MissedTickBehavior};

/// Creates a fresh codec for every stream attempt.
pub type CodecFactory = Arc<dyn Fn() -> Result<Box<dyn Codec>, EncodeError> + Send + Sync>;

#[derive(Clone, Copy, Debug)]
pub struct SupervisorTimings {
    pub pipe_poll: Duration,
    pub presence_poll: Duration,
    pub error_backoff: Duration,
}

impl Default for SupervisorTimings {
    fn default() -> Self {
        Self {
            pipe_poll: PIPE_POLL_INTERVAL,
            presence_poll: PRESENCE_POLL_INTERVAL,
            error_backoff: ERROR_BACKOFF,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SupervisorSettings {
    pub channel_id: u64,
    pub pipe_path: PathBuf,
    pub gain: GainStage,
    pub timings: SupervisorTimings,
}

impl From<&Config> for SupervisorSettings {
    fn from(config: &Config) -> Self {
        Self {
            channel_id: config.voice_channel_id,
            pipe_path: config.pipe_path.clone(),
            gain: GainStage::new(config.volume_gain),
            timings: SupervisorTimings::default(),
        }
    }
}

pub enum SupervisorState {
    /// Polling for the pipe path to exist
    AwaitingPipe,

    /// Waiting for a writer to open the pipe and send data
    AwaitingStream,

    /// Stream is live; the probed chunk is carried into the pipeline
    AwaitingPresence {
        source: FrameSource<File>,
        first_chunk: Vec<u8>,
    },

    /// The voice platform is pulling frames
    Playing { done: PlaybackDone },

    Teardown,
}

impl SupervisorState {
    pub fn name(&self) -> &'static str {
        match self {
            SupervisorState::AwaitingPipe => "AwaitingPipe",
            SupervisorState::AwaitingStream => "AwaitingStream",
            SupervisorState::AwaitingPresence { .. } => "AwaitingPresence",
            SupervisorState::Playing { .. } => "Playing",
            SupervisorState::Teardown => "Teardown",
        }
    }
}

impl std::fmt::Debug for SupervisorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

pub struct SessionSupervisor<V: VoiceConnector, D> {
    connector: V,
    gate: PresenceGate<D>,
    /// The single live voice connection, if any
    session: Option<V::Session>,
    make_codec: CodecFactory,
    settings: SupervisorSettings,
}

impl<V, D> SessionSupervisor<V, D>
where
    V: VoiceConnector,
    D: ChannelDirectory,
{
    pub fn new(
        connector: V,
        directory: D,
        make_codec: CodecFactory,
        settings: SupervisorSettings,
    ) -> Self {
        Self {
            connector,
            gate: PresenceGate::new(directory),
            session: None,
            make_codec,
            settings,
        }
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    pub fn human_count(&self) -> usize {
        self.gate.human_count(self.settings.channel_id)
    }

    /// Run forever.
    pub async fn run(mut self) {
        let mut state = SupervisorState::AwaitingPipe;
        loop {
            state = self.step(state).await;
        }
    }

    /// Advance the state machine by one state, recovering from any error.
    pub async fn step(&mut self, state: SupervisorState) -> SupervisorState {
        let from = state.name();

        let next = match self.try_step(state).await {
            Ok(next) => next,
            Err(e) => {
                error!("Error in supervisor loop ({from}): {e}");
                self.release_session().await;
                sleep(self.settings.timings.error_backoff).await;
                SupervisorState::AwaitingPipe
            }
        };

        if next.name() != from {
            debug!("Supervisor {from} -> {}", next.name());
        }

        next
    }

    async fn try_step(&mut self, state: SupervisorState) -> Result<SupervisorState, BridgeError> {
        match state {
            SupervisorState::AwaitingPipe => self.await_pipe().await,
            SupervisorState::AwaitingStream => self.await_stream().await,
            SupervisorState::AwaitingPresence {
                source,
                first_chunk,
            } => self.await_presence(source, first_chunk).await,
            SupervisorState::Playing { done } => self.play(done).await,
            SupervisorState::Teardown => {
                self.release_session().await;
                Ok(self.after_stream().await)
            }
        }
    }

    async fn await_pipe(&mut self) -> Result<SupervisorState, BridgeError> {
        if self.pipe_exists().await {
            info!("Pipe {} exists, ready to monitor AirPlay", self.settings.pipe_path.display());
            return Ok(SupervisorState::AwaitingStream);
        }

        info!("Waiting for pipe file to be created...");
        sleep(self.settings.timings.pipe_poll).await;
        Ok(SupervisorState::AwaitingPipe)
    }

    async fn await_stream(&mut self) -> Result<SupervisorState, BridgeError> {
        info!("Waiting for incoming AirPlay audio...");

        let source = match pipe::open_blocking(self.settings.pipe_path.clone()).await {
            Ok(source) => source,
            Err(BridgeError::PipeUnavailable(path)) => {
                warn!("Pipe {} disappeared", path.display());
                return Ok(SupervisorState::AwaitingPipe);
            }
            Err(e) => return Err(e),
        };

        // A writer opening the pipe is not enough, wait until audio actually flows
        let (source, first_chunk) = pipe::read_blocking(source, SOURCE_FRAME_BYTES).await?;
        if first_chunk.is_empty() {
            info!("Empty stream detected. Closing.");
            drop(source);
            return Ok(SupervisorState::AwaitingStream);
        }

        info!("AirPlay connection detected and data received");
        Ok(SupervisorState::AwaitingPresence {
            source,
            first_chunk,
        })
    }

    async fn await_presence(
        &mut self,
        source: FrameSource<File>,
        first_chunk: Vec<u8>,
    ) -> Result<SupervisorState, BridgeError> {
        if !self.connect_if_occupied().await? {
            info!("No humans in channel. Closing AirPlay stream.");
            drop(source);
            return Ok(SupervisorState::AwaitingStream);
        }

        let codec = (self.make_codec)()?;
        let pipeline = AudioPipeline::new(source, FrameEncoder::new(codec), self.settings.gain)
            .with_initial_chunk(&first_chunk);

        let session = self
            .session
            .as_mut()
            .ok_or_else(|| BridgeError::Connection("no voice session after connect".into()))?;

        info!("Starting playback");
        let done = session.play(pipeline).await?;

        Ok(SupervisorState::Playing { done })
    }

    async fn play(&mut self, mut done: PlaybackDone) -> Result<SupervisorState, BridgeError> {
        let mut presence = interval(self.settings.timings.presence_poll);
        presence.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                end = &mut done => {
                    match end {
                        Ok(PlaybackEnd::Finished) => info!("AirPlay playback stopped"),
                        Ok(PlaybackEnd::Errored(e)) => error!("Player error: {e}"),
                        Err(_) => warn!("Playback ended without a completion notice"),
                    }
                    return Ok(SupervisorState::Teardown);
                }

                _ = presence.tick() => {
                    if self.human_count() == 0 {
                        info!("Empty channel detected. Stopping playback and leaving.");
                        self.release_session().await;
                        return Ok(SupervisorState::Teardown);
                    }
                }
            }
        }
    }

    /// Join the channel if humans are present. Returns whether a session is ready.
    ///
    /// Does nothing beyond the presence check when already connected.
    pub async fn connect_if_occupied(&mut self) -> Result<bool, BridgeError> {
        let channel_id = self.settings.channel_id;
        if channel_id == 0 {
            error!("VOICE_CHANNEL_ID is not set or invalid!");
            return Ok(false);
        }

        let Some(channel) = self.gate.directory().channel(channel_id) else {
            warn!("Channel {channel_id} not found.");
            return Ok(false);
        };

        if self.gate.human_count(channel_id) == 0 {
            info!("Empty voice channel. Waiting for humans to join...");
            return Ok(false);
        }

        if self.session.as_ref().is_some_and(|s| s.is_connected()) {
            return Ok(true);
        }

        // Drop a session the platform already closed on us
        self.session = None;

        info!("Connecting to voice channel: {} (deafened)", channel.name);
        let session = self.connector.connect(channel_id).await?;
        info!("Connected to voice channel (deafened)");
        self.session = Some(session);

        Ok(true)
    }

    /// Stop playback and leave the voice channel. No-op without a session.
    pub async fn release_session(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };

        session.stop().await;

        if session.is_connected() {
            match session.disconnect().await {
                Ok(()) => info!("Disconnected from voice channel"),
                Err(e) => error!("Failed to disconnect from voice channel: {e}"),
            }
        }
    }

    async fn after_stream(&self) -> SupervisorState {
        if self.pipe_exists().await {
            SupervisorState::AwaitingStream
        } else {
            SupervisorState::AwaitingPipe
        }
    }

    async fn pipe_exists(&self) -> bool {
        tokio::fs::try_exists(&self.settings.pipe_path)
            .await
            .unwrap_or(false)
    }
}
