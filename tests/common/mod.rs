//! Test infrastructure for airplay-voice-bridge integration tests.
//!
//! Provides fake codec, channel directory and voice platform implementations
//! so the pipeline and supervisor can be driven without Discord or libopus.

#![allow(dead_code)]

use async_trait::async_trait;
use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};
use tempfile::TempDir;
use tokio::sync::oneshot;

// Re-export key types from the main crate
pub use airplay_voice_bridge::constants::{SOURCE_FRAME_BYTES, TARGET_FRAME_SAMPLES};
pub use airplay_voice_bridge::encoder::{Codec, EncodedFrame, FrameEncoder};
pub use airplay_voice_bridge::error::{BridgeError, EncodeError};
pub use airplay_voice_bridge::gain::GainStage;
pub use airplay_voice_bridge::pipe::FrameSource;
pub use airplay_voice_bridge::pipeline::{AudioPipeline, FrameOutcome};
pub use airplay_voice_bridge::presence::{ChannelDirectory, ChannelKind, ChannelSnapshot, Occupant};
pub use airplay_voice_bridge::supervisor::{
    CodecFactory, SessionSupervisor, SupervisorSettings, SupervisorState, SupervisorTimings,
};
pub use airplay_voice_bridge::voice::{PlaybackDone, PlaybackEnd, VoiceConnector, VoiceSession};

pub const CHANNEL_ID: u64 = 4242;

/// Packet emitted by [`FakeCodec`] for every frame.
pub const FAKE_PACKET: [u8; 2] = [0xab, 0xcd];

/// Codec stand-in that checks the frame size and returns a fixed packet.
pub struct FakeCodec;

impl Codec for FakeCodec {
    fn encode(&mut self, pcm: &[i16], out: &mut [u8]) -> Result<usize, EncodeError> {
        assert_eq!(pcm.len(), TARGET_FRAME_SAMPLES * 2);
        out[..FAKE_PACKET.len()].copy_from_slice(&FAKE_PACKET);
        Ok(FAKE_PACKET.len())
    }
}

pub fn fake_codec_factory() -> CodecFactory {
    Arc::new(|| Ok(Box::new(FakeCodec) as Box<dyn Codec>))
}

pub fn fake_pipeline(source: FrameSource<std::fs::File>) -> AudioPipeline {
    AudioPipeline::new(
        source,
        FrameEncoder::new(Box::new(FakeCodec)),
        GainStage::default(),
    )
}

/// Raw PCM for `frames` source frames with every sample set to `value`.
pub fn constant_pcm(frames: usize, value: i16) -> Vec<u8> {
    value
        .to_le_bytes()
        .iter()
        .copied()
        .cycle()
        .take(frames * SOURCE_FRAME_BYTES)
        .collect()
}

/// A temporary directory holding a stand-in for the AirPlay pipe.
///
/// A regular file behaves like a pipe whose writer wrote everything and
/// closed: reads return the contents, then end-of-stream.
pub struct PipeFixture {
    pub dir: TempDir,
    pub path: PathBuf,
}

impl PipeFixture {
    /// Path inside a fresh temp dir, not created yet.
    pub fn missing() -> Self {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("airplay-fifo");
        Self { dir, path }
    }

    pub fn with_contents(bytes: &[u8]) -> Self {
        let fixture = Self::missing();
        fixture.write(bytes);
        fixture
    }

    pub fn write(&self, bytes: &[u8]) {
        std::fs::write(&self.path, bytes).unwrap();
    }

    pub fn remove(&self) {
        std::fs::remove_file(&self.path).unwrap();
    }
}

/// Channel directory whose human count can be changed while a test runs.
#[derive(Clone)]
pub struct SharedDirectory {
    humans: Arc<AtomicUsize>,
    kind: ChannelKind,
}

impl SharedDirectory {
    pub fn new(humans: usize) -> Self {
        Self {
            humans: Arc::new(AtomicUsize::new(humans)),
            kind: ChannelKind::Voice,
        }
    }

    pub fn text_channel() -> Self {
        Self {
            humans: Arc::new(AtomicUsize::new(1)),
            kind: ChannelKind::Other,
        }
    }

    pub fn set_humans(&self, humans: usize) {
        self.humans.store(humans, Ordering::SeqCst);
    }
}

impl ChannelDirectory for SharedDirectory {
    fn channel(&self, channel_id: u64) -> Option<ChannelSnapshot> {
        if channel_id != CHANNEL_ID {
            return None;
        }

        // Every channel also holds one bot, which must never count as presence
        let mut occupants = vec![Occupant {
            name: "some-bot".to_string(),
            bot: true,
        }];
        for i in 0..self.humans.load(Ordering::SeqCst) {
            occupants.push(Occupant {
                name: format!("human{i}"),
                bot: false,
            });
        }

        Some(ChannelSnapshot {
            name: "lounge".to_string(),
            kind: self.kind,
            occupants,
        })
    }
}

/// What the fake voice platform was asked to do.
#[derive(Default)]
pub struct VoiceLog {
    pub connects: AtomicUsize,
    pub disconnects: AtomicUsize,
    pub stops: AtomicUsize,
    pub outcomes: Mutex<Vec<FrameOutcome>>,
    /// Set when the platform has dropped every session behind our back
    pub platform_closed: AtomicBool,
}

impl VoiceLog {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn outcomes(&self) -> Vec<FrameOutcome> {
        self.outcomes.lock().unwrap().clone()
    }

    pub fn set_platform_closed(&self, closed: bool) {
        self.platform_closed.store(closed, Ordering::SeqCst);
    }
}

#[derive(Clone, Copy, PartialEq)]
pub enum PlayMode {
    /// Pull every frame on a blocking worker, then report completion
    Drain,
    /// Keep the pipeline without pulling, playback never completes on its own
    Hold,
}

pub struct FakeConnector {
    pub log: Arc<VoiceLog>,
    pub mode: PlayMode,
    pub fail_connect: bool,
}

impl FakeConnector {
    pub fn new(mode: PlayMode) -> Self {
        Self {
            log: Arc::new(VoiceLog::default()),
            mode,
            fail_connect: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_connect: true,
            ..Self::new(PlayMode::Drain)
        }
    }
}

#[async_trait]
impl VoiceConnector for FakeConnector {
    type Session = FakeSession;

    async fn connect(&self, _channel_id: u64) -> Result<FakeSession, BridgeError> {
        if self.fail_connect {
            return Err(BridgeError::Connection("gateway unreachable".to_string()));
        }

        self.log.connects.fetch_add(1, Ordering::SeqCst);
        Ok(FakeSession {
            log: self.log.clone(),
            mode: self.mode,
            held: None,
        })
    }
}

pub struct FakeSession {
    log: Arc<VoiceLog>,
    mode: PlayMode,
    held: Option<(AudioPipeline, oneshot::Sender<PlaybackEnd>)>,
}

#[async_trait]
impl VoiceSession for FakeSession {
    async fn play(&mut self, mut pipeline: AudioPipeline) -> Result<PlaybackDone, BridgeError> {
        let (tx, rx) = oneshot::channel();

        match self.mode {
            PlayMode::Drain => {
                let log = self.log.clone();
                tokio::task::spawn_blocking(move || {
                    loop {
                        let outcome = pipeline.next_frame();
                        let end = outcome == FrameOutcome::EndOfStream;
                        log.outcomes.lock().unwrap().push(outcome);
                        if end {
                            break;
                        }
                    }
                    let _ = tx.send(PlaybackEnd::Finished);
                });
            }
            PlayMode::Hold => self.held = Some((pipeline, tx)),
        }

        Ok(rx)
    }

    async fn stop(&mut self) {
        self.log.stops.fetch_add(1, Ordering::SeqCst);
        self.held = None;
    }

    async fn disconnect(self) -> Result<(), BridgeError> {
        self.log.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        !self.log.platform_closed.load(Ordering::SeqCst)
    }
}

pub fn settings(pipe: &PipeFixture) -> SupervisorSettings {
    SupervisorSettings {
        channel_id: CHANNEL_ID,
        pipe_path: pipe.path.clone(),
        gain: GainStage::default(),
        timings: SupervisorTimings::default(),
    }
}

/// Codec factory that always fails, as when libopus refuses to start.
pub fn failing_codec_factory() -> CodecFactory {
    Arc::new(|| Err(EncodeError::Codec("encoder unavailable".to_string())))
}

pub fn make_supervisor(
    pipe: &PipeFixture,
    connector: FakeConnector,
    directory: SharedDirectory,
) -> SessionSupervisor<FakeConnector, SharedDirectory> {
    SessionSupervisor::new(connector, directory, fake_codec_factory(), settings(pipe))
}
