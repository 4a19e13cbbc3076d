//! Discord integration: channel presence from the serenity cache and voice
//! playback through songbird.
//!
//! The supervisor only sees the [`ChannelDirectory`], [`VoiceConnector`] and
//! [`VoiceSession`] traits; this module provides the real implementations and
//! starts the gateway client.

use crate::{
    config::Config,
    dca::DcaStream,
    encoder::Codec,
    error::BridgeError,
    opus::OpusCodec,
    pipeline::AudioPipeline,
    presence::{ChannelDirectory, ChannelKind, ChannelSnapshot, Occupant},
    supervisor::{CodecFactory, SessionSupervisor, SupervisorSettings},
    voice::{PlaybackDone, PlaybackEnd, VoiceConnector, VoiceSession},
};
use anyhow::Result;
use async_trait::async_trait;
use serenity::all::{
    Cache, ChannelId, ChannelType, Client, Context, EventHandler, GatewayIntents, GuildChannel,
    GuildId, Ready,
};
use songbird::{
    input::{AudioStream, Input, LiveInput},
    tracks::{PlayMode, Track, TrackHandle},
    Call, Event as VoiceEvent, EventContext, EventHandler as VoiceEventHandler, SerenityInit,
    Songbird, TrackEvent,
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex as StdMutex,
};
use symphonia::core::{io::MediaSource, probe::Hint};
use tokio::sync::{oneshot, Mutex};

// ============================================================================
// Presence
// ============================================================================

/// Discord ids are never 0, and serenity panics when asked to build one.
fn to_channel_id(id: u64) -> Option<ChannelId> {
    (id != 0).then(|| ChannelId::new(id))
}

/// Channel lookups against serenity's in-memory cache.
pub struct CacheDirectory {
    cache: Arc<Cache>,
}

impl CacheDirectory {
    pub fn new(cache: Arc<Cache>) -> Self {
        Self { cache }
    }
}

impl ChannelDirectory for CacheDirectory {
    fn channel(&self, channel_id: u64) -> Option<ChannelSnapshot> {
        // Clone out of the cache so no cache lock is held while listing members
        let channel = {
            let cached = self.cache.channel(to_channel_id(channel_id)?)?;
            GuildChannel::clone(&cached)
        };

        if channel.kind != ChannelType::Voice {
            return Some(ChannelSnapshot {
                name: channel.name,
                kind: ChannelKind::Other,
                occupants: vec![],
            });
        }

        let occupants = match channel.members(self.cache.clone()) {
            Ok(members) => members
                .iter()
                .map(|m| Occupant {
                    name: m.display_name().to_string(),
                    bot: m.user.bot,
                })
                .collect(),
            Err(e) => {
                warn!("Could not list members of {}: {e}", channel.name);
                vec![]
            }
        };

        Some(ChannelSnapshot {
            name: channel.name,
            kind: ChannelKind::Voice,
            occupants,
        })
    }
}

// ============================================================================
// Voice
// ============================================================================

/// Create a songbird Input that carries pre-encoded Opus in DCA framing.
fn create_voice_input(pipeline: AudioPipeline, bitrate: i32) -> Input {
    let stream = DcaStream::with_bitrate(pipeline, bitrate);

    let mut hint = Hint::new();
    hint.with_extension("dca");

    Input::Live(
        LiveInput::Raw(AudioStream {
            input: Box::new(stream) as Box<dyn MediaSource>,
            hint: Some(hint),
        }),
        None,
    )
}

pub struct SongbirdConnector {
    manager: Arc<Songbird>,
    cache: Arc<Cache>,
    bitrate: i32,
}

impl SongbirdConnector {
    pub fn new(manager: Arc<Songbird>, cache: Arc<Cache>, bitrate: i32) -> Self {
        Self {
            manager,
            cache,
            bitrate,
        }
    }
}

#[async_trait]
impl VoiceConnector for SongbirdConnector {
    type Session = SongbirdSession;

    async fn connect(&self, channel_id: u64) -> Result<SongbirdSession, BridgeError> {
        let channel_id = to_channel_id(channel_id)
            .ok_or_else(|| BridgeError::Connection("voice channel id is unset".into()))?;
        let guild_id = self
            .cache
            .channel(channel_id)
            .map(|c| c.guild_id)
            .ok_or_else(|| {
                BridgeError::Connection(format!("channel {channel_id} is not in a cached guild"))
            })?;

        let call = self
            .manager
            .join(guild_id, channel_id)
            .await
            .map_err(|e| BridgeError::Connection(format!("failed to join {channel_id}: {e}")))?;

        // Deafened: the bot only speaks, it never needs to hear the channel
        call.lock()
            .await
            .deafen(true)
            .await
            .map_err(|e| BridgeError::Connection(format!("failed to deafen: {e}")))?;

        Ok(SongbirdSession {
            manager: self.manager.clone(),
            guild_id,
            call,
            track: None,
            bitrate: self.bitrate,
        })
    }
}

pub struct SongbirdSession {
    manager: Arc<Songbird>,
    guild_id: GuildId,
    call: Arc<Mutex<Call>>,
    track: Option<TrackHandle>,
    bitrate: i32,
}

/// Forwards the first track end or error into the supervisor's completion receiver.
#[derive(Clone)]
struct PlaybackNotifier {
    tx: Arc<StdMutex<Option<oneshot::Sender<PlaybackEnd>>>>,
}

#[async_trait]
impl VoiceEventHandler for PlaybackNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<VoiceEvent> {
        let mut end = PlaybackEnd::Finished;
        if let EventContext::Track(tracks) = ctx {
            for (state, _handle) in tracks.iter() {
                if let PlayMode::Errored(e) = &state.playing {
                    end = PlaybackEnd::Errored(format!("{e:?}"));
                }
            }
        }

        let tx = self.tx.lock().ok().and_then(|mut tx| tx.take());
        if let Some(tx) = tx {
            // Receiver is gone when the supervisor already tore the session down
            let _ = tx.send(end);
        }

        None
    }
}

#[async_trait]
impl VoiceSession for SongbirdSession {
    async fn play(&mut self, pipeline: AudioPipeline) -> Result<PlaybackDone, BridgeError> {
        let (tx, rx) = oneshot::channel();
        let notifier = PlaybackNotifier {
            tx: Arc::new(StdMutex::new(Some(tx))),
        };

        let input = create_voice_input(pipeline, self.bitrate);
        let handle = self.call.lock().await.play_only(Track::new(input));

        for event in [TrackEvent::End, TrackEvent::Error] {
            handle
                .add_event(VoiceEvent::Track(event), notifier.clone())
                .map_err(|e| BridgeError::Connection(format!("failed to watch track: {e}")))?;
        }

        self.track = Some(handle);
        Ok(rx)
    }

    async fn stop(&mut self) {
        if let Some(track) = self.track.take() {
            if let Err(e) = track.stop() {
                debug!("Track already stopped: {e}");
            }
        }
        self.call.lock().await.stop();
    }

    async fn disconnect(self) -> Result<(), BridgeError> {
        self.manager
            .leave(self.guild_id)
            .await
            .map_err(|e| BridgeError::Connection(format!("failed to leave: {e}")))
    }

    fn is_connected(&self) -> bool {
        match self.call.try_lock() {
            Ok(call) => call.current_connection().is_some(),
            // Someone is using the call right now, so it is still alive
            Err(_) => true,
        }
    }
}

// ============================================================================
// Gateway client
// ============================================================================

fn opus_codec_factory(bitrate: i32) -> CodecFactory {
    Arc::new(move || Ok(Box::new(OpusCodec::new(bitrate)?) as Box<dyn Codec>))
}

struct Handler {
    config: Config,
    supervisor_started: AtomicBool,
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("Logged in as {}", ready.user.name);

        // Ready fires again after gateway reconnects, only one supervisor may run
        if self.supervisor_started.swap(true, Ordering::SeqCst) {
            return;
        }

        let Some(manager) = songbird::get(&ctx).await else {
            error!("Songbird voice client was not registered");
            return;
        };

        let bitrate = self.config.opus_bitrate;
        let connector = SongbirdConnector::new(manager, ctx.cache.clone(), bitrate);
        let directory = CacheDirectory::new(ctx.cache.clone());
        let supervisor = SessionSupervisor::new(
            connector,
            directory,
            opus_codec_factory(bitrate),
            SupervisorSettings::from(&self.config),
        );

        info!("Starting AirPlay supervisor");
        tokio::spawn(supervisor.run());
    }
}

/// Initialize the Discord bot
pub async fn init(config: &Config) -> Result<()> {
    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;

    let handler = Handler {
        config: config.clone(),
        supervisor_started: AtomicBool::new(false),
    };

    let client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird()
        .await?;

    // Spawn the Discord client in a separate task
    tokio::spawn(async move {
        let mut client = client;
        if let Err(e) = client.start().await {
            error!("Discord client error: {:?}", e);
        }
    });

    Ok(())
}
