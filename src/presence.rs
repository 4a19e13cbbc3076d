//! Counting the humans in the target voice channel.

/// Kind of a resolved channel, reduced to what the gate cares about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelKind {
    Voice,
    Other,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Occupant {
    pub name: String,
    /// Set for bots and other automated accounts
    pub bot: bool,
}

/// A point-in-time view of a channel and who is in it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelSnapshot {
    pub name: String,
    pub kind: ChannelKind,
    pub occupants: Vec<Occupant>,
}

/// Read-only access to the chat platform's channel state.
pub trait ChannelDirectory: Send + Sync {
    fn channel(&self, channel_id: u64) -> Option<ChannelSnapshot>;
}

pub struct PresenceGate<D> {
    directory: D,
}

impl<D: ChannelDirectory> PresenceGate<D> {
    pub fn new(directory: D) -> Self {
        Self { directory }
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    /// Number of non-bot occupants, or 0 when the channel is unknown or not a voice channel.
    pub fn human_count(&self, channel_id: u64) -> usize {
        match self.directory.channel(channel_id) {
            Some(channel) if channel.kind == ChannelKind::Voice => {
                channel.occupants.iter().filter(|o| !o.bot).count()
            }
            _ => 0,
        }
    }
}
