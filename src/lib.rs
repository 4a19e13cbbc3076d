//! airplay-voice-bridge library crate
//!
//! Streams the raw PCM an AirPlay receiver writes into a named pipe to a
//! Discord voice channel while humans are present. The binary is in main.rs.

#[macro_use]
extern crate log;

pub mod config;
pub mod constants;
pub mod dca;
pub mod encoder;
pub mod error;
pub mod gain;
pub mod pcm;
pub mod pipe;
pub mod pipeline;
pub mod presence;
pub mod resampler;
pub mod supervisor;
pub mod voice;

#[cfg(feature = "discord")]
pub mod discord;
#[cfg(feature = "discord")]
pub mod opus;
