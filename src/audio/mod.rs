//! Audio capture, playback, and ring buffer.
//!
//! [`device::AudioDevice`] is the single owner of the input and output
//! streams; every other component reaches the microphone and speaker
//! through it rather than touching `cpal`/`rodio` directly.

pub mod capture;
pub mod device;
pub mod playback;
pub mod ring_buffer;

pub use device::AudioDevice;
pub use ring_buffer::{audio_ring_buffer, AudioConsumer};
