//! Voice activity detection.

pub mod energy;

/// Default energy threshold above which a chunk is considered speech.
/// Tuned for 16-bit PCM normalized to `[-1.0, 1.0]`; callers using a
/// different scale should renormalize before calling [`energy::is_speech`].
pub const DEFAULT_SPEECH_THRESHOLD: f32 = 0.02;
