//! Energy-based voice activity detection.
//!
//! This is the crate's only VAD — there is no neural model binding, so
//! every gate that needs "is someone talking right now" (wake-word
//! buffering, barge-in detection) goes through [`is_speech`]. Mean absolute
//! amplitude is a crude but cheap-enough metric for a continuously
//! running microphone loop.

/// Mean absolute amplitude of a chunk of f32 samples in `[-1.0, 1.0]`.
pub fn detect(chunk: &[f32]) -> f32 {
    if chunk.is_empty() {
        return 0.0;
    }
    let sum: f32 = chunk.iter().map(|s| s.abs()).sum();
    sum / chunk.len() as f32
}

/// True if `chunk`'s energy meets or exceeds `threshold`. The one predicate
/// every VAD call site in this crate (`wake_word::VadSttDetector`,
/// `speech_agent::HumanSpeechAgent::start_speech_interrupt_watcher`) should
/// use instead of comparing [`detect`]'s output directly, so the "what
/// counts as speech" decision lives in one place.
pub fn is_speech(chunk: &[f32], threshold: f32) -> bool {
    detect(chunk) >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_is_not_speech() {
        assert!(!is_speech(&[0.0, 0.0, 0.0, 0.0], 0.02));
    }

    #[test]
    fn loud_chunk_is_speech() {
        let chunk = [0.5f32, -0.4, 0.6, -0.5];
        assert!(is_speech(&chunk, 0.02));
    }
}
