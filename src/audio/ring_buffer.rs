//! Lock-free SPSC ring buffer carrying mic audio from the cpal callback
//! thread to [`super::device::AudioDevice::next_frame`].
//!
//! Sized in [`FRAME_SAMPLES`](super::device::FRAME_SAMPLES) units rather
//! than a flat sample count: the capacity only needs to outlast the
//! longest stretch the consumer side goes without polling, which in this
//! pipeline is the wake-word detector's candidate-utterance buffering
//! window (see `wake_word::VadSttDetector`), not an arbitrary duration.

use ringbuf::{
    traits::{Consumer, Observer, Producer, Split},
    HeapRb,
};

use super::device::FRAME_SAMPLES;

/// Frames of slack kept between producer and consumer — comfortably more
/// than the ~200-frame (12.8s) candidate buffer a wake-word detector may
/// accumulate before transcribing it, so a slow consumer poll never drops
/// audio the detector is still deciding about.
const CAPACITY_FRAMES: usize = 256;
const DEFAULT_CAPACITY: usize = FRAME_SAMPLES * CAPACITY_FRAMES;

/// Producer half — lives in the cpal audio callback thread.
pub struct AudioProducer {
    inner: ringbuf::HeapProd<f32>,
}

/// Consumer half — lives in the audio processing thread.
pub struct AudioConsumer {
    inner: ringbuf::HeapCons<f32>,
}

/// Create a matched producer/consumer pair backed by a lock-free ring buffer.
pub fn audio_ring_buffer(capacity: Option<usize>) -> (AudioProducer, AudioConsumer) {
    let cap = capacity.unwrap_or(DEFAULT_CAPACITY);
    let rb = HeapRb::<f32>::new(cap);
    let (prod, cons) = rb.split();
    (AudioProducer { inner: prod }, AudioConsumer { inner: cons })
}

impl AudioProducer {
    /// Push a slice of samples into the ring buffer.
    /// Returns the number of samples actually written (may be less than
    /// `samples.len()` if the buffer is full).
    pub fn push_slice(&mut self, samples: &[f32]) -> usize {
        self.inner.push_slice(samples)
    }

    /// Push one [`FRAME_SAMPLES`]-sized chunk, as produced by
    /// `capture::start_capture`'s resample/accumulate loop. Same write
    /// semantics as [`push_slice`](Self::push_slice); the size assertion
    /// only documents the caller's contract, it isn't enforced at runtime
    /// since a capture device resizing mid-stream shouldn't panic audio I/O.
    pub fn push_frame(&mut self, frame: &[f32]) -> usize {
        debug_assert_eq!(frame.len(), FRAME_SAMPLES, "capture chunk size drifted from FRAME_SAMPLES");
        self.push_slice(frame)
    }
}

// Safety: the ringbuf producer is designed to be used from a single thread.
// cpal callbacks run on a dedicated audio thread, so this is fine.
unsafe impl Send for AudioProducer {}

impl AudioConsumer {
    /// Pop up to `buf.len()` samples from the ring buffer into `buf`.
    /// Returns the number of samples actually read.
    pub fn pop_slice(&mut self, buf: &mut [f32]) -> usize {
        self.inner.pop_slice(buf)
    }

    /// Number of samples currently available for reading.
    pub fn available(&self) -> usize {
        self.inner.occupied_len()
    }

    /// True once a full [`FRAME_SAMPLES`] chunk is ready — the condition
    /// `AudioDevice::next_frame`'s poll loop waits on.
    pub fn has_frame(&self) -> bool {
        self.available() >= FRAME_SAMPLES
    }

    /// Drain all available samples into a Vec.
    pub fn drain_all(&mut self) -> Vec<f32> {
        let n = self.available();
        if n == 0 {
            return Vec::new();
        }
        let mut buf = vec![0.0f32; n];
        let read = self.pop_slice(&mut buf);
        buf.truncate(read);
        buf
    }
}

unsafe impl Send for AudioConsumer {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_frame_flips_once_a_full_frame_is_buffered() {
        let (mut prod, cons) = audio_ring_buffer(None);
        assert!(!cons.has_frame());
        prod.push_frame(&vec![0.0f32; FRAME_SAMPLES]);
        assert!(cons.has_frame());
    }
}
