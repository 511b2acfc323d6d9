//! Lock-free SPSC ring buffer between the capture callback and the analysis pass.
//!
//! Uses `ringbuf::HeapRb<f32>` which provides a wait-free `push_slice`
//! safe to call from the real-time audio callback.

pub mod block;

use ringbuf::{traits::Split, HeapRb};

pub use ringbuf::traits::{Consumer, Observer, Producer};

/// Producer half, held by the audio callback thread.
pub type SampleProducer = ringbuf::HeapProd<f32>;

/// Consumer half, held by whichever thread runs the analysis pass.
pub type SampleConsumer = ringbuf::HeapCons<f32>;

/// Blocks of headroom kept in the ring on top of one analysis block.
///
/// The callback keeps writing for the short window between `start_capture`
/// and the first `pop_slice`, so one block alone is not enough.
const RING_HEADROOM_BLOCKS: usize = 8;

/// Ring capacity for a given analysis block size (at the device rate).
pub fn ring_capacity(block_size: usize) -> usize {
    block_size.max(1) * RING_HEADROOM_BLOCKS
}

/// Create a matched producer/consumer pair backed by a heap-allocated ring buffer.
pub fn create_sample_ring(capacity: usize) -> (SampleProducer, SampleConsumer) {
    HeapRb::<f32>::new(capacity.max(1)).split()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_passes_samples_in_order() {
        let (mut prod, mut cons) = create_sample_ring(16);
        assert_eq!(prod.push_slice(&[0.1, 0.2, 0.3]), 3);

        let mut out = [0.0f32; 4];
        let n = cons.pop_slice(&mut out);
        assert_eq!(n, 3);
        assert_eq!(&out[..3], &[0.1, 0.2, 0.3]);
    }

    #[test]
    fn full_ring_drops_excess() {
        let (mut prod, _cons) = create_sample_ring(4);
        assert_eq!(prod.push_slice(&[0.0; 6]), 4);
    }

    #[test]
    fn capacity_scales_with_block_size() {
        assert_eq!(ring_capacity(1024), 8 * 1024);
        assert_eq!(ring_capacity(0), RING_HEADROOM_BLOCKS);
    }
}
