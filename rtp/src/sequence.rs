use std::fmt;
use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};
use std::sync::Arc;

// Sequencer generates sequential sequence numbers for building RTP packets.
pub trait Sequencer: fmt::Debug {
    fn next_sequence_number(&self) -> u16;
    fn roll_over_count(&self) -> u64;
    fn clone_to(&self) -> Box<dyn Sequencer + Send + Sync>;
}

impl Clone for Box<dyn Sequencer + Send + Sync> {
    fn clone(&self) -> Box<dyn Sequencer + Send + Sync> {
        self.clone_to()
    }
}

// new_random_sequencer returns a sequencer starting at a random number.
pub fn new_random_sequencer() -> impl Sequencer {
    SequencerImpl(Arc::new(Counters {
        sequence_number: AtomicU16::new(rand::random::<u16>()),
        roll_over_count: AtomicU64::new(0),
    }))
}

// new_fixed_sequencer returns a sequencer starting at a given number.
pub fn new_fixed_sequencer(s: u16) -> impl Sequencer {
    SequencerImpl(Arc::new(Counters {
        sequence_number: AtomicU16::new(s.wrapping_sub(1)),
        roll_over_count: AtomicU64::new(0),
    }))
}

#[derive(Debug, Clone)]
struct SequencerImpl(Arc<Counters>);

#[derive(Debug)]
struct Counters {
    sequence_number: AtomicU16,
    roll_over_count: AtomicU64,
}

impl Sequencer for SequencerImpl {
    fn next_sequence_number(&self) -> u16 {
        let next = self.0.sequence_number.fetch_add(1, Ordering::SeqCst).wrapping_add(1);
        if next == 0 {
            self.0.roll_over_count.fetch_add(1, Ordering::SeqCst);
        }
        next
    }

    fn roll_over_count(&self) -> u64 {
        self.0.roll_over_count.load(Ordering::SeqCst)
    }

    fn clone_to(&self) -> Box<dyn Sequencer + Send + Sync> {
        Box::new(self.clone())
    }
}
