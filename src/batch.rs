//! Batch accumulation and the consumer continue/stop protocol.
//!
//! The coordinator bounds memory by flushing a [`BatchEnvelope`] to the
//! consumer whenever the combined valid + invalid count reaches the batch
//! limit, then clearing its buffers regardless of the consumer's answer.
//! The consumer's boolean return is the only cancellation mechanism: false
//! stops the run at the next flush boundary.

use tracing::debug;

use crate::constants::DEFAULT_BATCH_LIMIT;
use crate::models::{BatchEnvelope, RowDescriptor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Accumulating,
    Stopped,
}

/// Accumulates mapped records and drives the pagination protocol.
pub struct BatchCoordinator<T, F>
where
    F: FnMut(BatchEnvelope<T>) -> bool,
{
    batch_limit: usize,
    valid: Vec<T>,
    invalid: Vec<RowDescriptor>,
    on_batch: F,
    total: u64,
    state: State,
}

impl<T, F> BatchCoordinator<T, F>
where
    F: FnMut(BatchEnvelope<T>) -> bool,
{
    /// Create a coordinator with the given combined batch limit.
    ///
    /// A zero limit can never flush, so it is replaced with the default.
    pub fn new(batch_limit: usize, on_batch: F) -> Self {
        let batch_limit = if batch_limit == 0 {
            DEFAULT_BATCH_LIMIT
        } else {
            batch_limit
        };
        Self {
            batch_limit,
            valid: Vec::new(),
            invalid: Vec::new(),
            on_batch,
            total: 0,
            state: State::Accumulating,
        }
    }

    /// Add a valid record. Returns the continue signal: false once the
    /// consumer has stopped the run.
    pub fn push_valid(&mut self, record: T) -> bool {
        if self.state == State::Stopped {
            return false;
        }
        self.valid.push(record);
        self.total += 1;
        self.flush_if_full()
    }

    /// Add an invalid row descriptor. Returns the continue signal.
    pub fn push_invalid(&mut self, row: RowDescriptor) -> bool {
        if self.state == State::Stopped {
            return false;
        }
        self.invalid.push(row);
        self.total += 1;
        self.flush_if_full()
    }

    /// Deliver the trailing partial batch, if any records are pending.
    ///
    /// The consumer is invoked at least once per run if and only if at
    /// least one record (valid or invalid) was produced.
    pub fn finish(&mut self) {
        if self.state == State::Stopped {
            return;
        }
        if !self.valid.is_empty() || !self.invalid.is_empty() {
            self.flush();
        }
    }

    /// Total records processed (valid + invalid) across the run.
    pub fn total_processed(&self) -> u64 {
        self.total
    }

    pub fn stopped(&self) -> bool {
        self.state == State::Stopped
    }

    fn flush_if_full(&mut self) -> bool {
        if self.valid.len() + self.invalid.len() < self.batch_limit {
            return true;
        }
        self.flush()
    }

    fn flush(&mut self) -> bool {
        let envelope = BatchEnvelope::new(
            std::mem::take(&mut self.valid),
            std::mem::take(&mut self.invalid),
        );
        debug!(
            valid = envelope.valid.len(),
            invalid = envelope.invalid.len(),
            "delivering batch"
        );
        let proceed = (self.on_batch)(envelope);
        if !proceed {
            self.state = State::Stopped;
        }
        proceed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawRecord;
    use std::cell::RefCell;

    fn descriptor(row: u64) -> RowDescriptor {
        RowDescriptor::new(row, RawRecord::new())
    }

    #[test]
    fn test_flush_at_limit_and_trailing_partial() {
        let sizes = RefCell::new(Vec::new());
        let mut coordinator = BatchCoordinator::new(4, |batch: BatchEnvelope<u32>| {
            sizes.borrow_mut().push(batch.len());
            true
        });

        for value in 0..9 {
            assert!(coordinator.push_valid(value));
        }
        coordinator.finish();

        assert_eq!(*sizes.borrow(), vec![4, 4, 1]);
        assert_eq!(coordinator.total_processed(), 9);
    }

    #[test]
    fn test_exact_multiple_has_no_empty_trailing_batch() {
        let count = RefCell::new(0usize);
        let mut coordinator = BatchCoordinator::new(3, |batch: BatchEnvelope<u32>| {
            assert_eq!(batch.len(), 3);
            *count.borrow_mut() += 1;
            true
        });

        for value in 0..6 {
            coordinator.push_valid(value);
        }
        coordinator.finish();

        assert_eq!(*count.borrow(), 2);
        assert_eq!(coordinator.total_processed(), 6);
    }

    #[test]
    fn test_zero_records_never_invokes_consumer() {
        let mut invoked = false;
        let mut coordinator = BatchCoordinator::new(10, |_batch: BatchEnvelope<u32>| {
            invoked = true;
            true
        });
        coordinator.finish();
        assert!(!coordinator.stopped());
        assert_eq!(coordinator.total_processed(), 0);
        drop(coordinator);
        assert!(!invoked);
    }

    #[test]
    fn test_stop_signal_halts_accumulation() {
        let batches = RefCell::new(0usize);
        let mut coordinator = BatchCoordinator::new(2, |_batch: BatchEnvelope<u32>| {
            *batches.borrow_mut() += 1;
            false
        });

        assert!(coordinator.push_valid(1));
        assert!(!coordinator.push_valid(2));
        assert!(!coordinator.push_valid(3));
        coordinator.finish();

        assert_eq!(*batches.borrow(), 1);
        assert_eq!(coordinator.total_processed(), 2);
        assert!(coordinator.stopped());
    }

    #[test]
    fn test_valid_and_invalid_share_the_limit() {
        let shapes = RefCell::new(Vec::new());
        let mut coordinator = BatchCoordinator::new(3, |batch: BatchEnvelope<u32>| {
            shapes
                .borrow_mut()
                .push((batch.valid.len(), batch.invalid.len()));
            true
        });

        coordinator.push_valid(1);
        coordinator.push_invalid(descriptor(2));
        coordinator.push_valid(3);
        coordinator.finish();

        assert_eq!(*shapes.borrow(), vec![(2, 1)]);
    }

    #[test]
    fn test_zero_limit_falls_back_to_default() {
        let coordinator = BatchCoordinator::new(0, |_batch: BatchEnvelope<u32>| true);
        assert_eq!(coordinator.batch_limit, DEFAULT_BATCH_LIMIT);
    }
}
