//! SegmentBuffer - 当前打开的分段
//!
//! 只追加、有上限的有序样本序列。`drain()` 是唯一的读出方式，
//! 读出后缓冲清空，等待下一次 `open()`。

use std::mem;

use contracts::{ContractError, NavigationCommand, Sample};

/// Bounded, append-only buffer for the open segment
#[derive(Debug)]
pub struct SegmentBuffer {
    samples: Vec<Sample>,
    max_len: usize,
    command: Option<NavigationCommand>,
}

impl SegmentBuffer {
    pub fn new(max_len: usize) -> Self {
        let max_len = max_len.max(1);
        Self {
            samples: Vec::with_capacity(max_len),
            max_len,
            command: None,
        }
    }

    /// Open a segment for `command`.
    ///
    /// Any samples still held belong to the previous segment and are kept;
    /// callers drain before reopening.
    pub fn open(&mut self, command: NavigationCommand) {
        self.command = Some(command);
    }

    /// Command recorded when the segment was opened
    pub fn command(&self) -> Option<NavigationCommand> {
        self.command
    }

    /// Append one sample.
    ///
    /// # Errors
    /// `CapacityExceeded` once the buffer holds `max_len` samples.
    pub fn append(&mut self, sample: Sample) -> Result<(), ContractError> {
        if self.is_full() {
            return Err(ContractError::CapacityExceeded { max: self.max_len });
        }
        self.samples.push(sample);
        observability::record_buffer_fill(self.samples.len());
        Ok(())
    }

    /// Take every buffered sample in order and close the segment.
    pub fn drain(&mut self) -> Vec<Sample> {
        self.command = None;
        observability::record_buffer_fill(0);
        mem::replace(&mut self.samples, Vec::with_capacity(self.max_len))
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() >= self.max_len
    }

    pub fn capacity(&self) -> usize {
        self.max_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use contracts::{ControlVector, VehicleControl, IMAGE_BYTES};

    fn sample(tag: u8) -> Sample {
        let targets = ControlVector::new(VehicleControl::default(), 20.0, NavigationCommand::Follow);
        Sample::new(Bytes::from(vec![tag; IMAGE_BYTES]), targets).unwrap()
    }

    #[test]
    fn test_append_until_full() {
        let mut buffer = SegmentBuffer::new(3);
        buffer.open(NavigationCommand::Left);
        for i in 0..3 {
            buffer.append(sample(i)).unwrap();
        }
        assert!(buffer.is_full());
        let err = buffer.append(sample(9)).unwrap_err();
        assert!(matches!(err, ContractError::CapacityExceeded { max: 3 }));
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_drain_preserves_order_and_resets() {
        let mut buffer = SegmentBuffer::new(5);
        buffer.open(NavigationCommand::Right);
        for i in 0..4 {
            buffer.append(sample(i)).unwrap();
        }
        assert_eq!(buffer.command(), Some(NavigationCommand::Right));

        let drained = buffer.drain();
        let tags: Vec<u8> = drained.iter().map(|s| s.rgb()[0]).collect();
        assert_eq!(tags, vec![0, 1, 2, 3]);
        assert!(buffer.is_empty());
        assert_eq!(buffer.command(), None);
        assert!(buffer.drain().is_empty());
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let buffer = SegmentBuffer::new(0);
        assert_eq!(buffer.capacity(), 1);
    }
}
