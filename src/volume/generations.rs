//! Double-buffered SH9 coefficient voxels

use std::sync::atomic::{AtomicI32, Ordering};

use crate::math::sh::SH9_SCALARS;

/// Which of the two slots holds the current generation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Generation {
    A,
    B,
}

impl Generation {
    fn other(self) -> Self {
        match self {
            Generation::A => Generation::B,
            Generation::B => Generation::A,
        }
    }
}

/// Two fixed-point coefficient buffers, one 27-scalar slot per probe.
///
/// `current` is written during the frame; `previous` holds last frame's
/// result and is only read. Swapping flips the roles without copying.
#[derive(Debug)]
pub struct CoefficientGenerations {
    slot_a: Box<[AtomicI32]>,
    slot_b: Box<[AtomicI32]>,
    current: Generation,
}

fn zeroed(len: usize) -> Box<[AtomicI32]> {
    (0..len).map(|_| AtomicI32::new(0)).collect()
}

impl CoefficientGenerations {
    /// Both generations zeroed, sized for `probe_count` probes
    pub fn new(probe_count: usize) -> Self {
        let len = probe_count * SH9_SCALARS;
        Self {
            slot_a: zeroed(len),
            slot_b: zeroed(len),
            current: Generation::A,
        }
    }

    /// Scalars per generation
    pub fn len(&self) -> usize {
        self.slot_a.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slot_a.is_empty()
    }

    pub fn current_generation(&self) -> Generation {
        self.current
    }

    pub fn current(&self) -> &[AtomicI32] {
        match self.current {
            Generation::A => &self.slot_a,
            Generation::B => &self.slot_b,
        }
    }

    pub fn previous(&self) -> &[AtomicI32] {
        match self.current {
            Generation::A => &self.slot_b,
            Generation::B => &self.slot_a,
        }
    }

    /// Exchange the roles of current and previous
    pub fn swap(&mut self) {
        self.current = self.current.other();
    }

    /// Zero-fill the current generation
    pub fn clear_current(&mut self) {
        for c in self.current() {
            c.store(0, Ordering::Relaxed);
        }
    }

    /// Snapshot of the current generation
    pub fn current_fixed(&self) -> Vec<i32> {
        self.current().iter().map(|c| c.load(Ordering::Relaxed)).collect()
    }
}
