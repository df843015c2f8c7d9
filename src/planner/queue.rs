//! Planner queue: an indexed ring buffer, spec.md §4.2 / §9.
//!
//! Grounded on `original_source/g2core/planner.h`'s `mpBuffer` ring, with
//! `pv`/`nx` linked-list pointers replaced by `read`/`write` indices modulo
//! `N`, per spec.md §9's redesign note.

use crate::constants::PLANNER_BUFFER_HEADROOM;
use crate::error::{CoreError, StatusCode};

use super::block::{Block, BlockType, BufferState};

/// A fixed-size ring of `N` blocks. `N = 48` for the primary queue, `N = 12`
/// for the secondary (spec.md §3).
pub struct PlannerQueue<const N: usize> {
    blocks: Vec<Block>,
    /// Index of the next buffer the writer will fill.
    write: usize,
    /// Index of the buffer the executor is currently draining.
    run: usize,
    /// Count of EMPTY buffers.
    available: usize,
}

impl<const N: usize> PlannerQueue<N> {
    pub fn new() -> Self {
        let mut blocks = Vec::with_capacity(N);
        for i in 0..N {
            let mut b = Block::default();
            b.buffer_number = i;
            blocks.push(b);
        }
        Self { blocks, write: 0, run: 0, available: N }
    }

    pub fn capacity(&self) -> usize {
        N
    }

    pub fn available(&self) -> usize {
        self.available
    }

    pub fn is_full(&self) -> bool {
        self.available < PLANNER_BUFFER_HEADROOM
    }

    fn advance(index: usize) -> usize {
        (index + 1) % N
    }

    /// Returns the next EMPTY buffer, transitioned to INITIALIZING, or
    /// `QueueFull` when fewer than the headroom are available.
    pub fn get_write_buffer(&mut self) -> Result<&mut Block, CoreError> {
        if self.is_full() {
            return Err(CoreError::QueueFull(StatusCode::QueueFull));
        }
        debug_assert_eq!(self.blocks[self.write].buffer_state, BufferState::Empty);
        let idx = self.write;
        self.blocks[idx].reset(idx);
        self.blocks[idx].buffer_state = BufferState::Initializing;
        Ok(&mut self.blocks[idx])
    }

    /// Advances the write buffer to NOT_PLANNED (or straight through for
    /// non-move command types, which have nothing for the backward planner
    /// to do) and moves the write cursor forward.
    pub fn commit_write_buffer(&mut self, block_type: BlockType) {
        let idx = self.write;
        self.blocks[idx].block_type = block_type;
        self.blocks[idx].buffer_state = BufferState::NotPlanned;
        self.write = Self::advance(self.write);
        self.available -= 1;
    }

    /// Returns the current run buffer, marking it RUNNING on first access.
    pub fn get_run_buffer(&mut self) -> Option<&mut Block> {
        let idx = self.run;
        let block = &mut self.blocks[idx];
        if block.buffer_state == BufferState::Empty {
            return None;
        }
        if block.buffer_state == BufferState::FullyPlanned {
            block.buffer_state = BufferState::Running;
            block.run_state = super::block::BlockRunState::Initial;
        }
        if block.buffer_state != BufferState::Running {
            return None;
        }
        Some(&mut self.blocks[idx])
    }

    /// Frees the run buffer back to EMPTY and advances the run pointer.
    /// Returns true if the next buffer is also ready to run.
    pub fn free_run_buffer(&mut self) -> bool {
        let idx = self.run;
        self.blocks[idx].reset(idx);
        self.run = Self::advance(self.run);
        self.available += 1;
        matches!(self.blocks[self.run].buffer_state, BufferState::FullyPlanned)
    }

    pub fn block_at(&self, index: usize) -> &Block {
        &self.blocks[index]
    }

    pub fn block_at_mut(&mut self, index: usize) -> &mut Block {
        &mut self.blocks[index]
    }

    pub fn run_index(&self) -> usize {
        self.run
    }

    pub fn write_index(&self) -> usize {
        self.write
    }

    pub fn prev_index(index: usize) -> usize {
        (index + N - 1) % N
    }

    pub fn next_index(index: usize) -> usize {
        Self::advance(index)
    }

    /// Iterates block indices from the newest committed one back to (and
    /// including) the run buffer, the order the backward planner sweeps in.
    pub fn sweep_indices_back_from_newest(&self) -> Vec<usize> {
        let mut out = Vec::new();
        if self.write == self.run && self.available == N {
            return out;
        }
        let mut idx = Self::prev_index(self.write);
        loop {
            out.push(idx);
            if idx == self.run {
                break;
            }
            idx = Self::prev_index(idx);
        }
        out
    }

    /// Discards every NOT_PLANNED/BACK_PLANNED/FULLY_PLANNED block (a queue
    /// flush, spec.md §4.8), leaving the actively-decelerating run buffer
    /// intact if it is mid-tail.
    pub fn flush(&mut self, keep_running: bool) {
        let mut idx = self.run;
        if keep_running && self.blocks[idx].buffer_state == BufferState::Running {
            idx = Self::advance(idx);
        }
        while idx != self.write {
            self.blocks[idx].reset(idx);
            self.available += 1;
            idx = Self::advance(idx);
        }
        self.write = idx;
    }
}

impl<const N: usize> Default for PlannerQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_queue_is_all_empty() {
        let q: PlannerQueue<8> = PlannerQueue::new();
        assert_eq!(q.available(), 8);
        assert!(!q.is_full());
    }

    #[test]
    fn commit_advances_write_and_decrements_available() {
        let mut q: PlannerQueue<8> = PlannerQueue::new();
        {
            let b = q.get_write_buffer().unwrap();
            b.length = 10.0;
        }
        q.commit_write_buffer(BlockType::Aline);
        assert_eq!(q.available(), 7);
        assert_eq!(q.block_at(0).buffer_state, BufferState::NotPlanned);
    }

    #[test]
    fn queue_full_when_below_headroom() {
        let mut q: PlannerQueue<8> = PlannerQueue::new();
        for _ in 0..(8 - PLANNER_BUFFER_HEADROOM) {
            q.get_write_buffer().unwrap();
            q.commit_write_buffer(BlockType::Aline);
        }
        assert!(q.is_full());
        assert!(q.get_write_buffer().is_err());
    }

    #[test]
    fn free_run_buffer_wraps() {
        let mut q: PlannerQueue<4> = PlannerQueue::new();
        q.get_write_buffer().unwrap();
        q.commit_write_buffer(BlockType::Aline);
        q.block_at_mut(0).buffer_state = BufferState::FullyPlanned;
        q.get_run_buffer().unwrap();
        assert_eq!(q.block_at(0).buffer_state, BufferState::Running);
        q.free_run_buffer();
        assert_eq!(q.run_index(), 1);
        assert_eq!(q.available(), 4);
    }
}
