//! Stack of contexts suspended on a switch, top is the active context.

use parking_lot::Mutex;
use xdomain_common::{ContextId, DriverError, Result};

/// Each push gets a serial so an abandoned frame can never pop a newer
/// frame for the same context.
#[derive(Debug, Default)]
pub(crate) struct ContextStack {
    frames: Vec<(ContextId, u64)>,
    next_serial: u64,
}

impl ContextStack {
    pub(crate) fn push(&mut self, id: ContextId) -> Result<u64> {
        if self.frames.iter().any(|(frame, _)| frame == &id) {
            return Err(DriverError::InvalidContext(format!(
                "{id} is already on the context stack"
            )));
        }
        self.next_serial += 1;
        self.frames.push((id, self.next_serial));
        Ok(self.next_serial)
    }

    /// Pop `id` and anything stacked above it.
    pub(crate) fn pop(&mut self, id: &ContextId) -> bool {
        self.truncate_at(self.frames.iter().rposition(|(frame, _)| frame == id))
    }

    /// Pop the frame pushed as `serial` and anything stacked above it. A
    /// frame that is already gone leaves the stack alone.
    pub(crate) fn pop_frame(&mut self, serial: u64) -> bool {
        self.truncate_at(self.frames.iter().rposition(|(_, s)| *s == serial))
    }

    fn truncate_at(&mut self, pos: Option<usize>) -> bool {
        match pos {
            Some(pos) => {
                self.frames.truncate(pos);
                true
            }
            None => false,
        }
    }

    /// Contexts stacked above `id`, outermost first.
    pub(crate) fn above(&self, id: &ContextId) -> Vec<ContextId> {
        match self.frames.iter().position(|(frame, _)| frame == id) {
            Some(pos) => self.frames[pos + 1..]
                .iter()
                .map(|(frame, _)| frame.clone())
                .collect(),
            None => Vec::new(),
        }
    }

    pub(crate) fn active(&self) -> Option<&ContextId> {
        self.frames.last().map(|(frame, _)| frame)
    }

    pub(crate) fn depth(&self) -> usize {
        self.frames.len()
    }
}

/// A frame pushed for the duration of one switch. Dropping it pops the
/// frame, whether the switch settled, failed or was abandoned.
pub(crate) struct ActiveFrame<'a> {
    stack: &'a Mutex<ContextStack>,
    serial: u64,
}

impl<'a> ActiveFrame<'a> {
    /// Push `id` on top of `caller`, which must be the active context.
    pub(crate) fn enter(
        stack: &'a Mutex<ContextStack>,
        caller: &ContextId,
        id: ContextId,
    ) -> Result<Self> {
        let mut frames = stack.lock();
        if frames.active() != Some(caller) {
            return Err(DriverError::InvalidContext(format!(
                "{caller} is not the active context"
            )));
        }
        let serial = frames.push(id)?;
        Ok(Self { stack, serial })
    }
}

impl Drop for ActiveFrame<'_> {
    fn drop(&mut self) {
        self.stack.lock().pop_frame(self.serial);
    }
}
