pub mod download;
pub mod fetch;

use crate::errors::{DownloaderError, Result};
use std::sync::atomic::{AtomicBool, Ordering};

/// One-at-a-time guard for a background task type. The GUI this replaces
/// disabled the triggering button while its task ran; without that gate the
/// slot enforces the same "at most one fetch, at most one download" rule.
pub struct TaskSlot {
    name: &'static str,
    busy: AtomicBool,
}

pub static FETCH_SLOT: TaskSlot = TaskSlot::new("playlist fetch");
pub static DOWNLOAD_SLOT: TaskSlot = TaskSlot::new("download");

impl TaskSlot {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            busy: AtomicBool::new(false),
        }
    }

    /// Claim the slot, failing with `Busy` if a task of this type is
    /// already running. The permit releases the slot on drop.
    pub fn try_acquire(&self) -> Result<TaskPermit<'_>> {
        if self.busy.swap(true, Ordering::AcqRel) {
            return Err(DownloaderError::Busy(self.name));
        }
        Ok(TaskPermit { slot: self })
    }
}

pub struct TaskPermit<'a> {
    slot: &'a TaskSlot,
}

impl Drop for TaskPermit<'_> {
    fn drop(&mut self) {
        self.slot.busy.store(false, Ordering::Release);
    }
}
