//! Reserved slot storage and bounded stream views
//!
//! A container pre-allocates a fixed number of reserved slots for system
//! bookkeeping. A `ReservedStream` is a growable view over one slot, starting
//! at a byte offset; bytes before the offset are header space owned by the
//! slot and never touched through the view.
//!
//! # Invariants
//!
//! - At most one open view per slot
//! - Dropping the view releases the slot

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::errors::{ContainerError, ContainerResult};

/// Byte storage behind one reserved slot
#[derive(Debug)]
pub struct ReservedSlot {
    index: usize,
    bytes: RwLock<Vec<u8>>,
    claimed: AtomicBool,
}

impl ReservedSlot {
    pub(crate) fn new(index: usize) -> Self {
        Self {
            index,
            bytes: RwLock::new(Vec::new()),
            claimed: AtomicBool::new(false),
        }
    }

    /// Open the exclusive view over this slot at `offset`
    pub(crate) fn claim(self: &Arc<Self>, offset: u64) -> ContainerResult<ReservedStream> {
        if self
            .claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ContainerError::SlotInUse(self.index));
        }

        let stream = ReservedStream {
            slot: Arc::clone(self),
            offset,
        };

        // Reserve header space so the view always starts at `offset`
        {
            let mut bytes = stream.write_guard()?;
            if (bytes.len() as u64) < offset {
                bytes.resize(offset as usize, 0);
            }
        }

        Ok(stream)
    }

    /// Drop every byte held by the slot, header included
    pub(crate) fn wipe(&self) -> ContainerResult<()> {
        let mut bytes = self
            .bytes
            .write()
            .map_err(|_| ContainerError::Poisoned(self.index))?;
        bytes.clear();
        Ok(())
    }

    /// Returns whether a view currently holds this slot
    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::Acquire)
    }

    /// Total bytes in the slot, header included
    pub fn byte_len(&self) -> ContainerResult<u64> {
        let bytes = self
            .bytes
            .read()
            .map_err(|_| ContainerError::Poisoned(self.index))?;
        Ok(bytes.len() as u64)
    }
}

/// Exclusive, growable view over a reserved slot
#[derive(Debug)]
pub struct ReservedStream {
    slot: Arc<ReservedSlot>,
    offset: u64,
}

impl ReservedStream {
    /// Reserved slot index this view is bound to
    pub fn slot_index(&self) -> usize {
        self.slot.index
    }

    /// Byte offset of the view inside the slot
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Length of the view in bytes (excluding header space)
    pub fn len(&self) -> ContainerResult<u64> {
        let bytes = self.read_guard()?;
        Ok((bytes.len() as u64).saturating_sub(self.offset))
    }

    /// Returns whether the view holds no bytes
    pub fn is_empty(&self) -> ContainerResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Read `buf.len()` bytes starting at `at`
    pub fn read(&self, at: u64, buf: &mut [u8]) -> ContainerResult<()> {
        let bytes = self.read_guard()?;
        let (start, end) = self.range(&bytes, at, buf.len() as u64)?;
        buf.copy_from_slice(&bytes[start..end]);
        Ok(())
    }

    /// Overwrite bytes at `at`, growing the view when writing past its end
    ///
    /// Writes may start at most at the current end; gaps are not allowed.
    pub fn write(&self, at: u64, data: &[u8]) -> ContainerResult<()> {
        let mut bytes = self.write_guard()?;
        self.ensure_header(&mut bytes);
        let len = (bytes.len() as u64) - self.offset;
        if at > len {
            return Err(ContainerError::StreamOutOfBounds {
                offset: at,
                end: at + data.len() as u64,
                len,
            });
        }

        let start = (self.offset + at) as usize;
        let end = start + data.len();
        if end > bytes.len() {
            bytes.resize(end, 0);
        }
        bytes[start..end].copy_from_slice(data);
        Ok(())
    }

    /// Insert `data` at `at`, shifting every later byte right
    pub fn insert(&self, at: u64, data: &[u8]) -> ContainerResult<()> {
        let mut bytes = self.write_guard()?;
        self.ensure_header(&mut bytes);
        let len = (bytes.len() as u64) - self.offset;
        if at > len {
            return Err(ContainerError::StreamOutOfBounds {
                offset: at,
                end: at,
                len,
            });
        }

        let start = (self.offset + at) as usize;
        bytes.splice(start..start, data.iter().copied());
        Ok(())
    }

    /// Remove `count` bytes at `at`, shifting every later byte left
    pub fn remove(&self, at: u64, count: u64) -> ContainerResult<()> {
        let mut bytes = self.write_guard()?;
        let (start, end) = self.range(&bytes, at, count)?;
        bytes.drain(start..end);
        Ok(())
    }

    /// Shrink the view to `len` bytes
    pub fn truncate(&self, len: u64) -> ContainerResult<()> {
        let mut bytes = self.write_guard()?;
        bytes.truncate((self.offset + len) as usize);
        Ok(())
    }

    fn ensure_header(&self, bytes: &mut Vec<u8>) {
        if (bytes.len() as u64) < self.offset {
            bytes.resize(self.offset as usize, 0);
        }
    }

    fn range(&self, bytes: &[u8], at: u64, count: u64) -> ContainerResult<(usize, usize)> {
        let len = (bytes.len() as u64).saturating_sub(self.offset);
        let end = at + count;
        if end > len {
            return Err(ContainerError::StreamOutOfBounds {
                offset: at,
                end,
                len,
            });
        }
        Ok(((self.offset + at) as usize, (self.offset + end) as usize))
    }

    fn read_guard(&self) -> ContainerResult<RwLockReadGuard<'_, Vec<u8>>> {
        self.slot
            .bytes
            .read()
            .map_err(|_| ContainerError::Poisoned(self.slot.index))
    }

    fn write_guard(&self) -> ContainerResult<RwLockWriteGuard<'_, Vec<u8>>> {
        self.slot
            .bytes
            .write()
            .map_err(|_| ContainerError::Poisoned(self.slot.index))
    }
}

impl Drop for ReservedStream {
    fn drop(&mut self) {
        self.slot.claimed.store(false, Ordering::Release);
    }
}
