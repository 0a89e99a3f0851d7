use bytes::Bytes;
use parking_lot::{RwLockReadGuard, RwLockWriteGuard};
use std::mem::{self, ManuallyDrop};
use std::sync::Arc;

use crate::buffer::buffer_pool::{BufferPoolManager, FrameId};
use crate::buffer::page::{PageId, PAGE_SIZE};
use crate::error::BrambleResult;

/// Shared view of a pinned page. Holds the frame latch in read mode; dropping
/// the guard releases the latch first, then gives the pin back.
pub struct ReadPageGuard {
    bpm: Arc<BufferPoolManager>,
    frame_id: FrameId,
    page_id: PageId,
    guard: ManuallyDrop<RwLockReadGuard<'static, ()>>,
}

impl ReadPageGuard {
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    pub fn data(&self) -> &[u8] {
        unsafe { self.bpm.frame_slice(self.frame_id) }
    }

    pub fn is_dirty(&self) -> bool {
        self.bpm.frame_meta(self.frame_id).is_dirty
    }

    pub fn pin_count(&self) -> u32 {
        self.bpm.frame_pin_count(self.frame_id)
    }

    /// Write the page back through the shared disk scheduler and clear the
    /// dirty flag. Works under the latch this guard already holds.
    pub fn flush(&self) -> BrambleResult<()> {
        let bytes = Bytes::copy_from_slice(self.data());
        self.bpm.write_page_to_disk(self.page_id, bytes)?;
        self.bpm.frame_meta(self.frame_id).is_dirty = false;
        Ok(())
    }
}

impl Drop for ReadPageGuard {
    fn drop(&mut self) {
        unsafe {
            ManuallyDrop::drop(&mut self.guard);
        }
        self.bpm.complete_unpin(self.frame_id);
    }
}

impl std::fmt::Debug for ReadPageGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadPageGuard")
            .field("page_id", &self.page_id)
            .field("frame_id", &self.frame_id)
            .finish()
    }
}

/// Exclusive view of a pinned page. Acquiring it marks the frame dirty.
pub struct WritePageGuard {
    bpm: Arc<BufferPoolManager>,
    frame_id: FrameId,
    page_id: PageId,
    guard: ManuallyDrop<RwLockWriteGuard<'static, ()>>,
}

impl WritePageGuard {
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    pub fn data(&self) -> &[u8] {
        unsafe { self.bpm.frame_slice(self.frame_id) }
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        unsafe { self.bpm.frame_slice_mut(self.frame_id) }
    }

    /// Replace the page's entire image.
    pub fn overwrite(&mut self, data: &[u8]) {
        debug_assert_eq!(data.len(), PAGE_SIZE);
        self.data_mut().copy_from_slice(data);
    }

    pub fn is_dirty(&self) -> bool {
        self.bpm.frame_meta(self.frame_id).is_dirty
    }

    pub fn pin_count(&self) -> u32 {
        self.bpm.frame_pin_count(self.frame_id)
    }

    /// Write the page back through the shared disk scheduler and clear the
    /// dirty flag.
    pub fn flush(&mut self) -> BrambleResult<()> {
        let bytes = Bytes::copy_from_slice(self.data());
        self.bpm.write_page_to_disk(self.page_id, bytes)?;
        self.bpm.frame_meta(self.frame_id).is_dirty = false;
        Ok(())
    }
}

impl Drop for WritePageGuard {
    fn drop(&mut self) {
        unsafe {
            ManuallyDrop::drop(&mut self.guard);
        }
        self.bpm.complete_unpin(self.frame_id);
    }
}

impl std::fmt::Debug for WritePageGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WritePageGuard")
            .field("page_id", &self.page_id)
            .field("frame_id", &self.frame_id)
            .finish()
    }
}

pub(crate) fn new_read_guard(bpm: Arc<BufferPoolManager>, frame_id: FrameId) -> ReadPageGuard {
    let guard = {
        let latch = bpm.frame_latch(frame_id);
        let guard = latch.read();
        // The pin taken before this call keeps the frame (and thus the latch)
        // alive for the guard's whole lifetime.
        unsafe {
            mem::transmute::<RwLockReadGuard<'_, ()>, RwLockReadGuard<'static, ()>>(guard)
        }
    };
    let page_id = bpm.frame_meta(frame_id).page_id;
    ReadPageGuard {
        bpm,
        frame_id,
        page_id,
        guard: ManuallyDrop::new(guard),
    }
}

pub(crate) fn new_write_guard(bpm: Arc<BufferPoolManager>, frame_id: FrameId) -> WritePageGuard {
    let guard = {
        let latch = bpm.frame_latch(frame_id);
        let guard = latch.write();
        unsafe {
            mem::transmute::<RwLockWriteGuard<'_, ()>, RwLockWriteGuard<'static, ()>>(guard)
        }
    };
    let page_id = {
        let mut meta = bpm.frame_meta(frame_id);
        meta.is_dirty = true;
        meta.page_id
    };
    WritePageGuard {
        bpm,
        frame_id,
        page_id,
        guard: ManuallyDrop::new(guard),
    }
}
