use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::cell::UnsafeCell;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::buffer::page::{FrameMeta, PageId, INVALID_PAGE_ID, PAGE_SIZE};
use crate::buffer::page_guard::{self, ReadPageGuard, WritePageGuard};
use crate::config::BufferPoolConfig;
use crate::error::{BrambleError, BrambleResult};
use crate::storage::disk_scheduler::DiskScheduler;
use crate::utils::cache::lru_k::LRUKReplacer;
use crate::utils::cache::{AccessType, Replacer};

pub type FrameId = usize;

/// One in-memory slot holding a page. The data buffer is only touched through
/// page guards, which hold `latch`; the pin count is atomic so it can be
/// observed without any lock.
struct Frame {
    meta: Mutex<FrameMeta>,
    pin_count: AtomicU32,
    latch: RwLock<()>,
    data: UnsafeCell<Box<[u8; PAGE_SIZE]>>,
}

// `data` is read and written only under `latch` (or with pin_count == 0 while
// holding the pool latch, when no guard can exist).
unsafe impl Sync for Frame {}

impl Frame {
    fn new() -> Self {
        Self {
            meta: Mutex::new(FrameMeta::default()),
            pin_count: AtomicU32::new(0),
            latch: RwLock::new(()),
            data: UnsafeCell::new(Box::new([0; PAGE_SIZE])),
        }
    }
}

/// Maps page ids to frames, pinning and unpinning pages through RAII guards
/// and orchestrating eviction and write-back.
///
/// Locking order: pool latch, then the replacer's mutex, then (after the pool
/// latch is released) a frame latch. Frame latches are never taken while the
/// pool latch is held.
pub struct BufferPoolManager {
    frames: Vec<Frame>,
    page_table: DashMap<PageId, FrameId>,
    /// The pool latch. Guards the free list plus every page-table and
    /// replacer-state transition.
    pool_latch: Mutex<VecDeque<FrameId>>,
    replacer: Mutex<LRUKReplacer>,
    disk_scheduler: Arc<DiskScheduler>,
}

impl BufferPoolManager {
    pub fn new(num_frames: usize, disk_scheduler: Arc<DiskScheduler>) -> Self {
        Self::new_with_config(
            BufferPoolConfig {
                num_frames,
                ..Default::default()
            },
            disk_scheduler,
        )
    }

    pub fn new_with_config(config: BufferPoolConfig, disk_scheduler: Arc<DiskScheduler>) -> Self {
        assert!(config.num_frames > 0, "buffer pool needs at least one frame");
        let mut frames = Vec::with_capacity(config.num_frames);
        let mut free_list = VecDeque::with_capacity(config.num_frames);
        for i in 0..config.num_frames {
            frames.push(Frame::new());
            free_list.push_back(i);
        }

        Self {
            frames,
            page_table: DashMap::new(),
            pool_latch: Mutex::new(free_list),
            replacer: Mutex::new(LRUKReplacer::new(config.num_frames, config.lru_k)),
            disk_scheduler,
        }
    }

    /// Number of frames in the pool.
    pub fn size(&self) -> usize {
        self.frames.len()
    }

    pub fn disk_scheduler(&self) -> &Arc<DiskScheduler> {
        &self.disk_scheduler
    }

    pub(crate) fn frame_meta(&self, frame_id: FrameId) -> MutexGuard<'_, FrameMeta> {
        self.frames[frame_id].meta.lock()
    }

    pub(crate) fn frame_latch(&self, frame_id: FrameId) -> &RwLock<()> {
        &self.frames[frame_id].latch
    }

    pub(crate) fn frame_pin_count(&self, frame_id: FrameId) -> u32 {
        self.frames[frame_id].pin_count.load(Ordering::SeqCst)
    }

    /// # Safety
    /// The caller must hold the frame's latch (shared for reads, exclusive
    /// for writes), or otherwise guarantee no guard exists for the frame.
    pub(crate) unsafe fn frame_slice(&self, frame_id: FrameId) -> &[u8] {
        &(&*self.frames[frame_id].data.get())[..]
    }

    /// # Safety
    /// The caller must hold the frame's latch exclusively, or otherwise
    /// guarantee no guard exists for the frame.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn frame_slice_mut(&self, frame_id: FrameId) -> &mut [u8] {
        &mut (&mut *self.frames[frame_id].data.get())[..]
    }

    /// Allocate a fresh page, pin it in a frame and return a write guard on
    /// its zeroed contents.
    pub fn new_page(self: &Arc<Self>) -> BrambleResult<WritePageGuard> {
        let mut free_list = self.pool_latch.lock();
        let frame_id = self.take_frame(&mut free_list)?;

        let page_id = match self.allocate_page_id() {
            Ok(page_id) => page_id,
            Err(e) => {
                free_list.push_back(frame_id);
                return Err(e);
            }
        };

        self.reset_frame(frame_id);
        {
            let mut meta = self.frame_meta(frame_id);
            meta.page_id = page_id;
            meta.is_dirty = false;
        }
        self.frames[frame_id].pin_count.store(1, Ordering::SeqCst);
        self.page_table.insert(page_id, frame_id);
        {
            let mut replacer = self.replacer.lock();
            replacer.record_access(frame_id, AccessType::Unknown)?;
            replacer.set_evictable(frame_id, false)?;
        }
        drop(free_list);

        Ok(page_guard::new_write_guard(Arc::clone(self), frame_id))
    }

    /// Pin the page in a frame (loading it from disk if necessary) and take a
    /// shared latch on it. Fails with `BufferPoolFull` when every frame is
    /// pinned.
    pub fn fetch_page_read(self: &Arc<Self>, page_id: PageId) -> BrambleResult<ReadPageGuard> {
        let frame_id = self.pin_frame(page_id, AccessType::Lookup)?;
        Ok(page_guard::new_read_guard(Arc::clone(self), frame_id))
    }

    /// Pin the page in a frame (loading it from disk if necessary) and take
    /// an exclusive latch on it.
    pub fn fetch_page_write(self: &Arc<Self>, page_id: PageId) -> BrambleResult<WritePageGuard> {
        let frame_id = self.pin_frame(page_id, AccessType::Lookup)?;
        Ok(page_guard::new_write_guard(Arc::clone(self), frame_id))
    }

    /// Unchecked variant of `fetch_page_read`: aborts on failure.
    pub fn read_page(self: &Arc<Self>, page_id: PageId) -> ReadPageGuard {
        self.fetch_page_read(page_id)
            .unwrap_or_else(|e| panic!("read_page({page_id}) failed: {e}"))
    }

    /// Unchecked variant of `fetch_page_write`: aborts on failure.
    pub fn write_page(self: &Arc<Self>, page_id: PageId) -> WritePageGuard {
        self.fetch_page_write(page_id)
            .unwrap_or_else(|e| panic!("write_page({page_id}) failed: {e}"))
    }

    /// Drop the page from the pool and release its on-disk space. Succeeds
    /// trivially if the page is not resident; fails (returning `false`) if
    /// the page is pinned.
    pub fn delete_page(&self, page_id: PageId) -> BrambleResult<bool> {
        let mut free_list = self.pool_latch.lock();

        let Some(frame_id) = self.page_table.get(&page_id).map(|e| *e.value()) else {
            drop(free_list);
            self.deallocate_page_id(page_id)?;
            return Ok(true);
        };

        if self.frame_pin_count(frame_id) > 0 {
            return Ok(false);
        }

        self.page_table.remove(&page_id);
        self.reset_frame(frame_id);
        {
            let mut meta = self.frame_meta(frame_id);
            *meta = FrameMeta::default();
        }
        {
            let mut replacer = self.replacer.lock();
            let _ = replacer.set_evictable(frame_id, true);
            replacer.remove(frame_id)?;
        }
        free_list.push_back(frame_id);
        drop(free_list);

        self.deallocate_page_id(page_id)?;
        Ok(true)
    }

    /// Write the page back if it is resident and dirty. Returns whether a
    /// write happened. Pins the page for the duration of the copy, so the
    /// pool latch is never held while waiting on a frame latch.
    pub fn flush_page(self: &Arc<Self>, page_id: PageId) -> BrambleResult<bool> {
        if self.page_table.get(&page_id).is_none() {
            return Ok(false);
        }
        let guard = self.fetch_page_read(page_id)?;
        if !guard.is_dirty() {
            return Ok(false);
        }
        guard.flush()?;
        Ok(true)
    }

    /// `flush_page` without any latching. The caller must guarantee that no
    /// guard exists for the page and that the pool is otherwise quiescent
    /// (e.g. while tearing the pool down).
    pub fn flush_page_unsafe(&self, page_id: PageId) -> BrambleResult<bool> {
        let Some(frame_id) = self.page_table.get(&page_id).map(|e| *e.value()) else {
            return Ok(false);
        };
        if !self.frame_meta(frame_id).is_dirty {
            return Ok(false);
        }
        let bytes = Bytes::copy_from_slice(unsafe { self.frame_slice(frame_id) });
        self.write_page_to_disk(page_id, bytes)?;
        self.frame_meta(frame_id).is_dirty = false;
        Ok(true)
    }

    pub fn flush_all_pages(self: &Arc<Self>) -> BrambleResult<()> {
        let page_ids: Vec<PageId> = self.page_table.iter().map(|e| *e.key()).collect();
        for page_id in page_ids {
            self.flush_page(page_id)?;
        }
        Ok(())
    }

    /// Pin count of a resident page, observed without the pool latch.
    pub fn get_pin_count(&self, page_id: PageId) -> Option<u32> {
        let frame_id = self.page_table.get(&page_id).map(|e| *e.value())?;
        Some(self.frame_pin_count(frame_id))
    }

    /// Find or load the frame for `page_id` and add one pin, all under the
    /// pool latch. The zero-to-one pin transition only happens here.
    fn pin_frame(&self, page_id: PageId, access_type: AccessType) -> BrambleResult<FrameId> {
        if page_id == INVALID_PAGE_ID
            || !self.disk_scheduler.disk_manager().is_allocated(page_id)
        {
            return Err(BrambleError::InvalidArgument(format!(
                "page id {} was never allocated",
                page_id
            )));
        }

        let mut free_list = self.pool_latch.lock();

        if let Some(frame_id) = self.page_table.get(&page_id).map(|e| *e.value()) {
            let prev = self.frames[frame_id].pin_count.fetch_add(1, Ordering::SeqCst);
            let mut replacer = self.replacer.lock();
            replacer.record_access(frame_id, access_type)?;
            if prev == 0 {
                replacer.set_evictable(frame_id, false)?;
            }
            return Ok(frame_id);
        }

        let frame_id = self.take_frame(&mut free_list)?;

        // Load the page image before publishing the mapping.
        let rx = self.disk_scheduler.schedule_read(page_id)?;
        let data = match rx
            .recv()
            .map_err(|e| BrambleError::Internal(format!("Channel disconnected: {}", e)))
            .and_then(|res| res)
        {
            Ok(data) => data,
            Err(e) => {
                free_list.push_back(frame_id);
                return Err(e);
            }
        };

        // pin_count == 0 and the frame is unmapped, so no guard can exist.
        unsafe {
            self.frame_slice_mut(frame_id).copy_from_slice(&data);
        }
        {
            let mut meta = self.frame_meta(frame_id);
            meta.page_id = page_id;
            meta.is_dirty = false;
        }
        self.frames[frame_id].pin_count.store(1, Ordering::SeqCst);
        self.page_table.insert(page_id, frame_id);
        {
            let mut replacer = self.replacer.lock();
            replacer.record_access(frame_id, access_type)?;
            replacer.set_evictable(frame_id, false)?;
        }
        Ok(frame_id)
    }

    /// Pop a free frame, or evict a victim. Caller holds the pool latch.
    fn take_frame(&self, free_list: &mut VecDeque<FrameId>) -> BrambleResult<FrameId> {
        if let Some(frame_id) = free_list.pop_front() {
            return Ok(frame_id);
        }

        let victim = {
            let mut replacer = self.replacer.lock();
            replacer.evict().ok_or(BrambleError::BufferPoolFull)?
        };
        assert_eq!(
            self.frame_pin_count(victim),
            0,
            "evicted frame {victim} is pinned"
        );

        let (old_page_id, is_dirty) = {
            let meta = self.frame_meta(victim);
            (meta.page_id, meta.is_dirty)
        };
        if old_page_id != INVALID_PAGE_ID {
            if is_dirty {
                // No guard exists for a pin-0 frame, so reading the buffer
                // without the frame latch is sound.
                let bytes = Bytes::copy_from_slice(unsafe { self.frame_slice(victim) });
                self.write_page_to_disk(old_page_id, bytes)?;
            }
            self.page_table.remove(&old_page_id);
        }

        {
            let mut meta = self.frame_meta(victim);
            *meta = FrameMeta::default();
        }
        Ok(victim)
    }

    /// Called by guards once the page latch is released. Takes the pool latch
    /// so the one-to-zero transition and evictability flip are atomic.
    pub(crate) fn complete_unpin(&self, frame_id: FrameId) {
        let _pool = self.pool_latch.lock();
        let prev = self.frames[frame_id].pin_count.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(prev > 0, "unpinning frame {frame_id} with zero pin count");
        if prev == 1 {
            if let Err(e) = self.replacer.lock().set_evictable(frame_id, true) {
                log::error!("Failed to set frame {} evictable: {}", frame_id, e);
            }
        }
    }

    pub(crate) fn write_page_to_disk(&self, page_id: PageId, data: Bytes) -> BrambleResult<()> {
        let rx = self.disk_scheduler.schedule_write(page_id, data)?;
        rx.recv()
            .map_err(|e| BrambleError::Internal(format!("Channel disconnected: {}", e)))?
    }

    fn allocate_page_id(&self) -> BrambleResult<PageId> {
        let rx = self.disk_scheduler.schedule_allocate()?;
        rx.recv()
            .map_err(|e| BrambleError::Internal(format!("Channel disconnected: {}", e)))?
    }

    fn deallocate_page_id(&self, page_id: PageId) -> BrambleResult<()> {
        let rx = self.disk_scheduler.schedule_deallocate(page_id)?;
        rx.recv()
            .map_err(|e| BrambleError::Internal(format!("Channel disconnected: {}", e)))?
    }

    /// Zero a frame's buffer. Caller must guarantee no guard exists.
    fn reset_frame(&self, frame_id: FrameId) {
        unsafe {
            self.frame_slice_mut(frame_id).fill(0);
        }
    }
}

impl std::fmt::Debug for BufferPoolManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPoolManager")
            .field("num_frames", &self.frames.len())
            .field("resident_pages", &self.page_table.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::disk_manager::DiskManager;
    use std::sync::{Arc, Barrier};
    use std::thread;
    use tempfile::TempDir;

    fn setup_pool(num_frames: usize) -> (TempDir, Arc<BufferPoolManager>) {
        let temp_dir = TempDir::new().unwrap();
        let disk_manager = Arc::new(DiskManager::try_new(temp_dir.path().join("test.db")).unwrap());
        let disk_scheduler = Arc::new(DiskScheduler::new(disk_manager));
        let pool = Arc::new(BufferPoolManager::new(num_frames, disk_scheduler));
        (temp_dir, pool)
    }

    #[test]
    fn new_page_initializes_frame() {
        let (_tmp, pool) = setup_pool(2);
        let guard = pool.new_page().unwrap();
        let page_id = guard.page_id();

        assert!(guard.data().iter().all(|b| *b == 0));
        assert_eq!(pool.get_pin_count(page_id), Some(1));
        drop(guard);
        assert_eq!(pool.get_pin_count(page_id), Some(0));
    }

    #[test]
    fn pool_exhaustion_and_eviction() {
        let (_tmp, pool) = setup_pool(2);

        let guard_a = pool.new_page().unwrap();
        let page_a = guard_a.page_id();
        let _guard_b = pool.new_page().unwrap();

        // Both frames pinned: a third page cannot be created.
        assert!(matches!(
            pool.new_page(),
            Err(BrambleError::BufferPoolFull)
        ));

        // Dropping one guard frees its frame for eviction.
        drop(guard_a);
        let guard_c = pool.new_page().unwrap();
        assert!(pool.get_pin_count(page_a).is_none());
        assert_eq!(pool.get_pin_count(guard_c.page_id()), Some(1));
    }

    #[test]
    fn evicted_page_reloads_from_disk() {
        let (_tmp, pool) = setup_pool(2);

        let page_a = {
            let mut guard = pool.new_page().unwrap();
            guard.data_mut()[0] = 42;
            guard.page_id()
        };

        // Evict page A by cycling two more pages through the pool.
        for _ in 0..2 {
            let _ = pool.new_page().unwrap();
        }
        assert!(pool.get_pin_count(page_a).is_none());

        let guard = pool.fetch_page_read(page_a).unwrap();
        assert_eq!(guard.data()[0], 42);
    }

    #[test]
    fn fetch_of_unallocated_page_fails() {
        let (_tmp, pool) = setup_pool(2);
        assert!(pool.fetch_page_read(INVALID_PAGE_ID).is_err());
        assert!(pool.fetch_page_read(99).is_err());
    }

    #[test]
    fn delete_page_respects_pins() {
        let (_tmp, pool) = setup_pool(2);
        let guard = pool.new_page().unwrap();
        let page_id = guard.page_id();

        assert!(!pool.delete_page(page_id).unwrap());
        drop(guard);
        assert!(pool.delete_page(page_id).unwrap());
        assert!(pool.get_pin_count(page_id).is_none());

        // Deleting a non-resident page succeeds.
        assert!(pool.delete_page(page_id).unwrap());
    }

    #[test]
    fn flush_page_writes_back_and_clears_dirty_flag() {
        let (_tmp, pool) = setup_pool(2);
        let page_id = {
            let mut guard = pool.new_page().unwrap();
            guard.data_mut()[0] = 42;
            guard.page_id()
        };

        assert!(pool.flush_page(page_id).unwrap());
        // Second flush is a no-op: the page is clean.
        assert!(!pool.flush_page(page_id).unwrap());

        let read_back = pool
            .disk_scheduler()
            .disk_manager()
            .read_page(page_id)
            .unwrap();
        assert_eq!(read_back[0], 42);
    }

    #[test]
    fn pin_count_follows_guards() {
        let (_tmp, pool) = setup_pool(4);
        let page_id = {
            let guard = pool.new_page().unwrap();
            guard.page_id()
        };

        let r1 = pool.fetch_page_read(page_id).unwrap();
        let r2 = pool.fetch_page_read(page_id).unwrap();
        assert_eq!(pool.get_pin_count(page_id), Some(2));
        drop(r1);
        assert_eq!(pool.get_pin_count(page_id), Some(1));
        drop(r2);
        assert_eq!(pool.get_pin_count(page_id), Some(0));
    }

    #[test]
    fn concurrent_reads_do_not_leak_pins() {
        const THREADS: usize = 8;
        let (_tmp, pool) = setup_pool(4);
        let page_id = {
            let mut guard = pool.new_page().unwrap();
            guard.data_mut()[0] = 42;
            guard.page_id()
        };

        let barrier = Arc::new(Barrier::new(THREADS));
        let mut handles = Vec::with_capacity(THREADS);
        for _ in 0..THREADS {
            let pool = pool.clone();
            let barrier = barrier.clone();
            handles.push(thread::spawn(move || {
                barrier.wait();
                for _ in 0..50 {
                    let guard = pool.fetch_page_read(page_id).expect("read page");
                    assert_eq!(guard.data()[0], 42);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(pool.get_pin_count(page_id), Some(0));
    }

    #[test]
    fn concurrent_writers_serialize_on_page_latch() {
        const THREADS: usize = 4;
        let (_tmp, pool) = setup_pool(4);
        let page_id = {
            let guard = pool.new_page().unwrap();
            guard.page_id()
        };

        let barrier = Arc::new(Barrier::new(THREADS));
        let mut handles = Vec::with_capacity(THREADS);
        for _ in 0..THREADS {
            let pool = pool.clone();
            let barrier = barrier.clone();
            handles.push(thread::spawn(move || {
                barrier.wait();
                for _ in 0..50 {
                    let mut guard = pool.fetch_page_write(page_id).expect("write guard");
                    let v = u32::from_be_bytes(guard.data()[0..4].try_into().unwrap());
                    guard.data_mut()[0..4].copy_from_slice(&(v + 1).to_be_bytes());
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        let guard = pool.fetch_page_read(page_id).unwrap();
        let v = u32::from_be_bytes(guard.data()[0..4].try_into().unwrap());
        assert_eq!(v, (THREADS * 50) as u32);
    }
}
