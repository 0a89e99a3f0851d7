use derive_with::With;
use std::sync::atomic::AtomicU32;

pub type PageId = u32;
pub type AtomicPageId = AtomicU32;

pub const INVALID_PAGE_ID: PageId = 0;
pub const PAGE_SIZE: usize = 4096;

/// Bookkeeping for one buffer frame. The frame index itself is fixed at pool
/// construction; everything here is reset when the frame changes hands.
///
/// The pin count lives outside this struct as an atomic so `get_pin_count`
/// can observe it without the frame meta lock.
#[derive(Debug, Clone, With)]
pub struct FrameMeta {
    pub page_id: PageId,
    pub is_dirty: bool,
}

impl Default for FrameMeta {
    fn default() -> Self {
        Self {
            page_id: INVALID_PAGE_ID,
            is_dirty: false,
        }
    }
}
