use crate::buffer::{AtomicPageId, PageId, INVALID_PAGE_ID, PAGE_SIZE};
use crate::error::{BrambleError, BrambleResult};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::Ordering;

/// The first page of the database file records allocation state.
pub const META_PAGE_SIZE: usize = PAGE_SIZE;

/// File-backed page store. Page ids are allocated monotonically starting at 1
/// (0 is `INVALID_PAGE_ID`); page `p` lives at byte offset
/// `META_PAGE_SIZE + (p - 1) * PAGE_SIZE`.
#[derive(Debug)]
pub struct DiskManager {
    db_file: Mutex<File>,
    /// Next page id to hand out. Persisted in the meta page.
    next_page_id: AtomicPageId,
}

impl DiskManager {
    pub fn try_new(db_path: impl AsRef<Path>) -> BrambleResult<Self> {
        let mut db_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(db_path)?;

        let file_len = db_file.metadata()?.len();
        let next_page_id = if file_len >= META_PAGE_SIZE as u64 {
            let mut buf = [0u8; 4];
            db_file.seek(SeekFrom::Start(0))?;
            db_file.read_exact(&mut buf)?;
            let persisted = u32::from_be_bytes(buf);
            if persisted == INVALID_PAGE_ID {
                1
            } else {
                persisted
            }
        } else {
            db_file.set_len(META_PAGE_SIZE as u64)?;
            1
        };

        let disk_manager = Self {
            db_file: Mutex::new(db_file),
            next_page_id: AtomicPageId::new(next_page_id),
        };
        disk_manager.persist_meta()?;
        Ok(disk_manager)
    }

    fn persist_meta(&self) -> BrambleResult<()> {
        let mut file = self.db_file.lock();
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&self.next_page_id.load(Ordering::SeqCst).to_be_bytes())?;
        file.flush()?;
        Ok(())
    }

    fn page_offset(page_id: PageId) -> u64 {
        (META_PAGE_SIZE + (page_id as usize - 1) * PAGE_SIZE) as u64
    }

    fn check_page_id(&self, page_id: PageId) -> BrambleResult<()> {
        if page_id == INVALID_PAGE_ID || page_id >= self.next_page_id.load(Ordering::SeqCst) {
            return Err(BrambleError::InvalidArgument(format!(
                "page id {} out of allocated range",
                page_id
            )));
        }
        Ok(())
    }

    /// Whether `page_id` has been handed out by `allocate_page`.
    pub fn is_allocated(&self, page_id: PageId) -> bool {
        page_id != INVALID_PAGE_ID && page_id < self.next_page_id.load(Ordering::SeqCst)
    }

    pub fn num_allocated_pages(&self) -> usize {
        self.next_page_id.load(Ordering::SeqCst) as usize - 1
    }

    /// Read one page. A page that was allocated but never written reads back
    /// as zeroes.
    pub fn read_page(&self, page_id: PageId) -> BrambleResult<[u8; PAGE_SIZE]> {
        self.check_page_id(page_id)?;
        let mut buf = [0u8; PAGE_SIZE];
        let mut file = self.db_file.lock();
        let file_len = file.metadata()?.len();
        let offset = Self::page_offset(page_id);
        if offset >= file_len {
            return Ok(buf);
        }
        file.seek(SeekFrom::Start(offset))?;
        let readable = std::cmp::min(PAGE_SIZE as u64, file_len - offset) as usize;
        file.read_exact(&mut buf[..readable])?;
        Ok(buf)
    }

    pub fn write_page(&self, page_id: PageId, data: &[u8]) -> BrambleResult<()> {
        self.check_page_id(page_id)?;
        if data.len() != PAGE_SIZE {
            return Err(BrambleError::InvalidArgument(format!(
                "page data length {} is not {}",
                data.len(),
                PAGE_SIZE
            )));
        }
        let mut file = self.db_file.lock();
        file.seek(SeekFrom::Start(Self::page_offset(page_id)))?;
        file.write_all(data)?;
        file.flush()?;
        Ok(())
    }

    /// Hand out the next page id. The on-disk space is extended lazily by the
    /// first write.
    pub fn allocate_page(&self) -> BrambleResult<PageId> {
        let page_id = self.next_page_id.fetch_add(1, Ordering::SeqCst);
        self.persist_meta()?;
        Ok(page_id)
    }

    /// Advisory release of a page's on-disk space. The id itself is never
    /// reused; the region is zeroed if the file already covers it.
    pub fn deallocate_page(&self, page_id: PageId) -> BrambleResult<()> {
        self.check_page_id(page_id)?;
        let mut file = self.db_file.lock();
        let file_len = file.metadata()?.len();
        let offset = Self::page_offset(page_id);
        if offset < file_len {
            file.seek(SeekFrom::Start(offset))?;
            file.write_all(&[0u8; PAGE_SIZE])?;
            file.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn allocate_write_read_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let dm = DiskManager::try_new(temp_dir.path().join("test.db")).unwrap();

        let page_id = dm.allocate_page().unwrap();
        assert_eq!(page_id, 1);

        let mut data = [0u8; PAGE_SIZE];
        data[0] = 0xAB;
        data[PAGE_SIZE - 1] = 0xCD;
        dm.write_page(page_id, &data).unwrap();

        let read_back = dm.read_page(page_id).unwrap();
        assert_eq!(read_back[0], 0xAB);
        assert_eq!(read_back[PAGE_SIZE - 1], 0xCD);
    }

    #[test]
    fn unwritten_page_reads_zeroed() {
        let temp_dir = TempDir::new().unwrap();
        let dm = DiskManager::try_new(temp_dir.path().join("test.db")).unwrap();
        let page_id = dm.allocate_page().unwrap();
        assert!(dm.read_page(page_id).unwrap().iter().all(|&b| b == 0));
    }

    #[test]
    fn out_of_range_page_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let dm = DiskManager::try_new(temp_dir.path().join("test.db")).unwrap();
        assert!(dm.read_page(INVALID_PAGE_ID).is_err());
        assert!(dm.read_page(1).is_err());
        let page_id = dm.allocate_page().unwrap();
        assert!(dm.read_page(page_id).is_ok());
        assert!(dm.read_page(page_id + 1).is_err());
    }

    #[test]
    fn deallocate_zeroes_page() {
        let temp_dir = TempDir::new().unwrap();
        let dm = DiskManager::try_new(temp_dir.path().join("test.db")).unwrap();
        let page_id = dm.allocate_page().unwrap();
        dm.write_page(page_id, &[7u8; PAGE_SIZE]).unwrap();
        dm.deallocate_page(page_id).unwrap();
        assert!(dm.read_page(page_id).unwrap().iter().all(|&b| b == 0));
    }

    #[test]
    fn allocation_state_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.db");
        {
            let dm = DiskManager::try_new(&path).unwrap();
            assert_eq!(dm.allocate_page().unwrap(), 1);
            assert_eq!(dm.allocate_page().unwrap(), 2);
        }
        let dm = DiskManager::try_new(&path).unwrap();
        assert_eq!(dm.allocate_page().unwrap(), 3);
    }
}
