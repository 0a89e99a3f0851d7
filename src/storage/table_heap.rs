use crate::buffer::{AtomicPageId, BufferPoolManager, INVALID_PAGE_ID};
use crate::catalog::SchemaRef;
use crate::error::BrambleResult;
use crate::storage::codec::TablePageCodec;
use crate::storage::page::{RecordId, TablePage, TupleMeta};
use crate::storage::tuple::Tuple;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Heap of slotted pages chained through `next_page_id`. Inserts go to the
/// last page, spilling into a fresh page when it fills up.
#[derive(Debug)]
pub struct TableHeap {
    pub schema: SchemaRef,
    pub buffer_pool: Arc<BufferPoolManager>,
    pub first_page_id: AtomicPageId,
    pub last_page_id: AtomicPageId,
}

impl TableHeap {
    pub fn try_new(schema: SchemaRef, buffer_pool: Arc<BufferPoolManager>) -> BrambleResult<Self> {
        let mut first_page_guard = buffer_pool.new_page()?;
        let first_page_id = first_page_guard.page_id();

        let table_page = TablePage::new(schema.clone(), INVALID_PAGE_ID);
        first_page_guard.overwrite(&TablePageCodec::encode(&table_page));
        drop(first_page_guard);

        Ok(Self {
            schema,
            buffer_pool,
            first_page_id: AtomicPageId::new(first_page_id),
            last_page_id: AtomicPageId::new(first_page_id),
        })
    }

    pub fn insert_tuple(&self, meta: &TupleMeta, tuple: &Tuple) -> BrambleResult<RecordId> {
        let mut current_page_id = self.last_page_id.load(Ordering::SeqCst);

        loop {
            let mut current_page_guard = self.buffer_pool.fetch_page_write(current_page_id)?;
            let mut table_page =
                TablePageCodec::decode(current_page_guard.data(), self.schema.clone())?.0;

            if table_page.next_tuple_offset(tuple).is_ok() {
                let slot_id = table_page.insert_tuple(meta, tuple)?;
                current_page_guard.overwrite(&TablePageCodec::encode(&table_page));
                return Ok(RecordId::new(current_page_id, slot_id as u32));
            }

            // Page full: allocate a successor and link it in before moving on.
            let new_page_guard = self.buffer_pool.new_page()?;
            let new_page_id = new_page_guard.page_id();
            drop(new_page_guard);

            table_page.header.next_page_id = new_page_id;
            current_page_guard.overwrite(&TablePageCodec::encode(&table_page));
            drop(current_page_guard);

            let mut new_guard = self.buffer_pool.fetch_page_write(new_page_id)?;
            let new_table_page = TablePage::new(self.schema.clone(), INVALID_PAGE_ID);
            new_guard.overwrite(&TablePageCodec::encode(&new_table_page));
            drop(new_guard);

            self.last_page_id.store(new_page_id, Ordering::SeqCst);
            current_page_id = new_page_id;
        }
    }

    pub fn update_tuple_meta(&self, meta: TupleMeta, rid: RecordId) -> BrambleResult<()> {
        let mut page_guard = self.buffer_pool.fetch_page_write(rid.page_id)?;
        let mut table_page = TablePageCodec::decode(page_guard.data(), self.schema.clone())?.0;
        table_page.update_tuple_meta(meta, rid.slot_num as u16)?;
        page_guard.overwrite(&TablePageCodec::encode(&table_page));
        Ok(())
    }

    pub fn full_tuple(&self, rid: RecordId) -> BrambleResult<(TupleMeta, Tuple)> {
        let page_guard = self.buffer_pool.fetch_page_read(rid.page_id)?;
        let table_page = TablePageCodec::decode(page_guard.data(), self.schema.clone())?.0;
        table_page.tuple(rid.slot_num as u16)
    }

    pub fn tuple(&self, rid: RecordId) -> BrambleResult<Tuple> {
        let (_meta, tuple) = self.full_tuple(rid)?;
        Ok(tuple)
    }

    pub fn tuple_meta(&self, rid: RecordId) -> BrambleResult<TupleMeta> {
        let (meta, _tuple) = self.full_tuple(rid)?;
        Ok(meta)
    }

    /// First live rid of the heap, if any.
    pub fn get_first_rid(&self) -> BrambleResult<Option<RecordId>> {
        let mut page_id = self.first_page_id.load(Ordering::SeqCst);
        loop {
            let page_guard = self.buffer_pool.fetch_page_read(page_id)?;
            let table_page = TablePageCodec::decode(page_guard.data(), self.schema.clone())?.0;
            for slot_num in 0..table_page.header.num_tuples {
                if !table_page.header.tuple_infos[slot_num as usize].meta.is_deleted {
                    return Ok(Some(RecordId::new(page_id, slot_num as u32)));
                }
            }
            if table_page.header.next_page_id == INVALID_PAGE_ID {
                return Ok(None);
            }
            page_id = table_page.header.next_page_id;
        }
    }

    /// Next live rid after `rid`, crossing page boundaries.
    pub fn get_next_rid(&self, rid: RecordId) -> BrambleResult<Option<RecordId>> {
        let page_guard = self.buffer_pool.fetch_page_read(rid.page_id)?;
        let table_page = TablePageCodec::decode(page_guard.data(), self.schema.clone())?.0;
        if let Some(next) = table_page.get_next_rid(&rid) {
            return Ok(Some(next));
        }

        let mut page_id = table_page.header.next_page_id;
        drop(page_guard);
        while page_id != INVALID_PAGE_ID {
            let page_guard = self.buffer_pool.fetch_page_read(page_id)?;
            let table_page = TablePageCodec::decode(page_guard.data(), self.schema.clone())?.0;
            for slot_num in 0..table_page.header.num_tuples {
                if !table_page.header.tuple_infos[slot_num as usize].meta.is_deleted {
                    return Ok(Some(RecordId::new(page_id, slot_num as u32)));
                }
            }
            page_id = table_page.header.next_page_id;
        }
        Ok(None)
    }

    pub fn iter(self: &Arc<Self>) -> TableIterator {
        TableIterator {
            heap: self.clone(),
            cursor: None,
            started: false,
        }
    }
}

/// Yields `(rid, meta, tuple)` for every live row, in heap order. Deleted
/// rows are skipped by the rid cursor itself.
#[derive(Debug)]
pub struct TableIterator {
    heap: Arc<TableHeap>,
    cursor: Option<RecordId>,
    started: bool,
}

impl TableIterator {
    pub fn next(&mut self) -> BrambleResult<Option<(RecordId, TupleMeta, Tuple)>> {
        let next_rid = if self.started {
            match self.cursor {
                Some(rid) => self.heap.get_next_rid(rid)?,
                None => None,
            }
        } else {
            self.started = true;
            self.heap.get_first_rid()?
        };

        self.cursor = next_rid;
        match next_rid {
            Some(rid) => {
                let (meta, tuple) = self.heap.full_tuple(rid)?;
                Ok(Some((rid, meta, tuple)))
            }
            None => Ok(None),
        }
    }
}
