use std::ops::{Bound, RangeBounds};
use std::sync::Arc;

use crate::buffer::INVALID_PAGE_ID;
use crate::error::BrambleResult;
use crate::storage::index::BPlusTreeIndex;
use crate::storage::page::{BPlusTreeLeafPage, LeafKV, RecordId};
use crate::storage::tuple::Tuple;

/// Walks the leaf chain over a key range. Holds a decoded snapshot of the
/// current leaf plus a cursor; advancing past the leaf follows
/// `next_page_id` until the chain (or the end bound) runs out.
#[derive(Debug)]
pub struct TreeIndexIterator {
    index: Arc<BPlusTreeIndex>,
    start_bound: Bound<Tuple>,
    end_bound: Bound<Tuple>,
    leaf_page: BPlusTreeLeafPage,
    cursor: usize,
    started: bool,
}

impl TreeIndexIterator {
    pub fn new<R: RangeBounds<Tuple>>(index: Arc<BPlusTreeIndex>, range: R) -> Self {
        let leaf_page = BPlusTreeLeafPage::empty(index.key_schema.clone());
        Self {
            index,
            start_bound: range.start_bound().cloned(),
            end_bound: range.end_bound().cloned(),
            leaf_page,
            cursor: 0,
            started: false,
        }
    }

    pub fn next(&mut self) -> BrambleResult<Option<RecordId>> {
        let kv = if self.started {
            self.advance()?
        } else {
            self.started = true;
            self.seek_start()?
        };
        let Some((key, rid)) = kv else {
            return Ok(None);
        };
        let in_range = match self.end_bound.as_ref() {
            Bound::Included(end) => &key <= end,
            Bound::Excluded(end) => &key < end,
            Bound::Unbounded => true,
        };
        if in_range {
            Ok(Some(rid))
        } else {
            Ok(None)
        }
    }

    /// Position at the first entry satisfying the start bound.
    fn seek_start(&mut self) -> BrambleResult<Option<LeafKV>> {
        match self.start_bound.clone() {
            Bound::Unbounded => {
                let Some(leaf) = self.index.first_leaf_page()? else {
                    return Ok(None);
                };
                self.leaf_page = leaf;
                self.cursor = 0;
                self.skip_empty_leaves()
            }
            Bound::Included(start) => self.seek_key(&start, true),
            Bound::Excluded(start) => self.seek_key(&start, false),
        }
    }

    fn seek_key(&mut self, key: &Tuple, included: bool) -> BrambleResult<Option<LeafKV>> {
        let Some(leaf) = self.index.find_leaf_page(key)? else {
            return Ok(None);
        };
        self.leaf_page = leaf;
        match self.leaf_page.next_closest(key, included) {
            Some(idx) => {
                self.cursor = idx;
                Ok(Some(self.leaf_page.kv_at(idx).clone()))
            }
            None => {
                // Past this leaf's last key: the next leaf starts the range.
                self.cursor = self.leaf_page.header.current_size as usize;
                self.skip_empty_leaves()
            }
        }
    }

    fn advance(&mut self) -> BrambleResult<Option<LeafKV>> {
        self.cursor += 1;
        self.skip_empty_leaves()
    }

    /// Chase `next_page_id` until the cursor lands on an entry, or the chain
    /// ends.
    fn skip_empty_leaves(&mut self) -> BrambleResult<Option<LeafKV>> {
        while self.cursor >= self.leaf_page.header.current_size as usize {
            let next_page_id = self.leaf_page.header.next_page_id;
            if next_page_id == INVALID_PAGE_ID {
                return Ok(None);
            }
            self.leaf_page = self.index.leaf_page_at(next_page_id)?;
            self.cursor = 0;
        }
        Ok(Some(self.leaf_page.kv_at(self.cursor).clone()))
    }
}
