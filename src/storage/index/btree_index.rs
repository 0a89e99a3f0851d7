use std::collections::VecDeque;
use std::sync::Arc;

use crate::buffer::{BufferPoolManager, PageId, WritePageGuard, INVALID_PAGE_ID};
use crate::catalog::SchemaRef;
use crate::config::BTreeConfig;
use crate::error::{BrambleError, BrambleResult};
use crate::storage::codec::{
    BPlusTreeHeaderPageCodec, BPlusTreeInternalPageCodec, BPlusTreeLeafPageCodec,
    BPlusTreePageCodec, BPlusTreePageTypeCodec,
};
use crate::storage::page::{
    BPlusTreeHeaderPage, BPlusTreeInternalPage, BPlusTreeLeafPage, BPlusTreePage,
    BPlusTreePageType, RecordId,
};
use crate::storage::tuple::Tuple;

/// Write guards held along the descent, front to back: the header page guard,
/// then every retained ancestor down to the current node's parent. Ancestors
/// are released wholesale once a child proves safe for the operation.
#[derive(Debug)]
struct Context {
    write_set: VecDeque<WritePageGuard>,
}

impl Context {
    fn new() -> Self {
        Self {
            write_set: VecDeque::new(),
        }
    }

    fn push(&mut self, guard: WritePageGuard) {
        self.write_set.push_back(guard);
    }

    fn release_all(&mut self) {
        self.write_set.clear();
    }
}

/// Ordered key-to-rid index over buffer-pool pages. Keys are tuples compared
/// lexicographically under `key_schema`; descent uses write-latch crabbing
/// for mutations and read coupling for lookups. The header page pins the
/// current root id so root swaps serialize on its latch.
#[derive(Debug)]
pub struct BPlusTreeIndex {
    pub key_schema: SchemaRef,
    pub buffer_pool: Arc<BufferPoolManager>,
    pub internal_max_size: u32,
    pub leaf_max_size: u32,
    pub header_page_id: PageId,
}

impl BPlusTreeIndex {
    pub fn try_new(
        key_schema: SchemaRef,
        buffer_pool: Arc<BufferPoolManager>,
        internal_max_size: u32,
        leaf_max_size: u32,
    ) -> BrambleResult<Self> {
        assert!(leaf_max_size >= 3 && internal_max_size >= 3);
        let mut header_page_guard = buffer_pool.new_page()?;
        let header_page_id = header_page_guard.page_id();
        let header_page = BPlusTreeHeaderPage {
            root_page_id: INVALID_PAGE_ID,
        };
        header_page_guard.overwrite(&BPlusTreeHeaderPageCodec::encode(&header_page));
        drop(header_page_guard);

        Ok(Self {
            key_schema,
            buffer_pool,
            internal_max_size,
            leaf_max_size,
            header_page_id,
        })
    }

    pub fn try_new_with_config(
        key_schema: SchemaRef,
        buffer_pool: Arc<BufferPoolManager>,
        config: BTreeConfig,
    ) -> BrambleResult<Self> {
        Self::try_new(
            key_schema,
            buffer_pool,
            config.internal_max_size,
            config.leaf_max_size,
        )
    }

    /// Attach to an existing tree through its header page.
    pub fn open(
        key_schema: SchemaRef,
        buffer_pool: Arc<BufferPoolManager>,
        internal_max_size: u32,
        leaf_max_size: u32,
        header_page_id: PageId,
    ) -> Self {
        Self {
            key_schema,
            buffer_pool,
            internal_max_size,
            leaf_max_size,
            header_page_id,
        }
    }

    pub fn get_root_page_id(&self) -> BrambleResult<PageId> {
        let header_guard = self.buffer_pool.fetch_page_read(self.header_page_id)?;
        let (header_page, _) = BPlusTreeHeaderPageCodec::decode(header_guard.data())?;
        Ok(header_page.root_page_id)
    }

    pub fn is_empty(&self) -> BrambleResult<bool> {
        Ok(self.get_root_page_id()? == INVALID_PAGE_ID)
    }

    /// Point lookup. Descends with read coupling: the child latch is taken
    /// before the parent guard drops.
    pub fn get(&self, key: &Tuple) -> BrambleResult<Option<RecordId>> {
        let header_guard = self.buffer_pool.fetch_page_read(self.header_page_id)?;
        let (header_page, _) = BPlusTreeHeaderPageCodec::decode(header_guard.data())?;
        if header_page.root_page_id == INVALID_PAGE_ID {
            return Ok(None);
        }
        let mut guard = self.buffer_pool.fetch_page_read(header_page.root_page_id)?;
        drop(header_guard);

        loop {
            let (page, _) = BPlusTreePageCodec::decode(guard.data(), self.key_schema.clone())?;
            match page {
                BPlusTreePage::Internal(internal) => {
                    let child_page_id = internal.look_up(key);
                    // Crab: hold the parent until the child latch is in hand.
                    let child_guard = self.buffer_pool.fetch_page_read(child_page_id)?;
                    guard = child_guard;
                }
                BPlusTreePage::Leaf(leaf) => {
                    return Ok(leaf.look_up(key));
                }
            }
        }
    }

    /// Insert a key/rid pair. Returns false (leaving the tree unchanged) when
    /// the key already exists.
    pub fn insert(&self, key: &Tuple, rid: RecordId) -> BrambleResult<bool> {
        let mut context = Context::new();
        let mut header_guard = self.buffer_pool.fetch_page_write(self.header_page_id)?;
        let (header_page, _) = BPlusTreeHeaderPageCodec::decode(header_guard.data())?;

        if header_page.root_page_id == INVALID_PAGE_ID {
            // Empty tree: publish a single-entry leaf as the root.
            let mut leaf_guard = self.buffer_pool.new_page()?;
            let mut leaf = BPlusTreeLeafPage::new(self.key_schema.clone(), self.leaf_max_size);
            leaf.insert(key.clone(), rid);
            leaf_guard.overwrite(&BPlusTreeLeafPageCodec::encode(&leaf));
            let new_header = BPlusTreeHeaderPage {
                root_page_id: leaf_guard.page_id(),
            };
            header_guard.overwrite(&BPlusTreeHeaderPageCodec::encode(&new_header));
            return Ok(true);
        }

        context.push(header_guard);
        let mut current = self.buffer_pool.fetch_page_write(header_page.root_page_id)?;

        loop {
            let (page, _) = BPlusTreePageCodec::decode(current.data(), self.key_schema.clone())?;
            match page {
                BPlusTreePage::Internal(internal) => {
                    let child_page_id = internal.look_up(key);
                    let child_guard = self.buffer_pool.fetch_page_write(child_page_id)?;
                    let child_safe = !Self::will_overflow_on_insert(child_guard.data())?;
                    context.push(current);
                    if child_safe {
                        context.release_all();
                    }
                    current = child_guard;
                }
                BPlusTreePage::Leaf(mut leaf) => {
                    if !leaf.insert(key.clone(), rid) {
                        return Ok(false);
                    }
                    if !leaf.is_full() {
                        current.overwrite(&BPlusTreeLeafPageCodec::encode(&leaf));
                        return Ok(true);
                    }
                    // Reserve every page the split cascade will need before
                    // mutating anything, so allocation failure aborts with
                    // the tree untouched.
                    let mut reserved = self.reserve_split_pages(&context)?;
                    self.split_leaf(&mut context, &mut reserved, current, leaf)?;
                    debug_assert!(reserved.is_empty());
                    return Ok(true);
                }
            }
        }
    }

    fn will_overflow_on_insert(page_bytes: &[u8]) -> BrambleResult<bool> {
        let (page_type, _) = BPlusTreePageTypeCodec::decode(page_bytes)?;
        Ok(match page_type {
            BPlusTreePageType::LeafPage => {
                let (header, _) = BPlusTreeLeafPageCodec::decode_header_only(page_bytes)?;
                header.current_size == header.max_size
            }
            BPlusTreePageType::InternalPage => {
                let (header, _) = BPlusTreeInternalPageCodec::decode_header_only(page_bytes)?;
                header.current_size == header.max_size
            }
        })
    }

    fn can_lend_on_delete(page_bytes: &[u8]) -> BrambleResult<bool> {
        let (page_type, _) = BPlusTreePageTypeCodec::decode(page_bytes)?;
        Ok(match page_type {
            BPlusTreePageType::LeafPage => {
                let (header, _) = BPlusTreeLeafPageCodec::decode_header_only(page_bytes)?;
                header.current_size > header.max_size / 2
            }
            BPlusTreePageType::InternalPage => {
                let (header, _) = BPlusTreeInternalPageCodec::decode_header_only(page_bytes)?;
                header.current_size > header.max_size / 2
            }
        })
    }

    /// One fresh page per node the pending split cascade will divide: the
    /// leaf's new sibling, a sibling for each full retained ancestor, and a
    /// replacement root if the cascade reaches the header. On failure the
    /// partial reservation is returned to the pool and nothing is mutated.
    fn reserve_split_pages(&self, context: &Context) -> BrambleResult<VecDeque<WritePageGuard>> {
        let mut reserved = VecDeque::new();
        match self.try_reserve_split_pages(context, &mut reserved) {
            Ok(()) => Ok(reserved),
            Err(e) => {
                while let Some(guard) = reserved.pop_front() {
                    let page_id = guard.page_id();
                    drop(guard);
                    let _ = self.buffer_pool.delete_page(page_id);
                }
                Err(e)
            }
        }
    }

    fn try_reserve_split_pages(
        &self,
        context: &Context,
        reserved: &mut VecDeque<WritePageGuard>,
    ) -> BrambleResult<()> {
        reserved.push_back(self.buffer_pool.new_page()?);
        // Walk the retained path bottom-up; every entry below the topmost is
        // full and will split in turn.
        for guard in context.write_set.iter().rev() {
            if guard.page_id() == self.header_page_id {
                reserved.push_back(self.buffer_pool.new_page()?);
                break;
            }
            let (header, _) = BPlusTreeInternalPageCodec::decode_header_only(guard.data())?;
            if header.current_size == header.max_size {
                reserved.push_back(self.buffer_pool.new_page()?);
            } else {
                break;
            }
        }
        Ok(())
    }

    /// Split an over-full leaf: the upper half moves into a fresh right
    /// sibling, the leaf chain is relinked, and the right sibling's first key
    /// is posted to the parent.
    fn split_leaf(
        &self,
        context: &mut Context,
        reserved: &mut VecDeque<WritePageGuard>,
        mut left_guard: WritePageGuard,
        mut leaf: BPlusTreeLeafPage,
    ) -> BrambleResult<()> {
        let split_at = (leaf.header.current_size / 2) as usize;
        let right_kvs = leaf.split_off(split_at);

        let mut right_guard = reserved.pop_front().ok_or_else(|| {
            BrambleError::Internal("b+tree split reservation ran dry".to_string())
        })?;
        let right_page_id = right_guard.page_id();
        let mut right = BPlusTreeLeafPage::new(self.key_schema.clone(), self.leaf_max_size);
        right.batch_insert(right_kvs);
        right.header.next_page_id = leaf.header.next_page_id;
        leaf.header.next_page_id = right_page_id;

        let separator = right.key_at(0).clone();
        right_guard.overwrite(&BPlusTreeLeafPageCodec::encode(&right));
        drop(right_guard);

        let left_page_id = left_guard.page_id();
        left_guard.overwrite(&BPlusTreeLeafPageCodec::encode(&leaf));
        drop(left_guard);

        self.insert_into_parent(context, reserved, left_page_id, separator, right_page_id)
    }

    /// Post `(separator, right_page_id)` into the parent of `left_page_id`,
    /// splitting internal nodes upward as needed. An internal split promotes
    /// its median key: the key moves up and the right node's first slot
    /// becomes the sentinel.
    fn insert_into_parent(
        &self,
        context: &mut Context,
        reserved: &mut VecDeque<WritePageGuard>,
        mut left_page_id: PageId,
        mut separator: Tuple,
        mut right_page_id: PageId,
    ) -> BrambleResult<()> {
        loop {
            let Some(mut parent_guard) = context.write_set.pop_back() else {
                return Err(BrambleError::Internal(
                    "b+tree split propagated past the retained descent path".to_string(),
                ));
            };

            if parent_guard.page_id() == self.header_page_id {
                // The root itself split: grow the tree by one level.
                let mut root_guard = reserved.pop_front().ok_or_else(|| {
                    BrambleError::Internal("b+tree split reservation ran dry".to_string())
                })?;
                let mut root =
                    BPlusTreeInternalPage::new(self.key_schema.clone(), self.internal_max_size);
                root.insert(Tuple::empty(self.key_schema.clone()), left_page_id);
                root.insert(separator, right_page_id);
                root_guard.overwrite(&BPlusTreeInternalPageCodec::encode(&root));
                let new_header = BPlusTreeHeaderPage {
                    root_page_id: root_guard.page_id(),
                };
                parent_guard.overwrite(&BPlusTreeHeaderPageCodec::encode(&new_header));
                return Ok(());
            }

            let (mut parent, _) =
                BPlusTreeInternalPageCodec::decode(parent_guard.data(), self.key_schema.clone())?;
            parent.insert(separator, right_page_id);
            if !parent.is_full() {
                parent_guard.overwrite(&BPlusTreeInternalPageCodec::encode(&parent));
                return Ok(());
            }

            let split_at = (parent.header.current_size / 2) as usize;
            let mut right_kvs = parent.split_off(split_at);
            let promoted = right_kvs[0].0.clone();
            right_kvs[0].0 = Tuple::empty(self.key_schema.clone());

            let mut right_guard = reserved.pop_front().ok_or_else(|| {
                BrambleError::Internal("b+tree split reservation ran dry".to_string())
            })?;
            let new_right_page_id = right_guard.page_id();
            let mut right_node =
                BPlusTreeInternalPage::new(self.key_schema.clone(), self.internal_max_size);
            right_node.batch_insert(right_kvs);
            right_guard.overwrite(&BPlusTreeInternalPageCodec::encode(&right_node));
            drop(right_guard);

            parent_guard.overwrite(&BPlusTreeInternalPageCodec::encode(&parent));
            left_page_id = parent_guard.page_id();
            drop(parent_guard);

            separator = promoted;
            right_page_id = new_right_page_id;
        }
    }

    /// Remove a key. Returns false if the key was absent. Underflowing nodes
    /// borrow from or merge with the sibling chosen per the redistribution
    /// policy, cascading up the retained path.
    pub fn delete(&self, key: &Tuple) -> BrambleResult<bool> {
        let mut context = Context::new();
        let header_guard = self.buffer_pool.fetch_page_write(self.header_page_id)?;
        let (header_page, _) = BPlusTreeHeaderPageCodec::decode(header_guard.data())?;
        if header_page.root_page_id == INVALID_PAGE_ID {
            return Ok(false);
        }

        context.push(header_guard);
        let mut current = self.buffer_pool.fetch_page_write(header_page.root_page_id)?;

        loop {
            let (page, _) = BPlusTreePageCodec::decode(current.data(), self.key_schema.clone())?;
            match page {
                BPlusTreePage::Internal(internal) => {
                    let child_page_id = internal.look_up(key);
                    let child_guard = self.buffer_pool.fetch_page_write(child_page_id)?;
                    let child_safe = Self::can_lend_on_delete(child_guard.data())?;
                    context.push(current);
                    if child_safe {
                        context.release_all();
                    }
                    current = child_guard;
                }
                BPlusTreePage::Leaf(mut leaf) => {
                    if !leaf.delete(key) {
                        return Ok(false);
                    }

                    let leaf_is_root = match context.write_set.back() {
                        None => false,
                        Some(guard) => guard.page_id() == self.header_page_id,
                    };

                    if leaf_is_root {
                        if leaf.header.current_size == 0 {
                            // The last key left the tree; drop the root.
                            let mut header_guard = context.write_set.pop_back().unwrap();
                            let new_header = BPlusTreeHeaderPage {
                                root_page_id: INVALID_PAGE_ID,
                            };
                            header_guard.overwrite(&BPlusTreeHeaderPageCodec::encode(&new_header));
                            let leaf_page_id = current.page_id();
                            drop(current);
                            self.buffer_pool.delete_page(leaf_page_id)?;
                            return Ok(true);
                        }
                        current.overwrite(&BPlusTreeLeafPageCodec::encode(&leaf));
                        return Ok(true);
                    }

                    current.overwrite(&BPlusTreeLeafPageCodec::encode(&leaf));
                    if context.write_set.is_empty()
                        || leaf.header.current_size >= leaf.min_size()
                    {
                        return Ok(true);
                    }
                    self.repair_underflow(&mut context, current, BPlusTreePage::Leaf(leaf))?;
                    return Ok(true);
                }
            }
        }
    }

    /// Resolve an underflowing node against the sibling chosen by position:
    /// the left one when the node is rightmost, the right one otherwise.
    /// Merging moves everything into the left node and may cascade to the
    /// parent; borrowing shifts one entry and stops.
    fn repair_underflow(
        &self,
        context: &mut Context,
        mut node_guard: WritePageGuard,
        mut node: BPlusTreePage,
    ) -> BrambleResult<()> {
        loop {
            let mut parent_guard = context.write_set.pop_back().ok_or_else(|| {
                BrambleError::Internal(
                    "b+tree underflow cascaded past the retained descent path".to_string(),
                )
            })?;
            let (mut parent, _) =
                BPlusTreeInternalPageCodec::decode(parent_guard.data(), self.key_schema.clone())?;
            let node_page_id = node_guard.page_id();
            let node_index = parent.child_index_of(node_page_id).ok_or_else(|| {
                BrambleError::Internal(format!(
                    "page {} missing from its parent during underflow repair",
                    node_page_id
                ))
            })?;

            if parent.header.current_size < 2 {
                // Degenerate single-child parent: drop the emptied child and
                // let the parent's own underflow cascade.
                debug_assert_eq!(node.current_size(), 0);
                parent.remove_at(node_index);
                drop(node_guard);
                self.buffer_pool.delete_page(node_page_id)?;
                parent_guard.overwrite(&BPlusTreeInternalPageCodec::encode(&parent));
                match self.finish_parent(context, parent_guard, parent)? {
                    Some((guard, page)) => {
                        node_guard = guard;
                        node = page;
                        continue;
                    }
                    None => return Ok(()),
                }
            }

            let sibling_on_left = node_index + 1 == parent.header.current_size as usize;
            let sibling_index = if sibling_on_left {
                node_index - 1
            } else {
                node_index + 1
            };
            let sibling_page_id = parent.value_at(sibling_index);
            let sibling_guard = self.buffer_pool.fetch_page_write(sibling_page_id)?;
            let (sibling, _) =
                BPlusTreePageCodec::decode(sibling_guard.data(), self.key_schema.clone())?;

            let combined = node.current_size() + sibling.current_size();
            let max_size = match &node {
                BPlusTreePage::Leaf(leaf) => leaf.header.max_size,
                BPlusTreePage::Internal(internal) => internal.header.max_size,
            };

            if combined <= max_size {
                // Merge right into left; the separator demotes for internals.
                let (left_guard, left_page, right_guard, right_page, right_index) =
                    if sibling_on_left {
                        (sibling_guard, sibling, node_guard, node, node_index)
                    } else {
                        (node_guard, node, sibling_guard, sibling, sibling_index)
                    };
                self.merge_into_left(
                    &mut parent,
                    left_guard,
                    left_page,
                    right_guard,
                    right_page,
                    right_index,
                )?;
                parent_guard.overwrite(&BPlusTreeInternalPageCodec::encode(&parent));
                match self.finish_parent(context, parent_guard, parent)? {
                    Some((guard, page)) => {
                        node_guard = guard;
                        node = page;
                        continue;
                    }
                    None => return Ok(()),
                }
            }

            // Enough combined entries: borrow one from the sibling.
            self.redistribute(
                &mut parent,
                node_guard,
                node,
                node_index,
                sibling_guard,
                sibling,
                sibling_index,
                sibling_on_left,
            )?;
            parent_guard.overwrite(&BPlusTreeInternalPageCodec::encode(&parent));
            return Ok(());
        }
    }

    /// After a merge (or child removal) the parent shrank by one entry.
    /// Handles root collapse; otherwise reports whether the parent now
    /// underflows and must itself be repaired.
    #[allow(clippy::type_complexity)]
    fn finish_parent(
        &self,
        context: &mut Context,
        parent_guard: WritePageGuard,
        parent: BPlusTreeInternalPage,
    ) -> BrambleResult<Option<(WritePageGuard, BPlusTreePage)>> {
        let parent_is_root = match context.write_set.back() {
            None => false,
            Some(guard) => guard.page_id() == self.header_page_id,
        };

        if parent_is_root {
            if parent.header.current_size == 1 {
                // An internal root with a single child: promote the child.
                let mut header_guard = context.write_set.pop_back().unwrap();
                let new_header = BPlusTreeHeaderPage {
                    root_page_id: parent.value_at(0),
                };
                header_guard.overwrite(&BPlusTreeHeaderPageCodec::encode(&new_header));
                let parent_page_id = parent_guard.page_id();
                drop(parent_guard);
                self.buffer_pool.delete_page(parent_page_id)?;
            }
            return Ok(None);
        }

        if context.write_set.is_empty() || parent.header.current_size >= parent.min_size() {
            return Ok(None);
        }
        Ok(Some((parent_guard, BPlusTreePage::Internal(parent))))
    }

    fn merge_into_left(
        &self,
        parent: &mut BPlusTreeInternalPage,
        mut left_guard: WritePageGuard,
        left_page: BPlusTreePage,
        right_guard: WritePageGuard,
        right_page: BPlusTreePage,
        right_index: usize,
    ) -> BrambleResult<()> {
        let separator = parent.key_at(right_index).clone();

        match (left_page, right_page) {
            (BPlusTreePage::Leaf(mut left), BPlusTreePage::Leaf(right)) => {
                left.header.next_page_id = right.header.next_page_id;
                left.batch_insert(right.array);
                left_guard.overwrite(&BPlusTreeLeafPageCodec::encode(&left));
            }
            (BPlusTreePage::Internal(mut left), BPlusTreePage::Internal(right)) => {
                let mut kvs = right.array;
                // The separator slots in between the two child ranges.
                kvs[0].0 = separator;
                left.batch_insert(kvs);
                left_guard.overwrite(&BPlusTreeInternalPageCodec::encode(&left));
            }
            _ => {
                return Err(BrambleError::Internal(
                    "cannot merge a leaf with an internal page".to_string(),
                ))
            }
        }

        parent.remove_at(right_index);
        let right_page_id = right_guard.page_id();
        drop(left_guard);
        drop(right_guard);
        self.buffer_pool.delete_page(right_page_id)?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn redistribute(
        &self,
        parent: &mut BPlusTreeInternalPage,
        mut node_guard: WritePageGuard,
        node: BPlusTreePage,
        node_index: usize,
        mut sibling_guard: WritePageGuard,
        sibling: BPlusTreePage,
        sibling_index: usize,
        sibling_on_left: bool,
    ) -> BrambleResult<()> {
        match (node, sibling) {
            (BPlusTreePage::Leaf(mut node), BPlusTreePage::Leaf(mut sibling)) => {
                if sibling_on_left {
                    // Move the left sibling's greatest entry to our front.
                    let kv = sibling.array.pop().ok_or_else(|| {
                        BrambleError::Internal("redistribution from an empty leaf".to_string())
                    })?;
                    sibling.header.current_size -= 1;
                    parent.set_key_at(node_index, kv.0.clone());
                    node.array.insert(0, kv);
                    node.header.current_size += 1;
                } else {
                    // Move the right sibling's least entry to our back.
                    let kv = sibling.array.remove(0);
                    sibling.header.current_size -= 1;
                    node.array.push(kv);
                    node.header.current_size += 1;
                    parent.set_key_at(sibling_index, sibling.key_at(0).clone());
                }
                node_guard.overwrite(&BPlusTreeLeafPageCodec::encode(&node));
                sibling_guard.overwrite(&BPlusTreeLeafPageCodec::encode(&sibling));
            }
            (BPlusTreePage::Internal(mut node), BPlusTreePage::Internal(mut sibling)) => {
                if sibling_on_left {
                    // The old separator drops onto the node's former sentinel
                    // slot; the borrowed child enters with a fresh sentinel.
                    let old_separator = parent.key_at(node_index).clone();
                    let (borrowed_key, borrowed_child) = sibling.array.pop().ok_or_else(|| {
                        BrambleError::Internal("redistribution from an empty internal".to_string())
                    })?;
                    sibling.header.current_size -= 1;
                    node.set_key_at(0, old_separator);
                    node.array
                        .insert(0, (Tuple::empty(self.key_schema.clone()), borrowed_child));
                    node.header.current_size += 1;
                    parent.set_key_at(node_index, borrowed_key);
                } else {
                    // The separator keys the borrowed first child of the
                    // right sibling; the sibling's next key becomes the new
                    // separator.
                    let old_separator = parent.key_at(sibling_index).clone();
                    let (_, borrowed_child) = sibling.array.remove(0);
                    sibling.header.current_size -= 1;
                    let new_separator = sibling.key_at(0).clone();
                    sibling.set_key_at(0, Tuple::empty(self.key_schema.clone()));
                    node.array.push((old_separator, borrowed_child));
                    node.header.current_size += 1;
                    parent.set_key_at(sibling_index, new_separator);
                }
                node_guard.overwrite(&BPlusTreeInternalPageCodec::encode(&node));
                sibling_guard.overwrite(&BPlusTreeInternalPageCodec::encode(&sibling));
            }
            _ => {
                return Err(BrambleError::Internal(
                    "cannot redistribute between a leaf and an internal page".to_string(),
                ))
            }
        }
        Ok(())
    }

    /// Leftmost leaf of the tree, as a decoded snapshot.
    pub(crate) fn first_leaf_page(&self) -> BrambleResult<Option<BPlusTreeLeafPage>> {
        let header_guard = self.buffer_pool.fetch_page_read(self.header_page_id)?;
        let (header_page, _) = BPlusTreeHeaderPageCodec::decode(header_guard.data())?;
        if header_page.root_page_id == INVALID_PAGE_ID {
            return Ok(None);
        }
        let mut guard = self.buffer_pool.fetch_page_read(header_page.root_page_id)?;
        drop(header_guard);
        loop {
            let (page, _) = BPlusTreePageCodec::decode(guard.data(), self.key_schema.clone())?;
            match page {
                BPlusTreePage::Internal(internal) => {
                    guard = self.buffer_pool.fetch_page_read(internal.value_at(0))?;
                }
                BPlusTreePage::Leaf(leaf) => return Ok(Some(leaf)),
            }
        }
    }

    /// Leaf that may contain `key`, as a decoded snapshot.
    pub(crate) fn find_leaf_page(&self, key: &Tuple) -> BrambleResult<Option<BPlusTreeLeafPage>> {
        let header_guard = self.buffer_pool.fetch_page_read(self.header_page_id)?;
        let (header_page, _) = BPlusTreeHeaderPageCodec::decode(header_guard.data())?;
        if header_page.root_page_id == INVALID_PAGE_ID {
            return Ok(None);
        }
        let mut guard = self.buffer_pool.fetch_page_read(header_page.root_page_id)?;
        drop(header_guard);
        loop {
            let (page, _) = BPlusTreePageCodec::decode(guard.data(), self.key_schema.clone())?;
            match page {
                BPlusTreePage::Internal(internal) => {
                    guard = self.buffer_pool.fetch_page_read(internal.look_up(key))?;
                }
                BPlusTreePage::Leaf(leaf) => return Ok(Some(leaf)),
            }
        }
    }

    pub(crate) fn leaf_page_at(&self, page_id: PageId) -> BrambleResult<BPlusTreeLeafPage> {
        let guard = self.buffer_pool.fetch_page_read(page_id)?;
        let (leaf, _) = BPlusTreeLeafPageCodec::decode(guard.data(), self.key_schema.clone())?;
        Ok(leaf)
    }

    /// Walk the whole tree checking the structural invariants: every leaf at
    /// the same depth, per-node size bounds, strictly increasing keys.
    /// Intended for tests.
    pub fn check_integrity(&self) -> BrambleResult<()> {
        let root_page_id = self.get_root_page_id()?;
        if root_page_id == INVALID_PAGE_ID {
            return Ok(());
        }
        let mut leaf_depth = None;
        self.check_subtree(root_page_id, true, 0, &mut leaf_depth)
    }

    fn check_subtree(
        &self,
        page_id: PageId,
        is_root: bool,
        depth: usize,
        leaf_depth: &mut Option<usize>,
    ) -> BrambleResult<()> {
        let guard = self.buffer_pool.fetch_page_read(page_id)?;
        let (page, _) = BPlusTreePageCodec::decode(guard.data(), self.key_schema.clone())?;
        drop(guard);

        match page {
            BPlusTreePage::Leaf(leaf) => {
                match leaf_depth {
                    None => *leaf_depth = Some(depth),
                    Some(expected) => {
                        if *expected != depth {
                            return Err(BrambleError::Internal(format!(
                                "leaf {} at depth {} but expected depth {}",
                                page_id, depth, expected
                            )));
                        }
                    }
                }
                if !is_root && leaf.header.current_size < leaf.min_size() {
                    return Err(BrambleError::Internal(format!(
                        "leaf {} below min size",
                        page_id
                    )));
                }
                for window in leaf.array.windows(2) {
                    if window[0].0 >= window[1].0 {
                        return Err(BrambleError::Internal(format!(
                            "leaf {} keys not strictly increasing",
                            page_id
                        )));
                    }
                }
            }
            BPlusTreePage::Internal(internal) => {
                if !is_root && internal.header.current_size < internal.min_size() {
                    return Err(BrambleError::Internal(format!(
                        "internal {} below min size",
                        page_id
                    )));
                }
                if is_root && internal.header.current_size < 2 {
                    return Err(BrambleError::Internal(
                        "internal root with fewer than two children".to_string(),
                    ));
                }
                for window in internal.array[1..].windows(2) {
                    if window[0].0 >= window[1].0 {
                        return Err(BrambleError::Internal(format!(
                            "internal {} keys not strictly increasing",
                            page_id
                        )));
                    }
                }
                for child in internal.values() {
                    self.check_subtree(child, false, depth + 1, leaf_depth)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Column, DataType, Schema};
    use crate::storage::disk_manager::DiskManager;
    use crate::storage::disk_scheduler::DiskScheduler;
    use crate::storage::index::TreeIndexIterator;
    use rand::seq::SliceRandom;
    use std::sync::{Arc, Barrier};
    use std::thread;
    use tempfile::TempDir;

    fn build_tree(leaf_max: u32, internal_max: u32) -> (TempDir, SchemaRef, Arc<BPlusTreeIndex>) {
        let temp_dir = TempDir::new().unwrap();
        let disk_manager = Arc::new(DiskManager::try_new(temp_dir.path().join("test.db")).unwrap());
        let disk_scheduler = Arc::new(DiskScheduler::new(disk_manager));
        let buffer_pool = Arc::new(BufferPoolManager::new(256, disk_scheduler));
        let key_schema = Arc::new(Schema::new(vec![Column::new("k", DataType::Int32, false)]));
        let index = Arc::new(
            BPlusTreeIndex::try_new(key_schema.clone(), buffer_pool, internal_max, leaf_max)
                .unwrap(),
        );
        (temp_dir, key_schema, index)
    }

    fn key(schema: &SchemaRef, v: i32) -> Tuple {
        Tuple::new(schema.clone(), vec![v.into()])
    }

    fn rid(v: i32) -> RecordId {
        RecordId::new(v as u32, v as u32)
    }

    fn collect_all(index: &Arc<BPlusTreeIndex>) -> Vec<RecordId> {
        let mut iterator = TreeIndexIterator::new(index.clone(), ..);
        let mut rids = vec![];
        while let Some(rid) = iterator.next().unwrap() {
            rids.push(rid);
        }
        rids
    }

    #[test]
    fn insert_and_get() {
        let (_tmp, schema, index) = build_tree(4, 4);
        for v in 1..=16 {
            assert!(index.insert(&key(&schema, v), rid(v)).unwrap());
        }
        for v in 1..=16 {
            assert_eq!(index.get(&key(&schema, v)).unwrap(), Some(rid(v)));
        }
        assert_eq!(index.get(&key(&schema, 0)).unwrap(), None);
        assert_eq!(index.get(&key(&schema, 17)).unwrap(), None);
        index.check_integrity().unwrap();

        let display = crate::utils::util::pretty_format_index_tree(&index).unwrap();
        println!("{display}");
        assert!(display.starts_with("B+ Tree Level No.1:"));
        assert!(display.contains("B+ Tree Level No.3:"));
        assert!(!display.contains("B+ Tree Level No.4:"));
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let (_tmp, schema, index) = build_tree(4, 4);
        assert!(index.insert(&key(&schema, 7), rid(7)).unwrap());
        assert!(!index.insert(&key(&schema, 7), rid(99)).unwrap());
        // The original mapping is untouched.
        assert_eq!(index.get(&key(&schema, 7)).unwrap(), Some(rid(7)));
    }

    #[test]
    fn split_then_range_scan_then_merge() {
        let (_tmp, schema, index) = build_tree(4, 4);
        for v in 1..=16 {
            index.insert(&key(&schema, v), rid(v)).unwrap();
        }
        index.check_integrity().unwrap();

        // Ranged scan from key 5 sees exactly 5..=16.
        let mut iterator = TreeIndexIterator::new(index.clone(), key(&schema, 5)..);
        let mut seen = vec![];
        while let Some(r) = iterator.next().unwrap() {
            seen.push(r);
        }
        assert_eq!(seen, (5..=16).map(rid).collect::<Vec<_>>());

        for v in 5..=8 {
            assert!(index.delete(&key(&schema, v)).unwrap());
        }
        index.check_integrity().unwrap();

        let expected: Vec<RecordId> = (1..=4).chain(9..=16).map(rid).collect();
        assert_eq!(collect_all(&index), expected);
    }

    #[test]
    fn delete_absent_key_returns_false() {
        let (_tmp, schema, index) = build_tree(4, 4);
        assert!(!index.delete(&key(&schema, 1)).unwrap());
        index.insert(&key(&schema, 1), rid(1)).unwrap();
        assert!(!index.delete(&key(&schema, 2)).unwrap());
        assert!(index.delete(&key(&schema, 1)).unwrap());
    }

    #[test]
    fn delete_everything_resets_the_root() {
        let (_tmp, schema, index) = build_tree(4, 4);
        for v in 1..=32 {
            index.insert(&key(&schema, v), rid(v)).unwrap();
        }
        for v in 1..=32 {
            assert!(index.delete(&key(&schema, v)).unwrap(), "delete {v}");
        }
        assert!(index.is_empty().unwrap());

        // The tree is usable again afterwards.
        index.insert(&key(&schema, 5), rid(5)).unwrap();
        assert_eq!(index.get(&key(&schema, 5)).unwrap(), Some(rid(5)));
    }

    #[test]
    fn iterator_bounds() {
        let (_tmp, schema, index) = build_tree(4, 4);
        for v in 1..=11 {
            index.insert(&key(&schema, v), rid(v)).unwrap();
        }

        let mut iterator = TreeIndexIterator::new(index.clone(), ..key(&schema, 3));
        assert_eq!(iterator.next().unwrap(), Some(rid(1)));
        assert_eq!(iterator.next().unwrap(), Some(rid(2)));
        assert_eq!(iterator.next().unwrap(), None);

        let mut iterator =
            TreeIndexIterator::new(index.clone(), key(&schema, 3)..=key(&schema, 5));
        assert_eq!(iterator.next().unwrap(), Some(rid(3)));
        assert_eq!(iterator.next().unwrap(), Some(rid(4)));
        assert_eq!(iterator.next().unwrap(), Some(rid(5)));
        assert_eq!(iterator.next().unwrap(), None);

        use std::ops::Bound;
        let mut iterator = TreeIndexIterator::new(
            index.clone(),
            (
                Bound::Excluded(key(&schema, 6)),
                Bound::Excluded(key(&schema, 8)),
            ),
        );
        assert_eq!(iterator.next().unwrap(), Some(rid(7)));
        assert_eq!(iterator.next().unwrap(), None);

        let mut iterator = TreeIndexIterator::new(index.clone(), key(&schema, 9)..);
        assert_eq!(iterator.next().unwrap(), Some(rid(9)));
        assert_eq!(iterator.next().unwrap(), Some(rid(10)));
        assert_eq!(iterator.next().unwrap(), Some(rid(11)));
        assert_eq!(iterator.next().unwrap(), None);
        assert_eq!(iterator.next().unwrap(), None);
    }

    #[test]
    fn shuffled_insert_delete_keeps_order() {
        let (_tmp, schema, index) = build_tree(5, 5);
        let mut rng = rand::rng();

        let mut keys: Vec<i32> = (0..500).collect();
        keys.shuffle(&mut rng);
        for &v in keys.iter() {
            index.insert(&key(&schema, v), rid(v)).unwrap();
        }
        index.check_integrity().unwrap();
        assert_eq!(collect_all(&index).len(), 500);

        let mut to_delete: Vec<i32> = (0..500).filter(|v| v % 2 == 0).collect();
        to_delete.shuffle(&mut rng);
        for &v in to_delete.iter() {
            assert!(index.delete(&key(&schema, v)).unwrap());
        }
        index.check_integrity().unwrap();

        let expected: Vec<RecordId> = (0..500).filter(|v| v % 2 == 1).map(rid).collect();
        assert_eq!(collect_all(&index), expected);
    }

    #[test]
    fn insert_then_delete_restores_previous_state() {
        let (_tmp, schema, index) = build_tree(4, 4);
        for v in [10, 20, 30, 40] {
            index.insert(&key(&schema, v), rid(v)).unwrap();
        }
        let before = collect_all(&index);

        index.insert(&key(&schema, 25), rid(25)).unwrap();
        index.delete(&key(&schema, 25)).unwrap();
        assert_eq!(collect_all(&index), before);
        index.check_integrity().unwrap();
    }

    #[test]
    fn concurrent_get() {
        let (_tmp, schema, index) = build_tree(10, 10);
        for v in 0..1000 {
            index.insert(&key(&schema, v), rid(v)).unwrap();
        }

        let mut handles = vec![];
        for t in 0..8 {
            let index = index.clone();
            let schema = schema.clone();
            handles.push(thread::spawn(move || {
                for i in 0..500 {
                    let v = (t * 125 + i) % 1000;
                    assert_eq!(index.get(&key(&schema, v)).unwrap(), Some(rid(v)));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn concurrent_insert_then_delete() {
        const THREADS: usize = 4;
        const KEYS_PER_THREAD: i32 = 250;
        const TOTAL: i32 = THREADS as i32 * KEYS_PER_THREAD;

        let (_tmp, schema, index) = build_tree(10, 10);

        let barrier = Arc::new(Barrier::new(THREADS));
        let mut handles = vec![];
        for t in 0..THREADS {
            let index = index.clone();
            let schema = schema.clone();
            let barrier = barrier.clone();
            handles.push(thread::spawn(move || {
                let start = t as i32 * KEYS_PER_THREAD;
                barrier.wait();
                for v in start..start + KEYS_PER_THREAD {
                    index.insert(&key(&schema, v), rid(v)).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        for v in 0..TOTAL {
            assert_eq!(index.get(&key(&schema, v)).unwrap(), Some(rid(v)), "key {v}");
        }
        index.check_integrity().unwrap();

        let barrier = Arc::new(Barrier::new(THREADS));
        let mut handles = vec![];
        for t in 0..THREADS {
            let index = index.clone();
            let schema = schema.clone();
            let barrier = barrier.clone();
            handles.push(thread::spawn(move || {
                let start = t as i32 * KEYS_PER_THREAD;
                barrier.wait();
                for v in start..start + KEYS_PER_THREAD {
                    assert!(index.delete(&key(&schema, v)).unwrap());
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(index.is_empty().unwrap());
    }
}
