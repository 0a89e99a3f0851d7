use crate::buffer::{PageId, INVALID_PAGE_ID, PAGE_SIZE};
use crate::catalog::SchemaRef;
use crate::error::{BrambleError, BrambleResult};
use crate::storage::codec::{TablePageHeaderCodec, TupleCodec, TupleInfoCodec};
use crate::storage::tuple::Tuple;
use std::fmt::{Display, Formatter};

/**
 * Slotted page format:
 * ```text
 *  ---------------------------------------------------------
 *  | HEADER | ... FREE SPACE ... | ... INSERTED TUPLES ... |
 *  ---------------------------------------------------------
 *                                ^
 *                                free space pointer
 * ```
 *
 * Header format (size in bytes):
 * ```text
 *  ------------------------------------------------------------------
 *  | NextPageId (4) | NumTuples (2) | NumDeletedTuples (2)           |
 *  | Tuple_1 offset+size+meta | Tuple_2 offset+size+meta | ...       |
 *  ------------------------------------------------------------------
 * ```
 */
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TablePage {
    pub schema: SchemaRef,
    pub header: TablePageHeader,
    // Raw page image; tuple payloads grow from the tail.
    pub data: [u8; PAGE_SIZE],
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TablePageHeader {
    pub next_page_id: PageId,
    pub num_tuples: u16,
    pub num_deleted_tuples: u16,
    pub tuple_infos: Vec<TupleInfo>,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct TupleInfo {
    pub offset: u16,
    pub size: u16,
    pub meta: TupleMeta,
}

/// Per-tuple bookkeeping observed by operators. Deleted rows keep their slot
/// and are skipped at scan time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TupleMeta {
    pub is_deleted: bool,
}

pub const EMPTY_TUPLE_META: TupleMeta = TupleMeta { is_deleted: false };

pub const INVALID_RID: RecordId = RecordId {
    page_id: INVALID_PAGE_ID,
    slot_num: 0,
};

#[derive(derive_new::new, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot_num: u32,
}

impl Display for RecordId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.page_id, self.slot_num)
    }
}

impl TablePage {
    pub fn new(schema: SchemaRef, next_page_id: PageId) -> Self {
        Self {
            schema,
            header: TablePageHeader {
                next_page_id,
                num_tuples: 0,
                num_deleted_tuples: 0,
                tuple_infos: Vec::new(),
            },
            data: [0; PAGE_SIZE],
        }
    }

    /// Offset the next tuple would be stored at, or an error if it does not
    /// fit.
    pub fn next_tuple_offset(&self, tuple: &Tuple) -> BrambleResult<usize> {
        let slot_end_offset = if self.header.num_tuples > 0 {
            self.header.tuple_infos[self.header.num_tuples as usize - 1].offset as usize
        } else {
            PAGE_SIZE
        };

        let tuple_size = TupleCodec::encode(tuple).len();
        if slot_end_offset < tuple_size {
            return Err(BrambleError::Storage(
                "No enough space to store tuple".to_string(),
            ));
        }
        let tuple_offset = slot_end_offset - tuple_size;

        // The header grows by one slot entry when this tuple lands.
        let min_tuple_offset = TablePageHeaderCodec::encode(&self.header).len()
            + TupleInfoCodec::encoded_size();
        if tuple_offset < min_tuple_offset {
            return Err(BrambleError::Storage(
                "No enough space to store tuple".to_string(),
            ));
        }
        Ok(tuple_offset)
    }

    pub fn insert_tuple(&mut self, meta: &TupleMeta, tuple: &Tuple) -> BrambleResult<u16> {
        let tuple_offset = self.next_tuple_offset(tuple)?;
        let slot_id = self.header.num_tuples;
        let tuple_bytes = TupleCodec::encode(tuple);
        debug_assert!(tuple_bytes.len() < u16::MAX as usize);

        self.header.tuple_infos.push(TupleInfo {
            offset: tuple_offset as u16,
            size: tuple_bytes.len() as u16,
            meta: *meta,
        });
        self.header.num_tuples += 1;
        if meta.is_deleted {
            self.header.num_deleted_tuples += 1;
        }

        self.data[tuple_offset..tuple_offset + tuple_bytes.len()].copy_from_slice(&tuple_bytes);
        Ok(slot_id)
    }

    pub fn update_tuple_meta(&mut self, meta: TupleMeta, slot_id: u16) -> BrambleResult<()> {
        let info = self
            .header
            .tuple_infos
            .get_mut(slot_id as usize)
            .ok_or_else(|| {
                BrambleError::InvalidArgument(format!("tuple slot {} out of range", slot_id))
            })?;
        if meta.is_deleted && !info.meta.is_deleted {
            self.header.num_deleted_tuples += 1;
        } else if !meta.is_deleted && info.meta.is_deleted {
            self.header.num_deleted_tuples -= 1;
        }
        info.meta = meta;
        Ok(())
    }

    pub fn tuple(&self, slot_id: u16) -> BrambleResult<(TupleMeta, Tuple)> {
        let info = self
            .header
            .tuple_infos
            .get(slot_id as usize)
            .ok_or_else(|| {
                BrambleError::InvalidArgument(format!("tuple slot {} out of range", slot_id))
            })?;
        let start = info.offset as usize;
        let end = start + info.size as usize;
        let (tuple, _) = TupleCodec::decode(&self.data[start..end], self.schema.clone())?;
        Ok((info.meta, tuple))
    }

    pub fn tuple_meta(&self, slot_id: u16) -> BrambleResult<TupleMeta> {
        Ok(self.tuple(slot_id)?.0)
    }

    /// First live slot after `rid` within this page.
    pub fn get_next_rid(&self, rid: &RecordId) -> Option<RecordId> {
        let mut slot = rid.slot_num + 1;
        while slot < self.header.num_tuples as u32 {
            if !self.header.tuple_infos[slot as usize].meta.is_deleted {
                return Some(RecordId::new(rid.page_id, slot));
            }
            slot += 1;
        }
        None
    }
}
