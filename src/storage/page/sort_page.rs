use crate::buffer::PAGE_SIZE;
use crate::catalog::SchemaRef;
use crate::error::{BrambleError, BrambleResult};
use crate::storage::tuple::Tuple;

/// Header size of a sort page: TupleCount (4) | TupleSize (4) | MaxTupleCount (4).
pub const SORT_PAGE_HEADER_SIZE: usize = 12;

/// Intermediate page for external merge sort. Only fixed-length tuples are
/// supported; the capacity is derived from the schema's encoded tuple width.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SortPage {
    pub schema: SchemaRef,
    pub header: SortPageHeader,
    pub tuples: Vec<Tuple>,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct SortPageHeader {
    pub tuple_count: u32,
    pub tuple_size: u32,
    pub max_tuple_count: u32,
}

impl SortPage {
    pub fn try_new(schema: SchemaRef) -> BrambleResult<Self> {
        let tuple_size = schema.fixed_tuple_width().ok_or_else(|| {
            BrambleError::NotSupport(
                "external merge sort requires a fixed-length tuple layout".to_string(),
            )
        })?;
        let max_tuple_count = (PAGE_SIZE - SORT_PAGE_HEADER_SIZE) / tuple_size;
        Ok(Self {
            schema,
            header: SortPageHeader {
                tuple_count: 0,
                tuple_size: tuple_size as u32,
                max_tuple_count: max_tuple_count as u32,
            },
            tuples: Vec::with_capacity(max_tuple_count),
        })
    }

    pub fn is_full(&self) -> bool {
        self.header.tuple_count >= self.header.max_tuple_count
    }

    pub fn tuple_count(&self) -> usize {
        self.header.tuple_count as usize
    }

    /// Append a tuple; returns false when the page is full.
    pub fn insert_tuple(&mut self, tuple: Tuple) -> bool {
        if self.is_full() {
            return false;
        }
        self.tuples.push(tuple);
        self.header.tuple_count += 1;
        true
    }

    pub fn tuple_at(&self, index: usize) -> BrambleResult<&Tuple> {
        self.tuples.get(index).ok_or_else(|| {
            BrambleError::InvalidArgument(format!("sort page tuple index {} out of range", index))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Column, DataType, Schema};
    use std::sync::Arc;

    #[test]
    fn capacity_comes_from_tuple_width() {
        let schema = Arc::new(Schema::new(vec![
            Column::new("a", DataType::Int32, false),
            Column::new("b", DataType::Int64, false),
        ]));
        let page = SortPage::try_new(schema).unwrap();
        // 1 + 4 plus 1 + 8 bytes per tuple.
        assert_eq!(page.header.tuple_size, 14);
        assert_eq!(page.header.max_tuple_count as usize, (PAGE_SIZE - 12) / 14);
    }

    #[test]
    fn varchar_schemas_are_rejected() {
        let schema = Arc::new(Schema::new(vec![Column::new(
            "v",
            DataType::Varchar(None),
            false,
        )]));
        assert!(SortPage::try_new(schema).is_err());
    }

    #[test]
    fn fills_up_and_refuses_overflow() {
        let schema = Arc::new(Schema::new(vec![Column::new("a", DataType::Int64, false)]));
        let mut page = SortPage::try_new(schema.clone()).unwrap();
        let mut inserted = 0u32;
        while page.insert_tuple(Tuple::new(schema.clone(), vec![(inserted as i64).into()])) {
            inserted += 1;
        }
        assert_eq!(inserted, page.header.max_tuple_count);
        assert!(page.is_full());
    }
}
