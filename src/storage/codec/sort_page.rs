use crate::buffer::PAGE_SIZE;
use crate::catalog::SchemaRef;
use crate::error::{BrambleError, BrambleResult};
use crate::storage::codec::{CommonCodec, DecodedData, TupleCodec};
use crate::storage::page::{SortPage, SortPageHeader};

pub struct SortPageCodec;

impl SortPageCodec {
    pub fn encode(page: &SortPage) -> Vec<u8> {
        let mut bytes = CommonCodec::encode_u32(page.header.tuple_count);
        bytes.extend(CommonCodec::encode_u32(page.header.tuple_size));
        bytes.extend(CommonCodec::encode_u32(page.header.max_tuple_count));
        for tuple in page.tuples.iter() {
            let tuple_bytes = TupleCodec::encode(tuple);
            debug_assert_eq!(tuple_bytes.len(), page.header.tuple_size as usize);
            bytes.extend(tuple_bytes);
        }
        assert!(bytes.len() <= PAGE_SIZE, "sort page overflows page size");
        bytes.extend(vec![0; PAGE_SIZE - bytes.len()]);
        bytes
    }

    pub fn decode(bytes: &[u8], schema: SchemaRef) -> BrambleResult<DecodedData<SortPage>> {
        if bytes.len() != PAGE_SIZE {
            return Err(BrambleError::Storage(format!(
                "Sort page size is {} instead of {}",
                bytes.len(),
                PAGE_SIZE
            )));
        }
        let mut left_bytes = bytes;
        let (tuple_count, offset) = CommonCodec::decode_u32(left_bytes)?;
        left_bytes = &left_bytes[offset..];
        let (tuple_size, offset) = CommonCodec::decode_u32(left_bytes)?;
        left_bytes = &left_bytes[offset..];
        let (max_tuple_count, offset) = CommonCodec::decode_u32(left_bytes)?;
        left_bytes = &left_bytes[offset..];

        let mut tuples = Vec::with_capacity(tuple_count as usize);
        for _ in 0..tuple_count {
            let (tuple, offset) = TupleCodec::decode(left_bytes, schema.clone())?;
            left_bytes = &left_bytes[offset..];
            tuples.push(tuple);
        }

        Ok((
            SortPage {
                schema,
                header: SortPageHeader {
                    tuple_count,
                    tuple_size,
                    max_tuple_count,
                },
                tuples,
            },
            PAGE_SIZE,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Column, DataType, Schema};
    use crate::storage::tuple::Tuple;
    use std::sync::Arc;

    #[test]
    fn sort_page_roundtrip() {
        let schema = Arc::new(Schema::new(vec![
            Column::new("a", DataType::Int32, false),
            Column::new("b", DataType::Int32, false),
        ]));
        let mut page = SortPage::try_new(schema.clone()).unwrap();
        for i in 0..5i32 {
            assert!(page.insert_tuple(Tuple::new(schema.clone(), vec![i.into(), (i * 2).into()])));
        }

        let encoded = SortPageCodec::encode(&page);
        let (decoded, _) = SortPageCodec::decode(&encoded, schema).unwrap();
        assert_eq!(decoded, page);
    }
}
