use crate::buffer::PAGE_SIZE;
use crate::catalog::SchemaRef;
use crate::error::{BrambleError, BrambleResult};
use crate::storage::codec::{CommonCodec, DecodedData};
use crate::storage::page::{TablePage, TablePageHeader, TupleInfo, TupleMeta};

pub struct TupleInfoCodec;

impl TupleInfoCodec {
    pub const fn encoded_size() -> usize {
        // offset (2) + size (2) + is_deleted (1)
        5
    }

    pub fn encode(info: &TupleInfo) -> Vec<u8> {
        let mut bytes = CommonCodec::encode_u16(info.offset);
        bytes.extend(CommonCodec::encode_u16(info.size));
        bytes.extend(CommonCodec::encode_bool(info.meta.is_deleted));
        bytes
    }

    pub fn decode(bytes: &[u8]) -> BrambleResult<DecodedData<TupleInfo>> {
        let mut left_bytes = bytes;
        let (offset, consumed) = CommonCodec::decode_u16(left_bytes)?;
        left_bytes = &left_bytes[consumed..];
        let (size, consumed) = CommonCodec::decode_u16(left_bytes)?;
        left_bytes = &left_bytes[consumed..];
        let (is_deleted, consumed) = CommonCodec::decode_bool(left_bytes)?;
        left_bytes = &left_bytes[consumed..];
        Ok((
            TupleInfo {
                offset,
                size,
                meta: TupleMeta { is_deleted },
            },
            bytes.len() - left_bytes.len(),
        ))
    }
}

pub struct TablePageHeaderCodec;

impl TablePageHeaderCodec {
    pub fn encode(header: &TablePageHeader) -> Vec<u8> {
        let mut bytes = CommonCodec::encode_u32(header.next_page_id);
        bytes.extend(CommonCodec::encode_u16(header.num_tuples));
        bytes.extend(CommonCodec::encode_u16(header.num_deleted_tuples));
        for info in header.tuple_infos.iter() {
            bytes.extend(TupleInfoCodec::encode(info));
        }
        bytes
    }

    pub fn decode(bytes: &[u8]) -> BrambleResult<DecodedData<TablePageHeader>> {
        let mut left_bytes = bytes;
        let (next_page_id, consumed) = CommonCodec::decode_u32(left_bytes)?;
        left_bytes = &left_bytes[consumed..];
        let (num_tuples, consumed) = CommonCodec::decode_u16(left_bytes)?;
        left_bytes = &left_bytes[consumed..];
        let (num_deleted_tuples, consumed) = CommonCodec::decode_u16(left_bytes)?;
        left_bytes = &left_bytes[consumed..];

        let mut tuple_infos = Vec::with_capacity(num_tuples as usize);
        for _ in 0..num_tuples {
            let (info, consumed) = TupleInfoCodec::decode(left_bytes)?;
            left_bytes = &left_bytes[consumed..];
            tuple_infos.push(info);
        }
        Ok((
            TablePageHeader {
                next_page_id,
                num_tuples,
                num_deleted_tuples,
                tuple_infos,
            },
            bytes.len() - left_bytes.len(),
        ))
    }
}

pub struct TablePageCodec;

impl TablePageCodec {
    pub fn encode(page: &TablePage) -> Vec<u8> {
        let header_bytes = TablePageHeaderCodec::encode(&page.header);
        let mut bytes = page.data.to_vec();
        bytes[0..header_bytes.len()].copy_from_slice(&header_bytes);
        bytes
    }

    pub fn decode(bytes: &[u8], schema: SchemaRef) -> BrambleResult<DecodedData<TablePage>> {
        if bytes.len() != PAGE_SIZE {
            return Err(BrambleError::Storage(format!(
                "Table page size is {} instead of {}",
                bytes.len(),
                PAGE_SIZE
            )));
        }
        let (header, _) = TablePageHeaderCodec::decode(bytes)?;
        let mut data = [0u8; PAGE_SIZE];
        data.copy_from_slice(bytes);
        Ok((
            TablePage {
                schema,
                header,
                data,
            },
            PAGE_SIZE,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::INVALID_PAGE_ID;
    use crate::catalog::{Column, DataType, Schema};
    use crate::storage::page::EMPTY_TUPLE_META;
    use crate::storage::tuple::Tuple;
    use std::sync::Arc;

    #[test]
    fn table_page_roundtrip() {
        let schema = Arc::new(Schema::new(vec![
            Column::new("a", DataType::Int32, false),
            Column::new("b", DataType::Varchar(None), true),
        ]));
        let mut page = TablePage::new(schema.clone(), INVALID_PAGE_ID);
        page.insert_tuple(
            &EMPTY_TUPLE_META,
            &Tuple::new(schema.clone(), vec![7i32.into(), "seven".into()]),
        )
        .unwrap();
        page.insert_tuple(
            &TupleMeta { is_deleted: true },
            &Tuple::new(schema.clone(), vec![8i32.into(), "eight".into()]),
        )
        .unwrap();

        let encoded = TablePageCodec::encode(&page);
        let (decoded, _) = TablePageCodec::decode(&encoded, schema).unwrap();
        assert_eq!(decoded.header, page.header);
        assert_eq!(decoded.tuple(0).unwrap(), page.tuple(0).unwrap());
        assert!(decoded.tuple_meta(1).unwrap().is_deleted);
    }
}
