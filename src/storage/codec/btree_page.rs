use crate::buffer::PAGE_SIZE;
use crate::catalog::SchemaRef;
use crate::error::{BrambleError, BrambleResult};
use crate::storage::codec::{CommonCodec, DecodedData, RidCodec, TupleCodec};
use crate::storage::page::{
    BPlusTreeHeaderPage, BPlusTreeInternalPage, BPlusTreeInternalPageHeader, BPlusTreeLeafPage,
    BPlusTreeLeafPageHeader, BPlusTreePage, BPlusTreePageType,
};

pub struct BPlusTreePageTypeCodec;

impl BPlusTreePageTypeCodec {
    pub fn encode(page_type: &BPlusTreePageType) -> Vec<u8> {
        match page_type {
            BPlusTreePageType::LeafPage => CommonCodec::encode_u32(1),
            BPlusTreePageType::InternalPage => CommonCodec::encode_u32(2),
        }
    }

    pub fn decode(bytes: &[u8]) -> BrambleResult<DecodedData<BPlusTreePageType>> {
        let (flag, offset) = CommonCodec::decode_u32(bytes)?;
        match flag {
            1 => Ok((BPlusTreePageType::LeafPage, offset)),
            2 => Ok((BPlusTreePageType::InternalPage, offset)),
            _ => Err(BrambleError::Storage(format!(
                "Invalid b+tree page type {}",
                flag
            ))),
        }
    }
}

pub struct BPlusTreeHeaderPageCodec;

impl BPlusTreeHeaderPageCodec {
    pub fn encode(page: &BPlusTreeHeaderPage) -> Vec<u8> {
        let mut bytes = CommonCodec::encode_u32(page.root_page_id);
        bytes.extend(vec![0; PAGE_SIZE - bytes.len()]);
        bytes
    }

    pub fn decode(bytes: &[u8]) -> BrambleResult<DecodedData<BPlusTreeHeaderPage>> {
        let (root_page_id, offset) = CommonCodec::decode_u32(bytes)?;
        Ok((BPlusTreeHeaderPage { root_page_id }, offset))
    }
}

pub struct BPlusTreePageCodec;

impl BPlusTreePageCodec {
    pub fn encode(page: &BPlusTreePage) -> Vec<u8> {
        match page {
            BPlusTreePage::Leaf(page) => BPlusTreeLeafPageCodec::encode(page),
            BPlusTreePage::Internal(page) => BPlusTreeInternalPageCodec::encode(page),
        }
    }

    pub fn decode(bytes: &[u8], schema: SchemaRef) -> BrambleResult<DecodedData<BPlusTreePage>> {
        let (page_type, _) = BPlusTreePageTypeCodec::decode(bytes)?;
        match page_type {
            BPlusTreePageType::LeafPage => {
                let (page, offset) = BPlusTreeLeafPageCodec::decode(bytes, schema)?;
                Ok((BPlusTreePage::Leaf(page), offset))
            }
            BPlusTreePageType::InternalPage => {
                let (page, offset) = BPlusTreeInternalPageCodec::decode(bytes, schema)?;
                Ok((BPlusTreePage::Internal(page), offset))
            }
        }
    }
}

pub struct BPlusTreeLeafPageHeaderCodec;

impl BPlusTreeLeafPageHeaderCodec {
    pub fn encode(header: &BPlusTreeLeafPageHeader) -> Vec<u8> {
        let mut bytes = BPlusTreePageTypeCodec::encode(&header.page_type);
        bytes.extend(CommonCodec::encode_u32(header.current_size));
        bytes.extend(CommonCodec::encode_u32(header.max_size));
        bytes.extend(CommonCodec::encode_u32(header.next_page_id));
        bytes
    }

    pub fn decode(bytes: &[u8]) -> BrambleResult<DecodedData<BPlusTreeLeafPageHeader>> {
        let mut left_bytes = bytes;
        let (page_type, offset) = BPlusTreePageTypeCodec::decode(left_bytes)?;
        left_bytes = &left_bytes[offset..];
        let (current_size, offset) = CommonCodec::decode_u32(left_bytes)?;
        left_bytes = &left_bytes[offset..];
        let (max_size, offset) = CommonCodec::decode_u32(left_bytes)?;
        left_bytes = &left_bytes[offset..];
        let (next_page_id, offset) = CommonCodec::decode_u32(left_bytes)?;
        left_bytes = &left_bytes[offset..];
        Ok((
            BPlusTreeLeafPageHeader {
                page_type,
                current_size,
                max_size,
                next_page_id,
            },
            bytes.len() - left_bytes.len(),
        ))
    }
}

pub struct BPlusTreeLeafPageCodec;

impl BPlusTreeLeafPageCodec {
    pub fn encode(page: &BPlusTreeLeafPage) -> Vec<u8> {
        let mut bytes = BPlusTreeLeafPageHeaderCodec::encode(&page.header);
        for (tuple, rid) in page.array.iter() {
            bytes.extend(TupleCodec::encode(tuple));
            bytes.extend(RidCodec::encode(rid));
        }
        assert!(bytes.len() <= PAGE_SIZE, "leaf page overflows page size");
        bytes.extend(vec![0; PAGE_SIZE - bytes.len()]);
        bytes
    }

    pub fn decode(
        bytes: &[u8],
        schema: SchemaRef,
    ) -> BrambleResult<DecodedData<BPlusTreeLeafPage>> {
        let (header, offset) = BPlusTreeLeafPageHeaderCodec::decode(bytes)?;
        if !matches!(header.page_type, BPlusTreePageType::LeafPage) {
            return Err(BrambleError::Storage(
                "Index page type must be leaf page".to_string(),
            ));
        }
        let mut left_bytes = &bytes[offset..];

        let mut array = vec![];
        for _ in 0..header.current_size {
            let (tuple, offset) = TupleCodec::decode(left_bytes, schema.clone())?;
            left_bytes = &left_bytes[offset..];
            let (rid, offset) = RidCodec::decode(left_bytes)?;
            left_bytes = &left_bytes[offset..];
            array.push((tuple, rid));
        }

        Ok((
            BPlusTreeLeafPage {
                schema,
                header,
                array,
            },
            PAGE_SIZE,
        ))
    }

    pub fn decode_header_only(bytes: &[u8]) -> BrambleResult<DecodedData<BPlusTreeLeafPageHeader>> {
        BPlusTreeLeafPageHeaderCodec::decode(bytes)
    }
}

pub struct BPlusTreeInternalPageHeaderCodec;

impl BPlusTreeInternalPageHeaderCodec {
    pub fn encode(header: &BPlusTreeInternalPageHeader) -> Vec<u8> {
        let mut bytes = BPlusTreePageTypeCodec::encode(&header.page_type);
        bytes.extend(CommonCodec::encode_u32(header.current_size));
        bytes.extend(CommonCodec::encode_u32(header.max_size));
        bytes
    }

    pub fn decode(bytes: &[u8]) -> BrambleResult<DecodedData<BPlusTreeInternalPageHeader>> {
        let mut left_bytes = bytes;
        let (page_type, offset) = BPlusTreePageTypeCodec::decode(left_bytes)?;
        left_bytes = &left_bytes[offset..];
        let (current_size, offset) = CommonCodec::decode_u32(left_bytes)?;
        left_bytes = &left_bytes[offset..];
        let (max_size, offset) = CommonCodec::decode_u32(left_bytes)?;
        left_bytes = &left_bytes[offset..];
        Ok((
            BPlusTreeInternalPageHeader {
                page_type,
                current_size,
                max_size,
            },
            bytes.len() - left_bytes.len(),
        ))
    }
}

pub struct BPlusTreeInternalPageCodec;

impl BPlusTreeInternalPageCodec {
    pub fn encode(page: &BPlusTreeInternalPage) -> Vec<u8> {
        let mut bytes = BPlusTreeInternalPageHeaderCodec::encode(&page.header);
        for (tuple, page_id) in page.array.iter() {
            bytes.extend(TupleCodec::encode(tuple));
            bytes.extend(CommonCodec::encode_u32(*page_id));
        }
        assert!(bytes.len() <= PAGE_SIZE, "internal page overflows page size");
        bytes.extend(vec![0; PAGE_SIZE - bytes.len()]);
        bytes
    }

    pub fn decode(
        bytes: &[u8],
        schema: SchemaRef,
    ) -> BrambleResult<DecodedData<BPlusTreeInternalPage>> {
        let (header, offset) = BPlusTreeInternalPageHeaderCodec::decode(bytes)?;
        if !matches!(header.page_type, BPlusTreePageType::InternalPage) {
            return Err(BrambleError::Storage(
                "Index page type must be internal page".to_string(),
            ));
        }
        let mut left_bytes = &bytes[offset..];

        let mut array = vec![];
        for _ in 0..header.current_size {
            let (tuple, offset) = TupleCodec::decode(left_bytes, schema.clone())?;
            left_bytes = &left_bytes[offset..];
            let (page_id, offset) = CommonCodec::decode_u32(left_bytes)?;
            left_bytes = &left_bytes[offset..];
            array.push((tuple, page_id));
        }

        Ok((
            BPlusTreeInternalPage {
                schema,
                header,
                array,
            },
            PAGE_SIZE,
        ))
    }

    pub fn decode_header_only(
        bytes: &[u8],
    ) -> BrambleResult<DecodedData<BPlusTreeInternalPageHeader>> {
        BPlusTreeInternalPageHeaderCodec::decode(bytes)
    }
}
