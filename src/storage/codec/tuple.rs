use crate::catalog::SchemaRef;
use crate::error::BrambleResult;
use crate::storage::codec::{CommonCodec, DecodedData, ScalarValueCodec};
use crate::storage::page::RecordId;
use crate::storage::tuple::Tuple;

pub struct TupleCodec;

impl TupleCodec {
    pub fn encode(tuple: &Tuple) -> Vec<u8> {
        let mut bytes = vec![];
        for value in tuple.data.iter() {
            bytes.extend(ScalarValueCodec::encode(value));
        }
        bytes
    }

    pub fn decode(bytes: &[u8], schema: SchemaRef) -> BrambleResult<DecodedData<Tuple>> {
        let mut left_bytes = bytes;
        let mut data = vec![];
        for col in schema.columns.iter() {
            let (value, offset) = ScalarValueCodec::decode(left_bytes, col.data_type)?;
            left_bytes = &left_bytes[offset..];
            data.push(value);
        }
        Ok((Tuple::new(schema, data), bytes.len() - left_bytes.len()))
    }
}

pub struct RidCodec;

impl RidCodec {
    pub fn encode(rid: &RecordId) -> Vec<u8> {
        let mut bytes = CommonCodec::encode_u32(rid.page_id);
        bytes.extend(CommonCodec::encode_u32(rid.slot_num));
        bytes
    }

    pub fn decode(bytes: &[u8]) -> BrambleResult<DecodedData<RecordId>> {
        let mut left_bytes = bytes;
        let (page_id, offset) = CommonCodec::decode_u32(left_bytes)?;
        left_bytes = &left_bytes[offset..];
        let (slot_num, offset) = CommonCodec::decode_u32(left_bytes)?;
        left_bytes = &left_bytes[offset..];
        Ok((
            RecordId::new(page_id, slot_num),
            bytes.len() - left_bytes.len(),
        ))
    }
}
