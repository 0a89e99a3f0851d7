use crate::error::{BrambleError, BrambleResult};
use crate::storage::codec::DecodedData;

/// Big-endian primitives shared by every page codec.
pub struct CommonCodec;

macro_rules! impl_int_codec {
    ($encode:ident, $decode:ident, $ty:ty, $len:expr) => {
        pub fn $encode(data: $ty) -> Vec<u8> {
            data.to_be_bytes().to_vec()
        }

        pub fn $decode(bytes: &[u8]) -> BrambleResult<DecodedData<$ty>> {
            if bytes.len() < $len {
                return Err(BrambleError::Internal(format!(
                    "bytes length {} is less than {}",
                    bytes.len(),
                    $len
                )));
            }
            let mut buf = [0u8; $len];
            buf.copy_from_slice(&bytes[..$len]);
            Ok((<$ty>::from_be_bytes(buf), $len))
        }
    };
}

impl CommonCodec {
    impl_int_codec!(encode_u8, decode_u8, u8, 1);
    impl_int_codec!(encode_u16, decode_u16, u16, 2);
    impl_int_codec!(encode_u32, decode_u32, u32, 4);
    impl_int_codec!(encode_u64, decode_u64, u64, 8);
    impl_int_codec!(encode_i8, decode_i8, i8, 1);
    impl_int_codec!(encode_i16, decode_i16, i16, 2);
    impl_int_codec!(encode_i32, decode_i32, i32, 4);
    impl_int_codec!(encode_i64, decode_i64, i64, 8);
    impl_int_codec!(encode_f32, decode_f32, f32, 4);
    impl_int_codec!(encode_f64, decode_f64, f64, 8);

    pub fn encode_bool(data: bool) -> Vec<u8> {
        if data {
            vec![1]
        } else {
            vec![0]
        }
    }

    pub fn decode_bool(bytes: &[u8]) -> BrambleResult<DecodedData<bool>> {
        if bytes.is_empty() {
            return Err(BrambleError::Internal(
                "bytes length 0 is less than 1".to_string(),
            ));
        }
        Ok((bytes[0] != 0, 1))
    }

    /// Length-prefixed byte string.
    pub fn encode_bytes(data: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(4 + data.len());
        bytes.extend(CommonCodec::encode_u32(data.len() as u32));
        bytes.extend_from_slice(data);
        bytes
    }

    pub fn decode_bytes(bytes: &[u8]) -> BrambleResult<DecodedData<Vec<u8>>> {
        let (length, offset) = CommonCodec::decode_u32(bytes)?;
        let length = length as usize;
        if bytes.len() < offset + length {
            return Err(BrambleError::Internal(format!(
                "bytes length {} is less than expected {}",
                bytes.len(),
                offset + length
            )));
        }
        let data = bytes[offset..offset + length].to_vec();
        Ok((data, offset + length))
    }
}
