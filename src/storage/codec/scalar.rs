use crate::catalog::DataType;
use crate::error::{BrambleError, BrambleResult};
use crate::storage::codec::{CommonCodec, DecodedData};
use crate::utils::scalar::ScalarValue;

/// Values are encoded as a null flag byte followed by the payload. Fixed-width
/// types always write their payload (zeroed when null) so tuples over
/// fixed-width schemas have a fixed encoded size; varchar payloads are
/// length-prefixed and only present when non-null.
pub struct ScalarValueCodec;

impl ScalarValueCodec {
    pub fn encode(value: &ScalarValue) -> Vec<u8> {
        let mut bytes = CommonCodec::encode_bool(!value.is_null());
        match value {
            ScalarValue::Boolean(v) => bytes.extend(CommonCodec::encode_bool(v.unwrap_or(false))),
            ScalarValue::Int8(v) => bytes.extend(CommonCodec::encode_i8(v.unwrap_or(0))),
            ScalarValue::Int16(v) => bytes.extend(CommonCodec::encode_i16(v.unwrap_or(0))),
            ScalarValue::Int32(v) => bytes.extend(CommonCodec::encode_i32(v.unwrap_or(0))),
            ScalarValue::Int64(v) => bytes.extend(CommonCodec::encode_i64(v.unwrap_or(0))),
            ScalarValue::UInt8(v) => bytes.extend(CommonCodec::encode_u8(v.unwrap_or(0))),
            ScalarValue::UInt16(v) => bytes.extend(CommonCodec::encode_u16(v.unwrap_or(0))),
            ScalarValue::UInt32(v) => bytes.extend(CommonCodec::encode_u32(v.unwrap_or(0))),
            ScalarValue::UInt64(v) => bytes.extend(CommonCodec::encode_u64(v.unwrap_or(0))),
            ScalarValue::Float32(v) => bytes.extend(CommonCodec::encode_f32(v.unwrap_or(0.0))),
            ScalarValue::Float64(v) => bytes.extend(CommonCodec::encode_f64(v.unwrap_or(0.0))),
            ScalarValue::Varchar(v) => {
                if let Some(v) = v {
                    bytes.extend(CommonCodec::encode_bytes(v.as_bytes()));
                }
            }
        }
        bytes
    }

    pub fn decode(bytes: &[u8], data_type: DataType) -> BrambleResult<DecodedData<ScalarValue>> {
        let mut left_bytes = bytes;
        let (non_null, offset) = CommonCodec::decode_bool(left_bytes)?;
        left_bytes = &left_bytes[offset..];

        macro_rules! decode_fixed {
            ($decode:ident, $variant:tt) => {{
                let (v, offset) = CommonCodec::$decode(left_bytes)?;
                let value = if non_null {
                    ScalarValue::$variant(Some(v))
                } else {
                    ScalarValue::$variant(None)
                };
                Ok((value, 1 + offset))
            }};
        }

        match data_type {
            DataType::Boolean => decode_fixed!(decode_bool, Boolean),
            DataType::Int8 => decode_fixed!(decode_i8, Int8),
            DataType::Int16 => decode_fixed!(decode_i16, Int16),
            DataType::Int32 => decode_fixed!(decode_i32, Int32),
            DataType::Int64 => decode_fixed!(decode_i64, Int64),
            DataType::UInt8 => decode_fixed!(decode_u8, UInt8),
            DataType::UInt16 => decode_fixed!(decode_u16, UInt16),
            DataType::UInt32 => decode_fixed!(decode_u32, UInt32),
            DataType::UInt64 => decode_fixed!(decode_u64, UInt64),
            DataType::Float32 => decode_fixed!(decode_f32, Float32),
            DataType::Float64 => decode_fixed!(decode_f64, Float64),
            DataType::Varchar(_) => {
                if !non_null {
                    return Ok((ScalarValue::Varchar(None), 1));
                }
                let (data, offset) = CommonCodec::decode_bytes(left_bytes)?;
                let string = String::from_utf8(data).map_err(|e| {
                    BrambleError::Internal(format!("Invalid utf8 in varchar: {}", e))
                })?;
                Ok((ScalarValue::Varchar(Some(string)), 1 + offset))
            }
        }
    }
}
