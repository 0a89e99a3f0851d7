use crate::catalog::DataType;
use crate::error::{BrambleError, BrambleResult};
use std::cmp::Ordering;

#[derive(Debug, Clone)]
pub enum ScalarValue {
    Boolean(Option<bool>),
    Int8(Option<i8>),
    Int16(Option<i16>),
    Int32(Option<i32>),
    Int64(Option<i64>),
    UInt8(Option<u8>),
    UInt16(Option<u16>),
    UInt32(Option<u32>),
    UInt64(Option<u64>),
    Float32(Option<f32>),
    Float64(Option<f64>),
    Varchar(Option<String>),
}

impl ScalarValue {
    pub fn new_empty(data_type: DataType) -> Self {
        match data_type {
            DataType::Boolean => Self::Boolean(None),
            DataType::Int8 => Self::Int8(None),
            DataType::Int16 => Self::Int16(None),
            DataType::Int32 => Self::Int32(None),
            DataType::Int64 => Self::Int64(None),
            DataType::UInt8 => Self::UInt8(None),
            DataType::UInt16 => Self::UInt16(None),
            DataType::UInt32 => Self::UInt32(None),
            DataType::UInt64 => Self::UInt64(None),
            DataType::Float32 => Self::Float32(None),
            DataType::Float64 => Self::Float64(None),
            DataType::Varchar(_) => Self::Varchar(None),
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            ScalarValue::Boolean(_) => DataType::Boolean,
            ScalarValue::Int8(_) => DataType::Int8,
            ScalarValue::Int16(_) => DataType::Int16,
            ScalarValue::Int32(_) => DataType::Int32,
            ScalarValue::Int64(_) => DataType::Int64,
            ScalarValue::UInt8(_) => DataType::UInt8,
            ScalarValue::UInt16(_) => DataType::UInt16,
            ScalarValue::UInt32(_) => DataType::UInt32,
            ScalarValue::UInt64(_) => DataType::UInt64,
            ScalarValue::Float32(_) => DataType::Float32,
            ScalarValue::Float64(_) => DataType::Float64,
            ScalarValue::Varchar(_) => DataType::Varchar(None),
        }
    }

    pub fn is_null(&self) -> bool {
        match self {
            ScalarValue::Boolean(v) => v.is_none(),
            ScalarValue::Int8(v) => v.is_none(),
            ScalarValue::Int16(v) => v.is_none(),
            ScalarValue::Int32(v) => v.is_none(),
            ScalarValue::Int64(v) => v.is_none(),
            ScalarValue::UInt8(v) => v.is_none(),
            ScalarValue::UInt16(v) => v.is_none(),
            ScalarValue::UInt32(v) => v.is_none(),
            ScalarValue::UInt64(v) => v.is_none(),
            ScalarValue::Float32(v) => v.is_none(),
            ScalarValue::Float64(v) => v.is_none(),
            ScalarValue::Varchar(v) => v.is_none(),
        }
    }

    /// Try to cast this value to a ScalarValue of type `data_type`.
    pub fn cast_to(&self, data_type: &DataType) -> BrambleResult<Self> {
        if &self.data_type() == data_type {
            return Ok(self.clone());
        }

        macro_rules! cast_numeric {
            ($target:tt, $ty:ty) => {
                match self {
                    ScalarValue::Int8(v) => Ok(ScalarValue::$target(v.map(|v| v as $ty))),
                    ScalarValue::Int16(v) => Ok(ScalarValue::$target(v.map(|v| v as $ty))),
                    ScalarValue::Int32(v) => Ok(ScalarValue::$target(v.map(|v| v as $ty))),
                    ScalarValue::Int64(v) => Ok(ScalarValue::$target(v.map(|v| v as $ty))),
                    ScalarValue::UInt8(v) => Ok(ScalarValue::$target(v.map(|v| v as $ty))),
                    ScalarValue::UInt16(v) => Ok(ScalarValue::$target(v.map(|v| v as $ty))),
                    ScalarValue::UInt32(v) => Ok(ScalarValue::$target(v.map(|v| v as $ty))),
                    ScalarValue::UInt64(v) => Ok(ScalarValue::$target(v.map(|v| v as $ty))),
                    ScalarValue::Float32(v) => Ok(ScalarValue::$target(v.map(|v| v as $ty))),
                    ScalarValue::Float64(v) => Ok(ScalarValue::$target(v.map(|v| v as $ty))),
                    _ => Err(BrambleError::NotSupport(format!(
                        "Failed to cast {:?} to {} type",
                        self, data_type
                    ))),
                }
            };
        }

        match data_type {
            DataType::Int8 => cast_numeric!(Int8, i8),
            DataType::Int16 => cast_numeric!(Int16, i16),
            DataType::Int32 => cast_numeric!(Int32, i32),
            DataType::Int64 => cast_numeric!(Int64, i64),
            DataType::UInt8 => cast_numeric!(UInt8, u8),
            DataType::UInt16 => cast_numeric!(UInt16, u16),
            DataType::UInt32 => cast_numeric!(UInt32, u32),
            DataType::UInt64 => cast_numeric!(UInt64, u64),
            DataType::Float32 => cast_numeric!(Float32, f32),
            DataType::Float64 => cast_numeric!(Float64, f64),
            DataType::Varchar(_) => match self {
                ScalarValue::Varchar(v) => Ok(ScalarValue::Varchar(v.clone())),
                _ => Err(BrambleError::NotSupport(format!(
                    "Failed to cast {:?} to {} type",
                    self, data_type
                ))),
            },
            DataType::Boolean => Err(BrambleError::NotSupport(format!(
                "Failed to cast {:?} to {} type",
                self, data_type
            ))),
        }
    }

    pub fn as_boolean(&self) -> BrambleResult<Option<bool>> {
        match self {
            ScalarValue::Boolean(v) => Ok(*v),
            _ => Err(BrambleError::Internal(format!(
                "Cannot treat {:?} as boolean",
                self
            ))),
        }
    }

    pub fn wrapping_add(&self, other: Self) -> BrambleResult<Self> {
        use ScalarValue::*;
        match (self, other.clone()) {
            (Int8(Some(a)), Int8(Some(b))) => Ok(Int8(Some(a.wrapping_add(b)))),
            (Int16(Some(a)), Int16(Some(b))) => Ok(Int16(Some(a.wrapping_add(b)))),
            (Int32(Some(a)), Int32(Some(b))) => Ok(Int32(Some(a.wrapping_add(b)))),
            (Int64(Some(a)), Int64(Some(b))) => Ok(Int64(Some(a.wrapping_add(b)))),
            (UInt8(Some(a)), UInt8(Some(b))) => Ok(UInt8(Some(a.wrapping_add(b)))),
            (UInt16(Some(a)), UInt16(Some(b))) => Ok(UInt16(Some(a.wrapping_add(b)))),
            (UInt32(Some(a)), UInt32(Some(b))) => Ok(UInt32(Some(a.wrapping_add(b)))),
            (UInt64(Some(a)), UInt64(Some(b))) => Ok(UInt64(Some(a.wrapping_add(b)))),
            (Float32(Some(a)), Float32(Some(b))) => Ok(Float32(Some(a + b))),
            (Float64(Some(a)), Float64(Some(b))) => Ok(Float64(Some(a + b))),
            _ if self.is_null() => Ok(self.clone()),
            _ => Err(BrambleError::Execution(format!(
                "Unsupported addition between {:?} and {:?}",
                self, other
            ))),
        }
    }

    pub fn wrapping_sub(&self, other: Self) -> BrambleResult<Self> {
        use ScalarValue::*;
        match (self, other.clone()) {
            (Int8(Some(a)), Int8(Some(b))) => Ok(Int8(Some(a.wrapping_sub(b)))),
            (Int16(Some(a)), Int16(Some(b))) => Ok(Int16(Some(a.wrapping_sub(b)))),
            (Int32(Some(a)), Int32(Some(b))) => Ok(Int32(Some(a.wrapping_sub(b)))),
            (Int64(Some(a)), Int64(Some(b))) => Ok(Int64(Some(a.wrapping_sub(b)))),
            (UInt8(Some(a)), UInt8(Some(b))) => Ok(UInt8(Some(a.wrapping_sub(b)))),
            (UInt16(Some(a)), UInt16(Some(b))) => Ok(UInt16(Some(a.wrapping_sub(b)))),
            (UInt32(Some(a)), UInt32(Some(b))) => Ok(UInt32(Some(a.wrapping_sub(b)))),
            (UInt64(Some(a)), UInt64(Some(b))) => Ok(UInt64(Some(a.wrapping_sub(b)))),
            (Float32(Some(a)), Float32(Some(b))) => Ok(Float32(Some(a - b))),
            (Float64(Some(a)), Float64(Some(b))) => Ok(Float64(Some(a - b))),
            _ if self.is_null() => Ok(self.clone()),
            _ => Err(BrambleError::Execution(format!(
                "Unsupported subtraction between {:?} and {:?}",
                self, other
            ))),
        }
    }

    pub fn wrapping_mul(&self, other: Self) -> BrambleResult<Self> {
        use ScalarValue::*;
        match (self, other.clone()) {
            (Int8(Some(a)), Int8(Some(b))) => Ok(Int8(Some(a.wrapping_mul(b)))),
            (Int16(Some(a)), Int16(Some(b))) => Ok(Int16(Some(a.wrapping_mul(b)))),
            (Int32(Some(a)), Int32(Some(b))) => Ok(Int32(Some(a.wrapping_mul(b)))),
            (Int64(Some(a)), Int64(Some(b))) => Ok(Int64(Some(a.wrapping_mul(b)))),
            (UInt8(Some(a)), UInt8(Some(b))) => Ok(UInt8(Some(a.wrapping_mul(b)))),
            (UInt16(Some(a)), UInt16(Some(b))) => Ok(UInt16(Some(a.wrapping_mul(b)))),
            (UInt32(Some(a)), UInt32(Some(b))) => Ok(UInt32(Some(a.wrapping_mul(b)))),
            (UInt64(Some(a)), UInt64(Some(b))) => Ok(UInt64(Some(a.wrapping_mul(b)))),
            (Float32(Some(a)), Float32(Some(b))) => Ok(Float32(Some(a * b))),
            (Float64(Some(a)), Float64(Some(b))) => Ok(Float64(Some(a * b))),
            _ if self.is_null() => Ok(self.clone()),
            _ => Err(BrambleError::Execution(format!(
                "Unsupported multiplication between {:?} and {:?}",
                self, other
            ))),
        }
    }

    pub fn wrapping_div(&self, other: Self) -> BrambleResult<Self> {
        use ScalarValue::*;
        match (self, other.clone()) {
            (Int8(Some(a)), Int8(Some(b))) => Ok(Int8(Some(a.wrapping_div(b)))),
            (Int16(Some(a)), Int16(Some(b))) => Ok(Int16(Some(a.wrapping_div(b)))),
            (Int32(Some(a)), Int32(Some(b))) => Ok(Int32(Some(a.wrapping_div(b)))),
            (Int64(Some(a)), Int64(Some(b))) => Ok(Int64(Some(a.wrapping_div(b)))),
            (UInt8(Some(a)), UInt8(Some(b))) => Ok(UInt8(Some(a.wrapping_div(b)))),
            (UInt16(Some(a)), UInt16(Some(b))) => Ok(UInt16(Some(a.wrapping_div(b)))),
            (UInt32(Some(a)), UInt32(Some(b))) => Ok(UInt32(Some(a.wrapping_div(b)))),
            (UInt64(Some(a)), UInt64(Some(b))) => Ok(UInt64(Some(a.wrapping_div(b)))),
            (Float32(Some(a)), Float32(Some(b))) => Ok(Float32(Some(a / b))),
            (Float64(Some(a)), Float64(Some(b))) => Ok(Float64(Some(a / b))),
            _ if self.is_null() => Ok(self.clone()),
            _ => Err(BrambleError::Execution(format!(
                "Unsupported division between {:?} and {:?}",
                self, other
            ))),
        }
    }
}

impl PartialEq for ScalarValue {
    fn eq(&self, other: &Self) -> bool {
        use ScalarValue::*;
        match (self, other) {
            (Boolean(v1), Boolean(v2)) => v1.eq(v2),
            (Int8(v1), Int8(v2)) => v1.eq(v2),
            (Int16(v1), Int16(v2)) => v1.eq(v2),
            (Int32(v1), Int32(v2)) => v1.eq(v2),
            (Int64(v1), Int64(v2)) => v1.eq(v2),
            (UInt8(v1), UInt8(v2)) => v1.eq(v2),
            (UInt16(v1), UInt16(v2)) => v1.eq(v2),
            (UInt32(v1), UInt32(v2)) => v1.eq(v2),
            (UInt64(v1), UInt64(v2)) => v1.eq(v2),
            (Float32(v1), Float32(v2)) => match (v1, v2) {
                (Some(f1), Some(f2)) => f1.to_bits() == f2.to_bits(),
                _ => v1.eq(v2),
            },
            (Float64(v1), Float64(v2)) => match (v1, v2) {
                (Some(f1), Some(f2)) => f1.to_bits() == f2.to_bits(),
                _ => v1.eq(v2),
            },
            (Varchar(v1), Varchar(v2)) => v1.eq(v2),
            _ => false,
        }
    }
}

impl Eq for ScalarValue {}

impl PartialOrd for ScalarValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        use ScalarValue::*;
        match (self, other) {
            (Boolean(v1), Boolean(v2)) => v1.partial_cmp(v2),
            (Int8(v1), Int8(v2)) => v1.partial_cmp(v2),
            (Int16(v1), Int16(v2)) => v1.partial_cmp(v2),
            (Int32(v1), Int32(v2)) => v1.partial_cmp(v2),
            (Int64(v1), Int64(v2)) => v1.partial_cmp(v2),
            (UInt8(v1), UInt8(v2)) => v1.partial_cmp(v2),
            (UInt16(v1), UInt16(v2)) => v1.partial_cmp(v2),
            (UInt32(v1), UInt32(v2)) => v1.partial_cmp(v2),
            (UInt64(v1), UInt64(v2)) => v1.partial_cmp(v2),
            (Float32(v1), Float32(v2)) => match (v1, v2) {
                (Some(f1), Some(f2)) => Some(f1.total_cmp(f2)),
                _ => v1.partial_cmp(v2),
            },
            (Float64(v1), Float64(v2)) => match (v1, v2) {
                (Some(f1), Some(f2)) => Some(f1.total_cmp(f2)),
                _ => v1.partial_cmp(v2),
            },
            (Varchar(v1), Varchar(v2)) => v1.partial_cmp(v2),
            _ => None,
        }
    }
}

impl std::hash::Hash for ScalarValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        use ScalarValue::*;
        match self {
            Boolean(v) => v.hash(state),
            Int8(v) => v.hash(state),
            Int16(v) => v.hash(state),
            Int32(v) => v.hash(state),
            Int64(v) => v.hash(state),
            UInt8(v) => v.hash(state),
            UInt16(v) => v.hash(state),
            UInt32(v) => v.hash(state),
            UInt64(v) => v.hash(state),
            Float32(v) => v.map(|f| f.to_bits()).hash(state),
            Float64(v) => v.map(|f| f.to_bits()).hash(state),
            Varchar(v) => v.hash(state),
        }
    }
}

impl std::fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        macro_rules! display_opt {
            ($v:expr) => {
                match $v {
                    None => write!(f, "NULL"),
                    Some(v) => write!(f, "{v}"),
                }
            };
        }
        match self {
            ScalarValue::Boolean(v) => display_opt!(v),
            ScalarValue::Int8(v) => display_opt!(v),
            ScalarValue::Int16(v) => display_opt!(v),
            ScalarValue::Int32(v) => display_opt!(v),
            ScalarValue::Int64(v) => display_opt!(v),
            ScalarValue::UInt8(v) => display_opt!(v),
            ScalarValue::UInt16(v) => display_opt!(v),
            ScalarValue::UInt32(v) => display_opt!(v),
            ScalarValue::UInt64(v) => display_opt!(v),
            ScalarValue::Float32(v) => display_opt!(v),
            ScalarValue::Float64(v) => display_opt!(v),
            ScalarValue::Varchar(v) => display_opt!(v),
        }
    }
}

macro_rules! impl_from_for_scalar {
    ($ty:ty, $scalar:tt) => {
        impl From<$ty> for ScalarValue {
            fn from(value: $ty) -> Self {
                ScalarValue::$scalar(Some(value))
            }
        }

        impl From<Option<$ty>> for ScalarValue {
            fn from(value: Option<$ty>) -> Self {
                ScalarValue::$scalar(value)
            }
        }
    };
}

impl_from_for_scalar!(bool, Boolean);
impl_from_for_scalar!(i8, Int8);
impl_from_for_scalar!(i16, Int16);
impl_from_for_scalar!(i32, Int32);
impl_from_for_scalar!(i64, Int64);
impl_from_for_scalar!(u8, UInt8);
impl_from_for_scalar!(u16, UInt16);
impl_from_for_scalar!(u32, UInt32);
impl_from_for_scalar!(u64, UInt64);
impl_from_for_scalar!(f32, Float32);
impl_from_for_scalar!(f64, Float64);
impl_from_for_scalar!(String, Varchar);

impl From<&str> for ScalarValue {
    fn from(value: &str) -> Self {
        ScalarValue::Varchar(Some(value.to_string()))
    }
}
