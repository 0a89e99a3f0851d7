use crate::error::{BrambleError, BrambleResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Varchar(Option<usize>),
}

impl DataType {
    /// Coerce `l` and `r` to a common type for the purposes of a comparison operation
    /// where both are numeric.
    pub fn comparison_numeric_coercion(l: &DataType, r: &DataType) -> BrambleResult<DataType> {
        use super::DataType::*;
        if l == r {
            return Ok(*l);
        }
        match (l, r) {
            (Float64, _) | (_, Float64) => Ok(Float64),
            (_, Float32) | (Float32, _) => Ok(Float32),
            // Given two integral types, choose the narrowest integral type that
            // accommodates all values of both. A signed type against UInt64
            // falls back to Int64, the widest signed integral type.
            (Int64, _)
            | (_, Int64)
            | (UInt64, Int8)
            | (Int8, UInt64)
            | (UInt64, Int16)
            | (Int16, UInt64)
            | (UInt64, Int32)
            | (Int32, UInt64)
            | (UInt32, Int8)
            | (Int8, UInt32)
            | (UInt32, Int16)
            | (Int16, UInt32)
            | (UInt32, Int32)
            | (Int32, UInt32) => Ok(Int64),
            (UInt64, _) | (_, UInt64) => Ok(UInt64),
            (Int32, _)
            | (_, Int32)
            | (UInt16, Int16)
            | (Int16, UInt16)
            | (UInt16, Int8)
            | (Int8, UInt16) => Ok(Int32),
            (UInt32, _) | (_, UInt32) => Ok(UInt32),
            (Int16, _) | (_, Int16) | (Int8, UInt8) | (UInt8, Int8) => Ok(Int16),
            (UInt16, _) | (_, UInt16) => Ok(UInt16),
            (Int8, _) | (_, Int8) => Ok(Int8),
            (UInt8, _) | (_, UInt8) => Ok(UInt8),
            _ => Err(BrambleError::Internal(format!(
                "Cannot coerce {} and {} for comparison",
                l, r
            ))),
        }
    }

    /// Encoded width of a value of this type, when fixed.
    /// Varchar values are length-prefixed and have no fixed width.
    pub fn fixed_width(&self) -> Option<usize> {
        match self {
            DataType::Boolean | DataType::Int8 | DataType::UInt8 => Some(1),
            DataType::Int16 | DataType::UInt16 => Some(2),
            DataType::Int32 | DataType::UInt32 | DataType::Float32 => Some(4),
            DataType::Int64 | DataType::UInt64 | DataType::Float64 => Some(8),
            DataType::Varchar(_) => None,
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            DataType::Varchar(len_opt) => {
                if let Some(len) = len_opt {
                    write!(f, "Varchar({len})")
                } else {
                    write!(f, "Varchar")
                }
            }
            _ => write!(f, "{self:?}"),
        }
    }
}
