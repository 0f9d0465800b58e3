use serde::{Deserialize, Serialize};
use strum::{EnumIter, EnumString};

use crate::ir::{FloatWidth, IntegerWidth};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, strum::Display, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum IntKind {
    I8,
    I16,
    I32,
    I64,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, strum::Display, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UIntKind {
    U8,
    U16,
    U32,
    U64,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, strum::Display, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FloatKind {
    F32,
    F64,
}

impl From<IntKind> for IntegerWidth {
    fn from(value: IntKind) -> Self {
        match value {
            IntKind::I8 => IntegerWidth::I8,
            IntKind::I16 => IntegerWidth::I16,
            IntKind::I32 => IntegerWidth::I32,
            IntKind::I64 => IntegerWidth::I64,
        }
    }
}

impl From<UIntKind> for IntegerWidth {
    fn from(value: UIntKind) -> Self {
        match value {
            UIntKind::U8 => IntegerWidth::I8,
            UIntKind::U16 => IntegerWidth::I16,
            UIntKind::U32 => IntegerWidth::I32,
            UIntKind::U64 => IntegerWidth::I64,
        }
    }
}

impl From<FloatKind> for FloatWidth {
    fn from(value: FloatKind) -> Self {
        match value {
            FloatKind::F32 => FloatWidth::F32,
            FloatKind::F64 => FloatWidth::F64,
        }
    }
}

/// Operators on primitive types which are expanded inline instead of being
/// called. The binder marks the function symbols of such operators with the
/// matching variant.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, strum::Display, strum::IntoStaticStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum IntrinsicOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    ShiftLeft,
    ShiftRight,
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEqualTo,
    GreaterThan,
    GreaterThanOrEqualTo,
    Negate,
    UnaryPlus,
    Complement,
    LogicalNot,
    /// Numeric, boolean and pointer conversions
    Convert,
    /// `T()` for a primitive `T`, takes the address of the object
    DefaultConstruct,
    /// `T(value)` for a primitive `T`, takes the address of the object and
    /// the value
    CopyConstruct,
    /// `a = b` for a primitive type, takes the address of `a` and the value
    Assign,
}

impl IntrinsicOperator {
    pub fn arity(self) -> usize {
        match self {
            Self::Negate
            | Self::UnaryPlus
            | Self::Complement
            | Self::LogicalNot
            | Self::Convert
            | Self::DefaultConstruct => 1,
            Self::Add
            | Self::Subtract
            | Self::Multiply
            | Self::Divide
            | Self::Remainder
            | Self::BitwiseAnd
            | Self::BitwiseOr
            | Self::BitwiseXor
            | Self::ShiftLeft
            | Self::ShiftRight
            | Self::Equals
            | Self::NotEquals
            | Self::LessThan
            | Self::LessThanOrEqualTo
            | Self::GreaterThan
            | Self::GreaterThanOrEqualTo
            | Self::CopyConstruct
            | Self::Assign => 2,
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Equals
                | Self::NotEquals
                | Self::LessThan
                | Self::LessThanOrEqualTo
                | Self::GreaterThan
                | Self::GreaterThanOrEqualTo
        )
    }
}
