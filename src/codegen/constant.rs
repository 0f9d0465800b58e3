//! Speculative evaluation of boolean conditions. A condition which folds to a
//! constant is lowered to a single jump. Any failure while folding, including
//! arithmetic that would overflow or divide by zero, only means the condition
//! is not constant and is lowered normally.

use thiserror::Error;

use crate::{
    bound::{Expression, ExpressionKind, FunctionId, Literal, SymbolRepository, TypeId, TypeKind},
    error::LoweringError,
    primitive::{IntKind, IntrinsicOperator, UIntKind},
};

#[derive(Debug, Error)]
pub enum ConstantError {
    #[error("expression of kind `{0}` is not a compile time constant")]
    NotConstant(&'static str),
    #[error("constant arithmetic overflows its type")]
    Overflow,
    #[error("constant division by zero")]
    DivisionByZero,
    #[error("constant of the wrong kind for `{0}`")]
    Mismatch(&'static str),
    #[error(transparent)]
    Symbol(#[from] LoweringError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstantValue {
    Bool(bool),
    Int(i128),
}

impl ConstantValue {
    fn truth(self, context: &'static str) -> Result<bool, ConstantError> {
        match self {
            ConstantValue::Bool(value) => Ok(value),
            ConstantValue::Int(_) => Err(ConstantError::Mismatch(context)),
        }
    }

    fn integer(self) -> i128 {
        match self {
            ConstantValue::Bool(value) => value as i128,
            ConstantValue::Int(value) => value,
        }
    }
}

/// The truth value of `expression` if it is known at compile time
pub fn constant_truth(expression: &Expression, symbols: &dyn SymbolRepository) -> Option<bool> {
    evaluate(expression, symbols)
        .and_then(|value| value.truth("condition"))
        .ok()
}

pub fn evaluate(
    expression: &Expression,
    symbols: &dyn SymbolRepository,
) -> Result<ConstantValue, ConstantError> {
    match &expression.kind {
        ExpressionKind::Literal(literal) => match literal {
            Literal::Bool(value) => Ok(ConstantValue::Bool(*value)),
            Literal::Char(value) => Ok(ConstantValue::Int(*value as i128)),
            Literal::Signed(value) => Ok(ConstantValue::Int(*value as i128)),
            Literal::Unsigned(value) => Ok(ConstantValue::Int(*value as i128)),
            Literal::Float(_) | Literal::Null => Err(ConstantError::NotConstant("literal")),
        },
        ExpressionKind::Conjunction { lhs, rhs } => {
            if !evaluate(lhs, symbols)?.truth("&&")? {
                return Ok(ConstantValue::Bool(false));
            }
            Ok(ConstantValue::Bool(evaluate(rhs, symbols)?.truth("&&")?))
        }
        ExpressionKind::Disjunction { lhs, rhs } => {
            if evaluate(lhs, symbols)?.truth("||")? {
                return Ok(ConstantValue::Bool(true));
            }
            Ok(ConstantValue::Bool(evaluate(rhs, symbols)?.truth("||")?))
        }
        ExpressionKind::Unary { function, operand }
        | ExpressionKind::Conversion { function, operand } => {
            let operator = intrinsic(*function, expression, symbols)?;
            let value = evaluate(operand, symbols)?;

            match operator {
                IntrinsicOperator::LogicalNot => Ok(ConstantValue::Bool(!value.truth("!")?)),
                IntrinsicOperator::UnaryPlus => Ok(value),
                IntrinsicOperator::Negate => {
                    let negated = value.integer().checked_neg().ok_or(ConstantError::Overflow)?;
                    fit(negated, expression.ty, symbols)
                }
                IntrinsicOperator::Convert => convert(value, expression.ty, symbols),
                _ => Err(ConstantError::NotConstant(expression.kind.name())),
            }
        }
        ExpressionKind::Binary { function, lhs, rhs } => {
            let operator = intrinsic(*function, expression, symbols)?;
            let lhs = evaluate(lhs, symbols)?.integer();
            let rhs = evaluate(rhs, symbols)?.integer();

            let value = match operator {
                IntrinsicOperator::Equals => return Ok(ConstantValue::Bool(lhs == rhs)),
                IntrinsicOperator::NotEquals => return Ok(ConstantValue::Bool(lhs != rhs)),
                IntrinsicOperator::LessThan => return Ok(ConstantValue::Bool(lhs < rhs)),
                IntrinsicOperator::LessThanOrEqualTo => {
                    return Ok(ConstantValue::Bool(lhs <= rhs));
                }
                IntrinsicOperator::GreaterThan => return Ok(ConstantValue::Bool(lhs > rhs)),
                IntrinsicOperator::GreaterThanOrEqualTo => {
                    return Ok(ConstantValue::Bool(lhs >= rhs));
                }
                IntrinsicOperator::Add => lhs.checked_add(rhs),
                IntrinsicOperator::Subtract => lhs.checked_sub(rhs),
                IntrinsicOperator::Multiply => lhs.checked_mul(rhs),
                IntrinsicOperator::Divide | IntrinsicOperator::Remainder if rhs == 0 => {
                    return Err(ConstantError::DivisionByZero);
                }
                IntrinsicOperator::Divide => lhs.checked_div(rhs),
                IntrinsicOperator::Remainder => lhs.checked_rem(rhs),
                IntrinsicOperator::BitwiseAnd => Some(lhs & rhs),
                IntrinsicOperator::BitwiseOr => Some(lhs | rhs),
                IntrinsicOperator::BitwiseXor => Some(lhs ^ rhs),
                _ => return Err(ConstantError::NotConstant(expression.kind.name())),
            };

            fit(value.ok_or(ConstantError::Overflow)?, expression.ty, symbols)
        }
        kind => Err(ConstantError::NotConstant(kind.name())),
    }
}

fn intrinsic(
    function: FunctionId,
    expression: &Expression,
    symbols: &dyn SymbolRepository,
) -> Result<IntrinsicOperator, ConstantError> {
    symbols
        .function(function)?
        .intrinsic
        .ok_or(ConstantError::NotConstant(expression.kind.name()))
}

fn convert(
    value: ConstantValue,
    to: TypeId,
    symbols: &dyn SymbolRepository,
) -> Result<ConstantValue, ConstantError> {
    match symbols.type_kind(symbols.plain_type(to)?)? {
        TypeKind::Bool => Ok(ConstantValue::Bool(value.integer() != 0)),
        _ => fit(value.integer(), to, symbols),
    }
}

/// Checks that `value` is representable in the integer type `ty`
fn fit(value: i128, ty: TypeId, symbols: &dyn SymbolRepository) -> Result<ConstantValue, ConstantError> {
    let (min, max) = match symbols.type_kind(symbols.plain_type(ty)?)? {
        TypeKind::Integer(kind) => match kind {
            IntKind::I8 => (i8::MIN as i128, i8::MAX as i128),
            IntKind::I16 => (i16::MIN as i128, i16::MAX as i128),
            IntKind::I32 => (i32::MIN as i128, i32::MAX as i128),
            IntKind::I64 => (i64::MIN as i128, i64::MAX as i128),
        },
        TypeKind::UnsignedInteger(kind) => match kind {
            UIntKind::U8 => (0, u8::MAX as i128),
            UIntKind::U16 => (0, u16::MAX as i128),
            UIntKind::U32 => (0, u32::MAX as i128),
            UIntKind::U64 => (0, u64::MAX as i128),
        },
        TypeKind::Char => (0, char::MAX as i128),
        _ => return Err(ConstantError::NotConstant("non-integer arithmetic")),
    };

    if !(min..=max).contains(&value) {
        return Err(ConstantError::Overflow);
    }

    Ok(ConstantValue::Int(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bound::{FunctionSymbol, SymbolTable};

    struct Fixture {
        table: SymbolTable,
        bool_ty: TypeId,
        byte: TypeId,
        add: FunctionId,
        equals: FunctionId,
        call: FunctionId,
    }

    fn fixture() -> Fixture {
        let mut table = SymbolTable::new();
        let bool_ty = table.insert_type(TypeKind::Bool);
        let byte = table.insert_type(TypeKind::Integer(IntKind::I8));
        let operator = |table: &mut SymbolTable, name: &str, ret, op| {
            table.insert_function(FunctionSymbol {
                name: name.into(),
                return_type: ret,
                can_raise: false,
                returns_by_hidden_slot: false,
                intrinsic: op,
                dispatch_slot: None,
                owner: None,
            })
        };
        let add = operator(&mut table, "operator+", byte, Some(IntrinsicOperator::Add));
        let equals = operator(&mut table, "operator==", bool_ty, Some(IntrinsicOperator::Equals));
        let call = operator(&mut table, "probe", bool_ty, None);

        Fixture {
            table,
            bool_ty,
            byte,
            add,
            equals,
            call,
        }
    }

    fn literal(value: Literal, ty: TypeId) -> Expression {
        Expression {
            kind: ExpressionKind::Literal(value),
            ty,
        }
    }

    fn binary(function: FunctionId, lhs: Expression, rhs: Expression, ty: TypeId) -> Expression {
        Expression {
            kind: ExpressionKind::Binary {
                function,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            ty,
        }
    }

    #[test]
    fn comparisons_of_literals_fold() {
        let f = fixture();
        let sum = binary(
            f.add,
            literal(Literal::Signed(2), f.byte),
            literal(Literal::Signed(3), f.byte),
            f.byte,
        );
        let condition = binary(f.equals, sum, literal(Literal::Signed(5), f.byte), f.bool_ty);

        assert_eq!(constant_truth(&condition, &f.table), Some(true));
    }

    #[test]
    fn overflow_means_not_constant() {
        let f = fixture();
        let sum = binary(
            f.add,
            literal(Literal::Signed(100), f.byte),
            literal(Literal::Signed(100), f.byte),
            f.byte,
        );

        assert!(matches!(
            evaluate(&sum, &f.table),
            Err(ConstantError::Overflow)
        ));
        let condition = binary(f.equals, sum, literal(Literal::Signed(0), f.byte), f.bool_ty);
        assert_eq!(constant_truth(&condition, &f.table), None);
    }

    #[test]
    fn disjunction_short_circuits_a_failing_alternative() {
        let f = fixture();
        let call = Expression {
            kind: ExpressionKind::Call {
                function: f.call,
                arguments: vec![],
                is_virtual: false,
            },
            ty: f.bool_ty,
        };
        let taken = Expression {
            kind: ExpressionKind::Disjunction {
                lhs: Box::new(literal(Literal::Bool(true), f.bool_ty)),
                rhs: Box::new(call.clone()),
            },
            ty: f.bool_ty,
        };
        let needed = Expression {
            kind: ExpressionKind::Disjunction {
                lhs: Box::new(literal(Literal::Bool(false), f.bool_ty)),
                rhs: Box::new(call),
            },
            ty: f.bool_ty,
        };

        assert_eq!(constant_truth(&taken, &f.table), Some(true));
        assert_eq!(constant_truth(&needed, &f.table), None);
    }
}
