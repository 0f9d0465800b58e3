//! Inline expansion of operators on primitive types

use super::{
    FunctionLowering,
    value::{EvaluationMode, ValueResult},
};
use crate::{
    bound::{Expression, TypeId, TypeKind},
    error::{LoweringError, Result, ice},
    ir::{
        self, BinaryOperator, CastKind, ComparisonPredicate, Immediate, Instruction, IntegerWidth,
        NumericKind, Operand, UnaryOperator,
    },
    primitive::IntrinsicOperator,
};

/// The register level view of a primitive type used to pick conversions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scalar {
    Integer { signed: bool, width: IntegerWidth },
    Float(ir::FloatWidth),
    Pointer,
}

fn scalar(kind: &TypeKind) -> Option<Scalar> {
    Some(match kind {
        TypeKind::Bool => Scalar::Integer {
            signed: false,
            width: IntegerWidth::I8,
        },
        TypeKind::Char => Scalar::Integer {
            signed: false,
            width: IntegerWidth::I32,
        },
        TypeKind::Integer(kind) => Scalar::Integer {
            signed: true,
            width: (*kind).into(),
        },
        TypeKind::UnsignedInteger(kind) => Scalar::Integer {
            signed: false,
            width: (*kind).into(),
        },
        TypeKind::Float(kind) => Scalar::Float((*kind).into()),
        TypeKind::Pointer(_) | TypeKind::Reference(_) | TypeKind::FunctionPointer => {
            Scalar::Pointer
        }
        TypeKind::Void | TypeKind::Class(_) => return None,
    })
}

pub(super) fn numeric_kind(kind: &TypeKind) -> NumericKind {
    match kind {
        TypeKind::Integer(_) => NumericKind::Signed,
        TypeKind::Float(_) => NumericKind::Float,
        _ => NumericKind::Unsigned,
    }
}

fn binary_operator(operator: IntrinsicOperator) -> Option<BinaryOperator> {
    Some(match operator {
        IntrinsicOperator::Add => BinaryOperator::Add,
        IntrinsicOperator::Subtract => BinaryOperator::Sub,
        IntrinsicOperator::Multiply => BinaryOperator::Mul,
        IntrinsicOperator::Divide => BinaryOperator::Div,
        IntrinsicOperator::Remainder => BinaryOperator::Rem,
        IntrinsicOperator::BitwiseAnd => BinaryOperator::And,
        IntrinsicOperator::BitwiseOr => BinaryOperator::Or,
        IntrinsicOperator::BitwiseXor => BinaryOperator::Xor,
        IntrinsicOperator::ShiftLeft => BinaryOperator::Shl,
        IntrinsicOperator::ShiftRight => BinaryOperator::Shr,
        _ => return None,
    })
}

fn comparison_predicate(operator: IntrinsicOperator) -> Option<ComparisonPredicate> {
    Some(match operator {
        IntrinsicOperator::Equals => ComparisonPredicate::Eq,
        IntrinsicOperator::NotEquals => ComparisonPredicate::Ne,
        IntrinsicOperator::LessThan => ComparisonPredicate::Lt,
        IntrinsicOperator::LessThanOrEqualTo => ComparisonPredicate::Le,
        IntrinsicOperator::GreaterThan => ComparisonPredicate::Gt,
        IntrinsicOperator::GreaterThanOrEqualTo => ComparisonPredicate::Ge,
        _ => return None,
    })
}

impl FunctionLowering<'_> {
    pub(super) fn lower_intrinsic(
        &mut self,
        operator: IntrinsicOperator,
        this: Option<Operand>,
        arguments: &[&Expression],
        result_ty: TypeId,
    ) -> Result<ValueResult> {
        let symbols = self.symbols;
        let supplied = this.is_some() as usize + arguments.len();

        if supplied != operator.arity() {
            return Err(ice!(LoweringError::InvalidIntrinsic {
                operator: operator.into(),
                operands: supplied,
                ty: result_ty,
            }));
        }

        let mut operands = Vec::with_capacity(supplied);
        operands.extend(this);
        for (position, argument) in arguments.iter().enumerate() {
            // the target of a plain assignment is written, not read
            let operand = match operator == IntrinsicOperator::Assign && this.is_none() && position == 0 {
                true => self.lower_address(argument)?,
                false => self
                    .lower_expression(argument, EvaluationMode::Materialize)?
                    .expect_value(argument.kind.name())?,
            };
            operands.push(operand);
        }

        // type of the first explicit operand, which selects signedness
        let operand_ty = arguments.first().map_or(result_ty, |argument| argument.ty);
        let operand_kind = symbols.type_kind(symbols.plain_type(operand_ty)?)?;

        let invalid = || {
            ice!(LoweringError::InvalidIntrinsic {
                operator: operator.into(),
                operands: supplied,
                ty: operand_ty,
            })
        };

        match operator {
            IntrinsicOperator::DefaultConstruct => {
                let address = operands[0];
                let zero = match self.builder.operand_type(address) {
                    Some(ir::Type::Pointer(pointee)) => Immediate::zero(&pointee),
                    _ => None,
                }
                .ok_or_else(invalid)?;

                self.builder.push(Instruction::StoreMem {
                    destination: address,
                    source: zero.into(),
                });
                Ok(ValueResult::default())
            }
            IntrinsicOperator::CopyConstruct | IntrinsicOperator::Assign => {
                self.builder.push(Instruction::StoreMem {
                    destination: operands[0],
                    source: operands[1],
                });

                match operator {
                    IntrinsicOperator::Assign => Ok(ValueResult::value(operands[0])),
                    _ => Ok(ValueResult::default()),
                }
            }
            IntrinsicOperator::UnaryPlus => Ok(ValueResult::value(operands[0])),
            IntrinsicOperator::Negate | IntrinsicOperator::Complement | IntrinsicOperator::LogicalNot => {
                let (operator, ty) = match operator {
                    IntrinsicOperator::Negate => (UnaryOperator::Negate, symbols.ir_type(result_ty)?),
                    IntrinsicOperator::Complement => {
                        (UnaryOperator::Complement, symbols.ir_type(result_ty)?)
                    }
                    _ => (UnaryOperator::Not, ir::Type::bool()),
                };

                let destination = self.builder.create_register(ty);
                self.builder.push(Instruction::UnaryOperation {
                    operator,
                    destination,
                    operand: operands[0],
                });
                Ok(ValueResult::value(destination))
            }
            IntrinsicOperator::Convert => self
                .lower_conversion(operands[0], operand_ty, result_ty)
                .map(ValueResult::value),
            IntrinsicOperator::Add | IntrinsicOperator::Subtract
                if matches!(operand_kind, TypeKind::Pointer(_)) =>
            {
                let index = match operator {
                    IntrinsicOperator::Subtract => {
                        let ty = self
                            .builder
                            .operand_type(operands[1])
                            .unwrap_or(ir::Type::Integer(IntegerWidth::I64));
                        let negated = self.builder.create_register(ty);
                        self.builder.push(Instruction::UnaryOperation {
                            operator: UnaryOperator::Negate,
                            destination: negated,
                            operand: operands[1],
                        });
                        negated.into()
                    }
                    _ => operands[1],
                };

                let destination = self.builder.create_register(symbols.ir_type(result_ty)?);
                self.builder.push(Instruction::GetElementPointer {
                    destination,
                    source: operands[0],
                    index,
                });
                Ok(ValueResult::value(destination))
            }
            operator if operator.is_comparison() => {
                let predicate = comparison_predicate(operator).ok_or_else(invalid)?;
                let destination = self.builder.create_register(ir::Type::bool());

                self.builder.push(Instruction::Compare {
                    predicate,
                    kind: numeric_kind(operand_kind),
                    destination,
                    lhs: operands[0],
                    rhs: operands[1],
                });
                Ok(ValueResult::value(destination))
            }
            operator => {
                let binary = binary_operator(operator).ok_or_else(invalid)?;
                let destination = self.builder.create_register(symbols.ir_type(result_ty)?);

                self.builder.push(Instruction::BinaryOperation {
                    operator: binary,
                    kind: numeric_kind(operand_kind),
                    destination,
                    lhs: operands[0],
                    rhs: operands[1],
                });
                Ok(ValueResult::value(destination))
            }
        }
    }

    /// Converts `value` of type `from` to type `to`
    pub(super) fn lower_conversion(
        &mut self,
        value: Operand,
        from: TypeId,
        to: TypeId,
    ) -> Result<Operand> {
        let symbols = self.symbols;
        let (from, to) = (symbols.plain_type(from)?, symbols.plain_type(to)?);
        let (from_kind, to_kind) = (symbols.type_kind(from)?, symbols.type_kind(to)?);

        let invalid = || {
            ice!(LoweringError::InvalidConversion {
                from: format!("{from_kind:?}"),
                to: format!("{to_kind:?}"),
            })
        };

        if *to_kind == TypeKind::Bool && *from_kind != TypeKind::Bool {
            let zero = Immediate::zero(&symbols.ir_type(from)?).ok_or_else(invalid)?;
            let destination = self.builder.create_register(ir::Type::bool());
            self.builder.push(Instruction::Compare {
                predicate: ComparisonPredicate::Ne,
                kind: numeric_kind(from_kind),
                destination,
                lhs: value,
                rhs: zero.into(),
            });
            return Ok(destination.into());
        }

        let target = symbols.ir_type(to)?;
        if symbols.ir_type(from)? == target {
            return Ok(value);
        }

        let source = scalar(from_kind).ok_or_else(invalid)?;
        let destination = scalar(to_kind).ok_or_else(invalid)?;

        let kind = match (source, destination) {
            (
                Scalar::Integer { signed, width: from },
                Scalar::Integer { width: to, .. },
            ) => match from.size().bytes().cmp(&to.size().bytes()) {
                std::cmp::Ordering::Less if signed => CastKind::SignExtend,
                std::cmp::Ordering::Less => CastKind::ZeroExtend,
                std::cmp::Ordering::Greater => CastKind::Truncate,
                // same width, only the interpretation changes
                std::cmp::Ordering::Equal => return Ok(value),
            },
            (Scalar::Integer { signed: true, .. }, Scalar::Float(_)) => CastKind::SignedToFloat,
            (Scalar::Integer { signed: false, .. }, Scalar::Float(_)) => CastKind::UnsignedToFloat,
            (Scalar::Float(_), Scalar::Integer { signed: true, .. }) => CastKind::FloatToSigned,
            (Scalar::Float(_), Scalar::Integer { signed: false, .. }) => CastKind::FloatToUnsigned,
            (Scalar::Float(from), Scalar::Float(to)) => {
                match from.size().bytes() < to.size().bytes() {
                    true => CastKind::FloatExtend,
                    false => CastKind::FloatTruncate,
                }
            }
            (Scalar::Pointer, Scalar::Pointer) => CastKind::Bitcast,
            (Scalar::Pointer, Scalar::Integer { .. }) => CastKind::PointerToInteger,
            (Scalar::Integer { .. }, Scalar::Pointer) => CastKind::IntegerToPointer,
            (Scalar::Float(_), Scalar::Pointer) | (Scalar::Pointer, Scalar::Float(_)) => {
                return Err(invalid());
            }
        };

        let register = self.builder.create_register(target);
        self.builder.push(Instruction::Cast {
            kind,
            destination: register,
            operand: value,
        });

        Ok(register.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::{IntKind, UIntKind};

    #[test]
    fn signedness_follows_the_operand_type() {
        assert_eq!(numeric_kind(&TypeKind::Integer(IntKind::I32)), NumericKind::Signed);
        assert_eq!(
            numeric_kind(&TypeKind::UnsignedInteger(UIntKind::U8)),
            NumericKind::Unsigned
        );
        assert_eq!(numeric_kind(&TypeKind::Char), NumericKind::Unsigned);
    }

    #[test]
    fn classes_have_no_scalar_representation() {
        assert_eq!(scalar(&TypeKind::Void), None);
        assert_eq!(scalar(&TypeKind::FunctionPointer), Some(Scalar::Pointer));
    }
}
