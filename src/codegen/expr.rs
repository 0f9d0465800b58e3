use tracing::trace;

use super::{
    FunctionLowering,
    cleanup::DestructionObligation,
    constant::constant_truth,
    storage::{IndirectionKind, StorageShape, VariableRole},
    value::{BranchEdge, EvaluationMode, TargetList, ValueResult},
};
use crate::{
    bound::{Expression, ExpressionKind, FunctionId, Literal, TypeId, TypeKind, VariableId},
    error::{LoweringError, Result, ice},
    ir::{self, FloatWidth, Immediate, Instruction, IntegerWidth, Operand},
    primitive::IntrinsicOperator,
};

impl FunctionLowering<'_> {
    /// Lowers an expression which is evaluated on its own, such as a
    /// condition or an expression statement. Temporaries created while
    /// evaluating it are destroyed before control moves on, on every
    /// outgoing edge in jumping mode.
    pub(super) fn lower_full_expression(
        &mut self,
        expression: &Expression,
        mode: EvaluationMode,
    ) -> Result<ValueResult> {
        if mode == EvaluationMode::Materialize {
            return self.with_temporaries(|this| this.lower_expression(expression, mode));
        }

        let depth = self.cleanups.depth();
        self.cleanups.push_scope();
        let result = self.lower_expression(expression, mode)?;

        // the temporaries stay pending while both edges destroy them
        let obligations = self.cleanups.pending_from(depth);
        if obligations.is_empty() {
            self.cleanups.pop_scope()?;
            return Ok(result);
        }

        let ValueResult {
            true_list,
            false_list,
            entry,
            constant,
            ..
        } = result;

        let result = ValueResult {
            true_list: self.splice_cleanups(true_list, &obligations)?,
            false_list: self.splice_cleanups(false_list, &obligations)?,
            entry,
            constant,
            ..Default::default()
        };
        self.cleanups.pop_scope()?;

        Ok(result)
    }

    /// Routes the branches of `list` through the destructor calls and
    /// returns the jump which continues to the original target
    fn splice_cleanups(
        &mut self,
        list: TargetList,
        obligations: &[DestructionObligation],
    ) -> Result<TargetList> {
        if list.is_empty() {
            return Ok(list);
        }

        self.builder.resolve_here(list)?;
        self.emit_cleanups(obligations)?;
        Ok(self.builder.pending_jump())
    }

    pub(super) fn lower_expression(
        &mut self,
        expression: &Expression,
        mode: EvaluationMode,
    ) -> Result<ValueResult> {
        if mode == EvaluationMode::Jump {
            return self.lower_jumping(expression);
        }

        match &expression.kind {
            ExpressionKind::Literal(literal) => {
                let ty = self.symbols.ir_type(expression.ty)?;
                Ok(ValueResult::value(literal_immediate(*literal, &ty)))
            }
            ExpressionKind::LocalVariable(variable) | ExpressionKind::Parameter(variable) => {
                self.lower_variable(*variable)
            }
            ExpressionKind::MemberVariable { .. } | ExpressionKind::Dereference(_) => {
                let address = self.lower_address(expression)?;
                self.load_value(address, expression.ty).map(ValueResult::value)
            }
            ExpressionKind::AddressOf(operand) => self.lower_address(operand).map(ValueResult::value),
            ExpressionKind::Conversion { function, operand }
            | ExpressionKind::Unary { function, operand } => {
                self.lower_call(*function, None, &[&**operand], false, expression.ty)
            }
            ExpressionKind::Binary { function, lhs, rhs } => {
                self.lower_call(*function, None, &[&**lhs, &**rhs], false, expression.ty)
            }
            ExpressionKind::Call {
                function,
                arguments,
                is_virtual,
            } => {
                let arguments = arguments.iter().collect::<Vec<_>>();
                self.lower_call(*function, None, &arguments, *is_virtual, expression.ty)
            }
            ExpressionKind::Conjunction { .. } | ExpressionKind::Disjunction { .. } => {
                let result = self.lower_jumping(expression)?;
                self.materialize_boolean(result)
            }
            ExpressionKind::Temporary {
                variable,
                constructor,
                arguments,
                destroy,
            } => {
                let address =
                    self.lower_temporary(*variable, *constructor, arguments, *destroy)?;
                self.load_value(address, expression.ty)
                    .map(ValueResult::value)
            }
        }
    }

    /// Lowers a boolean expression into true and false lists
    fn lower_jumping(&mut self, expression: &Expression) -> Result<ValueResult> {
        match &expression.kind {
            ExpressionKind::Conjunction { lhs, rhs } => return self.lower_conjunction(lhs, rhs),
            ExpressionKind::Disjunction { lhs, rhs } => return self.lower_disjunction(lhs, rhs),
            ExpressionKind::Unary { function, operand }
                if self.is_intrinsic(*function, IntrinsicOperator::LogicalNot)? =>
            {
                let mut result = self.lower_jumping(operand)?;
                std::mem::swap(&mut result.true_list, &mut result.false_list);
                result.constant = result.constant.map(|constant| !constant);
                return Ok(result);
            }
            _ => {}
        }

        if let Some(truth) = constant_truth(expression, self.symbols) {
            let jump = self.builder.pending_jump();
            let mut result = match truth {
                true => ValueResult::jump(jump, TargetList::new()),
                false => ValueResult::jump(TargetList::new(), jump),
            };
            result.constant = Some(truth);
            return Ok(result);
        }

        let condition = self
            .lower_expression(expression, EvaluationMode::Materialize)?
            .expect_value(expression.kind.name())?;
        let branch = self.builder.push(Instruction::Branch {
            condition,
            positive: None,
            negative: None,
        });

        Ok(ValueResult::jump(
            TargetList::single(branch, BranchEdge::Positive),
            TargetList::single(branch, BranchEdge::Negative),
        ))
    }

    /// `lhs && rhs`. The right operand is only lowered when the left one can
    /// be true, and only reached through the left operand's true list.
    fn lower_conjunction(&mut self, lhs: &Expression, rhs: &Expression) -> Result<ValueResult> {
        let left = self.lower_full_expression(lhs, EvaluationMode::Jump)?;

        if left.constant == Some(false) {
            trace!("left operand of && is constant false, skipping the right operand");
            return Ok(ValueResult {
                false_list: left.false_list,
                entry: left.entry,
                constant: Some(false),
                ..Default::default()
            });
        }

        let right_entry = self.builder.resolve_here(left.true_list)?;
        let right = self.lower_full_expression(rhs, EvaluationMode::Jump)?;

        Ok(ValueResult {
            true_list: right.true_list,
            false_list: left.false_list.merge(right.false_list),
            entry: left.entry.or(right_entry),
            constant: match left.constant {
                Some(true) => right.constant,
                _ => None,
            },
            ..Default::default()
        })
    }

    /// `lhs || rhs`, the mirror image of [`Self::lower_conjunction`]
    fn lower_disjunction(&mut self, lhs: &Expression, rhs: &Expression) -> Result<ValueResult> {
        let left = self.lower_full_expression(lhs, EvaluationMode::Jump)?;

        if left.constant == Some(true) {
            trace!("left operand of || is constant true, skipping the right operand");
            return Ok(ValueResult {
                true_list: left.true_list,
                entry: left.entry,
                constant: Some(true),
                ..Default::default()
            });
        }

        let right_entry = self.builder.resolve_here(left.false_list)?;
        let right = self.lower_full_expression(rhs, EvaluationMode::Jump)?;

        Ok(ValueResult {
            true_list: left.true_list.merge(right.true_list),
            false_list: right.false_list,
            entry: left.entry.or(right_entry),
            constant: match left.constant {
                Some(false) => right.constant,
                _ => None,
            },
            ..Default::default()
        })
    }

    /// Turns a jumping result into a boolean register
    fn materialize_boolean(&mut self, result: ValueResult) -> Result<ValueResult> {
        let destination = self.builder.create_register(ir::Type::bool());
        let ValueResult {
            true_list,
            false_list,
            ..
        } = result;

        let mut done = TargetList::new();
        let both = !true_list.is_empty() && !false_list.is_empty();

        if !true_list.is_empty() {
            self.builder.resolve_here(true_list)?;
            self.builder.push(Instruction::Move {
                destination,
                source: Immediate::Bool(true).into(),
            });
            if both {
                done = self.builder.pending_jump();
            }
        }

        if !false_list.is_empty() {
            self.builder.resolve_here(false_list)?;
            self.builder.push(Instruction::Move {
                destination,
                source: Immediate::Bool(false).into(),
            });
        }

        self.builder.resolve_here(done)?;

        Ok(ValueResult::value(destination))
    }

    fn lower_variable(&mut self, variable: VariableId) -> Result<ValueResult> {
        let location = self.storage.lookup(variable)?;
        let (shape, ty) = (location.shape, location.ty);
        let address = self.storage.address(&mut self.builder, variable)?;

        match shape {
            // the address already is the value of a reference
            StorageShape::Indirect(IndirectionKind::Reference | IndirectionKind::ByAddress) => {
                Ok(ValueResult::value(address))
            }
            StorageShape::Value | StorageShape::Indirect(IndirectionKind::Pointer) => {
                self.load_value(address, ty).map(ValueResult::value)
            }
        }
    }

    /// Reads a value of type `ty` from `address`. Objects of class type are
    /// represented by their address and are not loaded.
    pub(super) fn load_value(&mut self, address: Operand, ty: TypeId) -> Result<Operand> {
        match self.symbols.type_kind(ty)? {
            TypeKind::Class(_) => Ok(address),
            TypeKind::Void => Err(ice!(LoweringError::MissingValue("void"))),
            _ => {
                let destination = self.builder.create_register(self.symbols.ir_type(ty)?);
                self.builder.push(Instruction::LoadMem {
                    destination,
                    source: address,
                });
                Ok(destination.into())
            }
        }
    }

    /// Writes `value` to `address`, copying the whole object for class types
    pub(super) fn store(&mut self, address: Operand, value: Operand, ty: TypeId) -> Result<()> {
        let ty = self.symbols.plain_type(ty)?;

        if self.symbols.is_class(ty)? {
            self.builder.push(Instruction::CopyMem {
                destination: address,
                source: value,
                size: self.symbols.size_of(ty)?,
            });
        } else {
            self.builder.push(Instruction::StoreMem {
                destination: address,
                source: value,
            });
        }

        Ok(())
    }

    /// The address of the storage an expression denotes
    pub(super) fn lower_address(&mut self, expression: &Expression) -> Result<Operand> {
        let symbols = self.symbols;

        match &expression.kind {
            ExpressionKind::LocalVariable(variable) | ExpressionKind::Parameter(variable) => {
                self.storage.address(&mut self.builder, *variable)
            }
            ExpressionKind::MemberVariable { object, field } => {
                let object_address = self
                    .lower_expression(object, EvaluationMode::Materialize)?
                    .expect_value(object.kind.name())?;
                let class = symbols.class(symbols.plain_type(object.ty)?)?;
                let field_ty = class
                    .fields
                    .get(*field as usize)
                    .copied()
                    .ok_or_else(|| ice!(LoweringError::NotAddressable(expression.kind.name())))?;

                let destination = self
                    .builder
                    .create_register(symbols.pointee_ir_type(field_ty)?.pointer_to());
                self.builder.push(Instruction::GetFieldPointer {
                    destination,
                    source: object_address,
                    index: class.field_slot(*field),
                });

                Ok(destination.into())
            }
            ExpressionKind::Dereference(pointer) => self
                .lower_expression(pointer, EvaluationMode::Materialize)?
                .expect_value(pointer.kind.name()),
            ExpressionKind::Temporary {
                variable,
                constructor,
                arguments,
                destroy,
            } => self.lower_temporary(*variable, *constructor, arguments, *destroy),
            kind => match symbols.type_kind(expression.ty)? {
                // objects and references evaluate to their address
                TypeKind::Class(_) | TypeKind::Reference(_) => self
                    .lower_expression(expression, EvaluationMode::Materialize)?
                    .expect_value(kind.name()),
                _ => Err(ice!(LoweringError::NotAddressable(kind.name()))),
            },
        }
    }

    /// Constructs a temporary into its compiler generated local and returns
    /// its address. The destructor is owed by the enclosing full expression.
    fn lower_temporary(
        &mut self,
        variable: VariableId,
        constructor: FunctionId,
        arguments: &[Expression],
        destroy: bool,
    ) -> Result<Operand> {
        let symbols = self.symbols;
        let location =
            self.storage
                .allocate(&mut self.builder, symbols, variable, VariableRole::Local)?;
        let (address, ty) = (Operand::from(location.slot), location.ty);

        self.lower_construction(address, constructor, arguments)?;

        if destroy {
            if let Some(destructor) = symbols.destructor_of(ty)? {
                self.cleanups.push(DestructionObligation {
                    object: address,
                    destructor,
                })?;
            }
        }

        Ok(address)
    }

    /// Runs `constructor` on the object at `address`
    pub(super) fn lower_construction(
        &mut self,
        address: Operand,
        constructor: FunctionId,
        arguments: &[Expression],
    ) -> Result<()> {
        let arguments = arguments.iter().collect::<Vec<_>>();
        let return_type = self.symbols.function(constructor)?.return_type;

        let _ = self.lower_call(constructor, Some(address), &arguments, false, return_type)?;

        Ok(())
    }

    fn is_intrinsic(&self, function: FunctionId, operator: IntrinsicOperator) -> Result<bool> {
        Ok(self.symbols.function(function)?.intrinsic == Some(operator))
    }
}

/// The immediate of a literal converted to the representation of `ty`
pub(super) fn literal_immediate(literal: Literal, ty: &ir::Type) -> Immediate {
    match (literal, ty) {
        (Literal::Bool(value), _) => Immediate::Bool(value),
        (Literal::Char(value), ir::Type::Integer(width)) => Immediate::Int(value as i128, *width),
        (Literal::Char(value), _) => Immediate::Int(value as i128, IntegerWidth::I32),
        (Literal::Signed(value), ir::Type::Float(width)) => Immediate::Float(value as f64, *width),
        (Literal::Signed(value), ir::Type::Integer(width)) => Immediate::Int(value as i128, *width),
        (Literal::Signed(value), _) => Immediate::Int(value as i128, IntegerWidth::I64),
        (Literal::Unsigned(value), ir::Type::Float(width)) => {
            Immediate::Float(value as f64, *width)
        }
        (Literal::Unsigned(value), ir::Type::Integer(width)) => {
            Immediate::Int(value as i128, *width)
        }
        (Literal::Unsigned(value), _) => Immediate::Int(value as i128, IntegerWidth::I64),
        (Literal::Float(value), ir::Type::Float(width)) => Immediate::Float(value, *width),
        (Literal::Float(value), _) => Immediate::Float(value, FloatWidth::F64),
        (Literal::Null, _) => Immediate::Null,
    }
}
