use tracing::trace;

use super::{
    FunctionLowering,
    cleanup::DestructionObligation,
    value::{EvaluationMode, ValueResult},
};
use crate::{
    bound::{Expression, FunctionId, FunctionSymbol, TypeId, TypeKind},
    error::{LoweringError, Result, ice},
    ir::{self, CallTarget, Immediate, Instruction, IntegerWidth, Operand, RegisterId},
};

impl FunctionLowering<'_> {
    /// Lowers a call to `function`. Arguments are passed as
    ///
    /// ```text
    /// [hidden result slot] [this] explicit arguments... [exception status]
    /// ```
    ///
    /// where the bracketed ones are only present when the callee needs them.
    /// Intrinsic operators are expanded inline instead.
    pub(super) fn lower_call(
        &mut self,
        function: FunctionId,
        this: Option<Operand>,
        arguments: &[&Expression],
        is_virtual: bool,
        result_ty: TypeId,
    ) -> Result<ValueResult> {
        let symbols = self.symbols;
        let symbol = symbols.function(function)?;

        if let Some(operator) = symbol.intrinsic {
            return self.lower_intrinsic(operator, this, arguments, result_ty);
        }

        let mut call = ValueResult::default();

        let hidden_slot = match symbol.returns_by_hidden_slot {
            true => {
                let ty = symbols.ir_type(symbol.return_type)?;
                let slot = self.builder.alloc_stack(ty, None);
                call.arguments.push(slot.into());
                Some(slot)
            }
            false => None,
        };
        let first_explicit = call.arguments.len();

        call.arguments.extend(this);
        for argument in arguments {
            let value = self
                .lower_expression(argument, EvaluationMode::Materialize)?
                .expect_value(argument.kind.name())?;
            call.arguments.push(value);
        }

        if symbol.can_raise {
            call.arguments.push(self.exception_status().into());
        }

        let target = match is_virtual {
            true => {
                let object = call.arguments.get(first_explicit).copied();
                let object_ty = match this {
                    Some(_) => symbol.owner,
                    None => arguments.first().map(|argument| argument.ty),
                };
                let (Some(object), Some(object_ty)) = (object, object_ty) else {
                    return Err(ice!(LoweringError::NotVirtual(symbol.name)));
                };
                CallTarget::Indirect(self.lower_dispatch(symbol, object, object_ty)?)
            }
            false => CallTarget::Direct(symbol.name),
        };

        let destination = match hidden_slot {
            Some(_) => None,
            None if symbols.is_void(symbol.return_type)? => None,
            None => {
                let ty = symbols.ir_type(symbol.return_type)?;
                if ty.is_aggregate() {
                    return Err(ice!(LoweringError::AggregateReturn(symbol.return_type)));
                }
                Some(self.builder.create_register(ty))
            }
        };

        self.builder.push(Instruction::FunctionCall {
            target,
            arguments: std::mem::take(&mut call.arguments),
            destination,
        });

        if symbol.can_raise {
            self.check_exception_status()?;
        }

        if let Some(slot) = hidden_slot {
            if let Some(destructor) = symbols.destructor_of(symbol.return_type)? {
                self.cleanups.push(DestructionObligation {
                    object: slot.into(),
                    destructor,
                })?;
            }
        }

        call.value = hidden_slot.or(destination).map(Operand::from);

        Ok(call)
    }

    /// Loads the code address of a virtual function from the dispatch table
    /// of `object`, whose static type is `object_ty`. The table pointer lives
    /// in the class which introduced virtual functions into the hierarchy,
    /// reached through the base class subobjects which always come first.
    fn lower_dispatch(
        &mut self,
        symbol: &FunctionSymbol,
        object: Operand,
        object_ty: TypeId,
    ) -> Result<RegisterId> {
        let symbols = self.symbols;
        let Some(slot) = symbol.dispatch_slot else {
            return Err(ice!(LoweringError::NotVirtual(symbol.name)));
        };

        let mut ty = match symbols.type_kind(object_ty)? {
            TypeKind::Pointer(inner) | TypeKind::Reference(inner) => *inner,
            _ => object_ty,
        };
        let mut address = object;
        let mut class = symbols.class(ty)?;

        while !class.has_dispatch_table {
            let base = class
                .base
                .ok_or_else(|| ice!(LoweringError::MissingDispatchTable(symbol.name)))?;

            let base_address = self
                .builder
                .create_register(symbols.pointee_ir_type(base)?.pointer_to());
            self.builder.push(Instruction::GetFieldPointer {
                destination: base_address,
                source: address,
                index: 0,
            });

            address = base_address.into();
            ty = base;
            class = symbols.class(ty)?;
        }

        trace!(function = %symbol.name, class = %class.name, slot, "virtual dispatch");

        let table_address = self
            .builder
            .create_register(ir::Type::dispatch_table_pointer().pointer_to());
        self.builder.push(Instruction::GetFieldPointer {
            destination: table_address,
            source: address,
            index: class.dispatch_table_slot(),
        });

        let table = self
            .builder
            .create_register(ir::Type::dispatch_table_pointer());
        self.builder.push(Instruction::LoadMem {
            destination: table,
            source: table_address.into(),
        });

        let entry = self
            .builder
            .create_register(ir::Type::dispatch_table_pointer());
        self.builder.push(Instruction::GetElementPointer {
            destination: entry,
            source: table.into(),
            index: Immediate::Int(slot as i128, IntegerWidth::I64).into(),
        });

        let target = self.builder.create_register(ir::Type::byte_pointer());
        self.builder.push(Instruction::LoadMem {
            destination: target,
            source: entry.into(),
        });

        Ok(target)
    }
}
