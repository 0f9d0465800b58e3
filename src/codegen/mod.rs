//! The lowering driver. One bound function at a time is walked depth first and
//! turned into a flat instruction stream. Control flow is built by
//! backpatching target lists, destructors are emitted on every path leaving a
//! scope and every call which can raise is followed by a test of the
//! exception status slot that branches to a landing pad.
//!
//! All state lives in a [`FunctionLowering`] which is created for a single
//! function and consumed by it, so lowering several functions never shares
//! anything.

use tracing::{debug, debug_span, trace};

use crate::{
    bound::{BoundFunction, CompilationUnit, FunctionSymbol, SymbolRepository},
    config::{LoweringOptions, TRACE_ENTER, TRACE_LEAVE},
    error::{LoweringError, Result, ice},
    index::Index,
    intern::InternedSymbol,
    ir::{self, CallTarget, Immediate, Instruction, IntegerWidth, LabelId, Operand, RegisterId},
};

use self::{
    builder::FunctionBuilder,
    cleanup::{CleanupStacks, DestructionObligation},
    labels::{GotoTargets, LabelScopes, ScopeId},
    landing_pad::LandingPadTable,
    storage::{StorageAllocator, VariableRole},
    switch::SwitchContext,
    value::TargetList,
};

pub mod builder;
pub mod cleanup;
pub mod constant;
pub mod labels;
pub mod landing_pad;
pub mod storage;
pub mod switch;
pub mod value;

mod call;
mod expr;
mod intrinsic;
mod stmt;

/// Lowers every function of the unit in order, each with fresh state
pub fn lower_compilation_unit(unit: &CompilationUnit) -> Result<ir::Module> {
    let mut module = ir::Module::default();

    for function in &unit.functions {
        let definition =
            lower_function(function, &unit.symbols, &unit.options).map_err(|source| {
                let name = unit
                    .symbols
                    .functions
                    .get(function.function)
                    .map_or_else(|| InternedSymbol::new("<unknown>"), |symbol| symbol.name);

                LoweringError::InFunction {
                    function: name,
                    source: Box::new(source),
                }
            })?;

        module
            .function_definitions
            .insert(function.function, definition);
    }

    Ok(module)
}

pub fn lower_function(
    function: &BoundFunction,
    symbols: &dyn SymbolRepository,
    options: &LoweringOptions,
) -> Result<ir::FunctionDefinition> {
    let symbol = symbols.function(function.function)?;

    let span = debug_span!("lower_function", function = %symbol.name);
    let _enter = span.enter();

    let definition = FunctionLowering::new(function, symbol, symbols, options)?.lower()?;

    debug!(
        instructions = definition.instructions.len(),
        registers = definition.registers.len(),
        landing_pads = definition.landing_pad_count,
        "lowered function"
    );

    Ok(definition)
}

/// A compound statement which is currently being lowered
#[derive(Debug, Clone, Copy)]
struct ActiveScope {
    id: ScopeId,
    /// Index of the cleanup stack the compound pushed
    cleanup_depth: usize,
}

/// A `try` body which is currently being lowered
#[derive(Debug, Clone, Copy)]
struct ProtectedRegion {
    handler: LabelId,
    /// Cleanup depth at the `try` statement. Unwinding to the handler runs
    /// the destructors of every scope from here inwards.
    cleanup_depth: usize,
}

#[derive(Debug)]
enum ContinueTarget {
    /// The loop head is already placed
    Known(LabelId),
    /// The continue point is placed after the body
    Pending(TargetList),
}

/// A statement `break` can leave
#[derive(Debug)]
enum Breakable {
    Loop {
        continue_target: ContinueTarget,
        break_list: TargetList,
        cleanup_depth: usize,
    },
    Switch {
        break_list: TargetList,
        cleanup_depth: usize,
    },
}

impl Breakable {
    fn cleanup_depth(&self) -> usize {
        match self {
            Breakable::Loop { cleanup_depth, .. } | Breakable::Switch { cleanup_depth, .. } => {
                *cleanup_depth
            }
        }
    }

    fn break_list_mut(&mut self) -> &mut TargetList {
        match self {
            Breakable::Loop { break_list, .. } | Breakable::Switch { break_list, .. } => {
                break_list
            }
        }
    }
}

struct FunctionLowering<'a> {
    function: &'a BoundFunction,
    symbol: &'a FunctionSymbol,
    symbols: &'a dyn SymbolRepository,
    options: &'a LoweringOptions,

    builder: FunctionBuilder,
    storage: StorageAllocator,
    cleanups: CleanupStacks,
    landing_pads: LandingPadTable,
    label_scopes: LabelScopes,
    goto_targets: GotoTargets,

    scope_chain: Vec<ActiveScope>,
    next_scope: usize,
    breakables: Vec<Breakable>,
    switches: Vec<SwitchContext>,
    protected_regions: Vec<ProtectedRegion>,

    arguments: Vec<RegisterId>,
    /// Address of the caller's result slot
    hidden_result: Option<RegisterId>,
    /// Address of the caller's exception status slot
    caller_status: Option<RegisterId>,
    exception_status: Option<RegisterId>,
}

impl<'a> FunctionLowering<'a> {
    fn new(
        function: &'a BoundFunction,
        symbol: &'a FunctionSymbol,
        symbols: &'a dyn SymbolRepository,
        options: &'a LoweringOptions,
    ) -> Result<Self> {
        Ok(Self {
            function,
            symbol,
            symbols,
            options,
            builder: FunctionBuilder::new(),
            storage: StorageAllocator::new(),
            cleanups: CleanupStacks::new(),
            landing_pads: LandingPadTable::new(),
            label_scopes: LabelScopes::collect(&function.body)?,
            goto_targets: GotoTargets::new(),
            scope_chain: Vec::new(),
            next_scope: 0,
            breakables: Vec::new(),
            switches: Vec::new(),
            protected_regions: Vec::new(),
            arguments: Vec::new(),
            hidden_result: None,
            caller_status: None,
            exception_status: None,
        })
    }

    fn lower(mut self) -> Result<ir::FunctionDefinition> {
        let function = self.function;

        self.lower_prologue()?;
        self.lower_compound(&function.body)?;

        if !self.builder.last_is_terminator() {
            let value = self.default_return_value()?;
            self.emit_return(value);
        }

        if self.cleanups.depth() != 0 {
            return Err(ice!(LoweringError::UnbalancedScopes {
                scopes: self.cleanups.depth()
            }));
        }

        let landing_pad_count = self.materialize_landing_pads()?;
        std::mem::take(&mut self.goto_targets).finish()?;

        self.builder
            .finish(self.symbol.name, self.arguments, landing_pad_count)
    }

    /// Binds the incoming arguments, in the order hidden result slot,
    /// parameters, caller status slot, and allocates every local
    fn lower_prologue(&mut self) -> Result<()> {
        let function = self.function;
        let symbols = self.symbols;

        if function.returns_by_hidden_slot {
            let ty = symbols.pointee_ir_type(self.symbol.return_type)?.pointer_to();
            let register = self.builder.create_register(ty);
            self.arguments.push(register);
            self.hidden_result = Some(register);
        }

        for parameter in &function.parameters {
            let location =
                self.storage
                    .allocate(&mut self.builder, symbols, *parameter, VariableRole::Parameter)?;
            let slot = location.slot;
            let incoming = self.builder.create_register(location.slot_type.clone());

            self.arguments.push(incoming);
            self.builder.push(Instruction::StoreMem {
                destination: slot.into(),
                source: incoming.into(),
            });
        }

        if function.can_raise {
            let ty = ir::Type::Integer(IntegerWidth::I32).pointer_to();
            let register = self.builder.create_register(ty);
            self.arguments.push(register);
            self.caller_status = Some(register);
        }

        for local in &function.locals {
            self.storage
                .allocate(&mut self.builder, symbols, *local, VariableRole::Local)?;
        }

        if self.options.trace_calls {
            self.builder.push(Instruction::FunctionCall {
                target: CallTarget::Direct(InternedSymbol::new(TRACE_ENTER)),
                arguments: vec![Immediate::FunctionLabel(self.symbol.name).into()],
                destination: None,
            });
        }

        Ok(())
    }

    /// The slot the exception status of calls made by this function is
    /// written to. Allocated and zeroed on first use.
    fn exception_status(&mut self) -> RegisterId {
        if let Some(status) = self.exception_status {
            return status;
        }

        let status = self.builder.alloc_stack(
            ir::Type::Integer(IntegerWidth::I32),
            Some(InternedSymbol::new("exception_status")),
        );
        self.builder.push_prologue(Instruction::StoreMem {
            destination: status.into(),
            source: Immediate::Int(0, IntegerWidth::I32).into(),
        });
        self.exception_status = Some(status);
        status
    }

    /// The value returned on paths which do not return one explicitly
    fn default_return_value(&self) -> Result<Option<Operand>> {
        let return_type = self.symbol.return_type;

        if self.hidden_result.is_some() || self.symbols.is_void(return_type)? {
            return Ok(None);
        }

        let ty = self.symbols.ir_type(return_type)?;
        Immediate::zero(&ty)
            .map(|zero| Some(zero.into()))
            .ok_or_else(|| ice!(LoweringError::AggregateReturn(return_type)))
    }

    fn emit_return(&mut self, value: Option<Operand>) {
        if self.options.trace_calls {
            self.builder.push(Instruction::FunctionCall {
                target: CallTarget::Direct(InternedSymbol::new(TRACE_LEAVE)),
                arguments: vec![Immediate::FunctionLabel(self.symbol.name).into()],
                destination: None,
            });
        }

        self.builder.push(Instruction::Return { value });
    }

    /// Calls the destructor of one object and reports whether it can raise
    fn emit_destructor_call(&mut self, obligation: DestructionObligation) -> Result<bool> {
        let symbols = self.symbols;
        let destructor = symbols.function(obligation.destructor)?;

        let mut arguments = vec![obligation.object];
        if destructor.can_raise {
            arguments.push(self.exception_status().into());
        }

        self.builder.push(Instruction::FunctionCall {
            target: CallTarget::Direct(destructor.name),
            arguments,
            destination: None,
        });

        Ok(destructor.can_raise)
    }

    /// Emits destructor calls in the given order on a path leaving scopes.
    /// `obligations` are the innermost pending obligations, still on the
    /// cleanup stacks. A destructor which can raise is followed by a status
    /// test whose landing pad only destroys the objects still alive.
    fn emit_cleanups(&mut self, obligations: &[DestructionObligation]) -> Result<()> {
        for (position, obligation) in obligations.iter().enumerate() {
            if self.emit_destructor_call(*obligation)? {
                self.test_exception_status(position + 1)?;
            }
        }

        Ok(())
    }

    /// Destructors run by a landing pad. The status slot already holds the
    /// failure being propagated, so a raising destructor is not tested again
    /// and a failure it reports replaces the pending one.
    fn emit_unwind_cleanups(&mut self, obligations: &[DestructionObligation]) -> Result<()> {
        for obligation in obligations {
            self.emit_destructor_call(*obligation)?;
        }

        Ok(())
    }

    /// Destroys the objects of the innermost scope, unless control can not
    /// reach its end, and pops it
    fn close_scope(&mut self) -> Result<()> {
        let depth = self
            .cleanups
            .depth()
            .checked_sub(1)
            .ok_or_else(|| ice!(LoweringError::EmptyCleanupStack))?;

        if !self.builder.last_is_terminator() {
            let obligations = self.cleanups.pending_from(depth);
            self.emit_cleanups(&obligations)?;
        }

        self.cleanups.pop_scope()?;

        Ok(())
    }

    /// Runs `lower` inside a scope which owns the temporaries it creates
    fn with_temporaries<T>(&mut self, lower: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.cleanups.push_scope();
        let result = lower(self)?;
        self.close_scope()?;

        Ok(result)
    }

    /// Records the landing pad of a raising site at the current position and
    /// returns its label. The `destroyed` innermost pending obligations have
    /// already run on the path to the site and are left out of the pad.
    fn record_landing_pad(&mut self, destroyed: usize) -> LabelId {
        let (handler, depth) = self
            .protected_regions
            .last()
            .map_or((None, 0), |region| (Some(region.handler), region.cleanup_depth));

        let cleanups = self
            .cleanups
            .pending_from(depth)
            .into_iter()
            .skip(destroyed)
            .collect::<Vec<_>>();
        let label = self.builder.create_label();
        let id = self.landing_pads.record(label, handler, cleanups);

        trace!(pad = id.index(), ?handler, destroyed, "recorded landing pad");

        label
    }

    /// Tests the exception status after a call which can raise and branches
    /// to a new landing pad when it is set
    fn check_exception_status(&mut self) -> Result<()> {
        self.test_exception_status(0)
    }

    fn test_exception_status(&mut self, destroyed: usize) -> Result<()> {
        let status = self.exception_status();
        let code = self
            .builder
            .create_register(ir::Type::Integer(IntegerWidth::I32));
        self.builder.push(Instruction::LoadMem {
            destination: code,
            source: status.into(),
        });

        let landing_pad = self.record_landing_pad(destroyed);
        let branch = self.builder.push(Instruction::Branch {
            condition: code.into(),
            positive: Some(landing_pad),
            negative: None,
        });

        self.builder
            .resolve_required_here(TargetList::single(branch, value::BranchEdge::Negative))?;

        Ok(())
    }

    /// Emits the unwind code of every recorded landing pad after the body
    fn materialize_landing_pads(&mut self) -> Result<usize> {
        let pads = self.landing_pads.take().collect::<Vec<_>>();

        for pad in &pads {
            debug!(
                pad = pad.id.index(),
                cleanups = pad.cleanups.len(),
                handler = ?pad.handler,
                "emitting landing pad"
            );

            self.builder.place_label(pad.label);
            self.emit_unwind_cleanups(&pad.cleanups)?;

            match pad.handler {
                Some(handler) => {
                    self.builder.push(Instruction::Jump {
                        destination: Some(handler),
                    });
                }
                None => {
                    if let Some(caller_status) = self.caller_status {
                        let status = self.exception_status();
                        let code = self
                            .builder
                            .create_register(ir::Type::Integer(IntegerWidth::I32));
                        self.builder.push(Instruction::LoadMem {
                            destination: code,
                            source: status.into(),
                        });
                        self.builder.push(Instruction::StoreMem {
                            destination: caller_status.into(),
                            source: code.into(),
                        });
                    }

                    let value = self.default_return_value()?;
                    self.emit_return(value);
                }
            }
        }

        Ok(pads.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bound::{Compound, FunctionId, Statement, SymbolTable, TypeKind},
        primitive::IntKind,
    };

    fn table_with_function(return_type: TypeKind) -> (SymbolTable, FunctionId) {
        let mut table = SymbolTable::new();
        let ty = table.insert_type(return_type);
        let function = table.insert_function(FunctionSymbol {
            name: "answer".into(),
            return_type: ty,
            can_raise: false,
            returns_by_hidden_slot: false,
            intrinsic: None,
            dispatch_slot: None,
            owner: None,
        });
        (table, function)
    }

    fn empty_function(function: FunctionId) -> BoundFunction {
        BoundFunction {
            function,
            parameters: vec![],
            locals: vec![],
            body: Compound {
                statements: vec![Statement::Empty],
            },
            returns_by_hidden_slot: false,
            can_raise: false,
        }
    }

    #[test]
    fn falling_off_the_end_returns_zero() {
        let (table, function) = table_with_function(TypeKind::Integer(IntKind::I32));

        let lowered =
            lower_function(&empty_function(function), &table, &LoweringOptions::default()).unwrap();

        assert_eq!(
            lowered.instructions.last(),
            Some(&Instruction::Return {
                value: Some(Immediate::Int(0, IntegerWidth::I32).into())
            })
        );
    }

    #[test]
    fn tracing_wraps_the_body() {
        let (table, function) = table_with_function(TypeKind::Void);
        let options = LoweringOptions {
            trace_calls: true,
            ..Default::default()
        };

        let lowered = lower_function(&empty_function(function), &table, &options).unwrap();

        assert_eq!(lowered.direct_calls(), vec![TRACE_ENTER, TRACE_LEAVE]);
    }

    #[test]
    fn unit_errors_name_the_failing_function() {
        let (table, function) = table_with_function(TypeKind::Void);
        let mut bound = empty_function(function);
        bound.body.statements.push(Statement::Break);
        let unit = CompilationUnit {
            symbols: table,
            functions: vec![bound],
            options: LoweringOptions::default(),
        };

        let error = lower_compilation_unit(&unit).unwrap_err();

        assert_eq!(
            error.to_string(),
            "in function `answer`: `break` outside of a loop or switch statement"
        );
    }
}
