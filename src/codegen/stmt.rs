use tracing::debug;

use super::{
    ActiveScope, Breakable, ContinueTarget, FunctionLowering, ProtectedRegion,
    cleanup::DestructionObligation,
    expr::literal_immediate,
    labels::ScopeId,
    storage::{IndirectionKind, StorageShape, VariableRole},
    switch::{SwitchCaseMap, SwitchContext},
    value::{EvaluationMode, TargetList, ValueResult},
};
use crate::{
    bound::{Compound, Expression, FunctionId, Literal, Statement, SwitchClause, VariableId},
    error::{LoweringError, Result, ice},
    index::Index,
    intern::InternedSymbol,
    ir::{self, CastKind, Immediate, Instruction, IntegerWidth, Operand},
};

impl FunctionLowering<'_> {
    /// Lowers a compound statement in its own cleanup scope. Objects
    /// constructed in it are destroyed when control falls off its end.
    pub(super) fn lower_compound(&mut self, compound: &Compound) -> Result<()> {
        let id = ScopeId::new(self.next_scope);
        self.next_scope += 1;

        self.scope_chain.push(ActiveScope {
            id,
            cleanup_depth: self.cleanups.depth(),
        });
        self.cleanups.push_scope();

        for statement in &compound.statements {
            let result = self.lower_statement(statement)?;
            self.builder.resolve_here(result.next_list)?;
        }

        self.close_scope()?;
        self.scope_chain.pop();

        Ok(())
    }

    /// Lowers one statement. Branches to whatever follows the statement are
    /// handed back in the next list of the result.
    fn lower_statement(&mut self, statement: &Statement) -> Result<ValueResult> {
        if self.options.debug_comments {
            self.builder
                .push(Instruction::Comment(statement.name().to_owned()));
        }

        match statement {
            Statement::Compound(compound) => {
                self.lower_compound(compound)?;
                Ok(ValueResult::default())
            }
            Statement::Expression(expression) => {
                let _ = self.lower_full_expression(expression, EvaluationMode::Materialize)?;
                Ok(ValueResult::default())
            }
            Statement::Construction {
                variable,
                constructor,
                arguments,
            } => self.lower_local_construction(*variable, *constructor, arguments),
            Statement::Assignment { target, value } => {
                self.with_temporaries(|this| {
                    let address = this.lower_address(target)?;
                    let value = this
                        .lower_expression(value, EvaluationMode::Materialize)?
                        .expect_value(value.kind.name())?;
                    this.store(address, value, target.ty)
                })?;
                Ok(ValueResult::default())
            }
            Statement::If {
                condition,
                then_statement,
                else_statement,
            } => self.lower_if(condition, then_statement, else_statement.as_deref()),
            Statement::While { condition, body } => self.lower_while(condition, body),
            Statement::DoWhile { body, condition } => self.lower_do_while(body, condition),
            Statement::For {
                initializer,
                condition,
                increment,
                body,
            } => self.lower_for(
                initializer.as_deref(),
                condition.as_ref(),
                increment.as_ref(),
                body,
            ),
            Statement::Switch { condition, clauses } => self.lower_switch(condition, clauses),
            Statement::Return(value) => self.lower_return(value.as_ref()),
            Statement::Break => self.lower_break(),
            Statement::Continue => self.lower_continue(),
            Statement::Labeled { label, statement } => {
                let entry = self.goto_targets.place(&mut self.builder, *label)?;
                let result = self.lower_statement(statement)?;
                Ok(result.with_entry(Some(entry)))
            }
            Statement::Goto(label) => self.lower_goto(*label),
            Statement::GotoCase(value) => self.lower_goto_case(Some(value)),
            Statement::GotoDefault => self.lower_goto_case(None),
            Statement::Destruction { object, destructor } => {
                self.lower_destruction(object, *destructor)
            }
            Statement::Try { body, handler } => self.lower_try(body, handler),
            Statement::Throw(code) => self.lower_throw(code),
            Statement::Empty => Ok(ValueResult::default()),
        }
    }

    fn lower_local_construction(
        &mut self,
        variable: VariableId,
        constructor: FunctionId,
        arguments: &[Expression],
    ) -> Result<ValueResult> {
        let symbols = self.symbols;
        let location =
            self.storage
                .allocate(&mut self.builder, symbols, variable, VariableRole::Local)?;
        let (slot, shape, ty) = (location.slot, location.shape, location.ty);

        self.with_temporaries(|this| match shape {
            // binding a reference stores the address of its referent
            StorageShape::Indirect(IndirectionKind::Reference) => {
                let referent = arguments
                    .first()
                    .ok_or_else(|| ice!(LoweringError::MissingValue("reference binding")))?;
                let address = this.lower_address(referent)?;

                this.builder.push(Instruction::StoreMem {
                    destination: slot.into(),
                    source: address,
                });
                Ok(())
            }
            _ => this.lower_construction(slot.into(), constructor, arguments),
        })?;

        if let Some(destructor) = symbols.destructor_of(ty)? {
            self.cleanups.push(DestructionObligation {
                object: slot.into(),
                destructor,
            })?;
        }

        Ok(ValueResult::default())
    }

    fn lower_if(
        &mut self,
        condition: &Expression,
        then_statement: &Statement,
        else_statement: Option<&Statement>,
    ) -> Result<ValueResult> {
        let condition = self.lower_full_expression(condition, EvaluationMode::Jump)?;
        let entry = condition.entry;

        self.builder.resolve_here(condition.true_list)?;
        let mut next = self.lower_statement(then_statement)?.next_list;

        match else_statement {
            Some(else_statement) => {
                if !self.builder.last_is_terminator() {
                    next.append(self.builder.pending_jump());
                }

                self.builder.resolve_here(condition.false_list)?;
                next.append(self.lower_statement(else_statement)?.next_list);
            }
            None => next.append(condition.false_list),
        }

        Ok(ValueResult::next(next).with_entry(entry))
    }

    fn lower_while(&mut self, condition: &Expression, body: &Statement) -> Result<ValueResult> {
        let head = self.builder.current_label();

        let condition = self.lower_full_expression(condition, EvaluationMode::Jump)?;
        self.builder.resolve_here(condition.true_list)?;

        self.breakables.push(Breakable::Loop {
            continue_target: ContinueTarget::Known(head),
            break_list: TargetList::new(),
            cleanup_depth: self.cleanups.depth(),
        });
        let body = self.lower_statement(body)?;
        let (break_list, _) = self.pop_loop()?;

        self.builder.resolve_to(body.next_list, head)?;
        if !self.builder.last_is_terminator() {
            self.builder.push(Instruction::Jump {
                destination: Some(head),
            });
        }

        Ok(ValueResult::next(condition.false_list.merge(break_list)).with_entry(Some(head)))
    }

    fn lower_do_while(&mut self, body: &Statement, condition: &Expression) -> Result<ValueResult> {
        let top = self.builder.current_label();

        self.breakables.push(Breakable::Loop {
            continue_target: ContinueTarget::Pending(TargetList::new()),
            break_list: TargetList::new(),
            cleanup_depth: self.cleanups.depth(),
        });
        let body = self.lower_statement(body)?;
        let (break_list, continues) = self.pop_loop()?;

        self.builder.resolve_here(body.next_list.merge(continues))?;

        let condition = self.lower_full_expression(condition, EvaluationMode::Jump)?;
        self.builder.resolve_to(condition.true_list, top)?;

        Ok(ValueResult::next(condition.false_list.merge(break_list)).with_entry(Some(top)))
    }

    /// The initializer lives in a scope of its own around the whole loop, so
    /// objects it constructs are destroyed once the loop is left
    fn lower_for(
        &mut self,
        initializer: Option<&Statement>,
        condition: Option<&Expression>,
        increment: Option<&Expression>,
        body: &Statement,
    ) -> Result<ValueResult> {
        self.cleanups.push_scope();

        if let Some(initializer) = initializer {
            let result = self.lower_statement(initializer)?;
            self.builder.resolve_here(result.next_list)?;
        }

        let head = self.builder.current_label();
        let exit = match condition {
            Some(condition) => {
                let condition = self.lower_full_expression(condition, EvaluationMode::Jump)?;
                self.builder.resolve_here(condition.true_list)?;
                condition.false_list
            }
            None => TargetList::new(),
        };

        self.breakables.push(Breakable::Loop {
            continue_target: ContinueTarget::Pending(TargetList::new()),
            break_list: TargetList::new(),
            cleanup_depth: self.cleanups.depth(),
        });
        let body = self.lower_statement(body)?;
        let (break_list, continues) = self.pop_loop()?;

        self.builder.resolve_here(body.next_list.merge(continues))?;
        if let Some(increment) = increment {
            let _ = self.lower_full_expression(increment, EvaluationMode::Materialize)?;
        }
        self.builder.push(Instruction::Jump {
            destination: Some(head),
        });

        self.builder.resolve_here(exit.merge(break_list))?;
        self.close_scope()?;

        Ok(ValueResult::default().with_entry(Some(head)))
    }

    /// Pops the innermost loop and returns its break list and the `continue`
    /// jumps still waiting for their target
    fn pop_loop(&mut self) -> Result<(TargetList, TargetList)> {
        match self.breakables.pop() {
            Some(Breakable::Loop {
                continue_target,
                break_list,
                ..
            }) => {
                let continues = match continue_target {
                    ContinueTarget::Known(_) => TargetList::new(),
                    ContinueTarget::Pending(list) => list,
                };
                Ok((break_list, continues))
            }
            _ => Err(ice!(LoweringError::ContinueOutsideLoop)),
        }
    }

    /// A switch is lowered as a single multi-way jump over the case
    /// constants followed by the clause bodies in source order. Control
    /// falls from one clause into the next unless the clause leaves.
    fn lower_switch(&mut self, condition: &Expression, clauses: &[SwitchClause]) -> Result<ValueResult> {
        // every case key is checked before anything is emitted
        let (map, labels) = SwitchCaseMap::build(&mut self.builder, clauses)?;
        debug!(
            cases = map.len(),
            has_default = map.default_target().is_some(),
            "lowering switch"
        );

        let value = self.with_temporaries(|this| {
            this.lower_expression(condition, EvaluationMode::Materialize)?
                .expect_value(condition.kind.name())
        })?;

        let ty = self.symbols.ir_type(condition.ty)?;
        let cases = map
            .cases()
            .iter()
            .map(|case| (literal_immediate(case.value, &ty), case.label))
            .collect();
        let fallthrough = self.builder.create_label();
        let default = map.default_target().map_or(fallthrough, |default| default.label);

        self.builder.push(Instruction::Switch {
            value,
            cases,
            default,
        });

        let cleanup_depth = self.cleanups.depth();
        self.breakables.push(Breakable::Switch {
            break_list: TargetList::new(),
            cleanup_depth,
        });
        self.switches.push(SwitchContext { map, cleanup_depth });

        for (clause, label) in clauses.iter().zip(labels) {
            self.builder.place_label(label);
            self.lower_compound(&clause.body)?;
        }

        self.switches.pop();
        let break_list = match self.breakables.pop() {
            Some(Breakable::Switch { break_list, .. }) => break_list,
            _ => return Err(ice!(LoweringError::BreakOutsideLoop)),
        };

        self.builder.place_label(fallthrough);

        Ok(ValueResult::next(break_list))
    }

    fn lower_return(&mut self, value: Option<&Expression>) -> Result<ValueResult> {
        let value = match value {
            Some(expression) => self.with_temporaries(|this| {
                let result = this.lower_expression(expression, EvaluationMode::Materialize)?;
                let return_type = this.symbol.return_type;

                if let Some(slot) = this.hidden_result {
                    let value = result.expect_value(expression.kind.name())?;
                    this.store(slot.into(), value, return_type)?;
                    return Ok(None);
                }

                if this.symbols.is_void(return_type)? {
                    return Ok(None);
                }

                result.expect_value(expression.kind.name()).map(Some)
            })?,
            None => self.default_return_value()?,
        };

        let cleanups = self.cleanups.pending_from(0);
        self.emit_cleanups(&cleanups)?;
        self.emit_return(value);

        Ok(ValueResult::default())
    }

    fn lower_break(&mut self) -> Result<ValueResult> {
        let depth = self
            .breakables
            .last()
            .map(Breakable::cleanup_depth)
            .ok_or_else(|| ice!(LoweringError::BreakOutsideLoop))?;

        let cleanups = self.cleanups.pending_from(depth);
        self.emit_cleanups(&cleanups)?;

        let jump = self.builder.pending_jump();
        if let Some(breakable) = self.breakables.last_mut() {
            breakable.break_list_mut().append(jump);
        }

        Ok(ValueResult::default())
    }

    fn lower_continue(&mut self) -> Result<ValueResult> {
        let index = self
            .breakables
            .iter()
            .rposition(|breakable| matches!(breakable, Breakable::Loop { .. }))
            .ok_or_else(|| ice!(LoweringError::ContinueOutsideLoop))?;

        let cleanups = self
            .cleanups
            .pending_from(self.breakables[index].cleanup_depth());
        self.emit_cleanups(&cleanups)?;

        if let Breakable::Loop {
            continue_target, ..
        } = &mut self.breakables[index]
        {
            match continue_target {
                ContinueTarget::Known(head) => {
                    self.builder.push(Instruction::Jump {
                        destination: Some(*head),
                    });
                }
                ContinueTarget::Pending(list) => list.append(self.builder.pending_jump()),
            }
        }

        Ok(ValueResult::default())
    }

    /// Leaves every compound which does not also enclose the target label,
    /// destroying their objects, and jumps to the label
    fn lower_goto(&mut self, label: InternedSymbol) -> Result<ValueResult> {
        let target_scopes = self.label_scopes.scopes_of(label)?;
        let shared = self
            .scope_chain
            .iter()
            .zip(target_scopes)
            .take_while(|(active, target)| active.id == **target)
            .count();

        let depth = match shared {
            0 => 0,
            shared => self.scope_chain[shared - 1].cleanup_depth + 1,
        };

        let cleanups = self.cleanups.pending_from(depth);
        self.emit_cleanups(&cleanups)?;
        self.goto_targets.jump(&mut self.builder, label);

        Ok(ValueResult::default())
    }

    /// `goto case value` when `value` is set, `goto default` otherwise
    fn lower_goto_case(&mut self, value: Option<&Literal>) -> Result<ValueResult> {
        let context = self
            .switches
            .last()
            .ok_or_else(|| ice!(LoweringError::GotoCaseOutsideSwitch))?;

        let label = match value {
            Some(value) => context.map.get(value)?.label,
            None => {
                context
                    .map
                    .default_target()
                    .ok_or_else(|| ice!(LoweringError::MissingDefault))?
                    .label
            }
        };

        let cleanups = self.cleanups.pending_from(context.cleanup_depth);
        self.emit_cleanups(&cleanups)?;
        self.builder.push(Instruction::Jump {
            destination: Some(label),
        });

        Ok(ValueResult::default())
    }

    fn lower_destruction(&mut self, object: &Expression, destructor: FunctionId) -> Result<ValueResult> {
        self.with_temporaries(|this| {
            let object = this.lower_address(object)?;

            if this.emit_destructor_call(DestructionObligation { object, destructor })? {
                this.check_exception_status()?;
            }

            Ok(())
        })?;

        Ok(ValueResult::default())
    }

    /// Failures raised inside `body` unwind to the handler, which starts by
    /// clearing the exception status
    fn lower_try(&mut self, body: &Compound, handler: &Compound) -> Result<ValueResult> {
        let handler_label = self.builder.create_label();

        self.protected_regions.push(ProtectedRegion {
            handler: handler_label,
            cleanup_depth: self.cleanups.depth(),
        });
        self.lower_compound(body)?;
        self.protected_regions.pop();

        let done = match self.builder.last_is_terminator() {
            true => TargetList::new(),
            false => self.builder.pending_jump(),
        };

        self.builder.place_label(handler_label);
        let status = self.exception_status();
        self.builder.push(Instruction::StoreMem {
            destination: status.into(),
            source: Immediate::Int(0, IntegerWidth::I32).into(),
        });
        self.lower_compound(handler)?;

        Ok(ValueResult::next(done))
    }

    /// Stores the exception code in the status slot and unwinds like a
    /// failed call would
    fn lower_throw(&mut self, code: &Expression) -> Result<ValueResult> {
        let value = self.with_temporaries(|this| {
            this.lower_expression(code, EvaluationMode::Materialize)?
                .expect_value(code.kind.name())
        })?;
        let value = self.exception_code(value)?;

        let status = self.exception_status();
        self.builder.push(Instruction::StoreMem {
            destination: status.into(),
            source: value,
        });

        let landing_pad = self.record_landing_pad(0);
        self.builder.push(Instruction::Jump {
            destination: Some(landing_pad),
        });

        Ok(ValueResult::default())
    }

    /// Brings an exception code to the width of the status slot
    fn exception_code(&mut self, value: Operand) -> Result<Operand> {
        if let Operand::Immediate(Immediate::Int(code, _)) = value {
            return Ok(Immediate::Int(code, IntegerWidth::I32).into());
        }

        let kind = match self.builder.operand_type(value) {
            None | Some(ir::Type::Integer(IntegerWidth::I32)) => return Ok(value),
            Some(ir::Type::Integer(width)) if width.size().bytes() < 4 => CastKind::SignExtend,
            Some(ir::Type::Integer(_)) => CastKind::Truncate,
            Some(ty) => {
                return Err(ice!(LoweringError::InvalidConversion {
                    from: format!("{ty:?}"),
                    to: "exception code".to_owned(),
                }));
            }
        };

        let destination = self
            .builder
            .create_register(ir::Type::Integer(IntegerWidth::I32));
        self.builder.push(Instruction::Cast {
            kind,
            destination,
            operand: value,
        });

        Ok(destination.into())
    }
}
