//! Support for `goto`. A pre-pass records, for every labeled statement, the
//! chain of compounds enclosing it so that a jump knows which scopes it
//! leaves. Compounds are numbered in the order the lowering driver enters
//! them.

use hashbrown::HashMap;

use crate::{
    bound::{
        Compound, Statement,
        visit::{self, Visitor},
    },
    codegen::{builder::FunctionBuilder, value::TargetList},
    error::{LoweringError, Result, ice},
    index::{Index, simple_index},
    intern::InternedSymbol,
    ir::LabelId,
};

simple_index! {
    /// Pre-order number of a compound statement within one function body
    pub struct ScopeId;
}

#[derive(Debug, Default)]
pub struct LabelScopes {
    labels: HashMap<InternedSymbol, Vec<ScopeId>>,
}

impl LabelScopes {
    pub fn collect(body: &Compound) -> Result<Self> {
        let mut collector = LabelCollector::default();
        collector.visit_compound(body);

        match collector.duplicate {
            Some(label) => Err(ice!(LoweringError::DuplicateLabel(label))),
            None => Ok(Self {
                labels: collector.labels,
            }),
        }
    }

    /// Compounds enclosing the statement labeled `label`, outermost first
    pub fn scopes_of(&self, label: InternedSymbol) -> Result<&[ScopeId]> {
        self.labels
            .get(&label)
            .map(Vec::as_slice)
            .ok_or_else(|| ice!(LoweringError::UnknownLabel(label)))
    }
}

#[derive(Debug, Default)]
struct LabelCollector {
    next_scope: usize,
    active: Vec<ScopeId>,
    labels: HashMap<InternedSymbol, Vec<ScopeId>>,
    duplicate: Option<InternedSymbol>,
}

impl<'tree> Visitor<'tree> for LabelCollector {
    fn visit_compound(&mut self, compound: &'tree Compound) {
        self.active.push(ScopeId::new(self.next_scope));
        self.next_scope += 1;
        visit::walk_compound(self, compound);
        self.active.pop();
    }

    fn visit_statement(&mut self, statement: &'tree Statement) {
        if let Statement::Labeled { label, .. } = statement {
            if self.labels.insert(*label, self.active.clone()).is_some() {
                self.duplicate.get_or_insert(*label);
            }
        }

        visit::walk_statement(self, statement);
    }
}

/// Labels placed so far and the forward jumps still waiting for theirs
#[derive(Debug, Default)]
pub struct GotoTargets {
    placed: HashMap<InternedSymbol, LabelId>,
    pending: HashMap<InternedSymbol, TargetList>,
}

impl GotoTargets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the current position as the target of `name` and resolves the
    /// jumps which were waiting for it
    pub fn place(&mut self, builder: &mut FunctionBuilder, name: InternedSymbol) -> Result<LabelId> {
        if self.placed.contains_key(&name) {
            return Err(ice!(LoweringError::DuplicateLabel(name)));
        }

        let label = builder.current_label();
        if let Some(pending) = self.pending.remove(&name) {
            builder.resolve_to(pending, label)?;
        }
        self.placed.insert(name, label);

        Ok(label)
    }

    /// Emits the jump to `name`. Jumps to labels which were not placed yet
    /// are resolved by [`GotoTargets::place`].
    pub fn jump(&mut self, builder: &mut FunctionBuilder, name: InternedSymbol) {
        match self.placed.get(&name) {
            Some(label) => {
                builder.push(crate::ir::Instruction::Jump {
                    destination: Some(*label),
                });
            }
            None => {
                let jump = builder.pending_jump();
                self.pending.entry(name).or_default().append(jump);
            }
        }
    }

    pub fn finish(self) -> Result<()> {
        match self.pending.into_keys().next() {
            Some(name) => Err(ice!(LoweringError::UnknownLabel(name))),
            None => Ok(()),
        }
    }
}
