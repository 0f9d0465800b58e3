use crate::{
    bound::FunctionId,
    error::{LoweringError, Result, ice},
    ir::Operand,
};

/// A destructor call owed on `object` when its scope is left
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DestructionObligation {
    /// Address of the object
    pub object: Operand,
    pub destructor: FunctionId,
}

/// Obligations of one scope in construction order
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CleanupStack {
    obligations: Vec<DestructionObligation>,
}

impl CleanupStack {
    /// Obligations in the order their destructors have to run
    pub fn in_destruction_order(&self) -> impl Iterator<Item = &DestructionObligation> {
        self.obligations.iter().rev()
    }
}

/// One cleanup stack per open scope, innermost last. Compound statements,
/// full expressions and the scope of a `for` initializer each push one.
#[derive(Debug, Default)]
pub struct CleanupStacks {
    stacks: Vec<CleanupStack>,
}

impl CleanupStacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of open scopes. The scope opened next gets this index.
    pub fn depth(&self) -> usize {
        self.stacks.len()
    }

    pub fn push_scope(&mut self) {
        self.stacks.push(CleanupStack::default());
    }

    /// Drops the innermost scope. Its destructors must already have been
    /// emitted on every path leaving it.
    pub fn pop_scope(&mut self) -> Result<()> {
        self.stacks
            .pop()
            .map(drop)
            .ok_or_else(|| ice!(LoweringError::EmptyCleanupStack))
    }

    /// Adds an obligation to the innermost scope
    pub fn push(&mut self, obligation: DestructionObligation) -> Result<()> {
        self.stacks
            .last_mut()
            .ok_or_else(|| ice!(LoweringError::EmptyCleanupStack))?
            .obligations
            .push(obligation);

        Ok(())
    }

    /// Every obligation of the scopes from index `depth` inwards, innermost
    /// scope first and each scope in reverse construction order. This is
    /// what has to run when control leaves all of these scopes at once.
    pub fn pending_from(&self, depth: usize) -> Vec<DestructionObligation> {
        self.stacks
            .get(depth..)
            .unwrap_or_default()
            .iter()
            .rev()
            .flat_map(CleanupStack::in_destruction_order)
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{index::Index, ir::RegisterId};

    fn obligation(register: usize) -> DestructionObligation {
        DestructionObligation {
            object: RegisterId::new(register).into(),
            destructor: FunctionId::new(0),
        }
    }

    #[test]
    fn pending_obligations_run_innermost_first() {
        let mut stacks = CleanupStacks::new();
        stacks.push_scope();
        stacks.push(obligation(0)).unwrap();
        stacks.push(obligation(1)).unwrap();
        stacks.push_scope();
        stacks.push(obligation(2)).unwrap();

        assert_eq!(
            stacks.pending_from(0),
            vec![obligation(2), obligation(1), obligation(0)]
        );
        assert_eq!(stacks.pending_from(1), vec![obligation(2)]);
        assert_eq!(stacks.pending_from(2), vec![]);
    }

    #[test]
    fn popping_without_scopes_is_an_error() {
        let mut stacks = CleanupStacks::new();

        assert!(matches!(
            stacks.pop_scope(),
            Err(LoweringError::EmptyCleanupStack)
        ));
        assert!(matches!(
            stacks.push(obligation(0)),
            Err(LoweringError::EmptyCleanupStack)
        ));
    }
}
