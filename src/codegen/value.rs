//! Value results are the unit of data flow between lowering steps. Besides the
//! computed value they carry the branches whose targets are not known yet.
//! Every such branch sits in exactly one target list until the list is
//! resolved, at which point the branch is backpatched and the list consumed.

use crate::{
    error::{LoweringError, Result, ice},
    index::IndexVec,
    ir::{Instruction, InstructionId, LabelId, Operand},
};

/// Which target of a branch instruction is pending
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchEdge {
    Positive,
    Negative,
    Unconditional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingBranch {
    pub instruction: InstructionId,
    pub edge: BranchEdge,
}

/// Branches waiting for the same label. Deliberately not `Clone`: a pending
/// branch can only be resolved once.
#[derive(Debug, Default, PartialEq, Eq)]
#[must_use]
pub struct TargetList {
    branches: Vec<PendingBranch>,
}

impl TargetList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(instruction: InstructionId, edge: BranchEdge) -> Self {
        Self {
            branches: vec![PendingBranch { instruction, edge }],
        }
    }

    pub fn jump(instruction: InstructionId) -> Self {
        Self::single(instruction, BranchEdge::Unconditional)
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    pub fn len(&self) -> usize {
        self.branches.len()
    }

    pub fn branches(&self) -> &[PendingBranch] {
        &self.branches
    }

    pub fn append(&mut self, mut other: TargetList) {
        self.branches.append(&mut other.branches);
    }

    pub fn merge(mut self, other: TargetList) -> Self {
        self.append(other);
        self
    }

    /// Points every pending branch at `label`
    pub fn backpatch(
        self,
        label: LabelId,
        instructions: &mut IndexVec<InstructionId, Instruction>,
    ) -> Result<()> {
        if self.branches.is_empty() {
            return Err(ice!(LoweringError::EmptyTargetList));
        }

        for PendingBranch { instruction, edge } in self.branches {
            let target = match (instructions.get_mut(instruction), edge) {
                (Some(Instruction::Branch { positive, .. }), BranchEdge::Positive) => positive,
                (Some(Instruction::Branch { negative, .. }), BranchEdge::Negative) => negative,
                (Some(Instruction::Jump { destination }), BranchEdge::Unconditional) => {
                    destination
                }
                _ => return Err(ice!(LoweringError::NotABranch(instruction))),
            };

            if target.is_some() {
                return Err(ice!(LoweringError::BranchAlreadyResolved(instruction)));
            }
            *target = Some(label);
        }

        Ok(())
    }
}

/// Selects how a boolean valued expression is lowered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationMode {
    /// Compute the value into an operand
    Materialize,
    /// Branch on the value and hand back the true and false lists
    Jump,
}

#[derive(Debug, Default)]
#[must_use]
pub struct ValueResult {
    /// The computed value. Values of class type are represented by their
    /// address.
    pub value: Option<Operand>,
    /// Operands collected for a call which has not been emitted yet
    pub arguments: Vec<Operand>,
    pub true_list: TargetList,
    pub false_list: TargetList,
    /// Branches to whatever follows the lowered node
    pub next_list: TargetList,
    /// Label placed at the start of the lowered node, if one was needed
    pub entry: Option<LabelId>,
    /// Set when a jumping result is known at compile time
    pub constant: Option<bool>,
}

impl ValueResult {
    pub fn value(value: impl Into<Operand>) -> Self {
        Self {
            value: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn jump(true_list: TargetList, false_list: TargetList) -> Self {
        Self {
            true_list,
            false_list,
            ..Default::default()
        }
    }

    pub fn next(next_list: TargetList) -> Self {
        Self {
            next_list,
            ..Default::default()
        }
    }

    pub fn with_entry(mut self, entry: Option<LabelId>) -> Self {
        self.entry = entry;
        self
    }

    /// The computed value, failing for results which only produced branches
    pub fn expect_value(&self, kind: &'static str) -> Result<Operand> {
        self.value
            .ok_or_else(|| ice!(LoweringError::MissingValue(kind)))
    }
}
