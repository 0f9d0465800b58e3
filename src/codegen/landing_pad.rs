use crate::{
    codegen::cleanup::DestructionObligation,
    index::{IndexVec, simple_index},
    ir::LabelId,
};

simple_index! {
    pub struct LandingPadId;
}

/// Unwind code owed by one raising call site or `throw`. Pads are emitted
/// after the function body.
#[derive(Debug, Clone, PartialEq)]
pub struct LandingPad {
    pub id: LandingPadId,
    /// Where the raising site branches to
    pub label: LabelId,
    /// The handler of the innermost protected region around the site. Without
    /// one the function returns and reports the failure to its caller.
    pub handler: Option<LabelId>,
    /// Destructors to run before resuming, innermost first
    pub cleanups: Vec<DestructionObligation>,
}

#[derive(Debug, Default)]
pub struct LandingPadTable {
    pads: IndexVec<LandingPadId, LandingPad>,
}

impl LandingPadTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        label: LabelId,
        handler: Option<LabelId>,
        cleanups: Vec<DestructionObligation>,
    ) -> LandingPadId {
        let id = self.pads.next_index();
        self.pads.push(LandingPad {
            id,
            label,
            handler,
            cleanups,
        })
    }

    pub fn len(&self) -> usize {
        self.pads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pads.is_empty()
    }

    /// Hands out the recorded pads in recording order, leaving the table
    /// empty
    pub fn take(&mut self) -> impl Iterator<Item = LandingPad> + use<> {
        std::mem::take(&mut self.pads).raw.into_iter()
    }
}
