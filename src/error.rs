//! Every failure in this stage is an internal compiler error: the binder has
//! already reported user diagnostics, so a malformed bound tree reaching code
//! generation is a defect earlier in the pipeline. Errors abort lowering of
//! the whole compilation unit.

use thiserror::Error;

use crate::{
    bound::{FunctionId, TypeId, VariableId},
    intern::InternedSymbol,
    ir::{InstructionId, LabelId},
};

#[derive(Debug, Error)]
pub enum LoweringError {
    #[error("popped a cleanup stack while none were active")]
    EmptyCleanupStack,
    #[error("no storage was allocated for variable {0:?}")]
    UnallocatedStorage(VariableId),
    #[error("resolved a branch target list which was already empty")]
    EmptyTargetList,
    #[error("branch at {0:?} was resolved twice")]
    BranchAlreadyResolved(InstructionId),
    #[error("instruction {0:?} is not a branch and can not be backpatched")]
    NotABranch(InstructionId),
    #[error("branch at {0:?} still has no target after lowering")]
    UnresolvedBranch(InstructionId),
    #[error("label {0:?} was referenced but never placed")]
    UnplacedLabel(LabelId),
    #[error("duplicate case key `{key}` in switch statement")]
    DuplicateCaseKey { key: String },
    #[error("switch statement has more than one default clause")]
    DuplicateDefault,
    #[error("no case with key `{key}` in the enclosing switch statement")]
    UnknownCaseKey { key: String },
    #[error("`goto default` in a switch statement without a default clause")]
    MissingDefault,
    #[error("`goto case` or `goto default` outside of a switch statement")]
    GotoCaseOutsideSwitch,
    #[error("`break` outside of a loop or switch statement")]
    BreakOutsideLoop,
    #[error("`continue` outside of a loop")]
    ContinueOutsideLoop,
    #[error("goto target `{0}` does not exist")]
    UnknownLabel(InternedSymbol),
    #[error("label `{0}` is defined more than once")]
    DuplicateLabel(InternedSymbol),
    #[error("unknown function symbol {0:?}")]
    UnknownFunction(FunctionId),
    #[error("unknown type {0:?}")]
    UnknownType(TypeId),
    #[error("unknown variable symbol {0:?}")]
    UnknownVariable(VariableId),
    #[error("type {0:?} is not a class type")]
    NotAClass(TypeId),
    #[error("expression of kind `{0}` does not denote a storage location")]
    NotAddressable(&'static str),
    #[error("expression of kind `{0}` did not produce a value")]
    MissingValue(&'static str),
    #[error("virtual call to `{0}` but no class in its hierarchy owns a dispatch table")]
    MissingDispatchTable(InternedSymbol),
    #[error("virtual call to `{0}` which has no dispatch slot or owning class")]
    NotVirtual(InternedSymbol),
    #[error("intrinsic `{operator}` can not be applied to {operands} operand(s) of type {ty:?}")]
    InvalidIntrinsic {
        operator: &'static str,
        operands: usize,
        ty: TypeId,
    },
    #[error("no conversion from {from} to {to}")]
    InvalidConversion { from: String, to: String },
    #[error("a value of type {0:?} can not be returned in a register")]
    AggregateReturn(TypeId),
    #[error("{scopes} scope(s) were still open at the end of the function")]
    UnbalancedScopes { scopes: usize },
    #[error("in function `{function}`: {source}")]
    InFunction {
        function: InternedSymbol,
        #[source]
        source: Box<LoweringError>,
    },
}

pub type Result<T, E = LoweringError> = core::result::Result<T, E>;

/// Builds an internal error, logging the place it was raised from when the
/// `error-backtrace` feature is enabled.
#[macro_export]
macro_rules! ice {
    ($error:expr $(,)?) => {{
        let error: $crate::error::LoweringError = $error;

        #[cfg(feature = "error-backtrace")]
        ::tracing::error!(
            origin = concat!(module_path!(), " (at ", file!(), ":", line!(), ")"),
            "internal compiler error: {error}"
        );

        error
    }};
}

pub use crate::ice;
