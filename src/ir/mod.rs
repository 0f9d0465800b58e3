//! The instruction stream produced for every lowered function. Control flow
//! is expressed with labels and branches, expressions are flattened into
//! ordered operations on virtual registers and every local lives in a stack
//! slot allocated in the prologue.

use std::{collections::BTreeMap, rc::Rc};

use crate::{
    bound::FunctionId,
    index::{IndexVec, simple_index},
    intern::InternedSymbol,
};

pub mod layout;
pub mod pretty_print;

#[derive(Debug, Default)]
pub struct Module {
    pub function_definitions: BTreeMap<FunctionId, FunctionDefinition>,
}

#[derive(Debug)]
pub struct FunctionDefinition {
    pub symbol_name: InternedSymbol,
    /// Allocated virtual registers used to store temporary data
    pub registers: IndexVec<RegisterId, Register>,
    /// Registers receiving the incoming arguments, hidden ones included
    pub arguments: Vec<RegisterId>,
    pub instructions: IndexVec<InstructionId, Instruction>,
    /// Position of every label in `instructions`
    pub labels: IndexVec<LabelId, InstructionId>,
    pub landing_pad_count: usize,
}

impl FunctionDefinition {
    /// Every instruction matching the predicate, in stream order
    pub fn find_all<'a>(
        &'a self,
        predicate: impl Fn(&Instruction) -> bool + 'a,
    ) -> impl Iterator<Item = (InstructionId, &'a Instruction)> + 'a {
        self.instructions
            .enumerate()
            .filter(move |(_, instruction)| predicate(instruction))
    }

    /// Names of the directly called functions, in stream order
    pub fn direct_calls(&self) -> Vec<&'static str> {
        self.instructions
            .iter()
            .filter_map(|instruction| match instruction {
                Instruction::FunctionCall {
                    target: CallTarget::Direct(name),
                    ..
                } => Some(name.value()),
                _ => None,
            })
            .collect()
    }
}

simple_index! {
    /// Identifies a virtual register which holds a temporary value
    pub struct RegisterId;
}

simple_index! {
    /// Identifies a branch target
    pub struct LabelId;
}

simple_index! {
    /// Position of an instruction within a function
    pub struct InstructionId;
}

/// A temporary virtual register of some size and alignment
#[derive(Debug, Clone, PartialEq)]
pub struct Register {
    pub id: RegisterId,
    pub ty: Type,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntegerWidth {
    I8,
    I16,
    I32,
    I64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatWidth {
    F32,
    F64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Void,
    Integer(IntegerWidth),
    Float(FloatWidth),
    Pointer(Rc<Type>),
    Struct(Struct),
    /// A class referred to by name. Only appears behind a pointer.
    Named(InternedSymbol),
}

impl Type {
    pub fn bool() -> Self {
        Type::Integer(IntegerWidth::I8)
    }

    /// Opaque pointer used for `void*` and code addresses
    pub fn byte_pointer() -> Self {
        Type::Pointer(Rc::new(Type::Integer(IntegerWidth::I8)))
    }

    /// A pointer to a table of code addresses
    pub fn dispatch_table_pointer() -> Self {
        Type::Pointer(Rc::new(Self::byte_pointer()))
    }

    pub fn pointer_to(self) -> Self {
        Type::Pointer(Rc::new(self))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, Type::Struct(_) | Type::Named(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Struct {
    pub name: Option<InternedSymbol>,
    pub fields: Rc<[Type]>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Label(LabelId),
    AllocStack {
        destination: RegisterId,
        ty: Type,
        name: Option<InternedSymbol>,
    },
    LoadMem {
        destination: RegisterId,
        source: Operand,
    },
    StoreMem {
        destination: Operand,
        source: Operand,
    },
    CopyMem {
        destination: Operand,
        source: Operand,
        size: u64,
    },
    Move {
        destination: RegisterId,
        source: Operand,
    },
    UnaryOperation {
        operator: UnaryOperator,
        destination: RegisterId,
        operand: Operand,
    },
    BinaryOperation {
        operator: BinaryOperator,
        kind: NumericKind,
        destination: RegisterId,
        lhs: Operand,
        rhs: Operand,
    },
    Compare {
        predicate: ComparisonPredicate,
        kind: NumericKind,
        destination: RegisterId,
        lhs: Operand,
        rhs: Operand,
    },
    Cast {
        kind: CastKind,
        destination: RegisterId,
        operand: Operand,
    },
    GetFieldPointer {
        destination: RegisterId,
        source: Operand,
        index: u32,
    },
    GetElementPointer {
        destination: RegisterId,
        source: Operand,
        index: Operand,
    },
    FunctionCall {
        target: CallTarget,
        arguments: Vec<Operand>,
        destination: Option<RegisterId>,
    },
    /// Transfers control to `positive` when the condition is non-zero.
    /// Targets stay `None` until the branch is backpatched.
    Branch {
        condition: Operand,
        positive: Option<LabelId>,
        negative: Option<LabelId>,
    },
    Jump {
        destination: Option<LabelId>,
    },
    Switch {
        value: Operand,
        cases: Vec<(Immediate, LabelId)>,
        default: LabelId,
    },
    Return {
        value: Option<Operand>,
    },
    Comment(String),
}

impl Instruction {
    /// Control never falls through to the next instruction
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Instruction::Jump { .. } | Instruction::Switch { .. } | Instruction::Return { .. }
        )
    }

    pub fn is_call_to(&self, function: &str) -> bool {
        matches!(
            self,
            Instruction::FunctionCall { target: CallTarget::Direct(name), .. } if name.value() == function
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallTarget {
    Direct(InternedSymbol),
    Indirect(RegisterId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum UnaryOperator {
    Negate,
    Complement,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ComparisonPredicate {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// How the bits of an operand are interpreted by an arithmetic operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum NumericKind {
    #[strum(serialize = "s")]
    Signed,
    #[strum(serialize = "u")]
    Unsigned,
    #[strum(serialize = "f")]
    Float,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum CastKind {
    Truncate,
    SignExtend,
    ZeroExtend,
    FloatTruncate,
    FloatExtend,
    SignedToFloat,
    UnsignedToFloat,
    FloatToSigned,
    FloatToUnsigned,
    PointerToInteger,
    IntegerToPointer,
    Bitcast,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Immediate {
    Int(i128, IntegerWidth),
    Float(f64, FloatWidth),
    Bool(bool),
    Null,
    FunctionLabel(InternedSymbol),
}

impl Immediate {
    /// The all zero value of a scalar type
    pub fn zero(ty: &Type) -> Option<Self> {
        match ty {
            Type::Integer(width) => Some(Immediate::Int(0, *width)),
            Type::Float(width) => Some(Immediate::Float(0.0, *width)),
            Type::Pointer(_) => Some(Immediate::Null),
            Type::Void | Type::Struct(_) | Type::Named(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    Immediate(Immediate),
    Register(RegisterId),
}

impl From<RegisterId> for Operand {
    fn from(value: RegisterId) -> Self {
        Operand::Register(value)
    }
}

impl From<Immediate> for Operand {
    fn from(value: Immediate) -> Self {
        Operand::Immediate(value)
    }
}
