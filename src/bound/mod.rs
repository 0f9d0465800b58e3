//! The bound tree is the fully resolved form of a procedure body handed to us
//! by the binder. Every call names the concrete function symbol it resolved
//! to, every node carries its type and operators on primitive types are
//! ordinary calls to functions marked as intrinsic. This stage only reads the
//! tree.

use core::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::{config::LoweringOptions, intern::InternedSymbol};

pub mod symbols;
pub mod visit;

pub use symbols::*;

/// A unit of work for the lowering stage: the bound bodies of every function
/// in one compilation unit plus the symbols they refer to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilationUnit {
    pub symbols: SymbolTable,
    pub functions: Vec<BoundFunction>,
    #[serde(default, skip_serializing)]
    pub options: LoweringOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundFunction {
    pub function: FunctionId,
    /// Parameters in declaration order
    pub parameters: Vec<VariableId>,
    /// Every local variable declared anywhere in the body, including the
    /// compiler generated ones which hold temporaries
    #[serde(default)]
    pub locals: Vec<VariableId>,
    pub body: Compound,
    /// The result is constructed into a slot passed by the caller as a hidden
    /// first argument instead of being returned in a register
    #[serde(default)]
    pub returns_by_hidden_slot: bool,
    /// Failures are reported to the caller through the exception status slot
    /// passed as a hidden last argument
    #[serde(default)]
    pub can_raise: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub ty: TypeId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, strum::IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExpressionKind {
    Literal(Literal),
    LocalVariable(VariableId),
    Parameter(VariableId),
    /// `object.field` where `field` indexes the fields declared by the class
    /// of `object` (not counting base class or dispatch table slots)
    MemberVariable {
        object: Box<Expression>,
        field: u32,
    },
    AddressOf(Box<Expression>),
    Dereference(Box<Expression>),
    Conversion {
        function: FunctionId,
        operand: Box<Expression>,
    },
    Unary {
        function: FunctionId,
        operand: Box<Expression>,
    },
    Binary {
        function: FunctionId,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    Call {
        function: FunctionId,
        arguments: Vec<Expression>,
        #[serde(default)]
        is_virtual: bool,
    },
    /// `lhs && rhs`
    Conjunction {
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    /// `lhs || rhs`
    Disjunction {
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    /// Constructs a value into the compiler generated local `variable` and
    /// evaluates to the constructed object, which is its address for class
    /// types. When `destroy` is set, the value is destroyed at the end of the
    /// enclosing full expression.
    Temporary {
        variable: VariableId,
        constructor: FunctionId,
        arguments: Vec<Expression>,
        #[serde(default)]
        destroy: bool,
    },
}

impl ExpressionKind {
    pub fn name(&self) -> &'static str {
        self.into()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Literal {
    Bool(bool),
    Char(char),
    Signed(i64),
    Unsigned(u64),
    Float(f64),
    Null,
}

impl Literal {
    /// The textual form used to key switch cases
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl core::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Bool(v) => write!(f, "{v}"),
            Literal::Char(v) => write!(f, "{v:?}"),
            Literal::Signed(v) => write!(f, "{v}"),
            Literal::Unsigned(v) => write!(f, "{v}"),
            Literal::Float(v) => write!(f, "{v:?}"),
            Literal::Null => write!(f, "null"),
        }
    }
}

/// A braced block which introduces a scope. Objects constructed directly in
/// it are destroyed whenever control leaves it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Compound {
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, strum::IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Statement {
    Compound(Compound),
    Expression(Expression),
    /// Declaration of a local: runs `constructor` on the storage of
    /// `variable`. The address of the variable is passed as the implicit
    /// first argument.
    Construction {
        variable: VariableId,
        constructor: FunctionId,
        arguments: Vec<Expression>,
    },
    Assignment {
        target: Expression,
        value: Expression,
    },
    If {
        condition: Expression,
        then_statement: Box<Statement>,
        else_statement: Option<Box<Statement>>,
    },
    While {
        condition: Expression,
        body: Box<Statement>,
    },
    DoWhile {
        body: Box<Statement>,
        condition: Expression,
    },
    For {
        initializer: Option<Box<Statement>>,
        condition: Option<Expression>,
        increment: Option<Expression>,
        body: Box<Statement>,
    },
    Switch {
        condition: Expression,
        clauses: Vec<SwitchClause>,
    },
    Return(Option<Expression>),
    Break,
    Continue,
    Labeled {
        label: InternedSymbol,
        statement: Box<Statement>,
    },
    Goto(InternedSymbol),
    GotoCase(Literal),
    GotoDefault,
    /// Explicit destructor call on an object
    Destruction {
        object: Expression,
        destructor: FunctionId,
    },
    /// A protected region. Any failure raised inside `body` unwinds to
    /// `handler`.
    Try {
        body: Compound,
        handler: Compound,
    },
    /// Raises the exception code produced by the expression
    Throw(Expression),
    Empty,
}

impl Statement {
    pub fn name(&self) -> &'static str {
        self.into()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchClause {
    pub kind: ClauseKind,
    pub body: Compound,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClauseKind {
    Case(Vec<Literal>),
    Default,
}
