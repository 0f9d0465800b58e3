//! Builders for symbol tables and bound trees used by the lowering tests

#![allow(dead_code)]

use bound_lower::{
    bound::{
        BoundFunction, ClassType, Compound, Expression, ExpressionKind, FunctionId,
        FunctionSymbol, Literal, Statement, SymbolTable, TypeId, TypeKind, VariableId,
    },
    config::LoweringOptions,
    ir::{FunctionDefinition, Instruction, Operand, pretty_print::pretty_print_ir},
    lower_function,
    primitive::{IntKind, IntrinsicOperator},
};

pub struct Symbols {
    pub table: SymbolTable,
    pub void: TypeId,
    pub boolean: TypeId,
    pub int: TypeId,
}

impl Symbols {
    pub fn new() -> Self {
        let mut table = SymbolTable::new();
        let void = table.insert_type(TypeKind::Void);
        let boolean = table.insert_type(TypeKind::Bool);
        let int = table.insert_type(TypeKind::Integer(IntKind::I32));

        Self {
            table,
            void,
            boolean,
            int,
        }
    }

    pub fn insert(&mut self, symbol: FunctionSymbol) -> FunctionId {
        self.table.insert_function(symbol)
    }

    pub fn function(&mut self, name: &str, return_type: TypeId) -> FunctionId {
        self.insert(symbol(name, return_type))
    }

    pub fn raising(&mut self, name: &str, return_type: TypeId) -> FunctionId {
        self.insert(FunctionSymbol {
            can_raise: true,
            ..symbol(name, return_type)
        })
    }

    pub fn intrinsic(
        &mut self,
        name: &str,
        return_type: TypeId,
        operator: IntrinsicOperator,
    ) -> FunctionId {
        self.insert(FunctionSymbol {
            intrinsic: Some(operator),
            ..symbol(name, return_type)
        })
    }

    pub fn ty(&mut self, kind: TypeKind) -> TypeId {
        self.table.insert_type(kind)
    }

    /// A class without base and dispatch table
    pub fn class(
        &mut self,
        name: &str,
        fields: Vec<TypeId>,
        destructor: Option<FunctionId>,
    ) -> TypeId {
        self.ty(TypeKind::Class(ClassType {
            name: name.into(),
            base: None,
            fields,
            has_dispatch_table: false,
            destructor,
        }))
    }

    /// A class `Guard` with a destructor `~Guard` and a default constructor
    /// `Guard`. Returns the class and its constructor.
    pub fn guard(&mut self) -> (TypeId, FunctionId) {
        let destructor = self.function("~Guard", self.void);
        let guard = self.class("Guard", vec![], Some(destructor));
        let constructor = self.function("Guard", self.void);

        (guard, constructor)
    }

    pub fn variable(&mut self, name: &str, ty: TypeId) -> VariableId {
        self.table.insert_variable(name, ty)
    }

    /// A bound function whose flags mirror its symbol
    pub fn bound(
        &self,
        function: FunctionId,
        parameters: Vec<VariableId>,
        locals: Vec<VariableId>,
        statements: Vec<Statement>,
    ) -> BoundFunction {
        let symbol = &self.table.functions[function];

        BoundFunction {
            function,
            parameters,
            locals,
            body: block(statements),
            returns_by_hidden_slot: symbol.returns_by_hidden_slot,
            can_raise: symbol.can_raise,
        }
    }

    pub fn lower(&self, function: &BoundFunction) -> FunctionDefinition {
        self.lower_with(function, &LoweringOptions::default())
    }

    pub fn lower_with(&self, function: &BoundFunction, options: &LoweringOptions) -> FunctionDefinition {
        lower_function(function, &self.table, options).expect("function should lower")
    }
}

pub fn symbol(name: &str, return_type: TypeId) -> FunctionSymbol {
    FunctionSymbol {
        name: name.into(),
        return_type,
        can_raise: false,
        returns_by_hidden_slot: false,
        intrinsic: None,
        dispatch_slot: None,
        owner: None,
    }
}

/// The argument lists of every direct call to `name`, in stream order
pub fn calls_to(function: &FunctionDefinition, name: &str) -> Vec<Vec<Operand>> {
    function
        .find_all(|instruction| instruction.is_call_to(name))
        .filter_map(|(_, instruction)| match instruction {
            Instruction::FunctionCall { arguments, .. } => Some(arguments.clone()),
            _ => None,
        })
        .collect()
}

/// The listing of a lowered function without colors
pub fn listing(function: &FunctionDefinition) -> String {
    strip_ansi_escapes::strip_str(pretty_print_ir(function))
}

pub fn block(statements: Vec<Statement>) -> Compound {
    Compound { statements }
}

pub fn expression(kind: ExpressionKind, ty: TypeId) -> Expression {
    Expression { kind, ty }
}

pub fn int(value: i64, ty: TypeId) -> Expression {
    expression(ExpressionKind::Literal(Literal::Signed(value)), ty)
}

pub fn boolean(value: bool, ty: TypeId) -> Expression {
    expression(ExpressionKind::Literal(Literal::Bool(value)), ty)
}

pub fn local(variable: VariableId, ty: TypeId) -> Expression {
    expression(ExpressionKind::LocalVariable(variable), ty)
}

pub fn parameter(variable: VariableId, ty: TypeId) -> Expression {
    expression(ExpressionKind::Parameter(variable), ty)
}

pub fn call(function: FunctionId, arguments: Vec<Expression>, ty: TypeId) -> Expression {
    expression(
        ExpressionKind::Call {
            function,
            arguments,
            is_virtual: false,
        },
        ty,
    )
}

pub fn binary(function: FunctionId, lhs: Expression, rhs: Expression, ty: TypeId) -> Expression {
    expression(
        ExpressionKind::Binary {
            function,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        ty,
    )
}

pub fn and(lhs: Expression, rhs: Expression, ty: TypeId) -> Expression {
    expression(
        ExpressionKind::Conjunction {
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        ty,
    )
}

pub fn or(lhs: Expression, rhs: Expression, ty: TypeId) -> Expression {
    expression(
        ExpressionKind::Disjunction {
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        ty,
    )
}

/// A default constructed temporary destroyed at the end of its full
/// expression
pub fn temporary(variable: VariableId, constructor: FunctionId, ty: TypeId) -> Expression {
    expression(
        ExpressionKind::Temporary {
            variable,
            constructor,
            arguments: vec![],
            destroy: true,
        },
        ty,
    )
}

pub fn construct(variable: VariableId, constructor: FunctionId) -> Statement {
    Statement::Construction {
        variable,
        constructor,
        arguments: vec![],
    }
}

pub fn if_then(condition: Expression, then_statement: Statement) -> Statement {
    Statement::If {
        condition,
        then_statement: Box::new(then_statement),
        else_statement: None,
    }
}

pub fn labeled(label: &str, statement: Statement) -> Statement {
    Statement::Labeled {
        label: label.into(),
        statement: Box::new(statement),
    }
}
