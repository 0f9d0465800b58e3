use super::{Compound, Expression, ExpressionKind, Statement, SwitchClause};

/// Read-only traversal over a bound function body. Every `visit_*` method
/// defaults to the matching `walk_*` function so implementors only override
/// the nodes they care about.
pub trait Visitor<'tree>: Sized {
    fn visit_compound(&mut self, compound: &'tree Compound) {
        walk_compound(self, compound)
    }

    fn visit_statement(&mut self, statement: &'tree Statement) {
        walk_statement(self, statement)
    }

    fn visit_switch_clause(&mut self, clause: &'tree SwitchClause) {
        walk_switch_clause(self, clause)
    }

    fn visit_expression(&mut self, expression: &'tree Expression) {
        walk_expression(self, expression)
    }
}

pub fn walk_compound<'tree>(visitor: &mut impl Visitor<'tree>, compound: &'tree Compound) {
    for statement in &compound.statements {
        visitor.visit_statement(statement);
    }
}

/// Children are visited in the order the lowering driver emits them
pub fn walk_statement<'tree>(visitor: &mut impl Visitor<'tree>, statement: &'tree Statement) {
    match statement {
        Statement::Compound(compound) => visitor.visit_compound(compound),
        Statement::Expression(expression) | Statement::Throw(expression) => {
            visitor.visit_expression(expression)
        }
        Statement::Construction { arguments, .. } => {
            for argument in arguments {
                visitor.visit_expression(argument);
            }
        }
        Statement::Assignment { target, value } => {
            visitor.visit_expression(target);
            visitor.visit_expression(value);
        }
        Statement::If {
            condition,
            then_statement,
            else_statement,
        } => {
            visitor.visit_expression(condition);
            visitor.visit_statement(then_statement);
            if let Some(else_statement) = else_statement {
                visitor.visit_statement(else_statement);
            }
        }
        Statement::While { condition, body } => {
            visitor.visit_expression(condition);
            visitor.visit_statement(body);
        }
        Statement::DoWhile { body, condition } => {
            visitor.visit_statement(body);
            visitor.visit_expression(condition);
        }
        Statement::For {
            initializer,
            condition,
            increment,
            body,
        } => {
            if let Some(initializer) = initializer {
                visitor.visit_statement(initializer);
            }
            if let Some(condition) = condition {
                visitor.visit_expression(condition);
            }
            visitor.visit_statement(body);
            if let Some(increment) = increment {
                visitor.visit_expression(increment);
            }
        }
        Statement::Switch { condition, clauses } => {
            visitor.visit_expression(condition);
            for clause in clauses {
                visitor.visit_switch_clause(clause);
            }
        }
        Statement::Return(value) => {
            if let Some(value) = value {
                visitor.visit_expression(value);
            }
        }
        Statement::Labeled { statement, .. } => visitor.visit_statement(statement),
        Statement::Destruction { object, .. } => visitor.visit_expression(object),
        Statement::Try { body, handler } => {
            visitor.visit_compound(body);
            visitor.visit_compound(handler);
        }
        Statement::Break
        | Statement::Continue
        | Statement::Goto(_)
        | Statement::GotoCase(_)
        | Statement::GotoDefault
        | Statement::Empty => {}
    }
}

pub fn walk_switch_clause<'tree>(visitor: &mut impl Visitor<'tree>, clause: &'tree SwitchClause) {
    visitor.visit_compound(&clause.body);
}

pub fn walk_expression<'tree>(visitor: &mut impl Visitor<'tree>, expression: &'tree Expression) {
    match &expression.kind {
        ExpressionKind::Literal(_)
        | ExpressionKind::LocalVariable(_)
        | ExpressionKind::Parameter(_) => {}
        ExpressionKind::MemberVariable { object: operand, .. }
        | ExpressionKind::AddressOf(operand)
        | ExpressionKind::Dereference(operand)
        | ExpressionKind::Conversion { operand, .. }
        | ExpressionKind::Unary { operand, .. } => visitor.visit_expression(operand),
        ExpressionKind::Binary { lhs, rhs, .. }
        | ExpressionKind::Conjunction { lhs, rhs }
        | ExpressionKind::Disjunction { lhs, rhs } => {
            visitor.visit_expression(lhs);
            visitor.visit_expression(rhs);
        }
        ExpressionKind::Call { arguments, .. } | ExpressionKind::Temporary { arguments, .. } => {
            for argument in arguments {
                visitor.visit_expression(argument);
            }
        }
    }
}
