mod support;

use bound_lower::{
    LoweringError,
    bound::{ClauseKind, Expression, Literal, Statement, SwitchClause, TypeId},
    config::LoweringOptions,
    ir::{FunctionDefinition, Instruction},
    lower_function,
    primitive::IntrinsicOperator,
};
use indoc::indoc;
use pretty_assertions::assert_eq;
use support::*;

fn branches(function: &FunctionDefinition) -> usize {
    function
        .find_all(|instruction| matches!(instruction, Instruction::Branch { .. }))
        .count()
}

#[test]
fn constant_false_conjunction_never_evaluates_its_right_operand() {
    let mut symbols = Symbols::new();
    let probe = symbols.function("probe", symbols.boolean);
    let hit = symbols.function("hit", symbols.void);
    let main = symbols.function("main", symbols.void);

    let condition = and(
        boolean(false, symbols.boolean),
        call(probe, vec![], symbols.boolean),
        symbols.boolean,
    );
    let function = symbols.bound(
        main,
        vec![],
        vec![],
        vec![if_then(
            condition,
            Statement::Expression(call(hit, vec![], symbols.void)),
        )],
    );
    let lowered = symbols.lower(&function);

    assert!(!lowered.direct_calls().contains(&"probe"));
    assert_eq!(branches(&lowered), 0);
}

#[test]
fn constant_true_disjunction_never_evaluates_its_right_operand() {
    let mut symbols = Symbols::new();
    let probe = symbols.function("probe", symbols.boolean);
    let hit = symbols.function("hit", symbols.void);
    let main = symbols.function("main", symbols.void);

    let condition = or(
        boolean(true, symbols.boolean),
        call(probe, vec![], symbols.boolean),
        symbols.boolean,
    );
    let function = symbols.bound(
        main,
        vec![],
        vec![],
        vec![if_then(
            condition,
            Statement::Expression(call(hit, vec![], symbols.void)),
        )],
    );
    let lowered = symbols.lower(&function);

    assert_eq!(lowered.direct_calls(), vec!["hit"]);
    assert_eq!(branches(&lowered), 0);
}

#[test]
fn materialized_conjunction_joins_both_arms() {
    let mut symbols = Symbols::new();
    let both = symbols.function("both", symbols.boolean);
    let a = symbols.variable("a", symbols.boolean);
    let b = symbols.variable("b", symbols.boolean);

    let function = symbols.bound(
        both,
        vec![a, b],
        vec![],
        vec![Statement::Return(Some(and(
            parameter(a, symbols.boolean),
            parameter(b, symbols.boolean),
            symbols.boolean,
        )))],
    );

    assert_eq!(
        listing(&symbols.lower(&function)),
        indoc! {"
            fn both(%1: i8, %3: i8) {
                %0 = alloc i8 ; a
                %2 = alloc i8 ; b
                store %0 <- %1
                store %2 <- %3
                %4 = load %0
                br %4 .label_0 .label_2
            .label_0:
                %5 = load %2
                br %5 .label_1 .label_2
            .label_1:
                %6 = true
                jmp .label_3
            .label_2:
                %6 = false
            .label_3:
                ret %6
            }
        "}
    );
}

/// `if (check(Guard()) <op> other()) hit();` with the temporary guard bound
/// to the left operand
fn guarded_condition(
    combine: fn(Expression, Expression, TypeId) -> Expression,
) -> FunctionDefinition {
    let mut symbols = Symbols::new();
    let (guard, constructor) = symbols.guard();
    let check = symbols.function("check", symbols.boolean);
    let other = symbols.function("other", symbols.boolean);
    let hit = symbols.function("hit", symbols.void);
    let main = symbols.function("main", symbols.void);
    let t = symbols.variable("t", guard);

    let condition = combine(
        call(check, vec![temporary(t, constructor, guard)], symbols.boolean),
        call(other, vec![], symbols.boolean),
        symbols.boolean,
    );
    let function = symbols.bound(
        main,
        vec![],
        vec![t],
        vec![if_then(
            condition,
            Statement::Expression(call(hit, vec![], symbols.void)),
        )],
    );

    symbols.lower(&function)
}

#[test]
fn conjunction_destroys_left_temporaries_on_both_edges() {
    let lowered = guarded_condition(and);

    assert_eq!(
        listing(&lowered),
        indoc! {"
            fn main() {
                %0 = alloc %Guard ; t
                call Guard(%0)
                %1 = call check(%0)
                br %1 .label_0 .label_1
            .label_0:
                call ~Guard(%0)
                jmp .label_2
            .label_1:
                call ~Guard(%0)
                jmp .label_4
            .label_2:
                %2 = call other()
                br %2 .label_3 .label_4
            .label_3:
                call hit()
            .label_4:
                ret
            }
        "}
    );
}

#[test]
fn disjunction_destroys_left_temporaries_on_both_edges() {
    let lowered = guarded_condition(or);

    assert_eq!(
        listing(&lowered),
        indoc! {"
            fn main() {
                %0 = alloc %Guard ; t
                call Guard(%0)
                %1 = call check(%0)
                br %1 .label_0 .label_1
            .label_0:
                call ~Guard(%0)
                jmp .label_3
            .label_1:
                call ~Guard(%0)
                jmp .label_2
            .label_2:
                %2 = call other()
                br %2 .label_3 .label_4
            .label_3:
                call hit()
            .label_4:
                ret
            }
        "}
    );
}

#[test]
fn counting_loop() {
    let mut symbols = Symbols::new();
    let number = symbols.int;
    let init = symbols.intrinsic("int", symbols.void, IntrinsicOperator::CopyConstruct);
    let less = symbols.intrinsic("operator<", symbols.boolean, IntrinsicOperator::LessThan);
    let add = symbols.intrinsic("operator+", number, IntrinsicOperator::Add);
    let assign = symbols.intrinsic("operator=", number, IntrinsicOperator::Assign);
    let tick = symbols.function("tick", symbols.void);
    let count = symbols.function("count", symbols.void);
    let i = symbols.variable("i", number);

    let function = symbols.bound(
        count,
        vec![],
        vec![i],
        vec![Statement::For {
            initializer: Some(Box::new(Statement::Construction {
                variable: i,
                constructor: init,
                arguments: vec![int(0, number)],
            })),
            condition: Some(binary(less, local(i, number), int(3, number), symbols.boolean)),
            increment: Some(binary(
                assign,
                local(i, number),
                binary(add, local(i, number), int(1, number), number),
                number,
            )),
            body: Box::new(Statement::Compound(block(vec![Statement::Expression(call(
                tick,
                vec![],
                symbols.void,
            ))]))),
        }],
    );

    assert_eq!(
        listing(&symbols.lower(&function)),
        indoc! {"
            fn count() {
                %0 = alloc i32 ; i
                store %0 <- 0
            .label_0:
                %1 = load %0
                %2 = cmp.lt.s %1, 3
                br %2 .label_1 .label_2
            .label_1:
                call tick()
                %3 = load %0
                %4 = add.s %3, 1
                store %0 <- %4
                jmp .label_0
            .label_2:
                ret
            }
        "}
    );
}

#[test]
fn goto_case_jumps_between_clauses() {
    let mut symbols = Symbols::new();
    let classify = symbols.function("classify", symbols.void);
    let x = symbols.variable("x", symbols.int);

    let function = symbols.bound(
        classify,
        vec![x],
        vec![],
        vec![Statement::Switch {
            condition: parameter(x, symbols.int),
            clauses: vec![
                SwitchClause {
                    kind: ClauseKind::Case(vec![Literal::Signed(1)]),
                    body: block(vec![Statement::GotoCase(Literal::Signed(2))]),
                },
                SwitchClause {
                    kind: ClauseKind::Case(vec![Literal::Signed(2)]),
                    body: block(vec![Statement::Break]),
                },
                SwitchClause {
                    kind: ClauseKind::Default,
                    body: block(vec![]),
                },
            ],
        }],
    );

    assert_eq!(
        listing(&symbols.lower(&function)),
        indoc! {"
            fn classify(%1: i32) {
                %0 = alloc i32 ; x
                store %0 <- %1
                %2 = load %0
                switch %2 [1 -> .label_0, 2 -> .label_1] default .label_2
            .label_0:
                jmp .label_1
            .label_1:
                jmp .label_3
            .label_2:
            .label_3:
                ret
            }
        "}
    );
}

#[test]
fn duplicate_case_keys_are_rejected() {
    let mut symbols = Symbols::new();
    let main = symbols.function("main", symbols.void);
    let case = |value| SwitchClause {
        kind: ClauseKind::Case(vec![Literal::Signed(value)]),
        body: block(vec![]),
    };

    let function = symbols.bound(
        main,
        vec![],
        vec![],
        vec![Statement::Switch {
            condition: int(0, symbols.int),
            clauses: vec![case(4), case(4)],
        }],
    );

    let error = lower_function(&function, &symbols.table, &LoweringOptions::default())
        .expect_err("duplicate keys must not lower");

    assert!(matches!(error, LoweringError::DuplicateCaseKey { key } if key == "4"));
}

#[test]
fn goto_to_a_missing_label_fails() {
    let mut symbols = Symbols::new();
    let main = symbols.function("main", symbols.void);
    let function = symbols.bound(main, vec![], vec![], vec![Statement::Goto("nowhere".into())]);

    let error = lower_function(&function, &symbols.table, &LoweringOptions::default())
        .expect_err("the label does not exist");

    assert!(matches!(error, LoweringError::UnknownLabel(label) if label.value() == "nowhere"));
}

#[test]
fn backward_goto_reuses_the_placed_label() {
    let mut symbols = Symbols::new();
    let flag = symbols.variable("flag", symbols.boolean);
    let main = symbols.function("main", symbols.void);

    let function = symbols.bound(
        main,
        vec![flag],
        vec![],
        vec![labeled(
            "again",
            if_then(parameter(flag, symbols.boolean), Statement::Goto("again".into())),
        )],
    );
    let lowered = symbols.lower(&function);

    let again = lowered
        .find_all(|instruction| matches!(instruction, Instruction::Label(_)))
        .map(|(_, instruction)| instruction.clone())
        .next();
    let Some(Instruction::Label(again)) = again else {
        panic!("the labeled statement starts with a label");
    };

    assert_eq!(
        lowered
            .find_all(|instruction| *instruction == Instruction::Jump {
                destination: Some(again)
            })
            .count(),
        1
    );
}

#[test]
fn do_while_continue_reaches_the_condition() {
    let mut symbols = Symbols::new();
    let flag = symbols.variable("flag", symbols.boolean);
    let main = symbols.function("main", symbols.void);
    let tick = symbols.function("tick", symbols.void);

    let function = symbols.bound(
        main,
        vec![flag],
        vec![],
        vec![Statement::DoWhile {
            body: Box::new(Statement::Compound(block(vec![
                if_then(parameter(flag, symbols.boolean), Statement::Continue),
                Statement::Expression(call(tick, vec![], symbols.void)),
            ]))),
            condition: parameter(flag, symbols.boolean),
        }],
    );
    let lowered = symbols.lower(&function);

    assert_eq!(lowered.direct_calls(), vec!["tick"]);
    assert_eq!(branches(&lowered), 2);
}

#[test]
fn debug_comments_name_every_statement() {
    let mut symbols = Symbols::new();
    let main = symbols.function("main", symbols.void);
    let options = LoweringOptions {
        debug_comments: true,
        ..Default::default()
    };
    let function = symbols.bound(main, vec![], vec![], vec![Statement::Empty]);
    let lowered = symbols.lower_with(&function, &options);

    let comments = lowered
        .find_all(|instruction| matches!(instruction, Instruction::Comment(_)))
        .map(|(_, instruction)| instruction.clone())
        .collect::<Vec<_>>();
    assert_eq!(comments, vec![Instruction::Comment("empty".to_owned())]);
}
