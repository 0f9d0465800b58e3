mod support;

use bound_lower::{
    bound::{FunctionSymbol, Statement},
    index::Index,
    ir::{Instruction, Operand, RegisterId},
};
use indoc::indoc;
use pretty_assertions::assert_eq;
use support::*;

fn register(index: usize) -> Vec<Operand> {
    vec![RegisterId::new(index).into()]
}

#[test]
fn objects_are_destroyed_in_reverse_construction_order() {
    let mut symbols = Symbols::new();
    let (guard, constructor) = symbols.guard();
    let main = symbols.function("main", symbols.void);
    let a = symbols.variable("a", guard);
    let b = symbols.variable("b", guard);

    let function = symbols.bound(
        main,
        vec![],
        vec![a, b],
        vec![construct(a, constructor), construct(b, constructor)],
    );
    let lowered = symbols.lower(&function);

    assert_eq!(lowered.direct_calls(), vec!["Guard", "Guard", "~Guard", "~Guard"]);
    assert_eq!(calls_to(&lowered, "~Guard"), vec![register(1), register(0)]);
}

#[test]
fn return_destroys_every_enclosing_scope_innermost_first() {
    let mut symbols = Symbols::new();
    let (guard, constructor) = symbols.guard();
    let main = symbols.function("main", symbols.void);
    let outer = symbols.variable("outer", guard);
    let inner = symbols.variable("inner", guard);

    let function = symbols.bound(
        main,
        vec![],
        vec![outer, inner],
        vec![
            construct(outer, constructor),
            Statement::Compound(block(vec![
                construct(inner, constructor),
                Statement::Return(None),
            ])),
        ],
    );
    let lowered = symbols.lower(&function);

    // the scopes closing after the return emit nothing
    assert_eq!(calls_to(&lowered, "~Guard"), vec![register(1), register(0)]);
    assert_eq!(
        lowered
            .find_all(|instruction| matches!(instruction, Instruction::Return { .. }))
            .count(),
        1
    );
}

#[test]
fn goto_destroys_only_the_scopes_it_leaves() {
    let mut symbols = Symbols::new();
    let (guard, constructor) = symbols.guard();
    let main = symbols.function("main", symbols.void);
    let outer = symbols.variable("outer", guard);
    let inner = symbols.variable("inner", guard);

    let function = symbols.bound(
        main,
        vec![],
        vec![outer, inner],
        vec![
            construct(outer, constructor),
            Statement::Compound(block(vec![
                construct(inner, constructor),
                Statement::Goto("out".into()),
            ])),
            labeled("out", Statement::Empty),
        ],
    );
    let lowered = symbols.lower(&function);

    assert_eq!(calls_to(&lowered, "~Guard"), vec![register(1), register(0)]);
}

#[test]
fn break_destroys_the_loop_body_before_leaving() {
    let mut symbols = Symbols::new();
    let (guard, constructor) = symbols.guard();
    let main = symbols.function("main", symbols.void);
    let flag = symbols.variable("flag", symbols.boolean);
    let g = symbols.variable("g", guard);

    let function = symbols.bound(
        main,
        vec![flag],
        vec![g],
        vec![Statement::While {
            condition: parameter(flag, symbols.boolean),
            body: Box::new(Statement::Compound(block(vec![
                construct(g, constructor),
                if_then(parameter(flag, symbols.boolean), Statement::Break),
            ]))),
        }],
    );
    let lowered = symbols.lower(&function);

    // once on the break path and once at the end of the body
    assert_eq!(lowered.direct_calls(), vec!["Guard", "~Guard", "~Guard"]);
}

#[test]
fn temporaries_returned_through_a_hidden_slot_die_with_their_expression() {
    let mut symbols = Symbols::new();
    let destructor = symbols.function("~Pair", symbols.void);
    let pair = symbols.class("Pair", vec![symbols.int, symbols.int], Some(destructor));
    let make = symbols.insert(FunctionSymbol {
        returns_by_hidden_slot: true,
        ..symbol("make", pair)
    });
    let caller = symbols.function("use_pair", symbols.void);

    let function = symbols.bound(
        caller,
        vec![],
        vec![],
        vec![Statement::Expression(call(make, vec![], pair))],
    );

    assert_eq!(
        listing(&symbols.lower(&function)),
        indoc! {"
            fn use_pair() {
                %0 = alloc %Pair
                call make(%0)
                call ~Pair(%0)
                ret
            }
        "}
    );
}

#[test]
fn returning_an_object_copies_it_into_the_hidden_slot() {
    let mut symbols = Symbols::new();
    let destructor = symbols.function("~Pair", symbols.void);
    let pair = symbols.class("Pair", vec![symbols.int, symbols.int], Some(destructor));
    let constructor = symbols.function("Pair", symbols.void);
    let make = symbols.insert(FunctionSymbol {
        returns_by_hidden_slot: true,
        ..symbol("make", pair)
    });
    let p = symbols.variable("p", pair);

    let function = symbols.bound(
        make,
        vec![],
        vec![p],
        vec![
            construct(p, constructor),
            Statement::Return(Some(local(p, pair))),
        ],
    );

    assert_eq!(
        listing(&symbols.lower(&function)),
        indoc! {"
            fn make(%0: *%Pair) {
                %1 = alloc %Pair ; p
                call Pair(%1)
                copy %0 <- %1, 8
                call ~Pair(%1)
                ret
            }
        "}
    );
}
