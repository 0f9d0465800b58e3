mod support;

use bound_lower::{
    bound::{ClassType, CompilationUnit, ExpressionKind, FunctionSymbol, Statement, TypeKind},
    ir::pretty_print::pretty_print_ir,
    lower_compilation_unit,
    primitive::{IntKind, IntrinsicOperator},
};
use indoc::indoc;
use pretty_assertions::assert_eq;
use support::*;

#[test]
fn virtual_calls_load_the_target_from_the_dispatch_table() {
    let mut symbols = Symbols::new();
    let long = symbols.ty(TypeKind::Integer(IntKind::I64));
    let shape = symbols.ty(TypeKind::Class(ClassType {
        name: "Shape".into(),
        base: None,
        fields: vec![],
        has_dispatch_table: true,
        destructor: None,
    }));
    let circle = symbols.ty(TypeKind::Class(ClassType {
        name: "Circle".into(),
        base: Some(shape),
        fields: vec![long],
        has_dispatch_table: false,
        destructor: None,
    }));
    let circle_pointer = symbols.ty(TypeKind::Pointer(circle));
    let area = symbols.insert(FunctionSymbol {
        dispatch_slot: Some(2),
        owner: Some(shape),
        ..symbol("Shape::area", symbols.int)
    });
    let measure = symbols.function("measure", symbols.int);
    let c = symbols.variable("c", circle_pointer);

    let object = expression(
        ExpressionKind::Dereference(Box::new(parameter(c, circle_pointer))),
        circle,
    );
    let function = symbols.bound(
        measure,
        vec![c],
        vec![],
        vec![Statement::Return(Some(expression(
            ExpressionKind::Call {
                function: area,
                arguments: vec![object],
                is_virtual: true,
            },
            symbols.int,
        )))],
    );

    assert_eq!(
        listing(&symbols.lower(&function)),
        indoc! {"
            fn measure(%1: *%Circle) {
                %0 = alloc *%Circle ; c
                store %0 <- %1
                %2 = load %0
                %3 = get_field_ptr %2, 0
                %4 = get_field_ptr %3, 0
                %5 = load %4
                %6 = get_element_ptr %5, 2
                %7 = load %6
                %8 = call %7(%2)
                ret %8
            }
        "}
    );
}

#[test]
fn widening_a_signed_integer_sign_extends() {
    let mut symbols = Symbols::new();
    let long = symbols.ty(TypeKind::Integer(IntKind::I64));
    let convert = symbols.intrinsic("long", long, IntrinsicOperator::Convert);
    let widen = symbols.function("widen", long);
    let x = symbols.variable("x", symbols.int);

    let function = symbols.bound(
        widen,
        vec![x],
        vec![],
        vec![Statement::Return(Some(expression(
            ExpressionKind::Conversion {
                function: convert,
                operand: Box::new(parameter(x, symbols.int)),
            },
            long,
        )))],
    );

    assert_eq!(
        listing(&symbols.lower(&function)),
        indoc! {"
            fn widen(%1: i32) {
                %0 = alloc i32 ; x
                store %0 <- %1
                %2 = load %0
                %3 = sign_extend %2
                ret %3
            }
        "}
    );
}

#[test]
fn compilation_units_lower_from_json() {
    let unit: CompilationUnit = serde_json::from_str(indoc! {r#"
        {
            "symbols": {
                "types": ["void", { "integer": "i32" }],
                "functions": [{ "name": "answer", "return_type": 1 }],
                "variables": []
            },
            "functions": [{
                "function": 0,
                "parameters": [],
                "body": [{ "return": { "kind": { "literal": { "signed": 42 } }, "ty": 1 } }]
            }]
        }
    "#})
    .expect("unit should deserialize");

    let module = lower_compilation_unit(&unit).expect("unit should lower");
    let listings = module
        .function_definitions
        .values()
        .map(|function| strip_ansi_escapes::strip_str(pretty_print_ir(function)))
        .collect::<Vec<_>>();

    assert_eq!(
        listings,
        vec![indoc! {"
            fn answer() {
                ret 42
            }
        "}]
    );
}
