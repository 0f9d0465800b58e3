use colored::Colorize;
use itertools::Itertools;

use crate::{index::Index, ir};

/// Renders a function listing. The output is colored unless coloring has
/// been disabled through [`colored::control`].
pub fn pretty_print_ir(function: &ir::FunctionDefinition) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "{} {}{}",
        "fn".magenta(),
        function.symbol_name.value().blue(),
        "(".white()
    ));

    out.push_str(&format!(
        "{}",
        function
            .arguments
            .iter()
            .map(|arg| format!("{arg}: {}", function.registers[*arg].ty))
            .join(", ")
            .white()
    ));

    out.push_str(&format!("{}\n", ") {".white()));

    for instruction in function.instructions.iter() {
        match instruction {
            ir::Instruction::Label(label) => {
                out.push_str(&format!("{}\n", format!("{label}:").bright_red()));
            }
            _ => out.push_str(&format!("    {instruction}\n")),
        }
    }

    out.push_str(&format!("{}\n", "}".white()));

    out
}

fn target(label: &Option<ir::LabelId>) -> String {
    match label {
        Some(label) => label.to_string().blue().to_string(),
        None => "<unresolved>".red().to_string(),
    }
}

impl core::fmt::Display for ir::Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ir::Instruction::Label(label) => write!(f, "{label}:"),
            ir::Instruction::AllocStack {
                destination,
                ty,
                name,
            } => {
                write!(f, "{destination} {} {} {ty}", "=".white(), "alloc".cyan())?;
                if let Some(name) = name {
                    write!(f, " {}", format!("; {name}").bright_black())?;
                }
                Ok(())
            }
            ir::Instruction::LoadMem {
                destination,
                source,
            } => write!(
                f,
                "{destination} {} {} {source}",
                "=".white(),
                "load".cyan()
            ),
            ir::Instruction::StoreMem {
                destination,
                source,
            } => {
                write!(
                    f,
                    "{} {destination} {} {source}",
                    "store".cyan(),
                    "<-".white()
                )
            }
            ir::Instruction::CopyMem {
                destination,
                source,
                size,
            } => write!(
                f,
                "{} {destination} {} {source}, {}",
                "copy".cyan(),
                "<-".white(),
                size.to_string().purple()
            ),
            ir::Instruction::Move {
                destination,
                source,
            } => {
                write!(f, "{destination} {} {source}", "=".white())
            }
            ir::Instruction::UnaryOperation {
                operator,
                destination,
                operand,
            } => {
                write!(
                    f,
                    "{destination} {} {} {operand}",
                    "=".white(),
                    operator.to_string().cyan()
                )
            }
            ir::Instruction::BinaryOperation {
                operator,
                kind,
                destination,
                lhs,
                rhs,
            } => {
                write!(
                    f,
                    "{destination} {} {} {lhs}, {rhs}",
                    "=".white(),
                    format!("{operator}.{kind}").cyan()
                )
            }
            ir::Instruction::Compare {
                predicate,
                kind,
                destination,
                lhs,
                rhs,
            } => {
                write!(
                    f,
                    "{destination} {} {} {lhs}, {rhs}",
                    "=".white(),
                    format!("cmp.{predicate}.{kind}").cyan()
                )
            }
            ir::Instruction::Cast {
                kind,
                destination,
                operand,
            } => write!(
                f,
                "{destination} {} {} {operand}",
                "=".white(),
                kind.to_string().cyan()
            ),
            ir::Instruction::GetFieldPointer {
                destination,
                source,
                index,
            } => write!(
                f,
                "{destination} {} {} {source}, {}",
                "=".white(),
                "get_field_ptr".cyan(),
                index.to_string().purple()
            ),
            ir::Instruction::GetElementPointer {
                destination,
                source,
                index,
            } => write!(
                f,
                "{destination} {} {} {source}, {index}",
                "=".white(),
                "get_element_ptr".cyan(),
            ),
            ir::Instruction::FunctionCall {
                target,
                arguments,
                destination,
            } => {
                if let Some(dest) = destination {
                    write!(f, "{dest} {} ", "=".white())?;
                }
                let target = match target {
                    ir::CallTarget::Direct(name) => name.value().blue().to_string(),
                    ir::CallTarget::Indirect(register) => register.to_string(),
                };
                write!(
                    f,
                    "{} {target}({})",
                    "call".cyan(),
                    arguments.iter().map(|op| op.to_string()).join(", ")
                )
            }
            ir::Instruction::Branch {
                condition,
                positive,
                negative,
            } => {
                write!(
                    f,
                    "{} {condition} {} {}",
                    "br".cyan(),
                    target(positive),
                    target(negative)
                )
            }
            ir::Instruction::Jump { destination } => {
                write!(f, "{} {}", "jmp".cyan(), target(destination))
            }
            ir::Instruction::Switch {
                value,
                cases,
                default,
            } => {
                write!(
                    f,
                    "{} {value} [{}] {} {}",
                    "switch".cyan(),
                    cases
                        .iter()
                        .map(|(value, label)| format!(
                            "{} -> {}",
                            value.to_string().purple(),
                            label.to_string().blue()
                        ))
                        .join(", "),
                    "default".cyan(),
                    default.to_string().blue()
                )
            }
            ir::Instruction::Return { value: Some(value) } => {
                write!(f, "{} {value}", "ret".cyan())
            }
            ir::Instruction::Return { value: None } => {
                write!(f, "{}", "ret".cyan())
            }
            ir::Instruction::Comment(text) => {
                write!(f, "{}", format!("; {text}").bright_black())
            }
        }
    }
}

impl core::fmt::Display for ir::RegisterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", format!("%{}", self.index()).yellow())
    }
}

impl core::fmt::Display for ir::LabelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, ".label_{}", self.index())
    }
}

impl core::fmt::Display for ir::Immediate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ir::Immediate::Int(value, _) => write!(f, "{value}"),
            ir::Immediate::Float(value, _) => write!(f, "{value:?}"),
            ir::Immediate::Bool(value) => write!(f, "{value}"),
            ir::Immediate::Null => write!(f, "null"),
            ir::Immediate::FunctionLabel(s) => write!(f, "@{}", s.value()),
        }
    }
}

impl core::fmt::Display for ir::Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ir::Operand::Immediate(immediate) => write!(f, "{}", immediate.to_string().purple()),
            ir::Operand::Register(register_id) => write!(f, "{register_id}"),
        }
    }
}

impl core::fmt::Display for ir::Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ir::Type::Void => write!(f, "void"),
            ir::Type::Integer(integer_width) => write!(
                f,
                "{}",
                match integer_width {
                    ir::IntegerWidth::I8 => "i8",
                    ir::IntegerWidth::I16 => "i16",
                    ir::IntegerWidth::I32 => "i32",
                    ir::IntegerWidth::I64 => "i64",
                }
            ),
            ir::Type::Float(float_width) => write!(
                f,
                "{}",
                match float_width {
                    ir::FloatWidth::F32 => "f32",
                    ir::FloatWidth::F64 => "f64",
                }
            ),
            ir::Type::Pointer(inner) => write!(f, "*{inner}"),
            ir::Type::Struct(s) => match s.name {
                Some(name) => write!(f, "%{name}"),
                None => write!(f, "{{ {} }}", s.fields.iter().join(", ")),
            },
            ir::Type::Named(name) => write!(f, "%{name}"),
        }
    }
}
