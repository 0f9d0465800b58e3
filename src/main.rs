use std::path::PathBuf;

use bound_lower::{bound::CompilationUnit, ir::pretty_print::pretty_print_ir, lower_compilation_unit};
use clap::{ArgAction, CommandFactory, Parser, error::ErrorKind};
use eyre::{Result, WrapErr};
use itertools::Itertools;
use tracing::info;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Bound compilation units in JSON form
    inputs: Vec<PathBuf>,
    /// Call `__trace_enter` and `__trace_leave` around every function body
    #[arg(long)]
    trace_calls: bool,
    /// Annotate the listing with the statement each instruction came from
    #[arg(long)]
    debug_comments: bool,
    /// Write the listing to a file instead of standard output
    #[arg(short, long)]
    output: Option<PathBuf>,
    #[arg(long)]
    no_color: bool,
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(args.verbose);

    if args.no_color || args.output.is_some() {
        colored::control::set_override(false);
    }

    if args.inputs.is_empty() {
        Args::command()
            .error(ErrorKind::MissingRequiredArgument, "Missing input files!")
            .exit();
    }

    for input in &args.inputs {
        if !input.is_file() {
            Args::command()
                .error(
                    ErrorKind::InvalidValue,
                    format!("Input path '{}' is not a file!", input.display()),
                )
                .exit()
        }
    }

    let mut listings = Vec::new();

    for input in &args.inputs {
        let contents = std::fs::read_to_string(input)
            .wrap_err_with(|| format!("failed to read {}", input.display()))?;
        let mut unit: CompilationUnit = serde_json::from_str(&contents)
            .wrap_err_with(|| format!("{} is not a bound compilation unit", input.display()))?;

        unit.options.trace_calls |= args.trace_calls;
        unit.options.debug_comments |= args.debug_comments;

        let module = lower_compilation_unit(&unit)
            .wrap_err_with(|| format!("failed to lower {}", input.display()))?;

        info!(
            input = %input.display(),
            functions = module.function_definitions.len(),
            "lowered compilation unit"
        );

        listings.push(
            module
                .function_definitions
                .values()
                .map(pretty_print_ir)
                .join("\n"),
        );
    }

    let listing = listings.join("\n");

    match &args.output {
        Some(path) => std::fs::write(path, strip_ansi_escapes::strip_str(&listing))
            .wrap_err_with(|| format!("failed to write {}", path.display()))?,
        None => print!("{listing}"),
    }

    Ok(())
}

fn setup_logging(verbose: u8) {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        })
    });

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}
