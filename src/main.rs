use std::{fs, path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn, LevelFilter};

use pascal_ewvm::{
    compile, lexer, parser, parser::ast_printer::AstPrinter, semantic::Analyzer, write_output,
    CodegenMode, CompileError, CompileOptions,
};

/// Compiles a Pascal program into EWVM assembly.
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    input: PathBuf,
    /// Defaults to the input path with a `.vm` extension
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Keep going past untranslatable names, leaving error markers in the output
    #[arg(long)]
    permissive: bool,
    #[arg(long)]
    no_comments: bool,
    #[arg(long)]
    dump_tokens: bool,
    #[arg(long)]
    dump_ast: bool,
    #[arg(long)]
    dump_symbols: bool,
    /// -v info, -vv debug, -vvv trace
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let level = match args.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    if let Err(err) = simple_logger::SimpleLogger::new().with_level(level).init() {
        eprintln!("cannot install logger: {err}");
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let source = fs::read_to_string(&args.input)
        .with_context(|| format!("cannot read {}", args.input.display()))?;

    dump(args, &source);

    let options = CompileOptions {
        codegen_mode: if args.permissive {
            CodegenMode::Permissive
        } else {
            CodegenMode::Strict
        },
        emit_comments: !args.no_comments,
    };
    let compilation = compile(&source, &options)?;
    for warning in &compilation.warnings {
        warn!("{warning}");
    }
    for message in &compilation.codegen_errors {
        warn!("code generation: {message}");
    }

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| args.input.with_extension("vm"));
    write_output(&output, &compilation.lines())
        .with_context(|| format!("cannot write {}", output.display()))?;
    info!(
        "wrote {} instructions to {}",
        compilation.instructions.len(),
        output.display()
    );
    Ok(())
}

/// Prints the requested intermediate forms. Stops quietly at the first
/// phase that fails; `compile` reports the failure.
fn dump(args: &Args, source: &str) {
    if !(args.dump_tokens || args.dump_ast || args.dump_symbols) {
        return;
    }

    let scan = lexer::scan(source);
    if args.dump_tokens {
        for lexeme in &scan.tokens {
            println!("{:>4}  {}", lexeme.line, lexeme.token);
        }
    }

    let Ok(program) = parser::parse(&scan.tokens) else {
        return;
    };
    if args.dump_ast {
        print!("{}", AstPrinter::print(&program));
    }

    if args.dump_symbols {
        let mut analyzer = Analyzer::new();
        analyzer.analyze(&program);
        print!("{}", analyzer.symbols());
    }
}

fn report(err: &anyhow::Error) {
    match err.downcast_ref::<CompileError>() {
        Some(CompileError::Semantic { errors, warnings }) => {
            for diagnostic in errors {
                error!("{diagnostic}");
            }
            for diagnostic in warnings {
                warn!("{diagnostic}");
            }
            error!("{err}");
        }
        Some(CompileError::Codegen { errors }) => {
            for message in errors {
                error!("code generation: {message}");
            }
            error!("{err}; rerun with --permissive to keep the error markers");
        }
        _ => error!("{err:#}"),
    }
}
