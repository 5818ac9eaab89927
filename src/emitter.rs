use log::debug;

use crate::{parser::ast::Program, semantic::symbols::SymbolTable};
use mnemonics::Instruction;

pub mod code_context;
pub mod data;
pub mod mnemonics;
pub mod stack;
pub mod text;

/// What to do with names or operators the generator cannot translate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CodegenMode {
    /// Any error marker fails the compilation.
    #[default]
    Strict,
    /// Error markers and their fallback instructions are kept in the output.
    Permissive,
}

/// Lowers an analysed program. Returns the instruction stream and the
/// messages of every error marker placed in it.
pub fn generate(
    program: &Program,
    symbols: &SymbolTable,
    emit_comments: bool,
) -> (Vec<Instruction>, Vec<String>) {
    let code_context = text::build_code_context(program, symbols, emit_comments);
    debug!(
        "code generation finished with {} errors",
        code_context.get_errors().len()
    );
    code_context.into_parts()
}
