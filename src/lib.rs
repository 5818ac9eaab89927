use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use log::debug;
use thiserror::Error;

pub mod emitter;
pub mod lexer;
pub mod parser;
pub mod semantic;
pub mod types;

pub use emitter::{mnemonics::Instruction, CodegenMode};
pub use lexer::LexicalError;
pub use semantic::Diagnostic;

#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    pub codegen_mode: CodegenMode,
    /// Explanatory `//` comments and blank separators. Error markers are
    /// emitted regardless.
    pub emit_comments: bool,
}

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("syntax error: {0:#}")]
    Syntax(anyhow::Error),
    #[error("{} semantic error(s)", .errors.len())]
    Semantic {
        errors: Vec<Diagnostic>,
        warnings: Vec<Diagnostic>,
    },
    #[error("{} code generation error(s)", .errors.len())]
    Codegen { errors: Vec<String> },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Successful compilation of one program.
#[derive(Debug)]
pub struct Compilation {
    pub instructions: Vec<Instruction>,
    /// Characters and literals the scanner skipped.
    pub lexical_errors: Vec<LexicalError>,
    pub warnings: Vec<Diagnostic>,
    /// Error markers left in `instructions`, only ever non-empty in
    /// [`CodegenMode::Permissive`].
    pub codegen_errors: Vec<String>,
}

impl Compilation {
    pub fn lines(&self) -> Vec<String> {
        self.instructions.iter().map(|i| i.to_string()).collect()
    }
}

/// Runs the whole pipeline over one source text.
pub fn compile(source: &str, options: &CompileOptions) -> Result<Compilation, CompileError> {
    let scan = lexer::scan(source);
    let program = parser::parse(&scan.tokens).map_err(CompileError::Syntax)?;

    let mut analyzer = semantic::Analyzer::new();
    let ok = analyzer.analyze(&program);
    let (symbols, errors, warnings) = analyzer.into_parts();
    if !ok {
        return Err(CompileError::Semantic { errors, warnings });
    }

    let (instructions, codegen_errors) =
        emitter::generate(&program, &symbols, options.emit_comments);
    if !codegen_errors.is_empty() && options.codegen_mode == CodegenMode::Strict {
        return Err(CompileError::Codegen {
            errors: codegen_errors,
        });
    }

    debug!("compiled '{}' into {} lines", program.name, instructions.len());
    Ok(Compilation {
        instructions,
        lexical_errors: scan.errors,
        warnings,
        codegen_errors,
    })
}

/// Writes one line per instruction. The file is flushed and closed before
/// returning.
pub fn write_output(path: impl AsRef<Path>, lines: &[String]) -> Result<(), CompileError> {
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    for line in lines {
        writeln!(writer, "{line}")?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use rstest::*;

    use super::*;

    #[rstest]
    fn test_compile_hello() {
        let compilation =
            compile("program P; begin writeln('Hi'); end.", &CompileOptions::default()).unwrap();
        assert_eq!(
            compilation.lines(),
            vec!["start", "pushs \"Hi\"", "writes", "writeln", "stop"]
        );
        assert!(compilation.warnings.is_empty());
    }

    #[rstest]
    fn test_syntax_error_stops_pipeline() {
        let err = compile("program P; begin x := end.", &CompileOptions::default()).unwrap_err();
        assert!(matches!(err, CompileError::Syntax(_)));
        assert_eq!(
            err.to_string(),
            "syntax error: line 1: unexpected 'end', expected expression"
        );
    }

    #[rstest]
    fn test_semantic_errors_are_collected() {
        let err = compile(
            "program P;\nvar i: integer;\nbegin\n  i := 'a' + 1;\n  j := 2\nend.",
            &CompileOptions::default(),
        )
        .unwrap_err();
        let CompileError::Semantic { errors, .. } = &err else {
            panic!("expected semantic errors, got {err:?}");
        };
        assert_eq!(errors.len(), 2);
        assert_eq!(err.to_string(), "2 semantic error(s)");
    }

    #[rstest]
    fn test_warnings_do_not_fail() {
        let compilation = compile(
            "program P; function f: integer; begin end; begin writeln(f) end.",
            &CompileOptions::default(),
        )
        .unwrap();
        assert_eq!(compilation.warnings.len(), 1);
    }

    #[rstest]
    fn test_lexical_errors_are_not_fatal() {
        let compilation =
            compile("program P; begin writeln(1) # end.", &CompileOptions::default()).unwrap();
        assert!(compilation.lines().contains(&"writei".to_string()));
        assert_eq!(
            compilation.lexical_errors,
            vec![LexicalError::IllegalCharacter { line: 1, ch: '#' }]
        );
    }

    #[rstest]
    fn test_integer_out_of_range_fails_to_parse() {
        let err = compile(
            "program P; var x: integer; begin x := 99999999999999999999 end.",
            &CompileOptions::default(),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "syntax error: line 1: unexpected 'end', expected expression"
        );
    }

    #[rstest]
    #[case::with_comments(true)]
    #[case::without_comments(false)]
    fn test_comment_option(#[case] emit_comments: bool) {
        let options = CompileOptions {
            emit_comments,
            ..Default::default()
        };
        let compilation = compile("program P; var x: integer; begin x := 1 end.", &options).unwrap();
        let has_comments = compilation.instructions.iter().any(Instruction::is_cosmetic);
        assert_eq!(has_comments, emit_comments);
    }

    #[rstest]
    fn test_write_output() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let lines = vec!["start".to_string(), "stop".to_string()];
        write_output(file.path(), &lines).unwrap();
        assert_eq!(std::fs::read_to_string(file.path()).unwrap(), "start\nstop\n");
    }
}
