pub mod scanner;
pub mod token;

pub use scanner::{scan, LexicalError, Scan};
pub use token::{Lexeme, Token};
