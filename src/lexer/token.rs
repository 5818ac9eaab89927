use std::fmt::Display;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // reserved words
    Program,
    Begin,
    End,
    Var,
    Const,
    Type,
    Function,
    Procedure,
    Integer,
    Real,
    Boolean,
    String,
    Array,
    Of,
    If,
    Then,
    Else,
    While,
    Do,
    For,
    To,
    Downto,
    Div,
    Mod,
    And,
    Or,
    Not,
    True,
    False,
    Read,
    Readln,
    Write,
    Writeln,
    Length,

    Ident(String),
    IntConst(i64),
    RealConst(f64),
    StrConst(String),

    Plus,
    Minus,
    Times,
    Divide,
    Assign,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,

    LeftP,
    RightP,
    LeftBracket,
    RightBracket,
    Comma,
    Semicolon,
    Colon,
    Dot,
    Range,

    Eof,
}

impl Token {
    pub fn is_ident(&self) -> bool {
        matches!(self, Token::Ident(_))
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Token::Program => "program",
            Token::Begin => "begin",
            Token::End => "end",
            Token::Var => "var",
            Token::Const => "const",
            Token::Type => "type",
            Token::Function => "function",
            Token::Procedure => "procedure",
            Token::Integer => "integer",
            Token::Real => "real",
            Token::Boolean => "boolean",
            Token::String => "string",
            Token::Array => "array",
            Token::Of => "of",
            Token::If => "if",
            Token::Then => "then",
            Token::Else => "else",
            Token::While => "while",
            Token::Do => "do",
            Token::For => "for",
            Token::To => "to",
            Token::Downto => "downto",
            Token::Div => "div",
            Token::Mod => "mod",
            Token::And => "and",
            Token::Or => "or",
            Token::Not => "not",
            Token::True => "true",
            Token::False => "false",
            Token::Read => "read",
            Token::Readln => "readln",
            Token::Write => "write",
            Token::Writeln => "writeln",
            Token::Length => "length",
            Token::Ident(id) => return write!(f, "identifier '{id}'"),
            Token::IntConst(n) => return write!(f, "integer {n}"),
            Token::RealConst(n) => return write!(f, "real {n}"),
            Token::StrConst(s) => return write!(f, "string '{s}'"),
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Times => "*",
            Token::Divide => "/",
            Token::Assign => ":=",
            Token::Equal => "=",
            Token::NotEqual => "<>",
            Token::Less => "<",
            Token::LessEqual => "<=",
            Token::Greater => ">",
            Token::GreaterEqual => ">=",
            Token::LeftP => "(",
            Token::RightP => ")",
            Token::LeftBracket => "[",
            Token::RightBracket => "]",
            Token::Comma => ",",
            Token::Semicolon => ";",
            Token::Colon => ":",
            Token::Dot => ".",
            Token::Range => "..",
            Token::Eof => return f.write_str("end of input"),
        };
        write!(f, "'{s}'")
    }
}

/// A token together with the 1-based source line it started on.
#[derive(Debug, Clone, PartialEq)]
pub struct Lexeme {
    pub token: Token,
    pub line: usize,
}

impl Lexeme {
    pub fn new(token: Token, line: usize) -> Self {
        Self { token, line }
    }
}
