use std::collections::HashMap;

use lazy_static::lazy_static;
use log::{trace, warn};
use thiserror::Error;

use super::token::{Lexeme, Token};

lazy_static! {
    static ref RESERVED_WORDS: HashMap<&'static str, Token> = HashMap::from([
        ("program", Token::Program),
        ("begin", Token::Begin),
        ("end", Token::End),
        ("var", Token::Var),
        ("const", Token::Const),
        ("type", Token::Type),
        ("function", Token::Function),
        ("procedure", Token::Procedure),
        ("integer", Token::Integer),
        ("real", Token::Real),
        ("boolean", Token::Boolean),
        ("string", Token::String),
        ("array", Token::Array),
        ("of", Token::Of),
        ("if", Token::If),
        ("then", Token::Then),
        ("else", Token::Else),
        ("while", Token::While),
        ("do", Token::Do),
        ("for", Token::For),
        ("to", Token::To),
        ("downto", Token::Downto),
        ("div", Token::Div),
        ("mod", Token::Mod),
        ("and", Token::And),
        ("or", Token::Or),
        ("not", Token::Not),
        ("true", Token::True),
        ("false", Token::False),
        ("read", Token::Read),
        ("readln", Token::Readln),
        ("write", Token::Write),
        ("writeln", Token::Writeln),
        ("length", Token::Length),
    ]);
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LexicalError {
    #[error("line {line}: illegal character '{ch}'")]
    IllegalCharacter { line: usize, ch: char },
    #[error("line {line}: integer literal {literal} out of range")]
    IntegerOutOfRange { line: usize, literal: String },
}

/// Result of scanning a whole source text. Lexing never aborts, so the
/// token list is always usable even when `errors` is not empty. The list
/// always ends with a single [`Token::Eof`].
#[derive(Debug, Default)]
pub struct Scan {
    pub tokens: Vec<Lexeme>,
    pub errors: Vec<LexicalError>,
}

// (None, n > 0) means n bytes of trivia were consumed, or an out-of-range
// integer literal when they are digits.
type Scanner = fn(&str) -> (Option<Token>, usize);

fn newline(s: &str) -> (Option<Token>, usize) {
    let n = s.bytes().take_while(|b| *b == b'\n').count();
    (None, n)
}

fn whitespace(s: &str) -> (Option<Token>, usize) {
    let n = s
        .bytes()
        .take_while(|b| matches!(b, b' ' | b'\t' | b'\r'))
        .count();
    (None, n)
}

fn brace_comment(s: &str) -> (Option<Token>, usize) {
    if !s.starts_with('{') {
        return (None, 0);
    }
    match s.find('}') {
        Some(end) => (None, end + 1),
        None => (None, 0),
    }
}

fn paren_comment(s: &str) -> (Option<Token>, usize) {
    if !s.starts_with("(*") {
        return (None, 0);
    }
    match s[2..].find("*)") {
        Some(end) => (None, end + 4),
        None => (None, 0),
    }
}

fn string(s: &str) -> (Option<Token>, usize) {
    if !s.starts_with('\'') {
        return (None, 0);
    }
    let mut value = String::new();
    let mut chars = s.char_indices().skip(1).peekable();
    while let Some((i, c)) = chars.next() {
        if c != '\'' {
            value.push(c);
            continue;
        }
        if let Some((_, '\'')) = chars.peek() {
            chars.next();
            value.push('\'');
            continue;
        }
        return (Some(Token::StrConst(value)), i + 1);
    }
    (None, 0)
}

fn digits(s: &str) -> usize {
    s.bytes().take_while(|b| b.is_ascii_digit()).count()
}

fn real(s: &str) -> (Option<Token>, usize) {
    let int_part = digits(s);
    if int_part == 0 || !s[int_part..].starts_with('.') {
        return (None, 0);
    }
    let frac_part = digits(&s[int_part + 1..]);
    if frac_part == 0 {
        return (None, 0);
    }
    let i = int_part + 1 + frac_part;
    match s[..i].parse() {
        Ok(value) => (Some(Token::RealConst(value)), i),
        Err(_) => (None, 0),
    }
}

fn integer(s: &str) -> (Option<Token>, usize) {
    let i = digits(s);
    if i == 0 {
        return (None, 0);
    }
    match s[..i].parse() {
        Ok(value) => (Some(Token::IntConst(value)), i),
        Err(_) => (None, i),
    }
}

fn word(s: &str) -> (Option<Token>, usize) {
    if !s.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return (None, 0);
    }
    let i = s
        .bytes()
        .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_')
        .count();
    let word = &s[..i];
    let token = RESERVED_WORDS
        .get(word.to_ascii_lowercase().as_str())
        .cloned()
        .unwrap_or_else(|| Token::Ident(word.to_string()));
    (Some(token), i)
}

fn operator(s: &str) -> (Option<Token>, usize) {
    let two = match s.get(..2) {
        Some(":=") => Some(Token::Assign),
        Some("<>") => Some(Token::NotEqual),
        Some("<=") => Some(Token::LessEqual),
        Some(">=") => Some(Token::GreaterEqual),
        Some("..") => Some(Token::Range),
        _ => None,
    };
    if two.is_some() {
        return (two, 2);
    }
    let one = match s.chars().next() {
        Some('+') => Token::Plus,
        Some('-') => Token::Minus,
        Some('*') => Token::Times,
        Some('/') => Token::Divide,
        Some('=') => Token::Equal,
        Some('<') => Token::Less,
        Some('>') => Token::Greater,
        Some('(') => Token::LeftP,
        Some(')') => Token::RightP,
        Some('[') => Token::LeftBracket,
        Some(']') => Token::RightBracket,
        Some(',') => Token::Comma,
        Some(';') => Token::Semicolon,
        Some(':') => Token::Colon,
        Some('.') => Token::Dot,
        _ => return (None, 0),
    };
    (Some(one), 1)
}

fn scan_token(s: &str) -> (Option<Token>, usize) {
    // real before integer, comments before '(' and reserved words inside `word`
    let scanners: [Scanner; 9] = [
        newline,
        whitespace,
        brace_comment,
        paren_comment,
        string,
        real,
        integer,
        word,
        operator,
    ];
    for scanner in scanners.iter() {
        let (token, advanced) = scanner(s);
        if advanced > 0 {
            return (token, advanced);
        }
    }
    (None, 0)
}

pub fn scan(source_code: &str) -> Scan {
    let mut result = Scan::default();
    let mut line = 1;
    let mut start = 0;

    while start < source_code.len() {
        let rest = &source_code[start..];
        let (token, advanced) = scan_token(rest);

        if advanced == 0 {
            // the loop condition guarantees at least one char is left
            let ch = rest.chars().next().unwrap_or_default();
            let error = LexicalError::IllegalCharacter { line, ch };
            warn!("{error}");
            result.errors.push(error);
            start += ch.len_utf8().max(1);
            continue;
        }

        match token {
            Some(token) => {
                trace!("line {line}: {token}");
                result.tokens.push(Lexeme::new(token, line));
            }
            None if rest.starts_with(|c: char| c.is_ascii_digit()) => {
                let error = LexicalError::IntegerOutOfRange {
                    line,
                    literal: rest[..advanced].to_string(),
                };
                warn!("{error}");
                result.errors.push(error);
            }
            None => {}
        }
        line += rest[..advanced].matches('\n').count();
        start += advanced;
    }
    result.tokens.push(Lexeme::new(Token::Eof, line));
    result
}

#[cfg(test)]
mod tests {
    use rstest::*;

    use super::*;

    fn tokens(src: &str) -> Vec<Token> {
        scan(src)
            .tokens
            .into_iter()
            .map(|l| l.token)
            .filter(|t| *t != Token::Eof)
            .collect()
    }

    #[rstest]
    #[case::lower("begin", Token::Begin)]
    #[case::upper("BEGIN", Token::Begin)]
    #[case::mixed("WriteLn", Token::Writeln)]
    #[case::downto("DownTo", Token::Downto)]
    #[case::prefix("beginning", Token::Ident("beginning".to_string()))]
    #[case::suffix("end_", Token::Ident("end_".to_string()))]
    #[case::digits("do2", Token::Ident("do2".to_string()))]
    fn test_reserved_words(#[case] src: &str, #[case] expected: Token) {
        assert_eq!(tokens(src), vec![expected]);
    }

    #[rstest]
    #[case::integer("42", vec![Token::IntConst(42)])]
    #[case::real("2.5", vec![Token::RealConst(2.5)])]
    #[case::range("1..5", vec![Token::IntConst(1), Token::Range, Token::IntConst(5)])]
    #[case::trailing_dot("7.", vec![Token::IntConst(7), Token::Dot])]
    fn test_numbers(#[case] src: &str, #[case] expected: Vec<Token>) {
        assert_eq!(tokens(src), expected);
    }

    #[rstest]
    #[case::plain("'Hi'", "Hi")]
    #[case::empty("''", "")]
    #[case::escaped("'It''s'", "It's")]
    #[case::only_quote("''''", "'")]
    fn test_strings(#[case] src: &str, #[case] expected: &str) {
        assert_eq!(tokens(src), vec![Token::StrConst(expected.to_string())]);
    }

    #[rstest]
    fn test_operators() {
        assert_eq!(
            tokens("x := a <> b <= c >= d < e > f = g"),
            vec![
                Token::Ident("x".into()),
                Token::Assign,
                Token::Ident("a".into()),
                Token::NotEqual,
                Token::Ident("b".into()),
                Token::LessEqual,
                Token::Ident("c".into()),
                Token::GreaterEqual,
                Token::Ident("d".into()),
                Token::Less,
                Token::Ident("e".into()),
                Token::Greater,
                Token::Ident("f".into()),
                Token::Equal,
                Token::Ident("g".into()),
            ]
        );
    }

    #[rstest]
    fn test_comments_count_lines() {
        let scan = scan("{ one\n two }\n(* three\n four *)\nx");
        assert!(scan.errors.is_empty());
        assert_eq!(
            scan.tokens,
            vec![
                Lexeme::new(Token::Ident("x".into()), 5),
                Lexeme::new(Token::Eof, 5),
            ]
        );
    }

    #[rstest]
    fn test_multiline_string_keeps_start_line() {
        let scan = scan("'a\nb' y");
        assert_eq!(scan.tokens[0], Lexeme::new(Token::StrConst("a\nb".into()), 1));
        assert_eq!(scan.tokens[1], Lexeme::new(Token::Ident("y".into()), 2));
    }

    #[rstest]
    fn test_illegal_characters_are_skipped() {
        let scan = scan("a\n@ b # c");
        assert_eq!(
            scan.errors,
            vec![
                LexicalError::IllegalCharacter { line: 2, ch: '@' },
                LexicalError::IllegalCharacter { line: 2, ch: '#' },
            ]
        );
        assert_eq!(scan.tokens.len(), 4);
        assert_eq!(scan.tokens[2], Lexeme::new(Token::Ident("c".into()), 2));
    }

    #[rstest]
    fn test_unterminated_string_is_reported() {
        let scan = scan("'abc");
        assert_eq!(
            scan.errors,
            vec![LexicalError::IllegalCharacter { line: 1, ch: '\'' }]
        );
        assert_eq!(scan.tokens[0], Lexeme::new(Token::Ident("abc".into()), 1));
        assert_eq!(scan.tokens.len(), 2);
    }

    #[rstest]
    fn test_integer_out_of_range_is_dropped_whole() {
        let scan = scan("x := 99999999999999999999;");
        assert_eq!(
            scan.errors,
            vec![LexicalError::IntegerOutOfRange {
                line: 1,
                literal: "99999999999999999999".into(),
            }]
        );
        assert_eq!(
            scan.tokens.into_iter().map(|l| l.token).collect::<Vec<_>>(),
            vec![Token::Ident("x".into()), Token::Assign, Token::Semicolon, Token::Eof]
        );
    }
}
