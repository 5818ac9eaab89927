pub mod ast;
pub mod ast_printer;

use anyhow::{anyhow, bail, Context, Result};
use log::debug;

use crate::{
    lexer::{Lexeme, Token},
    types::ScalarType,
};

use ast::*;

/*
program := "program" ident ";" declarations compound "."
declarations := (var_decl | const_decl | type_decl | function | procedure)*
var_decl := "var" (id_list ":" type ";")+
const_decl := "const" (ident "=" expression ";")+
type_decl := "type" (ident "=" type ";")+
function := "function" ident params? ":" simple_type ";" declarations compound ";"
procedure := "procedure" ident params? ";" declarations compound ";"
params := "(" (parameter (";" parameter)*)? ")"
parameter := id_list ":" simple_type
type := simple_type | "array" "[" bound ".." bound "]" "of" simple_type
simple_type := "integer" | "real" | "boolean" | "string"
bound := "-"? int

compound := "begin" statement (";" statement)* "end"
statement := compound | assignment | if | while | for | read | write | call | <empty>
assignment := var_ref ":=" expression
if := "if" expression "then" statement ("else" statement)?
while := "while" expression "do" statement
for := "for" ident ":=" expression ("to" | "downto") expression "do" statement
read := ("read" | "readln") ("(" var_ref ("," var_ref)* ")")?
write := ("write" | "writeln") ("(" (expression ("," expression)*)? ")")?
call := ident ("(" arguments? ")")?
var_ref := ident ("[" expression "]")?

expression := and_expr ("or" and_expr)*
and_expr := relation ("and" relation)*
relation := additive (relop additive)*
additive := term (("+" | "-") term)*
term := factor (("*" | "/" | "div" | "mod") factor)*
factor := ("-" | "not") factor | atom
atom := int | real | string | "true" | "false" | "(" expression ")"
        | "length" "(" expression ")" | ident ("[" expression "]" | "(" arguments? ")")?
*/

pub fn parse(tokens: &[Lexeme]) -> Result<Program> {
    let (program, tokens) = program(tokens)?;
    match tokens.first() {
        Some(Lexeme {
            token: Token::Eof, ..
        })
        | None => {}
        Some(extra) => bail!(
            "line {}: unexpected {} after end of program",
            extra.line,
            extra.token
        ),
    }
    debug!(
        "parsed program '{}' with {} declarations and {} statements",
        program.name,
        program.declarations.items.len(),
        program.body.statements.len()
    );
    Ok(program)
}

fn program(tokens: &[Lexeme]) -> Result<(Program, &[Lexeme])> {
    let line = line_of(tokens);
    let tokens = match_next(tokens, Token::Program)?;
    let (name, tokens) = match_ident(tokens)?;
    let tokens = match_next(tokens, Token::Semicolon)?;
    let (declarations, tokens) = declarations(tokens)?;
    let (body, tokens) = compound(tokens)?;
    let tokens = match_next(tokens, Token::Dot)?;

    Ok((
        Program {
            name: name.to_string(),
            declarations,
            body,
            line,
        },
        tokens,
    ))
}

fn declarations(mut tokens: &[Lexeme]) -> Result<(Declarations, &[Lexeme])> {
    let mut items = vec![];
    loop {
        let (item, rest) = match peek(tokens) {
            Token::Var => {
                let (decl, rest) = var_declaration(tokens)?;
                (Declaration::Var(decl), rest)
            }
            Token::Const => {
                let (decl, rest) = const_declaration(tokens)?;
                (Declaration::Const(decl), rest)
            }
            Token::Type => {
                let (decl, rest) = type_declaration(tokens)?;
                (Declaration::Type(decl), rest)
            }
            Token::Function => {
                let (callable, rest) = callable(tokens, Token::Function)?;
                (Declaration::Function(callable), rest)
            }
            Token::Procedure => {
                let (callable, rest) = callable(tokens, Token::Procedure)?;
                (Declaration::Procedure(callable), rest)
            }
            _ => break,
        };
        items.push(item);
        tokens = rest;
    }
    Ok((Declarations { items }, tokens))
}

fn var_declaration(tokens: &[Lexeme]) -> Result<(VarDeclaration, &[Lexeme])> {
    let line = line_of(tokens);
    let mut tokens = match_next(tokens, Token::Var)?;

    let mut items = vec![];
    loop {
        let item_line = line_of(tokens);
        let (names, rest) = id_list(tokens)?;
        let rest = match_next(rest, Token::Colon)?;
        let (ty, rest) = type_spec(rest)?;
        tokens = match_next(rest, Token::Semicolon)?;
        items.push(VarItem {
            names,
            ty,
            line: item_line,
        });

        if !peek(tokens).is_ident() {
            break;
        }
    }
    Ok((VarDeclaration { items, line }, tokens))
}

fn const_declaration(tokens: &[Lexeme]) -> Result<(ConstDeclaration, &[Lexeme])> {
    let line = line_of(tokens);
    let mut tokens = match_next(tokens, Token::Const)?;

    let mut items = vec![];
    loop {
        let item_line = line_of(tokens);
        let (name, rest) = match_ident(tokens)?;
        let rest = match_next(rest, Token::Equal)?;
        let (value, rest) = expression(rest)?;
        tokens = match_next(rest, Token::Semicolon)?;
        items.push(ConstItem {
            name: name.to_string(),
            value,
            line: item_line,
        });

        if !peek(tokens).is_ident() {
            break;
        }
    }
    Ok((ConstDeclaration { items, line }, tokens))
}

fn type_declaration(tokens: &[Lexeme]) -> Result<(TypeDeclaration, &[Lexeme])> {
    let line = line_of(tokens);
    let mut tokens = match_next(tokens, Token::Type)?;

    let mut items = vec![];
    loop {
        let item_line = line_of(tokens);
        let (name, rest) = match_ident(tokens)?;
        let rest = match_next(rest, Token::Equal)?;
        let (ty, rest) = type_spec(rest)?;
        tokens = match_next(rest, Token::Semicolon)?;
        items.push(TypeItem {
            name: name.to_string(),
            ty,
            line: item_line,
        });

        if !peek(tokens).is_ident() {
            break;
        }
    }
    Ok((TypeDeclaration { items, line }, tokens))
}

fn callable(tokens: &[Lexeme], keyword: Token) -> Result<(Callable, &[Lexeme])> {
    let line = line_of(tokens);
    let tokens = match_next(tokens, keyword.clone())?;
    let (name, tokens) = match_ident(tokens)?;

    let (params, tokens) = if *peek(tokens) == Token::LeftP {
        parameter_list(tokens)?
    } else {
        (ParameterList::default(), tokens)
    };

    let (return_type, tokens) = if keyword == Token::Function {
        let tokens = match_next(tokens, Token::Colon)?;
        let (ty, tokens) = simple_type(tokens)?;
        (Some(ty), tokens)
    } else {
        (None, tokens)
    };
    let tokens = match_next(tokens, Token::Semicolon)?;

    let kind = if return_type.is_some() {
        "function"
    } else {
        "procedure"
    };
    let (declarations, tokens) =
        declarations(tokens).with_context(|| format!("in {kind} {name}"))?;
    let (body, tokens) = compound(tokens).with_context(|| format!("in {kind} {name}"))?;
    let tokens = match_next(tokens, Token::Semicolon)?;

    Ok((
        Callable {
            name: name.to_string(),
            params,
            return_type,
            declarations,
            body,
            line,
        },
        tokens,
    ))
}

fn parameter_list(tokens: &[Lexeme]) -> Result<(ParameterList, &[Lexeme])> {
    let mut tokens = match_next(tokens, Token::LeftP)?;
    let mut params = vec![];
    if *peek(tokens) == Token::RightP {
        return Ok((ParameterList { params }, advance(tokens)));
    }

    loop {
        let line = line_of(tokens);
        let (names, rest) = id_list(tokens)?;
        let rest = match_next(rest, Token::Colon)?;
        let (ty, rest) = simple_type(rest)?;
        params.push(Parameter { names, ty, line });

        match peek(rest) {
            Token::Semicolon => tokens = advance(rest),
            _ => {
                tokens = match_next(rest, Token::RightP)?;
                break;
            }
        }
    }
    Ok((ParameterList { params }, tokens))
}

fn id_list(tokens: &[Lexeme]) -> Result<(IdList, &[Lexeme])> {
    let line = line_of(tokens);
    let (first, mut tokens) = match_ident(tokens)?;
    let mut names = vec![first.to_string()];
    while *peek(tokens) == Token::Comma {
        let (name, rest) = match_ident(advance(tokens))?;
        names.push(name.to_string());
        tokens = rest;
    }
    Ok((IdList { names, line }, tokens))
}

fn type_spec(tokens: &[Lexeme]) -> Result<(TypeSpec, &[Lexeme])> {
    let line = line_of(tokens);
    if *peek(tokens) != Token::Array {
        let (ty, tokens) = simple_type(tokens)?;
        return Ok((TypeSpec::Simple { ty, line }, tokens));
    }

    let tokens = match_next(advance(tokens), Token::LeftBracket)?;
    let (start, tokens) = bound(tokens)?;
    let tokens = match_next(tokens, Token::Range)?;
    let (end, tokens) = bound(tokens)?;
    let tokens = match_next(tokens, Token::RightBracket)?;
    let tokens = match_next(tokens, Token::Of)?;
    let (elem, tokens) = simple_type(tokens)?;

    Ok((
        TypeSpec::Array {
            start,
            end,
            elem,
            line,
        },
        tokens,
    ))
}

fn simple_type(tokens: &[Lexeme]) -> Result<(ScalarType, &[Lexeme])> {
    let ty = match peek(tokens) {
        Token::Integer => ScalarType::Integer,
        Token::Real => ScalarType::Real,
        Token::Boolean => ScalarType::Boolean,
        Token::String => ScalarType::String,
        _ => return Err(unexpected(tokens, "type name")),
    };
    Ok((ty, advance(tokens)))
}

fn bound(tokens: &[Lexeme]) -> Result<(i64, &[Lexeme])> {
    let (negative, tokens) = match peek(tokens) {
        Token::Minus => (true, advance(tokens)),
        _ => (false, tokens),
    };
    match peek(tokens) {
        Token::IntConst(n) if negative => Ok((-n, advance(tokens))),
        Token::IntConst(n) => Ok((*n, advance(tokens))),
        _ => Err(unexpected(tokens, "integer array bound")),
    }
}

fn compound(tokens: &[Lexeme]) -> Result<(Compound, &[Lexeme])> {
    let line = line_of(tokens);
    let mut tokens = match_next(tokens, Token::Begin)?;

    let mut statements = vec![];
    loop {
        let (stmt, rest) = statement(tokens)?;
        if let Some(stmt) = stmt {
            statements.push(stmt);
        }
        match peek(rest) {
            Token::Semicolon => tokens = advance(rest),
            _ => {
                tokens = match_next(rest, Token::End)?;
                break;
            }
        }
    }
    Ok((Compound { statements, line }, tokens))
}

/// Parses one statement. `None` stands for the empty statement.
fn statement(tokens: &[Lexeme]) -> Result<(Option<Statement>, &[Lexeme])> {
    let (stmt, tokens) = match peek(tokens) {
        Token::Begin => {
            let (compound, tokens) = compound(tokens)?;
            (Statement::Compound(compound), tokens)
        }
        Token::If => if_statement(tokens)?,
        Token::While => while_statement(tokens)?,
        Token::For => for_statement(tokens)?,
        Token::Read | Token::Readln => read_statement(tokens)?,
        Token::Write | Token::Writeln => write_statement(tokens)?,
        Token::Ident(_) => match peek(advance(tokens)) {
            Token::Assign | Token::LeftBracket => assignment(tokens)?,
            _ => procedure_call(tokens)?,
        },
        Token::Semicolon | Token::End | Token::Else => return Ok((None, tokens)),
        _ => return Err(unexpected(tokens, "statement")),
    };
    Ok((Some(stmt), tokens))
}

/// Statement used as a branch or loop body, where the empty statement is
/// kept as an empty compound.
fn body(tokens: &[Lexeme]) -> Result<(Box<Statement>, &[Lexeme])> {
    let line = line_of(tokens);
    let (stmt, tokens) = statement(tokens)?;
    Ok((Box::new(stmt.unwrap_or_else(|| Statement::empty(line))), tokens))
}

fn assignment(tokens: &[Lexeme]) -> Result<(Statement, &[Lexeme])> {
    let line = line_of(tokens);
    let (target, tokens) = var_ref(tokens)?;
    let tokens = match_next(tokens, Token::Assign)?;
    let (value, tokens) = expression(tokens)?;
    Ok((
        Statement::Assignment {
            target,
            value,
            line,
        },
        tokens,
    ))
}

fn if_statement(tokens: &[Lexeme]) -> Result<(Statement, &[Lexeme])> {
    let line = line_of(tokens);
    let tokens = match_next(tokens, Token::If)?;
    let (condition, tokens) = expression(tokens)?;
    let tokens = match_next(tokens, Token::Then)?;
    let (then_branch, tokens) = body(tokens)?;

    // a trailing else belongs to the innermost if
    let (else_branch, tokens) = if *peek(tokens) == Token::Else {
        let (stmt, tokens) = body(advance(tokens))?;
        (Some(stmt), tokens)
    } else {
        (None, tokens)
    };

    Ok((
        Statement::If {
            condition,
            then_branch,
            else_branch,
            line,
        },
        tokens,
    ))
}

fn while_statement(tokens: &[Lexeme]) -> Result<(Statement, &[Lexeme])> {
    let line = line_of(tokens);
    let tokens = match_next(tokens, Token::While)?;
    let (condition, tokens) = expression(tokens)?;
    let tokens = match_next(tokens, Token::Do)?;
    let (body, tokens) = body(tokens)?;
    Ok((
        Statement::While {
            condition,
            body,
            line,
        },
        tokens,
    ))
}

fn for_statement(tokens: &[Lexeme]) -> Result<(Statement, &[Lexeme])> {
    let line = line_of(tokens);
    let tokens = match_next(tokens, Token::For)?;
    let (var, tokens) = match_ident(tokens)?;
    let tokens = match_next(tokens, Token::Assign)?;
    let (start, tokens) = expression(tokens)?;

    let direction = match peek(tokens) {
        Token::To => Direction::To,
        Token::Downto => Direction::Downto,
        _ => return Err(unexpected(tokens, "'to' or 'downto'")),
    };
    let (end, tokens) = expression(advance(tokens))?;
    let tokens = match_next(tokens, Token::Do)?;
    let (body, tokens) = body(tokens)?;

    Ok((
        Statement::For {
            var: var.to_string(),
            start,
            end,
            direction,
            body,
            line,
        },
        tokens,
    ))
}

fn read_statement(tokens: &[Lexeme]) -> Result<(Statement, &[Lexeme])> {
    let line = line_of(tokens);
    let newline = *peek(tokens) == Token::Readln;
    let mut tokens = advance(tokens);

    let mut targets = vec![];
    if newline && *peek(tokens) != Token::LeftP {
        return Ok((
            Statement::Read {
                newline,
                targets,
                line,
            },
            tokens,
        ));
    }

    tokens = match_next(tokens, Token::LeftP)?;
    loop {
        let (target, rest) = var_ref(tokens)?;
        targets.push(target);
        match peek(rest) {
            Token::Comma => tokens = advance(rest),
            _ => {
                tokens = match_next(rest, Token::RightP)?;
                break;
            }
        }
    }

    Ok((
        Statement::Read {
            newline,
            targets,
            line,
        },
        tokens,
    ))
}

fn write_statement(tokens: &[Lexeme]) -> Result<(Statement, &[Lexeme])> {
    let line = line_of(tokens);
    let newline = *peek(tokens) == Token::Writeln;
    let tokens = advance(tokens);

    let (args, tokens) = if newline && *peek(tokens) != Token::LeftP {
        (vec![], tokens)
    } else {
        arguments(tokens)?
    };

    Ok((
        Statement::Write {
            newline,
            args,
            line,
        },
        tokens,
    ))
}

fn procedure_call(tokens: &[Lexeme]) -> Result<(Statement, &[Lexeme])> {
    let line = line_of(tokens);
    let (name, tokens) = match_ident(tokens)?;
    let (args, tokens) = if *peek(tokens) == Token::LeftP {
        arguments(tokens)?
    } else {
        (vec![], tokens)
    };
    Ok((
        Statement::ProcedureCall {
            name: name.to_string(),
            args,
            line,
        },
        tokens,
    ))
}

fn var_ref(tokens: &[Lexeme]) -> Result<(VarRef, &[Lexeme])> {
    let line = line_of(tokens);
    let (name, tokens) = match_ident(tokens)?;
    let name = name.to_string();
    if *peek(tokens) != Token::LeftBracket {
        return Ok((VarRef::Variable { name, line }, tokens));
    }

    let (index, tokens) = expression(advance(tokens))?;
    let tokens = match_next(tokens, Token::RightBracket)?;
    Ok((VarRef::Element { name, index, line }, tokens))
}

/// `( expr, ... )`, possibly empty.
fn arguments(tokens: &[Lexeme]) -> Result<(Vec<Expr>, &[Lexeme])> {
    let mut tokens = match_next(tokens, Token::LeftP)?;
    let mut args = vec![];
    if *peek(tokens) == Token::RightP {
        return Ok((args, advance(tokens)));
    }

    loop {
        let (arg, rest) = expression(tokens)?;
        args.push(arg);
        match peek(rest) {
            Token::Comma => tokens = advance(rest),
            _ => {
                tokens = match_next(rest, Token::RightP)?;
                break;
            }
        }
    }
    Ok((args, tokens))
}

fn expression(tokens: &[Lexeme]) -> Result<(Expr, &[Lexeme])> {
    binary_level(tokens, 0)
}

const LEVELS: usize = 4;

fn binary_operator(token: &Token, level: usize) -> Option<BinaryOp> {
    let op = match (level, token) {
        (0, Token::Or) => BinaryOp::Or,
        (1, Token::And) => BinaryOp::And,
        (2, Token::Equal) => BinaryOp::Equal,
        (2, Token::NotEqual) => BinaryOp::NotEqual,
        (2, Token::Less) => BinaryOp::Less,
        (2, Token::LessEqual) => BinaryOp::LessEqual,
        (2, Token::Greater) => BinaryOp::Greater,
        (2, Token::GreaterEqual) => BinaryOp::GreaterEqual,
        (3, Token::Plus) => BinaryOp::Add,
        (3, Token::Minus) => BinaryOp::Sub,
        (4, Token::Times) => BinaryOp::Mul,
        (4, Token::Divide) => BinaryOp::Divide,
        (4, Token::Div) => BinaryOp::Div,
        (4, Token::Mod) => BinaryOp::Mod,
        _ => return None,
    };
    Some(op)
}

/// Left-associative binary operators, loosest binding at level 0.
fn binary_level(tokens: &[Lexeme], level: usize) -> Result<(Expr, &[Lexeme])> {
    let (mut left, mut tokens) = operand(tokens, level)?;
    while let Some(op) = binary_operator(peek(tokens), level) {
        let line = line_of(tokens);
        let (right, rest) = operand(advance(tokens), level)?;
        left = Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
            line,
        };
        tokens = rest;
    }
    Ok((left, tokens))
}

fn operand(tokens: &[Lexeme], level: usize) -> Result<(Expr, &[Lexeme])> {
    if level == LEVELS {
        factor(tokens)
    } else {
        binary_level(tokens, level + 1)
    }
}

fn factor(tokens: &[Lexeme]) -> Result<(Expr, &[Lexeme])> {
    let line = line_of(tokens);
    let op = match peek(tokens) {
        Token::Minus => UnaryOp::Neg,
        Token::Not => UnaryOp::Not,
        _ => return atom(tokens),
    };
    let (operand, tokens) = factor(advance(tokens))?;
    Ok((
        Expr::Unary {
            op,
            operand: Box::new(operand),
            line,
        },
        tokens,
    ))
}

fn atom(tokens: &[Lexeme]) -> Result<(Expr, &[Lexeme])> {
    let line = line_of(tokens);
    let rest = advance(tokens);
    let expr = match peek(tokens) {
        Token::IntConst(n) => Expr::Number {
            value: Number::Integer(*n),
            line,
        },
        Token::RealConst(n) => Expr::Number {
            value: Number::Real(*n),
            line,
        },
        Token::StrConst(s) => Expr::String {
            value: s.clone(),
            line,
        },
        Token::True | Token::False => Expr::Boolean {
            value: *peek(tokens) == Token::True,
            line,
        },
        Token::LeftP => {
            let (expr, rest) = expression(rest)?;
            let rest = match_next(rest, Token::RightP)?;
            return Ok((expr, rest));
        }
        Token::Length => {
            let rest = match_next(rest, Token::LeftP)?;
            let (arg, rest) = expression(rest)?;
            let rest = match_next(rest, Token::RightP)?;
            return Ok((
                Expr::Length {
                    arg: Box::new(arg),
                    line,
                },
                rest,
            ));
        }
        Token::Ident(name) => {
            let name = name.clone();
            return match peek(rest) {
                Token::LeftBracket => {
                    let (index, rest) = expression(advance(rest))?;
                    let rest = match_next(rest, Token::RightBracket)?;
                    Ok((
                        Expr::ArrayAccess {
                            name,
                            index: Box::new(index),
                            line,
                        },
                        rest,
                    ))
                }
                Token::LeftP => {
                    let (args, rest) = arguments(rest)?;
                    Ok((Expr::FunctionCall { name, args, line }, rest))
                }
                _ => Ok((Expr::Variable { name, line }, rest)),
            };
        }
        _ => return Err(unexpected(tokens, "expression")),
    };
    Ok((expr, rest))
}

fn unexpected(tokens: &[Lexeme], expected: &str) -> anyhow::Error {
    match tokens.first() {
        Some(lexeme) => anyhow!(
            "line {}: unexpected {}, expected {expected}",
            lexeme.line,
            lexeme.token
        ),
        None => anyhow!("unexpected end of input, expected {expected}"),
    }
}

static EOF: Token = Token::Eof;

fn peek(tokens: &[Lexeme]) -> &Token {
    tokens.first().map(|l| &l.token).unwrap_or(&EOF)
}

fn line_of(tokens: &[Lexeme]) -> Line {
    tokens.first().map(|l| l.line).unwrap_or_default()
}

fn advance(tokens: &[Lexeme]) -> &[Lexeme] {
    tokens.get(1..).unwrap_or_default()
}

fn match_next(tokens: &[Lexeme], target: Token) -> Result<&[Lexeme]> {
    if *peek(tokens) == target {
        return Ok(advance(tokens));
    }
    Err(unexpected(tokens, &target.to_string()))
}

fn match_ident(tokens: &[Lexeme]) -> Result<(&str, &[Lexeme])> {
    match peek(tokens) {
        Token::Ident(name) => Ok((name, advance(tokens))),
        _ => Err(unexpected(tokens, "identifier")),
    }
}
