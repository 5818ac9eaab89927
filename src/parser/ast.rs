use std::fmt::Display;

use crate::types::{ScalarType, Type};

pub type Line = usize;

/// Kind tag shared by every node of the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Program,
    Declarations,
    VarDeclaration,
    VarItem,
    IdList,
    Type,
    ArrayType,
    ConstDeclaration,
    ConstItem,
    TypeDeclaration,
    TypeItem,
    FunctionDeclaration,
    ProcedureDeclaration,
    ParameterList,
    Parameter,
    CompoundStatement,
    Assignment,
    IfStatement,
    WhileStatement,
    ForStatement,
    ReadStatement,
    WriteStatement,
    ProcedureCall,
    FunctionCall,
    ArgumentList,
    BinaryOp,
    UnaryOp,
    Variable,
    ArrayAccess,
    LengthCall,
    Number,
    String,
    Boolean,
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Program => "program",
            NodeKind::Declarations => "declarations",
            NodeKind::VarDeclaration => "var_declaration",
            NodeKind::VarItem => "var_item",
            NodeKind::IdList => "id_list",
            NodeKind::Type => "type",
            NodeKind::ArrayType => "array_type",
            NodeKind::ConstDeclaration => "const_declaration",
            NodeKind::ConstItem => "const_item",
            NodeKind::TypeDeclaration => "type_declaration",
            NodeKind::TypeItem => "type_item",
            NodeKind::FunctionDeclaration => "function_declaration",
            NodeKind::ProcedureDeclaration => "procedure_declaration",
            NodeKind::ParameterList => "parameter_list",
            NodeKind::Parameter => "parameter",
            NodeKind::CompoundStatement => "compound_statement",
            NodeKind::Assignment => "assignment",
            NodeKind::IfStatement => "if_statement",
            NodeKind::WhileStatement => "while_statement",
            NodeKind::ForStatement => "for_statement",
            NodeKind::ReadStatement => "read_statement",
            NodeKind::WriteStatement => "write_statement",
            NodeKind::ProcedureCall => "procedure_call",
            NodeKind::FunctionCall => "function_call",
            NodeKind::ArgumentList => "argument_list",
            NodeKind::BinaryOp => "binary_op",
            NodeKind::UnaryOp => "unary_op",
            NodeKind::Variable => "variable",
            NodeKind::ArrayAccess => "array_access",
            NodeKind::LengthCall => "length_call",
            NodeKind::Number => "number",
            NodeKind::String => "string",
            NodeKind::Boolean => "boolean",
        }
    }
}

impl Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub name: String,
    pub declarations: Declarations,
    pub body: Compound,
    pub line: Line,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Declarations {
    pub items: Vec<Declaration>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    Var(VarDeclaration),
    Const(ConstDeclaration),
    Type(TypeDeclaration),
    Function(Callable),
    Procedure(Callable),
}

impl Declaration {
    pub fn kind(&self) -> NodeKind {
        match self {
            Declaration::Var(_) => NodeKind::VarDeclaration,
            Declaration::Const(_) => NodeKind::ConstDeclaration,
            Declaration::Type(_) => NodeKind::TypeDeclaration,
            Declaration::Function(_) => NodeKind::FunctionDeclaration,
            Declaration::Procedure(_) => NodeKind::ProcedureDeclaration,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDeclaration {
    pub items: Vec<VarItem>,
    pub line: Line,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarItem {
    pub names: IdList,
    pub ty: TypeSpec,
    pub line: Line,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IdList {
    pub names: Vec<String>,
    pub line: Line,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeSpec {
    Simple {
        ty: ScalarType,
        line: Line,
    },
    Array {
        start: i64,
        end: i64,
        elem: ScalarType,
        line: Line,
    },
}

impl TypeSpec {
    pub fn kind(&self) -> NodeKind {
        match self {
            TypeSpec::Simple { .. } => NodeKind::Type,
            TypeSpec::Array { .. } => NodeKind::ArrayType,
        }
    }

    pub fn to_type(&self) -> Type {
        match self {
            TypeSpec::Simple { ty, .. } => Type::Scalar(*ty),
            TypeSpec::Array { elem, .. } => Type::Array(*elem),
        }
    }

    pub fn bounds(&self) -> Option<(i64, i64)> {
        match self {
            TypeSpec::Simple { .. } => None,
            TypeSpec::Array { start, end, .. } => Some((*start, *end)),
        }
    }

    /// Number of storage words a value of this type occupies.
    pub fn size(&self) -> usize {
        match self {
            TypeSpec::Simple { .. } => 1,
            TypeSpec::Array { start, end, .. } => (end - start + 1).max(0) as usize,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstDeclaration {
    pub items: Vec<ConstItem>,
    pub line: Line,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstItem {
    pub name: String,
    pub value: Expr,
    pub line: Line,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeDeclaration {
    pub items: Vec<TypeItem>,
    pub line: Line,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeItem {
    pub name: String,
    pub ty: TypeSpec,
    pub line: Line,
}

/// A function (with `return_type`) or a procedure (without).
#[derive(Debug, Clone, PartialEq)]
pub struct Callable {
    pub name: String,
    pub params: ParameterList,
    pub return_type: Option<ScalarType>,
    pub declarations: Declarations,
    pub body: Compound,
    pub line: Line,
}

impl Callable {
    pub fn is_function(&self) -> bool {
        self.return_type.is_some()
    }

    pub fn param_count(&self) -> usize {
        self.params.params.iter().map(|p| p.names.names.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParameterList {
    pub params: Vec<Parameter>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub names: IdList,
    pub ty: ScalarType,
    pub line: Line,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Compound {
    pub statements: Vec<Statement>,
    pub line: Line,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    To,
    Downto,
}

impl Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::To => f.write_str("to"),
            Direction::Downto => f.write_str("downto"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Compound(Compound),
    Assignment {
        target: VarRef,
        value: Expr,
        line: Line,
    },
    If {
        condition: Expr,
        then_branch: Box<Statement>,
        else_branch: Option<Box<Statement>>,
        line: Line,
    },
    While {
        condition: Expr,
        body: Box<Statement>,
        line: Line,
    },
    For {
        var: String,
        start: Expr,
        end: Expr,
        direction: Direction,
        body: Box<Statement>,
        line: Line,
    },
    Read {
        newline: bool,
        targets: Vec<VarRef>,
        line: Line,
    },
    Write {
        newline: bool,
        args: Vec<Expr>,
        line: Line,
    },
    ProcedureCall {
        name: String,
        args: Vec<Expr>,
        line: Line,
    },
}

impl Statement {
    pub fn kind(&self) -> NodeKind {
        match self {
            Statement::Compound(_) => NodeKind::CompoundStatement,
            Statement::Assignment { .. } => NodeKind::Assignment,
            Statement::If { .. } => NodeKind::IfStatement,
            Statement::While { .. } => NodeKind::WhileStatement,
            Statement::For { .. } => NodeKind::ForStatement,
            Statement::Read { .. } => NodeKind::ReadStatement,
            Statement::Write { .. } => NodeKind::WriteStatement,
            Statement::ProcedureCall { .. } => NodeKind::ProcedureCall,
        }
    }

    pub fn line(&self) -> Line {
        match self {
            Statement::Compound(compound) => compound.line,
            Statement::Assignment { line, .. }
            | Statement::If { line, .. }
            | Statement::While { line, .. }
            | Statement::For { line, .. }
            | Statement::Read { line, .. }
            | Statement::Write { line, .. }
            | Statement::ProcedureCall { line, .. } => *line,
        }
    }

    /// Empty statements are kept as empty compound statements.
    pub fn empty(line: Line) -> Self {
        Statement::Compound(Compound {
            statements: vec![],
            line,
        })
    }
}

/// Storage named on the left of `:=` or inside `read(...)`.
#[derive(Debug, Clone, PartialEq)]
pub enum VarRef {
    Variable { name: String, line: Line },
    Element { name: String, index: Expr, line: Line },
}

impl VarRef {
    pub fn name(&self) -> &str {
        match self {
            VarRef::Variable { name, .. } | VarRef::Element { name, .. } => name,
        }
    }

    pub fn line(&self) -> Line {
        match self {
            VarRef::Variable { line, .. } | VarRef::Element { line, .. } => *line,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            VarRef::Variable { .. } => NodeKind::Variable,
            VarRef::Element { .. } => NodeKind::ArrayAccess,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Integer(i64),
    Real(f64),
}

impl Display for Number {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Number::Integer(n) => write!(f, "{n}"),
            Number::Real(n) => write!(f, "{n:?}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Divide,
    Div,
    Mod,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
}

impl BinaryOp {
    pub fn is_relational(&self) -> bool {
        matches!(
            self,
            BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::Less
                | BinaryOp::LessEqual
                | BinaryOp::Greater
                | BinaryOp::GreaterEqual
        )
    }

    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Divide
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Div => "div",
            BinaryOp::Mod => "mod",
            BinaryOp::Equal => "=",
            BinaryOp::NotEqual => "<>",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }
}

impl Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl Display for UnaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnaryOp::Neg => f.write_str("-"),
            UnaryOp::Not => f.write_str("not"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number {
        value: Number,
        line: Line,
    },
    String {
        value: String,
        line: Line,
    },
    Boolean {
        value: bool,
        line: Line,
    },
    Variable {
        name: String,
        line: Line,
    },
    ArrayAccess {
        name: String,
        index: Box<Expr>,
        line: Line,
    },
    FunctionCall {
        name: String,
        args: Vec<Expr>,
        line: Line,
    },
    Length {
        arg: Box<Expr>,
        line: Line,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        line: Line,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        line: Line,
    },
}

impl Expr {
    pub fn kind(&self) -> NodeKind {
        match self {
            Expr::Number { .. } => NodeKind::Number,
            Expr::String { .. } => NodeKind::String,
            Expr::Boolean { .. } => NodeKind::Boolean,
            Expr::Variable { .. } => NodeKind::Variable,
            Expr::ArrayAccess { .. } => NodeKind::ArrayAccess,
            Expr::FunctionCall { .. } => NodeKind::FunctionCall,
            Expr::Length { .. } => NodeKind::LengthCall,
            Expr::Binary { .. } => NodeKind::BinaryOp,
            Expr::Unary { .. } => NodeKind::UnaryOp,
        }
    }

    pub fn line(&self) -> Line {
        match self {
            Expr::Number { line, .. }
            | Expr::String { line, .. }
            | Expr::Boolean { line, .. }
            | Expr::Variable { line, .. }
            | Expr::ArrayAccess { line, .. }
            | Expr::FunctionCall { line, .. }
            | Expr::Length { line, .. }
            | Expr::Binary { line, .. }
            | Expr::Unary { line, .. } => *line,
        }
    }

    pub fn is_relational(&self) -> bool {
        matches!(self, Expr::Binary { op, .. } if op.is_relational())
    }

    /// The single character of a one-character string literal.
    pub fn as_char_literal(&self) -> Option<char> {
        match self {
            Expr::String { value, .. } => {
                let mut chars = value.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(c),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

pub trait Visitor<T> {
    fn visit_program(&mut self, program: &Program) -> T;
    fn visit_declarations(&mut self, declarations: &Declarations) -> T;
    fn visit_declaration(&mut self, declaration: &Declaration) -> T;
    fn visit_type(&mut self, ty: &TypeSpec) -> T;
    fn visit_compound(&mut self, compound: &Compound) -> T;
    fn visit_statement(&mut self, statement: &Statement) -> T;
    fn visit_var_ref(&mut self, var_ref: &VarRef) -> T;
    fn visit_expression(&mut self, expr: &Expr) -> T;
}
