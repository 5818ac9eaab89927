use std::{collections::HashMap, fmt::Display, str::FromStr};

use anyhow::anyhow;
use lazy_static::lazy_static;
use paste::paste;

/// Kind of immediate an opcode is written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    None,
    Int,
    Float,
    Str,
    Label,
}

macro_rules! opcodes {
    (@kind) => { OperandKind::None };
    (@kind $kind:ident) => { OperandKind::$kind };
    ( $($name:ident $(($kind:ident))?),* $(,)? ) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Opcode {
            $($name),*
        }

        impl Opcode {
            pub const ALL: &'static [Opcode] = &[$(Opcode::$name),*];

            pub fn mnemonic(&self) -> &'static str {
                match self {
                    $(Opcode::$name => paste! { stringify!([<$name:lower>]) }),*
                }
            }

            pub fn operand_kind(&self) -> OperandKind {
                match self {
                    $(Opcode::$name => opcodes!(@kind $($kind)?)),*
                }
            }
        }

        paste! {
            $(pub const [<$name:upper>]: Opcode = Opcode::$name;)*
        }
    };
}

opcodes!(
    Start,
    Stop,
    Nop,
    Pushi(Int),
    Pushn(Int),
    Pushf(Float),
    Pushs(Str),
    Pushg(Int),
    Pushl(Int),
    Pushsp,
    Pushfp,
    Pushgp,
    Pusha(Label),
    Load(Int),
    Loadn,
    Store(Int),
    Storen,
    Storeg(Int),
    Storel(Int),
    Pop(Int),
    Dup(Int),
    Swap,
    Padd,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Not,
    And,
    Or,
    Equal,
    Inf,
    Infeq,
    Sup,
    Supeq,
    Fadd,
    Fsub,
    Fmul,
    Fdiv,
    Finf,
    Finfeq,
    Fsup,
    Fsupeq,
    Itof,
    Ftoi,
    Atoi,
    Atof,
    Stri,
    Strf,
    Concat,
    Strlen,
    Charat,
    Read,
    Writei,
    Writef,
    Writes,
    Writeln,
    Jump(Label),
    Jz(Label),
    Call,
    Return,
);

lazy_static! {
    static ref BY_MNEMONIC: HashMap<&'static str, Opcode> =
        Opcode::ALL.iter().map(|op| (op.mnemonic(), *op)).collect();
}

impl FromStr for Opcode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BY_MNEMONIC
            .get(s.to_ascii_lowercase().as_str())
            .copied()
            .ok_or_else(|| anyhow!("unknown mnemonic '{s}'"))
    }
}

impl Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mnemonic())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    None,
    Int(i64),
    Float(f64),
    Str(String),
    Label(String),
}

impl Operand {
    pub fn kind(&self) -> OperandKind {
        match self {
            Operand::None => OperandKind::None,
            Operand::Int(_) => OperandKind::Int,
            Operand::Float(_) => OperandKind::Float,
            Operand::Str(_) => OperandKind::Str,
            Operand::Label(_) => OperandKind::Label,
        }
    }
}

impl From<i64> for Operand {
    fn from(value: i64) -> Self {
        Operand::Int(value)
    }
}

impl From<usize> for Operand {
    fn from(value: usize) -> Self {
        Operand::Int(value as i64)
    }
}

impl From<f64> for Operand {
    fn from(value: f64) -> Self {
        Operand::Float(value)
    }
}

fn escape(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            c => escaped.push(c),
        }
    }
    escaped
}

impl Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::None => Ok(()),
            Operand::Int(n) => write!(f, "{n}"),
            Operand::Float(n) => write!(f, "{n:?}"),
            Operand::Str(s) => write!(f, "\"{}\"", escape(s)),
            Operand::Label(label) => f.write_str(label),
        }
    }
}

/// One line of emitted assembly.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Op(Opcode, Operand),
    Label(String),
    Comment(String),
    Blank,
}

impl Opcode {
    pub fn op(self, operand: impl Into<Operand>) -> Instruction {
        Instruction::Op(self, operand.into())
    }

    pub fn string(self, s: &str) -> Instruction {
        Instruction::Op(self, Operand::Str(s.to_string()))
    }

    pub fn label(self, label: &str) -> Instruction {
        Instruction::Op(self, Operand::Label(label.to_string()))
    }
}

impl From<Opcode> for Instruction {
    fn from(opcode: Opcode) -> Self {
        Instruction::Op(opcode, Operand::None)
    }
}

impl Instruction {
    pub fn opcode(&self) -> Option<Opcode> {
        match self {
            Instruction::Op(opcode, _) => Some(*opcode),
            _ => None,
        }
    }

    /// Whether the operand matches what the opcode expects.
    pub fn is_well_formed(&self) -> bool {
        match self {
            Instruction::Op(opcode, operand) => opcode.operand_kind() == operand.kind(),
            Instruction::Label(label) => !label.is_empty(),
            _ => true,
        }
    }

    /// Lines that carry no runtime effect.
    pub fn is_cosmetic(&self) -> bool {
        matches!(self, Instruction::Comment(_) | Instruction::Blank)
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Instruction::Op(opcode, Operand::None) => write!(f, "{opcode}"),
            Instruction::Op(opcode, operand) => write!(f, "{opcode} {operand}"),
            Instruction::Label(label) => write!(f, "{label}:"),
            Instruction::Comment(text) => write!(f, "// {text}"),
            Instruction::Blank => Ok(()),
        }
    }
}
