use std::collections::HashMap;

use crate::{
    parser::ast::{Declaration, Declarations, TypeSpec},
    types::ScalarType,
};

use super::{
    code_context::CodeContext,
    mnemonics::{Instruction, PUSHF, PUSHI, PUSHS},
};

/// Storage of one program-level variable.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalVar {
    pub slot: usize,
    pub ty: TypeSpec,
}

impl GlobalVar {
    pub fn lower_bound(&self) -> i64 {
        self.ty.bounds().map(|(start, _)| start).unwrap_or_default()
    }
}

/// Default value pushed to initialise one storage word.
pub fn default_value(ty: ScalarType) -> Instruction {
    match ty {
        ScalarType::Integer | ScalarType::Boolean => PUSHI.op(0_i64),
        ScalarType::Real => PUSHF.op(0.0),
        ScalarType::String => PUSHS.string(""),
    }
}

pub fn element_type(ty: &TypeSpec) -> ScalarType {
    match ty {
        TypeSpec::Simple { ty, .. } => *ty,
        TypeSpec::Array { elem, .. } => *elem,
    }
}

/// Global slot allocation. Slots are handed out in declaration order
/// starting at 0, arrays taking one slot per element.
#[derive(Debug, Default)]
pub struct DataBuilder {
    globals: HashMap<String, GlobalVar>,
    order: Vec<String>,
    size: usize,
}

impl DataBuilder {
    pub fn new(declarations: &Declarations) -> Self {
        let mut builder = Self::default();
        for declaration in &declarations.items {
            let Declaration::Var(var) = declaration else {
                continue;
            };
            for item in &var.items {
                for name in &item.names.names {
                    builder.add(name, &item.ty);
                }
            }
        }
        builder
    }

    fn add(&mut self, name: &str, ty: &TypeSpec) {
        if self.globals.contains_key(name) {
            return;
        }
        self.globals.insert(
            name.to_string(),
            GlobalVar {
                slot: self.size,
                ty: ty.clone(),
            },
        );
        self.order.push(name.to_string());
        self.size += ty.size();
    }

    pub fn get(&self, name: &str) -> Option<&GlobalVar> {
        self.globals.get(name)
    }

    /// Number of global slots in use.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Pushes the default value of every slot, in slot order.
    pub fn init_code(&self, ctx: &mut CodeContext) {
        for name in &self.order {
            let Some(global) = self.globals.get(name) else {
                continue;
            };
            let elem = element_type(&global.ty);
            match global.ty {
                TypeSpec::Simple { ty, .. } => {
                    ctx.comment(format!("{name}: {ty} @ {}", global.slot));
                }
                TypeSpec::Array { start, end, .. } => {
                    ctx.comment(format!(
                        "{name}: array[{start}..{end}] of {elem} @ {}",
                        global.slot
                    ));
                }
            }
            for _ in 0..global.ty.size() {
                ctx.add(default_value(elem));
            }
        }
    }
}
