use std::collections::HashMap;

use crate::{
    parser::ast::{Callable, Declaration, TypeSpec},
    types::ScalarType,
};

use super::{
    code_context::CodeContext,
    data::{default_value, element_type},
};

/// A parameter or local variable of the callable being generated.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameVar {
    pub offset: i64,
    pub ty: TypeSpec,
}

impl FrameVar {
    pub fn lower_bound(&self) -> i64 {
        self.ty.bounds().map(|(start, _)| start).unwrap_or_default()
    }
}

/// Activation record layout of one callable, computed once on entry.
///
/// Parameters sit below the frame pointer at `-count..-1` in declaration
/// order, offset 0 holds the result and locals follow from 1, arrays taking
/// one word per element.
#[derive(Debug, Clone)]
pub struct Frame {
    vars: HashMap<String, FrameVar>,
    locals: Vec<(String, TypeSpec)>,
    return_type: Option<ScalarType>,
    size: usize,
}

impl Frame {
    pub fn new(callable: &Callable) -> Self {
        let mut vars = HashMap::new();

        let count = callable.param_count() as i64;
        let params = callable
            .params
            .params
            .iter()
            .flat_map(|p| p.names.names.iter().map(move |name| (name, p.ty, p.line)));
        for (i, (name, ty, line)) in params.enumerate() {
            vars.entry(name.clone()).or_insert(FrameVar {
                offset: i as i64 - count,
                ty: TypeSpec::Simple { ty, line },
            });
        }

        let mut locals = vec![];
        let mut size = 0;
        for declaration in &callable.declarations.items {
            let Declaration::Var(var) = declaration else {
                continue;
            };
            for item in &var.items {
                for name in &item.names.names {
                    if vars.contains_key(name) {
                        continue;
                    }
                    vars.insert(
                        name.clone(),
                        FrameVar {
                            offset: size as i64 + 1,
                            ty: item.ty.clone(),
                        },
                    );
                    locals.push((name.clone(), item.ty.clone()));
                    size += item.ty.size();
                }
            }
        }

        Self {
            vars,
            locals,
            return_type: callable.return_type,
            size,
        }
    }

    pub fn get(&self, name: &str) -> Option<&FrameVar> {
        self.vars.get(name)
    }

    /// Words reserved above the frame pointer, result slot included.
    pub fn size(&self) -> usize {
        self.size + 1
    }

    /// Reserves the result slot and every local word.
    pub fn reserve_code(&self, ctx: &mut CodeContext) {
        let result = self.return_type.unwrap_or(ScalarType::Integer);
        ctx.add(default_value(result));
        for (name, ty) in &self.locals {
            let elem = element_type(ty);
            if let Some(var) = self.vars.get(name) {
                ctx.comment(format!("{name}: {} @ fp[{}]", ty.to_type(), var.offset));
            }
            for _ in 0..ty.size() {
                ctx.add(default_value(elem));
            }
        }
    }
}
