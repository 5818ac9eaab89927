use super::ast::*;

/// Renders a tree as one `kind: payload` line per node, children indented
/// two spaces below their parent.
#[derive(Default)]
pub struct AstPrinter {
    depth: usize,
}

impl AstPrinter {
    pub fn print(program: &Program) -> String {
        AstPrinter::default().visit_program(program)
    }

    fn line(&self, kind: NodeKind, payload: Option<String>) -> String {
        let indent = "  ".repeat(self.depth);
        match payload {
            Some(payload) => format!("{indent}{kind}: {payload}"),
            None => format!("{indent}{kind}"),
        }
    }

    fn node(
        &mut self,
        kind: NodeKind,
        payload: Option<String>,
        children: impl FnOnce(&mut Self) -> Vec<String>,
    ) -> String {
        let mut lines = vec![self.line(kind, payload)];
        self.depth += 1;
        lines.extend(children(self).into_iter().filter(|s| !s.is_empty()));
        self.depth -= 1;
        lines.join("\n")
    }

    fn id_list(&mut self, ids: &IdList) -> String {
        self.line(NodeKind::IdList, Some(ids.names.join(", ")))
    }

    fn callable(&mut self, kind: NodeKind, callable: &Callable) -> String {
        let payload = match callable.return_type {
            Some(ty) => format!("{}: {ty}", callable.name),
            None => callable.name.clone(),
        };
        self.node(kind, Some(payload), |p| {
            let params = p.node(NodeKind::ParameterList, None, |p| {
                callable
                    .params
                    .params
                    .iter()
                    .map(|param| {
                        p.node(NodeKind::Parameter, Some(param.ty.to_string()), |p| {
                            vec![p.id_list(&param.names)]
                        })
                    })
                    .collect()
            });
            vec![
                params,
                p.visit_declarations(&callable.declarations),
                p.visit_compound(&callable.body),
            ]
        })
    }

    fn arguments(&mut self, args: &[Expr]) -> String {
        self.node(NodeKind::ArgumentList, None, |p| {
            args.iter().map(|arg| p.visit_expression(arg)).collect()
        })
    }
}

impl Visitor<String> for AstPrinter {
    fn visit_program(&mut self, program: &Program) -> String {
        self.node(NodeKind::Program, Some(program.name.clone()), |p| {
            vec![
                p.visit_declarations(&program.declarations),
                p.visit_compound(&program.body),
            ]
        })
    }

    fn visit_declarations(&mut self, declarations: &Declarations) -> String {
        self.node(NodeKind::Declarations, None, |p| {
            declarations
                .items
                .iter()
                .map(|decl| p.visit_declaration(decl))
                .collect()
        })
    }

    fn visit_declaration(&mut self, declaration: &Declaration) -> String {
        let kind = declaration.kind();
        match declaration {
            Declaration::Var(decl) => self.node(kind, None, |p| {
                decl.items
                    .iter()
                    .map(|item| {
                        p.node(NodeKind::VarItem, None, |p| {
                            vec![p.id_list(&item.names), p.visit_type(&item.ty)]
                        })
                    })
                    .collect()
            }),
            Declaration::Const(decl) => self.node(kind, None, |p| {
                decl.items
                    .iter()
                    .map(|item| {
                        p.node(NodeKind::ConstItem, Some(item.name.clone()), |p| {
                            vec![p.visit_expression(&item.value)]
                        })
                    })
                    .collect()
            }),
            Declaration::Type(decl) => self.node(kind, None, |p| {
                decl.items
                    .iter()
                    .map(|item| {
                        p.node(NodeKind::TypeItem, Some(item.name.clone()), |p| {
                            vec![p.visit_type(&item.ty)]
                        })
                    })
                    .collect()
            }),
            Declaration::Function(callable) | Declaration::Procedure(callable) => {
                self.callable(kind, callable)
            }
        }
    }

    fn visit_type(&mut self, ty: &TypeSpec) -> String {
        match ty {
            TypeSpec::Simple { ty, .. } => self.line(NodeKind::Type, Some(ty.to_string())),
            TypeSpec::Array {
                start, end, elem, ..
            } => self.node(NodeKind::ArrayType, Some(format!("[{start}, {end}]")), |p| {
                vec![p.line(NodeKind::Type, Some(elem.to_string()))]
            }),
        }
    }

    fn visit_compound(&mut self, compound: &Compound) -> String {
        self.node(NodeKind::CompoundStatement, None, |p| {
            compound
                .statements
                .iter()
                .map(|stmt| p.visit_statement(stmt))
                .collect()
        })
    }

    fn visit_statement(&mut self, statement: &Statement) -> String {
        let kind = statement.kind();
        match statement {
            Statement::Compound(compound) => self.visit_compound(compound),
            Statement::Assignment { target, value, .. } => self.node(kind, None, |p| {
                vec![p.visit_var_ref(target), p.visit_expression(value)]
            }),
            Statement::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => self.node(kind, None, |p| {
                let mut children = vec![
                    p.visit_expression(condition),
                    p.visit_statement(then_branch),
                ];
                if let Some(else_branch) = else_branch {
                    children.push(p.visit_statement(else_branch));
                }
                children
            }),
            Statement::While {
                condition, body, ..
            } => self.node(kind, None, |p| {
                vec![p.visit_expression(condition), p.visit_statement(body)]
            }),
            Statement::For {
                var,
                start,
                end,
                direction,
                body,
                ..
            } => self.node(kind, Some(format!("{var} {direction}")), |p| {
                vec![
                    p.visit_expression(start),
                    p.visit_expression(end),
                    p.visit_statement(body),
                ]
            }),
            Statement::Read {
                newline, targets, ..
            } => {
                let payload = if *newline { "readln" } else { "read" };
                self.node(kind, Some(payload.to_string()), |p| {
                    targets.iter().map(|t| p.visit_var_ref(t)).collect()
                })
            }
            Statement::Write { newline, args, .. } => {
                let payload = if *newline { "writeln" } else { "write" };
                self.node(kind, Some(payload.to_string()), |p| {
                    vec![p.arguments(args)]
                })
            }
            Statement::ProcedureCall { name, args, .. } => {
                self.node(kind, Some(name.clone()), |p| vec![p.arguments(args)])
            }
        }
    }

    fn visit_var_ref(&mut self, var_ref: &VarRef) -> String {
        match var_ref {
            VarRef::Variable { name, .. } => self.line(NodeKind::Variable, Some(name.clone())),
            VarRef::Element { name, index, .. } => {
                self.node(NodeKind::ArrayAccess, Some(name.clone()), |p| {
                    vec![p.visit_expression(index)]
                })
            }
        }
    }

    fn visit_expression(&mut self, expr: &Expr) -> String {
        let kind = expr.kind();
        match expr {
            Expr::Number { value, .. } => self.line(kind, Some(value.to_string())),
            Expr::String { value, .. } => self.line(kind, Some(format!("'{value}'"))),
            Expr::Boolean { value, .. } => self.line(kind, Some(value.to_string())),
            Expr::Variable { name, .. } => self.line(kind, Some(name.clone())),
            Expr::ArrayAccess { name, index, .. } => {
                self.node(kind, Some(name.clone()), |p| vec![p.visit_expression(index)])
            }
            Expr::FunctionCall { name, args, .. } => {
                self.node(kind, Some(name.clone()), |p| vec![p.arguments(args)])
            }
            Expr::Length { arg, .. } => self.node(kind, None, |p| vec![p.visit_expression(arg)]),
            Expr::Binary {
                op, left, right, ..
            } => self.node(kind, Some(op.to_string()), |p| {
                vec![p.visit_expression(left), p.visit_expression(right)]
            }),
            Expr::Unary { op, operand, .. } => self.node(kind, Some(op.to_string()), |p| {
                vec![p.visit_expression(operand)]
            }),
        }
    }
}
