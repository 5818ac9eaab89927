pub mod symbols;

use std::fmt::Display;

use log::debug;

use crate::{
    parser::ast::*,
    types::{assignable, ScalarType, Type},
};

use symbols::{ConstValue, Symbol, SymbolKind, SymbolTable, ROOT_SCOPE_NAME};

/// A semantic error or warning tied to a source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub line: usize,
    pub message: String,
}

impl Diagnostic {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

struct CallableContext {
    name: String,
    is_function: bool,
    assigns_result: bool,
}

/// Single walk over the tree that fills the symbol table and type-checks
/// every statement. Errors accumulate; the walk never stops early.
#[derive(Default)]
pub struct Analyzer {
    symbols: SymbolTable,
    errors: Vec<Diagnostic>,
    warnings: Vec<Diagnostic>,
    callables: Vec<CallableContext>,
}

impl Analyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when no error was found.
    pub fn analyze(&mut self, program: &Program) -> bool {
        self.symbols
            .add_symbol(&program.name, None, SymbolKind::Program, program.line, None);
        self.visit_declarations(&program.declarations);
        self.visit_compound(&program.body);

        debug!(
            "semantic analysis finished with {} errors and {} warnings",
            self.errors.len(),
            self.warnings.len()
        );
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn into_parts(self) -> (SymbolTable, Vec<Diagnostic>, Vec<Diagnostic>) {
        (self.symbols, self.errors, self.warnings)
    }

    fn error(&mut self, line: usize, message: impl Into<String>) {
        self.errors.push(Diagnostic::new(line, message));
    }

    fn warning(&mut self, line: usize, message: impl Into<String>) {
        self.warnings.push(Diagnostic::new(line, message));
    }

    fn declare(
        &mut self,
        name: &str,
        ty: Option<Type>,
        kind: SymbolKind,
        line: usize,
        value: Option<ConstValue>,
    ) -> bool {
        let added = self.symbols.add_symbol(name, ty, kind, line, value);
        if !added {
            let scope = self.symbols.current_path().to_string();
            self.error(
                line,
                format!("identifier '{name}' already declared in scope '{scope}'"),
            );
        }
        added
    }

    fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.symbols.lookup(name, false)
    }

    /// Looks a name up for use as a value or storage. Locals of an enclosing
    /// callable are out of reach: a nested callable only sees its own frame
    /// and the globals.
    fn resolve_name(&mut self, name: &str, line: usize) -> Option<Symbol> {
        let Some(symbol) = self.lookup(name).cloned() else {
            self.error(line, format!("undeclared identifier '{name}'"));
            return None;
        };
        if symbol.is_storage()
            && symbol.scope != ROOT_SCOPE_NAME
            && symbol.scope != self.symbols.current_path()
        {
            self.error(
                line,
                format!("'{name}' belongs to enclosing scope '{}'", symbol.scope),
            );
            return None;
        }
        Some(symbol)
    }

    /// Whether `name` resolves to the function whose body is being checked.
    fn is_own_result(&self, symbol: &Symbol) -> bool {
        symbol.kind == SymbolKind::Function
            && self
                .callables
                .last()
                .is_some_and(|c| c.is_function && c.name == symbol.name)
    }

    fn visit_declarations(&mut self, declarations: &Declarations) {
        for declaration in &declarations.items {
            match declaration {
                Declaration::Var(decl) => {
                    for item in &decl.items {
                        self.visit_var_item(item);
                    }
                }
                Declaration::Const(decl) => {
                    for item in &decl.items {
                        self.visit_const_item(item);
                    }
                }
                Declaration::Type(decl) => {
                    for item in &decl.items {
                        self.check_bounds(&item.name, &item.ty);
                        self.declare(
                            &item.name,
                            Some(item.ty.to_type()),
                            SymbolKind::Type,
                            item.line,
                            None,
                        );
                    }
                }
                Declaration::Function(callable) | Declaration::Procedure(callable) => {
                    self.visit_callable(callable)
                }
            }
        }
    }

    fn check_bounds(&mut self, name: &str, ty: &TypeSpec) {
        if let TypeSpec::Array {
            start, end, line, ..
        } = ty
        {
            if start > end {
                self.error(
                    *line,
                    format!("array '{name}' has an empty range [{start}..{end}]"),
                );
            }
        }
    }

    fn visit_var_item(&mut self, item: &VarItem) {
        let ty = item.ty.to_type();
        for name in &item.names.names {
            self.check_bounds(name, &item.ty);
            if !self.declare(name, Some(ty), SymbolKind::Variable, item.line, None) {
                continue;
            }
            if let Some(bounds) = item.ty.bounds() {
                self.symbols.add_array_dimensions(name, bounds);
            }
        }
    }

    fn visit_const_item(&mut self, item: &ConstItem) {
        let Some(value) = self.const_value(&item.value) else {
            self.error(
                item.line,
                format!("constant '{}' must be a literal value", item.name),
            );
            return;
        };
        self.declare(
            &item.name,
            Some(value.ty()),
            SymbolKind::Constant,
            item.line,
            Some(value),
        );
    }

    fn const_value(&self, expr: &Expr) -> Option<ConstValue> {
        match expr {
            Expr::Number {
                value: Number::Integer(n),
                ..
            } => Some(ConstValue::Integer(*n)),
            Expr::Number {
                value: Number::Real(n),
                ..
            } => Some(ConstValue::Real(*n)),
            Expr::String { value, .. } => Some(ConstValue::String(value.clone())),
            Expr::Boolean { value, .. } => Some(ConstValue::Boolean(*value)),
            Expr::Unary {
                op: UnaryOp::Neg,
                operand,
                ..
            } => match self.const_value(operand)? {
                ConstValue::Integer(n) => Some(ConstValue::Integer(-n)),
                ConstValue::Real(n) => Some(ConstValue::Real(-n)),
                _ => None,
            },
            Expr::Variable { name, .. } => self
                .lookup(name)
                .filter(|s| s.kind == SymbolKind::Constant)
                .and_then(|s| s.value.clone()),
            _ => None,
        }
    }

    fn visit_callable(&mut self, callable: &Callable) {
        let kind = if callable.is_function() {
            SymbolKind::Function
        } else {
            SymbolKind::Procedure
        };
        let return_type = callable.return_type.map(Type::from);
        let added = self.declare(&callable.name, return_type, kind, callable.line, None);

        self.symbols.enter_scope(&callable.name);
        for param in &callable.params.params {
            for name in &param.names.names {
                let declared = self.declare(
                    name,
                    Some(param.ty.into()),
                    SymbolKind::Parameter,
                    param.line,
                    None,
                );
                if declared && added {
                    self.symbols.add_parameter(&callable.name, name, param.ty);
                }
            }
        }

        self.callables.push(CallableContext {
            name: callable.name.clone(),
            is_function: callable.is_function(),
            assigns_result: false,
        });
        self.visit_declarations(&callable.declarations);
        self.visit_compound(&callable.body);

        if let Some(context) = self.callables.pop() {
            if context.is_function && !context.assigns_result {
                self.warning(
                    callable.line,
                    format!("function '{}' may not return a value", callable.name),
                );
            }
        }
        self.symbols.exit_scope();
    }

    fn visit_compound(&mut self, compound: &Compound) {
        for statement in &compound.statements {
            self.visit_statement(statement);
        }
    }

    fn visit_statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Compound(compound) => self.visit_compound(compound),
            Statement::Assignment {
                target,
                value,
                line,
            } => {
                let target_ty = self.storage_type(target);
                let value_ty = self.type_of(value);
                if let (Some(target_ty), Some(value_ty)) = (target_ty, value_ty) {
                    if !assignable(target_ty, value_ty) {
                        self.error(
                            *line,
                            format!(
                                "cannot assign {value_ty} to '{}' of type {target_ty}",
                                target.name()
                            ),
                        );
                    }
                }
            }
            Statement::If {
                condition,
                then_branch,
                else_branch,
                line,
            } => {
                self.check_condition("if", condition, *line);
                self.visit_statement(then_branch);
                if let Some(else_branch) = else_branch {
                    self.visit_statement(else_branch);
                }
            }
            Statement::While {
                condition,
                body,
                line,
            } => {
                self.check_condition("while", condition, *line);
                self.visit_statement(body);
            }
            Statement::For {
                var,
                start,
                end,
                body,
                line,
                ..
            } => {
                let control = VarRef::Variable {
                    name: var.clone(),
                    line: *line,
                };
                match self.storage_type(&control) {
                    Some(ty) if !ty.is_integer() => self.error(
                        *line,
                        format!("for loop variable '{var}' must be integer, got {ty}"),
                    ),
                    _ => {}
                }
                for bound in [start, end] {
                    match self.type_of(bound) {
                        Some(ty) if !ty.is_integer() => self.error(
                            bound.line(),
                            format!("for loop bounds must be integer, got {ty}"),
                        ),
                        _ => {}
                    }
                }
                self.visit_statement(body);
            }
            Statement::Read { targets, .. } => {
                for target in targets {
                    if let Some(ty) = self.storage_type(target) {
                        if ty.is_boolean() {
                            self.error(
                                target.line(),
                                format!("cannot read into boolean '{}'", target.name()),
                            );
                        }
                    }
                }
            }
            Statement::Write { args, .. } => {
                for arg in args {
                    if let Some(Type::Array(_)) = self.type_of(arg) {
                        self.error(arg.line(), "cannot write a whole array");
                    }
                }
            }
            Statement::ProcedureCall { name, args, line } => {
                match self.lookup(name).cloned() {
                    None => self.error(*line, format!("undeclared procedure '{name}'")),
                    Some(symbol) if symbol.is_callable() => self.check_call(&symbol, args, *line),
                    Some(symbol) => {
                        self.error(*line, format!("'{name}' is a {}, not a procedure", symbol.kind))
                    }
                }
            }
        }
    }

    fn check_condition(&mut self, construct: &str, condition: &Expr, line: usize) {
        match self.type_of(condition) {
            Some(ty) if !ty.is_boolean() => self.error(
                line,
                format!("{construct} condition must be boolean, got {ty}"),
            ),
            _ => {}
        }
    }

    /// Type of the storage an assignment or `read` writes to, or `None` after
    /// reporting why the target cannot be written.
    fn storage_type(&mut self, target: &VarRef) -> Option<Type> {
        let name = target.name();
        let line = target.line();
        let symbol = self.resolve_name(name, line)?;

        match target {
            VarRef::Variable { .. } => match symbol.kind {
                SymbolKind::Variable | SymbolKind::Parameter => match symbol.ty {
                    Some(Type::Array(_)) => {
                        self.error(line, format!("cannot assign to whole array '{name}'"));
                        None
                    }
                    ty => ty,
                },
                SymbolKind::Constant => {
                    self.error(line, format!("cannot assign to constant '{name}'"));
                    None
                }
                SymbolKind::Function if self.is_own_result(&symbol) => {
                    if let Some(context) = self.callables.last_mut() {
                        context.assigns_result = true;
                    }
                    symbol.ty
                }
                SymbolKind::Function => {
                    self.error(
                        line,
                        format!("cannot assign to function '{name}' outside its body"),
                    );
                    None
                }
                kind => {
                    self.error(line, format!("cannot assign to {kind} '{name}'"));
                    None
                }
            },
            VarRef::Element { index, .. } => {
                self.check_index(index);
                match symbol.ty {
                    Some(Type::Array(elem)) if symbol.is_storage() => Some(elem.into()),
                    Some(Type::Scalar(ScalarType::String)) if symbol.is_storage() => {
                        self.error(
                            line,
                            format!("cannot assign to a character of string '{name}'"),
                        );
                        None
                    }
                    _ => {
                        self.error(line, format!("'{name}' is not an array"));
                        None
                    }
                }
            }
        }
    }

    fn check_index(&mut self, index: &Expr) {
        match self.type_of(index) {
            Some(ty) if !ty.is_integer() => {
                self.error(index.line(), format!("index must be integer, got {ty}"))
            }
            _ => {}
        }
    }

    fn check_call(&mut self, callee: &Symbol, args: &[Expr], line: usize) {
        let arg_types: Vec<_> = args.iter().map(|arg| self.type_of(arg)).collect();
        if arg_types.len() != callee.params.len() {
            self.error(
                line,
                format!(
                    "{} '{}' expects {} arguments, got {}",
                    callee.kind,
                    callee.name,
                    callee.params.len(),
                    arg_types.len()
                ),
            );
            return;
        }

        for (i, (param, arg)) in callee.param_types().zip(arg_types).enumerate() {
            if let (Some(param), Some(arg)) = (param, arg) {
                if !assignable(param, arg) {
                    self.error(
                        args[i].line(),
                        format!(
                            "argument {} of '{}' expects {param}, got {arg}",
                            i + 1,
                            callee.name
                        ),
                    );
                }
            }
        }
    }

    /// Static type of an expression. `None` means an error was already
    /// reported somewhere inside it.
    fn type_of(&mut self, expr: &Expr) -> Option<Type> {
        match expr {
            Expr::Number {
                value: Number::Integer(_),
                ..
            } => Some(Type::INTEGER),
            Expr::Number {
                value: Number::Real(_),
                ..
            } => Some(Type::REAL),
            Expr::String { .. } => Some(Type::STRING),
            Expr::Boolean { .. } => Some(Type::BOOLEAN),
            Expr::Variable { name, line } => {
                let symbol = self.resolve_name(name, *line)?;
                match symbol.kind {
                    SymbolKind::Variable | SymbolKind::Parameter | SymbolKind::Constant => {
                        symbol.ty
                    }
                    SymbolKind::Function if self.is_own_result(&symbol) => symbol.ty,
                    SymbolKind::Function => {
                        self.check_call(&symbol, &[], *line);
                        symbol.ty
                    }
                    kind => {
                        self.error(*line, format!("{kind} '{name}' used as a value"));
                        None
                    }
                }
            }
            Expr::ArrayAccess { name, index, line } => {
                self.check_index(index);
                let symbol = self.resolve_name(name, *line)?;
                match symbol.ty {
                    Some(Type::Array(elem)) if symbol.is_storage() => Some(elem.into()),
                    Some(Type::Scalar(ScalarType::String))
                        if symbol.is_storage() || symbol.kind == SymbolKind::Constant =>
                    {
                        Some(Type::INTEGER)
                    }
                    _ => {
                        self.error(*line, format!("'{name}' is not an array or string"));
                        None
                    }
                }
            }
            Expr::FunctionCall { name, args, line } => {
                let Some(symbol) = self.lookup(name).cloned() else {
                    self.error(*line, format!("undeclared function '{name}'"));
                    return None;
                };
                match symbol.kind {
                    SymbolKind::Function => {
                        self.check_call(&symbol, args, *line);
                        symbol.ty
                    }
                    SymbolKind::Procedure => {
                        self.error(*line, format!("procedure '{name}' does not return a value"));
                        None
                    }
                    kind => {
                        self.error(*line, format!("{kind} '{name}' is not a function"));
                        None
                    }
                }
            }
            Expr::Length { arg, line } => {
                match self.type_of(arg) {
                    Some(ty) if !ty.is_string() => {
                        self.error(*line, format!("length expects a string, got {ty}"))
                    }
                    _ => {}
                }
                Some(Type::INTEGER)
            }
            Expr::Binary {
                op,
                left,
                right,
                line,
            } => {
                let left_ty = self.type_of(left);
                let right_ty = self.type_of(right);
                let (left_ty, right_ty) = (left_ty?, right_ty?);
                self.binary_type(*op, (left, left_ty), (right, right_ty), *line)
            }
            Expr::Unary { op, operand, line } => {
                let ty = self.type_of(operand)?;
                match op {
                    UnaryOp::Neg if ty.is_numeric() => Some(ty),
                    UnaryOp::Not if ty.is_boolean() => Some(ty),
                    UnaryOp::Neg => {
                        self.error(*line, format!("operator '-' requires a number, got {ty}"));
                        None
                    }
                    UnaryOp::Not => {
                        self.error(*line, format!("operator 'not' requires a boolean, got {ty}"));
                        None
                    }
                }
            }
        }
    }

    fn binary_type(
        &mut self,
        op: BinaryOp,
        (left, left_ty): (&Expr, Type),
        (right, right_ty): (&Expr, Type),
        line: usize,
    ) -> Option<Type> {
        let mismatch = |this: &mut Self, expected: &str| {
            this.error(
                line,
                format!("operator '{op}' requires {expected}, got {left_ty} and {right_ty}"),
            );
            None
        };

        match op {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Divide => {
                if !left_ty.is_numeric() || !right_ty.is_numeric() {
                    return mismatch(self, "numeric operands");
                }
                if left_ty.is_real() || right_ty.is_real() {
                    Some(Type::REAL)
                } else {
                    Some(Type::INTEGER)
                }
            }
            BinaryOp::Div | BinaryOp::Mod => {
                if !left_ty.is_integer() || !right_ty.is_integer() {
                    return mismatch(self, "integer operands");
                }
                Some(Type::INTEGER)
            }
            BinaryOp::And | BinaryOp::Or => {
                if !left_ty.is_boolean() || !right_ty.is_boolean() {
                    return mismatch(self, "boolean operands");
                }
                Some(Type::BOOLEAN)
            }
            _ => {
                if !comparable((left, left_ty), (right, right_ty)) {
                    self.error(line, format!("cannot compare {left_ty} with {right_ty}"));
                    return None;
                }
                Some(Type::BOOLEAN)
            }
        }
    }
}

/// Operands of a relational operator: scalars where one side converts to
/// the other, or a character code against a one-character literal.
fn comparable((left, left_ty): (&Expr, Type), (right, right_ty): (&Expr, Type)) -> bool {
    if left_ty.element().is_some() || right_ty.element().is_some() {
        return false;
    }
    let char_code = |expr: &Expr, ty: Type, other_ty: Type| {
        expr.as_char_literal().is_some() && other_ty.is_integer() && ty.is_string()
    };
    assignable(left_ty, right_ty)
        || assignable(right_ty, left_ty)
        || char_code(left, left_ty, right_ty)
        || char_code(right, right_ty, left_ty)
}

#[cfg(test)]
mod tests {
    use rstest::*;

    use super::*;
    use crate::{lexer::scan, parser::parse};

    fn analyze(src: &str) -> Analyzer {
        let program = parse(&scan(src).tokens).unwrap();
        let mut analyzer = Analyzer::new();
        analyzer.analyze(&program);
        analyzer
    }

    fn errors(src: &str) -> Vec<String> {
        analyze(src).errors().iter().map(|e| e.to_string()).collect()
    }

    #[rstest]
    fn test_valid_program() {
        let analyzer = analyze(
            "program P;
             const n = 5; neg = -n; pi = 3.5;
             var a: array[1..5] of integer; s: string; r: real; i: integer; ok: boolean;
             function sq(x: integer): integer;
             begin sq := x * x end;
             procedure show(v: real);
             begin writeln(v) end;
             begin
               r := 1;
               r := r + i / 2;
               for i := 1 to n do a[i] := sq(i) mod 3;
               ok := (s[1] = 'a') and (length(s) > neg);
               while not ok do ok := true;
               if i <> 2 then show(i) else show(pi);
               readln(s, a[2])
             end.",
        );
        assert!(analyzer.errors().is_empty(), "{:?}", analyzer.errors());
        assert!(analyzer.warnings().is_empty(), "{:?}", analyzer.warnings());
    }

    #[rstest]
    fn test_duplicate_declaration_reports_once() {
        let analyzer = analyze("program P; var x: integer; x: string; begin end.");
        assert_eq!(
            analyzer.errors(),
            &[Diagnostic::new(
                1,
                "identifier 'x' already declared in scope 'global'"
            )]
        );
        let x = analyzer.symbols().lookup("x", false).unwrap();
        assert_eq!(x.ty, Some(Type::INTEGER));
    }

    #[rstest]
    #[case::undeclared("program P; begin x := 1 end.", "line 1: undeclared identifier 'x'")]
    #[case::narrowing(
        "program P; var i: integer; begin i := 2.5 end.",
        "line 1: cannot assign real to 'i' of type integer"
    )]
    #[case::string_to_int(
        "program P; var i: integer; begin i := 'ab' end.",
        "line 1: cannot assign string to 'i' of type integer"
    )]
    #[case::constant(
        "program P; const c = 1; begin c := 2 end.",
        "line 1: cannot assign to constant 'c'"
    )]
    #[case::condition(
        "program P; var i: integer; begin if i then i := 1 end.",
        "line 1: if condition must be boolean, got integer"
    )]
    #[case::while_condition(
        "program P; var s: string; begin while s do s := '' end.",
        "line 1: while condition must be boolean, got string"
    )]
    #[case::for_variable(
        "program P; var r: real; begin for r := 1 to 2 do end.",
        "line 1: for loop variable 'r' must be integer, got real"
    )]
    #[case::for_bounds(
        "program P; var i: integer; begin for i := 1 to 2.5 do end.",
        "line 1: for loop bounds must be integer, got real"
    )]
    #[case::arity(
        "program P; function f(a: integer): integer; begin f := a end; begin writeln(f(1, 2)) end.",
        "line 1: function 'f' expects 1 arguments, got 2"
    )]
    #[case::argument_type(
        "program P; procedure p(a: integer); begin end; begin p('x') end.",
        "line 1: argument 1 of 'p' expects integer, got string"
    )]
    #[case::div_on_reals(
        "program P; var r: real; begin r := r div 2 end.",
        "line 1: operator 'div' requires integer operands, got real and integer"
    )]
    #[case::and_on_integers(
        "program P; var b: boolean; begin b := 1 and b end.",
        "line 1: operator 'and' requires boolean operands, got integer and boolean"
    )]
    #[case::compare_string_int(
        "program P; var b: boolean; begin b := 'ab' = 1 end.",
        "line 1: cannot compare string with integer"
    )]
    #[case::length_of_int("program P; var i: integer; begin i := length(i) end.", "line 1: length expects a string, got integer")]
    #[case::procedure_value(
        "program P; var i: integer; procedure p; begin end; begin i := p() end.",
        "line 1: procedure 'p' does not return a value"
    )]
    #[case::not_array(
        "program P; var i: integer; begin i := i[1] end.",
        "line 1: 'i' is not an array or string"
    )]
    #[case::index_type(
        "program P; var a: array[1..2] of integer; begin a['x'] := 1 end.",
        "line 1: index must be integer, got string"
    )]
    #[case::foreign_function(
        "program P; function f: integer; begin f := 1 end; procedure p; begin f := 2 end; begin end.",
        "line 1: cannot assign to function 'f' outside its body"
    )]
    #[case::sibling_locals(
        "program P; procedure a; var t: integer; begin end; procedure b; begin t := 1 end; begin end.",
        "line 1: undeclared identifier 't'"
    )]
    #[case::enclosing_local(
        "program P; procedure o; var t: integer; procedure i; begin t := 1 end; begin end; begin end.",
        "line 1: 't' belongs to enclosing scope 'global.o'"
    )]
    #[case::empty_range(
        "program P; var a: array[5..1] of integer; begin end.",
        "line 1: array 'a' has an empty range [5..1]"
    )]
    #[case::non_literal_constant(
        "program P; var i: integer; const c = i; begin end.",
        "line 1: constant 'c' must be a literal value"
    )]
    fn test_errors(#[case] src: &str, #[case] expected: &str) {
        assert_eq!(errors(src), vec![expected.to_string()]);
    }

    #[rstest]
    fn test_errors_accumulate_without_cascading() {
        let errors = errors(
            "program P;\nvar i: integer;\nbegin\n  i := x + 1;\n  i := 'a' * 2;\n  y := 1\nend.",
        );
        assert_eq!(
            errors,
            vec![
                "line 4: undeclared identifier 'x'",
                "line 5: operator '*' requires numeric operands, got string and integer",
                "line 6: undeclared identifier 'y'",
            ]
        );
    }

    #[rstest]
    fn test_function_without_result_warns() {
        let analyzer =
            analyze("program P; function f: integer; begin writeln('x') end; begin end.");
        assert!(analyzer.errors().is_empty());
        assert_eq!(
            analyzer.warnings(),
            &[Diagnostic::new(1, "function 'f' may not return a value")]
        );
    }

    #[rstest]
    fn test_own_name_and_recursion() {
        let analyzer = analyze(
            "program P;
             function fact(n: integer): integer;
             begin
               if n <= 1 then fact := 1 else fact := n * fact(n - 1);
               fact := fact + 0
             end;
             begin writeln(fact(5)) end.",
        );
        assert!(analyzer.errors().is_empty(), "{:?}", analyzer.errors());
        assert!(analyzer.warnings().is_empty(), "{:?}", analyzer.warnings());
    }

    #[rstest]
    #[case::code_on_left("program P; var s: string; b: boolean; begin b := s[1] = '1' end.")]
    #[case::code_on_right("program P; var s: string; b: boolean; begin b := '1' <> s[1] end.")]
    #[case::widened("program P; var r: real; b: boolean; begin b := r < 1 end.")]
    fn test_comparisons(#[case] src: &str) {
        assert_eq!(errors(src), Vec::<String>::new());
    }

    #[rstest]
    fn test_symbols_are_scoped() {
        let analyzer = analyze(
            "program P;
             var g: integer;
             procedure p(a, b: integer);
             var t: array[0..3] of real;
             begin end;
             begin end.",
        );
        let dump = analyzer.symbols().to_string();
        assert!(dump.contains("global.P: P (program, -, scope: global, line: 1)"));
        assert!(dump.contains(
            "global.p: p (procedure, -, scope: global, line: 3), params = (a: integer, b: integer)"
        ));
        assert!(dump.contains(
            "global.p.t: t (variable, array of real, scope: global.p, line: 4), dims = [0..3]"
        ));
    }
}
