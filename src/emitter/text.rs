use std::collections::{HashMap, VecDeque};

use log::debug;

use crate::{
    parser::ast::*,
    semantic::symbols::{ConstValue, ScopeId, Symbol, SymbolKind, SymbolTable, ROOT_SCOPE},
    types::{ScalarType, Type},
};

use super::{
    code_context::CodeContext,
    data::{DataBuilder, GlobalVar},
    mnemonics::*,
    stack::{Frame, FrameVar},
};

/// Generates the whole program: global storage, the main block between
/// `start` and `stop`, then every callable.
pub fn build_code_context(
    program: &Program,
    symbols: &SymbolTable,
    emit_comments: bool,
) -> CodeContext {
    let mut text_builder = TextBuilder::new(program, symbols, emit_comments);
    text_builder.visit_program(program);
    text_builder.get_code_context()
}

/// Where a name's value lives at run time.
#[derive(Debug, Clone)]
enum Storage {
    Global(GlobalVar),
    Local(FrameVar),
}

impl Storage {
    fn ty(&self) -> &TypeSpec {
        match self {
            Storage::Global(global) => &global.ty,
            Storage::Local(local) => &local.ty,
        }
    }

    fn lower_bound(&self) -> i64 {
        match self {
            Storage::Global(global) => global.lower_bound(),
            Storage::Local(local) => local.lower_bound(),
        }
    }

    fn load(&self) -> Instruction {
        match self {
            Storage::Global(global) => PUSHG.op(global.slot),
            Storage::Local(local) => PUSHL.op(local.offset),
        }
    }

    fn store(&self) -> Instruction {
        match self {
            Storage::Global(global) => STOREG.op(global.slot),
            Storage::Local(local) => STOREL.op(local.offset),
        }
    }

    /// Address of the first word.
    fn base_address(&self) -> [Instruction; 3] {
        match self {
            Storage::Global(global) => [PUSHGP.into(), PUSHI.op(global.slot), PADD.into()],
            Storage::Local(local) => [PUSHFP.into(), PUSHI.op(local.offset), PADD.into()],
        }
    }
}

pub struct TextBuilder<'a> {
    code_context: CodeContext,
    symbols: &'a SymbolTable,
    data: DataBuilder,
    scope: ScopeId,
    frame: Option<Frame>,
    callable: Option<String>,
    callable_labels: HashMap<ScopeId, String>,
}

impl<'a> TextBuilder<'a> {
    pub fn new(program: &Program, symbols: &'a SymbolTable, emit_comments: bool) -> Self {
        let mut code_context = CodeContext::new(emit_comments);
        let callable_labels = reserve_callable_labels(program, symbols, &mut code_context);
        TextBuilder {
            code_context,
            symbols,
            data: DataBuilder::new(&program.declarations),
            scope: ROOT_SCOPE,
            frame: None,
            callable: None,
            callable_labels,
        }
    }

    pub fn get_code_context(self) -> CodeContext {
        self.code_context
    }

    fn visit_program(&mut self, program: &Program) {
        if self.data.size() > 0 {
            self.code_context.comment(format!("globals of {}", program.name));
            self.data.init_code(&mut self.code_context);
            self.code_context.blank();
        }

        self.code_context.add(START);
        self.visit_compound(&program.body);
        self.code_context.add(STOP);

        self.visit_callables(&program.declarations);
        debug!(
            "generated {} instructions, {} global slots",
            self.code_context.get_instructions().len(),
            self.data.size()
        );
    }

    /// Emits the callables declared in `declarations`, each one followed by
    /// the callables nested inside it.
    fn visit_callables(&mut self, declarations: &Declarations) {
        for declaration in &declarations.items {
            if let Declaration::Function(callable) | Declaration::Procedure(callable) = declaration
            {
                self.visit_callable(callable);
            }
        }
    }

    fn visit_callable(&mut self, callable: &Callable) {
        let Some((scope, label)) = self
            .symbols
            .child_scope(self.scope, &callable.name)
            .and_then(|scope| Some((scope, self.callable_labels.get(&scope)?.clone())))
        else {
            self.code_context
                .error(format!("no scope recorded for '{}'", callable.name));
            return;
        };
        let kind = if callable.is_function() {
            "function"
        } else {
            "procedure"
        };

        self.code_context
            .blank()
            .comment(format!("{kind} {}", callable.name))
            .label(&label);

        let frame = Frame::new(callable);
        frame.reserve_code(&mut self.code_context);

        let outer_scope = std::mem::replace(&mut self.scope, scope);
        let outer_frame = self.frame.replace(frame);
        let outer_callable = self.callable.replace(callable.name.clone());

        self.visit_compound(&callable.body);
        self.code_context.add(PUSHL.op(0_i64)).add(RETURN);

        self.visit_callables(&callable.declarations);

        self.scope = outer_scope;
        self.frame = outer_frame;
        self.callable = outer_callable;
    }

    fn visit_compound(&mut self, compound: &Compound) {
        for statement in &compound.statements {
            self.visit_statement(statement);
        }
    }

    fn visit_statement(&mut self, statement: &Statement) {
        if !matches!(statement, Statement::Compound(_)) {
            self.code_context
                .comment(format!("line {}: {}", statement.line(), statement.kind()));
        }

        match statement {
            Statement::Compound(compound) => self.visit_compound(compound),
            Statement::Assignment { target, value, .. } => self.visit_assignment(target, value),
            Statement::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                let else_label = self.code_context.new_label("ELSE");
                let end_label = self.code_context.new_label("ENDIF");

                self.visit_expression(condition);
                if !condition.is_relational() {
                    self.code_context.add(PUSHI.op(0_i64)).add(EQUAL).add(NOT);
                }
                self.code_context.add(JZ.label(&else_label));
                self.visit_statement(then_branch);
                self.code_context
                    .add(JUMP.label(&end_label))
                    .label(&else_label);
                if let Some(else_branch) = else_branch {
                    self.visit_statement(else_branch);
                }
                self.code_context.label(&end_label);
            }
            Statement::While {
                condition, body, ..
            } => {
                let start_label = self.code_context.new_label("WHILE");
                let end_label = self.code_context.new_label("ENDWHILE");

                self.code_context.label(&start_label);
                self.visit_expression(condition);
                self.code_context.add(JZ.label(&end_label));
                self.visit_statement(body);
                self.code_context
                    .add(JUMP.label(&start_label))
                    .label(&end_label);
            }
            Statement::For {
                var,
                start,
                end,
                direction,
                body,
                ..
            } => self.visit_for(var, start, end, *direction, body),
            Statement::Read {
                newline, targets, ..
            } => {
                if targets.is_empty() && *newline {
                    self.code_context.add(READ).add(POP.op(1_i64));
                }
                for target in targets {
                    self.visit_read(target);
                }
            }
            Statement::Write { newline, args, .. } => {
                for arg in args {
                    self.visit_write(arg);
                }
                if *newline {
                    self.code_context.add(WRITELN);
                }
            }
            Statement::ProcedureCall { name, args, .. } => {
                self.visit_call(name, args);
            }
        }
    }

    fn visit_assignment(&mut self, target: &VarRef, value: &Expr) {
        match target {
            VarRef::Variable { name, .. } => {
                let Some(storage) = self.storage(name) else {
                    self.visit_expression(value);
                    self.unresolved_store(name);
                    return;
                };
                let expected = storage.ty().to_type();
                self.visit_value(value, Some(expected));
                self.code_context.add(storage.store());
            }
            VarRef::Element { name, index, .. } => {
                let Some(elem) = self.visit_element_address(name, index) else {
                    self.visit_expression(value);
                    self.code_context.add(POP.op(1_i64));
                    return;
                };
                self.visit_value(value, Some(elem.into()));
                self.code_context.add(STORE.op(0_i64));
            }
        }
    }

    /// The control variable is resolved once and reused at every reference.
    fn visit_for(
        &mut self,
        var: &str,
        start: &Expr,
        end: &Expr,
        direction: Direction,
        body: &Statement,
    ) {
        let Some(control) = self.storage(var) else {
            self.code_context
                .error(format!("unresolved for loop variable '{var}'"));
            return;
        };
        let start_label = self.code_context.new_label("FOR");
        let end_label = self.code_context.new_label("ENDFOR");
        let (test, step) = match direction {
            Direction::To => (INFEQ, ADD),
            Direction::Downto => (SUPEQ, SUB),
        };

        self.visit_expression(start);
        self.code_context.add(control.store()).label(&start_label);
        self.code_context.add(control.load());
        self.visit_expression(end);
        self.code_context.add(test).add(JZ.label(&end_label));

        self.visit_statement(body);

        self.code_context
            .add(control.load())
            .add(PUSHI.op(1_i64))
            .add(step)
            .add(control.store())
            .add(JUMP.label(&start_label))
            .label(&end_label);
    }

    fn visit_read(&mut self, target: &VarRef) {
        match target {
            VarRef::Variable { name, .. } => {
                let Some(storage) = self.storage(name) else {
                    self.code_context.add(READ);
                    self.unresolved_store(name);
                    return;
                };
                self.code_context.add(READ);
                self.convert_input(storage.ty().to_type());
                self.code_context.add(storage.store());
            }
            VarRef::Element { name, index, .. } => {
                let Some(elem) = self.visit_element_address(name, index) else {
                    self.code_context.add(READ).add(POP.op(1_i64));
                    return;
                };
                self.code_context.add(READ);
                self.convert_input(elem.into());
                self.code_context.add(STORE.op(0_i64));
            }
        }
    }

    /// `read` leaves a string on the stack.
    fn convert_input(&mut self, ty: Type) {
        match ty {
            Type::Scalar(ScalarType::String) => {}
            Type::Scalar(ScalarType::Real) => {
                self.code_context.add(ATOF);
            }
            _ => {
                self.code_context.add(ATOI);
            }
        }
    }

    fn visit_write(&mut self, arg: &Expr) {
        if let Expr::String { value, .. } = arg {
            self.code_context.add(PUSHS.string(value)).add(WRITES);
            return;
        }
        self.visit_expression(arg);
        let write = match self.type_of(arg) {
            Some(Type::Scalar(ScalarType::String)) => WRITES,
            Some(Type::Scalar(ScalarType::Real)) => WRITEF,
            _ => WRITEI,
        };
        self.code_context.add(write);
    }

    /// Pushes the arguments left to right and calls `name`. Returns `false`
    /// when `name` is not a callable.
    fn visit_call(&mut self, name: &str, args: &[Expr]) -> bool {
        let Some((callee, label)) = self
            .lookup(name)
            .filter(|s| s.is_callable())
            .zip(self.callable_label(name))
        else {
            self.code_context
                .error(format!("unresolved callable '{name}'"));
            return false;
        };
        let mut params = callee.param_types();
        for arg in args {
            self.visit_value(arg, params.next().flatten());
        }
        self.code_context.add(PUSHA.label(&label)).add(CALL);
        true
    }

    /// Leaves the address of `name[index]` on the stack and returns the
    /// element type.
    fn visit_element_address(&mut self, name: &str, index: &Expr) -> Option<ScalarType> {
        let storage = match self.storage(name) {
            Some(storage @ Storage::Global(GlobalVar { ty: TypeSpec::Array { .. }, .. }))
            | Some(storage @ Storage::Local(FrameVar { ty: TypeSpec::Array { .. }, .. })) => storage,
            _ => {
                self.code_context
                    .error(format!("'{name}' is not an addressable array"));
                return None;
            }
        };

        self.code_context.add_slice(&storage.base_address());
        self.visit_expression(index);
        let lower = storage.lower_bound();
        if lower != 0 {
            self.code_context.add(PUSHI.op(lower)).add(SUB);
        }
        self.code_context.add(PADD);

        storage.ty().to_type().element()
    }

    /// Pushes `expr` converted to `expected`: integers widen to real and a
    /// one-character literal stays a string when a string is expected.
    fn visit_value(&mut self, expr: &Expr, expected: Option<Type>) {
        if let (Expr::String { value, .. }, Some(Type::Scalar(ScalarType::String))) =
            (expr, expected)
        {
            self.code_context.add(PUSHS.string(value));
            return;
        }
        self.visit_expression(expr);
        let widen = expected.is_some_and(|ty| ty.is_real())
            && self.type_of(expr).is_some_and(|ty| ty.is_integer());
        if widen {
            self.code_context.add(ITOF);
        }
    }

    fn visit_expression(&mut self, expr: &Expr) {
        match expr {
            Expr::Number {
                value: Number::Integer(n),
                ..
            } => {
                self.code_context.add(PUSHI.op(*n));
            }
            Expr::Number {
                value: Number::Real(n),
                ..
            } => {
                self.code_context.add(PUSHF.op(*n));
            }
            Expr::String { value, .. } => match expr.as_char_literal() {
                Some(c) => {
                    self.code_context.add(PUSHI.op(i64::from(u32::from(c))));
                }
                None => {
                    self.code_context.add(PUSHS.string(value));
                }
            },
            Expr::Boolean { value, .. } => {
                self.code_context.add(PUSHI.op(i64::from(*value)));
            }
            Expr::Variable { name, .. } => self.visit_variable(name),
            Expr::ArrayAccess { name, index, .. } => {
                let string = self
                    .lookup(name)
                    .is_some_and(|s| s.ty == Some(Type::STRING));
                if string {
                    self.visit_variable(name);
                    self.visit_expression(index);
                    self.code_context.add(PUSHI.op(1_i64)).add(SUB).add(CHARAT);
                } else if self.visit_element_address(name, index).is_some() {
                    self.code_context.add(LOAD.op(0_i64));
                } else {
                    self.code_context.add(PUSHI.op(0_i64));
                }
            }
            Expr::FunctionCall { name, args, .. } => {
                if !self.visit_call(name, args) {
                    self.code_context.add(PUSHI.op(0_i64));
                }
            }
            Expr::Length { arg, .. } => {
                self.visit_value(arg, Some(Type::STRING));
                self.code_context.add(STRLEN);
            }
            Expr::Binary {
                op, left, right, ..
            } => {
                let left_ty = self.type_of(left);
                let right_ty = self.type_of(right);
                let real = (op.is_arithmetic() || op.is_relational())
                    && [left_ty, right_ty].contains(&Some(Type::REAL));
                let hint = |other: Option<Type>| {
                    if real {
                        Some(Type::REAL)
                    } else if op.is_relational() && other == Some(Type::STRING) {
                        Some(Type::STRING)
                    } else {
                        None
                    }
                };
                self.visit_value(left, hint(right_ty));
                self.visit_value(right, hint(left_ty));
                self.visit_binary_op(*op, real);
            }
            Expr::Unary { op, operand, .. } => {
                self.visit_expression(operand);
                match op {
                    UnaryOp::Neg if self.type_of(operand) == Some(Type::REAL) => {
                        self.code_context.add(PUSHF.op(-1.0)).add(FMUL);
                    }
                    UnaryOp::Neg => {
                        self.code_context.add(PUSHI.op(-1_i64)).add(MUL);
                    }
                    UnaryOp::Not => {
                        self.code_context.add(NOT);
                    }
                }
            }
        }
    }

    fn visit_variable(&mut self, name: &str) {
        let Some(symbol) = self.lookup(name) else {
            self.unresolved_value(name);
            return;
        };
        match symbol.kind {
            SymbolKind::Constant => match &symbol.value {
                Some(value) => self.push_constant(value),
                None => self.unresolved_value(name),
            },
            SymbolKind::Function if !self.is_own_result(symbol) => {
                self.visit_call(name, &[]);
            }
            _ => match self.storage(name) {
                Some(storage) => {
                    self.code_context.add(storage.load());
                }
                None => self.unresolved_value(name),
            },
        }
    }

    fn visit_binary_op(&mut self, op: BinaryOp, real: bool) {
        let opcodes: &[Opcode] = match (op, real) {
            (BinaryOp::Add, false) => &[ADD],
            (BinaryOp::Add, true) => &[FADD],
            (BinaryOp::Sub, false) => &[SUB],
            (BinaryOp::Sub, true) => &[FSUB],
            (BinaryOp::Mul, false) => &[MUL],
            (BinaryOp::Mul, true) => &[FMUL],
            (BinaryOp::Divide, false) | (BinaryOp::Div, _) => &[DIV],
            (BinaryOp::Divide, true) => &[FDIV],
            (BinaryOp::Mod, _) => &[MOD],
            (BinaryOp::Equal, _) => &[EQUAL],
            (BinaryOp::NotEqual, _) => &[EQUAL, NOT],
            (BinaryOp::Less, false) => &[INF],
            (BinaryOp::Less, true) => &[FINF],
            (BinaryOp::LessEqual, false) => &[INFEQ],
            (BinaryOp::LessEqual, true) => &[FINFEQ],
            (BinaryOp::Greater, false) => &[SUP],
            (BinaryOp::Greater, true) => &[FSUP],
            (BinaryOp::GreaterEqual, false) => &[SUPEQ],
            (BinaryOp::GreaterEqual, true) => &[FSUPEQ],
            (BinaryOp::And, _) => &[AND],
            (BinaryOp::Or, _) => &[OR],
        };
        for opcode in opcodes {
            self.code_context.add(*opcode);
        }
    }

    fn push_constant(&mut self, value: &ConstValue) {
        let instruction = match value {
            ConstValue::Integer(n) => PUSHI.op(*n),
            ConstValue::Real(n) => PUSHF.op(*n),
            ConstValue::Boolean(b) => PUSHI.op(i64::from(*b)),
            ConstValue::String(s) => PUSHS.string(s),
        };
        self.code_context.add(instruction);
    }

    fn unresolved_value(&mut self, name: &str) {
        self.code_context
            .error(format!("unresolved name '{name}'"))
            .add(PUSHI.op(0_i64));
    }

    fn unresolved_store(&mut self, name: &str) {
        self.code_context
            .error(format!("unresolved name '{name}'"))
            .add(POP.op(1_i64));
    }

    fn lookup(&self, name: &str) -> Option<&'a Symbol> {
        self.symbols.lookup_from(self.scope, name)
    }

    /// Label of the callable `name` resolves to from the current scope.
    fn callable_label(&self, name: &str) -> Option<String> {
        let declaring = self.symbols.declaring_scope(self.scope, name)?;
        let scope = self.symbols.child_scope(declaring, name)?;
        self.callable_labels.get(&scope).cloned()
    }

    fn is_own_result(&self, symbol: &Symbol) -> bool {
        symbol.kind == SymbolKind::Function && self.callable.as_deref() == Some(&symbol.name)
    }

    /// Global slot, frame offset or result slot of `name`. Storage of an
    /// enclosing callable is not reachable from a nested one.
    fn storage(&self, name: &str) -> Option<Storage> {
        let symbol = self.lookup(name)?;
        match symbol.kind {
            SymbolKind::Function if self.is_own_result(symbol) => {
                let Some(Type::Scalar(ty)) = symbol.ty else {
                    return None;
                };
                Some(Storage::Local(FrameVar {
                    offset: 0,
                    ty: TypeSpec::Simple {
                        ty,
                        line: symbol.line,
                    },
                }))
            }
            SymbolKind::Variable | SymbolKind::Parameter => {
                let scope = self.symbols.declaring_scope(self.scope, name)?;
                if scope == ROOT_SCOPE {
                    self.data.get(name).cloned().map(Storage::Global)
                } else if scope == self.scope {
                    self.frame.as_ref()?.get(name).cloned().map(Storage::Local)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Static type used to pick instructions. Unlike the analyzer this never
    /// reports anything.
    fn type_of(&self, expr: &Expr) -> Option<Type> {
        match expr {
            Expr::Number {
                value: Number::Integer(_),
                ..
            }
            | Expr::Length { .. } => Some(Type::INTEGER),
            Expr::Number {
                value: Number::Real(_),
                ..
            } => Some(Type::REAL),
            Expr::String { .. } => Some(Type::STRING),
            Expr::Boolean { .. } => Some(Type::BOOLEAN),
            Expr::Variable { name, .. } | Expr::FunctionCall { name, .. } => {
                self.lookup(name)?.ty
            }
            Expr::ArrayAccess { name, .. } => match self.lookup(name)?.ty? {
                Type::Array(elem) => Some(elem.into()),
                Type::Scalar(ScalarType::String) => Some(Type::INTEGER),
                Type::Scalar(_) => None,
            },
            Expr::Binary {
                op, left, right, ..
            } => {
                if op.is_relational() || op.is_logical() {
                    return Some(Type::BOOLEAN);
                }
                if matches!(op, BinaryOp::Div | BinaryOp::Mod) {
                    return Some(Type::INTEGER);
                }
                let real = [self.type_of(left), self.type_of(right)].contains(&Some(Type::REAL));
                Some(if real { Type::REAL } else { Type::INTEGER })
            }
            Expr::Unary {
                op: UnaryOp::Not, ..
            } => Some(Type::BOOLEAN),
            Expr::Unary {
                op: UnaryOp::Neg,
                operand,
                ..
            } => self.type_of(operand),
        }
    }
}

/// Claims a label for every callable before any code is generated, level by
/// level so top-level callables keep their own names. Nested callables are
/// labelled `parent_name`, and any label already taken gets a numeric suffix.
fn reserve_callable_labels(
    program: &Program,
    symbols: &SymbolTable,
    code_context: &mut CodeContext,
) -> HashMap<ScopeId, String> {
    let mut labels = HashMap::new();
    let mut queue = VecDeque::from([(ROOT_SCOPE, None, &program.declarations)]);
    while let Some((scope, parent_label, declarations)) = queue.pop_front() {
        for declaration in &declarations.items {
            let (Declaration::Function(callable) | Declaration::Procedure(callable)) = declaration
            else {
                continue;
            };
            let Some(child) = symbols.child_scope(scope, &callable.name) else {
                continue;
            };
            let label = match &parent_label {
                Some(parent) => code_context.reserve_label(&format!("{parent}_{}", callable.name)),
                None => code_context.reserve_label(&callable.name),
            };
            labels.insert(child, label.clone());
            queue.push_back((child, Some(label), &callable.declarations));
        }
    }
    labels
}

#[cfg(test)]
mod tests {
    use rstest::*;

    use super::*;
    use crate::{lexer::scan, parser::parse, semantic::Analyzer};

    fn compile(src: &str) -> CodeContext {
        let program = parse(&scan(src).tokens).unwrap();
        let mut analyzer = Analyzer::new();
        assert!(analyzer.analyze(&program), "{:?}", analyzer.errors());
        build_code_context(&program, analyzer.symbols(), true)
    }

    /// Runtime lines only, comments and blanks dropped.
    fn code(src: &str) -> Vec<String> {
        compile(src)
            .get_instructions()
            .iter()
            .filter(|i| !i.is_cosmetic())
            .map(|i| i.to_string())
            .collect()
    }

    fn contains(code: &[String], run: &[&str]) -> bool {
        code.windows(run.len()).any(|w| w == run)
    }

    fn main_block(src: &str) -> Vec<String> {
        let code = code(src);
        let start = code.iter().position(|l| l == "start").unwrap();
        let stop = code.iter().position(|l| l == "stop").unwrap();
        code[start + 1..stop].to_vec()
    }

    #[rstest]
    fn test_empty_program() {
        assert_eq!(code("program P; begin end."), vec!["start", "stop"]);
    }

    #[rstest]
    fn test_globals_precede_start() {
        let code = code("program P; var a, b: integer; r: real; v: array[3..7] of boolean; begin end.");
        let start = code.iter().position(|l| l == "start").unwrap();
        assert_eq!(start, 8);
        assert_eq!(&code[..3], &["pushi 0", "pushi 0", "pushf 0.0"]);
        assert!(code[3..8].iter().all(|l| l == "pushi 0"));
    }

    #[rstest]
    fn test_writeln_literal() {
        assert_eq!(
            code("program P; begin writeln('Hi'); end."),
            vec!["start", "pushs \"Hi\"", "writes", "writeln", "stop"]
        );
    }

    #[rstest]
    fn test_if_else() {
        assert_eq!(
            main_block(
                "program P; var x:integer; begin x:=1; if x=1 then writeln('A') else writeln('B'); end."
            ),
            vec![
                "pushi 1",
                "storeg 0",
                "pushg 0",
                "pushi 1",
                "equal",
                "jz ELSE1",
                "pushs \"A\"",
                "writes",
                "writeln",
                "jump ENDIF2",
                "ELSE1:",
                "pushs \"B\"",
                "writes",
                "writeln",
                "ENDIF2:",
            ]
        );
    }

    #[rstest]
    fn test_non_relational_condition_is_normalised() {
        assert_eq!(
            main_block("program P; var b: boolean; begin if b then b := false end."),
            vec![
                "pushg 0",
                "pushi 0",
                "equal",
                "not",
                "jz ELSE1",
                "pushi 0",
                "storeg 0",
                "jump ENDIF2",
                "ELSE1:",
                "ENDIF2:",
            ]
        );
    }

    #[rstest]
    fn test_labels_are_unique() {
        let code = code(
            "program P; var i: integer;
             begin
               while i < 3 do i := i + 1;
               if i = 3 then i := 0;
               for i := 3 downto 1 do
             end.",
        );
        let labels: Vec<_> = code.iter().filter(|l| l.ends_with(':')).collect();
        assert_eq!(
            labels,
            vec!["WHILE1:", "ENDWHILE2:", "ELSE3:", "ENDIF4:", "FOR5:", "ENDFOR6:"]
        );
    }

    #[rstest]
    #[case::to(
        Direction::To,
        &["pushi 1", "storeg 0", "FOR1:", "pushg 0", "pushi 5", "infeq", "jz ENDFOR2",
          "pushg 0", "writei", "writeln",
          "pushg 0", "pushi 1", "add", "storeg 0", "jump FOR1", "ENDFOR2:"]
    )]
    #[case::downto(
        Direction::Downto,
        &["pushi 1", "storeg 0", "FOR1:", "pushg 0", "pushi 5", "supeq", "jz ENDFOR2",
          "pushg 0", "writei", "writeln",
          "pushg 0", "pushi 1", "sub", "storeg 0", "jump FOR1", "ENDFOR2:"]
    )]
    fn test_for(#[case] direction: Direction, #[case] expected: &[&str]) {
        let src = format!("program P; var i: integer; begin for i := 1 {direction} 5 do writeln(i) end.");
        assert_eq!(main_block(&src), expected);
    }

    #[rstest]
    fn test_function_call_and_result_slot() {
        let code = code(
            "program P; var x: integer;
             function f(n: integer): integer;
             begin f := n * 2 end;
             begin x := f(3) end.",
        );
        assert_eq!(
            code,
            vec![
                "pushi 0", "start", "pushi 3", "pusha f", "call", "storeg 0", "stop", "f:",
                "pushi 0", "pushl -1", "pushi 2", "mul", "storel 0", "pushl 0", "return",
            ]
        );
    }

    #[rstest]
    fn test_own_name_reads_result_slot() {
        let code = code(
            "program P;
             function fact(n: integer): integer;
             begin
               fact := 1;
               if n > 1 then fact := n * fact(n - 1);
               fact := fact + 0
             end;
             begin writeln(fact(4)) end.",
        );
        let body = code.iter().position(|l| l == "fact:").unwrap();
        let tail = &code[code.len() - 6..];
        assert_eq!(tail, &["pushl 0", "pushi 0", "add", "storel 0", "pushl 0", "return"]);
        assert!(code[body..]
            .windows(5)
            .any(|w| w == ["pushl -1", "pushi 1", "sub", "pusha fact", "call"]));
    }

    #[rstest]
    fn test_callables_follow_stop_in_order() {
        let code = code(
            "program P;
             procedure outer;
               var t: integer;
               procedure inner; begin writeln('in') end;
             begin inner end;
             procedure last; begin end;
             begin outer end.",
        );
        let labels: Vec<_> = code
            .iter()
            .skip_while(|l| *l != "stop")
            .filter(|l| l.ends_with(':'))
            .collect();
        assert_eq!(labels, vec!["outer:", "outer_inner:", "last:"]);
        assert!(code.contains(&"pusha outer_inner".to_string()));
    }

    fn defined_labels(code: &[String]) -> Vec<&String> {
        code.iter().filter(|l| l.ends_with(':')).collect()
    }

    fn assert_labels_defined_once(code: &[String]) {
        let labels = defined_labels(code);
        let mut unique = labels.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(labels.len(), unique.len(), "{labels:?}");
        for target in code.iter().filter_map(|l| {
            l.strip_prefix("jz ")
                .or_else(|| l.strip_prefix("jump "))
                .or_else(|| l.strip_prefix("pusha "))
        }) {
            assert!(labels.contains(&&format!("{target}:")), "undefined label {target}");
        }
    }

    #[rstest]
    fn test_same_named_nested_callables() {
        let code = code(
            "program P;
             procedure a;
               procedure h; begin writeln('a') end;
             begin h end;
             procedure b;
               procedure h; begin writeln('b') end;
             begin h end;
             begin a; b end.",
        );
        assert_labels_defined_once(&code);
        assert_eq!(defined_labels(&code), vec!["a:", "a_h:", "b:", "b_h:"]);

        let b = code.iter().position(|l| l == "b:").unwrap();
        assert_eq!(&code[b..b + 4], &["b:", "pushi 0", "pusha b_h", "call"]);
    }

    #[rstest]
    fn test_nested_label_does_not_take_top_level_name() {
        let code = code(
            "program P;
             procedure a;
               procedure h; begin end;
             begin h end;
             procedure a_h; begin end;
             begin a; a_h end.",
        );
        assert_labels_defined_once(&code);
        assert_eq!(defined_labels(&code), vec!["a:", "a_h_2:", "a_h:"]);
        assert!(contains(&code, &["pusha a_h", "call", "stop"]));
    }

    #[rstest]
    fn test_callable_named_like_generated_label() {
        let code = code(
            "program P; var x: integer;
             procedure ELSE1; begin x := 3 end;
             begin x := 1; if x = 1 then ELSE1 else x := 2 end.",
        );
        assert_labels_defined_once(&code);
        assert!(contains(&code, &["jz ELSE2", "pusha ELSE1", "call", "jump ENDIF3", "ELSE2:"]));
    }

    #[rstest]
    fn test_global_array_element() {
        assert_eq!(
            main_block("program P; var a: array[3..7] of integer; i: integer; begin a[i] := a[4] end."),
            vec![
                "pushgp", "pushi 0", "padd", "pushg 5", "pushi 3", "sub", "padd",
                "pushgp", "pushi 0", "padd", "pushi 4", "pushi 3", "sub", "padd", "load 0",
                "store 0",
            ]
        );
    }

    #[rstest]
    fn test_zero_based_array_skips_adjustment() {
        assert_eq!(
            main_block("program P; var a: array[0..2] of integer; begin a[1] := 7 end."),
            vec!["pushgp", "pushi 0", "padd", "pushi 1", "padd", "pushi 7", "store 0"]
        );
    }

    #[rstest]
    fn test_local_array_element() {
        let code = code(
            "program P;
             procedure p; var n: integer; v: array[1..3] of integer;
             begin v[n] := 1 end;
             begin p end.",
        );
        let body = code.iter().position(|l| l == "p:").unwrap();
        assert_eq!(
            &code[body + 1..],
            &[
                "pushi 0", "pushi 0", "pushi 0", "pushi 0", "pushi 0",
                "pushfp", "pushi 2", "padd", "pushl 1", "pushi 1", "sub", "padd", "pushi 1",
                "store 0", "pushl 0", "return",
            ]
        );
    }

    #[rstest]
    fn test_string_character_comparison() {
        assert_eq!(
            main_block("program P; var s: string; i: integer; b: boolean; begin b := s[i] <> 'a' end."),
            vec![
                "pushg 0", "pushg 1", "pushi 1", "sub", "charat", "pushi 97", "equal", "not",
                "storeg 2",
            ]
        );
    }

    #[rstest]
    #[case::string_target("program P; var s: string; begin s := 'a' end.", &["pushs \"a\"", "storeg 0"])]
    #[case::string_compare(
        "program P; var s: string; b: boolean; begin b := s = 'a' end.",
        &["pushg 0", "pushs \"a\"", "equal", "storeg 1"]
    )]
    #[case::length("program P; var i: integer; begin i := length('x') end.", &["pushs \"x\"", "strlen", "storeg 0"])]
    fn test_single_character_literals(#[case] src: &str, #[case] expected: &[&str]) {
        assert_eq!(main_block(src), expected);
    }

    #[rstest]
    #[case::widened_operand(
        "program P; var r: real; i: integer; begin r := i + 2.5 end.",
        &["pushg 1", "itof", "pushf 2.5", "fadd", "storeg 0"]
    )]
    #[case::widened_assignment("program P; var r: real; begin r := 2 end.", &["pushi 2", "itof", "storeg 0"])]
    #[case::real_comparison(
        "program P; var r: real; b: boolean; begin b := r < 1 end.",
        &["pushg 0", "pushi 1", "itof", "finf", "storeg 1"]
    )]
    #[case::real_negation("program P; var r: real; begin r := -r end.", &["pushg 0", "pushf -1.0", "fmul", "storeg 0"])]
    #[case::integer_negation("program P; var i: integer; begin i := -i end.", &["pushg 0", "pushi -1", "mul", "storeg 0"])]
    #[case::integer_division("program P; var i: integer; begin i := 7 / 2 end.", &["pushi 7", "pushi 2", "div", "storeg 0"])]
    fn test_arithmetic(#[case] src: &str, #[case] expected: &[&str]) {
        assert_eq!(main_block(src), expected);
    }

    #[rstest]
    fn test_widened_argument() {
        assert_eq!(
            main_block("program P; procedure p(r: real); begin end; begin p(1) end."),
            vec!["pushi 1", "itof", "pusha p", "call"]
        );
    }

    #[rstest]
    fn test_constants_are_inlined() {
        assert_eq!(
            main_block(
                "program P; const n = 3; pi = 3.5; t = true; greeting = 'hello'; m = -n;
                 var i: integer; r: real; b: boolean;
                 begin i := n + m; r := pi; b := t; writeln(greeting) end."
            ),
            vec![
                "pushi 3", "pushi -3", "add", "storeg 0", "pushf 3.5", "storeg 1", "pushi 1",
                "storeg 2", "pushs \"hello\"", "writes", "writeln",
            ]
        );
    }

    #[rstest]
    fn test_read() {
        assert_eq!(
            main_block(
                "program P; var i: integer; r: real; s: string; a: array[1..2] of real;
                 begin readln(i, r, s); read(a[1]); readln end."
            ),
            vec![
                "read", "atoi", "storeg 0", "read", "atof", "storeg 1", "read", "storeg 2",
                "pushgp", "pushi 3", "padd", "pushi 1", "pushi 1", "sub", "padd", "read", "atof",
                "store 0", "read", "pop 1",
            ]
        );
    }

    #[rstest]
    fn test_write_selects_instruction() {
        assert_eq!(
            main_block(
                "program P; var i: integer; r: real; s: string; b: boolean;
                 begin write(i, r, s, b, i * r, 'x') end."
            ),
            vec![
                "pushg 0", "writei", "pushg 1", "writef", "pushg 2", "writes", "pushg 3",
                "writei", "pushg 0", "itof", "pushg 1", "fmul", "writef", "pushs \"x\"", "writes",
            ]
        );
    }

    #[rstest]
    fn test_bare_function_name_calls() {
        assert_eq!(
            main_block(
                "program P; var i: integer;
                 function seven: integer; begin seven := 7 end;
                 begin i := seven end."
            ),
            vec!["pusha seven", "call", "storeg 0"]
        );
    }

    #[rstest]
    fn test_unresolved_names_fall_back() {
        let program = parse(&scan("program P; begin x := y end.").tokens).unwrap();
        let symbols = SymbolTable::new();
        let (instructions, errors) = build_code_context(&program, &symbols, false).into_parts();
        let lines: Vec<_> = instructions.iter().map(|i| i.to_string()).collect();
        assert_eq!(
            lines,
            vec![
                "start",
                "// ERROR: unresolved name 'y'",
                "pushi 0",
                "// ERROR: unresolved name 'x'",
                "pop 1",
                "stop",
            ]
        );
        assert_eq!(errors.len(), 2);
    }

    #[rstest]
    fn test_comments_do_not_change_code() {
        let src = "program P; var i: integer; begin for i := 1 to 2 do writeln(i) end.";
        let program = parse(&scan(src).tokens).unwrap();
        let mut analyzer = Analyzer::new();
        analyzer.analyze(&program);
        let with = build_code_context(&program, analyzer.symbols(), true);
        let without = build_code_context(&program, analyzer.symbols(), false);
        let runtime: Vec<_> = with
            .get_instructions()
            .iter()
            .filter(|i| !i.is_cosmetic())
            .cloned()
            .collect();
        assert_eq!(runtime, without.get_instructions());
        assert!(with.get_instructions().len() > without.get_instructions().len());
    }

    #[rstest]
    fn test_every_instruction_is_well_formed() {
        let context = compile(
            "program P; const c = 2;
             var a: array[1..3] of real; s: string;
             function g(x: real): real; var k: integer; begin g := x * c; k := 1 end;
             begin readln(s); a[1] := g(length(s)); writeln(a[1], s[1]) end.",
        );
        assert!(context.get_errors().is_empty());
        assert!(context.get_instructions().iter().all(Instruction::is_well_formed));
    }
}
