use std::{
    collections::{btree_map::Entry, BTreeMap},
    fmt::Display,
};

use crate::types::{ScalarType, Type};

pub type ScopeId = usize;

pub const ROOT_SCOPE: ScopeId = 0;
pub const ROOT_SCOPE_NAME: &str = "global";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Constant,
    Function,
    Procedure,
    Parameter,
    Program,
    Type,
}

impl Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SymbolKind::Variable => "variable",
            SymbolKind::Constant => "constant",
            SymbolKind::Function => "function",
            SymbolKind::Procedure => "procedure",
            SymbolKind::Parameter => "parameter",
            SymbolKind::Program => "program",
            SymbolKind::Type => "type",
        };
        f.write_str(s)
    }
}

/// Compile-time value of a declared constant.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Integer(i64),
    Real(f64),
    Boolean(bool),
    String(String),
}

impl ConstValue {
    pub fn ty(&self) -> Type {
        match self {
            ConstValue::Integer(_) => Type::INTEGER,
            ConstValue::Real(_) => Type::REAL,
            ConstValue::Boolean(_) => Type::BOOLEAN,
            ConstValue::String(_) => Type::STRING,
        }
    }
}

impl Display for ConstValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstValue::Integer(n) => write!(f, "{n}"),
            ConstValue::Real(n) => write!(f, "{n:?}"),
            ConstValue::Boolean(b) => write!(f, "{b}"),
            ConstValue::String(s) => write!(f, "'{s}'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    /// Declared type. For functions this is the return type, procedures and
    /// the program have none.
    pub ty: Option<Type>,
    pub kind: SymbolKind,
    pub scope: String,
    pub line: usize,
    pub value: Option<ConstValue>,
    pub params: Vec<Symbol>,
    pub bounds: Option<(i64, i64)>,
}

impl Symbol {
    pub fn new(name: &str, ty: Option<Type>, kind: SymbolKind, scope: &str, line: usize) -> Self {
        Self {
            name: name.to_string(),
            ty,
            kind,
            scope: scope.to_string(),
            line,
            value: None,
            params: vec![],
            bounds: None,
        }
    }

    pub fn key(&self) -> String {
        format!("{}.{}", self.scope, self.name)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.kind, SymbolKind::Function | SymbolKind::Procedure)
    }

    /// Variables and parameters; the things that have storage.
    pub fn is_storage(&self) -> bool {
        matches!(self.kind, SymbolKind::Variable | SymbolKind::Parameter)
    }

    pub fn param_types(&self) -> impl Iterator<Item = Option<Type>> + '_ {
        self.params.iter().map(|p| p.ty)
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ty = self
            .ty
            .map(|ty| ty.to_string())
            .unwrap_or_else(|| "-".to_string());
        write!(
            f,
            "{} ({}, {ty}, scope: {}, line: {})",
            self.name, self.kind, self.scope, self.line
        )?;
        if let Some(value) = &self.value {
            write!(f, ", value = {value}")?;
        }
        if let Some((start, end)) = self.bounds {
            write!(f, ", dims = [{start}..{end}]")?;
        }
        if self.is_callable() {
            let params = self
                .params
                .iter()
                .map(|p| match p.ty {
                    Some(ty) => format!("{}: {ty}", p.name),
                    None => p.name.clone(),
                })
                .collect::<Vec<_>>()
                .join(", ");
            write!(f, ", params = ({params})")?;
        }
        Ok(())
    }
}

#[derive(Debug)]
struct Scope {
    name: String,
    path: String,
    parent: Option<ScopeId>,
    symbols: BTreeMap<String, Symbol>,
    children: Vec<ScopeId>,
}

/// Tree of lexical scopes, one per program or callable, each with its own
/// symbols. Lookups walk from a scope up through its parents to the root.
///
/// The table only ever grows: there is no way to remove a symbol or scope.
#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    current: ScopeId,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        let root = Scope {
            name: ROOT_SCOPE_NAME.to_string(),
            path: ROOT_SCOPE_NAME.to_string(),
            parent: None,
            symbols: BTreeMap::new(),
            children: vec![],
        };
        Self {
            scopes: vec![root],
            current: ROOT_SCOPE,
        }
    }

    pub fn current_path(&self) -> &str {
        self.scope_path(self.current)
    }

    pub fn scope_path(&self, scope: ScopeId) -> &str {
        &self.scopes[scope].path
    }

    /// Opens a new scope nested in the current one and makes it current.
    pub fn enter_scope(&mut self, name: &str) -> ScopeId {
        let id = self.scopes.len();
        let path = format!("{}.{name}", self.current_path());
        self.scopes.push(Scope {
            name: name.to_string(),
            path,
            parent: Some(self.current),
            symbols: BTreeMap::new(),
            children: vec![],
        });
        self.scopes[self.current].children.push(id);
        self.current = id;
        id
    }

    /// Returns to the parent scope. Does nothing at the root.
    pub fn exit_scope(&mut self) {
        if let Some(parent) = self.scopes[self.current].parent {
            self.current = parent;
        }
    }

    /// First scope named `name` directly nested in `parent`.
    pub fn child_scope(&self, parent: ScopeId, name: &str) -> Option<ScopeId> {
        self.scopes[parent]
            .children
            .iter()
            .copied()
            .find(|&child| self.scopes[child].name == name)
    }

    /// Inserts a symbol into the current scope. Returns `false`, leaving the
    /// existing symbol untouched, when the name is already declared there.
    pub fn add_symbol(
        &mut self,
        name: &str,
        ty: Option<Type>,
        kind: SymbolKind,
        line: usize,
        value: Option<ConstValue>,
    ) -> bool {
        let scope = &mut self.scopes[self.current];
        match scope.symbols.entry(name.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(v) => {
                let mut symbol = Symbol::new(name, ty, kind, &scope.path, line);
                symbol.value = value;
                v.insert(symbol);
                true
            }
        }
    }

    pub fn lookup(&self, name: &str, current_only: bool) -> Option<&Symbol> {
        if current_only {
            return self.scopes[self.current].symbols.get(name);
        }
        self.lookup_from(self.current, name)
    }

    pub fn lookup_from(&self, scope: ScopeId, name: &str) -> Option<&Symbol> {
        let (scope, _) = self.resolve(scope, name, |_| true)?;
        self.scopes[scope].symbols.get(name)
    }

    /// Scope that declares the symbol `name` resolves to from `scope`.
    pub fn declaring_scope(&self, scope: ScopeId, name: &str) -> Option<ScopeId> {
        self.resolve(scope, name, |_| true).map(|(scope, _)| scope)
    }

    fn resolve(
        &self,
        mut scope: ScopeId,
        name: &str,
        accept: impl Fn(&Symbol) -> bool,
    ) -> Option<(ScopeId, &Symbol)> {
        loop {
            if let Some(symbol) = self.scopes[scope].symbols.get(name) {
                if accept(symbol) {
                    return Some((scope, symbol));
                }
            }
            scope = self.scopes[scope].parent?;
        }
    }

    fn lookup_mut(
        &mut self,
        name: &str,
        accept: impl Fn(&Symbol) -> bool,
    ) -> Option<&mut Symbol> {
        let (scope, _) = self.resolve(self.current, name, accept)?;
        self.scopes[scope].symbols.get_mut(name)
    }

    pub fn add_array_dimensions(&mut self, name: &str, bounds: (i64, i64)) -> bool {
        match self.lookup_mut(name, |s| matches!(s.ty, Some(Type::Array(_)))) {
            Some(symbol) => {
                symbol.bounds = Some(bounds);
                true
            }
            None => false,
        }
    }

    /// Appends a parameter to the nearest callable named `callable`.
    pub fn add_parameter(&mut self, callable: &str, param: &str, ty: ScalarType) -> bool {
        let current_path = self.current_path().to_string();
        match self.lookup_mut(callable, Symbol::is_callable) {
            Some(symbol) => {
                symbol.params.push(Symbol::new(
                    param,
                    Some(ty.into()),
                    SymbolKind::Parameter,
                    &current_path,
                    symbol.line,
                ));
                true
            }
            None => false,
        }
    }

    /// Every symbol in the table, sorted by qualified key.
    pub fn symbols(&self) -> Vec<&Symbol> {
        let mut symbols: Vec<_> = self
            .scopes
            .iter()
            .flat_map(|scope| scope.symbols.values())
            .collect();
        symbols.sort_by_key(|s| s.key());
        symbols
    }
}

impl Display for SymbolTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for symbol in self.symbols() {
            writeln!(f, "{}: {symbol}", symbol.key())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::*;

    use super::*;

    #[fixture]
    fn table() -> SymbolTable {
        let mut table = SymbolTable::new();
        table.add_symbol("x", Some(Type::INTEGER), SymbolKind::Variable, 2, None);
        table.add_symbol("f", Some(Type::REAL), SymbolKind::Function, 3, None);
        table.enter_scope("f");
        table.add_symbol("a", Some(Type::INTEGER), SymbolKind::Parameter, 3, None);
        table.add_parameter("f", "a", ScalarType::Integer);
        table
    }

    #[rstest]
    fn test_duplicate_keeps_first(mut table: SymbolTable) {
        table.exit_scope();
        assert!(!table.add_symbol("x", Some(Type::STRING), SymbolKind::Variable, 9, None));
        let x = table.lookup("x", true).unwrap();
        assert_eq!(x.line, 2);
        assert_eq!(x.ty, Some(Type::INTEGER));
    }

    #[rstest]
    fn test_lookup_walks_outward(table: SymbolTable) {
        assert_eq!(table.current_path(), "global.f");
        assert_eq!(table.lookup("x", false).unwrap().scope, "global");
        assert!(table.lookup("x", true).is_none());
        assert_eq!(table.lookup("a", true).unwrap().key(), "global.f.a");
    }

    #[rstest]
    fn test_siblings_do_not_see_each_other(mut table: SymbolTable) {
        table.exit_scope();
        table.enter_scope("g");
        assert!(table.lookup("a", false).is_none());
        assert!(table.lookup("f", false).is_some());
    }

    #[rstest]
    fn test_shadowing(mut table: SymbolTable) {
        table.add_symbol("x", Some(Type::STRING), SymbolKind::Variable, 4, None);
        assert_eq!(table.lookup("x", false).unwrap().ty, Some(Type::STRING));
        table.exit_scope();
        assert_eq!(table.lookup("x", false).unwrap().ty, Some(Type::INTEGER));
    }

    #[rstest]
    fn test_exit_scope_at_root_is_noop() {
        let mut table = SymbolTable::new();
        table.exit_scope();
        table.exit_scope();
        assert_eq!(table.current_path(), ROOT_SCOPE_NAME);
    }

    #[rstest]
    fn test_parameters_attach_to_callable(table: SymbolTable) {
        let f = table.lookup("f", false).unwrap();
        assert_eq!(f.params.len(), 1);
        assert_eq!(f.params[0].name, "a");
        assert_eq!(f.params[0].scope, "global.f");
        assert_eq!(f.param_types().collect::<Vec<_>>(), vec![Some(Type::INTEGER)]);
    }

    #[rstest]
    fn test_parameter_named_like_callable(mut table: SymbolTable) {
        table.add_symbol("f", Some(Type::INTEGER), SymbolKind::Parameter, 3, None);
        assert!(table.add_parameter("f", "f", ScalarType::Integer));
        table.exit_scope();
        assert_eq!(table.lookup("f", false).unwrap().params.len(), 2);
    }

    #[rstest]
    fn test_array_dimensions() {
        let mut table = SymbolTable::new();
        table.add_symbol(
            "v",
            Some(Type::Array(ScalarType::Integer)),
            SymbolKind::Variable,
            1,
            None,
        );
        assert!(table.add_array_dimensions("v", (1, 5)));
        assert!(!table.add_array_dimensions("w", (1, 5)));
        assert_eq!(table.lookup("v", false).unwrap().bounds, Some((1, 5)));
    }

    #[rstest]
    fn test_child_scope(table: SymbolTable) {
        let f = table.child_scope(ROOT_SCOPE, "f").unwrap();
        assert_eq!(table.scope_path(f), "global.f");
        assert_eq!(table.declaring_scope(f, "x"), Some(ROOT_SCOPE));
        assert!(table.child_scope(ROOT_SCOPE, "g").is_none());
    }

    #[rstest]
    fn test_display_is_sorted(table: SymbolTable) {
        let dump = table.to_string();
        let lines: Vec<_> = dump.lines().collect();
        assert_eq!(
            lines,
            vec![
                "global.f: f (function, real, scope: global, line: 3), params = (a: integer)",
                "global.f.a: a (parameter, integer, scope: global.f, line: 3)",
                "global.x: x (variable, integer, scope: global, line: 2)",
            ]
        );
    }
}
