//! Lexical scopes and symbols.
//!
//! Scopes live in an arena owned by [`SymbolTable`] and refer to their parent
//! by [`ScopeId`]. Lookup walks the parent chain and applies two boundaries:
//!
//! - leaving a `Function` scope hides the variables of enclosing scopes
//!   (functions and types stay visible)
//! - leaving an isolated scope (closures) makes mutable variables of
//!   enclosing scopes invisible; immutable ones are captured by value
//!
//! Generic-call scopes carry a [`GenericContext`] holding one type variable
//! per generic parameter of the callee.

use crate::checked::LocalId;
use crate::types::{BindError, Type, TypeTable, TypeVar};
use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// Top-level statements; also the frame of the entry function.
    Root,
    Block,
    Function,
    Closure,
    Generic,
}

impl ScopeKind {
    /// Scopes that own a local-variable frame.
    fn is_frame(self) -> bool {
        matches!(self, ScopeKind::Root | ScopeKind::Function | ScopeKind::Closure)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SymbolKind {
    Variable(LocalId),
    Function,
    Type,
    /// Parameter of a generic callee, instantiated for one call site.
    Argument,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub ty: Type,
    pub mutable: bool,
    pub kind: SymbolKind,
}

/// Generic parameter name to the shared type variable of one instantiation.
#[derive(Debug, Clone, Default)]
pub struct GenericContext {
    vars: IndexMap<String, TypeVar>,
}

impl GenericContext {
    pub fn get(&self, name: &str) -> Option<&TypeVar> {
        self.vars.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.vars.keys()
    }

    pub fn vars(&self) -> impl Iterator<Item = &TypeVar> {
        self.vars.values()
    }
}

/// An outer variable copied into a closure.
#[derive(Debug, Clone, PartialEq)]
pub struct Capture {
    pub name: String,
    pub ty: Type,
    /// Slot in the enclosing frame
    pub outer: LocalId,
    /// Slot in the closure's frame
    pub inner: LocalId,
}

/// Result of a name lookup.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub symbol: Symbol,
    /// Closure scopes crossed to reach the symbol, innermost first.
    pub closures: Vec<ScopeId>,
}

#[derive(Debug)]
struct ScopeNode {
    parent: Option<ScopeId>,
    kind: ScopeKind,
    symbols: IndexMap<String, Symbol>,
    expected_return: Option<Type>,
    isolated: bool,
    generics: Option<GenericContext>,
    captures: Vec<Capture>,
    next_local: u32,
}

#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<ScopeNode>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        let mut table = Self { scopes: Vec::new() };
        table.alloc(None, ScopeKind::Root);
        table
    }

    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    fn alloc(&mut self, parent: Option<ScopeId>, kind: ScopeKind) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(ScopeNode {
            parent,
            kind,
            symbols: IndexMap::new(),
            expected_return: None,
            isolated: kind == ScopeKind::Closure,
            generics: None,
            captures: Vec::new(),
            next_local: 0,
        });
        id
    }

    fn node(&self, id: ScopeId) -> &ScopeNode {
        &self.scopes[id.0 as usize]
    }

    fn node_mut(&mut self, id: ScopeId) -> &mut ScopeNode {
        &mut self.scopes[id.0 as usize]
    }

    /// Open a child scope.
    pub fn push(&mut self, parent: ScopeId, kind: ScopeKind) -> ScopeId {
        self.alloc(Some(parent), kind)
    }

    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.node(scope).parent
    }

    pub fn kind(&self, scope: ScopeId) -> ScopeKind {
        self.node(scope).kind
    }

    pub fn set_isolated(&mut self, scope: ScopeId, isolated: bool) {
        self.node_mut(scope).isolated = isolated;
    }

    /// Nearest enclosing scope owning a local frame.
    pub fn frame(&self, scope: ScopeId) -> ScopeId {
        let mut current = scope;
        loop {
            let node = self.node(current);
            match node.parent {
                Some(parent) if !node.kind.is_frame() => current = parent,
                _ => return current,
            }
        }
    }

    /// Number of locals allocated so far in a frame.
    pub fn local_count(&self, frame: ScopeId) -> u32 {
        self.node(self.frame(frame)).next_local
    }

    fn alloc_local(&mut self, scope: ScopeId) -> LocalId {
        let frame = self.frame(scope);
        let node = self.node_mut(frame);
        let local = LocalId(node.next_local);
        node.next_local += 1;
        local
    }

    pub fn set_expected_return(&mut self, scope: ScopeId, ty: Type) {
        self.node_mut(scope).expected_return = Some(ty);
    }

    /// Declared return type of the enclosing function, if any.
    pub fn expected_return(&self, scope: ScopeId) -> Option<&Type> {
        self.node(self.frame(scope)).expected_return.as_ref()
    }

    /// Declare a variable in `scope`, shadowing any earlier binding there.
    pub fn add(&mut self, scope: ScopeId, name: &str, ty: Type, mutable: bool) -> LocalId {
        let local = self.alloc_local(scope);
        self.node_mut(scope).symbols.insert(
            name.to_string(),
            Symbol {
                name: name.to_string(),
                ty,
                mutable,
                kind: SymbolKind::Variable(local),
            },
        );
        local
    }

    /// Declare a function or type name.
    pub fn add_symbol(&mut self, scope: ScopeId, symbol: Symbol) {
        self.node_mut(scope)
            .symbols
            .insert(symbol.name.clone(), symbol);
    }

    /// Record a generic callee's parameter type in its call scope. No local
    /// slot is allocated.
    pub fn add_argument(&mut self, scope: ScopeId, name: &str, ty: Type) {
        self.add_symbol(
            scope,
            Symbol {
                name: name.to_string(),
                ty,
                mutable: false,
                kind: SymbolKind::Argument,
            },
        );
    }

    /// Symbol declared directly in `scope`.
    pub fn get_local(&self, scope: ScopeId, name: &str) -> Option<&Symbol> {
        self.node(scope).symbols.get(name)
    }

    pub fn get(&self, scope: ScopeId, name: &str) -> Option<&Symbol> {
        self.lookup_ref(scope, name).map(|(symbol, _)| symbol)
    }

    /// Look a name up, reporting which closure boundaries were crossed.
    pub fn resolve(&self, scope: ScopeId, name: &str) -> Option<Resolved> {
        self.lookup_ref(scope, name).map(|(symbol, closures)| Resolved {
            symbol: symbol.clone(),
            closures,
        })
    }

    fn lookup_ref(&self, scope: ScopeId, name: &str) -> Option<(&Symbol, Vec<ScopeId>)> {
        let mut current = scope;
        let mut isolated = false;
        let mut variables_hidden = false;
        let mut closures = Vec::new();
        loop {
            let node = self.node(current);
            if let Some(symbol) = node.symbols.get(name) {
                let is_variable = matches!(symbol.kind, SymbolKind::Variable(_));
                if !is_variable {
                    return Some((symbol, Vec::new()));
                }
                if variables_hidden {
                    // Keep looking for a function or type of the same name.
                } else if isolated && symbol.mutable {
                    return None;
                } else {
                    return Some((symbol, closures));
                }
            }
            if node.isolated {
                isolated = true;
            }
            match node.kind {
                ScopeKind::Function => variables_hidden = true,
                ScopeKind::Closure => closures.push(current),
                _ => {}
            }
            current = node.parent?;
        }
    }

    /// Record that `closure` reads the outer variable `name` held in `outer`.
    ///
    /// Returns the slot of the copy inside the closure. Repeated captures of
    /// the same name reuse the first slot.
    pub fn capture(&mut self, closure: ScopeId, name: &str, ty: Type, outer: LocalId) -> LocalId {
        if let Some(existing) = self
            .node(closure)
            .captures
            .iter()
            .find(|capture| capture.name == name)
        {
            return existing.inner;
        }
        let inner = self.alloc_local(closure);
        self.node_mut(closure).captures.push(Capture {
            name: name.to_string(),
            ty,
            outer,
            inner,
        });
        inner
    }

    pub fn captures(&self, closure: ScopeId) -> &[Capture] {
        &self.node(closure).captures
    }

    /// Child scope with one fresh unbound variable per generic name.
    pub fn create_generic_scope(
        &mut self,
        parent: ScopeId,
        names: &[String],
        table: &mut TypeTable,
    ) -> ScopeId {
        let scope = self.push(parent, ScopeKind::Generic);
        let mut context = GenericContext::default();
        for name in names {
            context.vars.insert(name.clone(), table.fresh(name.clone()));
        }
        self.node_mut(scope).generics = Some(context);
        scope
    }

    pub fn generic_context(&self, scope: ScopeId) -> Option<&GenericContext> {
        self.node(scope).generics.as_ref()
    }

    /// Bind a generic of `scope`'s own context. Parents are not consulted.
    pub fn bind_generic(
        &mut self,
        scope: ScopeId,
        name: &str,
        ty: Type,
        table: &mut TypeTable,
    ) -> Result<(), BindError> {
        let var = self
            .node(scope)
            .generics
            .as_ref()
            .and_then(|context| context.get(name))
            .cloned()
            .ok_or_else(|| BindError::UnknownGeneric {
                name: name.to_string(),
            })?;
        table.bind(&var, ty)
    }

    /// Find the variable standing for generic `name`, searching the generic
    /// contexts and then the symbol types of `scope` and its ancestors.
    pub fn find_generic(&self, scope: ScopeId, name: &str) -> Option<TypeVar> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let node = self.node(id);
            if let Some(var) = node.generics.as_ref().and_then(|ctx| ctx.get(name)) {
                return Some(var.clone());
            }
            for symbol in node.symbols.values() {
                if let Some(var) = find_var_named(&symbol.ty, name) {
                    return Some(var);
                }
            }
            current = node.parent;
        }
        None
    }

    /// Substitute the binding of generic `name` into every symbol of `scope`.
    pub fn update_symbols_with_generic(&mut self, scope: ScopeId, name: &str, table: &TypeTable) {
        let Some(var) = self.find_generic(scope, name) else {
            return;
        };
        if !table.is_bound(&var) {
            return;
        }
        for symbol in self.node_mut(scope).symbols.values_mut() {
            if find_var_named(&symbol.ty, name).is_some() {
                symbol.ty = table.resolve(&symbol.ty);
            }
        }
    }
}

fn find_var_named(ty: &Type, name: &str) -> Option<TypeVar> {
    let mut found = None;
    ty.map_leaves(&mut |leaf| {
        if let Type::Var(var) = leaf
            && var.name == name
            && found.is_none()
        {
            found = Some(var.clone());
        }
        None
    });
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isolated_scope_hides_outer_mutables_only() {
        let mut table = SymbolTable::new();
        let root = table.root();
        table.add(root, "counter", Type::Int, true);
        table.add(root, "limit", Type::Int, false);

        let closure = table.push(root, ScopeKind::Closure);
        assert!(table.get(closure, "counter").is_none());
        assert_eq!(table.get(closure, "limit").map(|s| &s.ty), Some(&Type::Int));
    }

    #[test]
    fn test_isolation_applies_through_nested_blocks() {
        let mut table = SymbolTable::new();
        let root = table.root();
        table.add(root, "total", Type::Int, true);
        let closure = table.push(root, ScopeKind::Closure);
        let block = table.push(closure, ScopeKind::Block);
        assert!(table.get(block, "total").is_none());

        let resolved = table.resolve(block, "total");
        assert!(resolved.is_none());
    }

    #[test]
    fn test_function_scope_hides_outer_variables_but_not_functions() {
        let mut table = SymbolTable::new();
        let root = table.root();
        table.add(root, "x", Type::Int, false);
        table.add_symbol(
            root,
            Symbol {
                name: "helper".into(),
                ty: Type::function(vec![], Type::Int),
                mutable: false,
                kind: SymbolKind::Function,
            },
        );
        let function = table.push(root, ScopeKind::Function);
        assert!(table.get(function, "x").is_none());
        assert!(table.get(function, "helper").is_some());
    }

    #[test]
    fn test_add_shadows_in_current_scope_only() {
        let mut table = SymbolTable::new();
        let root = table.root();
        table.add(root, "x", Type::Int, false);
        let block = table.push(root, ScopeKind::Block);
        table.add(block, "x", Type::Str, false);
        assert_eq!(table.get(block, "x").map(|s| &s.ty), Some(&Type::Str));
        assert_eq!(table.get(root, "x").map(|s| &s.ty), Some(&Type::Int));
    }

    #[test]
    fn test_locals_are_allocated_per_frame() {
        let mut table = SymbolTable::new();
        let root = table.root();
        assert_eq!(table.add(root, "a", Type::Int, false), LocalId(0));
        let block = table.push(root, ScopeKind::Block);
        assert_eq!(table.add(block, "b", Type::Int, false), LocalId(1));
        let function = table.push(root, ScopeKind::Function);
        assert_eq!(table.add(function, "c", Type::Int, false), LocalId(0));
        assert_eq!(table.local_count(root), 2);
    }

    #[test]
    fn test_closure_captures_record_crossing() {
        let mut table = SymbolTable::new();
        let root = table.root();
        let outer = table.add(root, "n", Type::Int, false);
        let closure = table.push(root, ScopeKind::Closure);
        table.add(closure, "param", Type::Int, false);

        let resolved = table.resolve(closure, "n").unwrap();
        assert_eq!(resolved.closures, vec![closure]);
        let inner = table.capture(closure, "n", Type::Int, outer);
        assert_eq!(inner, LocalId(1));
        assert_eq!(table.capture(closure, "n", Type::Int, outer), inner);
        assert_eq!(table.captures(closure).len(), 1);
    }

    #[test]
    fn test_bind_generic_is_local_to_its_scope() {
        let mut types = TypeTable::new();
        let mut table = SymbolTable::new();
        let root = table.root();
        let outer = table.create_generic_scope(root, &["T".into()], &mut types);
        let inner = table.create_generic_scope(outer, &["U".into()], &mut types);

        assert!(matches!(
            table.bind_generic(inner, "T", Type::Int, &mut types),
            Err(BindError::UnknownGeneric { .. })
        ));
        table.bind_generic(inner, "U", Type::Int, &mut types).unwrap();
        let err = table
            .bind_generic(inner, "U", Type::Str, &mut types)
            .unwrap_err();
        assert!(err.to_string().contains("Int"));
        assert!(err.to_string().contains("Str"));
    }

    #[test]
    fn test_update_symbols_with_generic() {
        let mut types = TypeTable::new();
        let mut table = SymbolTable::new();
        let root = table.root();
        let scope = table.create_generic_scope(root, &["A".into()], &mut types);
        let var = table.find_generic(scope, "A").unwrap();
        table.add(scope, "list", Type::list(Type::Var(var)), false);

        table.bind_generic(scope, "A", Type::Int, &mut types).unwrap();
        table.update_symbols_with_generic(scope, "A", &types);
        assert_eq!(
            table.get(scope, "list").map(|s| s.ty.clone()),
            Some(Type::list(Type::Int))
        );
    }

    #[test]
    fn test_find_generic_searches_symbol_types() {
        let mut types = TypeTable::new();
        let mut table = SymbolTable::new();
        let root = table.root();
        let var = types.fresh("T");
        table.add(root, "value", Type::maybe(Type::Var(var.clone())), false);
        let block = table.push(root, ScopeKind::Block);
        assert_eq!(table.find_generic(block, "T"), Some(var));
        assert_eq!(table.find_generic(block, "U"), None);
    }
}
