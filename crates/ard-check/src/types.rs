//! Type representation and the type-variable binding table.
//!
//! - `Type`: closed set of Ard types
//! - `TypeTable`: arena of type variables; binding is a table write by id
//!
//! A [`TypeVar`] only carries an id and a display name. Whether it is bound,
//! and to what, lives in the [`TypeTable`] that created it. Each table stamps
//! its ids with a generation unique to the table, so an id that leaks out of
//! another checker's table is reported as unbound instead of silently reading
//! an unrelated slot.
//!
//! ```
//! # use ard_check::types::*;
//! let mut table = TypeTable::new();
//! let t = table.fresh("T");
//! let var = Type::Var(t.clone());
//!
//! assert!(table.equal(&Type::Int, &var));
//! table.bind(&t, Type::Int).unwrap();
//! assert!(table.bind(&t, Type::Str).is_err());
//! assert_eq!(table.resolve(&Type::List(Box::new(var))), Type::List(Box::new(Type::Int)));
//! ```

use indexmap::IndexMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use thiserror::Error;

static NEXT_GENERATION: AtomicU32 = AtomicU32::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeVarId {
    pub index: u32,
    pub generation: u32,
}

/// A placeholder for a generic type at one instantiation site.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeVar {
    pub id: TypeVarId,
    /// Generic parameter name without `$`; empty for anonymous placeholders.
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Int,
    Float,
    Str,
    Bool,
    Void,
    List(Box<Type>),
    Map(Box<Type>, Box<Type>),
    Maybe(Box<Type>),
    Result(Box<Type>, Box<Type>),
    Union(UnionType),
    /// Nominal struct type; fields and methods live in the checker's struct table.
    Struct(String),
    Function(Box<FunctionDef>),
    /// Async task handle yielding the inner type.
    Fiber(Box<Type>),
    /// A declared generic parameter (`$T`) seen from inside its declaration.
    Generic(String),
    Var(TypeVar),
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnionType {
    pub name: String,
    pub variants: Vec<Type>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamDef {
    pub name: String,
    pub ty: Type,
    pub mutable: bool,
}

/// Function signature. Anonymous functions have an empty name.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<ParamDef>,
    pub ret: Type,
}

impl FunctionDef {
    pub fn new(name: impl Into<String>, params: Vec<ParamDef>, ret: Type) -> Self {
        Self {
            name: name.into(),
            params,
            ret,
        }
    }

    /// Generic parameter names in order of first appearance (params, then return).
    pub fn generics(&self) -> Vec<String> {
        let mut names = Vec::new();
        for param in &self.params {
            param.ty.collect_generics(&mut names);
        }
        self.ret.collect_generics(&mut names);
        names
    }
}

/// Struct declaration with its methods and implemented traits.
#[derive(Debug, Clone, PartialEq)]
pub struct StructDef {
    pub name: String,
    pub fields: IndexMap<String, Type>,
    pub methods: IndexMap<String, FunctionDef>,
    pub traits: Vec<String>,
}

impl StructDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: IndexMap::new(),
            methods: IndexMap::new(),
            traits: Vec::new(),
        }
    }
}

impl Type {
    pub fn list(of: Type) -> Type {
        Type::List(Box::new(of))
    }

    pub fn maybe(of: Type) -> Type {
        Type::Maybe(Box::new(of))
    }

    pub fn result(val: Type, err: Type) -> Type {
        Type::Result(Box::new(val), Box::new(err))
    }

    pub fn function(params: Vec<Type>, ret: Type) -> Type {
        let params = params
            .into_iter()
            .enumerate()
            .map(|(i, ty)| ParamDef {
                name: format!("_{i}"),
                ty,
                mutable: false,
            })
            .collect();
        Type::Function(Box::new(FunctionDef::new("", params, ret)))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    /// Push generic names not yet in `names`, in order of first appearance.
    pub fn collect_generics(&self, names: &mut Vec<String>) {
        match self {
            Type::Generic(name) => {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
            Type::List(of) | Type::Maybe(of) | Type::Fiber(of) => of.collect_generics(names),
            Type::Map(key, value) => {
                key.collect_generics(names);
                value.collect_generics(names);
            }
            Type::Result(val, err) => {
                val.collect_generics(names);
                err.collect_generics(names);
            }
            Type::Function(def) => {
                for param in &def.params {
                    param.ty.collect_generics(names);
                }
                def.ret.collect_generics(names);
            }
            Type::Union(union) => {
                for variant in &union.variants {
                    variant.collect_generics(names);
                }
            }
            Type::Int
            | Type::Float
            | Type::Str
            | Type::Bool
            | Type::Void
            | Type::Struct(_)
            | Type::Var(_) => {}
        }
    }

    /// Rebuild this type with `f` applied to every leaf `Generic` and `Var`.
    pub fn map_leaves(&self, f: &mut impl FnMut(&Type) -> Option<Type>) -> Type {
        if let Some(replacement) = f(self) {
            return replacement;
        }
        match self {
            Type::List(of) => Type::List(Box::new(of.map_leaves(f))),
            Type::Maybe(of) => Type::Maybe(Box::new(of.map_leaves(f))),
            Type::Fiber(of) => Type::Fiber(Box::new(of.map_leaves(f))),
            Type::Map(key, value) => {
                Type::Map(Box::new(key.map_leaves(f)), Box::new(value.map_leaves(f)))
            }
            Type::Result(val, err) => {
                Type::Result(Box::new(val.map_leaves(f)), Box::new(err.map_leaves(f)))
            }
            Type::Function(def) => Type::Function(Box::new(FunctionDef {
                name: def.name.clone(),
                params: def
                    .params
                    .iter()
                    .map(|param| ParamDef {
                        name: param.name.clone(),
                        ty: param.ty.map_leaves(f),
                        mutable: param.mutable,
                    })
                    .collect(),
                ret: def.ret.map_leaves(f),
            })),
            Type::Union(union) => Type::Union(UnionType {
                name: union.name.clone(),
                variants: union.variants.iter().map(|v| v.map_leaves(f)).collect(),
            }),
            other => other.clone(),
        }
    }

    /// Runtime type tag used by `match` on union members.
    pub fn tag(&self) -> Option<String> {
        match self {
            Type::Int => Some("Int".into()),
            Type::Float => Some("Float".into()),
            Type::Str => Some("Str".into()),
            Type::Bool => Some("Bool".into()),
            Type::Struct(name) => Some(name.clone()),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "Int"),
            Type::Float => write!(f, "Float"),
            Type::Str => write!(f, "Str"),
            Type::Bool => write!(f, "Bool"),
            Type::Void => write!(f, "Void"),
            Type::List(of) => write!(f, "[{of}]"),
            Type::Map(key, value) => write!(f, "[{key}:{value}]"),
            Type::Maybe(of) => write!(f, "{of}?"),
            Type::Result(val, err) => write!(f, "{val}!{err}"),
            Type::Union(union) => write!(f, "{}", union.name),
            Type::Struct(name) => write!(f, "{name}"),
            Type::Function(def) => {
                write!(f, "fn(")?;
                for (i, param) in def.params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", param.ty)?;
                }
                write!(f, ")")?;
                if !def.ret.is_void() {
                    write!(f, " {}", def.ret)?;
                }
                Ok(())
            }
            Type::Fiber(of) => write!(f, "Fiber<{of}>"),
            Type::Generic(name) => write!(f, "${name}"),
            Type::Var(var) if var.name.is_empty() => write!(f, "?"),
            Type::Var(var) => write!(f, "${}", var.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindError {
    #[error("`${name}` is already bound to `{existing}`, cannot rebind it to `{new}`")]
    Conflict {
        name: String,
        existing: String,
        new: String,
    },
    #[error("`${name}` cannot be bound to `{ty}`, which contains itself")]
    Recursive { name: String, ty: String },
    #[error("`${name}` does not belong to this type table")]
    Stale { name: String },
    #[error("`${name}` is not a generic parameter here")]
    UnknownGeneric { name: String },
}

/// Arena of type variables and their bindings.
#[derive(Debug)]
pub struct TypeTable {
    generation: u32,
    bindings: Vec<Option<Type>>,
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeTable {
    pub fn new() -> Self {
        Self {
            generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
            bindings: Vec::new(),
        }
    }

    /// Allocate a new unbound variable.
    pub fn fresh(&mut self, name: impl Into<String>) -> TypeVar {
        let index = self.bindings.len() as u32;
        self.bindings.push(None);
        TypeVar {
            id: TypeVarId {
                index,
                generation: self.generation,
            },
            name: name.into(),
        }
    }

    /// Allocate an anonymous placeholder type.
    pub fn placeholder(&mut self) -> Type {
        Type::Var(self.fresh(""))
    }

    /// Current binding of `id`; `None` when unbound or from another table.
    pub fn probe(&self, id: TypeVarId) -> Option<&Type> {
        if id.generation != self.generation {
            return None;
        }
        self.bindings.get(id.index as usize)?.as_ref()
    }

    pub fn is_bound(&self, var: &TypeVar) -> bool {
        self.probe(var.id).is_some()
    }

    /// Bind `var` to `ty`. A later bind succeeds, keeping the first binding,
    /// when its type is accepted where the bound type is expected (a union
    /// member against its union); any other type is a conflict.
    pub fn bind(&mut self, var: &TypeVar, ty: Type) -> Result<(), BindError> {
        if var.id.generation != self.generation {
            return Err(BindError::Stale {
                name: var.name.clone(),
            });
        }
        let ty = self.deref(&ty);
        if let Type::Var(other) = &ty
            && other.id == var.id
        {
            return Ok(());
        }
        if let Some(existing) = self.probe(var.id).cloned() {
            if self.equal(&ty, &existing) {
                return Ok(());
            }
            return Err(BindError::Conflict {
                name: var.name.clone(),
                existing: self.resolve(&existing).to_string(),
                new: self.resolve(&ty).to_string(),
            });
        }
        if self.occurs(var.id, &ty) {
            return Err(BindError::Recursive {
                name: var.name.clone(),
                ty: self.resolve(&ty).to_string(),
            });
        }
        match self.bindings.get_mut(var.id.index as usize) {
            Some(slot) => {
                *slot = Some(ty);
                Ok(())
            }
            None => Err(BindError::Stale {
                name: var.name.clone(),
            }),
        }
    }

    /// Follow bound variables at the top level only.
    pub fn deref(&self, ty: &Type) -> Type {
        let mut current = ty;
        while let Type::Var(var) = current {
            match self.probe(var.id) {
                Some(bound) => current = bound,
                None => break,
            }
        }
        current.clone()
    }

    /// Replace every bound variable, at any depth, with its binding.
    pub fn resolve(&self, ty: &Type) -> Type {
        self.deref(ty).map_leaves(&mut |leaf| match leaf {
            Type::Var(var) => Some(match self.probe(var.id) {
                Some(bound) => self.resolve(bound),
                None => leaf.clone(),
            }),
            _ => None,
        })
    }

    /// True if `ty` still mentions an unbound variable.
    pub fn has_unbound(&self, ty: &Type) -> bool {
        let mut found = false;
        self.resolve(ty).map_leaves(&mut |leaf| {
            if matches!(leaf, Type::Var(_)) {
                found = true;
            }
            None
        });
        found
    }

    fn occurs(&self, id: TypeVarId, ty: &Type) -> bool {
        let mut found = false;
        self.resolve(ty).map_leaves(&mut |leaf| {
            if let Type::Var(var) = leaf
                && var.id == id
            {
                found = true;
            }
            None
        });
        found
    }

    /// Structural comparison of an actual type against an expected type.
    ///
    /// Unbound variables on either side compare equal without being bound.
    /// A union member is accepted where the union is expected.
    pub fn equal(&self, actual: &Type, expected: &Type) -> bool {
        let actual = self.deref(actual);
        let expected = self.deref(expected);
        match (&actual, &expected) {
            (_, Type::Var(_)) | (Type::Var(_), _) => true,
            (Type::Int, Type::Int)
            | (Type::Float, Type::Float)
            | (Type::Str, Type::Str)
            | (Type::Bool, Type::Bool)
            | (Type::Void, Type::Void) => true,
            (Type::Generic(a), Type::Generic(b)) => a == b,
            (Type::Struct(a), Type::Struct(b)) => a == b,
            (Type::List(a), Type::List(b))
            | (Type::Maybe(a), Type::Maybe(b))
            | (Type::Fiber(a), Type::Fiber(b)) => self.equal(a, b),
            (Type::Map(ak, av), Type::Map(bk, bv)) => self.equal(ak, bk) && self.equal(av, bv),
            (Type::Result(av, ae), Type::Result(bv, be)) => {
                self.equal(av, bv) && self.equal(ae, be)
            }
            (Type::Union(a), Type::Union(b)) => a.name == b.name,
            (_, Type::Union(union)) => union
                .variants
                .iter()
                .any(|variant| self.equal(&actual, variant)),
            (Type::Function(a), Type::Function(b)) => {
                a.params.len() == b.params.len()
                    && a
                        .params
                        .iter()
                        .zip(&b.params)
                        .all(|(pa, pb)| self.equal(&pa.ty, &pb.ty))
                    && self.equal(&a.ret, &b.ret)
            }
            _ => false,
        }
    }

    /// Like [`equal`](Self::equal), but binds anonymous placeholders on either
    /// side to the matching part of the other type.
    ///
    /// Named generic variables are left alone; those are bound through the
    /// symbol table's generic context.
    pub fn unify(&mut self, actual: &Type, expected: &Type) -> bool {
        if !self.equal(actual, expected) {
            return false;
        }
        let actual = self.deref(actual);
        let expected = self.deref(expected);
        match (&actual, &expected) {
            (Type::Var(var), other) | (other, Type::Var(var)) if var.name.is_empty() => {
                self.bind(var, other.clone()).is_ok()
            }
            (Type::List(a), Type::List(b))
            | (Type::Maybe(a), Type::Maybe(b))
            | (Type::Fiber(a), Type::Fiber(b)) => self.unify(a, b),
            (Type::Map(ak, av), Type::Map(bk, bv)) => self.unify(ak, bk) && self.unify(av, bv),
            (Type::Result(av, ae), Type::Result(bv, be)) => {
                self.unify(av, bv) && self.unify(ae, be)
            }
            (Type::Function(a), Type::Function(b)) => {
                let params_ok = a
                    .params
                    .iter()
                    .zip(&b.params)
                    .all(|(pa, pb)| self.unify(&pa.ty, &pb.ty));
                params_ok && self.unify(&a.ret, &b.ret)
            }
            _ => true,
        }
    }
}
