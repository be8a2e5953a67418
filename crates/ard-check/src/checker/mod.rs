//! The type checker.
//!
//! Checking runs in three passes over a file:
//!
//! 1. imports: std packages are looked up, other modules are resolved and
//!    checked recursively
//! 2. declarations: struct and union names, then struct fields, function and
//!    extern signatures, then `impl` blocks, so declaration order never matters
//! 3. bodies: every function body, then the top-level statements, which form
//!    the entry function
//!
//! Every problem becomes a [`Diagnostic`]; an expression that fails to check
//! is replaced by a placeholder typed with a fresh unbound variable, which
//! compares equal to anything and so does not cascade into further errors.

mod calls;
mod exprs;
mod patterns;
mod stmts;

use crate::checked::{CheckedFunction, CheckedProgram, LocalId, TBlock};
use crate::diagnostics::Diagnostic;
use crate::resolver::{ModuleResolver, ResolveError};
use crate::scope::{ScopeId, ScopeKind, Symbol, SymbolKind, SymbolTable};
use crate::std_lib::{StdPackage, std_package};
use crate::types::{FunctionDef, ParamDef, StructDef, Type, TypeTable, UnionType};
use ard_ast::{
    FunctionDecl, ImplBlock, Import, Program, Span, Stmt, StmtKind, TypeExpr, TypeExprKind,
};
use indexmap::IndexMap;
use std::collections::HashMap;
use tracing::{debug, info};

/// Output of [`check`].
#[derive(Debug)]
pub struct CheckOutput {
    pub program: CheckedProgram,
    pub diagnostics: Vec<Diagnostic>,
}

impl CheckOutput {
    pub fn has_errors(&self) -> bool {
        crate::diagnostics::has_errors(&self.diagnostics)
    }
}

/// Type-check a parsed program.
pub fn check(program: &Program, resolver: &mut dyn ModuleResolver) -> CheckOutput {
    let mut session = Session {
        resolver,
        modules: HashMap::new(),
        functions: Vec::new(),
        structs: IndexMap::new(),
        diagnostics: Vec::new(),
    };
    let entry = {
        let mut checker = Checker::new(&mut session, String::new());
        checker.check_program(program, true)
    };
    let output = CheckOutput {
        program: CheckedProgram {
            functions: session.functions,
            entry,
            structs: session.structs,
        },
        diagnostics: session.diagnostics,
    };
    info!(
        functions = output.program.functions.len(),
        diagnostics = output.diagnostics.len(),
        "checked program"
    );
    output
}

/// State shared by the checkers of the main program and its modules.
struct Session<'r> {
    resolver: &'r mut dyn ModuleResolver,
    modules: HashMap<String, ModuleState>,
    functions: Vec<CheckedFunction>,
    structs: IndexMap<String, StructDef>,
    diagnostics: Vec<Diagnostic>,
}

enum ModuleState {
    Loading,
    Loaded(ModuleExports),
    Failed,
}

/// Public functions of a checked module, by local name.
#[derive(Debug, Clone)]
struct ModuleExports {
    functions: IndexMap<String, FunctionInfo>,
}

#[derive(Debug, Clone)]
enum ImportedModule {
    Std(StdPackage),
    Module(ModuleExports),
}

#[derive(Debug, Clone, PartialEq)]
enum CallTarget {
    User,
    Extern(String),
}

#[derive(Debug, Clone)]
struct FunctionInfo {
    qualified: String,
    sig: FunctionDef,
    target: CallTarget,
}

struct Checker<'s, 'r> {
    session: &'s mut Session<'r>,
    /// `""` for the main program, `"path::"` inside a module
    prefix: String,
    types: TypeTable,
    scopes: SymbolTable,
    scope: ScopeId,
    imports: IndexMap<String, ImportedModule>,
    functions: IndexMap<String, FunctionInfo>,
    /// Qualified name of the function whose body is being checked
    current_function: String,
    closure_counter: u32,
    loop_depth: u32,
}

impl<'s, 'r> Checker<'s, 'r> {
    fn new(session: &'s mut Session<'r>, prefix: String) -> Self {
        let scopes = SymbolTable::new();
        let scope = scopes.root();
        Self {
            session,
            prefix,
            types: TypeTable::new(),
            scopes,
            scope,
            imports: IndexMap::new(),
            functions: IndexMap::new(),
            current_function: String::new(),
            closure_counter: 0,
            loop_depth: 0,
        }
    }

    fn error(&mut self, span: Span, message: impl Into<String>) {
        self.session.diagnostics.push(Diagnostic::error(span, message));
    }

    fn warn(&mut self, span: Span, message: impl Into<String>) {
        self.session.diagnostics.push(Diagnostic::warn(span, message));
    }

    fn push_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.session.diagnostics.push(diagnostic);
    }

    fn diagnostic_count(&self) -> usize {
        self.session.diagnostics.len()
    }

    /// Check a whole file and return the name of its entry function.
    fn check_program(&mut self, program: &Program, is_main: bool) -> String {
        for import in &program.imports {
            self.check_import(import);
        }
        self.declare(&program.statements);

        for stmt in &program.statements {
            match &stmt.kind {
                StmtKind::Function(decl) => {
                    let Some(info) = self.functions.get(&decl.name.name).cloned() else {
                        continue;
                    };
                    if info.target == CallTarget::User && info.qualified == self.qualify(&decl.name.name) {
                        self.check_function(decl, &info.qualified, &info.sig, None);
                    }
                }
                StmtKind::Impl(block) => self.check_impl_bodies(block),
                _ => {}
            }
        }

        let executable: Vec<&Stmt> = program
            .statements
            .iter()
            .filter(|stmt| !stmt.is_declaration())
            .collect();
        if !is_main {
            for stmt in &executable {
                self.error(stmt.span, "modules may only contain declarations");
            }
            return String::new();
        }

        let user_main = program.statements.iter().find_map(|stmt| match &stmt.kind {
            StmtKind::Function(decl) if decl.name.name == "main" => Some(decl),
            _ => None,
        });
        match user_main {
            Some(decl) if executable.is_empty() => {
                if !decl.params.is_empty() {
                    self.error(decl.name.span, "`main` cannot take parameters");
                }
                "main".to_string()
            }
            Some(decl) => {
                self.push_diagnostic(
                    Diagnostic::error(
                        decl.name.span,
                        "ambiguous entry point: `fn main` is declared alongside top-level statements",
                    )
                    .with_note("move the top-level statements into `main`, or remove `main`"),
                );
                self.check_entry(&executable, "main$top")
            }
            None => self.check_entry(&executable, "main"),
        }
    }

    /// Top-level statements become the body of the entry function.
    fn check_entry(&mut self, stmts: &[&Stmt], name: &str) -> String {
        self.current_function = name.to_string();
        self.scope = self.scopes.root();
        let body = self.check_stmts(stmts, None);
        let span = match (stmts.first(), stmts.last()) {
            (Some(first), Some(last)) if first.span.file_id == last.span.file_id => {
                first.span.merge(&last.span)
            }
            _ => Span::default(),
        };
        let root = self.scopes.root();
        self.session.functions.push(CheckedFunction {
            name: name.to_string(),
            params: Vec::new(),
            captures: Vec::new(),
            local_count: self.scopes.local_count(root),
            returns_value: body.produces_value(),
            body,
            span,
        });
        name.to_string()
    }

    fn qualify(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    // === Imports ===

    fn check_import(&mut self, import: &Import) {
        if self.imports.contains_key(&import.name) {
            self.warn(
                import.span,
                format!("duplicate import `{}`; this import is ignored", import.name),
            );
            return;
        }
        if import.is_std() {
            match std_package(&import.path) {
                Some(package) => {
                    self.imports
                        .insert(import.name.clone(), ImportedModule::Std(package));
                }
                None => self.error(import.span, format!("Unknown package `{}`", import.path)),
            }
            return;
        }
        if let Some(exports) = self.load_module(import) {
            self.imports
                .insert(import.name.clone(), ImportedModule::Module(exports));
        }
    }

    fn load_module(&mut self, import: &Import) -> Option<ModuleExports> {
        match self.session.modules.get(&import.path) {
            Some(ModuleState::Loaded(exports)) => return Some(exports.clone()),
            Some(ModuleState::Loading) => {
                self.error(import.span, format!("import cycle through `{}`", import.path));
                return None;
            }
            Some(ModuleState::Failed) => return None,
            None => {}
        }

        let program = match self.session.resolver.resolve(&import.path) {
            Ok(program) => program,
            Err(err) => {
                let diagnostic = Diagnostic::error(import.span, err.to_string());
                let diagnostic = match &err {
                    ResolveError::Parse { errors, .. } => {
                        errors.iter().fold(diagnostic, |d, e| d.with_note(e.message.clone()))
                    }
                    _ => diagnostic,
                };
                self.push_diagnostic(diagnostic);
                self.session
                    .modules
                    .insert(import.path.clone(), ModuleState::Failed);
                return None;
            }
        };

        debug!(module = %import.path, "checking module");
        self.session
            .modules
            .insert(import.path.clone(), ModuleState::Loading);
        let functions = {
            let mut checker = Checker::new(&mut *self.session, format!("{}::", import.path));
            checker.check_program(&program, false);
            checker
                .functions
                .into_iter()
                .filter(|(_, info)| info.target == CallTarget::User)
                .collect()
        };
        let exports = ModuleExports { functions };
        self.session
            .modules
            .insert(import.path.clone(), ModuleState::Loaded(exports.clone()));
        Some(exports)
    }

    // === Declarations ===

    fn declare(&mut self, stmts: &[Stmt]) {
        let root = self.scopes.root();

        // Type names first so fields and signatures can refer to any of them.
        for stmt in stmts {
            if let StmtKind::Struct(decl) = &stmt.kind {
                let qualified = self.qualify(&decl.name.name);
                if self.scopes.get_local(root, &decl.name.name).is_some() {
                    self.error(decl.name.span, format!("`{}` is already declared", decl.name.name));
                    continue;
                }
                self.declare_type(&decl.name.name, Type::Struct(qualified.clone()));
                self.session
                    .structs
                    .insert(qualified.clone(), StructDef::new(qualified));
            }
        }
        for stmt in stmts {
            if let StmtKind::Union(decl) = &stmt.kind {
                if self.scopes.get_local(root, &decl.name.name).is_some() {
                    self.error(decl.name.span, format!("`{}` is already declared", decl.name.name));
                    continue;
                }
                let mut variants = Vec::new();
                for variant in &decl.variants {
                    let ty = self.named_type(&variant.name, variant.span);
                    if ty.tag().is_none() && !matches!(ty, Type::Var(_)) {
                        self.error(
                            variant.span,
                            format!("`{}` cannot be a union member", variant.name),
                        );
                    }
                    variants.push(ty);
                }
                let union = Type::Union(UnionType {
                    name: self.qualify(&decl.name.name),
                    variants,
                });
                self.declare_type(&decl.name.name, union);
            }
        }
        for stmt in stmts {
            if let StmtKind::Struct(decl) = &stmt.kind {
                let qualified = self.qualify(&decl.name.name);
                let mut fields = IndexMap::new();
                for (field, ty) in &decl.fields {
                    let ty = self.resolve_type_expr(ty);
                    if fields.insert(field.name.clone(), ty).is_some() {
                        self.error(field.span, format!("duplicate field `{}`", field.name));
                    }
                }
                if let Some(def) = self.session.structs.get_mut(&qualified) {
                    def.fields = fields;
                }
            }
        }

        for stmt in stmts {
            match &stmt.kind {
                StmtKind::Function(decl) => {
                    let sig = self.signature(&decl.name.name, &decl.params, decl.ret.as_ref());
                    let qualified = self.qualify(&decl.name.name);
                    self.declare_function(&decl.name.name, decl.name.span, qualified, sig, CallTarget::User);
                }
                StmtKind::Extern(decl) => {
                    let sig = self.signature(&decl.name.name, &decl.params, decl.ret.as_ref());
                    let qualified = self.qualify(&decl.name.name);
                    self.declare_function(
                        &decl.name.name,
                        decl.name.span,
                        qualified,
                        sig,
                        CallTarget::Extern(decl.binding.clone()),
                    );
                }
                _ => {}
            }
        }

        for stmt in stmts {
            if let StmtKind::Impl(block) = &stmt.kind {
                self.declare_impl(block);
            }
        }
    }

    fn declare_type(&mut self, name: &str, ty: Type) {
        let root = self.scopes.root();
        self.scopes.add_symbol(
            root,
            Symbol {
                name: name.to_string(),
                ty,
                mutable: false,
                kind: SymbolKind::Type,
            },
        );
    }

    fn declare_function(
        &mut self,
        name: &str,
        span: Span,
        qualified: String,
        sig: FunctionDef,
        target: CallTarget,
    ) {
        let root = self.scopes.root();
        if self.scopes.get_local(root, name).is_some() {
            self.error(span, format!("`{name}` is already declared"));
            return;
        }
        self.scopes.add_symbol(
            root,
            Symbol {
                name: name.to_string(),
                ty: Type::Function(Box::new(sig.clone())),
                mutable: false,
                kind: SymbolKind::Function,
            },
        );
        self.functions.insert(
            name.to_string(),
            FunctionInfo {
                qualified,
                sig,
                target,
            },
        );
    }

    fn signature(
        &mut self,
        name: &str,
        params: &[ard_ast::Param],
        ret: Option<&TypeExpr>,
    ) -> FunctionDef {
        let params = params
            .iter()
            .map(|param| ParamDef {
                name: param.name.name.clone(),
                ty: self.resolve_type_expr(&param.ty),
                mutable: param.mutable,
            })
            .collect();
        let ret = ret.map_or(Type::Void, |ty| self.resolve_type_expr(ty));
        FunctionDef::new(name, params, ret)
    }

    fn struct_of(&self, scope_name: &str) -> Option<String> {
        match self.scopes.get(self.scopes.root(), scope_name).map(|s| &s.ty) {
            Some(Type::Struct(qualified)) => Some(qualified.clone()),
            _ => None,
        }
    }

    fn declare_impl(&mut self, block: &ImplBlock) {
        let Some(qualified) = self.struct_of(&block.target.name) else {
            self.error(
                block.target.span,
                format!("cannot implement methods for unknown struct `{}`", block.target.name),
            );
            return;
        };
        for method in &block.methods {
            let sig = self.signature(&method.name.name, &method.params, method.ret.as_ref());
            let duplicate = self
                .session
                .structs
                .get(&qualified)
                .is_some_and(|def| def.methods.contains_key(&method.name.name) || def.fields.contains_key(&method.name.name));
            if duplicate {
                self.error(
                    method.name.span,
                    format!("`{}` is already defined on `{}`", method.name.name, block.target.name),
                );
                continue;
            }
            if let Some(def) = self.session.structs.get_mut(&qualified) {
                def.methods.insert(method.name.name.clone(), sig);
            }
        }

        if let Some(trait_name) = &block.trait_name {
            match trait_name.name.as_str() {
                "ToString" => {
                    let ok = block.methods.iter().any(|m| {
                        m.name.name == "to_str"
                            && m.params.is_empty()
                            && matches!(&m.ret, Some(TypeExpr { kind: TypeExprKind::Named(n), .. }) if n == "Str")
                    });
                    if !ok {
                        self.error(
                            block.span,
                            "`ToString` requires a method `fn to_str() Str`",
                        );
                    }
                }
                other => {
                    self.error(trait_name.span, format!("unknown trait `{other}`"));
                    return;
                }
            }
            if let Some(def) = self.session.structs.get_mut(&qualified) {
                def.traits.push(trait_name.name.clone());
            }
        }
    }

    fn check_impl_bodies(&mut self, block: &ImplBlock) {
        let Some(qualified) = self.struct_of(&block.target.name) else {
            return;
        };
        for method in &block.methods {
            let sig = self
                .session
                .structs
                .get(&qualified)
                .and_then(|def| def.methods.get(&method.name.name))
                .cloned();
            if let Some(sig) = sig {
                let name = format!("{qualified}.{}", method.name.name);
                self.check_function(method, &name, &sig, Some(Type::Struct(qualified.clone())));
            }
        }
    }

    /// Check a declared function (or method) body and emit it.
    fn check_function(
        &mut self,
        decl: &FunctionDecl,
        qualified: &str,
        sig: &FunctionDef,
        self_ty: Option<Type>,
    ) {
        let root = self.scopes.root();
        let scope = self.scopes.push(root, ScopeKind::Function);
        self.scopes.set_expected_return(scope, sig.ret.clone());

        let mut params = Vec::new();
        if let Some(self_ty) = self_ty {
            params.push(self.scopes.add(scope, "self", self_ty, false));
        }
        for param in &sig.params {
            params.push(
                self.scopes
                    .add(scope, &param.name, param.ty.clone(), param.mutable),
            );
        }

        let saved_function = std::mem::replace(&mut self.current_function, qualified.to_string());
        let saved_scope = std::mem::replace(&mut self.scope, scope);
        let saved_loops = std::mem::replace(&mut self.loop_depth, 0);

        let body = self.check_body(&decl.body.stmts, decl.body.span, &sig.ret, &decl.name.name);

        self.loop_depth = saved_loops;
        self.scope = saved_scope;
        self.current_function = saved_function;

        self.session.functions.push(CheckedFunction {
            name: qualified.to_string(),
            params,
            captures: Vec::new(),
            local_count: self.scopes.local_count(scope),
            returns_value: !sig.ret.is_void(),
            body,
            span: decl.span,
        });
    }

    /// Check a function body against its declared return type.
    fn check_body(&mut self, stmts: &[Stmt], span: Span, ret: &Type, name: &str) -> TBlock {
        let expected = self.scopes.expected_return(self.scope).cloned();
        let stmts: Vec<&Stmt> = stmts.iter().collect();
        let mut body = self.check_stmts(&stmts, expected.as_ref().filter(|t| !t.is_void()));
        if ret.is_void() {
            body.ty = Type::Void;
            return body;
        }
        if !body.produces_value() {
            let at = stmts.last().map_or(span, |stmt| stmt.span);
            self.error(at, format!("`{name}` must return a value of type `{ret}`"));
            body.ty = ret.clone();
            return body;
        }
        if !self.types.equal(&body.ty, ret) {
            let found = self.types.resolve(&body.ty);
            let at = stmts.last().map_or(span, |stmt| stmt.span);
            self.error(
                at,
                format!("`{name}` returns `{found}`, but its declared return type is `{ret}`"),
            );
        } else {
            self.types.unify(&body.ty, ret);
        }
        body
    }

    // === Types ===

    fn named_type(&mut self, name: &str, span: Span) -> Type {
        match name {
            "Int" => Type::Int,
            "Float" => Type::Float,
            "Str" => Type::Str,
            "Bool" => Type::Bool,
            "Void" => Type::Void,
            _ => match self.scopes.get(self.scope, name) {
                Some(Symbol {
                    kind: SymbolKind::Type,
                    ty,
                    ..
                }) => ty.clone(),
                _ => {
                    self.error(span, format!("unknown type `{name}`"));
                    self.types.placeholder()
                }
            },
        }
    }

    fn resolve_type_expr(&mut self, ty: &TypeExpr) -> Type {
        match &ty.kind {
            TypeExprKind::Named(name) => self.named_type(name, ty.span),
            TypeExprKind::Generic(name) => Type::Generic(name.clone()),
            TypeExprKind::List(of) => Type::list(self.resolve_type_expr(of)),
            TypeExprKind::Map(key, value) => Type::Map(
                Box::new(self.resolve_type_expr(key)),
                Box::new(self.resolve_type_expr(value)),
            ),
            TypeExprKind::Maybe(of) => Type::maybe(self.resolve_type_expr(of)),
            TypeExprKind::Result(val, err) => {
                Type::result(self.resolve_type_expr(val), self.resolve_type_expr(err))
            }
            TypeExprKind::Function { params, ret } => {
                let params = params.iter().map(|p| self.resolve_type_expr(p)).collect();
                let ret = ret.as_ref().map_or(Type::Void, |r| self.resolve_type_expr(r));
                Type::function(params, ret)
            }
        }
    }

    /// Enter a child scope for the duration of `f`.
    fn with_scope<T>(&mut self, kind: ScopeKind, f: impl FnOnce(&mut Self, ScopeId) -> T) -> T {
        let scope = self.scopes.push(self.scope, kind);
        let saved = std::mem::replace(&mut self.scope, scope);
        let result = f(self, scope);
        self.scope = saved;
        result
    }

    fn declare_local(&mut self, name: &str, ty: Type, mutable: bool) -> LocalId {
        self.scopes.add(self.scope, name, ty, mutable)
    }
}

#[cfg(test)]
mod tests;
