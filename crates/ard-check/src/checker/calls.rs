//! Function, module and method calls, including generic instantiation.
//!
//! A call to a generic function opens a generic scope holding one fresh type
//! variable per `$Name` of the callee. Explicit type arguments bind them
//! first, then the expected result type, then each argument in order; the
//! callee's parameter symbols are refreshed after every binding so later
//! arguments are checked against what is already known.

use super::{CallTarget, Checker, ImportedModule};
use crate::checked::{Builtin, TExpr, TExprKind};
use crate::scope::{ScopeId, SymbolKind};
use crate::std_lib::StdLowering;
use crate::types::{FunctionDef, Type};
use ard_ast::{Expr, ExprKind, Ident, Span, TypeExpr};
use tracing::trace;

/// What a `receiver.method(..)` call resolves to.
enum Method {
    Builtin(Builtin),
    Push,
    Set,
    User { function: String, sig: FunctionDef },
}

impl Checker<'_, '_> {
    pub(super) fn check_call(
        &mut self,
        callee: &Ident,
        type_args: &[TypeExpr],
        args: &[Expr],
        expected: Option<&Type>,
        span: Span,
    ) -> TExpr {
        let Some(resolved) = self.scopes.resolve(self.scope, &callee.name) else {
            self.error(callee.span, format!("undefined function `{}`", callee.name));
            self.check_args_unchecked(args);
            return self.invalid(span);
        };
        match resolved.symbol.kind {
            SymbolKind::Variable(_) => {
                if !type_args.is_empty() {
                    self.error(callee.span, "type arguments can only be given to named functions");
                }
                let callee_expr = self.check_ident(&callee.name, callee.span);
                let Type::Function(sig) = self.types.resolve(&callee_expr.ty) else {
                    let found = self.types.resolve(&callee_expr.ty);
                    if !matches!(found, Type::Var(_)) {
                        self.error(callee.span, format!("`{}` is a `{found}`, not a function", callee.name));
                    }
                    self.check_args_unchecked(args);
                    return self.invalid(span);
                };
                // `$T`s in a function value's type are the enclosing
                // function's own parameters, not open generics.
                if args.len() != sig.params.len() {
                    self.error(
                        span,
                        format!(
                            "`{}` expects {} argument(s), found {}",
                            callee.name,
                            sig.params.len(),
                            args.len()
                        ),
                    );
                    self.check_args_unchecked(args);
                    return self.invalid(span);
                }
                let args = self.check_plain_args(&sig, args);
                let ret = sig.ret.clone();
                TExpr::new(
                    TExprKind::CallValue {
                        callee: Box::new(callee_expr),
                        args,
                    },
                    ret,
                    span,
                )
            }
            SymbolKind::Function => {
                let Some(info) = self.functions.get(&callee.name).cloned() else {
                    return self.invalid(span);
                };
                let Some((args, ret)) =
                    self.check_args(&info.sig, type_args, args, expected, span, &callee.name)
                else {
                    return self.invalid(span);
                };
                let kind = match info.target {
                    CallTarget::User => TExprKind::Call {
                        function: info.qualified,
                        args,
                    },
                    CallTarget::Extern(binding) => TExprKind::CallExtern { binding, args },
                };
                TExpr::new(kind, ret, span)
            }
            SymbolKind::Type | SymbolKind::Argument => {
                self.error(
                    callee.span,
                    format!("`{0}` is a type; construct it with `{0} {{ .. }}`", callee.name),
                );
                self.check_args_unchecked(args);
                self.invalid(span)
            }
        }
    }

    /// Check arguments of a call that already failed, for their own errors.
    fn check_args_unchecked(&mut self, args: &[Expr]) {
        for arg in args {
            self.check_expr(arg, None);
        }
    }

    pub(super) fn check_module_call(
        &mut self,
        module: &Ident,
        name: &Ident,
        type_args: &[TypeExpr],
        args: &[Expr],
        expected: Option<&Type>,
        span: Span,
    ) -> TExpr {
        let Some(imported) = self.imports.get(&module.name).cloned() else {
            self.push_diagnostic(
                crate::diagnostics::Diagnostic::error(
                    module.span,
                    format!("unknown module `{}`", module.name),
                )
                .with_note(format!("add `use ard/{}` or import the module first", module.name)),
            );
            self.check_args_unchecked(args);
            return self.invalid(span);
        };
        let display = format!("{}::{}", module.name, name.name);

        match imported {
            ImportedModule::Std(package) => {
                let Some(function) = package.get(&name.name).cloned() else {
                    self.error(
                        name.span,
                        format!("package `{}` has no function `{}`", package.path, name.name),
                    );
                    self.check_args_unchecked(args);
                    return self.invalid(span);
                };
                let Some((args, ret)) =
                    self.check_args(&function.sig, type_args, args, expected, span, &display)
                else {
                    return self.invalid(span);
                };
                let mut args = args.into_iter();
                let kind = match function.lowering {
                    StdLowering::Module { fallible } => TExprKind::ModuleCall {
                        module: package.module.to_string(),
                        function: name.name.clone(),
                        args: args.collect(),
                        fallible,
                    },
                    StdLowering::MakeNone => TExprKind::MakeNone,
                    lowering => {
                        let Some(arg) = args.next() else {
                            return self.invalid(span);
                        };
                        let arg = Box::new(arg);
                        match lowering {
                            StdLowering::MakeSome => TExprKind::MakeSome(arg),
                            StdLowering::MakeOk => TExprKind::MakeOk(arg),
                            StdLowering::MakeErr => TExprKind::MakeErr(arg),
                            _ => TExprKind::StartFiber(arg),
                        }
                    }
                };
                TExpr::new(kind, ret, span)
            }
            ImportedModule::Module(exports) => {
                let Some(info) = exports.functions.get(&name.name).cloned() else {
                    self.error(
                        name.span,
                        format!("module `{}` has no function `{}`", module.name, name.name),
                    );
                    self.check_args_unchecked(args);
                    return self.invalid(span);
                };
                let Some((args, ret)) =
                    self.check_args(&info.sig, type_args, args, expected, span, &display)
                else {
                    return self.invalid(span);
                };
                TExpr::new(
                    TExprKind::Call {
                        function: info.qualified,
                        args,
                    },
                    ret,
                    span,
                )
            }
        }
    }

    /// Check call arguments against a signature and compute the result type.
    ///
    /// Returns `None` on an argument-count mismatch.
    pub(super) fn check_args(
        &mut self,
        sig: &FunctionDef,
        type_args: &[TypeExpr],
        args: &[Expr],
        expected: Option<&Type>,
        span: Span,
        callee: &str,
    ) -> Option<(Vec<TExpr>, Type)> {
        if args.len() != sig.params.len() {
            self.error(
                span,
                format!(
                    "`{callee}` expects {} argument(s), found {}",
                    sig.params.len(),
                    args.len()
                ),
            );
            self.check_args_unchecked(args);
            return None;
        }

        let open = sig.generics();
        if open.is_empty() {
            if !type_args.is_empty() {
                self.error(span, format!("`{callee}` does not take type arguments"));
            }
            return Some((self.check_plain_args(sig, args), sig.ret.clone()));
        }

        let scope = self
            .scopes
            .create_generic_scope(self.scope, &open, &mut self.types);
        let params: Vec<Type> = sig
            .params
            .iter()
            .map(|param| self.instantiate(scope, &param.ty))
            .collect();
        for (param, ty) in sig.params.iter().zip(&params) {
            self.scopes.add_argument(scope, &param.name, ty.clone());
        }
        let ret = self.instantiate(scope, &sig.ret);

        if !type_args.is_empty() {
            if type_args.len() != open.len() {
                self.error(
                    span,
                    format!(
                        "`{callee}` expects {} type argument(s), found {}",
                        open.len(),
                        type_args.len()
                    ),
                );
            } else {
                for (name, type_arg) in open.iter().zip(type_args) {
                    let ty = self.resolve_type_expr(type_arg);
                    match self.scopes.bind_generic(scope, name, ty, &mut self.types) {
                        Ok(()) => self.scopes.update_symbols_with_generic(scope, name, &self.types),
                        Err(err) => self.error(type_arg.span, err.to_string()),
                    }
                }
            }
        }
        if let Some(expected) = expected {
            self.infer_bindings(scope, &ret, expected, span, false);
        }

        let mut out = Vec::with_capacity(args.len());
        for ((arg, param), declared) in args.iter().zip(&sig.params).zip(&params) {
            let current = self
                .scopes
                .get_local(scope, &param.name)
                .map_or_else(|| declared.clone(), |symbol| symbol.ty.clone());
            let hint = self.types.resolve(&current);
            let checked = self.check_expr(arg, Some(&hint));
            let before = self.diagnostic_count();
            self.infer_bindings(scope, declared, &checked.ty, checked.span, true);
            if self.diagnostic_count() == before {
                let hint = self.types.resolve(declared);
                self.expect_type(&checked, &hint);
            }
            out.push(checked);
        }

        let unresolved: Vec<String> = self
            .scopes
            .generic_context(scope)
            .map(|context| {
                context
                    .vars()
                    .filter(|var| !self.types.is_bound(var) && mentions(&ret, var.id))
                    .map(|var| format!("`${}`", var.name))
                    .collect()
            })
            .unwrap_or_default();
        if !unresolved.is_empty() {
            self.push_diagnostic(
                crate::diagnostics::Diagnostic::error(
                    span,
                    format!(
                        "cannot infer {} for `{callee}`",
                        unresolved.join(", ")
                    ),
                )
                .with_note(format!(
                    "provide explicit type arguments, e.g. `{callee}<{}>(..)`",
                    open.iter().map(|name| format!("${name}")).collect::<Vec<_>>().join(", ")
                )),
            );
        }

        let ret = self.types.resolve(&ret);
        trace!(callee, %ret, "instantiated generic call");
        Some((out, ret))
    }

    fn check_plain_args(&mut self, sig: &FunctionDef, args: &[Expr]) -> Vec<TExpr> {
        let mut out = Vec::with_capacity(args.len());
        for (arg, param) in args.iter().zip(&sig.params) {
            let checked = self.check_expr(arg, Some(&param.ty));
            self.expect_type(&checked, &param.ty);
            out.push(checked);
        }
        out
    }

    /// Replace the callee's `$Name`s with the call scope's variables.
    fn instantiate(&self, scope: ScopeId, ty: &Type) -> Type {
        ty.map_leaves(&mut |leaf| match leaf {
            Type::Generic(name) => self.scopes.find_generic(scope, name).map(Type::Var),
            _ => None,
        })
    }

    /// Walk a declared (instantiated) type against an actual one, binding the
    /// call's generic variables where the declared side has one.
    fn infer_bindings(&mut self, scope: ScopeId, declared: &Type, actual: &Type, span: Span, report: bool) {
        if let Type::Var(var) = declared {
            let owned = self
                .scopes
                .generic_context(scope)
                .and_then(|context| context.get(&var.name))
                .is_some_and(|own| own.id == var.id);
            if owned {
                let actual = self.types.deref(actual);
                if matches!(actual, Type::Var(_)) {
                    return;
                }
                let actual = self.types.resolve(&actual);
                match self.scopes.bind_generic(scope, &var.name, actual, &mut self.types) {
                    Ok(()) => self
                        .scopes
                        .update_symbols_with_generic(scope, &var.name, &self.types),
                    Err(err) if report => self.error(span, err.to_string()),
                    Err(_) => {}
                }
                return;
            }
            let declared = self.types.deref(declared);
            if !matches!(declared, Type::Var(_)) {
                self.infer_bindings(scope, &declared, actual, span, report);
            }
            return;
        }

        let actual = self.types.deref(actual);
        match (declared, &actual) {
            (Type::List(d), Type::List(a))
            | (Type::Maybe(d), Type::Maybe(a))
            | (Type::Fiber(d), Type::Fiber(a)) => self.infer_bindings(scope, d, a, span, report),
            (Type::Map(dk, dv), Type::Map(ak, av)) | (Type::Result(dk, dv), Type::Result(ak, av)) => {
                self.infer_bindings(scope, dk, ak, span, report);
                self.infer_bindings(scope, dv, av, span, report);
            }
            (Type::Function(d), Type::Function(a)) if d.params.len() == a.params.len() => {
                for (dp, ap) in d.params.iter().zip(&a.params) {
                    self.infer_bindings(scope, &dp.ty, &ap.ty, span, report);
                }
                self.infer_bindings(scope, &d.ret, &a.ret, span, report);
            }
            _ => {}
        }
    }

    pub(super) fn check_method_call(
        &mut self,
        receiver: &Expr,
        method: &Ident,
        args: &[Expr],
        span: Span,
    ) -> TExpr {
        let target = self.check_expr(receiver, None);
        let receiver_ty = self.types.resolve(&target.ty);
        let Some((resolved, params, ret)) = self.method_signature(&receiver_ty, &method.name) else {
            if !matches!(receiver_ty, Type::Var(_)) {
                self.error(
                    method.span,
                    format!("no method `{}` on type `{receiver_ty}`", method.name),
                );
            }
            self.check_args_unchecked(args);
            return self.invalid(span);
        };

        if let Method::User { function, sig } = resolved {
            let display = format!("{receiver_ty}.{}", method.name);
            let Some((checked, ret)) = self.check_args(&sig, &[], args, None, span, &display) else {
                return self.invalid(span);
            };
            let mut all = Vec::with_capacity(checked.len() + 1);
            all.push(target);
            all.extend(checked);
            return TExpr::new(TExprKind::Call { function, args: all }, ret, span);
        }

        if args.len() != params.len() {
            self.error(
                span,
                format!(
                    "`{}` expects {} argument(s), found {}",
                    method.name,
                    params.len(),
                    args.len()
                ),
            );
            self.check_args_unchecked(args);
            return self.invalid(span);
        }
        let mut checked = Vec::with_capacity(args.len());
        for (arg, param) in args.iter().zip(&params) {
            let value = self.check_expr(arg, Some(param));
            self.expect_type(&value, param);
            checked.push(value);
        }
        let ret = self.types.resolve(&ret);

        match resolved {
            Method::Builtin(builtin) => TExpr::new(
                TExprKind::Builtin {
                    method: builtin,
                    receiver: Box::new(target),
                    args: checked,
                },
                ret,
                span,
            ),
            Method::Push | Method::Set => {
                let Some(local) = self.mutable_receiver(receiver, &method.name) else {
                    return self.invalid(span);
                };
                let mut checked = checked.into_iter();
                let kind = match (resolved, checked.next(), checked.next()) {
                    (Method::Push, Some(value), _) => TExprKind::Push {
                        local,
                        value: Box::new(value),
                    },
                    (Method::Set, Some(key), Some(value)) => TExprKind::MapSet {
                        local,
                        key: Box::new(key),
                        value: Box::new(value),
                    },
                    _ => return self.invalid(span),
                };
                TExpr::new(kind, Type::Void, span)
            }
            Method::User { .. } => self.invalid(span),
        }
    }

    /// `push` and `set` rewrite a variable in place.
    fn mutable_receiver(&mut self, receiver: &Expr, method: &str) -> Option<crate::checked::LocalId> {
        let ExprKind::Ident(name) = &receiver.kind else {
            self.error(receiver.span, format!("`{method}` needs a mutable variable as its receiver"));
            return None;
        };
        let (local, _, mutable) = self.variable(name, receiver.span)?;
        if !mutable {
            self.error(
                receiver.span,
                format!("cannot `{method}` on immutable variable `{name}`"),
            );
            return None;
        }
        Some(local)
    }

    fn method_signature(&self, receiver: &Type, name: &str) -> Option<(Method, Vec<Type>, Type)> {
        use Builtin::*;
        let builtin = |b, params: Vec<Type>, ret| Some((Method::Builtin(b), params, ret));
        match (receiver, name) {
            (Type::List(_) | Type::Map(..) | Type::Str, "size") => builtin(Size, vec![], Type::Int),
            (Type::List(of), "at") => builtin(At, vec![Type::Int], (**of).clone()),
            (Type::List(of), "push") => Some((Method::Push, vec![(**of).clone()], Type::Void)),
            (Type::Map(key, value), "get") => {
                builtin(MapGet, vec![(**key).clone()], Type::maybe((**value).clone()))
            }
            (Type::Map(key, _), "has") => builtin(MapHas, vec![(**key).clone()], Type::Bool),
            (Type::Map(key, value), "set") => Some((
                Method::Set,
                vec![(**key).clone(), (**value).clone()],
                Type::Void,
            )),
            (Type::Int | Type::Float | Type::Bool | Type::Str, "to_str") => {
                builtin(ToStr, vec![], Type::Str)
            }
            (Type::Maybe(_), "is_some") => builtin(IsSome, vec![], Type::Bool),
            (Type::Maybe(_), "is_none") => builtin(IsNone, vec![], Type::Bool),
            (Type::Maybe(of), "or") => builtin(Or, vec![(**of).clone()], (**of).clone()),
            (Type::Result(..), "is_ok") => builtin(IsOk, vec![], Type::Bool),
            (Type::Result(..), "is_err") => builtin(IsErr, vec![], Type::Bool),
            (Type::Fiber(of), "wait") => builtin(Wait, vec![], (**of).clone()),
            (Type::Struct(struct_name), _) => {
                let sig = self.session.structs.get(struct_name)?.methods.get(name)?.clone();
                let ret = sig.ret.clone();
                Some((
                    Method::User {
                        function: format!("{struct_name}.{name}"),
                        sig,
                    },
                    Vec::new(),
                    ret,
                ))
            }
            _ => None,
        }
    }
}

fn mentions(ty: &Type, id: crate::types::TypeVarId) -> bool {
    let mut found = false;
    ty.map_leaves(&mut |leaf| {
        if let Type::Var(var) = leaf
            && var.id == id
        {
            found = true;
        }
        None
    });
    found
}
