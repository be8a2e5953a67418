use super::Checker;
use crate::checked::{CheckedFunction, LocalId, TExpr, TExprKind};
use crate::scope::{ScopeId, ScopeKind, SymbolKind};
use crate::types::{FunctionDef, ParamDef, Type};
use ard_ast::{BinaryOp, Block, Expr, ExprKind, Ident, Param, Span, TypeExpr, UnaryOp};

impl Checker<'_, '_> {
    /// Check an expression. `expected` guides literals and generic calls; it
    /// is never enforced here.
    pub(super) fn check_expr(&mut self, expr: &Expr, expected: Option<&Type>) -> TExpr {
        let span = expr.span;
        match &expr.kind {
            ExprKind::Number(text) => self.check_number(text, span),
            ExprKind::Str(text) => TExpr::new(TExprKind::Str(text.clone()), Type::Str, span),
            ExprKind::Bool(value) => TExpr::new(TExprKind::Bool(*value), Type::Bool, span),
            ExprKind::Ident(name) => self.check_ident(name, span),
            ExprKind::List(items) => self.check_list(items, expected, span),
            ExprKind::Map(entries) => self.check_map(entries, expected, span),
            ExprKind::Unary { op, operand } => self.check_unary(*op, operand, span),
            ExprKind::Binary { op, lhs, rhs } => self.check_binary(*op, lhs, rhs, span),
            ExprKind::Call {
                callee,
                type_args,
                args,
            } => self.check_call(callee, type_args, args, expected, span),
            ExprKind::ModuleCall {
                module,
                name,
                type_args,
                args,
            } => self.check_module_call(module, name, type_args, args, expected, span),
            ExprKind::MethodCall {
                receiver,
                method,
                args,
            } => self.check_method_call(receiver, method, args, span),
            ExprKind::Field { target, field } => self.check_field(target, field, span),
            ExprKind::StructLit { name, fields } => self.check_struct_lit(name, fields, span),
            ExprKind::If {
                branches,
                else_block,
            } => self.check_if(branches, else_block.as_ref(), expected, span),
            ExprKind::Match { subject, arms } => self.check_match(subject, arms, expected, span),
            ExprKind::Closure { params, ret, body } => {
                self.check_closure(params, ret.as_ref(), body, span)
            }
        }
    }

    /// An expression that failed to check.
    pub(super) fn invalid(&mut self, span: Span) -> TExpr {
        let ty = self.types.placeholder();
        TExpr::new(TExprKind::Invalid, ty, span)
    }

    fn check_number(&mut self, text: &str, span: Span) -> TExpr {
        if text.contains('.') {
            match text.parse::<f64>() {
                Ok(value) => TExpr::new(TExprKind::Float(value), Type::Float, span),
                Err(_) => {
                    self.error(span, format!("invalid float literal `{text}`"));
                    self.invalid(span)
                }
            }
        } else {
            match text.parse::<i64>() {
                Ok(value) => TExpr::new(TExprKind::Int(value), Type::Int, span),
                Err(_) => {
                    self.error(span, format!("integer literal `{text}` is out of range"));
                    self.invalid(span)
                }
            }
        }
    }

    pub(super) fn check_ident(&mut self, name: &str, span: Span) -> TExpr {
        let Some(resolved) = self.scopes.resolve(self.scope, name) else {
            self.error(span, format!("undefined name `{name}`"));
            return self.invalid(span);
        };
        match resolved.symbol.kind {
            SymbolKind::Variable(local) => {
                let ty = resolved.symbol.ty.clone();
                let local = if resolved.closures.is_empty() {
                    local
                } else {
                    self.capture_chain(name, &ty, local, &resolved.closures)
                };
                TExpr::new(TExprKind::Local(local), ty, span)
            }
            SymbolKind::Function => {
                let Some(info) = self.functions.get(name).cloned() else {
                    return self.invalid(span);
                };
                if !info.sig.generics().is_empty() {
                    self.error(
                        span,
                        format!("generic function `{name}` cannot be used as a value"),
                    );
                    return self.invalid(span);
                }
                if info.target != super::CallTarget::User {
                    self.error(span, format!("extern function `{name}` cannot be used as a value"));
                    return self.invalid(span);
                }
                TExpr::new(
                    TExprKind::FunctionRef(info.qualified),
                    Type::Function(Box::new(info.sig)),
                    span,
                )
            }
            SymbolKind::Type | SymbolKind::Argument => {
                self.error(span, format!("`{name}` is a type, not a value"));
                self.invalid(span)
            }
        }
    }

    /// Thread an outer variable through every closure between its owner and
    /// the current scope; returns the slot in the innermost closure.
    pub(super) fn capture_chain(
        &mut self,
        name: &str,
        ty: &Type,
        mut local: LocalId,
        closures: &[ScopeId],
    ) -> LocalId {
        for closure in closures.iter().rev() {
            local = self.scopes.capture(*closure, name, ty.clone(), local);
        }
        local
    }

    fn check_list(&mut self, items: &[Expr], expected: Option<&Type>, span: Span) -> TExpr {
        let hint = match expected.map(|ty| self.types.resolve(ty)) {
            Some(Type::List(of)) => Some(*of),
            _ => None,
        };
        // A hint still holding unbound variables guides the items but does
        // not fix the element type.
        let mut element = hint.clone().filter(|ty| !self.types.has_unbound(ty));
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let checked = self.check_expr(item, element.as_ref().or(hint.as_ref()));
            if let Some(ty) = element.clone() {
                if !self.types.unify(&checked.ty, &ty) {
                    let found = self.types.resolve(&checked.ty);
                    self.error(
                        checked.span,
                        format!("list elements must share one type: expected `{ty}`, found `{found}`"),
                    );
                }
            } else {
                element = Some(self.types.resolve(&checked.ty));
            }
            out.push(checked);
        }
        let element = match element.or(hint) {
            Some(ty) => self.types.resolve(&ty),
            None => self.types.placeholder(),
        };
        TExpr::new(TExprKind::List(out), Type::list(element), span)
    }

    fn check_map(&mut self, entries: &[(Expr, Expr)], expected: Option<&Type>, span: Span) -> TExpr {
        let (key_hint, value_hint) = match expected.map(|ty| self.types.resolve(ty)) {
            Some(Type::Map(key, value)) => (Some(*key), Some(*value)),
            _ => (None, None),
        };
        let mut key_ty = key_hint.clone().filter(|ty| !self.types.has_unbound(ty));
        let mut value_ty = value_hint.clone().filter(|ty| !self.types.has_unbound(ty));
        let mut out = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            let key = self.check_expr(key, key_ty.as_ref().or(key_hint.as_ref()));
            let value = self.check_expr(value, value_ty.as_ref().or(value_hint.as_ref()));
            for (checked, slot, what) in [(&key, &mut key_ty, "key"), (&value, &mut value_ty, "value")] {
                if let Some(ty) = slot.clone() {
                    if !self.types.unify(&checked.ty, &ty) {
                        let found = self.types.resolve(&checked.ty);
                        self.error(
                            checked.span,
                            format!("map {what}s must share one type: expected `{ty}`, found `{found}`"),
                        );
                    }
                } else {
                    *slot = Some(self.types.resolve(&checked.ty));
                }
            }
            out.push((key, value));
        }
        let key = match key_ty.or(key_hint) {
            Some(ty) => self.types.resolve(&ty),
            None => self.types.placeholder(),
        };
        let value = match value_ty.or(value_hint) {
            Some(ty) => self.types.resolve(&ty),
            None => self.types.placeholder(),
        };
        TExpr::new(
            TExprKind::Map(out),
            Type::Map(Box::new(key), Box::new(value)),
            span,
        )
    }

    fn check_unary(&mut self, op: UnaryOp, operand: &Expr, span: Span) -> TExpr {
        let operand = self.check_expr(operand, None);
        let ty = self.types.resolve(&operand.ty);
        let ok = match op {
            UnaryOp::Neg => matches!(ty, Type::Int | Type::Float | Type::Var(_)),
            UnaryOp::Not => matches!(ty, Type::Bool | Type::Var(_)),
        };
        if !ok {
            let symbol = match op {
                UnaryOp::Neg => "-",
                UnaryOp::Not => "not",
            };
            self.error(span, format!("operator `{symbol}` cannot be applied to `{ty}`"));
            return self.invalid(span);
        }
        TExpr::new(
            TExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            ty,
            span,
        )
    }

    fn check_binary(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr, span: Span) -> TExpr {
        let lhs = self.check_expr(lhs, None);
        let lhs_ty = self.types.resolve(&lhs.ty);
        let rhs = self.check_expr(rhs, Some(&lhs_ty));
        let rhs_ty = self.types.resolve(&rhs.ty);

        let same = self.types.unify(&rhs_ty, &lhs_ty);
        let operand = self.types.resolve(&lhs_ty);
        let result = match op {
            BinaryOp::Add if same && matches!(operand, Type::Int | Type::Float | Type::Str | Type::Var(_)) => {
                Some(operand)
            }
            BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod
                if same && matches!(operand, Type::Int | Type::Float | Type::Var(_)) =>
            {
                Some(operand)
            }
            BinaryOp::Eq | BinaryOp::Ne if same && !operand.is_void() => Some(Type::Bool),
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
                if same && matches!(operand, Type::Int | Type::Float | Type::Str | Type::Var(_)) =>
            {
                Some(Type::Bool)
            }
            BinaryOp::And | BinaryOp::Or if same && matches!(operand, Type::Bool | Type::Var(_)) => {
                Some(Type::Bool)
            }
            _ => None,
        };
        let Some(ty) = result else {
            self.error(
                span,
                format!(
                    "operator `{}` cannot be applied to `{lhs_ty}` and `{rhs_ty}`",
                    op.symbol()
                ),
            );
            return self.invalid(span);
        };
        TExpr::new(
            TExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            ty,
            span,
        )
    }

    fn check_field(&mut self, target: &Expr, field: &Ident, span: Span) -> TExpr {
        let target = self.check_expr(target, None);
        let ty = self.types.resolve(&target.ty);
        let Type::Struct(name) = ty else {
            if !matches!(ty, Type::Var(_)) {
                self.error(field.span, format!("`{ty}` has no field `{}`", field.name));
            }
            return self.invalid(span);
        };
        let Some((index, field_ty)) = self.struct_field(&name, field) else {
            return self.invalid(span);
        };
        TExpr::new(
            TExprKind::Field {
                target: Box::new(target),
                index,
            },
            field_ty,
            span,
        )
    }

    /// Position and type of a struct field, reporting unknown fields.
    pub(super) fn struct_field(&mut self, struct_name: &str, field: &Ident) -> Option<(u32, Type)> {
        let found = self
            .session
            .structs
            .get(struct_name)
            .and_then(|def| def.fields.get_full(&field.name))
            .map(|(index, _, ty)| (index as u32, ty.clone()));
        if found.is_none() {
            self.error(
                field.span,
                format!("struct `{struct_name}` has no field `{}`", field.name),
            );
        }
        found
    }

    fn check_struct_lit(&mut self, name: &Ident, fields: &[(Ident, Expr)], span: Span) -> TExpr {
        let Some(qualified) = self.struct_of(&name.name) else {
            self.error(name.span, format!("unknown struct `{}`", name.name));
            return self.invalid(span);
        };
        let declared = self
            .session
            .structs
            .get(&qualified)
            .map(|def| def.fields.clone())
            .unwrap_or_default();

        let mut values: Vec<Option<TExpr>> = vec![None; declared.len()];
        for (field, value) in fields {
            let Some((index, _, field_ty)) = declared.get_full(&field.name) else {
                self.error(
                    field.span,
                    format!("struct `{}` has no field `{}`", name.name, field.name),
                );
                continue;
            };
            let value = self.check_expr(value, Some(field_ty));
            self.expect_type(&value, field_ty);
            if values[index].is_some() {
                self.error(field.span, format!("field `{}` is set twice", field.name));
            }
            values[index] = Some(value);
        }

        let mut out = Vec::with_capacity(values.len());
        let mut missing = Vec::new();
        for ((field, _), value) in declared.iter().zip(values) {
            match value {
                Some(value) => out.push(value),
                None => missing.push(format!("`{field}`")),
            }
        }
        if !missing.is_empty() {
            self.error(
                span,
                format!("missing field(s) {} in `{}`", missing.join(", "), name.name),
            );
            return self.invalid(span);
        }
        TExpr::new(
            TExprKind::StructLit {
                name: qualified.clone(),
                fields: out,
            },
            Type::Struct(qualified),
            span,
        )
    }

    fn check_if(
        &mut self,
        branches: &[(Expr, Block)],
        else_block: Option<&Block>,
        expected: Option<&Type>,
        span: Span,
    ) -> TExpr {
        let mut expected = expected.cloned();
        let mut checked = Vec::with_capacity(branches.len());
        let mut blocks_ty = Vec::new();
        for (cond, block) in branches {
            let at = value_span(block, span);
            let cond = self.check_condition(cond, "`if` condition");
            let block = self.check_block(block, expected.as_ref());
            if expected.is_none() && block.produces_value() {
                expected = Some(block.ty.clone());
            }
            blocks_ty.push((block.ty.clone(), at));
            checked.push((cond, block));
        }
        let else_checked = else_block.map(|block| {
            let checked = self.check_block(block, expected.as_ref());
            blocks_ty.push((checked.ty.clone(), value_span(block, span)));
            checked
        });

        let ty = match &else_checked {
            Some(_) => self.join_branch_types(&blocks_ty, "`if` branches"),
            None => Type::Void,
        };
        let mut expr = TExpr::new(
            TExprKind::If {
                branches: checked,
                else_block: else_checked,
            },
            ty.clone(),
            span,
        );
        if ty.is_void()
            && let TExprKind::If {
                branches,
                else_block,
            } = &mut expr.kind
        {
            for (_, block) in branches.iter_mut() {
                block.ty = Type::Void;
            }
            if let Some(block) = else_block {
                block.ty = Type::Void;
            }
        }
        expr
    }

    /// Common type of the branches of an `if`/`match`; `Void` when any
    /// branch yields nothing.
    pub(super) fn join_branch_types(&mut self, branches: &[(Type, Span)], what: &str) -> Type {
        let Some((first, _)) = branches.first() else {
            return Type::Void;
        };
        if branches.iter().any(|(ty, _)| ty.is_void()) {
            return Type::Void;
        }
        let first = first.clone();
        for (ty, at) in &branches[1..] {
            if !self.types.unify(ty, &first) {
                let expected = self.types.resolve(&first);
                let found = self.types.resolve(ty);
                self.error(
                    *at,
                    format!("{what} have different types: expected `{expected}`, found `{found}`"),
                );
                return Type::Void;
            }
        }
        self.types.resolve(&first)
    }

    fn check_closure(
        &mut self,
        params: &[Param],
        ret: Option<&TypeExpr>,
        body: &Block,
        span: Span,
    ) -> TExpr {
        let sig = FunctionDef::new(
            "",
            params
                .iter()
                .map(|param| ParamDef {
                    name: param.name.name.clone(),
                    ty: self.resolve_type_expr(&param.ty),
                    mutable: param.mutable,
                })
                .collect(),
            ret.map_or(Type::Void, |ty| self.resolve_type_expr(ty)),
        );

        self.closure_counter += 1;
        let name = format!("{}$closure{}", self.current_function, self.closure_counter);

        let scope = self.scopes.push(self.scope, ScopeKind::Closure);
        self.scopes.set_expected_return(scope, sig.ret.clone());
        let param_locals: Vec<LocalId> = sig
            .params
            .iter()
            .map(|param| self.scopes.add(scope, &param.name, param.ty.clone(), param.mutable))
            .collect();

        let saved_function = std::mem::replace(&mut self.current_function, name.clone());
        let saved_scope = std::mem::replace(&mut self.scope, scope);
        let saved_loops = std::mem::replace(&mut self.loop_depth, 0);
        let checked_body = self.check_body(&body.stmts, body.span, &sig.ret, "closure");
        self.loop_depth = saved_loops;
        self.scope = saved_scope;
        self.current_function = saved_function;

        let captures = self.scopes.captures(scope).to_vec();
        self.session.functions.push(CheckedFunction {
            name: name.clone(),
            params: param_locals,
            captures: captures.iter().map(|capture| capture.inner).collect(),
            local_count: self.scopes.local_count(scope),
            returns_value: !sig.ret.is_void(),
            body: checked_body,
            span,
        });

        TExpr::new(
            TExprKind::Closure {
                function: name,
                captures: captures.iter().map(|capture| capture.outer).collect(),
            },
            Type::Function(Box::new(sig)),
            span,
        )
    }
}

/// Span of the statement producing a block's value.
pub(super) fn value_span(block: &Block, fallback: Span) -> Span {
    block.stmts.last().map_or(fallback, |stmt| stmt.span)
}
