use super::Checker;
use crate::checked::{TBlock, TExpr, TExprKind, TStmt};
use crate::scope::{ScopeKind, SymbolKind};
use crate::types::Type;
use ard_ast::{Block, Expr, ExprKind, Ident, Stmt, StmtKind};

impl Checker<'_, '_> {
    /// Check a brace block in a fresh child scope.
    pub(super) fn check_block(&mut self, block: &Block, expected: Option<&Type>) -> TBlock {
        self.with_scope(ScopeKind::Block, |checker, _| {
            let stmts: Vec<&Stmt> = block.stmts.iter().collect();
            checker.check_stmts(&stmts, expected)
        })
    }

    /// Check statements in the current scope. The block's type is the type of
    /// a trailing expression statement, `Void` otherwise.
    pub(super) fn check_stmts(&mut self, stmts: &[&Stmt], expected: Option<&Type>) -> TBlock {
        let mut out = Vec::with_capacity(stmts.len());
        let mut ty = Type::Void;
        let mut after_break = false;
        let mut warned = false;

        for (i, stmt) in stmts.iter().enumerate() {
            if after_break && !warned {
                self.warn(stmt.span, "unreachable statement");
                warned = true;
            }
            let is_last = i + 1 == stmts.len();
            match &stmt.kind {
                StmtKind::Expr(expr) if is_last => {
                    let texpr = self.check_expr(expr, expected);
                    ty = self.types.resolve(&texpr.ty);
                    out.push(TStmt::Expr(texpr));
                }
                StmtKind::Break => {
                    if self.loop_depth == 0 {
                        self.error(stmt.span, "`break` outside of a loop");
                    }
                    after_break = true;
                    out.push(TStmt::Break);
                }
                _ => {
                    if let Some(checked) = self.check_stmt(stmt) {
                        out.push(checked);
                    }
                }
            }
        }

        TBlock { stmts: out, ty }
    }

    fn check_stmt(&mut self, stmt: &Stmt) -> Option<TStmt> {
        match &stmt.kind {
            StmtKind::Let {
                name,
                mutable,
                ty,
                value,
            } => Some(self.check_let(name, *mutable, ty.as_ref(), value)),
            StmtKind::Assign { target, value } => self.check_assign(target, value),
            StmtKind::While { cond, body } => {
                let cond = self.check_condition(cond, "`while` condition");
                let body = self.check_loop_body(body, |_| {});
                Some(TStmt::While { cond, body })
            }
            StmtKind::ForRange {
                var,
                start,
                end,
                body,
            } => {
                let start = self.check_expr(start, Some(&Type::Int));
                let end = self.check_expr(end, Some(&Type::Int));
                for bound in [&start, &end] {
                    if !self.types.unify(&bound.ty, &Type::Int) {
                        let found = self.types.resolve(&bound.ty);
                        self.error(bound.span, format!("range bounds must be `Int`, found `{found}`"));
                    }
                }
                let mut local = None;
                let body = self.check_loop_body(body, |checker| {
                    local = Some(checker.declare_local(&var.name, Type::Int, false));
                });
                let var = local?;
                Some(TStmt::ForRange {
                    var,
                    start,
                    end,
                    body,
                })
            }
            StmtKind::ForIn { var, iter, body } => {
                let iter = self.check_expr(iter, None);
                let element = match self.types.resolve(&iter.ty) {
                    Type::List(of) => *of,
                    Type::Var(_) => self.types.placeholder(),
                    other => {
                        self.error(iter.span, format!("cannot iterate over `{other}`"));
                        self.types.placeholder()
                    }
                };
                let mut local = None;
                let body = self.check_loop_body(body, |checker| {
                    local = Some(checker.declare_local(&var.name, element, false));
                });
                let var = local?;
                Some(TStmt::ForIn { var, iter, body })
            }
            StmtKind::Break => Some(TStmt::Break),
            StmtKind::Function(_)
            | StmtKind::Extern(_)
            | StmtKind::Struct(_)
            | StmtKind::Impl(_)
            | StmtKind::Union(_) => {
                self.error(stmt.span, "declarations are only allowed at the top level");
                None
            }
            StmtKind::Expr(expr) => {
                let mut texpr = self.check_expr(expr, None);
                if let TExprKind::If { .. } | TExprKind::Match { .. } = texpr.kind {
                    discard_branch_values(&mut texpr);
                }
                Some(TStmt::Expr(texpr))
            }
        }
    }

    fn check_loop_body(&mut self, body: &Block, declare: impl FnOnce(&mut Self)) -> TBlock {
        self.loop_depth += 1;
        let mut block = self.with_scope(ScopeKind::Block, |checker, _| {
            declare(checker);
            let stmts: Vec<&Stmt> = body.stmts.iter().collect();
            checker.check_stmts(&stmts, None)
        });
        self.loop_depth -= 1;
        block.ty = Type::Void;
        block
    }

    pub(super) fn check_condition(&mut self, cond: &Expr, what: &str) -> TExpr {
        let cond = self.check_expr(cond, Some(&Type::Bool));
        if !self.types.unify(&cond.ty, &Type::Bool) {
            let found = self.types.resolve(&cond.ty);
            self.error(cond.span, format!("{what} must be `Bool`, found `{found}`"));
        }
        cond
    }

    fn check_let(&mut self, name: &Ident, mutable: bool, ty: Option<&ard_ast::TypeExpr>, value: &Expr) -> TStmt {
        let annotation = ty.map(|ty| self.resolve_type_expr(ty));
        let value = self.check_expr(value, annotation.as_ref());
        if value.ty.is_void() {
            self.error(value.span, format!("cannot bind `{}` to a value of type `Void`", name.name));
        }

        let ty = match annotation {
            Some(annotation) => {
                if !self.types.unify(&value.ty, &annotation) {
                    let found = self.types.resolve(&value.ty);
                    self.error(
                        value.span,
                        format!("type mismatch: expected `{annotation}`, found `{found}`"),
                    );
                }
                annotation
            }
            None => self.types.resolve(&value.ty),
        };
        let local = self.declare_local(&name.name, ty, mutable);
        TStmt::Let { local, value }
    }

    fn check_assign(&mut self, target: &Expr, value: &Expr) -> Option<TStmt> {
        match &target.kind {
            ExprKind::Ident(name) => {
                let (local, ty, mutable) = self.variable(name, target.span)?;
                let value = self.check_expr(value, Some(&ty));
                if !mutable {
                    self.error(target.span, format!("cannot assign to immutable variable `{name}`"));
                }
                self.expect_type(&value, &ty);
                Some(TStmt::Assign { local, value })
            }
            ExprKind::Field { target: base, field } => {
                let ExprKind::Ident(name) = &base.kind else {
                    self.error(target.span, "only fields of a variable can be assigned");
                    return None;
                };
                let (local, ty, mutable) = self.variable(name, base.span)?;
                let Type::Struct(struct_name) = self.types.resolve(&ty) else {
                    self.error(base.span, format!("`{name}` is not a struct"));
                    return None;
                };
                let (index, field_ty) = self.struct_field(&struct_name, field)?;
                let value = self.check_expr(value, Some(&field_ty));
                if !mutable {
                    self.error(target.span, format!("cannot assign to a field of immutable variable `{name}`"));
                }
                self.expect_type(&value, &field_ty);
                Some(TStmt::SetField { local, index, value })
            }
            _ => {
                self.error(target.span, "invalid assignment target");
                None
            }
        }
    }

    /// Resolve a variable for writing: `(slot, type, mutable)`.
    pub(super) fn variable(
        &mut self,
        name: &str,
        span: ard_ast::Span,
    ) -> Option<(crate::checked::LocalId, Type, bool)> {
        let Some(resolved) = self.scopes.resolve(self.scope, name) else {
            self.error(span, format!("undefined name `{name}`"));
            return None;
        };
        match resolved.symbol.kind {
            SymbolKind::Variable(local) => {
                if !resolved.closures.is_empty() {
                    // Captured copies are read-only.
                    let local = self.capture_chain(name, &resolved.symbol.ty, local, &resolved.closures);
                    return Some((local, resolved.symbol.ty, false));
                }
                Some((local, resolved.symbol.ty, resolved.symbol.mutable))
            }
            _ => {
                self.error(span, format!("`{name}` is not a variable"));
                None
            }
        }
    }

    /// Report a mismatch between a checked value and the type it must have.
    pub(super) fn expect_type(&mut self, value: &TExpr, expected: &Type) -> bool {
        if self.types.unify(&value.ty, expected) {
            return true;
        }
        let found = self.types.resolve(&value.ty);
        let expected = self.types.resolve(expected);
        self.error(
            value.span,
            format!("type mismatch: expected `{expected}`, found `{found}`"),
        );
        false
    }
}

/// An `if` or `match` used as a statement leaves nothing on the stack.
fn discard_branch_values(expr: &mut TExpr) {
    match &mut expr.kind {
        TExprKind::If {
            branches,
            else_block,
        } => {
            for (_, block) in branches.iter_mut() {
                block.ty = Type::Void;
            }
            if let Some(block) = else_block {
                block.ty = Type::Void;
            }
        }
        TExprKind::Match { arms, .. } => {
            for arm in arms.iter_mut() {
                arm.body.ty = Type::Void;
            }
        }
        _ => return,
    }
    expr.ty = Type::Void;
}
