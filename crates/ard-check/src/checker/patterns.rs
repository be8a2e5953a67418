use super::Checker;
use super::exprs::value_span;
use crate::checked::{TArm, TExpr, TExprKind, TPattern};
use crate::scope::ScopeKind;
use crate::types::Type;
use ard_ast::{Expr, MatchArm, Pattern, Span, Stmt};

/// Which values a `match` has handled so far.
#[derive(Default)]
struct Coverage {
    wildcard: bool,
    bools: [bool; 2],
    some: bool,
    none: bool,
    ok: bool,
    err: bool,
    members: Vec<String>,
    literals: Vec<TPattern>,
}

impl Checker<'_, '_> {
    pub(super) fn check_match(
        &mut self,
        subject: &Expr,
        arms: &[MatchArm],
        expected: Option<&Type>,
        span: Span,
    ) -> TExpr {
        let subject = self.check_expr(subject, None);
        let subject_ty = self.types.resolve(&subject.ty);
        if matches!(subject_ty, Type::Var(_)) {
            return self.invalid(span);
        }
        if !matches!(
            subject_ty,
            Type::Bool | Type::Int | Type::Str | Type::Maybe(_) | Type::Result(..) | Type::Union(_)
        ) {
            self.error(subject.span, format!("cannot match on a value of type `{subject_ty}`"));
            return self.invalid(span);
        }

        let mut expected = expected.cloned();
        let mut coverage = Coverage::default();
        let mut checked = Vec::with_capacity(arms.len());
        let mut arm_types = Vec::with_capacity(arms.len());
        for arm in arms {
            if coverage.wildcard {
                self.warn(arm.span, "unreachable match arm: an earlier `_` matches everything");
                continue;
            }
            let Some((pattern, binding_ty, binding_name)) =
                self.check_pattern(&arm.pattern, &subject_ty, arm.span)
            else {
                continue;
            };
            if !coverage.add(&pattern) {
                self.warn(arm.span, "unreachable match arm: this pattern is already covered");
                continue;
            }

            let at = value_span(&arm.body, arm.span);
            let (binding, body) = self.with_scope(ScopeKind::Block, |checker, scope| {
                let binding = binding_ty.map(|ty| checker.scopes.add(scope, &binding_name, ty, false));
                let stmts: Vec<&Stmt> = arm.body.stmts.iter().collect();
                (binding, checker.check_stmts(&stmts, expected.as_ref()))
            });
            if expected.is_none() && body.produces_value() {
                expected = Some(body.ty.clone());
            }
            arm_types.push((body.ty.clone(), at));
            checked.push(TArm {
                pattern,
                binding,
                body,
            });
        }

        if let Some(missing) = coverage.missing(&subject_ty) {
            self.error(
                span,
                format!("match on `{subject_ty}` is not exhaustive: missing {missing}"),
            );
        }

        let ty = self.join_branch_types(&arm_types, "match arms");
        if ty.is_void() {
            for arm in &mut checked {
                arm.body.ty = Type::Void;
            }
        }
        TExpr::new(
            TExprKind::Match {
                subject: Box::new(subject),
                arms: checked,
            },
            ty,
            span,
        )
    }

    /// Lower one pattern against the subject type. Returns the pattern, the
    /// type of the value it binds (if any) and the binding name.
    fn check_pattern(
        &mut self,
        pattern: &Pattern,
        subject: &Type,
        span: Span,
    ) -> Option<(TPattern, Option<Type>, String)> {
        let unbound = |p: TPattern| Some((p, None, String::new()));
        match (pattern, subject) {
            (Pattern::Wildcard, _) => unbound(TPattern::Wildcard),
            (Pattern::Bool(value), Type::Bool) => unbound(TPattern::Bool(*value)),
            (Pattern::Int(value), Type::Int) => unbound(TPattern::Int(*value)),
            (Pattern::Str(value), Type::Str) => unbound(TPattern::Str(value.clone())),
            (Pattern::Name(name), Type::Maybe(of)) => {
                Some((TPattern::Some, Some((**of).clone()), name.name.clone()))
            }
            (Pattern::Ok(name), Type::Result(val, _)) => {
                Some((TPattern::Ok, Some((**val).clone()), name.name.clone()))
            }
            (Pattern::Err(name), Type::Result(_, err)) => {
                Some((TPattern::Err, Some((**err).clone()), name.name.clone()))
            }
            (Pattern::Name(name), Type::Union(union)) => {
                let member = self.named_type(&name.name, name.span);
                if matches!(member, Type::Var(_)) {
                    return None;
                }
                let tag = member.tag().filter(|_| union.variants.contains(&member));
                let Some(tag) = tag else {
                    self.error(
                        name.span,
                        format!("`{}` is not a member of `{}`", name.name, union.name),
                    );
                    return None;
                };
                Some((TPattern::Type(tag), Some(member), "it".to_string()))
            }
            _ => {
                self.error(
                    span,
                    format!("this pattern cannot match a value of type `{subject}`"),
                );
                None
            }
        }
    }
}

impl Coverage {
    /// Record a pattern; false when it can never match.
    fn add(&mut self, pattern: &TPattern) -> bool {
        match pattern {
            TPattern::Wildcard => {
                self.wildcard = true;
                true
            }
            TPattern::Bool(value) => !std::mem::replace(&mut self.bools[*value as usize], true),
            TPattern::Some => !std::mem::replace(&mut self.some, true),
            TPattern::None => !std::mem::replace(&mut self.none, true),
            TPattern::Ok => !std::mem::replace(&mut self.ok, true),
            TPattern::Err => !std::mem::replace(&mut self.err, true),
            TPattern::Type(tag) => {
                if self.members.contains(tag) {
                    return false;
                }
                self.members.push(tag.clone());
                true
            }
            TPattern::Int(_) | TPattern::Str(_) => {
                if self.literals.contains(pattern) {
                    return false;
                }
                self.literals.push(pattern.clone());
                true
            }
        }
    }

    /// Description of the unhandled cases, if any.
    fn missing(&self, subject: &Type) -> Option<String> {
        if self.wildcard {
            return None;
        }
        let missing: Vec<String> = match subject {
            Type::Bool => [false, true]
                .into_iter()
                .filter(|value| !self.bools[*value as usize])
                .map(|value| format!("`{value}`"))
                .collect(),
            Type::Maybe(_) => {
                let mut cases = Vec::new();
                if !self.some {
                    cases.push("a binding for the present value".to_string());
                }
                if !self.none {
                    cases.push("`_` for the absent value".to_string());
                }
                cases
            }
            Type::Result(..) => {
                let mut cases = Vec::new();
                if !self.ok {
                    cases.push("`ok(..)`".to_string());
                }
                if !self.err {
                    cases.push("`err(..)`".to_string());
                }
                cases
            }
            Type::Union(union) => union
                .variants
                .iter()
                .filter_map(Type::tag)
                .filter(|tag| !self.members.contains(tag))
                .map(|tag| format!("`{tag}`"))
                .collect(),
            _ => vec!["`_`".to_string()],
        };
        if missing.is_empty() {
            None
        } else {
            Some(missing.join(", "))
        }
    }
}
