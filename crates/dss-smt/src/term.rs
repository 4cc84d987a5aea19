//! Terms over SSA-indexed program variables.
//!
//! CFA edges carry terms whose variables all have index 0; the reachability
//! domain instantiates them against the current [`SsaMap`] while building
//! path formulas.

use crate::ssa::SsaMap;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Sort of a variable or term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Sort {
    Bool,
    Int,
}

/// A program variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Var {
    name: Arc<str>,
    sort: Sort,
}

impl Var {
    pub fn new(name: impl Into<Arc<str>>, sort: Sort) -> Self {
        Self {
            name: name.into(),
            sort,
        }
    }

    pub fn int(name: impl Into<Arc<str>>) -> Self {
        Self::new(name, Sort::Int)
    }

    pub fn bool(name: impl Into<Arc<str>>) -> Self {
        Self::new(name, Sort::Bool)
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn sort(&self) -> Sort {
        self.sort
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A variable at one SSA index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SsaVar {
    pub var: Var,
    pub index: i64,
}

impl SsaVar {
    pub fn new(var: Var, index: i64) -> Self {
        Self { var, index }
    }
}

impl fmt::Display for SsaVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.var, self.index)
    }
}

/// A concrete value of a term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Value {
    Bool(bool),
    Int(i64),
}

impl Value {
    pub fn as_bool(self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(b),
            Value::Int(_) => None,
        }
    }

    pub fn as_int(self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(n),
            Value::Bool(_) => None,
        }
    }
}

/// Quantifier-free term over booleans and linear integer arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    Bool(bool),
    Int(i64),
    Var(SsaVar),
    Not(Box<Term>),
    And(Vec<Term>),
    Or(Vec<Term>),
    Eq(Box<Term>, Box<Term>),
    Lt(Box<Term>, Box<Term>),
    Le(Box<Term>, Box<Term>),
    Add(Vec<Term>),
    Sub(Box<Term>, Box<Term>),
    /// Multiplication by a constant.
    Mul(i64, Box<Term>),
}

impl Term {
    #[inline]
    pub fn tt() -> Term {
        Term::Bool(true)
    }

    #[inline]
    pub fn ff() -> Term {
        Term::Bool(false)
    }

    pub fn int(n: i64) -> Term {
        Term::Int(n)
    }

    /// Reference to a program variable at index 0.
    pub fn var(var: &Var) -> Term {
        Term::Var(SsaVar::new(var.clone(), 0))
    }

    pub fn ssa(var: &Var, index: i64) -> Term {
        Term::Var(SsaVar::new(var.clone(), index))
    }

    /// Conjunction, flattening nested conjunctions and folding constants.
    pub fn conj(terms: impl IntoIterator<Item = Term>) -> Term {
        let mut parts = Vec::new();
        for t in terms {
            match t {
                Term::Bool(true) => {}
                Term::Bool(false) => return Term::ff(),
                Term::And(inner) => parts.extend(inner),
                other => parts.push(other),
            }
        }
        match parts.len() {
            0 => Term::tt(),
            1 => parts.pop().unwrap_or_else(Term::tt),
            _ => Term::And(parts),
        }
    }

    /// Disjunction, flattening nested disjunctions and folding constants.
    pub fn disj(terms: impl IntoIterator<Item = Term>) -> Term {
        let mut parts = Vec::new();
        for t in terms {
            match t {
                Term::Bool(false) => {}
                Term::Bool(true) => return Term::tt(),
                Term::Or(inner) => parts.extend(inner),
                other => parts.push(other),
            }
        }
        match parts.len() {
            0 => Term::ff(),
            1 => parts.pop().unwrap_or_else(Term::ff),
            _ => Term::Or(parts),
        }
    }

    pub fn and(self, other: Term) -> Term {
        Term::conj([self, other])
    }

    pub fn or(self, other: Term) -> Term {
        Term::disj([self, other])
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Term {
        match self {
            Term::Bool(b) => Term::Bool(!b),
            Term::Not(inner) => *inner,
            other => Term::Not(Box::new(other)),
        }
    }

    pub fn implies(self, other: Term) -> Term {
        self.not().or(other)
    }

    pub fn eq(self, other: Term) -> Term {
        Term::Eq(Box::new(self), Box::new(other))
    }

    pub fn lt(self, other: Term) -> Term {
        Term::Lt(Box::new(self), Box::new(other))
    }

    pub fn le(self, other: Term) -> Term {
        Term::Le(Box::new(self), Box::new(other))
    }

    pub fn gt(self, other: Term) -> Term {
        other.lt(self)
    }

    pub fn ge(self, other: Term) -> Term {
        other.le(self)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn add(self, other: Term) -> Term {
        match self {
            Term::Add(mut parts) => {
                parts.push(other);
                Term::Add(parts)
            }
            lhs => Term::Add(vec![lhs, other]),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn sub(self, other: Term) -> Term {
        Term::Sub(Box::new(self), Box::new(other))
    }

    pub fn scale(self, k: i64) -> Term {
        Term::Mul(k, Box::new(self))
    }

    /// Sort of this term. Variables report their declared sort.
    pub fn sort(&self) -> Sort {
        match self {
            Term::Bool(_)
            | Term::Not(_)
            | Term::And(_)
            | Term::Or(_)
            | Term::Eq(..)
            | Term::Lt(..)
            | Term::Le(..) => Sort::Bool,
            Term::Var(v) => v.var.sort(),
            Term::Int(_) | Term::Add(_) | Term::Sub(..) | Term::Mul(..) => Sort::Int,
        }
    }

    /// Rebuild the term with every variable replaced by `f(var)`.
    pub fn map_vars(&self, f: &mut impl FnMut(&SsaVar) -> Term) -> Term {
        match self {
            Term::Bool(_) | Term::Int(_) => self.clone(),
            Term::Var(v) => f(v),
            Term::Not(t) => Term::Not(Box::new(t.map_vars(f))),
            Term::And(ts) => Term::And(ts.iter().map(|t| t.map_vars(f)).collect()),
            Term::Or(ts) => Term::Or(ts.iter().map(|t| t.map_vars(f)).collect()),
            Term::Eq(a, b) => Term::Eq(Box::new(a.map_vars(f)), Box::new(b.map_vars(f))),
            Term::Lt(a, b) => Term::Lt(Box::new(a.map_vars(f)), Box::new(b.map_vars(f))),
            Term::Le(a, b) => Term::Le(Box::new(a.map_vars(f)), Box::new(b.map_vars(f))),
            Term::Add(ts) => Term::Add(ts.iter().map(|t| t.map_vars(f)).collect()),
            Term::Sub(a, b) => Term::Sub(Box::new(a.map_vars(f)), Box::new(b.map_vars(f))),
            Term::Mul(k, t) => Term::Mul(*k, Box::new(t.map_vars(f))),
        }
    }

    /// Bind every variable to its current index in `ssa`.
    pub fn instantiate(&self, ssa: &SsaMap) -> Term {
        self.map_vars(&mut |v| Term::ssa(&v.var, ssa.index(&v.var)))
    }

    /// Shift each variable's index by `delta(var)`.
    pub fn shift(&self, delta: impl Fn(&Var) -> i64) -> Term {
        self.map_vars(&mut |v| Term::ssa(&v.var, v.index + delta(&v.var)))
    }

    /// All SSA variables occurring in the term.
    pub fn vars(&self) -> BTreeSet<SsaVar> {
        let mut out = BTreeSet::new();
        self.collect_vars(&mut out);
        out
    }

    fn collect_vars(&self, out: &mut BTreeSet<SsaVar>) {
        match self {
            Term::Bool(_) | Term::Int(_) => {}
            Term::Var(v) => {
                out.insert(v.clone());
            }
            Term::Not(t) | Term::Mul(_, t) => t.collect_vars(out),
            Term::And(ts) | Term::Or(ts) | Term::Add(ts) => {
                for t in ts {
                    t.collect_vars(out);
                }
            }
            Term::Eq(a, b) | Term::Lt(a, b) | Term::Le(a, b) | Term::Sub(a, b) => {
                a.collect_vars(out);
                b.collect_vars(out);
            }
        }
    }

    /// Program variables occurring in the term, ignoring indices.
    pub fn program_vars(&self) -> BTreeSet<Var> {
        self.vars().into_iter().map(|v| v.var).collect()
    }

    /// Three-valued evaluation under a partial assignment.
    ///
    /// Returns `None` when the value depends on an unassigned variable or
    /// when integer arithmetic overflows.
    pub fn eval(&self, lookup: &impl Fn(&SsaVar) -> Option<Value>) -> Option<Value> {
        match self {
            Term::Bool(b) => Some(Value::Bool(*b)),
            Term::Int(n) => Some(Value::Int(*n)),
            Term::Var(v) => lookup(v),
            Term::Not(t) => t.eval(lookup)?.as_bool().map(|b| Value::Bool(!b)),
            Term::And(ts) => {
                let mut undecided = false;
                for t in ts {
                    match t.eval(lookup).and_then(Value::as_bool) {
                        Some(false) => return Some(Value::Bool(false)),
                        Some(true) => {}
                        None => undecided = true,
                    }
                }
                (!undecided).then_some(Value::Bool(true))
            }
            Term::Or(ts) => {
                let mut undecided = false;
                for t in ts {
                    match t.eval(lookup).and_then(Value::as_bool) {
                        Some(true) => return Some(Value::Bool(true)),
                        Some(false) => {}
                        None => undecided = true,
                    }
                }
                (!undecided).then_some(Value::Bool(false))
            }
            Term::Eq(a, b) => Some(Value::Bool(a.eval(lookup)? == b.eval(lookup)?)),
            Term::Lt(a, b) => {
                let (x, y) = (a.eval(lookup)?.as_int()?, b.eval(lookup)?.as_int()?);
                Some(Value::Bool(x < y))
            }
            Term::Le(a, b) => {
                let (x, y) = (a.eval(lookup)?.as_int()?, b.eval(lookup)?.as_int()?);
                Some(Value::Bool(x <= y))
            }
            Term::Add(ts) => {
                let mut sum = 0i64;
                for t in ts {
                    sum = sum.checked_add(t.eval(lookup)?.as_int()?)?;
                }
                Some(Value::Int(sum))
            }
            Term::Sub(a, b) => {
                let (x, y) = (a.eval(lookup)?.as_int()?, b.eval(lookup)?.as_int()?);
                x.checked_sub(y).map(Value::Int)
            }
            Term::Mul(k, t) => k.checked_mul(t.eval(lookup)?.as_int()?).map(Value::Int),
        }
    }

    /// Constant folding and boolean normalization.
    pub fn simplify(&self) -> Term {
        match self {
            Term::Bool(_) | Term::Int(_) | Term::Var(_) => self.clone(),
            Term::Not(t) => t.simplify().not(),
            Term::And(ts) => Term::conj(ts.iter().map(Term::simplify)),
            Term::Or(ts) => Term::disj(ts.iter().map(Term::simplify)),
            Term::Eq(a, b) => {
                let (a, b) = (a.simplify(), b.simplify());
                if a == b {
                    return Term::tt();
                }
                fold_or(a.clone().eq(b.clone()), &[a, b])
            }
            Term::Lt(a, b) => {
                let (a, b) = (a.simplify(), b.simplify());
                fold_or(a.clone().lt(b.clone()), &[a, b])
            }
            Term::Le(a, b) => {
                let (a, b) = (a.simplify(), b.simplify());
                if a == b {
                    return Term::tt();
                }
                fold_or(a.clone().le(b.clone()), &[a, b])
            }
            Term::Add(ts) => {
                let mut constant = 0i64;
                let mut rest = Vec::new();
                for t in ts.iter().map(Term::simplify) {
                    match t {
                        Term::Int(n) => match constant.checked_add(n) {
                            Some(c) => constant = c,
                            None => rest.push(Term::Int(n)),
                        },
                        Term::Add(inner) => rest.extend(inner),
                        other => rest.push(other),
                    }
                }
                if rest.is_empty() {
                    return Term::Int(constant);
                }
                if constant != 0 {
                    rest.push(Term::Int(constant));
                }
                if rest.len() == 1 {
                    rest.pop().unwrap_or(Term::Int(0))
                } else {
                    Term::Add(rest)
                }
            }
            Term::Sub(a, b) => {
                let (a, b) = (a.simplify(), b.simplify());
                match b {
                    Term::Int(0) => a,
                    b => fold_or(a.clone().sub(b.clone()), &[a, b]),
                }
            }
            Term::Mul(k, t) => match (k, t.simplify()) {
                (0, _) => Term::Int(0),
                (1, t) => t,
                (k, t) => fold_or(t.clone().scale(*k), &[t]),
            },
        }
    }

    /// Whether the term is the literal `true`.
    #[inline]
    pub fn is_true(&self) -> bool {
        matches!(self, Term::Bool(true))
    }

    /// Whether the term is the literal `false`.
    #[inline]
    pub fn is_false(&self) -> bool {
        matches!(self, Term::Bool(false))
    }
}

/// Evaluate `term` when all `operands` are literals, else return it unchanged.
fn fold_or(term: Term, operands: &[Term]) -> Term {
    if operands
        .iter()
        .all(|t| matches!(t, Term::Bool(_) | Term::Int(_)))
    {
        match term.eval(&|_| None) {
            Some(Value::Bool(b)) => Term::Bool(b),
            Some(Value::Int(n)) => Term::Int(n),
            None => term,
        }
    } else {
        term
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(f: &mut fmt::Formatter<'_>, ts: &[Term], sep: &str) -> fmt::Result {
            write!(f, "(")?;
            for (i, t) in ts.iter().enumerate() {
                if i > 0 {
                    write!(f, " {sep} ")?;
                }
                write!(f, "{t}")?;
            }
            write!(f, ")")
        }

        match self {
            Term::Bool(b) => write!(f, "{b}"),
            Term::Int(n) => write!(f, "{n}"),
            Term::Var(v) => write!(f, "{v}"),
            Term::Not(t) => write!(f, "!{t}"),
            Term::And(ts) => join(f, ts, "&&"),
            Term::Or(ts) => join(f, ts, "||"),
            Term::Eq(a, b) => write!(f, "({a} == {b})"),
            Term::Lt(a, b) => write!(f, "({a} < {b})"),
            Term::Le(a, b) => write!(f, "({a} <= {b})"),
            Term::Add(ts) => join(f, ts, "+"),
            Term::Sub(a, b) => write!(f, "({a} - {b})"),
            Term::Mul(k, t) => write!(f, "{k}*{t}"),
        }
    }
}
