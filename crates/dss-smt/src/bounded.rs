//! Bounded enumeration backend.
//!
//! Decides satisfiability by backtracking over assignments, with integer
//! variables ranging over `[int_min, int_max]`. Top-level disjunctions are
//! split into cases first, so each search runs over a plain conjunction.
//! Inside a case, equalities `v = e` define `v` in terms of the other
//! variables. Defined variables are searched after the variables they depend
//! on, which forces their value instead of enumerating it.
//!
//! A search that finds no model answers `Unsat` only when the range could
//! not have hidden one: every enumerated integer variable is either bounded
//! inside the range by the formula itself, or only compared against
//! constants strictly inside the range. Otherwise the answer is `Unknown`,
//! as it is when the assignment budget runs out or arithmetic overflows.

use crate::solver::{SatResult, Solver};
use crate::term::{Sort, SsaVar, Term, Value};
use crate::{SmtError, SmtResult};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, trace};

/// Configuration for [`BoundedSolver`].
#[derive(Debug, Clone)]
pub struct BoundedSolverConfig {
    /// Smallest enumerated integer value.
    pub int_min: i64,
    /// Largest enumerated integer value.
    pub int_max: i64,
    /// Maximum number of tried assignments and case splits per query.
    pub max_assignments: u64,
}

impl Default for BoundedSolverConfig {
    fn default() -> Self {
        Self {
            int_min: -16,
            int_max: 16,
            max_assignments: 2_000_000,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BoundedSolver {
    config: BoundedSolverConfig,
}

impl BoundedSolver {
    pub fn new(config: BoundedSolverConfig) -> Self {
        Self { config }
    }

    pub fn with_range(int_min: i64, int_max: i64) -> Self {
        Self::new(BoundedSolverConfig {
            int_min,
            int_max,
            ..Default::default()
        })
    }

    pub fn config(&self) -> &BoundedSolverConfig {
        &self.config
    }

    /// Split on the first disjunction among `conjuncts` and decide each case.
    fn split(&self, conjuncts: Vec<Term>, budget: &mut u64) -> Result<SatResult, Exhausted> {
        let mut flat = Vec::with_capacity(conjuncts.len());
        let mut cases = None;
        for t in conjuncts {
            flatten(t, &mut flat, &mut cases);
        }
        let Some(cases) = cases else {
            return self.search(flat, budget);
        };

        let mut undecided = false;
        for case in cases {
            spend(budget)?;
            let mut branch = flat.clone();
            branch.push(case);
            match self.split(branch, budget)? {
                SatResult::Sat => return Ok(SatResult::Sat),
                SatResult::Unknown => undecided = true,
                SatResult::Unsat => {}
            }
        }
        Ok(if undecided {
            SatResult::Unknown
        } else {
            SatResult::Unsat
        })
    }

    fn search(&self, conjuncts: Vec<Term>, budget: &mut u64) -> Result<SatResult, Exhausted> {
        let term = Term::conj(conjuncts.iter().cloned());
        let definitions = Definitions::collect(&conjuncts);
        let vars = definitions.search_order(&term);

        let mut search = Search {
            term: &term,
            conjuncts: &conjuncts,
            vars,
            assignment: HashMap::new(),
            config: &self.config,
            budget,
            undecided: false,
            enumerated: HashSet::new(),
        };
        if search.run(0)? {
            return Ok(SatResult::Sat);
        }
        if search.undecided {
            return Ok(SatResult::Unknown);
        }
        let range = (self.config.int_min, self.config.int_max);
        if exhaustive(&term, &conjuncts, &definitions, &search.enumerated, range) {
            Ok(SatResult::Unsat)
        } else {
            trace!(
                enumerated = search.enumerated.len(),
                "no model in range, outside not ruled out"
            );
            Ok(SatResult::Unknown)
        }
    }
}

/// Search ran out of its assignment budget.
struct Exhausted;

fn spend(budget: &mut u64) -> Result<(), Exhausted> {
    *budget = budget.checked_sub(1).ok_or(Exhausted)?;
    Ok(())
}

/// Collect the conjuncts of `term` into `flat`, pushing negations through
/// disjunctions. The first disjunction met becomes `cases`.
fn flatten(term: Term, flat: &mut Vec<Term>, cases: &mut Option<Vec<Term>>) {
    match term {
        Term::Bool(true) => {}
        Term::And(parts) => {
            for t in parts {
                flatten(t, flat, cases);
            }
        }
        Term::Or(parts) if cases.is_none() => *cases = Some(parts),
        Term::Not(inner) => match *inner {
            Term::Or(parts) => {
                for t in parts {
                    flatten(t.not(), flat, cases);
                }
            }
            Term::And(parts) if cases.is_none() => {
                *cases = Some(parts.into_iter().map(Term::not).collect());
            }
            other => flat.push(other.not()),
        },
        other => flat.push(other),
    }
}

struct Search<'a> {
    term: &'a Term,
    conjuncts: &'a [Term],
    vars: Vec<SsaVar>,
    assignment: HashMap<SsaVar, Value>,
    config: &'a BoundedSolverConfig,
    budget: &'a mut u64,
    /// A complete assignment left the term undecided (overflow).
    undecided: bool,
    /// Integer variables that were enumerated over the range somewhere.
    enumerated: HashSet<SsaVar>,
}

impl Search<'_> {
    fn lookup(&self) -> impl Fn(&SsaVar) -> Option<Value> + '_ {
        |v| self.assignment.get(v).copied()
    }

    fn run(&mut self, depth: usize) -> Result<bool, Exhausted> {
        match self.term.eval(&self.lookup()) {
            Some(Value::Bool(true)) => return Ok(true),
            Some(_) => return Ok(false),
            None => {}
        }
        if depth == self.vars.len() {
            self.undecided = true;
            return Ok(false);
        }

        let var = self.vars[depth].clone();
        let candidates = match self.forced(&var) {
            Some(value) => vec![value],
            None => match var.var.sort() {
                Sort::Bool => vec![Value::Bool(false), Value::Bool(true)],
                Sort::Int => {
                    self.enumerated.insert(var.clone());
                    (self.config.int_min..=self.config.int_max)
                        .map(Value::Int)
                        .collect()
                }
            },
        };

        for value in candidates {
            spend(self.budget)?;
            self.assignment.insert(var.clone(), value);
            if self.run(depth + 1)? {
                return Ok(true);
            }
        }
        self.assignment.remove(&var);
        Ok(false)
    }

    /// Value implied by a top-level equality, if any.
    fn forced(&self, var: &SsaVar) -> Option<Value> {
        let lookup = self.lookup();
        for c in self.conjuncts {
            if let Term::Eq(l, r) = c {
                let other = match (l.as_ref(), r.as_ref()) {
                    (Term::Var(v), other) if v == var => other,
                    (other, Term::Var(v)) if v == var => other,
                    _ => continue,
                };
                match (other.eval(&lookup), var.var.sort()) {
                    (Some(v @ Value::Int(_)), Sort::Int) | (Some(v @ Value::Bool(_)), Sort::Bool) => {
                        return Some(v)
                    }
                    _ => {}
                }
            }
        }
        None
    }
}

/// Integer linear form `constant + sum(coeff * var)`.
#[derive(Debug, Clone, Default, PartialEq)]
struct Linear {
    constant: i128,
    coeffs: BTreeMap<SsaVar, i128>,
}

impl Linear {
    /// Linear form of an integer term with defined variables replaced by
    /// their definitions. `None` for non-integer terms and on overflow.
    fn of(term: &Term, defs: &HashMap<SsaVar, Linear>) -> Option<Linear> {
        match term {
            Term::Int(n) => Some(Linear {
                constant: i128::from(*n),
                ..Default::default()
            }),
            Term::Var(v) if v.var.sort() == Sort::Int => Some(match defs.get(v) {
                Some(def) => def.clone(),
                None => Linear {
                    constant: 0,
                    coeffs: BTreeMap::from([(v.clone(), 1)]),
                },
            }),
            Term::Add(ts) => ts
                .iter()
                .try_fold(Linear::default(), |acc, t| acc.add_scaled(&Linear::of(t, defs)?, 1)),
            Term::Sub(a, b) => Linear::of(a, defs)?.add_scaled(&Linear::of(b, defs)?, -1),
            Term::Mul(k, t) => Linear::default().add_scaled(&Linear::of(t, defs)?, i128::from(*k)),
            _ => None,
        }
    }

    /// `a - b` for a comparison `a ~ b`.
    fn difference(a: &Term, b: &Term, defs: &HashMap<SsaVar, Linear>) -> Option<Linear> {
        Linear::of(a, defs)?.add_scaled(&Linear::of(b, defs)?, -1)
    }

    /// `self + k * other`.
    fn add_scaled(mut self, other: &Linear, k: i128) -> Option<Linear> {
        self.constant = self.constant.checked_add(other.constant.checked_mul(k)?)?;
        for (v, c) in &other.coeffs {
            let sum = self
                .coeffs
                .get(v)
                .copied()
                .unwrap_or(0)
                .checked_add(c.checked_mul(k)?)?;
            if sum == 0 {
                self.coeffs.remove(v);
            } else {
                self.coeffs.insert(v.clone(), sum);
            }
        }
        Some(self)
    }

    /// The variable and its coefficient, if exactly one variable remains.
    fn single(&self) -> Option<(&SsaVar, i128)> {
        let mut it = self.coeffs.iter();
        match (it.next(), it.next()) {
            (Some((v, &k)), None) => Some((v, k)),
            _ => None,
        }
    }
}

/// Integer variables fixed by top-level equalities, each as a linear form
/// over the variables that stay free.
#[derive(Debug, Default)]
struct Definitions {
    forms: HashMap<SsaVar, Linear>,
    /// Variables of the equality each definition came from.
    deps: HashMap<SsaVar, Vec<SsaVar>>,
    defined: Vec<SsaVar>,
}

impl Definitions {
    fn collect(conjuncts: &[Term]) -> Self {
        let mut defs = Definitions::default();
        for c in conjuncts {
            let Term::Eq(l, r) = c else { continue };
            if l.sort() != Sort::Int {
                continue;
            }
            let (l, r) = (l.as_ref(), r.as_ref());
            // of two variables, define the later one
            let candidates: Vec<(&SsaVar, &Term)> = match (l, r) {
                (Term::Var(a), Term::Var(b)) if (a.index, &a.var) > (b.index, &b.var) => {
                    vec![(a, r), (b, l)]
                }
                (Term::Var(a), Term::Var(b)) => vec![(b, l), (a, r)],
                (Term::Var(a), _) => vec![(a, r)],
                (_, Term::Var(b)) => vec![(b, l)],
                _ => Vec::new(),
            };
            for (var, rhs) in candidates {
                if defs.define(var, rhs) {
                    break;
                }
            }
        }
        defs
    }

    /// Add `var := rhs` unless `var` is taken or would depend on itself.
    fn define(&mut self, var: &SsaVar, rhs: &Term) -> bool {
        if self.forms.contains_key(var) {
            return false;
        }
        let Some(form) = Linear::of(rhs, &self.forms) else {
            return false;
        };
        if form.coeffs.contains_key(var) {
            return false;
        }
        // keep every form over free variables only
        let mut updated = Vec::new();
        for (other, existing) in &self.forms {
            if let Some(&k) = existing.coeffs.get(var) {
                let mut rest = existing.clone();
                rest.coeffs.remove(var);
                let Some(rest) = rest.add_scaled(&form, k) else {
                    return false;
                };
                updated.push((other.clone(), rest));
            }
        }
        self.forms.extend(updated);
        self.forms.insert(var.clone(), form);
        self.deps.insert(var.clone(), rhs.vars().into_iter().collect());
        self.defined.push(var.clone());
        true
    }

    /// Free integers by index, then defined integers after their
    /// dependencies, then booleans.
    fn search_order(&self, term: &Term) -> Vec<SsaVar> {
        let by_index = |a: &SsaVar, b: &SsaVar| a.index.cmp(&b.index).then_with(|| a.var.cmp(&b.var));
        let all = term.vars();
        let mut order: Vec<SsaVar> = all
            .iter()
            .filter(|v| v.var.sort() == Sort::Int && !self.forms.contains_key(*v))
            .cloned()
            .collect();
        order.sort_by(by_index);

        let mut placed = HashSet::new();
        for var in &self.defined {
            self.place(var, &mut placed, &mut order);
        }

        let mut bools: Vec<SsaVar> = all
            .into_iter()
            .filter(|v| v.var.sort() == Sort::Bool)
            .collect();
        bools.sort_by(by_index);
        order.extend(bools);
        order
    }

    fn place(&self, var: &SsaVar, placed: &mut HashSet<SsaVar>, order: &mut Vec<SsaVar>) {
        if !placed.insert(var.clone()) {
            return;
        }
        for dep in self.deps.get(var).into_iter().flatten() {
            if self.forms.contains_key(dep) {
                self.place(dep, placed, order);
            }
        }
        order.push(var.clone());
    }
}

/// Whether a search that found no model in range also rules out models
/// outside it.
fn exhaustive(
    term: &Term,
    conjuncts: &[Term],
    defs: &Definitions,
    enumerated: &HashSet<SsaVar>,
    (min, max): (i64, i64),
) -> bool {
    if enumerated.is_empty() {
        return true;
    }
    let mut comparisons = Vec::new();
    for c in conjuncts {
        collect_comparisons(c, &mut comparisons);
    }
    // free variables whose comparisons do not stay inside the range
    let mut loose = HashSet::new();
    for (a, b) in comparisons {
        match Linear::difference(a, b, &defs.forms) {
            Some(diff) => match diff.single() {
                Some((var, k)) => {
                    if !threshold_inside(diff.constant, k, min, max) {
                        loose.insert(var.clone());
                    }
                }
                None => loose.extend(diff.coeffs.keys().cloned()),
            },
            None => {
                for v in a.vars().into_iter().chain(b.vars()) {
                    match defs.forms.get(&v) {
                        Some(form) => loose.extend(form.coeffs.keys().cloned()),
                        None => {
                            loose.insert(v);
                        }
                    }
                }
            }
        }
    }

    enumerated.iter().all(|var| {
        let free = !defs.forms.contains_key(var) && !loose.contains(var);
        free || {
            let (lo, hi) = interval(term, var);
            lo.is_some_and(|lo| lo >= i128::from(min)) && hi.is_some_and(|hi| hi <= i128::from(max))
        }
    })
}

/// Integer comparisons in `term`, as `(lhs, rhs)` pairs.
fn collect_comparisons<'t>(term: &'t Term, out: &mut Vec<(&'t Term, &'t Term)>) {
    match term {
        Term::Not(t) => collect_comparisons(t, out),
        Term::And(ts) | Term::Or(ts) => {
            for t in ts {
                collect_comparisons(t, out);
            }
        }
        Term::Eq(a, b) if a.sort() == Sort::Bool => {
            collect_comparisons(a, out);
            collect_comparisons(b, out);
        }
        Term::Eq(a, b) | Term::Lt(a, b) | Term::Le(a, b) => out.push((a, b)),
        _ => {}
    }
}

/// Whether `k * v + constant ~ 0` flips strictly inside `(min, max)`.
fn threshold_inside(constant: i128, k: i128, min: i64, max: i64) -> bool {
    let (lo, hi) = if k > 0 { (min, max) } else { (max, min) };
    match (
        k.checked_mul(i128::from(lo)),
        k.checked_mul(i128::from(hi)),
        constant.checked_neg(),
    ) {
        (Some(lo), Some(hi), Some(target)) => lo < target && target < hi,
        _ => false,
    }
}

type Interval = (Option<i128>, Option<i128>);

/// Bounds on `var` implied by `term`; `None` is unbounded on that side.
fn interval(term: &Term, var: &SsaVar) -> Interval {
    // k * var + c ~ 0 with k = +-1
    let unit = |a: &Term, b: &Term| {
        let diff = Linear::difference(a, b, &HashMap::new())?;
        match diff.single() {
            Some((v, k)) if v == var && (k == 1 || k == -1) => Some((k, diff.constant)),
            _ => None,
        }
    };
    match term {
        Term::And(ts) => ts.iter().map(|t| interval(t, var)).fold((None, None), |acc, i| {
            (max_of(acc.0, i.0), min_of(acc.1, i.1))
        }),
        Term::Or(ts) => {
            let mut parts = ts.iter().map(|t| interval(t, var));
            let first = parts.next().unwrap_or((None, None));
            parts.fold(first, |acc, i| {
                (
                    acc.0.zip(i.0).map(|(a, b)| a.min(b)),
                    acc.1.zip(i.1).map(|(a, b)| a.max(b)),
                )
            })
        }
        Term::Eq(a, b) => match unit(a, b) {
            Some((k, c)) => {
                let at = if k == 1 { c.saturating_neg() } else { c };
                (Some(at), Some(at))
            }
            None => (None, None),
        },
        Term::Lt(a, b) => match unit(a, b) {
            Some((1, c)) => (None, Some(c.saturating_neg().saturating_sub(1))),
            Some((_, c)) => (Some(c.saturating_add(1)), None),
            None => (None, None),
        },
        Term::Le(a, b) => match unit(a, b) {
            Some((1, c)) => (None, Some(c.saturating_neg())),
            Some((_, c)) => (Some(c), None),
            None => (None, None),
        },
        Term::Not(inner) => match inner.as_ref() {
            // k * var + c >= 0
            Term::Lt(a, b) => match unit(a, b) {
                Some((1, c)) => (Some(c.saturating_neg()), None),
                Some((_, c)) => (None, Some(c)),
                None => (None, None),
            },
            // k * var + c > 0
            Term::Le(a, b) => match unit(a, b) {
                Some((1, c)) => (Some(c.saturating_neg().saturating_add(1)), None),
                Some((_, c)) => (None, Some(c.saturating_sub(1))),
                None => (None, None),
            },
            _ => (None, None),
        },
        _ => (None, None),
    }
}

fn max_of(a: Option<i128>, b: Option<i128>) -> Option<i128> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

fn min_of(a: Option<i128>, b: Option<i128>) -> Option<i128> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

impl Solver for BoundedSolver {
    fn name(&self) -> &'static str {
        "bounded"
    }

    fn check(&self, term: &Term) -> SmtResult<SatResult> {
        let term = term.simplify();
        match term {
            Term::Bool(true) => return Ok(SatResult::Sat),
            Term::Bool(false) => return Ok(SatResult::Unsat),
            _ => {}
        }
        if term.sort() != Sort::Bool {
            return Err(SmtError::SortMismatch {
                expected: Sort::Bool,
                term: term.to_string(),
            });
        }

        let mut budget = self.config.max_assignments;
        let result = match self.split(vec![term], &mut budget) {
            Ok(result) => result,
            Err(Exhausted) => {
                debug!(
                    budget = self.config.max_assignments,
                    "bounded solver exhausted its assignment budget"
                );
                SatResult::Unknown
            }
        };
        trace!(spent = self.config.max_assignments - budget, ?result, "bounded check");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::Formula;
    use crate::ssa::SsaMap;
    use crate::term::Var;

    fn x() -> Var {
        Var::int("x")
    }

    fn y() -> Var {
        Var::int("y")
    }

    /// x0 = start, x1 = x0 + 1, ..., x8 = x7 + 1
    fn chain(start: i64) -> Term {
        let mut parts = vec![Term::ssa(&x(), 0).eq(Term::int(start))];
        for i in 1..=8 {
            parts.push(Term::ssa(&x(), i).eq(Term::ssa(&x(), i - 1).add(Term::int(1))));
        }
        Term::conj(parts)
    }

    #[test]
    fn test_sat_and_unsat() {
        let solver = BoundedSolver::default();
        let sat = Term::var(&x()).gt(Term::int(3));
        assert_eq!(solver.check(&sat).unwrap(), SatResult::Sat);
        let unsat = Term::var(&x())
            .gt(Term::int(3))
            .and(Term::var(&x()).lt(Term::int(2)));
        assert_eq!(solver.check(&unsat).unwrap(), SatResult::Unsat);
    }

    #[test]
    fn test_definition_chain_is_forced() {
        let t = chain(0).and(Term::ssa(&x(), 8).eq(Term::int(8)).not());
        let solver = BoundedSolver::new(BoundedSolverConfig {
            max_assignments: 1_000,
            ..Default::default()
        });
        assert_eq!(solver.check(&t).unwrap(), SatResult::Unsat);
    }

    #[test]
    fn test_definitions_inside_disjunction_are_forced() {
        // each case is a forced chain; enumerating the chains would need 33^9 tries
        let t = chain(0).or(chain(1)).and(Term::ssa(&x(), 8).gt(Term::int(12)));
        let solver = BoundedSolver::new(BoundedSolverConfig {
            max_assignments: 100,
            ..Default::default()
        });
        assert_eq!(solver.check(&t).unwrap(), SatResult::Unsat);
        let reachable = chain(0).or(chain(1)).and(Term::ssa(&x(), 8).eq(Term::int(9)));
        assert_eq!(solver.check(&reachable).unwrap(), SatResult::Sat);
    }

    #[test]
    fn test_earlier_index_defined_by_later_one() {
        // x@-1 = y@0 + 1 defines x@-1 although it comes first by index
        let t = Term::conj([
            Term::ssa(&x(), -1).eq(Term::ssa(&y(), 0).add(Term::int(1))),
            Term::ssa(&x(), 0).eq(Term::ssa(&x(), -1).add(Term::int(1))),
            Term::ssa(&y(), 0).ge(Term::int(0)),
            Term::ssa(&x(), 0).lt(Term::int(2)),
        ]);
        let solver = BoundedSolver::new(BoundedSolverConfig {
            max_assignments: 200,
            ..Default::default()
        });
        assert_eq!(solver.check(&t).unwrap(), SatResult::Unsat);
    }

    #[test]
    fn test_model_outside_range_is_unknown() {
        let solver = BoundedSolver::default();
        let large = Term::var(&x()).gt(Term::int(100));
        assert_eq!(solver.check(&large).unwrap(), SatResult::Unknown);
        assert!(matches!(
            solver.is_unsat(&Formula::entry(large)),
            Err(SmtError::Unknown { .. })
        ));
        // a defined variable carries the threshold back to its input
        let shifted = Term::conj([
            Term::ssa(&x(), 1).eq(Term::ssa(&x(), 0).add(Term::int(10))),
            Term::ssa(&x(), 1).gt(Term::int(30)),
        ]);
        assert_eq!(solver.check(&shifted).unwrap(), SatResult::Unknown);
        let sum = Term::var(&x()).add(Term::var(&y())).eq(Term::int(40));
        assert_eq!(solver.check(&sum).unwrap(), SatResult::Unknown);
    }

    #[test]
    fn test_bounded_variables_make_search_exhaustive() {
        let solver = BoundedSolver::default();
        let in_range = |v: &Var, lo: i64, hi: i64| {
            Term::var(v).ge(Term::int(lo)).and(Term::var(v).le(Term::int(hi)))
        };
        let sum = Term::var(&x()).add(Term::var(&y())).eq(Term::int(100));
        let bounded = Term::conj([in_range(&x(), 0, 3), in_range(&y(), -5, 5), sum.clone()]);
        assert_eq!(solver.check(&bounded).unwrap(), SatResult::Unsat);
        // y is free to be 97 outside the range
        let half = Term::conj([in_range(&x(), 0, 3), sum.clone()]);
        assert_eq!(solver.check(&half).unwrap(), SatResult::Unknown);
        // each case fixes x, y keeps its own bounds
        let cases = Term::conj([
            Term::var(&x())
                .eq(Term::int(0))
                .or(Term::var(&x()).eq(Term::int(2))),
            in_range(&y(), -5, 5),
            sum,
        ]);
        assert_eq!(solver.check(&cases).unwrap(), SatResult::Unsat);
    }

    #[test]
    fn test_budget_exhaustion_is_unknown() {
        let z = Var::int("z");
        let t = Term::var(&x())
            .add(Term::var(&y()))
            .add(Term::var(&z))
            .eq(Term::int(1000));
        let solver = BoundedSolver::new(BoundedSolverConfig {
            max_assignments: 50,
            ..Default::default()
        });
        assert_eq!(solver.check(&t).unwrap(), SatResult::Unknown);
        assert!(matches!(
            solver.is_unsat(&Formula::entry(t)),
            Err(SmtError::Unknown { .. })
        ));
    }

    #[test]
    fn test_overflow_is_unknown() {
        let t = Term::var(&x()).add(Term::int(i64::MAX)).gt(Term::int(0));
        let solver = BoundedSolver::with_range(1, 2);
        assert_eq!(solver.check(&t).unwrap(), SatResult::Unknown);
    }

    #[test]
    fn test_sort_mismatch() {
        let solver = BoundedSolver::default();
        assert!(matches!(
            solver.check(&Term::var(&x())),
            Err(SmtError::SortMismatch { .. })
        ));
    }

    #[test]
    fn test_implies_and_equivalent() {
        let solver = BoundedSolver::default();
        let a = Formula::entry(Term::var(&x()).gt(Term::int(5)));
        let b = Formula::entry(Term::var(&x()).gt(Term::int(2)));
        assert!(solver.implies(&a, &b).unwrap());
        assert!(!solver.implies(&b, &a).unwrap());
        let c = Formula::entry(Term::int(5).lt(Term::var(&x())).and(Term::tt()));
        assert!(solver.equivalent(&a, &c).unwrap());
    }

    #[test]
    fn test_implies_across_ssa_maps() {
        let mut ssa = SsaMap::new();
        ssa.bump(&x());
        // x1 = x0 + 1 && x0 > 0 entails x > 1 at the current index
        let a = Formula::new(
            Term::ssa(&x(), 1)
                .eq(Term::ssa(&x(), 0).add(Term::int(1)))
                .and(Term::ssa(&x(), 0).gt(Term::int(0))),
            ssa.clone(),
        );
        let b = Formula::new(Term::ssa(&x(), 1).gt(Term::int(1)), ssa);
        let solver = BoundedSolver::default();
        assert!(solver.implies(&a, &b).unwrap());
    }

    #[test]
    fn test_linear_form_substitutes_definitions() {
        let defs = Definitions::collect(&[
            Term::ssa(&x(), 1).eq(Term::ssa(&x(), 0).add(Term::int(1))),
            Term::ssa(&x(), 2).eq(Term::ssa(&x(), 1).scale(2)),
        ]);
        let form = Linear::of(&Term::ssa(&x(), 2), &defs.forms).unwrap();
        assert_eq!(form.constant, 2);
        assert_eq!(form.single(), Some((&SsaVar::new(x(), 0), 2)));
        let order = defs.search_order(&Term::ssa(&x(), 2).eq(Term::ssa(&x(), 0)));
        let indices: Vec<i64> = order.iter().map(|v| v.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }
}
