//! Algebraic properties of terms, formulas and the bounded solver.

use dss_smt::{
    BoundedSolver, Formula, SatResult, SmtError, Solver, SsaMap, SsaVar, Term, Value, Var,
};
use proptest::prelude::*;

fn int_term() -> impl Strategy<Value = Term> {
    let leaf = prop_oneof![
        (-3i64..=3).prop_map(Term::int),
        prop_oneof![Just("x"), Just("y")].prop_map(|name| Term::ssa(&Var::int(name), 0)),
    ];
    leaf.prop_recursive(3, 12, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(a, b)| a.add(b)),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| a.sub(b)),
            (inner, -2i64..=2).prop_map(|(a, k)| a.scale(k)),
        ]
    })
}

fn bool_term() -> impl Strategy<Value = Term> {
    let atom = prop_oneof![
        (int_term(), int_term()).prop_map(|(a, b)| a.eq(b)),
        (int_term(), int_term()).prop_map(|(a, b)| a.lt(b)),
        (int_term(), int_term()).prop_map(|(a, b)| a.le(b)),
        any::<bool>().prop_map(|b| if b { Term::tt() } else { Term::ff() }),
    ];
    atom.prop_recursive(2, 8, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(a, b)| a.and(b)),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| a.or(b)),
            inner.prop_map(Term::not),
        ]
    })
}

/// Comparisons of a single variable against constants inside the solver range.
fn unary_term() -> impl Strategy<Value = Term> {
    let var = prop_oneof![Just("x"), Just("y")].prop_map(|name| Term::ssa(&Var::int(name), 0));
    let atom = (var, -3i64..=3, 0..3u8).prop_map(|(v, c, op)| match op {
        0 => v.eq(Term::int(c)),
        1 => v.lt(Term::int(c)),
        _ => Term::int(c).le(v),
    });
    atom.prop_recursive(2, 8, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(a, b)| a.and(b)),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| a.or(b)),
            inner.prop_map(Term::not),
        ]
    })
}

fn grid() -> impl Iterator<Item = (i64, i64)> {
    (-3..=3).flat_map(|x| (-3..=3).map(move |y| (x, y)))
}

fn eval_at(term: &Term, x: i64, y: i64) -> Option<Value> {
    term.eval(&|v: &SsaVar| match v.var.name() {
        "x" => Some(Value::Int(x)),
        "y" => Some(Value::Int(y)),
        _ => None,
    })
}

fn solver() -> BoundedSolver {
    BoundedSolver::with_range(-4, 4)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_simplify_preserves_meaning(t in bool_term()) {
        let s = t.simplify();
        for (x, y) in grid() {
            prop_assert_eq!(eval_at(&s, x, y), eval_at(&t, x, y));
        }
    }

    #[test]
    fn test_satisfiable_conjunction_is_never_refuted(a in bool_term(), b in bool_term()) {
        let solver = solver();
        if solver.check(&a.clone().and(b))? == SatResult::Sat {
            prop_assert_ne!(solver.check(&a)?, SatResult::Unsat);
        }
    }

    #[test]
    fn test_contradiction_is_never_sat(a in bool_term()) {
        prop_assert_ne!(solver().check(&a.clone().and(a.not()))?, SatResult::Sat);
    }

    #[test]
    fn test_unary_contradiction_is_unsat(a in unary_term()) {
        let f = Formula::entry(a.clone().and(a.not()));
        prop_assert!(solver().is_unsat(&f)?);
    }

    #[test]
    fn test_refutation_holds_on_grid(a in bool_term()) {
        if solver().check(&a)? == SatResult::Unsat {
            for (x, y) in grid() {
                prop_assert_ne!(eval_at(&a, x, y), Some(Value::Bool(true)));
            }
        }
    }

    #[test]
    fn test_conjunction_commutes(a in bool_term(), b in bool_term()) {
        let (fa, fb) = (Formula::entry(a), Formula::entry(b));
        match solver().equivalent(&fa.and(&fb), &fb.and(&fa)) {
            Ok(equivalent) => prop_assert!(equivalent),
            Err(SmtError::Unknown { .. }) => {}
            Err(e) => return Err(e.into()),
        }
    }

    #[test]
    fn test_lift_undoes_rebase(t in bool_term(), k in 0i64..4) {
        let mut ssa = SsaMap::new();
        ssa.set(&Var::int("x"), k);
        ssa.set(&Var::int("y"), k);
        let f = Formula::new(t.shift(|_| k), ssa);
        let back = f.rebase().lift(f.ssa());
        prop_assert_eq!(back.term(), f.term());
    }
}
