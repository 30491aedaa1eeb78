//! Boolean composition of steps
//!
//! Both scenario clauses and tag expressions are trees of leaves joined by
//! AND / OR / NOT. Composite nodes always evaluate both operands, left to
//! right: a clause such as `When I tap Log in And the keyboard is shown`
//! relies on the left side's side effect happening before the right side is
//! checked, and on the right side running even when the left side failed.

/// A boolean expression over leaves of type `L`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr<L> {
    Leaf(L),
    And(Box<Expr<L>>, Box<Expr<L>>),
    Or(Box<Expr<L>>, Box<Expr<L>>),
    Not(Box<Expr<L>>),
}

impl<L> Expr<L> {
    pub fn leaf(leaf: L) -> Self {
        Expr::Leaf(leaf)
    }

    pub fn and(self, rhs: Expr<L>) -> Self {
        Expr::And(Box::new(self), Box::new(rhs))
    }

    pub fn or(self, rhs: Expr<L>) -> Self {
        Expr::Or(Box::new(self), Box::new(rhs))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }

    /// `lhs but rhs` is `lhs and not rhs`.
    pub fn but(self, rhs: Expr<L>) -> Self {
        self.and(rhs.not())
    }

    /// Evaluate with an infallible leaf evaluator.
    pub fn evaluate(&self, eval: &mut impl FnMut(&L) -> bool) -> bool {
        match self {
            Expr::Leaf(leaf) => eval(leaf),
            Expr::And(lhs, rhs) => {
                let l = lhs.evaluate(eval);
                let r = rhs.evaluate(eval);
                l && r
            }
            Expr::Or(lhs, rhs) => {
                let l = lhs.evaluate(eval);
                let r = rhs.evaluate(eval);
                l || r
            }
            Expr::Not(inner) => !inner.evaluate(eval),
        }
    }

    /// Evaluate with a fallible leaf evaluator. The first error stops evaluation.
    pub fn try_evaluate<E>(&self, eval: &mut impl FnMut(&L) -> Result<bool, E>) -> Result<bool, E> {
        match self {
            Expr::Leaf(leaf) => eval(leaf),
            Expr::And(lhs, rhs) => {
                let l = lhs.try_evaluate(eval)?;
                let r = rhs.try_evaluate(eval)?;
                Ok(l && r)
            }
            Expr::Or(lhs, rhs) => {
                let l = lhs.try_evaluate(eval)?;
                let r = rhs.try_evaluate(eval)?;
                Ok(l || r)
            }
            Expr::Not(inner) => Ok(!inner.try_evaluate(eval)?),
        }
    }

    /// Leaves in evaluation order.
    pub fn leaves(&self) -> Vec<&L> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a L>) {
        match self {
            Expr::Leaf(leaf) => out.push(leaf),
            Expr::And(lhs, rhs) | Expr::Or(lhs, rhs) => {
                lhs.collect_leaves(out);
                rhs.collect_leaves(out);
            }
            Expr::Not(inner) => inner.collect_leaves(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Evaluate recording the order leaves were visited in.
    fn run(expr: &Expr<(char, bool)>) -> (bool, String) {
        let mut visited = String::new();
        let result = expr.evaluate(&mut |(name, value)| {
            visited.push(*name);
            *value
        });
        (result, visited)
    }

    #[test]
    fn test_and_invokes_both_sides() {
        let expr = Expr::leaf(('a', false)).and(Expr::leaf(('b', true)));
        assert_eq!(run(&expr), (false, "ab".to_string()));
    }

    #[test]
    fn test_or_invokes_both_sides() {
        let expr = Expr::leaf(('a', true)).or(Expr::leaf(('b', false)));
        assert_eq!(run(&expr), (true, "ab".to_string()));
    }

    #[test]
    fn test_negation_and_but() {
        assert_eq!(run(&Expr::leaf(('a', true)).not()).0, false);
        let expr = Expr::leaf(('a', true)).but(Expr::leaf(('b', false)));
        assert_eq!(run(&expr), (true, "ab".to_string()));
        let expr = Expr::leaf(('a', true)).but(Expr::leaf(('b', true)));
        assert_eq!(run(&expr).0, false);
    }

    #[test]
    fn test_truth_tables() {
        for a in [false, true] {
            for b in [false, true] {
                let and = Expr::leaf(('a', a)).and(Expr::leaf(('b', b)));
                let or = Expr::leaf(('a', a)).or(Expr::leaf(('b', b)));
                assert_eq!(run(&and).0, a && b);
                assert_eq!(run(&or).0, a || b);
            }
        }
    }

    #[test]
    fn test_try_evaluate_stops_on_error() {
        let expr = Expr::leaf(1).and(Expr::leaf(2)).and(Expr::leaf(3));
        let mut seen = Vec::new();
        let result: Result<bool, String> = expr.try_evaluate(&mut |n| {
            seen.push(*n);
            if *n == 2 { Err("boom".into()) } else { Ok(true) }
        });
        assert_eq!(result, Err("boom".to_string()));
        assert_eq!(seen, vec![1, 2]);
    }

    #[test]
    fn test_leaves_in_order() {
        let expr = Expr::leaf("a").or(Expr::leaf("b").not()).and(Expr::leaf("c"));
        assert_eq!(expr.leaves(), vec![&"a", &"b", &"c"]);
    }
}
