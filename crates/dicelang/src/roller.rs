// ABOUTME: The evaluator: walks a `Node` tree, draws random faces, and
// ABOUTME: applies reroll/explode/keep/success semantics under budget limits.

use std::cell::RefCell;
use std::rc::Rc;

use crate::ast::{CompareOp, ExplodeMode, KeepMode, Node, Op, RollKind};
use crate::error::{Error, Result};

/// Maximum number of sides a die may have.
pub const MAX_SIDES: i64 = 10_000;
/// Maximum cumulative dice drawn across one evaluation.
pub const MAX_DICE: u32 = 100;
/// Maximum AST recursion depth during evaluation.
pub const MAX_RECURSE: u32 = 20;

/// A source of random die faces.
///
/// `roll(max)` must return a value uniformly distributed in `[1, max]`. It
/// is not `Sync`; a single evaluation owns its `Rng` exclusively and nothing
/// here shares one across concurrent evaluations -- callers who want that
/// must synchronize externally or hand each evaluation its own instance.
pub trait Rng {
    /// Draw a uniform integer in `[1, max]`.
    fn roll(&mut self, max: u32) -> u32;
}

/// The default RNG, backed by `fastrand`.
///
/// `fastrand::Rng::u32` already draws uniformly over the requested range
/// (no modulo-reduction bias), so no rejection-sampling wrapper is needed
/// here -- unlike the C source this crate descends from, which used a raw
/// modulo reduction.
pub struct FastRng(fastrand::Rng);

impl FastRng {
    pub fn new() -> Self {
        Self(fastrand::Rng::new())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self(fastrand::Rng::with_seed(seed))
    }
}

impl Default for FastRng {
    fn default() -> Self {
        Self::new()
    }
}

impl Rng for FastRng {
    fn roll(&mut self, max: u32) -> u32 {
        self.0.u32(1..=max)
    }
}

/// Faces shared between a Roll/Group and any Keep built on top of it. Keep
/// never copies this array; it sorts it in place and remembers a `(start,
/// len)` slice into the same storage, so later accessors (and any Success
/// above the Keep) observe the same sort.
pub(crate) type Faces = Rc<RefCell<Vec<i64>>>;

/// The evaluated counterpart of a `Node`, produced once by `Evaluator::eval`
/// and read any number of times by result accessors. This mirrors `Node`'s
/// shape rather than mutating it in place, which is the idiomatic
/// translation of "the evaluator writes results back into nodes" recommended
/// for a tagged-enum AST: ownership of the faces array lives with whichever
/// evaluated node drew them, and everything above it borrows a view.
pub(crate) enum Evaluated {
    /// Literal, Math, Compare, and Null all reduce to a bare number with no
    /// faces to report.
    Value(f64),
    Roll {
        value: f64,
        kind: RollKind,
        sides: i64,
        faces: Faces,
    },
    Group {
        value: f64,
        faces: Faces,
    },
    Reroll {
        value: f64,
        inner: Box<Evaluated>,
    },
    Explode {
        value: f64,
        inner: Box<Evaluated>,
    },
    Keep {
        value: f64,
        faces: Faces,
        start: usize,
        len: usize,
    },
    Success {
        value: f64,
        inner: Box<Evaluated>,
    },
    Math {
        value: f64,
        left: Box<Evaluated>,
        right: Box<Evaluated>,
    },
}

impl Evaluated {
    pub(crate) fn value(&self) -> f64 {
        match self {
            Evaluated::Value(v)
            | Evaluated::Roll { value: v, .. }
            | Evaluated::Group { value: v, .. }
            | Evaluated::Reroll { value: v, .. }
            | Evaluated::Explode { value: v, .. }
            | Evaluated::Keep { value: v, .. }
            | Evaluated::Success { value: v, .. }
            | Evaluated::Math { value: v, .. } => *v,
        }
    }

    /// The roll-finding rule: locate "the Roll or Group below me". Descends
    /// transparently through Reroll/Explode/Success (each has a unique
    /// child); stops at a Roll, Group, or Keep; at a Math node, descends
    /// into both sides and succeeds only if exactly one side contains a
    /// roll. Used by Keep and Success during evaluation, and by the result
    /// accessors afterward.
    pub(crate) fn find_roll(&self) -> Option<&Evaluated> {
        match self {
            Evaluated::Roll { .. } | Evaluated::Group { .. } | Evaluated::Keep { .. } => {
                Some(self)
            }
            Evaluated::Reroll { inner, .. }
            | Evaluated::Explode { inner, .. }
            | Evaluated::Success { inner, .. } => inner.find_roll(),
            Evaluated::Math { left, right, .. } => match (left.find_roll(), right.find_roll()) {
                (Some(l), None) => Some(l),
                (None, Some(r)) => Some(r),
                _ => None,
            },
            Evaluated::Value(_) => None,
        }
    }
}

/// The two counters threaded through every evaluation: recursion depth and
/// cumulative dice rolled.
struct Budget {
    depth: u32,
    dice: u32,
}

impl Budget {
    fn new() -> Self {
        Self { depth: 0, dice: 0 }
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_RECURSE {
            Err(Error::MaxRecurse(MAX_RECURSE))
        } else {
            Ok(())
        }
    }

    fn exit(&mut self) {
        self.depth -= 1;
    }

    fn spend(&mut self, n: u32) -> Result<()> {
        self.dice += n;
        if self.dice > MAX_DICE {
            Err(Error::MaxDice(MAX_DICE))
        } else {
            Ok(())
        }
    }
}

struct Evaluator<'a, R: Rng> {
    rng: &'a mut R,
    budget: Budget,
}

impl<R: Rng> Evaluator<'_, R> {
    fn eval(&mut self, node: &Node) -> Result<Evaluated> {
        self.budget.enter()?;
        let result = self.eval_inner(node);
        self.budget.exit();
        result
    }

    fn eval_inner(&mut self, node: &Node) -> Result<Evaluated> {
        match node {
            Node::Literal(n) => Ok(Evaluated::Value(*n as f64)),
            Node::Math { op, left, right } => self.eval_math(*op, left, right),
            Node::Roll { kind, num, sides } => self.eval_roll(*kind, num, sides),
            Node::Group { num, exprs } => self.eval_group(num, exprs),
            Node::Reroll { once, cmp, inner } => self.eval_reroll(*once, cmp, inner),
            Node::Explode { mode, cmp, inner } => self.eval_explode(*mode, cmp.as_deref(), inner),
            Node::Keep {
                mode,
                amount,
                inner,
            } => self.eval_keep(*mode, amount, inner),
            Node::Success {
                success_cmp,
                fail_cmp,
                inner,
            } => self.eval_success(success_cmp, fail_cmp.as_deref(), inner),
            Node::Compare { .. } => Err(Error::Internal(
                "Compare node evaluated directly; it must only appear as a cmp child",
            )),
            Node::Null => Err(Error::Internal("Null node reached the evaluator")),
        }
    }

    fn eval_math(&mut self, op: Op, left: &Node, right: &Node) -> Result<Evaluated> {
        let left = self.eval(left)?;
        let right = self.eval(right)?;
        let (lv, rv) = (left.value(), right.value());
        let value = match op {
            Op::Add => lv + rv,
            Op::Sub => lv - rv,
            Op::Mul => lv * rv,
            Op::Div => {
                if rv == 0.0 {
                    return Err(Error::DivideByZero);
                }
                lv / rv
            }
        };
        Ok(Evaluated::Math {
            value,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn eval_roll(&mut self, kind: RollKind, num: &Node, sides: &Node) -> Result<Evaluated> {
        let num = self.eval(num)?;
        let count = num.value() as i64;
        if count < 1 {
            return Err(Error::MinDice);
        }
        let count = count as u32;

        let sides_n = match kind {
            RollKind::Normal => {
                let sides = self.eval(sides)?;
                let s = sides.value() as i64;
                if s < 1 {
                    return Err(Error::MinSides);
                }
                if s > MAX_SIDES {
                    return Err(Error::MaxSides(MAX_SIDES as u32));
                }
                s
            }
            RollKind::Fate => 3,
        };

        self.budget.spend(count)?;
        let faces: Vec<i64> = (0..count).map(|_| self.draw(kind, sides_n)).collect();
        let value = faces.iter().sum::<i64>() as f64;

        Ok(Evaluated::Roll {
            value,
            kind,
            sides: sides_n,
            faces: Rc::new(RefCell::new(faces)),
        })
    }

    /// Draw one face. For Fate dice, `sides_n` is always 3 and the domain
    /// `{-1, 0, 1}` is realized as "roll 1..=3, subtract 2".
    fn draw(&mut self, kind: RollKind, sides_n: i64) -> i64 {
        let roll = self.rng.roll(sides_n as u32) as i64;
        match kind {
            RollKind::Normal => roll,
            RollKind::Fate => roll - 2,
        }
    }

    fn eval_group(&mut self, num: &Node, exprs: &[Node]) -> Result<Evaluated> {
        let num = self.eval(num)?;
        let reps = (num.value() as i64).max(0) as usize;
        let groupsize = exprs.len();

        let mut faces = vec![0i64; reps * groupsize];
        let mut value = 0.0;
        for run in 0..reps {
            // offset = run * groupsize, not num * groupsize: the source
            // repo reused `num * groupsize` for every repetition's offset,
            // silently overwriting earlier slots. That's a bug, not a
            // design choice, and isn't reproduced here.
            let offset = run * groupsize;
            for (i, expr) in exprs.iter().enumerate() {
                let evaluated = self.eval(expr)?;
                faces[offset + i] = evaluated.value() as i64;
                value += evaluated.value();
            }
        }

        Ok(Evaluated::Group {
            value,
            faces: Rc::new(RefCell::new(faces)),
        })
    }

    fn eval_reroll(&mut self, once: bool, cmp: &Node, inner: &Node) -> Result<Evaluated> {
        let inner = self.eval(inner)?;
        let Evaluated::Roll {
            mut value,
            kind,
            sides,
            faces,
        } = inner
        else {
            return Err(Error::Internal("Reroll's inner must be a bare Roll"));
        };
        let (op, threshold) = self.eval_compare(cmp)?;
        let count = faces.borrow().len() as u32;

        while op.matches(value, threshold) {
            self.budget.spend(count)?;
            let mut redrawn = faces.borrow_mut();
            for face in redrawn.iter_mut() {
                *face = self.draw(kind, sides);
            }
            value = redrawn.iter().sum::<i64>() as f64;
            drop(redrawn);
            if once {
                break;
            }
        }

        Ok(Evaluated::Reroll {
            value,
            inner: Box::new(Evaluated::Roll {
                value,
                kind,
                sides,
                faces,
            }),
        })
    }

    fn eval_explode(
        &mut self,
        mode: ExplodeMode,
        cmp: Option<&Node>,
        inner: &Node,
    ) -> Result<Evaluated> {
        let inner = self.eval(inner)?;
        let (op, threshold) = match cmp {
            Some(c) => {
                let (op, rhs) = self.eval_compare(c)?;
                (op, Some(rhs))
            }
            None => (CompareOp::Eq, None),
        };

        let located = inner
            .find_roll()
            .ok_or(Error::Internal("Explode's inner must contain a Roll"))?;
        let Evaluated::Roll {
            kind,
            sides,
            faces,
            ..
        } = located
        else {
            return Err(Error::Internal("Explode can only act on a Normal Roll"));
        };
        if *kind != RollKind::Normal {
            return Err(Error::Internal("Fate dice cannot explode"));
        }
        let sides = *sides;
        let threshold = threshold.unwrap_or(sides as f64);
        let faces = faces.clone();

        match mode {
            ExplodeMode::Explode => self.explode_separate(&faces, op, threshold, sides)?,
            ExplodeMode::Compound => self.explode_compound(&faces, op, threshold, sides)?,
            ExplodeMode::Penetrate => {
                self.explode_penetrate(&faces, op, threshold, sides, cmp.is_some())?
            }
        }

        let value = faces.borrow().iter().sum::<i64>() as f64;
        Ok(Evaluated::Explode {
            value,
            inner: Box::new(inner),
        })
    }

    fn explode_separate(
        &mut self,
        faces: &Faces,
        op: CompareOp,
        threshold: f64,
        sides: i64,
    ) -> Result<()> {
        // Scan only the originally-drawn faces; newly drawn faces are never
        // re-examined, so explosion chains at most one level per seed die.
        let original_len = faces.borrow().len();
        for i in 0..original_len {
            let face = faces.borrow()[i];
            if op.matches(face as f64, threshold) {
                self.budget.spend(1)?;
                let new_face = self.draw(RollKind::Normal, sides);
                faces.borrow_mut().push(new_face);
            }
        }
        Ok(())
    }

    fn explode_compound(
        &mut self,
        faces: &Faces,
        op: CompareOp,
        threshold: f64,
        sides: i64,
    ) -> Result<()> {
        // The comparison re-checks the slot's own running value after every
        // draw, not the most recent single draw -- with the default "equal
        // to sides" comparison this means a slot compounds at most once
        // (the sum immediately moves away from the threshold), while an
        // explicit `>`/`<` comparison can keep a slot compounding
        // indefinitely, relying on the dice budget to bound it.
        let original_len = faces.borrow().len();
        for i in 0..original_len {
            loop {
                let slot = faces.borrow()[i];
                if !op.matches(slot as f64, threshold) {
                    break;
                }
                self.budget.spend(1)?;
                let draw = self.draw(RollKind::Normal, sides);
                faces.borrow_mut()[i] = slot + draw;
            }
        }
        Ok(())
    }

    fn explode_penetrate(
        &mut self,
        faces: &Faces,
        op: CompareOp,
        threshold: f64,
        sides: i64,
        has_explicit_cmp: bool,
    ) -> Result<()> {
        let original_len = faces.borrow().len();
        for i in 0..original_len {
            let mut chain_sides = sides;
            let mut chain_threshold = threshold;
            let mut first = true;

            loop {
                let slot = faces.borrow()[i];
                if !op.matches(slot as f64, chain_threshold) {
                    break;
                }
                if first && !has_explicit_cmp {
                    // Downgrade applies only on the very first chained
                    // draw, and never re-downgrades after that.
                    match chain_sides {
                        100 => {
                            chain_sides = 20;
                            chain_threshold = 20.0;
                        }
                        20 => {
                            chain_sides = 6;
                            chain_threshold = 6.0;
                        }
                        _ => {}
                    }
                }
                first = false;

                self.budget.spend(1)?;
                let draw = self.draw(RollKind::Normal, chain_sides);
                faces.borrow_mut()[i] = slot + draw - 1;
            }
        }
        Ok(())
    }

    fn eval_keep(&mut self, mode: KeepMode, amount: &Node, inner: &Node) -> Result<Evaluated> {
        let inner = self.eval(inner)?;
        let amount = self.eval(amount)?;
        let a = (amount.value() as i64).max(0) as usize;

        let faces = {
            let located = inner
                .find_roll()
                .ok_or(Error::Internal("Keep's inner must contain a Roll or Group"))?;
            match located {
                Evaluated::Roll { faces, .. } | Evaluated::Group { faces, .. } => faces.clone(),
                _ => return Err(Error::Internal("Keep's inner must be a Roll or Group")),
            }
        };

        faces.borrow_mut().sort_unstable();
        let total = faces.borrow().len();
        let (start, len) = match mode {
            KeepMode::KeepLow => (0, a.min(total)),
            KeepMode::KeepHigh => {
                let len = a.min(total);
                (total - len, len)
            }
            KeepMode::DropHigh => (0, total.saturating_sub(a).max(1).min(total)),
            KeepMode::DropLow => {
                let len = total.saturating_sub(a).max(1).min(total);
                (total - len, len)
            }
        };

        let value = faces.borrow()[start..start + len].iter().sum::<i64>() as f64;
        Ok(Evaluated::Keep {
            value,
            faces,
            start,
            len,
        })
    }

    fn eval_success(
        &mut self,
        success_cmp: &Node,
        fail_cmp: Option<&Node>,
        inner: &Node,
    ) -> Result<Evaluated> {
        let inner = self.eval(inner)?;
        let (succ_op, succ_threshold) = self.eval_compare(success_cmp)?;
        let fail = match fail_cmp {
            Some(c) => Some(self.eval_compare(c)?),
            None => None,
        };

        let located = inner
            .find_roll()
            .ok_or(Error::Internal("Success's inner must contain a reportable roll"))?;
        let values: Vec<i64> = match located {
            Evaluated::Roll { faces, .. } | Evaluated::Group { faces, .. } => {
                faces.borrow().clone()
            }
            Evaluated::Keep {
                faces, start, len, ..
            } => faces.borrow()[*start..*start + *len].to_vec(),
            _ => unreachable!("find_roll only returns Roll, Group, or Keep"),
        };

        let mut successes = 0i64;
        let mut failures = 0i64;
        for face in values {
            let face = face as f64;
            if succ_op.matches(face, succ_threshold) {
                successes += 1;
            } else if let Some((fail_op, fail_threshold)) = fail {
                if fail_op.matches(face, fail_threshold) {
                    failures += 1;
                }
            }
        }

        Ok(Evaluated::Success {
            value: (successes - failures) as f64,
            inner: Box::new(inner),
        })
    }

    /// Evaluate a `Node::Compare`'s right-hand side and return its operator
    /// and threshold.
    fn eval_compare(&mut self, node: &Node) -> Result<(CompareOp, f64)> {
        match node {
            Node::Compare { op, rhs } => {
                let rhs = self.eval(rhs)?;
                Ok((*op, rhs.value()))
            }
            _ => Err(Error::Internal("expected a Compare node")),
        }
    }
}

/// Evaluate a parsed expression with the default RNG.
pub fn evaluate(node: &Node) -> Result<crate::result::Rolled> {
    evaluate_with_rng(node, &mut FastRng::new())
}

/// Evaluate a parsed expression with a caller-supplied RNG.
pub fn evaluate_with_rng(node: &Node, rng: &mut impl Rng) -> Result<crate::result::Rolled> {
    let mut evaluator = Evaluator {
        rng,
        budget: Budget::new(),
    };
    let root = evaluator.eval(node)?;
    Ok(crate::result::Rolled::new(root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    /// A deterministic RNG that replays a fixed sequence of draws, as the
    /// testable scenarios require.
    pub(crate) struct TestRng {
        values: Vec<u32>,
        index: usize,
    }

    impl TestRng {
        pub(crate) fn new(values: Vec<u32>) -> Self {
            Self { values, index: 0 }
        }
    }

    impl Rng for TestRng {
        fn roll(&mut self, _max: u32) -> u32 {
            let value = self.values[self.index];
            self.index += 1;
            value
        }
    }

    fn roll(input: &str, values: Vec<u32>) -> crate::result::Rolled {
        let node = parse(input).unwrap();
        let mut rng = TestRng::new(values);
        evaluate_with_rng(&node, &mut rng).unwrap()
    }

    #[test]
    fn scenario_arithmetic_only() {
        let result = roll("2+3*4", vec![]);
        assert_eq!(result.total(), 14.0);
        assert!(matches!(result.kept(), Err(Error::NoDice)));
    }

    #[test]
    fn scenario_single_die() {
        let result = roll("1d1", vec![1]);
        assert_eq!(result.total(), 1.0);
        assert_eq!(result.raw().unwrap(), vec![1]);
        assert_eq!(result.kept().unwrap(), vec![1]);
    }

    #[test]
    fn scenario_keep_highest() {
        let result = roll("4d6kh3", vec![2, 5, 3, 6]);
        assert_eq!(result.raw().unwrap(), vec![2, 3, 5, 6]);
        assert_eq!(result.kept().unwrap(), vec![3, 5, 6]);
        assert_eq!(result.total(), 14.0);
    }

    #[test]
    fn scenario_explode_greater_than() {
        // initial faces [8, 3, 9, 2, 7, 10]; matches >7 are 8, 9, 10, each
        // drawing one new face ([1, 5, 4]) that is never itself re-examined
        // (one level of explosion per seed die).
        let result = roll("6d10!>7", vec![8, 3, 9, 2, 7, 10, 1, 5, 4]);
        assert_eq!(result.raw().unwrap().len(), 9);
        assert_eq!(result.total(), 49.0);
    }

    #[test]
    fn scenario_fate_dice() {
        let result = roll("4dF", vec![3, 1, 2, 3]);
        assert_eq!(result.raw().unwrap(), vec![1, -1, 0, 1]);
        assert_eq!(result.total(), 1.0);
    }

    #[test]
    fn scenario_grouped_roll() {
        // {2d6, 1d8}k1 over one repetition: inner sums are [7, 5].
        let result = roll("{2d6,1d8}k1", vec![3, 4, 5]);
        assert_eq!(result.raw().unwrap(), vec![5, 7]);
        assert_eq!(result.kept().unwrap(), vec![7]);
        assert_eq!(result.total(), 7.0);
    }

    #[test]
    fn invariant_normal_faces_within_bounds() {
        let result = roll("5d6", vec![1, 2, 3, 4, 5]);
        for face in result.raw().unwrap() {
            assert!((1..=6).contains(&face));
        }
    }

    #[test]
    fn invariant_keep_counts() {
        let result = roll("6d6kh2", vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(result.kept().unwrap().len(), 2);
        let result = roll("6d6dl2", vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(result.kept().unwrap().len(), 4);
    }

    #[test]
    fn invariant_division_by_zero() {
        let node = parse("1/0").unwrap();
        let mut rng = TestRng::new(vec![]);
        assert!(matches!(
            evaluate_with_rng(&node, &mut rng),
            Err(Error::DivideByZero)
        ));
    }

    #[test]
    fn invariant_min_dice() {
        let node = parse("[0]d6").unwrap();
        let mut rng = TestRng::new(vec![]);
        assert!(matches!(
            evaluate_with_rng(&node, &mut rng),
            Err(Error::MinDice)
        ));
    }

    #[test]
    fn invariant_max_sides() {
        let node = parse("1d20000").unwrap();
        let mut rng = TestRng::new(vec![]);
        assert!(matches!(
            evaluate_with_rng(&node, &mut rng),
            Err(Error::MaxSides(_))
        ));
    }

    #[test]
    fn invariant_dice_budget() {
        // An explicit ">0" comparison keeps matching forever (every draw is
        // positive, so the running slot value only grows), so the
        // cumulative dice budget is what stops it, not the comparison.
        let node = parse("1d6!!>0").unwrap();
        let mut rng = TestRng::new(vec![1; 200]);
        assert!(matches!(
            evaluate_with_rng(&node, &mut rng),
            Err(Error::MaxDice(_))
        ));
    }

    #[test]
    fn compound_explosion_keeps_face_count() {
        // The comparison re-checks the slot's running value, so with the
        // default "equal to sides" threshold a slot compounds at most once:
        // 6 (matches) + 6 (next draw) = 12, which no longer equals 6.
        let result = roll("1d6!!", vec![6, 6]);
        assert_eq!(result.raw().unwrap(), vec![12]);
    }

    #[test]
    fn separate_explosion_grows_face_count() {
        let result = roll("1d6!", vec![6, 4]);
        assert_eq!(result.raw().unwrap().len(), 2);
        assert_eq!(result.total(), 10.0);
    }

    #[test]
    fn penetrate_downgrades_on_d100() {
        // A d100 roll of 100 triggers the downgrade to d20 (threshold 20).
        // 100 (initial) + (15 - 1) = 114.
        let result = roll("1d100!p", vec![100, 15]);
        assert_eq!(result.raw().unwrap(), vec![114]);
    }

    #[test]
    fn penetrate_explicit_compare_disables_downgrade() {
        // Explicit comparison disables the downgrade escape hatch, so the
        // chained draw still uses d100 -- and, being an explicit equality
        // check against the slot's running value, still compounds only
        // once: 95 (matches) + (50 - 1) = 144, which no longer equals 95.
        let result = roll("1d100!p=95", vec![95, 50]);
        assert_eq!(result.raw().unwrap(), vec![144]);
    }

    #[test]
    fn reroll_once_stops_after_one_redraw() {
        let result = roll("1d6ro=1", vec![1, 1]);
        // The single redraw lands on 1 again, but `ro` stops after one try.
        assert_eq!(result.total(), 1.0);
    }

    #[test]
    fn success_counts_failures_separately() {
        // faces [8, 3, 9, 2] with success >7, fail <3: successes = 2 (8, 9),
        // failures = 1 (2); 3 is neither.
        let result = roll("4d10>7f<3", vec![8, 3, 9, 2]);
        assert_eq!(result.total(), 1.0);
    }
}
