// ABOUTME: Abstract Syntax Tree types for dice expressions.
// ABOUTME: A single tagged node enum, mirroring every variant in the grammar.

use std::fmt;

/// A parsed dice expression.
///
/// Every variant here corresponds to one row of the AST data model: a
/// discriminator tag plus whatever children that variant needs. There is no
/// separate "evaluated value" field on the node itself -- evaluation produces
/// a parallel `Evaluated` tree (see `roller`) rather than mutating this one,
/// so a `Node` can be parsed once and (in principle) evaluated many times.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A literal integer.
    Literal(i64),
    /// A binary arithmetic operation.
    Math {
        op: Op,
        left: Box<Node>,
        right: Box<Node>,
    },
    /// `NdS` or `NdF`: roll `num` dice of `sides`.
    ///
    /// For Fate dice, `sides` is an unused placeholder (`Literal(3)`) kept
    /// only so budget bookkeeping and the roll-finding rule stay uniform
    /// across both kinds.
    Roll {
        kind: RollKind,
        num: Box<Node>,
        sides: Box<Node>,
    },
    /// `{ e1, e2, ... }` repeated `num` times (always `Literal(1)` under the
    /// current grammar, which has no syntax for repeating a group).
    Group { num: Box<Node>, exprs: Vec<Node> },
    /// Reroll `inner` (always a bare `Roll`) while `cmp` holds.
    Reroll {
        once: bool,
        cmp: Box<Node>,
        inner: Box<Node>,
    },
    /// Explode `inner`'s underlying roll on `cmp` (or "equals sides" if absent).
    Explode {
        mode: ExplodeMode,
        cmp: Option<Box<Node>>,
        inner: Box<Node>,
    },
    /// Keep/drop a slice of `inner`'s sorted faces.
    Keep {
        mode: KeepMode,
        amount: Box<Node>,
        inner: Box<Node>,
    },
    /// Reduce `inner`'s faces to a success/failure count.
    Success {
        success_cmp: Box<Node>,
        fail_cmp: Option<Box<Node>>,
        inner: Box<Node>,
    },
    /// A comparison operator plus its right-hand side. Only ever appears as
    /// the `cmp`/`success_cmp`/`fail_cmp` child of Reroll, Explode, or Success
    /// -- never as a standalone evaluable result.
    Compare { op: CompareOp, rhs: Box<Node> },
    /// Parser-internal sentinel for "modifier absent". Consumed entirely by
    /// `parser::Extras::wrap` and never constructed in the tree handed to the
    /// evaluator.
    Null,
}

/// Which die a `Roll` draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollKind {
    /// An `NdS` die with faces `1..=S`.
    Normal,
    /// An `NdF` Fudge/Fate die with faces `{-1, 0, 1}`.
    Fate,
}

/// The three exploding-dice variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplodeMode {
    /// `!`: each matching face adds a new, separate face.
    Explode,
    /// `!!`: each matching face's chain sums into the same face.
    Compound,
    /// `!p`: like Compound, but each extra draw contributes `draw - 1`, with
    /// a die-downgrade escape hatch when no explicit comparison is given.
    Penetrate,
}

/// The four keep/drop variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepMode {
    KeepHigh,
    KeepLow,
    DropHigh,
    DropLow,
}

/// A binary arithmetic operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Add => write!(f, "+"),
            Op::Sub => write!(f, "-"),
            Op::Mul => write!(f, "*"),
            Op::Div => write!(f, "/"),
        }
    }
}

/// A comparison operator, as the grammar's `explicit_compare` allows: only
/// equality, less-than, and greater-than (no `>=`/`<=`/`<>` forms).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Lt,
    Gt,
}

impl CompareOp {
    /// Check whether `value` satisfies this comparison against `threshold`.
    /// Equality is exact numeric equality, per the comparison primitive.
    pub fn matches(&self, value: f64, threshold: f64) -> bool {
        match self {
            CompareOp::Eq => value == threshold,
            CompareOp::Lt => value < threshold,
            CompareOp::Gt => value > threshold,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompareOp::Eq => write!(f, "="),
            CompareOp::Lt => write!(f, "<"),
            CompareOp::Gt => write!(f, ">"),
        }
    }
}
