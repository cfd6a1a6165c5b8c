// ABOUTME: The public result type returned by a completed evaluation.
// ABOUTME: Wraps the evaluated tree and exposes total/raw/kept accessors.

use crate::error::{Error, Result};
use crate::roller::Evaluated;

/// The outcome of evaluating a dice expression.
///
/// Holds the full evaluated tree so that `raw()`/`kept()` can locate the
/// reportable roll after the fact, rather than the evaluator pre-computing
/// and discarding everything but a final number.
pub struct Rolled {
    root: Evaluated,
}

impl Rolled {
    pub(crate) fn new(root: Evaluated) -> Self {
        Self { root }
    }

    /// The expression's final numeric value. Always present, even for a
    /// pure arithmetic expression with no dice at all.
    pub fn total(&self) -> f64 {
        self.root.value()
    }

    /// Every face drawn for the reportable roll, in the order rolled (or,
    /// once a Keep has sorted them, in sorted order) -- before any
    /// keep/drop filtering. `Err(Error::NoDice)` if the expression had no
    /// roll to report (e.g. pure arithmetic).
    pub fn raw(&self) -> Result<Vec<i64>> {
        match self.root.find_roll().ok_or(Error::NoDice)? {
            Evaluated::Roll { faces, .. } | Evaluated::Group { faces, .. } => {
                Ok(faces.borrow().clone())
            }
            Evaluated::Keep { faces, .. } => Ok(faces.borrow().clone()),
            _ => unreachable!("find_roll only returns Roll, Group, or Keep"),
        }
    }

    /// The faces that actually contributed to `total()` -- identical to
    /// `raw()` unless a Keep/drop modifier narrowed the set.
    pub fn kept(&self) -> Result<Vec<i64>> {
        match self.root.find_roll().ok_or(Error::NoDice)? {
            Evaluated::Roll { faces, .. } | Evaluated::Group { faces, .. } => {
                Ok(faces.borrow().clone())
            }
            Evaluated::Keep {
                faces, start, len, ..
            } => Ok(faces.borrow()[*start..*start + *len].to_vec()),
            _ => unreachable!("find_roll only returns Roll, Group, or Keep"),
        }
    }
}
