// ABOUTME: Error types for the dicelang library.
// ABOUTME: Covers lexing, parsing, and evaluation errors.

use thiserror::Error;

/// Errors that can occur while lexing, parsing, or evaluating a dice
/// expression.
///
/// The original C library distinguished setup/syntax errors (positive codes)
/// from evaluation errors (negative codes); that sign convention is a detail
/// of its C ABI and isn't preserved here -- each row of its error table
/// becomes one variant below instead. The mapping, for anyone porting another
/// embedder against that table:
///
/// | variant              | original code |
/// |-----------------------|---------------|
/// | `UnexpectedChar`/`UnexpectedEof` | +1 (tokenizer init) |
/// | `Expected`/`IllegalFateModifier` | +2 (syntax error) |
/// | `DivideByZero`         | -1 |
/// | `MaxDice`              | -2 |
/// | `MaxRecurse`           | -3 |
/// | `MaxSides`             | -4 |
/// | `MinSides`             | -5 |
/// | `MinDice`              | -6 |
/// | `NoDice`               | +5 (no reportable roll) |
/// | `Internal`             | -99 |
#[derive(Debug, Error)]
pub enum Error {
    #[error("unexpected character '{0}' at position {1}")]
    UnexpectedChar(char, usize),

    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("expected {expected}, found {found}")]
    Expected { expected: String, found: String },

    #[error("fate dice cannot be exploded or kept from")]
    IllegalFateModifier,

    #[error("division by zero")]
    DivideByZero,

    #[error("cumulative dice budget exceeded (max {0})")]
    MaxDice(u32),

    #[error("recursion depth budget exceeded (max {0})")]
    MaxRecurse(u32),

    #[error("die has too many sides (max {0})")]
    MaxSides(u32),

    #[error("die must have at least 1 side")]
    MinSides,

    #[error("must roll at least 1 die")]
    MinDice,

    #[error("no reportable roll in this result")]
    NoDice,

    #[error("internal evaluator error: {0}")]
    Internal(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
