// ABOUTME: Core library for parsing and rolling TTRPG dice notation.
// ABOUTME: Supports a Roll20-style grammar with modifiers, simulation, and RNG abstraction.

//! # Dicelang
//!
//! A dice notation parser and roller for tabletop RPGs.
//!
//! ## Quick Start
//!
//! ```
//! use dicelang::{roll, simulate};
//!
//! // Roll dice
//! let result = roll("4d6kh3").unwrap();
//! println!("{}", result.total());
//!
//! // Simulate probability distribution
//! let sim = simulate("2d6", 10000).unwrap();
//! println!("Mean: {:.2}", sim.mean);  // ~7.0
//! ```
//!
//! ## Supported Notation
//!
//! - Basic rolls: `2d6`, `1d20`, `4dF`
//! - Arithmetic: `2d6 + 5`, `(1d6 + 2) * 3`
//! - Keep highest/lowest: `4d6kh3`, `2d20kl1`
//! - Drop highest/lowest: `4d6dh1`, `4d6dl1`
//! - Exploding dice: `1d6!`, `1d6!!`, `1d6!p`, all with optional comparisons
//! - Reroll: `1d6r=1`, `1d6ro<3`
//! - Success counting: `6d10>7f<3`
//! - Grouped rolls: `{2d6,1d8}k1`

pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod result;
pub mod roller;
pub mod sim;

pub use ast::{CompareOp, ExplodeMode, KeepMode, Node, Op, RollKind};
pub use error::{Error, Result};
pub use result::Rolled;
pub use roller::{FastRng, Rng};
pub use sim::{simulate, simulate_seeded, SimResult};

/// Parse and roll a dice expression in one step.
///
/// # Examples
///
/// ```
/// let result = dicelang::roll("2d6 + 5").unwrap();
/// println!("Total: {}", result.total());
/// ```
pub fn roll(expr: &str) -> Result<Rolled> {
    let parsed = parser::parse(expr)?;
    roller::evaluate(&parsed)
}

/// Parse and roll with a custom RNG.
///
/// Useful for testing or when you need reproducible results.
///
/// # Examples
///
/// ```
/// use dicelang::{roll_with_rng, FastRng};
///
/// let mut rng = FastRng::with_seed(42);
/// let result = roll_with_rng("2d6", &mut rng).unwrap();
/// ```
pub fn roll_with_rng(expr: &str, rng: &mut impl Rng) -> Result<Rolled> {
    let parsed = parser::parse(expr)?;
    roller::evaluate_with_rng(&parsed, rng)
}

/// Parse a dice expression without rolling.
///
/// Returns the AST representation of the expression.
///
/// # Examples
///
/// ```
/// use dicelang::{parse, Node, RollKind};
///
/// let node = dicelang::parse("4d6").unwrap();
/// match node {
///     Node::Roll { kind, .. } => assert_eq!(kind, RollKind::Normal),
///     _ => panic!("expected a roll"),
/// }
/// ```
pub fn parse(input: &str) -> Result<Node> {
    parser::parse(input)
}
