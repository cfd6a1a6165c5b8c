// ABOUTME: Recursive descent parser for dice expressions.
// ABOUTME: Converts token streams into a `Node` tree.

use crate::ast::{CompareOp, ExplodeMode, KeepMode, Node, Op, RollKind};
use crate::error::{Error, Result};
use crate::lexer::{Lexer, Token};

/// The four optional postfix modifiers a roll or group may carry, collected
/// in whatever order the grammar allows and then wrapped around the base
/// node in the fixed canonical order reroll -> explode -> keep -> success.
/// Once `wrap` runs, this struct is discarded; it never reaches the
/// evaluator.
#[derive(Default)]
struct Extras {
    reroll: Option<(bool, CompareOp, Node)>,
    explode: Option<(ExplodeMode, Option<(CompareOp, Node)>)>,
    keep: Option<(KeepMode, Node)>,
    success: Option<(CompareOp, Node, Option<(CompareOp, Node)>)>,
}

impl Extras {
    fn wrap(self, base: Node) -> Node {
        let mut node = base;
        if let Some((once, op, rhs)) = self.reroll {
            node = Node::Reroll {
                once,
                cmp: Box::new(Node::Compare {
                    op,
                    rhs: Box::new(rhs),
                }),
                inner: Box::new(node),
            };
        }
        if let Some((mode, cmp)) = self.explode {
            let cmp = cmp.map(|(op, rhs)| {
                Box::new(Node::Compare {
                    op,
                    rhs: Box::new(rhs),
                })
            });
            node = Node::Explode {
                mode,
                cmp,
                inner: Box::new(node),
            };
        }
        if let Some((mode, amount)) = self.keep {
            node = Node::Keep {
                mode,
                amount: Box::new(amount),
                inner: Box::new(node),
            };
        }
        if let Some((op, rhs, fail)) = self.success {
            let fail_cmp = fail.map(|(fop, frhs)| {
                Box::new(Node::Compare {
                    op: fop,
                    rhs: Box::new(frhs),
                })
            });
            node = Node::Success {
                success_cmp: Box::new(Node::Compare {
                    op,
                    rhs: Box::new(rhs),
                }),
                fail_cmp,
                inner: Box::new(node),
            };
        }
        node
    }
}

/// Parser for dice expressions.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
}

impl<'a> Parser<'a> {
    /// Create a new parser for the given input.
    pub fn new(input: &'a str) -> Result<Self> {
        let mut lexer = Lexer::new(input);
        let current = lexer.next_token()?;
        Ok(Self { lexer, current })
    }

    /// Parse the input into a `Node` tree.
    pub fn parse(&mut self) -> Result<Node> {
        let node = self.add_expr()?;
        if self.current != Token::Eof {
            return Err(Error::Expected {
                expected: "end of input".to_string(),
                found: format!("{:?}", self.current),
            });
        }
        Ok(node)
    }

    fn advance(&mut self) -> Result<Token> {
        let prev = std::mem::replace(&mut self.current, self.lexer.next_token()?);
        Ok(prev)
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        if self.current == expected {
            self.advance()?;
            Ok(())
        } else {
            Err(Error::Expected {
                expected: format!("{:?}", expected),
                found: format!("{:?}", self.current),
            })
        }
    }

    // add_expr is the lowest-precedence level (+ -); mult_expr (* /) binds
    // tighter; both are left-associative. (spec.md's EBNF names these
    // `mult_expr`/`add_expr` the other way around, with `mult_expr` as the
    // outer rule built from `add_expr` operands -- read literally that would
    // make `+`/`-` bind *tighter* than `*`/`/`, which contradicts both the
    // stated precedence table and the worked example `2+3*4 -> 14`. This
    // implements the precedence the prose and the example agree on.)

    /// `add_expr := mult_expr (('+'|'-') mult_expr)*`
    fn add_expr(&mut self) -> Result<Node> {
        let mut left = self.mult_expr()?;
        loop {
            let op = match self.current {
                Token::Plus => Op::Add,
                Token::Minus => Op::Sub,
                _ => break,
            };
            self.advance()?;
            let right = self.mult_expr()?;
            left = Node::Math {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    /// `mult_expr := primary (('*'|'/') primary)*`
    fn mult_expr(&mut self) -> Result<Node> {
        let mut left = self.primary()?;
        loop {
            let op = match self.current {
                Token::Star => Op::Mul,
                Token::Slash => Op::Div,
                _ => break,
            };
            self.advance()?;
            let right = self.primary()?;
            left = Node::Math {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    /// `primary := '(' add_expr ')' | grouped_roll | basic_roll | number`
    fn primary(&mut self) -> Result<Node> {
        match self.current {
            Token::LParen => {
                self.advance()?;
                let node = self.add_expr()?;
                self.expect(Token::RParen)?;
                Ok(node)
            }
            Token::LBrace => self.grouped_roll(),
            Token::Number(_) | Token::LBracket => self.number_or_roll(),
            Token::D => self.roll_tail(Node::Literal(1)),
            _ => Err(Error::Expected {
                expected: "number, dice roll, or grouping".to_string(),
                found: format!("{:?}", self.current),
            }),
        }
    }

    /// A bare `number`, which is either a plain value or (if `d`/`dF`
    /// follows) the dice count of a `basic_roll`.
    fn number_or_roll(&mut self) -> Result<Node> {
        let n = self.number()?;
        if self.current == Token::D {
            self.roll_tail(n)
        } else {
            Ok(n)
        }
    }

    /// `number := DIGITS | '[' add_expr ']'`
    fn number(&mut self) -> Result<Node> {
        match self.current {
            Token::Number(n) => {
                self.advance()?;
                Ok(Node::Literal(n as i64))
            }
            Token::LBracket => {
                self.advance()?;
                let node = self.add_expr()?;
                self.expect(Token::RBracket)?;
                Ok(node)
            }
            _ => Err(Error::Expected {
                expected: "number or '['".to_string(),
                found: format!("{:?}", self.current),
            }),
        }
    }

    /// `{ group_inner } group_extras`, with `num` implicitly `1` (the
    /// grammar has no syntax for repeating a whole group).
    fn grouped_roll(&mut self) -> Result<Node> {
        self.advance()?; // consume '{'
        let mut exprs = vec![self.add_expr()?];
        while self.current == Token::Comma {
            self.advance()?;
            exprs.push(self.add_expr()?);
        }
        self.expect(Token::RBrace)?;

        let keep = self.parse_keep()?;
        let success = self.parse_success()?;
        let base = Node::Group {
            num: Box::new(Node::Literal(1)),
            exprs,
        };
        let extras = Extras {
            reroll: None,
            explode: None,
            keep,
            success,
        };
        Ok(extras.wrap(base))
    }

    /// The tail of a `basic_roll` once the leading `num` and the `d` token
    /// have been consumed (the caller still owns `num`; this consumes `d`
    /// itself plus everything after it).
    fn roll_tail(&mut self, num: Node) -> Result<Node> {
        self.advance()?; // consume 'd'
        let (kind, sides) = if self.current == Token::F {
            self.advance()?;
            (RollKind::Fate, Node::Literal(3))
        } else {
            (RollKind::Normal, self.number()?)
        };

        let reroll = self.parse_reroll()?;
        let explode = self.parse_explode()?;
        if kind == RollKind::Fate && explode.is_some() {
            return Err(Error::IllegalFateModifier);
        }
        let keep = self.parse_keep()?;
        if kind == RollKind::Fate && keep.is_some() {
            return Err(Error::IllegalFateModifier);
        }
        let success = self.parse_success()?;

        let base = Node::Roll {
            kind,
            num: Box::new(num),
            sides: Box::new(sides),
        };
        let extras = Extras {
            reroll,
            explode,
            keep,
            success,
        };
        Ok(extras.wrap(base))
    }

    /// `reroll := ('r'|'ro') explicit_compare` -- the comparison is
    /// mandatory, unlike explode's.
    fn parse_reroll(&mut self) -> Result<Option<(bool, CompareOp, Node)>> {
        if self.current != Token::R {
            return Ok(None);
        }
        self.advance()?;
        let once = if self.current == Token::O {
            self.advance()?;
            true
        } else {
            false
        };
        let (op, rhs) = self.explicit_compare()?;
        Ok(Some((once, op, rhs)))
    }

    /// `explode := ('!'|'!!'|'!p') opt_compare`
    fn parse_explode(&mut self) -> Result<Option<(ExplodeMode, Option<(CompareOp, Node)>)>> {
        if self.current != Token::Bang {
            return Ok(None);
        }
        self.advance()?;
        let mode = if self.current == Token::Bang {
            self.advance()?;
            ExplodeMode::Compound
        } else if self.current == Token::P {
            self.advance()?;
            ExplodeMode::Penetrate
        } else {
            ExplodeMode::Explode
        };
        let cmp = self.opt_compare()?;
        Ok(Some((mode, cmp)))
    }

    /// `keep := ('kh'|'kl'|'dh'|'dl') number` -- both the high/low selector
    /// and the amount are mandatory; there is no bare `k` form.
    fn parse_keep(&mut self) -> Result<Option<(KeepMode, Node)>> {
        let mode = match self.current {
            Token::K => {
                self.advance()?;
                match self.current {
                    Token::H => {
                        self.advance()?;
                        KeepMode::KeepHigh
                    }
                    Token::L => {
                        self.advance()?;
                        KeepMode::KeepLow
                    }
                    _ => {
                        return Err(Error::Expected {
                            expected: "'h' or 'l' after 'k'".to_string(),
                            found: format!("{:?}", self.current),
                        });
                    }
                }
            }
            Token::D => {
                // 'd' is also the dice separator; only treat it as a drop
                // modifier if 'h' or 'l' immediately follows.
                if !matches!(self.lexer.peek()?, Token::H | Token::L) {
                    return Ok(None);
                }
                self.advance()?;
                match self.current {
                    Token::H => {
                        self.advance()?;
                        KeepMode::DropHigh
                    }
                    Token::L => {
                        self.advance()?;
                        KeepMode::DropLow
                    }
                    _ => unreachable!(),
                }
            }
            _ => return Ok(None),
        };
        let amount = self.number()?;
        Ok(Some((mode, amount)))
    }

    /// `success := compare fail?`
    fn parse_success(&mut self) -> Result<Option<(CompareOp, Node, Option<(CompareOp, Node)>)>> {
        let Some((op, rhs)) = self.parse_compare()? else {
            return Ok(None);
        };
        let fail = if self.current == Token::F {
            self.advance()?;
            let Some(f) = self.parse_compare()? else {
                return Err(Error::Expected {
                    expected: "comparison after 'f'".to_string(),
                    found: format!("{:?}", self.current),
                });
            };
            Some(f)
        } else {
            None
        };
        Ok(Some((op, rhs, fail)))
    }

    /// `compare := explicit_compare | number` -- a bare number means "equals".
    fn parse_compare(&mut self) -> Result<Option<(CompareOp, Node)>> {
        match self.current {
            Token::Eq | Token::Lt | Token::Gt => self.explicit_compare().map(Some),
            Token::Number(_) | Token::LBracket => Ok(Some((CompareOp::Eq, self.number()?))),
            _ => Ok(None),
        }
    }

    /// `explicit_compare := ('='|'>'|'<') number`
    fn explicit_compare(&mut self) -> Result<(CompareOp, Node)> {
        let op = match self.current {
            Token::Eq => CompareOp::Eq,
            Token::Lt => CompareOp::Lt,
            Token::Gt => CompareOp::Gt,
            _ => {
                return Err(Error::Expected {
                    expected: "comparison operator ('=', '<', or '>')".to_string(),
                    found: format!("{:?}", self.current),
                });
            }
        };
        self.advance()?;
        let rhs = self.number()?;
        Ok((op, rhs))
    }

    /// `opt_compare := compare | ε` -- absent means "equal to sides".
    fn opt_compare(&mut self) -> Result<Option<(CompareOp, Node)>> {
        match self.current {
            Token::Eq | Token::Lt | Token::Gt => self.explicit_compare().map(Some),
            _ => Ok(None),
        }
    }
}

/// Parse a dice expression string into a `Node` tree.
pub fn parse(input: &str) -> Result<Node> {
    Parser::new(input)?.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number() {
        assert_eq!(parse("42").unwrap(), Node::Literal(42));
    }

    #[test]
    fn test_parse_precedence() {
        // 2+3*4 must parse as 2+(3*4), per the worked example in the spec.
        let node = parse("2+3*4").unwrap();
        match node {
            Node::Math {
                op: Op::Add,
                left,
                right,
            } => {
                assert_eq!(*left, Node::Literal(2));
                assert_eq!(
                    *right,
                    Node::Math {
                        op: Op::Mul,
                        left: Box::new(Node::Literal(3)),
                        right: Box::new(Node::Literal(4)),
                    }
                );
            }
            _ => panic!("expected addition at the root"),
        }
    }

    #[test]
    fn test_parse_basic_roll() {
        let node = parse("2d6").unwrap();
        assert_eq!(
            node,
            Node::Roll {
                kind: RollKind::Normal,
                num: Box::new(Node::Literal(2)),
                sides: Box::new(Node::Literal(6)),
            }
        );
    }

    #[test]
    fn test_parse_implicit_count() {
        let node = parse("d20").unwrap();
        assert_eq!(
            node,
            Node::Roll {
                kind: RollKind::Normal,
                num: Box::new(Node::Literal(1)),
                sides: Box::new(Node::Literal(20)),
            }
        );
    }

    #[test]
    fn test_parse_fate() {
        let node = parse("4dF").unwrap();
        assert_eq!(
            node,
            Node::Roll {
                kind: RollKind::Fate,
                num: Box::new(Node::Literal(4)),
                sides: Box::new(Node::Literal(3)),
            }
        );
    }

    #[test]
    fn test_parse_keep_highest() {
        let node = parse("4d6kh3").unwrap();
        assert_eq!(
            node,
            Node::Keep {
                mode: KeepMode::KeepHigh,
                amount: Box::new(Node::Literal(3)),
                inner: Box::new(Node::Roll {
                    kind: RollKind::Normal,
                    num: Box::new(Node::Literal(4)),
                    sides: Box::new(Node::Literal(6)),
                }),
            }
        );
    }

    #[test]
    fn test_parse_drop_lowest() {
        let node = parse("4d6dl1").unwrap();
        assert_eq!(
            node,
            Node::Keep {
                mode: KeepMode::DropLow,
                amount: Box::new(Node::Literal(1)),
                inner: Box::new(Node::Roll {
                    kind: RollKind::Normal,
                    num: Box::new(Node::Literal(4)),
                    sides: Box::new(Node::Literal(6)),
                }),
            }
        );
    }

    #[test]
    fn test_parse_explode_modes() {
        assert!(matches!(
            parse("1d6!").unwrap(),
            Node::Explode {
                mode: ExplodeMode::Explode,
                cmp: None,
                ..
            }
        ));
        assert!(matches!(
            parse("1d6!!").unwrap(),
            Node::Explode {
                mode: ExplodeMode::Compound,
                cmp: None,
                ..
            }
        ));
        assert!(matches!(
            parse("1d6!p").unwrap(),
            Node::Explode {
                mode: ExplodeMode::Penetrate,
                cmp: None,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_explode_condition() {
        let node = parse("6d10!>7").unwrap();
        match node {
            Node::Explode {
                mode: ExplodeMode::Explode,
                cmp: Some(cmp),
                ..
            } => {
                assert_eq!(
                    *cmp,
                    Node::Compare {
                        op: CompareOp::Gt,
                        rhs: Box::new(Node::Literal(7)),
                    }
                );
            }
            other => panic!("unexpected node: {other:?}"),
        }
    }

    #[test]
    fn test_parse_reroll_requires_compare() {
        assert!(parse("10d6r").is_err());
        let node = parse("10d6r=1").unwrap();
        assert!(matches!(node, Node::Reroll { once: false, .. }));
        let node = parse("10d6ro<3").unwrap();
        assert!(matches!(node, Node::Reroll { once: true, .. }));
    }

    #[test]
    fn test_parse_success_with_failure() {
        let node = parse("6d10!>7f<3").unwrap();
        match node {
            Node::Success {
                success_cmp,
                fail_cmp: Some(fail_cmp),
                inner,
            } => {
                assert_eq!(
                    *success_cmp,
                    Node::Compare {
                        op: CompareOp::Gt,
                        rhs: Box::new(Node::Literal(7)),
                    }
                );
                assert_eq!(
                    *fail_cmp,
                    Node::Compare {
                        op: CompareOp::Lt,
                        rhs: Box::new(Node::Literal(3)),
                    }
                );
                assert!(matches!(*inner, Node::Explode { .. }));
            }
            other => panic!("unexpected node: {other:?}"),
        }
    }

    #[test]
    fn test_parse_bare_success_count() {
        let node = parse("8d6=6").unwrap();
        assert!(matches!(
            node,
            Node::Success {
                success_cmp: _,
                fail_cmp: None,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_grouped_roll() {
        let node = parse("{2d6,1d8}k1").unwrap();
        match node {
            Node::Keep {
                mode: KeepMode::KeepHigh,
                amount,
                inner,
            } => {
                assert_eq!(*amount, Node::Literal(1));
                match *inner {
                    Node::Group { num, exprs } => {
                        assert_eq!(*num, Node::Literal(1));
                        assert_eq!(exprs.len(), 2);
                    }
                    other => panic!("unexpected inner: {other:?}"),
                }
            }
            other => panic!("unexpected node: {other:?}"),
        }
    }

    #[test]
    fn test_parse_bracketed_number() {
        let node = parse("[1+2]d6").unwrap();
        assert_eq!(
            node,
            Node::Roll {
                kind: RollKind::Normal,
                num: Box::new(Node::Math {
                    op: Op::Add,
                    left: Box::new(Node::Literal(1)),
                    right: Box::new(Node::Literal(2)),
                }),
                sides: Box::new(Node::Literal(6)),
            }
        );
    }

    #[test]
    fn test_parse_paren_grouping() {
        let node = parse("(2d6 + 3) * 2").unwrap();
        match node {
            Node::Math {
                op: Op::Mul,
                left,
                right,
            } => {
                assert!(matches!(*left, Node::Math { op: Op::Add, .. }));
                assert_eq!(*right, Node::Literal(2));
            }
            other => panic!("unexpected node: {other:?}"),
        }
    }

    #[test]
    fn test_fate_rejects_explode_and_keep() {
        assert!(parse("4dF!").is_err());
        assert!(parse("4dFkh2").is_err());
    }

    #[test]
    fn test_modifier_order_is_canonical() {
        // reroll -> explode -> keep -> success, regardless of input order,
        // because the parser always applies them in that fixed order.
        let node = parse("4d6r=1!kh3").unwrap();
        match node {
            Node::Keep { inner, .. } => match *inner {
                Node::Explode { inner, .. } => {
                    assert!(matches!(*inner, Node::Reroll { .. }));
                }
                other => panic!("expected explode, found {other:?}"),
            },
            other => panic!("expected keep, found {other:?}"),
        }
    }
}
