//! Parameter expression evaluation.
//!
//! Block parameters accept a literal number, a variable name, or a small
//! arithmetic expression over the shared variable context. The grammar
//! is deliberately minimal: numbers, identifiers, unary minus, the four
//! arithmetic operators, comparisons, and parentheses. Comparisons
//! evaluate to 1.0 / 0.0 so conditions and values share one evaluator.

use std::collections::HashMap;

use thiserror::Error;

/// Expression parse or evaluation failure, with the byte offset of the
/// offending input where one exists.
#[derive(Error, Debug, PartialEq)]
pub enum ExprError {
    /// A character outside the grammar's alphabet.
    #[error("unexpected character '{ch}' at byte {pos}")]
    UnexpectedChar {
        /// Byte offset into the source.
        pos: usize,
        /// The character found.
        ch: char,
    },

    /// The expression ended where a value or operator was required.
    #[error("unexpected end of expression")]
    UnexpectedEnd,

    /// A token the grammar does not allow at this position.
    #[error("unexpected token at byte {pos}")]
    UnexpectedToken {
        /// Byte offset of the token.
        pos: usize,
    },

    /// Leftover input after a complete expression.
    #[error("trailing input at byte {pos}")]
    Trailing {
        /// Byte offset where the leftover starts.
        pos: usize,
    },

    /// An identifier not present in the variable context.
    #[error("unknown variable '{name}'")]
    UnknownVariable {
        /// The missing variable.
        name: String,
    },
}

/// Result type for expression handling.
pub type Result<T> = std::result::Result<T, ExprError>;

/// Parsed expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Numeric literal.
    Num(f64),
    /// Variable reference, resolved at evaluation time.
    Var(String),
    /// Unary negation.
    Neg(Box<Expr>),
    /// Binary operation.
    Bin(BinOp, Box<Expr>, Box<Expr>),
}

/// Binary operator of the expression grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `==`
    Eq,
    /// `!=`
    Ne,
}

impl Expr {
    /// Evaluate against a variable context.
    pub fn eval(&self, vars: &HashMap<String, f64>) -> Result<f64> {
        match self {
            Expr::Num(n) => Ok(*n),
            Expr::Var(name) => vars
                .get(name)
                .copied()
                .ok_or_else(|| ExprError::UnknownVariable { name: name.clone() }),
            Expr::Neg(inner) => Ok(-inner.eval(vars)?),
            Expr::Bin(op, lhs, rhs) => {
                let a = lhs.eval(vars)?;
                let b = rhs.eval(vars)?;
                Ok(match op {
                    BinOp::Add => a + b,
                    BinOp::Sub => a - b,
                    BinOp::Mul => a * b,
                    BinOp::Div => a / b,
                    BinOp::Lt => bool_num(a < b),
                    BinOp::Le => bool_num(a <= b),
                    BinOp::Gt => bool_num(a > b),
                    BinOp::Ge => bool_num(a >= b),
                    BinOp::Eq => bool_num(a == b),
                    BinOp::Ne => bool_num(a != b),
                })
            }
        }
    }
}

fn bool_num(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

/// Parse and evaluate in one step.
pub fn eval_str(src: &str, vars: &HashMap<String, f64>) -> Result<f64> {
    parse(src)?.eval(vars)
}

/// Parse `src` into an expression tree.
pub fn parse(src: &str) -> Result<Expr> {
    let tokens = tokenize(src)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.comparison()?;
    if let Some((pos, _)) = parser.peek() {
        return Err(ExprError::Trailing { pos });
    }
    Ok(expr)
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Num(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Cmp(BinOp),
}

fn tokenize(src: &str) -> Result<Vec<(usize, Tok)>> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i] as char;
        match c {
            ' ' | '\t' => i += 1,
            '+' => {
                tokens.push((i, Tok::Plus));
                i += 1;
            }
            '-' => {
                tokens.push((i, Tok::Minus));
                i += 1;
            }
            '*' => {
                tokens.push((i, Tok::Star));
                i += 1;
            }
            '/' => {
                tokens.push((i, Tok::Slash));
                i += 1;
            }
            '(' => {
                tokens.push((i, Tok::LParen));
                i += 1;
            }
            ')' => {
                tokens.push((i, Tok::RParen));
                i += 1;
            }
            '<' | '>' | '=' | '!' => {
                let two = bytes.get(i + 1) == Some(&b'=');
                let op = match (c, two) {
                    ('<', false) => BinOp::Lt,
                    ('<', true) => BinOp::Le,
                    ('>', false) => BinOp::Gt,
                    ('>', true) => BinOp::Ge,
                    ('=', true) => BinOp::Eq,
                    ('!', true) => BinOp::Ne,
                    // Bare '=' or '!' is not an operator.
                    _ => return Err(ExprError::UnexpectedChar { pos: i, ch: c }),
                };
                tokens.push((i, Tok::Cmp(op)));
                i += if two { 2 } else { 1 };
            }
            '0'..='9' | '.' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                    i += 1;
                }
                let text = &src[start..i];
                let n: f64 = text
                    .parse()
                    .map_err(|_| ExprError::UnexpectedChar { pos: start, ch: '.' })?;
                tokens.push((start, Tok::Num(n)));
            }
            _ if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < bytes.len()
                    && ((bytes[i] as char).is_ascii_alphanumeric() || bytes[i] == b'_')
                {
                    i += 1;
                }
                tokens.push((start, Tok::Ident(src[start..i].to_string())));
            }
            _ => return Err(ExprError::UnexpectedChar { pos: i, ch: c }),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<(usize, Tok)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<(usize, &Tok)> {
        self.tokens.get(self.pos).map(|(p, t)| (*p, t))
    }

    fn advance(&mut self) -> Option<(usize, Tok)> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    // comparison := additive (cmp-op additive)?
    fn comparison(&mut self) -> Result<Expr> {
        let lhs = self.additive()?;
        if let Some((_, Tok::Cmp(op))) = self.peek() {
            let op = *op;
            self.pos += 1;
            let rhs = self.additive()?;
            return Ok(Expr::Bin(op, Box::new(lhs), Box::new(rhs)));
        }
        Ok(lhs)
    }

    // additive := multiplicative (('+' | '-') multiplicative)*
    fn additive(&mut self) -> Result<Expr> {
        let mut lhs = self.multiplicative()?;
        while let Some((_, tok)) = self.peek() {
            let op = match tok {
                Tok::Plus => BinOp::Add,
                Tok::Minus => BinOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.multiplicative()?;
            lhs = Expr::Bin(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    // multiplicative := unary (('*' | '/') unary)*
    fn multiplicative(&mut self) -> Result<Expr> {
        let mut lhs = self.unary()?;
        while let Some((_, tok)) = self.peek() {
            let op = match tok {
                Tok::Star => BinOp::Mul,
                Tok::Slash => BinOp::Div,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Expr::Bin(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    // unary := '-' unary | primary
    fn unary(&mut self) -> Result<Expr> {
        if let Some((_, Tok::Minus)) = self.peek() {
            self.pos += 1;
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        self.primary()
    }

    // primary := number | identifier | '(' comparison ')'
    fn primary(&mut self) -> Result<Expr> {
        match self.advance() {
            Some((_, Tok::Num(n))) => Ok(Expr::Num(n)),
            Some((_, Tok::Ident(name))) => Ok(Expr::Var(name)),
            Some((_, Tok::LParen)) => {
                let inner = self.comparison()?;
                match self.advance() {
                    Some((_, Tok::RParen)) => Ok(inner),
                    Some((pos, _)) => Err(ExprError::UnexpectedToken { pos }),
                    None => Err(ExprError::UnexpectedEnd),
                }
            }
            Some((pos, _)) => Err(ExprError::UnexpectedToken { pos }),
            None => Err(ExprError::UnexpectedEnd),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn precedence_and_parens() {
        let vars = HashMap::new();
        assert_eq!(eval_str("2 + 3 * 4", &vars).unwrap(), 14.0);
        assert_eq!(eval_str("(2 + 3) * 4", &vars).unwrap(), 20.0);
        assert_eq!(eval_str("10 - 4 - 3", &vars).unwrap(), 3.0);
        assert_eq!(eval_str("12 / 4 / 3", &vars).unwrap(), 1.0);
    }

    #[test]
    fn unary_minus() {
        let vars = ctx(&[("h", 30.0)]);
        assert_eq!(eval_str("-h / 2", &vars).unwrap(), -15.0);
        assert_eq!(eval_str("--3", &vars).unwrap(), 3.0);
        assert_eq!(eval_str("5 * -2", &vars).unwrap(), -10.0);
    }

    #[test]
    fn variables_resolve_through_context() {
        let vars = ctx(&[("i", 4.0), ("spacing", 2.5)]);
        assert_eq!(eval_str("i * spacing + 1", &vars).unwrap(), 11.0);
        assert_eq!(
            eval_str("missing + 1", &vars),
            Err(ExprError::UnknownVariable {
                name: "missing".into()
            })
        );
    }

    #[test]
    fn comparisons_yield_zero_or_one() {
        let vars = ctx(&[("n", 5.0)]);
        assert_eq!(eval_str("n < 10", &vars).unwrap(), 1.0);
        assert_eq!(eval_str("n >= 6", &vars).unwrap(), 0.0);
        assert_eq!(eval_str("n == 5", &vars).unwrap(), 1.0);
        assert_eq!(eval_str("n != 5", &vars).unwrap(), 0.0);
        assert_eq!(eval_str("n + 1 > 2 * n - 5", &vars).unwrap(), 1.0);
    }

    #[test]
    fn errors_carry_byte_positions() {
        let vars = HashMap::new();
        assert_eq!(
            eval_str("1 + #", &vars),
            Err(ExprError::UnexpectedChar { pos: 4, ch: '#' })
        );
        assert_eq!(
            eval_str("1 + = 2", &vars),
            Err(ExprError::UnexpectedChar { pos: 4, ch: '=' })
        );
        assert_eq!(eval_str("1 +", &vars), Err(ExprError::UnexpectedEnd));
        assert_eq!(eval_str("1 2", &vars), Err(ExprError::Trailing { pos: 2 }));
        assert_eq!(
            eval_str("(1 + 2", &vars),
            Err(ExprError::UnexpectedEnd)
        );
    }
}
