//! Hand-rolled recursive-descent parser for the parameter expression grammar.
//!
//! ```text
//! expr   := or
//! or     := and ("||" and)*
//! and    := cmp ("&&" cmp)*
//! cmp    := add (("=="|"!="|"<="|">="|"<"|">") add)?
//! add    := mul (("+"|"-") mul)*
//! mul    := unary (("*"|"/") unary)*
//! unary  := ("-"|"!") unary | power
//! power  := atom ("^" unary)?
//! atom   := number unit? | ident "(" args ")" | ident | "(" expr ")"
//! unit   := "[" ident "]"
//! ```

use crate::error::ExprError;

use super::{unit_factor, BinaryOp, Expr, Func, Quantity, UnaryOp};

pub(super) fn parse(text: &str) -> Result<Expr, ExprError> {
    let mut p = Parser {
        text,
        chars: text.char_indices().collect(),
        pos: 0,
    };
    let expr = p.parse_or()?;
    p.skip_ws();
    if p.pos < p.chars.len() {
        return Err(p.error("trailing input"));
    }
    Ok(expr)
}

struct Parser<'a> {
    text: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
}

impl Parser<'_> {
    fn error(&self, message: &str) -> ExprError {
        let offset = self
            .chars
            .get(self.pos)
            .map_or(self.text.len(), |&(i, _)| i);
        ExprError::Parse {
            source_text: self.text.to_string(),
            offset,
            message: message.to_string(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|&(_, c)| c)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    /// Consumes `token` if it is next (after whitespace).
    fn eat(&mut self, token: &str) -> bool {
        self.skip_ws();
        let n = token.chars().count();
        let matches = self
            .chars
            .get(self.pos..self.pos + n)
            .is_some_and(|w| w.iter().map(|&(_, c)| c).eq(token.chars()));
        if matches {
            self.pos += n;
        }
        matches
    }

    fn expect(&mut self, token: &str) -> Result<(), ExprError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(&format!("expected {token:?}")))
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_and()?;
        while self.eat("||") {
            let rhs = self.parse_and()?;
            lhs = Expr::Binary(BinaryOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_cmp()?;
        while self.eat("&&") {
            let rhs = self.parse_cmp()?;
            lhs = Expr::Binary(BinaryOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_cmp(&mut self) -> Result<Expr, ExprError> {
        let lhs = self.parse_add()?;
        // Two-character operators first so "<=" is not read as "<" "=".
        let op = if self.eat("==") {
            BinaryOp::Eq
        } else if self.eat("!=") {
            BinaryOp::Ne
        } else if self.eat("<=") {
            BinaryOp::Le
        } else if self.eat(">=") {
            BinaryOp::Ge
        } else if self.eat("<") {
            BinaryOp::Lt
        } else if self.eat(">") {
            BinaryOp::Gt
        } else {
            return Ok(lhs);
        };
        let rhs = self.parse_add()?;
        Ok(Expr::Binary(op, Box::new(lhs), Box::new(rhs)))
    }

    fn parse_add(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_mul()?;
        loop {
            let op = if self.eat("+") {
                BinaryOp::Add
            } else if self.eat("-") {
                BinaryOp::Sub
            } else {
                return Ok(lhs);
            };
            let rhs = self.parse_mul()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_mul(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = if self.eat("*") {
                BinaryOp::Mul
            } else if self.eat("/") {
                BinaryOp::Div
            } else {
                return Ok(lhs);
            };
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        if self.eat("-") {
            let inner = self.parse_unary()?;
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(inner)));
        }
        self.skip_ws();
        if self.peek() == Some('!') && self.chars.get(self.pos + 1).map(|&(_, c)| c) != Some('=') {
            self.pos += 1;
            let inner = self.parse_unary()?;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(inner)));
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> Result<Expr, ExprError> {
        let base = self.parse_atom()?;
        if self.eat("^") {
            // Right-associative.
            let exp = self.parse_unary()?;
            return Ok(Expr::Binary(BinaryOp::Pow, Box::new(base), Box::new(exp)));
        }
        Ok(base)
    }

    fn parse_atom(&mut self) -> Result<Expr, ExprError> {
        self.skip_ws();
        match self.peek() {
            Some('(') => {
                self.pos += 1;
                let inner = self.parse_or()?;
                self.expect(")")?;
                Ok(inner)
            }
            Some(c) if c.is_ascii_digit() || c == '.' => self.parse_number(),
            Some(c) if c.is_alphabetic() || c == '_' => self.parse_ident_or_call(),
            _ => Err(self.error("expected a number, name, or parenthesized expression")),
        }
    }

    fn parse_number(&mut self) -> Result<Expr, ExprError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '.') {
            self.pos += 1;
        }
        // Scientific notation tail.
        if matches!(self.peek(), Some('e' | 'E')) {
            let mark = self.pos;
            self.pos += 1;
            if matches!(self.peek(), Some('+' | '-')) {
                self.pos += 1;
            }
            if matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                    self.pos += 1;
                }
            } else {
                self.pos = mark;
            }
        }
        let literal: String = self.chars[start..self.pos].iter().map(|&(_, c)| c).collect();
        let value: f64 = literal
            .parse()
            .map_err(|_| self.error("malformed numeric literal"))?;

        let mut quantity = Quantity::scalar(value);
        if self.eat("[") {
            let name = self.parse_name()?;
            self.expect("]")?;
            let (factor, dim) = unit_factor(&name)?;
            quantity = Quantity {
                value: value * factor,
                dim,
            };
        }
        Ok(Expr::Number(quantity))
    }

    fn parse_ident_or_call(&mut self) -> Result<Expr, ExprError> {
        let name = self.parse_name()?;
        if self.eat("(") {
            let func = Func::from_name(&name)?;
            let mut args = Vec::new();
            if !self.eat(")") {
                loop {
                    args.push(self.parse_or()?);
                    if self.eat(")") {
                        break;
                    }
                    self.expect(",")?;
                }
            }
            if args.len() != func.arity() {
                return Err(self.error(&format!(
                    "{name} takes {} argument(s), got {}",
                    func.arity(),
                    args.len()
                )));
            }
            return Ok(Expr::Call(func, args));
        }
        Ok(Expr::Ident(name))
    }

    fn parse_name(&mut self) -> Result<String, ExprError> {
        self.skip_ws();
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.error("expected a name"));
        }
        Ok(self.chars[start..self.pos].iter().map(|&(_, c)| c).collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::super::{BinaryOp, Expr};

    #[test]
    fn precedence_mul_over_add() {
        let e = Expr::parse("1 + 2 * 3").unwrap();
        let Expr::Binary(BinaryOp::Add, _, rhs) = e else {
            panic!("top operator should be +");
        };
        assert!(matches!(*rhs, Expr::Binary(BinaryOp::Mul, _, _)));
    }

    #[test]
    fn comparison_and_logic() {
        let e = Expr::parse("(Theta<360[deg]) && (N_holes>0)").unwrap();
        assert!(matches!(e, Expr::Binary(BinaryOp::And, _, _)));
    }

    #[test]
    fn nested_call_with_parameter_arithmetic() {
        assert!(Expr::parse("(R_in+Recess+Thk_elec/2)*cos(Rot_def+Theta_contact/2)").is_ok());
    }

    #[test]
    fn le_is_not_lt_followed_by_eq() {
        let e = Expr::parse("a <= b").unwrap();
        assert!(matches!(e, Expr::Binary(BinaryOp::Le, _, _)));
    }

    #[test]
    fn trailing_garbage_is_an_error() {
        assert!(Expr::parse("1 + 2 )").is_err());
    }

    #[test]
    fn scientific_notation() {
        let e = Expr::parse("1.5e3").unwrap();
        assert!(matches!(e, Expr::Number(q) if (q.value - 1500.0).abs() < 1e-9));
    }
}
