//! Arithmetic for the `calculate` skill.
//!
//! Grammar (usual precedence, `^` right-associative):
//!
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := power (('*' | '/' | '%') power)*
//! power  := unary ('^' power)?
//! unary  := '-' unary | '+' unary | atom
//! atom   := number | '(' expr ')'
//! ```

use crate::error::{Error, Result};

const SKILL: &str = "calculate";
const MAX_DEPTH: usize = 256;

/// Rewrite spoken arithmetic into symbols and drop anything else.
///
/// "12 times 7" → "12*7", "what's 3 x 4?" → "3*4".
pub fn normalize(expression: &str) -> String {
    let mut text = expression.to_lowercase();
    for (word, symbol) in [
        ("divided by", "/"),
        ("multiplied by", "*"),
        ("to the power of", "^"),
        ("times", "*"),
        ("plus", "+"),
        ("minus", "-"),
        ("mod", "%"),
        ("×", "*"),
        ("÷", "/"),
    ] {
        text = text.replace(word, symbol);
    }

    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(chars.len());
    for (i, &c) in chars.iter().enumerate() {
        match c {
            '0'..='9' | '.' | '+' | '-' | '*' | '/' | '%' | '^' | '(' | ')' => out.push(c),
            // "3 x 4" / "3x4": only between operands
            'x' => {
                let prev = chars[..i].iter().rev().find(|c| !c.is_whitespace());
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                let operand = |c: Option<&char>| matches!(c, Some(c) if c.is_ascii_digit() || *c == ')' || *c == '(' || *c == '.');
                if operand(prev) && operand(next) {
                    out.push('*');
                }
            }
            _ => {}
        }
    }
    out
}

/// Evaluate an arithmetic expression.
pub fn evaluate(expression: &str) -> Result<f64> {
    let normalized = normalize(expression);
    if normalized.is_empty() {
        return Err(Error::invalid_params(
            SKILL,
            format!("no arithmetic found in {expression:?}"),
        ));
    }

    let mut parser = Parser {
        chars: normalized.chars().collect(),
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    if parser.pos < parser.chars.len() {
        return Err(parser.error("unexpected trailing input"));
    }
    if !value.is_finite() {
        return Err(Error::skill(SKILL, "result is not a finite number"));
    }
    Ok(value)
}

/// Render a result without a trailing `.0` for whole numbers.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        let s = format!("{:.10}", value);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn error(&self, message: &str) -> Error {
        Error::invalid_params(SKILL, format!("{message} at position {}", self.pos))
    }

    /// Run `f` one nesting level deeper.
    fn nested(&mut self, f: impl FnOnce(&mut Self) -> Result<f64>) -> Result<f64> {
        if self.depth >= MAX_DEPTH {
            return Err(Error::invalid_params(SKILL, "expression nested too deeply"));
        }
        self.depth += 1;
        let value = f(self);
        self.depth -= 1;
        value
    }

    fn expr(&mut self) -> Result<f64> {
        let mut value = self.term()?;
        while let Some(op @ ('+' | '-')) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            value = if op == '+' { value + rhs } else { value - rhs };
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<f64> {
        let mut value = self.power()?;
        while let Some(op @ ('*' | '/' | '%')) = self.peek() {
            self.pos += 1;
            let rhs = self.power()?;
            value = match op {
                '*' => value * rhs,
                _ if rhs == 0.0 => return Err(Error::skill(SKILL, "division by zero")),
                '/' => value / rhs,
                _ => value % rhs,
            };
        }
        Ok(value)
    }

    fn power(&mut self) -> Result<f64> {
        let base = self.unary()?;
        if self.peek() == Some('^') {
            self.pos += 1;
            let exponent = self.nested(Self::power)?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn unary(&mut self) -> Result<f64> {
        match self.peek() {
            Some('-') => {
                self.pos += 1;
                Ok(-self.nested(Self::unary)?)
            }
            Some('+') => {
                self.pos += 1;
                self.nested(Self::unary)
            }
            _ => self.atom(),
        }
    }

    fn atom(&mut self) -> Result<f64> {
        match self.peek() {
            Some('(') => {
                self.pos += 1;
                let value = self.nested(Self::expr)?;
                if self.peek() != Some(')') {
                    return Err(self.error("missing closing parenthesis"));
                }
                self.pos += 1;
                Ok(value)
            }
            Some(c) if c.is_ascii_digit() || c == '.' => {
                let start = self.pos;
                while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '.') {
                    self.pos += 1;
                }
                let literal: String = self.chars[start..self.pos].iter().collect();
                literal
                    .parse()
                    .map_err(|_| self.error(&format!("invalid number {literal:?}")))
            }
            Some(_) => Err(self.error("unexpected symbol")),
            None => Err(self.error("unexpected end of expression")),
        }
    }
}
