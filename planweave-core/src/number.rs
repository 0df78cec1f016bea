use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PlanError;

/// Numeric value of a numeric fluent. Integers are preferred when parsing so
/// that increment chains stay exact; floats only appear when the text form
/// carries a decimal point.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub const ZERO: Number = Number::Int(0);

    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }
}

impl Default for Number {
    fn default() -> Self {
        Number::ZERO
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a == b,
            (a, b) => a.as_f64() == b.as_f64(),
        }
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.as_f64().partial_cmp(&other.as_f64())
    }
}

impl Add for Number {
    type Output = Number;
    fn add(self, rhs: Number) -> Number {
        match (self, rhs) {
            (Number::Int(a), Number::Int(b)) => Number::Int(a + b),
            (a, b) => Number::Float(a.as_f64() + b.as_f64()),
        }
    }
}

impl Sub for Number {
    type Output = Number;
    fn sub(self, rhs: Number) -> Number {
        match (self, rhs) {
            (Number::Int(a), Number::Int(b)) => Number::Int(a - b),
            (a, b) => Number::Float(a.as_f64() - b.as_f64()),
        }
    }
}

impl Mul for Number {
    type Output = Number;
    fn mul(self, rhs: Number) -> Number {
        match (self, rhs) {
            (Number::Int(a), Number::Int(b)) => Number::Int(a * b),
            (a, b) => Number::Float(a.as_f64() * b.as_f64()),
        }
    }
}

impl AddAssign for Number {
    fn add_assign(&mut self, rhs: Number) {
        *self = *self + rhs;
    }
}

impl FromStr for Number {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(i) = s.parse::<i64>() {
            return Ok(Number::Int(i));
        }
        if let Ok(f) = s.parse::<f64>() {
            return Ok(Number::Float(f));
        }
        Err(PlanError::Parse(format!("invalid number format: \"{s}\"")))
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{i}"),
            Number::Float(v) => write!(f, "{v}"),
        }
    }
}

/// True when the token looks like a signed integer or decimal literal.
pub fn is_number(s: &str) -> bool {
    let mut chars = s.chars().peekable();
    if matches!(chars.peek(), Some('-') | Some('+')) {
        chars.next();
    }
    let mut has_digit = false;
    let mut has_dot = false;
    for c in chars {
        if c.is_ascii_digit() {
            has_digit = true;
        } else if c == '.' {
            if has_dot {
                return false;
            }
            has_dot = true;
        } else {
            return false;
        }
    }
    has_digit
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prefers_int() {
        assert_eq!("10".parse::<Number>().unwrap(), Number::Int(10));
        assert_eq!("-3".parse::<Number>().unwrap(), Number::Int(-3));
        assert_eq!("2.5".parse::<Number>().unwrap(), Number::Float(2.5));
        assert!("toto".parse::<Number>().is_err());
    }

    #[test]
    fn test_arithmetic_stays_integral() {
        let a = Number::Int(4);
        let b = Number::Int(3);
        assert_eq!(a + b, Number::Int(7));
        assert_eq!(a - b, Number::Int(1));
        assert_eq!(a * b, Number::Int(12));
        assert_eq!((a + b).to_string(), "7");
    }

    #[test]
    fn test_mixed_comparison() {
        assert!(Number::Int(2) < Number::Float(2.5));
        assert_eq!(Number::Int(2), Number::Float(2.0));
    }

    #[test]
    fn test_is_number() {
        assert!(is_number("42"));
        assert!(is_number("-1.5"));
        assert!(!is_number("1.2.3"));
        assert!(!is_number("abc"));
        assert!(!is_number(""));
    }
}
