//
// Copyright (c) 2024 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::charset::{str2nr, NumBases};
use crate::error::{e, runtime, Result};

pub type ListRef = Rc<RefCell<Vec<Value>>>;

/// A script value. Lists are shared by reference, as in `let b = a`.
#[derive(Debug, Clone)]
pub enum Value {
    Number(i64),
    String(String),
    List(ListRef),
    Func(String),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Value {
        Value::String(s.into())
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn type_nr(&self) -> i64 {
        match self {
            Value::Number(_) => 0,
            Value::String(_) => 1,
            Value::Func(_) => 2,
            Value::List(_) => 3,
        }
    }

    /// Numeric value; strings convert by their leading number.
    pub fn to_number(&self) -> Result<i64> {
        match self {
            Value::Number(n) => Ok(*n),
            Value::String(s) => Ok(str2nr(s.trim_start(), NumBases::ALL)
                .map(|(n, _)| n)
                .unwrap_or(0)),
            Value::List(_) => Err(runtime("E745: Using a List as a Number")),
            Value::Func(_) => Err(runtime("E703: Using a Funcref as a Number")),
        }
    }

    /// String value; lists are rejected.
    pub fn to_str(&self) -> Result<String> {
        match self {
            Value::Number(n) => Ok(n.to_string()),
            Value::String(s) => Ok(s.clone()),
            Value::List(_) => Err(runtime(e::NUMBER_AS_STRING)),
            Value::Func(name) => Ok(name.clone()),
        }
    }

    pub fn truthy(&self) -> Result<bool> {
        Ok(self.to_number()? != 0)
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Value::Number(n) => *n == 0,
            Value::String(s) => s.is_empty(),
            Value::List(l) => l.borrow().is_empty(),
            Value::Func(_) => false,
        }
    }

    /// The form produced by `string()`: strings are single-quoted.
    pub fn string_repr(&self) -> String {
        match self {
            Value::String(s) => format!("'{}'", s.replace('\'', "''")),
            Value::Func(name) => format!("function('{name}')"),
            other => other.to_string(),
        }
    }

    /// Equality as used by `==`, optionally ignoring case.
    pub fn equals(&self, other: &Value, ic: bool) -> Result<bool> {
        match (self, other) {
            (Value::List(a), Value::List(b)) => {
                if Rc::ptr_eq(a, b) {
                    return Ok(true);
                }
                let (a, b) = (a.borrow(), b.borrow());
                if a.len() != b.len() {
                    return Ok(false);
                }
                for (x, y) in a.iter().zip(b.iter()) {
                    if !x.equals(y, ic)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            (Value::List(_), _) | (_, Value::List(_)) => {
                Err(runtime("E691: Can only compare List with List"))
            }
            (Value::String(a), Value::String(b)) => Ok(if ic {
                a.to_lowercase() == b.to_lowercase()
            } else {
                a == b
            }),
            (Value::Func(a), Value::Func(b)) => Ok(a == b),
            (a, b) => Ok(a.to_number()? == b.to_number()?),
        }
    }
}

impl fmt::Display for Value {
    /// The form produced by `:echo`: strings are shown raw, list items use
    /// `string()`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s}"),
            Value::Func(name) => write!(f, "{name}"),
            Value::List(l) => {
                let items: Vec<String> = l.borrow().iter().map(|v| v.string_repr()).collect();
                write!(f, "[{}]", items.join(", "))
            }
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other, false).unwrap_or(false)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Number(b as i64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;

    #[test]
    fn conversions() {
        assert_eq!(Value::str("12abc").to_number().unwrap(), 12);
        assert_eq!(Value::str("abc").to_number().unwrap(), 0);
        assert!(Value::list(vec![]).to_str().is_err());
        assert_eq!(Value::Number(-3).to_str().unwrap(), "-3");
    }

    #[test]
    fn echo_and_string_forms() {
        let l = Value::list(vec![Value::Number(1), Value::str("it's")]);
        assert_eq!(l.to_string(), "[1, 'it''s']");
        assert_eq!(Value::str("x").string_repr(), "'x'");
    }

    #[test]
    fn shared_lists_compare_equal() {
        let l = Value::list(vec![Value::Number(1)]);
        let m = l.clone();
        assert!(l.equals(&m, false).unwrap());
        assert!(Value::str("A").equals(&Value::str("a"), true).unwrap());
    }
}
