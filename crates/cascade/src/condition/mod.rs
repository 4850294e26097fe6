//! Sandboxed condition language.
//!
//! A [`Condition`] is compiled once from its source text and evaluated against
//! a [`Variables`] snapshot built from a sensor's current readings. The
//! language only knows numbers, booleans, the supplied variable names and
//! arithmetic / comparison / boolean operators; nothing else in the process
//! is reachable from an expression.
//!
//! ```
//! use cascade_core::{Condition, Readings};
//!
//! let cond = Condition::new("distance < 10");
//! assert!(!cond.evaluate(&Readings::Distance { distance: 30.0 }.variables()).unwrap());
//! assert!(cond.evaluate(&Readings::Distance { distance: 5.0 }.variables()).unwrap());
//! ```

mod lexer;
mod parser;

use std::fmt;

use smallvec::SmallVec;

use crate::error::EvaluationError;
use parser::{ArithOp, CmpOp, Expr};

/// Source text of the default condition: constant false, never fires.
pub const NEVER: &str = "0";

/// A value inside the condition language.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Number(f64),
    Bool(bool),
}

impl Value {
    /// `true`, or any non-zero number.
    pub fn is_truthy(self) -> bool {
        match self {
            Value::Bool(b) => b,
            Value::Number(n) => n != 0.0,
        }
    }

    fn type_name(self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Bool(_) => "bool",
        }
    }

    fn number(self, operation: &'static str) -> Result<f64, EvaluationError> {
        match self {
            Value::Number(n) => Ok(n),
            other => Err(EvaluationError::TypeMismatch {
                operation,
                found: other.type_name(),
            }),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Named variables visible to one evaluation.
///
/// Sensors expose at most three variables, so this stays inline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Variables {
    entries: SmallVec<[(&'static str, Value); 3]>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a variable.
    pub fn with(mut self, name: &'static str, value: impl Into<Value>) -> Self {
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((name, value)),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| *v)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(n, _)| *n)
    }
}

/// A compiled condition expression.
///
/// Construction never fails: a malformed expression is kept as-is and its
/// syntax error is returned by every call to [`Condition::evaluate`].
#[derive(Clone)]
pub struct Condition {
    source: String,
    compiled: Result<Expr, EvaluationError>,
}

impl Condition {
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let compiled = parser::parse(&source);
        Self { source, compiled }
    }

    /// The constant-false default.
    pub fn never() -> Self {
        Self::new(NEVER)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Syntax error found while compiling, if any.
    pub fn compile_error(&self) -> Option<&EvaluationError> {
        self.compiled.as_ref().err()
    }

    pub fn evaluate(&self, vars: &Variables) -> Result<bool, EvaluationError> {
        let expr = self.compiled.as_ref().map_err(|e| e.clone())?;
        eval(expr, vars).map(Value::is_truthy)
    }
}

impl Default for Condition {
    fn default() -> Self {
        Self::never()
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condition")
            .field("source", &self.source)
            .field("valid", &self.compiled.is_ok())
            .finish()
    }
}

fn eval(expr: &Expr, vars: &Variables) -> Result<Value, EvaluationError> {
    Ok(match expr {
        Expr::Number(n) => Value::Number(*n),
        Expr::Bool(b) => Value::Bool(*b),
        Expr::Var(name) => vars
            .get(name)
            .ok_or_else(|| EvaluationError::UnknownVariable(name.clone()))?,
        Expr::Neg(inner) => Value::Number(-eval(inner, vars)?.number("-")?),
        Expr::Not(inner) => Value::Bool(!eval(inner, vars)?.is_truthy()),
        Expr::Arith(lhs, op, rhs) => {
            let a = eval(lhs, vars)?.number(arith_symbol(*op))?;
            let b = eval(rhs, vars)?.number(arith_symbol(*op))?;
            Value::Number(arith(a, *op, b)?)
        }
        Expr::Compare(first, chain) => {
            let mut lhs = eval(first, vars)?;
            for (op, next) in chain {
                let rhs = eval(next, vars)?;
                if !compare(lhs, *op, rhs)? {
                    return Ok(Value::Bool(false));
                }
                lhs = rhs;
            }
            Value::Bool(true)
        }
        // both short-circuit
        Expr::And(lhs, rhs) => {
            Value::Bool(eval(lhs, vars)?.is_truthy() && eval(rhs, vars)?.is_truthy())
        }
        Expr::Or(lhs, rhs) => {
            Value::Bool(eval(lhs, vars)?.is_truthy() || eval(rhs, vars)?.is_truthy())
        }
    })
}

fn arith(a: f64, op: ArithOp, b: f64) -> Result<f64, EvaluationError> {
    match op {
        ArithOp::Add => Ok(a + b),
        ArithOp::Sub => Ok(a - b),
        ArithOp::Mul => Ok(a * b),
        ArithOp::Div | ArithOp::Rem if b == 0.0 => Err(EvaluationError::DivisionByZero),
        ArithOp::Div => Ok(a / b),
        ArithOp::Rem => Ok(a % b),
    }
}

fn arith_symbol(op: ArithOp) -> &'static str {
    match op {
        ArithOp::Add => "+",
        ArithOp::Sub => "-",
        ArithOp::Mul => "*",
        ArithOp::Div => "/",
        ArithOp::Rem => "%",
    }
}

fn compare(lhs: Value, op: CmpOp, rhs: Value) -> Result<bool, EvaluationError> {
    match op {
        CmpOp::Eq => Ok(lhs == rhs),
        CmpOp::NotEq => Ok(lhs != rhs),
        CmpOp::Lt | CmpOp::LtEq | CmpOp::Gt | CmpOp::GtEq => {
            let symbol = match op {
                CmpOp::Lt => "<",
                CmpOp::LtEq => "<=",
                CmpOp::Gt => ">",
                _ => ">=",
            };
            let a = lhs.number(symbol)?;
            let b = rhs.number(symbol)?;
            Ok(match op {
                CmpOp::Lt => a < b,
                CmpOp::LtEq => a <= b,
                CmpOp::Gt => a > b,
                _ => a >= b,
            })
        }
    }
}
