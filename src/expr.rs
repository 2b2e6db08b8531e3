//! Length expressions and their resolution against sibling and ancestor
//! field values.
//!
//! A `len:` clause is a literal, a reference to an already-processed sibling
//! field, or integer arithmetic over those. References search the current
//! struct level first, then each enclosing level nearest-first. Forward
//! references within a level are rejected, never silently miscomputed.

use crate::shape::Shape;
use crate::value::Record;

/// Parsed form of a `len:` clause.
#[derive(Debug, Clone, PartialEq)]
pub enum LenExpr {
    Lit(u64),
    Ref(String),
    Binary {
        op: ArithOp,
        lhs: Box<LenExpr>,
        rhs: Box<LenExpr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("length reference {0:?} not found at any level")]
    Unresolved(String),
    #[error("length reference {0:?} names a field that is not processed yet (forward references are unsupported)")]
    Forward(String),
    #[error("length reference {0:?} has no value (seed it before the call)")]
    Unset(String),
    #[error("length reference {0:?} is not an integer field")]
    NotInteger(String),
    #[error("length expression evaluated to {0}, expected a non-negative count")]
    Negative(i64),
    #[error("length expression divides by zero")]
    DivideByZero,
}

/// One struct level visible to the resolver: its shape, its field values, and
/// how many fields (in declaration order) have been processed so far.
#[derive(Clone, Copy)]
pub struct Level<'a> {
    pub shape: &'a Shape,
    pub values: &'a Record,
    pub upto: usize,
}

impl<'a> Level<'a> {
    /// A level walked up to (excluding) field index `upto`.
    pub fn partial(shape: &'a Shape, values: &'a Record, upto: usize) -> Self {
        Level { shape, values, upto }
    }

    /// A level with every field considered processed. Used by the dry-run
    /// size pass, where a prefix field's size may hinge on count fields the
    /// walk has not reached yet.
    pub fn full(shape: &'a Shape, values: &'a Record) -> Self {
        Level {
            shape,
            values,
            upto: shape.fields().len(),
        }
    }

    fn lookup(&self, name: &str) -> Option<Result<i64, ResolveError>> {
        let pos = self.shape.fields().iter().position(|f| f.name == name)?;
        if pos >= self.upto {
            return Some(Err(ResolveError::Forward(name.to_string())));
        }
        Some(match self.values.get(name) {
            None => Err(ResolveError::Unset(name.to_string())),
            Some(v) if !v.is_integer() => Err(ResolveError::NotInteger(name.to_string())),
            Some(v) => v
                .as_i64()
                .ok_or_else(|| ResolveError::NotInteger(name.to_string())),
        })
    }
}

impl LenExpr {
    /// Resolve to a concrete count. `current` is searched first, then the
    /// ancestors nearest-enclosing first (`ancestors` is ordered outermost
    /// first, as pushed by the walker).
    pub fn resolve(
        &self,
        current: &Level<'_>,
        ancestors: &[Level<'_>],
    ) -> Result<u64, ResolveError> {
        let v = self.eval(current, ancestors)?;
        if v < 0 {
            return Err(ResolveError::Negative(v));
        }
        Ok(v as u64)
    }

    fn eval(&self, current: &Level<'_>, ancestors: &[Level<'_>]) -> Result<i64, ResolveError> {
        match self {
            LenExpr::Lit(n) => Ok(*n as i64),
            LenExpr::Ref(name) => {
                if let Some(found) = current.lookup(name) {
                    return found;
                }
                for level in ancestors.iter().rev() {
                    if let Some(found) = level.lookup(name) {
                        return found;
                    }
                }
                Err(ResolveError::Unresolved(name.clone()))
            }
            LenExpr::Binary { op, lhs, rhs } => {
                let l = lhs.eval(current, ancestors)?;
                let r = rhs.eval(current, ancestors)?;
                let v = match op {
                    ArithOp::Add => l + r,
                    ArithOp::Sub => l - r,
                    ArithOp::Mul => l * r,
                    ArithOp::Div => {
                        if r == 0 {
                            return Err(ResolveError::DivideByZero);
                        }
                        l / r
                    }
                };
                // Negative intermediates are as much of an error as a
                // negative final count.
                if v < 0 {
                    return Err(ResolveError::Negative(v));
                }
                Ok(v)
            }
        }
    }
}
