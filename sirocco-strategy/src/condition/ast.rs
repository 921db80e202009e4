//! Condition AST and evaluation.

use std::collections::BTreeSet;

use thiserror::Error;

use sirocco_core::data::{EnrichedBar, Field};

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    /// Logical negation.
    Not,
    /// Numeric negation.
    Neg,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    /// `||`
    Or,
    /// `&&`
    And,
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
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Rem,
}

/// A value produced during evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// Numeric value.
    Num(f64),
    /// Boolean value.
    Bool(bool),
}

/// Evaluation fault.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalError {
    /// A referenced field has no value on this bar.
    ///
    /// The predicate wrapper turns this into a plain `false`; it is an error
    /// variant so it can short-circuit evaluation.
    #[error("field '{0}' is absent")]
    AbsentField(Field),

    /// Division or modulo by zero.
    #[error("division by zero")]
    DivisionByZero,

    /// Operator applied to an operand of the wrong type.
    #[error("type mismatch: expected {expected}")]
    TypeMismatch {
        /// What the operator required.
        expected: &'static str,
    },
}

/// Condition expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Numeric literal.
    Num(f64),
    /// Enriched-bar field reference.
    Var(Field),
    /// Unary operation.
    Unary {
        /// Operator.
        op: UnOp,
        /// Operand.
        operand: Box<Expr>,
    },
    /// Binary operation.
    Binary {
        /// Operator.
        op: BinOp,
        /// Left operand.
        lhs: Box<Expr>,
        /// Right operand.
        rhs: Box<Expr>,
    },
}

impl Expr {
    /// Evaluates the expression against an enriched bar.
    ///
    /// The bar is the only data evaluation can reach; there is no ambient
    /// scope.
    pub fn eval(&self, bar: &EnrichedBar) -> Result<Value, EvalError> {
        match self {
            Self::Num(n) => Ok(Value::Num(*n)),
            Self::Var(field) => bar
                .field(*field)
                .map(Value::Num)
                .ok_or(EvalError::AbsentField(*field)),
            Self::Unary { op, operand } => {
                let value = operand.eval(bar)?;
                match (op, value) {
                    (UnOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                    (UnOp::Neg, Value::Num(n)) => Ok(Value::Num(-n)),
                    (UnOp::Not, Value::Num(_)) => Err(EvalError::TypeMismatch {
                        expected: "boolean operand for '!'",
                    }),
                    (UnOp::Neg, Value::Bool(_)) => Err(EvalError::TypeMismatch {
                        expected: "numeric operand for '-'",
                    }),
                }
            }
            Self::Binary { op, lhs, rhs } => match op {
                BinOp::And => {
                    if lhs.eval(bar)?.as_bool()? {
                        Ok(Value::Bool(rhs.eval(bar)?.as_bool()?))
                    } else {
                        Ok(Value::Bool(false))
                    }
                }
                BinOp::Or => {
                    if lhs.eval(bar)?.as_bool()? {
                        Ok(Value::Bool(true))
                    } else {
                        Ok(Value::Bool(rhs.eval(bar)?.as_bool()?))
                    }
                }
                BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge | BinOp::Eq | BinOp::Ne => {
                    let l = lhs.eval(bar)?.as_num()?;
                    let r = rhs.eval(bar)?.as_num()?;
                    let held = match op {
                        BinOp::Lt => l < r,
                        BinOp::Le => l <= r,
                        BinOp::Gt => l > r,
                        BinOp::Ge => l >= r,
                        BinOp::Eq => l == r,
                        BinOp::Ne => l != r,
                        _ => unreachable!(),
                    };
                    Ok(Value::Bool(held))
                }
                BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Rem => {
                    let l = lhs.eval(bar)?.as_num()?;
                    let r = rhs.eval(bar)?.as_num()?;
                    let value = match op {
                        BinOp::Add => l + r,
                        BinOp::Sub => l - r,
                        BinOp::Mul => l * r,
                        BinOp::Div => {
                            if r == 0.0 {
                                return Err(EvalError::DivisionByZero);
                            }
                            l / r
                        }
                        BinOp::Rem => {
                            if r == 0.0 {
                                return Err(EvalError::DivisionByZero);
                            }
                            l % r
                        }
                        _ => unreachable!(),
                    };
                    Ok(Value::Num(value))
                }
            },
        }
    }

    /// Collects every field the expression references.
    pub fn collect_fields(&self, out: &mut BTreeSet<Field>) {
        match self {
            Self::Num(_) => {}
            Self::Var(field) => {
                out.insert(*field);
            }
            Self::Unary { operand, .. } => operand.collect_fields(out),
            Self::Binary { lhs, rhs, .. } => {
                lhs.collect_fields(out);
                rhs.collect_fields(out);
            }
        }
    }

    /// Returns the number of terms on the top-level `&&` spine.
    #[must_use]
    pub fn conjunctive_terms(&self) -> usize {
        match self {
            Self::Binary {
                op: BinOp::And,
                lhs,
                rhs,
            } => lhs.conjunctive_terms() + rhs.conjunctive_terms(),
            _ => 1,
        }
    }
}

impl Value {
    fn as_bool(self) -> Result<bool, EvalError> {
        match self {
            Self::Bool(b) => Ok(b),
            Self::Num(_) => Err(EvalError::TypeMismatch {
                expected: "boolean operand",
            }),
        }
    }

    fn as_num(self) -> Result<f64, EvalError> {
        match self {
            Self::Num(n) => Ok(n),
            Self::Bool(_) => Err(EvalError::TypeMismatch {
                expected: "numeric operand",
            }),
        }
    }
}
