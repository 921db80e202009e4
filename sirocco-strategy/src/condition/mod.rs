//! Condition compilation and evaluation.
//!
//! A condition is a boolean expression over enriched-bar fields, compiled
//! once per signal when a spec is loaded. Compilation is the sandbox: the
//! lexer enforces a character whitelist and an identifier deny-list, and the
//! parser resolves every identifier to the closed [`Field`] enum, so a
//! compiled predicate structurally cannot reference anything outside the
//! enriched bar.
//!
//! [`Field`]: sirocco_core::data::Field

mod ast;
mod lexer;
mod parser;

pub use ast::{BinOp, EvalError, Expr, UnOp, Value};

use std::collections::BTreeSet;

use sirocco_core::data::{EnrichedBar, Field};
use sirocco_core::error::ConditionError;

/// A compiled, sandboxed condition predicate.
///
/// # Examples
///
/// ```
/// use sirocco_strategy::condition::CompiledCondition;
///
/// let condition = CompiledCondition::compile("rsi < 30 && close > sma_20").unwrap();
/// assert_eq!(condition.source(), "rsi < 30 && close > sma_20");
/// ```
#[derive(Debug, Clone)]
pub struct CompiledCondition {
    source: String,
    ast: Expr,
}

impl CompiledCondition {
    /// Compiles a condition expression.
    ///
    /// # Errors
    ///
    /// Returns `ConditionError` when the expression contains forbidden
    /// characters or tokens, references an identifier outside the enriched
    /// bar, or fails to parse.
    pub fn compile(source: &str) -> Result<Self, ConditionError> {
        let tokens = lexer::tokenize(source)?;
        let ast = parser::parse(&tokens, source.len())?;
        Ok(Self {
            source: source.to_string(),
            ast,
        })
    }

    /// Evaluates the predicate against an enriched bar.
    ///
    /// An absent field makes the predicate `false` without raising. Runtime
    /// faults (division by zero, a numeric expression where a boolean is
    /// required) are surfaced so the caller can count them toward signal
    /// disablement.
    ///
    /// # Errors
    ///
    /// Returns `EvalError` on runtime faults other than absent fields.
    pub fn evaluate(&self, bar: &EnrichedBar) -> Result<bool, EvalError> {
        match self.ast.eval(bar) {
            Ok(Value::Bool(b)) => Ok(b),
            Ok(Value::Num(_)) => Err(EvalError::TypeMismatch {
                expected: "boolean condition",
            }),
            Err(EvalError::AbsentField(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Returns the original expression string.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the distinct fields the expression references.
    #[must_use]
    pub fn fields(&self) -> BTreeSet<Field> {
        let mut fields = BTreeSet::new();
        self.ast.collect_fields(&mut fields);
        fields
    }

    /// Returns the number of top-level conjunctive terms.
    ///
    /// `a && b && c` has three; any non-conjunction expression has one.
    #[must_use]
    pub fn conjunctive_terms(&self) -> usize {
        self.ast.conjunctive_terms()
    }
}
