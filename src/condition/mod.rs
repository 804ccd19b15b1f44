//! Boolean conditions over a single entity's fields.
//!
//! Conditions are either built with the combinators on [`Condition`] or parsed
//! from the textual form used in scenario scripts:
//!
//! ```
//! use airharness::{
//!     condition::Condition,
//!     entity::{EntityKind, Snapshot},
//!     state::ConnectionState,
//! };
//!
//! let parsed: Condition = "obj.state == DeviceState.connected and not obj.scanning"
//!     .parse()
//!     .expect("valid condition");
//! let built =
//!     Condition::state_is(ConnectionState::Connected).and(Condition::truthy("scanning").not());
//! assert_eq!(parsed, built);
//!
//! let device = Snapshot::new("/dev/0", EntityKind::Device)
//!     .with("state", ConnectionState::Connected)
//!     .with("scanning", false);
//! assert!(parsed.evaluate(&device).expect("known fields"));
//! ```
//!
//! Evaluation is pure: it never blocks and never mutates the snapshot.

mod error;
mod parser;

use std::{fmt, str::FromStr};

pub use error::ConditionError;

use crate::{
    entity::{Snapshot, Value},
    state::ConnectionState,
};

/// Operand of a comparison.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operand {
    /// A field of the observed entity.
    Field(String),
    /// A constant.
    Literal(Value),
}

impl Operand {
    fn resolve<'a>(&'a self, snapshot: &'a Snapshot) -> Result<&'a Value, ConditionError> {
        match self {
            Operand::Literal(value) => Ok(value),
            Operand::Field(name) => lookup(snapshot, name),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Field(name) => write!(f, "obj.{name}"),
            Operand::Literal(value) => write!(f, "{value}"),
        }
    }
}

/// Expression evaluated against an entity snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Condition {
    /// Constant outcome.
    Const(bool),
    /// Truthiness of a single operand.
    Truthy(Operand),
    /// Operands compare equal.
    Eq(Operand, Operand),
    /// Operands compare unequal.
    Ne(Operand, Operand),
    /// Negation.
    Not(Box<Condition>),
    /// Both hold.
    And(Box<Condition>, Box<Condition>),
    /// Either holds.
    Or(Box<Condition>, Box<Condition>),
}

/// Partially built comparison returned by [`Condition::field`].
#[derive(Clone, Debug)]
pub struct FieldRef(String);

impl FieldRef {
    /// The field equals `value`.
    #[must_use]
    pub fn eq(self, value: impl Into<Value>) -> Condition {
        Condition::Eq(Operand::Field(self.0), Operand::Literal(value.into()))
    }

    /// The field differs from `value`.
    #[must_use]
    pub fn ne(self, value: impl Into<Value>) -> Condition {
        Condition::Ne(Operand::Field(self.0), Operand::Literal(value.into()))
    }
}

impl Condition {
    /// Start a comparison against `name`.
    #[must_use]
    pub fn field(name: impl Into<String>) -> FieldRef { FieldRef(name.into()) }

    /// The field `name` is truthy.
    #[must_use]
    pub fn truthy(name: impl Into<String>) -> Self {
        Condition::Truthy(Operand::Field(name.into()))
    }

    /// The field `name` is not `None`.
    #[must_use]
    pub fn is_some(name: impl Into<String>) -> Self { Condition::field(name).ne(Value::Null) }

    /// The field `name` is `None`.
    #[must_use]
    pub fn is_none(name: impl Into<String>) -> Self { Condition::field(name).eq(Value::Null) }

    /// The entity's `state` field equals `state`.
    #[must_use]
    pub fn state_is(state: ConnectionState) -> Self { Condition::field("state").eq(state) }

    /// Logical negation.
    #[must_use]
    #[expect(
        clippy::should_implement_trait,
        reason = "combinator reads naturally next to and/or"
    )]
    pub fn not(self) -> Self { Condition::Not(Box::new(self)) }

    /// Logical conjunction.
    #[must_use]
    pub fn and(self, other: Condition) -> Self { Condition::And(Box::new(self), Box::new(other)) }

    /// Logical disjunction.
    #[must_use]
    pub fn or(self, other: Condition) -> Self { Condition::Or(Box::new(self), Box::new(other)) }

    /// Evaluate against `snapshot`.
    ///
    /// # Errors
    ///
    /// Returns [`ConditionError::UnknownField`] if the condition references a
    /// field the entity does not carry.
    pub fn evaluate(&self, snapshot: &Snapshot) -> Result<bool, ConditionError> {
        match self {
            Condition::Const(b) => Ok(*b),
            Condition::Truthy(op) => Ok(op.resolve(snapshot)?.is_truthy()),
            Condition::Eq(lhs, rhs) => {
                Ok(lhs.resolve(snapshot)?.loosely_eq(rhs.resolve(snapshot)?))
            }
            Condition::Ne(lhs, rhs) => {
                Ok(!lhs.resolve(snapshot)?.loosely_eq(rhs.resolve(snapshot)?))
            }
            Condition::Not(inner) => Ok(!inner.evaluate(snapshot)?),
            Condition::And(lhs, rhs) => Ok(lhs.evaluate(snapshot)? && rhs.evaluate(snapshot)?),
            Condition::Or(lhs, rhs) => Ok(lhs.evaluate(snapshot)? || rhs.evaluate(snapshot)?),
        }
    }
}

/// Evaluate `condition` against `snapshot`.
///
/// # Errors
///
/// See [`Condition::evaluate`].
pub fn evaluate(snapshot: &Snapshot, condition: &Condition) -> Result<bool, ConditionError> {
    condition.evaluate(snapshot)
}

fn lookup<'a>(snapshot: &'a Snapshot, field: &str) -> Result<&'a Value, ConditionError> {
    snapshot
        .get(field)
        .ok_or_else(|| ConditionError::UnknownField {
            entity: snapshot.id().clone(),
            kind: snapshot.kind(),
            field: field.to_owned(),
        })
}

impl FromStr for Condition {
    type Err = ConditionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> { parser::parse(s) }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Const(true) => f.write_str("True"),
            Condition::Const(false) => f.write_str("False"),
            Condition::Truthy(op) => write!(f, "{op}"),
            Condition::Eq(lhs, Operand::Literal(Value::Null)) => write!(f, "{lhs} is None"),
            Condition::Ne(lhs, Operand::Literal(Value::Null)) => write!(f, "{lhs} is not None"),
            Condition::Eq(lhs, rhs) => write!(f, "{lhs} == {rhs}"),
            Condition::Ne(lhs, rhs) => write!(f, "{lhs} != {rhs}"),
            Condition::Not(inner) => write!(f, "not ({inner})"),
            Condition::And(lhs, rhs) => write!(f, "({lhs}) and ({rhs})"),
            Condition::Or(lhs, rhs) => write!(f, "({lhs}) or ({rhs})"),
        }
    }
}

#[cfg(test)]
mod tests;
