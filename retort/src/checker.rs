//! Request predicates used to scope providers to locations.
//!
//! A checker is a pure guard: it inspects a [`Request`] and either accepts
//! it or declines with [`CannotProvide`], without evaluating anything.
//! [`crate::combinator::BoundingProvider`] consults a checker before
//! delegating to its inner provider.

use std::fmt;
use std::sync::Arc;

use crate::error::CannotProvide;
use crate::request::{Request, TypeKey};

/// Predicate deciding whether a request is in scope for a rule.
pub trait RequestChecker: fmt::Debug + Send + Sync {
    /// Accept the request or decline it.
    ///
    /// # Errors
    ///
    /// Returns [`CannotProvide`] when the request is out of scope.
    fn check(&self, request: &Request) -> Result<(), CannotProvide>;
}

/// Shared handle to a checker.
pub type DynChecker = Arc<dyn RequestChecker>;

/// Accepts every request.
#[derive(Clone, Copy, Debug, Default)]
pub struct AnyChecker;

impl RequestChecker for AnyChecker {
    fn check(&self, _request: &Request) -> Result<(), CannotProvide> {
        Ok(())
    }
}

/// Accepts requests located at an exact type.
#[derive(Clone, Debug)]
pub struct TypeChecker {
    type_key: TypeKey,
}

impl TypeChecker {
    /// A checker accepting requests located at `type_key`.
    #[must_use]
    pub const fn new(type_key: TypeKey) -> Self {
        Self { type_key }
    }
}

impl RequestChecker for TypeChecker {
    fn check(&self, request: &Request) -> Result<(), CannotProvide> {
        let matched = request
            .loc_map()
            .type_loc()
            .is_some_and(|loc| loc.type_key() == &self.type_key);
        if matched {
            Ok(())
        } else {
            Err(CannotProvide::new(format!(
                "location is not type `{}`",
                self.type_key
            )))
        }
    }
}

/// Accepts requests for a named field, optionally scoped to its owner.
#[derive(Clone, Debug)]
pub struct FieldChecker {
    owner: Option<TypeKey>,
    field_name: String,
}

impl FieldChecker {
    /// A checker accepting any field named `field_name`.
    #[must_use]
    pub fn named(field_name: impl Into<String>) -> Self {
        Self {
            owner: None,
            field_name: field_name.into(),
        }
    }

    /// A checker accepting field `field_name` of `owner` only.
    #[must_use]
    pub fn of_type(owner: TypeKey, field_name: impl Into<String>) -> Self {
        Self {
            owner: Some(owner),
            field_name: field_name.into(),
        }
    }
}

impl RequestChecker for FieldChecker {
    fn check(&self, request: &Request) -> Result<(), CannotProvide> {
        let Some(field) = request.loc_map().field_loc() else {
            return Err(CannotProvide::new("location is not a field"));
        };
        if field.field_name() != self.field_name {
            return Err(CannotProvide::new(format!(
                "field is not named `{}`",
                self.field_name
            )));
        }
        match &self.owner {
            Some(owner) if field.owner() != owner => Err(CannotProvide::new(format!(
                "field does not belong to `{owner}`"
            ))),
            _ => Ok(()),
        }
    }
}
