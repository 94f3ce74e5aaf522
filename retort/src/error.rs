//! Failure types for resolution and conversion.
//!
//! Two failure classes exist. [`CannotProvide`] is soft: it means "this
//! rule declines, try the next one" and only surfaces to the caller when a
//! whole search is exhausted. [`ResolveError`] is hard: a configuration or
//! programming error that aborts resolution immediately and is never
//! retried. [`ConvertError`] is raised later, while a resolved converter is
//! applied to actual data, and carries a structural trail for diagnostics.

use std::fmt;

use thiserror::Error;

use crate::request::TypeKey;

/// Soft refusal raised when a provider cannot satisfy a request.
///
/// May aggregate the refusals of several candidates so diagnostics can
/// show every rule that was tried and why each declined.
#[derive(Clone, Debug, Default)]
pub struct CannotProvide {
    message: String,
    causes: Vec<CannotProvide>,
}

impl CannotProvide {
    /// A refusal with a human-readable reason.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            causes: Vec::new(),
        }
    }

    /// A refusal carrying no message of its own.
    #[must_use]
    pub fn silent() -> Self {
        Self::default()
    }

    /// A refusal aggregating the refusals of every tried candidate.
    #[must_use]
    pub fn aggregate(message: impl Into<String>, causes: Vec<CannotProvide>) -> Self {
        Self {
            message: message.into(),
            causes,
        }
    }

    /// The refusal's own message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Child refusals, one per candidate that declined.
    #[must_use]
    pub fn causes(&self) -> &[CannotProvide] {
        &self.causes
    }

    fn render(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        if self.message.is_empty() {
            f.write_str("cannot provide")?;
        } else {
            f.write_str(&self.message)?;
        }
        for cause in &self.causes {
            writeln!(f)?;
            for _ in 0..=depth {
                f.write_str("  ")?;
            }
            f.write_str("- ")?;
            cause.render(f, depth.saturating_add(1))?;
        }
        Ok(())
    }
}

impl fmt::Display for CannotProvide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, 0)
    }
}

impl std::error::Error for CannotProvide {}

/// Hard failures: configuration or programming errors that abort
/// resolution instead of deferring to later rules.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ResolveError {
    /// No provider in the recipe satisfied the request.
    #[error("cannot produce {request}: every provider declined")]
    Unsatisfied {
        /// Rendered description of the unsatisfied request.
        request: String,
        /// Aggregated refusals of every tried provider.
        #[source]
        cause: CannotProvide,
    },

    /// An overlay still holds omitted fields after every layer was merged.
    #[error("overlay `{overlay}` for `{type_key}` leaves fields unset: {fields:?}")]
    IncompleteOverlay {
        /// The overlay family.
        overlay: String,
        /// The type the overlay was resolved for.
        type_key: String,
        /// Names of the fields left omitted.
        fields: Vec<String>,
    },

    /// Resolution recursed past the configured depth limit.
    #[error("resolution exceeded the depth limit of {limit} while handling {request}")]
    DepthExceeded {
        /// The configured limit.
        limit: usize,
        /// The request being handled when the limit was hit.
        request: String,
    },

    /// A continuation was requested outside an active provider search.
    #[error("provide_from_next called outside an active provider search")]
    NoActiveSearch,

    /// A provider answered a request with the wrong capability kind.
    #[error("provider produced a {actual} result for a {expected} request")]
    KindMismatch {
        /// The kind the request asked for.
        expected: &'static str,
        /// The kind the provider produced.
        actual: &'static str,
    },

    /// A resolved schema could not be deserialised into its typed form.
    #[error("failed to extract schema `{overlay}`: {source}")]
    SchemaExtraction {
        /// The overlay family the schema belongs to.
        overlay: String,
        /// The underlying deserialisation failure.
        #[source]
        source: serde_json::Error,
    },
}

/// Outcome error of a single provider attempt.
///
/// Combinators and the mediator catch [`ProvideError::Cannot`] and move on
/// to the next candidate; [`ProvideError::Fatal`] propagates unconditionally.
#[derive(Debug, Error)]
pub enum ProvideError {
    /// Soft refusal: try the next candidate.
    #[error(transparent)]
    Cannot(#[from] CannotProvide),
    /// Hard failure: abort the search.
    #[error(transparent)]
    Fatal(#[from] ResolveError),
}

/// One step of the structural path at which a conversion failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrailElement {
    /// The type being converted.
    Type(TypeKey),
    /// A named field of a mapping.
    Field(String),
    /// An index into a sequence.
    Index(usize),
}

impl fmt::Display for TrailElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type(key) => write!(f, "<{key}>"),
            Self::Field(name) => write!(f, ".{name}"),
            Self::Index(index) => write!(f, "[{index}]"),
        }
    }
}

/// Error raised while a resolved converter is applied to actual data.
///
/// The trail records where in the structure the failure happened,
/// innermost element first. [`ConvertError::with_element`] lets enclosing
/// converters annotate the path without altering the original message.
#[derive(Clone, Debug)]
pub struct ConvertError {
    message: String,
    trail: Vec<TrailElement>,
}

impl ConvertError {
    /// A conversion failure with an empty trail.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            trail: Vec::new(),
        }
    }

    /// Annotate the failure with an enclosing path element.
    #[must_use]
    pub fn with_element(mut self, element: TrailElement) -> Self {
        self.trail.push(element);
        self
    }

    /// The failure message, without the trail.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The structural trail, innermost element first.
    #[must_use]
    pub fn trail(&self) -> &[TrailElement] {
        &self.trail
    }
}

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if !self.trail.is_empty() {
            f.write_str(" (at ")?;
            // outermost-first reads as a path
            for element in self.trail.iter().rev() {
                write!(f, "{element}")?;
            }
            f.write_str(")")?;
        }
        Ok(())
    }
}

impl std::error::Error for ConvertError {}

/// Top-level error for the one-shot `load`/`dump` conveniences.
#[derive(Debug, Error)]
pub enum RetortError {
    /// Resolving a converter failed.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    /// Applying a resolved converter to data failed.
    #[error(transparent)]
    Convert(#[from] ConvertError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_preserves_every_cause() {
        let err = CannotProvide::aggregate(
            "no provider could handle loader for `Book`",
            vec![
                CannotProvide::new("not an integer type"),
                CannotProvide::new("no shape registered"),
            ],
        );
        assert_eq!(err.causes().len(), 2);
        let rendered = err.to_string();
        assert!(rendered.contains("not an integer type"));
        assert!(rendered.contains("no shape registered"));
    }

    #[test]
    fn convert_error_renders_trail_outermost_first() {
        let err = ConvertError::new("invalid timestamp")
            .with_element(TrailElement::Field("created_at".into()))
            .with_element(TrailElement::Index(0))
            .with_element(TrailElement::Type(TypeKey::new("Bookshop")));
        assert_eq!(
            err.to_string(),
            "invalid timestamp (at <Bookshop>[0].created_at)",
        );
    }
}
