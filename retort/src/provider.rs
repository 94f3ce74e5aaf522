//! The provider protocol: pluggable units that attempt to satisfy requests.
//!
//! A [`Provider`] either produces a [`Resolved`] payload for a [`Request`]
//! or declines with [`CannotProvide`]. Converters travel as boxed closures
//! over [`serde_json::Value`]: callers supply and consume plain structured
//! data (mappings, sequences, scalars) and leaf rules decide what the
//! concrete shapes mean.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{CannotProvide, ConvertError, ProvideError, ResolveError};
use crate::mediator::Mediator;
use crate::overlay::OverlayValue;
use crate::request::{ConfigKey, Request, RequestClass, RequestKind, TypeKey};
use crate::retort::DebugTrail;

/// A resolved loader: loose data in, concrete value out.
pub type Loader = Arc<dyn Fn(Value) -> Result<Value, ConvertError> + Send + Sync>;

/// A resolved dumper: concrete value in, loose data out.
pub type Dumper = Arc<dyn Fn(Value) -> Result<Value, ConvertError> + Send + Sync>;

/// Shared handle to a recipe entry.
pub type DynProvider = Arc<dyn Provider>;

/// Configuration values carried through the recipe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigValue {
    /// Value for [`ConfigKey::StrictCoercion`].
    StrictCoercion(bool),
    /// Value for [`ConfigKey::DebugTrail`].
    DebugTrail(DebugTrail),
}

/// Payload produced by a successful provider attempt.
#[derive(Clone)]
pub enum Resolved {
    /// A loader converter.
    Loader(Loader),
    /// A dumper converter.
    Dumper(Dumper),
    /// One overlay layer.
    Overlay(OverlayValue),
    /// A configuration value.
    Config(ConfigValue),
}

impl Resolved {
    /// Name of the payload kind, for diagnostics.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Loader(_) => "loader",
            Self::Dumper(_) => "dumper",
            Self::Overlay(_) => "overlay",
            Self::Config(_) => "config",
        }
    }

    /// Extract the loader payload.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::KindMismatch`] when the payload is not a
    /// loader.
    pub fn into_loader(self) -> Result<Loader, ResolveError> {
        match self {
            Self::Loader(loader) => Ok(loader),
            other => Err(ResolveError::KindMismatch {
                expected: "loader",
                actual: other.kind_name(),
            }),
        }
    }

    /// Extract the dumper payload.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::KindMismatch`] when the payload is not a
    /// dumper.
    pub fn into_dumper(self) -> Result<Dumper, ResolveError> {
        match self {
            Self::Dumper(dumper) => Ok(dumper),
            other => Err(ResolveError::KindMismatch {
                expected: "dumper",
                actual: other.kind_name(),
            }),
        }
    }

    /// Extract the overlay payload.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::KindMismatch`] when the payload is not an
    /// overlay.
    pub fn into_overlay(self) -> Result<OverlayValue, ResolveError> {
        match self {
            Self::Overlay(overlay) => Ok(overlay),
            other => Err(ResolveError::KindMismatch {
                expected: "overlay",
                actual: other.kind_name(),
            }),
        }
    }

    /// Extract the configuration payload.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::KindMismatch`] when the payload is not a
    /// configuration value.
    pub fn into_config(self) -> Result<ConfigValue, ResolveError> {
        match self {
            Self::Config(value) => Ok(value),
            other => Err(ResolveError::KindMismatch {
                expected: "config",
                actual: other.kind_name(),
            }),
        }
    }
}

impl fmt::Debug for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loader(_) => f.write_str("Resolved::Loader(..)"),
            Self::Dumper(_) => f.write_str("Resolved::Dumper(..)"),
            Self::Overlay(overlay) => f.debug_tuple("Resolved::Overlay").field(overlay).finish(),
            Self::Config(value) => f.debug_tuple("Resolved::Config").field(value).finish(),
        }
    }
}

/// A unit that attempts to satisfy a [`Request`] or declares it cannot.
///
/// Providers may recurse through the [`Mediator`] to resolve sub-requests
/// (a field's loader, a configuration value) and may resume the enclosing
/// search after their own position via [`Mediator::provide_from_next`].
pub trait Provider: fmt::Debug + Send + Sync {
    /// Attempt to satisfy `request`.
    ///
    /// # Errors
    ///
    /// Returns [`ProvideError::Cannot`] to decline, deferring to the next
    /// candidate; [`ProvideError::Fatal`] aborts the whole resolution.
    fn attempt(&self, mediator: &Mediator<'_>, request: &Request)
    -> Result<Resolved, ProvideError>;

    /// Cheaply declare whether this provider could possibly handle
    /// requests of `class`, without evaluating anything.
    ///
    /// The default accepts every class; combinators and the mediator use
    /// this to skip irrelevant entries without invoking them.
    fn maybe_can_handle(&self, class: RequestClass) -> bool {
        let _ = class;
        true
    }
}

fn check_type_scope(bound_to: Option<&TypeKey>, request: &Request) -> Result<(), CannotProvide> {
    let Some(expected) = bound_to else {
        return Ok(());
    };
    let found = request
        .loc_map()
        .type_loc()
        .is_some_and(|loc| loc.type_key() == expected);
    if found {
        Ok(())
    } else {
        Err(CannotProvide::new(format!(
            "only handles type `{expected}`"
        )))
    }
}

/// Leaf provider answering loader requests with a fixed converter,
/// optionally bound to an exact type.
#[derive(Clone)]
pub struct LoaderProvider {
    bound_to: Option<TypeKey>,
    loader: Loader,
}

impl LoaderProvider {
    /// A loader provider answering any loader request.
    #[must_use]
    pub fn new(
        loader: impl Fn(Value) -> Result<Value, ConvertError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            bound_to: None,
            loader: Arc::new(loader),
        }
    }

    /// A loader provider scoped to requests located at `type_key`.
    #[must_use]
    pub fn for_type(
        type_key: TypeKey,
        loader: impl Fn(Value) -> Result<Value, ConvertError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            bound_to: Some(type_key),
            loader: Arc::new(loader),
        }
    }

    /// A loader for `type_key` that passes data through unchanged.
    #[must_use]
    pub fn as_is(type_key: TypeKey) -> Self {
        Self::for_type(type_key, Ok)
    }
}

impl Provider for LoaderProvider {
    fn attempt(
        &self,
        _mediator: &Mediator<'_>,
        request: &Request,
    ) -> Result<Resolved, ProvideError> {
        if !matches!(request.kind(), RequestKind::Loader) {
            return Err(CannotProvide::new("only provides loaders").into());
        }
        check_type_scope(self.bound_to.as_ref(), request)?;
        Ok(Resolved::Loader(Arc::clone(&self.loader)))
    }

    fn maybe_can_handle(&self, class: RequestClass) -> bool {
        class == RequestClass::Loader
    }
}

impl fmt::Debug for LoaderProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoaderProvider")
            .field("bound_to", &self.bound_to)
            .finish_non_exhaustive()
    }
}

/// Leaf provider answering dumper requests with a fixed converter,
/// optionally bound to an exact type.
#[derive(Clone)]
pub struct DumperProvider {
    bound_to: Option<TypeKey>,
    dumper: Dumper,
}

impl DumperProvider {
    /// A dumper provider answering any dumper request.
    #[must_use]
    pub fn new(
        dumper: impl Fn(Value) -> Result<Value, ConvertError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            bound_to: None,
            dumper: Arc::new(dumper),
        }
    }

    /// A dumper provider scoped to requests located at `type_key`.
    #[must_use]
    pub fn for_type(
        type_key: TypeKey,
        dumper: impl Fn(Value) -> Result<Value, ConvertError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            bound_to: Some(type_key),
            dumper: Arc::new(dumper),
        }
    }

    /// A dumper for `type_key` that passes the value through unchanged.
    #[must_use]
    pub fn as_is(type_key: TypeKey) -> Self {
        Self::for_type(type_key, Ok)
    }
}

impl Provider for DumperProvider {
    fn attempt(
        &self,
        _mediator: &Mediator<'_>,
        request: &Request,
    ) -> Result<Resolved, ProvideError> {
        if !matches!(request.kind(), RequestKind::Dumper) {
            return Err(CannotProvide::new("only provides dumpers").into());
        }
        check_type_scope(self.bound_to.as_ref(), request)?;
        Ok(Resolved::Dumper(Arc::clone(&self.dumper)))
    }

    fn maybe_can_handle(&self, class: RequestClass) -> bool {
        class == RequestClass::Dumper
    }
}

impl fmt::Debug for DumperProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DumperProvider")
            .field("bound_to", &self.bound_to)
            .finish_non_exhaustive()
    }
}

/// Provider answering a single configuration key with a fixed value.
#[derive(Clone, Debug)]
pub struct ConfigProvider {
    key: ConfigKey,
    value: ConfigValue,
}

impl ConfigProvider {
    /// A provider answering `key` with `value`.
    #[must_use]
    pub const fn new(key: ConfigKey, value: ConfigValue) -> Self {
        Self { key, value }
    }
}

impl Provider for ConfigProvider {
    fn attempt(
        &self,
        _mediator: &Mediator<'_>,
        request: &Request,
    ) -> Result<Resolved, ProvideError> {
        match request.kind() {
            RequestKind::Config(key) if *key == self.key => Ok(Resolved::Config(self.value)),
            RequestKind::Config(key) => Err(CannotProvide::new(format!(
                "holds `{}`, not `{key}`",
                self.key
            ))
            .into()),
            _ => Err(CannotProvide::new("only provides config values").into()),
        }
    }

    fn maybe_can_handle(&self, class: RequestClass) -> bool {
        class == RequestClass::Config
    }
}
