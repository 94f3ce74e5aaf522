//! Request descriptors: what capability is being asked for, and where.
//!
//! A [`Request`] is an immutable search key handed to the recipe scan. Its
//! [`LocMap`] pins the request to a location in the structure being
//! converted: at minimum a type, optionally a field of an owning type.
//! Two requests with equal content are interchangeable search keys.

use std::fmt;
use std::sync::Arc;

use crate::overlay::OverlayKey;

/// Identity of a structured type known to the engine.
///
/// Type keys are supplied by the embedding application (usually via its
/// introspection layer) and are compared by name. Cloning is cheap.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey(Arc<str>);

impl TypeKey {
    /// Create a key for the type with the given name.
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    /// The type's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.0)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeKey {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Location descriptor naming a type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeLoc {
    type_key: TypeKey,
}

impl TypeLoc {
    /// Locate a request at `type_key`.
    #[must_use]
    pub fn new(type_key: TypeKey) -> Self {
        Self { type_key }
    }

    /// The located type.
    #[must_use]
    pub const fn type_key(&self) -> &TypeKey {
        &self.type_key
    }
}

/// Location descriptor naming a field of an owning type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldLoc {
    owner: TypeKey,
    field_name: Arc<str>,
}

impl FieldLoc {
    /// Locate a request at field `field_name` of `owner`.
    #[must_use]
    pub fn new(owner: TypeKey, field_name: impl Into<Arc<str>>) -> Self {
        Self {
            owner,
            field_name: field_name.into(),
        }
    }

    /// The type declaring the field.
    #[must_use]
    pub const fn owner(&self) -> &TypeKey {
        &self.owner
    }

    /// The field's name.
    #[must_use]
    pub fn field_name(&self) -> &str {
        &self.field_name
    }
}

/// Ordered, immutable map from location kind to descriptor.
///
/// The slots are fixed: a type location and an optional field location.
/// [`LocMap::with_type`] returns an updated copy, leaving the original
/// untouched; the ancestor walk relies on this to re-point a request at a
/// parent type while keeping the field context.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct LocMap {
    ty: Option<TypeLoc>,
    field: Option<FieldLoc>,
}

impl LocMap {
    /// A map holding only a type location.
    #[must_use]
    pub const fn for_type(loc: TypeLoc) -> Self {
        Self {
            ty: Some(loc),
            field: None,
        }
    }

    /// A map holding a type location and a field location.
    #[must_use]
    pub const fn for_field(ty: TypeLoc, field: FieldLoc) -> Self {
        Self {
            ty: Some(ty),
            field: Some(field),
        }
    }

    /// Copy of this map with the type slot replaced.
    #[must_use]
    pub fn with_type(&self, loc: TypeLoc) -> Self {
        Self {
            ty: Some(loc),
            field: self.field.clone(),
        }
    }

    /// The type location, when present.
    #[must_use]
    pub const fn type_loc(&self) -> Option<&TypeLoc> {
        self.ty.as_ref()
    }

    /// The field location, when present.
    #[must_use]
    pub const fn field_loc(&self) -> Option<&FieldLoc> {
        self.field.as_ref()
    }
}

impl fmt::Display for LocMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.ty, &self.field) {
            (Some(ty), Some(field)) => write!(
                f,
                "`{}` at field `{}` of `{}`",
                ty.type_key(),
                field.field_name(),
                field.owner(),
            ),
            (Some(ty), None) => write!(f, "`{}`", ty.type_key()),
            (None, Some(field)) => {
                write!(f, "field `{}` of `{}`", field.field_name(), field.owner())
            }
            (None, None) => f.write_str("<no location>"),
        }
    }
}

/// Scalar configuration values resolvable through the recipe.
///
/// Configuration is an explicit enumerated set, not ad hoc flags; rules
/// query it with a [`Request::config`] like any other capability.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    /// Whether leaf rules should refuse lossy coercions.
    StrictCoercion,
    /// How much structural context conversion errors should carry.
    DebugTrail,
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StrictCoercion => f.write_str("strict_coercion"),
            Self::DebugTrail => f.write_str("debug_trail"),
        }
    }
}

/// Coarse request classes providers can be filtered on cheaply, without a
/// full attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestClass {
    /// A loader is being resolved.
    Loader,
    /// A dumper is being resolved.
    Dumper,
    /// An overlay layer is being collected.
    Overlay,
    /// A configuration value is being read.
    Config,
}

/// The capability a request asks for.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// Produce a loader (loose data in, typed value out).
    Loader,
    /// Produce a dumper (typed value in, loose data out).
    Dumper,
    /// Produce the overlay layer of the named family.
    Overlay(OverlayKey),
    /// Produce the named configuration value.
    Config(ConfigKey),
}

impl RequestKind {
    /// The request class this kind belongs to.
    #[must_use]
    pub const fn class(&self) -> RequestClass {
        match self {
            Self::Loader => RequestClass::Loader,
            Self::Dumper => RequestClass::Dumper,
            Self::Overlay(_) => RequestClass::Overlay,
            Self::Config(_) => RequestClass::Config,
        }
    }
}

/// Immutable descriptor of a capability being sought at a location.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Request {
    kind: RequestKind,
    loc_map: LocMap,
}

impl Request {
    /// A loader request for `type_key`.
    #[must_use]
    pub fn loader(type_key: TypeKey) -> Self {
        Self {
            kind: RequestKind::Loader,
            loc_map: LocMap::for_type(TypeLoc::new(type_key)),
        }
    }

    /// A dumper request for `type_key`.
    #[must_use]
    pub fn dumper(type_key: TypeKey) -> Self {
        Self {
            kind: RequestKind::Dumper,
            loc_map: LocMap::for_type(TypeLoc::new(type_key)),
        }
    }

    /// An overlay request for family `key` at `loc_map`.
    #[must_use]
    pub const fn overlay(key: OverlayKey, loc_map: LocMap) -> Self {
        Self {
            kind: RequestKind::Overlay(key),
            loc_map,
        }
    }

    /// A configuration-value request.
    #[must_use]
    pub const fn config(key: ConfigKey) -> Self {
        Self {
            kind: RequestKind::Config(key),
            loc_map: LocMap {
                ty: None,
                field: None,
            },
        }
    }

    /// A request of `kind` at an explicit location.
    #[must_use]
    pub const fn at(kind: RequestKind, loc_map: LocMap) -> Self {
        Self { kind, loc_map }
    }

    /// The requested capability.
    #[must_use]
    pub const fn kind(&self) -> &RequestKind {
        &self.kind
    }

    /// The request's location.
    #[must_use]
    pub const fn loc_map(&self) -> &LocMap {
        &self.loc_map
    }

    /// The coarse class of the requested capability.
    #[must_use]
    pub const fn class(&self) -> RequestClass {
        self.kind.class()
    }

    /// Copy of this request re-pointed at another location.
    #[must_use]
    pub fn with_loc(&self, loc_map: LocMap) -> Self {
        Self {
            kind: self.kind.clone(),
            loc_map,
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            RequestKind::Loader => write!(f, "loader for {}", self.loc_map),
            RequestKind::Dumper => write!(f, "dumper for {}", self.loc_map),
            RequestKind::Overlay(key) => {
                write!(f, "overlay `{}` for {}", key, self.loc_map)
            }
            RequestKind::Config(key) => write!(f, "config value `{key}`"),
        }
    }
}
