//! An extensible resolution engine for structured-data converters.
//!
//! The engine builds, on demand, converter functions — loaders that turn
//! loosely typed data into concrete values and dumpers that do the
//! reverse — by searching an ordered, user-extensible list of pluggable
//! rules. A [`Retort`] owns the rule list (its *recipe*), resolves a
//! converter for a type through the [`Mediator`]'s ordered search, caches
//! it, and applies it to data. Rules are [`Provider`]s; combinators guard
//! ([`BoundingProvider`]), fall back ([`ConcatProvider`]), and sequence
//! ([`ChainingProvider`]) them, and overlay resolution merges partial
//! configuration layers across a type's ancestor chain.
//!
//! ```
//! use std::sync::Arc;
//!
//! use retort::{LoaderProvider, Retort, TypeKey};
//! use serde_json::json;
//!
//! let retort = Retort::builder()
//!     .provider(Arc::new(LoaderProvider::for_type(
//!         TypeKey::new("Upper"),
//!         |data| {
//!             let text = data.as_str().unwrap_or_default().to_uppercase();
//!             Ok(json!(text))
//!         },
//!     )))
//!     .build();
//!
//! let loaded = retort
//!     .load(json!("quiet"), &TypeKey::new("Upper"))
//!     .expect("rule registered for Upper");
//! assert_eq!(loaded, json!("QUIET"));
//! ```

mod checker;
mod combinator;
mod error;
mod introspect;
mod mediator;
mod overlay;
mod provider;
mod request;
mod retort;

pub use checker::{AnyChecker, DynChecker, FieldChecker, RequestChecker, TypeChecker};
pub use combinator::{BoundingProvider, Chain, ChainingProvider, ConcatProvider};
pub use error::{
    CannotProvide, ConvertError, ProvideError, ResolveError, RetortError, TrailElement,
};
pub use introspect::{FieldShape, Shape, StaticIntrospector, TypeIntrospector};
pub use mediator::Mediator;
pub use overlay::{
    FieldState, Merger, OverlayKey, OverlayProvider, OverlaySpec, OverlayValue, SchemaValue,
    provide_schema,
};
pub use provider::{
    ConfigProvider, ConfigValue, Dumper, DumperProvider, DynProvider, Loader, LoaderProvider,
    Provider, Resolved,
};
pub use request::{
    ConfigKey, FieldLoc, LocMap, Request, RequestClass, RequestKind, TypeKey, TypeLoc,
};
pub use retort::{DebugTrail, Retort, RetortBuilder, RetortOptions};
