//! The public resolve/convert facade.
//!
//! A [`Retort`] owns a frozen base recipe, resolved scalar configuration,
//! and per-type converter caches. It is immutable after construction:
//! [`Retort::extend`] and [`Retort::replace`] return new independent
//! instances with fresh caches, so a base configuration can spawn many
//! specialised variants without sharing mutable state.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use serde_json::Value;

use crate::error::{ProvideError, ResolveError, RetortError, TrailElement};
use crate::introspect::{StaticIntrospector, TypeIntrospector};
use crate::mediator::Mediator;
use crate::provider::{ConfigProvider, ConfigValue, Dumper, DynProvider, Loader, Resolved};
use crate::request::{ConfigKey, Request, TypeKey};

/// How much structural context conversion errors should carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DebugTrail {
    /// Converters raise errors untouched.
    Disable,
    /// The facade annotates errors with the requested type.
    First,
    /// The facade and leaf rules annotate every level of the path.
    All,
}

/// Scalar options adjustable through [`Retort::replace`].
///
/// Unset fields keep the original instance's value.
#[derive(Clone, Copy, Debug, Default)]
pub struct RetortOptions {
    /// New value for coercion strictness.
    pub strict_coercion: Option<bool>,
    /// New value for the diagnostic trail mode.
    pub debug_trail: Option<DebugTrail>,
    /// New value for the recursion depth limit.
    pub depth_limit: Option<usize>,
}

/// Builder for [`Retort`].
pub struct RetortBuilder {
    recipe: Vec<DynProvider>,
    strict_coercion: bool,
    debug_trail: DebugTrail,
    depth_limit: usize,
    introspector: Arc<dyn TypeIntrospector>,
}

impl RetortBuilder {
    /// A builder with an empty recipe and default options.
    #[must_use]
    pub fn new() -> Self {
        Self {
            recipe: Vec::new(),
            strict_coercion: true,
            debug_trail: DebugTrail::All,
            depth_limit: 64,
            introspector: Arc::new(StaticIntrospector::new()),
        }
    }

    /// Append a provider to the base recipe.
    #[must_use]
    pub fn provider(mut self, provider: DynProvider) -> Self {
        self.recipe.push(provider);
        self
    }

    /// Append several providers to the base recipe, in order.
    #[must_use]
    pub fn providers(mut self, providers: impl IntoIterator<Item = DynProvider>) -> Self {
        self.recipe.extend(providers);
        self
    }

    /// Set coercion strictness (default `true`).
    #[must_use]
    pub const fn strict_coercion(mut self, strict: bool) -> Self {
        self.strict_coercion = strict;
        self
    }

    /// Set the diagnostic trail mode (default [`DebugTrail::All`]).
    #[must_use]
    pub const fn debug_trail(mut self, mode: DebugTrail) -> Self {
        self.debug_trail = mode;
        self
    }

    /// Set the recursion depth limit (default 64).
    #[must_use]
    pub const fn depth_limit(mut self, limit: usize) -> Self {
        self.depth_limit = limit;
        self
    }

    /// Inject the introspection collaborator (default: an empty
    /// [`StaticIntrospector`]).
    #[must_use]
    pub fn introspector(mut self, introspector: Arc<dyn TypeIntrospector>) -> Self {
        self.introspector = introspector;
        self
    }

    /// Freeze the builder into a retort.
    #[must_use]
    pub fn build(self) -> Retort {
        Retort {
            base_recipe: self.recipe.into(),
            extension: Vec::new(),
            strict_coercion: self.strict_coercion,
            debug_trail: self.debug_trail,
            depth_limit: self.depth_limit,
            introspector: self.introspector,
            effective: OnceLock::new(),
            loader_cache: RwLock::new(HashMap::new()),
            dumper_cache: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for RetortBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The resolution and caching container exposing the convert API.
pub struct Retort {
    base_recipe: Arc<[DynProvider]>,
    extension: Vec<DynProvider>,
    strict_coercion: bool,
    debug_trail: DebugTrail,
    depth_limit: usize,
    introspector: Arc<dyn TypeIntrospector>,
    effective: OnceLock<Arc<[DynProvider]>>,
    loader_cache: RwLock<HashMap<TypeKey, Loader>>,
    dumper_cache: RwLock<HashMap<TypeKey, Dumper>>,
}

impl Retort {
    /// Start building a retort.
    #[must_use]
    pub fn builder() -> RetortBuilder {
        RetortBuilder::new()
    }

    /// Current coercion strictness.
    #[must_use]
    pub const fn strict_coercion(&self) -> bool {
        self.strict_coercion
    }

    /// Current diagnostic trail mode.
    #[must_use]
    pub const fn debug_trail(&self) -> DebugTrail {
        self.debug_trail
    }

    /// Current recursion depth limit.
    #[must_use]
    pub const fn depth_limit(&self) -> usize {
        self.depth_limit
    }

    /// New independent retort with `recipe` prepended at the highest
    /// precedence. The original instance and its caches are untouched.
    #[must_use]
    pub fn extend(&self, recipe: impl IntoIterator<Item = DynProvider>) -> Self {
        let mut extension: Vec<DynProvider> = recipe.into_iter().collect();
        extension.extend(self.extension.iter().map(Arc::clone));
        Self {
            extension,
            ..self.clone_shell()
        }
    }

    /// New independent retort with the given scalar options changed. The
    /// original instance and its caches are untouched.
    #[must_use]
    pub fn replace(&self, options: RetortOptions) -> Self {
        let mut clone = self.clone_shell();
        if let Some(strict) = options.strict_coercion {
            clone.strict_coercion = strict;
        }
        if let Some(mode) = options.debug_trail {
            clone.debug_trail = mode;
        }
        if let Some(limit) = options.depth_limit {
            clone.depth_limit = limit;
        }
        clone
    }

    // Copy of the immutable configuration with fresh caches and a fresh
    // derived-state slot.
    fn clone_shell(&self) -> Self {
        Self {
            base_recipe: Arc::clone(&self.base_recipe),
            extension: self.extension.iter().map(Arc::clone).collect(),
            strict_coercion: self.strict_coercion,
            debug_trail: self.debug_trail,
            depth_limit: self.depth_limit,
            introspector: Arc::clone(&self.introspector),
            effective: OnceLock::new(),
            loader_cache: RwLock::new(HashMap::new()),
            dumper_cache: RwLock::new(HashMap::new()),
        }
    }

    // Derived once per instance: configuration providers, then extension
    // entries newest-first, then the frozen base recipe.
    fn effective_recipe(&self) -> &Arc<[DynProvider]> {
        self.effective.get_or_init(|| {
            let config: [DynProvider; 2] = [
                Arc::new(ConfigProvider::new(
                    ConfigKey::StrictCoercion,
                    ConfigValue::StrictCoercion(self.strict_coercion),
                )),
                Arc::new(ConfigProvider::new(
                    ConfigKey::DebugTrail,
                    ConfigValue::DebugTrail(self.debug_trail),
                )),
            ];
            config
                .into_iter()
                .chain(self.extension.iter().map(Arc::clone))
                .chain(self.base_recipe.iter().map(Arc::clone))
                .collect()
        })
    }

    fn resolve(&self, request: &Request) -> Result<Resolved, ResolveError> {
        let recipe = self.effective_recipe();
        let mediator = Mediator::new(recipe, self.introspector.as_ref(), self.depth_limit);
        match mediator.provide(request) {
            Ok(resolved) => Ok(resolved),
            Err(ProvideError::Cannot(cause)) => Err(ResolveError::Unsatisfied {
                request: request.to_string(),
                cause,
            }),
            Err(ProvideError::Fatal(fatal)) => Err(fatal),
        }
    }

    fn annotate(&self, type_key: &TypeKey, converter: Loader) -> Loader {
        if self.debug_trail == DebugTrail::Disable {
            return converter;
        }
        let note = type_key.clone();
        Arc::new(move |data| {
            converter(data).map_err(|error| error.with_element(TrailElement::Type(note.clone())))
        })
    }

    /// Resolve (or fetch from cache) the loader for `type_key`.
    ///
    /// The underlying recipe search runs at most once per distinct type
    /// per instance; the returned converter is reusable.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Unsatisfied`] when no provider accepts the
    /// request, or the hard failure that aborted the search.
    pub fn get_loader(&self, type_key: &TypeKey) -> Result<Loader, ResolveError> {
        let cached = self
            .loader_cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(type_key)
            .map(Arc::clone);
        if let Some(hit) = cached {
            return Ok(hit);
        }

        tracing::debug!(%type_key, "resolving loader");
        let resolved = self.resolve(&Request::loader(type_key.clone()))?;
        let loader = self.annotate(type_key, resolved.into_loader()?);
        self.loader_cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(type_key.clone(), Arc::clone(&loader));
        Ok(loader)
    }

    /// Resolve (or fetch from cache) the dumper for `type_key`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Unsatisfied`] when no provider accepts the
    /// request, or the hard failure that aborted the search.
    pub fn get_dumper(&self, type_key: &TypeKey) -> Result<Dumper, ResolveError> {
        let cached = self
            .dumper_cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(type_key)
            .map(Arc::clone);
        if let Some(hit) = cached {
            return Ok(hit);
        }

        tracing::debug!(%type_key, "resolving dumper");
        let resolved = self.resolve(&Request::dumper(type_key.clone()))?;
        let dumper = self.annotate(type_key, resolved.into_dumper()?);
        self.dumper_cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(type_key.clone(), Arc::clone(&dumper));
        Ok(dumper)
    }

    /// One-shot convenience: resolve the loader for `type_key` and apply
    /// it to `data`.
    ///
    /// # Errors
    ///
    /// Returns [`RetortError::Resolve`] when no loader can be resolved and
    /// [`RetortError::Convert`] when the loader rejects the data.
    pub fn load(&self, data: Value, type_key: &TypeKey) -> Result<Value, RetortError> {
        let loader = self.get_loader(type_key)?;
        loader(data).map_err(RetortError::from)
    }

    /// One-shot convenience: resolve the dumper for `type_key` and apply
    /// it to `value`.
    ///
    /// # Errors
    ///
    /// Returns [`RetortError::Resolve`] when no dumper can be resolved and
    /// [`RetortError::Convert`] when the dumper rejects the value.
    pub fn dump(&self, value: Value, type_key: &TypeKey) -> Result<Value, RetortError> {
        let dumper = self.get_dumper(type_key)?;
        dumper(value).map_err(RetortError::from)
    }
}

impl std::fmt::Debug for Retort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retort")
            .field("base_recipe_len", &self.base_recipe.len())
            .field("extension_len", &self.extension.len())
            .field("strict_coercion", &self.strict_coercion)
            .field("debug_trail", &self.debug_trail)
            .field("depth_limit", &self.depth_limit)
            .finish_non_exhaustive()
    }
}
