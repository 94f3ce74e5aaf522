//! Partial configuration overlays and inheritance-aware schema merging.
//!
//! An overlay is a partial configuration layer for one schema family:
//! every declared field either carries a value or the distinguished
//! [`FieldState::Omitted`] sentinel meaning "not specified at this layer".
//! [`provide_schema`] resolves the overlay for a type, folds in the layers
//! found along the type's ancestor chain, and finishes by converting the
//! accumulated overlay into a fully specified [`SchemaValue`].
//!
//! Merge policy lives in the [`OverlaySpec`]: an explicit per-family table
//! built at registration time, never memoised implicitly on a type object.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::combinator::Chain;
use crate::error::{CannotProvide, ProvideError, ResolveError};
use crate::mediator::Mediator;
use crate::provider::{Provider, Resolved};
use crate::request::{LocMap, Request, RequestClass, RequestKind, TypeKey, TypeLoc};

/// Identity of an overlay family (one per schema type).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OverlayKey(Arc<str>);

impl OverlayKey {
    /// Create a key for the overlay family with the given name.
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    /// The family's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for OverlayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OverlayKey({})", self.0)
    }
}

impl fmt::Display for OverlayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OverlayKey {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// State of one overlay field at one layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldState {
    /// The layer specifies a value.
    Set(Value),
    /// The layer leaves the field unspecified.
    Omitted,
}

impl FieldState {
    /// Whether the field is unspecified at this layer.
    #[must_use]
    pub const fn is_omitted(&self) -> bool {
        matches!(self, Self::Omitted)
    }

    /// The value, when one is set.
    #[must_use]
    pub const fn value(&self) -> Option<&Value> {
        match self {
            Self::Set(value) => Some(value),
            Self::Omitted => None,
        }
    }
}

/// Per-field combine function applied when both layers set a value.
///
/// Receives the older (less specific) value first and the newer (more
/// derived) value second.
pub type Merger = Arc<dyn Fn(&Value, &Value) -> Value + Send + Sync>;

/// Declared fields and merge policy of one overlay family.
///
/// The merger table is complete after construction; fields without a
/// registered merger use the default policy, "new value wins".
#[derive(Clone)]
pub struct OverlaySpec {
    key: OverlayKey,
    fields: Vec<String>,
    mergers: HashMap<String, Merger>,
}

impl OverlaySpec {
    /// A spec declaring the given fields with the default merge policy.
    #[must_use]
    pub fn new(key: OverlayKey, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            key,
            fields: fields.into_iter().map(Into::into).collect(),
            mergers: HashMap::new(),
        }
    }

    /// Register a custom merger for `field`, replacing "new wins".
    #[must_use]
    pub fn with_merger(
        mut self,
        field: impl Into<String>,
        merger: impl Fn(&Value, &Value) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.mergers.insert(field.into(), Arc::new(merger));
        self
    }

    /// The family this spec describes.
    #[must_use]
    pub const fn key(&self) -> &OverlayKey {
        &self.key
    }

    /// The declared field names, in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// An overlay of this family with every field omitted.
    #[must_use]
    pub fn empty_overlay(&self) -> OverlayValue {
        OverlayValue::new(self.key.clone())
    }

    fn merge_field(&self, name: &str, old: &Value, new: &Value) -> Value {
        self.mergers
            .get(name)
            .map_or_else(|| new.clone(), |merger| merger(old, new))
    }

    /// Merge `new` over `old`, field by field.
    ///
    /// If the old value is omitted the new one is taken; if the new value
    /// is omitted the old one is kept; when both are set the field's
    /// merger decides (default: new wins).
    #[must_use]
    pub fn merge(&self, old: &OverlayValue, new: &OverlayValue) -> OverlayValue {
        let mut merged = BTreeMap::new();
        for name in &self.fields {
            let old_state = old.field(name);
            let new_state = new.field(name);
            let state = match (old_state.value(), new_state.value()) {
                (None, None) => FieldState::Omitted,
                (None, Some(value)) | (Some(value), None) => FieldState::Set(value.clone()),
                (Some(old_value), Some(new_value)) => {
                    FieldState::Set(self.merge_field(name, old_value, new_value))
                }
            };
            merged.insert(name.clone(), state);
        }
        OverlayValue {
            key: self.key.clone(),
            fields: merged,
            origin: None,
        }
    }

    /// Convert an accumulated overlay into a fully specified schema.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::IncompleteOverlay`] when any declared field
    /// is still omitted. This is a configuration error, never a soft
    /// refusal.
    pub fn to_schema(&self, overlay: &OverlayValue) -> Result<SchemaValue, ResolveError> {
        let mut resolved = BTreeMap::new();
        let mut omitted = Vec::new();
        for name in &self.fields {
            match overlay.field(name).value() {
                Some(value) => {
                    resolved.insert(name.clone(), value.clone());
                }
                None => omitted.push(name.clone()),
            }
        }
        if omitted.is_empty() {
            Ok(SchemaValue { fields: resolved })
        } else {
            Err(ResolveError::IncompleteOverlay {
                overlay: self.key.name().to_owned(),
                type_key: overlay
                    .origin
                    .as_ref()
                    .map_or_else(|| "<unlocated>".to_owned(), ToString::to_string),
                fields: omitted,
            })
        }
    }
}

impl fmt::Debug for OverlaySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverlaySpec")
            .field("key", &self.key)
            .field("fields", &self.fields)
            .field("custom_mergers", &self.mergers.len())
            .finish()
    }
}

/// One partial configuration layer of an overlay family.
///
/// Fields never mentioned count as omitted; a layer does not need to name
/// every declared field.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlayValue {
    key: OverlayKey,
    fields: BTreeMap<String, FieldState>,
    origin: Option<TypeKey>,
}

impl OverlayValue {
    /// An empty layer of family `key`.
    #[must_use]
    pub const fn new(key: OverlayKey) -> Self {
        Self {
            key,
            fields: BTreeMap::new(),
            origin: None,
        }
    }

    /// This layer with `name` set to `value`.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), FieldState::Set(value));
        self
    }

    /// This layer with `name` explicitly omitted.
    #[must_use]
    pub fn with_omitted(mut self, name: impl Into<String>) -> Self {
        self.fields.insert(name.into(), FieldState::Omitted);
        self
    }

    /// This layer tagged with the type it was resolved for, improving
    /// completeness diagnostics.
    #[must_use]
    pub fn with_origin(mut self, type_key: TypeKey) -> Self {
        self.origin = Some(type_key);
        self
    }

    /// The layer's family.
    #[must_use]
    pub const fn key(&self) -> &OverlayKey {
        &self.key
    }

    /// The state of `name` at this layer.
    #[must_use]
    pub fn field(&self, name: &str) -> FieldState {
        self.fields
            .get(name)
            .cloned()
            .unwrap_or(FieldState::Omitted)
    }
}

/// A fully resolved configuration: every field carries a value.
#[derive(Clone, Debug, PartialEq)]
pub struct SchemaValue {
    fields: BTreeMap<String, Value>,
}

impl SchemaValue {
    /// The value of `name`, when declared.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Deserialise the schema into its typed form.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::SchemaExtraction`] when the field values do
    /// not match the target type.
    pub fn extract<T: DeserializeOwned>(&self, overlay: &OverlayKey) -> Result<T, ResolveError> {
        let object = self
            .fields
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        serde_json::from_value(Value::Object(object)).map_err(|source| {
            ResolveError::SchemaExtraction {
                overlay: overlay.name().to_owned(),
                source,
            }
        })
    }
}

/// Resolve the overlay of `spec` at `loc_map`, folding in every ancestor
/// layer, and convert the result into a schema.
///
/// The overlay is first resolved for the location itself; then, for each
/// ancestor of the located type (nearest first), the same overlay family
/// is resolved at the ancestor's location and merged *under* the
/// accumulated layer — ancestors only fill fields the more derived layers
/// left unspecified, unless a custom merger combines them. Ancestors that
/// soft-fail are skipped: they are optional sources, not required ones.
///
/// # Errors
///
/// Propagates soft failures when no layer exists for the location itself,
/// and hard failures from incomplete overlays or aborted searches.
pub fn provide_schema(
    spec: &OverlaySpec,
    mediator: &Mediator<'_>,
    loc_map: &LocMap,
) -> Result<SchemaValue, ProvideError> {
    let resolved = mediator.provide(&Request::overlay(spec.key().clone(), loc_map.clone()))?;
    let mut stacked = resolved.into_overlay().map_err(ProvideError::Fatal)?;

    if let Some(type_loc) = loc_map.type_loc() {
        let requested = type_loc.type_key().clone();
        stacked = stacked.with_origin(requested.clone());
        for parent in mediator.ancestors(&requested) {
            let parent_loc = loc_map.with_type(TypeLoc::new(parent));
            match mediator.provide(&Request::overlay(spec.key().clone(), parent_loc)) {
                Ok(layer) => {
                    let ancestor = layer.into_overlay().map_err(ProvideError::Fatal)?;
                    stacked = spec.merge(&ancestor, &stacked).with_origin(requested.clone());
                }
                Err(ProvideError::Cannot(_)) => {}
                Err(fatal @ ProvideError::Fatal(_)) => return Err(fatal),
            }
        }
    }

    spec.to_schema(&stacked).map_err(ProvideError::Fatal)
}

/// Provider carrying user-registered overlay layers, optionally chained
/// with whatever later recipe entries would have produced.
pub struct OverlayProvider {
    chain: Option<Chain>,
    entries: HashMap<OverlayKey, (Arc<OverlaySpec>, OverlayValue)>,
}

impl OverlayProvider {
    /// A provider holding the given layers.
    ///
    /// With `chain` set, the provider merges its layer with the result of
    /// continuing the search after its own position: [`Chain::First`]
    /// lets this layer win conflicts, [`Chain::Last`] defers to the
    /// continuation.
    #[must_use]
    pub fn new(
        chain: Option<Chain>,
        entries: impl IntoIterator<Item = (Arc<OverlaySpec>, OverlayValue)>,
    ) -> Self {
        Self {
            chain,
            entries: entries
                .into_iter()
                .map(|(spec, value)| (spec.key().clone(), (spec, value)))
                .collect(),
        }
    }
}

impl Provider for OverlayProvider {
    fn attempt(
        &self,
        mediator: &Mediator<'_>,
        request: &Request,
    ) -> Result<Resolved, ProvideError> {
        let RequestKind::Overlay(key) = request.kind() else {
            return Err(CannotProvide::new("only provides overlays").into());
        };
        let Some((spec, value)) = self.entries.get(key) else {
            return Err(CannotProvide::new(format!("no `{key}` overlay registered")).into());
        };

        let Some(chain) = self.chain else {
            return Ok(Resolved::Overlay(value.clone()));
        };

        match mediator.provide_from_next() {
            Ok(next) => {
                let next_overlay = next.into_overlay().map_err(ProvideError::Fatal)?;
                let merged = match chain {
                    Chain::First => spec.merge(&next_overlay, value),
                    Chain::Last => spec.merge(value, &next_overlay),
                };
                Ok(Resolved::Overlay(merged))
            }
            Err(ProvideError::Cannot(_)) => Ok(Resolved::Overlay(value.clone())),
            Err(fatal @ ProvideError::Fatal(_)) => Err(fatal),
        }
    }

    fn maybe_can_handle(&self, class: RequestClass) -> bool {
        class == RequestClass::Overlay
    }
}

impl fmt::Debug for OverlayProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&OverlayKey> = self.entries.keys().collect();
        keys.sort();
        f.debug_struct("OverlayProvider")
            .field("chain", &self.chain)
            .field("overlays", &keys)
            .finish()
    }
}
