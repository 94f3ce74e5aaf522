//! Structural introspection supplied by the embedding application.
//!
//! The engine never reflects over language types itself. It consumes a
//! [`TypeIntrospector`]: a collaborator that can decompose a type into its
//! ordered ancestor chain and its field shape. [`StaticIntrospector`] is a
//! table-driven implementation populated at construction, sufficient for
//! applications that register their type universe up front.

use std::collections::HashMap;
use std::fmt;

use crate::request::TypeKey;

/// One field of a structured type, in declaration order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldShape {
    name: String,
    type_key: TypeKey,
    required: bool,
}

impl FieldShape {
    /// A required field.
    #[must_use]
    pub fn required(name: impl Into<String>, type_key: TypeKey) -> Self {
        Self {
            name: name.into(),
            type_key,
            required: true,
        }
    }

    /// An optional field.
    #[must_use]
    pub fn optional(name: impl Into<String>, type_key: TypeKey) -> Self {
        Self {
            name: name.into(),
            type_key,
            required: false,
        }
    }

    /// The field's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The field's type.
    #[must_use]
    pub const fn type_key(&self) -> &TypeKey {
        &self.type_key
    }

    /// Whether input data must supply the field.
    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.required
    }
}

/// Ordered field list of a structured type.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Shape {
    fields: Vec<FieldShape>,
}

impl Shape {
    /// A shape with the given fields, in declaration order.
    #[must_use]
    pub fn new(fields: impl IntoIterator<Item = FieldShape>) -> Self {
        Self {
            fields: fields.into_iter().collect(),
        }
    }

    /// The fields, in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[FieldShape] {
        &self.fields
    }
}

/// Capability to decompose a structured type.
pub trait TypeIntrospector: fmt::Debug + Send + Sync {
    /// The ordered ancestor chain of `type_key`, nearest ancestor first,
    /// excluding the type itself. Empty when the type has no ancestors or
    /// is unknown.
    fn ancestors(&self, type_key: &TypeKey) -> Vec<TypeKey>;

    /// The field shape of `type_key`, or `None` when the type is opaque.
    fn shape(&self, type_key: &TypeKey) -> Option<Shape>;
}

/// Table-driven introspector populated at construction.
#[derive(Clone, Debug, Default)]
pub struct StaticIntrospector {
    ancestors: HashMap<TypeKey, Vec<TypeKey>>,
    shapes: HashMap<TypeKey, Shape>,
}

impl StaticIntrospector {
    /// An introspector that knows no types yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the ancestor chain of `type_key`, nearest first.
    #[must_use]
    pub fn with_ancestors(
        mut self,
        type_key: TypeKey,
        chain: impl IntoIterator<Item = TypeKey>,
    ) -> Self {
        self.ancestors
            .insert(type_key, chain.into_iter().collect());
        self
    }

    /// Register the field shape of `type_key`.
    #[must_use]
    pub fn with_shape(mut self, type_key: TypeKey, shape: Shape) -> Self {
        self.shapes.insert(type_key, shape);
        self
    }
}

impl TypeIntrospector for StaticIntrospector {
    fn ancestors(&self, type_key: &TypeKey) -> Vec<TypeKey> {
        self.ancestors.get(type_key).cloned().unwrap_or_default()
    }

    fn shape(&self, type_key: &TypeKey) -> Option<Shape> {
        self.shapes.get(type_key).cloned()
    }
}
