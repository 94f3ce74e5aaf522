//! Ordered provider search with continuation support.
//!
//! The mediator scans the active recipe in order and hands each provider
//! the chance to satisfy a request; the first success wins, so recipe
//! order is the sole precedence mechanism. A provider being attempted may
//! call [`Mediator::provide_from_next`] to resume the scan *after* its own
//! position — this is what lets an overlay or chaining rule ask for
//! "whatever the rest of the recipe would have produced" and merge with it.

use std::cell::RefCell;

use crate::error::{CannotProvide, ProvideError, ResolveError};
use crate::introspect::{Shape, TypeIntrospector};
use crate::provider::{DynProvider, Resolved};
use crate::request::{Request, TypeKey};

struct Frame {
    request: Request,
    position: usize,
}

/// Executes the ordered search over a recipe.
///
/// A mediator lives for one top-level resolution; nested requests issued
/// by providers recurse through the same instance, which tracks the stack
/// of in-flight searches so continuations resume at the right place.
pub struct Mediator<'a> {
    recipe: &'a [DynProvider],
    introspector: &'a dyn TypeIntrospector,
    depth_limit: usize,
    frames: RefCell<Vec<Frame>>,
}

impl<'a> Mediator<'a> {
    pub(crate) fn new(
        recipe: &'a [DynProvider],
        introspector: &'a dyn TypeIntrospector,
        depth_limit: usize,
    ) -> Self {
        Self {
            recipe,
            introspector,
            depth_limit,
            frames: RefCell::new(Vec::new()),
        }
    }

    /// Resolve `request` by scanning the recipe from the beginning.
    ///
    /// # Errors
    ///
    /// Returns an aggregate [`CannotProvide`] when every provider
    /// declines, or the first hard failure raised during the scan.
    pub fn provide(&self, request: &Request) -> Result<Resolved, ProvideError> {
        self.provide_from(request, 0)
    }

    /// Resume the innermost in-flight search after the provider currently
    /// being attempted.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::NoActiveSearch`] when called outside a
    /// provider attempt, otherwise behaves like [`Mediator::provide`]
    /// restricted to the rest of the recipe.
    pub fn provide_from_next(&self) -> Result<Resolved, ProvideError> {
        let resumed = {
            let frames = self.frames.borrow();
            frames.last().map(|frame| {
                (
                    frame.request.clone(),
                    frame.position.saturating_add(1),
                )
            })
        };
        resumed.map_or_else(
            || Err(ResolveError::NoActiveSearch.into()),
            |(request, start)| self.provide_from(&request, start),
        )
    }

    /// The ordered ancestor chain of `type_key`, nearest first.
    #[must_use]
    pub fn ancestors(&self, type_key: &TypeKey) -> Vec<TypeKey> {
        self.introspector.ancestors(type_key)
    }

    /// The field shape of `type_key`, when the type is structured.
    #[must_use]
    pub fn shape(&self, type_key: &TypeKey) -> Option<Shape> {
        self.introspector.shape(type_key)
    }

    fn provide_from(&self, request: &Request, start: usize) -> Result<Resolved, ProvideError> {
        if self.frames.borrow().len() >= self.depth_limit {
            return Err(ResolveError::DepthExceeded {
                limit: self.depth_limit,
                request: request.to_string(),
            }
            .into());
        }

        let class = request.class();
        let mut refusals = Vec::new();
        for (position, provider) in self.recipe.iter().enumerate().skip(start) {
            if !provider.maybe_can_handle(class) {
                continue;
            }
            self.frames.borrow_mut().push(Frame {
                request: request.clone(),
                position,
            });
            let outcome = provider.attempt(self, request);
            self.frames.borrow_mut().pop();
            match outcome {
                Ok(resolved) => {
                    tracing::trace!(%request, position, "provider satisfied request");
                    return Ok(resolved);
                }
                Err(ProvideError::Cannot(refusal)) => {
                    tracing::trace!(%request, position, reason = %refusal, "provider declined");
                    refusals.push(refusal);
                }
                Err(fatal @ ProvideError::Fatal(_)) => return Err(fatal),
            }
        }

        tracing::debug!(%request, tried = refusals.len(), "search exhausted");
        Err(CannotProvide::aggregate(
            format!("no provider could handle {request}"),
            refusals,
        )
        .into())
    }
}

impl std::fmt::Debug for Mediator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mediator")
            .field("recipe_len", &self.recipe.len())
            .field("depth", &self.frames.borrow().len())
            .field("depth_limit", &self.depth_limit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::introspect::StaticIntrospector;
    use crate::provider::{LoaderProvider, Provider};
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn first_match_wins() {
        let recipe: Vec<DynProvider> = vec![
            Arc::new(LoaderProvider::for_type(TypeKey::new("Int"), |_| {
                Ok(json!("first"))
            })),
            Arc::new(LoaderProvider::for_type(TypeKey::new("Int"), |_| {
                Ok(json!("second"))
            })),
        ];
        let introspector = StaticIntrospector::new();
        let mediator = Mediator::new(&recipe, &introspector, 8);
        let loader = mediator
            .provide(&Request::loader(TypeKey::new("Int")))
            .and_then(|r| r.into_loader().map_err(ProvideError::Fatal))
            .expect("resolvable");
        assert_eq!(loader(json!(0)).expect("loads"), json!("first"));
    }

    #[test]
    fn exhaustion_aggregates_refusals() {
        let recipe: Vec<DynProvider> = vec![
            Arc::new(LoaderProvider::for_type(TypeKey::new("Str"), Ok)),
            Arc::new(LoaderProvider::for_type(TypeKey::new("Bool"), Ok)),
        ];
        let introspector = StaticIntrospector::new();
        let mediator = Mediator::new(&recipe, &introspector, 8);
        let err = mediator.provide(&Request::loader(TypeKey::new("Int")));
        match err {
            Err(ProvideError::Cannot(refusal)) => assert_eq!(refusal.causes().len(), 2),
            other => panic!("expected soft exhaustion, got {other:?}"),
        }
    }

    #[test]
    fn depth_limit_is_fatal() {
        #[derive(Debug)]
        struct SelfRecursive;
        impl Provider for SelfRecursive {
            fn attempt(
                &self,
                mediator: &Mediator<'_>,
                request: &Request,
            ) -> Result<Resolved, ProvideError> {
                mediator.provide(request)
            }
        }

        let recipe: Vec<DynProvider> = vec![Arc::new(SelfRecursive)];
        let introspector = StaticIntrospector::new();
        let mediator = Mediator::new(&recipe, &introspector, 4);
        let err = mediator.provide(&Request::loader(TypeKey::new("Loop")));
        assert!(matches!(
            err,
            Err(ProvideError::Fatal(ResolveError::DepthExceeded { limit: 4, .. }))
        ));
    }

    #[test]
    fn continuation_outside_a_search_is_fatal() {
        let recipe: Vec<DynProvider> = vec![];
        let introspector = StaticIntrospector::new();
        let mediator = Mediator::new(&recipe, &introspector, 8);
        assert!(matches!(
            mediator.provide_from_next(),
            Err(ProvideError::Fatal(ResolveError::NoActiveSearch))
        ));
    }
}
