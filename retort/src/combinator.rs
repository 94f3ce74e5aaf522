//! Provider combinators: guarded, fallback, and sequential composition.
//!
//! These wrap other providers without knowing what they resolve:
//! [`BoundingProvider`] scopes a rule to a subset of locations,
//! [`ConcatProvider`] tries alternatives until one succeeds, and
//! [`ChainingProvider`] composes a rule's converter with whatever the rest
//! of the recipe would have produced.

use std::fmt;
use std::sync::Arc;

use crate::checker::DynChecker;
use crate::error::{CannotProvide, ProvideError, ResolveError};
use crate::mediator::Mediator;
use crate::provider::{DynProvider, Loader, Provider, Resolved};
use crate::request::{Request, RequestClass};

/// Guard + delegate: the checker is evaluated first, and a rejection fails
/// the whole combinator without invoking the inner provider.
pub struct BoundingProvider {
    checker: DynChecker,
    inner: DynProvider,
}

impl BoundingProvider {
    /// Scope `inner` to the requests accepted by `checker`.
    #[must_use]
    pub fn new(checker: DynChecker, inner: DynProvider) -> Self {
        Self { checker, inner }
    }
}

impl Provider for BoundingProvider {
    fn attempt(
        &self,
        mediator: &Mediator<'_>,
        request: &Request,
    ) -> Result<Resolved, ProvideError> {
        self.checker.check(request)?;
        self.inner.attempt(mediator, request)
    }

    fn maybe_can_handle(&self, class: RequestClass) -> bool {
        self.inner.maybe_can_handle(class)
    }
}

impl fmt::Debug for BoundingProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundingProvider")
            .field("checker", &self.checker)
            .field("inner", &self.inner)
            .finish()
    }
}

/// First-success concatenation of providers.
///
/// Children are tried in order; the first success wins. When every child
/// declines, the refusals are aggregated so diagnostics keep the context
/// of each branch. Hard failures are never swallowed.
pub struct ConcatProvider {
    providers: Vec<DynProvider>,
}

impl ConcatProvider {
    /// Concatenate the given providers.
    #[must_use]
    pub fn new(providers: impl IntoIterator<Item = DynProvider>) -> Self {
        Self {
            providers: providers.into_iter().collect(),
        }
    }
}

impl Provider for ConcatProvider {
    fn attempt(
        &self,
        mediator: &Mediator<'_>,
        request: &Request,
    ) -> Result<Resolved, ProvideError> {
        let mut refusals = Vec::new();
        for provider in &self.providers {
            match provider.attempt(mediator, request) {
                Ok(resolved) => return Ok(resolved),
                Err(ProvideError::Cannot(refusal)) => refusals.push(refusal),
                Err(fatal @ ProvideError::Fatal(_)) => return Err(fatal),
            }
        }
        Err(CannotProvide::aggregate("every branch declined", refusals).into())
    }

    fn maybe_can_handle(&self, class: RequestClass) -> bool {
        self.providers
            .iter()
            .any(|provider| provider.maybe_can_handle(class))
    }
}

impl fmt::Debug for ConcatProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcatProvider")
            .field("providers", &self.providers)
            .finish()
    }
}

/// Ordering mode for composing two converters found at different search
/// stages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Chain {
    /// Apply this rule's converter first, then the continuation's.
    First,
    /// Apply the continuation's converter first, then this rule's.
    Last,
}

fn compose(first: &Loader, second: &Loader) -> Loader {
    let first = Arc::clone(first);
    let second = Arc::clone(second);
    Arc::new(move |data| second(first(data)?))
}

/// Composes the inner provider's converter with the converter the rest of
/// the recipe resolves for the same request.
///
/// This is how independently registered rules post- or pre-process a
/// value without knowing about each other: the chain obtains `current`
/// from its inner provider and `next` from
/// [`Mediator::provide_from_next`], then applies them in the order the
/// [`Chain`] mode dictates.
pub struct ChainingProvider {
    chain: Chain,
    inner: DynProvider,
}

impl ChainingProvider {
    /// Chain `inner` with the continuation of the search, in `chain` order.
    #[must_use]
    pub fn new(chain: Chain, inner: DynProvider) -> Self {
        Self { chain, inner }
    }

    fn composed(&self, current: Resolved, next: Resolved) -> Result<Resolved, ProvideError> {
        match (current, next) {
            (Resolved::Loader(current_fn), Resolved::Loader(next_fn)) => {
                Ok(Resolved::Loader(match self.chain {
                    Chain::First => compose(&current_fn, &next_fn),
                    Chain::Last => compose(&next_fn, &current_fn),
                }))
            }
            (Resolved::Dumper(current_fn), Resolved::Dumper(next_fn)) => {
                Ok(Resolved::Dumper(match self.chain {
                    Chain::First => compose(&current_fn, &next_fn),
                    Chain::Last => compose(&next_fn, &current_fn),
                }))
            }
            (current, next) => Err(ResolveError::KindMismatch {
                expected: current.kind_name(),
                actual: next.kind_name(),
            }
            .into()),
        }
    }
}

impl Provider for ChainingProvider {
    fn attempt(
        &self,
        mediator: &Mediator<'_>,
        request: &Request,
    ) -> Result<Resolved, ProvideError> {
        let current = self.inner.attempt(mediator, request)?;
        let next = mediator.provide_from_next()?;
        self.composed(current, next)
    }

    fn maybe_can_handle(&self, class: RequestClass) -> bool {
        self.inner.maybe_can_handle(class)
    }
}

impl fmt::Debug for ChainingProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainingProvider")
            .field("chain", &self.chain)
            .field("inner", &self.inner)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::TypeChecker;
    use crate::introspect::StaticIntrospector;
    use crate::provider::LoaderProvider;
    use crate::request::TypeKey;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn bounding_rejection_never_invokes_the_inner_provider() {
        static INVOCATIONS: AtomicUsize = AtomicUsize::new(0);

        let bounded = BoundingProvider::new(
            Arc::new(TypeChecker::new(TypeKey::new("Int"))),
            Arc::new(LoaderProvider::new(|data| {
                INVOCATIONS.fetch_add(1, Ordering::SeqCst);
                Ok(data)
            })),
        );

        let recipe: Vec<DynProvider> = vec![];
        let introspector = StaticIntrospector::new();
        let mediator = Mediator::new(&recipe, &introspector, 8);

        let out_of_scope = Request::loader(TypeKey::new("Str"));
        assert!(matches!(
            bounded.attempt(&mediator, &out_of_scope),
            Err(ProvideError::Cannot(_))
        ));
        assert_eq!(INVOCATIONS.load(Ordering::SeqCst), 0);

        let in_scope = Request::loader(TypeKey::new("Int"));
        let resolved = bounded.attempt(&mediator, &in_scope).expect("in scope");
        let loader = resolved.into_loader().expect("loader");
        assert_eq!(loader(json!(1)).expect("loads"), json!(1));
        assert_eq!(INVOCATIONS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn concat_returns_first_success() {
        let concat = ConcatProvider::new([
            Arc::new(LoaderProvider::for_type(TypeKey::new("Str"), Ok)) as DynProvider,
            Arc::new(LoaderProvider::new(|_| Ok(json!("fallback")))) as DynProvider,
        ]);
        let recipe: Vec<DynProvider> = vec![];
        let introspector = StaticIntrospector::new();
        let mediator = Mediator::new(&recipe, &introspector, 8);

        let resolved = concat
            .attempt(&mediator, &Request::loader(TypeKey::new("Int")))
            .expect("second branch succeeds");
        let loader = resolved.into_loader().expect("loader");
        assert_eq!(loader(json!(0)).expect("loads"), json!("fallback"));
    }

    #[test]
    fn concat_exhaustion_keeps_every_branch_refusal() {
        let concat = ConcatProvider::new([
            Arc::new(LoaderProvider::for_type(TypeKey::new("Str"), Ok)) as DynProvider,
            Arc::new(LoaderProvider::for_type(TypeKey::new("Bool"), Ok)) as DynProvider,
        ]);
        let recipe: Vec<DynProvider> = vec![];
        let introspector = StaticIntrospector::new();
        let mediator = Mediator::new(&recipe, &introspector, 8);

        match concat.attempt(&mediator, &Request::loader(TypeKey::new("Int"))) {
            Err(ProvideError::Cannot(refusal)) => {
                assert_eq!(refusal.causes().len(), 2);
            }
            other => panic!("expected aggregate refusal, got {other:?}"),
        }
    }
}
