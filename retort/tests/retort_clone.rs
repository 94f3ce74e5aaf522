//! Copy-on-write configuration: `extend` and `replace` isolation.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use retort::{
    CannotProvide, DynProvider, LoaderProvider, Mediator, ProvideError, Provider, Request,
    RequestClass, RequestKind, Resolved, Retort, RetortOptions, TypeKey,
};
use serde_json::json;

#[derive(Debug)]
struct CountingAsIs {
    attempts: Arc<AtomicUsize>,
}

impl Provider for CountingAsIs {
    fn attempt(
        &self,
        _mediator: &Mediator<'_>,
        request: &Request,
    ) -> Result<Resolved, ProvideError> {
        if !matches!(request.kind(), RequestKind::Loader) {
            return Err(CannotProvide::new("only provides loaders").into());
        }
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Ok(Resolved::Loader(Arc::new(|data| Ok(data))))
    }

    fn maybe_can_handle(&self, class: RequestClass) -> bool {
        class == RequestClass::Loader
    }
}

#[test]
fn extended_instances_do_not_share_caches_with_the_original() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let base = Retort::builder()
        .provider(Arc::new(CountingAsIs {
            attempts: Arc::clone(&attempts),
        }))
        .build();

    // populate the original's cache
    base.get_loader(&TypeKey::new("A")).expect("resolves");
    assert_eq!(attempts.load(Ordering::SeqCst), 1);

    let variant = base.replace(RetortOptions::default());
    variant.get_loader(&TypeKey::new("A")).expect("resolves");
    // the clone started with an empty cache, so the search ran again
    assert_eq!(attempts.load(Ordering::SeqCst), 2);

    // and the original still serves from its own cache
    base.get_loader(&TypeKey::new("A")).expect("resolves");
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[test]
fn extension_entries_take_precedence_over_the_base_recipe() {
    let base = Retort::builder()
        .provider(Arc::new(LoaderProvider::for_type(TypeKey::new("A"), |_| {
            Ok(json!("base"))
        })))
        .build();

    let extended = base.extend([Arc::new(LoaderProvider::for_type(
        TypeKey::new("A"),
        |_| Ok(json!("extension")),
    )) as DynProvider]);

    assert_eq!(
        base.load(json!(0), &TypeKey::new("A")).expect("loads"),
        json!("base"),
    );
    assert_eq!(
        extended.load(json!(0), &TypeKey::new("A")).expect("loads"),
        json!("extension"),
    );
}

#[test]
fn later_extensions_outrank_earlier_ones() {
    let base = Retort::builder()
        .provider(Arc::new(LoaderProvider::for_type(TypeKey::new("A"), |_| {
            Ok(json!("base"))
        })))
        .build();
    let first = base.extend([Arc::new(LoaderProvider::for_type(TypeKey::new("A"), |_| {
        Ok(json!("first extension"))
    })) as DynProvider]);
    let second = first.extend([Arc::new(LoaderProvider::for_type(
        TypeKey::new("A"),
        |_| Ok(json!("second extension")),
    )) as DynProvider]);

    assert_eq!(
        second.load(json!(0), &TypeKey::new("A")).expect("loads"),
        json!("second extension"),
    );
    // earlier instances are unaffected
    assert_eq!(
        first.load(json!(0), &TypeKey::new("A")).expect("loads"),
        json!("first extension"),
    );
    assert_eq!(
        base.load(json!(0), &TypeKey::new("A")).expect("loads"),
        json!("base"),
    );
}

#[test]
fn replace_changes_options_without_touching_the_original() {
    let base = Retort::builder().strict_coercion(true).build();
    let lenient = base.replace(RetortOptions {
        strict_coercion: Some(false),
        ..RetortOptions::default()
    });

    assert!(base.strict_coercion());
    assert!(!lenient.strict_coercion());
    assert_eq!(base.depth_limit(), lenient.depth_limit());
}
