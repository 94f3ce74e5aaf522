//! Inheritance-aware overlay resolution driven through a full retort.

use std::sync::Arc;

use retort::{
    BoundingProvider, CannotProvide, Chain, DynProvider, Mediator, OverlayKey, OverlayProvider,
    OverlaySpec, OverlayValue, ProvideError, Provider, Request, RequestClass, RequestKind,
    ResolveError, Resolved, Retort, StaticIntrospector, TypeChecker, TypeKey, provide_schema,
};
use serde_json::{Value, json};

fn title_spec() -> Arc<OverlaySpec> {
    Arc::new(OverlaySpec::new(
        OverlayKey::new("title_style"),
        ["prefix", "suffix"],
    ))
}

/// Probe rule: answers loader requests by resolving the `title_style`
/// schema for the located type and baking it into the converter.
#[derive(Debug)]
struct TitleStyleProbe {
    spec: Arc<OverlaySpec>,
}

impl Provider for TitleStyleProbe {
    fn attempt(
        &self,
        mediator: &Mediator<'_>,
        request: &Request,
    ) -> Result<Resolved, ProvideError> {
        if !matches!(request.kind(), RequestKind::Loader) {
            return Err(CannotProvide::new("only provides loaders").into());
        }
        let schema = provide_schema(&self.spec, mediator, request.loc_map())?;
        let prefix = schema.get("prefix").cloned().unwrap_or(Value::Null);
        let suffix = schema.get("suffix").cloned().unwrap_or(Value::Null);
        Ok(Resolved::Loader(Arc::new(move |_| {
            Ok(json!({ "prefix": prefix, "suffix": suffix }))
        })))
    }

    fn maybe_can_handle(&self, class: RequestClass) -> bool {
        class == RequestClass::Loader
    }
}

fn overlay_rule(spec: &Arc<OverlaySpec>, ty: &str, value: OverlayValue) -> DynProvider {
    Arc::new(BoundingProvider::new(
        Arc::new(TypeChecker::new(TypeKey::new(ty))),
        Arc::new(OverlayProvider::new(
            None,
            [(Arc::clone(spec), value)],
        )),
    ))
}

fn inheritance_retort(spec: &Arc<OverlaySpec>, derived: OverlayValue, base: OverlayValue) -> Retort {
    let introspector =
        StaticIntrospector::new().with_ancestors(TypeKey::new("Derived"), [TypeKey::new("Base")]);
    Retort::builder()
        .provider(overlay_rule(spec, "Derived", derived))
        .provider(overlay_rule(spec, "Base", base))
        .provider(Arc::new(TitleStyleProbe {
            spec: Arc::clone(spec),
        }))
        .introspector(Arc::new(introspector))
        .build()
}

#[test]
fn omitted_fields_are_inherited_from_the_nearest_ancestor() {
    let spec = title_spec();
    let derived = spec.empty_overlay().with_field("prefix", json!(">>"));
    let base = spec
        .empty_overlay()
        .with_field("prefix", json!("--"))
        .with_field("suffix", json!("!"));
    let retort = inheritance_retort(&spec, derived, base);

    let loaded = retort
        .load(json!(null), &TypeKey::new("Derived"))
        .expect("schema resolves");
    // derived's prefix wins; the omitted suffix is inherited from Base
    assert_eq!(loaded, json!({"prefix": ">>", "suffix": "!"}));
}

#[test]
fn custom_merger_combines_ancestor_and_derived_values() {
    let spec = Arc::new(
        OverlaySpec::new(OverlayKey::new("title_style"), ["prefix", "suffix"]).with_merger(
            "prefix",
            |old, new| {
                let old_text = old.as_str().unwrap_or_default();
                let new_text = new.as_str().unwrap_or_default();
                json!(format!("{old_text}{new_text}"))
            },
        ),
    );
    let derived = spec.empty_overlay().with_field("prefix", json!(">>"));
    let base = spec
        .empty_overlay()
        .with_field("prefix", json!("--"))
        .with_field("suffix", json!("!"));
    let retort = inheritance_retort(&spec, derived, base);

    let loaded = retort
        .load(json!(null), &TypeKey::new("Derived"))
        .expect("schema resolves");
    assert_eq!(loaded, json!({"prefix": "-->>", "suffix": "!"}));
}

#[test]
fn incomplete_overlays_fail_hard_instead_of_defaulting() {
    let spec = title_spec();
    // no ancestor supplies `suffix`
    let derived = spec.empty_overlay().with_field("prefix", json!(">>"));
    let retort = Retort::builder()
        .provider(overlay_rule(&spec, "Derived", derived))
        .provider(Arc::new(TitleStyleProbe {
            spec: Arc::clone(&spec),
        }))
        .build();

    match retort.get_loader(&TypeKey::new("Derived")) {
        Err(ResolveError::IncompleteOverlay {
            overlay, fields, ..
        }) => {
            assert_eq!(overlay, "title_style");
            assert_eq!(fields, vec!["suffix".to_owned()]);
        }
        Ok(_) => panic!("expected IncompleteOverlay, got Ok(loader)"),
        Err(other) => panic!("expected IncompleteOverlay, got {other:?}"),
    }
}

#[test]
fn ancestors_without_an_overlay_are_skipped_silently() {
    let spec = title_spec();
    let derived = spec
        .empty_overlay()
        .with_field("prefix", json!(">>"))
        .with_field("suffix", json!("?"));
    let introspector = StaticIntrospector::new().with_ancestors(
        TypeKey::new("Derived"),
        [TypeKey::new("Unregistered"), TypeKey::new("AlsoMissing")],
    );
    let retort = Retort::builder()
        .provider(overlay_rule(&spec, "Derived", derived))
        .provider(Arc::new(TitleStyleProbe {
            spec: Arc::clone(&spec),
        }))
        .introspector(Arc::new(introspector))
        .build();

    let loaded = retort
        .load(json!(null), &TypeKey::new("Derived"))
        .expect("missing ancestors are optional sources");
    assert_eq!(loaded, json!({"prefix": ">>", "suffix": "?"}));
}

#[test]
fn chained_overlay_providers_merge_across_recipe_positions() {
    let spec = title_spec();
    // the chained layer sits earlier in the recipe and wins conflicts,
    // while fields it omits fall through to the later layer
    let chained = Arc::new(OverlayProvider::new(
        Some(Chain::First),
        [(
            Arc::clone(&spec),
            spec.empty_overlay().with_field("prefix", json!("#")),
        )],
    ));
    let plain = Arc::new(OverlayProvider::new(
        None,
        [(
            Arc::clone(&spec),
            spec.empty_overlay()
                .with_field("prefix", json!("--"))
                .with_field("suffix", json!(".")),
        )],
    ));
    let retort = Retort::builder()
        .provider(chained)
        .provider(plain)
        .provider(Arc::new(TitleStyleProbe {
            spec: Arc::clone(&spec),
        }))
        .build();

    let loaded = retort
        .load(json!(null), &TypeKey::new("Anything"))
        .expect("chained overlay resolves");
    assert_eq!(loaded, json!({"prefix": "#", "suffix": "."}));
}
