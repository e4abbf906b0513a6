//! End-to-end caching behavior of the resolution engine
//!
//! Covers the freshness window, negative memoization, the "not modified"
//! short-circuit, failure memoization and replay, and the cache
//! maintenance operations.

use std::sync::Arc;
use std::time::Duration;

use stencil::core::{ResolveError, Token};
use stencil::loader::memory::MemoryTemplateLoader;
use stencil::resolver::{GetTemplateResult, TemplateResolver};

use crate::common::{CountingParser, FailingLoader, builder_with};

/// Within the freshness window the backing store must not be touched at
/// all, not even for an up-to-date check.
#[test]
fn test_fresh_entry_is_served_without_any_probe() {
    let loader = Arc::new(MemoryTemplateLoader::new());
    loader.put_template("page.t", "body");
    let resolver = builder_with(Arc::clone(&loader)).build();

    resolver.get_template("page.t", None, None).unwrap();
    loader.clear_probe_log();

    let result = resolver.get_template("page.t", None, None).unwrap();
    assert!(result.is_found());
    assert_eq!(loader.load_call_count(), 0);
}

/// A confirmed miss is memoized like a hit; repeat requests within the
/// window cost zero probes.
#[test]
fn test_missing_outcome_is_memoized() {
    let loader = Arc::new(MemoryTemplateLoader::new());
    let resolver = builder_with(Arc::clone(&loader)).build();

    assert!(!resolver.get_template("nope.t", None, None).unwrap().is_found());
    let probes_first = loader.load_call_count();
    assert!(probes_first > 0);

    assert!(!resolver.get_template("nope.t", None, None).unwrap().is_found());
    assert_eq!(loader.load_call_count(), probes_first);
}

/// An expired entry whose backing artifact is unchanged refreshes the
/// cache without reparsing, and keeps handing out the same instance.
#[test]
fn test_not_modified_skips_the_parser() {
    let loader = Arc::new(MemoryTemplateLoader::new());
    loader.put_template("page.t", "body");
    let parser = CountingParser::new();
    let resolver = builder_with(Arc::clone(&loader))
        .freshness_window(Duration::ZERO)
        .parser(parser.clone())
        .build();

    let first = resolver.get_template("page.t", None, None).unwrap();
    assert_eq!(parser.calls(), 1);

    // Window is zero, so this re-checks the store; the store answers
    // "not modified".
    let second = resolver.get_template("page.t", None, None).unwrap();
    assert_eq!(parser.calls(), 1);
    assert!(Arc::ptr_eq(first.template().unwrap(), second.template().unwrap()));
}

/// A changed backing artifact is reparsed into a new instance once the
/// entry expires.
#[test]
fn test_changed_artifact_is_reloaded() {
    let loader = Arc::new(MemoryTemplateLoader::new());
    loader.put_template("page.t", "v1");
    let parser = CountingParser::new();
    let resolver = builder_with(Arc::clone(&loader))
        .freshness_window(Duration::ZERO)
        .parser(parser.clone())
        .build();

    let first = resolver.get_template("page.t", None, None).unwrap();
    loader.put_template("page.t", "v2");
    let second = resolver.get_template("page.t", None, None).unwrap();

    assert_eq!(parser.calls(), 2);
    assert_eq!(second.template().unwrap().body(), "v2");
    assert!(!Arc::ptr_eq(first.template().unwrap(), second.template().unwrap()));
}

/// A failed attempt is memoized; within the window the error is replayed
/// without touching the backing store, wrapped so the caller can tell it
/// is a replay and can still reach the original cause.
#[test]
fn test_failure_is_memoized_and_replayed_with_cause() {
    let loader = FailingLoader::new();
    let resolver = TemplateResolver::builder(loader.clone())
        .freshness_window(crate::common::LONG_WINDOW)
        .build();

    let first = resolver.get_template("page.t", None, None).unwrap_err();
    assert!(first.to_string().contains("I/O error"));
    assert_eq!(loader.calls(), 1);

    let replayed = resolver.get_template("page.t", None, None).unwrap_err();
    assert_eq!(loader.calls(), 1);
    match &replayed {
        ResolveError::PreviousAttemptFailed { name, .. } => assert_eq!(name, "page.t"),
        other => panic!("expected replayed failure, got {other:?}"),
    }
    let cause = replayed.earlier_cause().expect("original failure reachable");
    assert_eq!(cause.to_string(), first.to_string());
}

/// `remove_from_cache` forces the next request back to the backing store.
#[test]
fn test_remove_from_cache_forces_recheck() {
    let loader = Arc::new(MemoryTemplateLoader::new());
    loader.put_template("page.t", "v1");
    let resolver = builder_with(Arc::clone(&loader)).build();

    resolver.get_template("page.t", None, None).unwrap();
    loader.put_template("page.t", "v2");

    // Still fresh, so the old body is served.
    assert_eq!(
        resolver.get_template("page.t", None, None).unwrap().template().unwrap().body(),
        "v1"
    );

    resolver.remove_from_cache("page.t", None, None).unwrap();
    assert_eq!(
        resolver.get_template("page.t", None, None).unwrap().template().unwrap().body(),
        "v2"
    );
}

/// `clear_cache` empties everything, and resets loader state only when
/// asked to.
#[test]
fn test_clear_cache_drops_all_entries() {
    let loader = Arc::new(MemoryTemplateLoader::new());
    loader.put_template("a.t", "v1");
    loader.put_template("b.t", "v1");
    let resolver = builder_with(Arc::clone(&loader)).build();

    resolver.get_template("a.t", None, None).unwrap();
    resolver.get_template("b.t", None, None).unwrap();
    loader.put_template("a.t", "v2");

    resolver.clear_cache(false);
    assert_eq!(loader.reset_call_count(), 0);
    assert_eq!(
        resolver.get_template("a.t", None, None).unwrap().template().unwrap().body(),
        "v2"
    );

    resolver.clear_cache(true);
    assert_eq!(loader.reset_call_count(), 1);
}

/// Requests differing only in the custom lookup condition resolve to
/// separate cache entries; equal condition values share one.
#[test]
fn test_custom_condition_partitions_the_cache() {
    let loader = Arc::new(MemoryTemplateLoader::new());
    loader.put_template("page.t", "body");
    let parser = CountingParser::new();
    let resolver = builder_with(Arc::clone(&loader))
        .parser(parser.clone())
        .build();

    let mobile = resolver
        .get_template("page.t", None, Some(Arc::new("mobile".to_string())))
        .unwrap();
    let desktop = resolver
        .get_template("page.t", None, Some(Arc::new("desktop".to_string())))
        .unwrap();
    assert_eq!(parser.calls(), 2);
    assert!(!Arc::ptr_eq(mobile.template().unwrap(), desktop.template().unwrap()));

    // Same condition value again: served from cache.
    let mobile_again = resolver
        .get_template("page.t", None, Some(Arc::new("mobile".to_string())))
        .unwrap();
    assert_eq!(parser.calls(), 2);
    assert!(Arc::ptr_eq(mobile.template().unwrap(), mobile_again.template().unwrap()));

    // The condition is recorded on the resolved template.
    let condition = mobile.template().unwrap().custom_lookup_condition().unwrap();
    assert!(condition.token_eq(&"mobile".to_string() as &dyn Token));
}

/// Names are normalized before keying, so equivalent spellings share one
/// cache entry.
#[test]
fn test_equivalent_names_share_an_entry() {
    let loader = Arc::new(MemoryTemplateLoader::new());
    loader.put_template("a/b/page.t", "body");
    let parser = CountingParser::new();
    let resolver = builder_with(Arc::clone(&loader))
        .parser(parser.clone())
        .build();

    let plain = resolver.get_template("a/b/page.t", None, None).unwrap();
    let dotted = resolver.get_template("a/./b/x/../page.t", None, None).unwrap();
    assert_eq!(parser.calls(), 1);
    assert!(Arc::ptr_eq(plain.template().unwrap(), dotted.template().unwrap()));
}

/// Missing results report the normalized name.
#[test]
fn test_missing_info_carries_normalized_name() {
    let loader = Arc::new(MemoryTemplateLoader::new());
    let resolver = builder_with(loader).build();
    match resolver.get_template("a/./missing.t", None, None).unwrap() {
        GetTemplateResult::Missing(info) => assert_eq!(info.name, "a/missing.t"),
        other => panic!("expected missing, got {other:?}"),
    }
}
