//! Concurrent access to one resolver
//!
//! The engine promises no single-flight: racing callers may load the same
//! template redundantly, and the last finished attempt owns the cache
//! entry. What it does promise is that every caller gets a complete,
//! consistent outcome, and that once an entry is fresh, readers share one
//! template instance without further backing-store traffic.

use std::sync::Arc;
use std::thread;

use stencil::loader::memory::MemoryTemplateLoader;

use crate::common::builder_with;

#[test]
fn test_racing_callers_all_resolve() {
    let loader = Arc::new(MemoryTemplateLoader::new());
    loader.put_template("page.t", "body");
    let resolver = Arc::new(builder_with(Arc::clone(&loader)).build());

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let resolver = Arc::clone(&resolver);
            thread::spawn(move || {
                let result = resolver.get_template("page.t", None, None).unwrap();
                result.template().unwrap().body().to_string()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), "body");
    }

    // After the race settles, the entry is fresh and shared.
    loader.clear_probe_log();
    let first = resolver.get_template("page.t", None, None).unwrap();
    let second = resolver.get_template("page.t", None, None).unwrap();
    assert!(Arc::ptr_eq(first.template().unwrap(), second.template().unwrap()));
    assert_eq!(loader.load_call_count(), 0);
}

#[test]
fn test_concurrent_distinct_names_do_not_interfere() {
    let loader = Arc::new(MemoryTemplateLoader::new());
    for i in 0..8 {
        loader.put_template(format!("t{i}.t"), format!("body {i}"));
    }
    let resolver = Arc::new(builder_with(Arc::clone(&loader)).build());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let resolver = Arc::clone(&resolver);
            thread::spawn(move || {
                for _ in 0..50 {
                    let result =
                        resolver.get_template(&format!("t{i}.t"), None, None).unwrap();
                    assert_eq!(result.template().unwrap().body(), format!("body {i}"));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // Each name was loaded at least once; fresh hits capped the rest.
    assert!(loader.load_call_count() >= 8);
    assert!(loader.load_call_count() <= 8 * 2);
}

#[test]
fn test_concurrent_misses_converge_to_memoized_miss() {
    let loader = Arc::new(MemoryTemplateLoader::new());
    let resolver = Arc::new(builder_with(Arc::clone(&loader)).build());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let resolver = Arc::clone(&resolver);
            thread::spawn(move || {
                !resolver.get_template("ghost.t", None, None).unwrap().is_found()
            })
        })
        .collect();
    for handle in handles {
        assert!(handle.join().unwrap());
    }

    let probes = loader.load_call_count();
    resolver.get_template("ghost.t", None, None).unwrap();
    assert_eq!(loader.load_call_count(), probes);
}
