//! End-to-end probe ordering: locale fallback and `*` acquisition
//!
//! Asserted through the in-memory loader's probe log, so these tests pin
//! the exact candidate sequence the default strategy sends to the backing
//! store.

use std::sync::Arc;

use stencil::locale::Locale;
use stencil::loader::memory::MemoryTemplateLoader;

use crate::common::builder_with;

fn locale(value: &str) -> Locale {
    value.parse().unwrap()
}

#[test]
fn test_locale_fallback_probe_order() {
    let loader = Arc::new(MemoryTemplateLoader::new());
    let resolver = builder_with(Arc::clone(&loader)).build();

    let result = resolver
        .get_template("msg.t", Some(&locale("en_US_POSIX")), None)
        .unwrap();
    assert!(!result.is_found());
    assert_eq!(
        loader.probed_names(),
        vec!["msg_en_US_POSIX.t", "msg_en_US.t", "msg_en.t", "msg.t"]
    );
}

#[test]
fn test_locale_fallback_stops_at_first_hit() {
    let loader = Arc::new(MemoryTemplateLoader::new());
    loader.put_template("msg_en.t", "hello");
    loader.put_template("msg.t", "fallback");
    let resolver = builder_with(Arc::clone(&loader)).build();

    let result = resolver.get_template("msg.t", Some(&locale("en_US")), None).unwrap();
    let template = result.template().unwrap();
    assert_eq!(template.body(), "hello");
    assert_eq!(template.source_name(), "msg_en.t");
    assert_eq!(template.name(), "msg.t");
    assert_eq!(loader.probed_names(), vec!["msg_en_US.t", "msg_en.t"]);
}

#[test]
fn test_disabled_localized_lookup_probes_plain_name_only() {
    let loader = Arc::new(MemoryTemplateLoader::new());
    loader.put_template("msg.t", "plain");
    let resolver = builder_with(Arc::clone(&loader)).localized_lookup(false).build();

    let result = resolver.get_template("msg.t", Some(&locale("en_US")), None).unwrap();
    assert_eq!(result.template().unwrap().body(), "plain");
    assert_eq!(loader.probed_names(), vec!["msg.t"]);
}

/// With localized lookup disabled the locale still partitions the cache,
/// so re-enabling it later cannot serve a wrong-locale template.
#[test]
fn test_locale_stays_in_cache_key_when_lookup_disabled() {
    let loader = Arc::new(MemoryTemplateLoader::new());
    loader.put_template("msg.t", "plain");
    let resolver = builder_with(Arc::clone(&loader)).localized_lookup(false).build();

    resolver.get_template("msg.t", Some(&locale("en")), None).unwrap();
    loader.clear_probe_log();
    resolver.get_template("msg.t", Some(&locale("de")), None).unwrap();
    // Different locale, different cache entry, fresh probe.
    assert_eq!(loader.probed_names(), vec!["msg.t"]);
}

#[test]
fn test_acquisition_climbs_toward_the_root() {
    let loader = Arc::new(MemoryTemplateLoader::new());
    loader.put_template("app/footer.t", "footer");
    let resolver = builder_with(Arc::clone(&loader)).build();

    let result = resolver.get_template("app/sub/deep/*/footer.t", None, None).unwrap();
    let template = result.template().unwrap();
    assert_eq!(template.source_name(), "app/footer.t");
    assert_eq!(
        loader.probed_names(),
        vec!["app/sub/deep/footer.t", "app/sub/footer.t", "app/footer.t"]
    );
}

#[test]
fn test_acquisition_combined_with_locale_fallback() {
    let loader = Arc::new(MemoryTemplateLoader::new());
    loader.put_template("footer_en.t", "footer");
    let resolver = builder_with(Arc::clone(&loader)).build();

    let result = resolver
        .get_template("app/*/footer.t", Some(&locale("en")), None)
        .unwrap();
    assert_eq!(result.template().unwrap().source_name(), "footer_en.t");
    // Full acquisition climb for the "_en" candidate first, then the hit.
    assert_eq!(loader.probed_names(), vec!["app/footer_en.t", "footer_en.t"]);
}

#[test]
fn test_lookup_locale_recorded_on_template() {
    let loader = Arc::new(MemoryTemplateLoader::new());
    loader.put_template("msg_de.t", "hallo");
    let resolver = builder_with(Arc::clone(&loader)).build();

    let result = resolver.get_template("msg.t", Some(&locale("de_DE")), None).unwrap();
    let template = result.template().unwrap();
    assert_eq!(template.lookup_locale(), Some(&locale("de_DE")));
}

/// Of several `*` steps only the last one drives climbing; the loader
/// sees one climb, not two.
#[test]
fn test_only_last_star_drives_climbing() {
    let loader = Arc::new(MemoryTemplateLoader::new());
    let resolver = builder_with(Arc::clone(&loader)).build();

    resolver.get_template("a/*/b/*/c.t", None, None).unwrap();
    assert_eq!(loader.probed_names(), vec!["a/b/c.t", "a/c.t", "c.t"]);
}
