//! Charset handling for byte-content backing stores
//!
//! Byte content is decoded once with the effective charset (per-template
//! override, else the resolver default). When the parser reports that the
//! content declares a different charset, the same buffered bytes are
//! re-decoded with the declared one and parsed again, exactly once.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use stencil::core::ResolveError;
use stencil::loader::memory::MemoryTemplateLoader;
use stencil::template::{
    ParseError, ParseRequest, Template, TemplateOptions, TemplateParser, encoding_for_label,
};

use crate::common::builder_with;

/// A parser that honors a `#charset <label>` directive on the first line,
/// the way a real template language embeds its encoding declaration.
#[derive(Debug, Default)]
struct CharsetDeclaringParser {
    calls: AtomicUsize,
}

impl CharsetDeclaringParser {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TemplateParser for CharsetDeclaringParser {
    fn parse(&self, request: ParseRequest<'_>) -> Result<Template, ParseError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (body, declared) = match request.text.strip_prefix("#charset ") {
            Some(rest) => {
                let (label, body) = rest.split_once('\n').unwrap_or((rest, ""));
                (body, Some(label.trim().to_string()))
            }
            None => (request.text, None),
        };
        if let Some(label) = declared {
            let declared_encoding = encoding_for_label(&label)
                .ok_or_else(|| ParseError::fatal(anyhow::anyhow!("unknown charset {label:?}")))?;
            if request.charset != Some(declared_encoding) {
                return Err(ParseError::WrongCharset { declared: label });
            }
        }
        Ok(Template::new(request.name, request.source_name, body, request.language))
    }
}

#[test]
fn test_bytes_decoded_with_default_charset() {
    let loader = Arc::new(MemoryTemplateLoader::new());
    loader.put_template_bytes("page.t", "héllo".as_bytes().to_vec());
    let resolver = builder_with(Arc::clone(&loader)).build();

    let result = resolver.get_template("page.t", None, None).unwrap();
    assert_eq!(result.template().unwrap().body(), "héllo");
}

/// A source-level charset override beats the resolver default.
#[test]
fn test_per_template_charset_override() {
    let loader = Arc::new(MemoryTemplateLoader::new());
    // "é" in latin-1 is the single byte 0xE9, invalid as UTF-8.
    loader.put_template_bytes_with_options(
        "page.t",
        vec![b'h', 0xE9],
        TemplateOptions { charset: Some("iso-8859-1".to_string()), ..TemplateOptions::default() },
    );
    let resolver = builder_with(Arc::clone(&loader)).build();

    let result = resolver.get_template("page.t", None, None).unwrap();
    assert_eq!(result.template().unwrap().body(), "hé");
}

#[test]
fn test_wrong_charset_triggers_exactly_one_redecode() {
    let loader = Arc::new(MemoryTemplateLoader::new());
    // Latin-1 bytes declaring their own charset; the directive itself is
    // ASCII so it survives the initial UTF-8 (lossy) decode.
    let mut bytes = b"#charset iso-8859-1\nh".to_vec();
    bytes.push(0xE9);
    loader.put_template_bytes("page.t", bytes);

    let parser = CharsetDeclaringParser::new();
    let resolver = builder_with(Arc::clone(&loader)).parser(parser.clone()).build();

    let result = resolver.get_template("page.t", None, None).unwrap();
    assert_eq!(result.template().unwrap().body(), "hé");
    // One failed parse with the default charset, one successful re-parse.
    assert_eq!(parser.calls(), 2);
}

#[test]
fn test_matching_declared_charset_needs_no_retry() {
    let loader = Arc::new(MemoryTemplateLoader::new());
    loader.put_template_bytes("page.t", b"#charset utf-8\nhello".to_vec());

    let parser = CharsetDeclaringParser::new();
    let resolver = builder_with(Arc::clone(&loader)).parser(parser.clone()).build();

    let result = resolver.get_template("page.t", None, None).unwrap();
    assert_eq!(result.template().unwrap().body(), "hello");
    assert_eq!(parser.calls(), 1);
}

#[test]
fn test_unsupported_default_charset_fails_resolution() {
    let loader = Arc::new(MemoryTemplateLoader::new());
    loader.put_template_bytes("page.t", b"hello".to_vec());
    let resolver = builder_with(Arc::clone(&loader))
        .default_charset("klingon-1")
        .build();

    let error = resolver.get_template("page.t", None, None).unwrap_err();
    match &error {
        ResolveError::Shared(shared) => match shared.inner() {
            ResolveError::UnsupportedCharset { charset, .. } => {
                assert_eq!(charset, "klingon-1");
            }
            other => panic!("expected unsupported charset, got {other:?}"),
        },
        other => panic!("expected shared error, got {other:?}"),
    }
}

/// Character content cannot be re-decoded, so a charset declaration
/// mismatch there is a parse failure, not a retry.
#[test]
fn test_text_content_cannot_redecode() {
    let loader = Arc::new(MemoryTemplateLoader::new());
    loader.put_template("page.t", "#charset iso-8859-1\nhi");

    let parser = CharsetDeclaringParser::new();
    let resolver = builder_with(Arc::clone(&loader)).parser(parser.clone()).build();

    let error = resolver.get_template("page.t", None, None).unwrap_err();
    assert!(error.to_string().contains("parse"));
    assert_eq!(parser.calls(), 1);
}
