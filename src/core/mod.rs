//! Core types shared across the resolution pipeline
//!
//! This module holds the error taxonomy of the engine and the [`Token`]
//! machinery used for the three opaque, comparable values that flow through
//! a resolution: the backing-store source identity, its version, and the
//! caller-supplied custom lookup condition.
//!
//! # Error Design
//!
//! The engine distinguishes sharply between "missing" and "failed":
//!
//! - A missing template is **not** an error. It is reported through
//!   [`MissingTemplateInfo`](crate::resolver::MissingTemplateInfo) and
//!   memoized in the cache like any positive outcome.
//! - A failed load/parse **is** an error ([`ResolveError`]), also memoized,
//!   and replayed on subsequent calls within the freshness window wrapped
//!   as [`ResolveError::PreviousAttemptFailed`] so callers can tell a live
//!   failure from a cached one.
//!
//! Memoized errors are shared between the cache and every replaying caller
//! via [`SharedResolveError`], a cheaply cloneable handle that still
//! participates in `std::error::Error` source chains.

pub mod error;
mod token;

pub use error::{MalformedNameError, ResolveError, SharedResolveError};
pub use token::{Token, token_opt_eq};
