//! Opaque comparable values.
//!
//! Source identities, versions, and custom lookup conditions are all
//! loader- or caller-defined types the engine only ever compares and
//! hashes. [`Token`] erases them behind one object-safe trait while keeping
//! type-correct equality: two tokens are equal only if they have the same
//! concrete type and compare equal as that type.

use std::any::{Any, TypeId};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// An opaque, comparable, hashable value.
///
/// Implemented automatically for every `'static` type that is
/// `Debug + Eq + Hash + Send + Sync`, so loaders and callers use their own
/// plain types (paths, strings, integers, struct fingerprints) and hand
/// them to the engine as `Arc<dyn Token>`.
pub trait Token: Any + fmt::Debug + Send + Sync {
    /// Upcast used by [`token_eq`](Token::token_eq) to downcast the peer.
    fn as_any(&self) -> &dyn Any;

    /// Type-aware equality: `false` whenever `other` has a different
    /// concrete type.
    fn token_eq(&self, other: &dyn Token) -> bool;

    /// Hash consistent with [`token_eq`](Token::token_eq); the concrete
    /// type is mixed in so values of different types rarely collide.
    fn token_hash(&self) -> u64;
}

impl<T> Token for T
where
    T: Any + fmt::Debug + Eq + Hash + Send + Sync,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn token_eq(&self, other: &dyn Token) -> bool {
        other.as_any().downcast_ref::<T>().is_some_and(|other| self == other)
    }

    fn token_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        TypeId::of::<T>().hash(&mut hasher);
        self.hash(&mut hasher);
        hasher.finish()
    }
}

/// Null-safe equality over optional shared tokens.
pub fn token_opt_eq(a: Option<&Arc<dyn Token>>, b: Option<&Arc<dyn Token>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.token_eq(b.as_ref()),
        _ => false,
    }
}
