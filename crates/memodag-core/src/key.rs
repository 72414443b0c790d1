//! Vertex key policies.
//!
//! A key policy maps a payload to the comparable *vertex key* the engine uses
//! as the canonical identity: duplicate detection, adjacency indexing, and
//! reachability caching are all keyed by it. The policy is captured by value
//! at graph construction and must be pure -- two payloads mapped to equal
//! keys are treated as the same vertex for the lifetime of the graph.

use std::hash::Hash;

/// Derives the canonical key of a payload.
///
/// The associated `Key` is the map key of every internal index, so it has to
/// be cheap to clone and hashable. There is deliberately no way to swap the
/// policy of a live graph; it is fixed by the type of the [`Dag`] instance.
///
/// [`Dag`]: crate::Dag
pub trait KeyPolicy<T> {
    /// The comparable key type derived from payloads.
    type Key: Clone + Eq + Hash + Send + Sync;

    /// Derives the key of `payload`. Must be pure.
    fn key_of(&self, payload: &T) -> Self::Key;
}

/// Default policy: the payload is its own key.
///
/// Two payloads that compare equal are the same vertex, which matches the
/// behaviour most callers expect for value-like payloads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PayloadKey;

impl<T> KeyPolicy<T> for PayloadKey
where
    T: Clone + Eq + Hash + Send + Sync,
{
    type Key = T;

    fn key_of(&self, payload: &T) -> T {
        payload.clone()
    }
}

/// Caller-supplied policy wrapping a pure key-derivation function.
///
/// Useful when the payload itself is not hashable, or when only part of the
/// payload determines vertex identity:
///
/// ```
/// use memodag_core::{Dag, KeyFn};
///
/// #[derive(Clone)]
/// struct Job { name: String, attempts: u32 }
///
/// let dag: Dag<Job, _> = Dag::with_policy(KeyFn(|job: &Job| job.name.clone()));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct KeyFn<F>(pub F);

impl<T, K, F> KeyPolicy<T> for KeyFn<F>
where
    K: Clone + Eq + Hash + Send + Sync,
    F: Fn(&T) -> K,
{
    type Key = K;

    fn key_of(&self, payload: &T) -> K {
        (self.0)(payload)
    }
}
