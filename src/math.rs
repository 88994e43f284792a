//! Aliases for the hashing collections used across the crate.

/// Map keyed by a fast non-cryptographic hash. Iteration order is never
/// relied upon; everything order-sensitive goes through sorted sets.
pub type Map<K, V> = fxhash::FxHashMap<K, V>;

/// Companion set type to [`Map`].
pub type Set<S> = fxhash::FxHashSet<S>;
