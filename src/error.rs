use thiserror::Error;

/// An invalid [`HashMapBuilder`](crate::HashMapBuilder) configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
    /// The load factor was outside of `(0, 1]`.
    #[error("load factor must be in (0, 1], found {0}")]
    LoadFactor(f64),

    /// The growth factor was less than 2.
    #[error("growth factor must be at least 2, found {0}")]
    GrowthFactor(usize),

    /// The copy chunk was zero.
    #[error("copy chunk must be non-zero")]
    CopyChunk,

    /// The reprobe limit was zero.
    #[error("reprobe limit must be non-zero")]
    ReprobeLimit,

    /// The initial capacity cannot be allocated.
    #[error("capacity of {0} entries exceeds the maximum table size")]
    Capacity(usize),
}
