use crate::BoxError;

/// Selects how a freshly constructed instance interprets its initial
/// placement relative to the parent context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Placement {
    /// Initial placement is taken in world space.
    World,
    /// Initial placement is relative to the parent context.
    #[default]
    Local,
}

/// A trait defining the interface for a pool allocator.
///
/// The allocator constructs instances attached to a parent context and
/// destroys them once the pool releases them for good. The pool never
/// retries a failing allocator; failures surface as
/// [`PoolError::Factory`](crate::PoolError::Factory).
pub trait PoolAllocator<T> {
    /// Context every constructed instance is attached to.
    type Parent;

    /// Creates a new object of type T attached to `parent`.
    fn allocate(&self, parent: &Self::Parent, placement: Placement) -> Result<T, BoxError>;

    /// Permanently releases an object.
    ///
    /// By default, this method drops the object. Implementations must treat
    /// an object whose underlying resource is already gone as a no-op.
    #[inline(always)]
    fn destroy(&self, obj: T) -> Result<(), BoxError> {
        drop(obj);
        Ok(())
    }

    /// Validates that an object is a live handle that may be stored back in
    /// the pool.
    ///
    /// By default, this method always returns true. Override this method to
    /// reject null or already destroyed handles.
    #[inline(always)]
    fn is_valid(&self, _obj: &T) -> bool {
        true
    }
}
