use core::fmt;
use thiserror::Error;

/// Boxed error produced by a [`PoolAllocator`](crate::PoolAllocator).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors returned by pool operations.
#[derive(Debug, Error)]
pub enum PoolError {
    /// An argument was null, invalid or out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Accepting the instance would grow the idle pool past its bound.
    #[error("idle pool is full (max {max_idle} instances)")]
    CapacityExceeded {
        /// Configured idle bound.
        max_idle: usize,
    },

    /// The allocator failed to construct or destroy an instance.
    #[error("allocator failed")]
    Factory(#[source] BoxError),

    /// A suspending operation observed its cancellation token.
    #[error("operation cancelled")]
    Cancelled,

    /// A background pool task was torn down from outside, without its
    /// cancellation token firing.
    #[error("pool task aborted")]
    Aborted,

    /// Pool or shrink configuration is not usable.
    #[error("invalid configuration: {0}")]
    Configuration(String),
}

/// An instance the pool refused to take back, together with the reason.
///
/// Returned by [`LocalPool::give_back`](crate::LocalPool::give_back) so the
/// caller keeps ownership of the rejected instance.
pub struct Rejected<T> {
    reason: PoolError,
    instance: T,
}

impl<T> Rejected<T> {
    pub(crate) fn new(reason: PoolError, instance: T) -> Self {
        Self { reason, instance }
    }

    /// Why the instance was rejected.
    pub fn reason(&self) -> &PoolError {
        &self.reason
    }

    /// Recovers the rejected instance.
    pub fn into_inner(self) -> T {
        self.instance
    }

    /// Splits into the reason and the rejected instance.
    pub fn into_parts(self) -> (PoolError, T) {
        (self.reason, self.instance)
    }
}

impl<T> From<Rejected<T>> for PoolError {
    fn from(rejected: Rejected<T>) -> Self {
        rejected.reason
    }
}

impl<T> fmt::Debug for Rejected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rejected")
            .field("reason", &self.reason)
            .finish_non_exhaustive()
    }
}

impl<T> fmt::Display for Rejected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "instance rejected by pool: {}", self.reason)
    }
}

impl<T> std::error::Error for Rejected<T> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.reason)
    }
}
