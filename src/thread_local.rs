use crate::{Placement, PoolAllocator, PoolConfig, PoolError, Rejected};
use core::{cell::RefCell, fmt, marker::PhantomData, time::Duration};
use std::rc::Rc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

type Hook<T> = Box<dyn Fn(&mut T)>;

/// A struct representing an object pool for the local thread, it cannot be
/// moved between threads.
///
/// Idle instances are kept on a stack: the most recently returned instance
/// is the next one rented. The pool never tracks rented instances; callers
/// own them until they hand them back with [`Self::give_back`].
///
/// Every operation is synchronous except [`Self::preload`] and
/// [`Self::shrink_loop`], which suspend at well defined points so other
/// local tasks sharing the pool through an [`Rc`] may interleave.
pub struct LocalPool<P: PoolAllocator<T>, T> {
    allocator: P,
    parent: P::Parent,
    config: PoolConfig,
    storage: RefCell<Vec<T>>,
    on_before_rent: Option<Hook<T>>,
    on_before_return: Option<Hook<T>>,
    // force the struct to be !Send
    _phantom: PhantomData<*mut usize>,
}

impl<P: PoolAllocator<T>, T> LocalPool<P, T> {
    /// Creates an unbounded pool with no hooks.
    ///
    /// The idle pool starts empty; no instance is constructed until the
    /// first [`Self::rent`] or [`Self::preload`].
    pub fn new(allocator: P, parent: P::Parent) -> Self {
        Self::from_parts(allocator, parent, PoolConfig::default(), None, None)
    }

    /// Creates a pool with the given configuration and no hooks.
    pub fn with_config(
        allocator: P,
        parent: P::Parent,
        config: PoolConfig,
    ) -> Result<Self, PoolError> {
        config.validate()?;
        Ok(Self::from_parts(allocator, parent, config, None, None))
    }

    /// Starts a [`LocalPoolBuilder`], the only way to install rent and return
    /// hooks.
    pub fn builder(allocator: P, parent: P::Parent) -> LocalPoolBuilder<P, T> {
        LocalPoolBuilder {
            allocator,
            parent,
            config: PoolConfig::default(),
            on_before_rent: None,
            on_before_return: None,
        }
    }

    fn from_parts(
        allocator: P,
        parent: P::Parent,
        config: PoolConfig,
        on_before_rent: Option<Hook<T>>,
        on_before_return: Option<Hook<T>>,
    ) -> Self {
        LocalPool {
            allocator,
            parent,
            config,
            storage: RefCell::new(Vec::new()),
            on_before_rent,
            on_before_return,
            _phantom: PhantomData,
        }
    }

    /// Wraps the pool with a reference counter so it can be shared between
    /// tasks of a [`tokio::task::LocalSet`] and drive
    /// [`Self::spawn_shrink_loop`].
    pub fn to_rc(self) -> Rc<Self> {
        Rc::new(self)
    }

    /// Gets the number of idle objects currently in the pool.
    pub fn len(&self) -> usize {
        self.storage.borrow().len()
    }

    /// Checks if the idle pool is empty.
    pub fn is_empty(&self) -> bool {
        self.storage.borrow().is_empty()
    }

    /// Gets the maximum number of idle objects the pool holds.
    ///
    /// This does not limit how many objects can be rented, only how many
    /// can wait in the pool. [`crate::UNBOUNDED`] means no limit.
    pub fn max_idle(&self) -> usize {
        self.config.max_idle
    }

    /// The context every new instance is attached to.
    pub fn parent(&self) -> &P::Parent {
        &self.parent
    }

    /// Placement used for every new instance.
    pub fn placement(&self) -> Placement {
        self.config.placement
    }

    /// Gets an object from the pool.
    ///
    /// Pops the most recently returned idle object, or constructs a new one
    /// through the allocator if the pool is empty. The before-rent hook runs
    /// on the object either way.
    ///
    /// Fails only when the allocator fails.
    pub fn rent(&self) -> Result<T, PoolError> {
        let popped = self.storage.borrow_mut().pop();
        let mut obj = match popped {
            Some(obj) => obj,
            None => self.construct()?,
        };
        self.before_rent(&mut obj);
        Ok(obj)
    }

    /// Puts an object back into the idle pool.
    ///
    /// Objects the allocator reports as invalid are rejected with
    /// [`PoolError::InvalidArgument`]; if the pool already holds
    /// [`Self::max_idle`] objects, the object is rejected with
    /// [`PoolError::CapacityExceeded`]. A rejected object is handed back
    /// inside [`Rejected`] and the pool is left untouched.
    pub fn give_back(&self, mut obj: T) -> Result<(), Rejected<T>> {
        if !self.allocator.is_valid(&obj) {
            warn!("rejected an invalid instance");
            return Err(Rejected::new(
                PoolError::InvalidArgument("instance is not a valid handle"),
                obj,
            ));
        }
        let max_idle = self.config.max_idle;
        if self.len() >= max_idle {
            warn!(max_idle, "rejected an instance, idle pool is full");
            return Err(Rejected::new(PoolError::CapacityExceeded { max_idle }, obj));
        }
        if let Some(hook) = &self.on_before_return {
            hook(&mut obj);
        }
        self.storage.borrow_mut().push(obj);
        Ok(())
    }

    /// Constructs `count` objects and places them in the idle pool.
    ///
    /// Objects are constructed in batches of `batch_size` and control is
    /// yielded to the scheduler between batches. The token is checked before
    /// every batch; on cancellation [`PoolError::Cancelled`] is returned and
    /// the objects already added stay in the pool.
    ///
    /// Other tasks may rent and return while this future is suspended, so
    /// preloading is not atomic with respect to other pool use.
    pub async fn preload(
        &self,
        count: usize,
        batch_size: usize,
        cancel: &CancellationToken,
    ) -> Result<(), PoolError> {
        if batch_size == 0 {
            return Err(PoolError::InvalidArgument("batch_size must be at least 1"));
        }
        debug!(count, batch_size, idle = self.len(), "preloading pool");

        let mut created = 0;
        while created < count {
            if cancel.is_cancelled() {
                debug!(created, count, "preload cancelled");
                return Err(PoolError::Cancelled);
            }
            let batch = batch_size.min(count - created);
            for _ in 0..batch {
                let obj = self.construct()?;
                if let Err(rejected) = self.give_back(obj) {
                    let (reason, obj) = rejected.into_parts();
                    self.destroy(obj)?;
                    return Err(reason);
                }
            }
            created += batch;
            if created < count {
                trace!(created, count, "yielding between preload batches");
                tokio::task::yield_now().await;
            }
        }

        debug!(created, idle = self.len(), "preload finished");
        Ok(())
    }

    /// Destroys every idle object.
    ///
    /// With `call_before_rent` the before-rent hook runs on each object just
    /// before it is destroyed. Rented objects are not affected. Returns the
    /// number of destroyed objects.
    pub fn clear(&self, call_before_rent: bool) -> Result<usize, PoolError> {
        let destroyed = self.destroy_down_to(0, call_before_rent)?;
        debug!(destroyed, "cleared idle pool");
        Ok(destroyed)
    }

    /// Destroys idle objects until `max(min_size, floor(len * retain_ratio))`
    /// remain.
    ///
    /// `retain_ratio` is clamped to `[0.0, 1.0]` and NaN counts as `0.0`.
    /// Objects are taken from the same end [`Self::rent`] draws from. If the
    /// pool already holds no more than the target, nothing happens. Returns
    /// the number of destroyed objects.
    pub fn shrink(
        &self,
        retain_ratio: f32,
        min_size: usize,
        call_before_rent: bool,
    ) -> Result<usize, PoolError> {
        let before = self.len();
        let target = retained_count(before, retain_ratio, min_size);
        let destroyed = self.destroy_down_to(target, call_before_rent)?;
        debug!(before, target, destroyed, "shrank idle pool");
        Ok(destroyed)
    }

    /// Shrinks the pool every `interval` until `cancel` fires.
    ///
    /// The wait suspends the task rather than blocking the thread. The loop
    /// ends with `Ok(())` only when its own token is cancelled; any shrink
    /// failure ends it with that error instead.
    pub async fn shrink_loop(
        &self,
        interval: Duration,
        retain_ratio: f32,
        min_size: usize,
        cancel: &CancellationToken,
        call_before_rent: bool,
    ) -> Result<(), PoolError> {
        if interval.is_zero() {
            return Err(PoolError::InvalidArgument(
                "shrink interval must be greater than zero",
            ));
        }
        debug!(?interval, retain_ratio, min_size, "shrink loop started");

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(interval) => {}
            }
            if let Err(err) = self.shrink(retain_ratio, min_size, call_before_rent) {
                error!(error = %err, "shrink loop failed");
                return Err(err);
            }
        }

        debug!(idle = self.len(), "shrink loop stopped");
        Ok(())
    }

    fn construct(&self) -> Result<T, PoolError> {
        self.allocator
            .allocate(&self.parent, self.config.placement)
            .map_err(PoolError::Factory)
    }

    fn destroy(&self, obj: T) -> Result<(), PoolError> {
        self.allocator.destroy(obj).map_err(PoolError::Factory)
    }

    fn before_rent(&self, obj: &mut T) {
        if let Some(hook) = &self.on_before_rent {
            hook(obj);
        }
    }

    /// Pops and destroys objects while more than `target` are idle. The
    /// storage borrow is released before hooks and the allocator run.
    fn destroy_down_to(&self, target: usize, call_before_rent: bool) -> Result<usize, PoolError> {
        let mut destroyed = 0;
        loop {
            let popped = {
                let mut storage = self.storage.borrow_mut();
                if storage.len() > target {
                    storage.pop()
                } else {
                    None
                }
            };
            let Some(mut obj) = popped else {
                return Ok(destroyed);
            };
            if call_before_rent {
                self.before_rent(&mut obj);
            }
            self.destroy(obj)?;
            destroyed += 1;
        }
    }
}

/// Number of idle objects a shrink keeps out of `idle`.
pub(crate) fn retained_count(idle: usize, retain_ratio: f32, min_size: usize) -> usize {
    let ratio = if retain_ratio.is_nan() {
        0.0
    } else {
        retain_ratio.clamp(0.0, 1.0)
    };
    if ratio >= 1.0 {
        return idle.max(min_size);
    }
    let by_ratio = (idle as f64 * f64::from(ratio)).floor() as usize;
    by_ratio.min(idle).max(min_size)
}

/// Destroys the remaining idle objects through the allocator.
impl<P: PoolAllocator<T>, T> Drop for LocalPool<P, T> {
    fn drop(&mut self) {
        let idle = core::mem::take(self.storage.get_mut());
        for obj in idle {
            if let Err(err) = self.allocator.destroy(obj) {
                warn!(error = %err, "failed to destroy an idle instance while dropping the pool");
            }
        }
    }
}

impl<P: PoolAllocator<T>, T> fmt::Debug for LocalPool<P, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let idle = self.storage.try_borrow().map(|storage| storage.len()).ok();
        f.debug_struct("LocalPool")
            .field("idle", &idle)
            .field("config", &self.config)
            .field("on_before_rent", &self.on_before_rent.is_some())
            .field("on_before_return", &self.on_before_return.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for a [`LocalPool`] with hooks and configuration.
pub struct LocalPoolBuilder<P: PoolAllocator<T>, T> {
    allocator: P,
    parent: P::Parent,
    config: PoolConfig,
    on_before_rent: Option<Hook<T>>,
    on_before_return: Option<Hook<T>>,
}

impl<P: PoolAllocator<T>, T> LocalPoolBuilder<P, T> {
    /// Replaces the whole configuration.
    pub fn config(mut self, config: PoolConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the placement passed to the allocator.
    pub fn placement(mut self, placement: Placement) -> Self {
        self.config.placement = placement;
        self
    }

    /// Bounds the idle pool.
    pub fn max_idle(mut self, max_idle: usize) -> Self {
        self.config.max_idle = max_idle;
        self
    }

    /// Runs `hook` on every object just before it leaves the idle pool,
    /// typically to activate it.
    pub fn on_before_rent(mut self, hook: impl Fn(&mut T) + 'static) -> Self {
        self.on_before_rent = Some(Box::new(hook));
        self
    }

    /// Runs `hook` on every object just before it enters the idle pool,
    /// typically to deactivate it.
    pub fn on_before_return(mut self, hook: impl Fn(&mut T) + 'static) -> Self {
        self.on_before_return = Some(Box::new(hook));
        self
    }

    /// Validates the configuration and builds the pool.
    pub fn build(self) -> Result<LocalPool<P, T>, PoolError> {
        self.config.validate()?;
        Ok(LocalPool::from_parts(
            self.allocator,
            self.parent,
            self.config,
            self.on_before_rent,
            self.on_before_return,
        ))
    }
}

impl<P: PoolAllocator<T>, T> fmt::Debug for LocalPoolBuilder<P, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalPoolBuilder")
            .field("config", &self.config)
            .field("on_before_rent", &self.on_before_rent.is_some())
            .field("on_before_return", &self.on_before_return.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::retained_count;

    #[test]
    fn retained_count_uses_ratio_with_floor() {
        assert_eq!(retained_count(10, 0.5, 0), 5);
        assert_eq!(retained_count(10, 0.5, 8), 8);
        assert_eq!(retained_count(7, 0.5, 0), 3);
        assert_eq!(retained_count(0, 1.0, 0), 0);
    }

    #[test]
    fn retained_count_clamps_ratio() {
        assert_eq!(retained_count(10, -3.0, 0), 0);
        assert_eq!(retained_count(10, 2.5, 0), 10);
        assert_eq!(retained_count(10, f32::NAN, 2), 2);
    }

    #[test]
    fn retained_count_keeps_large_pools_whole() {
        let idle = (1 << 24) + 1;
        assert_eq!(retained_count(idle, 1.0, 0), idle);
        assert_eq!(retained_count(idle, 0.5, 0), idle / 2);
        assert_eq!(retained_count(idle, 0.0, idle - 1), idle - 1);
    }

    #[test]
    fn retained_count_floor_may_exceed_idle() {
        // The caller only destroys down to the target, so this is a no-op.
        assert_eq!(retained_count(1, 0.0, 10), 10);
    }
}
