use crate::{LocalPool, PoolAllocator, PoolError, ShrinkPolicy};
use core::fmt;
use std::{panic, rc::Rc};
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};

impl<P, T> LocalPool<P, T>
where
    P: PoolAllocator<T> + 'static,
    P::Parent: 'static,
    T: 'static,
{
    /// Spawns [`LocalPool::shrink_loop`] with `policy` on the current
    /// [`tokio::task::LocalSet`].
    ///
    /// The loop runs until the returned handle is stopped or dropped.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a `LocalSet`.
    pub fn spawn_shrink_loop(
        self: Rc<Self>,
        policy: ShrinkPolicy,
    ) -> Result<ShrinkLoopHandle, PoolError> {
        policy.validate()?;
        let token = CancellationToken::new();
        let loop_token = token.clone();
        let task = tokio::task::spawn_local(async move {
            self.shrink_loop(
                policy.interval,
                policy.retain_ratio,
                policy.min_size,
                &loop_token,
                policy.call_before_rent,
            )
            .await
        });
        Ok(ShrinkLoopHandle {
            cancel_on_drop: token.clone().drop_guard(),
            token,
            task,
        })
    }
}

/// Owns a running shrink loop. Dropping the handle cancels the loop.
pub struct ShrinkLoopHandle {
    token: CancellationToken,
    task: JoinHandle<Result<(), PoolError>>,
    cancel_on_drop: DropGuard,
}

impl ShrinkLoopHandle {
    /// The token the loop stops on.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Whether the loop has ended, either stopped or failed.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Tears the loop task down without firing its token. A later
    /// [`Self::join`] or [`Self::stop`] reports [`PoolError::Aborted`].
    pub fn abort(&self) {
        self.task.abort();
    }

    /// Cancels the loop and waits for it to end.
    ///
    /// Returns `Ok(())` when the loop stopped on cancellation, or the error
    /// that ended it earlier.
    pub async fn stop(self) -> Result<(), PoolError> {
        let Self {
            task,
            cancel_on_drop,
            ..
        } = self;
        drop(cancel_on_drop);
        join(task).await
    }

    /// Waits for the loop to end without cancelling it.
    pub async fn join(self) -> Result<(), PoolError> {
        let Self {
            task,
            cancel_on_drop,
            ..
        } = self;
        let result = join(task).await;
        drop(cancel_on_drop);
        result
    }
}

/// A panic inside the loop is resumed on the joining task; an abort from
/// outside is reported as [`PoolError::Aborted`].
async fn join(task: JoinHandle<Result<(), PoolError>>) -> Result<(), PoolError> {
    match task.await {
        Ok(result) => result,
        Err(err) if err.is_panic() => panic::resume_unwind(err.into_panic()),
        Err(_) => Err(PoolError::Aborted),
    }
}

impl fmt::Debug for ShrinkLoopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShrinkLoopHandle")
            .field("cancelled", &self.token.is_cancelled())
            .field("finished", &self.task.is_finished())
            .finish()
    }
}
