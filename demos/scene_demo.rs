//! Rents one sprite per frame and hands each back after a fixed delay.
//!
//! Run with `RUST_LOG=scenepool=debug cargo run --example scene_demo`.

use scenepool::{BoxError, LocalPool, Placement, PoolAllocator, ShrinkPolicy};
use std::{cell::RefCell, collections::HashMap, rc::Rc, time::Duration};
use tokio::task::LocalSet;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

const PRELOAD: usize = 50;
const PRELOAD_BATCH: usize = 10;
const FRAME: Duration = Duration::from_millis(16);
const LIFETIME: Duration = Duration::from_millis(400);
const RUN_FOR: Duration = Duration::from_secs(3);
const FLOOR: usize = 5;

#[derive(Debug)]
struct Layer {
    name: String,
}

#[derive(Debug)]
struct Sprite {
    id: u64,
    layer: String,
    visible: bool,
}

#[derive(Default)]
struct SpriteFactory {
    next_id: std::cell::Cell<u64>,
}

impl PoolAllocator<Sprite> for SpriteFactory {
    type Parent = Layer;

    fn allocate(&self, parent: &Layer, _placement: Placement) -> Result<Sprite, BoxError> {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        Ok(Sprite {
            id,
            layer: parent.name.clone(),
            visible: true,
        })
    }

    fn destroy(&self, obj: Sprite) -> Result<(), BoxError> {
        tracing::trace!(
            id = obj.id,
            layer = %obj.layer,
            visible = obj.visible,
            "despawned sprite"
        );
        Ok(())
    }
}

type Pool = Rc<LocalPool<SpriteFactory, Sprite>>;
type Rented = Rc<RefCell<HashMap<u64, Sprite>>>;

fn schedule_return(pool: &Pool, rented: &Rented, id: u64, cancel: CancellationToken) {
    let pool = pool.clone();
    let rented = rented.clone();
    tokio::task::spawn_local(async move {
        tokio::select! {
            () = cancel.cancelled() => {}
            () = tokio::time::sleep(LIFETIME) => {
                let sprite = rented.borrow_mut().remove(&id);
                if let Some(sprite) = sprite {
                    if let Err(rejected) = pool.give_back(sprite) {
                        tracing::warn!(error = %rejected, "sprite was not taken back");
                    }
                }
            }
        }
    });
}

async fn run(pool: Pool, stop: CancellationToken) -> Result<(), BoxError> {
    pool.preload(PRELOAD, PRELOAD_BATCH, &stop).await?;
    info!(idle = pool.len(), "pool preloaded");

    let shrinker = pool.clone().spawn_shrink_loop(ShrinkPolicy {
        interval: Duration::from_secs(1),
        retain_ratio: 0.8,
        min_size: PRELOAD / 2,
        call_before_rent: false,
    })?;

    let rented: Rented = Rc::default();
    let returns = stop.child_token();
    let mut frames = tokio::time::interval(FRAME);
    loop {
        tokio::select! {
            () = stop.cancelled() => break,
            _ = frames.tick() => {
                let sprite = pool.rent()?;
                let id = sprite.id;
                rented.borrow_mut().insert(id, sprite);
                schedule_return(&pool, &rented, id, returns.clone());
            }
        }
    }

    returns.cancel();
    shrinker.stop().await?;

    let outstanding: Vec<_> = rented
        .borrow_mut()
        .drain()
        .map(|(_, sprite)| sprite)
        .collect();
    info!(outstanding = outstanding.len(), "returning sprites still on screen");
    for sprite in outstanding {
        pool.give_back(sprite)?;
    }

    let destroyed = pool.shrink(0.0, FLOOR, false)?;
    info!(destroyed, idle = pool.len(), "pool shrunk after shutdown");
    pool.clear(true)?;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let layer = Layer {
        name: "effects".into(),
    };
    let pool = LocalPool::builder(SpriteFactory::default(), layer)
        .placement(Placement::World)
        .on_before_rent(|sprite: &mut Sprite| sprite.visible = true)
        .on_before_return(|sprite: &mut Sprite| sprite.visible = false)
        .build()?
        .to_rc();

    let stop = CancellationToken::new();
    let timer = stop.clone();
    LocalSet::new()
        .run_until(async move {
            tokio::task::spawn_local(async move {
                tokio::time::sleep(RUN_FOR).await;
                timer.cancel();
            });
            run(pool, stop).await
        })
        .await
}
