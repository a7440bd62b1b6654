#![allow(dead_code)]

use scenepool::{BoxError, Placement, PoolAllocator};
use std::{
    cell::Cell,
    fmt,
    rc::Rc,
};

/// Parent every test entity is attached to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scene {
    pub name: &'static str,
}

impl Scene {
    pub fn root() -> Self {
        Scene { name: "root" }
    }
}

#[derive(Debug)]
pub struct Entity {
    pub id: u32,
    pub parent: &'static str,
    pub placement: Placement,
    pub active: bool,
    alive: Rc<Cell<bool>>,
}

impl Entity {
    /// A handle that never pointed at a live entity.
    pub fn null() -> Self {
        Entity {
            id: u32::MAX,
            parent: "",
            placement: Placement::Local,
            active: false,
            alive: Rc::new(Cell::new(false)),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive.get()
    }

    pub fn kill(&self) {
        self.alive.set(false);
    }
}

#[derive(Debug, Default)]
pub struct Counters {
    pub constructed: Cell<usize>,
    pub destroyed: Cell<usize>,
    pub fail_allocate: Cell<bool>,
    pub fail_destroy: Cell<bool>,
}

#[derive(Debug)]
struct SceneFault(&'static str);

impl fmt::Display for SceneFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl std::error::Error for SceneFault {}

/// Allocator that hands out numbered entities and counts lifecycle calls.
pub struct SceneAllocator {
    next_id: Cell<u32>,
    pub counters: Rc<Counters>,
}

impl SceneAllocator {
    pub fn new() -> (Self, Rc<Counters>) {
        let counters = Rc::new(Counters::default());
        let allocator = SceneAllocator {
            next_id: Cell::new(0),
            counters: counters.clone(),
        };
        (allocator, counters)
    }
}

impl PoolAllocator<Entity> for SceneAllocator {
    type Parent = Scene;

    fn allocate(&self, parent: &Scene, placement: Placement) -> Result<Entity, BoxError> {
        if self.counters.fail_allocate.get() {
            return Err(Box::new(SceneFault("scene refused to spawn an entity")));
        }
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.counters.constructed.set(self.counters.constructed.get() + 1);
        Ok(Entity {
            id,
            parent: parent.name,
            placement,
            active: true,
            alive: Rc::new(Cell::new(true)),
        })
    }

    fn destroy(&self, obj: Entity) -> Result<(), BoxError> {
        if self.counters.fail_destroy.get() {
            return Err(Box::new(SceneFault("scene refused to despawn an entity")));
        }
        if obj.is_alive() {
            obj.kill();
            self.counters.destroyed.set(self.counters.destroyed.get() + 1);
        }
        Ok(())
    }

    fn is_valid(&self, obj: &Entity) -> bool {
        obj.is_alive()
    }
}
