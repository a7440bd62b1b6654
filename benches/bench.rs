use criterion::{black_box, criterion_group, criterion_main, Criterion};
use scenepool::*;

struct Allocator {}

const ENTITY_SIZE: usize = 64 * 1024;

impl PoolAllocator<Vec<u8>> for Allocator {
    type Parent = ();

    #[inline(always)]
    fn allocate(&self, _parent: &(), _placement: Placement) -> Result<Vec<u8>, BoxError> {
        Ok(vec![0; ENTITY_SIZE])
    }

    #[inline(always)]
    fn is_valid(&self, obj: &Vec<u8>) -> bool {
        obj.len() == ENTITY_SIZE
    }
}

fn rent(c: &mut Criterion) {
    c.bench_function("rent_give_back", |b| {
        let pool = LocalPool::new(Allocator {}, ());
        b.iter(|| {
            let obj = black_box(pool.rent().unwrap());
            pool.give_back(obj).unwrap();
        })
    });
    c.bench_function("rent_give_back_hooks", |b| {
        let pool = LocalPool::builder(Allocator {}, ())
            .on_before_rent(|obj: &mut Vec<u8>| obj[0] = 1)
            .on_before_return(|obj: &mut Vec<u8>| obj[0] = 0)
            .build()
            .unwrap();
        b.iter(|| {
            let obj = black_box(pool.rent().unwrap());
            pool.give_back(obj).unwrap();
        })
    });
    c.bench_function("system", |b| {
        let alloc: Allocator = Allocator {};
        b.iter(|| {
            let obj = black_box(alloc.allocate(&(), Placement::Local).unwrap());
            black_box(obj.len())
        })
    });
}

fn preload_and_shrink(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    let cancel = tokio_util::sync::CancellationToken::new();
    c.bench_function("preload_1024_shrink", |b| {
        let pool = LocalPool::new(Allocator {}, ());
        b.iter(|| {
            runtime.block_on(pool.preload(1024, 64, &cancel)).unwrap();
            black_box(pool.shrink(0.0, 0, false).unwrap())
        })
    });
}

criterion_group!(benches, rent, preload_and_shrink);
criterion_main!(benches);
