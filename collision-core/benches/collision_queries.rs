use collision_core::format::{decode_tile, encode_tile, tile_file_name};
use collision_core::geometry::{intersect_ray_aabb, Ray};
use collision_core::{
    Aabb, CollisionConfig, CollisionWorld, ModelSpawn, TileGrid, TileKey, WorldPoint,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

const MAP: u16 = 1;

/// `per_tile` boxes on a regular lattice inside the tile
fn tile_spawns(key: TileKey, per_tile: u32) -> Vec<ModelSpawn> {
    let side = (f64::from(per_tile)).sqrt().ceil() as u32;
    let pitch = 100.0 / f64::from(side);
    (0..per_tile)
        .map(|i| {
            let x = f64::from(key.tile_x) * 100.0 + f64::from(i % side) * pitch + pitch * 0.5;
            let y = f64::from(key.tile_y) * 100.0 + f64::from(i / side) * pitch + pitch * 0.5;
            let half = WorldPoint::new(pitch * 0.2, pitch * 0.2, 4.0);
            let center = WorldPoint::new(x, y, 0.0);
            ModelSpawn {
                id: u32::from(key.tile_x) * 10_000 + u32::from(key.tile_y) * 100 + i,
                name: format!("prop_{}", i),
                position: center,
                bounds: Aabb::new(center - half, center + half),
            }
        })
        .collect()
}

fn build_world(tiles: u8, per_tile: u32, capacity: usize) -> (tempfile::TempDir, CollisionWorld) {
    let dir = tempfile::tempdir().unwrap();
    for y in 0..tiles {
        for x in 0..tiles {
            let key = TileKey::new(MAP, x, y);
            let bytes = encode_tile(key, &tile_spawns(key, per_tile)).unwrap();
            std::fs::write(dir.path().join(tile_file_name(key)), bytes).unwrap();
        }
    }
    let world = CollisionWorld::new(CollisionConfig {
        cache_capacity: capacity,
        ..CollisionConfig::with_data_dir(dir.path())
    })
    .unwrap();
    world.open_map(MAP).unwrap();
    (dir, world)
}

fn bench_decode(c: &mut Criterion) {
    let key = TileKey::new(MAP, 0, 0);
    let bytes = encode_tile(key, &tile_spawns(key, 256)).unwrap();

    c.bench_function("decode_tile_256", |b| {
        b.iter(|| decode_tile(black_box(&bytes), key).unwrap())
    });
}

fn bench_geometry(c: &mut Criterion) {
    let ray = Ray::between(WorldPoint::new(0.0, 0.0, 0.0), WorldPoint::new(100.0, 37.0, 3.0)).unwrap();
    let hit = Aabb::new(WorldPoint::new(40.0, 10.0, -5.0), WorldPoint::new(60.0, 20.0, 5.0));
    let miss = Aabb::new(WorldPoint::new(40.0, 60.0, -5.0), WorldPoint::new(60.0, 80.0, 5.0));

    c.bench_function("ray_aabb_hit", |b| b.iter(|| intersect_ray_aabb(black_box(&ray), black_box(&hit))));
    c.bench_function("ray_aabb_miss", |b| b.iter(|| intersect_ray_aabb(black_box(&ray), black_box(&miss))));

    let grid = TileGrid::default();
    c.bench_function("tiles_along_segment_diagonal", |b| {
        b.iter(|| {
            grid.tiles_along_segment(
                MAP,
                black_box(WorldPoint::new(10.0, 20.0, 0.0)),
                black_box(WorldPoint::new(6300.0, 5100.0, 0.0)),
            )
        })
    });
}

fn bench_queries(c: &mut Criterion) {
    let (_dir, world) = build_world(8, 64, 64);
    world.map(MAP).unwrap().prewarm_all().unwrap();

    c.bench_function("line_of_sight_warm_clear", |b| {
        b.iter(|| {
            world
                .test_line_of_sight(
                    MAP,
                    black_box(WorldPoint::new(5.0, 5.0, 10.0)),
                    black_box(WorldPoint::new(795.0, 795.0, 10.0)),
                )
                .unwrap()
        })
    });

    c.bench_function("line_of_sight_warm_blocked", |b| {
        b.iter(|| {
            world
                .test_line_of_sight(
                    MAP,
                    black_box(WorldPoint::new(0.5, 6.25, 0.0)),
                    black_box(WorldPoint::new(799.0, 6.25, 0.0)),
                )
                .unwrap()
        })
    });

    c.bench_function("radius_warm_r50", |b| {
        b.iter(|| {
            world
                .find_spawns_in_radius(MAP, black_box(WorldPoint::new(400.0, 400.0, 0.0)), 50.0)
                .unwrap()
        })
    });
}

fn bench_cold_cache(c: &mut Criterion) {
    // Capacity 1 forces a decode on nearly every tile of the segment
    let (_dir, world) = build_world(8, 64, 1);

    c.bench_function("line_of_sight_cold_8_tiles", |b| {
        b.iter(|| {
            world
                .test_line_of_sight(
                    MAP,
                    black_box(WorldPoint::new(5.0, 50.0, 10.0)),
                    black_box(WorldPoint::new(795.0, 50.0, 10.0)),
                )
                .unwrap()
        })
    });
}

criterion_group!(benches, bench_decode, bench_geometry, bench_queries, bench_cold_cache);
criterion_main!(benches);
