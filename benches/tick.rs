//! Tick benchmarks for the ship arena simulation
//!
//! Measures `Simulation::advance` with full rooms of bots at several
//! asteroid densities, plus the snapshot build and encode path.
//!
//! Run with: cargo bench --bench tick

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use ship_arena_server::game::constants::game::MAX_PLAYERS;
use ship_arena_server::game::constants::physics::DT;
use ship_arena_server::game::engine::{FixedClock, Simulation};
use ship_arena_server::game::events::NullSink;
use ship_arena_server::game::state::MatchPhase;
use ship_arena_server::game::systems::asteroid;
use ship_arena_server::net::protocol::{self, GameSnapshot, ServerMessage};
use uuid::Uuid;

/// Room with one human leader and `bots` AI players, already in PLAYING
fn create_playing_sim(bots: usize, extra_asteroids: usize) -> Simulation<NullSink> {
    let seed = rand::thread_rng().gen::<u32>() as u64;
    let mut sim = Simulation::with_clock(NullSink, Box::new(FixedClock(seed)));
    let leader = Uuid::from_u128(1);
    sim.join(leader, Some("Bench".to_string())).unwrap();
    for _ in 0..bots {
        sim.add_ai_bot(leader).unwrap();
    }
    sim.start_match(leader).unwrap();
    while sim.state().phase() != MatchPhase::Playing {
        sim.advance(DT);
    }
    asteroid::spawn_field(sim.state_mut(), extra_asteroids);
    sim
}

/// Keep the room in PLAYING so every sample measures a full system pass
fn keep_playing(sim: &mut Simulation<NullSink>, bots: usize, extra_asteroids: usize) {
    if sim.state().phase() != MatchPhase::Playing {
        *sim = create_playing_sim(bots, extra_asteroids);
    }
}

fn bench_advance(c: &mut Criterion) {
    let mut group = c.benchmark_group("advance");
    group.sample_size(50);

    let bots = MAX_PLAYERS - 1;
    for asteroids in [0, 12, 24, 48] {
        let mut sim = create_playing_sim(bots, asteroids);

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("full_room", asteroids), &asteroids, |b, &asteroids| {
            b.iter(|| {
                keep_playing(&mut sim, bots, asteroids);
                black_box(sim.advance(DT));
            });
        });
    }

    group.finish();
}

fn bench_player_counts(c: &mut Criterion) {
    let mut group = c.benchmark_group("players");
    group.sample_size(50);

    for bots in 1..MAX_PLAYERS {
        let mut sim = create_playing_sim(bots, 0);

        group.throughput(Throughput::Elements((bots + 1) as u64));
        group.bench_with_input(BenchmarkId::new("advance", bots + 1), &bots, |b, &bots| {
            b.iter(|| {
                keep_playing(&mut sim, bots, 0);
                black_box(sim.advance(DT));
            });
        });
    }

    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot");

    let sim = create_playing_sim(MAX_PLAYERS - 1, 24);

    group.bench_function("build", |b| {
        b.iter(|| black_box(GameSnapshot::from_game_state(sim.state())));
    });

    let message = ServerMessage::Snapshot(GameSnapshot::from_game_state(sim.state()));
    group.bench_function("encode", |b| {
        b.iter(|| black_box(protocol::encode(&message).unwrap()));
    });

    group.finish();
}

/// Tick budget at 60 Hz
fn bench_tick_budget(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick_budget");
    group.sample_size(20);

    let bots = MAX_PLAYERS - 1;
    let mut sim = create_playing_sim(bots, 24);
    group.bench_function("one_second", |b| {
        b.iter(|| {
            for _ in 0..60 {
                keep_playing(&mut sim, bots, 24);
                black_box(sim.advance(DT));
            }
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_advance,
    bench_player_counts,
    bench_snapshot,
    bench_tick_budget,
);

criterion_main!(benches);
