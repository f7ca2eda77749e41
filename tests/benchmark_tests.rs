//! Performance benchmarks for critical session systems

use server::combat::CombatAuthority;
use server::config::SessionConfig;
use server::events::server_bus;
use server::outbox::Outbox;
use server::roster::RosterSyncService;
use server::session::Session;
use server::world::{Aabb, Arena, ColliderTag, LineOfSight, Ray, VisibilityMask};
use shared::{Role, Vec3, NON_PLAYER_ID};
use std::time::Instant;

/// Benchmarks roster join/leave churn including replication messages
#[test]
fn benchmark_roster_churn() {
    let mut roster = RosterSyncService::new(Role::Authority);
    let mut outbox = Outbox::new();

    let iterations = 10_000u64;
    let start = Instant::now();

    for i in 0..iterations {
        let id = i % 64 + 1;
        if roster.contains(id) {
            roster.on_leave(id, &mut outbox);
        } else {
            roster.approve(id, b"Churn");
            roster.on_join(id, &mut outbox);
        }
        outbox.drain();
    }

    let duration = start.elapsed();
    println!(
        "Roster churn: {} operations in {:?} ({:.2} μs/op)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Snapshots grow with the roster, so allow plenty of headroom
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks damage application and death handling
#[test]
fn benchmark_damage_application() {
    let bus = server_bus();
    let mut events = bus.subscribe();
    let mut combat = CombatAuthority::new(Role::Authority, 100.0, 5, bus);
    let mut outbox = Outbox::new();

    let ids: Vec<_> = (1..=100u64)
        .filter_map(|owner| combat.spawn_player(owner, format!("P{}", owner), Vec3::ZERO, &mut outbox))
        .collect();

    let iterations = 100_000u64;
    let start = Instant::now();

    for i in 0..iterations {
        let target = ids[(i % ids.len() as u64) as usize];
        let source = if i % 7 == 0 { NON_PLAYER_ID } else { i % 100 + 1 };
        combat.apply_damage(target, 0.5, source, i, &mut outbox);
        if i % 1000 == 0 {
            outbox.drain();
            events.drain();
        }
    }

    let duration = start.elapsed();
    println!(
        "Damage application: {} hits in {:?} ({:.2} ns/hit)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 1000);
}

/// Benchmarks line-of-sight ray tests through a crowded arena
#[test]
fn benchmark_ray_tests() {
    let obstacles = (0..20)
        .map(|i| {
            let x = -40.0 + i as f32 * 4.0;
            Aabb::new(Vec3::new(x, 0.0, 5.0), Vec3::new(x + 1.0, 3.0, 6.0))
        })
        .collect();
    let mut arena = Arena::new(50.0, 0.5, obstacles);
    arena.sync((0..50u32).map(|i| {
        (
            ColliderTag::Player(i),
            Vec3::new(-25.0 + i as f32, 1.1, 15.0),
        )
    }));

    let iterations = 10_000;
    let mut hits = 0;
    let start = Instant::now();

    for i in 0..iterations {
        let target = Vec3::new(-25.0 + (i % 50) as f32, 1.1, 15.0);
        let origin = Vec3::new(0.0, 1.1, -20.0);
        let ray = Ray {
            origin,
            direction: (target - origin).normalized(),
            max_distance: 60.0,
            ignore: None,
        };
        if arena.ray_test(&ray, VisibilityMask::ALL).is_some() {
            hits += 1;
        }
    }

    let duration = start.elapsed();
    println!(
        "Ray tests: {} rays ({} hits) in {:?} ({:.2} μs/ray)",
        iterations,
        hits,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 2000);
}

/// Benchmarks full session ticks with players and bot waves
#[test]
fn benchmark_session_tick_with_bots() {
    let mut session = Session::with_seed(SessionConfig::default(), 7).unwrap();
    for id in 1..=8 {
        session.connect(id, format!("Player{}", id).as_bytes());
    }
    session.start_match(1);
    session.drain_outgoing();

    let iterations = 1000;
    let mut sent = 0;
    let start = Instant::now();

    for _ in 0..iterations {
        sent += session.tick(Vec::new()).len();
    }

    let duration = start.elapsed();
    println!(
        "Session tick: {} ticks, {} messages, {} agents in {:?} ({:.2} μs/tick)",
        iterations,
        sent,
        session.agent_count(),
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(sent > 0);
    // Should complete in under 5 seconds
    assert!(duration.as_millis() < 5000);
}

/// Benchmarks world snapshot serialization
#[test]
fn benchmark_world_state_serialization() {
    use bincode::{deserialize, serialize};
    use shared::{EntityKind, EntitySnapshot, Packet};

    let entities: Vec<EntitySnapshot> = (0..64u32)
        .map(|i| EntitySnapshot {
            id: i,
            kind: if i % 4 == 0 {
                EntityKind::NonPlayer
            } else {
                EntityKind::Player { owner: i as u64 }
            },
            position: Vec3::new(i as f32, 0.0, -(i as f32)),
            aim: Vec3::FORWARD,
            alive: i % 5 != 0,
        })
        .collect();
    let packet = Packet::WorldState {
        tick: 12345,
        entities,
    };

    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let serialized = serialize(&packet).unwrap();
        let _deserialized: Packet = deserialize(&serialized).unwrap();
    }

    let duration = start.elapsed();
    println!(
        "World state serialization: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}
