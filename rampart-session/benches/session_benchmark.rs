use criterion::{black_box, criterion_group, criterion_main, Criterion};
use uuid::Uuid;

use rampart_session::election::HostElection;
use rampart_session::protocol::{
    CompressedSnapshot, GameAction, HostMessage, PresenceRecord, WireMessage,
};
use rampart_sim::{Game, GameSettings, TowerKind};

fn populated_game() -> Game {
    let mut game = Game::new(GameSettings::default());
    let player = Uuid::new_v4();
    game.add_player(player, "Bench").unwrap();
    for x in 0..8u8 {
        for y in [0u8, 3, 4] {
            let _ = game.place_tower(player, x, y, TowerKind::Arrow);
        }
    }
    game
}

fn bench_action_encode(c: &mut Criterion) {
    let action = GameAction::PlaceTower {
        player_id: Uuid::new_v4(),
        x: 3,
        y: 4,
        kind: TowerKind::Tesla,
    };

    c.bench_function("action_encode", |b| {
        b.iter(|| {
            let msg = WireMessage::Action(black_box(action.clone()));
            black_box(msg.encode().unwrap());
        })
    });
}

fn bench_action_decode(c: &mut Criterion) {
    let msg = WireMessage::Action(GameAction::StartWave { player_id: Uuid::new_v4() });
    let encoded = msg.encode().unwrap();

    c.bench_function("action_decode", |b| {
        b.iter(|| {
            black_box(WireMessage::decode(black_box(&encoded)).unwrap());
        })
    });
}

fn bench_snapshot_compress(c: &mut Criterion) {
    let game = populated_game();
    let snapshot = game.snapshot();

    c.bench_function("snapshot_compress", |b| {
        b.iter(|| {
            black_box(CompressedSnapshot::compress(black_box(&snapshot)).unwrap());
        })
    });
}

fn bench_snapshot_roundtrip(c: &mut Criterion) {
    let game = populated_game();
    let compressed = CompressedSnapshot::compress(&game.snapshot()).unwrap();
    let msg = WireMessage::Host(HostMessage::GameState { snapshot: compressed });
    let encoded = msg.encode().unwrap();

    c.bench_function("game_state_decode_and_decompress", |b| {
        b.iter(|| {
            let decoded = WireMessage::decode(black_box(&encoded)).unwrap();
            if let WireMessage::Host(HostMessage::GameState { snapshot }) = decoded {
                black_box(snapshot.decompress().unwrap());
            }
        })
    });
}

fn bench_election_100_peers(c: &mut Criterion) {
    let view: Vec<PresenceRecord> = (0..100u64)
        .map(|i| PresenceRecord {
            participant_id: Uuid::new_v4(),
            name: format!("peer-{i}"),
            joined_at: 1_000_000 - i * 7,
            is_host: false,
            is_spectator: i % 5 == 0,
        })
        .collect();

    c.bench_function("elect_host_100_peers", |b| {
        b.iter(|| {
            black_box(HostElection::elect(black_box(&view)));
        })
    });
}

criterion_group!(
    benches,
    bench_action_encode,
    bench_action_decode,
    bench_snapshot_compress,
    bench_snapshot_roundtrip,
    bench_election_100_peers
);
criterion_main!(benches);
