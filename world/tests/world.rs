use std::collections::BTreeSet;

use geocache_core::{Cell, Command, Event, GeoPoint, NeighborhoodRadius, Token, WorldConfig};
use geocache_system_generation::Generator;
use geocache_world::{self as world, query, Board, Cache, CacheStore, World};

const TILE: f64 = 1e-4;

#[test]
fn canonicalization_is_idempotent_within_a_tile() {
    let mut board = Board::new(TILE).expect("board");
    let first = board.cell_containing(GeoPoint::new(0.00001, -0.00001));
    let second = board.cell_containing(GeoPoint::new(0.00009, -0.00009));
    let third = board.canonical(Cell::new(0, -1));

    assert_eq!(first, second);
    assert_eq!(first, third);
    assert_eq!(board.known_cells().collect::<Vec<_>>(), vec![first]);
}

#[test]
fn neighborhood_has_exactly_two_r_squared_cells() {
    let mut board = Board::new(TILE).expect("board");
    let point = GeoPoint::new(36.9995, -122.0533);
    let origin = board.cell_containing(point);
    let radius = 3;

    let cells = board.cells_within_radius(point, radius);
    let unique: BTreeSet<Cell> = cells.iter().copied().collect();

    assert_eq!(cells.len(), 36);
    assert_eq!(unique.len(), cells.len(), "neighborhood contains duplicates");
    assert!(cells
        .iter()
        .all(|cell| origin.chebyshev_distance(*cell) <= u64::from(radius)));
}

#[test]
fn generation_is_reproducible_across_instances() {
    let config = WorldConfig::default();
    let first = Generator::new(&config).expect("generator");
    let second = Generator::new(&config).expect("generator");

    for row in -25..25 {
        for col in -25..25 {
            let cell = Cell::new(row, col);
            assert_eq!(first.exists_at(cell), second.exists_at(cell));
            assert_eq!(first.token_count_for(cell), second.token_count_for(cell));
        }
    }
}

#[test]
fn scenario_spawn_collect_and_restore() {
    let config = WorldConfig {
        tile_size: TILE,
        spawn_probability: 0.05,
        spawn_tag: "spawn".to_owned(),
        ..WorldConfig::default()
    };
    let generator = Generator::new(&config).expect("generator");
    let mut board = Board::new(config.tile_size).expect("board");
    let mut store = CacheStore::new();

    let origin = board.cell_containing(GeoPoint::new(0.0, 0.0));
    assert_eq!(origin, Cell::new(0, 0));
    assert!(!generator.exists_at(origin), "default seed leaves the origin empty");
    assert!(!store.contains(origin));

    let cell = (0..1_000)
        .map(|col| Cell::new(0, col))
        .find(|cell| generator.exists_at(*cell) && generator.token_count_for(*cell) > 0)
        .expect("a stocked cache along row 0");
    let point = board.bounds_of(cell).south_west().offset(TILE / 2.0, TILE / 2.0);
    assert_eq!(board.cell_containing(point), cell);

    let mut cache = store
        .load_or_create(cell, &mut board, &generator)
        .expect("fresh cache");
    let initial = generator.initial_tokens(cell);
    assert_eq!(cache.tokens(), initial.as_slice());
    let target = initial[0];

    assert_eq!(cache.remove_token(target), Some(target));
    store.commit(&cache);
    let restored = store
        .load_or_create(cell, &mut board, &generator)
        .expect("restored cache");

    assert_eq!(restored.len(), initial.len() - 1);
    assert!(!restored.contains(target));
    let expected: BTreeSet<Token> = initial
        .into_iter()
        .filter(|token| *token != target)
        .collect();
    let actual: BTreeSet<Token> = restored.tokens().iter().copied().collect();
    assert_eq!(actual, expected);
}

#[test]
fn tokens_are_conserved_across_trades() {
    let config = WorldConfig {
        spawn_probability: 0.5,
        token_draw_scale: 8,
        neighborhood: NeighborhoodRadius::Distance(4e-4),
        origin: GeoPoint::new(-33.8568, 151.2153),
        ..WorldConfig::default()
    };
    let origin = config.origin;
    let mut world = World::new(config).expect("world");
    let mut events = Vec::new();
    world::apply(&mut world, Command::MovePlayer { to: origin }, &mut events);
    let baseline = query::token_census(&world).expect("census");
    assert!(!baseline.is_empty(), "expected at least one token nearby");

    let cells: Vec<Cell> = query::visible_caches(&world).map(Cache::cell).collect();
    for round in 0..4 {
        for cell in &cells {
            let command = if round % 2 == 0 {
                Command::CollectToken {
                    cell: *cell,
                    token: None,
                }
            } else {
                Command::DepositToken {
                    cell: *cell,
                    token: query::holdings(&world).first().copied(),
                }
            };
            world::apply(&mut world, command, &mut events);
            assert_eq!(query::token_census(&world).expect("census"), baseline);
        }
    }

    let collected = events
        .iter()
        .filter(|event| matches!(event, Event::TokenCollected { .. }))
        .count();
    assert!(collected > 0, "trades should have moved tokens");
}

#[test]
fn revisiting_a_cell_restores_mutated_state() {
    let config = WorldConfig {
        spawn_probability: 1.0,
        token_draw_scale: 20,
        neighborhood: NeighborhoodRadius::Tiles(1),
        origin: GeoPoint::new(0.00005, 0.00005),
        ..WorldConfig::default()
    };
    let origin = config.origin;
    let far_away = GeoPoint::new(10.0, 10.0);
    let mut world = World::new(config).expect("world");
    let mut events = Vec::new();

    world::apply(&mut world, Command::MovePlayer { to: origin }, &mut events);
    let cell = query::visible_caches(&world)
        .find(|cache| !cache.is_empty())
        .map(Cache::cell)
        .expect("stocked cache");
    world::apply(
        &mut world,
        Command::CollectToken { cell, token: None },
        &mut events,
    );
    let after_collect = query::cache(&world, cell).expect("visible").clone();

    world::apply(&mut world, Command::MovePlayer { to: far_away }, &mut events);
    assert!(query::cache(&world, cell).is_none());
    world::apply(&mut world, Command::MovePlayer { to: origin }, &mut events);

    assert_eq!(query::cache(&world, cell), Some(&after_collect));
}
