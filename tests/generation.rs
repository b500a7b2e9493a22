use delve::zone::*;
use std::collections::VecDeque;

fn template(id: &str, generator: GeneratorKind, size: ZoneSize, density: Density) -> ZoneTemplate {
    ZoneTemplate {
        id: id.to_string(),
        name: id.replace('_', " "),
        description: String::new(),
        level: 3,
        act: 1,
        zone_type: ZoneType::Outdoor,
        generator,
        size,
        density,
        monster_pool: vec!["zombie".to_string(), "fallen".to_string(), "rhoa".to_string(), "quillrat".to_string()],
        has_waypoint: false,
        has_boss: false,
        boss_type: None,
        prerequisites: Vec::new(),
        connections: Vec::new(),
        special_features: Vec::new(),
    }
}

fn generate(template: &ZoneTemplate, seed: u64) -> GeneratedZone {
    ZoneGenerator::new(0).generate_zone(template, Some(seed))
}

fn reachable_from(grid: &ZoneGrid, start: GridPos) -> usize {
    let mut seen = vec![false; grid.cells.len()];
    let mut queue = VecDeque::new();
    let mut count = 0;

    if let Some(idx) = grid.index_of(start) {
        seen[idx] = true;
        queue.push_back(start);
    }
    while let Some(pos) = queue.pop_front() {
        count += 1;
        for (dx, dy) in [(0, -1), (1, 0), (0, 1), (-1, 0)] {
            let next = pos.offset(dx, dy);
            if let Some(idx) = grid.index_of(next) {
                if !seen[idx] && !grid.cells[idx].blocked {
                    seen[idx] = true;
                    queue.push_back(next);
                }
            }
        }
    }
    count
}

const ALL_KINDS: [GeneratorKind; 5] = [
    GeneratorKind::Linear,
    GeneratorKind::Cave,
    GeneratorKind::Dungeon,
    GeneratorKind::Open,
    GeneratorKind::Maze,
];

#[test]
fn same_seed_reproduces_the_zone() {
    let linear = template("mudflats", GeneratorKind::Linear, ZoneSize::Small, Density::Normal);
    let first = generate(&linear, 12345);
    let second = generate(&linear, 12345);

    assert_eq!(first.grid.count_type(CellType::Wall), second.grid.count_type(CellType::Wall));
    assert_eq!(first, second);

    for kind in ALL_KINDS {
        let t = template("repeat", kind, ZoneSize::Medium, Density::Dense);
        assert_eq!(generate(&t, 777), generate(&t, 777), "{:?} is not deterministic", kind);
    }
}

#[test]
fn reused_generator_matches_fresh_one() {
    let t = template("crossing", GeneratorKind::Dungeon, ZoneSize::Medium, Density::Normal);
    let mut generator = ZoneGenerator::new(5);
    generator.generate_zone(&t, None);
    let reused = generator.generate_zone(&t, Some(99));
    assert_eq!(reused, generate(&t, 99));
}

#[test]
fn different_seeds_give_different_spawns() {
    for kind in ALL_KINDS {
        let t = template("variety", kind, ZoneSize::Medium, Density::Normal);
        let a = generate(&t, 1).spawns;
        let b = generate(&t, 2).spawns;
        assert_ne!(a, b, "{:?} ignored its seed", kind);
    }
}

#[test]
fn sizes_are_ordered() {
    for kind in ALL_KINDS {
        let width = |size| generate(&template("sized", kind, size, Density::Sparse), 3).grid.width;
        assert!(width(ZoneSize::Small) < width(ZoneSize::Medium));
        assert!(width(ZoneSize::Medium) < width(ZoneSize::Large));
    }
    assert_eq!(generate(&template("s", GeneratorKind::Open, ZoneSize::Small, Density::Sparse), 1).grid.height, 15);
    assert_eq!(generate(&template("l", GeneratorKind::Open, ZoneSize::Large, Density::Sparse), 1).grid.height, 35);
}

#[test]
fn waypoint_follows_template_flag() {
    for kind in ALL_KINDS {
        let mut t = template("wp", kind, ZoneSize::Medium, Density::Normal);
        let without = generate(&t, 8);
        assert_eq!(without.grid.waypoint_position, None);
        assert_eq!(without.grid.count_type(CellType::Waypoint), 0);

        t.has_waypoint = true;
        let with = generate(&t, 8);
        let pos = with.grid.waypoint_position.expect("waypoint placed");
        assert_eq!(with.grid.cell(pos).unwrap().cell_type, CellType::Waypoint);
        assert!(!with.grid.cell(pos).unwrap().blocked);
    }
}

#[test]
fn boss_is_the_only_unique_pack() {
    for kind in ALL_KINDS {
        let mut t = template("lair", kind, ZoneSize::Medium, Density::Dense);
        t.has_boss = true;
        t.boss_type = Some("merveil".to_string());

        for seed in [1, 42, 4096] {
            let zone = generate(&t, seed);
            let uniques: Vec<&MonsterSpawn> =
                zone.spawns.iter().filter(|spawn| spawn.rarity == Rarity::Unique).collect();
            assert_eq!(uniques.len(), 1);

            let boss = uniques[0];
            assert!(boss.monster_types.contains(&"merveil".to_string()));
            assert_eq!(Some(boss.position), zone.grid.boss_position);
            assert_eq!(zone.grid.cell(boss.position).unwrap().cell_type, CellType::Boss);
            assert_eq!(boss.pack_size, 1);
            assert_eq!(boss.affixes.len(), 3);
        }
    }
}

#[test]
fn no_boss_means_no_unique() {
    let t = template("quiet", GeneratorKind::Open, ZoneSize::Large, Density::Dense);
    let zone = generate(&t, 2024);
    assert_eq!(zone.grid.boss_position, None);
    assert!(zone.spawns.iter().all(|spawn| spawn.rarity != Rarity::Unique));
}

#[test]
fn towns_and_safe_zones_stay_peaceful() {
    let mut town = template("camp", GeneratorKind::Open, ZoneSize::Small, Density::Dense);
    town.zone_type = ZoneType::Town;
    let mut sanctuary = template("sanctuary", GeneratorKind::Cave, ZoneSize::Medium, Density::Dense);
    sanctuary.special_features = vec![SAFE_ZONE_FEATURE.to_string()];

    for t in [town, sanctuary] {
        for seed in [1, 42, 777] {
            let zone = generate(&t, seed);
            assert!(zone.spawns.iter().all(MonsterSpawn::is_boss));
            assert_eq!(zone.grid.count_type(CellType::Chest), 0);
            let chest_features = zone
                .grid
                .cells
                .iter()
                .flat_map(|cell| &cell.features)
                .filter(|feature| feature.kind == FeatureKind::Chest)
                .count();
            assert_eq!(chest_features, 0);
        }
    }
}

#[test]
fn density_orders_spawn_counts() {
    for kind in ALL_KINDS {
        let count = |density| generate(&template("dense", kind, ZoneSize::Medium, density), 31).spawns.len();
        let (sparse, normal, dense) = (count(Density::Sparse), count(Density::Normal), count(Density::Dense));
        assert!(sparse < normal, "{:?}: {} !< {}", kind, sparse, normal);
        assert!(normal < dense, "{:?}: {} !< {}", kind, normal, dense);
    }
}

#[test]
fn pack_count_is_density_share_of_open_cells() {
    for kind in ALL_KINDS {
        for density in [Density::Sparse, Density::Normal, Density::Dense] {
            let mut t = template("tally", kind, ZoneSize::Small, density);
            t.has_boss = true;

            for seed in 0..50 {
                let zone = generate(&t, seed);
                let candidates = zone
                    .grid
                    .cells
                    .iter()
                    .filter(|cell| cell.is_walkable_empty())
                    .filter(|cell| Some(cell.position()) != zone.grid.boss_position)
                    .count();
                let expected = (candidates as f64 * density.factor()).floor() as usize;
                let regular = zone.spawns.iter().filter(|spawn| !spawn.is_boss()).count();

                assert_eq!(regular, expected, "{:?} {:?} seed {}", kind, density, seed);
                assert_eq!(zone.spawns.len(), expected + 1);
            }
        }
    }
}

#[test]
fn entry_is_open_and_every_floor_cell_is_reachable() {
    for kind in ALL_KINDS {
        for size in [ZoneSize::Small, ZoneSize::Medium, ZoneSize::Large] {
            for seed in [0, 5, 99, 12345] {
                let zone = generate(&template("reach", kind, size, Density::Normal), seed);
                let grid = &zone.grid;

                assert!(!grid.entry_points.is_empty());
                let entry = grid.entry_points[0];
                assert!(grid.is_walkable(entry));
                assert_eq!(
                    reachable_from(grid, entry),
                    grid.walkable_count(),
                    "{:?} {:?} seed {} left unreachable cells",
                    kind,
                    size,
                    seed
                );
            }
        }
    }
}

#[test]
fn exits_lead_to_first_connection() {
    let mut t = template("fork", GeneratorKind::Linear, ZoneSize::Small, Density::Sparse);
    t.connections.push(ZoneConnection {
        target_zone: "ledge".to_string(),
        description: "A narrow path climbs to the ledge".to_string(),
        bidirectional: true,
    });

    let zone = generate(&t, 10);
    assert_eq!(zone.grid.exit_points.len(), 1);
    let exit = &zone.grid.exit_points[0];
    assert_eq!(exit.target_zone, "ledge");
    assert_eq!(zone.grid.cell(exit.position).unwrap().cell_type, CellType::Exit);
}

#[test]
fn spawns_sit_on_walkable_cells_with_matching_occupants() {
    let t = template("crowd", GeneratorKind::Dungeon, ZoneSize::Large, Density::Dense);
    let zone = generate(&t, 64);

    for spawn in &zone.spawns {
        let cell = zone.grid.cell(spawn.position).unwrap();
        assert!(!cell.blocked);
        assert_eq!(cell.occupants, vec![spawn.id.clone()]);
        assert!(spawn.monster_types.len() <= MAX_MONSTER_TYPES);
        assert_eq!(spawn.affixes.len(), spawn.rarity.affix_count());
    }
}

#[test]
fn builtin_act_one_generates_cleanly() {
    let registry = TemplateRegistry::builtin().unwrap();
    assert!(registry.validate().is_empty());

    for template in registry.all() {
        let zone = generate(template, 42);
        let (width, height) = template.size.dimensions();
        assert_eq!((zone.grid.width, zone.grid.height), (width, height));
        assert_eq!(template.has_waypoint, zone.grid.waypoint_position.is_some());
        assert_eq!(template.has_boss, zone.grid.boss_position.is_some());
    }
}

#[test]
fn revealed_map_has_one_row_per_grid_row() {
    let t = template("drawn", GeneratorKind::Maze, ZoneSize::Small, Density::Sparse);
    let zone = generate(&t, 21);
    let map = render_ascii(&zone.grid, MapView::revealed(None));

    let rows: Vec<&str> = map.lines().collect();
    assert_eq!(rows.len(), 15);
    assert!(rows.iter().all(|row| row.chars().count() == 15));
    assert!(map.contains('#'));
    assert!(map.contains('E'));
    assert!(!map.contains(UNDISCOVERED_GLYPH));
}
