use serde::{Deserialize, Serialize};

use super::{
    assign_occupants, generate_monster_spawns, CellFeature, CellType, ExitPoint, FeatureKind,
    GeneratorKind, GridPos, MonsterSpawn, SeededRandom, VendorKind, ZoneGrid, ZoneTemplate,
    HAZARDS_FEATURE, SHRINE_FEATURE,
};

pub const MAX_ROOM_ATTEMPTS: u32 = 50;
pub const CAVE_SMOOTHING_PASSES: u32 = 5;
pub const CAVE_OPEN_CHANCE: f64 = 0.45;
pub const OPEN_WALL_CHANCE: f64 = 0.10;
pub const CHEST_CHANCE: f64 = 0.05;
pub const HAZARD_CHANCE: f64 = 0.03;
pub const MAX_TOWN_NPCS: usize = 6;

const CARDINALS: [(i32, i32); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];

/// Output of one generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedZone {
    pub grid: ZoneGrid,
    pub spawns: Vec<MonsterSpawn>,
    pub seed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Room {
    x: i32,
    y: i32,
    width: i32,
    height: i32,
}

impl Room {
    fn center(&self) -> GridPos {
        GridPos::new(self.x + self.width / 2, self.y + self.height / 2)
    }

    // One cell of padding keeps neighbouring rooms from merging.
    fn intersects(&self, other: &Room) -> bool {
        self.x - 1 <= other.x + other.width
            && self.x + self.width + 1 >= other.x
            && self.y - 1 <= other.y + other.height
            && self.y + self.height + 1 >= other.y
    }
}

pub struct ZoneGenerator {
    rng: SeededRandom,
    seed: u64,
}

impl ZoneGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: SeededRandom::new(seed),
            seed,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Rebinds the random source; the next generation starts from `seed`.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = SeededRandom::new(seed);
        self.seed = seed;
    }

    /// Builds the grid and monster spawns for `template`. Passing a seed
    /// rebinds the generator first, so the result depends only on the
    /// template and that seed.
    pub fn generate_zone(&mut self, template: &ZoneTemplate, seed: Option<u64>) -> GeneratedZone {
        if let Some(seed) = seed {
            self.reseed(seed);
        }

        let mut grid = self.generate_grid(template);
        let spawns = generate_monster_spawns(template, &grid, &mut self.rng);
        assign_occupants(&mut grid, &spawns);

        log::debug!(
            "Generated zone '{}' ({:?}, {}x{}, seed {}): {} walkable cells, {} packs",
            template.id,
            template.generator,
            grid.width,
            grid.height,
            self.seed,
            grid.walkable_count(),
            spawns.len()
        );

        GeneratedZone {
            grid,
            spawns,
            seed: self.seed,
        }
    }

    pub fn generate_grid(&mut self, template: &ZoneTemplate) -> ZoneGrid {
        let (width, height) = template.size.dimensions();
        let mut grid = ZoneGrid::new(width, height);

        carve_layout(template.generator, &mut grid, &mut self.rng);
        retain_largest_region(&mut grid);

        place_entry(&mut grid);
        place_exit(&mut grid, template);
        if template.has_waypoint {
            place_waypoint(&mut grid);
        }
        if template.has_boss {
            place_boss(&mut grid);
        }

        if template.is_safe() {
            place_vendors(&mut grid, &mut self.rng);
        } else {
            self.place_features(&mut grid, template);
        }

        grid
    }

    fn place_features(&mut self, grid: &mut ZoneGrid, template: &ZoneTemplate) {
        if template.has_feature(SHRINE_FEATURE) {
            let candidates = open_cells(grid);
            if let Some(&pos) = self.rng.pick(&candidates) {
                grid.set_type(pos, CellType::Shrine);
            }
        }

        let chest_descriptions = [
            "A battered strongbox",
            "An iron-banded chest",
            "A moss-covered coffer",
            "A splintered supply crate",
        ];
        for pos in open_cells(grid) {
            if self.rng.chance(CHEST_CHANCE) {
                let description = self.rng.pick(&chest_descriptions).copied().unwrap_or("A chest");
                if let Some(cell) = grid.cell_mut(pos) {
                    cell.set_type(CellType::Chest);
                    cell.features.push(CellFeature {
                        kind: FeatureKind::Chest,
                        description: description.to_string(),
                    });
                }
            }
        }

        if template.has_feature(HAZARDS_FEATURE) {
            for pos in open_cells(grid) {
                if self.rng.chance(HAZARD_CHANCE) {
                    if let Some(cell) = grid.cell_mut(pos) {
                        cell.features.push(CellFeature {
                            kind: FeatureKind::Hazard,
                            description: "The ground here is treacherous".to_string(),
                        });
                    }
                }
            }
        }
    }
}

/// Applies the layout algorithm for `kind` to a freshly created grid.
pub fn carve_layout(kind: GeneratorKind, grid: &mut ZoneGrid, rng: &mut SeededRandom) {
    match kind {
        GeneratorKind::Linear => carve_linear(grid, rng),
        GeneratorKind::Cave => carve_cave(grid, rng),
        GeneratorKind::Dungeon => carve_dungeon(grid, rng),
        GeneratorKind::Open => carve_open(grid, rng),
        GeneratorKind::Maze => carve_maze(grid, rng),
    }
}

fn carve_linear(grid: &mut ZoneGrid, rng: &mut SeededRandom) {
    grid.fill(CellType::Wall);

    let mid_y = grid.height / 2;
    for x in 0..grid.width {
        grid.set_type(GridPos::new(x, mid_y), CellType::Empty);
    }

    let branch_count = rng.range(2, 4);
    for _ in 0..branch_count {
        let x = rng.range(2, grid.width - 3);
        let length = rng.range(2, (grid.height / 2 - 1).max(2));
        let direction = if rng.chance(0.5) { -1 } else { 1 };

        for step in 1..=length {
            let y = mid_y + direction * step;
            if y <= 0 || y >= grid.height - 1 {
                break;
            }
            grid.set_type(GridPos::new(x, y), CellType::Empty);
        }
    }
}

fn carve_cave(grid: &mut ZoneGrid, rng: &mut SeededRandom) {
    grid.fill(CellType::Wall);
    for cell in &mut grid.cells {
        if rng.chance(CAVE_OPEN_CHANCE) {
            cell.set_type(CellType::Empty);
        }
    }

    for _ in 0..CAVE_SMOOTHING_PASSES {
        let walls: Vec<bool> = grid.cells.iter().map(|cell| cell.blocked).collect();

        for y in 0..grid.height {
            for x in 0..grid.width {
                let mut wall_neighbours = 0;
                for dy in -1..=1 {
                    for dx in -1..=1 {
                        if dx == 0 && dy == 0 {
                            continue;
                        }
                        // Outside the grid counts as rock.
                        let is_wall = grid
                            .index_of(GridPos::new(x + dx, y + dy))
                            .map(|idx| walls[idx])
                            .unwrap_or(true);
                        if is_wall {
                            wall_neighbours += 1;
                        }
                    }
                }

                let cell_type = if wall_neighbours > 4 { CellType::Wall } else { CellType::Empty };
                grid.set_type(GridPos::new(x, y), cell_type);
            }
        }
    }
}

fn carve_dungeon(grid: &mut ZoneGrid, rng: &mut SeededRandom) {
    grid.fill(CellType::Wall);

    let room_target = (grid.width * grid.height) / 200 + 3;
    let mut rooms: Vec<Room> = Vec::new();

    for _ in 0..room_target {
        for _ in 0..MAX_ROOM_ATTEMPTS {
            let width = rng.range(4, 9);
            let height = rng.range(4, 9);
            if width > grid.width - 2 || height > grid.height - 2 {
                continue;
            }

            let room = Room {
                x: rng.range(1, grid.width - width - 1),
                y: rng.range(1, grid.height - height - 1),
                width,
                height,
            };

            if rooms.iter().any(|other| room.intersects(other)) {
                continue;
            }
            rooms.push(room);
            break;
        }
    }

    for room in &rooms {
        for y in room.y..(room.y + room.height) {
            for x in room.x..(room.x + room.width) {
                grid.set_type(GridPos::new(x, y), CellType::Empty);
            }
        }
    }

    for pair in rooms.windows(2) {
        carve_corridor(grid, pair[0].center(), pair[1].center());
    }

    log::debug!("Dungeon layout placed {} of {} rooms", rooms.len(), room_target);
}

/// L-shaped corridor: horizontal run along `from.y`, then vertical along `to.x`.
fn carve_corridor(grid: &mut ZoneGrid, from: GridPos, to: GridPos) {
    for x in from.x.min(to.x)..=from.x.max(to.x) {
        grid.set_type(GridPos::new(x, from.y), CellType::Empty);
    }
    for y in from.y.min(to.y)..=from.y.max(to.y) {
        grid.set_type(GridPos::new(to.x, y), CellType::Empty);
    }
}

fn carve_open(grid: &mut ZoneGrid, rng: &mut SeededRandom) {
    grid.fill(CellType::Empty);
    for cell in &mut grid.cells {
        if rng.chance(OPEN_WALL_CHANCE) {
            cell.set_type(CellType::Wall);
        }
    }
}

fn carve_maze(grid: &mut ZoneGrid, rng: &mut SeededRandom) {
    grid.fill(CellType::Wall);

    let columns = ((grid.width - 1) / 2).max(1) as usize;
    let rows = ((grid.height - 1) / 2).max(1) as usize;
    let start = GridPos::new(1 + 2 * rng.index(columns) as i32, 1 + 2 * rng.index(rows) as i32);

    let mut visited = vec![false; grid.cells.len()];
    let mut stack = vec![start];
    if let Some(idx) = grid.index_of(start) {
        visited[idx] = true;
    }
    grid.set_type(start, CellType::Empty);

    while let Some(&current) = stack.last() {
        let unvisited: Vec<GridPos> = CARDINALS
            .iter()
            .map(|&(dx, dy)| current.offset(dx * 2, dy * 2))
            .filter(|pos| {
                pos.x >= 1 && pos.x <= grid.width - 2 && pos.y >= 1 && pos.y <= grid.height - 2
            })
            .filter(|pos| grid.index_of(*pos).map(|idx| !visited[idx]).unwrap_or(false))
            .collect();

        let Some(&next) = rng.pick(&unvisited) else {
            stack.pop();
            continue;
        };

        let between = GridPos::new((current.x + next.x) / 2, (current.y + next.y) / 2);
        grid.set_type(between, CellType::Empty);
        grid.set_type(next, CellType::Empty);
        if let Some(idx) = grid.index_of(next) {
            visited[idx] = true;
        }
        stack.push(next);
    }
}

/// Walls off every walkable region except the largest one. Returns how many
/// cells were filled in.
pub fn retain_largest_region(grid: &mut ZoneGrid) -> usize {
    let mut visited = vec![false; grid.cells.len()];
    let mut regions: Vec<Vec<usize>> = Vec::new();

    for start in 0..grid.cells.len() {
        if visited[start] || grid.cells[start].blocked {
            continue;
        }

        let mut region = Vec::new();
        let mut stack = vec![start];
        visited[start] = true;

        while let Some(idx) = stack.pop() {
            region.push(idx);
            let pos = grid.cells[idx].position();
            for (dx, dy) in CARDINALS {
                if let Some(next) = grid.index_of(pos.offset(dx, dy)) {
                    if !visited[next] && !grid.cells[next].blocked {
                        visited[next] = true;
                        stack.push(next);
                    }
                }
            }
        }

        regions.push(region);
    }

    let mut largest = 0;
    for (i, region) in regions.iter().enumerate() {
        if region.len() > regions[largest].len() {
            largest = i;
        }
    }

    let mut filled = 0;
    for (i, region) in regions.iter().enumerate() {
        if i == largest {
            continue;
        }
        for &idx in region {
            grid.cells[idx].set_type(CellType::Wall);
            filled += 1;
        }
    }

    if filled > 0 {
        log::debug!("Connectivity repair walled off {} cells in {} regions", filled, regions.len() - 1);
    }
    filled
}

// Walkable, still-plain cells that are not entry points.
fn is_open(grid: &ZoneGrid, pos: GridPos) -> bool {
    grid.cell(pos).map(|cell| cell.is_walkable_empty()).unwrap_or(false) && !grid.is_entry(pos)
}

fn open_cells(grid: &ZoneGrid) -> Vec<GridPos> {
    grid.cells
        .iter()
        .map(|cell| cell.position())
        .filter(|pos| is_open(grid, *pos))
        .collect()
}

/// Carves `pos` open when a placement scan finds nothing.
fn fallback_cell(grid: &mut ZoneGrid, pos: GridPos) -> GridPos {
    grid.set_type(pos, CellType::Empty);
    pos
}

fn place_entry(grid: &mut ZoneGrid) {
    let left_edge = (0..grid.height)
        .map(|y| GridPos::new(0, y))
        .find(|pos| grid.is_walkable(*pos));
    let leftmost = left_edge.or_else(|| {
        (0..grid.width)
            .flat_map(|x| (0..grid.height).map(move |y| GridPos::new(x, y)))
            .find(|pos| grid.is_walkable(*pos))
    });

    let pos = match leftmost {
        Some(pos) => pos,
        None => fallback_cell(grid, GridPos::new(0, grid.height / 2)),
    };
    grid.entry_points.push(pos);
}

fn place_exit(grid: &mut ZoneGrid, template: &ZoneTemplate) {
    let (target_zone, description) = template
        .connections
        .first()
        .map(|connection| (connection.target_zone.clone(), connection.description.clone()))
        .unwrap_or_else(|| ("next_zone".to_string(), "A path leads onward".to_string()));

    let right = grid.width - 1;
    let right_edge = (0..grid.height)
        .rev()
        .map(|y| GridPos::new(right, y))
        .find(|pos| is_open(grid, *pos));
    let rightmost = right_edge.or_else(|| {
        (0..grid.width)
            .rev()
            .flat_map(|x| (0..grid.height).rev().map(move |y| GridPos::new(x, y)))
            .find(|pos| is_open(grid, *pos))
    });

    let pos = match rightmost {
        Some(pos) => pos,
        None => fallback_cell(grid, GridPos::new(right, grid.height / 2)),
    };
    grid.set_type(pos, CellType::Exit);
    grid.exit_points.push(ExitPoint {
        position: pos,
        target_zone,
        description,
    });
}

fn place_waypoint(grid: &mut ZoneGrid) {
    let center = grid.center();
    let nearest = open_cells(grid)
        .into_iter()
        .min_by_key(|pos| pos.manhattan(&center));

    let pos = match nearest {
        Some(pos) => pos,
        None => fallback_cell(grid, center),
    };
    grid.set_type(pos, CellType::Waypoint);
    grid.waypoint_position = Some(pos);
}

fn place_boss(grid: &mut ZoneGrid) {
    let rightmost = (0..grid.width)
        .rev()
        .flat_map(|x| (0..grid.height).map(move |y| GridPos::new(x, y)))
        .find(|pos| is_open(grid, *pos));

    let pos = match rightmost {
        Some(pos) => pos,
        None => fallback_cell(grid, GridPos::new(grid.width - 2, grid.height / 2)),
    };
    grid.set_type(pos, CellType::Boss);
    grid.boss_position = Some(pos);
}

fn place_vendors(grid: &mut ZoneGrid, rng: &mut SeededRandom) {
    let mut candidates = open_cells(grid);
    rng.shuffle(&mut candidates);

    for (pos, vendor) in candidates.into_iter().zip(VendorKind::ALL.iter().take(MAX_TOWN_NPCS)) {
        if let Some(cell) = grid.cell_mut(pos) {
            cell.set_type(CellType::Npc);
            cell.features.push(CellFeature {
                kind: FeatureKind::Npc { vendor: *vendor },
                description: format!("{} ready to trade", vendor.get_name()),
            });
        }
    }
}
