use serde::{Deserialize, Serialize};
use std::fmt;

pub mod rng;
pub mod template;
pub mod generator;
pub mod spawns;
pub mod display;

pub use rng::*;
pub use template::*;
pub use generator::*;
pub use spawns::*;
pub use display::*;

/// Position of a cell inside a zone grid. `y` grows downwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
}

impl GridPos {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The `"x,y"` key used for visited-cell bookkeeping.
    pub fn key(&self) -> String {
        format!("{},{}", self.x, self.y)
    }

    pub fn manhattan(&self, other: &GridPos) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    pub fn offset(&self, dx: i32, dy: i32) -> GridPos {
        GridPos::new(self.x + dx, self.y + dy)
    }
}

impl fmt::Display for GridPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellType {
    Empty,
    Wall,
    Exit,
    Waypoint,
    Chest,
    Boss,
    Shrine,
    Npc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VendorKind {
    Weapon,
    Armor,
    Accessory,
    Flask,
    General,
    WaypointMaster,
}

impl VendorKind {
    pub const ALL: [VendorKind; 6] = [
        VendorKind::Weapon,
        VendorKind::Armor,
        VendorKind::Accessory,
        VendorKind::Flask,
        VendorKind::General,
        VendorKind::WaypointMaster,
    ];

    pub fn get_name(&self) -> &'static str {
        match self {
            VendorKind::Weapon => "Weaponsmith",
            VendorKind::Armor => "Armorer",
            VendorKind::Accessory => "Jeweler",
            VendorKind::Flask => "Alchemist",
            VendorKind::General => "General Goods",
            VendorKind::WaypointMaster => "Waypoint Master",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureKind {
    Chest,
    Npc { vendor: VendorKind },
    Hazard,
}

/// An interactive prop sitting on a cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellFeature {
    pub kind: FeatureKind,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridCell {
    pub x: i32,
    pub y: i32,
    pub cell_type: CellType,
    pub blocked: bool,
    pub discovered: bool,
    pub occupants: Vec<String>,
    pub features: Vec<CellFeature>,
}

impl GridCell {
    pub fn new(x: i32, y: i32) -> Self {
        Self {
            x,
            y,
            cell_type: CellType::Empty,
            blocked: false,
            discovered: false,
            occupants: Vec::new(),
            features: Vec::new(),
        }
    }

    pub fn position(&self) -> GridPos {
        GridPos::new(self.x, self.y)
    }

    /// Sets the cell type and keeps `blocked` in step with it.
    pub fn set_type(&mut self, cell_type: CellType) {
        self.cell_type = cell_type;
        self.blocked = cell_type == CellType::Wall;
    }

    pub fn is_walkable_empty(&self) -> bool {
        !self.blocked && self.cell_type == CellType::Empty
    }

    pub fn has_hazard(&self) -> bool {
        self.features.iter().any(|f| f.kind == FeatureKind::Hazard)
    }

    pub fn describe(&self) -> String {
        match self.cell_type {
            CellType::Empty if self.has_hazard() => "A hazardous stretch of ground".to_string(),
            CellType::Empty => "An open passage".to_string(),
            CellType::Wall => "Solid rock".to_string(),
            CellType::Exit => "A path leading out of the area".to_string(),
            CellType::Waypoint => "A waypoint humming with stored power".to_string(),
            CellType::Chest => "A chest waiting to be opened".to_string(),
            CellType::Boss => "An ominous lair".to_string(),
            CellType::Shrine => "A weathered shrine".to_string(),
            CellType::Npc => match self.features.first() {
                Some(feature) => feature.description.clone(),
                None => "A traveller resting here".to_string(),
            },
        }
    }
}

/// A way out of the zone, tagged with the zone it leads to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitPoint {
    pub position: GridPos,
    pub target_zone: String,
    pub description: String,
}

/// Rectangular cell grid addressed by `y * width + x`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneGrid {
    pub width: i32,
    pub height: i32,
    pub cells: Vec<GridCell>,
    pub entry_points: Vec<GridPos>,
    pub exit_points: Vec<ExitPoint>,
    pub waypoint_position: Option<GridPos>,
    pub boss_position: Option<GridPos>,
}

impl ZoneGrid {
    pub fn new(width: i32, height: i32) -> Self {
        let mut cells = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                cells.push(GridCell::new(x, y));
            }
        }

        Self {
            width,
            height,
            cells,
            entry_points: Vec::new(),
            exit_points: Vec::new(),
            waypoint_position: None,
            boss_position: None,
        }
    }

    pub fn in_bounds(&self, pos: GridPos) -> bool {
        pos.x >= 0 && pos.x < self.width && pos.y >= 0 && pos.y < self.height
    }

    pub fn index_of(&self, pos: GridPos) -> Option<usize> {
        if self.in_bounds(pos) {
            Some((pos.y * self.width + pos.x) as usize)
        } else {
            None
        }
    }

    pub fn cell(&self, pos: GridPos) -> Option<&GridCell> {
        self.index_of(pos).map(|idx| &self.cells[idx])
    }

    pub fn cell_mut(&mut self, pos: GridPos) -> Option<&mut GridCell> {
        self.index_of(pos).map(move |idx| &mut self.cells[idx])
    }

    /// Looks a cell up by its `"x,y"` key.
    pub fn cell_by_key(&self, key: &str) -> Option<&GridCell> {
        let (x, y) = key.split_once(',')?;
        let pos = GridPos::new(x.trim().parse().ok()?, y.trim().parse().ok()?);
        self.cell(pos)
    }

    pub fn is_walkable(&self, pos: GridPos) -> bool {
        self.cell(pos).map(|cell| !cell.blocked).unwrap_or(false)
    }

    pub fn set_type(&mut self, pos: GridPos, cell_type: CellType) {
        if let Some(cell) = self.cell_mut(pos) {
            cell.set_type(cell_type);
        }
    }

    pub fn fill(&mut self, cell_type: CellType) {
        for cell in &mut self.cells {
            cell.set_type(cell_type);
        }
    }

    pub fn walkable_count(&self) -> usize {
        self.cells.iter().filter(|cell| !cell.blocked).count()
    }

    pub fn count_type(&self, cell_type: CellType) -> usize {
        self.cells.iter().filter(|cell| cell.cell_type == cell_type).count()
    }

    pub fn center(&self) -> GridPos {
        GridPos::new(self.width / 2, self.height / 2)
    }

    pub fn is_entry(&self, pos: GridPos) -> bool {
        self.entry_points.contains(&pos)
    }

    pub fn exit_at(&self, pos: GridPos) -> Option<&ExitPoint> {
        self.exit_points.iter().find(|exit| exit.position == pos)
    }
}
