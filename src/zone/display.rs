use ratatui::{
    style::{Color, Style},
    text::{Line, Span},
};

use super::{CellType, GridCell, GridPos, ZoneGrid};

pub const PLAYER_GLYPH: char = '@';
pub const UNDISCOVERED_GLYPH: char = '?';

/// How a grid should be projected to text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapView {
    pub player: Option<GridPos>,
    /// Ignore fog of war and draw every cell.
    pub reveal_all: bool,
}

impl MapView {
    pub fn fogged(player: Option<GridPos>) -> Self {
        Self {
            player,
            reveal_all: false,
        }
    }

    pub fn revealed(player: Option<GridPos>) -> Self {
        Self {
            player,
            reveal_all: true,
        }
    }
}

pub fn cell_glyph(cell: &GridCell) -> char {
    match cell.cell_type {
        CellType::Wall => '#',
        CellType::Empty if cell.has_hazard() => 'H',
        CellType::Empty => '.',
        CellType::Waypoint => 'W',
        CellType::Exit => 'E',
        CellType::Chest => 'C',
        CellType::Boss => 'B',
        CellType::Shrine => 'S',
        CellType::Npc => 'N',
    }
}

fn glyph_color(glyph: char) -> Color {
    match glyph {
        PLAYER_GLYPH => Color::Yellow,
        '#' => Color::DarkGray,
        '.' => Color::Gray,
        'W' => Color::Cyan,
        'E' => Color::Green,
        'C' => Color::LightYellow,
        'H' => Color::LightRed,
        'B' => Color::Red,
        'S' => Color::Magenta,
        'N' => Color::White,
        _ => Color::Black,
    }
}

fn glyph_at(cell: &GridCell, view: MapView) -> char {
    if view.player == Some(cell.position()) {
        return PLAYER_GLYPH;
    }
    if !view.reveal_all && !cell.discovered {
        return UNDISCOVERED_GLYPH;
    }
    cell_glyph(cell)
}

/// Plain-text map, one line per grid row.
pub fn render_ascii(grid: &ZoneGrid, view: MapView) -> String {
    let mut lines = Vec::with_capacity(grid.height as usize);

    for row in grid.cells.chunks(grid.width as usize) {
        let line: String = row.iter().map(|cell| glyph_at(cell, view)).collect();
        lines.push(line);
    }

    lines.join("\n")
}

/// Coloured map for terminal front ends.
pub fn render_lines(grid: &ZoneGrid, view: MapView) -> Vec<Line<'static>> {
    grid.cells
        .chunks(grid.width as usize)
        .map(|row| {
            let spans: Vec<Span<'static>> = row
                .iter()
                .map(|cell| {
                    let glyph = glyph_at(cell, view);
                    Span::styled(glyph.to_string(), Style::default().fg(glyph_color(glyph)))
                })
                .collect();
            Line::from(spans)
        })
        .collect()
}

/// Legend lines to show beside a rendered map.
pub fn map_legend() -> Vec<(char, &'static str)> {
    vec![
        (PLAYER_GLYPH, "You"),
        ('#', "Wall"),
        ('.', "Floor"),
        ('W', "Waypoint"),
        ('E', "Exit"),
        ('C', "Chest"),
        ('H', "Hazard"),
        ('B', "Boss"),
        ('S', "Shrine"),
        ('N', "Vendor"),
        (UNDISCOVERED_GLYPH, "Unexplored"),
    ]
}
