use serde::{Deserialize, Serialize};

use super::{GridPos, SeededRandom, ZoneGrid, ZoneTemplate};

pub const MAX_MONSTER_TYPES: usize = 3;

pub const AFFIXES: [&str; 8] = [
    "extra_fast",
    "extra_strong",
    "fire_enchanted",
    "cold_enchanted",
    "lightning_enchanted",
    "cursed",
    "stone_skin",
    "vampiric",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackType {
    Melee,
    Ranged,
    Caster,
    Mixed,
    Boss,
}

impl PackType {
    pub const REGULAR: [PackType; 4] = [PackType::Melee, PackType::Ranged, PackType::Caster, PackType::Mixed];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Normal,
    Magic,
    Rare,
    Unique,
}

impl Rarity {
    pub fn experience_multiplier(&self) -> f64 {
        match self {
            Rarity::Normal => 1.0,
            Rarity::Magic => 1.5,
            Rarity::Rare => 2.5,
            Rarity::Unique => 5.0,
        }
    }

    pub fn affix_count(&self) -> usize {
        match self {
            Rarity::Normal => 0,
            Rarity::Magic => 1,
            Rarity::Rare => 2,
            Rarity::Unique => 3,
        }
    }

    pub fn pack_size_range(&self) -> (i32, i32) {
        match self {
            Rarity::Normal => (1, 3),
            Rarity::Magic => (2, 4),
            Rarity::Rare => (3, 6),
            Rarity::Unique => (1, 1),
        }
    }

    pub fn get_name(&self) -> &'static str {
        match self {
            Rarity::Normal => "normal",
            Rarity::Magic => "magic",
            Rarity::Rare => "rare",
            Rarity::Unique => "unique",
        }
    }
}

/// A group of monsters sharing one grid position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonsterSpawn {
    pub id: String,
    pub position: GridPos,
    pub pack_type: PackType,
    pub monster_types: Vec<String>,
    pub pack_size: u32,
    pub rarity: Rarity,
    pub affixes: Vec<String>,
    pub description: String,
}

impl MonsterSpawn {
    pub fn is_boss(&self) -> bool {
        self.pack_type == PackType::Boss
    }
}

/// Rolls the monster packs for a generated grid.
///
/// Safe zones get nothing. Otherwise a density-scaled share of the open
/// cells receives one pack each (chosen without replacement). A boss pack
/// is appended on the boss cell when the template declares one.
pub fn generate_monster_spawns(
    template: &ZoneTemplate,
    grid: &ZoneGrid,
    rng: &mut SeededRandom,
) -> Vec<MonsterSpawn> {
    if template.is_safe() {
        return Vec::new();
    }

    let mut candidates: Vec<GridPos> = grid
        .cells
        .iter()
        .filter(|cell| cell.is_walkable_empty())
        .map(|cell| cell.position())
        .filter(|pos| Some(*pos) != grid.boss_position)
        .collect();

    let spawn_count = (candidates.len() as f64 * template.density.factor()).floor() as usize;
    let mut spawns = Vec::with_capacity(spawn_count + 1);

    if template.monster_pool.is_empty() {
        log::warn!("Zone '{}' has an empty monster pool; only the boss will spawn", template.id);
    } else {
        rng.shuffle(&mut candidates);
        for &position in candidates.iter().take(spawn_count) {
            spawns.push(roll_pack(template, position, rng));
        }
    }

    if template.has_boss {
        if let Some(position) = grid.boss_position {
            spawns.push(boss_pack(template, position, rng));
        }
    }

    spawns
}

fn roll_rarity(rng: &mut SeededRandom) -> Rarity {
    // Unique packs only come from the boss cell; the < 1% unique band rolls rare.
    let roll = rng.next_f64();
    if roll < 0.05 {
        Rarity::Rare
    } else if roll < 0.20 {
        Rarity::Magic
    } else {
        Rarity::Normal
    }
}

fn roll_affixes(rarity: Rarity, rng: &mut SeededRandom) -> Vec<String> {
    let count = rarity.affix_count();
    if count == 0 {
        return Vec::new();
    }
    let mut pool = AFFIXES.to_vec();
    rng.shuffle(&mut pool);
    pool.into_iter().take(count).map(str::to_string).collect()
}

fn roll_pack(template: &ZoneTemplate, position: GridPos, rng: &mut SeededRandom) -> MonsterSpawn {
    let rarity = roll_rarity(rng);
    let (min_size, max_size) = rarity.pack_size_range();
    let pack_size = rng.range(min_size, max_size) as u32;

    let mut pool = template.monster_pool.clone();
    rng.shuffle(&mut pool);
    pool.truncate(MAX_MONSTER_TYPES);

    let pack_type = *rng.pick(&PackType::REGULAR).unwrap_or(&PackType::Mixed);
    let affixes = roll_affixes(rarity, rng);
    let description = describe_pack(pack_size, rarity, &pool);

    MonsterSpawn {
        id: format!("pack-{}-{}", position.x, position.y),
        position,
        pack_type,
        monster_types: pool,
        pack_size,
        rarity,
        affixes,
        description,
    }
}

fn boss_pack(template: &ZoneTemplate, position: GridPos, rng: &mut SeededRandom) -> MonsterSpawn {
    let boss_name = template.boss_name().to_string();
    let description = format!("The {} guards this place", display_name(&boss_name));

    MonsterSpawn {
        id: format!("boss-{}-{}", position.x, position.y),
        position,
        pack_type: PackType::Boss,
        monster_types: vec![boss_name],
        pack_size: 1,
        rarity: Rarity::Unique,
        affixes: roll_affixes(Rarity::Unique, rng),
        description,
    }
}

fn display_name(monster: &str) -> String {
    monster.replace('_', " ")
}

pub fn describe_pack(pack_size: u32, rarity: Rarity, monster_types: &[String]) -> String {
    let prefix = match rarity {
        Rarity::Normal => String::new(),
        other => format!("{} ", other.get_name()),
    };
    let names: Vec<String> = monster_types.iter().map(|name| display_name(name)).collect();
    let names = match names.len() {
        0 => "monsters".to_string(),
        1 => names[0].clone(),
        n => format!("{} and {}", names[..n - 1].join(", "), names[n - 1]),
    };

    if pack_size == 1 {
        format!("A lone {}{}", prefix, names)
    } else {
        format!("A pack of {} {}{}", pack_size, prefix, names)
    }
}

/// Rewrites cell occupant lists so each spawn's id sits on its cell.
pub fn assign_occupants(grid: &mut ZoneGrid, spawns: &[MonsterSpawn]) {
    for cell in &mut grid.cells {
        cell.occupants.clear();
    }
    for spawn in spawns {
        if let Some(cell) = grid.cell_mut(spawn.position) {
            cell.occupants.push(spawn.id.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptions_read_naturally() {
        let types = vec!["fallen".to_string(), "zombie".to_string(), "rhoa_beast".to_string()];
        assert_eq!(
            describe_pack(3, Rarity::Magic, &types),
            "A pack of 3 magic fallen, zombie and rhoa beast"
        );
        assert_eq!(describe_pack(1, Rarity::Normal, &types[..1]), "A lone fallen");
    }

    #[test]
    fn regular_rolls_never_unique() {
        let mut rng = SeededRandom::new(2024);
        for _ in 0..5000 {
            assert_ne!(roll_rarity(&mut rng), Rarity::Unique);
        }
    }

    #[test]
    fn affix_count_matches_rarity() {
        let mut rng = SeededRandom::new(8);
        for rarity in [Rarity::Normal, Rarity::Magic, Rarity::Rare, Rarity::Unique] {
            let affixes = roll_affixes(rarity, &mut rng);
            assert_eq!(affixes.len(), rarity.affix_count());
            let mut unique = affixes.clone();
            unique.sort();
            unique.dedup();
            assert_eq!(unique.len(), affixes.len());
        }
    }
}
