use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap};

pub mod events;
pub mod persistence;

pub use events::*;
pub use persistence::*;

use crate::config::ZoneConfig;
use crate::error::{ZoneError, ZoneResult};
use crate::zone::{
    assign_occupants, render_ascii, CellFeature, CellType, ExitPoint, GridPos, MapView,
    MonsterSpawn, Prerequisite, Rarity, TemplateRegistry, ZoneGenerator, ZoneGrid, ZoneTemplate,
};

/// One player's generated copy of a zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneInstance {
    pub id: String,
    pub template: ZoneTemplate,
    pub grid: ZoneGrid,
    pub spawns: Vec<MonsterSpawn>,
    pub original_spawn_count: usize,
    pub player_id: String,
    pub created_at: DateTime<Utc>,
    pub seed: u64,
    pub cleared: bool,
    pub progress: f64,
    pub waypoint_unlocked: bool,
    pub visited_cells: BTreeSet<String>,
}

impl ZoneInstance {
    pub fn template_id(&self) -> &str {
        &self.template.id
    }

    pub fn spawn_at(&self, pos: GridPos) -> Option<&MonsterSpawn> {
        self.spawns.iter().find(|spawn| spawn.position == pos)
    }

    /// Every living pack on `pos`; manual spawn lists may stack several.
    pub fn spawns_at(&self, pos: GridPos) -> impl Iterator<Item = &MonsterSpawn> + '_ {
        self.spawns.iter().filter(move |spawn| spawn.position == pos)
    }

    pub fn remaining_spawns(&self) -> usize {
        self.spawns.len()
    }

    pub fn has_visited(&self, pos: GridPos) -> bool {
        self.visited_cells.contains(&pos.key())
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.created_at)
    }

    fn computed_progress(&self) -> f64 {
        if self.original_spawn_count == 0 {
            return self.progress;
        }
        let defeated = self.original_spawn_count.saturating_sub(self.spawns.len());
        defeated as f64 / self.original_spawn_count as f64 * 100.0
    }

    fn reveal_around(&mut self, pos: GridPos, radius: i32) {
        let radius = radius.max(0);
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if let Some(cell) = self.grid.cell_mut(pos.offset(dx, dy)) {
                    cell.discovered = true;
                }
            }
        }
    }
}

/// Per-call overrides for instance creation.
#[derive(Debug, Clone, Default)]
pub struct InstanceConfig {
    pub seed: Option<u64>,
    /// Replaces the generated monster packs.
    pub spawns: Option<Vec<MonsterSpawn>>,
}

impl InstanceConfig {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            spawns: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MoveOutcome {
    pub position: GridPos,
    pub cell_type: CellType,
    pub description: String,
    /// Packs standing on the cell; the caller starts combat with them.
    pub encounters: Vec<MonsterSpawn>,
    /// True only on the move that unlocked the waypoint.
    pub waypoint_unlocked: bool,
    pub exit: Option<ExitPoint>,
    pub features: Vec<CellFeature>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [Direction::North, Direction::East, Direction::South, Direction::West];

    pub fn delta(&self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
        }
    }

    pub fn get_name(&self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::East => "east",
            Direction::South => "south",
            Direction::West => "west",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DirectionOption {
    pub direction: Direction,
    pub position: GridPos,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DefeatOutcome {
    pub spawn: MonsterSpawn,
    pub experience: u32,
    /// Tags handed to the loot producer.
    pub loot: Vec<String>,
    pub progress: f64,
    /// True only on the defeat that cleared the zone.
    pub zone_cleared: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaypointDestination {
    pub template_id: String,
    pub name: String,
    pub instance_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaypointOutcome {
    Destinations(Vec<WaypointDestination>),
    Travel { target_zone: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessCheck {
    pub allowed: bool,
    pub unmet: Vec<String>,
}

/// Serializable state of a manager, minus its templates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagerSnapshot {
    pub saved_at: DateTime<Utc>,
    pub instances: Vec<ZoneInstance>,
    pub cleared_zones: HashMap<String, BTreeSet<String>>,
}

/// Owns every live zone instance and is the only way to change one.
pub struct ZoneManager {
    registry: TemplateRegistry,
    generator: ZoneGenerator,
    config: ZoneConfig,
    instances: HashMap<String, ZoneInstance>,
    player_instances: HashMap<String, Vec<String>>,
    cleared_zones: HashMap<String, BTreeSet<String>>,
    sink: Box<dyn ZoneEventSink>,
}

impl ZoneManager {
    pub fn new(registry: TemplateRegistry) -> Self {
        Self::with_config(registry, ZoneConfig::default())
    }

    pub fn with_config(registry: TemplateRegistry, config: ZoneConfig) -> Self {
        Self {
            registry,
            generator: ZoneGenerator::new(config.default_seed.unwrap_or(0)),
            config,
            instances: HashMap::new(),
            player_instances: HashMap::new(),
            cleared_zones: HashMap::new(),
            sink: Box::new(LogSink),
        }
    }

    pub fn with_sink(mut self, sink: impl ZoneEventSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    pub fn set_sink(&mut self, sink: impl ZoneEventSink + 'static) {
        self.sink = Box::new(sink);
    }

    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ZoneConfig {
        &self.config
    }

    pub fn register_template(&mut self, template: ZoneTemplate) {
        self.registry.register_template(template);
    }

    pub fn register_templates(&mut self, templates: impl IntoIterator<Item = ZoneTemplate>) {
        self.registry.register_templates(templates);
    }

    fn emit(&mut self, event: ZoneEvent) {
        self.sink.emit(event);
    }

    pub fn get_instance(&self, instance_id: &str) -> Option<&ZoneInstance> {
        self.instances.get(instance_id)
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    pub fn player_instances(&self, player_id: &str) -> Vec<&ZoneInstance> {
        self.player_instances
            .get(player_id)
            .map(|ids| ids.iter().filter_map(|id| self.instances.get(id)).collect())
            .unwrap_or_default()
    }

    fn find_player_instance_id(&self, template_id: &str, player_id: &str) -> Option<String> {
        self.player_instances.get(player_id)?.iter().find_map(|id| {
            self.instances
                .get(id)
                .filter(|instance| instance.template.id == template_id)
                .map(|instance| instance.id.clone())
        })
    }

    pub fn find_player_instance(&self, template_id: &str, player_id: &str) -> Option<&ZoneInstance> {
        let id = self.find_player_instance_id(template_id, player_id)?;
        self.instances.get(&id)
    }

    fn instance_mut(&mut self, instance_id: &str) -> ZoneResult<&mut ZoneInstance> {
        self.instances
            .get_mut(instance_id)
            .ok_or_else(|| ZoneError::InstanceNotFound(instance_id.to_string()))
    }

    fn instance(&self, instance_id: &str) -> ZoneResult<&ZoneInstance> {
        self.instances
            .get(instance_id)
            .ok_or_else(|| ZoneError::InstanceNotFound(instance_id.to_string()))
    }

    fn remove_instance(&mut self, instance_id: &str) -> Option<ZoneInstance> {
        let instance = self.instances.remove(instance_id)?;
        if let Some(ids) = self.player_instances.get_mut(&instance.player_id) {
            ids.retain(|id| id != instance_id);
            if ids.is_empty() {
                self.player_instances.remove(&instance.player_id);
            }
        }
        Some(instance)
    }

    /// Generates a new instance of `template_id` for `player_id`, replacing
    /// any instance of the same zone the player already had.
    pub fn create_zone_instance(
        &mut self,
        template_id: &str,
        player_id: &str,
        config: InstanceConfig,
    ) -> ZoneResult<&ZoneInstance> {
        let template = match self.registry.get(template_id) {
            Some(template) => template.clone(),
            None => {
                log::error!("Cannot create instance: unknown zone template '{}'", template_id);
                return Err(ZoneError::TemplateNotFound(template_id.to_string()));
            }
        };

        let created_at = Utc::now();
        let seed = config
            .seed
            .or(self.config.default_seed)
            .unwrap_or_else(|| derive_seed(template_id, player_id, created_at));

        let mut generated = self.generator.generate_zone(&template, Some(seed));
        if let Some(spawns) = config.spawns {
            assign_occupants(&mut generated.grid, &spawns);
            generated.spawns = spawns;
        }

        // Pick the id while any previous instance is still registered so a
        // reset within the same millisecond still gets a fresh id.
        let mut stamp = created_at.timestamp_millis();
        let mut instance_id = format!("{}-{}-{}", template_id, player_id, stamp);
        while self.instances.contains_key(&instance_id) {
            stamp += 1;
            instance_id = format!("{}-{}-{}", template_id, player_id, stamp);
        }

        if let Some(previous) = self.find_player_instance_id(template_id, player_id) {
            log::info!("Replacing instance {} for player {}", previous, player_id);
            self.remove_instance(&previous);
        }

        let instance = ZoneInstance {
            id: instance_id.clone(),
            template,
            original_spawn_count: generated.spawns.len(),
            grid: generated.grid,
            spawns: generated.spawns,
            player_id: player_id.to_string(),
            created_at,
            seed,
            cleared: false,
            progress: 0.0,
            waypoint_unlocked: false,
            visited_cells: BTreeSet::new(),
        };

        log::info!(
            "Created zone instance {} ({} packs, seed {})",
            instance_id,
            instance.original_spawn_count,
            seed
        );

        self.instances.insert(instance_id.clone(), instance);
        self.player_instances
            .entry(player_id.to_string())
            .or_default()
            .push(instance_id.clone());

        self.emit(ZoneEvent::InstanceCreated {
            instance_id: instance_id.clone(),
            template_id: template_id.to_string(),
            player_id: player_id.to_string(),
        });

        self.instance(&instance_id)
    }

    pub fn get_or_create_zone_instance(
        &mut self,
        template_id: &str,
        player_id: &str,
    ) -> ZoneResult<&ZoneInstance> {
        if let Some(existing) = self.find_player_instance_id(template_id, player_id) {
            return self.instance(&existing);
        }
        self.create_zone_instance(template_id, player_id, InstanceConfig::default())
    }

    /// Throws away the player's instance of the zone and rolls a fresh one.
    pub fn reset_zone_instance(&mut self, template_id: &str, player_id: &str) -> ZoneResult<&ZoneInstance> {
        self.create_zone_instance(template_id, player_id, InstanceConfig::default())
    }

    pub fn move_player_in_zone(&mut self, instance_id: &str, position: GridPos) -> ZoneResult<MoveOutcome> {
        let reveal_radius = self.config.reveal_radius;
        let instance = self.instance_mut(instance_id)?;

        let cell = instance
            .grid
            .cell(position)
            .ok_or(ZoneError::CellNotFound(position))?;
        if cell.blocked {
            return Err(ZoneError::CellBlocked(position));
        }

        instance.reveal_around(position, reveal_radius);
        instance.visited_cells.insert(position.key());

        let unlocked = instance.template.has_waypoint
            && !instance.waypoint_unlocked
            && instance.grid.waypoint_position == Some(position);
        if unlocked {
            instance.waypoint_unlocked = true;
        }

        let cell = instance
            .grid
            .cell(position)
            .ok_or(ZoneError::CellNotFound(position))?;
        let outcome = MoveOutcome {
            position,
            cell_type: cell.cell_type,
            description: cell.describe(),
            encounters: instance.spawns_at(position).cloned().collect(),
            waypoint_unlocked: unlocked,
            exit: instance.grid.exit_at(position).cloned(),
            features: cell.features.clone(),
        };

        let unlock_event = unlocked.then(|| ZoneEvent::WaypointUnlocked {
            instance_id: instance.id.clone(),
            template_id: instance.template.id.clone(),
            player_id: instance.player_id.clone(),
        });

        for spawn in &outcome.encounters {
            log::debug!("{} walked into {} at {}", instance_id, spawn.id, position);
        }
        if let Some(event) = unlock_event {
            log::info!("Waypoint unlocked in {}", instance_id);
            self.emit(event);
        }

        Ok(outcome)
    }

    pub fn get_available_directions(
        &self,
        instance_id: &str,
        position: GridPos,
    ) -> ZoneResult<Vec<DirectionOption>> {
        let instance = self.instance(instance_id)?;

        let options = Direction::ALL
            .iter()
            .filter_map(|direction| {
                let (dx, dy) = direction.delta();
                let target = position.offset(dx, dy);
                let cell = instance.grid.cell(target)?;
                if cell.blocked {
                    return None;
                }

                let description = if !cell.discovered {
                    "unexplored".to_string()
                } else if let Some(spawn) = instance.spawn_at(target) {
                    format!("{} ({})", cell.describe(), spawn.description)
                } else {
                    cell.describe()
                };

                Some(DirectionOption {
                    direction: *direction,
                    position: target,
                    description,
                })
            })
            .collect();

        Ok(options)
    }

    pub fn defeat_monster_pack(&mut self, instance_id: &str, position: GridPos) -> ZoneResult<DefeatOutcome> {
        let instance = self.instance_mut(instance_id)?;

        let index = instance
            .spawns
            .iter()
            .position(|spawn| spawn.position == position)
            .ok_or(ZoneError::NoMonsterPack(position))?;
        let spawn = instance.spawns.remove(index);
        if let Some(cell) = instance.grid.cell_mut(position) {
            cell.occupants.retain(|occupant| occupant != &spawn.id);
        }

        let experience = experience_for(&spawn);
        let loot = loot_tags(&spawn);

        instance.progress = instance.computed_progress().max(instance.progress);
        let zone_cleared = !instance.cleared && instance.progress >= 100.0;
        if zone_cleared {
            instance.cleared = true;
        }

        let progress = instance.progress;
        let template_id = instance.template.id.clone();
        let player_id = instance.player_id.clone();

        self.emit(ZoneEvent::MonsterPackDefeated {
            instance_id: instance_id.to_string(),
            position,
            experience,
        });

        if zone_cleared {
            log::info!("Player {} cleared {}", player_id, template_id);
            self.cleared_zones
                .entry(player_id.clone())
                .or_default()
                .insert(template_id.clone());
            self.emit(ZoneEvent::ZoneCleared {
                instance_id: instance_id.to_string(),
                template_id,
                player_id,
            });
        }

        Ok(DefeatOutcome {
            spawn,
            experience,
            loot,
            progress,
            zone_cleared,
        })
    }

    /// The living boss pack of an instance, if it has one.
    pub fn boss_encounter(&self, instance_id: &str) -> ZoneResult<Option<&MonsterSpawn>> {
        let instance = self.instance(instance_id)?;
        Ok(instance.spawns.iter().find(|spawn| spawn.is_boss()))
    }

    pub fn use_waypoint(&self, instance_id: &str, target_zone: Option<&str>) -> ZoneResult<WaypointOutcome> {
        let instance = self.instance(instance_id)?;
        if !instance.waypoint_unlocked {
            return Err(ZoneError::WaypointLocked(instance.template.name.clone()));
        }

        if let Some(target) = target_zone {
            log::info!("{} travels by waypoint from {} to {}", instance.player_id, instance.template.id, target);
            return Ok(WaypointOutcome::Travel {
                target_zone: target.to_string(),
            });
        }

        let mut destinations: Vec<WaypointDestination> = self
            .player_instances(&instance.player_id)
            .into_iter()
            .filter(|other| other.waypoint_unlocked && other.template.id != instance.template.id)
            .map(|other| WaypointDestination {
                template_id: other.template.id.clone(),
                name: other.template.name.clone(),
                instance_id: other.id.clone(),
            })
            .collect();
        destinations.sort_by(|a, b| a.template_id.cmp(&b.template_id));

        Ok(WaypointOutcome::Destinations(destinations))
    }

    pub fn get_zone_map(&self, instance_id: &str, player_position: Option<GridPos>) -> ZoneResult<String> {
        let instance = self.instance(instance_id)?;
        Ok(render_ascii(&instance.grid, MapView::fogged(player_position)))
    }

    /// Whether the player has ever cleared `template_id`, including
    /// instances that have since expired or been reset.
    pub fn has_cleared(&self, player_id: &str, template_id: &str) -> bool {
        self.cleared_zones
            .get(player_id)
            .map(|zones| zones.contains(template_id))
            .unwrap_or(false)
    }

    pub fn can_access_zone(&self, template_id: &str, player_id: &str) -> ZoneResult<AccessCheck> {
        let template = self
            .registry
            .get(template_id)
            .ok_or_else(|| ZoneError::TemplateNotFound(template_id.to_string()))?;

        let unmet: Vec<String> = template
            .prerequisites
            .iter()
            .filter_map(|prerequisite| match prerequisite {
                Prerequisite::ZoneCleared { zone_id } if !self.has_cleared(player_id, zone_id) => {
                    let name = self
                        .registry
                        .get(zone_id)
                        .map(|zone| zone.name.as_str())
                        .unwrap_or(zone_id.as_str());
                    Some(format!("Clear {} first", name))
                }
                Prerequisite::ZoneCleared { .. } => None,
            })
            .collect();

        Ok(AccessCheck {
            allowed: unmet.is_empty(),
            unmet,
        })
    }

    pub fn cleanup_expired_instances(&mut self, max_age_ms: u64) -> usize {
        self.cleanup_expired_instances_at(Utc::now(), max_age_ms)
    }

    /// Expiry sweep using the configured `instance_max_age_ms`.
    pub fn sweep_expired_instances(&mut self) -> usize {
        let max_age_ms = self.config.instance_max_age_ms;
        self.cleanup_expired_instances(max_age_ms)
    }

    /// Drops every instance older than `max_age_ms` as of `now`.
    pub fn cleanup_expired_instances_at(&mut self, now: DateTime<Utc>, max_age_ms: u64) -> usize {
        let max_age = Duration::milliseconds(max_age_ms.min(i64::MAX as u64) as i64);
        let expired: Vec<String> = self
            .instances
            .values()
            .filter(|instance| instance.age(now) > max_age)
            .map(|instance| instance.id.clone())
            .collect();

        for instance_id in &expired {
            self.remove_instance(instance_id);
        }

        let count = expired.len();
        if count > 0 {
            log::info!("Cleaned up {} expired zone instances", count);
        }
        self.emit(ZoneEvent::InstancesCleaned { count });
        count
    }

    pub fn snapshot(&self) -> ManagerSnapshot {
        let mut instances: Vec<ZoneInstance> = self.instances.values().cloned().collect();
        instances.sort_by(|a, b| a.id.cmp(&b.id));

        ManagerSnapshot {
            saved_at: Utc::now(),
            instances,
            cleared_zones: self.cleared_zones.clone(),
        }
    }

    /// Replaces all instance state with the contents of `snapshot`.
    pub fn restore_snapshot(&mut self, snapshot: ManagerSnapshot) {
        self.instances.clear();
        self.player_instances.clear();
        self.cleared_zones = snapshot.cleared_zones;

        for instance in snapshot.instances {
            if !self.registry.contains(&instance.template.id) {
                log::warn!(
                    "Restored instance {} uses unregistered template '{}'",
                    instance.id,
                    instance.template.id
                );
            }
            self.player_instances
                .entry(instance.player_id.clone())
                .or_default()
                .push(instance.id.clone());
            self.instances.insert(instance.id.clone(), instance);
        }
    }
}

/// Stable seed for an instance when no explicit seed is configured.
pub fn derive_seed(template_id: &str, player_id: &str, created_at: DateTime<Utc>) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(template_id.as_bytes());
    hasher.update(b":");
    hasher.update(player_id.as_bytes());
    hasher.update(b":");
    hasher.update(created_at.timestamp_millis().to_le_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

pub fn experience_for(spawn: &MonsterSpawn) -> u32 {
    (10.0 * spawn.pack_size as f64 * spawn.rarity.experience_multiplier()).round() as u32
}

fn loot_tags(spawn: &MonsterSpawn) -> Vec<String> {
    let mut loot = vec!["gold".to_string()];
    match spawn.rarity {
        Rarity::Normal => {}
        Rarity::Magic => loot.push("magic_item".to_string()),
        Rarity::Rare => loot.push("rare_item".to_string()),
        Rarity::Unique => {
            loot.push("unique_item".to_string());
            loot.push("rare_item".to_string());
        }
    }
    if spawn.pack_size >= 3 {
        loot.push("health_flask".to_string());
    }
    loot
}
