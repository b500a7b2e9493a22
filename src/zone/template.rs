use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::{ZoneError, ZoneResult};

const ACT_ONE_TEMPLATES: &str = include_str!("../../data/templates/act1.json");

pub const SAFE_ZONE_FEATURE: &str = "safe_zone";
pub const HAZARDS_FEATURE: &str = "hazards";
pub const SHRINE_FEATURE: &str = "shrine";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneType {
    Outdoor,
    Indoor,
    Town,
    Boss,
    Dungeon,
}

/// Layout algorithm used to carve a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorKind {
    Linear,
    Cave,
    Dungeon,
    Open,
    Maze,
}

/// Grid footprint. Templates that omit a size get `Standard`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneSize {
    Small,
    #[default]
    Standard,
    Medium,
    Large,
}

impl ZoneSize {
    pub fn dimensions(&self) -> (i32, i32) {
        match self {
            ZoneSize::Small => (15, 15),
            ZoneSize::Standard => (20, 20),
            ZoneSize::Medium => (25, 25),
            ZoneSize::Large => (35, 35),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Density {
    Sparse,
    Normal,
    Dense,
}

impl Density {
    /// Fraction of candidate cells that receive a monster pack.
    pub fn factor(&self) -> f64 {
        match self {
            Density::Sparse => 0.2,
            Density::Normal => 0.4,
            Density::Dense => 0.6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Prerequisite {
    ZoneCleared { zone_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneConnection {
    pub target_zone: String,
    pub description: String,
    #[serde(default = "default_bidirectional")]
    pub bidirectional: bool,
}

fn default_bidirectional() -> bool {
    true
}

/// Authoring data for one zone. Never mutated after registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneTemplate {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub level: u32,
    pub act: u32,
    pub zone_type: ZoneType,
    pub generator: GeneratorKind,
    #[serde(default)]
    pub size: ZoneSize,
    pub density: Density,
    #[serde(default)]
    pub monster_pool: Vec<String>,
    #[serde(default)]
    pub has_waypoint: bool,
    #[serde(default)]
    pub has_boss: bool,
    #[serde(default)]
    pub boss_type: Option<String>,
    #[serde(default)]
    pub prerequisites: Vec<Prerequisite>,
    #[serde(default)]
    pub connections: Vec<ZoneConnection>,
    #[serde(default)]
    pub special_features: Vec<String>,
}

impl ZoneTemplate {
    pub fn has_feature(&self, tag: &str) -> bool {
        self.special_features.iter().any(|feature| feature == tag)
    }

    /// Towns and anything tagged `safe_zone` never spawn monsters.
    pub fn is_safe(&self) -> bool {
        self.zone_type == ZoneType::Town || self.has_feature(SAFE_ZONE_FEATURE)
    }

    pub fn boss_name(&self) -> &str {
        self.boss_type.as_deref().unwrap_or("zone_boss")
    }
}

/// Read-only collection of zone templates keyed by id.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: HashMap<String, ZoneTemplate>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the act one zones.
    pub fn builtin() -> ZoneResult<Self> {
        let mut registry = Self::new();
        registry.load_json(ACT_ONE_TEMPLATES)?;
        Ok(registry)
    }

    pub fn register_template(&mut self, template: ZoneTemplate) {
        if self.templates.contains_key(&template.id) {
            log::warn!("Replacing already registered zone template '{}'", template.id);
        }
        self.templates.insert(template.id.clone(), template);
    }

    pub fn register_templates(&mut self, templates: impl IntoIterator<Item = ZoneTemplate>) {
        for template in templates {
            self.register_template(template);
        }
    }

    /// Parses a JSON array of templates and registers them. Returns how many were added.
    pub fn load_json(&mut self, json: &str) -> ZoneResult<usize> {
        let templates: Vec<ZoneTemplate> = serde_json::from_str(json)
            .map_err(|e| ZoneError::InvalidTemplate(e.to_string()))?;
        let count = templates.len();
        self.register_templates(templates);
        Ok(count)
    }

    pub fn load_file(&mut self, path: &Path) -> ZoneResult<usize> {
        let json = fs::read_to_string(path)?;
        self.load_json(&json)
    }

    pub fn get(&self, template_id: &str) -> Option<&ZoneTemplate> {
        self.templates.get(template_id)
    }

    pub fn contains(&self, template_id: &str) -> bool {
        self.templates.contains_key(template_id)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Templates sorted by act, level, then id.
    pub fn all(&self) -> Vec<&ZoneTemplate> {
        let mut templates: Vec<&ZoneTemplate> = self.templates.values().collect();
        templates.sort_by(|a, b| (a.act, a.level, &a.id).cmp(&(b.act, b.level, &b.id)));
        templates
    }

    /// Reports references to zones that are not registered. Problems are
    /// logged and returned, never raised.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        for template in self.all() {
            for connection in &template.connections {
                if !self.contains(&connection.target_zone) {
                    problems.push(format!(
                        "{} connects to unknown zone '{}'",
                        template.id, connection.target_zone
                    ));
                }
            }
            for prerequisite in &template.prerequisites {
                let Prerequisite::ZoneCleared { zone_id } = prerequisite;
                if !self.contains(zone_id) {
                    problems.push(format!(
                        "{} requires clearing unknown zone '{}'",
                        template.id, zone_id
                    ));
                }
            }
            if template.has_boss && template.boss_type.is_none() {
                log::debug!("{} declares a boss without a boss type", template.id);
            }
        }

        for problem in &problems {
            log::warn!("Template registry: {}", problem);
        }

        problems
    }
}
