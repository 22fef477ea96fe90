//! Query results handed to the dispatch layer.

use serde::{Deserialize, Serialize};

use crate::types::{ModelSpawn, WorldPoint};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockingSpawn {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaycastResult {
    pub clear: bool,
    /// Length of the queried segment
    pub distance: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hit_distance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hit_point: Option<WorldPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocking_spawn: Option<BlockingSpawn>,
    pub tested_count: u32,
    pub tiles_loaded: u32,
}

impl RaycastResult {
    pub fn clear(distance: f64, tested_count: u32, tiles_loaded: u32) -> Self {
        Self {
            clear: true,
            distance,
            hit_distance: None,
            hit_point: None,
            blocking_spawn: None,
            tested_count,
            tiles_loaded,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadiusMatch {
    #[serde(flatten)]
    pub spawn: ModelSpawn,
    /// Distance from the query center to the spawn's bounding box
    pub distance: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RadiusQueryResult {
    /// Sorted ascending by distance, ties by spawn id
    pub matches: Vec<RadiusMatch>,
    pub tested_count: u32,
    pub tiles_loaded: u32,
}

impl RadiusQueryResult {
    pub fn spawn_ids(&self) -> Vec<u32> {
        self.matches.iter().map(|m| m.spawn.id).collect()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
