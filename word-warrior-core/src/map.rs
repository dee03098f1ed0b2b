//! Floor maps and encounter generation.
//!
//! Every floor is a straight path of ten nodes ending in a boss. The player
//! walks forward one node at a time and never revisits a completed node.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Nodes per floor.
pub const NODES_PER_FLOOR: usize = 10;

/// What waits at a map node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    Battle,
    Elite,
    Boss,
    Treasure,
    Shop,
    Rest,
    Event,
}

impl NodeType {
    pub fn name(&self) -> &'static str {
        match self {
            NodeType::Battle => "Battle",
            NodeType::Elite => "Elite",
            NodeType::Boss => "Boss",
            NodeType::Treasure => "Treasure",
            NodeType::Shop => "Shop",
            NodeType::Rest => "Rest",
            NodeType::Event => "Event",
        }
    }

    pub fn is_combat(&self) -> bool {
        matches!(self, NodeType::Battle | NodeType::Elite | NodeType::Boss)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapNode {
    pub id: String,
    pub node_type: NodeType,
    /// Position along the path.
    pub x: usize,
    pub y: usize,
    pub connections: Vec<String>,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapState {
    pub nodes: Vec<MapNode>,
    pub current_node_id: String,
    pub floor: u32,
}

fn node_id(floor: u32, index: usize) -> String {
    format!("node_{floor}_{index}")
}

fn node_type_at(index: usize) -> NodeType {
    if index == NODES_PER_FLOOR - 1 {
        NodeType::Boss
    } else if index % 4 == 3 {
        NodeType::Rest
    } else if index % 3 == 2 && index != NODES_PER_FLOOR - 2 {
        NodeType::Elite
    } else {
        NodeType::Battle
    }
}

/// Build the linear map for a floor (1-based). The player starts on node 0.
pub fn generate_floor_map(floor: u32) -> MapState {
    let nodes: Vec<MapNode> = (0..NODES_PER_FLOOR)
        .map(|i| MapNode {
            id: node_id(floor, i),
            node_type: node_type_at(i),
            x: i,
            y: 0,
            connections: if i + 1 < NODES_PER_FLOOR {
                vec![node_id(floor, i + 1)]
            } else {
                Vec::new()
            },
            completed: false,
        })
        .collect();

    MapState {
        current_node_id: nodes[0].id.clone(),
        nodes,
        floor,
    }
}

impl MapState {
    pub fn node(&self, id: &str) -> Option<&MapNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn current_node(&self) -> Option<&MapNode> {
        self.node(&self.current_node_id)
    }

    /// Nodes directly reachable from the current node.
    pub fn reachable_nodes(&self) -> Vec<&MapNode> {
        let Some(current) = self.current_node() else {
            return Vec::new();
        };
        self.nodes
            .iter()
            .filter(|n| current.connections.contains(&n.id))
            .collect()
    }

    pub fn can_move_to(&self, target_id: &str) -> bool {
        self.current_node()
            .is_some_and(|n| n.connections.iter().any(|c| c == target_id))
    }

    /// Move along a connection. An unreachable target leaves the map unchanged.
    pub fn move_to_node(&self, target_id: &str) -> MapState {
        if !self.can_move_to(target_id) {
            warn!(
                from = %self.current_node_id,
                to = target_id,
                "target node is not reachable"
            );
            return self.clone();
        }
        MapState {
            current_node_id: target_id.to_string(),
            ..self.clone()
        }
    }

    /// Mark a node completed. Completing twice is a no-op.
    pub fn complete_node(&self, node_id: &str) -> MapState {
        let mut next = self.clone();
        if let Some(node) = next.nodes.iter_mut().find(|n| n.id == node_id) {
            node.completed = true;
        }
        next
    }
}

// ============================================================================
// Encounters
// ============================================================================

/// Enemy archetype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnemyKind {
    Slime,
    EliteSlime,
    BossSlime,
}

impl EnemyKind {
    pub fn name(&self) -> &'static str {
        match self {
            EnemyKind::Slime => "slime",
            EnemyKind::EliteSlime => "elite_slime",
            EnemyKind::BossSlime => "boss_slime",
        }
    }

    /// HP relative to a plain slime on the same floor, in percent.
    pub fn strength_percent(&self) -> u64 {
        match self {
            EnemyKind::Slime => 100,
            EnemyKind::EliteSlime => 150,
            EnemyKind::BossSlime => 200,
        }
    }
}

impl fmt::Display for EnemyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Enemy composition for a combat node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Encounter {
    pub kind: EnemyKind,
    pub enemy_count: u32,
    pub floor: u32,
}

impl Encounter {
    /// Max HP of each enemy in this encounter.
    pub fn enemy_hp(&self, base_hp: u32) -> u32 {
        hp_for(base_hp, self.floor, self.kind.strength_percent())
    }
}

/// Base HP scaled to a floor (or level): +20% per step past the first, rounded down.
pub fn scaled_hp(base_hp: u32, floor: u32) -> u32 {
    hp_for(base_hp, floor, 100)
}

/// `floor(base * (1 + (floor-1)*0.2) * kind)`, rounded once and saturating at `u32::MAX`.
fn hp_for(base_hp: u32, floor: u32, kind_percent: u64) -> u32 {
    let floor_percent = 100 + 20 * u64::from(floor.saturating_sub(1));
    let hp = u128::from(base_hp) * u128::from(floor_percent) * u128::from(kind_percent) / 10_000;
    u32::try_from(hp).unwrap_or(u32::MAX)
}

/// Enemy composition for a node, or `None` for non-combat nodes.
pub fn generate_encounter(node_type: NodeType, floor: u32) -> Option<Encounter> {
    let (kind, enemy_count) = match node_type {
        NodeType::Battle => (EnemyKind::Slime, 1 + floor / 3),
        NodeType::Elite => (EnemyKind::EliteSlime, 1),
        NodeType::Boss => (EnemyKind::BossSlime, 1),
        _ => return None,
    };
    Some(Encounter {
        kind,
        enemy_count,
        floor,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_floor_map_is_linear_with_boss_at_end() {
        for floor in 1..=5 {
            let map = generate_floor_map(floor);
            assert_eq!(map.nodes.len(), 10);
            assert_eq!(map.floor, floor);
            assert_eq!(map.current_node_id, map.nodes[0].id);
            assert_eq!(map.nodes[9].node_type, NodeType::Boss);
            assert!(map.nodes[9].connections.is_empty());
            for i in 0..9 {
                assert_eq!(map.nodes[i].connections, vec![map.nodes[i + 1].id.clone()]);
            }
            assert!(map.nodes.iter().all(|n| !n.completed));
        }
    }

    #[test]
    fn test_node_type_layout() {
        use NodeType::*;
        let map = generate_floor_map(1);
        let types: Vec<NodeType> = map.nodes.iter().map(|n| n.node_type).collect();
        assert_eq!(
            types,
            vec![Battle, Battle, Elite, Rest, Battle, Elite, Battle, Rest, Battle, Boss]
        );
    }

    #[test]
    fn test_move_to_connected_node() {
        let map = generate_floor_map(1);
        let moved = map.move_to_node("node_1_1");
        assert_eq!(moved.current_node_id, "node_1_1");
        assert_eq!(moved.reachable_nodes()[0].id, "node_1_2");
    }

    #[test]
    fn test_move_to_unreachable_node_is_rejected() {
        let map = generate_floor_map(1);
        assert_eq!(map.move_to_node("node_1_5"), map);
        assert_eq!(map.move_to_node("node_1_0"), map);
        assert_eq!(map.move_to_node("nowhere"), map);
    }

    #[test]
    fn test_complete_node_is_idempotent() {
        let map = generate_floor_map(2);
        let once = map.complete_node("node_2_0");
        let twice = once.complete_node("node_2_0");
        assert_eq!(once, twice);
        assert!(once.nodes[0].completed);
        assert!(!once.nodes[1].completed);
        assert_eq!(map.complete_node("missing"), map);
    }

    #[test]
    fn test_encounters_scale_with_floor() {
        let early = generate_encounter(NodeType::Battle, 1).unwrap();
        let late = generate_encounter(NodeType::Battle, 6).unwrap();
        assert_eq!(early.enemy_count, 1);
        assert_eq!(late.enemy_count, 3);
        assert!(late.enemy_hp(500) > early.enemy_hp(500));

        assert_eq!(early.enemy_hp(500), 500);
        assert_eq!(generate_encounter(NodeType::Elite, 1).unwrap().enemy_hp(500), 750);
        assert_eq!(generate_encounter(NodeType::Boss, 1).unwrap().enemy_hp(500), 1000);
        assert_eq!(generate_encounter(NodeType::Boss, 3).unwrap().enemy_hp(500), 1400);
    }

    #[test]
    fn test_enemy_hp_rounds_once() {
        let elite_2 = generate_encounter(NodeType::Elite, 2).unwrap();
        assert_eq!(elite_2.enemy_hp(333), 599);
        let elite_4 = generate_encounter(NodeType::Elite, 4).unwrap();
        assert_eq!(elite_4.enemy_hp(1), 2);
        assert_eq!(scaled_hp(333, 2), 399);
    }

    #[test]
    fn test_enemy_hp_saturates() {
        let boss = generate_encounter(NodeType::Boss, 1).unwrap();
        assert_eq!(boss.enemy_hp(3_000_000_000), u32::MAX);
        assert_eq!(scaled_hp(u32::MAX, 50), u32::MAX);
    }

    #[test]
    fn test_non_combat_nodes_have_no_encounter() {
        for node_type in [
            NodeType::Rest,
            NodeType::Treasure,
            NodeType::Shop,
            NodeType::Event,
        ] {
            assert!(generate_encounter(node_type, 1).is_none());
            assert!(!node_type.is_combat());
        }
    }
}
