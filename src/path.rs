//! Waypoint source adapter: ordered raw path nodes per path id.

use crate::math::Point3;
use crate::world::MapId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type PathId = u32;

#[derive(Deserialize, Serialize, PartialEq, Eq, Clone, Copy, Debug, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActionFlag {
    #[default]
    None,
    /// node reached by a map jump, never interpolated towards
    TeleportAnchor,
    /// dock where the platform pauses for its wait time
    Stop,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug)]
pub struct PathNode {
    pub map: MapId,
    pub pos: Point3,
    #[serde(default)]
    pub action: ActionFlag,
    #[serde(default)]
    pub wait_secs: u32,
}

impl PathNode {
    pub fn new(map: MapId, pos: Point3, action: ActionFlag, wait_secs: u32) -> Self {
        Self {
            map,
            pos,
            action,
            wait_secs,
        }
    }
}

/// One row of the path data source.
#[derive(Deserialize, Serialize, Clone, Copy, Debug)]
pub struct PathRow {
    pub path: PathId,
    pub seq: u32,
    #[serde(flatten)]
    pub node: PathNode,
}

/// Contract of the path data source, consumed once at platform construction.
pub trait PathSource {
    /// Nodes of `path` in sequence order.  Empty when the path is unknown.
    fn nodes_for(&self, path: PathId) -> Vec<PathNode>;
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryPathSource {
    paths: HashMap<PathId, Vec<PathNode>>,
}

impl InMemoryPathSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: impl IntoIterator<Item = PathRow>) -> Self {
        let mut keyed: HashMap<PathId, Vec<(u32, PathNode)>> = HashMap::new();
        for row in rows {
            keyed.entry(row.path).or_default().push((row.seq, row.node));
        }
        let mut source = Self::new();
        for (path, mut nodes) in keyed {
            nodes.sort_by_key(|(seq, _)| *seq);
            source
                .paths
                .insert(path, nodes.into_iter().map(|(_, node)| node).collect());
        }
        source
    }

    /// Parses a JSON array of [`PathRow`]s.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        let rows: Vec<PathRow> = serde_json::from_str(json)?;
        Ok(Self::from_rows(rows))
    }

    pub fn insert(&mut self, path: PathId, nodes: Vec<PathNode>) {
        self.paths.insert(path, nodes);
    }
}

impl PathSource for InMemoryPathSource {
    fn nodes_for(&self, path: PathId) -> Vec<PathNode> {
        self.paths.get(&path).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_ordered_by_sequence_index() {
        let rows = vec![
            PathRow {
                path: 7,
                seq: 2,
                node: PathNode::new(1, Point3::new(2., 0., 0.), ActionFlag::None, 0),
            },
            PathRow {
                path: 7,
                seq: 0,
                node: PathNode::new(1, Point3::new(0., 0., 0.), ActionFlag::None, 0),
            },
            PathRow {
                path: 7,
                seq: 1,
                node: PathNode::new(1, Point3::new(1., 0., 0.), ActionFlag::Stop, 5),
            },
        ];
        let source = InMemoryPathSource::from_rows(rows);
        let nodes = source.nodes_for(7);
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[0].pos.x, 0.);
        assert_eq!(nodes[1].pos.x, 1.);
        assert_eq!(nodes[1].action, ActionFlag::Stop);
        assert_eq!(nodes[2].pos.x, 2.);
    }

    #[test]
    fn unknown_path_is_empty() {
        let source = InMemoryPathSource::new();
        assert!(source.nodes_for(42).is_empty());
    }

    #[test]
    fn json_rows_round_through_serde() {
        let json = r#"[
            {"path": 3, "seq": 0, "map": 1, "pos": {"x": 0.0, "y": 0.0, "z": 0.0}},
            {"path": 3, "seq": 1, "map": 1, "pos": {"x": 5.0, "y": 0.0, "z": 0.0},
             "action": "stop", "wait_secs": 5}
        ]"#;
        let source = InMemoryPathSource::from_json_str(json).expect("valid json");
        let nodes = source.nodes_for(3);
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[1].action, ActionFlag::Stop);
        assert_eq!(nodes[1].wait_secs, 5);
    }
}
