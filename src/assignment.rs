//! Track to node assignment and conflict detection.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of addressable nodes on the bus.
pub const NODE_COUNT: u8 = 16;

/// Address of one playback node, 0 to 15.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u8);

impl NodeId {
    pub fn new(id: u8) -> Option<Self> {
        (id < NODE_COUNT).then_some(NodeId(id))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn all() -> impl Iterator<Item = NodeId> {
        (0..NODE_COUNT).map(NodeId)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssignmentParseError {
    #[error("invalid node '{0}': expected a hex digit 0-F or 'none'")]
    InvalidNode(String),
    #[error("invalid track index '{0}'")]
    InvalidTrack(String),
    #[error("invalid assignment '{0}': expected TRACK=NODE")]
    InvalidPair(String),
}

impl FromStr for NodeId {
    type Err = AssignmentParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u8::from_str_radix(s.trim(), 16)
            .ok()
            .and_then(NodeId::new)
            .ok_or_else(|| AssignmentParseError::InvalidNode(s.to_string()))
    }
}

/// Where one track should be sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Assignment {
    Node(NodeId),
    Unassigned,
}

impl Assignment {
    pub fn node(&self) -> Option<NodeId> {
        match self {
            Assignment::Node(node) => Some(*node),
            Assignment::Unassigned => None,
        }
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Assignment::Node(node) => write!(f, "{}", node),
            Assignment::Unassigned => write!(f, "none"),
        }
    }
}

impl FromStr for Assignment {
    type Err = AssignmentParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "-" | "unassigned" => Ok(Assignment::Unassigned),
            other => other.parse().map(Assignment::Node),
        }
    }
}

/// A `TRACK=NODE` pair as given on the command line.
pub fn parse_assignment_pair(s: &str) -> Result<(usize, Assignment), AssignmentParseError> {
    let (track, node) = s
        .split_once('=')
        .ok_or_else(|| AssignmentParseError::InvalidPair(s.to_string()))?;
    let track = track
        .trim()
        .parse::<usize>()
        .map_err(|_| AssignmentParseError::InvalidTrack(track.to_string()))?;
    Ok((track, node.parse()?))
}

/// Conflicting node id to the ordered track indices sharing it.
pub type ConflictMap = BTreeMap<NodeId, Vec<usize>>;

/// One assignment per extracted track, indexed from 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeAssignments {
    slots: Vec<Assignment>,
}

impl NodeAssignments {
    /// Track `i` goes to node `i`; tracks past the last node stay unassigned.
    pub fn with_defaults(track_count: usize) -> Self {
        let slots = (0..track_count)
            .map(|i| {
                u8::try_from(i)
                    .ok()
                    .and_then(NodeId::new)
                    .map_or(Assignment::Unassigned, Assignment::Node)
            })
            .collect();
        Self { slots }
    }

    pub fn from_slots(slots: Vec<Assignment>) -> Self {
        Self { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, track: usize) -> Option<Assignment> {
        self.slots.get(track).copied()
    }

    /// Returns false when `track` is out of range.
    pub fn assign(&mut self, track: usize, assignment: Assignment) -> bool {
        match self.slots.get_mut(track) {
            Some(slot) => {
                *slot = assignment;
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, Assignment)> + '_ {
        self.slots.iter().copied().enumerate()
    }

    pub fn unassigned_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|a| **a == Assignment::Unassigned)
            .count()
    }

    /// Tracks that a transmission run is expected to deliver.
    pub fn expected_count(&self) -> usize {
        self.len() - self.unassigned_count()
    }
}

/// Finds every node claimed by more than one track. Empty means clear to transmit.
pub fn validate_assignment(assignments: &NodeAssignments) -> ConflictMap {
    let mut by_node: BTreeMap<NodeId, Vec<usize>> = BTreeMap::new();
    for (track, assignment) in assignments.iter() {
        if let Assignment::Node(node) = assignment {
            by_node.entry(node).or_default().push(track);
        }
    }
    by_node.retain(|_, tracks| tracks.len() > 1);
    by_node
}

/// Human readable conflict listing, one node per line.
pub fn describe_conflicts(conflicts: &ConflictMap) -> String {
    conflicts
        .iter()
        .map(|(node, tracks)| {
            let tracks: Vec<String> = tracks.iter().map(|t| format!("track {:X}", t)).collect();
            format!("node {}: {}", node, tracks.join(", "))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: u8) -> NodeId {
        NodeId::new(id).unwrap()
    }

    #[test]
    fn test_node_id_bounds() {
        assert!(NodeId::new(15).is_some());
        assert!(NodeId::new(16).is_none());
        assert_eq!(NodeId::all().count(), 16);
    }

    #[test]
    fn test_node_id_hex_round_trip() {
        assert_eq!("a".parse::<NodeId>().unwrap(), node(10));
        assert_eq!(node(11).to_string(), "B");
        assert!("10".parse::<NodeId>().is_err());
        assert!("x".parse::<NodeId>().is_err());
    }

    #[test]
    fn test_defaults_follow_track_index() {
        let map = NodeAssignments::with_defaults(18);
        assert_eq!(map.get(0), Some(Assignment::Node(node(0))));
        assert_eq!(map.get(15), Some(Assignment::Node(node(15))));
        assert_eq!(map.get(16), Some(Assignment::Unassigned));
        assert_eq!(map.unassigned_count(), 2);
        assert_eq!(map.expected_count(), 16);
        assert!(validate_assignment(&map).is_empty());
    }

    #[test]
    fn test_assign_out_of_range() {
        let mut map = NodeAssignments::with_defaults(2);
        assert!(!map.assign(2, Assignment::Unassigned));
        assert!(map.assign(1, Assignment::Unassigned));
        assert_eq!(map.get(1), Some(Assignment::Unassigned));
    }

    #[test]
    fn test_parse_pair() {
        assert_eq!(
            parse_assignment_pair("3=f").unwrap(),
            (3, Assignment::Node(node(15)))
        );
        assert_eq!(
            parse_assignment_pair("4=none").unwrap(),
            (4, Assignment::Unassigned)
        );
        assert!(matches!(
            parse_assignment_pair("4"),
            Err(AssignmentParseError::InvalidPair(_))
        ));
        assert!(matches!(
            parse_assignment_pair("x=1"),
            Err(AssignmentParseError::InvalidTrack(_))
        ));
    }

    #[test]
    fn test_describe_conflicts() {
        let mut conflicts = ConflictMap::new();
        conflicts.insert(node(2), vec![0, 11]);
        assert_eq!(describe_conflicts(&conflicts), "node 2: track 0, track B");
    }
}
