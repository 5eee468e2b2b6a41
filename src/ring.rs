//! Consistent hash ring over string node identifiers.
//!
//! Every node is placed on a 32-bit circle at `V` virtual positions, the hashes of
//! `"<node>#<i>"` for `i` in `[0, V)`. A key belongs to the node owning the first
//! position at or after the key's hash, wrapping back to the lowest position past
//! the top of the circle. Adding or removing a node therefore only remaps the keys
//! falling on that node's arcs.
//!
//! The ring is a plain structure with no internal locking. Mutation requires
//! `&mut self`; to share a ring across threads wrap it in a lock, e.g. via
//! [`Ring::into_shared`].
use std::collections::{BTreeSet, HashMap};
use std::fmt::Debug;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::*;
use crate::utils;

pub const DEFAULT_VIRTUAL_NODES: usize = 20;

pub type SharedRing<H = Crc32> = Arc<RwLock<Ring<H>>>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RingError {
    #[error("no nodes registered in ring")]
    EmptyRing,

    #[error("node, {0}, is already registered")]
    DuplicateNode(String),

    #[error("node, {0}, is not registered")]
    UnknownNode(String),

    #[error("node identifier must not be empty")]
    InvalidNode,

    #[error("invalid ring configuration: {0}")]
    InvalidConfiguration(String),
}

/// Maps bytes onto the 32-bit circle. Must be deterministic.
pub trait KeyHasher {
    fn hash(&self, bytes: &[u8]) -> u32;
}

/// CRC-32 (IEEE) positions, compatible with other implementations using the same checksum.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Crc32;

impl KeyHasher for Crc32 {
    fn hash(&self, bytes: &[u8]) -> u32 {
        utils::hash_key(bytes)
    }
}

impl<F> KeyHasher for F
where
    F: Fn(&[u8]) -> u32,
{
    fn hash(&self, bytes: &[u8]) -> u32 {
        self(bytes)
    }
}

/// Two virtual nodes hashing to the same position resolve last-write-wins: the
/// position belongs to whichever node was added later. Removing a node only drops
/// the positions it currently owns, so a contested position stays with its winner.
/// A position vacated by a removed winner is handed back to a remaining member that
/// also hashes there, so every member stays reachable.
pub struct Ring<H = Crc32> {
    virtual_nodes: usize,
    members: BTreeSet<String>,
    circle: HashMap<u32, String>,
    sorted_positions: Vec<u32>,
    hasher: H,
}

impl Ring<Crc32> {
    /// Creates an empty ring placing `virtual_nodes` replicas per node.
    pub fn new(virtual_nodes: usize) -> Result<Self, RingError> {
        Self::with_hasher(virtual_nodes, Crc32)
    }
}

impl Default for Ring<Crc32> {
    fn default() -> Self {
        Ring {
            virtual_nodes: DEFAULT_VIRTUAL_NODES,
            members: BTreeSet::new(),
            circle: HashMap::new(),
            sorted_positions: Vec::new(),
            hasher: Crc32,
        }
    }
}

impl<H: KeyHasher> Ring<H> {
    pub fn with_hasher(virtual_nodes: usize, hasher: H) -> Result<Self, RingError> {
        if virtual_nodes == 0 {
            return Err(RingError::InvalidConfiguration(
                "virtual nodes per node must be at least 1".to_owned()
            ));
        }

        Ok(Ring {
            virtual_nodes,
            members: BTreeSet::new(),
            circle: HashMap::new(),
            sorted_positions: Vec::new(),
            hasher,
        })
    }

    pub fn into_shared(self) -> SharedRing<H> {
        Arc::new(RwLock::new(self))
    }

    pub fn virtual_nodes_per_node(&self) -> usize {
        self.virtual_nodes
    }

    /// Number of registered nodes.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains<S: AsRef<str>>(&self, node: S) -> bool {
        self.members.contains(node.as_ref())
    }

    /// Number of distinct occupied positions on the circle.
    pub fn vnode_count(&self) -> usize {
        self.sorted_positions.len()
    }

    /// Snapshot of the circle in ascending position order.
    pub fn positions(&self) -> Vec<(u32, &str)> {
        self.sorted_positions
            .iter()
            .filter_map(|p| self.circle.get(p).map(|n| (*p, n.as_str())))
            .collect()
    }

    /// Where `key` lands on the circle.
    pub fn position_of<K: AsRef<[u8]>>(&self, key: K) -> u32 {
        self.hasher.hash(key.as_ref())
    }

    /// Snapshot of the registered nodes. Callers must not rely on its ordering.
    pub fn list_nodes(&self) -> BTreeSet<String> {
        self.members.clone()
    }

    pub fn add_node<S: AsRef<str>>(&mut self, node: S) -> Result<(), RingError> {
        let node = node.as_ref();
        if node.is_empty() {
            return Err(RingError::InvalidNode);
        }

        if self.members.contains(node) {
            return Err(RingError::DuplicateNode(node.to_owned()));
        }

        for position in self.virtual_positions(node) {
            self.circle.insert(position, node.to_owned());
        }
        self.members.insert(node.to_owned());
        self.refresh_sorted_positions();

        debug!(
            %node,
            virtual_nodes = self.virtual_nodes,
            positions = self.vnode_count(),
            "added node to ring"
        );
        Ok(())
    }

    pub fn remove_node<S: AsRef<str>>(&mut self, node: S) -> Result<(), RingError> {
        let node = node.as_ref();
        if !self.members.remove(node) {
            return Err(RingError::UnknownNode(node.to_owned()));
        }

        let mut vacated = BTreeSet::new();
        for position in self.virtual_positions(node) {
            let owned = self.circle.get(&position).map_or(false, |owner| owner == node);
            if owned {
                self.circle.remove(&position);
                vacated.insert(position);
            }
        }

        let reclaimed = self.reclaim(&vacated);
        self.refresh_sorted_positions();

        debug!(%node, reclaimed, positions = self.vnode_count(), "removed node from ring");
        Ok(())
    }

    /// Finds the node owning `key`: the successor of the key's hash on the circle.
    pub fn lookup<K: AsRef<[u8]>>(&self, key: K) -> Result<&str, RingError> {
        if self.members.is_empty() || self.sorted_positions.is_empty() {
            return Err(RingError::EmptyRing);
        }

        let hash = self.position_of(key);
        let idx = match self.sorted_positions.binary_search(&hash) {
            Ok(idx) => idx,
            Err(idx) if idx == self.sorted_positions.len() => 0,
            Err(idx) => idx,
        };

        self.circle
            .get(&self.sorted_positions[idx])
            .map(|node| node.as_str())
            .ok_or(RingError::EmptyRing)
    }

    fn virtual_positions(&self, node: &str) -> Vec<u32> {
        (0..self.virtual_nodes)
            .map(|i| self.hasher.hash(utils::virtual_key(node, i).as_bytes()))
            .collect()
    }

    /// Hands vacated positions back to remaining members whose replicas also hash
    /// there. Members are visited in identifier order, the last claimant wins.
    fn reclaim(&mut self, vacated: &BTreeSet<u32>) -> usize {
        if vacated.is_empty() {
            return 0;
        }

        let mut claims = Vec::new();
        for member in &self.members {
            for position in self.virtual_positions(member) {
                if vacated.contains(&position) {
                    claims.push((position, member.clone()));
                }
            }
        }

        let mut reclaimed = BTreeSet::new();
        for (position, member) in claims {
            self.circle.insert(position, member);
            reclaimed.insert(position);
        }
        reclaimed.len()
    }

    fn refresh_sorted_positions(&mut self) {
        let mut positions: Vec<u32> = self.circle.keys().copied().collect();
        positions.sort_unstable();
        self.sorted_positions = positions;
    }
}

impl<H> Debug for Ring<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Ring(virtual_nodes:{}, members:{:?}, positions:{})",
            self.virtual_nodes,
            self.members,
            self.sorted_positions.len(),
        )
    }
}

impl<H> std::fmt::Display for Ring<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ring({}x{})", self.members.len(), self.virtual_nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_virtual_nodes_is_rejected() {
        assert!(matches!(Ring::new(0), Err(RingError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_default_ring() {
        let ring = Ring::default();
        assert_eq!(ring.virtual_nodes_per_node(), DEFAULT_VIRTUAL_NODES);
        assert!(ring.is_empty());
        assert_eq!(ring.vnode_count(), 0);
        assert_eq!(format!("{}", ring), "Ring(0x20)");
    }

    #[test]
    fn test_positions_follow_virtual_keys() {
        let mut ring = Ring::new(5).unwrap();
        ring.add_node("node_a").unwrap();

        let mut expected: Vec<u32> = (0..5)
            .map(|i| utils::hash_key(utils::virtual_key("node_a", i)))
            .collect();
        expected.sort();
        expected.dedup();

        let actual: Vec<u32> = ring.positions().into_iter().map(|(p, _)| p).collect();
        assert_eq!(actual, expected);
        assert!(ring.positions().iter().all(|(_, n)| *n == "node_a"));
    }

    #[test]
    fn test_empty_node_rejected_without_mutation() {
        let mut ring = Ring::default();
        assert_eq!(ring.add_node(""), Err(RingError::InvalidNode));
        assert!(ring.is_empty());
        assert_eq!(ring.vnode_count(), 0);
    }
}
