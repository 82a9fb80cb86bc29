use crate::errors::{Result, TaxoError};
use crate::links::{LinkOutcome, LinkStore};
use crate::nodes::NodeStore;
use crate::rank::{RankTable, NO_RANK, SUPERKINGDOM};
use std::collections::{HashSet, VecDeque};

pub const ROOT_NAME: &str = "root";

/// Top-level nodes created with every tree, as `(name, parent name, rank code)`.
///
/// GTDB lineages start at the domain level, so these give the domains a place
/// to attach when their names match exactly.
pub const SEEDED_NODES: &[(&str, &str, &str)] = &[
    ("cellular organisms", ROOT_NAME, NO_RANK),
    ("Bacteria", "cellular organisms", SUPERKINGDOM),
    ("Eukaryota", "cellular organisms", SUPERKINGDOM),
    ("Archaea", "cellular organisms", SUPERKINGDOM),
    ("Viruses", ROOT_NAME, SUPERKINGDOM),
    ("Other", ROOT_NAME, NO_RANK),
    ("Unclassified", ROOT_NAME, NO_RANK),
];

/// Names, parent edges and ranks of a taxonomy under construction.
///
/// The tree is owned by a single writer for the whole build pass. Nodes can be
/// added but never removed, so any state reached between two rows is a valid
/// tree that can be exported.
#[derive(Debug, Clone)]
pub struct TaxonomyTree {
    nodes: NodeStore,
    links: LinkStore,
    ranks: RankTable,
    root: u64,
}

impl TaxonomyTree {
    /// Create a tree whose root gets `taxid_base` and seed the fixed top-level nodes.
    pub fn new(taxid_base: u64) -> Self {
        let mut nodes = NodeStore::new(taxid_base);
        let root = nodes.add_node(ROOT_NAME);
        let mut tree = Self {
            nodes,
            links: LinkStore::new(),
            ranks: RankTable::new(),
            root,
        };
        tree.seed();
        tree
    }

    fn seed(&mut self) {
        for &(name, _, _) in SEEDED_NODES {
            self.nodes.add_node(name);
        }
        self.ranks.add_rank(NO_RANK);
        self.ranks.add_rank(SUPERKINGDOM);

        // a fresh link store holds no edge that could conflict
        let seeded = self.links.add_link(self.root, self.root, NO_RANK);
        debug_assert!(seeded.is_ok());
        for &(name, parent, rank) in SEEDED_NODES {
            if let (Some(child), Some(parent)) = (self.nodes.lookup(name), self.nodes.lookup(parent)) {
                let seeded = self.links.add_link(child, parent, rank);
                debug_assert!(seeded.is_ok());
            }
        }
    }

    pub fn root(&self) -> u64 {
        self.root
    }

    pub fn nodes(&self) -> &NodeStore {
        &self.nodes
    }

    pub fn links(&self) -> &LinkStore {
        &self.links
    }

    pub fn ranks(&self) -> &RankTable {
        &self.ranks
    }

    pub fn add_node(&mut self, name: &str) -> u64 {
        self.nodes.add_node(name)
    }

    pub fn lookup(&self, name: &str) -> Option<u64> {
        self.nodes.lookup(name)
    }

    pub fn name(&self, id: u64) -> Option<&str> {
        self.nodes.name(id)
    }

    pub fn add_rank(&mut self, code: &str) -> &str {
        self.ranks.add_rank(code)
    }

    /// Link `child` under `parent`. Both ids must belong to this tree.
    pub fn add_link(&mut self, child: u64, parent: u64, rank_code: &str) -> Result<LinkOutcome> {
        for id in [child, parent] {
            if !self.nodes.contains_id(id) {
                return Err(TaxoError::UnknownNode(id));
            }
        }
        self.ranks.add_rank(rank_code);
        self.links.add_link(child, parent, rank_code)
    }

    pub fn parent(&self, id: u64) -> Option<u64> {
        self.links.parent(id)
    }

    /// Canonical rank label of the edge above `id`.
    pub fn rank_label(&self, id: u64) -> Option<&str> {
        let code = self.links.rank_code(id)?;
        self.ranks.label(code).or(Some(code))
    }

    pub fn next_id(&self) -> u64 {
        self.nodes.next_id()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Ids from `id` up to the top of its chain, `id` first.
    ///
    /// Stops at the root or at an orphan. Cycles cannot be built through
    /// [`LinkStore`], the visited set only guards against walking forever.
    pub fn lineage(&self, id: u64) -> Vec<u64> {
        let mut path = Vec::new();
        if !self.nodes.contains_id(id) {
            return path;
        }
        let mut seen = HashSet::new();
        let mut current = id;
        while seen.insert(current) {
            path.push(current);
            match self.links.parent(current) {
                Some(parent) if parent != current => current = parent,
                _ => break,
            }
        }
        path
    }

    /// True when the chain above `id` ends at the root.
    pub fn is_rooted(&self, id: u64) -> bool {
        self.lineage(id).last() == Some(&self.root)
    }

    /// Every node below `id`, breadth first, children in ascending id order.
    pub fn descendants(&self, id: u64) -> Vec<u64> {
        let mut result = Vec::new();
        let mut queue = VecDeque::new();
        queue.push_back(id);
        while let Some(current) = queue.pop_front() {
            for child in self.links.children(current) {
                result.push(child);
                queue.push_back(child);
            }
        }
        result
    }

    /// Nodes that have no parent edge, in ascending id order.
    pub fn orphans(&self) -> Vec<u64> {
        self.nodes
            .iter()
            .map(|(id, _)| id)
            .filter(|id| !self.links.is_linked(*id))
            .collect()
    }
}

impl Default for TaxonomyTree {
    fn default() -> Self {
        Self::new(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_tree() {
        let tree = TaxonomyTree::default();
        assert_eq!(tree.root(), 1);
        assert_eq!(tree.node_count(), 8);
        assert_eq!(tree.link_count(), 8);
        assert_eq!(tree.parent(1), Some(1));
        assert_eq!(tree.rank_label(1), Some("no rank"));

        let bacteria = tree.lookup("Bacteria").unwrap();
        assert_eq!(bacteria, 3);
        assert_eq!(tree.lineage(bacteria), vec![3, 2, 1]);
        assert_eq!(tree.rank_label(bacteria), Some("superkingdom"));
        assert_eq!(tree.parent(tree.lookup("Viruses").unwrap()), Some(1));
        assert!(tree.orphans().is_empty());
        assert_eq!(tree.next_id(), 9);
    }

    #[test]
    fn test_seeding_respects_base() {
        let tree = TaxonomyTree::new(100);
        assert_eq!(tree.root(), 100);
        assert_eq!(tree.lookup("Unclassified"), Some(107));
        assert_eq!(tree.parent(107), Some(100));
    }

    #[test]
    fn test_add_link_rejects_unknown_ids() {
        let mut tree = TaxonomyTree::default();
        assert!(matches!(
            tree.add_link(42, 1, "p"),
            Err(TaxoError::UnknownNode(42))
        ));
        assert_eq!(tree.link_count(), 8);
    }

    #[test]
    fn test_descendants_and_orphans() {
        let mut tree = TaxonomyTree::default();
        let phylum = tree.add_node("Proteobacteria");
        tree.add_link(phylum, 3, "p").unwrap();
        let loose = tree.add_node("Loose");
        let below = tree.add_node("Below");
        tree.add_link(below, loose, "c").unwrap();

        assert_eq!(tree.descendants(2), vec![3, 4, 5, phylum]);
        assert_eq!(tree.orphans(), vec![loose]);
        assert!(tree.is_rooted(phylum));
        assert!(!tree.is_rooted(below));
        assert_eq!(tree.lineage(below), vec![below, loose]);
    }
}
