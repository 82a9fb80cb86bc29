use crate::errors::{Result, TaxoError};
use crate::rank::{RankTable, NO_RANK};
use crate::tree::TaxonomyTree;
use crate::utils::{open_file, parse_comma_separated_list, write_atomically};
use log::{info, warn};
use std::collections::{HashMap, HashSet};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Field separator of NCBI style dump files.
pub const FIELD_SEP: &str = "\t|\t";
/// Terminator of every dump record.
pub const RECORD_END: &str = "\t|";

#[derive(Debug, Clone)]
pub struct DumpOptions {
    /// Base name of the names file, without `.dmp`.
    pub names_prefix: String,
    /// Base name of the nodes file, without `.dmp`.
    pub nodes_prefix: String,
    /// Leave nodes without a parent out of `nodes.dmp` instead of hanging them
    /// under the root.
    pub detach_orphans: bool,
}

impl Default for DumpOptions {
    fn default() -> Self {
        Self {
            names_prefix: "names".to_string(),
            nodes_prefix: "nodes".to_string(),
            detach_orphans: false,
        }
    }
}

impl DumpOptions {
    /// Take the file names from a `names,nodes` style pair.
    pub fn with_prefix(mut self, prefix: &str) -> Result<Self> {
        match parse_comma_separated_list(prefix).as_slice() {
            [names, nodes] => {
                self.names_prefix = names.clone();
                self.nodes_prefix = nodes.clone();
                Ok(self)
            }
            _ => Err(TaxoError::Parse(format!(
                "dump prefix {:?} must look like names,nodes",
                prefix
            ))),
        }
    }

    pub fn names_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.dmp", self.names_prefix))
    }

    pub fn nodes_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.dmp", self.nodes_prefix))
    }
}

/// What was written by [`write_dumps`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpSummary {
    pub nodes_written: usize,
    pub names_written: usize,
    pub orphans: usize,
}

/// Write `nodes.dmp` and `names.dmp` for every node of `tree` into `dir`.
///
/// Records are in ascending id order. The root is its own parent.
pub fn write_dumps<P: AsRef<Path>>(tree: &TaxonomyTree, dir: P, options: &DumpOptions) -> Result<DumpSummary> {
    let dir = dir.as_ref();
    let nodes_path = options.nodes_path(dir);
    let names_path = options.names_path(dir);
    if nodes_path.exists() || names_path.exists() {
        info!(
            "Warning: {:?} or {:?} already exists, overwriting",
            names_path, nodes_path
        );
    }

    let orphans: HashSet<u64> = tree.orphans().into_iter().collect();
    // a detached orphan takes its subtree along, so every parent in nodes.dmp has a record
    let mut detached: HashSet<u64> = HashSet::new();
    if options.detach_orphans {
        for &orphan in &orphans {
            detached.insert(orphan);
            detached.extend(tree.descendants(orphan));
        }
    }
    if !orphans.is_empty() {
        if options.detach_orphans {
            warn!(
                "{} nodes have no parent and are left out of {:?} with {} descendants",
                orphans.len(),
                nodes_path,
                detached.len() - orphans.len()
            );
        } else {
            warn!(
                "{} nodes have no parent and are written under root {}",
                orphans.len(),
                tree.root()
            );
        }
    }

    let mut nodes_written = 0;
    write_atomically(&nodes_path, |writer| {
        for (id, _) in tree.nodes().iter() {
            if detached.contains(&id) {
                continue;
            }
            let (parent, rank) = if orphans.contains(&id) {
                (tree.root(), RankTable::base_label(NO_RANK).unwrap_or(NO_RANK))
            } else {
                let parent = tree.parent(id).unwrap_or(tree.root());
                (parent, tree.rank_label(id).unwrap_or(NO_RANK))
            };
            writeln!(
                writer,
                "{id}{sep}{parent}{sep}{rank}{sep}-{end}",
                sep = FIELD_SEP,
                end = RECORD_END
            )?;
            nodes_written += 1;
        }
        Ok(())
    })?;

    let mut names_written = 0;
    write_atomically(&names_path, |writer| {
        for (id, name) in tree.nodes().iter() {
            writeln!(
                writer,
                "{id}{sep}{name}{sep}{sep}scientific name{end}",
                sep = FIELD_SEP,
                end = RECORD_END
            )?;
            names_written += 1;
        }
        Ok(())
    })?;

    info!(
        "Wrote {} nodes to {:?} and {} names to {:?}",
        nodes_written, nodes_path, names_written, names_path
    );
    Ok(DumpSummary {
        nodes_written,
        names_written,
        orphans: orphans.len(),
    })
}

/// Parent and rank of every node listed in a nodes dump.
#[derive(Debug, Default, Clone)]
pub struct NodesDump {
    pub parent_map: HashMap<u64, u64>,
    pub rank_map: HashMap<u64, String>,
    pub known_ranks: HashSet<String>,
}

impl NodesDump {
    /// Direct children of every parent, the root's self edge excluded.
    pub fn children_map(&self) -> HashMap<u64, Vec<u64>> {
        let mut children: HashMap<u64, Vec<u64>> = HashMap::new();
        for (&child, &parent) in &self.parent_map {
            if child != parent {
                children.entry(parent).or_default().push(child);
            }
        }
        children
    }
}

fn parse_id(field: &str, what: &str, line_no: usize) -> Result<u64> {
    field
        .trim()
        .parse::<u64>()
        .map_err(|_| TaxoError::Parse(format!("line {}: invalid {} {:?}", line_no, what, field)))
}

fn split_record(line: &str) -> Vec<&str> {
    line.trim_end_matches(|c| c == '\t' || c == '|' || c == '\n' || c == '\r')
        .split(FIELD_SEP)
        .collect()
}

/// Parse a nodes dump file
///
/// # Arguments
///
/// * `nodes_filename` - Path to the nodes file
///
/// # Returns
///
/// Parent ids, rank labels and the set of rank labels in use.
pub fn parse_nodes_file<P: AsRef<Path>>(nodes_filename: P) -> Result<NodesDump> {
    let reader = BufReader::new(open_file(nodes_filename)?);
    let mut dump = NodesDump::default();

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields = split_record(&line);
        if fields.len() < 3 {
            continue;
        }

        let node_id = parse_id(fields[0], "node_id", i + 1)?;
        let parent_id = parse_id(fields[1], "parent_id", i + 1)?;
        let rank = fields[2].to_string();

        dump.parent_map.insert(node_id, parent_id);
        dump.rank_map.insert(node_id, rank.clone());
        dump.known_ranks.insert(rank);
    }

    Ok(dump)
}

/// Parse a names dump file
///
/// # Arguments
///
/// * `names_filename` - Path to the names file
///
/// # Returns
///
/// A HashMap of node ID to scientific name
pub fn parse_names_file<P: AsRef<Path>>(names_filename: P) -> Result<HashMap<u64, String>> {
    let reader = BufReader::new(open_file(names_filename)?);
    let mut name_map = HashMap::new();

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields = split_record(&line);
        if fields.len() < 4 {
            continue;
        }
        let node_id = parse_id(fields[0], "node_id", i + 1)?;
        // Only scientific names identify a node
        if fields[3] == "scientific name" {
            name_map.insert(node_id, fields[1].to_string());
        }
    }

    Ok(name_map)
}

/// A taxonomy loaded back from its dump files.
#[derive(Debug, Default, Clone)]
pub struct DumpTaxonomy {
    pub nodes: NodesDump,
    pub names: HashMap<u64, String>,
}

impl DumpTaxonomy {
    pub fn from_dir<P: AsRef<Path>>(dir: P, options: &DumpOptions) -> Result<Self> {
        let dir = dir.as_ref();
        Ok(Self {
            nodes: parse_nodes_file(options.nodes_path(dir))?,
            names: parse_names_file(options.names_path(dir))?,
        })
    }

    /// `(id, rank, name)` from `taxid` up to the root, `taxid` first.
    pub fn lineage(&self, taxid: u64) -> Vec<(u64, &str, &str)> {
        let mut path = Vec::new();
        let mut seen = HashSet::new();
        let mut current = taxid;
        while seen.insert(current) {
            let Some(&parent) = self.nodes.parent_map.get(&current) else {
                break;
            };
            let rank = self.nodes.rank_map.get(&current).map_or("", |s| s.as_str());
            let name = self.names.get(&current).map_or("", |s| s.as_str());
            path.push((current, rank, name));
            current = parent;
        }
        path
    }
}
