use crate::builder::parse_subject;
use crate::errors::Result;
use crate::utils::open_text_reader;
use std::collections::HashSet;
use std::io::BufRead;
use std::path::Path;

/// Genomes and taxa to leave out of a classifier library.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SkipList {
    pub genome_ids: HashSet<String>,
    pub taxon_ids: HashSet<u64>,
}

impl SkipList {
    pub fn is_empty(&self) -> bool {
        self.genome_ids.is_empty() && self.taxon_ids.is_empty()
    }

    /// Add every descendant of the skipped taxa, so skipping a genus also
    /// skips its species. `children_of` lists the direct children of a node.
    pub fn expand<F, I>(&mut self, children_of: F)
    where
        F: Fn(u64) -> I,
        I: IntoIterator<Item = u64>,
    {
        let mut stack: Vec<u64> = self.taxon_ids.iter().copied().collect();
        while let Some(taxid) = stack.pop() {
            for child in children_of(taxid) {
                if self.taxon_ids.insert(child) {
                    stack.push(child);
                }
            }
        }
    }

    pub fn skips(&self, genome_id: &str, taxon_id: u64) -> bool {
        self.genome_ids.contains(genome_id) || self.taxon_ids.contains(&taxon_id)
    }
}

/// Read a skip file with one genome id or taxon id per line.
///
/// Purely numeric entries are taxon ids. Genome ids may carry the GTDB
/// `RS_`/`GB_` prefix, which is dropped.
pub fn read_skip_file<P: AsRef<Path>>(path: P) -> Result<SkipList> {
    let reader = open_text_reader(path)?;
    let mut skip = SkipList::default();
    for line in reader.lines() {
        let line = line?;
        let entry = line.trim();
        if entry.is_empty() || entry.starts_with('#') {
            continue;
        }
        if let Ok(taxid) = entry.parse::<u64>() {
            skip.taxon_ids.insert(taxid);
        } else if let Some(subject) = parse_subject(entry, false) {
            skip.genome_ids.insert(subject.genome_id.to_string());
        }
    }
    Ok(skip)
}
