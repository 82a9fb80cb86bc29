use crate::errors::Result;
use crate::genome::{GenomeOutcome, GenomeStore};
use crate::lineage::Lineage;
use crate::tree::TaxonomyTree;
use crate::utils::open_text_reader;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

/// GTDB genome prefixes and the source repository each stands for.
const REFERENCE_SOURCES: &[(&str, &str)] = &[("RS", "refseq"), ("GB", "genbank")];

#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Column separator of the input file.
    pub sep: String,
    /// Keep `RS`/`GB` as the reference instead of translating it.
    pub raw_reference: bool,
    /// Stop after this many non-blank rows.
    pub limit: Option<usize>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            sep: "\t".to_string(),
            raw_reference: false,
            limit: None,
        }
    }
}

/// Running totals of one build pass.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStats {
    /// Non-blank rows read.
    pub rows: usize,
    /// Genomes newly associated with a taxon.
    pub added: usize,
    /// Genomes that were already associated.
    pub duplicates: usize,
    /// Rows whose lineage could not be resolved.
    pub missed: usize,
    /// Rows without a usable subject identifier.
    pub errors: usize,
    /// Node ids handed out during the pass.
    pub new_nodes: u64,
    /// Nodes without a parent edge when the pass ended.
    pub orphans: usize,
    /// Set when the pass stopped before the end of the input.
    pub interrupted: bool,
}

/// Subject identifier of a row, with its `RS_`/`GB_` prefix split off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject<'a> {
    pub genome_id: &'a str,
    pub reference: Option<&'a str>,
}

/// Split the subject column into genome id and reference source.
///
/// Returns `None` when nothing usable is left, e.g. an empty column or a bare
/// `GB_`.
pub fn parse_subject(column: &str, raw_reference: bool) -> Option<Subject<'_>> {
    let column = column.trim();
    for &(prefix, source) in REFERENCE_SOURCES {
        if let Some(rest) = column
            .strip_prefix(prefix)
            .and_then(|r| r.strip_prefix('_'))
        {
            let genome_id = rest.trim();
            if genome_id.is_empty() {
                return None;
            }
            let reference = if raw_reference { prefix } else { source };
            return Some(Subject {
                genome_id,
                reference: Some(reference),
            });
        }
    }
    if column.is_empty() {
        return None;
    }
    Some(Subject {
        genome_id: column,
        reference: None,
    })
}

/// Drives one pass over a QIIME/GTDB taxonomy file, growing `tree` and
/// recording genome associations in `store`.
pub struct TreeBuilder<'a, S: GenomeStore> {
    tree: &'a mut TaxonomyTree,
    store: &'a mut S,
    options: BuildOptions,
}

impl<'a, S: GenomeStore> TreeBuilder<'a, S> {
    pub fn new(tree: &'a mut TaxonomyTree, store: &'a mut S, options: BuildOptions) -> Self {
        Self {
            tree,
            store,
            options,
        }
    }

    /// Process one row. Counters in `stats` are updated in place.
    pub fn process_row(&mut self, row: &str, stats: &mut BuildStats) -> Result<()> {
        let row = row.trim_end_matches(['\r', '\n']);
        if row.trim().is_empty() {
            return Ok(());
        }
        stats.rows += 1;

        let columns: Vec<&str> = row.split(self.options.sep.as_str()).collect();
        let subject = match columns.as_slice() {
            [first, .., _] => parse_subject(first, self.options.raw_reference),
            _ => None,
        };
        let Some(subject) = subject else {
            debug!("Row {:?} could not be parsed", row);
            stats.errors += 1;
            return Ok(());
        };

        // the slice has at least two columns here
        let lineage_column = columns[columns.len() - 1];
        let resolved = match Lineage::parse(lineage_column).resolve(self.tree)? {
            Ok(resolved) => resolved,
            Err(e) => {
                debug!("taxonomy {:?} could not be parsed: {}", lineage_column, e);
                stats.missed += 1;
                return Ok(());
            }
        };
        if let Some(top) = resolved.new_top {
            debug!(
                "new top level node {} ({}) is not attached to root",
                top,
                self.tree.name(top).unwrap_or_default()
            );
        }

        match self
            .store
            .add_genome(subject.genome_id, resolved.leaf, subject.reference)?
        {
            GenomeOutcome::Added => stats.added += 1,
            GenomeOutcome::Duplicate => {
                debug!("genome {} already in database", subject.genome_id);
                stats.duplicates += 1;
            }
        }
        Ok(())
    }

    /// Read every row of `reader`, commit the store and return the totals.
    ///
    /// `cancel` is checked between rows; when it is set the rows read so far
    /// are committed and the tree stays exportable.
    pub fn run<R: BufRead>(&mut self, reader: R, cancel: Option<&AtomicBool>) -> Result<BuildStats> {
        let start_id = self.tree.next_id();
        let mut stats = BuildStats::default();

        for line in reader.lines() {
            if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed))
                || self.options.limit.is_some_and(|limit| stats.rows >= limit)
            {
                stats.interrupted = true;
                break;
            }
            let line = line?;
            self.process_row(&line, &mut stats)?;
        }

        self.store.commit()?;
        stats.new_nodes = self.tree.next_id() - start_id;
        stats.orphans = self.tree.orphans().len();

        info!("Genomes added to database: {}", stats.added);
        debug!(
            "Genomes not added to database {} errors {} already present {}",
            stats.missed, stats.errors, stats.duplicates
        );
        info!("New taxonomy ids assigned {}", stats.new_nodes);
        if stats.orphans > 0 {
            warn!(
                "{} top level nodes are not connected to root",
                stats.orphans
            );
        }
        Ok(stats)
    }

    /// Open `path` (plain or gzip) and run a pass over it.
    pub fn run_file<P: AsRef<Path>>(&mut self, path: P, cancel: Option<&AtomicBool>) -> Result<BuildStats> {
        info!("Parse taxonomy file {:?}", path.as_ref());
        let reader = open_text_reader(path)?;
        self.run(reader, cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::GenomeMap;
    use std::io::Cursor;

    fn build(input: &str, options: BuildOptions) -> (TaxonomyTree, GenomeMap, BuildStats) {
        let mut tree = TaxonomyTree::default();
        let mut store = GenomeMap::in_memory();
        let stats = TreeBuilder::new(&mut tree, &mut store, options)
            .run(Cursor::new(input), None)
            .unwrap();
        (tree, store, stats)
    }

    #[test]
    fn test_parse_subject() {
        assert_eq!(
            parse_subject("GB_GCA_000010565.1", false),
            Some(Subject {
                genome_id: "GCA_000010565.1",
                reference: Some("genbank")
            })
        );
        assert_eq!(
            parse_subject("RS_GCF_000005845.2", true).unwrap().reference,
            Some("RS")
        );
        assert_eq!(
            parse_subject("GCF_000005845.2", false),
            Some(Subject {
                genome_id: "GCF_000005845.2",
                reference: None
            })
        );
        // unknown two letter codes are part of the id
        assert_eq!(parse_subject("XX_123", false).unwrap().genome_id, "XX_123");
        assert_eq!(parse_subject("GBK1", false).unwrap().genome_id, "GBK1");
        assert_eq!(parse_subject("GB_", false), None);
        assert_eq!(parse_subject("  ", false), None);
    }

    #[test]
    fn test_end_to_end_row() {
        let (tree, store, stats) = build(
            "GB_ACC001\tBacteria;Proteobacteria;Gammaproteobacteria\n",
            BuildOptions::default(),
        );
        let record = store.get("ACC001").unwrap();
        assert_eq!(record.reference.as_deref(), Some("genbank"));
        assert_eq!(tree.name(record.taxon_id), Some("Gammaproteobacteria"));
        assert_eq!(tree.rank_label(record.taxon_id), Some("no rank"));
        assert!(tree.is_rooted(record.taxon_id));
        let bacteria = tree.lookup("Bacteria").unwrap();
        assert!(tree.lineage(record.taxon_id).contains(&bacteria));
        assert_eq!(stats.added, 1);
        assert_eq!(stats.new_nodes, 2);
        assert_eq!(stats.orphans, 0);
    }

    #[test]
    fn test_known_lineage_twice() {
        let input = "RS_GCF_1.1\td__Bacteria;p__Firmicutes;g__Bacillus\n\
                     RS_GCF_2.1\td__Bacteria;p__Firmicutes;g__Bacillus\n\
                     RS_GCF_1.1\td__Bacteria;p__Firmicutes;g__Bacillus\n";
        let (tree, store, stats) = build(input, BuildOptions::default());
        assert_eq!(tree.node_count(), 8 + 2);
        assert_eq!(tree.link_count(), 8 + 2);
        assert_eq!(store.taxon_of("GCF_1.1"), store.taxon_of("GCF_2.1"));
        assert_eq!((stats.added, stats.duplicates), (2, 1));
    }

    #[test]
    fn test_counters_for_bad_rows() {
        let input = "\n\
                     only_one_column\n\
                     \td__Bacteria;p__Firmicutes\n\
                     GCF_3.1\td__;p__\n\
                     GCF_4.1\textra\td__Archaea;p__Thermoproteota\n\
                     \n";
        let (tree, store, stats) = build(input, BuildOptions::default());
        assert_eq!(stats.rows, 4);
        assert_eq!(stats.errors, 2);
        assert_eq!(stats.missed, 1);
        assert_eq!(stats.added, 1);
        assert_eq!(
            tree.name(store.taxon_of("GCF_4.1").unwrap()),
            Some("Thermoproteota")
        );
    }

    #[test]
    fn test_ids_not_reused_after_failed_rows() {
        let input = "g1\td__Unknownia;p__A\ng2\td__;p__B\ng3\td__Unknownia;p__C\n";
        let (tree, store, stats) = build(input, BuildOptions::default());
        let a = store.taxon_of("g1").unwrap();
        let c = store.taxon_of("g3").unwrap();
        assert!(c > a);
        assert_eq!(stats.missed, 1);
        assert_eq!(stats.orphans, 1);
        assert_eq!(tree.orphans(), vec![tree.lookup("Unknownia").unwrap()]);
    }

    #[test]
    fn test_limit_and_cancel_stop_between_rows() {
        let input = "g1\td__Bacteria;p__A\ng2\td__Bacteria;p__B\ng3\td__Bacteria;p__C\n";
        let options = BuildOptions {
            limit: Some(2),
            ..BuildOptions::default()
        };
        let (tree, _, stats) = build(input, options);
        assert!(stats.interrupted);
        assert_eq!(stats.added, 2);
        assert_eq!(tree.lookup("C"), None);

        let mut tree = TaxonomyTree::default();
        let mut store = GenomeMap::in_memory();
        let cancel = AtomicBool::new(true);
        let stats = TreeBuilder::new(&mut tree, &mut store, BuildOptions::default())
            .run(Cursor::new(input), Some(&cancel))
            .unwrap();
        assert_eq!(stats.rows, 0);
        assert!(stats.interrupted);
        assert_eq!(tree.node_count(), 8);
    }

    #[test]
    fn test_custom_separator() {
        let options = BuildOptions {
            sep: ",".to_string(),
            ..BuildOptions::default()
        };
        let (tree, store, stats) = build(
            "GB_X1,d__Bacteria;p__Chlamydiota\nGB_X2,d__Bacteria;p__Tab\t|\tSplit\n",
            options,
        );
        assert_eq!(stats.added, 1);
        assert_eq!(stats.missed, 1);
        assert!(store.get("X1").is_some());
        assert!(tree.nodes().iter().all(|(_, name)| !name.contains('\t')));
    }
}
