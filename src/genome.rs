use crate::errors::{Result, TaxoError};
use crate::utils::{open_file, write_atomically};
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// File name of the genome to taxon map inside an output directory.
pub const GENOME_MAP_FILE: &str = "genome2taxid.map";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenomeOutcome {
    Added,
    /// The genome id was already associated; the first association is kept.
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenomeRecord {
    pub genome_id: String,
    pub taxon_id: u64,
    pub reference: Option<String>,
}

/// Backing store for genome to taxon associations.
pub trait GenomeStore {
    fn add_genome(
        &mut self,
        genome_id: &str,
        taxon_id: u64,
        reference: Option<&str>,
    ) -> Result<GenomeOutcome>;

    fn commit(&mut self) -> Result<()>;
}

/// Genome associations buffered in memory and written out as a tab separated
/// `genome_id  taxid  reference` file on commit.
#[derive(Debug, Default)]
pub struct GenomeMap {
    path: Option<PathBuf>,
    index: HashMap<String, usize>,
    records: Vec<GenomeRecord>,
}

impl GenomeMap {
    /// A store that lives only in memory; `commit` does nothing.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// An empty map that replaces whatever `path` holds on commit.
    ///
    /// Taxids are handed out afresh on every build pass, so a new build must
    /// not inherit associations that point into an earlier tree.
    pub fn create<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
            ..Self::default()
        }
    }

    /// Open the map file at `path`, loading any associations it already holds.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut map = Self {
            path: Some(path.clone()),
            ..Self::default()
        };
        if path.exists() {
            for record in read_genome_map(&path)? {
                map.insert(record);
            }
        }
        Ok(map)
    }

    fn insert(&mut self, record: GenomeRecord) -> GenomeOutcome {
        if self.index.contains_key(&record.genome_id) {
            return GenomeOutcome::Duplicate;
        }
        self.index.insert(record.genome_id.clone(), self.records.len());
        self.records.push(record);
        GenomeOutcome::Added
    }

    pub fn get(&self, genome_id: &str) -> Option<&GenomeRecord> {
        self.index.get(genome_id).map(|&i| &self.records[i])
    }

    pub fn taxon_of(&self, genome_id: &str) -> Option<u64> {
        self.get(genome_id).map(|r| r.taxon_id)
    }

    /// Records in insertion order.
    pub fn records(&self) -> &[GenomeRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl GenomeStore for GenomeMap {
    fn add_genome(
        &mut self,
        genome_id: &str,
        taxon_id: u64,
        reference: Option<&str>,
    ) -> Result<GenomeOutcome> {
        Ok(self.insert(GenomeRecord {
            genome_id: genome_id.to_string(),
            taxon_id,
            reference: reference.map(String::from),
        }))
    }

    fn commit(&mut self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        write_atomically(path, |writer| {
            for record in &self.records {
                writeln!(
                    writer,
                    "{}\t{}\t{}",
                    record.genome_id,
                    record.taxon_id,
                    record.reference.as_deref().unwrap_or("")
                )?;
            }
            Ok(())
        })?;
        Ok(())
    }
}

/// Read a genome map written by [`GenomeMap::commit`].
pub fn read_genome_map<P: AsRef<Path>>(path: P) -> Result<Vec<GenomeRecord>> {
    let reader = BufReader::new(open_file(&path)?);
    let mut records = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 2 {
            return Err(TaxoError::Parse(format!(
                "{:?} line {}: expected genome id and taxid",
                path.as_ref(),
                line_no + 1
            )));
        }
        let taxon_id = fields[1].trim().parse::<u64>().map_err(|_| {
            TaxoError::Parse(format!(
                "{:?} line {}: invalid taxid {:?}",
                path.as_ref(),
                line_no + 1,
                fields[1]
            ))
        })?;
        let reference = fields
            .get(2)
            .map(|r| r.trim())
            .filter(|r| !r.is_empty())
            .map(String::from);
        records.push(GenomeRecord {
            genome_id: fields[0].trim().to_string(),
            taxon_id,
            reference,
        });
    }
    Ok(records)
}
