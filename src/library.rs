use crate::errors::{Result, TaxoError};
use crate::genome::GenomeMap;
use crate::skip::SkipList;
use crate::utils::{create_dir, open_text_reader, write_atomically};
use log::{debug, info, warn};
use rayon::prelude::*;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use walkdir::WalkDir;

/// File listing genome ids that have no sequence file.
pub const MISSING_FILE: &str = "flex_taxo.missing";

const FASTA_EXTENSIONS: &[&str] = &["fa", "fna", "fasta", "fsa"];
const ACCESSION_PATTERN: &str = r"(GC[AF]_\d+\.\d+)";
const SEQID_MAP_PREFIX: &str = "seqid2taxid_";

/// Returns true for `x.fna`, `x.fa.gz` and friends.
fn is_fasta_file(path: &Path) -> bool {
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
    if FASTA_EXTENSIONS.contains(&ext) {
        return true;
    }
    if ext == "gz" {
        if let Some(stem) = path.file_stem() {
            if let Some(inner_ext) = Path::new(stem).extension().and_then(|s| s.to_str()) {
                return FASTA_EXTENSIONS.contains(&inner_ext);
            }
        }
    }
    false
}

/// Genome sequence files found on disk, keyed by genome accession.
#[derive(Debug, Default, Clone)]
pub struct GenomeLibrary {
    files: BTreeMap<String, PathBuf>,
}

/// Counts reported by [`GenomeLibrary::write_library`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LibrarySummary {
    pub genomes_written: usize,
    pub genomes_skipped: usize,
    pub genomes_missing: usize,
    pub sequences: usize,
}

impl GenomeLibrary {
    /// Walk `dir` for FASTA files whose name carries a `GCA_`/`GCF_` accession.
    ///
    /// When several files share an accession the first one in path order wins.
    pub fn scan<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let re = Regex::new(ACCESSION_PATTERN).map_err(|e| TaxoError::Parse(e.to_string()))?;
        let mut paths: Vec<PathBuf> = WalkDir::new(dir.as_ref())
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && is_fasta_file(e.path()))
            .map(|e| e.path().to_path_buf())
            .collect();
        paths.sort_unstable();

        let mut files = BTreeMap::new();
        for path in paths {
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(caps) = re.captures(file_name) else {
                debug!("no genome accession in {:?}", path);
                continue;
            };
            let accession = caps[1].to_string();
            if files.contains_key(&accession) {
                debug!("ignore second file {:?} for {}", path, accession);
                continue;
            }
            files.insert(accession, path);
        }
        info!(
            "Found {} genome files in {:?}",
            files.len(),
            dir.as_ref()
        );
        Ok(Self { files })
    }

    pub fn path_of(&self, genome_id: &str) -> Option<&Path> {
        self.files.get(genome_id).map(|p| p.as_path())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Genome ids of `store` without a file, sorted.
    pub fn missing(&self, store: &GenomeMap) -> Vec<String> {
        let mut missing: Vec<String> = store
            .records()
            .iter()
            .filter(|r| !self.files.contains_key(&r.genome_id))
            .map(|r| r.genome_id.clone())
            .collect();
        missing.sort_unstable();
        missing
    }

    /// Write the missing genome ids, one per line.
    pub fn write_missing<P: AsRef<Path>>(&self, store: &GenomeMap, path: P) -> Result<usize> {
        let missing = self.missing(store);
        write_atomically(path, |writer| {
            for genome_id in &missing {
                writeln!(writer, "{}", genome_id)?;
            }
            Ok(())
        })?;
        Ok(missing.len())
    }

    /// Concatenate the genomes of `store` into Kraken style library files
    /// under `database/library`, one set of files per worker thread.
    ///
    /// Headers become `>kraken:taxid|<taxid>|<original header>` and every
    /// sequence id is listed with its taxid in `seqid2taxid_<thread>.map`.
    pub fn write_library<P: AsRef<Path>>(
        &self,
        database: P,
        store: &GenomeMap,
        skip: &SkipList,
        max_file_size: u64,
        threads: usize,
    ) -> Result<LibrarySummary> {
        let database = database.as_ref();
        clear_library(database)?;

        let mut summary = LibrarySummary::default();
        let mut jobs = Vec::new();
        for record in store.records() {
            if skip.skips(&record.genome_id, record.taxon_id) {
                summary.genomes_skipped += 1;
                continue;
            }
            match self.path_of(&record.genome_id) {
                Some(path) => jobs.push((path, record.taxon_id)),
                None => summary.genomes_missing += 1,
            }
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .build()?;
        let slots: Vec<Mutex<Option<LibraryWriter>>> =
            (0..pool.current_num_threads()).map(|_| Mutex::new(None)).collect();
        let sequences = AtomicUsize::new(0);

        pool.install(|| {
            jobs.par_iter().try_for_each(|(path, taxid)| -> Result<()> {
                let thread_index = rayon::current_thread_index().unwrap_or(0);
                let mut slot = slots[thread_index % slots.len()]
                    .lock()
                    .map_err(|_| io::Error::new(io::ErrorKind::Other, "library writer lock poisoned"))?;
                if slot.is_none() {
                    *slot = Some(LibraryWriter::new(database, thread_index, max_file_size)?);
                }
                if let Some(writer) = slot.as_mut() {
                    let count = writer.add_genome(path, *taxid)?;
                    sequences.fetch_add(count, Ordering::Relaxed);
                }
                Ok(())
            })
        })?;

        for slot in slots {
            let writer = slot
                .into_inner()
                .map_err(|_| io::Error::new(io::ErrorKind::Other, "library writer lock poisoned"))?;
            if let Some(mut writer) = writer {
                writer.flush()?;
            }
        }

        summary.genomes_written = jobs.len();
        summary.sequences = sequences.into_inner();
        if summary.genomes_missing > 0 {
            warn!(
                "{} genomes in the database have no sequence file",
                summary.genomes_missing
            );
        }
        info!(
            "Library written: {} genomes, {} sequences, {} skipped",
            summary.genomes_written, summary.sequences, summary.genomes_skipped
        );
        Ok(summary)
    }
}

/// Remove the output of an earlier run. Thread count and rollover decide
/// which files a run opens, so stale files would otherwise survive.
fn clear_library(database: &Path) -> io::Result<()> {
    let library_dir = database.join("library");
    if library_dir.exists() {
        debug!("remove previous library {:?}", library_dir);
        fs::remove_dir_all(&library_dir)?;
    }
    create_dir(&library_dir)?;
    for entry in fs::read_dir(database)? {
        let path = entry?.path();
        let is_seqid_map = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(SEQID_MAP_PREFIX) && n.ends_with(".map"));
        if is_seqid_map && path.is_file() {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

/// Library output of one worker thread. The fna file rolls over to a new
/// suffix when the next record would push it past `max_file_size`.
struct LibraryWriter {
    fna: BufWriter<File>,
    map: BufWriter<File>,
    bytes_written: u64,
    thread_index: usize,
    file_suffix: usize,
    library_dir: PathBuf,
    max_file_size: u64,
}

impl LibraryWriter {
    fn new(database: &Path, thread_index: usize, max_file_size: u64) -> io::Result<Self> {
        let library_dir = database.join("library");
        let fna = Self::create(&Self::fna_path(&library_dir, thread_index, 0))?;
        let map = Self::create(&database.join(format!("{}{}.map", SEQID_MAP_PREFIX, thread_index)))?;
        Ok(Self {
            fna,
            map,
            bytes_written: 0,
            thread_index,
            file_suffix: 0,
            library_dir,
            max_file_size,
        })
    }

    fn create(path: &Path) -> io::Result<BufWriter<File>> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        Ok(BufWriter::new(file))
    }

    fn fna_path(library_dir: &Path, thread_index: usize, suffix: usize) -> PathBuf {
        library_dir.join(format!("library_{}_{}.fna", thread_index, suffix))
    }

    fn write_record(&mut self, record: &str) -> io::Result<()> {
        if record.is_empty() {
            return Ok(());
        }
        if self.bytes_written > 0 && self.bytes_written + record.len() as u64 > self.max_file_size {
            self.fna.flush()?;
            self.file_suffix += 1;
            let path = Self::fna_path(&self.library_dir, self.thread_index, self.file_suffix);
            self.fna = Self::create(&path)?;
            self.bytes_written = 0;
        }
        self.fna.write_all(record.as_bytes())?;
        self.bytes_written += record.len() as u64;
        Ok(())
    }

    /// Append every sequence of one genome file, returning the number of sequences.
    fn add_genome(&mut self, path: &Path, taxid: u64) -> io::Result<usize> {
        let reader = open_text_reader(path)?;
        let mut record = String::new();
        let mut count = 0;
        for line in reader.lines() {
            let line = line?;
            if let Some(header) = line.strip_prefix('>') {
                let record_done = std::mem::take(&mut record);
                self.write_record(&record_done)?;

                let seqid = header.split_whitespace().next().unwrap_or("");
                writeln!(self.map, "{}\t{}", seqid, taxid)?;
                record.push_str(&format!(">kraken:taxid|{}|{}\n", taxid, header));
                count += 1;
            } else if !record.is_empty() {
                record.push_str(&line);
                record.push('\n');
            }
        }
        self.write_record(&record)?;
        Ok(count)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.fna.flush()?;
        self.map.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::GenomeStore;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::collections::HashSet;
    use std::fs;

    fn write_genome(dir: &Path, name: &str, body: &str) {
        let path = dir.join(name);
        if name.ends_with(".gz") {
            let mut enc = GzEncoder::new(File::create(path).unwrap(), Compression::default());
            enc.write_all(body.as_bytes()).unwrap();
            enc.finish().unwrap();
        } else {
            fs::write(path, body).unwrap();
        }
    }

    fn read_library(db: &Path) -> String {
        let mut files: Vec<_> = fs::read_dir(db.join("library"))
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        files.sort();
        files.iter().map(|p| fs::read_to_string(p).unwrap()).collect()
    }

    #[test]
    fn test_is_fasta_file() {
        assert!(is_fasta_file(Path::new("GCF_1.1_genomic.fna")));
        assert!(is_fasta_file(Path::new("GCF_1.1.fa.gz")));
        assert!(!is_fasta_file(Path::new("GCF_1.1.txt")));
        assert!(!is_fasta_file(Path::new("GCF_1.1.tar.gz")));
    }

    #[test]
    fn test_scan_and_missing() {
        let genomes = tempfile::tempdir().unwrap();
        fs::create_dir(genomes.path().join("nested")).unwrap();
        write_genome(genomes.path(), "GCF_000005845.2_ASM584v2_genomic.fna", ">a\nACGT\n");
        write_genome(&genomes.path().join("nested"), "GCA_000010565.1.fna.gz", ">b\nAC\n");
        write_genome(genomes.path(), "notes.txt", "GCF_999.1");

        let library = GenomeLibrary::scan(genomes.path()).unwrap();
        assert_eq!(library.len(), 2);
        assert!(library.path_of("GCA_000010565.1").is_some());

        let mut store = GenomeMap::in_memory();
        store.add_genome("GCF_000005845.2", 9, None).unwrap();
        store.add_genome("GCF_000001405.40", 10, None).unwrap();
        store.add_genome("GCA_000000001.1", 11, None).unwrap();
        assert_eq!(
            library.missing(&store),
            vec!["GCA_000000001.1".to_string(), "GCF_000001405.40".to_string()]
        );

        let out = tempfile::tempdir().unwrap();
        let missing_path = out.path().join(MISSING_FILE);
        assert_eq!(library.write_missing(&store, &missing_path).unwrap(), 2);
        assert_eq!(
            fs::read_to_string(missing_path).unwrap(),
            "GCA_000000001.1\nGCF_000001405.40\n"
        );
    }

    #[test]
    fn test_write_library_rewrites_headers_and_skips() {
        let genomes = tempfile::tempdir().unwrap();
        write_genome(
            genomes.path(),
            "GCF_000005845.2_genomic.fna.gz",
            ">NC_000913.3 Escherichia coli\nACGT\nTTGA\n>NC_000914.1 plasmid\nGG\n",
        );
        write_genome(genomes.path(), "GCA_000010565.1.fna", ">AP009389.1\nCCCC\n");
        let library = GenomeLibrary::scan(genomes.path()).unwrap();

        let mut store = GenomeMap::in_memory();
        store.add_genome("GCF_000005845.2", 12, Some("refseq")).unwrap();
        store.add_genome("GCA_000010565.1", 13, Some("genbank")).unwrap();
        store.add_genome("GCF_000000000.1", 14, None).unwrap();
        let skip = SkipList {
            taxon_ids: HashSet::from([13]),
            ..SkipList::default()
        };

        let db = tempfile::tempdir().unwrap();
        let summary = library
            .write_library(db.path(), &store, &skip, 1 << 30, 2)
            .unwrap();
        assert_eq!(
            summary,
            LibrarySummary {
                genomes_written: 1,
                genomes_skipped: 1,
                genomes_missing: 1,
                sequences: 2,
            }
        );

        let fna = read_library(db.path());
        assert_eq!(
            fna,
            ">kraken:taxid|12|NC_000913.3 Escherichia coli\nACGT\nTTGA\n>kraken:taxid|12|NC_000914.1 plasmid\nGG\n"
        );
        assert!(!fna.contains("AP009389.1"));
    }

    #[test]
    fn test_library_file_rolls_over_at_record_boundary() {
        let genomes = tempfile::tempdir().unwrap();
        write_genome(
            genomes.path(),
            "GCF_1.1.fna",
            ">s1\nAAAAAAAAAA\n>s2\nCCCCCCCCCC\n>s3\nGGGGGGGGGG\n",
        );
        let library = GenomeLibrary::scan(genomes.path()).unwrap();
        let mut store = GenomeMap::in_memory();
        store.add_genome("GCF_1.1", 20, None).unwrap();

        let db = tempfile::tempdir().unwrap();
        library
            .write_library(db.path(), &store, &SkipList::default(), 40, 1)
            .unwrap();
        let files: Vec<_> = fs::read_dir(db.path().join("library"))
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(files.len(), 3);
        for file in files {
            let text = fs::read_to_string(file).unwrap();
            assert!(text.starts_with(">kraken:taxid|20|"));
            assert_eq!(text.matches('>').count(), 1);
        }
        let map = fs::read_to_string(db.path().join("seqid2taxid_0.map")).unwrap();
        assert_eq!(map, "s1\t20\ns2\t20\ns3\t20\n");
    }

    #[test]
    fn test_rerun_replaces_previous_library() {
        let genomes = tempfile::tempdir().unwrap();
        write_genome(genomes.path(), "GCF_1.1.fna", ">a\nAAAA\n");
        write_genome(genomes.path(), "GCF_2.1.fna", ">b\nCCCC\n");
        write_genome(genomes.path(), "GCF_3.1.fna", ">c\nGGGG\n");
        let library = GenomeLibrary::scan(genomes.path()).unwrap();
        let mut store = GenomeMap::in_memory();
        store.add_genome("GCF_1.1", 20, None).unwrap();
        store.add_genome("GCF_2.1", 21, None).unwrap();
        store.add_genome("GCF_3.1", 22, None).unwrap();

        let db = tempfile::tempdir().unwrap();
        library
            .write_library(db.path(), &store, &SkipList::default(), 1 << 20, 4)
            .unwrap();
        assert_eq!(read_library(db.path()).matches('>').count(), 3);

        let skip = SkipList {
            taxon_ids: HashSet::from([21]),
            ..SkipList::default()
        };
        library
            .write_library(db.path(), &store, &skip, 1 << 20, 1)
            .unwrap();
        let fna = read_library(db.path());
        assert_eq!(fna.matches('>').count(), 2);
        assert_eq!(fna.matches(">kraken:taxid|20|a").count(), 1);
        assert!(!fna.contains("taxid|21|"));

        let maps: Vec<_> = fs::read_dir(db.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .filter(|n| n.starts_with("seqid2taxid_"))
            .collect();
        assert_eq!(maps, vec!["seqid2taxid_0.map".to_string()]);
        assert_eq!(
            fs::read_to_string(db.path().join("seqid2taxid_0.map")).unwrap(),
            "a\t20\nc\t22\n"
        );
    }
}
