use anyhow::{bail, Context, Result};
use flex_taxo::args::LibraryArgs;
use flex_taxo::dump::parse_nodes_file;
use flex_taxo::genome::GENOME_MAP_FILE;
use flex_taxo::library::{GenomeLibrary, MISSING_FILE};
use flex_taxo::skip::{read_skip_file, SkipList};
use flex_taxo::GenomeMap;
use log::{info, warn};

pub fn run(args: LibraryArgs) -> Result<()> {
    let db = &args.db.database;
    let genome_map_path = db.join(GENOME_MAP_FILE);
    if !genome_map_path.exists() {
        bail!(
            "No genome map found at {:?}, run `flex_taxo build` first",
            genome_map_path
        );
    }
    let store = GenomeMap::open(&genome_map_path)?;
    let library = GenomeLibrary::scan(&args.genomes_path)
        .with_context(|| format!("scan genomes in {:?}", args.genomes_path))?;

    let missing = library.write_missing(&store, db.join(MISSING_FILE))?;
    if missing > 0 {
        warn!(
            "{} genomes were found and {} genomes are missing, see {:?}",
            store.len() - missing,
            missing,
            db.join(MISSING_FILE)
        );
    }
    if args.check {
        return Ok(());
    }

    let mut skip = match &args.skip {
        Some(path) => read_skip_file(path).with_context(|| format!("read skip file {:?}", path))?,
        None => SkipList::default(),
    };
    if !skip.taxon_ids.is_empty() {
        let nodes = parse_nodes_file(args.db.dump_options()?.nodes_path(db))?;
        let children = nodes.children_map();
        skip.expand(|taxid| children.get(&taxid).cloned().unwrap_or_default());
    }
    if !skip.is_empty() {
        info!(
            "skip list holds {} genomes and {} taxids",
            skip.genome_ids.len(),
            skip.taxon_ids.len()
        );
    }

    let summary = library.write_library(
        db,
        &store,
        &skip,
        args.max_file_size as u64,
        args.threads,
    )?;
    info!(
        "{} genomes written to {:?}",
        summary.genomes_written,
        db.join("library")
    );
    Ok(())
}
