use anyhow::{Context, Result};
use flex_taxo::args::BuildArgs;
use flex_taxo::dump::write_dumps;
use flex_taxo::genome::GENOME_MAP_FILE;
use flex_taxo::utils::{create_dir, write_atomically};
use flex_taxo::{GenomeMap, TaxonomyTree, TreeBuilder};
use log::info;

pub const SUMMARY_FILE: &str = "build_summary.json";

pub fn run(args: BuildArgs) -> Result<()> {
    let dump_options = args.dump_options()?;
    let db = &args.db.database;
    create_dir(db).with_context(|| format!("create output directory {:?}", db))?;

    let genome_map_path = args
        .genome_map
        .clone()
        .unwrap_or_else(|| db.join(GENOME_MAP_FILE));
    if genome_map_path.exists() {
        info!("Warning: {:?} already exists, overwriting", genome_map_path);
    }
    let mut store = GenomeMap::create(&genome_map_path);

    let mut tree = TaxonomyTree::new(args.taxid_base);
    let stats = TreeBuilder::new(&mut tree, &mut store, args.build_options())
        .run_file(&args.taxonomy_file, None)
        .with_context(|| format!("build taxonomy from {:?}", args.taxonomy_file))?;

    let summary = write_dumps(&tree, db, &dump_options)?;
    write_atomically(db.join(SUMMARY_FILE), |writer| {
        serde_json::to_writer_pretty(&mut *writer, &stats)?;
        Ok(())
    })?;

    info!(
        "{} rows, {} genomes added ({} listed twice), {} missed, {} errors",
        stats.rows, stats.added, stats.duplicates, stats.missed, stats.errors
    );
    info!(
        "{} nodes written, {} not connected to root",
        summary.nodes_written, summary.orphans
    );
    Ok(())
}
