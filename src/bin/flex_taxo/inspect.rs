use anyhow::Result;
use flex_taxo::args::InspectArgs;
use flex_taxo::dump::DumpTaxonomy;
use log::warn;

pub fn run(args: InspectArgs) -> Result<()> {
    let options = args.db.dump_options()?;
    let taxonomy = DumpTaxonomy::from_dir(&args.db.database, &options)?;

    for taxid in args.taxids {
        let lineage = taxonomy.lineage(taxid);
        if lineage.is_empty() {
            warn!("taxid {} not found in {:?}", taxid, options.nodes_path(&args.db.database));
            continue;
        }
        let pieces: Vec<String> = lineage
            .iter()
            .rev()
            .map(|(id, rank, name)| format!("{}:{}({})", rank, name, id))
            .collect();
        println!("{}\t{}", taxid, pieces.join(" > "));
    }
    Ok(())
}
