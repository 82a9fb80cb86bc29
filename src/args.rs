use crate::builder::BuildOptions;
use crate::dump::DumpOptions;
use crate::errors::Result;
use clap::Parser;
use std::path::PathBuf;

/// Options shared by every command that reads or writes an output database.
#[derive(Parser, Debug, Clone)]
pub struct DbArgs {
    /// Output directory holding the dumps and the genome map
    #[arg(long = "db", short = 'o', required = true)]
    pub database: PathBuf,

    /// Comma separated base names of the names and nodes dump files
    #[arg(long, default_value = "names,nodes")]
    pub dump_prefix: String,
}

impl DbArgs {
    pub fn dump_options(&self) -> Result<DumpOptions> {
        DumpOptions::default().with_prefix(&self.dump_prefix)
    }
}

#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about = "Build a taxonomy tree from a QIIME/GTDB lineage file",
    long_about = "Build a taxonomy tree from a QIIME/GTDB lineage file.
Every row maps a genome to a semicolon separated lineage such as
    RS_GCF_000005845.2<TAB>d__Bacteria;p__Proteobacteria;...;s__Escherichia coli
The tree is written as nodes.dmp/names.dmp and the genomes as genome2taxid.map."
)]
pub struct BuildArgs {
    #[clap(flatten)]
    pub db: DbArgs,

    /// QIIME/GTDB taxonomy file (plain or .gz)
    #[arg(short = 'i', long = "input", required = true)]
    pub taxonomy_file: PathBuf,

    /// Id given to the root, new nodes count up from it
    #[arg(long, default_value_t = 1)]
    pub taxid_base: u64,

    /// Column separator of the taxonomy file
    #[arg(long, default_value = "\t")]
    pub sep: String,

    /// Keep the RS/GB genome prefix as reference instead of refseq/genbank
    #[arg(long, action)]
    pub raw_reference: bool,

    /// Only read this many rows
    #[arg(long)]
    pub limit: Option<usize>,

    /// Leave nodes without a parent out of nodes.dmp instead of placing them under root
    #[arg(long, action)]
    pub detach_orphans: bool,

    /// Genome map to update, default <db>/genome2taxid.map
    #[arg(long)]
    pub genome_map: Option<PathBuf>,
}

impl BuildArgs {
    pub fn build_options(&self) -> BuildOptions {
        // a literal "\t" typed on the command line means tab
        let sep = if self.sep == "\\t" {
            "\t".to_string()
        } else {
            self.sep.clone()
        };
        BuildOptions {
            sep,
            raw_reference: self.raw_reference,
            limit: self.limit,
        }
    }

    pub fn dump_options(&self) -> Result<DumpOptions> {
        let mut options = self.db.dump_options()?;
        options.detach_orphans = self.detach_orphans;
        Ok(options)
    }
}

#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about = "Collect genome files into a Kraken style library",
    long_about = "Pair the genomes of a built database with their sequence files,
report the missing ones and write library/library_*.fna with kraken:taxid headers."
)]
pub struct LibraryArgs {
    #[clap(flatten)]
    pub db: DbArgs,

    /// Directory holding the genome FASTA files
    #[arg(long, required = true)]
    pub genomes_path: PathBuf,

    /// File with genome ids or taxids to leave out, one per line
    #[arg(long)]
    pub skip: Option<PathBuf>,

    /// Only report missing genomes, do not write the library
    #[arg(long, action)]
    pub check: bool,

    /// library fna file max size
    #[arg(long = "max-file-size", value_parser = parse_size, default_value = "2G")]
    pub max_file_size: usize,

    /// Number of threads
    #[clap(short = 'p', long, default_value_t = num_cpus::get())]
    pub threads: usize,
}

#[derive(Parser, Debug, Clone)]
#[clap(version, about = "Print the lineage of taxids from a dump")]
pub struct InspectArgs {
    #[clap(flatten)]
    pub db: DbArgs,

    /// Taxids to look up
    #[arg(required = true, num_args = 1..)]
    pub taxids: Vec<u64>,
}

/// Parse a human readable size such as `2G`, `512M` or `64k`.
pub fn parse_size(s: &str) -> std::result::Result<usize, String> {
    let len = s.len();
    if len < 2 {
        return Err("Size must be at least two characters".to_string());
    }

    let (num, suffix) = s.split_at(len - 1);
    let number: f64 = num.parse().map_err(|_| "Invalid number".to_string())?;
    match suffix {
        "G" | "g" => Ok((number * 1_073_741_824.0) as usize), // 2^30
        "M" | "m" => Ok((number * 1_048_576.0) as usize),     // 2^20
        "K" | "k" => Ok((number * 1_024.0) as usize),         // 2^10
        _ => Err("Invalid size suffix. Use 'G', 'M', or 'K'".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("2G"), Ok(2 * 1_073_741_824));
        assert_eq!(parse_size("1.5k"), Ok(1536));
        assert!(parse_size("G").is_err());
        assert!(parse_size("10T").is_err());
    }

    #[test]
    fn test_build_args_defaults() {
        let args = BuildArgs::parse_from(["build", "--db", "out", "-i", "tax.tsv"]);
        assert_eq!(args.taxid_base, 1);
        let options = args.build_options();
        assert_eq!(options.sep, "\t");
        assert!(!options.raw_reference);
        let dump = args.dump_options().unwrap();
        assert_eq!(dump.nodes_prefix, "nodes");
        assert!(!dump.detach_orphans);

        let args = BuildArgs::parse_from(["build", "--db", "out", "-i", "x", "--sep", "\\t"]);
        assert_eq!(args.build_options().sep, "\t");
    }
}
