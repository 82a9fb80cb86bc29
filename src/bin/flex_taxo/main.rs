use anyhow::Result;
use clap::{Parser, Subcommand};
use flex_taxo::args::{BuildArgs, InspectArgs, LibraryArgs};
use std::time::Instant;

mod build;
mod inspect;
mod library;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Only print warnings and errors
    #[arg(short, long, global = true, action)]
    quiet: bool,

    /// Debug output
    #[arg(long, global = true, action)]
    debug: bool,

    #[clap(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Build(BuildArgs),
    Library(LibraryArgs),
    Inspect(InspectArgs),
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.debug {
        log::LevelFilter::Debug
    } else if args.quiet {
        log::LevelFilter::Warn
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new().filter_level(level).init();

    let start = Instant::now();
    match args.cmd {
        Commands::Build(cmd_args) => {
            build::run(cmd_args)?;
        }
        Commands::Library(cmd_args) => {
            library::run(cmd_args)?;
        }
        Commands::Inspect(cmd_args) => {
            inspect::run(cmd_args)?;
        }
    }
    log::debug!("finished in {:?}", start.elapsed());

    Ok(())
}
