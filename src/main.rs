use anyhow::{anyhow, bail, Error};
use clap::error::ErrorKind;
use clap::Parser;
use ftail::Ftail;
use log::{info, LevelFilter};

use phylo_ancestry::asr::ParsimonySearch;
use phylo_ancestry::build_tree;
use phylo_ancestry::io::{assign_codenames, format_results, read_species, write_results_to_file};

mod cli;
use crate::cli::{Cli, ConfigBuilder};

type Result<T> = std::result::Result<T, Error>;

fn main() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => match error.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => error.exit(),
            _ => bail!("Unable to parse command line arguments: \n {}", error),
        },
    };
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    Ftail::new()
        .console(level)
        .init()
        .map_err(|e| anyhow!("Unable to set up logging: {:?}", e))?;
    info!("Successfully parsed the command line parameters");

    let cfg_build: ConfigBuilder = cli.into();
    let cfg = cfg_build.setup()?;
    info!("{}", cfg);

    let species = read_species(&cfg.input)?;
    let (species, glossary) = if cfg.codenames {
        assign_codenames(&species)
    } else {
        (species, Vec::new())
    };

    let mut tree = build_tree(&species)?;
    if cfg.parsimony {
        let result = ParsimonySearch::new()
            .with_seeding(cfg.seeding)
            .run(&mut tree)?;
        info!(
            "Most parsimonious ancestral states found with score {} ({} candidates evaluated, {} branches pruned)",
            result.score, result.explored, result.pruned
        );
    } else {
        info!("Skipping the parsimony search");
    }

    match &cfg.output {
        Some(output) => write_results_to_file(&tree, &glossary, output)?,
        None => print!("{}", format_results(&tree, &glossary)),
    }
    Ok(())
}
