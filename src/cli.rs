use std::fmt::{self, Display};
use std::path::PathBuf;

use anyhow::bail;
use clap::Parser;

use crate::Result;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub(super) struct Cli {
    /// Trait matrix file: a "<species> <traits>" header, then one "name t1 .. tL" line per species
    #[arg(short, long, value_name = "TRAIT_FILE")]
    pub(super) input: PathBuf,

    /// Output file for the tree and ancestral states, printed to stdout if absent
    #[arg(short, long, value_name = "OUTPUT_FILE")]
    pub(super) output: Option<PathBuf>,

    /// Only build the UPGMA tree, skip the parsimony search
    #[arg(long)]
    pub(super) no_parsimony: bool,

    /// Start the parsimony search without the majority-vote upper bound
    #[arg(long)]
    pub(super) no_seeding: bool,

    /// Rename species to A, B, C, .. and print a glossary
    #[arg(short, long)]
    pub(super) codenames: bool,

    /// Log every merge and every improvement of the parsimony bound
    #[arg(short, long)]
    pub(super) verbose: bool,
}

pub(super) struct ConfigBuilder {
    input: PathBuf,
    output: Option<PathBuf>,
    parsimony: bool,
    seeding: bool,
    codenames: bool,
}

impl From<Cli> for ConfigBuilder {
    fn from(cli: Cli) -> Self {
        Self {
            input: cli.input,
            output: cli.output,
            parsimony: !cli.no_parsimony,
            seeding: !cli.no_seeding,
            codenames: cli.codenames,
        }
    }
}

impl ConfigBuilder {
    pub(super) fn setup(self) -> Result<Config> {
        if !self.input.is_file() {
            bail!("Input file {} does not exist", self.input.display());
        }
        if let Some(output) = &self.output {
            if output.exists() {
                bail!(
                    "Output file {} already exists, refusing to overwrite it",
                    output.display()
                );
            }
        }
        Ok(Config {
            input: self.input,
            output: self.output,
            parsimony: self.parsimony,
            seeding: self.seeding,
            codenames: self.codenames,
        })
    }
}

#[derive(Debug)]
pub(super) struct Config {
    pub(super) input: PathBuf,
    pub(super) output: Option<PathBuf>,
    pub(super) parsimony: bool,
    pub(super) seeding: bool,
    pub(super) codenames: bool,
}

impl Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Configuration:")?;
        writeln!(f, "  input: {}", self.input.display())?;
        match &self.output {
            Some(output) => writeln!(f, "  output: {}", output.display())?,
            None => writeln!(f, "  output: stdout")?,
        }
        writeln!(f, "  parsimony search: {}", self.parsimony)?;
        writeln!(f, "  majority seeding: {}", self.seeding)?;
        write!(f, "  code names: {}", self.codenames)
    }
}
