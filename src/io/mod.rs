use std::error::Error;
use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::bail;
use log::info;

use crate::species::{validate_species, Species};
use crate::tree::Tree;
use crate::Result;

pub struct DataError {
    pub message: String,
}
impl fmt::Debug for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}
impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}
impl Error for DataError {}

/// Reads species and their binary traits from a trait matrix file.
///
/// The first non-empty line holds the number of species and the number of traits, every
/// following non-empty line a species name and its trait values separated by whitespace:
/// ```text
/// 3 4
/// Whale 1 0 1 1
/// Shark 1 0 0 1
/// Frog  0 1 0 1
/// ```
/// Species names cannot be integers and must be unique.
///
/// # Example
/// ```
/// use phylo_ancestry::io::read_species;
/// use std::path::PathBuf;
/// let species = read_species(&PathBuf::from("./data/traits_worked_example.txt")).unwrap();
/// # assert_eq!(species.len(), 7);
/// # assert_eq!(species[0].name, "A");
/// # assert_eq!(species[0].traits.to_string(), "10001");
/// ```
pub fn read_species(path: &Path) -> Result<Vec<Species>> {
    info!("Reading species traits from file {}", path.display());
    let contents = fs::read_to_string(path)?;
    let species = parse_species(&contents)?;
    info!("Read {} species successfully", species.len());
    Ok(species)
}

/// Parses the contents of a trait matrix file, see [`read_species`] for the format.
pub fn parse_species(input: &str) -> Result<Vec<Species>> {
    let mut lines = input
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty());

    let Some((line_no, header)) = lines.next() else {
        bail!(DataError {
            message: String::from("No species found in file")
        });
    };
    let (n_species, n_traits) = parse_header(line_no, header)?;

    let mut species = Vec::new();
    for (line_no, line) in lines {
        if species.len() == n_species {
            bail!(DataError {
                message: format!(
                    "Line {}: more species than the {} declared in the header",
                    line_no, n_species
                )
            });
        }
        species.push(parse_species_line(line_no, line, n_traits)?);
    }
    if species.len() != n_species {
        bail!(DataError {
            message: format!(
                "Header declares {} species, but only {} were found",
                n_species,
                species.len()
            )
        });
    }
    validate_species(&species)?;
    Ok(species)
}

fn parse_header(line_no: usize, line: &str) -> Result<(usize, usize)> {
    let counts: Vec<_> = line.split_whitespace().map(str::parse::<usize>).collect();
    match counts.as_slice() {
        [Ok(n_species), Ok(n_traits)] => Ok((*n_species, *n_traits)),
        _ => bail!(DataError {
            message: format!(
                "Line {}: expected \"<number of species> <number of traits>\", found \"{}\"",
                line_no, line
            )
        }),
    }
}

fn parse_species_line(line_no: usize, line: &str, n_traits: usize) -> Result<Species> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let Some((name, tokens)) = tokens.split_first() else {
        bail!(DataError {
            message: format!("Line {}: missing species name", line_no)
        });
    };
    if name.parse::<i64>().is_ok() {
        bail!(DataError {
            message: format!(
                "Line {}: the first token must be the species name, found integer {}",
                line_no, name
            )
        });
    }
    if tokens.len() != n_traits {
        bail!(DataError {
            message: format!(
                "Line {}: species {} has {} traits instead of {}",
                line_no,
                name,
                tokens.len(),
                n_traits
            )
        });
    }
    let mut values = Vec::with_capacity(n_traits);
    for (pos, token) in tokens.iter().enumerate() {
        match *token {
            "0" => values.push(0),
            "1" => values.push(1),
            _ => bail!(DataError {
                message: format!(
                    "Line {}: species {} has trait value \"{}\" at position {}, only 0 or 1 are allowed",
                    line_no, name, token, pos
                )
            }),
        }
    }
    Species::new(*name, &values)
}

/// Short code name of the species at `idx`: `A` to `Z`, then `AA`, `AB` and so on.
pub fn codename(idx: usize) -> String {
    let mut code = Vec::new();
    let mut rest = idx + 1;
    while rest > 0 {
        rest -= 1;
        code.push(b'A' + (rest % 26) as u8);
        rest /= 26;
    }
    code.iter().rev().map(|&c| c as char).collect()
}

/// Renames species to their code names and returns the glossary lines `code: name`.
pub fn assign_codenames(species: &[Species]) -> (Vec<Species>, Vec<String>) {
    species
        .iter()
        .enumerate()
        .map(|(idx, s)| {
            let code = codename(idx);
            let entry = format!("{}: {}", code, s.name);
            (Species::from_traits(code, s.traits.clone()), entry)
        })
        .unzip()
}

/// Human readable report of a built, possibly resolved, tree.
///
/// Contains the Newick string, the parsimony score and the ancestor states in preorder
/// once the tree is resolved, and the species glossary if one is given.
pub fn format_results(tree: &Tree, glossary: &[String]) -> String {
    let mut report = format!("{}\n", tree.to_newick());
    match tree.parsimony_score() {
        Some(score) => {
            report.push_str(&format!("Parsimony score: {}\n", score));
            report.push_str("Ancestral trait states (preorder):\n");
            for node_idx in tree.internal_preorder() {
                report.push_str(&format!(
                    "  {} (height {}): {}\n",
                    node_idx,
                    tree.height(&node_idx),
                    tree.traits(&node_idx)
                ));
            }
        }
        None => report.push_str("Ancestral trait states not resolved\n"),
    }
    if !glossary.is_empty() {
        report.push_str("Species glossary:\n");
        for entry in glossary {
            report.push_str(&format!("  {}\n", entry));
        }
    }
    report
}

/// Writes the report of [`format_results`] to the given path. Will return an error if the
/// file already exists.
pub fn write_results_to_file(tree: &Tree, glossary: &[String], path: &Path) -> Result<()> {
    info!("Writing results to file {}", path.display());
    if path.exists() {
        bail!(DataError {
            message: String::from("File already exists")
        });
    }
    let mut writer = File::create(path)?;
    writer.write_all(format_results(tree, glossary).as_bytes())?;
    info!("Finished writing successfully");
    Ok(())
}
