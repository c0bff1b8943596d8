use std::error::Error;
use std::fmt::{self, Display};

use anyhow::bail;
use fixedbitset::FixedBitSet;
use hashbrown::HashSet;

use crate::Result;

/// Fixed-length presence/absence trait vector.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Traits {
    bits: FixedBitSet,
}

impl Traits {
    /// All traits absent.
    pub fn zeros(len: usize) -> Self {
        Self {
            bits: FixedBitSet::with_capacity(len),
        }
    }

    pub fn from_bits(bits: &[bool]) -> Self {
        let mut traits = Self::zeros(bits.len());
        for (pos, &present) in bits.iter().enumerate() {
            traits.set(pos, present);
        }
        traits
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.len() == 0
    }

    /// Value at trait position `pos`. Positions past the end read as absent.
    pub fn get(&self, pos: usize) -> bool {
        self.bits.contains(pos)
    }

    pub fn set(&mut self, pos: usize, present: bool) {
        self.bits.set(pos, present);
    }

    pub fn count_ones(&self) -> usize {
        self.bits.count_ones(..)
    }

    /// Positions of present traits in ascending order.
    pub fn ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits.ones()
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.len()).map(|pos| self.get(pos))
    }

    /// Number of positions at which the two vectors differ.
    pub fn hamming(&self, other: &Traits) -> usize {
        debug_assert_eq!(self.len(), other.len());
        self.bits.symmetric_difference(&other.bits).count()
    }

    /// Copies the values of `other` into `self` without reallocating.
    pub(crate) fn copy_from(&mut self, other: &Traits) {
        debug_assert_eq!(self.len(), other.len());
        self.bits.clone_from(&other.bits);
    }
}

impl FromIterator<bool> for Traits {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        let bits: Vec<bool> = iter.into_iter().collect();
        Self::from_bits(&bits)
    }
}

impl Display for Traits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for present in self.iter() {
            write!(f, "{}", if present { '1' } else { '0' })?;
        }
        Ok(())
    }
}

/// An observed species: a name and its trait vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Species {
    pub name: String,
    pub traits: Traits,
}

impl Species {
    /// Creates a species from raw trait values, every value must be 0 or 1.
    ///
    /// # Example
    /// ```
    /// use phylo_ancestry::species::{InputValidationError, Species};
    ///
    /// let species = Species::new("A", &[1, 0, 1]).unwrap();
    /// assert_eq!(species.traits.to_string(), "101");
    ///
    /// let err = Species::new("B", &[1, 2, 0]).unwrap_err();
    /// assert!(matches!(
    ///     err.downcast_ref::<InputValidationError>(),
    ///     Some(InputValidationError::NonBinaryTrait { position: 1, value: 2, .. })
    /// ));
    /// ```
    pub fn new(name: impl Into<String>, values: &[u8]) -> Result<Self> {
        let name = name.into();
        if values.is_empty() {
            bail!(InputValidationError::EmptyTraits { species: name });
        }
        if let Some((position, &value)) = values.iter().enumerate().find(|&(_, &v)| v > 1) {
            bail!(InputValidationError::NonBinaryTrait {
                species: name,
                position,
                value,
            });
        }
        let traits = values.iter().map(|&v| v == 1).collect();
        Ok(Self { name, traits })
    }

    pub fn from_traits(name: impl Into<String>, traits: Traits) -> Self {
        Self {
            name: name.into(),
            traits,
        }
    }
}

impl Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.traits)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputValidationError {
    NoSpecies,
    EmptyTraits {
        species: String,
    },
    NonBinaryTrait {
        species: String,
        position: usize,
        value: u8,
    },
    TraitCountMismatch {
        species: String,
        expected: usize,
        found: usize,
    },
    DuplicateName {
        name: String,
    },
}

impl Display for InputValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputValidationError::NoSpecies => write!(f, "No species provided"),
            InputValidationError::EmptyTraits { species } => {
                write!(f, "Species {species} has no traits")
            }
            InputValidationError::NonBinaryTrait {
                species,
                position,
                value,
            } => write!(
                f,
                "Species {species} has non-binary value {value} at trait {position}, only 0 and 1 are allowed"
            ),
            InputValidationError::TraitCountMismatch {
                species,
                expected,
                found,
            } => write!(
                f,
                "Species {species} has {found} traits, expected {expected}"
            ),
            InputValidationError::DuplicateName { name } => {
                write!(f, "Species name {name} is used more than once")
            }
        }
    }
}

impl Error for InputValidationError {}

/// Checks that the species set can be clustered and returns the shared trait count.
pub fn validate_species(species: &[Species]) -> Result<usize> {
    let Some(first) = species.first() else {
        bail!(InputValidationError::NoSpecies);
    };
    let n_traits = first.traits.len();
    let mut names = HashSet::with_capacity(species.len());
    for s in species {
        if s.traits.is_empty() {
            bail!(InputValidationError::EmptyTraits {
                species: s.name.clone()
            });
        }
        if s.traits.len() != n_traits {
            bail!(InputValidationError::TraitCountMismatch {
                species: s.name.clone(),
                expected: n_traits,
                found: s.traits.len(),
            });
        }
        if !names.insert(s.name.as_str()) {
            bail!(InputValidationError::DuplicateName {
                name: s.name.clone()
            });
        }
    }
    Ok(n_traits)
}

#[cfg(test)]
#[cfg_attr(coverage, coverage(off))]
mod tests;
