use assert_matches::assert_matches;
use rstest::*;

use crate::species::{validate_species, InputValidationError, Species, Traits};
use crate::{species, traits};

#[rstest]
#[case::identical(traits![1, 0, 1], traits![1, 0, 1], 0)]
#[case::single(traits![1, 0, 0, 0, 1], traits![1, 0, 1, 0, 1], 1)]
#[case::all(traits![0, 0, 0, 0], traits![1, 1, 1, 1], 4)]
#[case::mixed(traits![1, 1, 1, 0, 0], traits![0, 0, 0, 0, 1], 4)]
fn hamming_distance(#[case] a: Traits, #[case] b: Traits, #[case] expected: usize) {
    assert_eq!(a.hamming(&b), expected);
    assert_eq!(b.hamming(&a), expected);
}

#[test]
fn traits_display_and_accessors() {
    let traits = traits![1, 0, 0, 1, 1];
    assert_eq!(traits.to_string(), "10011");
    assert_eq!(traits.len(), 5);
    assert_eq!(traits.count_ones(), 3);
    assert_eq!(traits.ones().collect::<Vec<_>>(), vec![0, 3, 4]);
    assert!(traits.get(0));
    assert!(!traits.get(1));
    assert!(!traits.get(10));
    assert_eq!(
        traits.iter().collect::<Vec<_>>(),
        vec![true, false, false, true, true]
    );
}

#[test]
fn traits_set_and_copy() {
    let mut traits = Traits::zeros(3);
    assert_eq!(traits.to_string(), "000");
    traits.set(2, true);
    assert_eq!(traits, traits![0, 0, 1]);
    let mut other = Traits::zeros(3);
    other.copy_from(&traits);
    assert_eq!(other, traits);
    let collected: Traits = [true, true, false].into_iter().collect();
    assert_eq!(collected, traits![1, 1, 0]);
}

#[test]
fn species_from_values() {
    let species = Species::new("A", &[1, 0, 0, 0, 1]).unwrap();
    assert_eq!(species, species!("A", [1, 0, 0, 0, 1]));
    assert_eq!(species.to_string(), "A: 10001");
}

#[test]
fn species_non_binary() {
    let err = Species::new("B", &[0, 1, 3]).unwrap_err();
    assert_matches!(
        err.downcast_ref::<InputValidationError>(),
        Some(InputValidationError::NonBinaryTrait {
            species,
            position: 2,
            value: 3
        }) if species == "B"
    );
    assert!(err.to_string().contains("non-binary value 3"));
}

#[test]
fn species_without_traits() {
    let err = Species::new("C", &[]).unwrap_err();
    assert_matches!(
        err.downcast_ref::<InputValidationError>(),
        Some(InputValidationError::EmptyTraits { .. })
    );
}

#[test]
fn validate_correct_species() {
    let species = vec![
        species!("A", [1, 0, 1]),
        species!("B", [1, 1, 1]),
        species!("C", [0, 0, 1]),
    ];
    assert_eq!(validate_species(&species).unwrap(), 3);
}

#[test]
fn validate_no_species() {
    let err = validate_species(&[]).unwrap_err();
    assert_matches!(
        err.downcast_ref::<InputValidationError>(),
        Some(InputValidationError::NoSpecies)
    );
}

#[test]
fn validate_length_mismatch() {
    let species = vec![
        species!("A", [1, 0, 1]),
        species!("B", [1, 1]),
        species!("C", [0, 0, 1]),
    ];
    let err = validate_species(&species).unwrap_err();
    assert_matches!(
        err.downcast_ref::<InputValidationError>(),
        Some(InputValidationError::TraitCountMismatch {
            expected: 3,
            found: 2,
            ..
        })
    );
}

#[test]
fn validate_duplicate_names() {
    let species = vec![species!("A", [1, 0]), species!("A", [1, 1])];
    let err = validate_species(&species).unwrap_err();
    assert_matches!(
        err.downcast_ref::<InputValidationError>(),
        Some(InputValidationError::DuplicateName { name }) if name == "A"
    );
}

#[test]
fn validate_empty_traits() {
    let species = vec![species!("A", []), species!("B", [])];
    let err = validate_species(&species).unwrap_err();
    assert_matches!(
        err.downcast_ref::<InputValidationError>(),
        Some(InputValidationError::EmptyTraits { species }) if species == "A"
    );
}
