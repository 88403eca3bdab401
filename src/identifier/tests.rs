//! Unit tests for repository name validation.

use super::*;
use rstest::rstest;

#[rstest]
#[case("a")]
#[case("terratest-ecrpublic-test-4821")]
#[case("0-9")]
#[case("abc123")]
fn accepts_well_formed_names(#[case] candidate: &str) {
    assert_eq!(validate(candidate), Ok(()));
}

#[rstest]
fn accepts_names_at_the_length_limit() {
    let candidate = "a".repeat(MAX_NAME_LENGTH);
    assert!(RepositoryName::parse(candidate).is_ok());
}

#[rstest]
fn rejects_empty_names() {
    assert_eq!(validate(""), Err(ValidationError::Empty));
}

#[rstest]
fn rejects_names_over_the_length_limit() {
    let candidate = "a".repeat(MAX_NAME_LENGTH + 1);
    assert_eq!(
        validate(&candidate),
        Err(ValidationError::TooLong { length: 257 })
    );
}

#[rstest]
#[case("ABC")]
#[case("repo_name")]
#[case("repo name")]
#[case("repo;rm -rf")]
#[case("a..b")]
#[case("répo")]
fn rejects_names_outside_the_character_set(#[case] candidate: &str) {
    assert!(matches!(
        validate(candidate),
        Err(ValidationError::InvalidCharacters { .. })
    ));
}

#[rstest]
#[case("-abc")]
#[case("abc-")]
#[case("-")]
fn rejects_edge_hyphens(#[case] candidate: &str) {
    assert!(matches!(
        validate(candidate),
        Err(ValidationError::EdgeHyphen { .. })
    ));
}

#[rstest]
fn length_is_checked_before_the_character_set() {
    let candidate = "A".repeat(MAX_NAME_LENGTH + 1);
    assert!(matches!(
        validate(&candidate),
        Err(ValidationError::TooLong { .. })
    ));
}

#[rstest]
fn unique_names_carry_the_prefix_and_differ() {
    let first = RepositoryName::unique("terratest-gallery").expect("valid prefix");
    let second = RepositoryName::unique("terratest-gallery").expect("valid prefix");
    assert!(first.as_str().starts_with("terratest-gallery-"));
    assert_eq!(first.as_str().len(), "terratest-gallery-".len() + 6);
    assert_ne!(first, second);
}

#[rstest]
fn unique_rejects_invalid_prefixes() {
    assert!(RepositoryName::unique("Bad").is_err());
}

#[rstest]
fn display_matches_the_validated_name() {
    let name = RepositoryName::parse("foo-1").expect("valid name");
    assert_eq!(name.to_string(), "foo-1");
    assert_eq!(name.as_ref(), "foo-1");
}
