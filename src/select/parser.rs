//! Phenotype description grammar.
//!
//! | description        | selector                           |
//! |--------------------|------------------------------------|
//! | `CD8+`             | `AnyOf[CD8+]`                      |
//! | `CD3+/CD8+`        | `AllOf[AnyOf[CD3+], AnyOf[CD8+]]`  |
//! | `CD68+,CD163+`     | `AnyOf[CD68+, CD163+]`             |
//! | `Total Cells`      | `All`                              |

use std::collections::HashSet;

use serde_json::Value as JsonValue;

use crate::error::CellError;

use super::rules::RuleSet;
use super::selector::{Selector, json_string};

fn is_simple_phenotype(s: &str) -> bool {
    s.ends_with('+') || s.ends_with('-')
}

/// Parse one phenotype description into a [`Selector`].
pub fn parse_selector(description: &str) -> Result<Selector, CellError> {
    let desc = description.trim();

    if desc.contains('/') {
        if desc.contains(',') {
            return Err(CellError::parse(
                desc,
                "can't mix '/' (and) with ',' (or) in one phenotype",
            ));
        }
        let parts = desc
            .split('/')
            .map(|part| {
                let part = part.trim();
                if is_simple_phenotype(part) {
                    Ok(Selector::phenotype(part))
                } else {
                    Err(CellError::parse(
                        desc,
                        format!("'{part}' must end with '+' or '-'"),
                    ))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Selector::AllOf(parts));
    }

    if desc.contains(',') {
        let names = desc.split(',').map(|p| p.trim().to_string()).collect();
        return Ok(Selector::AnyOf(names));
    }

    if is_simple_phenotype(desc) {
        return Ok(Selector::phenotype(desc));
    }

    let lower = desc.to_lowercase();
    if lower.contains("total") || lower.contains("all") {
        return Ok(Selector::All);
    }

    Err(CellError::parse(desc, "unrecognised phenotype description"))
}

/// Parse phenotype descriptions into named selectors.
///
/// Without `names`, each description is its own name; a blank name also
/// falls back to its description. Repeated descriptions without a name
/// collapse into one entry. Any other name clash, explicit or derived, is
/// a configuration error.
pub fn parse_phenotypes<S: AsRef<str>>(
    descriptions: &[S],
    names: Option<&[S]>,
) -> Result<RuleSet, CellError> {
    if let Some(names) = names {
        if names.len() != descriptions.len() {
            return Err(CellError::Validation(format!(
                "{} phenotype names given for {} descriptions",
                names.len(),
                descriptions.len()
            )));
        }
    }

    let mut rules = RuleSet::new();
    // names that came from their own description rather than an explicit name
    let mut derived: HashSet<&str> = HashSet::new();
    for (i, description) in descriptions.iter().enumerate() {
        let description = description.as_ref().trim();
        let explicit = names
            .map(|n| n[i].as_ref().trim())
            .filter(|n| !n.is_empty());
        let selector = parse_selector(description)?;

        match explicit {
            Some(name) => rules.insert(name, selector)?,
            None if derived.contains(description) => {
                log::debug!("phenotype '{description}' listed more than once");
            }
            None => {
                rules.insert(description, selector)?;
                derived.insert(description);
            }
        }
    }
    Ok(rules)
}

/// [`parse_phenotypes`] over untyped input, e.g. a list read from a config file.
///
/// Every element must be a string; numbers, objects and nested lists are
/// rejected rather than coerced.
pub fn parse_phenotypes_json(descriptions: &JsonValue) -> Result<RuleSet, CellError> {
    let items = descriptions.as_array().ok_or_else(|| {
        CellError::Type(format!("expected a list of phenotype strings, got {descriptions}"))
    })?;
    let texts = items
        .iter()
        .map(|v| json_string(v, "phenotype"))
        .collect::<Result<Vec<_>, _>>()?;
    parse_phenotypes(&texts, None)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[rstest]
    #[case("CD8+", Selector::phenotype("CD8+"))]
    #[case("  FoxP3- ", Selector::phenotype("FoxP3-"))]
    #[case(
        "CD3+/CD8+",
        Selector::AllOf(vec![Selector::phenotype("CD3+"), Selector::phenotype("CD8+")])
    )]
    #[case("CD3+ / CD8-", Selector::AllOf(vec![Selector::phenotype("CD3+"), Selector::phenotype("CD8-")]))]
    #[case("CD68+,CD163+", Selector::AnyOf(vec!["CD68+".into(), "CD163+".into()]))]
    #[case("Tumor, Other", Selector::AnyOf(vec!["Tumor".into(), "Other".into()]))]
    #[case("Total Cells", Selector::All)]
    #[case("all", Selector::All)]
    fn parses_descriptions(#[case] text: &str, #[case] expected: Selector) {
        assert_eq!(parse_selector(text).unwrap(), expected);
    }

    #[rstest]
    #[case("CD3+/CD8+,X")]
    #[case("CD3+/Tumor")]
    #[case("Tumor")]
    #[case("")]
    fn rejects_bad_descriptions(#[case] text: &str) {
        assert!(matches!(parse_selector(text), Err(CellError::Parse { .. })));
    }

    #[test]
    fn names_default_to_descriptions() {
        let rules = parse_phenotypes(&["CD8+", "CD3+/CD8+"], Some(&["", "Cytotoxic"])).unwrap();
        assert_eq!(rules.names(), vec!["CD8+", "Cytotoxic"]);
    }

    #[test]
    fn insertion_order_is_kept() {
        let rules = parse_phenotypes(&["Total", "CK+", "CD8+"], None).unwrap();
        assert_eq!(rules.names(), vec!["Total", "CK+", "CD8+"]);
    }

    #[test]
    fn repeated_unnamed_descriptions_collapse() {
        let rules = parse_phenotypes(&["CD8+", " CD8+"], None).unwrap();
        assert_eq!(rules.len(), 1);
    }

    #[test]
    fn duplicate_explicit_names_are_rejected() {
        let err = parse_phenotypes(&["CD8+", "CD3+"], Some(&["T", "T"])).unwrap_err();
        assert!(matches!(err, CellError::Configuration(_)));
    }

    #[test]
    fn derived_name_clashing_with_explicit_name_is_rejected() {
        let err = parse_phenotypes(&["CD3+/CD8+", "CD8+"], Some(&["CD8+", ""])).unwrap_err();
        assert!(matches!(err, CellError::Configuration(_)));

        let err = parse_phenotypes(&["CD8+", "CD3+/CD8+"], Some(&["", "CD8+"])).unwrap_err();
        assert!(matches!(err, CellError::Configuration(_)));
    }

    #[test]
    fn name_count_must_match() {
        let err = parse_phenotypes(&["CD8+", "CD3+"], Some(&["T"])).unwrap_err();
        assert!(matches!(err, CellError::Validation(_)));
    }

    #[test]
    fn json_descriptions_must_be_strings() {
        let err = parse_phenotypes_json(&json!(["CD8+", 4])).unwrap_err();
        assert!(matches!(err, CellError::Type(_)));
        let err = parse_phenotypes_json(&json!(["CD8+", {"column": "A", "value": 1}])).unwrap_err();
        assert!(matches!(err, CellError::Type(_)));
        assert_eq!(parse_phenotypes_json(&json!(["CD8+"])).unwrap().len(), 1);
    }
}
