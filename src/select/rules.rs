use std::fmt;

use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
use serde_json::Value as JsonValue;

use crate::error::CellError;

use super::selector::Selector;

/// Named phenotype selectors in insertion order. Names are unique.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    entries: Vec<(String, Selector)>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule. A name that is already present is a configuration error.
    pub fn insert(&mut self, name: &str, selector: Selector) -> Result<(), CellError> {
        if self.get(name).is_some() {
            return Err(CellError::Configuration(format!(
                "phenotype '{name}' is defined more than once"
            )));
        }
        self.entries.push((name.to_string(), selector));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Selector> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, s)| s)
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Selector)> {
        self.entries.iter().map(|(n, s)| (n.as_str(), s))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Read rules from a JSON object mapping name → selector description.
    pub fn from_json(value: &JsonValue) -> Result<Self, CellError> {
        let obj = value.as_object().ok_or_else(|| {
            CellError::Type(format!("phenotype rules must be an object, got {value}"))
        })?;
        Self::from_pairs(obj)
    }

    fn from_pairs<'a>(
        pairs: impl IntoIterator<Item = (&'a String, &'a JsonValue)>,
    ) -> Result<Self, CellError> {
        let mut rules = RuleSet::new();
        for (name, selector) in pairs {
            rules.insert(name.trim(), Selector::from_json(selector)?)?;
        }
        Ok(rules)
    }
}

/// A rule map exactly as written in a document, repeated names included.
///
/// `serde_json::Value` keeps only the last of several equal keys, so job
/// files are read through this type to report a repeated name instead.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleEntries(pub Vec<(String, JsonValue)>);

impl RuleEntries {
    pub fn to_rules(&self) -> Result<RuleSet, CellError> {
        RuleSet::from_pairs(self.0.iter().map(|(name, selector)| (name, selector)))
    }
}

impl<'de> Deserialize<'de> for RuleEntries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = RuleEntries;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of phenotype names to selectors")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<RuleEntries, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry::<String, JsonValue>()? {
                    entries.push(entry);
                }
                Ok(RuleEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

/// Complete a partial rule set so it covers every referenced phenotype.
///
/// Referenced names without a rule select themselves (`name → AnyOf[name]`).
/// A supplied rule for a name nobody references is a configuration error.
/// The result follows the order of `referenced`.
pub fn resolve_rules<S: AsRef<str>>(
    referenced: &[S],
    supplied: Option<&RuleSet>,
) -> Result<RuleSet, CellError> {
    let referenced: Vec<&str> = referenced.iter().map(|s| s.as_ref()).collect();

    if let Some(supplied) = supplied {
        let unused: Vec<&str> = supplied
            .names()
            .into_iter()
            .filter(|name| !referenced.contains(name))
            .collect();
        if !unused.is_empty() {
            return Err(CellError::Configuration(format!(
                "rules given for phenotypes that are never used: {}",
                unused.join(", ")
            )));
        }
    }

    let mut resolved = RuleSet::new();
    for name in referenced {
        if resolved.get(name).is_some() {
            continue;
        }
        let selector = supplied
            .and_then(|rules| rules.get(name))
            .cloned()
            .unwrap_or_else(|| Selector::phenotype(name));
        resolved.insert(name, selector)?;
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn missing_rules_are_synthesized() {
        let mut supplied = RuleSet::new();
        supplied.insert("T cell", Selector::phenotype("CD3+")).unwrap();

        let rules = resolve_rules(&["CK+", "T cell", "CK+"], Some(&supplied)).unwrap();
        assert_eq!(rules.names(), vec!["CK+", "T cell"]);
        assert_eq!(rules.get("CK+"), Some(&Selector::phenotype("CK+")));
        assert_eq!(rules.get("T cell"), Some(&Selector::phenotype("CD3+")));
    }

    #[test]
    fn unreferenced_rules_are_reported() {
        let mut supplied = RuleSet::new();
        supplied.insert("B cell", Selector::phenotype("CD20+")).unwrap();
        supplied.insert("NK", Selector::phenotype("CD56+")).unwrap();

        let err = resolve_rules(&["CK+"], Some(&supplied)).unwrap_err();
        match err {
            CellError::Configuration(msg) => {
                assert!(msg.contains("B cell") && msg.contains("NK"), "{msg}");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn rules_load_from_json_object() {
        let rules = RuleSet::from_json(&json!({
            "Cytotoxic": "CD3+/CD8+",
            "Macrophage": "CD68+,CD163+"
        }))
        .unwrap();
        assert_eq!(rules.len(), 2);
        assert!(matches!(rules.get("Cytotoxic"), Some(Selector::AllOf(_))));
        assert!(RuleSet::from_json(&json!(["CD8+"])).is_err());
    }

    #[test]
    fn repeated_names_in_a_document_are_rejected() {
        let entries: RuleEntries = serde_json::from_str(r#"{"T": "CD3+", "T": "CD8+"}"#).unwrap();
        assert_eq!(entries.0.len(), 2);
        assert!(matches!(entries.to_rules(), Err(CellError::Configuration(_))));

        let entries: RuleEntries = serde_json::from_str(r#"{"T": "CD3+", "M": "CD68+"}"#).unwrap();
        assert_eq!(entries.to_rules().unwrap().names(), vec!["T", "M"]);
    }
}
