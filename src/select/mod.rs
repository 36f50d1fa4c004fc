//! Phenotype selection: description grammar, named rules and row masks.
//!
//! ```text
//!  "CD3+/CD8+"  ──parser──▶  Selector  ──evaluate──▶  Vec<bool>
//!                               ▲
//!  referenced names ──rules─────┘  (RuleSet: name → Selector)
//! ```

pub mod evaluate;
pub mod parser;
pub mod rules;
pub mod selector;

pub use evaluate::{evaluate_predicate, select_rows, select_rows_all, selected_indices};
pub use parser::{parse_phenotypes, parse_phenotypes_json, parse_selector};
pub use rules::{RuleEntries, RuleSet, resolve_rules};
pub use selector::{CompareOp, Predicate, Selector};
