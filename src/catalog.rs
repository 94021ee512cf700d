//! Step catalog loading.
//!
//! Catalogs are JSON arrays of steps. The built-in product tour is embedded at
//! compile time; custom catalogs are read from disk with `--catalog`.

use crate::model::{DemoStep, StepAction};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

const BUILTIN_CATALOG: &str = include_str!("../catalogs/product_tour.json");

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read catalog {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("catalog contains no steps")]
    Empty,

    #[error("duplicate step id '{id}'")]
    DuplicateId { id: String },
}

/// The product tour shipped with the binary.
pub fn builtin_catalog() -> Result<Vec<DemoStep>, CatalogError> {
    parse_catalog(BUILTIN_CATALOG)
}

/// Load a catalog from a JSON file.
pub fn load_catalog(path: &Path) -> Result<Vec<DemoStep>, CatalogError> {
    let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_catalog(&raw)
}

pub fn parse_catalog(raw: &str) -> Result<Vec<DemoStep>, CatalogError> {
    let mut steps: Vec<DemoStep> = serde_json::from_str(raw)?;
    if steps.is_empty() {
        return Err(CatalogError::Empty);
    }

    let mut seen = HashSet::new();
    for step in &mut steps {
        if !seen.insert(step.id.clone()) {
            return Err(CatalogError::DuplicateId {
                id: step.id.clone(),
            });
        }
        if let StepAction::Unrecognized(tag) = &step.action {
            tracing::warn!(step = %step.id, action = %tag, "unrecognized action in catalog");
        }
        // Completion is runtime state; a catalog never starts a step as done.
        step.completed = false;
    }
    Ok(steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Route;

    #[test]
    fn builtin_catalog_parses() {
        let steps = builtin_catalog().unwrap();
        assert!(steps.len() > 5);
        assert!(steps.iter().all(|s| !s.completed));
        assert!(steps
            .iter()
            .all(|s| !matches!(s.action, StepAction::Unrecognized(_))));
        assert!(steps
            .iter()
            .any(|s| s.action == StepAction::Navigate(Route::WorkingStudio)));
    }

    #[test]
    fn rejects_empty_and_duplicates() {
        assert!(matches!(parse_catalog("[]"), Err(CatalogError::Empty)));

        let dup = r#"[{"id":"a","action":"export_document"},{"id":"a","action":"run_quality_check"}]"#;
        match parse_catalog(dup) {
            Err(CatalogError::DuplicateId { id }) => assert_eq!(id, "a"),
            other => panic!("expected duplicate id error, got {other:?}"),
        }
    }

    #[test]
    fn unknown_actions_are_kept_and_completion_cleared() {
        let raw = r#"[{"id":"a","action":"do_a_barrel_roll","completed":true}]"#;
        let steps = parse_catalog(raw).unwrap();
        assert_eq!(
            steps[0].action,
            StepAction::Unrecognized("do_a_barrel_roll".into())
        );
        assert!(!steps[0].completed);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_catalog(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.json"));
    }
}
