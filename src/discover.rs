//! Locating and loading `*.model.json` declaration files.

use crate::model::{Model, ModelDecl, ModelError};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const MODEL_SUFFIX: &str = ".model.json";

#[derive(Debug, thiserror::Error)]
pub enum DiscoverError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid declaration in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid model in {}: {source}", path.display())]
    Model { path: PathBuf, source: ModelError },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Declarations {
    Many(Vec<ModelDecl>),
    One(ModelDecl),
}

/// A JSON document holding one declaration or an array of them.
pub fn parse_declarations(text: &str) -> Result<Vec<ModelDecl>, serde_json::Error> {
    Ok(match serde_json::from_str(text)? {
        Declarations::Many(decls) => decls,
        Declarations::One(decl) => vec![decl],
    })
}

/// Every model declared under `root`, files visited in path order.
///
/// Directories whose name is in `exclude` are skipped, as are symlinks.
pub fn discover(root: &Path, exclude: &[String]) -> Result<Vec<Model>, DiscoverError> {
    let mut files = Vec::new();
    collect(root, exclude, &mut files)?;
    files.sort();

    let mut models = Vec::new();
    for path in files {
        info!(path = %path.display(), "processing file");
        let text = fs::read_to_string(&path).map_err(|source| DiscoverError::Io {
            path: path.clone(),
            source,
        })?;
        let decls = parse_declarations(&text).map_err(|source| DiscoverError::Parse {
            path: path.clone(),
            source,
        })?;
        for decl in decls {
            let model = decl.build().map_err(|source| DiscoverError::Model {
                path: path.clone(),
                source,
            })?;
            debug!(model = model.display_name(), table = model.table_name(), "loaded model");
            models.push(model);
        }
    }

    Ok(models)
}

fn collect(dir: &Path, exclude: &[String], files: &mut Vec<PathBuf>) -> Result<(), DiscoverError> {
    let io = |source| DiscoverError::Io {
        path: dir.to_path_buf(),
        source,
    };

    for entry in fs::read_dir(dir).map_err(io)? {
        let entry = entry.map_err(io)?;
        let file_type = entry.file_type().map_err(io)?;
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();

        if file_type.is_dir() {
            if !exclude.iter().any(|x| *x == name) {
                collect(&path, exclude, files)?;
            }
        } else if file_type.is_file() && name.ends_with(MODEL_SUFFIX) {
            files.push(path);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const TEAM: &str = r#"{ "name": "Team", "columns": [{ "name": "name", "dataType": "string" }] }"#;

    #[test]
    fn test_parse_single_and_array() {
        assert_eq!(parse_declarations(TEAM).unwrap().len(), 1);

        let many = format!("[{TEAM}, {{ \"name\": \"User\" }}]");
        let decls = parse_declarations(&many).unwrap();
        assert_eq!(decls[1].name, "User");
    }

    #[test]
    fn test_discover_walks_and_excludes() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("b/nested")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();

        fs::write(root.join("b/nested/team.model.json"), TEAM).unwrap();
        fs::write(
            root.join("a.model.json"),
            r#"[{ "name": "User" }, { "name": "Membership", "references": [{ "target": "Team" }] }]"#,
        )
        .unwrap();
        fs::write(root.join("node_modules/pkg/skip.model.json"), r#"{ "name": "Skipped" }"#).unwrap();
        fs::write(root.join("b/notes.json"), "not a model").unwrap();

        let models = discover(root, &["node_modules".to_string()]).unwrap();
        let names: Vec<&str> = models.iter().map(|m| m.display_name()).collect();
        assert_eq!(names, vec!["User", "Membership", "Team"]);
    }

    #[test]
    fn test_discover_reports_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.model.json"), "{ nope").unwrap();

        let err = discover(dir.path(), &[]).unwrap_err();
        assert!(matches!(err, DiscoverError::Parse { path, .. } if path.ends_with("bad.model.json")));
    }
}
