//! Named roots command implementation.

use super::open_existing;
use crate::error::{CliError, CliResult};
use serde::Serialize;
use std::path::Path;

/// A named root binding.
#[derive(Debug, Serialize)]
pub struct NamedRoot {
    /// Root name.
    pub name: String,
    /// Bound recid.
    pub recid: u64,
}

/// Runs the named command.
pub fn run(path: &Path, name: Option<&str>, format: &str) -> CliResult<()> {
    let engine = open_existing(path)?;
    let table = engine.named_roots()?;
    engine.close()?;

    let roots: Vec<NamedRoot> = match name {
        Some(name) => {
            let recid = table
                .get(name)
                .ok_or_else(|| CliError::NamedRootNotFound {
                    name: name.to_string(),
                })?;
            vec![NamedRoot {
                name: name.to_string(),
                recid: recid.as_u64(),
            }]
        }
        None => table
            .into_iter()
            .map(|(name, recid)| NamedRoot {
                name,
                recid: recid.as_u64(),
            })
            .collect(),
    };

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&roots)?);
        }
        _ => {
            if roots.is_empty() {
                println!("No named roots");
            }
            for root in &roots {
                println!("{:<24} {}", root.name, root.recid);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use recstore_core::Engine;

    #[test]
    fn resolves_bound_names_only() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("store");
        let mut engine = Engine::open(&path).unwrap();
        let recid = engine.put(b"root").unwrap();
        engine.set_named("tree", Some(recid)).unwrap();
        engine.commit().unwrap();
        engine.close().unwrap();

        assert!(run(&path, None, "json").is_ok());
        assert!(run(&path, Some("tree"), "text").is_ok());
        assert!(matches!(
            run(&path, Some("missing"), "text"),
            Err(CliError::NamedRootNotFound { .. })
        ));
    }
}
