//! Directory operations.

use famulus_types::OpOutcome;
use serde_json::json;
use std::fs;
use tracing::debug;

use super::absolute;

#[derive(Debug, Default)]
pub struct DirOps;

impl DirOps {
    /// List entries of a directory, directories first, names sorted.
    pub fn list_directory(&self, path: &str) -> OpOutcome {
        let path = absolute(path);
        if !path.is_dir() {
            return OpOutcome::fail(format!("Directory {} does not exist", path.display()));
        }
        debug!(target: "famulus::ops", op = "list_directory", path = %path.display());

        let entries = match fs::read_dir(&path) {
            Ok(entries) => entries,
            Err(e) => return OpOutcome::fail(format!("Error listing directory: {e}")),
        };

        let mut names: Vec<(bool, String)> = Vec::new();
        for entry in entries.flatten() {
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            names.push((is_dir, entry.file_name().to_string_lossy().to_string()));
        }
        names.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

        let listing: Vec<String> = names
            .iter()
            .map(|(is_dir, name)| {
                if *is_dir {
                    format!("{name}/")
                } else {
                    name.clone()
                }
            })
            .collect();

        OpOutcome::ok_with(
            format!(
                "Directory {} contains {} entries:\n{}",
                path.display(),
                listing.len(),
                listing.join("\n")
            ),
            json!(listing),
        )
    }

    pub fn create_directory(&self, path: &str) -> OpOutcome {
        let path = absolute(path);
        debug!(target: "famulus::ops", op = "create_directory", path = %path.display());
        match fs::create_dir_all(&path) {
            Ok(()) => OpOutcome::ok(format!("Directory {} created successfully", path.display())),
            Err(e) => OpOutcome::fail(format!("Error creating directory: {e}")),
        }
    }

    pub fn current_directory(&self) -> OpOutcome {
        match std::env::current_dir() {
            Ok(path) => OpOutcome::ok_with(
                format!("Current directory: {}", path.display()),
                json!(path.display().to_string()),
            ),
            Err(e) => OpOutcome::fail(format!("Error resolving current directory: {e}")),
        }
    }
}
