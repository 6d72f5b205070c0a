//! File-system operations.

use famulus_types::OpOutcome;
use serde_json::json;
use std::fs;
use std::path::Path;
use tracing::debug;

use super::absolute;

/// Create, read, edit, delete, move, and copy files.
#[derive(Debug, Default)]
pub struct FileOps;

impl FileOps {
    pub fn create_file(&self, path: &str, content: &str) -> OpOutcome {
        let path = absolute(path);
        debug!(target: "famulus::ops", op = "create_file", path = %path.display());
        match fs::write(&path, content) {
            Ok(()) => OpOutcome::ok(format!("File {} created successfully", path.display())),
            Err(e) => OpOutcome::fail(format!("Error creating file: {e}")),
        }
    }

    pub fn read_file(&self, path: &str) -> OpOutcome {
        let path = absolute(path);
        if !path.exists() {
            return OpOutcome::fail(format!("File {} does not exist", path.display()));
        }
        debug!(target: "famulus::ops", op = "read_file", path = %path.display());
        match fs::read_to_string(&path) {
            Ok(content) => {
                OpOutcome::ok_with(format!("File content:\n{content}"), json!(content))
            }
            Err(e) => OpOutcome::fail(format!("Error reading file: {e}")),
        }
    }

    /// Replace the first occurrence of `old` with `new`.
    pub fn edit_file(&self, path: &str, old: &str, new: &str) -> OpOutcome {
        let path = absolute(path);
        if !path.exists() {
            return OpOutcome::fail(format!("File {} does not exist", path.display()));
        }
        debug!(target: "famulus::ops", op = "edit_file", path = %path.display());

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => return OpOutcome::fail(format!("Error editing file: {e}")),
        };
        if !content.contains(old) {
            return OpOutcome::fail(format!("Old string '{old}' not found in file"));
        }

        let updated = content.replacen(old, new, 1);
        match fs::write(&path, updated) {
            Ok(()) => OpOutcome::ok(format!("File {} edited successfully", path.display())),
            Err(e) => OpOutcome::fail(format!("Error editing file: {e}")),
        }
    }

    pub fn delete_file(&self, path: &str) -> OpOutcome {
        let path = absolute(path);
        if !path.exists() {
            return OpOutcome::fail(format!("File {} does not exist", path.display()));
        }
        debug!(target: "famulus::ops", op = "delete_file", path = %path.display());
        match fs::remove_file(&path) {
            Ok(()) => OpOutcome::ok(format!("File {} deleted successfully", path.display())),
            Err(e) => OpOutcome::fail(format!("Error deleting file: {e}")),
        }
    }

    pub fn move_file(&self, source: &str, destination: &str) -> OpOutcome {
        let source = absolute(source);
        let destination = absolute(destination);
        if !source.exists() {
            return OpOutcome::fail(format!("Source {} does not exist", source.display()));
        }
        debug!(
            target: "famulus::ops",
            op = "move_file",
            from = %source.display(),
            to = %destination.display()
        );
        match fs::rename(&source, &destination) {
            Ok(()) => OpOutcome::ok(format!(
                "Moved {} to {} successfully",
                source.display(),
                destination.display()
            )),
            Err(e) => OpOutcome::fail(format!("Error moving file: {e}")),
        }
    }

    pub fn copy_file(&self, source: &str, destination: &str) -> OpOutcome {
        let source = absolute(source);
        let destination = absolute(destination);
        if !source.exists() {
            return OpOutcome::fail(format!("Source {} does not exist", source.display()));
        }
        debug!(
            target: "famulus::ops",
            op = "copy_file",
            from = %source.display(),
            to = %destination.display()
        );

        let result = if source.is_dir() {
            copy_dir(&source, &destination)
        } else {
            fs::copy(&source, &destination).map(|_| ())
        };
        match result {
            Ok(()) => OpOutcome::ok(format!(
                "Copied {} to {} successfully",
                source.display(),
                destination.display()
            )),
            Err(e) => OpOutcome::fail(format!("Error copying file: {e}")),
        }
    }
}

fn copy_dir(source: &Path, destination: &Path) -> std::io::Result<()> {
    fs::create_dir_all(destination)?;
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let target = destination.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_edit_read_delete_cycle() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("note.txt");
        let path_str = path.to_str().unwrap();
        let ops = FileOps;

        assert!(ops.create_file(path_str, "hello world").success);
        assert!(ops.edit_file(path_str, "world", "there").success);

        let read = ops.read_file(path_str);
        assert!(read.success);
        assert_eq!(read.data.unwrap().as_str().unwrap(), "hello there");

        assert!(ops.delete_file(path_str).success);
        assert!(!ops.read_file(path_str).success);
    }

    #[test]
    fn test_edit_missing_string_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("note.txt");
        let path_str = path.to_str().unwrap();
        let ops = FileOps;

        ops.create_file(path_str, "content");
        let outcome = ops.edit_file(path_str, "absent", "x");
        assert!(!outcome.success);
        assert!(outcome.message.contains("not found"));
    }

    #[test]
    fn test_copy_directory_recursively() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(src.join("nested")).unwrap();
        std::fs::write(src.join("nested/a.txt"), "a").unwrap();

        let dest = dir.path().join("dest");
        let ops = FileOps;
        assert!(
            ops.copy_file(src.to_str().unwrap(), dest.to_str().unwrap())
                .success
        );
        assert!(dest.join("nested/a.txt").exists());
    }
}
