//! External tool passthroughs: git and zip archives.

use famulus_types::OpOutcome;
use serde_json::json;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::process::Command;
use tracing::debug;
use zip::write::SimpleFileOptions;

use super::absolute;

#[derive(Debug, Default)]
pub struct ExternalOps;

impl ExternalOps {
    pub fn git_status(&self, repo_path: &str) -> OpOutcome {
        let path = absolute(repo_path);
        debug!(target: "famulus::ops", op = "git_status", repo = %path.display());
        match Command::new("git")
            .args(["status", "--short"])
            .current_dir(&path)
            .output()
        {
            Ok(output) if output.status.success() => {
                let stdout = String::from_utf8_lossy(&output.stdout).to_string();
                let summary = if stdout.trim().is_empty() {
                    "Working tree clean".to_string()
                } else {
                    format!("Changes:\n{stdout}")
                };
                OpOutcome::ok_with(summary, json!(stdout))
            }
            Ok(output) => OpOutcome::fail(format!(
                "git status failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )),
            Err(e) => OpOutcome::fail(format!("Error running git: {e}")),
        }
    }

    pub fn git_clone(&self, url: &str, destination: &str) -> OpOutcome {
        let destination = absolute(destination);
        debug!(target: "famulus::ops", op = "git_clone", url, dest = %destination.display());
        match Command::new("git")
            .args(["clone", url])
            .arg(&destination)
            .output()
        {
            Ok(output) if output.status.success() => {
                OpOutcome::ok(format!("Cloned {url} into {}", destination.display()))
            }
            Ok(output) => OpOutcome::fail(format!(
                "git clone failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )),
            Err(e) => OpOutcome::fail(format!("Error running git: {e}")),
        }
    }

    /// Zip a directory tree into an archive.
    pub fn create_archive(&self, source_dir: &str, archive_path: &str) -> OpOutcome {
        let source = absolute(source_dir);
        let archive = absolute(archive_path);
        if !source.is_dir() {
            return OpOutcome::fail(format!("Source {} is not a directory", source.display()));
        }
        debug!(
            target: "famulus::ops",
            op = "create_archive",
            source = %source.display(),
            archive = %archive.display()
        );

        let result = (|| -> std::result::Result<usize, String> {
            let file = File::create(&archive).map_err(|e| e.to_string())?;
            let mut writer = zip::ZipWriter::new(file);
            let options = SimpleFileOptions::default()
                .compression_method(zip::CompressionMethod::Deflated);
            let mut count = 0;
            add_dir_to_zip(&mut writer, &source, &source, &options, &mut count)?;
            writer.finish().map_err(|e| e.to_string())?;
            Ok(count)
        })();

        match result {
            Ok(count) => OpOutcome::ok_with(
                format!("Archived {count} files into {}", archive.display()),
                json!({"files": count}),
            ),
            Err(e) => OpOutcome::fail(format!("Error creating archive: {e}")),
        }
    }

    pub fn extract_archive(&self, archive_path: &str, destination: &str) -> OpOutcome {
        let archive = absolute(archive_path);
        let destination = absolute(destination);
        if !archive.exists() {
            return OpOutcome::fail(format!("Archive {} does not exist", archive.display()));
        }
        debug!(
            target: "famulus::ops",
            op = "extract_archive",
            archive = %archive.display(),
            dest = %destination.display()
        );

        let result = (|| -> std::result::Result<usize, String> {
            let file = File::open(&archive).map_err(|e| e.to_string())?;
            let mut zip = zip::ZipArchive::new(file).map_err(|e| e.to_string())?;
            let count = zip.len();
            zip.extract(&destination).map_err(|e| e.to_string())?;
            Ok(count)
        })();

        match result {
            Ok(count) => OpOutcome::ok(format!(
                "Extracted {count} entries into {}",
                destination.display()
            )),
            Err(e) => OpOutcome::fail(format!("Error extracting archive: {e}")),
        }
    }
}

fn add_dir_to_zip(
    writer: &mut zip::ZipWriter<File>,
    root: &Path,
    dir: &Path,
    options: &SimpleFileOptions,
    count: &mut usize,
) -> std::result::Result<(), String> {
    for entry in std::fs::read_dir(dir).map_err(|e| e.to_string())? {
        let entry = entry.map_err(|e| e.to_string())?;
        let path = entry.path();
        if path.is_dir() {
            add_dir_to_zip(writer, root, &path, options, count)?;
        } else {
            let name = path
                .strip_prefix(root)
                .map_err(|e| e.to_string())?
                .to_string_lossy()
                .replace('\\', "/");
            writer
                .start_file(name, options.clone())
                .map_err(|e| e.to_string())?;
            let bytes = std::fs::read(&path).map_err(|e| e.to_string())?;
            writer.write_all(&bytes).map_err(|e| e.to_string())?;
            *count += 1;
        }
    }
    Ok(())
}
