//! Applying an updater to files and directories.

use std::{
    fs,
    io::Write as _,
    path::{Path, PathBuf},
};

use log::{debug, info};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

use stackpatch_core::{Document, Format};
use stackpatch_parser::{Loader, LoaderConfig, Writer, WriterConfig};

use crate::{StackpatchError, config::AppConfig, updaters::TemplateUpdater};

/// Counts of what a run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Documents that were loaded.
    pub visited: usize,
    /// Loaded documents that are not templates.
    pub skipped: usize,
    /// Templates the updater changed.
    pub changed: usize,
    /// Templates written back to disk.
    pub written: usize,
}

/// Walks paths and applies a [`TemplateUpdater`] to every template found.
///
/// A file is only written when the updater changed it and the runner is not
/// in dry-run mode. Writes go to a temporary file in the same directory
/// which then replaces the original.
#[derive(Debug, Clone, Copy, Default)]
pub struct Runner {
    loader: LoaderConfig,
    writer: WriterConfig,
    dry_run: bool,
}

impl Runner {
    /// Creates a runner with the loader and writer settings from `config`.
    pub fn new(config: &AppConfig) -> Self {
        Self {
            loader: config.loader_config(),
            writer: config.writer_config(),
            dry_run: false,
        }
    }

    /// In dry-run mode updates are computed and logged but nothing is
    /// written.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Runs `updater` over `paths`.
    ///
    /// Directories are walked recursively in file name order; files in them
    /// without a `.yaml`, `.yml` or `.json` extension are ignored.
    ///
    /// # Errors
    ///
    /// Fails before touching any file if [`TemplateUpdater::prepare`] fails.
    /// Stops at the first path that does not exist, a file given by name with
    /// an unsupported extension, or a document that cannot be parsed.
    pub fn run(
        &self,
        paths: &[PathBuf],
        updater: &mut dyn TemplateUpdater,
    ) -> Result<RunSummary, StackpatchError> {
        updater.prepare()?;

        let mut summary = RunSummary::default();
        for path in paths {
            if !path.exists() {
                return Err(StackpatchError::NotFound(path.clone()));
            }
            if !path.is_dir() {
                let format = Format::from_path(path)
                    .map_err(|_| StackpatchError::UnsupportedFile(path.clone()))?;
                self.process(path, format, updater, &mut summary)?;
                continue;
            }

            for entry in WalkDir::new(path).sort_by_file_name() {
                let entry = entry?;
                if !entry.file_type().is_file() {
                    continue;
                }
                match Format::from_path(entry.path()) {
                    Ok(format) => self.process(entry.path(), format, updater, &mut summary)?,
                    Err(_) => debug!(path:% = entry.path().display(); "Ignoring file"),
                }
            }
        }

        info!(
            visited = summary.visited,
            skipped = summary.skipped,
            changed = summary.changed,
            written = summary.written;
            "Run finished"
        );
        Ok(summary)
    }

    fn process(
        &self,
        path: &Path,
        format: Format,
        updater: &mut dyn TemplateUpdater,
        summary: &mut RunSummary,
    ) -> Result<(), StackpatchError> {
        let mut doc = load_file(path, format, self.loader)?;
        summary.visited += 1;

        if !doc.is_template() {
            info!(path:% = path.display(); "Not a CloudFormation template, skipping");
            summary.skipped += 1;
            return Ok(());
        }

        updater.update(&mut doc)?;
        if !doc.is_dirty() {
            debug!(path:% = path.display(); "No changes");
            return Ok(());
        }
        summary.changed += 1;

        if self.dry_run {
            info!(path:% = path.display(); "Dry run, not writing changes");
            return Ok(());
        }

        let output = Writer::new(self.writer).write(&doc)?;
        write_atomic(path, &output)?;
        doc.mark_clean();
        summary.written += 1;
        info!(path:% = path.display(); "Updated template");
        Ok(())
    }
}

/// Reads and parses a document.
///
/// # Errors
///
/// Returns [`StackpatchError::Io`] if the file cannot be read and
/// [`StackpatchError::Parse`] with the source attached if it cannot be
/// parsed.
pub fn load_file(
    path: &Path,
    format: Format,
    config: LoaderConfig,
) -> Result<Document, StackpatchError> {
    let source = fs::read_to_string(path)?;
    Loader::new(config)
        .load(&source, format)
        .map_err(|err| StackpatchError::new_parse_error(err, source.as_str(), path))
}

/// Like [`load_file`], taking the format from the file extension.
///
/// # Errors
///
/// Additionally returns [`StackpatchError::UnsupportedFile`] for an unknown
/// extension.
pub fn load_path(path: &Path, config: LoaderConfig) -> Result<Document, StackpatchError> {
    let format =
        Format::from_path(path).map_err(|_| StackpatchError::UnsupportedFile(path.to_path_buf()))?;
    load_file(path, format, config)
}

fn write_atomic(path: &Path, contents: &str) -> Result<(), StackpatchError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(contents.as_bytes())?;
    let permissions = fs::metadata(path)?.permissions();
    file.as_file().set_permissions(permissions)?;
    file.persist(path).map_err(|err| err.error)?;
    Ok(())
}
