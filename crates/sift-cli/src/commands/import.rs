//! Import command implementation

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use sift_core::{categorize::Categorizer, config::ClassifierConfig, db::Database, import::parse_csv};
use tracing::{debug, warn};

use super::core::{print_run_report, run_classification};

/// One CSV file and the source it is read as
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportJob {
    pub source: String,
    pub file: PathBuf,
}

/// Totals for one imported file
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FileImport {
    pub parsed: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub dropped: usize,
    pub categorized: usize,
}

fn is_csv(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("csv"))
            .unwrap_or(false)
}

fn dir_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_lowercase())
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort();
    Ok(entries)
}

/// Work out which files to import and under which source
///
/// A file uses `--source` or its parent folder name. In a directory, each
/// subdirectory is a source; loose CSVs use `--source` or the directory name.
pub fn collect_import_jobs(path: &Path, source: Option<&str>) -> Result<Vec<ImportJob>> {
    let explicit = source.map(|s| s.trim().to_lowercase());

    if path.is_file() {
        let source = explicit
            .or_else(|| path.parent().and_then(dir_name))
            .with_context(|| format!("Cannot infer a source for {}; pass --source", path.display()))?;
        return Ok(vec![ImportJob {
            source,
            file: path.to_path_buf(),
        }]);
    }

    if !path.is_dir() {
        bail!("No such file or directory: {}", path.display());
    }

    let mut jobs = Vec::new();
    for entry in sorted_entries(path)? {
        if entry.is_dir() {
            let Some(folder) = dir_name(&entry) else {
                continue;
            };
            for file in sorted_entries(&entry)? {
                if is_csv(&file) {
                    jobs.push(ImportJob {
                        source: folder.clone(),
                        file,
                    });
                }
            }
        } else if is_csv(&entry) {
            let source = explicit
                .clone()
                .or_else(|| dir_name(path))
                .with_context(|| {
                    format!("Cannot infer a source for {}; pass --source", entry.display())
                })?;
            jobs.push(ImportJob {
                source,
                file: entry,
            });
        }
    }

    Ok(jobs)
}

/// Parse, categorize and store one file
pub fn import_file(
    db: &Database,
    config: &ClassifierConfig,
    categorizer: &Categorizer,
    job: &ImportJob,
) -> Result<FileImport> {
    let csv_file = File::open(&job.file)
        .with_context(|| format!("Failed to open file: {}", job.file.display()))?;
    let source = config.source(&job.source);
    let mut result = parse_csv(csv_file, &source, &job.source)
        .with_context(|| format!("Failed to parse {}", job.file.display()))?;

    let categorized = categorizer.apply_all(&mut result.transactions);
    let stored = db.insert_transactions(&result.transactions)?;

    debug!(
        file = %job.file.display(),
        source = %job.source,
        inserted = stored.inserted,
        "Imported file"
    );

    Ok(FileImport {
        parsed: result.transactions.len(),
        inserted: stored.inserted,
        duplicates: stored.duplicates + result.duplicate_rows,
        dropped: result.dropped_rows,
        categorized,
    })
}

/// Move an imported file into the archive as `<source>-<filename>`
pub fn archive_file(job: &ImportJob, archive_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(archive_dir)
        .with_context(|| format!("Failed to create archive dir: {}", archive_dir.display()))?;

    let file_name = job
        .file
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Invalid file name: {}", job.file.display()))?;
    let target = archive_dir.join(format!("{}-{}", job.source, file_name));

    if fs::rename(&job.file, &target).is_err() {
        // Different filesystem
        fs::copy(&job.file, &target)
            .with_context(|| format!("Failed to archive {}", job.file.display()))?;
        fs::remove_file(&job.file)?;
    }
    Ok(target)
}

pub fn cmd_import(
    db: &Database,
    config: &ClassifierConfig,
    path: &Path,
    source: Option<&str>,
    archive_dir: Option<&Path>,
    no_classify: bool,
) -> Result<()> {
    let jobs = collect_import_jobs(path, source)?;
    if jobs.is_empty() {
        println!("No CSV files found in {}", path.display());
        return Ok(());
    }

    let categorizer =
        Categorizer::new(&config.categories).context("Invalid category rules in config")?;

    let mut total = FileImport::default();
    let mut failed = Vec::new();
    for job in &jobs {
        if !config.sources.contains_key(&job.source) {
            warn!(source = %job.source, "No [sources] entry; using default columns");
        }

        println!("📥 Importing {} ({})...", job.file.display(), job.source);
        let file = match import_file(db, config, &categorizer, job) {
            Ok(file) => file,
            Err(e) => {
                warn!(file = %job.file.display(), "Import failed: {:#}", e);
                println!("   ❌ Failed: {:#}", e);
                failed.push(&job.file);
                continue;
            }
        };
        println!(
            "   Found {} · imported {} · duplicates {} · dropped {}",
            file.parsed, file.inserted, file.duplicates, file.dropped
        );

        if let Some(dir) = archive_dir {
            let target = archive_file(job, dir)?;
            println!("   Archived to {}", target.display());
        }

        total.parsed += file.parsed;
        total.inserted += file.inserted;
        total.duplicates += file.duplicates;
        total.dropped += file.dropped;
        total.categorized += file.categorized;
    }

    println!();
    println!("✅ Import complete!");
    println!("   Files: {}", jobs.len() - failed.len());
    if !failed.is_empty() {
        println!("   Failed files: {}", failed.len());
        for file in &failed {
            println!("   - {}", file.display());
        }
    }
    println!("   Imported: {}", total.inserted);
    println!("   Skipped (duplicates): {}", total.duplicates);
    if total.dropped > 0 {
        println!("   Dropped (unreadable rows): {}", total.dropped);
    }
    println!("   Categorized: {}", total.categorized);

    if no_classify {
        println!();
        println!("💡 Run 'sift classify' to flag transfers, refunds and recurring charges");
        return Ok(());
    }

    let report = run_classification(db, config)?;
    print_run_report(&report);

    Ok(())
}
