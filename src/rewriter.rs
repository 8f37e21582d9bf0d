use crate::cli::Args;
use crate::config::{ConfigLoader, ConfigOverrides, RewriteConfig};
use crate::errors::{Error, Result};
use crate::output_formatter::{OutputFormat, OutputFormatter};
use ignore::WalkBuilder;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashSet;
use std::env;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;

/// What happened to a single discovered file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileOutcome {
    /// The extension is not on the allow-list.
    ExcludedByExtension,
    /// A path segment names an ignored directory.
    ExcludedByDirectory,
    /// The content is not valid UTF-8.
    Undecodable,
    /// The search token does not occur, or replacing it changes nothing.
    Unchanged,
    /// The file was rewritten.
    Modified { replacements: usize },
}

/// A file whose content was rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangedFile {
    pub path: PathBuf,
    pub replacements: usize,
}

/// A path that could not be read, written or walked.
#[derive(Debug, Clone, Serialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Counters for every outcome of a run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RewriteStats {
    pub files_seen: usize,
    pub excluded_by_extension: usize,
    pub excluded_by_directory: usize,
    pub undecodable: usize,
    pub unchanged: usize,
    pub modified: usize,
    pub failed: usize,
    pub replacements: usize,
    pub roots_skipped: usize,
}

/// The result of a run. `changed` is in discovery order.
#[derive(Debug, Default, Clone, Serialize)]
pub struct RewriteReport {
    pub changed: Vec<ChangedFile>,
    pub failures: Vec<FileFailure>,
    pub stats: RewriteStats,
}

impl RewriteReport {
    /// Paths of rewritten files, in discovery order.
    pub fn changed_paths(&self) -> impl Iterator<Item = &Path> {
        self.changed.iter().map(|c| c.path.as_path())
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    fn record(&mut self, path: PathBuf, outcome: FileOutcome) {
        match outcome {
            FileOutcome::ExcludedByExtension => self.stats.excluded_by_extension += 1,
            FileOutcome::ExcludedByDirectory => self.stats.excluded_by_directory += 1,
            FileOutcome::Undecodable => self.stats.undecodable += 1,
            FileOutcome::Unchanged => self.stats.unchanged += 1,
            FileOutcome::Modified { replacements } => {
                self.stats.modified += 1;
                self.stats.replacements += replacements;
                self.changed.push(ChangedFile { path, replacements });
            }
        }
    }

    fn record_failure(&mut self, path: PathBuf, error: &Error) {
        self.stats.failed += 1;
        self.failures.push(FileFailure {
            path,
            error: error.to_string(),
        });
    }
}

/// Options that affect how a run executes, not what it changes.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Worker threads for rewriting. Defaults to the number of logical CPUs.
    pub workers: Option<usize>,
    /// Print each rewritten file and skipped root to stderr.
    pub verbose: bool,
    /// Show a progress bar on stderr.
    pub progress: bool,
}

/// Walks the configured roots and replaces the search token in qualifying files.
///
/// Discovery is sequential and sorted by file name; rewriting is spread over a
/// Rayon pool, but results are collected in discovery order so the report is
/// deterministic.
pub struct TreeRewriter {
    config: RewriteConfig,
    options: RunOptions,
}

impl TreeRewriter {
    /// Creates a rewriter after validating `config`.
    pub fn new(config: RewriteConfig, options: RunOptions) -> Result<Self> {
        Ok(Self {
            config: config.validate()?,
            options,
        })
    }

    pub fn config(&self) -> &RewriteConfig {
        &self.config
    }

    /// Decides whether a regular file is excluded by rule.
    ///
    /// Returns `None` for a qualifying file. The extension check comes first, so
    /// a `.png` inside `node_modules` counts as excluded by extension.
    pub fn classify(&self, path: &Path) -> Option<FileOutcome> {
        let allowed = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.config.extensions.contains(&format!(".{ext}")));
        if !allowed {
            return Some(FileOutcome::ExcludedByExtension);
        }

        let ignored = path.components().any(|component| match component {
            Component::Normal(name) => name
                .to_str()
                .is_some_and(|name| self.config.ignored_dirs.contains(name)),
            _ => false,
        });
        if ignored {
            return Some(FileOutcome::ExcludedByDirectory);
        }

        None
    }

    /// Replaces every occurrence of the search token in a single left-to-right
    /// pass. Inserted text is not scanned again.
    ///
    /// Returns the new text and the number of replacements, or `None` when the
    /// text would not change.
    pub fn rewrite_text(&self, text: &str) -> Option<(String, usize)> {
        let search = self.config.search.as_str();
        if !text.contains(search) {
            return None;
        }

        let replaced = text.replace(search, &self.config.replacement);
        if replaced == text {
            return None;
        }

        let count = text.matches(search).count();
        Some((replaced, count))
    }

    /// Rewrites one file in place if it contains the search token.
    ///
    /// Rule-based exclusion is not applied here; see [`TreeRewriter::classify`].
    pub fn rewrite_file(&self, path: &Path) -> Result<FileOutcome> {
        let bytes = fs::read(path).map_err(|e| Error::processing(path, e))?;
        let Ok(text) = String::from_utf8(bytes) else {
            return Ok(FileOutcome::Undecodable);
        };

        let Some((new_text, replacements)) = self.rewrite_text(&text) else {
            return Ok(FileOutcome::Unchanged);
        };

        write_in_place(path, &new_text)?;
        Ok(FileOutcome::Modified { replacements })
    }

    /// Runs the whole rewrite and returns the report.
    ///
    /// Per-file I/O failures are printed to stderr and collected in the report;
    /// they do not stop the run.
    pub fn run(&self) -> Result<RewriteReport> {
        let mut report = RewriteReport::default();
        let candidates = self.discover(&mut report);
        self.rewrite_candidates(candidates, &mut report)?;
        Ok(report)
    }

    /// Rewrites already-discovered files and records each outcome in `report`,
    /// in the order given. A failing file is logged and recorded; the rest
    /// are still processed.
    fn rewrite_candidates(&self, candidates: Vec<PathBuf>, report: &mut RewriteReport) -> Result<()> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.workers.unwrap_or_else(num_cpus::get))
            .build()?;

        let progress = self.progress_bar(candidates.len())?;

        let results: Vec<(PathBuf, Result<FileOutcome>)> = pool.install(|| {
            candidates
                .into_par_iter()
                .map(|path| {
                    let outcome = self.rewrite_file(&path);
                    progress.inc(1);
                    (path, outcome)
                })
                .collect()
        });

        progress.finish_and_clear();

        for (path, outcome) in results {
            match outcome {
                Ok(outcome) => {
                    if let FileOutcome::Modified { replacements } = outcome {
                        if self.options.verbose {
                            eprintln!("Modified {} ({} changes)", path.display(), replacements);
                        }
                    }
                    report.record(path, outcome);
                }
                Err(e) => {
                    eprintln!("Error processing file {}: {}", path.display(), e);
                    report.record_failure(path, &e);
                }
            }
        }

        Ok(())
    }

    /// Walks every root and returns qualifying files in discovery order.
    ///
    /// Excluded files are recorded straight into `report`. A file reached a
    /// second time through a symlink counts as unchanged.
    fn discover(&self, report: &mut RewriteReport) -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        let mut seen = HashSet::new();

        for root in &self.config.roots {
            if !root.is_dir() {
                report.stats.roots_skipped += 1;
                if self.options.verbose {
                    eprintln!("Skipping missing root {}", root.display());
                }
                continue;
            }

            let ignored_dirs = self.config.ignored_dirs.clone();
            let mut walker = WalkBuilder::new(root);
            walker
                .standard_filters(false)
                .follow_links(false)
                .sort_by_file_name(|a, b| a.cmp(b))
                .filter_entry(move |entry| {
                    let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
                    entry.depth() == 0
                        || !is_dir
                        || !entry
                            .file_name()
                            .to_str()
                            .is_some_and(|name| ignored_dirs.contains(name))
                });

            for entry in walker.build() {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        let path = walk_error_path(&e)
                            .map(Path::to_path_buf)
                            .unwrap_or_else(|| root.clone());
                        let e = Error::from(e);
                        eprintln!("Error processing file {}: {}", path.display(), e);
                        report.record_failure(path, &e);
                        continue;
                    }
                };

                // Symlinks are not walked into, but a link to a file counts as that file.
                if !entry.path().is_file() {
                    continue;
                }

                report.stats.files_seen += 1;
                let path = entry.path().to_path_buf();
                match self.classify(&path) {
                    Some(outcome) => report.record(path, outcome),
                    None => {
                        let real = fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
                        if seen.insert(real) {
                            candidates.push(path);
                        } else {
                            report.record(path, FileOutcome::Unchanged);
                        }
                    }
                }
            }
        }

        candidates
    }

    fn progress_bar(&self, len: usize) -> Result<ProgressBar> {
        if !self.options.progress {
            return Ok(ProgressBar::hidden());
        }

        let pb = ProgressBar::new(len as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")?
                .progress_chars("##-"),
        );
        Ok(pb)
    }
}

/// Finds the offending path inside a walk error, if it carries one.
fn walk_error_path(err: &ignore::Error) -> Option<&Path> {
    match err {
        ignore::Error::WithPath { path, .. } => Some(path.as_path()),
        ignore::Error::Loop { child, .. } => Some(child.as_path()),
        ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => {
            walk_error_path(err)
        }
        _ => None,
    }
}

/// Overwrites `path` with `content` through a temp file next to the real file,
/// keeping the original permissions. Symlinks are resolved first so the link
/// itself survives and its target is rewritten.
fn write_in_place(path: &Path, content: &str) -> Result<()> {
    let target = fs::canonicalize(path).map_err(|e| Error::processing(path, e))?;
    let Some(parent) = target.parent() else {
        return Err(format!("Could not get parent directory for {}", path.display()).into());
    };

    let mut temp_file = NamedTempFile::new_in(parent).map_err(|e| Error::processing(path, e))?;
    temp_file
        .write_all(content.as_bytes())
        .map_err(|e| Error::processing(path, e))?;

    let perms = fs::metadata(&target)
        .map_err(|e| Error::processing(path, e))?
        .permissions();
    fs::set_permissions(temp_file.path(), perms).map_err(|e| Error::processing(path, e))?;

    temp_file
        .persist(&target)
        .map_err(|e| Error::processing(path, e))?;
    Ok(())
}

/// The main entry point for the `retoken` command.
///
/// 1. Resolves the config from defaults, an optional YAML file and CLI flags.
/// 2. Walks and rewrites the tree.
/// 3. Writes the report to stdout or `--output`.
pub fn run_rewrite(args: Args) -> Result<RewriteReport> {
    let working_dir = env::current_dir()?;
    let overrides = ConfigOverrides {
        roots: args.roots,
        ignored_dirs: args.ignore,
        extensions: args.extensions,
        search: args.search,
        replacement: args.replacement,
    };
    let config = ConfigLoader::resolve(args.config.as_deref(), &working_dir, overrides)?;

    let options = RunOptions {
        workers: args.workers,
        verbose: args.verbose,
        progress: args.progress,
    };
    let rewriter = TreeRewriter::new(config, options)?;
    let report = rewriter.run()?;

    let formatter = OutputFormatter::new(OutputFormat::from(args.format.as_str()), args.summary);
    let mut writer: Box<dyn Write> = match args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(std::io::stdout()),
    };
    formatter.write_output(&mut writer, &report)?;
    writer.flush()?;

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn config_for(root: &Path) -> RewriteConfig {
        RewriteConfig {
            roots: vec![root.to_path_buf()],
            ..RewriteConfig::default()
        }
    }

    fn rewriter_for(root: &Path) -> TreeRewriter {
        TreeRewriter::new(config_for(root), RunOptions::default()).unwrap()
    }

    fn write(root: &Path, rel: &str, content: impl AsRef<[u8]>) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_rewrites_qualifying_file() {
        let temp_dir = TempDir::new().unwrap();
        let app = write(temp_dir.path(), "client/App.tsx", "Hello Omnis World");

        let report = rewriter_for(&temp_dir.path().join("client")).run().unwrap();

        assert_eq!(fs::read_to_string(&app).unwrap(), "Hello Polaris World");
        assert_eq!(report.changed_paths().collect::<Vec<_>>(), vec![app.as_path()]);
        assert_eq!(report.changed[0].replacements, 1);
    }

    #[test]
    fn test_ignored_directory_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("client");
        let dep = write(&root, "node_modules/pkg/index.js", "Omnis");
        let nested = write(&root, "lib/deep/dist/out.js", "Omnis");

        let report = rewriter_for(&root).run().unwrap();

        assert_eq!(fs::read_to_string(&dep).unwrap(), "Omnis");
        assert_eq!(fs::read_to_string(&nested).unwrap(), "Omnis");
        assert!(report.changed.is_empty());
    }

    #[test]
    fn test_no_match_not_rewritten() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("server");
        let readme = write(&root, "readme.md", "No mention here");
        let before = fs::metadata(&readme).unwrap().modified().unwrap();

        let report = rewriter_for(&root).run().unwrap();

        assert_eq!(fs::read_to_string(&readme).unwrap(), "No mention here");
        assert_eq!(fs::metadata(&readme).unwrap().modified().unwrap(), before);
        assert!(report.changed.is_empty());
        assert_eq!(report.stats.unchanged, 1);
    }

    #[test]
    fn test_disallowed_extension_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("public");
        let logo = write(&root, "logo.png", b"\x89PNG Omnis");

        let report = rewriter_for(&root).run().unwrap();

        assert_eq!(fs::read(&logo).unwrap(), b"\x89PNG Omnis");
        assert_eq!(report.stats.excluded_by_extension, 1);
        assert!(report.changed.is_empty());
    }

    #[test]
    fn test_extension_match_is_case_sensitive() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("src");
        let upper = write(&root, "NOTES.TXT", "Omnis");

        let report = rewriter_for(&root).run().unwrap();

        assert_eq!(fs::read_to_string(&upper).unwrap(), "Omnis");
        assert!(report.changed.is_empty());
    }

    #[test]
    fn test_missing_root_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let present = temp_dir.path().join("shared");
        let file = write(&present, "a.txt", "Omnis");

        let config = RewriteConfig {
            roots: vec![temp_dir.path().join("legacy"), present],
            ..RewriteConfig::default()
        };
        let report = TreeRewriter::new(config, RunOptions::default())
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(report.stats.roots_skipped, 1);
        assert_eq!(report.changed_paths().collect::<Vec<_>>(), vec![file.as_path()]);
    }

    #[test]
    fn test_invalid_utf8_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("shared");
        let data = write(&root, "data.json", b"{\"name\": \"Omnis\xff\xfe\"}");

        let report = rewriter_for(&root).run().unwrap();

        assert_eq!(fs::read(&data).unwrap(), b"{\"name\": \"Omnis\xff\xfe\"}");
        assert_eq!(report.stats.undecodable, 1);
        assert!(report.changed.is_empty());
        assert!(!report.has_failures());
    }

    #[test]
    fn test_second_run_changes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("client");
        write(&root, "a.ts", "Omnis Omnis");
        write(&root, "b/c.md", "# Omnis");

        let rewriter = rewriter_for(&root);
        let first = rewriter.run().unwrap();
        let second = rewriter.run().unwrap();

        assert_eq!(first.changed.len(), 2);
        assert_eq!(first.stats.replacements, 3);
        assert!(second.changed.is_empty());
    }

    #[test]
    fn test_report_in_discovery_order() {
        let temp_dir = TempDir::new().unwrap();
        let first_root = temp_dir.path().join("client");
        let second_root = temp_dir.path().join("server");
        let paths = vec![
            write(&first_root, "a.ts", "Omnis"),
            write(&first_root, "b/z.ts", "Omnis"),
            write(&first_root, "c.ts", "Omnis"),
            write(&second_root, "a.ts", "Omnis"),
        ];

        let config = RewriteConfig {
            roots: vec![first_root, second_root],
            ..RewriteConfig::default()
        };
        let options = RunOptions {
            workers: Some(4),
            ..RunOptions::default()
        };
        let report = TreeRewriter::new(config, options).unwrap().run().unwrap();

        let changed: Vec<PathBuf> = report.changed_paths().map(Path::to_path_buf).collect();
        assert_eq!(changed, paths);
    }

    #[test]
    fn test_identical_tokens_report_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("client");
        write(&root, "a.ts", "Omnis");

        let config = RewriteConfig {
            replacement: "Omnis".into(),
            ..config_for(&root)
        };
        let report = TreeRewriter::new(config, RunOptions::default())
            .unwrap()
            .run()
            .unwrap();

        assert!(report.changed.is_empty());
        assert_eq!(report.stats.unchanged, 1);
    }

    #[test]
    fn test_replacement_is_single_pass() {
        let temp_dir = TempDir::new().unwrap();
        let config = RewriteConfig {
            search: "aa".into(),
            replacement: "aaa".into(),
            ..config_for(temp_dir.path())
        };
        let rewriter = TreeRewriter::new(config, RunOptions::default()).unwrap();

        assert_eq!(rewriter.rewrite_text("aaa"), Some(("aaaa".to_string(), 1)));
        assert_eq!(rewriter.rewrite_text("aaaa"), Some(("aaaaaa".to_string(), 2)));
        assert_eq!(rewriter.rewrite_text("bbb"), None);
    }

    #[test]
    fn test_classify_outcomes() {
        let temp_dir = TempDir::new().unwrap();
        let rewriter = rewriter_for(temp_dir.path());

        assert_eq!(
            rewriter.classify(Path::new("client/logo.png")),
            Some(FileOutcome::ExcludedByExtension)
        );
        assert_eq!(
            rewriter.classify(Path::new("client/.next/page.js")),
            Some(FileOutcome::ExcludedByDirectory)
        );
        assert_eq!(
            rewriter.classify(Path::new("build/index.html")),
            Some(FileOutcome::ExcludedByDirectory)
        );
        assert_eq!(
            rewriter.classify(Path::new(".gitignore")),
            Some(FileOutcome::ExcludedByExtension)
        );
        assert_eq!(rewriter.classify(Path::new("client/builder/app.ts")), None);
    }

    #[test]
    fn test_root_named_like_ignored_dir_is_excluded() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("dist");
        let file = write(&root, "bundle.js", "Omnis");

        let report = rewriter_for(&root).run().unwrap();

        assert_eq!(fs::read_to_string(&file).unwrap(), "Omnis");
        assert_eq!(report.stats.excluded_by_directory, 1);
    }

    #[test]
    fn test_custom_tokens_and_extensions() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("src");
        let rs = write(&root, "main.rs", "struct Acme; impl Acme {}");
        let ts = write(&root, "main.ts", "Acme");

        let config = RewriteConfig {
            roots: vec![root],
            extensions: BTreeSet::from(["rs".to_string()]),
            search: "Acme".into(),
            replacement: "Widget".into(),
            ..RewriteConfig::default()
        };
        let rewriter = TreeRewriter::new(config, RunOptions::default()).unwrap();
        assert!(rewriter.config().extensions.contains(".rs"));
        let report = rewriter.run().unwrap();

        assert_eq!(fs::read_to_string(&rs).unwrap(), "struct Widget; impl Widget {}");
        assert_eq!(fs::read_to_string(&ts).unwrap(), "Acme");
        assert_eq!(report.changed.len(), 1);
        assert_eq!(report.changed[0].replacements, 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_rewrite_preserves_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("client");
        let script = write(&root, "run.js", "Omnis");
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        rewriter_for(&root).run().unwrap();

        let mode = fs::metadata(&script).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
        assert_eq!(fs::read_to_string(&script).unwrap(), "Polaris");
    }

    #[test]
    fn test_rewrite_file_reports_read_failure() {
        let temp_dir = TempDir::new().unwrap();
        let rewriter = rewriter_for(temp_dir.path());
        let missing = temp_dir.path().join("gone.ts");

        let err = rewriter.rewrite_file(&missing).unwrap_err();
        assert!(matches!(err, Error::Processing { ref path, .. } if path == &missing));
    }

    #[test]
    fn test_new_rejects_empty_search() {
        let config = RewriteConfig {
            search: String::new(),
            ..RewriteConfig::default()
        };
        assert!(TreeRewriter::new(config, RunOptions::default()).is_err());
    }

    #[test]
    fn test_run_rewrite_writes_report_file() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("client");
        let file = write(&root, "a.ts", "Omnis");
        let out = temp_dir.path().join("report.txt");

        let args = Args::try_parse_from([
            "retoken",
            "--root",
            root.to_str().unwrap(),
            "-o",
            out.to_str().unwrap(),
        ])
        .unwrap();
        let report = run_rewrite(args).unwrap();

        assert_eq!(report.changed.len(), 1);
        assert_eq!(
            fs::read_to_string(&out).unwrap(),
            format!("Updated files:\n{}\n", file.display())
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_file_rewritten_through_link() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("client");
        fs::create_dir_all(&root).unwrap();
        let real = write(temp_dir.path(), "real.ts", "Omnis");
        let link = root.join("link.ts");
        std::os::unix::fs::symlink("../real.ts", &link).unwrap();

        let report = rewriter_for(&root).run().unwrap();

        assert_eq!(report.changed_paths().collect::<Vec<_>>(), vec![link.as_path()]);
        assert_eq!(fs::read_to_string(&real).unwrap(), "Polaris");
        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("client");
        fs::create_dir_all(&root).unwrap();
        std::os::unix::fs::symlink("../missing.ts", root.join("dangling.ts")).unwrap();

        let report = rewriter_for(&root).run().unwrap();

        assert!(report.changed.is_empty());
        assert!(!report.has_failures());
        assert_eq!(report.stats.files_seen, 0);
    }

    #[test]
    fn test_failing_file_does_not_stop_the_run() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("client");
        let first = write(&root, "a.ts", "Omnis");
        let vanished = root.join("b.ts");
        let last = write(&root, "c.ts", "Omnis");

        let rewriter = TreeRewriter::new(
            config_for(&root),
            RunOptions {
                workers: Some(2),
                ..RunOptions::default()
            },
        )
        .unwrap();
        let mut report = RewriteReport::default();
        rewriter
            .rewrite_candidates(vec![first.clone(), vanished.clone(), last.clone()], &mut report)
            .unwrap();

        assert_eq!(
            report.changed_paths().collect::<Vec<_>>(),
            vec![first.as_path(), last.as_path()]
        );
        assert_eq!(fs::read_to_string(&last).unwrap(), "Polaris");
        assert!(report.has_failures());
        assert_eq!(report.stats.failed, 1);
        assert_eq!(report.failures[0].path, vanished);
        assert!(report.failures[0].error.contains("b.ts"));
    }

    #[test]
    fn test_walk_error_points_at_failing_entry() {
        let locked = PathBuf::from("client/locked");
        let err = ignore::Error::WithDepth {
            depth: 2,
            err: Box::new(ignore::Error::WithPath {
                path: locked.clone(),
                err: Box::new(ignore::Error::Io(std::io::Error::from(
                    std::io::ErrorKind::PermissionDenied,
                ))),
            }),
        };
        assert_eq!(walk_error_path(&err), Some(locked.as_path()));

        let bare = ignore::Error::Io(std::io::Error::from(std::io::ErrorKind::PermissionDenied));
        assert_eq!(walk_error_path(&bare), None);
    }

    #[test]
    fn test_crlf_line_endings_preserved() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("client");
        let file = write(&root, "notes.md", "Omnis\r\nx\r\n");

        rewriter_for(&root).run().unwrap();

        assert_eq!(fs::read(&file).unwrap(), b"Polaris\r\nx\r\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_file_and_link_to_it_rewritten_once() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("client");
        let real = write(&root, "a.ts", "Omnis");
        std::os::unix::fs::symlink("a.ts", root.join("link.ts")).unwrap();

        let report = rewriter_for(&root).run().unwrap();

        assert_eq!(report.changed_paths().collect::<Vec<_>>(), vec![real.as_path()]);
        assert_eq!(report.stats.unchanged, 1);
        assert_eq!(fs::read_to_string(&real).unwrap(), "Polaris");
    }
}
