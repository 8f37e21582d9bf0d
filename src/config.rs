use crate::errors::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::env;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Project directories scanned when no roots are configured.
pub const DEFAULT_ROOTS: &[&str] = &["client", "src", "shared", "server", "netlify", "public"];

/// Directory names that exclude every file beneath them.
pub const DEFAULT_IGNORED_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "dist",
    "build",
    ".builder",
    ".next",
    ".turbo",
    ".cache",
];

/// Text file extensions eligible for rewriting.
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    ".ts", ".tsx", ".js", ".jsx", ".json", ".md", ".css", ".scss", ".html", ".txt",
];

pub const DEFAULT_SEARCH: &str = "Omnis";
pub const DEFAULT_REPLACEMENT: &str = "Polaris";

/// Name of the per-user config directory under `$HOME`.
const USER_CONFIG_DIR: &str = ".retoken";

/// Everything the tree rewriter needs to know about a run.
///
/// Every field has a default, so a YAML file only has to mention what it
/// changes:
///
/// ```yaml
/// roots: [client, server]
/// extensions: [.ts, tsx]
/// search: Omnis
/// replacement: Polaris
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RewriteConfig {
    /// Directories to walk, in order. Missing ones are skipped.
    pub roots: Vec<PathBuf>,
    /// Bare directory names; any path segment equal to one excludes the file.
    pub ignored_dirs: BTreeSet<String>,
    /// Allowed extensions, including the leading `.`. Matched case-sensitively.
    pub extensions: BTreeSet<String>,
    /// The literal text to look for.
    pub search: String,
    /// The literal text written in its place.
    pub replacement: String,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            roots: DEFAULT_ROOTS.iter().map(PathBuf::from).collect(),
            ignored_dirs: DEFAULT_IGNORED_DIRS.iter().map(|s| s.to_string()).collect(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            search: DEFAULT_SEARCH.to_string(),
            replacement: DEFAULT_REPLACEMENT.to_string(),
        }
    }
}

/// Values supplied on the command line. Empty lists and `None` leave the
/// underlying config untouched.
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub roots: Vec<PathBuf>,
    pub ignored_dirs: Vec<String>,
    pub extensions: Vec<String>,
    pub search: Option<String>,
    pub replacement: Option<String>,
}

impl RewriteConfig {
    /// Applies command-line overrides on top of this config.
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if !overrides.roots.is_empty() {
            self.roots = overrides.roots;
        }
        if !overrides.ignored_dirs.is_empty() {
            self.ignored_dirs = overrides.ignored_dirs.into_iter().collect();
        }
        if !overrides.extensions.is_empty() {
            self.extensions = overrides.extensions.into_iter().collect();
        }
        if let Some(search) = overrides.search {
            self.search = search;
        }
        if let Some(replacement) = overrides.replacement {
            self.replacement = replacement;
        }
        self
    }

    /// Checks the config and normalizes extensions to carry a leading `.`.
    pub fn validate(mut self) -> Result<Self> {
        if self.search.is_empty() {
            return Err("Search token must not be empty".into());
        }
        if self.roots.is_empty() {
            return Err("At least one root directory is required".into());
        }

        let mut extensions = BTreeSet::new();
        for ext in &self.extensions {
            extensions.insert(normalize_extension(ext)?);
        }
        self.extensions = extensions;

        self.ignored_dirs = self
            .ignored_dirs
            .iter()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .collect();

        Ok(self)
    }
}

/// Turns `ts`, `.ts` and ` .ts ` into `.ts`. Case is preserved.
pub fn normalize_extension(ext: &str) -> Result<String> {
    let bare = ext.trim().trim_start_matches('.');
    if bare.is_empty() {
        return Err(format!("Invalid extension '{ext}'").into());
    }
    Ok(format!(".{bare}"))
}

/// A utility for locating and loading rewrite configurations.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Finds the configuration file by searching in a prioritized list of locations.
    ///
    /// The search order is:
    /// 1. The absolute path provided in `config_path`, if it exists.
    /// 2. A path relative to the current directory.
    /// 3. A path relative to the `working_dir`.
    /// 4. Inside the `~/.retoken` directory.
    /// 5. Next to the executable.
    pub fn find_config(config_path: &Path, working_dir: &Path) -> Result<PathBuf> {
        if config_path.is_absolute() && config_path.exists() {
            return Ok(config_path.to_path_buf());
        }

        if config_path.exists() {
            return Ok(config_path.to_path_buf());
        }

        let in_working_dir = working_dir.join(config_path);
        if in_working_dir.exists() {
            return Ok(in_working_dir);
        }

        let mut tried_locations = vec![
            config_path.display().to_string(),
            in_working_dir.display().to_string(),
        ];

        if let Some(home) = env::var_os("HOME") {
            let home_config = PathBuf::from(home).join(USER_CONFIG_DIR).join(config_path);
            if home_config.exists() {
                return Ok(home_config);
            }
            tried_locations.push(home_config.display().to_string());
        }

        if let Some(exe_dir) = env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
        {
            let exe_config = exe_dir.join(config_path);
            if exe_config.exists() {
                return Ok(exe_config);
            }
            tried_locations.push(exe_config.display().to_string());
        }

        Err(format!(
            "Config file '{}' not found. Searched in:\n  - {}",
            config_path.display(),
            tried_locations.join("\n  - ")
        )
        .into())
    }

    /// Loads a `RewriteConfig` from a YAML file.
    pub fn load_rewrite_config(path: &Path) -> Result<RewriteConfig> {
        let file = File::open(path)?;
        Ok(serde_yaml::from_reader(file)?)
    }

    /// Builds the effective config: defaults, then the optional file, then overrides.
    pub fn resolve(
        config_file: Option<&Path>,
        working_dir: &Path,
        overrides: ConfigOverrides,
    ) -> Result<RewriteConfig> {
        let base = match config_file {
            Some(path) => {
                let resolved = Self::find_config(path, working_dir)?;
                Self::load_rewrite_config(&resolved)?
            }
            None => RewriteConfig::default(),
        };
        base.with_overrides(overrides).validate()
    }
}
