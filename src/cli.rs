use clap::Parser;
use std::path::PathBuf;

/// Literal find-and-replace across a project's source directories.
///
/// With no arguments, `retoken` walks `client`, `src`, `shared`, `server`,
/// `netlify` and `public`, rewrites `Omnis` to `Polaris` in text files, and
/// prints the files it changed.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Literal find-and-replace across project directories",
    long_about = "retoken - rewrite a literal token across a fixed set of project directories.

Only files with an allowed extension are touched, directories such as
node_modules, dist and .git are skipped at any depth, and files that are
not valid UTF-8 are left alone.

EXAMPLES:
  retoken                                   # Omnis -> Polaris with the built-in defaults
  retoken -s Acme -R Widget                 # Different tokens, default directories
  retoken -r app,lib -x rs,toml -s Foo -R Bar
  retoken -c retoken.yaml --summary         # Load settings from YAML
  retoken -f json -o report.json            # Machine-readable report

Config file format (retoken.yaml):
  roots: [client, server]
  ignored_dirs: [.git, node_modules, dist]
  extensions: [.ts, .tsx, .md]
  search: Omnis
  replacement: Polaris"
)]
pub struct Args {
    /// Path to a YAML file with rewrite settings. Flags override its values.
    #[arg(short, long, env = "RETOKEN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Root directories to walk, in order. Missing roots are skipped.
    #[arg(short = 'r', long = "root", value_delimiter = ',')]
    pub roots: Vec<PathBuf>,

    /// Directory names to skip wherever they appear in a path.
    #[arg(short = 'i', long = "ignore", value_delimiter = ',')]
    pub ignore: Vec<String>,

    /// A comma-separated list of file extensions to include (case-sensitive).
    #[arg(short = 'x', long = "ext", value_delimiter = ',')]
    pub extensions: Vec<String>,

    /// The literal text to search for.
    #[arg(short, long)]
    pub search: Option<String>,

    /// The literal text to write in its place.
    #[arg(short = 'R', long = "replace")]
    pub replacement: Option<String>,

    /// The output format for the report (`text`, `json` or `csv`).
    #[arg(short = 'f', long = "format", default_value = "text")]
    pub format: String,

    /// Path to the output file. If omitted, the report is written to standard output.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Append run statistics to the text report.
    #[arg(long)]
    pub summary: bool,

    /// Print each modified file to stderr as it is rewritten.
    #[arg(short, long)]
    pub verbose: bool,

    /// Show a progress bar while rewriting.
    #[arg(long)]
    pub progress: bool,

    /// The number of parallel worker threads to use. Defaults to the number of logical CPU cores.
    #[arg(short = 'w', long = "workers", env = "RETOKEN_WORKERS")]
    pub workers: Option<usize>,
}

/// Parses command-line arguments and returns the populated `Args` struct.
pub fn parse_args() -> Args {
    Args::parse()
}
