mod commands;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// HDL source loader: expand patterns and library maps, parse, and
/// discover dependencies in search directories.
#[derive(Parser)]
#[command(name = "hdlsrc", version, about = "HDL source loader")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Log loader progress to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse every registered file and report the resulting trees
    Parse {
        #[command(flatten)]
        load: LoadArgs,
        #[command(flatten)]
        parse: ParseArgs,
    },

    /// Read every registered file without parsing and list it
    List {
        #[command(flatten)]
        load: LoadArgs,
    },
}

/// Where sources come from.
#[derive(Args, Debug, Default)]
pub(crate) struct LoadArgs {
    /// Source files or patterns
    pub files: Vec<String>,

    /// Library files, as NAME=PATTERN
    #[arg(long = "lib", value_name = "NAME=PATTERN")]
    pub libraries: Vec<String>,

    /// Library map files or patterns
    #[arg(long = "libmap", value_name = "PATTERN")]
    pub library_maps: Vec<String>,

    /// Directories searched for unresolved modules and packages
    #[arg(short = 'y', long = "libdir", value_name = "DIR")]
    pub search_dirs: Vec<String>,

    /// Extra extensions tried in search directories
    #[arg(long = "libext", value_name = "EXT")]
    pub search_extensions: Vec<String>,

    /// Project file (hdlsrc.toml); command-line flags add to it
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// How sources are parsed.
#[derive(Args, Debug, Default)]
pub(crate) struct ParseArgs {
    /// Parse all direct files as one compilation unit
    #[arg(long)]
    pub single_unit: bool,

    /// Let library files see macros from the main compilation unit
    #[arg(long)]
    pub libraries_inherit_macros: bool,

    /// Treat every file as a library file
    #[arg(long)]
    pub lint_only: bool,

    /// Parse threads (1 disables the pool)
    #[arg(long, value_name = "N")]
    pub threads: Option<usize>,

    /// Predefine a macro, as NAME or NAME=VALUE
    #[arg(short = 'D', long = "define", value_name = "NAME[=VALUE]")]
    pub defines: Vec<String>,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Parse { load, parse } => {
            commands::parse::cmd_parse(&load, &parse, cli.output, cli.quiet);
        }
        Commands::List { load } => {
            commands::list::cmd_list(&load, cli.output, cli.quiet);
        }
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("hdlsrc_core=debug,info")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
