pub(crate) mod list;
pub(crate) mod parse;

use std::path::Path;
use std::process;

use hdlsrc_core::{LoaderConfig, SourceLoader, SourceOptions};

use crate::{report_error, LoadArgs, OutputFormat};

/// Build a loader from the project file (if any) plus command-line
/// registrations. Returns the project file's parse options alongside.
///
/// Exits with status 1 on an unreadable project file or a malformed flag.
pub(crate) fn build_loader(
    args: &LoadArgs,
    output: OutputFormat,
    quiet: bool,
) -> (SourceLoader, SourceOptions) {
    let mut loader = SourceLoader::default();
    let mut options = SourceOptions::default();

    if let Some(path) = &args.config {
        match LoaderConfig::read(path) {
            Ok(config) => {
                config.apply(&mut loader);
                options = config.options;
            }
            Err(e) => {
                report_error(&format!("error: {}", e), output, quiet);
                process::exit(1);
            }
        }
    }

    for pattern in &args.files {
        loader.add_files(pattern);
    }
    for spec in &args.libraries {
        let Some((name, pattern)) = spec.split_once('=') else {
            report_error(
                &format!("error: --lib expects NAME=PATTERN, got '{}'", spec),
                output,
                quiet,
            );
            process::exit(1);
        };
        loader.add_library_files(name, pattern);
    }
    for pattern in &args.library_maps {
        loader.add_library_maps(pattern, Path::new(""), false);
    }
    for pattern in &args.search_dirs {
        loader.add_search_directories(pattern);
    }
    for ext in &args.search_extensions {
        loader.add_search_extension(ext);
    }

    (loader, options)
}

/// Print recorded load errors to stderr, one per line.
pub(crate) fn print_errors(loader: &SourceLoader, quiet: bool) {
    if quiet {
        return;
    }
    for err in loader.errors() {
        eprintln!("error: {}", err);
    }
}

/// Display name of a buffer's library, if it has one.
pub(crate) fn library_name(
    loader: &SourceLoader,
    id: Option<hdlsrc_core::LibraryId>,
) -> Option<&str> {
    id.and_then(|id| loader.library(id)).map(|lib| lib.name())
}
