use std::process;

use hdlsrc_core::{SourceLoader, SyntaxTree};

use super::{build_loader, library_name, print_errors};
use crate::{LoadArgs, OutputFormat, ParseArgs};

pub(crate) fn cmd_parse(load: &LoadArgs, args: &ParseArgs, output: OutputFormat, quiet: bool) {
    let (mut loader, mut options) = build_loader(load, output, quiet);

    options.single_unit |= args.single_unit;
    options.libraries_inherit_macros |= args.libraries_inherit_macros;
    options.only_lint |= args.lint_only;
    if args.threads.is_some() {
        options.num_threads = args.threads;
    }
    options.predefines.extend(args.defines.iter().cloned());

    if !loader.has_files() && loader.errors().is_empty() {
        crate::report_error("error: no source files given", output, quiet);
        process::exit(1);
    }

    let trees = loader.load_and_parse_sources(&options);

    match output {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "trees": trees.iter().map(|t| tree_json(&loader, t)).collect::<Vec<_>>(),
                "errors": loader.errors().iter().map(|e| e.to_json_value()).collect::<Vec<_>>(),
                "library_ties": loader.library_ties(),
                "closure": loader.last_closure_stats(),
            });
            let pretty = serde_json::to_string_pretty(&value)
                .unwrap_or_else(|e| format!("serialization error: {}", e));
            println!("{}", pretty);
        }
        OutputFormat::Text => {
            for tree in &trees {
                println!("{}", tree_line(&loader, tree));
                if !quiet {
                    for diag in tree.diagnostics() {
                        eprintln!("{}:{}: warning: {}", diag.file, diag.line, diag.message);
                    }
                }
            }
            print_errors(&loader, quiet);
            if !quiet {
                let discovered = loader
                    .last_closure_stats()
                    .map(|s| format!(", {} discovered", s.files_loaded))
                    .unwrap_or_default();
                eprintln!(
                    "{} trees{}, {} errors",
                    trees.len(),
                    discovered,
                    loader.errors().len()
                );
            }
        }
    }

    if !loader.errors().is_empty() {
        process::exit(1);
    }
}

fn tree_line(loader: &SourceLoader, tree: &SyntaxTree) -> String {
    let mut line = tree
        .path()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    if tree.buffers().len() > 1 {
        line.push_str(&format!(" (+{} files)", tree.buffers().len() - 1));
    }
    if let Some(lib) = library_name(loader, tree.library()) {
        line.push_str(&format!(" [{}]", lib));
    } else if tree.is_library {
        line.push_str(" [library]");
    }
    let names: Vec<&str> = tree.metadata().declared_names().collect();
    if !names.is_empty() {
        line.push_str(": ");
        line.push_str(&names.join(" "));
    }
    line
}

fn tree_json(loader: &SourceLoader, tree: &SyntaxTree) -> serde_json::Value {
    serde_json::json!({
        "files": tree.buffers().iter().map(|b| b.path.display().to_string()).collect::<Vec<_>>(),
        "library": library_name(loader, tree.library()),
        "is_library": tree.is_library,
        "declared": tree.metadata().declared_names().collect::<Vec<_>>(),
        "references": tree.metadata().referenced_names().collect::<Vec<_>>(),
        "diagnostics": tree.diagnostics(),
    })
}
