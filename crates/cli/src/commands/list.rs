use std::process;

use super::{build_loader, library_name, print_errors};
use crate::{LoadArgs, OutputFormat};

pub(crate) fn cmd_list(load: &LoadArgs, output: OutputFormat, quiet: bool) {
    let (mut loader, _) = build_loader(load, output, quiet);
    let buffers = loader.load_sources();

    match output {
        OutputFormat::Json => {
            let files: Vec<_> = buffers
                .iter()
                .map(|b| {
                    serde_json::json!({
                        "path": b.path.display().to_string(),
                        "library": library_name(&loader, b.library),
                        "bytes": b.text.len(),
                    })
                })
                .collect();
            let value = serde_json::json!({
                "files": files,
                "errors": loader.errors().iter().map(|e| e.to_json_value()).collect::<Vec<_>>(),
            });
            let pretty = serde_json::to_string_pretty(&value)
                .unwrap_or_else(|e| format!("serialization error: {}", e));
            println!("{}", pretty);
        }
        OutputFormat::Text => {
            for buffer in &buffers {
                match library_name(&loader, buffer.library) {
                    Some(lib) => println!("{} [{}]", buffer.path.display(), lib),
                    None => println!("{}", buffer.path.display()),
                }
            }
            print_errors(&loader, quiet);
        }
    }

    if !loader.errors().is_empty() {
        process::exit(1);
    }
}
