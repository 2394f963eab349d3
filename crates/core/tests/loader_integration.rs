//! End-to-end loader behavior against real directory trees.

use std::fs;
use std::path::{Path, PathBuf};

use hdlsrc_core::{LoaderConfig, SourceLoader, SourceOptions, SyntaxTree};

fn setup() -> (tempfile::TempDir, PathBuf) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    (dir, root)
}

fn write(root: &Path, rel: &str, text: &str) -> PathBuf {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, text).unwrap();
    path
}

fn pat(root: &Path, rel: &str) -> String {
    root.join(rel).to_string_lossy().into_owned()
}

fn declared(tree: &SyntaxTree) -> Vec<String> {
    tree.metadata()
        .declared_names()
        .map(str::to_owned)
        .collect()
}

fn all_declared<'a>(
    trees: impl IntoIterator<Item = &'a std::sync::Arc<SyntaxTree>>,
) -> Vec<String> {
    trees.into_iter().flat_map(|t| declared(t)).collect()
}

fn threads(n: usize) -> SourceOptions {
    SourceOptions {
        num_threads: Some(n),
        ..Default::default()
    }
}

// ──────────────────────────────────────────────
// Registration
// ──────────────────────────────────────────────

#[test]
fn registering_the_same_file_twice_keeps_one_entry() {
    let (_dir, root) = setup();
    write(&root, "a.sv", "module a; endmodule");

    let mut loader = SourceLoader::default();
    loader.add_files(&pat(&root, "a.sv"));
    loader.add_files(&pat(&root, "*.sv"));

    assert_eq!(loader.file_entries().len(), 1);
    assert!(loader.errors().is_empty());
}

#[test]
fn direct_registration_wins_over_library_in_either_order() {
    let (_dir, root) = setup();
    write(&root, "a.sv", "module a; endmodule");
    write(&root, "b.sv", "module b; endmodule");

    let mut loader = SourceLoader::default();
    loader.add_library_files("lib", &pat(&root, "a.sv"));
    loader.add_files(&pat(&root, "a.sv"));
    loader.add_files(&pat(&root, "b.sv"));
    loader.add_library_files("lib", &pat(&root, "b.sv"));

    let entries: Vec<_> = loader.file_entries().collect();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| !e.is_library_file));
    // The library is still recorded; only the library-file flag is cleared.
    assert!(entries.iter().all(|e| e.library.is_some()));
}

#[test]
fn more_specific_library_pattern_wins() {
    let (_dir, root) = setup();
    write(&root, "rtl/a.sv", "module a; endmodule");
    write(&root, "rtl/b.sv", "module b; endmodule");
    write(
        &root,
        "lib.map",
        "library broad \"rtl/\";\n\
         library narrow \"rtl/*.sv\";\n\
         library exact \"rtl/a.sv\";\n",
    );

    let mut loader = SourceLoader::default();
    loader.add_library_maps(&pat(&root, "lib.map"), Path::new(""), false);
    assert!(loader.errors().is_empty(), "{:?}", loader.errors());

    let owner = |file: &str| {
        let entry = loader
            .file_entries()
            .find(|e| e.path == root.join(file))
            .unwrap();
        assert!(entry.second_lib.is_none());
        loader.library(entry.library.unwrap()).unwrap().name().to_owned()
    };
    assert_eq!(owner("rtl/a.sv"), "exact");
    assert_eq!(owner("rtl/b.sv"), "narrow");
    assert!(loader.library_ties().is_empty());
}

#[test]
fn equal_rank_libraries_leave_a_tie() {
    let (_dir, root) = setup();
    write(&root, "rtl/a.sv", "module a; endmodule");
    write(
        &root,
        "lib.map",
        "library first \"rtl/*.sv\";\nlibrary second \"rtl/*.sv\";\n",
    );

    let mut loader = SourceLoader::default();
    loader.add_library_maps(&pat(&root, "lib.map"), Path::new(""), false);

    let ties = loader.library_ties();
    assert_eq!(ties.len(), 1);
    assert_eq!(ties[0].path, root.join("rtl/a.sv"));
    assert_eq!(ties[0].first, "first");
    assert_eq!(ties[0].second, "second");

    // Ties are reported, never fatal.
    let trees = loader.load_and_parse_sources(&SourceOptions::default());
    assert_eq!(trees.len(), 1);
    assert!(loader.errors().is_empty());
}

#[test]
fn library_maps_follow_includes_relative_to_each_map() {
    let (_dir, root) = setup();
    write(&root, "cfg/top.map", "include \"nested/inner.map\";\ninclude \"\";\n");
    write(&root, "cfg/nested/inner.map", "library ip \"../../ip/*.v\";\n");
    write(&root, "ip/fifo.v", "module fifo; endmodule");

    let mut loader = SourceLoader::default();
    loader.add_library_maps("cfg/top.map", &root, false);

    assert!(loader.errors().is_empty(), "{:?}", loader.errors());
    assert_eq!(loader.library_map_trees().len(), 2);
    let entries: Vec<_> = loader.file_entries().collect();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].path, root.join("ip/fifo.v"));
    assert!(entries[0].is_library_file);
}

#[test]
fn missing_library_map_is_an_error_not_a_panic() {
    let (_dir, root) = setup();
    write(&root, "top.map", "include \"gone.map\";\nlibrary l \"missing/*.sv\";\n");

    let mut loader = SourceLoader::default();
    loader.add_library_maps(&pat(&root, "top.map"), Path::new(""), false);

    let paths: Vec<_> = loader.errors().iter().map(|e| e.path.as_str()).collect();
    assert_eq!(paths, vec!["gone.map", "missing/*.sv"]);
}

// ──────────────────────────────────────────────
// Parsing
// ──────────────────────────────────────────────

#[test]
fn tree_order_matches_registration_with_and_without_threads() {
    let (_dir, root) = setup();
    let names = ["zeta", "alpha", "mid", "beta", "omega", "gamma"];
    for name in names {
        write(&root, &format!("{name}.sv"), &format!("module {name}; endmodule"));
    }

    let parse = |options: &SourceOptions| {
        let mut loader = SourceLoader::default();
        for name in names {
            loader.add_files(&pat(&root, &format!("{name}.sv")));
        }
        all_declared(&loader.load_and_parse_sources(options))
    };

    let sequential = parse(&threads(1));
    assert_eq!(sequential, names);
    assert_eq!(parse(&threads(4)), sequential);
}

#[test]
fn single_unit_mode_produces_one_tree() {
    let (_dir, root) = setup();
    write(&root, "a.sv", "`define W 4\nmodule a; endmodule");
    write(&root, "b.sv", "module b #(parameter P = `W); endmodule");
    write(&root, "c.sv", "module c; endmodule");

    let mut loader = SourceLoader::default();
    loader.add_files(&pat(&root, "*.sv"));
    let trees = loader.load_and_parse_sources(&SourceOptions {
        single_unit: true,
        ..Default::default()
    });

    assert_eq!(trees.len(), 1);
    assert_eq!(trees[0].buffers().len(), 3);
    assert_eq!(declared(&trees[0]), vec!["a", "b", "c"]);
    assert!(trees[0].undefined_macros().is_empty());
}

#[test]
fn library_files_see_main_unit_macros_only_when_inheriting() {
    let (_dir, root) = setup();
    write(&root, "top.sv", "`define FAST_PATH\nmodule top; endmodule");
    write(
        &root,
        "lib/alu.sv",
        "`ifdef FAST_PATH\nmodule alu_fast; endmodule\n`else\nmodule alu_slow; endmodule\n`endif",
    );

    let parse = |inherit: bool, single_unit: bool| {
        let mut loader = SourceLoader::default();
        loader.add_library_files("lib", &pat(&root, "lib/*.sv"));
        loader.add_files(&pat(&root, "top.sv"));
        let trees = loader.load_and_parse_sources(&SourceOptions {
            libraries_inherit_macros: inherit,
            single_unit,
            ..Default::default()
        });
        let lib = trees.iter().find(|t| t.is_library).unwrap();
        declared(lib)
    };

    assert_eq!(parse(true, false), vec!["alu_fast"]);
    assert_eq!(parse(true, true), vec!["alu_fast"]);
    assert_eq!(parse(false, false), vec!["alu_slow"]);
}

#[test]
fn lint_only_libraries_still_inherit_and_keep_order_when_threaded() {
    let (_dir, root) = setup();
    write(&root, "top.sv", "`define FAST_PATH\nmodule top; endmodule");
    for name in ["alu", "fpu", "lsu", "mmu"] {
        write(
            &root,
            &format!("lib/{name}.sv"),
            &format!(
                "`ifdef FAST_PATH\nmodule {name}_fast; endmodule\n\
                 `else\nmodule {name}_slow; endmodule\n`endif"
            ),
        );
    }

    let parse = |n: usize| {
        let mut loader = SourceLoader::default();
        loader.add_library_files("lib", &pat(&root, "lib/*.sv"));
        loader.add_files(&pat(&root, "top.sv"));
        let trees = loader.load_and_parse_sources(&SourceOptions {
            libraries_inherit_macros: true,
            only_lint: true,
            ..threads(n)
        });
        assert!(trees.iter().all(|t| t.is_library));
        all_declared(&trees)
    };

    let sequential = parse(1);
    assert_eq!(
        sequential,
        vec!["top", "alu_fast", "fpu_fast", "lsu_fast", "mmu_fast"]
    );
    assert_eq!(sequential, parse(4));
}

#[test]
fn one_unreadable_file_does_not_stop_the_rest() {
    let (_dir, root) = setup();
    let mut doomed = PathBuf::new();
    for i in 0..5 {
        let path = write(&root, &format!("m{i}.sv"), &format!("module m{i}; endmodule"));
        if i == 2 {
            doomed = path;
        }
    }

    let mut loader = SourceLoader::default();
    loader.add_files(&pat(&root, "*.sv"));
    fs::remove_file(&doomed).unwrap();

    let trees = loader.load_and_parse_sources(&SourceOptions::default());
    assert_eq!(trees.len(), 4);
    assert_eq!(loader.errors().len(), 1);
    assert_eq!(loader.errors()[0].path, doomed.display().to_string());
    assert_eq!(loader.errors()[0].to_json_value()["kind"], "read");
}

#[test]
fn predefines_reach_every_tree() {
    let (_dir, root) = setup();
    write(&root, "a.sv", "`ifdef SIM module a_sim; endmodule `endif");

    let mut loader = SourceLoader::default();
    loader.add_files(&pat(&root, "a.sv"));
    let trees = loader.load_and_parse_sources(&SourceOptions {
        predefines: vec!["SIM".into()],
        ..Default::default()
    });
    assert_eq!(declared(&trees[0]), vec!["a_sim"]);
}

// ──────────────────────────────────────────────
// Discovery
// ──────────────────────────────────────────────

#[test]
fn search_directories_close_over_references() {
    let (_dir, root) = setup();
    write(&root, "top.sv", "module top; left u_l(); right u_r(); endmodule");
    write(&root, "ip/left.sv", "module left; import shared_pkg::*; endmodule");
    write(&root, "ip/right.v", "module right; shared_pkg::word_t w; endmodule");
    write(&root, "pkgs/shared_pkg.sv", "package shared_pkg; endpackage");

    let mut loader = SourceLoader::default();
    loader.add_files(&pat(&root, "top.sv"));
    loader.add_search_directories(&pat(&root, "ip"));
    loader.add_search_directories(&pat(&root, "pkgs"));
    let trees = loader.load_and_parse_sources(&SourceOptions::default());

    assert_eq!(
        all_declared(&trees),
        vec!["top", "left", "right", "shared_pkg"]
    );
    assert!(trees[1..].iter().all(|t| t.is_library));
    let stats = loader.last_closure_stats().unwrap();
    assert!(stats.rounds <= 3);
    assert_eq!(stats.files_loaded, 3);
}

#[test]
fn unresolvable_names_terminate_quietly() {
    let (_dir, root) = setup();
    write(&root, "top.sv", "module top; ghost u(); endmodule");
    write(&root, "ip/other.sv", "module other; endmodule");

    let mut loader = SourceLoader::default();
    loader.add_files(&pat(&root, "top.sv"));
    loader.add_search_directories(&pat(&root, "ip"));
    let trees = loader.load_and_parse_sources(&SourceOptions::default());

    assert_eq!(trees.len(), 1);
    assert!(loader.errors().is_empty());
    assert_eq!(loader.last_closure_stats().unwrap().files_loaded, 0);
}

#[test]
fn extra_search_extensions_are_tried_in_order() {
    let (_dir, root) = setup();
    write(&root, "top.sv", "module top; blk u(); endmodule");
    write(&root, "ip/blk.svh", "module blk; endmodule");

    let mut loader = SourceLoader::default();
    loader.add_files(&pat(&root, "top.sv"));
    loader.add_search_directories(&pat(&root, "ip"));
    loader.add_search_extension(".svh");
    let trees = loader.load_and_parse_sources(&SourceOptions::default());

    assert_eq!(all_declared(&trees), vec!["top", "blk"]);
}

// ──────────────────────────────────────────────
// Configuration
// ──────────────────────────────────────────────

#[test]
fn config_file_drives_a_full_load() {
    let (_dir, root) = setup();
    write(&root, "rtl/top.sv", "module top; fifo u(); endmodule");
    write(&root, "ip/fifo.sv", "module fifo; endmodule");
    let config_path = write(
        &root,
        "hdlsrc.toml",
        "files = [\"rtl/*.sv\"]\nsearch_dirs = [\"ip\"]\n\n[options]\nnum_threads = 1\n",
    );

    let config = LoaderConfig::read(&config_path).unwrap();
    assert_eq!(config.base_dir, root);

    let mut loader = SourceLoader::default();
    config.apply(&mut loader);
    let trees = loader.load_and_parse_sources(&config.options);

    assert_eq!(all_declared(&trees), vec!["top", "fifo"]);
}
