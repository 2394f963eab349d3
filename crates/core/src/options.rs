use serde::{Deserialize, Serialize};

/// Options controlling how registered sources are parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceOptions {
    /// Worker threads for the parse pool. `Some(1)` forces single-threaded
    /// parsing; `None` lets the pool pick.
    pub num_threads: Option<usize>,
    /// Parse all direct (non-library) files as one compilation unit.
    pub single_unit: bool,
    /// Mark every tree as a library tree.
    pub only_lint: bool,
    /// Library files see macros defined by the main compilation unit.
    pub libraries_inherit_macros: bool,
    /// Macros predefined in every tree, as `NAME` or `NAME=value`.
    pub predefines: Vec<String>,
}

impl SourceOptions {
    pub fn threads_disabled(&self) -> bool {
        self.num_threads == Some(1)
    }
}
