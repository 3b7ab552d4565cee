pub mod artifacts;
pub mod console;
pub mod failures;
pub mod summary;

use std::path::{Path, PathBuf};

/// Directory under the output root holding raw stage outputs.
pub const RAW_OUTPUTS_DIR: &str = "raw_outputs";

/// File-name stem for a rule: spaces and path separators become `_`,
/// quotes are dropped, everything is lowercased.
pub fn safe_name(rule: &str) -> String {
    rule.chars()
        .filter(|c| *c != '"' && *c != '\'')
        .map(|c| if matches!(c, ' ' | '/' | '\\') { '_' } else { c })
        .collect::<String>()
        .to_lowercase()
}

pub fn raw_outputs_dir(out_dir: &Path) -> PathBuf {
    out_dir.join(RAW_OUTPUTS_DIR)
}
