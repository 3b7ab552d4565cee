use super::{raw_outputs_dir, safe_name};
use crate::pipeline::{ArtifactKind, ArtifactSink};
use anyhow::Context;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Writes each stage output to `<out>/raw_outputs/<safe_name>_<kind>.json`.
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(out_dir: &Path) -> Self {
        Self {
            dir: raw_outputs_dir(out_dir),
        }
    }

    pub fn path_for(&self, rule: &str, kind: ArtifactKind) -> PathBuf {
        self.dir
            .join(format!("{}_{}.json", safe_name(rule), kind.as_str()))
    }
}

impl ArtifactSink for FileSink {
    fn write(&self, rule: &str, kind: ArtifactKind, payload: &Value) -> anyhow::Result<Option<String>> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create {}", self.dir.display()))?;
        let path = self.path_for(rule, kind);
        let json = serde_json::to_string_pretty(payload)?;
        std::fs::write(&path, json)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(Some(path.display().to_string()))
    }
}
