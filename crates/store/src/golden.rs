//! Golden frame benchmark sets
//!
//! Curated conversation frames with expected outcomes, stored as
//! `golden_frames_v<N>.json` files. Versions are additive: every version
//! must contain all frame ids of the versions before it, so a benchmark
//! score on v3 is comparable to a score on v2.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use receptionist_core::ConversationFrame;
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// Expected outcome for one golden frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectedOutcome {
    /// Expected overall intent label
    pub intent: String,
    /// Expected tool names, in call order
    #[serde(default)]
    pub tool_calls: Vec<String>,
}

/// One curated frame with its expected outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoldenFrame {
    /// Stable id, unique within a set and carried across versions
    pub id: String,
    pub frame: ConversationFrame,
    pub expected: ExpectedOutcome,
}

/// A versioned set of golden frames
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoldenSet {
    pub version: u32,
    pub frames: Vec<GoldenFrame>,
}

impl GoldenSet {
    fn ids(&self) -> BTreeSet<&str> {
        self.frames.iter().map(|f| f.id.as_str()).collect()
    }
}

/// Load every `golden_frames_v<N>.json` under `dir`, sorted by version,
/// enforcing that each version is a superset of the previous one.
///
/// A missing directory yields an empty list; the benchmark simply has
/// nothing to run against yet.
pub fn load_golden_sets(dir: &Path) -> Result<Vec<GoldenSet>, StoreError> {
    let mut sets: Vec<GoldenSet> = Vec::new();

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(sets),
        Err(e) => return Err(e.into()),
    };

    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        let Some(version) = parse_version(&name) else {
            continue;
        };

        let bytes = fs::read(entry.path())?;
        let set: GoldenSet = serde_json::from_slice(&bytes)?;
        if set.version != version {
            return Err(StoreError::GoldenNotAdditive {
                version,
                message: format!("file {name} declares version {}", set.version),
            });
        }
        sets.push(set);
    }

    sets.sort_by_key(|s| s.version);

    for pair in sets.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        let missing: Vec<&str> = prev.ids().difference(&next.ids()).copied().collect();
        if !missing.is_empty() {
            return Err(StoreError::GoldenNotAdditive {
                version: next.version,
                message: format!(
                    "missing frames from v{}: {}",
                    prev.version,
                    missing.join(", ")
                ),
            });
        }
    }

    if let Some(latest) = sets.last() {
        tracing::info!(
            version = latest.version,
            frames = latest.frames.len(),
            "Loaded golden frame sets"
        );
    }

    Ok(sets)
}

fn parse_version(file_name: &str) -> Option<u32> {
    file_name
        .strip_prefix("golden_frames_v")?
        .strip_suffix(".json")?
        .parse()
        .ok()
}
