//! On-disk layout of run artifacts and the trajectory/stats codec.
//!
//! ```text
//! <root>/<target>/<optimizer>/<seed>/<dataset>/
//!     search.json
//!     eval.json
//!     stats.json
//! ```
//!
//! Every file is written to a hidden sibling first and renamed into place, and
//! `stats.json` is always written last. A leaf is therefore complete only when
//! a writer finished it.

use std::fs;
use std::path::{Path, PathBuf};

use hb_types::{ArtifactError, HbResult, Stage, StatsArtifact, Trajectory};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

pub const STATS_FILE: &str = "stats.json";

/// The three files a complete leaf holds, in write order.
pub const LEAF_FILES: [&str; 3] = ["search.json", "eval.json", STATS_FILE];

/// Identity of one leaf in the results tree.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunKey {
    pub target: String,
    pub optimizer: String,
    pub seed: u64,
    pub dataset: String,
}

impl RunKey {
    pub fn new(
        target: impl Into<String>,
        optimizer: impl Into<String>,
        seed: u64,
        dataset: impl Into<String>,
    ) -> Self {
        Self {
            target: target.into(),
            optimizer: optimizer.into(),
            seed,
            dataset: dataset.into(),
        }
    }

    /// Recover the key from a leaf directory below `root`.
    pub fn from_leaf_dir(root: &Path, leaf: &Path) -> Option<Self> {
        let relative = leaf.strip_prefix(root).ok()?;
        let parts: Vec<&str> = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<_>>()?;
        match parts.as_slice() {
            [target, optimizer, seed, dataset] => Some(Self::new(
                *target,
                *optimizer,
                seed.parse().ok()?,
                *dataset,
            )),
            _ => None,
        }
    }
}

impl std::fmt::Display for RunKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.target, self.optimizer, self.seed, self.dataset
        )
    }
}

/// Resumability state of one leaf.
#[derive(Debug)]
pub enum LeafStatus {
    /// No directory for the leaf.
    Missing,
    /// The directory exists but some files are absent.
    Incomplete { missing: Vec<&'static str> },
    /// All files exist but one of them does not parse.
    Corrupt(ArtifactError),
    Complete,
}

impl LeafStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

/// Deterministic mapping from run keys to artifact locations.
#[derive(Debug, Clone)]
pub struct RunLayout {
    root: PathBuf,
}

impl RunLayout {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn target_dir(&self, target: &str) -> PathBuf {
        self.root.join(target)
    }

    pub fn leaf_dir(&self, key: &RunKey) -> PathBuf {
        self.root
            .join(&key.target)
            .join(&key.optimizer)
            .join(key.seed.to_string())
            .join(&key.dataset)
    }

    pub fn trajectory_path(&self, key: &RunKey, stage: Stage) -> PathBuf {
        self.leaf_dir(key).join(stage.file_name())
    }

    pub fn stats_path(&self, key: &RunKey) -> PathBuf {
        self.leaf_dir(key).join(STATS_FILE)
    }

    /// Inspect a leaf without modifying it.
    pub fn status(&self, key: &RunKey) -> LeafStatus {
        let dir = self.leaf_dir(key);
        if !dir.is_dir() {
            return LeafStatus::Missing;
        }
        let missing: Vec<&'static str> = LEAF_FILES
            .iter()
            .copied()
            .filter(|file| !dir.join(file).is_file())
            .collect();
        if !missing.is_empty() {
            return LeafStatus::Incomplete { missing };
        }

        for stage in Stage::ALL {
            if let Err(e) = read_json::<Trajectory>(&self.trajectory_path(key, stage)) {
                return LeafStatus::Corrupt(e);
            }
        }
        match read_json::<StatsArtifact>(&self.stats_path(key)) {
            Ok(_) => LeafStatus::Complete,
            Err(e) => LeafStatus::Corrupt(e),
        }
    }

    /// Fail with [`ArtifactError::Incomplete`] unless every leaf file exists.
    /// Files are not parsed.
    pub fn ensure_complete(&self, key: &RunKey) -> HbResult<()> {
        let dir = self.leaf_dir(key);
        let missing: Vec<&str> = LEAF_FILES
            .iter()
            .copied()
            .filter(|file| !dir.join(file).is_file())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ArtifactError::Incomplete {
                path: dir,
                missing: missing.join(", "),
            }
            .into())
        }
    }

    /// Persist a finished leaf: both trajectories, then the stats.
    pub fn write_leaf(
        &self,
        key: &RunKey,
        search: &Trajectory,
        eval: &Trajectory,
        stats: &StatsArtifact,
    ) -> HbResult<PathBuf> {
        let dir = self.leaf_dir(key);
        fs::create_dir_all(&dir).map_err(|e| ArtifactError::WriteFailed {
            path: dir.clone(),
            message: e.to_string(),
        })?;
        save_trajectory(search, &self.trajectory_path(key, Stage::Search))?;
        save_trajectory(eval, &self.trajectory_path(key, Stage::Eval))?;
        save_stats(stats, &self.stats_path(key))?;
        debug!("Wrote artifacts for {}", key);
        Ok(dir)
    }
}

/// Serialize a trajectory to `path`. The parent directory must exist.
pub fn save_trajectory(trajectory: &Trajectory, path: &Path) -> HbResult<()> {
    write_json(trajectory, path)
}

/// Load a trajectory, failing with the path when it does not parse.
/// Entry order is taken as is.
pub fn load_trajectory(path: &Path) -> HbResult<Trajectory> {
    Ok(read_json(path)?)
}

pub fn save_stats(stats: &StatsArtifact, path: &Path) -> HbResult<()> {
    write_json(stats, path)
}

pub fn load_stats(path: &Path) -> HbResult<StatsArtifact> {
    Ok(read_json(path)?)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let bytes = fs::read(path).map_err(|e| ArtifactError::ReadFailed {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    serde_json::from_slice(&bytes).map_err(|e| ArtifactError::Malformed {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn write_json<T: Serialize>(value: &T, path: &Path) -> HbResult<()> {
    let write_failed = |message: String| ArtifactError::WriteFailed {
        path: path.to_path_buf(),
        message,
    };
    let bytes = serde_json::to_vec_pretty(value).map_err(|e| write_failed(e.to_string()))?;
    let tmp = temp_sibling(path).ok_or_else(|| write_failed("path has no file name".into()))?;
    fs::write(&tmp, bytes).map_err(|e| write_failed(e.to_string()))?;
    fs::rename(&tmp, path).map_err(|e| write_failed(e.to_string()))?;
    Ok(())
}

fn temp_sibling(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?.to_str()?;
    Some(path.with_file_name(format!(".{name}.tmp")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hb_types::{Configuration, Entry, HbError, RunStats};
    use tempfile::TempDir;

    fn trajectory() -> Trajectory {
        Trajectory::new(vec![
            Entry::new(Configuration::new(), 0.4, 1.0, 0.2, [0]),
            Entry::new(Configuration::new(), 0.2, 5.0, 1.1, [0, 1]),
        ])
    }

    fn stats() -> StatsArtifact {
        StatsArtifact::new(RunStats::default(), "61", 1.5)
    }

    #[test]
    fn test_leaf_paths() {
        let layout = RunLayout::new("/results");
        let key = RunKey::new("knn", "random_x2", 3, "iris");
        assert_eq!(
            layout.trajectory_path(&key, Stage::Eval),
            PathBuf::from("/results/knn/random_x2/3/iris/eval.json")
        );
        assert_eq!(
            RunKey::from_leaf_dir(Path::new("/results"), &layout.leaf_dir(&key)),
            Some(key)
        );
        assert_eq!(
            RunKey::from_leaf_dir(Path::new("/results"), Path::new("/results/knn/random/notaseed/iris")),
            None
        );
    }

    #[test]
    fn test_save_and_load_trajectory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("search.json");
        save_trajectory(&trajectory(), &path).unwrap();
        assert_eq!(load_trajectory(&path).unwrap(), trajectory());
        assert!(!dir.path().join(".search.json.tmp").exists());
    }

    #[test]
    fn test_malformed_file_names_its_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("eval.json");
        fs::write(&path, r#"[{"conf": {}, "loss": 0.1"#).unwrap();

        match load_trajectory(&path) {
            Err(HbError::Artifact(ArtifactError::Malformed { path: failed, .. })) => {
                assert_eq!(failed, path)
            }
            other => panic!("expected malformed artifact, got {other:?}"),
        }
    }

    #[test]
    fn test_save_requires_parent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("search.json");
        assert!(save_trajectory(&trajectory(), &path).is_err());
    }

    #[test]
    fn test_ensure_complete_lists_missing_files() {
        let dir = TempDir::new().unwrap();
        let layout = RunLayout::new(dir.path());
        let key = RunKey::new("knn", "random", 0, "iris");
        layout.write_leaf(&key, &trajectory(), &trajectory(), &stats()).unwrap();
        layout.ensure_complete(&key).unwrap();

        fs::remove_file(layout.trajectory_path(&key, Stage::Eval)).unwrap();
        fs::remove_file(layout.stats_path(&key)).unwrap();
        match layout.ensure_complete(&key) {
            Err(HbError::Artifact(ArtifactError::Incomplete { path, missing })) => {
                assert_eq!(path, layout.leaf_dir(&key));
                assert_eq!(missing, "eval.json, stats.json");
            }
            other => panic!("expected incomplete leaf, got {other:?}"),
        }
    }

    #[test]
    fn test_leaf_status_transitions() {
        let dir = TempDir::new().unwrap();
        let layout = RunLayout::new(dir.path());
        let key = RunKey::new("knn", "random", 0, "iris");
        assert!(matches!(layout.status(&key), LeafStatus::Missing));

        layout.write_leaf(&key, &trajectory(), &trajectory(), &stats()).unwrap();
        assert!(layout.status(&key).is_complete());

        fs::remove_file(layout.stats_path(&key)).unwrap();
        match layout.status(&key) {
            LeafStatus::Incomplete { missing } => assert_eq!(missing, vec![STATS_FILE]),
            other => panic!("expected incomplete leaf, got {other:?}"),
        }

        fs::write(layout.stats_path(&key), "{").unwrap();
        match layout.status(&key) {
            LeafStatus::Corrupt(e) => assert_eq!(e.path(), layout.stats_path(&key)),
            other => panic!("expected corrupt leaf, got {other:?}"),
        }
    }
}
