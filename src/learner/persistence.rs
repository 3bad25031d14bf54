//! Saving and loading the four learner artifacts.
//!
//! Both estimator locks are held for the whole operation, value first. Saves
//! go to temporary files that are renamed into place only after all four were
//! written. The artifacts they replace are moved aside first and restored if
//! any rename fails, so the previous set stays whole. Loads parse all four
//! before either estimator changes.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, TandemError};
use crate::estimator::{save_state, PolicyEstimator, TrainableModel, ValueEstimator};

/// `<prefix>-q`, `<prefix>-policy`, `<prefix>-q-preprocess`, `<prefix>-policy-preprocess`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub value_model: PathBuf,
    pub policy_model: PathBuf,
    pub value_preprocess: PathBuf,
    pub policy_preprocess: PathBuf,
}

impl ArtifactPaths {
    pub fn new<P: AsRef<Path>>(prefix: P) -> Self {
        let prefix = prefix.as_ref();
        ArtifactPaths {
            value_model: with_suffix(prefix, "-q"),
            policy_model: with_suffix(prefix, "-policy"),
            value_preprocess: with_suffix(prefix, "-q-preprocess"),
            policy_preprocess: with_suffix(prefix, "-policy-preprocess"),
        }
    }

    pub fn all(&self) -> [&Path; 4] {
        [&self.value_model, &self.policy_model, &self.value_preprocess, &self.policy_preprocess]
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

pub(crate) fn save_all<V: TrainableModel, P: TrainableModel>(
    value: &ValueEstimator<V>,
    policy: &PolicyEstimator<P>,
    prefix: &Path,
) -> Result<()> {
    let paths = ArtifactPaths::new(prefix);
    let staged = ArtifactPaths::new(with_suffix(prefix, ".tmp"));
    let backup = ArtifactPaths::new(with_suffix(prefix, ".bak"));

    let value_state = value.read_state();
    let policy_state = policy.read_state();

    let written = save_state(&*value_state, &staged.value_model, &staged.value_preprocess)
        .and_then(|_| save_state(&*policy_state, &staged.policy_model, &staged.policy_preprocess));
    if let Err(e) = written {
        discard(&staged);
        return Err(e);
    }

    let committed = commit(&staged, &paths, &backup);
    if committed.is_err() {
        discard(&staged);
    }
    committed
}

/// Move `staged` over `paths` as a set. Existing targets are parked at
/// `backup` and put back if any step fails.
fn commit(staged: &ArtifactPaths, paths: &ArtifactPaths, backup: &ArtifactPaths) -> Result<()> {
    let sources = staged.all();
    let targets = paths.all();
    let parked = backup.all();

    let mut moved_aside = Vec::new();
    let mut placed = Vec::new();
    let mut outcome = Ok(());

    for i in 0..targets.len() {
        if !targets[i].exists() {
            continue;
        }
        if let Err(e) = fs::rename(targets[i], parked[i]) {
            outcome = Err(TandemError::persistence(targets[i].display().to_string(), e.to_string()));
            break;
        }
        moved_aside.push(i);
    }

    if outcome.is_ok() {
        for i in 0..targets.len() {
            if let Err(e) = fs::rename(sources[i], targets[i]) {
                outcome = Err(TandemError::persistence(targets[i].display().to_string(), e.to_string()));
                break;
            }
            placed.push(i);
        }
    }

    match outcome {
        Ok(()) => {
            for &i in &moved_aside {
                if let Err(e) = fs::remove_file(parked[i]) {
                    log::warn!("could not remove {}: {}", parked[i].display(), e);
                }
            }
            Ok(())
        }
        Err(e) => {
            for &i in &placed {
                if let Err(e) = fs::remove_file(targets[i]) {
                    log::warn!("could not remove {}: {}", targets[i].display(), e);
                }
            }
            for &i in &moved_aside {
                if let Err(e) = fs::rename(parked[i], targets[i]) {
                    log::error!("could not restore {}: {}", targets[i].display(), e);
                }
            }
            Err(e)
        }
    }
}

pub(crate) fn load_all<V: TrainableModel, P: TrainableModel>(
    value: &ValueEstimator<V>,
    policy: &PolicyEstimator<P>,
    prefix: &Path,
) -> Result<()> {
    let paths = ArtifactPaths::new(prefix);

    let mut value_state = value.write_state();
    let mut policy_state = policy.write_state();

    let loaded_value = value.read_artifacts(&*value_state, &paths.value_model, &paths.value_preprocess)?;
    let loaded_policy = policy.read_artifacts(&*policy_state, &paths.policy_model, &paths.policy_preprocess)?;

    *value_state = loaded_value;
    *policy_state = loaded_policy;
    Ok(())
}

fn discard(paths: &ArtifactPaths) {
    for path in paths.all() {
        if path.exists() {
            if let Err(e) = fs::remove_file(path) {
                log::warn!("could not remove {}: {}", path.display(), e);
            }
        }
    }
}
