//! Location selection - which page a roaming buddy shows up on.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// One path or several candidate paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSpec {
    One(String),
    Many(Vec<String>),
}

impl PathSpec {
    pub fn as_slice(&self) -> &[String] {
        match self {
            PathSpec::One(path) => std::slice::from_ref(path),
            PathSpec::Many(paths) => paths,
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.as_slice().iter().any(|candidate| candidate == path)
    }
}

impl From<&str> for PathSpec {
    fn from(path: &str) -> Self {
        PathSpec::One(path.to_string())
    }
}

impl From<Vec<String>> for PathSpec {
    fn from(paths: Vec<String>) -> Self {
        PathSpec::Many(paths)
    }
}

/// Pick a location from `candidates`.
///
/// A `specific` path wins when it is one of the candidates. Otherwise a
/// candidate is drawn uniformly from those passing the explored gate;
/// `None` means nowhere is eligible and the buddy should not render.
pub fn select_location<R>(
    candidates: &PathSpec,
    explored: impl Fn(&str) -> bool,
    explored_only: bool,
    specific: Option<&str>,
    rng: &mut R,
) -> Option<String>
where
    R: Rng + ?Sized,
{
    if let Some(specific) = specific {
        if candidates.contains(specific) {
            return Some(specific.to_string());
        }
    }

    let eligible: Vec<&String> = candidates
        .as_slice()
        .iter()
        .filter(|path| !explored_only || explored(path.as_str()))
        .collect();

    eligible.choose(rng).map(|path| (*path).clone())
}
