//! A small cache over [`Clip::open`], keyed by filename, so repeated cues
//! in a room script don't re-decode the same asset every play.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use dashmap::DashMap;

use crate::audio::clip::Clip;

pub struct ClipLibrary {
    dir: PathBuf,
    cache: DashMap<String, Arc<Clip>>,
}

impl ClipLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: DashMap::new(),
        }
    }

    pub fn load(&self, name: &str) -> Result<Arc<Clip>> {
        if let Some(clip) = self.cache.get(name) {
            return Ok(clip.clone());
        }
        let path: PathBuf = if Path::new(name).is_absolute() {
            PathBuf::from(name)
        } else {
            self.dir.join(name)
        };
        let clip = Arc::new(Clip::open(&path).with_context(|| format!("loading clip {}", path.display()))?);
        self.cache.insert(name.to_string(), clip.clone());
        Ok(clip)
    }
}
