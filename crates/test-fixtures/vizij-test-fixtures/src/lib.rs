use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Deserialize;

static MANIFEST: Lazy<Manifest> = Lazy::new(|| {
    let raw = include_str!("../../../../fixtures/manifest.json");
    serde_json::from_str(raw).expect("fixtures manifest should parse")
});

#[derive(Debug, Deserialize)]
struct Manifest {
    blendspaces: HashMap<String, BlendSpaceEntry>,
    clips: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BlendSpaceEntry {
    Path(String),
    Detailed {
        path: String,
        #[serde(default)]
        clips: Vec<String>,
    },
}

impl BlendSpaceEntry {
    fn as_path(&self) -> &str {
        match self {
            BlendSpaceEntry::Path(path) => path,
            BlendSpaceEntry::Detailed { path, .. } => path,
        }
    }

    fn clips(&self) -> &[String] {
        match self {
            BlendSpaceEntry::Path(_) => &[],
            BlendSpaceEntry::Detailed { clips, .. } => clips,
        }
    }
}

fn fixtures_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../fixtures")
}

fn resolve_path(rel: &str) -> PathBuf {
    fixtures_root().join(rel)
}

fn read_to_string(rel: &str) -> Result<String> {
    let path = resolve_path(rel);
    fs::read_to_string(&path)
        .with_context(|| format!("failed to read fixture at {}", path.display()))
}

fn load_json<T: DeserializeOwned>(rel: &str) -> Result<T> {
    let text = read_to_string(rel)?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse JSON fixture {rel}"))
}

fn lookup<'a, T>(map: &'a HashMap<String, T>, kind: &str, name: &str) -> Result<&'a T> {
    map.get(name)
        .ok_or_else(|| anyhow!("unknown {kind} fixture '{name}'"))
}

pub mod blendspaces {
    use super::*;

    pub fn keys() -> Vec<String> {
        MANIFEST.blendspaces.keys().cloned().collect()
    }

    pub fn json(name: &str) -> Result<String> {
        let entry = lookup(&MANIFEST.blendspaces, "blend space", name)?;
        read_to_string(entry.as_path())
    }

    pub fn load<T: DeserializeOwned>(name: &str) -> Result<T> {
        let entry = lookup(&MANIFEST.blendspaces, "blend space", name)?;
        super::load_json(entry.as_path())
    }

    /// Clip fixture names the blend space expects in its motion set.
    pub fn clip_names(name: &str) -> Result<Vec<String>> {
        let entry = lookup(&MANIFEST.blendspaces, "blend space", name)?;
        Ok(entry.clips().to_vec())
    }

    pub fn path(name: &str) -> Result<PathBuf> {
        let entry = lookup(&MANIFEST.blendspaces, "blend space", name)?;
        Ok(resolve_path(entry.as_path()))
    }
}

pub mod clips {
    use super::*;

    pub fn keys() -> Vec<String> {
        MANIFEST.clips.keys().cloned().collect()
    }

    pub fn json(name: &str) -> Result<String> {
        let rel = lookup(&MANIFEST.clips, "clip", name)?;
        read_to_string(rel)
    }

    pub fn load<T: DeserializeOwned>(name: &str) -> Result<T> {
        let rel = lookup(&MANIFEST.clips, "clip", name)?;
        super::load_json(rel)
    }

    pub fn path(name: &str) -> Result<PathBuf> {
        let rel = lookup(&MANIFEST.clips, "clip", name)?;
        Ok(resolve_path(rel))
    }
}
