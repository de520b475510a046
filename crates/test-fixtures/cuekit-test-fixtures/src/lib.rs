use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use cuekit_core::{Config, ElementDecl, Value};

mod toolkit;

pub use toolkit::{Call, RecordingToolkit, Widget, ROOT};

static MANIFEST: Lazy<Manifest> = Lazy::new(|| {
    let raw = include_str!("../../../../fixtures/manifest.json");
    serde_json::from_str(raw).expect("fixtures manifest should parse")
});

#[derive(Debug, Deserialize)]
struct Manifest {
    classes: String,
    configs: HashMap<String, String>,
}

/// Widget class as described by the fixture catalog.
#[derive(Clone, Debug, Deserialize)]
pub struct ClassSpec {
    #[serde(default)]
    pub container: bool,
    /// Class-specific properties with their default values.
    #[serde(default)]
    pub properties: IndexMap<String, Value>,
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

pub mod classes {
    use super::*;

    pub fn load() -> Result<IndexMap<String, ClassSpec>> {
        super::load_json(&MANIFEST.classes)
    }
}

pub mod configs {
    use super::*;

    pub fn keys() -> Vec<String> {
        MANIFEST.configs.keys().cloned().collect()
    }

    pub fn json(name: &str) -> Result<String> {
        let rel = lookup(&MANIFEST.configs, "config", name)?;
        read_to_string(rel)
    }

    /// Parse and validate through [`Config::from_json`].
    pub fn load(name: &str) -> Result<Config> {
        let text = json(name)?;
        Config::from_json(&text).with_context(|| format!("invalid config fixture '{name}'"))
    }
}

/// Common element declarations.
pub mod decls {
    use super::*;

    pub fn rect(start: f64, duration: f64) -> ElementDecl {
        ElementDecl::new("Rectangle")
            .start(start)
            .duration(duration)
            .param("size", [50.0f32, 50.0])
    }

    pub fn label(text: &str, start: f64) -> ElementDecl {
        ElementDecl::new("Label").start(start).param("text", text)
    }

    pub fn float_layout() -> ElementDecl {
        ElementDecl::new("FloatLayout")
    }

    pub fn box_layout() -> ElementDecl {
        ElementDecl::new("BoxLayout")
    }
}
