//! Expedition catalog: the planning site's recorded routes plus the town
//! origin they are anchored to, loaded from a YAML file at startup.

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use wayfarer_protocol::{Coord, Expedition};

#[derive(Debug, Clone)]
pub struct Catalog {
    town: Coord,
    entries: Vec<(String, Expedition)>,
}

impl Catalog {
    pub fn load(path: &Path) -> anyhow::Result<Catalog> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read catalog: {}", path.display()))?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> anyhow::Result<Catalog> {
        #[derive(Deserialize)]
        struct CatalogFile {
            town: Coord,
            #[serde(default)]
            expeditions: serde_yaml::Mapping,
        }

        let file: CatalogFile = serde_yaml::from_str(text).context("parse catalog yaml")?;
        let mut entries = Vec::with_capacity(file.expeditions.len());
        for (key, value) in file.expeditions {
            let id = key
                .as_str()
                .context("expedition id must be a string")?
                .to_string();
            let expedition: Expedition = serde_yaml::from_value(value)
                .with_context(|| format!("expedition `{id}`"))?;
            entries.push((id, expedition));
        }
        Ok(Catalog {
            town: file.town,
            entries,
        })
    }

    /// Map-absolute coordinates of the town the routes start from.
    pub fn town(&self) -> Coord {
        self.town
    }

    pub fn entries(&self) -> &[(String, Expedition)] {
        &self.entries
    }

    /// Newest entries first, matching how the selection list is populated.
    pub fn newest_first(&self) -> impl Iterator<Item = &(String, Expedition)> {
        self.entries.iter().rev()
    }
}
