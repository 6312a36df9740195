//! Named test configurations stored as CSV.
//!
//! Expected headers:
//! configName,pathlength,thresholdForce,temperature,retractionLength,numberOfCurves,curveDistances
//!
//! `curveDistances` holds a JSON object in a quoted field, e.g.
//! `"{""curve1"":40,""curve2"":80}"`. Files are rewritten whole and replaced
//! atomically.
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const HEADERS: [&str; 7] = [
    "configName",
    "pathlength",
    "thresholdForce",
    "temperature",
    "retractionLength",
    "numberOfCurves",
    "curveDistances",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestProfile {
    #[serde(rename = "configName")]
    pub name: String,
    #[serde(rename = "pathlength")]
    pub path_length_mm: i32,
    #[serde(rename = "thresholdForce")]
    pub threshold_force_mn: f64,
    #[serde(rename = "temperature")]
    pub temperature_c: f64,
    #[serde(rename = "retractionLength")]
    pub retraction_length_mm: f64,
    #[serde(rename = "numberOfCurves")]
    pub number_of_curves: u32,
    #[serde(rename = "curveDistances", with = "curve_json")]
    pub curve_distances: Map<String, Value>,
}

mod curve_json {
    use serde::{Deserialize, Deserializer, Serializer, de};
    use serde_json::{Map, Value};

    pub fn serialize<S: Serializer>(m: &Map<String, Value>, s: S) -> Result<S::Ok, S::Error> {
        let text = serde_json::to_string(m).map_err(serde::ser::Error::custom)?;
        s.serialize_str(&text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Map<String, Value>, D::Error> {
        let text = String::deserialize(d)?;
        if text.trim().is_empty() {
            return Ok(Map::new());
        }
        serde_json::from_str(&text)
            .map_err(|e| de::Error::custom(format!("curveDistances is not a JSON object: {e}")))
    }
}

/// CSV-backed profile store.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the file with just the header row if it does not exist.
    pub fn ensure_exists(&self) -> eyre::Result<()> {
        if self.path.exists() {
            return Ok(());
        }
        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir)
                .map_err(|e| eyre::eyre!("create profile directory {:?}: {}", dir, e))?;
        }
        self.save_all(&[])
    }

    pub fn load(&self) -> eyre::Result<Vec<TestProfile>> {
        self.ensure_exists()?;
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(&self.path)
            .map_err(|e| eyre::eyre!("open profile CSV {:?}: {}", self.path, e))?;

        // Enforce exact headers
        let headers = rdr
            .headers()
            .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", self.path, e))?
            .clone();
        let actual: Vec<&str> = headers.iter().collect();
        if actual != HEADERS {
            eyre::bail!(
                "profile CSV must have headers '{}', got: {}",
                HEADERS.join(","),
                actual.join(",")
            );
        }

        let mut profiles = Vec::new();
        for (idx, rec) in rdr.deserialize::<TestProfile>().enumerate() {
            match rec {
                Ok(p) => profiles.push(p),
                Err(e) => eyre::bail!("invalid CSV row {}: {}", idx + 2, e),
            }
        }
        Ok(profiles)
    }

    /// Replace the file contents with `profiles`.
    pub fn save_all(&self, profiles: &[TestProfile]) -> eyre::Result<()> {
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        wtr.write_record(HEADERS)?;
        for p in profiles {
            wtr.serialize(p)?;
        }
        let bytes = wtr
            .into_inner()
            .map_err(|e| eyre::eyre!("encode profile CSV: {}", e))?;
        write_atomic(&self.path, &bytes)
            .map_err(|e| eyre::eyre!("write profile CSV {:?}: {}", self.path, e))
    }

    pub fn find(&self, name: &str) -> eyre::Result<Option<TestProfile>> {
        Ok(self.load()?.into_iter().find(|p| p.name == name))
    }

    /// Insert `profile`, or replace the one with the same name in place.
    pub fn upsert(&self, profile: TestProfile) -> eyre::Result<()> {
        if profile.name.trim().is_empty() {
            eyre::bail!("profile name must not be empty");
        }
        let mut all = self.load()?;
        match all.iter_mut().find(|p| p.name == profile.name) {
            Some(slot) => *slot = profile,
            None => all.push(profile),
        }
        self.save_all(&all)
    }

    /// Remove the profile called `name`. Returns whether one was removed.
    pub fn delete(&self, name: &str) -> eyre::Result<bool> {
        let mut all = self.load()?;
        let before = all.len();
        all.retain(|p| p.name != name);
        if all.len() == before {
            return Ok(false);
        }
        self.save_all(&all)?;
        Ok(true)
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("new");
    {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    fs::rename(tmp, path)
}
