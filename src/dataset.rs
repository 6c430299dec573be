//! Dataset loading
//!
//! A dataset is a JSON array of annotated questions. Image names are
//! resolved against an image directory when the samples are loaded.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

use vire_agents::ImageRef;

/// One annotated question as stored on disk
#[derive(Debug, Clone, Deserialize)]
pub struct DatasetItem {
    pub question: String,
    pub image_name: String,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default, deserialize_with = "id_as_string")]
    pub question_id: String,
}

/// A dataset item with its image resolved
#[derive(Debug, Clone)]
pub struct Sample {
    pub question_id: String,
    pub question: String,
    pub image: ImageRef,
    pub gold_answer: String,
    pub gold_explanation: String,
}

impl DatasetItem {
    fn into_sample(self, image_dir: &Path) -> Sample {
        Sample {
            image: ImageRef::new(image_dir.join(&self.image_name)),
            question_id: self.question_id,
            question: self.question,
            gold_answer: self.answer,
            gold_explanation: self.explanation,
        }
    }
}

/// Question ids appear both as numbers and strings in the wild
fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Load the first `limit` samples (all of them when `None`)
pub fn load(path: &Path, image_dir: &Path, limit: Option<usize>) -> Result<Vec<Sample>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read dataset {}", path.display()))?;
    let items: Vec<DatasetItem> = serde_json::from_str(&raw)
        .with_context(|| format!("Dataset {} is not a JSON array of questions", path.display()))?;

    let take = limit.unwrap_or(items.len());
    Ok(items
        .into_iter()
        .take(take)
        .map(|item| item.into_sample(image_dir))
        .collect())
}

/// Image directory to use when none is given: `<dataset dir>/images`
pub fn default_image_dir(dataset: &Path) -> PathBuf {
    dataset
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join("images")
}
