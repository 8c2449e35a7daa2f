//! Model configuration (`finetune_speaker.json`).
//!
//! Only the fields the server needs are modelled; training and architecture
//! sections are ignored.

use std::{fs, path::Path};

use anyhow::Context;
use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct HParams {
    pub data: DataParams,
    #[serde(default)]
    pub symbols: Vec<String>,
    #[serde(default)]
    pub speakers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataParams {
    pub sampling_rate: u32,
    #[serde(default)]
    pub text_cleaners: Vec<String>,
    #[serde(default)]
    pub add_blank: bool,
    #[serde(default)]
    pub n_speakers: usize,
}

impl HParams {
    pub fn from_file<P: AsRef<Path>>(p: P) -> anyhow::Result<Self> {
        let text = fs::read_to_string(p.as_ref())
            .with_context(|| format!("Failed to read config file: {}", p.as_ref().display()))?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        serde_json::from_str(text).context("Config file is not valid JSON")
    }

    pub fn speaker_table(&self) -> anyhow::Result<SpeakerTable> {
        SpeakerTable::from_map(&self.speakers)
    }
}

/// Speaker display name -> speaker id, in config file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpeakerTable {
    entries: Vec<(String, i64)>,
}

impl SpeakerTable {
    pub fn new(entries: Vec<(String, i64)>) -> Self {
        Self { entries }
    }

    pub fn from_map(map: &Map<String, Value>) -> anyhow::Result<Self> {
        let entries = map
            .iter()
            .map(|(name, id)| {
                id.as_i64()
                    .map(|id| (name.clone(), id))
                    .ok_or_else(|| anyhow::anyhow!("speaker '{name}' has a non-integer id: {id}"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self { entries })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// The speaker used when a request does not pick one.
    pub fn first(&self) -> Option<&str> {
        self.entries.first().map(|(name, _)| name.as_str())
    }

    pub fn id_of(&self, name: &str) -> Option<i64> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, id)| *id)
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|(n, _)| n.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"{
        "train": { "segment_size": 8192 },
        "data": {
            "sampling_rate": 22050,
            "text_cleaners": ["cjke_cleaners2"],
            "add_blank": true,
            "n_speakers": 3
        },
        "model": { "hidden_channels": 192 },
        "symbols": ["_", ",", "a", "b"],
        "speakers": { "zoe": 2, "alice_voice": 0, "bob": 1 }
    }"#;

    #[test]
    fn test_parse_config() {
        let hps = HParams::from_json(CONFIG).unwrap();
        assert_eq!(hps.data.sampling_rate, 22050);
        assert!(hps.data.add_blank);
        assert_eq!(hps.data.text_cleaners, vec!["cjke_cleaners2".to_string()]);
        assert_eq!(hps.symbols.len(), 4);
    }

    #[test]
    fn test_speaker_table_keeps_file_order() {
        let table = HParams::from_json(CONFIG).unwrap().speaker_table().unwrap();
        assert_eq!(table.first(), Some("zoe"));
        assert_eq!(table.names(), vec!["zoe", "alice_voice", "bob"]);
        assert_eq!(table.id_of("bob"), Some(1));
        assert_eq!(table.id_of("nobody"), None);
    }

    #[test]
    fn test_missing_speakers_is_empty_table() {
        let hps = HParams::from_json(r#"{ "data": { "sampling_rate": 16000 } }"#).unwrap();
        assert!(hps.speaker_table().unwrap().is_empty());
    }

    #[test]
    fn test_non_integer_speaker_id() {
        let hps = HParams::from_json(
            r#"{ "data": { "sampling_rate": 16000 }, "speakers": { "a": "zero" } }"#,
        )
        .unwrap();
        assert!(hps.speaker_table().is_err());
    }

    #[test]
    fn test_missing_sampling_rate_is_error() {
        assert!(HParams::from_json(r#"{ "data": {} }"#).is_err());
    }
}
