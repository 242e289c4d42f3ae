//! Partition documents.
//!
//! A partition is the declarative description of one composition: parallel
//! tracks, each an ordered list of note/chord/rest blocks with symbolic
//! durations.
//!
//! ```json
//! { "tracks": [
//!     { "trackNumber": 1, "blocks": [
//!         { "type": "note",  "value": "C4",         "duration": "quarter" },
//!         { "type": "chord", "value": "|C4|E4|G4|", "duration": "half" },
//!         { "type": "note",  "value": "X",          "duration": "quarter" }
//!     ] }
//! ] }
//! ```
//!
//! Documents often come from a text-generation service, so decoding is
//! lenient at the block level: missing, null or non-string fields decode as
//! empty strings, a block that is not an object decodes as an empty block,
//! and unknown block types are kept. All of these play as silent slots.
//! Only a document that is not structurally a partition fails to decode.

use crate::duration::resolve_duration;
use crate::error::{Error, Result};
use crate::note::is_rest;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Kind of a block, derived from its `type` field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockKind {
    Note,
    Chord,
    Rest,
    /// Anything else; scheduled as a rest.
    Unknown,
}

/// A single scheduled event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MusicBlock {
    /// `"note"`, `"chord"` or `"rest"`.
    #[serde(rename = "type", default, deserialize_with = "lenient_string")]
    pub kind: String,
    /// Note token, `|`-joined chord tokens, or `X` for a rest.
    #[serde(default, deserialize_with = "lenient_string")]
    pub value: String,
    /// Symbolic duration name.
    #[serde(default, deserialize_with = "lenient_string")]
    pub duration: String,
}

/// Strings pass through, numbers and booleans keep their text, anything
/// else becomes empty.
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => String::new(),
    })
}

/// Decode each block on its own; one that is not an object becomes an
/// empty block instead of failing the document.
fn lenient_blocks<'de, D>(deserializer: D) -> std::result::Result<Vec<MusicBlock>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Vec::<Value>::deserialize(deserializer)?;
    Ok(values
        .into_iter()
        .map(|value| {
            serde_json::from_value(value.clone()).unwrap_or_else(|e| {
                log::warn!("Malformed block {}: {}, playing it as a rest", value, e);
                MusicBlock::default()
            })
        })
        .collect())
}

impl MusicBlock {
    pub fn note(value: impl Into<String>, duration: impl Into<String>) -> Self {
        Self {
            kind: "note".to_string(),
            value: value.into(),
            duration: duration.into(),
        }
    }

    pub fn chord(value: impl Into<String>, duration: impl Into<String>) -> Self {
        Self {
            kind: "chord".to_string(),
            value: value.into(),
            duration: duration.into(),
        }
    }

    pub fn rest(duration: impl Into<String>) -> Self {
        Self {
            kind: "rest".to_string(),
            value: crate::note::REST_SENTINEL.to_string(),
            duration: duration.into(),
        }
    }

    pub fn block_kind(&self) -> BlockKind {
        match self.kind.trim().to_ascii_lowercase().as_str() {
            "note" => BlockKind::Note,
            "chord" => BlockKind::Chord,
            "rest" => BlockKind::Rest,
            _ => BlockKind::Unknown,
        }
    }

    /// Whether this block produces silence: an explicit rest kind or the `X` value.
    pub fn is_rest(&self) -> bool {
        self.block_kind() == BlockKind::Rest || is_rest(&self.value)
    }

    /// Wall-clock length of this block at `tempo_bpm`.
    pub fn seconds(&self, tempo_bpm: f64) -> f64 {
        resolve_duration(&self.duration, tempo_bpm)
    }
}

fn default_track_number() -> u32 {
    1
}

/// One instrument lane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    /// 1-based track number; selects the instrument.
    #[serde(default = "default_track_number")]
    pub track_number: u32,
    #[serde(default, deserialize_with = "lenient_blocks")]
    pub blocks: Vec<MusicBlock>,
}

impl Track {
    pub fn new(track_number: u32, blocks: Vec<MusicBlock>) -> Self {
        Self {
            track_number,
            blocks,
        }
    }

    /// Total length of the track at `tempo_bpm`.
    pub fn seconds(&self, tempo_bpm: f64) -> f64 {
        self.blocks.iter().map(|b| b.seconds(tempo_bpm)).sum()
    }
}

/// Accepted document shapes: the multi-track form and the older
/// single-track `{ "blocks": [...] }` form.
#[derive(Deserialize)]
#[serde(untagged)]
enum PartitionDocument {
    Tracks { tracks: Vec<Track> },
    Single {
        #[serde(deserialize_with = "lenient_blocks")]
        blocks: Vec<MusicBlock>,
    },
}

impl From<PartitionDocument> for Partition {
    fn from(doc: PartitionDocument) -> Self {
        match doc {
            PartitionDocument::Tracks { tracks } => Partition { tracks },
            PartitionDocument::Single { blocks } => Partition {
                tracks: vec![Track::new(1, blocks)],
            },
        }
    }
}

/// The playback unit: an ordered set of tracks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "PartitionDocument")]
pub struct Partition {
    pub tracks: Vec<Track>,
}

impl Partition {
    pub fn new(tracks: Vec<Track>) -> Self {
        Self { tracks }
    }

    /// Decode a partition from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Decode a partition from a text-generation response.
    ///
    /// See [`extract_from_completion`] for the accepted envelopes.
    pub fn from_completion(raw: &str) -> Result<Self> {
        let json = extract_from_completion(raw)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Highest track number referenced, 0 for an empty partition.
    pub fn max_track_number(&self) -> u32 {
        self.tracks.iter().map(|t| t.track_number).max().unwrap_or(0)
    }

    /// Length of the longest track at `tempo_bpm`.
    pub fn seconds(&self, tempo_bpm: f64) -> f64 {
        self.tracks
            .iter()
            .map(|t| t.seconds(tempo_bpm))
            .fold(0.0, f64::max)
    }
}

#[derive(Deserialize)]
struct CompletionEnvelope {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: String,
}

/// Pull partition JSON text out of a chat-completion response.
///
/// Accepts a full completion envelope (`choices[0].message.content`) or the
/// message content alone. Markdown code fences around the JSON are
/// stripped; failing that, the outermost `{ ... }` span is taken.
pub fn extract_from_completion(raw: &str) -> Result<String> {
    let raw = raw.trim();
    let content = match serde_json::from_str::<CompletionEnvelope>(raw) {
        Ok(envelope) => envelope
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::Completion("completion has no choices".to_string()))?,
        Err(_) => raw.to_string(),
    };

    let body = strip_code_fence(&content).unwrap_or(content.as_str());
    let start = body.find('{');
    let end = body.rfind('}');
    match (start, end) {
        (Some(start), Some(end)) if start < end => Ok(body[start..=end].to_string()),
        _ => Err(Error::Completion(
            "no JSON object found in completion content".to_string(),
        )),
    }
}

/// Return the text inside the first fenced code block, if any.
fn strip_code_fence(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after_open = &text[open + 3..];
    // Skip the info string (e.g. "json") up to the end of the fence line
    let body_start = after_open.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_open[body_start..];
    let close = body.find("```").unwrap_or(body.len());
    Some(body[..close].trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{"tracks":[{"trackNumber":1,"blocks":[
        {"type":"note","value":"C4","duration":"quarter"},
        {"type":"chord","value":"|C4|E4|G4|","duration":"half"}]}]}"#;

    #[test]
    fn test_decode_multi_track() {
        let partition = Partition::from_json(SAMPLE).unwrap();
        assert_eq!(partition.tracks.len(), 1);
        assert_eq!(partition.tracks[0].track_number, 1);
        assert_eq!(partition.tracks[0].blocks[1].block_kind(), BlockKind::Chord);
        assert!((partition.seconds(120.0) - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_decode_single_track_form() {
        let partition =
            Partition::from_json(r#"{"blocks":[{"type":"note","value":"A4","duration":"whole"}]}"#)
                .unwrap();
        assert_eq!(partition.tracks.len(), 1);
        assert_eq!(partition.tracks[0].track_number, 1);
    }

    #[test]
    fn test_lenient_blocks() {
        let partition = Partition::from_json(
            r#"{"tracks":[{"trackNumber":2,"blocks":[{"type":"arpeggio"},{"value":"X","duration":"half"}]}]}"#,
        )
        .unwrap();
        let blocks = &partition.tracks[0].blocks;
        assert_eq!(blocks[0].block_kind(), BlockKind::Unknown);
        assert_eq!(blocks[0].duration, "");
        assert!(blocks[1].is_rest());
        assert_eq!(partition.max_track_number(), 2);
    }

    #[test]
    fn test_malformed_fields_become_empty() {
        let partition = Partition::from_json(
            r#"{"tracks":[{"trackNumber":1,"blocks":[
                {"type":"note","value":60,"duration":"quarter"},
                {"type":"note","value":"C4","duration":null},
                {"type":null,"value":["C4"],"duration":{"beats":1}},
                "C4",
                {"type":"note","value":"D4","duration":"half"}]}]}"#,
        )
        .unwrap();
        let blocks = &partition.tracks[0].blocks;
        assert_eq!(blocks.len(), 5);
        assert_eq!(blocks[0].value, "60");
        assert_eq!(blocks[1].duration, "");
        assert_eq!(blocks[2], MusicBlock::default());
        assert_eq!(blocks[3], MusicBlock::default());
        assert_eq!(blocks[3].block_kind(), BlockKind::Unknown);
        assert_eq!(blocks[4], MusicBlock::note("D4", "half"));

        let single = Partition::from_json(r#"{"blocks":[null,{"type":"rest","value":"X","duration":"whole"}]}"#)
            .unwrap();
        assert_eq!(single.tracks[0].blocks.len(), 2);
        assert!(single.tracks[0].blocks[1].is_rest());
    }

    #[test]
    fn test_structural_failures() {
        assert!(matches!(Partition::from_json("not json"), Err(Error::InvalidPartition(_))));
        assert!(matches!(Partition::from_json("{}"), Err(Error::InvalidPartition(_))));
        assert!(matches!(
            Partition::from_json(r#"{"tracks": 3}"#),
            Err(Error::InvalidPartition(_))
        ));
        assert!(matches!(
            Partition::from_json(r#"{"blocks": "C4"}"#),
            Err(Error::InvalidPartition(_))
        ));
    }

    #[test]
    fn test_json_roundtrip_keeps_wire_names() {
        let partition = Partition::new(vec![Track::new(
            1,
            vec![MusicBlock::note("C4", "quarter"), MusicBlock::rest("eighth")],
        )]);
        let json = partition.to_json().unwrap();
        assert!(json.contains("\"trackNumber\": 1"));
        assert!(json.contains("\"type\": \"rest\""));
        assert_eq!(Partition::from_json(&json).unwrap(), partition);
    }

    #[test]
    fn test_extract_from_completion_envelope() {
        let content = format!("```json\n{}\n```", SAMPLE);
        let envelope = serde_json::json!({
            "id": "abc",
            "object": "chat.completion",
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }]
        });
        let partition = Partition::from_completion(&envelope.to_string()).unwrap();
        assert_eq!(partition.tracks[0].blocks.len(), 2);
    }

    #[test]
    fn test_extract_from_bare_content() {
        let text = format!("Here is your song:\n{}\nEnjoy!", SAMPLE);
        let json = extract_from_completion(&text).unwrap();
        assert!(json.starts_with('{') && json.ends_with('}'));
        assert!(Partition::from_json(&json).is_ok());

        assert!(matches!(
            extract_from_completion("I cannot write music"),
            Err(Error::Completion(_))
        ));
        assert!(matches!(
            extract_from_completion(r#"{"choices":[]}"#),
            Err(Error::Completion(_))
        ));
    }
}
