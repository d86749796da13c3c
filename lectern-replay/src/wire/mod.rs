//! Legacy wire decoding.
//!
//! Every recorded payload is a bincode-encoded [`ObjectEnvelope`]:
//! ```text
//! ┌────────────────────────┬──────────────┬────────────────────────┐
//! │ assembly               │ type_name    │ body                   │
//! │ "<name>, Version=x.y"  │ "Navigate"…  │ bincode(format message)│
//! └────────────────────────┴──────────────┴────────────────────────┘
//! ```
//! The assembly name identifies which of the four legacy protocols wrote
//! the object; the body is that protocol's own message type.
//!
//! Decoding a frame never mutates anything: a corrupt payload yields a
//! [`WireError`] and the caller drops the frame.

pub mod capability;
pub mod classify;
pub mod doc_tree;
pub mod graph;
pub mod index_nav;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub use capability::{CapabilityBody, CapabilityMessage, SlideAddress};
pub use classify::{Classification, StreamClassifier};
pub use doc_tree::DocTreeMessage;
pub use graph::{DeckDisposition, GraphBody, GraphMessage};
pub use index_nav::{IndexNavMessage, NavPayload, SlideRef};

/// Which legacy protocol produced a logical source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WireFormat {
    /// Index-addressed messages, optionally wrapped in a sequenced envelope.
    IndexNav,
    /// Index-addressed messages inside capability envelopes.
    IndexCapability,
    /// Organization-node addressed document tree.
    DocumentTree,
    /// Predecessor/child linked message graphs.
    GraphProtocol,
}

impl WireFormat {
    pub const ALL: [WireFormat; 4] = [
        WireFormat::IndexNav,
        WireFormat::IndexCapability,
        WireFormat::DocumentTree,
        WireFormat::GraphProtocol,
    ];

    /// Assembly name written into every envelope of this format.
    pub fn assembly(self) -> &'static str {
        match self {
            WireFormat::IndexNav => "Classroom.Presenter.Network",
            WireFormat::IndexCapability => "Classroom.Presenter.Capabilities",
            WireFormat::DocumentTree => "Conferencing.DocumentTree",
            WireFormat::GraphProtocol => "Presenter.Model.Graph",
        }
    }

    /// Identify a format from an envelope assembly string.
    ///
    /// Only the simple name (text before the first comma) is compared, so
    /// version and culture qualifiers are ignored.
    pub fn from_assembly(assembly: &str) -> Option<WireFormat> {
        let simple = assembly.split(',').next().unwrap_or("").trim();
        WireFormat::ALL.into_iter().find(|f| f.assembly() == simple)
    }
}

impl std::fmt::Display for WireFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WireFormat::IndexNav => "index-nav",
            WireFormat::IndexCapability => "index-capability",
            WireFormat::DocumentTree => "document-tree",
            WireFormat::GraphProtocol => "graph",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for WireFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "index-nav" => Ok(WireFormat::IndexNav),
            "index-capability" => Ok(WireFormat::IndexCapability),
            "document-tree" => Ok(WireFormat::DocumentTree),
            "graph" => Ok(WireFormat::GraphProtocol),
            other => Err(format!("unknown wire format: {other}")),
        }
    }
}

/// Coarse participant role of the client that recorded a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParticipantRole {
    Presenter,
    Student,
    SharedDisplay,
}

/// Outer object written for every recorded payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectEnvelope {
    pub assembly: String,
    pub type_name: String,
    pub body: Vec<u8>,
}

/// A payload decoded into its format's object graph.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedMessage {
    IndexNav(IndexNavMessage),
    IndexCapability(CapabilityMessage),
    DocumentTree(DocTreeMessage),
    Graph(GraphMessage),
}

impl DecodedMessage {
    pub fn format(&self) -> WireFormat {
        match self {
            DecodedMessage::IndexNav(_) => WireFormat::IndexNav,
            DecodedMessage::IndexCapability(_) => WireFormat::IndexCapability,
            DecodedMessage::DocumentTree(_) => WireFormat::DocumentTree,
            DecodedMessage::Graph(_) => WireFormat::GraphProtocol,
        }
    }

    /// Role announced by this object, if it is a role-identifying object.
    pub fn announced_role(&self) -> Option<ParticipantRole> {
        match self {
            DecodedMessage::IndexNav(m) => m.announced_role(),
            DecodedMessage::IndexCapability(m) => match &m.body {
                CapabilityBody::Hello { role, .. } => Some(*role),
                _ => None,
            },
            DecodedMessage::DocumentTree(DocTreeMessage::Participant { role, .. }) => Some(*role),
            DecodedMessage::DocumentTree(_) => None,
            DecodedMessage::Graph(m) => m.announced_role(),
        }
    }
}

/// A message type belonging to one wire format.
pub trait WireObject: Serialize + DeserializeOwned {
    const FORMAT: WireFormat;

    fn type_name(&self) -> &'static str;
}

/// Wire decoding errors.
#[derive(Debug, Clone, PartialEq)]
pub enum WireError {
    /// Outer envelope could not be decoded.
    Envelope(String),
    /// Envelope names an assembly no known format writes.
    UnknownAssembly(String),
    /// Envelope belongs to a different format than the source's.
    FormatMismatch { expected: WireFormat, found: WireFormat },
    /// Body could not be decoded as the format's message type.
    Body { format: WireFormat, type_name: String, reason: String },
    /// Encoding a message failed.
    Encode(String),
}

impl std::fmt::Display for WireError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WireError::Envelope(e) => write!(f, "Envelope decode error: {e}"),
            WireError::UnknownAssembly(a) => write!(f, "Unknown assembly: {a}"),
            WireError::FormatMismatch { expected, found } => {
                write!(f, "Format mismatch: expected {expected}, found {found}")
            }
            WireError::Body { format, type_name, reason } => {
                write!(f, "Cannot decode {format} object {type_name}: {reason}")
            }
            WireError::Encode(e) => write!(f, "Encode error: {e}"),
        }
    }
}

impl std::error::Error for WireError {}

/// Serialize a message into an enveloped payload.
pub fn encode<M: WireObject>(msg: &M) -> Result<Vec<u8>, WireError> {
    let body = bincode::serde::encode_to_vec(msg, bincode::config::standard())
        .map_err(|e| WireError::Encode(e.to_string()))?;
    let envelope = ObjectEnvelope {
        assembly: format!("{}, Version=1.0", M::FORMAT.assembly()),
        type_name: msg.type_name().to_string(),
        body,
    };
    bincode::serde::encode_to_vec(&envelope, bincode::config::standard())
        .map_err(|e| WireError::Encode(e.to_string()))
}

/// Decode the outer envelope and report which format wrote it.
pub fn open_envelope(payload: &[u8]) -> Result<(WireFormat, ObjectEnvelope), WireError> {
    let (envelope, read): (ObjectEnvelope, usize) =
        bincode::serde::decode_from_slice(payload, bincode::config::standard())
            .map_err(|e| WireError::Envelope(e.to_string()))?;
    if read != payload.len() {
        return Err(WireError::Envelope(format!(
            "{} trailing bytes after envelope",
            payload.len() - read
        )));
    }
    let format = WireFormat::from_assembly(&envelope.assembly)
        .ok_or_else(|| WireError::UnknownAssembly(envelope.assembly.clone()))?;
    Ok((format, envelope))
}

/// Decode a payload. With `expected` set, envelopes from any other format
/// are rejected.
pub fn decode(payload: &[u8], expected: Option<WireFormat>) -> Result<DecodedMessage, WireError> {
    let (format, envelope) = open_envelope(payload)?;
    if let Some(expected) = expected {
        if expected != format {
            return Err(WireError::FormatMismatch { expected, found: format });
        }
    }
    let msg = match format {
        WireFormat::IndexNav => DecodedMessage::IndexNav(decode_body(format, &envelope)?),
        WireFormat::IndexCapability => {
            DecodedMessage::IndexCapability(decode_body(format, &envelope)?)
        }
        WireFormat::DocumentTree => DecodedMessage::DocumentTree(decode_body(format, &envelope)?),
        WireFormat::GraphProtocol => DecodedMessage::Graph(decode_body(format, &envelope)?),
    };
    Ok(msg)
}

fn decode_body<M: DeserializeOwned>(
    format: WireFormat,
    envelope: &ObjectEnvelope,
) -> Result<M, WireError> {
    let body_err = |reason: String| WireError::Body {
        format,
        type_name: envelope.type_name.clone(),
        reason,
    };
    let (msg, read): (M, usize) =
        bincode::serde::decode_from_slice(&envelope.body, bincode::config::standard())
            .map_err(|e| body_err(e.to_string()))?;
    if read != envelope.body.len() {
        return Err(body_err(format!("{} trailing bytes", envelope.body.len() - read)));
    }
    Ok(msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_from_assembly_ignores_qualifiers() {
        assert_eq!(
            WireFormat::from_assembly("Conferencing.DocumentTree, Version=3.1, Culture=neutral"),
            Some(WireFormat::DocumentTree)
        );
        assert_eq!(WireFormat::from_assembly("mscorlib"), None);
    }

    #[test]
    fn test_decode_detects_format() {
        let msg = IndexNavMessage::EraseDeck { deck: Uuid::new_v4() };
        let bytes = encode(&msg).unwrap();
        let decoded = decode(&bytes, None).unwrap();
        assert_eq!(decoded.format(), WireFormat::IndexNav);
        assert_eq!(decoded, DecodedMessage::IndexNav(msg));
    }

    #[test]
    fn test_decode_rejects_mismatched_format() {
        let bytes = encode(&IndexNavMessage::EraseDeck { deck: Uuid::new_v4() }).unwrap();
        let err = decode(&bytes, Some(WireFormat::GraphProtocol)).unwrap_err();
        assert_eq!(
            err,
            WireError::FormatMismatch {
                expected: WireFormat::GraphProtocol,
                found: WireFormat::IndexNav
            }
        );
    }

    #[test]
    fn test_decode_garbage_is_error() {
        assert!(decode(&[0xFF, 0xFE, 0xFD], None).is_err());
        assert!(decode(&[], None).is_err());
    }

    #[test]
    fn test_truncated_payload_is_error() {
        let bytes = encode(&IndexNavMessage::EraseDeck { deck: Uuid::new_v4() }).unwrap();
        assert!(decode(&bytes[..bytes.len() - 3], None).is_err());
    }

    #[test]
    fn test_unknown_assembly() {
        let envelope = ObjectEnvelope {
            assembly: "Some.Other.Protocol".into(),
            type_name: "X".into(),
            body: vec![],
        };
        let bytes = bincode::serde::encode_to_vec(&envelope, bincode::config::standard()).unwrap();
        assert!(matches!(decode(&bytes, None), Err(WireError::UnknownAssembly(_))));
    }

    fn graph_envelope(body: Vec<u8>) -> Vec<u8> {
        let envelope = ObjectEnvelope {
            assembly: format!("{}, Version=1.0", WireFormat::GraphProtocol.assembly()),
            type_name: "GroupMessage".into(),
            body,
        };
        bincode::serde::encode_to_vec(&envelope, bincode::config::standard()).unwrap()
    }

    #[test]
    fn test_graph_with_shared_node_rejected() {
        let node = |children: Vec<u32>| graph::GraphNode { body: GraphBody::Group, predecessor: None, children };
        let nodes = vec![node(vec![1, 2]), node(vec![2]), node(vec![])];
        let body = bincode::serde::encode_to_vec(&nodes, bincode::config::standard()).unwrap();
        let err = decode(&graph_envelope(body), None).unwrap_err();
        assert!(matches!(err, WireError::Body { format: WireFormat::GraphProtocol, .. }));
    }

    #[test]
    fn test_graph_nested_garbage_is_body_error() {
        let err = decode(&graph_envelope(vec![1u8; 20_000]), None).unwrap_err();
        assert!(matches!(err, WireError::Body { .. }));
    }

    #[test]
    fn test_format_name_parse() {
        for format in WireFormat::ALL {
            assert_eq!(format.to_string().parse::<WireFormat>().unwrap(), format);
        }
    }
}
