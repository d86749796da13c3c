//! Stream classification for sources whose format is not yet known.
//!
//! A stream is classified once both a format-identifying object (any
//! decodable envelope) and a role-identifying object have been seen.

use super::{decode, ParticipantRole, WireFormat};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Unknown,
    Known { format: WireFormat, role: ParticipantRole },
}

/// Incremental classifier; feed payloads in stream order.
#[derive(Debug, Default)]
pub struct StreamClassifier {
    format: Option<WireFormat>,
    role: Option<ParticipantRole>,
    frames_seen: u64,
    decode_failures: u64,
}

impl StreamClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect one payload and return the classification so far.
    pub fn observe(&mut self, payload: &[u8]) -> Classification {
        self.frames_seen += 1;
        match decode(payload, self.format) {
            Ok(msg) => {
                self.format.get_or_insert(msg.format());
                if self.role.is_none() {
                    self.role = msg.announced_role();
                }
            }
            Err(e) => {
                self.decode_failures += 1;
                log::debug!("Classifier skipped frame {}: {e}", self.frames_seen);
            }
        }
        self.classification()
    }

    pub fn classification(&self) -> Classification {
        match (self.format, self.role) {
            (Some(format), Some(role)) => Classification::Known { format, role },
            _ => Classification::Unknown,
        }
    }

    /// Format seen so far, even if no role has been announced.
    pub fn format(&self) -> Option<WireFormat> {
        self.format
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    pub fn decode_failures(&self) -> u64 {
        self.decode_failures
    }
}

/// Classify a whole sequence of payloads, stopping as soon as it is known.
pub fn classify<'a, I>(payloads: I) -> (Classification, Option<WireFormat>)
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut classifier = StreamClassifier::new();
    for payload in payloads {
        if let known @ Classification::Known { .. } = classifier.observe(payload) {
            return (known, classifier.format());
        }
    }
    (classifier.classification(), classifier.format())
}
