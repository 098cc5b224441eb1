//! Multi-part QR framing.
//!
//! A payload of at most [`QR_MAX_CHUNK`] bytes travels as one bare frame.
//! Anything longer is cut into `N` byte chunks of at most `QR_MAX_CHUNK`,
//! each base64-encoded into a frame:
//!
//! ```text
//! trxsafe:v1:<i>:<N>:<base64-chunk>      1 <= i <= N <= 100
//! ```
//!
//! [`QrCollector`] accepts frames in any order, tolerates repeats, and
//! refuses to assemble until every index is present.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;

use crate::config::{QR_FRAME_PREFIX, QR_MAX_CHUNK, QR_MAX_PARTS};
use crate::error::{PaymentError, PaymentResult};

fn malformed(reason: impl Into<String>) -> PaymentError {
    PaymentError::QrMalformed(reason.into())
}

/// Splits `payload` into QR frames.
pub fn encode_frames(payload: &str) -> PaymentResult<Vec<String>> {
    let bytes = payload.as_bytes();
    if bytes.len() <= QR_MAX_CHUNK {
        return Ok(vec![payload.to_string()]);
    }

    let chunks: Vec<&[u8]> = bytes.chunks(QR_MAX_CHUNK).collect();
    let total = chunks.len();
    if total > QR_MAX_PARTS {
        return Err(malformed(format!(
            "payload needs {total} parts, limit is {QR_MAX_PARTS}"
        )));
    }

    Ok(chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| format!("{QR_FRAME_PREFIX}{}:{total}:{}", i + 1, B64.encode(chunk)))
        .collect())
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Frame {
    Bare(String),
    Part {
        index: usize,
        total: usize,
        chunk: Vec<u8>,
    },
}

fn parse_frame(frame: &str) -> PaymentResult<Frame> {
    let frame = frame.trim();
    let Some(rest) = frame.strip_prefix(QR_FRAME_PREFIX) else {
        if frame.starts_with('{') {
            return Ok(Frame::Bare(frame.to_string()));
        }
        return Err(malformed("frame is neither a trxsafe part nor a JSON payload"));
    };

    let mut fields = rest.splitn(3, ':');
    let (Some(index), Some(total), Some(data)) = (fields.next(), fields.next(), fields.next())
    else {
        return Err(malformed("frame must be trxsafe:v1:<i>:<N>:<data>"));
    };
    let index: usize = index
        .parse()
        .map_err(|_| malformed(format!("bad part index {index:?}")))?;
    let total: usize = total
        .parse()
        .map_err(|_| malformed(format!("bad part total {total:?}")))?;

    if total == 0 || total > QR_MAX_PARTS {
        return Err(malformed(format!("part total {total} outside 1..={QR_MAX_PARTS}")));
    }
    if index == 0 || index > total {
        return Err(malformed(format!("part index {index} outside 1..={total}")));
    }
    let chunk = B64
        .decode(data)
        .map_err(|e| malformed(format!("part {index} is not base64: {e}")))?;
    if chunk.is_empty() || chunk.len() > QR_MAX_CHUNK {
        return Err(malformed(format!("part {index} has {} bytes", chunk.len())));
    }

    Ok(Frame::Part { index, total, chunk })
}

/// Reassembles scanned frames.
#[derive(Debug, Default)]
pub struct QrCollector {
    bare: Option<String>,
    total: Option<usize>,
    parts: BTreeMap<usize, Vec<u8>>,
}

impl QrCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one scanned frame. Returns `true` once every part is present.
    pub fn accept(&mut self, frame: &str) -> PaymentResult<bool> {
        match parse_frame(frame)? {
            Frame::Bare(payload) => {
                if self.total.is_some() {
                    return Err(malformed("bare payload mixed with multi-part frames"));
                }
                match &self.bare {
                    Some(existing) if *existing != payload => {
                        return Err(malformed("two different bare payloads scanned"))
                    }
                    _ => self.bare = Some(payload),
                }
            }
            Frame::Part { index, total, chunk } => {
                if self.bare.is_some() {
                    return Err(malformed("multi-part frame mixed with a bare payload"));
                }
                match self.total {
                    Some(expected) if expected != total => {
                        return Err(PaymentError::QrInconsistentTotal {
                            expected,
                            actual: total,
                        })
                    }
                    _ => self.total = Some(total),
                }
                match self.parts.get(&index) {
                    Some(existing) if *existing != chunk => {
                        return Err(malformed(format!("part {index} scanned with different content")))
                    }
                    Some(_) => {}
                    None => {
                        self.parts.insert(index, chunk);
                    }
                }
            }
        }
        Ok(self.is_complete())
    }

    pub fn total(&self) -> Option<usize> {
        if self.bare.is_some() {
            Some(1)
        } else {
            self.total
        }
    }

    pub fn received(&self) -> usize {
        if self.bare.is_some() {
            1
        } else {
            self.parts.len()
        }
    }

    /// Indices still outstanding, ascending. Empty before the first frame.
    pub fn missing(&self) -> Vec<usize> {
        match (self.bare.is_some(), self.total) {
            (true, _) | (false, None) => Vec::new(),
            (false, Some(total)) => (1..=total).filter(|i| !self.parts.contains_key(i)).collect(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.bare.is_some()
            || self
                .total
                .is_some_and(|total| self.parts.len() == total)
    }

    /// The original payload text.
    pub fn assemble(&self) -> PaymentResult<String> {
        if let Some(bare) = &self.bare {
            return Ok(bare.clone());
        }
        let Some(total) = self.total else {
            return Err(PaymentError::QrIncomplete { missing: vec![1] });
        };
        let missing = self.missing();
        if !missing.is_empty() {
            return Err(PaymentError::QrIncomplete { missing });
        }

        let mut bytes = Vec::with_capacity(total * QR_MAX_CHUNK);
        for chunk in self.parts.values() {
            bytes.extend_from_slice(chunk);
        }
        String::from_utf8(bytes).map_err(|_| malformed("reassembled payload is not UTF-8"))
    }
}

/// Collects `frames` and assembles them in one go.
pub fn reassemble<I, S>(frames: I) -> PaymentResult<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut collector = QrCollector::new();
    for frame in frames {
        collector.accept(frame.as_ref())?;
    }
    collector.assemble()
}
