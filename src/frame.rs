//! Frame escaping: byte-stuffing with start/end markers and an optional
//! checksum trailer.
//!
//! Wraps an already-encoded payload for transports that delimit frames with
//! marker bytes. The payload (and checksum, when configured) is passed
//! through an escape map so marker bytes never appear inside the frame body.
//! This layer never inspects struct layout.

use std::collections::HashMap;

/// Pure checksum callback: payload bytes in, checksum bytes out. The
/// checksum length is probed once at registration and assumed fixed.
pub type ChecksumFn = Box<dyn Fn(&[u8]) -> Vec<u8> + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame does not begin with the start marker")]
    BadStart,
    #[error("frame does not end with the end marker")]
    BadEnd,
    #[error("frame shorter than its checksum")]
    Truncated,
    #[error("frame checksum mismatch")]
    Checksum,
}

/// Escape/unescape rules for one framing scheme.
pub struct FrameCodec {
    start: Vec<u8>,
    end: Vec<u8>,
    escape: HashMap<u8, [u8; 2]>,
    unescape: HashMap<[u8; 2], u8>,
    check_len: usize,
    checksum: Option<ChecksumFn>,
}

impl FrameCodec {
    /// `escape` maps each byte that must not appear on the wire to its
    /// two-byte replacement; the reverse map is derived from it.
    pub fn new(start: &[u8], end: &[u8], escape: HashMap<u8, [u8; 2]>) -> Self {
        let unescape = escape.iter().map(|(&b, &pair)| (pair, b)).collect();
        FrameCodec {
            start: start.to_vec(),
            end: end.to_vec(),
            escape,
            unescape,
            check_len: 0,
            checksum: None,
        }
    }

    /// Append a checksum over the unescaped payload before escaping, and
    /// verify/strip it on unescape.
    pub fn with_checksum(
        mut self,
        f: impl Fn(&[u8]) -> Vec<u8> + Send + Sync + 'static,
    ) -> Self {
        let probe = f(&[0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a]);
        self.check_len = probe.len();
        self.checksum = Some(Box::new(f));
        self
    }

    /// Wrap a payload: start marker, escaped payload (and checksum), end
    /// marker. Checksum bytes go through the same escape map as the payload
    /// so the two directions stay symmetric.
    pub fn escape(&self, payload: &[u8]) -> Vec<u8> {
        let mut content = payload.to_vec();
        if let Some(f) = &self.checksum {
            content.extend(f(payload));
        }
        let mut out = Vec::with_capacity(self.start.len() + content.len() * 2 + self.end.len());
        out.extend_from_slice(&self.start);
        for &b in &content {
            match self.escape.get(&b) {
                Some(pair) => out.extend_from_slice(pair),
                None => out.push(b),
            }
        }
        out.extend_from_slice(&self.end);
        out
    }

    /// Reverse [`FrameCodec::escape`]: verify and strip the markers, undo
    /// the stuffing, then verify and strip the checksum.
    pub fn unescape(&self, frame: &[u8]) -> Result<Vec<u8>, FrameError> {
        if !frame.starts_with(&self.start) {
            return Err(FrameError::BadStart);
        }
        if !frame.ends_with(&self.end) || frame.len() < self.start.len() + self.end.len() {
            return Err(FrameError::BadEnd);
        }
        let content = &frame[self.start.len()..frame.len() - self.end.len()];

        let mut out = Vec::with_capacity(content.len());
        let mut i = 0;
        while i < content.len() {
            if i + 1 < content.len() {
                if let Some(&orig) = self.unescape.get(&[content[i], content[i + 1]]) {
                    out.push(orig);
                    i += 2;
                    continue;
                }
            }
            out.push(content[i]);
            i += 1;
        }

        let f = match &self.checksum {
            Some(f) => f,
            None => return Ok(out),
        };
        if out.len() < self.check_len {
            return Err(FrameError::Truncated);
        }
        let payload_len = out.len() - self.check_len;
        if f(&out[..payload_len]) != out[payload_len..] {
            return Err(FrameError::Checksum);
        }
        out.truncate(payload_len);
        Ok(out)
    }
}
