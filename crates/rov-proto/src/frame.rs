/// Fixed accumulator capacity used by the drive firmware.
pub const DEFAULT_CAPACITY: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    Frame(String),
    /// A frame outgrew the buffer and was dropped.
    Overflow,
}

/// Splits the inbound byte stream into frames.
///
/// `<` starts a frame and discards any partial content; `>`, CR and LF end it.
/// Empty frames are never emitted. A frame longer than the capacity is dropped
/// up to its next delimiter, so its tail does not leak out as a separate frame.
#[derive(Debug)]
pub struct FrameParser {
    buf: Vec<u8>,
    capacity: usize,
    discarding: bool,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl FrameParser {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { buf: Vec::with_capacity(capacity), capacity, discarding: false }
    }

    pub fn push(&mut self, bytes: &[u8]) -> Vec<FrameEvent> {
        let mut out = Vec::new();
        for &b in bytes {
            match b {
                b'<' => {
                    self.buf.clear();
                    self.discarding = false;
                }
                b'>' | 13 | 10 => {
                    if !self.buf.is_empty() {
                        out.push(FrameEvent::Frame(String::from_utf8_lossy(&self.buf).into_owned()));
                    }
                    self.buf.clear();
                    self.discarding = false;
                }
                _ if self.discarding => {}
                _ if self.buf.len() >= self.capacity => {
                    self.buf.clear();
                    self.discarding = true;
                    out.push(FrameEvent::Overflow);
                }
                _ => self.buf.push(b),
            }
        }
        out
    }

    /// Bytes of the frame currently being assembled.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(events: Vec<FrameEvent>) -> Vec<String> {
        events
            .into_iter()
            .filter_map(|e| match e {
                FrameEvent::Frame(s) => Some(s),
                FrameEvent::Overflow => None,
            })
            .collect()
    }

    #[test]
    fn splits_on_every_delimiter() {
        let mut p = FrameParser::default();
        let out = frames(p.push(b"<reset><version:1.4>cm 40\r\nhello\n"));
        assert_eq!(out, vec!["reset", "version:1.4", "cm 40", "hello"]);
        assert_eq!(p.pending(), 0);
    }

    #[test]
    fn start_marker_discards_partial_frame() {
        let mut p = FrameParser::default();
        let out = frames(p.push(b"garb<cm 12>"));
        assert_eq!(out, vec!["cm 12"]);
    }

    #[test]
    fn stray_delimiters_emit_nothing() {
        let mut p = FrameParser::default();
        assert!(p.push(b">>\r\n\r\n<>").is_empty());
    }

    #[test]
    fn frames_survive_chunk_boundaries() {
        let mut p = FrameParser::default();
        assert!(frames(p.push(b"<vers")).is_empty());
        assert!(frames(p.push(b"ion:2")).is_empty());
        assert_eq!(frames(p.push(b".0>")), vec!["version:2.0"]);
    }

    #[test]
    fn overflow_drops_frame_and_recovers() {
        let mut p = FrameParser::new(4);
        let events = p.push(b"<abcdefgh><ok>");
        assert_eq!(events, vec![FrameEvent::Overflow, FrameEvent::Frame("ok".into())]);
    }

    #[test]
    fn full_capacity_frame_is_kept() {
        let mut p = FrameParser::new(4);
        assert_eq!(frames(p.push(b"abcd\n")), vec!["abcd"]);
    }

    #[test]
    fn non_utf8_bytes_degrade_instead_of_failing() {
        let mut p = FrameParser::default();
        let out = frames(p.push(&[b'<', 0xff, b'a', b'>']));
        assert_eq!(out.len(), 1);
        assert!(out[0].ends_with('a'));
    }
}
