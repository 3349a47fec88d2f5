use std::io;

/// Maximum length of the command line, LF included (spec §4.1).
pub const MAX_COMMAND_LEN: usize = 256;
/// Maximum length of a single header line, LF included (spec §4.1).
pub const MAX_HEADER_LEN: usize = 8 * 1024;
/// Maximum body length read without a `content-length` header, or the
/// maximum value a `content-length` header may declare (spec §4.1).
pub const MAX_BODY_LEN: usize = 1024 * 1024;

/// A decoded STOMP-like frame: a command line, `Key:Value` headers, and an
/// optional body (spec §4.1).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub command: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Frame {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn header_u32(&self, key: &str) -> Option<u32> {
        self.header(key)?.parse().ok()
    }

    pub fn header_bool(&self, key: &str) -> Option<bool> {
        match self.header(key)? {
            "1" | "true" => Some(true),
            "0" | "false" => Some(false),
            _ => None,
        }
    }

    /// Write this frame to `out` in wire format. `content-length` is
    /// emitted automatically when a body is present, per spec §4.1.
    pub fn write_to<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_all(self.command.as_bytes())?;
        out.write_all(b"\n")?;
        for (k, v) in &self.headers {
            out.write_all(k.as_bytes())?;
            out.write_all(b":")?;
            out.write_all(v.as_bytes())?;
            out.write_all(b"\n")?;
        }
        if !self.body.is_empty() {
            out.write_all(format!("content-length:{}\n", self.body.len()).as_bytes())?;
        }
        out.write_all(b"\n")?;
        if !self.body.is_empty() {
            out.write_all(&self.body)?;
        }
        out.write_all(b"\0")?;
        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.write_to(&mut buf).expect("writing to a Vec never fails");
        buf
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ParserState {
    RecvCmd,
    RecvHdr,
    RecvBody,
    Error,
}

/// Outcome of feeding bytes to the [`FrameDecoder`].
#[derive(Debug)]
pub enum DecodeEvent {
    /// A complete frame was decoded.
    Frame(Frame),
    /// The parser hit an invalid-frame condition and has resynchronized
    /// on the next NUL terminator (spec §4.1 "On Error").
    Invalid,
}

/// Streaming decoder implementing the frame grammar and state machine
/// from spec §4.1. Feed it arbitrary byte chunks (as they arrive on a
/// stdin/stdout pipe) and drain complete frames / invalid-frame signals.
#[derive(Debug)]
pub struct FrameDecoder {
    state: ParserState,
    buf: Vec<u8>,
    scan_from: usize,
    pending_command: Option<String>,
    pending_headers: Vec<(String, String)>,
    pending_body_len: Option<usize>,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            state: ParserState::RecvCmd,
            buf: Vec::new(),
            scan_from: 0,
            pending_command: None,
            pending_headers: Vec::new(),
            pending_body_len: None,
        }
    }

    /// Append newly-received bytes and decode as many frames as possible.
    pub fn feed(&mut self, data: &[u8]) -> Vec<DecodeEvent> {
        self.buf.extend_from_slice(data);
        let mut events = Vec::new();
        loop {
            match self.step() {
                Some(event) => events.push(event),
                None => break,
            }
        }
        events
    }

    fn step(&mut self) -> Option<DecodeEvent> {
        match self.state {
            ParserState::RecvCmd => self.step_cmd(),
            ParserState::RecvHdr => self.step_hdr(),
            ParserState::RecvBody => self.step_body(),
            ParserState::Error => self.step_error(),
        }
    }

    /// Find the next occurrence of `byte` in the unconsumed part of the
    /// buffer, advancing `scan_from` as we go so repeated calls do not
    /// rescan already-checked bytes.
    fn find(&mut self, byte: u8) -> Option<usize> {
        let pos = self.buf[self.scan_from..].iter().position(|&b| b == byte);
        pos.map(|p| self.scan_from + p)
    }

    fn consume(&mut self, upto: usize) {
        self.buf.drain(..upto);
        self.scan_from = 0;
    }

    fn step_cmd(&mut self) -> Option<DecodeEvent> {
        loop {
            let nl = self.find(b'\n')?;
            if nl == 0 {
                // A leading empty line before a command: ignore it.
                self.consume(1);
                continue;
            }
            if nl + 1 > MAX_COMMAND_LEN {
                self.consume(nl + 1);
                self.state = ParserState::Error;
                return Some(DecodeEvent::Invalid);
            }
            let command = String::from_utf8_lossy(&self.buf[..nl]).into_owned();
            self.consume(nl + 1);
            self.pending_command = Some(command);
            self.pending_headers.clear();
            self.pending_body_len = None;
            self.state = ParserState::RecvHdr;
            return None;
        }
    }

    fn step_hdr(&mut self) -> Option<DecodeEvent> {
        let nl = self.find(b'\n')?;
        if nl + 1 > MAX_HEADER_LEN {
            self.consume(nl + 1);
            self.state = ParserState::Error;
            return Some(DecodeEvent::Invalid);
        }
        if nl == 0 {
            // Blank line: header section finished.
            self.consume(1);
            self.pending_body_len = self
                .pending_headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
                .map(|(_, v)| v.parse::<i64>());
            match self.pending_body_len {
                Some(Ok(len)) if (0..=MAX_BODY_LEN as i64).contains(&len) => {
                    self.pending_body_len = Some(len as usize);
                }
                Some(_) => {
                    self.state = ParserState::Error;
                    return Some(DecodeEvent::Invalid);
                }
                None => self.pending_body_len = None,
            }
            self.state = ParserState::RecvBody;
            return None;
        }
        let line = self.buf[..nl].to_vec();
        self.consume(nl + 1);
        let Some(colon) = line.iter().position(|&b| b == b':') else {
            self.state = ParserState::Error;
            return Some(DecodeEvent::Invalid);
        };
        let key = String::from_utf8_lossy(&line[..colon]).into_owned();
        let value = String::from_utf8_lossy(&line[colon + 1..]).into_owned();
        self.pending_headers.push((key, value));
        None
    }

    fn step_body(&mut self) -> Option<DecodeEvent> {
        match self.pending_body_len {
            Some(len) => {
                if self.buf.len() < len + 1 {
                    return None;
                }
                if self.buf[len] != 0 {
                    self.state = ParserState::Error;
                    self.consume(len);
                    return Some(DecodeEvent::Invalid);
                }
                let body = self.buf[..len].to_vec();
                self.consume(len + 1);
                self.finish_frame(body)
            }
            None => {
                let nul = self.find(0)?;
                if nul >= MAX_BODY_LEN {
                    self.consume(nul + 1);
                    self.state = ParserState::Error;
                    return Some(DecodeEvent::Invalid);
                }
                let body = self.buf[..nul].to_vec();
                self.consume(nul + 1);
                self.finish_frame(body)
            }
        }
    }

    fn finish_frame(&mut self, body: Vec<u8>) -> Option<DecodeEvent> {
        let command = self.pending_command.take().expect("command set before body");
        let headers = std::mem::take(&mut self.pending_headers);
        self.state = ParserState::RecvCmd;
        Some(DecodeEvent::Frame(Frame {
            command,
            headers,
            body,
        }))
    }

    fn step_error(&mut self) -> Option<DecodeEvent> {
        let nul = self.find(0)?;
        self.consume(nul + 1);
        self.state = ParserState::RecvCmd;
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(input: &[u8]) -> Vec<DecodeEvent> {
        let mut decoder = FrameDecoder::new();
        decoder.feed(input)
    }

    #[test]
    fn round_trips_a_simple_frame() {
        let frame = Frame::new("ProvideMessage")
            .with_header("requestCode", "600")
            .with_header("requestId", "1");
        let bytes = frame.to_bytes();

        let events = decode_all(&bytes);
        assert_eq!(events.len(), 1);
        match &events[0] {
            DecodeEvent::Frame(decoded) => assert_eq!(decoded, &frame),
            DecodeEvent::Invalid => panic!("expected a frame"),
        }
    }

    #[test]
    fn round_trips_a_frame_with_body() {
        let frame = Frame::new("ProvideMessage").with_body(b"hello world".to_vec());
        let bytes = frame.to_bytes();
        let events = decode_all(&bytes);
        match &events[0] {
            DecodeEvent::Frame(decoded) => assert_eq!(decoded.body, b"hello world"),
            DecodeEvent::Invalid => panic!("expected a frame"),
        }
    }

    #[test]
    fn leading_empty_lines_are_ignored() {
        let frame = Frame::new("ProvideMessage");
        let mut bytes = b"\n\n".to_vec();
        bytes.extend(frame.to_bytes());
        let events = decode_all(&bytes);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], DecodeEvent::Frame(_)));
    }

    #[test]
    fn command_line_at_the_limit_parses() {
        let command = "C".repeat(MAX_COMMAND_LEN - 1);
        let frame = Frame::new(command);
        let bytes = frame.to_bytes();
        let events = decode_all(&bytes);
        assert!(matches!(events[0], DecodeEvent::Frame(_)));
    }

    #[test]
    fn command_line_over_the_limit_is_invalid() {
        let command = "C".repeat(MAX_COMMAND_LEN);
        let frame = Frame::new(command);
        let bytes = frame.to_bytes();
        let events = decode_all(&bytes);
        assert!(matches!(events[0], DecodeEvent::Invalid));
    }

    #[test]
    fn header_line_at_the_limit_parses() {
        let value = "v".repeat(MAX_HEADER_LEN - "k:\n".len());
        let frame = Frame::new("Cmd").with_header("k", value);
        let bytes = frame.to_bytes();
        let events = decode_all(&bytes);
        assert!(matches!(events[0], DecodeEvent::Frame(_)));
    }

    #[test]
    fn header_line_over_the_limit_is_invalid() {
        let value = "v".repeat(MAX_HEADER_LEN);
        let frame = Frame::new("Cmd").with_header("k", value);
        let bytes = frame.to_bytes();
        let events = decode_all(&bytes);
        assert!(matches!(events[0], DecodeEvent::Invalid));
    }

    #[test]
    fn malformed_header_without_colon_is_invalid() {
        let mut bytes = b"Cmd\n".to_vec();
        bytes.extend_from_slice(b"no-colon-here\n");
        bytes.extend_from_slice(b"\n\0");
        let events = decode_all(&bytes);
        assert!(matches!(events[0], DecodeEvent::Invalid));
    }

    #[test]
    fn unterminated_body_past_the_cap_is_invalid() {
        let mut bytes = b"Cmd\n\n".to_vec();
        bytes.extend(std::iter::repeat(b'x').take(MAX_BODY_LEN + 1));
        bytes.push(0);
        let events = decode_all(&bytes);
        assert!(matches!(events[0], DecodeEvent::Invalid));
    }

    #[test]
    fn invalid_content_length_is_invalid() {
        let mut bytes = b"Cmd\n".to_vec();
        bytes.extend_from_slice(b"content-length:-1\n\n\0");
        let events = decode_all(&bytes);
        assert!(matches!(events[0], DecodeEvent::Invalid));
    }

    #[test]
    fn zero_content_length_is_an_empty_body() {
        let mut bytes = b"Cmd\n".to_vec();
        bytes.extend_from_slice(b"content-length:0\n\n\0");
        let events = decode_all(&bytes);
        match &events[0] {
            DecodeEvent::Frame(f) => assert!(f.body.is_empty()),
            DecodeEvent::Invalid => panic!("expected a frame"),
        }
    }

    #[test]
    fn resynchronizes_after_an_error() {
        let mut bytes = b"Cmd\n".to_vec();
        bytes.extend_from_slice(b"no-colon\n\n\0");
        let good = Frame::new("ProvideMessage").with_header("requestId", "7");
        bytes.extend(good.to_bytes());

        let events = decode_all(&bytes);
        assert!(matches!(events[0], DecodeEvent::Invalid));
        match &events[1] {
            DecodeEvent::Frame(f) => assert_eq!(f, &good),
            DecodeEvent::Invalid => panic!("expected recovery"),
        }
    }

    #[test]
    fn feeds_incrementally_across_chunk_boundaries() {
        let frame = Frame::new("ProvideMessage").with_header("requestId", "3");
        let bytes = frame.to_bytes();
        let mut decoder = FrameDecoder::new();
        let mut events = Vec::new();
        for chunk in bytes.chunks(3) {
            events.extend(decoder.feed(chunk));
        }
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], DecodeEvent::Frame(_)));
    }
}
