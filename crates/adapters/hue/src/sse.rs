//! Server-sent event framing.
//!
//! Bytes arrive in arbitrary chunks. Lines are split on `\n` (a trailing
//! `\r` is dropped), `data:` lines accumulate, and a blank line completes
//! an event. Comments and other fields are skipped.

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    /// Feed a chunk and return the payloads of every event it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(end) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=end).collect();
            let line = String::from_utf8_lossy(&line[..end]);
            let line = line.strip_suffix('\r').unwrap_or(&line);
            if let Some(event) = self.feed_line(line) {
                events.push(event);
            }
        }
        events
    }

    fn feed_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            if self.data.is_empty() {
                return None;
            }
            let data = std::mem::take(&mut self.data);
            return Some(data.join("\n"));
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        if field == "data" {
            let value = value.strip_prefix(' ').unwrap_or(value);
            self.data.push(value.to_string());
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_emit_payload_when_event_completes() {
        let mut decoder = SseDecoder::default();

        let events = decoder.push(b"id: 1:0\ndata: [{\"type\":\"update\"}]\n\n");

        assert_eq!(events, vec![r#"[{"type":"update"}]"#.to_string()]);
    }

    #[test]
    fn should_join_event_split_across_chunks() {
        let mut decoder = SseDecoder::default();

        assert!(decoder.push(b"data: [{\"ty").is_empty());
        assert!(decoder.push(b"pe\":\"update\"}]\n").is_empty());
        let events = decoder.push(b"\n");

        assert_eq!(events, vec![r#"[{"type":"update"}]"#.to_string()]);
    }

    #[test]
    fn should_join_multiple_data_lines_with_newline() {
        let mut decoder = SseDecoder::default();

        let events = decoder.push(b"data: first\r\ndata:second\r\n\r\n");

        assert_eq!(events, vec!["first\nsecond".to_string()]);
    }

    #[test]
    fn should_skip_comments_and_empty_events() {
        let mut decoder = SseDecoder::default();

        let events = decoder.push(b": hi\n\nretry: 1000\n\ndata: a\n\ndata: b\n\n");

        assert_eq!(events, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn should_keep_multibyte_characters_split_across_chunks() {
        let mut decoder = SseDecoder::default();
        let bytes = "data: café\n\n".as_bytes();
        let split = bytes.len() - 3;

        assert!(decoder.push(&bytes[..split]).is_empty());
        let events = decoder.push(&bytes[split..]);

        assert_eq!(events, vec!["café".to_string()]);
    }
}
