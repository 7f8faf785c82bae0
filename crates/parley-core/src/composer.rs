//! Draft state for the next user turn.

use std::path::Path;
use tracing::{debug, info};

use crate::attachment::{encode_file, AttachmentError};
use crate::dictation::{DictationError, DictationEvent, SpeechCapture};
use crate::types::Attachment;

/// What the composer hands over when a draft is sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundTurn {
    pub text: String,
    pub attachments: Vec<Attachment>,
    pub use_search: bool,
}

impl OutboundTurn {
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachments: Vec::new(),
            use_search: false,
        }
    }
}

/// Draft text, pending attachments and the per-send toggles
#[derive(Debug, Clone, Default)]
pub struct InputComposer {
    text: String,
    attachments: Vec<Attachment>,
    use_search: bool,
    listening: bool,
}

impl InputComposer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search(mut self, use_search: bool) -> Self {
        self.use_search = use_search;
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn use_search(&self) -> bool {
        self.use_search
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    /// True when there is nothing to send
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.attachments.is_empty()
    }

    pub fn push_char(&mut self, c: char) {
        self.text.push(c);
    }

    pub fn pop_char(&mut self) -> Option<char> {
        self.text.pop()
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn clear_text(&mut self) {
        self.text.clear();
    }

    pub fn toggle_search(&mut self) -> bool {
        self.use_search = !self.use_search;
        debug!(use_search = self.use_search, "Search grounding toggled");
        self.use_search
    }

    /// Encode a file and append it to the pending attachments
    pub async fn add_attachment(&mut self, path: impl AsRef<Path>) -> Result<(), AttachmentError> {
        let attachment = encode_file(path).await?;
        self.push_attachment(attachment);
        Ok(())
    }

    pub fn push_attachment(&mut self, attachment: Attachment) {
        self.attachments.push(attachment);
    }

    /// Remove the attachment at `index`; out of range is ignored
    pub fn remove_attachment(&mut self, index: usize) -> Option<Attachment> {
        if index < self.attachments.len() {
            Some(self.attachments.remove(index))
        } else {
            None
        }
    }

    /// Take the draft for sending.
    ///
    /// Returns `None` while a reply is in flight or when the draft holds
    /// neither text nor attachments. On success the text and attachments are
    /// cleared; the search and listening flags carry over.
    pub fn submit(&mut self, reply_in_flight: bool) -> Option<OutboundTurn> {
        if reply_in_flight || self.is_empty() {
            return None;
        }

        let turn = OutboundTurn {
            text: std::mem::take(&mut self.text),
            attachments: std::mem::take(&mut self.attachments),
            use_search: self.use_search,
        };
        info!(
            chars = turn.text.chars().count(),
            attachments = turn.attachments.len(),
            use_search = turn.use_search,
            "Draft submitted"
        );
        Some(turn)
    }

    /// Start or stop dictation on the given backend
    pub fn toggle_listening(&mut self, capture: &mut dyn SpeechCapture) -> Result<bool, DictationError> {
        if capture.is_listening() {
            capture.stop()?;
            self.listening = false;
        } else {
            capture.start()?;
            self.listening = true;
        }
        Ok(self.listening)
    }

    pub fn apply_dictation(&mut self, event: DictationEvent) {
        match event {
            DictationEvent::Started => self.listening = true,
            DictationEvent::Stopped | DictationEvent::Error(_) => self.listening = false,
            DictationEvent::Transcript(transcript) => {
                let transcript = transcript.trim();
                if transcript.is_empty() {
                    return;
                }
                if !self.text.is_empty() {
                    self.text.push(' ');
                }
                self.text.push_str(transcript);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachment::encode_bytes;
    use crate::dictation::UnsupportedCapture;

    #[derive(Default)]
    struct FakeCapture {
        listening: bool,
        starts: usize,
    }

    impl SpeechCapture for FakeCapture {
        fn is_supported(&self) -> bool {
            true
        }

        fn start(&mut self) -> Result<(), DictationError> {
            self.listening = true;
            self.starts += 1;
            Ok(())
        }

        fn stop(&mut self) -> Result<(), DictationError> {
            self.listening = false;
            Ok(())
        }

        fn is_listening(&self) -> bool {
            self.listening
        }
    }

    #[test]
    fn test_submit_blank_is_noop() {
        let mut composer = InputComposer::new();
        composer.set_text("   ");
        assert!(composer.submit(false).is_none());
        assert_eq!(composer.text(), "   ");
    }

    #[test]
    fn test_submit_blocked_while_in_flight() {
        let mut composer = InputComposer::new();
        composer.set_text("hello");
        assert!(composer.submit(true).is_none());
        assert_eq!(composer.text(), "hello");
    }

    #[test]
    fn test_submit_clears_draft_keeps_flags() {
        let mut composer = InputComposer::new().with_search(true);
        composer.set_text("what's new");
        composer.push_attachment(encode_bytes(b"a", "image/png"));

        let turn = composer.submit(false).unwrap();
        assert_eq!(turn.text, "what's new");
        assert_eq!(turn.attachments.len(), 1);
        assert!(turn.use_search);

        assert_eq!(composer.text(), "");
        assert!(composer.attachments().is_empty());
        assert!(composer.use_search());
    }

    #[test]
    fn test_attachment_only_submit() {
        let mut composer = InputComposer::new();
        composer.push_attachment(encode_bytes(b"img", "image/jpeg"));
        let turn = composer.submit(false).unwrap();
        assert_eq!(turn.text, "");
        assert_eq!(turn.attachments[0].mime_type, "image/jpeg");
    }

    #[test]
    fn test_attachment_order_and_removal() {
        let mut composer = InputComposer::new();
        composer.push_attachment(encode_bytes(b"1", "image/png"));
        composer.push_attachment(encode_bytes(b"2", "image/gif"));
        composer.push_attachment(encode_bytes(b"3", "image/webp"));

        assert!(composer.remove_attachment(7).is_none());
        assert_eq!(composer.attachments().len(), 3);

        let removed = composer.remove_attachment(1).unwrap();
        assert_eq!(removed.mime_type, "image/gif");
        let mimes: Vec<_> = composer.attachments().iter().map(|a| a.mime_type.as_str()).collect();
        assert_eq!(mimes, vec!["image/png", "image/webp"]);
    }

    #[tokio::test]
    async fn test_add_attachment_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("cat.jpg");
        std::fs::write(&path, b"jpeg").unwrap();

        let mut composer = InputComposer::new();
        composer.add_attachment(&path).await.unwrap();
        assert_eq!(composer.attachments()[0].mime_type, "image/jpeg");

        assert!(composer.add_attachment(dir.path().join("cat.txt")).await.is_err());
        assert_eq!(composer.attachments().len(), 1);
    }

    #[test]
    fn test_toggle_search() {
        let mut composer = InputComposer::new();
        assert!(composer.toggle_search());
        assert!(!composer.toggle_search());
    }

    #[test]
    fn test_dictation_appends_with_space() {
        let mut composer = InputComposer::new();
        composer.apply_dictation(DictationEvent::Transcript("hello".into()));
        assert_eq!(composer.text(), "hello");
        composer.apply_dictation(DictationEvent::Transcript(" world ".into()));
        assert_eq!(composer.text(), "hello world");
        composer.apply_dictation(DictationEvent::Transcript("  ".into()));
        assert_eq!(composer.text(), "hello world");
    }

    #[test]
    fn test_dictation_listening_flag() {
        let mut composer = InputComposer::new();
        composer.apply_dictation(DictationEvent::Started);
        assert!(composer.is_listening());
        composer.apply_dictation(DictationEvent::Error("mic busy".into()));
        assert!(!composer.is_listening());
        assert_eq!(composer.text(), "");
    }

    #[test]
    fn test_toggle_listening() {
        let mut composer = InputComposer::new();
        let mut capture = FakeCapture::default();

        assert!(composer.toggle_listening(&mut capture).unwrap());
        assert!(capture.is_listening());
        assert!(!composer.toggle_listening(&mut capture).unwrap());
        assert!(!capture.is_listening());
        assert_eq!(capture.starts, 1);
    }

    #[test]
    fn test_toggle_listening_unsupported() {
        let mut composer = InputComposer::new();
        composer.set_text("draft");
        let err = composer.toggle_listening(&mut UnsupportedCapture).unwrap_err();
        assert!(matches!(err, DictationError::Unsupported));
        assert!(!composer.is_listening());
        assert_eq!(composer.text(), "draft");
    }
}
