use serde::{Deserialize, Serialize};

/// Inline binary attachment (base64 payload plus its MIME type)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub mime_type: String,
    /// Base64 encoded bytes
    pub data: String,
}

impl Attachment {
    /// Create an attachment from an already encoded payload
    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Render as a `data:` URL
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    /// Check if this is an image attachment
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    /// Size of the decoded payload in bytes, computed from the base64 length
    pub fn decoded_len(&self) -> usize {
        let trimmed = self.data.trim_end_matches('=');
        let padding = self.data.len() - trimmed.len();
        ((self.data.len() / 4) * 3).saturating_sub(padding.min(2))
    }

    /// Short label used for thumbnails, e.g. `image/png · 12 KB`
    pub fn label(&self) -> String {
        let bytes = self.decoded_len();
        if bytes >= 1024 * 1024 {
            format!("{} · {:.1} MB", self.mime_type, bytes as f64 / (1024.0 * 1024.0))
        } else if bytes >= 1024 {
            format!("{} · {} KB", self.mime_type, bytes / 1024)
        } else {
            format!("{} · {} B", self.mime_type, bytes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_url() {
        let att = Attachment::new("image/png", "abc123");
        assert_eq!(att.data_url(), "data:image/png;base64,abc123");
        assert!(att.is_image());
    }

    #[test]
    fn test_decoded_len() {
        // "hello" -> aGVsbG8=
        assert_eq!(Attachment::new("text/plain", "aGVsbG8=").decoded_len(), 5);
        // "hi" -> aGk=
        assert_eq!(Attachment::new("text/plain", "aGk=").decoded_len(), 2);
        // "abc" -> YWJj
        assert_eq!(Attachment::new("text/plain", "YWJj").decoded_len(), 3);
        assert_eq!(Attachment::new("text/plain", "").decoded_len(), 0);
    }

    #[test]
    fn test_label() {
        let att = Attachment::new("image/jpeg", "YWJj");
        assert_eq!(att.label(), "image/jpeg · 3 B");
    }

    #[test]
    fn test_wire_shape() {
        let att = Attachment::new("image/png", "AAAA");
        let json = serde_json::to_value(&att).unwrap();
        assert_eq!(json, serde_json::json!({"mimeType": "image/png", "data": "AAAA"}));
    }
}
