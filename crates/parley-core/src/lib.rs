pub mod types;
pub mod chat;
pub mod attachment;
pub mod composer;
pub mod dictation;
pub mod lifecycle;
pub mod store;

pub use types::{
    Attachment,
    ChatSession,
    Feedback,
    GroundingChunk,
    GroundingMetadata,
    Message,
    MessageId,
    Role,
    SessionId,
    WebSource,
};

pub use chat::{ReplyChunk, StreamRequest};

pub use attachment::{encode_bytes, encode_file, AttachmentError};
pub use composer::{InputComposer, OutboundTurn};
pub use dictation::{
    select_capture, CommandCapture, DictationConfig, DictationError, DictationEvent, SpeechCapture,
    UnsupportedCapture,
};
pub use lifecycle::MessageStatus;
pub use store::{ConversationStore, StoreSnapshot};

/// Title given to a session before its first message.
pub const DEFAULT_SESSION_TITLE: &str = "New Chat";

/// Title given to a session whose first message carries no text.
pub const IMAGE_ONLY_TITLE: &str = "Image Query";

/// Maximum number of characters taken from the first message for a title.
pub const TITLE_MAX_CHARS: usize = 30;
