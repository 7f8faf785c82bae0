pub mod content;
pub mod grounding;
pub mod ids;
pub mod message;
pub mod session;

pub use content::Attachment;
pub use grounding::{GroundingChunk, GroundingMetadata, WebSource};
pub use ids::{MessageId, SessionId};
pub use message::{Feedback, Message, Role};
pub use session::ChatSession;
