pub mod chunk;
pub mod request;

pub use chunk::ReplyChunk;
pub use request::StreamRequest;
