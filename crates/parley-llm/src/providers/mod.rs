pub mod gemini;

pub use gemini::{GeminiProvider, MISSING_API_KEY_MESSAGE};
