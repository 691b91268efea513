// LLM abstraction layer

pub mod provider;
pub mod fallback;
pub mod openai;
pub mod google;
pub mod groq;
pub mod ollama;

pub use fallback::*;
pub use provider::*;
