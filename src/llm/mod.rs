// LLM abstraction layer

pub mod groq;
pub mod openai;
pub mod provider;

pub use provider::*;
