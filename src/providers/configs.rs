pub mod base;
pub mod groq;
pub mod openai;
