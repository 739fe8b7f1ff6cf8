// LLM abstraction layer

pub mod provider;
pub mod openai;
pub mod google;

#[cfg(test)]
pub mod mock;

pub use provider::*;
