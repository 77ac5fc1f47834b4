//! Core trait abstractions: LLM, document source, storage.

pub mod llm;
pub mod source;
pub mod store;
