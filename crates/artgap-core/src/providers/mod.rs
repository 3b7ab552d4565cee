pub mod llm;
pub mod network;
