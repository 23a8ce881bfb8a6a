pub mod conversation_store;
pub mod orchestrator;
