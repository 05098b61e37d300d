pub mod config;
pub mod credentials;
pub mod llm;
pub mod markdown;
pub mod providers;
