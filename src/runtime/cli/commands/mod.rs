pub mod chat;
pub mod generate;
pub mod keys;
pub mod models;
pub mod shared;
