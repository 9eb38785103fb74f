pub mod chat;
pub mod stdio;
