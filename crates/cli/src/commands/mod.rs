pub mod abilities;
pub mod chat;
pub mod config_cmd;
