pub mod commands;
pub mod history;
