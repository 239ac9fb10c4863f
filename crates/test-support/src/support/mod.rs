pub mod cli;
pub mod library;
