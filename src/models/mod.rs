//! Data models.

pub mod config;
pub mod message;
pub mod outcome;
pub mod plan;
pub mod table;
pub mod tree;
pub mod value;
