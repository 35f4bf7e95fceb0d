pub mod affiliation;
pub mod config;
pub mod process;
pub mod record;
pub mod sink;
pub mod tree;
pub mod xml;
