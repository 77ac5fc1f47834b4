//! Typed data model for the curation pipeline.

pub mod config;
pub mod decision;
pub mod dimensions;
pub mod entity;
pub mod evidence;
pub mod finding;
