//! # Storage
//!
//! Disk-backed knowledge base built on redb.

mod redb_kb;

pub use redb_kb::RedbKnowledgeBase;
