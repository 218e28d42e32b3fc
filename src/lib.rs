//! Offline-first reading library: fetch web content, extract a readable
//! version, and keep it available locally and per signed-in account.

pub mod cache;
pub mod config;
pub mod entities;
pub mod extractor;
pub mod fetcher;
pub mod ingest;
pub mod sanitizer;
pub mod session;
pub mod store;
