//! Location resolution and navigation for markdown documents.
//!
//! Typed input, links, and forge shorthand are classified into an
//! [`types::Address`], turned into a concrete [`types::ResolvedLocation`],
//! fetched, and parsed into a [`document::Document`] with an anchor index
//! and heading tree. A [`session::Session`] ties this to back/forward
//! history and bookmarks that outlive the process.

pub mod address;
pub mod bookmarks;
pub mod browse;
pub mod commands;
pub mod config;
pub mod diagnostics;
pub mod document;
pub mod error;
pub mod fetch;
pub mod forge;
pub mod history;
pub mod info;
pub mod loader;
pub mod local;
pub mod session;
pub mod store;
#[cfg(test)]
mod test_utils;
pub mod types;
