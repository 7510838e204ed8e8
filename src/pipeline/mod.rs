//! Per-document pipeline stages.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own and the engine can be swapped without touching naming or packaging.
//!
//! ## Data Flow
//!
//! ```text
//! filename ──▶ sanitize ──▶ filter ──▶ engine ──▶ archive
//! (untrusted)  (safe name)  (skip?)   (pandoc)   (ZIP)
//! ```
//!
//! 1. [`sanitize`]: reduce a client filename to one safe path component
//! 2. [`filter`]: decide whether the upload is attempted at all
//! 3. [`engine`]: convert bytes to self-contained HTML in a private
//!    temp workspace; the only stage that spawns processes
//! 4. [`archive`]: pack successes into an in-memory ZIP

pub mod archive;
pub mod engine;
pub mod filter;
pub mod sanitize;
