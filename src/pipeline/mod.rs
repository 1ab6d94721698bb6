//! File-handling stages behind an unlock attempt.
//!
//! ## Data Flow
//!
//! ```text
//! download ──▶ files::store_inbound ──▶ decrypt::unlock ──▶ send ──▶ files::delete
//! (transport)   (inbound/<uuid>-x.pdf)   (qpdf → outbound/)  (transport)  (both paths)
//! ```
//!
//! 1. [`files`]: uniquely named scratch files, idempotent deletion and
//!    the startup sweep for orphans left by a crash
//! 2. [`decrypt`]: the [`decrypt::Decryptor`] seam and its `qpdf`
//!    implementation, bounded by a timeout
//!
//! The controller owns the ordering and the cleanup on every exit path;
//! the stages themselves keep no state.

pub mod decrypt;
pub mod files;
