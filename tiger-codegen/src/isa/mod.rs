//! Target-specific pieces of the backend.
//!
//! The only target is x86-64 System V (§1's non-goals exclude
//! cross-platform emission), so this module is a thin namespace around
//! [`x86`] rather than a dispatch point over multiple ISAs.

pub mod x86;
