//! # Lamina Core
//!
//! Core types for the Lamina middleware kernel.
//!
//! This crate provides the foundational types shared by every Lamina crate:
//!
//! - [`Request`] / [`Response`] - the HTTP types threaded through every chain
//! - [`ResponseExt`] - helpers for building plain and JSON responses
//! - [`KernelError`] - the kernel's error taxonomy
//! - [`ConstructionArgs`] - keyword-style arguments for deferred construction

#![doc(html_root_url = "https://docs.rs/lamina-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod args;
mod error;
mod types;

pub use args::ConstructionArgs;
pub use error::{ImportErrorKind, KernelError, KernelResult};
pub use types::{Request, Response, ResponseExt};
