//! Pipeline stages for a convert-validate-package run.
//!
//! Each submodule implements exactly one step; [`crate::convalidate`]
//! sequences them.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ workspace ──▶ convert (+ media) ──▶ validate ──▶ archive
//! (source)  (TempDir)     (engine, per format)  (schema)     (zip)
//! ```
//!
//! 1. [`input`]      check the source document and make its path absolute
//! 2. [`workspace`]  acquire the scratch directory that collects all outputs
//! 3. [`convert`]    one engine call per format; extracted media is moved
//!    into the workspace by [`media`]
//! 4. [`validate`]   check selected outputs against their registered schema
//! 5. [`archive`]    copy the source in and zip the workspace atomically

pub mod archive;
pub mod convert;
pub mod input;
pub mod media;
pub mod validate;
pub mod workspace;
