//! Pipeline stages and collaborators for batch conversion.
//!
//! Each submodule owns one concern, so backends can be tested with stub
//! collaborators and external tools swapped without touching the dispatcher.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ classify ──▶ scratch ──▶ office / html / image ──▶ merge
//! (path/URL)  (strategy)  (TempDir)   (per-item PDF bytes)     (lopdf)
//! ```
//!
//! 1. [`input`]: load a local path or download a URL into an item
//! 2. [`classify`]: extension to [`classify::ConversionStrategy`]
//! 3. [`scratch`]: private per-item working directory, sanitised filenames
//! 4. [`office`], [`html`], [`image`]: produce one PDF per item; external
//!    tools go through [`process`], which kills children on drop
//! 5. [`merge`]: concatenate the per-item PDFs in submission order;
//!    CPU-bound, runs in `spawn_blocking`

pub mod classify;
pub mod html;
pub mod image;
pub mod input;
pub mod merge;
pub mod office;
pub mod process;
pub mod scratch;
