//! Output writers for search results.
//!
//! # Output Structure
//!
//! ```text
//! json_output_dir/
//! └── 2025-05-06/
//!     ├── rust.json
//!     └── climate-change.json
//! ```

pub mod json;
