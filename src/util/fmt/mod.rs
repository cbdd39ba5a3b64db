//! Human-readable renderings of compiler data structures.

/// Line-oriented IR dump, used by `--ir` and by the tests.
pub mod ir;
