//! Arca partner tools
//!
//! Small command-line utilities depositor institutions run against
//! their own buckets: delete objects, check on a key, list a bucket.
//!
//! Exit codes follow the documented partner-tool contract:
//!
//! | code | meaning |
//! |------|---------|
//! | 0    | success |
//! | 1    | runtime, network, or server error |
//! | 3    | usage error (bad or missing params) |
//! | 4    | file or key does not exist |
//! | 100  | printed help or version; nothing attempted |

pub mod commands;
pub mod options;

/// Program completed successfully.
pub const EXIT_OK: i32 = 0;
/// Runtime, network, or server error.
pub const EXIT_RUNTIME_ERR: i32 = 1;
/// Usage error: missing or invalid parameters.
pub const EXIT_USER_ERR: i32 = 3;
/// The named file or key does not exist.
pub const EXIT_ITEM_NOT_FOUND: i32 = 4;
/// Printed help or version; no other operation attempted.
pub const EXIT_NO_OP: i32 = 100;
