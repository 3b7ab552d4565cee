//! Process exit codes. Part of the public contract for scripts driving `artgap`.

pub const SUCCESS: i32 = 0; // Every rule produced a verdict
pub const RULE_FAILED: i32 = 1; // At least one rule ended in an error
pub const CONFIG_ERROR: i32 = 2; // Bad config, missing input or usage error
