/// Process exit codes, stable for scripting.
pub const SUCCESS: i32 = 0;
/// Unparseable or invalid saga definitions, or a bad payload.
pub const VALIDATION_FAILED: i32 = 2;
/// The saga ran and failed (after compensation).
pub const RUN_FAILED: i32 = 3;
/// I/O problems, unknown saga names, server errors.
pub const RUNTIME_ERROR: i32 = 4;
