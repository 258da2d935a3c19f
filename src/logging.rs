//! Logging setup — a thin `env_logger` init, matching the teacher's own
//! use of `log` rather than a tracing-subscriber stack.

/// Initialize the global logger. Safe to call more than once; later calls
/// are no-ops. Level defaults to `info` and is overridable via `RUST_LOG`.
pub fn init() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
