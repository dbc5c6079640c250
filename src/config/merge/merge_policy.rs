//! Merge rules: defaults, override order, conflict handling.
//!
//! Later sources override earlier ones: defaults, then the global file, then
//! an explicit file, then the environment.

use config::builder::DefaultState;
use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("accounting.backend_type", "jobacct/none")?
        .set_default("accounting.plugin_dir", "/usr/local/lib/jobacct")?
        .set_default("accounting.discovery", "static")?
        .set_default("accounting.poll_frequency", 30)?
        .set_default("accounting.slow_call_limit_us", 3_000_000)?
        .set_default("accounting.slow_call_debug_us", 1_000_000)
}
