//! Virtual-machine configuration.

/// Runtime knobs, all off by default. Builder-style so embedders and the
/// CLI can chain what they need.
///
/// ```rust
/// use aria_runtime::VmConfig;
///
/// let config = VmConfig::new().with_stress_gc(true);
/// assert!(config.stress_gc);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct VmConfig {
    /// Disassemble each instruction as it executes, at `trace` level under
    /// the `aria::vm` target.
    pub trace_execution: bool,
    /// Disassemble every compiled function before running it.
    pub print_code: bool,
    /// Collect garbage at every allocation point. Slow; exists to surface
    /// rooting mistakes immediately instead of intermittently.
    pub stress_gc: bool,
}

impl VmConfig {
    pub fn new() -> VmConfig {
        VmConfig::default()
    }

    pub fn with_trace_execution(mut self, on: bool) -> VmConfig {
        self.trace_execution = on;
        self
    }

    pub fn with_print_code(mut self, on: bool) -> VmConfig {
        self.print_code = on;
        self
    }

    pub fn with_stress_gc(mut self, on: bool) -> VmConfig {
        self.stress_gc = on;
        self
    }
}
