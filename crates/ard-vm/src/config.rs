//! Resource limits for a VM instance.

/// Limits enforced by every machine, including the ones running fibers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmConfig {
    /// Maximum operand stack values held by a single frame.
    pub max_stack_depth: usize,
    /// Maximum number of nested call frames.
    pub max_call_depth: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_stack_depth: 1024,
            max_call_depth: 512,
        }
    }
}
