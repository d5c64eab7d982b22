/// Resource limits to prevent abuse and keep evaluation predictable
///
/// These limits protect a shared server against hostile programs while being
/// generous enough for interactive use.
#[derive(Debug, Clone)]
pub struct ResourceLimits {
    /// Maximum program text size in bytes
    pub max_program_bytes: usize,

    /// Maximum number of input facts loaded into one context
    pub max_facts: usize,

    /// Maximum number of fixpoint iterations per stratum
    pub max_iterations: usize,

    /// Maximum number of conjunctive rules a single disjunctive body expands to
    pub max_disjuncts: usize,

    /// Maximum evaluation time in milliseconds
    pub max_evaluation_time_ms: u64,

    /// Maximum expression nesting depth, counting parentheses and operators
    pub max_expression_depth: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_program_bytes: 1024 * 1024, // 1 MB
            max_facts: 1_000_000,
            max_iterations: 10_000,
            max_disjuncts: 64,
            max_evaluation_time_ms: 5_000, // 5 seconds
            max_expression_depth: 100,
        }
    }
}

impl ResourceLimits {
    /// Create a new ResourceLimits with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_evaluation_time_ms(mut self, ms: u64) -> Self {
        self.max_evaluation_time_ms = ms;
        self
    }

    pub fn with_max_expression_depth(mut self, depth: usize) -> Self {
        self.max_expression_depth = depth;
        self
    }

    pub fn with_max_facts(mut self, max_facts: usize) -> Self {
        self.max_facts = max_facts;
        self
    }
}
