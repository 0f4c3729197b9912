//! Interpreter options.
//!
//! Defaults can be overridden from the environment:
//! - `LOX_COLLECT_THRESHOLD` - completed calls between two environment
//!   collections (positive integer)

pub const COLLECT_THRESHOLD_VAR: &str = "LOX_COLLECT_THRESHOLD";

const DEFAULT_COLLECT_THRESHOLD: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// Write every parsed unit to the output sink before running it.
    pub dump_ast: bool,
    pub collect_threshold: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            dump_ast: false,
            collect_threshold: DEFAULT_COLLECT_THRESHOLD,
        }
    }
}

impl Options {
    pub fn from_env() -> Self {
        Self::default().with_threshold_var(std::env::var(COLLECT_THRESHOLD_VAR).ok().as_deref())
    }

    /// Applies a raw threshold value; malformed or zero values are ignored.
    fn with_threshold_var(mut self, raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().parse::<usize>()) {
            Some(Ok(threshold)) if threshold > 0 => self.collect_threshold = threshold,
            Some(_) => tracing::debug!(?raw, "ignoring malformed {COLLECT_THRESHOLD_VAR}"),
            None => {}
        }
        self
    }
}
