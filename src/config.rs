/// Shallow enough that a 2 MiB thread stack holds it in debug builds.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 128;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Config {
    /// `None` leaves recursion bounded only by the host stack.
    pub max_call_depth: Option<usize>,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            max_call_depth: Some(DEFAULT_MAX_CALL_DEPTH),
        }
    }
}

impl Config {
    /// A depth of zero disables the limit.
    pub fn with_max_call_depth(depth: usize) -> Config {
        Config {
            max_call_depth: if depth == 0 { None } else { Some(depth) },
        }
    }
}
