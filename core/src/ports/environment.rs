//! Environment variable access.

/// Read and write access to a set of environment variables.
///
/// The process environment is one implementation; tests and daemons that
/// replay a captured environment use an in-memory map.
pub trait Environment {
    fn var(&self, key: &str) -> Option<String>;

    fn set_var(&mut self, key: &str, value: &str);

    fn remove_var(&mut self, key: &str);
}
