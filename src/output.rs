/// Abstraction over user-facing output.
///
/// Command modules use this trait instead of `println!`/`eprintln!` so that
/// output can be captured in tests or redirected later.
pub trait UserOutput: Send + Sync {
    /// Informational message (e.g., a status table line)
    fn status(&self, message: &str);

    /// Success message (e.g., "Service sshd started")
    fn success(&self, message: &str);

    /// Warning message
    fn warning(&self, message: &str);
}

/// Standard CLI output: stdout for results, stderr for problems.
pub struct CliOutput;

impl UserOutput for CliOutput {
    fn status(&self, message: &str) {
        println!("{}", message);
    }

    fn success(&self, message: &str) {
        println!("{}", message);
    }

    fn warning(&self, message: &str) {
        eprintln!("{}", message);
    }
}
