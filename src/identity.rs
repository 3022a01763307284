//! Identity of the current process, used in lock requests and diagnostics.

/// Who is asking for a lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessIdentity {
    /// OS process id, sent with every request.
    pub pid: u32,

    /// Login name of the user running the process.
    pub user: String,

    /// Host the process runs on.
    pub host: String,
}

impl ProcessIdentity {
    /// Identity of the running process.
    pub fn current() -> Self {
        Self {
            pid: std::process::id(),
            user: current_user(),
            host: current_host(),
        }
    }

    /// Owner string for diagnostics (e.g., `user@HOST`).
    pub fn owner(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}

impl std::fmt::Display for ProcessIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (pid {})", self.owner(), self.pid)
    }
}

fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .ok()
        .filter(|user| !user.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

fn current_host() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}
