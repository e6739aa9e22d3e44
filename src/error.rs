//! Error taxonomy shared by every stage of a benchmark run.
//!
//! Only [`Error::Enumeration`] is fatal to a whole run.  The harness
//! turns the per-device variants into skipped devices or failed results
//! and carries on with the remaining implementations.

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No backend reported a usable adapter.
    #[error("device enumeration failed: {0}")]
    Enumeration(String),

    /// A logical device/queue could not be created for an adapter.
    #[error("failed to open {device}: {message}")]
    DeviceOpen { device: String, message: String },

    /// The kernel source did not validate for this device.  `log` holds
    /// the backend diagnostics.
    #[error("program `{program}` failed to build for {device}:\n{log}")]
    Compile {
        program: String,
        device: String,
        log: String,
    },

    #[error("entry point `{entry_point}` not found in program `{program}`")]
    SymbolNotFound { program: String, entry_point: String },

    /// Argument binding, pipeline creation or kernel enqueue failed.
    #[error("{operation} failed: {message}")]
    Dispatch {
        operation: &'static str,
        message: String,
    },

    /// Buffer allocation, upload or download failed.
    #[error("{operation} failed: {message}")]
    Transfer {
        operation: &'static str,
        message: String,
    },

    #[error("config error: {0}")]
    Config(String),

    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl Error {
    pub fn enumeration<S: Into<String>>(msg: S) -> Self {
        Error::Enumeration(msg.into())
    }

    pub fn dispatch<S: Into<String>>(operation: &'static str, msg: S) -> Self {
        Error::Dispatch {
            operation,
            message: msg.into(),
        }
    }

    pub fn transfer<S: Into<String>>(operation: &'static str, msg: S) -> Self {
        Error::Transfer {
            operation,
            message: msg.into(),
        }
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    /// Whether the failure only affects one device (or one iteration on
    /// it) rather than the whole run.
    pub fn is_device_local(&self) -> bool {
        !matches!(self, Error::Enumeration(_) | Error::Config(_) | Error::ThreadPool(_))
    }
}
