use std::fmt;

/// Process exit codes shared by both binaries.
///
/// The non-zero values are stable so wrapper scripts can distinguish a
/// missing FIFO from a resource failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ExitCode {
    /// Successful completion.
    Ok = 0,

    /// A named pipe could not be opened at startup.
    OpeningPipe = 100,

    /// A required thread could not be spawned.
    CreatingThreads = 101,

    /// A required buffer could not be allocated.
    Allocation = 102,
}

impl ExitCode {
    /// Returns the numeric exit status.
    #[inline]
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// Returns a short description for diagnostics.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Ok => "success",
            Self::OpeningPipe => "cannot open named pipe",
            Self::CreatingThreads => "cannot create threads",
            Self::Allocation => "allocation failure",
        }
    }

    /// Terminates the process with this status.
    pub fn exit(self) -> ! {
        std::process::exit(self.as_i32())
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_i32(), self.description())
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        Self::from(code.as_i32() as u8)
    }
}
