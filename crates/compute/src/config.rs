use std::path::PathBuf;

use clap::{Arg, Command};
use tracing::warn;

use crate::DEFAULT_WORKER_COUNT;

/// Runtime configuration of the compute module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleConfig {
    /// FIFO carrying frames from the controller.
    pub in_pipe: PathBuf,
    /// FIFO carrying frames to the controller.
    pub out_pipe: PathBuf,
    /// Worker pool size, 1 to 8.
    pub workers: u8,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            in_pipe: PathBuf::from("/tmp/computational_module.in"),
            out_pipe: PathBuf::from("/tmp/computational_module.out"),
            workers: DEFAULT_WORKER_COUNT,
        }
    }
}

impl ModuleConfig {
    /// Parses positional arguments: `[in_pipe out_pipe [workers]]`.
    ///
    /// An out-of-range worker count falls back to the default with a
    /// warning rather than refusing to start.
    #[must_use]
    pub fn from_args<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let matches = Command::new("compute-module")
            .about("Escape-time compute module; talks to the controller over two named FIFOs")
            .arg(Arg::new("in_pipe").help("FIFO read by the module (controller to module)"))
            .arg(Arg::new("out_pipe").help("FIFO written by the module (module to controller)"))
            .arg(Arg::new("workers").help("worker pool size, 1 to 8 (default 2)"))
            .get_matches_from(args);

        let mut config = Self::default();
        if let (Some(in_pipe), Some(out_pipe)) = (
            matches.get_one::<String>("in_pipe"),
            matches.get_one::<String>("out_pipe"),
        ) {
            config.in_pipe = PathBuf::from(in_pipe);
            config.out_pipe = PathBuf::from(out_pipe);
        }
        if let Some(raw) = matches.get_one::<String>("workers") {
            match raw.parse::<u8>() {
                Ok(workers) if protocol::WORKER_COUNT_RANGE.contains(&workers) => {
                    config.workers = workers;
                }
                _ => warn!(
                    workers = raw.as_str(),
                    default = config.workers,
                    "invalid worker count; using default"
                ),
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::ModuleConfig;
    use std::path::PathBuf;

    #[test]
    fn no_arguments_yield_defaults() {
        let config = ModuleConfig::from_args(["compute-module"]);
        assert_eq!(config, ModuleConfig::default());
    }

    #[test]
    fn pipe_paths_are_taken_as_a_pair() {
        let config = ModuleConfig::from_args(["compute-module", "/tmp/a.in", "/tmp/a.out"]);
        assert_eq!(config.in_pipe, PathBuf::from("/tmp/a.in"));
        assert_eq!(config.out_pipe, PathBuf::from("/tmp/a.out"));
        assert_eq!(config.workers, 2);
    }

    #[test]
    fn worker_count_is_bounds_checked() {
        let config = ModuleConfig::from_args(["compute-module", "a", "b", "8"]);
        assert_eq!(config.workers, 8);

        for bad in ["0", "9", "200", "many"] {
            let config = ModuleConfig::from_args(["compute-module", "a", "b", bad]);
            assert_eq!(config.workers, 2, "argument {bad:?} must fall back");
        }
    }
}
