//! Command-line arguments.

use std::path::PathBuf;

use crate::error::EngineError;

/// Printed with every usage error and for `--help`.
pub const USAGE: &str = "\
usage: starloom [options]

  --resources <dir>   base resource directory (overrides the config file)
  --config <dir>      configuration directory (default: current directory)
  --load <save>       load a saved game
  --test <name>       run a data-driven test and exit
  --debug             log at debug level unless RUST_LOG says otherwise
  --help              show this message";

/// Parsed command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Args {
    /// `--resources <dir>`.
    pub resources: Option<PathBuf>,
    /// `--config <dir>`.
    pub config: Option<PathBuf>,
    /// `--load <save>`.
    pub load: Option<PathBuf>,
    /// `--test <name>`.
    pub test: Option<String>,
    /// `--debug`.
    pub debug: bool,
    /// `--help`.
    pub help: bool,
}

impl Args {
    /// Parse arguments, not including the program name.
    pub fn parse<I>(args: I) -> Result<Self, EngineError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut parsed = Self::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            let mut value = |flag: &str| {
                args.next().ok_or_else(|| EngineError::Usage {
                    message: format!("{flag} needs a value"),
                })
            };
            match arg.as_str() {
                "--resources" | "-r" => parsed.resources = Some(PathBuf::from(value(&arg)?)),
                "--config" | "-c" => parsed.config = Some(PathBuf::from(value(&arg)?)),
                "--load" | "-l" => parsed.load = Some(PathBuf::from(value(&arg)?)),
                "--test" | "-t" => parsed.test = Some(value(&arg)?),
                "--debug" | "-d" => parsed.debug = true,
                "--help" | "-h" => parsed.help = true,
                other => {
                    return Err(EngineError::Usage {
                        message: format!("unknown argument: {other}"),
                    });
                }
            }
        }
        Ok(parsed)
    }
}
