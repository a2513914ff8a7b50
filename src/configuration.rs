//! Command-line configuration for the ping client and server.
//!
//! Both binaries parse with clap and then run `validate()`. Any problem,
//! including `-h`, an unknown option or a missing prefix, ends in the usage
//! text on standard error and exit status 1.

use std::{fmt::Display, net::SocketAddr, path::PathBuf, time::Duration};

use clap::{error::ErrorKind, ArgAction, CommandFactory, Parser};
use thiserror::Error;

use crate::{
    crypto::{load_hmac_key, HmacError, HmacKey},
    name::{Name, NameError},
    stats::OutputFormat,
};

/// Shortest accepted interval between probes, in seconds.
pub const MIN_INTERVAL_SECS: f64 = 0.1;

/// Freshness hint used by the server when `-x` is not given, in seconds.
pub const DEFAULT_FRESHNESS_SECS: i64 = 1;

#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("missing name prefix")]
    MissingPrefix,

    #[error("bad name prefix: {0}")]
    InvalidPrefix(#[from] NameError),

    #[error("interval must be at least 0.1 seconds (got {0})")]
    IntervalTooShort(f64),

    #[error("interval is too large (got {0})")]
    IntervalOutOfRange(f64),

    #[error("count must be a positive integer (got {0})")]
    InvalidCount(i64),

    #[error("identifier must consist of ASCII letters only (got {0:?})")]
    InvalidIdentifier(String),

    #[error("freshness must be a positive integer (got {0})")]
    InvalidFreshness(i64),

    #[error("Interest lifetime must be positive")]
    InvalidLifetime,

    #[error(transparent)]
    Hmac(#[from] HmacError),
}

/// Options of the `ccnping` client.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "ccnping",
    version,
    about = "Ping a name prefix using Interests named <prefix>/ping[/identifier]/<number>",
    disable_help_flag = true
)]
pub struct ClientConfiguration {
    /// Name prefix to ping, e.g. ccnx:/name/prefix
    pub prefix: Option<String>,

    /// Arguments after the prefix are ignored
    #[arg(hide = true)]
    pub extra: Vec<String>,

    /// Ping interval in seconds (minimum 0.1)
    #[arg(short = 'i', default_value_t = 1.0, allow_negative_numbers = true)]
    pub interval: f64,

    /// Total number of pings
    #[arg(short = 'c', allow_negative_numbers = true)]
    pub count: Option<i64>,

    /// Starting number, incremented after each Interest; random when absent or negative
    #[arg(short = 'n', allow_negative_numbers = true)]
    pub number: Option<i64>,

    /// Identifier inserted before the numbers to avoid conflicts
    #[arg(short = 'p')]
    pub identifier: Option<String>,

    /// Allow routers to answer from cache
    #[arg(short = 'a')]
    pub allow_caching: bool,

    /// Print timestamps
    #[arg(short = 't')]
    pub timestamp: bool,

    /// Print this message and exit
    #[arg(short = 'h', action = ArgAction::SetTrue)]
    pub help: bool,

    /// Address of the remote face
    #[arg(long, default_value = "127.0.0.1:6363")]
    pub remote: SocketAddr,

    /// Interest lifetime in milliseconds
    #[arg(long, default_value_t = 4000)]
    pub lifetime: u64,

    /// Format of the final statistics
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// HMAC key (hex) used to verify keyed Data signatures
    #[arg(long, conflicts_with = "hmac_key_file")]
    pub hmac_key: Option<String>,

    /// File holding the HMAC key
    #[arg(long)]
    pub hmac_key_file: Option<PathBuf>,
}

impl ClientConfiguration {
    /// Decides between help, a validated run, or a usage error.
    pub fn usage_check(&self) -> Result<UsageCheck, ConfigurationError> {
        if self.help {
            return Ok(UsageCheck::Help);
        }
        self.validate()?;
        Ok(UsageCheck::Run {
            ignored_args: !self.extra.is_empty(),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.prefix_name()?;

        if self.interval.is_nan() || self.interval < MIN_INTERVAL_SECS {
            return Err(ConfigurationError::IntervalTooShort(self.interval));
        }
        Duration::try_from_secs_f64(self.interval)
            .map_err(|_| ConfigurationError::IntervalOutOfRange(self.interval))?;

        if let Some(count) = self.count {
            if count <= 0 {
                return Err(ConfigurationError::InvalidCount(count));
            }
        }

        if let Some(identifier) = &self.identifier {
            if !is_valid_identifier(identifier) {
                return Err(ConfigurationError::InvalidIdentifier(identifier.clone()));
            }
        }

        if self.lifetime == 0 {
            return Err(ConfigurationError::InvalidLifetime);
        }

        Ok(())
    }

    /// The prefix exactly as the operator typed it.
    pub fn prefix_str(&self) -> Result<&str, ConfigurationError> {
        self.prefix
            .as_deref()
            .ok_or(ConfigurationError::MissingPrefix)
    }

    pub fn prefix_name(&self) -> Result<Name, ConfigurationError> {
        Ok(Name::from_uri(self.prefix_str()?)?)
    }

    /// Interval between probes; saturates for values `validate` rejects.
    pub fn interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.interval.max(MIN_INTERVAL_SECS)).unwrap_or(Duration::MAX)
    }

    /// Probe count limit; `None` runs until interrupted.
    pub fn limit(&self) -> Option<u64> {
        self.count.and_then(|count| u64::try_from(count).ok())
    }

    /// First sequential number, or `None` for random numbering.
    pub fn start_number(&self) -> Option<u64> {
        self.number.and_then(|number| u64::try_from(number).ok())
    }

    pub fn lifetime(&self) -> Duration {
        Duration::from_millis(self.lifetime)
    }

    pub fn hmac_key(&self) -> Result<Option<HmacKey>, ConfigurationError> {
        Ok(load_hmac_key(
            self.hmac_key.as_deref(),
            self.hmac_key_file.as_deref(),
        )?)
    }
}

/// Options of the `ccnpingserver` responder.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "ccnpingserver",
    version,
    about = "Answer ping Interests under a name prefix",
    disable_help_flag = true
)]
pub struct ServerConfiguration {
    /// Name prefix to serve, e.g. ccnx:/name/prefix
    pub prefix: Option<String>,

    /// Arguments after the prefix are ignored
    #[arg(hide = true)]
    pub extra: Vec<String>,

    /// Freshness hint of the answers in seconds
    #[arg(short = 'x', default_value_t = DEFAULT_FRESHNESS_SECS, allow_negative_numbers = true)]
    pub freshness: i64,

    /// Run in the background
    #[arg(short = 'd')]
    pub daemon: bool,

    /// Print this message and exit
    #[arg(short = 'h', action = ArgAction::SetTrue)]
    pub help: bool,

    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:6363")]
    pub listen: SocketAddr,

    /// Format of the statistics printed on interrupt
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// HMAC key (hex) used to sign Data instead of a plain digest
    #[arg(long, conflicts_with = "hmac_key_file")]
    pub hmac_key: Option<String>,

    /// File holding the HMAC key
    #[arg(long)]
    pub hmac_key_file: Option<PathBuf>,
}

impl ServerConfiguration {
    pub fn usage_check(&self) -> Result<UsageCheck, ConfigurationError> {
        if self.help {
            return Ok(UsageCheck::Help);
        }
        self.validate()?;
        Ok(UsageCheck::Run {
            ignored_args: !self.extra.is_empty(),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.prefix_name()?;

        if self.freshness <= 0 {
            return Err(ConfigurationError::InvalidFreshness(self.freshness));
        }

        Ok(())
    }

    pub fn prefix_str(&self) -> Result<&str, ConfigurationError> {
        self.prefix
            .as_deref()
            .ok_or(ConfigurationError::MissingPrefix)
    }

    pub fn prefix_name(&self) -> Result<Name, ConfigurationError> {
        Ok(Name::from_uri(self.prefix_str()?)?)
    }

    /// Freshness hint in seconds, saturated to the wire range.
    pub fn freshness(&self) -> u32 {
        u32::try_from(self.freshness.max(1)).unwrap_or(u32::MAX)
    }

    pub fn hmac_key(&self) -> Result<Option<HmacKey>, ConfigurationError> {
        Ok(load_hmac_key(
            self.hmac_key.as_deref(),
            self.hmac_key_file.as_deref(),
        )?)
    }
}

/// Identifiers are non-empty and ASCII letters only.
pub fn is_valid_identifier(identifier: &str) -> bool {
    !identifier.is_empty() && identifier.bytes().all(|b| b.is_ascii_alphabetic())
}

/// Prints `error` (if any) and the usage text to standard error, then exits 1.
pub fn exit_with_usage<C: CommandFactory>(error: Option<&dyn Display>) -> ! {
    let mut command = C::command();
    if let Some(error) = error {
        eprintln!("{}: {}", command.get_name(), error);
    }
    eprintln!("{}", command.render_help());
    std::process::exit(1)
}

/// Parses the process arguments into `C`, validated by `check`.
///
/// `--version` is honored; every other parse failure, `-h` and a failed
/// `check` print usage and exit 1. Ignored trailing arguments produce a
/// warning.
pub fn parse_or_exit<C, F>(check: F) -> C
where
    C: Parser,
    F: FnOnce(&C) -> Result<UsageCheck, ConfigurationError>,
{
    let conf = match C::try_parse() {
        Ok(conf) => conf,
        Err(e) if e.kind() == ErrorKind::DisplayVersion => e.exit(),
        Err(e) => {
            let _ = e.print();
            exit_with_usage::<C>(None)
        }
    };

    match check(&conf) {
        Ok(UsageCheck::Run { ignored_args }) => {
            if ignored_args {
                eprintln!("{} warning: extra arguments ignored", C::command().get_name());
            }
            conf
        }
        Ok(UsageCheck::Help) => exit_with_usage::<C>(None),
        Err(e) => exit_with_usage::<C>(Some(&e)),
    }
}

/// Outcome of checking a parsed command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageCheck {
    Help,
    Run { ignored_args: bool },
}
