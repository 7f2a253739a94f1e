//! Command-line interface definitions for mitmwrap.
//!
//! Uses clap's derive API for type-safe argument parsing. Arguments mitmwrap
//! does not know are handed to the proxy tool, so argv is split into known
//! and pass-through parts before clap sees it.

use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;

/// Flags that take no value.
const SWITCHES: &[(char, &str)] = &[
    ('t', "toggle"),
    ('P', "port-random"),
    ('w', "web"),
    ('v', "verbose"),
    ('h', "help"),
    ('V', "version"),
];

/// Flags that take a value.
const OPTIONS: &[(char, &str)] = &[('p', "port"), ('c', "config")];

/// Run mitmproxy with the macOS system proxy pointed at it.
///
/// mitmwrap enables the web and secure web proxy on every connected network
/// service, runs mitmproxy (or mitmweb) in the foreground, and turns the
/// proxy back off when it exits or is interrupted.
#[derive(Parser, Debug)]
#[command(name = "mitmwrap")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "Unrecognized arguments are passed to mitmproxy/mitmweb. \
Everything after `--` is passed through unchanged.")]
pub struct Cli {
    /// Flip the system proxy on or off and exit.
    ///
    /// The new state is the opposite of the primary service's current state.
    #[arg(short = 't', long = "toggle")]
    pub toggle: bool,

    /// Port the proxy listens on.
    #[arg(short = 'p', long = "port", value_name = "PORT")]
    pub port: Option<u16>,

    /// Use a random free port instead of --port.
    #[arg(short = 'P', long = "port-random", conflicts_with = "port")]
    pub port_random: bool,

    /// Run mitmweb instead of mitmproxy.
    #[arg(short = 'w', long = "web")]
    pub web: bool,

    /// Path to additional config file.
    ///
    /// This config file is merged on top of system and user configs,
    /// giving it the highest priority (except for CLI flags).
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity.
    ///
    /// Can be specified multiple times:
    /// -v    = info level
    /// -vv   = debug level
    /// -vvv  = trace level
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Arguments passed to the proxy tool unchanged.
    #[arg(skip)]
    pub extra_args: Vec<String>,
}

impl Cli {
    /// Parse the process arguments, passing unknown ones through.
    pub fn parse_known() -> Self {
        Self::parse_known_from(std::env::args_os())
    }

    /// Parse `args` (program name first). Known flags are recognized in any
    /// position; everything else lands in `extra_args` in its original order.
    ///
    /// Exits with a usage message on invalid known flags, like
    /// [`Parser::parse_from`].
    pub fn parse_known_from<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        let args: Vec<String> = args
            .into_iter()
            .map(|arg| arg.into().to_string_lossy().into_owned())
            .collect();
        let (known, extra) = split_known_args(&args);

        let mut cli = Self::parse_from(known);
        cli.extra_args = extra;
        cli
    }
}

/// Split argv into (program name + known flags, pass-through arguments).
///
/// `--` stops flag recognition: it is dropped and everything after it passes
/// through.
pub fn split_known_args(args: &[String]) -> (Vec<String>, Vec<String>) {
    let mut known = Vec::new();
    let mut extra = Vec::new();
    let mut iter = args.iter();

    if let Some(program) = iter.next() {
        known.push(program.clone());
    }

    while let Some(arg) = iter.next() {
        if arg == "--" {
            extra.extend(iter.by_ref().cloned());
            break;
        }

        let takes_value = if let Some(long) = arg.strip_prefix("--") {
            let (name, inline_value) = match long.split_once('=') {
                Some((name, _)) => (name, true),
                None => (long, false),
            };
            if SWITCHES.iter().any(|(_, l)| *l == name) && !inline_value {
                Some(false)
            } else if OPTIONS.iter().any(|(_, l)| *l == name) {
                Some(!inline_value)
            } else {
                None
            }
        } else if let Some(cluster) = arg.strip_prefix('-').filter(|c| !c.is_empty()) {
            classify_short_cluster(cluster)
        } else {
            None
        };

        match takes_value {
            Some(needs_next) => {
                known.push(arg.clone());
                if needs_next && let Some(value) = iter.next() {
                    known.push(value.clone());
                }
            }
            None => extra.push(arg.clone()),
        }
    }

    (known, extra)
}

/// `Some(needs_next_value)` when every letter of `-xyz` is ours.
///
/// Switches may be combined (`-vvw`); a value-taking letter ends the cluster,
/// with its value either attached (`-p9090`) or in the next argument.
fn classify_short_cluster(cluster: &str) -> Option<bool> {
    for (i, c) in cluster.char_indices() {
        if SWITCHES.iter().any(|(s, _)| *s == c) {
            continue;
        }
        if OPTIONS.iter().any(|(s, _)| *s == c) {
            let rest = &cluster[i + c.len_utf8()..];
            return Some(rest.is_empty());
        }
        return None;
    }
    Some(false)
}
