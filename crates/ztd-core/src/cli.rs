use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::view::TaskFilter;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "ztd",
    version,
    about = "ztd: terminal client for the ztd task service",
    disable_help_subcommand = true,
    arg_required_else_help = false
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "ztdrc")]
    pub ztdrc: Option<PathBuf>,

    /// Directory holding client-side state (the category order).
    #[arg(long = "data")]
    pub data: Option<PathBuf>,

    /// Base URL of the task service, e.g. http://localhost:5001/api
    #[arg(long = "api")]
    pub api: Option<String>,

    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub rest: Vec<OsString>,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = match (quiet, verbose) {
        (q, _) if q >= 2 => "error",
        (1, _) => "warn",
        (_, v) if v >= 3 => "trace",
        (_, 2) => "debug",
        (_, 1) => "info",
        _ => "warn",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls positional `rc.key=value` / `rc.key:value` overrides out of the argument list.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let text = arg.to_string_lossy();
        let parsed = text
            .strip_prefix("rc.")
            .and_then(|rest| rest.split_once('=').or_else(|| rest.split_once(':')));

        match parsed {
            Some((k, v)) => {
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((format!("rc.{k}"), v.to_string()));
            }
            None => cleaned.push(arg),
        }
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    })
}

/// `[filter terms] <command> [args]`.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub filter: TaskFilter,
    pub command: String,
    pub command_args: Vec<String>,
}

impl Invocation {
    #[tracing::instrument(skip(cfg, rest))]
    pub fn parse(cfg: &Config, rest: Vec<OsString>) -> anyhow::Result<Self> {
        let tokens: Vec<String> = rest
            .into_iter()
            .map(|arg| arg.to_string_lossy().to_string())
            .collect();

        let default_command = || {
            cfg.get("default.command")
                .unwrap_or_else(|| "list".to_string())
        };

        let known = crate::commands::known_command_names();
        let split = tokens.iter().enumerate().find_map(|(idx, token)| {
            crate::commands::expand_command_abbrev(token, &known).map(|full| (idx, full))
        });

        let (filter_terms, command, command_args) = match split {
            Some((idx, full)) => {
                debug!(token = %tokens[idx], expanded = %full, split_index = idx, "resolved command token");
                (&tokens[..idx], full.to_string(), tokens[idx + 1..].to_vec())
            }
            None => {
                if !tokens.is_empty() {
                    warn!("no command detected, treating all terms as filters for the default command");
                }
                (&tokens[..], default_command(), vec![])
            }
        };

        let filter = parse_filter_terms(filter_terms)?;
        Ok(Self {
            filter,
            command,
            command_args,
        })
    }
}

/// The last filter term wins, the way picking a new value in a filter dropdown replaces
/// the previous one.
fn parse_filter_terms(terms: &[String]) -> anyhow::Result<TaskFilter> {
    let mut filter = TaskFilter::All;
    for term in terms {
        filter = TaskFilter::parse_term(term)?
            .ok_or_else(|| anyhow!("unknown command or filter term: {term}"))?;
    }
    Ok(filter)
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;

    use super::{Invocation, preprocess_args};
    use crate::config::Config;
    use crate::task::Priority;
    use crate::view::TaskFilter;

    fn args(items: &[&str]) -> Vec<OsString> {
        items.iter().map(OsString::from).collect()
    }

    #[test]
    fn filter_terms_precede_the_command() {
        let cfg = Config::defaults();
        let inv = Invocation::parse(&cfg, args(&["cat:work", "mov", "3", "1"])).expect("parse");

        assert_eq!(inv.filter, TaskFilter::Category("work".to_string()));
        assert_eq!(inv.command, "move");
        assert_eq!(inv.command_args, vec!["3".to_string(), "1".to_string()]);
    }

    #[test]
    fn bare_filters_run_the_default_command() {
        let cfg = Config::defaults();
        let inv = Invocation::parse(&cfg, args(&["prio:urgent"])).expect("parse");
        assert_eq!(inv.command, "list");
        assert_eq!(inv.filter, TaskFilter::Priority(Priority::Urgent));

        assert!(Invocation::parse(&cfg, args(&["frobnicate"])).is_err());
    }

    #[test]
    fn positional_rc_overrides_are_extracted() {
        let pre = preprocess_args(&args(&["ztd", "rc.api.url=http://x/api", "rc.color:off", "list"]))
            .expect("preprocess");

        assert_eq!(pre.cleaned_args, args(&["ztd", "list"]));
        assert_eq!(
            pre.rc_overrides,
            vec![
                ("rc.api.url".to_string(), "http://x/api".to_string()),
                ("rc.color".to_string(), "off".to_string()),
            ]
        );
    }
}
