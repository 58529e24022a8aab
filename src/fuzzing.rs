//! Entry points for the `fuzz/` targets.
use std::time::Duration;

use clap::{CommandFactory, FromArgMatches};

use crate::args::{HatcheryArgs, parse_duration_arg};
use crate::config::apply_config;
use crate::config::types::ConfigFile;
use crate::distributed::protocol::{Envelope, Message};
use crate::error::{AppError, AppResult, ConfigError};

const ROLES: [&str; 3] = ["local", "coordinator", "worker"];

/// Parses a duration argument (e.g. `10s`, `500ms`).
///
/// # Errors
///
/// Returns an error when the duration is invalid.
pub fn parse_duration_arg_input(input: &str) -> AppResult<Duration> {
    parse_duration_arg(input)
}

/// Decodes one wire line into an envelope and its typed message.
///
/// # Errors
///
/// Returns an error when the line is not an envelope or the payload does not
/// match its type.
pub fn decode_envelope_line(input: &[u8]) -> AppResult<(Envelope, Message)> {
    let envelope: Envelope = serde_json::from_slice(input)?;
    let message = envelope.decode()?;
    Ok((envelope, message))
}

/// Parses a TOML config and applies it to every role's default arguments.
///
/// # Errors
///
/// Returns an error when the config does not parse or a value is rejected.
pub fn apply_config_from_toml(input: &str) -> AppResult<Vec<HatcheryArgs>> {
    let config: ConfigFile = toml::from_str(input).map_err(|err| {
        AppError::config(ConfigError::ParseToml {
            path: "<fuzz>".into(),
            source: err,
        })
    })?;
    let mut applied = Vec::with_capacity(ROLES.len());
    for role in ROLES {
        let matches = HatcheryArgs::command().try_get_matches_from(["hatchery", role])?;
        let mut args = HatcheryArgs::from_arg_matches(&matches)?;
        apply_config(&mut args, &matches, &config)?;
        applied.push(args);
    }
    Ok(applied)
}
