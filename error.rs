/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Engine error type.
//!
//! Nothing here is fatal. Each variant names the recovery the engine already
//! performed (auto-register, drop the entry, fall back to defaults, degrade
//! to literal search) or, for `UnknownTopology` on an explicit switch, the
//! fact that the request was refused and state is unchanged.

use std::fmt;

use topoview_model::{DeltaDecodeError, MalformedEntry, TopologyId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    UnknownTopology(TopologyId),
    MalformedDeltaEntry {
        topology: TopologyId,
        entry: MalformedEntry,
    },
    /// The whole ingress message was unusable.
    MalformedDelta(DeltaDecodeError),
    InvalidRoute(String),
    InvalidSearchSyntax {
        term: String,
        reason: &'static str,
    },
    Config(String),
    Io(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownTopology(id) => write!(f, "unknown topology '{id}'"),
            Self::MalformedDeltaEntry { topology, entry } => {
                write!(f, "dropped malformed delta entry for '{topology}': {entry}")
            },
            Self::MalformedDelta(error) => write!(f, "dropped delta message: {error}"),
            Self::InvalidRoute(reason) => write!(f, "invalid route: {reason}"),
            Self::InvalidSearchSyntax { term, reason } => {
                write!(f, "invalid search term '{term}': {reason}")
            },
            Self::Config(reason) => write!(f, "config error: {reason}"),
            Self::Io(reason) => write!(f, "io error: {reason}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<DeltaDecodeError> for EngineError {
    fn from(error: DeltaDecodeError) -> Self {
        Self::MalformedDelta(error)
    }
}

impl From<std::io::Error> for EngineError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(error: toml::de::Error) -> Self {
        Self::Config(error.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use topoview_model::DeltaSection;

    #[test]
    fn display_names_the_subject() {
        let error = EngineError::MalformedDeltaEntry {
            topology: "hosts".into(),
            entry: MalformedEntry {
                section: DeltaSection::Add,
                index: 3,
                reason: "missing id".into(),
            },
        };
        assert_eq!(
            error.to_string(),
            "dropped malformed delta entry for 'hosts': add[3]: missing id"
        );
        assert_eq!(
            EngineError::UnknownTopology("pods".into()).to_string(),
            "unknown topology 'pods'"
        );
    }

    #[test]
    fn io_errors_convert() {
        let error: EngineError =
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert_eq!(error, EngineError::Io("gone".into()));
    }
}
