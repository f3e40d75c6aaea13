// This file is part of TRINCI.
//
// Copyright (C) 2021 Affidaty Spa.
//
// TRINCI is free software: you can redistribute it and/or modify it under
// the terms of the GNU Affero General Public License as published by the
// Free Software Foundation, either version 3 of the License, or (at your
// option) any later version.
//
// TRINCI is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License
// for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with TRINCI. If not, see <https://www.gnu.org/licenses/>.

//! Endpoints list loading and runtime configuration of the connection core.

use crate::{Error, ErrorKind, Result};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

/// Endpoints list file name.
pub const ENDPOINTS_FILE: &str = "endpoints.json";

/// Budget of a single probe (connect + height query).
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Block monitor polling period.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// RPC manager configuration.
#[derive(Clone, Debug)]
pub struct ManagerConfig {
    /// Directory holding `endpoints.json`. Working directory when `None`.
    pub home: Option<PathBuf>,
    /// Extra endpoint supplied at runtime (e.g. from the command line).
    pub provider: Option<String>,
    /// Probe time budget, shared by every probe of a batch.
    pub probe_timeout: Duration,
    /// Log target of the manager instance.
    pub log_target: String,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        ManagerConfig {
            home: None,
            provider: None,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            log_target: "rpc-manager".to_owned(),
        }
    }
}

/// Block monitor configuration.
#[derive(Clone, Debug)]
pub struct MonitorConfig {
    /// Time between two polls.
    pub check_interval: Duration,
    /// Max age of the latest block before failing over. Zero disables the check.
    pub stale_threshold: Duration,
    /// Log target of the monitor instance.
    pub log_target: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            check_interval: DEFAULT_CHECK_INTERVAL,
            stale_threshold: Duration::ZERO,
            log_target: "block-monitor".to_owned(),
        }
    }
}

/// Location of the endpoints list.
pub fn endpoints_path(home: Option<&Path>) -> PathBuf {
    match home {
        Some(dir) => dir.join(ENDPOINTS_FILE),
        None => PathBuf::from(ENDPOINTS_FILE),
    }
}

/// Load the JSON array of endpoint URLs.
///
/// Entries are trimmed, blank entries dropped and duplicates removed (first
/// occurrence wins). An empty resulting list is an error.
pub fn load_endpoints(path: &Path) -> Result<Vec<String>> {
    let buf = fs::read_to_string(path).map_err(|err| {
        Error::new_ext(
            ErrorKind::BadConfiguration,
            format!("cannot read {}: {}", path.display(), err),
        )
    })?;
    let raw: Vec<String> = serde_json::from_str(&buf).map_err(|err| {
        Error::new_ext(
            ErrorKind::BadConfiguration,
            format!("cannot parse {}: {}", path.display(), err),
        )
    })?;

    let urls = normalize(raw);
    if urls.is_empty() {
        return Err(Error::new_ext(
            ErrorKind::BadConfiguration,
            format!("{} contains no endpoint", path.display()),
        ));
    }
    Ok(urls)
}

/// Append the runtime provider URL if it is not already listed.
/// Returns true if the list has been extended.
pub fn merge_provider(urls: &mut Vec<String>, provider: Option<&str>) -> bool {
    let provider = match provider.map(str::trim) {
        Some(provider) if !provider.is_empty() => provider,
        _ => return false,
    };
    if urls.iter().any(|url| url == provider) {
        return false;
    }
    urls.push(provider.to_owned());
    true
}

pub(crate) fn normalize(raw: Vec<String>) -> Vec<String> {
    let mut urls: Vec<String> = Vec::with_capacity(raw.len());
    for url in raw {
        let url = url.trim();
        if !url.is_empty() && !urls.iter().any(|u| u == url) {
            urls.push(url.to_owned());
        }
    }
    urls
}
