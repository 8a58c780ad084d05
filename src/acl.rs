//! Source-address allowlist.
//!
//! The filter has three states: unset (every client allowed), empty (no client
//! allowed), and populated (only clients inside a configured range allowed).
//! Once the server is running the filter is immutable.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use ipnet::IpNet;
use thiserror::Error;
use tracing::warn;

use crate::error::ServeError;
use crate::AppState;

#[derive(Error, Debug)]
pub enum AclError {
    #[error("invalid IP range '{0}'")]
    InvalidRange(String),

    #[error(
        "refusing to listen on a non-loopback address without --allowed-ips; \
         provide an allowlist to expose the server"
    )]
    Unrestricted,
}

/// One entry of the allowlist.
#[derive(Clone, Debug)]
pub enum IpRange {
    Single(IpAddr),
    Net(IpNet),
    Span(IpAddr, IpAddr),
}

impl IpRange {
    pub fn contains(&self, ip: IpAddr) -> bool {
        match self {
            IpRange::Single(addr) => *addr == ip,
            IpRange::Net(net) => net.contains(&ip),
            // IpAddr ordering puts all V4 below all V6, so a mixed-family
            // comparison never matches.
            IpRange::Span(start, end) => *start <= ip && ip <= *end,
        }
    }
}

impl FromStr for IpRange {
    type Err = AclError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || AclError::InvalidRange(s.to_string());
        if let Some((start, end)) = s.split_once('-') {
            let start: IpAddr = start.trim().parse().map_err(|_| bad())?;
            let end: IpAddr = end.trim().parse().map_err(|_| bad())?;
            if start.is_ipv4() != end.is_ipv4() || start > end {
                return Err(bad());
            }
            Ok(IpRange::Span(start, end))
        } else if s.contains('/') {
            s.parse::<IpNet>().map(IpRange::Net).map_err(|_| bad())
        } else {
            s.parse::<IpAddr>().map(IpRange::Single).map_err(|_| bad())
        }
    }
}

impl fmt::Display for IpRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpRange::Single(addr) => write!(f, "{addr}"),
            IpRange::Net(net) => write!(f, "{net}"),
            IpRange::Span(start, end) => write!(f, "{start}-{end}"),
        }
    }
}

/// Source-address filter applied to every incoming request.
#[derive(Clone, Debug)]
pub enum AddrFilter {
    /// No allowlist configured; every client is allowed.
    AllowAll,
    /// Only clients inside one of the ranges are allowed. An empty list
    /// allows nobody.
    Ranges(Vec<IpRange>),
}

impl AddrFilter {
    /// Parse a comma-separated allowlist specification.
    ///
    /// Entries may be single addresses, CIDR blocks, or `start-end` spans.
    /// An empty specification yields the allow-nobody filter.
    pub fn parse(spec: &str) -> Result<Self, AclError> {
        let ranges = spec
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(IpRange::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(AddrFilter::Ranges(ranges))
    }

    pub fn is_allowed(&self, ip: IpAddr) -> bool {
        match self {
            AddrFilter::AllowAll => true,
            AddrFilter::Ranges(ranges) => ranges.iter().any(|range| range.contains(ip)),
        }
    }
}

impl fmt::Display for AddrFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddrFilter::AllowAll => write!(f, "*ANY*"),
            AddrFilter::Ranges(ranges) if ranges.is_empty() => write!(f, "*NONE*"),
            AddrFilter::Ranges(ranges) => {
                let list: Vec<String> = ranges.iter().map(ToString::to_string).collect();
                write!(f, "{}", list.join(", "))
            }
        }
    }
}

/// Startup safety check: a non-loopback listen address must carry an allowlist.
pub fn check_listen_exposure(listen_ip: IpAddr, filter: &AddrFilter) -> Result<(), AclError> {
    if !listen_ip.is_loopback() && matches!(filter, AddrFilter::AllowAll) {
        return Err(AclError::Unrestricted);
    }
    Ok(())
}

/// Middleware rejecting clients outside the allowlist with a plain-text 403.
///
/// A request without a peer address only passes when the filter is unset.
pub async fn require_allowed(
    State(state): State<AppState>,
    info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Response {
    match info {
        Some(ConnectInfo(addr)) => {
            if state.filter.is_allowed(addr.ip()) {
                next.run(request).await
            } else {
                warn!("client {} not in allowlist", addr.ip());
                ServeError::Forbidden.into_response()
            }
        }
        None if matches!(state.filter, AddrFilter::AllowAll) => next.run(request).await,
        None => {
            warn!("rejecting request without a peer address");
            ServeError::Forbidden.into_response()
        }
    }
}
