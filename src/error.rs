use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use crate::dns_parser::{self, Name};

/// Why a resolution (or a single exchange) failed
///
/// A name that does not exist is not an error: it is reported as a
/// negative `Resolution`.
#[derive(Debug, Error)]
pub enum Error {
    #[error("malformed message: {0}")]
    Format(#[from] dns_parser::Error),
    #[error("response from {0} was truncated")]
    TruncatedResponse(SocketAddr),
    #[error("response from {0} does not match its query")]
    UnexpectedResponse(SocketAddr),
    #[error("timed out waiting for {0}")]
    Timeout(SocketAddr),
    #[error("network error: {0}")]
    Io(#[from] io::Error),
    #[error("no server for {zone} answered")]
    AllServersUnreachable { zone: Name },
    #[error("resolution of {0} made no progress")]
    NoProgress(Name),
    #[error("too many referrals")]
    TooManyReferrals,
    #[error("no usable address for any nameserver of {0}")]
    NoNameservers(Name),
    #[error("resolution deadline exceeded")]
    DeadlineExceeded,
    #[error("packet is a response, not a query")]
    NotAQuery,
    #[error("every transaction id towards {0} is in flight")]
    TransactionIdsExhausted(SocketAddr),
}
