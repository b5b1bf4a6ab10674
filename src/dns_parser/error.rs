use std::io;

use thiserror::Error;

/// Error parsing or building a DNS packet
#[derive(Debug, Error)]
pub enum Error {
    #[error("packet is smaller than header size")]
    HeaderTooShort,
    #[error("packet is has incomplete data")]
    UnexpectedEOF,
    #[error("wrong (too short or too long) size of RDATA")]
    WrongRdataLength,
    #[error("packet has non-zero reserved bits")]
    ReservedBitsAreNonZero,
    #[error("label in domain name has unknown label format")]
    UnknownLabelFormat,
    #[error("invalid characters encountered while reading label")]
    LabelIsNotAscii,
    #[error("label is longer than 63 octets")]
    LabelTooLong,
    #[error("domain name is longer than 255 octets")]
    NameTooLong,
    #[error("domain name has an empty label")]
    EmptyLabel,
    #[error("compression pointer does not point backwards")]
    PointerLoop,
    #[error("packet has {0} bytes after the last record")]
    TrailingData(usize),
    #[error("more than 65535 entries in a section")]
    TooManyRecords,
    #[error("packet of {len} bytes exceeds the {max} byte limit")]
    TruncatedResponse { len: usize, max: usize },
    #[error("failed to write packet: {0}")]
    Write(#[from] io::Error),
}
