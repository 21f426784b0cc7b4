use thiserror::Error;

/// Failures the wire codec can raise. This is the one error type that
/// crosses into the resolver as a value to be matched on; everything past
/// the codec boundary (cache I/O, upstream transport, startup) is glued
/// together with `anyhow`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DnsParseError {
    #[error("packet truncated at offset {0}")]
    Truncated(usize),
    #[error("invalid label at offset {0}")]
    InvalidLabel(usize),
    #[error("name compression loop or chain too long")]
    CompressionLoop,
    #[error("invalid utf-8 in name")]
    InvalidUtf8,
    #[error("packet too short: {0} bytes")]
    TooShort(usize),
    #[error("name exceeds 253 bytes")]
    NameTooLong,
    #[error("label exceeds 63 bytes: {0}")]
    LabelTooLong(usize),
}
