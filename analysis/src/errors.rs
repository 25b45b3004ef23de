use thiserror::Error;

/// Errors raised by analysis operations. Per §7, internal pure computations
/// never fail for "data looks odd" reasons — they degrade to defaults
/// (BPM 120, key unknown). Only genuinely empty/short input is an error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("cannot analyze an empty PCM buffer")]
    EmptySamples,

    #[error("PCM buffer has odd byte length {0}, not a whole number of 16-bit samples")]
    MisalignedBuffer(usize),
}

/// The codec boundary's single error kind (§6, §7): decode/encode failed.
/// Opaque by design — the caller only needs to know the call didn't
/// succeed, not why.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("codec failure: {0}")]
pub struct CodecError(pub String);
