use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Invalid hex payload: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("Payload is empty")]
    Empty,

    #[error("Failed to inflate payload: {0}")]
    Inflate(std::io::Error),

    #[error("Failed to deflate payload: {0}")]
    Deflate(std::io::Error),

    #[error("Payload is not a << >> dictionary")]
    MissingDelimiters,

    #[error("Template {template} has no {field} field and no anchor to insert it")]
    MissingField { template: String, field: String },

    #[error("Malformed {field} field: {reason}")]
    MalformedField { field: &'static str, reason: String },
}
