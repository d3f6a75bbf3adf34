use thiserror::Error;

/// Failures encoding, decoding, or encrypting a wire record.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to serialize record to JSON: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("failed to deserialize record from JSON: {0}")]
    Deserialize(#[source] serde_json::Error),

    #[error("wire string is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("RSA operation failed: {0}")]
    Rsa(#[from] rsa::Error),

    #[error("encrypted field is not valid UTF-8 base64 ciphertext")]
    MalformedCiphertext,
}
