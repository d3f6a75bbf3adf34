//! Wire encoding of connection records and flip requests, and the
//! per-flip asymmetric encryption used on the hub's flip-in mailbox.

mod connection;
mod error;
mod keys;
mod request;

pub use connection::decrypt_connection;
pub use connection::deserialize_connection;
pub use connection::encrypt_connection;
pub use connection::serialize_connection;
pub use connection::EncryptedConnection;
pub use error::CodecError;
pub use keys::deserialize_key;
pub use keys::generate_keypair;
pub use keys::serialize_key;
pub use request::deserialize_request;
pub use request::serialize_request;
pub use request::FlipRequest;
