use crate::CodecError;
use crate::EncryptedConnection;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use gateway_model::FlipStatus;
use serde::Deserialize;
use serde::Serialize;

/// The wire record for one entry of a receiver's `rocon:<gw>:flip_ins` inbox.
///
/// This is never stored as a structured value in the hub: the hub only
/// understands opaque set members, so the whole record is packed into a
/// single base64 string by [`serialize_request`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlipRequest {
    pub status: FlipStatus,
    pub source_gateway: String,
    pub connection: EncryptedConnection,
}

/// Pack a flip-request tuple into the single opaque string a hub set member
/// must be.
pub fn serialize_request(status: FlipStatus, source_gateway: &str, connection: &EncryptedConnection) -> Result<String, CodecError> {
    let record = FlipRequest {
        status,
        source_gateway: source_gateway.to_string(),
        connection: connection.clone(),
    };
    let json = serde_json::to_vec(&record).map_err(CodecError::Serialize)?;
    Ok(BASE64.encode(json))
}

/// Inverse of [`serialize_request`].
pub fn deserialize_request(wire: &str) -> Result<FlipRequest, CodecError> {
    let json = BASE64.decode(wire)?;
    serde_json::from_slice(&json).map_err(CodecError::Deserialize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encrypt_connection;
    use crate::generate_keypair;
    use gateway_model::Connection;
    use gateway_model::ConnectionType;
    use gateway_model::Rule;

    #[test]
    fn flip_request_round_trips_through_wire_encoding() {
        let (_private, public) = generate_keypair().unwrap();
        let connection = Connection::new(Rule::new(ConnectionType::Publisher, "/chatter", "/talker"), "std_msgs/String", "http://talker:11311/");
        let encrypted = encrypt_connection(&connection, &public).unwrap();

        let wire = serialize_request(FlipStatus::Pending, "gw_abcd1234", &encrypted).unwrap();
        let recovered = deserialize_request(&wire).unwrap();

        assert_eq!(recovered.status, FlipStatus::Pending);
        assert_eq!(recovered.source_gateway, "gw_abcd1234");
        assert_eq!(recovered.connection.rule, encrypted.rule);
    }
}
