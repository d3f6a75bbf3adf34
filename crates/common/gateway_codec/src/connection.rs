use crate::CodecError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use gateway_model::Connection;
use gateway_model::Rule;
use rand::thread_rng;
use rsa::Oaep;
use rsa::RsaPrivateKey;
use rsa::RsaPublicKey;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;

/// A [`Connection`] whose sensitive fields are sealed for one specific
/// receiver. The `rule` travels in the clear: the hub and every gateway that
/// can see the mailbox route and de-duplicate on it without decrypting
/// anything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedConnection {
    pub rule: Rule,
    type_info_ciphertext: String,
    xmlrpc_uri_ciphertext: String,
}

fn oaep() -> Oaep {
    Oaep::new::<Sha256>()
}

/// Encrypt the sensitive fields of `connection` for `public_key`'s holder.
pub fn encrypt_connection(connection: &Connection, public_key: &RsaPublicKey) -> Result<EncryptedConnection, CodecError> {
    let mut rng = thread_rng();
    let type_info_ciphertext = public_key.encrypt(&mut rng, oaep(), connection.type_info.as_bytes())?;
    let xmlrpc_uri_ciphertext = public_key.encrypt(&mut rng, oaep(), connection.xmlrpc_uri.as_bytes())?;
    Ok(EncryptedConnection {
        rule: connection.rule.clone(),
        type_info_ciphertext: BASE64.encode(type_info_ciphertext),
        xmlrpc_uri_ciphertext: BASE64.encode(xmlrpc_uri_ciphertext),
    })
}

/// Recover a [`Connection`] sealed with [`encrypt_connection`], given the
/// matching private key.
pub fn decrypt_connection(connection: &EncryptedConnection, private_key: &RsaPrivateKey) -> Result<Connection, CodecError> {
    let type_info_bytes = BASE64.decode(&connection.type_info_ciphertext)?;
    let xmlrpc_uri_bytes = BASE64.decode(&connection.xmlrpc_uri_ciphertext)?;
    let type_info = private_key.decrypt(oaep(), &type_info_bytes)?;
    let xmlrpc_uri = private_key.decrypt(oaep(), &xmlrpc_uri_bytes)?;
    let type_info = String::from_utf8(type_info).map_err(|_| CodecError::MalformedCiphertext)?;
    let xmlrpc_uri = String::from_utf8(xmlrpc_uri).map_err(|_| CodecError::MalformedCiphertext)?;
    Ok(Connection::new(connection.rule.clone(), type_info, xmlrpc_uri))
}

/// Serialize a clear [`Connection`] to its canonical wire string (used for
/// public advertisements, which are never encrypted).
pub fn serialize_connection(connection: &Connection) -> Result<String, CodecError> {
    let json = serde_json::to_vec(connection).map_err(CodecError::Serialize)?;
    Ok(BASE64.encode(json))
}

/// Inverse of [`serialize_connection`].
pub fn deserialize_connection(wire: &str) -> Result<Connection, CodecError> {
    let json = BASE64.decode(wire)?;
    serde_json::from_slice(&json).map_err(CodecError::Deserialize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use gateway_model::ConnectionType;

    fn sample() -> Connection {
        Connection::new(
            Rule::new(ConnectionType::Publisher, "/chatter", "/talker"),
            "std_msgs/String",
            "http://talker-host:11311/",
        )
    }

    #[test]
    fn connection_round_trips_through_wire_encoding() {
        let connection = sample();
        let wire = serialize_connection(&connection).unwrap();
        assert_eq!(deserialize_connection(&wire).unwrap(), connection);
    }

    #[test]
    fn encrypt_then_decrypt_recovers_connection() {
        let connection = sample();
        let (private_key, public_key) = crate::generate_keypair().unwrap();
        let encrypted = encrypt_connection(&connection, &public_key).unwrap();
        assert_eq!(encrypted.rule, connection.rule);
        let recovered = decrypt_connection(&encrypted, &private_key).unwrap();
        assert_eq!(recovered, connection);
    }

    #[test]
    fn wrong_private_key_fails_to_decrypt() {
        let connection = sample();
        let (_right_private, public_key) = crate::generate_keypair().unwrap();
        let (wrong_private, _wrong_public) = crate::generate_keypair().unwrap();
        let encrypted = encrypt_connection(&connection, &public_key).unwrap();
        assert_matches!(decrypt_connection(&encrypted, &wrong_private), Err(CodecError::Rsa(_)));
    }
}
