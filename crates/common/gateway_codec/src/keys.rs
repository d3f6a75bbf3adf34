use crate::CodecError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rsa::RsaPrivateKey;
use rsa::RsaPublicKey;

/// Generate a fresh RSA keypair for one gateway process lifetime.
///
/// A new keypair is minted every time the gateway starts; there is no
/// persisted identity key, so a restarted gateway always triggers the
/// key-rotation/RESEND path described in §4.5 on its peers.
pub fn generate_keypair() -> Result<(RsaPrivateKey, RsaPublicKey), CodecError> {
    let mut rng = rand::thread_rng();
    let private_key = RsaPrivateKey::new(&mut rng, 2048).map_err(CodecError::Rsa)?;
    let public_key = RsaPublicKey::from(&private_key);
    Ok((private_key, public_key))
}

/// Serialize a public key to the opaque wire string stored under
/// `rocon:<gw>:public_key`.
pub fn serialize_key(public_key: &RsaPublicKey) -> Result<String, CodecError> {
    let json = serde_json::to_vec(public_key).map_err(CodecError::Serialize)?;
    Ok(BASE64.encode(json))
}

/// Inverse of [`serialize_key`].
pub fn deserialize_key(wire: &str) -> Result<RsaPublicKey, CodecError> {
    let json = BASE64.decode(wire)?;
    serde_json::from_slice(&json).map_err(CodecError::Deserialize)
}
