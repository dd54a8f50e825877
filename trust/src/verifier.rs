//! Streaming signature operations
//!
//! RSA PKCS#1 v1.5 signatures over a SHA-256 digest. Payload streams are
//! consumed single-pass through the digest without buffering; only key and
//! signature content (bounded, small) is read fully into memory.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::signature::{DigestSigner, DigestVerifier, SignatureEncoding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

use futures::StreamExt;

use crate::errors::{Result, TrustError};
use crate::stream::{self, ByteStream};

/// Marker every acceptable key document must start with
const PEM_MARKER: &str = "-----BEGIN";

/// Sign a payload stream with a PEM-encoded RSA private key
///
/// The key is read fully first; the payload is streamed through the
/// digest. Returns the base64-encoded signature.
pub async fn sign(data: ByteStream, private_key: ByteStream) -> Result<String> {
    let pem = read_pem(private_key).await?;
    let key = RsaPrivateKey::from_pkcs8_pem(&pem)
        .or_else(|_| RsaPrivateKey::from_pkcs1_pem(&pem))
        .map_err(|_| TrustError::InvalidKeyFormat)?;

    let digest = digest_stream(data).await?;
    let signing_key = SigningKey::<Sha256>::new(key);
    let signature: Signature = signing_key
        .try_sign_digest(digest)
        .map_err(|e| TrustError::Crypto(format!("signing failed: {e}")))?;

    Ok(BASE64.encode(signature.to_bytes()))
}

/// Verify a payload stream against a base64 signature and a PEM-encoded
/// RSA public key
///
/// An empty signature stream is a distinct [`TrustError::InvalidSignature`]
/// error, never a silent `false`. A `false` return means the signature
/// decoded cleanly but does not match the payload.
pub async fn verify(
    data: ByteStream,
    signature: ByteStream,
    public_key: ByteStream,
) -> Result<bool> {
    let pem = read_pem(public_key).await?;
    let key = RsaPublicKey::from_public_key_pem(&pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(&pem))
        .map_err(|_| TrustError::InvalidKeyFormat)?;

    let digest = digest_stream(data).await?;

    let signature_text = stream::collect(signature).await?;
    if signature_text.is_empty() {
        return Err(TrustError::InvalidSignature);
    }
    let signature_text =
        std::str::from_utf8(&signature_text).map_err(|_| TrustError::InvalidSignature)?;
    let signature_bytes = BASE64
        .decode(signature_text.trim())
        .map_err(|_| TrustError::InvalidSignature)?;
    let signature =
        Signature::try_from(signature_bytes.as_slice()).map_err(|_| TrustError::InvalidSignature)?;

    let verifying_key = VerifyingKey::<Sha256>::new(key);
    Ok(verifying_key.verify_digest(digest, &signature).is_ok())
}

/// Read key content fully and check the PEM marker
async fn read_pem(key: ByteStream) -> Result<String> {
    let bytes = stream::collect(key).await?;
    let text = String::from_utf8(bytes).map_err(|_| TrustError::InvalidKeyFormat)?;
    if !text.trim_start().starts_with(PEM_MARKER) {
        return Err(TrustError::InvalidKeyFormat);
    }
    Ok(text)
}

/// Run a payload stream through a SHA-256 digest, single-pass
async fn digest_stream(mut data: ByteStream) -> Result<Sha256> {
    let mut digest = Sha256::new();
    while let Some(chunk) = data.next().await {
        digest.update(&chunk?);
    }
    Ok(digest)
}
