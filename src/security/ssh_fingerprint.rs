//! Parsing and fingerprinting of OpenSSH public key lines (`ssh-ed25519
//! AAAA... comment`), for both the `ADD_SSH_KEY` handler and the SSH
//! transport's key-lookup-on-connect path.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sha2::{Digest, Sha256};

use crate::error::{ErrorCode, HandlerError, HandlerResult};

pub struct ParsedKey {
    pub key_type: String,
    /// `SHA256:<base64, no padding>`, matching `ssh-keygen -lf`'s output.
    pub fingerprint: String,
}

pub fn parse(public_key_line: &str) -> HandlerResult<ParsedKey> {
    let mut fields = public_key_line.split_whitespace();
    let key_type = fields
        .next()
        .ok_or_else(|| HandlerError::new(ErrorCode::InvalidInput, "empty public key"))?;
    let encoded = fields
        .next()
        .ok_or_else(|| HandlerError::new(ErrorCode::InvalidInput, "missing base64 key material"))?;
    let raw = BASE64
        .decode(encoded)
        .map_err(|e| HandlerError::new(ErrorCode::InvalidInput, format!("invalid base64: {e}")))?;

    let digest = Sha256::digest(&raw);
    let fingerprint = format!("SHA256:{}", BASE64.encode(digest).trim_end_matches('='));

    Ok(ParsedKey {
        key_type: key_type.to_string(),
        fingerprint,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_type_and_fingerprint() {
        let line = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIBV1dwxvE8FQ8lDl user@host";
        let parsed = parse(line).unwrap();
        assert_eq!(parsed.key_type, "ssh-ed25519");
        assert!(parsed.fingerprint.starts_with("SHA256:"));
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(parse("not-a-key").is_err());
    }
}
