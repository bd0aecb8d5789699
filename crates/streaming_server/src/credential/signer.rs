#![forbid(unsafe_code)]

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use streaming_domain::{Identity, RoomId, StreamingError};
use streaming_util::SecretString;

/// Capability bits encoded into a signed room grant (spec §4.A).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
	pub publish: bool,
	pub data: bool,
	pub subscribe: bool,
	pub record: bool,
}

impl Capabilities {
	pub fn for_publisher() -> Self {
		Self { publish: true, data: true, subscribe: true, record: true }
	}

	pub fn for_viewer() -> Self {
		Self { data: true, subscribe: true, publish: false, record: false }
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GrantClaims {
	room: String,
	sub: String,
	publisher: bool,
	exp: u64,
}

/// A short-lived room grant issued to a client, handed back alongside the
/// media-plane URL the client dials. The Issuer never stores or re-signs
/// these; possession of the token is the only check the media plane needs.
#[derive(Debug, Clone, Serialize)]
pub struct RoomGrant {
	pub token: String,
	pub media_plane_url: String,
	pub capabilities: Capabilities,
	pub expires_at_unix: u64,
}

/// Delegated signer for short-lived room grants, keyed by a configured
/// `(api_key, api_secret)` pair (spec §4.A). The Issuer does not persist
/// issued tokens; it only signs and later verifies them.
pub struct Signer {
	api_key: String,
	api_secret: SecretString,
	media_plane_url: String,
	grant_ttl: Duration,
}

impl Signer {
	pub fn new(api_key: String, api_secret: SecretString, media_plane_url: String, grant_ttl: Duration) -> Self {
		Self { api_key, api_secret, media_plane_url, grant_ttl }
	}

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

	/// Issue a signed room grant for `identity` in `room`.
	pub fn issue(&self, room: &RoomId, identity: &Identity, is_publisher: bool) -> RoomGrant {
		let capabilities = if is_publisher { Capabilities::for_publisher() } else { Capabilities::for_viewer() };
		let now = unix_secs_now();
		let exp = now + self.grant_ttl.as_secs();

		let claims = GrantClaims { room: room.as_str().to_string(), sub: identity.as_str().to_string(), publisher: is_publisher, exp };
		let token = self.sign_claims(&claims);

		RoomGrant { token, media_plane_url: self.media_plane_url.clone(), capabilities, expires_at_unix: exp }
	}

	/// Verify a previously-issued grant token, returning the room/identity it
	/// was issued for. Used by tests and by any component that needs to
	/// re-derive the grant's claims rather than trust a caller's say-so.
	pub fn verify(&self, token: &str) -> Result<(RoomId, Identity, bool), StreamingError> {
		let parts: Vec<&str> = token.split('.').collect();
		if parts.len() != 3 || parts[0] != "v1" {
			return Err(StreamingError::Unauthorized);
		}

		let payload_b64 = parts[1];
		let sig_b64 = parts[2];

		let payload = URL_SAFE_NO_PAD.decode(payload_b64).map_err(|_| StreamingError::Unauthorized)?;
		let expected_sig = hmac_sign(payload_b64.as_bytes(), self.api_secret.expose().as_bytes());
		let provided_sig = URL_SAFE_NO_PAD.decode(sig_b64).map_err(|_| StreamingError::Unauthorized)?;

		if !constant_time_eq(&expected_sig, &provided_sig) {
			return Err(StreamingError::Unauthorized);
		}

		let claims: GrantClaims = serde_json::from_slice(&payload).map_err(|_| StreamingError::Unauthorized)?;
		if claims.exp <= unix_secs_now() {
			return Err(StreamingError::Unauthorized);
		}

		let room = RoomId::new(claims.room).map_err(|_| StreamingError::Unauthorized)?;
		let identity = Identity::new(claims.sub).map_err(|_| StreamingError::Unauthorized)?;
		Ok((room, identity, claims.publisher))
	}

	fn sign_claims(&self, claims: &GrantClaims) -> String {
		let payload = serde_json::to_vec(claims).expect("serialize grant claims");
		let payload_b64 = URL_SAFE_NO_PAD.encode(&payload);
		let sig = hmac_sign(payload_b64.as_bytes(), self.api_secret.expose().as_bytes());
		let sig_b64 = URL_SAFE_NO_PAD.encode(sig);
		format!("v1.{payload_b64}.{sig_b64}")
	}
}

fn hmac_sign(payload_b64: &[u8], secret: &[u8]) -> Vec<u8> {
	let mut mac = Hmac::<Sha256>::new_from_slice(secret).expect("hmac key");
	mac.update(payload_b64);
	mac.finalize().into_bytes().to_vec()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
	if a.len() != b.len() {
		return false;
	}
	let mut diff = 0u8;
	for (x, y) in a.iter().zip(b.iter()) {
		diff |= x ^ y;
	}
	diff == 0
}

fn unix_secs_now() -> u64 {
	SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn signer() -> Signer {
		Signer::new("key".into(), SecretString::new("secret"), "wss://media.invalid/sfu".into(), Duration::from_secs(3600))
	}

	#[test]
	fn issues_publisher_capabilities() {
		let s = signer();
		let room = RoomId::new("room-1").unwrap();
		let identity = Identity::new("alice").unwrap();
		let grant = s.issue(&room, &identity, true);
		assert!(grant.capabilities.publish);
		assert!(grant.capabilities.record);
	}

	#[test]
	fn issues_viewer_capabilities() {
		let s = signer();
		let room = RoomId::new("room-1").unwrap();
		let identity = Identity::new("bob").unwrap();
		let grant = s.issue(&room, &identity, false);
		assert!(!grant.capabilities.publish);
		assert!(grant.capabilities.subscribe);
	}

	#[test]
	fn round_trips_token() {
		let s = signer();
		let room = RoomId::new("room-1").unwrap();
		let identity = Identity::new("alice").unwrap();
		let grant = s.issue(&room, &identity, true);
		let (r, i, publisher) = s.verify(&grant.token).unwrap();
		assert_eq!(r, room);
		assert_eq!(i, identity);
		assert!(publisher);
	}

	#[test]
	fn rejects_tampered_token() {
		let s = signer();
		let room = RoomId::new("room-1").unwrap();
		let identity = Identity::new("alice").unwrap();
		let grant = s.issue(&room, &identity, true);
		let mut tampered = grant.token.clone();
		tampered.push('x');
		assert!(matches!(s.verify(&tampered), Err(StreamingError::Unauthorized)));
	}

	#[test]
	fn rejects_wrong_secret() {
		let s = signer();
		let other = Signer::new("key".into(), SecretString::new("other-secret"), "wss://media.invalid/sfu".into(), Duration::from_secs(3600));
		let room = RoomId::new("room-1").unwrap();
		let identity = Identity::new("alice").unwrap();
		let grant = s.issue(&room, &identity, true);
		assert!(matches!(other.verify(&grant.token), Err(StreamingError::Unauthorized)));
	}
}
