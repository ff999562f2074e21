//! Session payload codec.
//!
//! Artifacts carry an opaque, caller-defined session. The store only sees an
//! [`EncodedSession`]: the JSON encoding of the session plus the schema version
//! it was written with. Decoding into a concrete type happens at the caller's
//! side through [`decode`].

use crate::errors::StorageError;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A session type that can be attached to stored artifacts.
pub trait Session: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Version written alongside every encoded payload of this type.
    const SCHEMA_VERSION: u16 = 1;

    /// Migrate a payload written with an older `from_version` into the shape of
    /// [`Self::SCHEMA_VERSION`]. The default accepts the payload unchanged.
    fn upgrade(
        _from_version: u16,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value, String> {
        Ok(payload)
    }
}

/// Encoded session blob as persisted by the storage backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedSession {
    /// Schema version of `data`
    pub version: u16,
    /// JSON document bytes
    pub data: Vec<u8>,
}

/// Encode a session into its persisted form.
pub fn encode<S: Session>(session: &S) -> Result<EncodedSession, StorageError> {
    let data = serde_json::to_vec(session)
        .map_err(|e| StorageError::SerializationFailed(format!("Session encoding: {}", e)))?;
    Ok(EncodedSession {
        version: S::SCHEMA_VERSION,
        data,
    })
}

/// Decode a persisted session, upgrading payloads from older schema versions.
pub fn decode<S: Session>(encoded: &EncodedSession) -> Result<S, StorageError> {
    if encoded.version > S::SCHEMA_VERSION {
        return Err(malformed(format!(
            "payload version {} is newer than supported version {}",
            encoded.version,
            S::SCHEMA_VERSION
        )));
    }

    let mut value: serde_json::Value =
        serde_json::from_slice(&encoded.data).map_err(|e| malformed(e.to_string()))?;

    if encoded.version < S::SCHEMA_VERSION {
        tracing::debug!(
            from = encoded.version,
            to = S::SCHEMA_VERSION,
            "upgrading session payload"
        );
        value = S::upgrade(encoded.version, value).map_err(malformed)?;
    }

    serde_json::from_value(value).map_err(|e| malformed(e.to_string()))
}

fn malformed(reason: String) -> StorageError {
    tracing::warn!(error = %reason, "failed to decode session payload");
    StorageError::Malformed(reason)
}

/// General purpose session for callers without their own session type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DefaultSession {
    /// Subject the artifacts were issued for
    #[serde(default)]
    pub subject: String,
    /// Display name of the subject
    #[serde(default)]
    pub username: String,
    /// Expiry per token type, e.g. `access_token`, `refresh_token`
    #[serde(default)]
    pub expires_at: BTreeMap<String, DateTime<Utc>>,
    /// Additional claims
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl DefaultSession {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            ..Default::default()
        }
    }
}

impl Session for DefaultSession {
    const SCHEMA_VERSION: u16 = 2;

    // Version 1 stored the subject under `sub`.
    fn upgrade(
        from_version: u16,
        mut payload: serde_json::Value,
    ) -> Result<serde_json::Value, String> {
        if from_version == 1 {
            let object = payload
                .as_object_mut()
                .ok_or_else(|| "expected a JSON object".to_string())?;
            if let Some(subject) = object.remove("sub") {
                object.insert("subject".to_string(), subject);
            }
        }
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_round_trip() {
        let mut session = DefaultSession::new("user-1");
        session.username = "Alice".to_string();
        session.expires_at.insert(
            "access_token".to_string(),
            DateTime::from_timestamp(1_700_000_000, 0).unwrap() + Duration::hours(1),
        );
        session
            .extra
            .insert("amr".to_string(), serde_json::json!(["pwd", "otp"]));

        let encoded = encode(&session).unwrap();
        assert_eq!(encoded.version, 2);
        let decoded: DefaultSession = decode(&encoded).unwrap();
        assert_eq!(decoded, session);
    }

    #[test]
    fn test_upgrade_from_version_one() {
        let encoded = EncodedSession {
            version: 1,
            data: br#"{"sub":"legacy-user","username":"bob"}"#.to_vec(),
        };
        let decoded: DefaultSession = decode(&encoded).unwrap();
        assert_eq!(decoded.subject, "legacy-user");
        assert_eq!(decoded.username, "bob");
    }

    #[test]
    fn test_newer_version_is_malformed() {
        let encoded = EncodedSession {
            version: 9,
            data: b"{}".to_vec(),
        };
        let result: Result<DefaultSession, _> = decode(&encoded);
        assert!(matches!(result, Err(StorageError::Malformed(_))));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let encoded = EncodedSession {
            version: 2,
            data: b"\x00not json".to_vec(),
        };
        let result: Result<DefaultSession, _> = decode(&encoded);
        assert!(matches!(result, Err(StorageError::Malformed(_))));
    }

    #[test]
    fn test_float_claims_round_trip_exactly() {
        use rand::Rng;

        let mut values = vec![
            1.0715660391465826e-75,
            0.1 + 0.2,
            f64::MIN_POSITIVE,
            f64::MAX,
            -f64::MAX,
            5e-324,
        ];
        let mut rng = rand::thread_rng();
        while values.len() < 5_000 {
            let value = f64::from_bits(rng.r#gen());
            if value.is_finite() {
                values.push(value);
            }
        }

        let mut session = DefaultSession::new("user-1");
        for (i, value) in values.iter().enumerate() {
            session
                .extra
                .insert(format!("f{}", i), serde_json::json!(value));
        }

        let decoded: DefaultSession = decode(&encode(&session).unwrap()).unwrap();
        for (i, value) in values.iter().enumerate() {
            let restored = decoded.extra[&format!("f{}", i)].as_f64().unwrap();
            assert_eq!(restored.to_bits(), value.to_bits(), "float {:e}", value);
        }
    }
}
