//! Connection handshake (spec.md §4.8): the first control container a
//! session exchanges carries `session_type`, `connection_key`, the
//! compression flag, the bridge-line flag, and a snipping-target list.
//! `is_confirmed` only turns true once the peer echoes back a matching key.
//!
//! Grounded on `messaging_client.h`'s handshake-related setters
//! (`set_session_types`, `set_connection_key`, `set_bridge_line`,
//! `set_snipping_targets`) and on `flux::contract`'s split between building
//! a typed request and projecting it to/from the wire container.

use meshwire_proto::{Container, Value};
use meshwire_support::{MeshError, MeshResult};

pub const MESSAGE_TYPE_CONNECTION: &str = "connection";
pub const MESSAGE_TYPE_CONFIRM: &str = "confirm";

/// The role a session plays in a handshake. The spec leaves the concrete
/// set of session types unstated; this mirrors the roles a peer connection
/// actually takes in this fabric (plain client, a server accepting
/// connections, and a relay that also bridges traffic onward).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SessionType {
    Requester,
    Provider,
    Relay,
}

impl SessionType {
    fn as_str(self) -> &'static str {
        match self {
            SessionType::Requester => "requester",
            SessionType::Provider => "provider",
            SessionType::Relay => "relay",
        }
    }

    fn parse(text: &str) -> Option<SessionType> {
        Some(match text {
            "requester" => SessionType::Requester,
            "provider" => SessionType::Provider,
            "relay" => SessionType::Relay,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct HandshakeRequest {
    pub session_type: SessionType,
    pub connection_key: String,
    pub compress: bool,
    pub encrypt: bool,
    pub bridge_line: bool,
    pub snipping_targets: Vec<String>,
}

impl HandshakeRequest {
    pub fn to_container(&self, source_id: &str, source_sub_id: &str) -> Container {
        let mut container = Container::new(MESSAGE_TYPE_CONNECTION, "1");
        container.set_source(source_id, source_sub_id);

        container.add(Value::string("session_type", self.session_type.as_str()));
        container.add(Value::string("connection_key", self.connection_key.clone()));
        container.add(Value::bool("compress_mode", self.compress));
        container.add(Value::bool("encrypt_mode", self.encrypt));
        container.add(Value::bool("bridge_mode", self.bridge_line));

        let targets: Vec<Value> = self
            .snipping_targets
            .iter()
            .map(|t| Value::string("target", t.clone()))
            .collect();
        container.add(Value::container("snipping_targets", targets));

        container
    }

    pub fn from_container(container: &Container) -> MeshResult<HandshakeRequest> {
        if container.message_type() != MESSAGE_TYPE_CONNECTION {
            return Err(MeshError::Protocol("not a connection handshake container"));
        }
        let values = container.values()?;

        let get = |name: &str| values.iter().find(|v| v.name() == name);

        let session_type = get("session_type")
            .and_then(|v| SessionType::parse(&v.as_string()))
            .ok_or(MeshError::Protocol("missing or unknown session_type"))?;
        let connection_key = get("connection_key").map(|v| v.as_string()).unwrap_or_default();
        let compress = get("compress_mode").map(|v| v.as_bool()).unwrap_or(false);
        let encrypt = get("encrypt_mode").map(|v| v.as_bool()).unwrap_or(false);
        let bridge_line = get("bridge_mode").map(|v| v.as_bool()).unwrap_or(false);
        let snipping_targets = get("snipping_targets")
            .map(|v| v.children().iter().map(|c| c.as_string()).collect())
            .unwrap_or_default();

        Ok(HandshakeRequest { session_type, connection_key, compress, encrypt, bridge_line, snipping_targets })
    }
}

/// Builds the confirmation container a peer sends back once it has
/// validated the connection key.
pub fn confirm_container(source_id: &str, source_sub_id: &str, connection_key: &str) -> Container {
    let mut container = Container::new(MESSAGE_TYPE_CONFIRM, "1");
    container.set_source(source_id, source_sub_id);
    container.add(Value::string("connection_key", connection_key));
    container
}

/// True when `container` is a confirm message carrying the expected key.
pub fn is_matching_confirm(container: &Container, expected_key: &str) -> MeshResult<bool> {
    if container.message_type() != MESSAGE_TYPE_CONFIRM {
        return Ok(false);
    }
    let key = container.values()?.iter().find(|v| v.name() == "connection_key").map(|v| v.as_string());
    Ok(key.as_deref() == Some(expected_key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_round_trips_through_container() {
        let req = HandshakeRequest {
            session_type: SessionType::Requester,
            connection_key: "secret".to_string(),
            compress: true,
            encrypt: false,
            bridge_line: true,
            snipping_targets: vec!["node-b".to_string(), "node-c".to_string()],
        };

        let container = req.to_container("node-a", "");
        let parsed = HandshakeRequest::from_container(&container).unwrap();

        assert_eq!(parsed.session_type, SessionType::Requester);
        assert_eq!(parsed.connection_key, "secret");
        assert!(parsed.compress);
        assert!(!parsed.encrypt);
        assert!(parsed.bridge_line);
        assert_eq!(parsed.snipping_targets, vec!["node-b", "node-c"]);
    }

    #[test]
    fn confirm_matches_expected_key_only() {
        let container = confirm_container("node-b", "", "secret");
        assert!(is_matching_confirm(&container, "secret").unwrap());
        assert!(!is_matching_confirm(&container, "other").unwrap());
    }
}
