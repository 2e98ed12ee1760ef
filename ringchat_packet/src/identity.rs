/*! Node identity: who a node is and where it can be reached.
*/

use std::fmt;

use ringchat_crypto::{hash_pseudonym, PublicKey, KEY_SIZE};
use serde::{Deserialize, Serialize};

/** Position of a node on the ring.

The identifier is the hex SHA-256 digest of a pseudonym. Identifiers are
ordered as strings, which for fixed length lowercase hex is the same as
ordering the digests as big-endian numbers. The empty identifier marks a
missing neighbor.
*/
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Identifier of a pseudonym.
    pub fn from_pseudonym(pseudonym: &str) -> NodeId {
        NodeId(hash_pseudonym(pseudonym))
    }

    /// Check if this is the identifier of a missing neighbor.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        NodeId(id)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        NodeId(id.to_owned())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("<none>")
        } else {
            let short: String = self.0.chars().take(12).collect();
            f.write_str(&short)
        }
    }
}

/** Everything peers need to know about a node.

Serialized form (JSON):

Field       | Content
----------- | ------
`ip`        | host the node listens on
`port`      | TCP port the node listens on
`user`      | pseudonym
`publickey` | hex encoded long-term `PublicKey`, empty if unknown
`nodeid`    | `NodeId` of the pseudonym

The default value is the sentinel of a missing neighbor: every field empty
and port `0`.
*/
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeIdentity {
    /// Host the node listens on.
    pub ip: String,
    /// Port the node listens on.
    pub port: u16,
    /// Pseudonym chosen by the user of the node.
    #[serde(rename = "user")]
    pub pseudonym: String,
    /// Long-term `PublicKey` used to seal circuit keys for this node.
    #[serde(rename = "publickey", with = "public_key_hex")]
    pub public_key: Option<PublicKey>,
    /// Position on the ring.
    #[serde(rename = "nodeid")]
    pub node_id: NodeId,
}

impl NodeIdentity {
    /// Create identity deriving `NodeId` from the pseudonym.
    pub fn new(ip: impl Into<String>, port: u16, pseudonym: impl Into<String>, public_key: PublicKey) -> NodeIdentity {
        let pseudonym = pseudonym.into();
        NodeIdentity {
            ip: ip.into(),
            port,
            node_id: NodeId::from_pseudonym(&pseudonym),
            pseudonym,
            public_key: Some(public_key),
        }
    }

    /// Sentinel of a missing neighbor.
    pub fn empty() -> NodeIdentity {
        NodeIdentity::default()
    }

    /// Check if this is the sentinel of a missing neighbor.
    pub fn is_empty(&self) -> bool {
        self.node_id.is_empty()
    }

    /// Address to connect to in the `host:port` form.
    pub fn address(&self) -> String {
        if self.ip.contains(':') {
            format!("[{}]:{}", self.ip, self.port)
        } else {
            format!("{}:{}", self.ip, self.port)
        }
    }
}

impl fmt::Display for NodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str("<none>")
        } else {
            write!(f, "{} ({}) at {}", self.pseudonym, self.node_id, self.address())
        }
    }
}

/// Serde helpers storing an optional `PublicKey` as hex, empty when absent.
pub mod public_key_hex {
    use super::*;
    use hex::FromHex;
    use serde::{de, Deserializer, Serializer};

    /// Serialize optional key as hex string.
    pub fn serialize<S: Serializer>(pk: &Option<PublicKey>, serializer: S) -> Result<S::Ok, S::Error> {
        match pk {
            Some(pk) => serializer.serialize_str(&hex::encode(pk.as_bytes())),
            None => serializer.serialize_str(""),
        }
    }

    /// Deserialize optional key from hex string.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<PublicKey>, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s.is_empty() {
            return Ok(None);
        }

        let pk_bytes: [u8; KEY_SIZE] = FromHex::from_hex(&s)
            .map_err(|e| de::Error::custom(format!("Can't make public key from hex string {:?}", e)))?;
        Ok(Some(PublicKey::from(pk_bytes)))
    }
}
