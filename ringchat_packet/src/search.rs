/*! Lookup of a node by pseudonym.
*/

use serde::{Deserialize, Serialize};

use crate::identity::NodeId;

/// Default number of forwards a search may take before it is dropped.
pub const DEFAULT_SEARCH_TTL: u8 = 64;

fn default_ttl() -> u8 {
    DEFAULT_SEARCH_TTL
}

/** Request to find the node with a given `NodeId`.

The request is forwarded hop by hop along the ring. The node that knows the
wanted identity sends `==SEARCHRETURN==` straight to the requester address
carried in the request.

Serialized form (JSON): `{"username": <NodeId>, "ip": .., "port": .., "ttl": ..}`.
`ttl` is optional and defaults to [`DEFAULT_SEARCH_TTL`].
*/
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// `NodeId` of the wanted pseudonym.
    #[serde(rename = "username")]
    pub node_id: NodeId,
    /// Host of the requester.
    pub ip: String,
    /// Port of the requester.
    pub port: u16,
    /// Remaining number of forwards.
    #[serde(default = "default_ttl")]
    pub ttl: u8,
}

impl SearchRequest {
    /// Create a new request with the default hop limit.
    pub fn new(node_id: NodeId, ip: impl Into<String>, port: u16) -> SearchRequest {
        SearchRequest {
            node_id,
            ip: ip.into(),
            port,
            ttl: DEFAULT_SEARCH_TTL,
        }
    }

    /// Address of the requester in the `host:port` form.
    pub fn reply_address(&self) -> String {
        if self.ip.contains(':') {
            format!("[{}]:{}", self.ip, self.port)
        } else {
            format!("{}:{}", self.ip, self.port)
        }
    }

    /// The same request with one hop consumed, or `None` when the hop limit
    /// is exhausted.
    pub fn next_hop(&self) -> Option<SearchRequest> {
        self.ttl.checked_sub(1).map(|ttl| SearchRequest {
            ttl,
            ..self.clone()
        })
    }
}
