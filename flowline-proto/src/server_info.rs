use alloc::{string::String, vec::Vec};
use core::num::NonZeroU32;

use serde::Deserialize;

use crate::ServerAddr;

/// The JSON body of an `INFO` frame
///
/// The engine uses its arrival only to trigger the `CONNECT` handshake.
/// `connect_urls` is deserialized but deliberately not mined for cluster
/// peers: discovering new endpoints this way is left for a future revision.
#[derive(Debug, PartialEq, Eq, Deserialize)]
pub struct ServerInfo {
    #[serde(rename = "server_id")]
    pub id: String,
    pub version: String,
    pub max_payload: NonZeroU32,
    #[serde(rename = "proto")]
    pub protocol_version: u32,
    #[serde(default)]
    pub auth_required: bool,
    #[serde(default)]
    pub connect_urls: Vec<ServerAddr>,
}
