use alloc::string::String;

use serde::Serialize;

/// The JSON body of a `CONNECT` frame
///
/// Sent once right after the transport comes up, carrying the only
/// authentication this client understands: an optional user/password pair.
#[derive(Debug, Serialize)]
pub struct Connect {
    pub verbose: bool,
    pub pedantic: bool,
    #[serde(rename = "user")]
    pub username: Option<String>,
    #[serde(rename = "pass")]
    pub password: Option<String>,
}
