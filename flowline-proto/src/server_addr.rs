use alloc::{str::FromStr, string::String};
use core::{
    fmt::{self, Debug, Display, Write},
    net::IpAddr,
    ops::Deref,
};

use bytestring::ByteString;
use percent_encoding::{percent_decode_str, percent_encode, NON_ALPHANUMERIC};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::util::{parse_u16, ParseUintError};

const DEFAULT_PORT: u16 = 4222;

/// Address of a broker endpoint
///
/// Parsed from `[user[:password]@]host[:port]`, the plain form used in the
/// client's `hosts` list. There is no scheme: this client speaks one wire
/// protocol over one transport, so there is nothing for a scheme to select.
#[derive(Clone, PartialEq, Eq)]
pub struct ServerAddr {
    host: Host,
    port: u16,
    username: ByteString,
    password: ByteString,
}

/// The hostname of a broker endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Host {
    /// An IPv4 or IPv6 address
    Ip(IpAddr),
    /// A DNS hostname
    Dns(ByteString),
}

impl ServerAddr {
    /// Get the hostname
    pub fn host(&self) -> &Host {
        &self.host
    }

    /// Get the port
    pub fn port(&self) -> u16 {
        self.port
    }

    fn is_default_port(&self) -> bool {
        self.port == DEFAULT_PORT
    }

    /// Get the username
    pub fn username(&self) -> Option<&str> {
        if self.username.is_empty() {
            None
        } else {
            Some(&self.username)
        }
    }

    /// Get the password
    pub fn password(&self) -> Option<&str> {
        if self.password.is_empty() {
            None
        } else {
            Some(&self.password)
        }
    }
}

impl FromStr for ServerAddr {
    type Err = ServerAddrError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (userinfo, rest) = match value.rsplit_once('@') {
            Some((userinfo, rest)) => (Some(userinfo), rest),
            None => (None, value),
        };

        let (username, password) = match userinfo {
            Some(userinfo) => {
                let (username, password) = userinfo.split_once(':').unwrap_or((userinfo, ""));
                let username = percent_decode_str(username)
                    .decode_utf8()
                    .map_err(|_| ServerAddrError::UsernameInvalidUtf8)?
                    .deref()
                    .into();
                let password = percent_decode_str(password)
                    .decode_utf8()
                    .map_err(|_| ServerAddrError::PasswordInvalidUtf8)?
                    .deref()
                    .into();
                (username, password)
            }
            None => (ByteString::new(), ByteString::new()),
        };

        if rest.is_empty() {
            return Err(ServerAddrError::MissingHost);
        }

        let (host_part, port) = if let Some(bracket_end) = rest.strip_prefix('[') {
            let (host_part, rest) = bracket_end
                .split_once(']')
                .ok_or(ServerAddrError::InvalidHost)?;
            let port = match rest.strip_prefix(':') {
                Some(port) => parse_port(port)?,
                None => DEFAULT_PORT,
            };
            (host_part, port)
        } else {
            match rest.rsplit_once(':') {
                Some((host_part, port)) => (host_part, parse_port(port)?),
                None => (rest, DEFAULT_PORT),
            }
        };

        let host = match host_part.parse::<IpAddr>() {
            Ok(ip) => Host::Ip(ip),
            Err(_) => {
                if host_part.is_empty() {
                    return Err(ServerAddrError::MissingHost);
                }
                Host::Dns(host_part.into())
            }
        };

        Ok(Self {
            host,
            port,
            username,
            password,
        })
    }
}

fn parse_port(value: &str) -> Result<u16, ServerAddrError> {
    parse_u16(value.as_bytes()).map_err(ServerAddrError::InvalidPort)
}

impl Debug for ServerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let username = if self.username.is_empty() {
            "<none>"
        } else {
            "<redacted>"
        };
        let password = if self.password.is_empty() {
            "<none>"
        } else {
            "<redacted>"
        };
        f.debug_struct("ServerAddr")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &username)
            .field("password", &password)
            .finish()
    }
}

impl Display for ServerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(username) = self.username() {
            Display::fmt(&percent_encode(username.as_bytes(), NON_ALPHANUMERIC), f)?;

            if let Some(password) = self.password() {
                write!(
                    f,
                    ":{}",
                    percent_encode(password.as_bytes(), NON_ALPHANUMERIC)
                )?;
            }
            f.write_char('@')?;
        }

        match &self.host {
            Host::Ip(IpAddr::V4(addr)) => Display::fmt(addr, f)?,
            Host::Ip(IpAddr::V6(addr)) => write!(f, "[{addr}]")?,
            Host::Dns(record) => Display::fmt(record, f)?,
        }
        if !self.is_default_port() {
            write!(f, ":{}", self.port)?;
        }

        Ok(())
    }
}

impl<'de> Deserialize<'de> for ServerAddr {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let val = String::deserialize(deserializer)?;
        val.parse().map_err(de::Error::custom)
    }
}

impl Serialize for ServerAddr {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

/// An error encountered while parsing [`ServerAddr`]
#[derive(Debug, thiserror::Error)]
pub enum ServerAddrError {
    /// The host part is malformed (e.g. an unterminated `[...]`)
    #[error("invalid host")]
    InvalidHost,
    /// The address is missing the hostname
    #[error("missing host")]
    MissingHost,
    /// The port could not be parsed
    #[error("invalid port")]
    InvalidPort(#[source] ParseUintError),
    /// The address contains a non-utf8 username
    #[error("username is not utf-8")]
    UsernameInvalidUtf8,
    /// The address contains a non-utf8 password
    #[error("password is not utf-8")]
    PasswordInvalidUtf8,
}
