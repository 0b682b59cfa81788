use flowline_proto::ServerAddr;

use crate::error::ArgumentError;

/// A single configured broker endpoint, with the success/failure counters
/// the engine maintains across reconnects.
#[derive(Debug, Clone)]
pub struct Endpoint {
    address: ServerAddr,
    success_count: u64,
    failure_count: u64,
}

impl Endpoint {
    fn new(address: ServerAddr) -> Self {
        Self {
            address,
            success_count: 0,
            failure_count: 0,
        }
    }

    /// The endpoint's address. Identity of an [`Endpoint`] is its address.
    #[must_use]
    pub fn address(&self) -> &ServerAddr {
        &self.address
    }

    /// How many times a connection to this endpoint has succeeded.
    #[must_use]
    pub fn success_count(&self) -> u64 {
        self.success_count
    }

    /// How many times a connection to this endpoint has failed.
    #[must_use]
    pub fn failure_count(&self) -> u64 {
        self.failure_count
    }

    pub(crate) fn record_success(&mut self) {
        self.success_count += 1;
    }

    pub(crate) fn record_failure(&mut self) {
        self.failure_count += 1;
    }
}

/// An ordered, round-robin rotation of [`Endpoint`]s.
///
/// Owned exclusively by the connection engine; there is no need for interior
/// mutability since only the engine's single task ever touches it.
#[derive(Debug)]
pub(crate) struct ServerList {
    endpoints: Vec<Endpoint>,
    cursor: usize,
    current: usize,
}

impl ServerList {
    pub(crate) fn new(addresses: Vec<ServerAddr>) -> Result<Self, ArgumentError> {
        if addresses.is_empty() {
            return Err(ArgumentError::EmptyHosts);
        }

        Ok(Self {
            endpoints: addresses.into_iter().map(Endpoint::new).collect(),
            cursor: 0,
            current: 0,
        })
    }

    /// Returns the next endpoint in round-robin order, wrapping at the end.
    ///
    /// # Panics
    ///
    /// Panics in debug builds if the list is empty; this cannot happen
    /// through [`ServerList::new`], which rejects an empty host list.
    pub(crate) fn next_server(&mut self) -> &mut Endpoint {
        debug_assert!(!self.endpoints.is_empty(), "ServerList must not be empty");

        let idx = self.cursor % self.endpoints.len();
        self.cursor = self.cursor.wrapping_add(1);
        self.current = idx;
        &mut self.endpoints[idx]
    }

    /// The endpoint last handed out by [`ServerList::next_server`].
    pub(crate) fn current_server(&self) -> &Endpoint {
        &self.endpoints[self.current]
    }

    pub(crate) fn current_server_mut(&mut self) -> &mut Endpoint {
        &mut self.endpoints[self.current]
    }

    pub(crate) fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::ServerList;

    fn addr(s: &str) -> flowline_proto::ServerAddr {
        flowline_proto::ServerAddr::from_str(s).unwrap()
    }

    #[test]
    fn empty_is_rejected() {
        assert!(ServerList::new(Vec::new()).is_err());
    }

    #[test]
    fn round_robins() {
        let mut list = ServerList::new(vec![addr("a:4222"), addr("b:4222"), addr("c:4222")])
            .expect("non-empty list");

        let first = list.next_server().address().clone();
        let second = list.next_server().address().clone();
        let third = list.next_server().address().clone();
        let fourth = list.next_server().address().clone();

        assert_eq!(first, addr("a:4222"));
        assert_eq!(second, addr("b:4222"));
        assert_eq!(third, addr("c:4222"));
        assert_eq!(fourth, addr("a:4222"));
    }

    #[test]
    fn current_tracks_last_next() {
        let mut list = ServerList::new(vec![addr("a:4222"), addr("b:4222")]).unwrap();
        list.next_server();
        let next = list.next_server().address().clone();
        assert_eq!(list.current_server().address(), &next);
    }

    #[test]
    fn endpoints_snapshot_reflects_recorded_outcomes() {
        let mut list = ServerList::new(vec![addr("a:4222"), addr("b:4222")]).unwrap();

        list.next_server().record_success();
        list.next_server().record_failure();
        list.current_server_mut().record_failure();

        let snapshot = list.endpoints();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].success_count(), 1);
        assert_eq!(snapshot[0].failure_count(), 0);
        assert_eq!(snapshot[1].success_count(), 0);
        assert_eq!(snapshot[1].failure_count(), 2);
    }
}
