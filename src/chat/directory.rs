use crate::common::Peer;

/// Reachable peers, replaced wholesale on every refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directory {
    peers: Vec<Peer>,
    in_flight: usize,
}

impl Directory {
    pub fn peers(&self) -> &[Peer] {
        &self.peers
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight > 0
    }

    pub fn find(&self, peer_id: &str) -> Option<&Peer> {
        self.peers.iter().find(|peer| peer.id == peer_id)
    }

    pub(crate) fn begin_refresh(&mut self) {
        self.in_flight += 1;
    }

    pub(crate) fn replace(&mut self, peers: Vec<Peer>) {
        self.settle();
        self.peers = peers;
    }

    /// A failed refresh drops the old list instead of keeping stale data.
    pub(crate) fn fail(&mut self) {
        self.settle();
        self.peers.clear();
    }

    fn settle(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loading_until_last_refresh_settles() {
        let mut directory = Directory::default();
        directory.begin_refresh();
        directory.begin_refresh();
        assert!(directory.is_loading());

        directory.replace(vec![Peer::new("a", "Alice")]);
        assert!(directory.is_loading());

        directory.replace(vec![Peer::new("b", "Bob")]);
        assert!(!directory.is_loading());
        assert_eq!(directory.find("b").map(|peer| peer.display_name.as_str()), Some("Bob"));
        assert!(directory.find("a").is_none());
    }

    #[test]
    fn failure_clears_previous_peers() {
        let mut directory = Directory::default();
        directory.begin_refresh();
        directory.replace(vec![Peer::new("a", "Alice")]);

        directory.begin_refresh();
        directory.fail();
        assert!(directory.peers().is_empty());
        assert!(!directory.is_loading());
    }
}
