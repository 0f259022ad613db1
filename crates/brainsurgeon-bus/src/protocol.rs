// SPDX-FileCopyrightText: 2026 BrainSurgeon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prune/restore request-response on top of the bus.
//!
//! Messages carry no correlation id. A prune response answers the latest
//! unanswered prune request for the same (agent, session); a restore response
//! additionally matches on the tool-call id. [`Correlator`] implements that
//! rule for callers in this process that want to wait for an answer.

use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use brainsurgeon_core::{
    BrainsurgeonError, Message, MessagePayload, MessageType, PruneRequest, PruneResponse,
    RestoreRequest, RestoreResponse,
};

use crate::bus::MessageBus;
use crate::dispatcher::Subscription;
use crate::handler::handler_fn;

/// Correlation key for prune round-trips.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PruneKey {
    pub agent_id: String,
    pub session_id: String,
}

impl From<&PruneRequest> for PruneKey {
    fn from(r: &PruneRequest) -> Self {
        Self {
            agent_id: r.agent_id.clone(),
            session_id: r.session_id.clone(),
        }
    }
}

impl From<&PruneResponse> for PruneKey {
    fn from(r: &PruneResponse) -> Self {
        Self {
            agent_id: r.agent_id.clone(),
            session_id: r.session_id.clone(),
        }
    }
}

/// Correlation key for restore round-trips.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RestoreKey {
    pub agent_id: String,
    pub session_id: String,
    pub tool_call_id: String,
}

impl From<&RestoreRequest> for RestoreKey {
    fn from(r: &RestoreRequest) -> Self {
        Self {
            agent_id: r.agent_id.clone(),
            session_id: r.session_id.clone(),
            tool_call_id: r.tool_call_id.clone(),
        }
    }
}

impl From<&RestoreResponse> for RestoreKey {
    fn from(r: &RestoreResponse) -> Self {
        Self {
            agent_id: r.agent_id.clone(),
            session_id: r.session_id.clone(),
            tool_call_id: r.tool_call_id.clone(),
        }
    }
}

/// A registered wait for one response.
pub struct Ticket<R> {
    id: u64,
    rx: oneshot::Receiver<R>,
}

/// In-process table of callers waiting for responses, keyed by `K`.
pub struct Correlator<K, R> {
    waiters: DashMap<K, Vec<(u64, oneshot::Sender<R>)>>,
    next_id: AtomicU64,
}

impl<K, R> Default for Correlator<K, R>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            waiters: DashMap::new(),
            next_id: AtomicU64::new(0),
        }
    }
}

impl<K, R> Correlator<K, R>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in the next response for `key`. Register before
    /// publishing the request so a fast answer cannot slip past.
    pub fn register(&self, key: K) -> Ticket<R> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.waiters.entry(key).or_default().push((id, tx));
        Ticket { id, rx }
    }

    /// Hand `response` to the most recently registered live waiter for
    /// `key`. Returns `false` when nobody is waiting.
    pub fn complete(&self, key: &K, response: R) -> bool {
        let mut response = response;
        let delivered = match self.waiters.get_mut(key) {
            Some(mut list) => loop {
                let Some((id, tx)) = list.pop() else {
                    break false;
                };
                match tx.send(response) {
                    Ok(()) => {
                        debug!(waiter = id, "response delivered");
                        break true;
                    }
                    // That caller gave up; try the next older one.
                    Err(back) => response = back,
                }
            },
            None => false,
        };
        self.waiters.remove_if(key, |_, list| list.is_empty());
        delivered
    }

    /// Drop a waiter that is no longer interested (timed out, publish failed).
    pub fn cancel(&self, key: &K, ticket_id: u64) {
        if let Some(mut list) = self.waiters.get_mut(key) {
            list.retain(|(id, _)| *id != ticket_id);
        }
        self.waiters.remove_if(key, |_, list| list.is_empty());
    }

    /// Wait on a ticket for at most `timeout`.
    pub async fn wait(
        &self,
        key: &K,
        ticket: Ticket<R>,
        timeout: Duration,
    ) -> Result<R, BrainsurgeonError> {
        let Ticket { id, rx } = ticket;
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(BrainsurgeonError::Internal(
                "response waiter dropped without an answer".to_string(),
            )),
            Err(_) => {
                self.cancel(key, id);
                Err(BrainsurgeonError::Timeout { duration: timeout })
            }
        }
    }

    /// Number of callers currently waiting, across all keys.
    pub fn pending(&self) -> usize {
        self.waiters.iter().map(|e| e.value().len()).sum()
    }
}

impl<R> Ticket<R> {
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Requester-side helper: publishes requests and, on demand, waits for the
/// correlated response.
///
/// Waiting only works while something dispatches the response types in
/// this process, normally the running bus.
pub struct ProtocolClient {
    bus: Arc<MessageBus>,
    prunes: Arc<Correlator<PruneKey, PruneResponse>>,
    restores: Arc<Correlator<RestoreKey, RestoreResponse>>,
    subscriptions: Vec<Subscription>,
}

impl ProtocolClient {
    /// Subscribe response handlers on `bus`.
    pub fn attach(bus: Arc<MessageBus>) -> Self {
        let prunes: Arc<Correlator<PruneKey, PruneResponse>> = Arc::new(Correlator::new());
        let restores: Arc<Correlator<RestoreKey, RestoreResponse>> = Arc::new(Correlator::new());

        let prune_sub = {
            let prunes = Arc::clone(&prunes);
            bus.subscribe(
                MessageType::PruneResponse,
                handler_fn("prune-correlator", move |msg: Message| {
                    let prunes = Arc::clone(&prunes);
                    async move {
                        if let MessagePayload::PruneResponse(resp) = msg.payload {
                            let key = PruneKey::from(&resp);
                            if !prunes.complete(&key, resp) {
                                debug!(id = %msg.id, "prune response with no local waiter");
                            }
                        }
                        Ok::<(), BrainsurgeonError>(())
                    }
                }),
            )
        };

        let restore_sub = {
            let restores = Arc::clone(&restores);
            bus.subscribe(
                MessageType::RestoreResponse,
                handler_fn("restore-correlator", move |msg: Message| {
                    let restores = Arc::clone(&restores);
                    async move {
                        if let MessagePayload::RestoreResponse(resp) = msg.payload {
                            let key = RestoreKey::from(&resp);
                            if !restores.complete(&key, resp) {
                                debug!(id = %msg.id, "restore response with no local waiter");
                            }
                        }
                        Ok::<(), BrainsurgeonError>(())
                    }
                }),
            )
        };

        Self {
            bus,
            prunes,
            restores,
            subscriptions: vec![prune_sub, restore_sub],
        }
    }

    pub fn bus(&self) -> &Arc<MessageBus> {
        &self.bus
    }

    /// Publish a prune request and return immediately.
    pub async fn request_prune(&self, request: PruneRequest) -> Result<Message, BrainsurgeonError> {
        self.bus.publish(request).await
    }

    /// Publish a restore request and return immediately.
    pub async fn request_restore(
        &self,
        request: RestoreRequest,
    ) -> Result<Message, BrainsurgeonError> {
        self.bus.publish(request).await
    }

    /// Publish a prune request and wait up to `timeout` for its response.
    ///
    /// A handled failure comes back as `Ok` with `success == false`.
    pub async fn prune(
        &self,
        request: PruneRequest,
        timeout: Duration,
    ) -> Result<PruneResponse, BrainsurgeonError> {
        let key = PruneKey::from(&request);
        let ticket = self.prunes.register(key.clone());
        let ticket_id = ticket.id();
        if let Err(e) = self.bus.publish(request).await {
            self.prunes.cancel(&key, ticket_id);
            return Err(e);
        }
        let result = self.prunes.wait(&key, ticket, timeout).await;
        if result.is_err() {
            warn!(agent = %key.agent_id, session = %key.session_id, "no prune response");
        }
        result
    }

    /// Publish a restore request and wait up to `timeout` for its response.
    pub async fn restore(
        &self,
        request: RestoreRequest,
        timeout: Duration,
    ) -> Result<RestoreResponse, BrainsurgeonError> {
        let key = RestoreKey::from(&request);
        let ticket = self.restores.register(key.clone());
        let ticket_id = ticket.id();
        if let Err(e) = self.bus.publish(request).await {
            self.restores.cancel(&key, ticket_id);
            return Err(e);
        }
        let result = self.restores.wait(&key, ticket, timeout).await;
        if result.is_err() {
            warn!(
                agent = %key.agent_id,
                session = %key.session_id,
                tool_call = %key.tool_call_id,
                "no restore response"
            );
        }
        result
    }

    /// Remove the response handlers from the bus.
    pub fn detach(self) {
        for sub in self.subscriptions {
            sub.unsubscribe();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn key(s: &str) -> PruneKey {
        PruneKey {
            agent_id: "a".into(),
            session_id: s.into(),
        }
    }

    fn resp(s: &str, n: u32) -> PruneResponse {
        PruneResponse {
            agent_id: "a".into(),
            session_id: s.into(),
            externalized: n,
            success: true,
            error: None,
        }
    }

    #[tokio::test]
    async fn complete_wakes_matching_waiter() {
        let c = Correlator::new();
        let t = c.register(key("s1"));
        assert!(c.complete(&key("s1"), resp("s1", 3)));
        let got = c.wait(&key("s1"), t, Duration::from_secs(1)).await.unwrap();
        assert_eq!(got.externalized, 3);
        assert_eq!(c.pending(), 0);
    }

    #[tokio::test]
    async fn most_recent_waiter_wins() {
        let c = Correlator::new();
        let older = c.register(key("s1"));
        let newer = c.register(key("s1"));
        assert!(c.complete(&key("s1"), resp("s1", 1)));

        let got = c
            .wait(&key("s1"), newer, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(got.externalized, 1);
        assert_eq!(c.pending(), 1);

        assert!(c.complete(&key("s1"), resp("s1", 2)));
        let got = c
            .wait(&key("s1"), older, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(got.externalized, 2);
    }

    #[tokio::test]
    async fn abandoned_waiter_is_skipped() {
        let c = Correlator::new();
        let older = c.register(key("s1"));
        let newer = c.register(key("s1"));
        drop(newer);
        assert!(c.complete(&key("s1"), resp("s1", 4)));
        let got = c
            .wait(&key("s1"), older, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(got.externalized, 4);
    }

    #[test]
    fn response_without_waiter_is_ignored() {
        let c: Correlator<PruneKey, PruneResponse> = Correlator::new();
        let _other = c.register(key("s2"));
        assert!(!c.complete(&key("s1"), resp("s1", 0)));
        assert_eq!(c.pending(), 1);
    }

    #[tokio::test]
    async fn wait_times_out_and_cleans_up() {
        let c: Correlator<PruneKey, PruneResponse> = Correlator::new();
        let t = c.register(key("s1"));
        let err = c
            .wait(&key("s1"), t, Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, BrainsurgeonError::Timeout { .. }));
        assert_eq!(c.pending(), 0);
    }

    #[test]
    fn restore_key_ignores_outcome_fields() {
        let req = RestoreRequest {
            agent_id: "a".into(),
            session_id: "s".into(),
            tool_call_id: "call_1".into(),
        };
        let ok = RestoreResponse::succeeded(&req);
        let failed = RestoreResponse::failed(&req, "gone");
        assert_eq!(RestoreKey::from(&req), RestoreKey::from(&ok));
        assert_eq!(RestoreKey::from(&ok), RestoreKey::from(&failed));
    }

    proptest! {
        #[test]
        fn every_registered_waiter_is_answered_once(n in 1usize..20) {
            let c: Correlator<PruneKey, PruneResponse> = Correlator::new();
            let mut tickets: Vec<_> = (0..n).map(|_| c.register(key("s"))).collect();
            for i in 0..n {
                prop_assert!(c.complete(&key("s"), resp("s", i as u32)));
            }
            prop_assert!(!c.complete(&key("s"), resp("s", 99)));
            // LIFO: the last ticket got the first response.
            for (i, ticket) in tickets.iter_mut().rev().enumerate() {
                prop_assert_eq!(ticket.rx.try_recv().unwrap().externalized, i as u32);
            }
        }
    }
}
