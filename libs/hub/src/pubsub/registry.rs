//! # Topic Registry
//!
//! Pure bookkeeping owned by the pub/sub actor: a forward map
//! (topic → subscribers) and a reverse map (subscriber → topics + delivery
//! channel), always mutated together.
//!
//! ```text
//! topics:      "room1" -> {A, B}        subscribers: A -> (tx_A, {"room1", "lobby"})
//!              "lobby" -> {A}                        B -> (tx_B, {"room1"})
//! ```
//!
//! ## Invariants
//! - A subscriber is present in `subscribers` iff it is in at least one
//!   topic's set, and every topic in a subscriber's set lists that subscriber.
//! - A subscriber's delivery channel is released (its sender dropped) exactly
//!   once, inside [`Registry::remove`], when its last topic membership goes
//!   away. No other path drops it.
//!
//! The registry has no locking of its own; only the actor touches it.

use super::SubscriberId;
use crate::Envelope;
use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, trace};

/// Delivery channel and topic set of one subscriber
struct Subscriber {
    sender: mpsc::Sender<Envelope>,
    topics: HashSet<String>,
}

/// Registry statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicStats {
    pub total_topics: usize,
    pub total_subscribers: usize,
    pub total_subscriptions: usize,
    /// Subscriber count per topic
    pub topics: HashMap<String, usize>,
}

impl TopicStats {
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.get(topic).copied().unwrap_or(0)
    }
}

#[derive(Default)]
pub(crate) struct Registry {
    topics: HashMap<String, HashSet<SubscriberId>>,
    subscribers: HashMap<SubscriberId, Subscriber>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `id` to `topic`; idempotent
    ///
    /// The first sender registered for a subscriber is kept for as long as it
    /// has memberships.
    pub fn add(&mut self, topic: &str, id: SubscriberId, sender: &mpsc::Sender<Envelope>) {
        self.topics.entry(topic.to_string()).or_default().insert(id);

        self.subscribers
            .entry(id)
            .or_insert_with(|| Subscriber {
                sender: sender.clone(),
                topics: HashSet::new(),
            })
            .topics
            .insert(topic.to_string());

        trace!("Subscriber {} subscribed to topic {}", id, topic);
    }

    /// Deliver to every subscriber of `topic`, waiting for buffer space
    ///
    /// A full subscriber stalls the caller until its write pump drains it.
    pub async fn send(&self, topic: &str, envelope: &Envelope) -> usize {
        let mut delivered = 0;
        for sender in self.senders(topic) {
            if sender.send(envelope.clone()).await.is_ok() {
                delivered += 1;
            } else {
                // Receiver gone; the session's UnsubscribeAll is on its way
                debug!("Subscriber on topic {} has no receiver", topic);
            }
        }
        delivered
    }

    /// Deliver to every subscriber of `topic` that has buffer space right now
    pub fn send_async(&self, topic: &str, envelope: &Envelope) -> usize {
        let mut delivered = 0;
        for sender in self.senders(topic) {
            match sender.try_send(envelope.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    debug!("Subscriber buffer full on topic {}, message skipped", topic);
                }
                Err(TrySendError::Closed(_)) => {
                    debug!("Subscriber on topic {} has no receiver", topic);
                }
            }
        }
        delivered
    }

    /// Remove one membership; returns true if this released the subscriber's channel
    pub fn remove(&mut self, topic: &str, id: SubscriberId) -> bool {
        let Some(members) = self.topics.get_mut(topic) else {
            return false;
        };

        if !members.remove(&id) {
            return false;
        }

        if members.is_empty() {
            self.topics.remove(topic);
        }

        let Some(subscriber) = self.subscribers.get_mut(&id) else {
            return false;
        };

        subscriber.topics.remove(topic);
        trace!("Subscriber {} unsubscribed from topic {}", id, topic);

        if subscriber.topics.is_empty() {
            // Dropping the entry drops the registry's sender: the channel close
            self.subscribers.remove(&id);
            debug!("Subscriber {} released (no topics left)", id);
            return true;
        }

        false
    }

    /// Force every subscriber off `topic`
    pub fn remove_topic(&mut self, topic: &str) -> usize {
        let members: Vec<SubscriberId> = self
            .topics
            .get(topic)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default();

        members
            .into_iter()
            .filter(|id| self.remove(topic, *id))
            .count()
    }

    /// Remove every membership of `id`; returns true if its channel was released
    pub fn remove_subscriber(&mut self, id: SubscriberId) -> bool {
        let topics: Vec<String> = self
            .subscribers
            .get(&id)
            .map(|subscriber| subscriber.topics.iter().cloned().collect())
            .unwrap_or_default();

        topics
            .iter()
            .fold(false, |released, topic| self.remove(topic, id) || released)
    }

    /// Remove every (topic, subscriber) pairing; returns channels released
    pub fn drain(&mut self) -> usize {
        let pairs: Vec<(String, SubscriberId)> = self
            .topics
            .iter()
            .flat_map(|(topic, members)| members.iter().map(move |id| (topic.clone(), *id)))
            .collect();

        pairs
            .into_iter()
            .filter(|(topic, id)| self.remove(topic, *id))
            .count()
    }

    #[cfg(test)]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.get(topic).map_or(0, |members| members.len())
    }

    #[cfg(test)]
    pub fn topics_of(&self, id: SubscriberId) -> Vec<String> {
        self.subscribers
            .get(&id)
            .map(|subscriber| subscriber.topics.iter().cloned().collect())
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty() && self.subscribers.is_empty()
    }

    pub fn stats(&self) -> TopicStats {
        TopicStats {
            total_topics: self.topics.len(),
            total_subscribers: self.subscribers.len(),
            total_subscriptions: self
                .subscribers
                .values()
                .map(|subscriber| subscriber.topics.len())
                .sum(),
            topics: self
                .topics
                .iter()
                .map(|(topic, members)| (topic.clone(), members.len()))
                .collect(),
        }
    }

    fn senders(&self, topic: &str) -> Vec<mpsc::Sender<Envelope>> {
        self.topics
            .get(topic)
            .map(|members| {
                members
                    .iter()
                    .filter_map(|id| self.subscribers.get(id))
                    .map(|subscriber| subscriber.sender.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Forward and reverse maps describe the same pairings
    #[cfg(test)]
    fn is_consistent(&self) -> bool {
        let forward_ok = self.topics.iter().all(|(topic, members)| {
            !members.is_empty()
                && members.iter().all(|id| {
                    self.subscribers
                        .get(id)
                        .is_some_and(|subscriber| subscriber.topics.contains(topic))
                })
        });

        let reverse_ok = self.subscribers.iter().all(|(id, subscriber)| {
            !subscriber.topics.is_empty()
                && subscriber.topics.iter().all(|topic| {
                    self.topics
                        .get(topic)
                        .is_some_and(|members| members.contains(id))
                })
        });

        forward_ok && reverse_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;

    fn channel(capacity: usize) -> (mpsc::Sender<Envelope>, mpsc::Receiver<Envelope>) {
        mpsc::channel(capacity)
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut registry = Registry::new();
        let id = SubscriberId::new();
        let (tx, _rx) = channel(4);

        registry.add("a", id, &tx);
        registry.add("a", id, &tx);

        assert_eq!(registry.subscriber_count("a"), 1);
        assert_eq!(registry.topics_of(id), vec!["a".to_string()]);
        assert!(registry.is_consistent());
    }

    #[test]
    fn test_channel_released_on_last_topic() {
        let mut registry = Registry::new();
        let id = SubscriberId::new();
        let (tx, mut rx) = channel(4);

        registry.add("a", id, &tx);
        registry.add("b", id, &tx);
        drop(tx);

        assert!(!registry.remove("a", id));
        assert!(!rx.is_closed());

        // Removing an absent pairing is a no-op
        assert!(!registry.remove("a", id));

        assert!(registry.remove("b", id));
        assert!(registry.is_empty());
        assert!(rx.try_recv().is_err());
        assert!(rx.is_closed());
    }

    #[test]
    fn test_remove_topic_forces_unsubscribe() {
        let mut registry = Registry::new();
        let (a, b) = (SubscriberId::new(), SubscriberId::new());
        let (tx_a, _rx_a) = channel(4);
        let (tx_b, _rx_b) = channel(4);

        registry.add("room", a, &tx_a);
        registry.add("room", b, &tx_b);
        registry.add("lobby", b, &tx_b);

        // Only `a` is left without topics
        assert_eq!(registry.remove_topic("room"), 1);
        assert_eq!(registry.subscriber_count("room"), 0);
        assert_eq!(registry.topics_of(b), vec!["lobby".to_string()]);
        assert!(registry.is_consistent());
    }

    #[test]
    fn test_remove_subscriber_and_drain() {
        let mut registry = Registry::new();
        let (a, b) = (SubscriberId::new(), SubscriberId::new());
        let (tx_a, _rx_a) = channel(4);
        let (tx_b, _rx_b) = channel(4);

        registry.add("x", a, &tx_a);
        registry.add("y", a, &tx_a);
        registry.add("x", b, &tx_b);

        assert!(registry.remove_subscriber(a));
        assert!(!registry.remove_subscriber(a));
        assert_eq!(registry.stats().total_subscribers, 1);

        assert_eq!(registry.drain(), 1);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_send_async_skips_full_subscribers() {
        let mut registry = Registry::new();
        let (slow, fast) = (SubscriberId::new(), SubscriberId::new());
        let (tx_slow, mut rx_slow) = channel(1);
        let (tx_fast, mut rx_fast) = channel(8);

        registry.add("t", slow, &tx_slow);
        registry.add("t", fast, &tx_fast);

        assert_eq!(registry.send_async("t", &Envelope::text("1")), 2);
        assert_eq!(registry.send_async("t", &Envelope::text("2")), 1);

        assert_eq!(rx_slow.recv().await.unwrap().payload().as_ref(), b"1");
        assert!(rx_slow.try_recv().is_err());
        assert_eq!(rx_fast.recv().await.unwrap().payload().as_ref(), b"1");
        assert_eq!(rx_fast.recv().await.unwrap().payload().as_ref(), b"2");
    }

    #[tokio::test]
    async fn test_send_reaches_every_subscriber() {
        let mut registry = Registry::new();
        let (a, b) = (SubscriberId::new(), SubscriberId::new());
        let (tx_a, mut rx_a) = channel(4);
        let (tx_b, mut rx_b) = channel(4);

        registry.add("t", a, &tx_a);
        registry.add("t", b, &tx_b);

        assert_eq!(registry.send("t", &Envelope::text("hi")).await, 2);
        assert_eq!(registry.send("missing", &Envelope::text("hi")).await, 0);
        assert_eq!(rx_a.recv().await.unwrap().payload().as_ref(), b"hi");
        assert_eq!(rx_b.recv().await.unwrap().payload().as_ref(), b"hi");
    }

    #[derive(Debug, Clone)]
    enum Op {
        Subscribe(usize, usize),
        Unsubscribe(usize, usize),
        UnsubscribeAll(usize),
        CloseTopic(usize),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..3usize, 0..4usize).prop_map(|(s, t)| Op::Subscribe(s, t)),
            (0..3usize, 0..4usize).prop_map(|(s, t)| Op::Unsubscribe(s, t)),
            (0..3usize).prop_map(Op::UnsubscribeAll),
            (0..4usize).prop_map(Op::CloseTopic),
        ]
    }

    proptest! {
        /// A channel is released iff its membership count returns to zero, exactly once
        #[test]
        fn prop_reference_counted_release(ops in proptest::collection::vec(op_strategy(), 0..60)) {
            let topics = ["t0", "t1", "t2", "t3"];
            let ids: Vec<SubscriberId> = (0..3).map(|_| SubscriberId::new()).collect();
            let senders: Vec<_> = (0..3).map(|_| channel(1).0).collect();

            let mut registry = Registry::new();
            let mut model: HashMap<usize, std::collections::BTreeSet<usize>> = HashMap::new();

            for op in ops {
                match op {
                    Op::Subscribe(s, t) => {
                        registry.add(topics[t], ids[s], &senders[s]);
                        model.entry(s).or_default().insert(t);
                    }
                    Op::Unsubscribe(s, t) => {
                        let had = model.get(&s).is_some_and(|set| set.contains(&t));
                        let released = registry.remove(topics[t], ids[s]);
                        if had {
                            let set = model.get_mut(&s).unwrap();
                            set.remove(&t);
                            prop_assert_eq!(released, set.is_empty());
                            if set.is_empty() {
                                model.remove(&s);
                            }
                        } else {
                            prop_assert!(!released);
                        }
                    }
                    Op::UnsubscribeAll(s) => {
                        let released = registry.remove_subscriber(ids[s]);
                        prop_assert_eq!(released, model.remove(&s).is_some());
                    }
                    Op::CloseTopic(t) => {
                        let mut expected = 0;
                        for set in model.values_mut() {
                            if set.remove(&t) && set.is_empty() {
                                expected += 1;
                            }
                        }
                        model.retain(|_, set| !set.is_empty());
                        prop_assert_eq!(registry.remove_topic(topics[t]), expected);
                    }
                }

                prop_assert!(registry.is_consistent());
                for (s, id) in ids.iter().enumerate() {
                    let expected = model.get(&s).map_or(0, |set| set.len());
                    prop_assert_eq!(registry.topics_of(*id).len(), expected);
                }
            }
        }
    }
}
