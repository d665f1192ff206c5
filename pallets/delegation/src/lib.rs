#![cfg_attr(not(feature = "std"), no_std)]

pub use pallet::*;

#[cfg(test)]
mod mock;


#[cfg(feature = "runtime-benchmarks")]
mod benchmarking;

/// Per-Topic Delegation Graph
///
/// # Overview
/// Participants hold a single unit of voting power per topic and may hand it
/// to another participant by creating a delegation edge. Edges compose into
/// chains that end at a terminal delegate, who carries the weight of everyone
/// whose chain reaches them. Delegations are freely revocable; the graph is
/// kept acyclic and depth-bounded on every write.
///
/// # Key Features
/// - Per-topic directed delegation edges, one outgoing edge per participant
/// - Cycle rejection and a hard chain-depth cap on every mutation
/// - Dead-end declarations that block both incoming and outgoing edges
/// - Append-only participation index used to bound upstream-depth scans
/// - Topic registry with owner-gated lifecycle (active flag, threshold)
///
/// # Graph Rules
/// An edge `delegator -> delegate` is admitted only when all of the
/// following hold at submission time:
/// - the topic exists and is active
/// - `delegator != delegate`
/// - neither endpoint has declared itself a dead-end on the topic
/// - the edge closes no cycle through the topic's edge set
/// - no chain through the new edge would exceed the depth cap, including
///   chains of existing delegators upstream of the delegator
///
/// Terminal delegates are derived, never stored: a participant with no
/// outgoing edge is its own terminal.
#[frame_support::pallet]
pub mod pallet {
    use frame_support::pallet_prelude::*;
    use frame_system::pallet_prelude::*;
    use sp_core::H256;
    use sp_std::prelude::*;

    /// Topics are identified by a small unsigned integer.
    pub type TopicId = u32;
    /// Human-readable topic name, at most 64 bytes.
    pub type TopicName = BoundedVec<u8, ConstU32<64>>;
    /// Terminal voting power as attested off-chain.
    pub type Power = u128;

    /// Registry record for a delegation topic.
    #[derive(Clone, Encode, Decode, PartialEq, Eq, TypeInfo, RuntimeDebug, MaxEncodedLen)]
    #[scale_info(skip_type_params(T))]
    pub struct TopicInfo<T: Config> {
        pub name: TopicName,
        /// Content hash of the long-form topic description, kept off-chain.
        pub description_hash: H256,
        /// Minimum terminal power required to open a proposal on the topic.
        /// Informational to this pallet; enforced by the proposal ledger.
        pub proposal_threshold: Power,
        pub active: bool,
        pub owner: T::AccountId,
    }

    #[pallet::config]
    pub trait Config: frame_system::Config {
        type RuntimeEvent: From<Event<Self>> + IsType<<Self as frame_system::Config>::RuntimeEvent>;

        /// Maximum number of edges in any delegation chain.
        #[pallet::constant]
        type DepthCap: Get<u32>;

        /// Capacity of the per-topic participation index.
        #[pallet::constant]
        type MaxTopicParticipants: Get<u32>;
    }

    #[pallet::pallet]
    #[pallet::generate_store(pub(super) trait Store)]
    pub struct Pallet<T>(_);

    #[pallet::storage]
    #[pallet::getter(fn next_topic_id)]
    pub type NextTopicId<T> = StorageValue<_, TopicId, ValueQuery>;

    #[pallet::storage]
    #[pallet::getter(fn topics)]
    pub type Topics<T: Config> = StorageMap<_, Blake2_128Concat, TopicId, TopicInfo<T>>;

    /// The delegation edge set: `(topic, delegator) -> delegate`.
    #[pallet::storage]
    #[pallet::getter(fn edges)]
    pub type Edges<T: Config> = StorageDoubleMap<
        _,
        Blake2_128Concat, TopicId,
        Blake2_128Concat, T::AccountId,
        T::AccountId,
        OptionQuery,
    >;

    /// Participants that refuse an outgoing edge on a topic.
    #[pallet::storage]
    #[pallet::getter(fn dead_ends)]
    pub type DeadEnds<T: Config> = StorageDoubleMap<
        _,
        Blake2_128Concat, TopicId,
        Blake2_128Concat, T::AccountId,
        bool,
        ValueQuery,
    >;

    /// Every participant that has ever held an outgoing edge on the topic,
    /// in first-delegation order. Append-only; "currently delegating" is
    /// decided by edge existence, not membership here.
    #[pallet::storage]
    #[pallet::getter(fn participants)]
    pub type Participants<T: Config> = StorageMap<
        _,
        Blake2_128Concat, TopicId,
        BoundedVec<T::AccountId, T::MaxTopicParticipants>,
        ValueQuery,
    >;

    #[pallet::event]
    #[pallet::generate_deposit(pub(super) fn deposit_event)]
    pub enum Event<T: Config> {
        TopicCreated {
            topic: TopicId,
            owner: T::AccountId,
            name: TopicName,
        },
        TopicUpdated {
            topic: TopicId,
        },
        Delegated {
            delegator: T::AccountId,
            delegate: T::AccountId,
            topic: TopicId,
        },
        Revoked {
            delegator: T::AccountId,
            topic: TopicId,
        },
        DeadEndDeclared {
            participant: T::AccountId,
            topic: TopicId,
        },
        DeadEndRevoked {
            participant: T::AccountId,
            topic: TopicId,
        },
    }

    #[pallet::error]
    pub enum Error<T> {
        /// No topic is registered under this identifier.
        UnknownTopic,
        /// The topic exists but is frozen for new delegations.
        TopicInactive,
        /// Caller does not own the topic.
        NotTopicOwner,
        /// A participant cannot delegate to themselves.
        SelfDelegate,
        /// The caller has declared themselves a dead-end on this topic.
        ActorDeadEnd,
        /// The target has declared themselves a dead-end on this topic.
        TargetDeadEnd,
        /// The edge would close a delegation cycle.
        WouldCycle,
        /// A chain through the new edge would exceed the depth cap.
        WouldExceedDepth,
        /// The topic's participation index is full.
        TooManyParticipants,
    }

    #[pallet::call]
    impl<T: Config> Pallet<T> {
        /// Register a new delegation topic. The caller becomes its owning
        /// administrator and the topic starts active.
        #[pallet::call_index(0)]
        #[pallet::weight(10_000)]
        pub fn create_topic(
            origin: OriginFor<T>,
            name: TopicName,
            description_hash: H256,
            proposal_threshold: Power,
        ) -> DispatchResult {
            let who = ensure_signed(origin)?;

            let topic = NextTopicId::<T>::get();
            let info = TopicInfo {
                name: name.clone(),
                description_hash,
                proposal_threshold,
                active: true,
                owner: who.clone(),
            };

            Topics::<T>::insert(topic, info);
            NextTopicId::<T>::put(topic.saturating_add(1));

            Self::deposit_event(Event::TopicCreated { topic, owner: who, name });

            Ok(())
        }

        /// Freeze or reactivate a topic. Freezing blocks new delegations but
        /// never erases existing edges; chains keep resolving.
        #[pallet::call_index(1)]
        #[pallet::weight(10_000)]
        pub fn set_topic_active(
            origin: OriginFor<T>,
            topic: TopicId,
            active: bool,
        ) -> DispatchResult {
            let who = ensure_signed(origin)?;

            Topics::<T>::try_mutate(topic, |maybe_info| -> DispatchResult {
                let info = maybe_info.as_mut().ok_or(Error::<T>::UnknownTopic)?;
                ensure!(info.owner == who, Error::<T>::NotTopicOwner);
                info.active = active;
                Ok(())
            })?;

            Self::deposit_event(Event::TopicUpdated { topic });

            Ok(())
        }

        /// Update the proposal threshold advertised by the topic.
        #[pallet::call_index(2)]
        #[pallet::weight(10_000)]
        pub fn set_topic_threshold(
            origin: OriginFor<T>,
            topic: TopicId,
            threshold: Power,
        ) -> DispatchResult {
            let who = ensure_signed(origin)?;

            Topics::<T>::try_mutate(topic, |maybe_info| -> DispatchResult {
                let info = maybe_info.as_mut().ok_or(Error::<T>::UnknownTopic)?;
                ensure!(info.owner == who, Error::<T>::NotTopicOwner);
                info.proposal_threshold = threshold;
                Ok(())
            })?;

            Self::deposit_event(Event::TopicUpdated { topic });

            Ok(())
        }

        /// Replace the content hash of the topic description.
        #[pallet::call_index(3)]
        #[pallet::weight(10_000)]
        pub fn set_topic_description(
            origin: OriginFor<T>,
            topic: TopicId,
            description_hash: H256,
        ) -> DispatchResult {
            let who = ensure_signed(origin)?;

            Topics::<T>::try_mutate(topic, |maybe_info| -> DispatchResult {
                let info = maybe_info.as_mut().ok_or(Error::<T>::UnknownTopic)?;
                ensure!(info.owner == who, Error::<T>::NotTopicOwner);
                info.description_hash = description_hash;
                Ok(())
            })?;

            Self::deposit_event(Event::TopicUpdated { topic });

            Ok(())
        }

        /// Delegate the caller's voting unit on `topic` to `target`.
        ///
        /// An existing outgoing edge is overwritten atomically. The edge is
        /// admitted only if it keeps the topic's graph acyclic and no chain
        /// through it exceeds the depth cap.
        ///
        /// # Errors
        /// `UnknownTopic`, `TopicInactive`, `SelfDelegate`, `ActorDeadEnd`,
        /// `TargetDeadEnd`, `WouldCycle`, `WouldExceedDepth`,
        /// `TooManyParticipants`.
        ///
        /// # Events
        /// Emits `Delegated` on success.
        #[pallet::call_index(4)]
        #[pallet::weight(10_000)]
        pub fn delegate(
            origin: OriginFor<T>,
            topic: TopicId,
            target: T::AccountId,
        ) -> DispatchResult {
            let who = ensure_signed(origin)?;

            // 1. CHECKS
            let info = Topics::<T>::get(topic).ok_or(Error::<T>::UnknownTopic)?;
            ensure!(info.active, Error::<T>::TopicInactive);
            ensure!(who != target, Error::<T>::SelfDelegate);
            ensure!(!DeadEnds::<T>::get(topic, &who), Error::<T>::ActorDeadEnd);
            ensure!(!DeadEnds::<T>::get(topic, &target), Error::<T>::TargetDeadEnd);

            // Walk the target's chain once: detects a cycle back to the
            // caller and yields the target's depth for the cap checks. The
            // caller's current outgoing edge never participates in this walk
            // because reaching the caller aborts first.
            let target_depth = Self::checked_walk(topic, &target, &who)?;
            ensure!(
                target_depth.saturating_add(1) <= T::DepthCap::get(),
                Error::<T>::WouldExceedDepth
            );

            // Upstream check: a participant whose chain currently passes
            // through the caller would, after the write, reach the terminal
            // via `caller -> target`. Its distance to the caller plus the new
            // tail must still fit under the cap.
            for upstream in Participants::<T>::get(topic) {
                if upstream == who {
                    continue;
                }
                if let Some(dist) = Self::distance_to(topic, &upstream, &who) {
                    ensure!(
                        dist.saturating_add(1).saturating_add(target_depth)
                            <= T::DepthCap::get(),
                        Error::<T>::WouldExceedDepth
                    );
                }
            }

            // 2. EFFECTS
            let mut index = Participants::<T>::get(topic);
            if !index.contains(&who) {
                index
                    .try_push(who.clone())
                    .map_err(|_| Error::<T>::TooManyParticipants)?;
                Participants::<T>::insert(topic, index);
            }

            Edges::<T>::insert(topic, &who, &target);

            // 3. INTERACTIONS
            Self::deposit_event(Event::Delegated {
                delegator: who,
                delegate: target,
                topic,
            });

            Ok(())
        }

        /// Withdraw the caller's outgoing edge on `topic`.
        ///
        /// Idempotent: with no edge in place this is a silent no-op, and no
        /// event is emitted. Works on frozen topics.
        #[pallet::call_index(5)]
        #[pallet::weight(10_000)]
        pub fn revoke(origin: OriginFor<T>, topic: TopicId) -> DispatchResult {
            let who = ensure_signed(origin)?;

            if Edges::<T>::take(topic, &who).is_some() {
                Self::deposit_event(Event::Revoked { delegator: who, topic });
            }

            Ok(())
        }

        /// Declare the caller a dead-end on `topic`: they refuse to hold an
        /// outgoing edge and may not be targeted by new ones.
        ///
        /// Any outgoing edge the caller holds falls with the declaration.
        /// Chains already terminating at the caller are untouched.
        #[pallet::call_index(6)]
        #[pallet::weight(10_000)]
        pub fn declare_dead_end(origin: OriginFor<T>, topic: TopicId) -> DispatchResult {
            let who = ensure_signed(origin)?;

            ensure!(Topics::<T>::contains_key(topic), Error::<T>::UnknownTopic);

            if DeadEnds::<T>::get(topic, &who) {
                return Ok(());
            }

            if Edges::<T>::take(topic, &who).is_some() {
                Self::deposit_event(Event::Revoked {
                    delegator: who.clone(),
                    topic,
                });
            }

            DeadEnds::<T>::insert(topic, &who, true);

            Self::deposit_event(Event::DeadEndDeclared { participant: who, topic });

            Ok(())
        }

        /// Clear the caller's dead-end flag on `topic`. Idempotent.
        #[pallet::call_index(7)]
        #[pallet::weight(10_000)]
        pub fn revoke_dead_end(origin: OriginFor<T>, topic: TopicId) -> DispatchResult {
            let who = ensure_signed(origin)?;

            if !DeadEnds::<T>::get(topic, &who) {
                return Ok(());
            }

            DeadEnds::<T>::remove(topic, &who);

            Self::deposit_event(Event::DeadEndRevoked { participant: who, topic });

            Ok(())
        }
    }

    impl<T: Config> Pallet<T> {
        /// The endpoint of the chain starting at `p`. A participant with no
        /// outgoing edge is its own terminal. Traversal is bounded by the
        /// depth cap, so a stale or corrupted edge set still terminates.
        pub fn terminal_delegate(p: &T::AccountId, topic: TopicId) -> T::AccountId {
            let mut current = p.clone();
            for _ in 0..T::DepthCap::get() {
                match Edges::<T>::get(topic, &current) {
                    Some(next) => current = next,
                    None => break,
                }
            }
            current
        }

        /// The full chain from `p` to its terminal, inclusive of both ends.
        /// At most `DepthCap + 1` entries.
        pub fn chain(p: &T::AccountId, topic: TopicId) -> Vec<T::AccountId> {
            let mut out = Vec::new();
            let mut current = p.clone();
            out.push(current.clone());
            for _ in 0..T::DepthCap::get() {
                match Edges::<T>::get(topic, &current) {
                    Some(next) => {
                        current = next;
                        out.push(current.clone());
                    }
                    None => break,
                }
            }
            out
        }

        /// Number of edges between `p` and its terminal, in `[0, DepthCap]`.
        pub fn depth(p: &T::AccountId, topic: TopicId) -> u32 {
            let mut current = p.clone();
            let mut steps = 0u32;
            for _ in 0..T::DepthCap::get() {
                match Edges::<T>::get(topic, &current) {
                    Some(next) => {
                        current = next;
                        steps += 1;
                    }
                    None => break,
                }
            }
            steps
        }

        /// Currently live edges on the topic, in participation-index order.
        pub fn active_edges(topic: TopicId) -> Vec<(T::AccountId, T::AccountId)> {
            Participants::<T>::get(topic)
                .into_iter()
                .filter_map(|delegator| {
                    Edges::<T>::get(topic, &delegator).map(|delegate| (delegator, delegate))
                })
                .collect()
        }

        /// Participants currently holding an outgoing edge, in
        /// participation-index order.
        pub fn delegators_of_topic(topic: TopicId) -> Vec<T::AccountId> {
            Participants::<T>::get(topic)
                .into_iter()
                .filter(|delegator| Edges::<T>::contains_key(topic, delegator))
                .collect()
        }

        /// The caller-facing read of a single edge.
        pub fn get_delegation(p: &T::AccountId, topic: TopicId) -> Option<T::AccountId> {
            Edges::<T>::get(topic, p)
        }

        pub fn is_dead_end(p: &T::AccountId, topic: TopicId) -> bool {
            DeadEnds::<T>::get(topic, p)
        }

        /// The topic's owning administrator; backs the registry interface
        /// other pallets bind against.
        pub fn topic_owner(topic: TopicId) -> Option<T::AccountId> {
            Topics::<T>::get(topic).map(|info| info.owner)
        }

        /// Walk from `start` to its terminal, failing with `WouldCycle` the
        /// moment `forbidden` appears on the path. Returns the number of
        /// edges walked. The walk is cut at the depth cap; a chain that long
        /// cannot absorb another edge anyway, so the overflow also reports
        /// `WouldExceedDepth`.
        fn checked_walk(
            topic: TopicId,
            start: &T::AccountId,
            forbidden: &T::AccountId,
        ) -> Result<u32, Error<T>> {
            let mut current = start.clone();
            let mut steps = 0u32;
            loop {
                if current == *forbidden {
                    return Err(Error::<T>::WouldCycle);
                }
                match Edges::<T>::get(topic, &current) {
                    Some(next) => {
                        steps += 1;
                        if steps > T::DepthCap::get() {
                            return Err(Error::<T>::WouldExceedDepth);
                        }
                        current = next;
                    }
                    None => return Ok(steps),
                }
            }
        }

        /// Distance in edges from `from` to `to` along the current chain, or
        /// `None` when the chain does not pass through `to`. Bounded by the
        /// depth cap.
        fn distance_to(topic: TopicId, from: &T::AccountId, to: &T::AccountId) -> Option<u32> {
            let mut current = from.clone();
            let mut steps = 0u32;
            loop {
                if current == *to {
                    return Some(steps);
                }
                if steps >= T::DepthCap::get() {
                    return None;
                }
                match Edges::<T>::get(topic, &current) {
                    Some(next) => {
                        steps += 1;
                        current = next;
                    }
                    None => return None,
                }
            }
        }
    }
}
