#![cfg_attr(not(feature = "std"), no_std)]

pub use pallet::*;

#[cfg(test)]
mod mock;


/// Attestation Verifier
///
/// # Overview
/// The authoritative per-topic voting-power map is computed off-chain by a
/// set of registered operators, who walk the delegation graph and sign the
/// canonical digest of the resulting `(participant, power)` distribution.
/// This pallet is the sole gatekeeper between those operators and on-chain
/// state: a distribution is admitted only with a quorum of distinct, active
/// operator signatures over its digest, a fresh reference height, and a
/// never-before-seen nonce.
///
/// # Security Model
/// - M-of-N verification: at least `SignatureThreshold` distinct active
///   operators must sign the exact digest; duplicates fail the submission
///   outright rather than being de-duplicated silently
/// - Replay protection: every accepted nonce is retired globally, across
///   all topics
/// - Freshness: the attested reference height may trail the current height
///   by at most `MaxHeightLag` blocks
/// - The operator set can never shrink below the quorum size
///
/// # Downstream
/// An accepted attestation rewrites the topic's slice of the power cache
/// and pushes the distribution into the reward allocator bound through
/// [`FlowSink`]. The push is best-effort: a refused flow update is logged
/// and the cache write stands, since the cache is the authoritative view
/// and reward flows can be reconciled by a later attestation.
#[frame_support::pallet]
pub mod pallet {
    use frame_support::pallet_prelude::*;
    use frame_system::pallet_prelude::*;
    use sp_core::{sr25519, H256};
    use sp_runtime::traits::Zero;
    use sp_runtime::ArithmeticError;
    use sp_std::prelude::*;

    use super::FlowSink;

    pub(crate) const LOG_TARGET: &str = "runtime::attestation";

    pub type TopicId = u32;
    pub type Power = u128;

    /// Registry record for an off-chain computation operator.
    #[derive(Clone, Encode, Decode, PartialEq, Eq, TypeInfo, RuntimeDebug, MaxEncodedLen)]
    pub struct OperatorInfo {
        pub key: sr25519::Public,
        pub active: bool,
        /// Number of attestations this operator has co-signed into
        /// acceptance.
        pub accepted: u32,
    }

    /// One cached `(topic, participant)` power reading.
    #[derive(Clone, Encode, Decode, PartialEq, Eq, TypeInfo, RuntimeDebug, MaxEncodedLen)]
    pub struct PowerEntry<BlockNumber> {
        pub power: Power,
        pub updated_at: BlockNumber,
        /// Digest of the attestation that produced this entry.
        pub digest: H256,
    }

    /// A proposed power distribution, as submitted.
    ///
    /// `result_digest` must equal the canonical digest of the accompanying
    /// `(participants, powers)` arrays; the signatures are over that digest.
    #[derive(CloneNoBound, Encode, Decode, PartialEqNoBound, EqNoBound, TypeInfo, RuntimeDebugNoBound)]
    #[scale_info(skip_type_params(T))]
    pub struct AttestationRecord<T: Config> {
        pub result_digest: H256,
        pub topic: TopicId,
        pub reference_height: BlockNumberFor<T>,
        pub nonce: H256,
        pub signatures: BoundedVec<(T::AccountId, sr25519::Signature), T::MaxOperators>,
    }

    #[pallet::config]
    pub trait Config: frame_system::Config {
        type RuntimeEvent: From<Event<Self>> + IsType<<Self as frame_system::Config>::RuntimeEvent>;

        /// Origin allowed to manage the operator registry.
        type AdminOrigin: EnsureOrigin<Self::RuntimeOrigin>;

        /// Recipient of accepted power distributions; `()` for runtimes
        /// without a reward allocator.
        type Flows: FlowSink<Self>;

        /// Minimum number of distinct active operator signatures (M).
        #[pallet::constant]
        type SignatureThreshold: Get<u32>;

        /// Registry capacity (N).
        #[pallet::constant]
        type MaxOperators: Get<u32>;

        /// Maximum number of blocks an attestation's reference height may
        /// trail the current height.
        #[pallet::constant]
        type MaxHeightLag: Get<u32>;
    }

    #[pallet::pallet]
    #[pallet::generate_store(pub(super) trait Store)]
    pub struct Pallet<T>(_);

    #[pallet::storage]
    #[pallet::getter(fn operators)]
    pub type Operators<T: Config> = StorageMap<
        _,
        Blake2_128Concat,
        T::AccountId,
        OperatorInfo,
        OptionQuery,
    >;

    #[pallet::storage]
    #[pallet::getter(fn operator_count)]
    pub type OperatorCount<T> = StorageValue<_, u32, ValueQuery>;

    #[pallet::storage]
    #[pallet::getter(fn active_operator_count)]
    pub type ActiveOperatorCount<T> = StorageValue<_, u32, ValueQuery>;

    /// Nonces retired by accepted attestations. Global: a nonce spent on
    /// one topic is spent everywhere.
    #[pallet::storage]
    pub type UsedNonces<T: Config> = StorageMap<_, Blake2_128Concat, H256, (), OptionQuery>;

    /// The authoritative `(topic, participant) -> power` cache. Entries are
    /// only ever written by accepted attestations; participants absent from
    /// the latest attestation keep their stale entry, and consumers read
    /// missing entries as zero.
    #[pallet::storage]
    #[pallet::getter(fn power_cache)]
    pub type PowerCache<T: Config> = StorageDoubleMap<
        _,
        Blake2_128Concat, TopicId,
        Blake2_128Concat, T::AccountId,
        PowerEntry<BlockNumberFor<T>>,
        OptionQuery,
    >;

    /// Operators present from block zero. A chain that expects attestations
    /// before any admin call must seed at least `SignatureThreshold` of
    /// them here.
    #[pallet::genesis_config]
    pub struct GenesisConfig<T: Config> {
        pub operators: Vec<(T::AccountId, sr25519::Public)>,
    }

    #[cfg(feature = "std")]
    impl<T: Config> Default for GenesisConfig<T> {
        fn default() -> Self {
            Self { operators: Vec::new() }
        }
    }

    #[pallet::genesis_build]
    impl<T: Config> GenesisBuild<T> for GenesisConfig<T> {
        fn build(&self) {
            assert!(
                self.operators.len() as u32 <= T::MaxOperators::get(),
                "genesis operator set exceeds the registry capacity",
            );
            for (operator, key) in &self.operators {
                assert!(
                    !Operators::<T>::contains_key(operator),
                    "duplicate operator in genesis",
                );
                Operators::<T>::insert(
                    operator,
                    OperatorInfo { key: *key, active: true, accepted: 0 },
                );
            }
            OperatorCount::<T>::put(self.operators.len() as u32);
            ActiveOperatorCount::<T>::put(self.operators.len() as u32);
        }
    }

    #[pallet::hooks]
    impl<T: Config> Hooks<BlockNumberFor<T>> for Pallet<T> {
        fn integrity_test() {
            assert!(
                T::SignatureThreshold::get() >= 1,
                "a zero signature threshold would accept unsigned distributions",
            );
            assert!(
                T::SignatureThreshold::get() <= T::MaxOperators::get(),
                "the quorum must be satisfiable by a full registry",
            );
        }
    }

    #[pallet::event]
    #[pallet::generate_deposit(pub(super) fn deposit_event)]
    pub enum Event<T: Config> {
        OperatorAdded {
            operator: T::AccountId,
        },
        OperatorRemoved {
            operator: T::AccountId,
        },
        OperatorStatusChanged {
            operator: T::AccountId,
            active: bool,
        },
        AttestationAccepted {
            topic: TopicId,
            digest: H256,
            signers: u32,
        },
        PowerUpdated {
            topic: TopicId,
            digest: H256,
        },
    }

    #[pallet::error]
    pub enum Error<T> {
        /// Participant and power arrays differ in length.
        ShapeMismatch,
        /// The nonce was already spent by an earlier attestation.
        NonceUsed,
        /// The reference height is outside the accepted window.
        StaleReference,
        /// The submitted digest does not match the canonical digest of the
        /// submitted arrays.
        DigestMismatch,
        /// Fewer distinct valid signatures than the quorum requires.
        InsufficientSignatures,
        /// A signature does not verify against a registered, active
        /// operator's key.
        InvalidSigner,
        /// The same operator signed more than once.
        DuplicateSigner,
        /// An operator is already registered under this identifier.
        OperatorExists,
        /// No operator is registered under this identifier.
        OperatorMissing,
        /// Removing or suspending this operator would leave fewer active
        /// operators than the quorum requires.
        WouldBreakQuorum,
        /// The operator registry is full.
        TooManyOperators,
    }

    #[pallet::call]
    impl<T: Config> Pallet<T> {
        /// Register a new operator with its signing key. Admin only.
        #[pallet::call_index(0)]
        #[pallet::weight(10_000)]
        pub fn register_operator(
            origin: OriginFor<T>,
            operator: T::AccountId,
            key: sr25519::Public,
        ) -> DispatchResult {
            T::AdminOrigin::ensure_origin(origin)?;

            ensure!(
                !Operators::<T>::contains_key(&operator),
                Error::<T>::OperatorExists
            );
            ensure!(
                OperatorCount::<T>::get() < T::MaxOperators::get(),
                Error::<T>::TooManyOperators
            );

            Operators::<T>::insert(
                &operator,
                OperatorInfo { key, active: true, accepted: 0 },
            );
            OperatorCount::<T>::mutate(|n| *n = n.saturating_add(1));
            ActiveOperatorCount::<T>::mutate(|n| *n = n.saturating_add(1));

            Self::deposit_event(Event::OperatorAdded { operator });

            Ok(())
        }

        /// Remove an operator. Admin only; refused whenever it would leave
        /// fewer active operators than the signature threshold.
        #[pallet::call_index(1)]
        #[pallet::weight(10_000)]
        pub fn deregister_operator(
            origin: OriginFor<T>,
            operator: T::AccountId,
        ) -> DispatchResult {
            T::AdminOrigin::ensure_origin(origin)?;

            let info = Operators::<T>::get(&operator).ok_or(Error::<T>::OperatorMissing)?;
            if info.active {
                ensure!(
                    ActiveOperatorCount::<T>::get().saturating_sub(1)
                        >= T::SignatureThreshold::get(),
                    Error::<T>::WouldBreakQuorum
                );
                ActiveOperatorCount::<T>::mutate(|n| *n = n.saturating_sub(1));
            }

            Operators::<T>::remove(&operator);
            OperatorCount::<T>::mutate(|n| *n = n.saturating_sub(1));

            Self::deposit_event(Event::OperatorRemoved { operator });

            Ok(())
        }

        /// Suspend or resume an operator without discarding its key and
        /// acceptance history. Admin only; suspension is subject to the same
        /// quorum floor as removal.
        #[pallet::call_index(2)]
        #[pallet::weight(10_000)]
        pub fn set_operator_active(
            origin: OriginFor<T>,
            operator: T::AccountId,
            active: bool,
        ) -> DispatchResult {
            T::AdminOrigin::ensure_origin(origin)?;

            Operators::<T>::try_mutate(&operator, |maybe_info| -> DispatchResult {
                let info = maybe_info.as_mut().ok_or(Error::<T>::OperatorMissing)?;
                if info.active == active {
                    return Ok(());
                }
                if active {
                    ActiveOperatorCount::<T>::mutate(|n| *n = n.saturating_add(1));
                } else {
                    ensure!(
                        ActiveOperatorCount::<T>::get().saturating_sub(1)
                            >= T::SignatureThreshold::get(),
                        Error::<T>::WouldBreakQuorum
                    );
                    ActiveOperatorCount::<T>::mutate(|n| *n = n.saturating_sub(1));
                }
                info.active = active;
                Self::deposit_event(Event::OperatorStatusChanged {
                    operator: operator.clone(),
                    active,
                });
                Ok(())
            })
        }

        /// Submit a power distribution with its quorum of signatures.
        ///
        /// Verification order: array shape, nonce, reference-height
        /// freshness, canonical digest, then each signature against the
        /// registry. On acceptance the nonce is retired, the topic's cache
        /// entries are rewritten, and the distribution is pushed into the
        /// reward allocator; a refusal there is logged without unwinding
        /// the cache write.
        ///
        /// # Errors
        /// `ShapeMismatch`, `NonceUsed`, `StaleReference`, `DigestMismatch`,
        /// `InvalidSigner`, `DuplicateSigner`, `InsufficientSignatures`.
        ///
        /// # Events
        /// Emits `AttestationAccepted` and `PowerUpdated` on success.
        #[pallet::call_index(3)]
        #[pallet::weight(Weight::from_parts(50_000_000, 0).saturating_add(
            Weight::from_parts(10_000_000, 0).saturating_mul(participants.len() as u64)
        ))]
        pub fn submit_attestation(
            origin: OriginFor<T>,
            record: AttestationRecord<T>,
            participants: Vec<T::AccountId>,
            powers: Vec<Power>,
        ) -> DispatchResult {
            // The record self-authenticates through its signatures; any
            // signed origin may relay it.
            let _submitter = ensure_signed(origin)?;

            // 1. CHECKS
            ensure!(
                participants.len() == powers.len(),
                Error::<T>::ShapeMismatch
            );
            ensure!(
                !UsedNonces::<T>::contains_key(record.nonce),
                Error::<T>::NonceUsed
            );

            let now = frame_system::Pallet::<T>::block_number();
            ensure!(record.reference_height <= now, Error::<T>::StaleReference);
            ensure!(
                now - record.reference_height <= T::MaxHeightLag::get().into(),
                Error::<T>::StaleReference
            );

            let digest = Self::result_digest(&participants, &powers);
            ensure!(digest == record.result_digest, Error::<T>::DigestMismatch);

            let mut signers: Vec<T::AccountId> = Vec::new();
            for (signer, signature) in record.signatures.iter() {
                ensure!(!signers.contains(signer), Error::<T>::DuplicateSigner);
                let info = Operators::<T>::get(signer).ok_or(Error::<T>::InvalidSigner)?;
                ensure!(info.active, Error::<T>::InvalidSigner);
                ensure!(
                    sp_io::crypto::sr25519_verify(signature, digest.as_bytes(), &info.key),
                    Error::<T>::InvalidSigner
                );
                signers.push(signer.clone());
            }

            let have = signers.len() as u32;
            let need = T::SignatureThreshold::get();
            if have < need {
                log::debug!(
                    target: LOG_TARGET,
                    "attestation for topic {} under quorum: {}/{} signatures",
                    record.topic, have, need,
                );
                return Err(Error::<T>::InsufficientSignatures.into());
            }

            let mut total: Power = 0;
            for power in &powers {
                total = total.checked_add(*power).ok_or(ArithmeticError::Overflow)?;
            }

            // 2. EFFECTS
            UsedNonces::<T>::insert(record.nonce, ());

            for (participant, power) in participants.iter().zip(powers.iter()) {
                PowerCache::<T>::insert(
                    record.topic,
                    participant,
                    PowerEntry { power: *power, updated_at: now, digest },
                );
            }

            for signer in &signers {
                Operators::<T>::mutate(signer, |maybe_info| {
                    if let Some(info) = maybe_info {
                        info.accepted = info.accepted.saturating_add(1);
                    }
                });
            }

            // 3. INTERACTIONS
            Self::deposit_event(Event::AttestationAccepted {
                topic: record.topic,
                digest,
                signers: have,
            });
            Self::deposit_event(Event::PowerUpdated { topic: record.topic, digest });

            if let Err(e) =
                T::Flows::update_flows(record.topic, &participants, &powers, total)
            {
                log::warn!(
                    target: LOG_TARGET,
                    "flow update for topic {} refused, cache retained: {:?}",
                    record.topic, e,
                );
            }

            Ok(())
        }
    }

    impl<T: Config> Pallet<T> {
        /// The canonical digest both operators and this verifier hash:
        /// blake2-256 over the SCALE encoding of the participant array
        /// concatenated with the SCALE encoding of the power array. Array
        /// order is part of the preimage.
        pub fn result_digest(participants: &[T::AccountId], powers: &[Power]) -> H256 {
            let mut preimage = participants.encode();
            preimage.extend(powers.encode());
            H256::from(sp_io::hashing::blake2_256(&preimage))
        }

        /// Cached power reading; the zero tuple when no attestation has
        /// covered this participant on this topic.
        pub fn get_power(
            participant: &T::AccountId,
            topic: TopicId,
        ) -> (Power, BlockNumberFor<T>, H256) {
            match PowerCache::<T>::get(topic, participant) {
                Some(entry) => (entry.power, entry.updated_at, entry.digest),
                None => (0, Zero::zero(), H256::zero()),
            }
        }

        pub fn nonce_used(nonce: H256) -> bool {
            UsedNonces::<T>::contains_key(nonce)
        }
    }
}

/// Downstream recipient of accepted power distributions.
///
/// Bound at runtime-assembly time; the attestation pallet is thereby the
/// only path from off-chain power computation into the reward allocator.
pub trait FlowSink<T: frame_system::Config> {
    fn update_flows(
        topic: pallet::TopicId,
        recipients: &[T::AccountId],
        powers: &[pallet::Power],
        total_power: pallet::Power,
    ) -> frame_support::dispatch::DispatchResult;
}

/// Null sink for runtimes that stream no rewards.
impl<T: frame_system::Config> FlowSink<T> for () {
    fn update_flows(
        _topic: pallet::TopicId,
        _recipients: &[T::AccountId],
        _powers: &[pallet::Power],
        _total_power: pallet::Power,
    ) -> frame_support::dispatch::DispatchResult {
        Ok(())
    }
}
