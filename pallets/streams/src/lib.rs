// Reward Streams Pallet
//
// Translates the attested per-topic voting-power distribution into
// continuous per-recipient reward streams. Each topic carries a configured
// pool rate (quantity per block); recipients receive integer-proportional
// slices of it, and accrued totals advance monotonically across every rate
// transition.

#![cfg_attr(not(feature = "std"), no_std)]

pub use pallet::*;

#[cfg(test)]
mod mock;


#[frame_support::pallet]
pub mod pallet {
    use frame_support::pallet_prelude::*;
    use frame_support::storage::{with_transaction, TransactionOutcome};
    use frame_system::pallet_prelude::*;
    use sp_runtime::traits::{SaturatedConversion, Saturating, Zero};
    use sp_runtime::ArithmeticError;
    use sp_std::prelude::*;

    use super::TopicInspector;

    pub type TopicId = u32;
    pub type Power = u128;
    /// Stream and pool rates, in quantity per block.
    pub type Rate = u128;

    /// A per-recipient reward stream on one topic.
    ///
    /// `accrued` is settled up to `last_change`; the running tail
    /// `rate * (now - last_change)` is only ever materialized on the next
    /// rate transition, or projected by `flow_view`.
    #[derive(Clone, Encode, Decode, PartialEq, Eq, TypeInfo, RuntimeDebug, MaxEncodedLen)]
    pub struct Stream<BlockNumber> {
        pub rate: Rate,
        pub accrued: u128,
        pub last_change: BlockNumber,
        pub active: bool,
    }

    #[pallet::config]
    pub trait Config: frame_system::Config {
        type RuntimeEvent: From<Event<Self>> + IsType<<Self as frame_system::Config>::RuntimeEvent>;

        /// Topic registry, for existence and ownership checks.
        type Topics: TopicInspector<Self>;

        /// Maximum simultaneously active streams on one topic.
        #[pallet::constant]
        type MaxRecipientsPerTopic: Get<u32>;

        /// Block count used by `estimate_monthly` projections.
        #[pallet::constant]
        type BlocksPerMonth: Get<u32>;
    }

    #[pallet::pallet]
    pub struct Pallet<T>(_);

    /// Configured distribution budget per topic. Defaults to zero, meaning
    /// the topic streams nothing regardless of attested power.
    #[pallet::storage]
    #[pallet::getter(fn pool_rate)]
    pub type PoolRates<T: Config> = StorageMap<_, Blake2_128Concat, TopicId, Rate, ValueQuery>;

    #[pallet::storage]
    #[pallet::getter(fn stream)]
    pub type Streams<T: Config> = StorageDoubleMap<
        _,
        Blake2_128Concat, TopicId,
        Blake2_128Concat, T::AccountId,
        Stream<BlockNumberFor<T>>,
        OptionQuery,
    >;

    /// Recipients with an active stream on the topic. Replaced wholesale on
    /// every flow update; the previous roster decides which streams close.
    #[pallet::storage]
    #[pallet::getter(fn active_recipients)]
    pub type ActiveRecipients<T: Config> = StorageMap<
        _,
        Blake2_128Concat, TopicId,
        BoundedVec<T::AccountId, T::MaxRecipientsPerTopic>,
        ValueQuery,
    >;

    /// Sum of active rates per topic; kept `<= PoolRates` at all times.
    #[pallet::storage]
    #[pallet::getter(fn distributed_rate)]
    pub type DistributedRates<T: Config> = StorageMap<_, Blake2_128Concat, TopicId, Rate, ValueQuery>;

    #[pallet::event]
    #[pallet::generate_deposit(pub(super) fn deposit_event)]
    pub enum Event<T: Config> {
        PoolRateUpdated {
            topic: TopicId,
            rate: Rate,
        },
        FlowCreated {
            topic: TopicId,
            recipient: T::AccountId,
            rate: Rate,
        },
        FlowUpdated {
            topic: TopicId,
            recipient: T::AccountId,
            rate: Rate,
        },
        FlowDeleted {
            topic: TopicId,
            recipient: T::AccountId,
        },
    }

    #[pallet::error]
    pub enum Error<T> {
        /// Caller does not administer this topic.
        Unauthorized,
        /// No topic is registered under this identifier.
        UnknownTopic,
        /// A non-empty distribution arrived while the pool rate is zero.
        InvalidPoolRate,
        /// The distribution names more recipients than the topic supports.
        TooManyRecipients,
    }

    #[pallet::call]
    impl<T: Config> Pallet<T> {
        /// Set the topic's distribution budget. Does not redistribute by
        /// itself: existing stream rates stay in place until the next flow
        /// update, which re-slices against the new budget.
        #[pallet::call_index(0)]
        #[pallet::weight(10_000)]
        pub fn set_pool_rate(
            origin: OriginFor<T>,
            topic: TopicId,
            rate: Rate,
        ) -> DispatchResult {
            let who = ensure_signed(origin)?;

            let owner = T::Topics::topic_owner(topic).ok_or(Error::<T>::UnknownTopic)?;
            ensure!(owner == who, Error::<T>::Unauthorized);

            PoolRates::<T>::insert(topic, rate);

            Self::deposit_event(Event::PoolRateUpdated { topic, rate });

            Ok(())
        }
    }

    impl<T: Config> Pallet<T> {
        /// Re-slice the topic's pool across `recipients` in proportion to
        /// `powers`. Reached only through the attestation verifier, which is
        /// the sole authority over the power distribution.
        ///
        /// A zero `total_power` closes every active stream. Zero-power
        /// entries count as absent. Rates are integer floors of
        /// `pool * power / total_power`; slack stays in the pool.
        pub fn update_flows(
            topic: TopicId,
            recipients: &[T::AccountId],
            powers: &[Power],
            total_power: Power,
        ) -> DispatchResult {
            // One storage layer per call: a mid-update failure may not leave
            // a half-resliced topic behind.
            with_transaction(|| {
                match Self::do_update_flows(topic, recipients, powers, total_power) {
                    Ok(()) => TransactionOutcome::Commit(Ok(())),
                    Err(e) => TransactionOutcome::Rollback(Err(e)),
                }
            })
        }

        fn do_update_flows(
            topic: TopicId,
            recipients: &[T::AccountId],
            powers: &[Power],
            total_power: Power,
        ) -> DispatchResult {
            let now = frame_system::Pallet::<T>::block_number();

            if total_power.is_zero() {
                let previous = ActiveRecipients::<T>::take(topic);
                for recipient in previous {
                    Self::close_stream(topic, &recipient, now)?;
                }
                DistributedRates::<T>::remove(topic);
                return Ok(());
            }

            let pool = PoolRates::<T>::get(topic);
            ensure!(!pool.is_zero(), Error::<T>::InvalidPoolRate);

            let previous = ActiveRecipients::<T>::get(topic);
            let mut next: BoundedVec<T::AccountId, T::MaxRecipientsPerTopic> =
                BoundedVec::default();
            let mut distributed: Rate = 0;

            for (recipient, power) in recipients.iter().zip(powers.iter()) {
                if power.is_zero() || next.contains(recipient) {
                    continue;
                }

                let new_rate = pool
                    .checked_mul(*power)
                    .ok_or(ArithmeticError::Overflow)?
                    / total_power;

                match Streams::<T>::get(topic, recipient) {
                    Some(mut stream) if stream.active => {
                        if stream.rate != new_rate {
                            Self::settle(&mut stream, now)?;
                            stream.rate = new_rate;
                            Streams::<T>::insert(topic, recipient, &stream);
                            Self::deposit_event(Event::FlowUpdated {
                                topic,
                                recipient: recipient.clone(),
                                rate: new_rate,
                            });
                        }
                        next.try_push(recipient.clone())
                            .map_err(|_| Error::<T>::TooManyRecipients)?;
                        distributed = distributed
                            .checked_add(new_rate)
                            .ok_or(ArithmeticError::Overflow)?;
                    }
                    _ => {
                        if new_rate.is_zero() {
                            continue;
                        }
                        let stream = Stream {
                            rate: new_rate,
                            accrued: 0,
                            last_change: now,
                            active: true,
                        };
                        Streams::<T>::insert(topic, recipient, &stream);
                        Self::deposit_event(Event::FlowCreated {
                            topic,
                            recipient: recipient.clone(),
                            rate: new_rate,
                        });
                        next.try_push(recipient.clone())
                            .map_err(|_| Error::<T>::TooManyRecipients)?;
                        distributed = distributed
                            .checked_add(new_rate)
                            .ok_or(ArithmeticError::Overflow)?;
                    }
                }
            }

            for recipient in previous {
                if !next.contains(&recipient) {
                    Self::close_stream(topic, &recipient, now)?;
                }
            }

            ActiveRecipients::<T>::insert(topic, next);
            DistributedRates::<T>::insert(topic, distributed);

            Ok(())
        }

        /// Stream state with the running accrual tail projected to now.
        pub fn flow_view(
            recipient: &T::AccountId,
            topic: TopicId,
        ) -> (Rate, u128, BlockNumberFor<T>) {
            match Streams::<T>::get(topic, recipient) {
                Some(stream) => {
                    let projected = if stream.active {
                        let elapsed = frame_system::Pallet::<T>::block_number()
                            .saturating_sub(stream.last_change)
                            .saturated_into::<u128>();
                        stream.accrued.saturating_add(stream.rate.saturating_mul(elapsed))
                    } else {
                        stream.accrued
                    };
                    (stream.rate, projected, stream.last_change)
                }
                None => (0, 0, Zero::zero()),
            }
        }

        /// `(pool_rate, distributed_sum, remainder)` for the topic.
        pub fn pool_view(topic: TopicId) -> (Rate, Rate, Rate) {
            let pool = PoolRates::<T>::get(topic);
            let distributed = DistributedRates::<T>::get(topic);
            (pool, distributed, pool.saturating_sub(distributed))
        }

        /// Pure projection of what a power share would earn on this topic:
        /// `(flow_rate, tokens_per_month, share_basis_points)`.
        pub fn estimate_monthly(
            topic: TopicId,
            power: Power,
            total_power: Power,
        ) -> (Rate, u128, u32) {
            if total_power.is_zero() {
                return (0, 0, 0);
            }

            let pool = PoolRates::<T>::get(topic);
            let flow_rate = pool.saturating_mul(power) / total_power;
            let tokens_per_month =
                flow_rate.saturating_mul(T::BlocksPerMonth::get() as u128);
            let share_bps =
                (power.saturating_mul(10_000) / total_power).saturated_into::<u32>();

            (flow_rate, tokens_per_month, share_bps)
        }

        /// Fold the elapsed accrual into `accrued` and restart the clock.
        /// Called before every rate write so the integral never loses a
        /// segment.
        fn settle(
            stream: &mut Stream<BlockNumberFor<T>>,
            now: BlockNumberFor<T>,
        ) -> DispatchResult {
            let elapsed = now
                .saturating_sub(stream.last_change)
                .saturated_into::<u128>();
            let earned = stream
                .rate
                .checked_mul(elapsed)
                .ok_or(ArithmeticError::Overflow)?;
            stream.accrued = stream
                .accrued
                .checked_add(earned)
                .ok_or(ArithmeticError::Overflow)?;
            stream.last_change = now;
            Ok(())
        }

        fn close_stream(
            topic: TopicId,
            recipient: &T::AccountId,
            now: BlockNumberFor<T>,
        ) -> DispatchResult {
            if let Some(mut stream) = Streams::<T>::get(topic, recipient) {
                if !stream.active {
                    return Ok(());
                }
                Self::settle(&mut stream, now)?;
                stream.rate = 0;
                stream.active = false;
                Streams::<T>::insert(topic, recipient, &stream);
                Self::deposit_event(Event::FlowDeleted {
                    topic,
                    recipient: recipient.clone(),
                });
            }
            Ok(())
        }
    }
}

/// Interface to the topic registry maintained by the delegation pallet.
pub trait TopicInspector<T: frame_system::Config> {
    /// The topic's owning administrator, or `None` for unknown topics.
    fn topic_owner(topic: pallet::TopicId) -> Option<T::AccountId>;
}
