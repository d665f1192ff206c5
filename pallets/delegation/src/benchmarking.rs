//! Benchmarks for the delegation graph extrinsics.

#![cfg(feature = "runtime-benchmarks")]

use super::*;
use frame_benchmarking::{account, benchmarks, whitelisted_caller};
use frame_system::RawOrigin;
use sp_core::H256;
use sp_std::prelude::*;

fn seeded_topic<T: Config>(owner: &T::AccountId) -> TopicId {
    let topic = NextTopicId::<T>::get();
    let _ = Pallet::<T>::create_topic(
        RawOrigin::Signed(owner.clone()).into(),
        TopicName::try_from(b"bench".to_vec()).unwrap(),
        H256::repeat_byte(1),
        0,
    );
    topic
}

benchmarks! {
    create_topic {
        let caller: T::AccountId = whitelisted_caller();
        let name = TopicName::try_from(b"bench".to_vec()).unwrap();
    }: create_topic(RawOrigin::Signed(caller.clone()), name, H256::repeat_byte(1), 10u128)
    verify {
        let topic = NextTopicId::<T>::get() - 1;
        assert!(Topics::<T>::contains_key(topic));
    }

    delegate {
        let caller: T::AccountId = whitelisted_caller();
        let target: T::AccountId = account("target", 0, 0);
        let topic = seeded_topic::<T>(&caller);

        // Fill the participation index so the upstream scan is exercised at
        // its worst case.
        for i in 0..T::MaxTopicParticipants::get().saturating_sub(1) {
            let delegator: T::AccountId = account("filler", i, 0);
            let _ = Pallet::<T>::delegate(
                RawOrigin::Signed(delegator).into(),
                topic,
                target.clone(),
            );
        }
    }: delegate(RawOrigin::Signed(caller.clone()), topic, target.clone())
    verify {
        assert_eq!(Edges::<T>::get(topic, &caller), Some(target));
    }

    revoke {
        let caller: T::AccountId = whitelisted_caller();
        let target: T::AccountId = account("target", 0, 0);
        let topic = seeded_topic::<T>(&caller);
        let _ = Pallet::<T>::delegate(
            RawOrigin::Signed(caller.clone()).into(),
            topic,
            target,
        );
    }: revoke(RawOrigin::Signed(caller.clone()), topic)
    verify {
        assert!(!Edges::<T>::contains_key(topic, &caller));
    }

    declare_dead_end {
        let caller: T::AccountId = whitelisted_caller();
        let topic = seeded_topic::<T>(&caller);
    }: declare_dead_end(RawOrigin::Signed(caller.clone()), topic)
    verify {
        assert!(DeadEnds::<T>::get(topic, &caller));
    }

    impl_benchmark_test_suite!(
        Pallet,
        crate::mock::new_test_ext(),
        crate::mock::Test
    );
}
