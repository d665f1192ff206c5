use crate as pallet_attestation;
use crate::FlowSink;

use frame_support::parameter_types;
use sp_core::H256;
use sp_runtime::{
    testing::Header,
    traits::{BlakeTwo256, IdentityLookup},
    BuildStorage,
};

type UncheckedExtrinsic = frame_system::mocking::MockUncheckedExtrinsic<Test>;
type Block = frame_system::mocking::MockBlock<Test>;

// Full wiring: delegation provides topics, streams consumes accepted
// distributions, attestation sits in between.
frame_support::construct_runtime!(
    pub enum Test where
        Block = Block,
        NodeBlock = Block,
        UncheckedExtrinsic = UncheckedExtrinsic,
    {
        System: frame_system,
        Delegation: pallet_delegation,
        Streams: pallet_streams,
        Attestation: pallet_attestation,
    }
);

parameter_types! {
    pub const BlockHashCount: u64 = 250;
}

impl frame_system::Config for Test {
    type BaseCallFilter = frame_support::traits::Everything;
    type BlockWeights = ();
    type BlockLength = ();
    type DbWeight = ();
    type RuntimeOrigin = RuntimeOrigin;
    type RuntimeCall = RuntimeCall;
    type Index = u64;
    type BlockNumber = u64;
    type Hash = H256;
    type Hashing = BlakeTwo256;
    type AccountId = u64;
    type Lookup = IdentityLookup<u64>;
    type Header = Header;
    type RuntimeEvent = RuntimeEvent;
    type BlockHashCount = BlockHashCount;
    type Version = ();
    type PalletInfo = PalletInfo;
    type AccountData = ();
    type OnNewAccount = ();
    type OnKilledAccount = ();
    type SystemWeightInfo = ();
    type SS58Prefix = ();
    type OnSetCode = ();
    type MaxConsumers = frame_support::traits::ConstU32<16>;
}

parameter_types! {
    pub const DepthCap: u32 = 7;
    pub const MaxTopicParticipants: u32 = 64;
}

impl pallet_delegation::Config for Test {
    type RuntimeEvent = RuntimeEvent;
    type DepthCap = DepthCap;
    type MaxTopicParticipants = MaxTopicParticipants;
}

impl pallet_streams::TopicInspector<Test> for pallet_delegation::Pallet<Test> {
    fn topic_owner(topic: u32) -> Option<u64> {
        pallet_delegation::Pallet::<Test>::topic_owner(topic)
    }
}

parameter_types! {
    pub const MaxRecipientsPerTopic: u32 = 16;
    pub const BlocksPerMonth: u32 = 432_000;
}

impl pallet_streams::Config for Test {
    type RuntimeEvent = RuntimeEvent;
    type Topics = pallet_delegation::Pallet<Test>;
    type MaxRecipientsPerTopic = MaxRecipientsPerTopic;
    type BlocksPerMonth = BlocksPerMonth;
}

impl FlowSink<Test> for pallet_streams::Pallet<Test> {
    fn update_flows(
        topic: u32,
        recipients: &[u64],
        powers: &[u128],
        total_power: u128,
    ) -> frame_support::dispatch::DispatchResult {
        pallet_streams::Pallet::<Test>::update_flows(topic, recipients, powers, total_power)
    }
}

parameter_types! {
    pub const SignatureThreshold: u32 = 2;
    pub const MaxOperators: u32 = 5;
    pub const MaxHeightLag: u32 = 100;
}

impl pallet_attestation::Config for Test {
    type RuntimeEvent = RuntimeEvent;
    type AdminOrigin = frame_system::EnsureRoot<u64>;
    type Flows = pallet_streams::Pallet<Test>;
    type SignatureThreshold = SignatureThreshold;
    type MaxOperators = MaxOperators;
    type MaxHeightLag = MaxHeightLag;
}

pub fn new_test_ext() -> sp_io::TestExternalities {
    let t = frame_system::GenesisConfig::default()
        .build_storage::<Test>()
        .unwrap();

    let mut ext: sp_io::TestExternalities = t.into();
    ext.execute_with(|| frame_system::Pallet::<Test>::set_block_number(1));
    ext
}
