use crate as pallet_streams;
use crate::TopicInspector;

use frame_support::parameter_types;
use sp_core::H256;
use sp_runtime::{
    testing::Header,
    traits::{BlakeTwo256, IdentityLookup},
    BuildStorage,
};

type UncheckedExtrinsic = frame_system::mocking::MockUncheckedExtrinsic<Test>;
type Block = frame_system::mocking::MockBlock<Test>;

frame_support::construct_runtime!(
    pub enum Test where
        Block = Block,
        NodeBlock = Block,
        UncheckedExtrinsic = UncheckedExtrinsic,
    {
        System: frame_system,
        Delegation: pallet_delegation,
        Streams: pallet_streams,
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

// The delegation pallet's topic registry backs the streams pallet.
impl TopicInspector<Test> for pallet_delegation::Pallet<Test> {
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

pub fn new_test_ext() -> sp_io::TestExternalities {
    let t = frame_system::GenesisConfig::default()
        .build_storage::<Test>()
        .unwrap();

    let mut ext: sp_io::TestExternalities = t.into();
    ext.execute_with(|| frame_system::Pallet::<Test>::set_block_number(1));
    ext
}

/// Registers a topic owned by account 99 and returns its id.
pub fn seeded_topic() -> u32 {
    let topic = Delegation::next_topic_id();
    frame_support::assert_ok!(Delegation::create_topic(
        RuntimeOrigin::signed(99),
        b"rewards".to_vec().try_into().unwrap(),
        H256::repeat_byte(3),
        0,
    ));
    topic
}
