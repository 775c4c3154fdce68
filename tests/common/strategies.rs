use proptest::prelude::*;

/// Which sample message type an operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Board,
    User,
}

/// One registry mutation
#[derive(Debug, Clone)]
pub enum RegistryOp {
    Subscribe { topic: Topic, holder: Option<usize> },
    /// Subscribe under the id of an earlier registration
    Share { registration: usize, topic: Topic },
    Unsubscribe { registration: usize },
    UnsubscribeAll { holder: usize },
}

pub const HOLDERS: usize = 3;

pub fn topic_strategy() -> impl Strategy<Value = Topic> {
    prop_oneof![Just(Topic::Board), Just(Topic::User)]
}

pub fn registry_op_strategy() -> impl Strategy<Value = RegistryOp> {
    prop_oneof![
        4 => (topic_strategy(), prop::option::of(0..HOLDERS))
            .prop_map(|(topic, holder)| RegistryOp::Subscribe { topic, holder }),
        1 => (0usize..16, topic_strategy())
            .prop_map(|(registration, topic)| RegistryOp::Share { registration, topic }),
        2 => (0usize..16).prop_map(|registration| RegistryOp::Unsubscribe { registration }),
        1 => (0..HOLDERS).prop_map(|holder| RegistryOp::UnsubscribeAll { holder }),
    ]
}

pub fn registry_ops_strategy() -> impl Strategy<Value = Vec<RegistryOp>> {
    prop::collection::vec(registry_op_strategy(), 1..40)
}

/// Publish bursts for the background ordering property
pub fn revisions_strategy() -> impl Strategy<Value = Vec<u32>> {
    prop::collection::vec(any::<u32>(), 1..50)
}
