//! Deterministic fixtures and transaction builders shared by tests.

mod fixtures;

pub use fixtures::{
    counter_add_transaction, counter_get_call, deploy_counter_transaction, federation_with_keys,
    test_keypair, transfer_transaction, TEST_CHAIN,
};
