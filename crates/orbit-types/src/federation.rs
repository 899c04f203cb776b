//! The static federation: ordered validator set and quorum arithmetic.

use crate::{derive_address, Address, PublicKey, ValidatorId};
use sbor::prelude::*;

/// A federation member: a known public key participating in consensus.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct ValidatorInfo {
    /// Position in the federation's ordered member list.
    pub id: ValidatorId,
    /// Consensus signing key.
    pub public_key: PublicKey,
    /// Derived account address.
    pub address: Address,
}

/// The fixed, ordered validator set. Membership is static for the lifetime
/// of the process.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct Federation {
    members: Vec<ValidatorInfo>,
}

impl Federation {
    /// Build a federation from an ordered list of public keys.
    ///
    /// Validator ids are assigned by position; the first member is the
    /// leader of the benchmark consensus algorithm.
    pub fn new(public_keys: Vec<PublicKey>) -> Self {
        let members = public_keys
            .into_iter()
            .enumerate()
            .map(|(i, public_key)| ValidatorInfo {
                id: ValidatorId(i as u32),
                address: derive_address(&public_key),
                public_key,
            })
            .collect();
        Self { members }
    }

    /// Number of federation members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the federation is empty.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// The leader of the benchmark consensus algorithm.
    pub fn leader(&self) -> ValidatorId {
        ValidatorId(0)
    }

    /// Look up a member by id.
    pub fn member(&self, id: ValidatorId) -> Option<&ValidatorInfo> {
        self.members.get(id.0 as usize)
    }

    /// Public key of a member.
    pub fn public_key(&self, id: ValidatorId) -> Option<&PublicKey> {
        self.member(id).map(|m| &m.public_key)
    }

    /// Look up the member id for a public key.
    pub fn id_of(&self, key: &PublicKey) -> Option<ValidatorId> {
        self.members
            .iter()
            .find(|m| &m.public_key == key)
            .map(|m| m.id)
    }

    /// Iterate all members in order.
    pub fn members(&self) -> impl Iterator<Item = &ValidatorInfo> {
        self.members.iter()
    }

    /// Iterate all member ids in order.
    pub fn ids(&self) -> impl Iterator<Item = ValidatorId> + '_ {
        self.members.iter().map(|m| m.id)
    }

    /// Votes required to commit: `2n/3 + 1`.
    ///
    /// A single-member federation commits on its own vote.
    pub fn quorum_threshold(&self) -> usize {
        (self.members.len() * 2) / 3 + 1
    }

    /// Whether `id` is a member.
    pub fn contains(&self, id: ValidatorId) -> bool {
        (id.0 as usize) < self.members.len()
    }
}
