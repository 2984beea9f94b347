//! Participants of a key generation epoch.

use crate::{keypair::PublicKey, Error};
use std::collections::HashSet;

/// A participant of a key generation epoch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Validator {
    /// Identifier of the validator, unique within a registry.
    pub address: String,
    /// Encryption key of the validator.
    pub public_key: PublicKey,
    /// Share index of the validator (its position in the [ValidatorRegistry]).
    pub index: u32,
}

impl Validator {
    /// Creates a new validator.
    ///
    /// The supplied `index` is only a hint: [ValidatorRegistry::new] rewrites
    /// it to the validator's position in the canonical order.
    pub fn new(address: impl Into<String>, public_key: PublicKey, index: u32) -> Self {
        Self {
            address: address.into(),
            public_key,
            index,
        }
    }
}

/// The ordered set of validators participating in an epoch.
///
/// Validators are sorted by the canonical encoding of their public key so that
/// every participant derives the same share index for every validator,
/// regardless of the order in which it learned about them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatorRegistry {
    validators: Vec<Validator>,
}

impl ValidatorRegistry {
    /// Builds a registry from an unordered list of validators.
    ///
    /// Fails if the list is empty or if any address or public key appears more than once.
    pub fn new(mut validators: Vec<Validator>) -> Result<Self, Error> {
        if validators.is_empty() {
            return Err(Error::InvalidParameters("no validators"));
        }
        if validators.len() > u32::MAX as usize {
            return Err(Error::InvalidParameters("too many validators"));
        }

        // Sort by public key bytes
        validators.sort_by(|a, b| a.public_key.cmp(&b.public_key));

        // Reject duplicates
        let mut addresses = HashSet::new();
        for (i, validator) in validators.iter().enumerate() {
            if !addresses.insert(validator.address.as_str()) {
                return Err(Error::DuplicateValidator(validator.address.clone()));
            }
            if i > 0 && validators[i - 1].public_key == validator.public_key {
                return Err(Error::DuplicateValidator(validator.address.clone()));
            }
        }

        // Assign share indices
        for (i, validator) in validators.iter_mut().enumerate() {
            validator.index = i as u32;
        }
        Ok(Self { validators })
    }

    /// Returns the number of validators.
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    /// Returns whether the registry is empty (never true for a constructed registry).
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Returns the validator with the given share index.
    pub fn get(&self, index: u32) -> Option<&Validator> {
        self.validators.get(index as usize)
    }

    /// Finds a validator by both address and public key.
    pub fn find(&self, validator: &Validator) -> Option<&Validator> {
        self.validators
            .iter()
            .find(|v| v.address == validator.address && v.public_key == validator.public_key)
    }

    /// Returns the share index of the validator with the given public key.
    pub fn index_of_key(&self, public_key: &PublicKey) -> Option<u32> {
        self.validators
            .binary_search_by(|v| v.public_key.cmp(public_key))
            .ok()
            .map(|i| i as u32)
    }

    /// Returns the public keys in share index order.
    pub fn public_keys(&self) -> Vec<PublicKey> {
        self.validators.iter().map(|v| v.public_key).collect()
    }

    /// Returns the validators in share index order.
    pub fn iter(&self) -> impl Iterator<Item = &Validator> {
        self.validators.iter()
    }
}
