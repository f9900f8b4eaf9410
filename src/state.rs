//! Account and contract state capability.
//!
//! This is the node's other storage-facing seam: balance, code, and
//! storage-slot access keyed by account address. It is architecturally
//! adjacent to the log store but functionally independent, the two share
//! nothing, and implementations must not reach into the log database.

use alloy_primitives::{Address, Bytes, B256, U256};

/// Read/write access to account and contract state.
///
/// Implementors own their backing storage and use an error-accumulation
/// contract: accessors record the first failure internally and return
/// neutral values (zero balance, empty code, zero storage word, absent),
/// so callers can run a batch of accesses and check [`error`](Self::error)
/// once at the end instead of threading a `Result` through every read.
pub trait AccountState {
    /// Error type recorded by failing accessors.
    type Error;

    /// First error recorded since construction (or since the implementor's
    /// own reset point), if any.
    fn error(&self) -> Option<&Self::Error>;

    /// Balance of `address`; zero if the account does not exist.
    fn balance(&self, address: Address) -> U256;

    /// Contract code deployed at `address`; empty for accounts without
    /// code.
    fn code(&self, address: Address) -> Bytes;

    /// Value of storage slot `key` under `address`; the zero word if
    /// unset.
    fn storage(&self, address: Address, key: B256) -> B256;

    /// Whether an account exists at `address`.
    fn exists(&self, address: Address) -> bool;

    /// Set the balance of `address`, creating the account if needed.
    fn set_balance(&mut self, address: Address, balance: U256);

    /// Install contract code at `address`.
    fn set_code(&mut self, address: Address, code: Bytes);

    /// Write storage slot `key` under `address`.
    fn set_storage(&mut self, address: Address, key: B256, value: B256);

    /// Remove the account at `address` along with its code and storage.
    fn delete_account(&mut self, address: Address);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Minimal in-memory implementation proving the contract is
    /// implementable; real nodes back this with their state trie.
    #[derive(Default)]
    struct MemoryAccountState {
        balances: HashMap<Address, U256>,
        code: HashMap<Address, Bytes>,
        storage: HashMap<(Address, B256), B256>,
        error: Option<String>,
    }

    impl AccountState for MemoryAccountState {
        type Error = String;

        fn error(&self) -> Option<&String> {
            self.error.as_ref()
        }

        fn balance(&self, address: Address) -> U256 {
            self.balances.get(&address).copied().unwrap_or(U256::ZERO)
        }

        fn code(&self, address: Address) -> Bytes {
            self.code.get(&address).cloned().unwrap_or_default()
        }

        fn storage(&self, address: Address, key: B256) -> B256 {
            self.storage
                .get(&(address, key))
                .copied()
                .unwrap_or(B256::ZERO)
        }

        fn exists(&self, address: Address) -> bool {
            self.balances.contains_key(&address) || self.code.contains_key(&address)
        }

        fn set_balance(&mut self, address: Address, balance: U256) {
            self.balances.insert(address, balance);
        }

        fn set_code(&mut self, address: Address, code: Bytes) {
            self.code.insert(address, code);
        }

        fn set_storage(&mut self, address: Address, key: B256, value: B256) {
            self.storage.insert((address, key), value);
        }

        fn delete_account(&mut self, address: Address) {
            self.balances.remove(&address);
            self.code.remove(&address);
            self.storage.retain(|(addr, _), _| *addr != address);
        }
    }

    #[test]
    fn missing_accounts_read_as_neutral_values() {
        let state = MemoryAccountState::default();
        let addr = Address::repeat_byte(0x01);
        assert_eq!(state.balance(addr), U256::ZERO);
        assert!(state.code(addr).is_empty());
        assert_eq!(state.storage(addr, B256::ZERO), B256::ZERO);
        assert!(!state.exists(addr));
        assert!(state.error().is_none());
    }

    #[test]
    fn delete_removes_balance_code_and_storage() {
        let mut state = MemoryAccountState::default();
        let addr = Address::repeat_byte(0x01);
        state.set_balance(addr, U256::from(7u64));
        state.set_code(addr, Bytes::from_static(&[0x60, 0x00]));
        state.set_storage(addr, B256::ZERO, B256::repeat_byte(0x01));
        assert!(state.exists(addr));

        state.delete_account(addr);
        assert!(!state.exists(addr));
        assert_eq!(state.storage(addr, B256::ZERO), B256::ZERO);
    }
}
