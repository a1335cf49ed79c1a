//! Account view: nonce, balances and LP shares of one account index.
//! Holds no state of its own; every read goes to the tree.

use starknet::core::types::Felt;

use crate::address::{AccountIndex, PoolIndex, TokenIndex};
use crate::error::StorageError;
use crate::merkle::NodeStore;
use crate::storage::L2Storage;
use crate::witness::PathInfo;

pub struct Account<'a, S> {
    storage: &'a mut L2Storage<S>,
    index: AccountIndex,
}

impl<'a, S: NodeStore> Account<'a, S> {
    pub fn new(storage: &'a mut L2Storage<S>, index: AccountIndex) -> Self {
        Self { storage, index }
    }

    pub fn index(&self) -> AccountIndex {
        self.index
    }

    pub async fn get_and_update_nonce(&mut self, nonce: Felt) -> Result<PathInfo, StorageError> {
        self.storage.get_and_update_nonce(self.index, nonce).await
    }

    pub async fn get_and_add_balance(
        &mut self,
        token: TokenIndex,
        delta: Felt,
    ) -> Result<PathInfo, StorageError> {
        self.storage.get_and_add_balance(self.index, token, delta).await
    }

    pub async fn get_and_add_share(
        &mut self,
        pool: PoolIndex,
        delta: Felt,
    ) -> Result<PathInfo, StorageError> {
        self.storage.get_and_add_share(self.index, pool, delta).await
    }

    pub async fn nonce(&self) -> Result<Felt, StorageError> {
        self.storage.read_nonce(self.index).await
    }

    pub async fn balance(&self, token: TokenIndex) -> Result<Felt, StorageError> {
        self.storage.read_balance(self.index, token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::SlotAddress;

    #[tokio::test]
    async fn view_scopes_every_call_to_its_account() {
        let mut storage = L2Storage::in_memory().await.unwrap();
        let mut account = storage.account(6);
        let nonce = account.get_and_update_nonce(Felt::ONE).await.unwrap();
        let balance = account.get_and_add_balance(2, Felt::from(40u8)).await.unwrap();
        let share = account.get_and_add_share(1, Felt::from(3u8)).await.unwrap();
        assert_eq!(nonce.address, SlotAddress::Nonce { account: 6 });
        assert_eq!(balance.address, SlotAddress::Balance { account: 6, token: 2 });
        assert_eq!(share.address, SlotAddress::Share { account: 6, pool: 1 });
        assert_eq!(account.balance(2).await.unwrap(), Felt::from(40u8));
        assert_eq!(account.nonce().await.unwrap(), Felt::ONE);
    }
}
