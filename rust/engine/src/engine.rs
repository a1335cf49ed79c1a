//! Sequential driver: one storage, one command at a time.

use starknet::core::types::Felt;
use tracing::{debug, info, info_span, Instrument};

use crate::address::AccountIndex;
use crate::command::{Command, ExecutionContext};
use crate::error::EngineError;
use crate::merkle::{MemoryNodeStore, NodeStore};
use crate::storage::L2Storage;
use crate::utils::felt_to_hex;
use crate::witness::PathInfo;

pub type EngineConfig = ExecutionContext;

pub struct Engine<S> {
    storage: L2Storage<S>,
    config: EngineConfig,
    executed: u64,
}

impl Engine<MemoryNodeStore> {
    pub async fn in_memory(config: EngineConfig) -> Result<Self, EngineError> {
        Self::new(MemoryNodeStore::new(), config).await
    }
}

impl<S: NodeStore> Engine<S> {
    pub async fn new(store: S, config: EngineConfig) -> Result<Self, EngineError> {
        let storage = L2Storage::new(store).await?;
        info!(root = %felt_to_hex(storage.root()), "engine ready");
        Ok(Self {
            storage,
            config,
            executed: 0,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn root(&self) -> Felt {
        self.storage.root()
    }

    /// Number of commands applied since start.
    pub fn executed(&self) -> u64 {
        self.executed
    }

    pub fn storage(&self) -> &L2Storage<S> {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut L2Storage<S> {
        &mut self.storage
    }

    /// Applies one command. Witnesses come back in mutation order; on error the
    /// writes already made stay in the tree.
    pub async fn execute(&mut self, command: &Command) -> Result<Vec<PathInfo>, EngineError> {
        let span = info_span!(
            "execute",
            op = command.op().name(),
            caller = command.caller_account_index(),
            nonce = command.nonce()
        );
        command.check_indices()?;
        let paths = command
            .run(&mut self.storage, &self.config)
            .instrument(span.clone())
            .await?;
        self.executed += 1;
        span.in_scope(|| {
            info!(paths = paths.len(), "command executed");
            debug!(root = %felt_to_hex(self.storage.root()), "root advanced");
        });
        Ok(paths)
    }

    pub async fn execute_wire(
        &mut self,
        bytes: &[u8],
        relayer: AccountIndex,
    ) -> Result<(Command, Vec<PathInfo>), EngineError> {
        let command = Command::decode(bytes, relayer)?;
        let paths = self.execute(&command).await?;
        Ok((command, paths))
    }
}
