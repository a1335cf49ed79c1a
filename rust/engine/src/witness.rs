//! Witness records handed to the proving pipeline, and their JSON form.

use serde_json::{Map, Value};
use starknet::core::types::Felt;

use crate::address::SlotAddress;
use crate::command::Command;
use crate::merkle::{verify_path, Leaf};
use crate::utils::{bytes_to_hex, felt_to_hex};

/// One mutated leaf: its pre/post value and the siblings that authenticate both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathInfo {
    pub address: SlotAddress,
    pub leaf_index: u64,
    pub old_leaf: Leaf,
    pub new_leaf: Leaf,
    pub siblings: Vec<Felt>,
    pub root_before: Felt,
    pub root_after: Felt,
}

impl PathInfo {
    /// Both roots are reproducible from the recorded leaves and siblings.
    pub fn is_consistent(&self) -> bool {
        verify_path(&self.old_leaf, self.leaf_index, &self.siblings, self.root_before)
            && verify_path(&self.new_leaf, self.leaf_index, &self.siblings, self.root_after)
    }
}

pub fn path_to_json(path: &PathInfo) -> Value {
    let mut map = Map::new();
    map.insert(
        "address".to_string(),
        serde_json::to_value(path.address).unwrap_or(Value::Null),
    );
    map.insert("leaf_index".to_string(), Value::from(path.leaf_index));
    map.insert("old_leaf".to_string(), felts_to_json(&path.old_leaf));
    map.insert("new_leaf".to_string(), felts_to_json(&path.new_leaf));
    map.insert("siblings".to_string(), felts_to_json(&path.siblings));
    map.insert("root_before".to_string(), Value::String(felt_to_hex(path.root_before)));
    map.insert("root_after".to_string(), Value::String(felt_to_hex(path.root_after)));
    Value::Object(map)
}

pub fn paths_to_json(paths: &[PathInfo]) -> Value {
    Value::Array(paths.iter().map(path_to_json).collect())
}

/// Decoded fields of a command, words as field elements.
pub fn command_to_json(command: &Command) -> Value {
    let raw = command.to_raw();
    let mut map = Map::new();
    map.insert("op".to_string(), Value::String(command.op().name().to_string()));
    map.insert("opcode".to_string(), Value::from(command.op() as u8));
    map.insert("nonce".to_string(), Value::from(raw.nonce));
    map.insert("caller".to_string(), Value::from(command.caller_account_index()));
    map.insert("index0".to_string(), Value::from(raw.index0));
    map.insert("index1".to_string(), Value::from(raw.index1));
    map.insert("word0".to_string(), Value::String(bytes_to_hex(&raw.word0)));
    map.insert("word1".to_string(), Value::String(bytes_to_hex(&raw.word1)));
    map.insert("payload".to_string(), Value::String(bytes_to_hex(&raw.encode())));
    Value::Object(map)
}

/// Output of one executed command, in execution order.
pub fn execution_to_json(command: &Command, paths: &[PathInfo]) -> Value {
    let mut value = command_to_json(command);
    if let Value::Object(map) = &mut value {
        map.insert("paths".to_string(), paths_to_json(paths));
    }
    value
}

fn felts_to_json(values: &[Felt]) -> Value {
    Value::Array(
        values
            .iter()
            .map(|value| Value::String(felt_to_hex(*value)))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merkle::{MemoryNodeStore, MerkleTree, EMPTY_LEAF};

    #[tokio::test]
    async fn path_json_carries_hex_leaves() {
        let mut tree = MerkleTree::new(MemoryNodeStore::new(), 3).await.unwrap();
        let new_leaf = [Felt::from(255u32), Felt::ZERO, Felt::ZERO, Felt::ZERO];
        let update = tree.update_leaf(2, new_leaf).await.unwrap();
        let path = PathInfo {
            address: SlotAddress::Nonce { account: 2 },
            leaf_index: 2,
            old_leaf: update.old_leaf,
            new_leaf,
            siblings: update.siblings,
            root_before: update.root_before,
            root_after: update.root_after,
        };
        assert!(path.is_consistent());
        assert_eq!(path.old_leaf, EMPTY_LEAF);

        let json = path_to_json(&path);
        assert_eq!(json["address"]["kind"], "nonce");
        assert_eq!(json["address"]["account"], 2);
        assert_eq!(json["new_leaf"][0], "0xff");
        assert_eq!(json["siblings"].as_array().map(Vec::len), Some(3));
    }

    #[test]
    fn command_json_names_op_and_caller() {
        let command = Command::Withdraw(crate::withdraw::WithdrawCommand {
            nonce: 4,
            account: 2,
            token: 1,
            amount: Felt::from(16u8),
            l1_address: Felt::ZERO,
        });
        let json = execution_to_json(&command, &[]);
        assert_eq!(json["op"], "withdraw");
        assert_eq!(json["opcode"], 2);
        assert_eq!(json["caller"], 2);
        assert_eq!(json["paths"].as_array().map(Vec::len), Some(0));
        assert!(json["word0"].as_str().unwrap_or_default().ends_with("10"));
    }
}
