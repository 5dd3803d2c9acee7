//! Deterministic in-memory ledger.
//!
//! Implements [`LedgerClient`] over a plain account map plus the staking
//! program's four operations and system transfers, with its own clock and
//! blockhash. The orchestrator and sync loop run against it unchanged,
//! which is what makes the engine's sequencing and failure windows
//! testable without network I/O. Fees and rent are not modeled.

use super::types::{Confirmation, RpcError, SignatureStatus};
use super::LedgerClient;
use crate::position::accrual::accrue;
use crate::position::codec::StakePosition;
use crate::position::derive_position_address;
use crate::transaction::builder::{
    CLAIM_DISCRIMINATOR, INITIALIZE_DISCRIMINATOR, STAKE_DISCRIMINATOR, UNSTAKE_DISCRIMINATOR,
};

use async_trait::async_trait;
use serde_json::json;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::system_program;
use solana_sdk::transaction::Transaction;
use solana_system_interface::instruction::SystemInstruction;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone)]
struct AccountEntry {
    lamports: u64,
    data: Vec<u8>,
    owner: Pubkey,
}

#[derive(Debug)]
struct LedgerState {
    now: u64,
    blockhash: Hash,
    accounts: HashMap<Pubkey, AccountEntry>,
    statuses: HashMap<Signature, SignatureStatus>,
    network_ops: u64,
    fail_next_send: Option<String>,
    fail_next_transfer: bool,
    fail_balance_reads: bool,
    hold_confirmations: bool,
}

/// In-memory stand-in for the cluster plus the staking program.
pub struct InMemoryLedger {
    program_id: Pubkey,
    inner: Mutex<LedgerState>,
}

impl InMemoryLedger {
    pub fn new(program_id: Pubkey) -> Self {
        Self {
            program_id,
            inner: Mutex::new(LedgerState {
                now: 1_700_000_000,
                blockhash: Hash::new_unique(),
                accounts: HashMap::new(),
                statuses: HashMap::new(),
                network_ops: 0,
                fail_next_send: None,
                fail_next_transfer: false,
                fail_balance_reads: false,
                hold_confirmations: false,
            }),
        }
    }

    /// Credit `lamports` to an account, creating it if needed.
    pub fn credit(&self, address: &Pubkey, lamports: u64) {
        let mut state = self.inner.lock().unwrap();
        state
            .accounts
            .entry(*address)
            .or_insert_with(|| AccountEntry {
                lamports: 0,
                data: Vec::new(),
                owner: system_program::id(),
            })
            .lamports += lamports;
    }

    /// Current lamport balance of an account.
    pub fn lamports(&self, address: &Pubkey) -> u64 {
        let state = self.inner.lock().unwrap();
        state
            .accounts
            .get(address)
            .map(|entry| entry.lamports)
            .unwrap_or(0)
    }

    /// Install a position account directly, bypassing the program.
    pub fn seed_position(&self, owner: &Pubkey, staked: u64, points: u64, last_updated: u64) {
        let (address, bump) = derive_position_address(&self.program_id, owner);
        let position = StakePosition {
            owner: *owner,
            staked_amount: staked,
            total_points: points,
            last_updated_time: last_updated,
            bump,
        };
        let mut state = self.inner.lock().unwrap();
        state.accounts.insert(
            address,
            AccountEntry {
                lamports: staked,
                data: position.encode(),
                owner: self.program_id,
            },
        );
    }

    /// Decode the current position of `owner`, if one exists.
    pub fn position(&self, owner: &Pubkey) -> Option<StakePosition> {
        let (address, _bump) = derive_position_address(&self.program_id, owner);
        let state = self.inner.lock().unwrap();
        let entry = state.accounts.get(&address)?;
        StakePosition::decode(&entry.data).ok()
    }

    /// Set the ledger clock (Unix seconds).
    pub fn set_clock(&self, now: u64) {
        self.inner.lock().unwrap().now = now;
    }

    /// Rotate the current blockhash, invalidating the previous one.
    pub fn advance_blockhash(&self) {
        self.inner.lock().unwrap().blockhash = Hash::new_unique();
    }

    /// Fail the next submission with the given node message.
    pub fn fail_next_send(&self, message: &str) {
        self.inner.lock().unwrap().fail_next_send = Some(message.to_string());
    }

    /// Fail the next submission whose first instruction is a system
    /// transfer. Lets tests break the payout leg of a claim while the
    /// claim instruction itself lands.
    pub fn fail_next_transfer(&self) {
        self.inner.lock().unwrap().fail_next_transfer = true;
    }

    /// While set, balance reads fail with a transport-shaped error.
    /// Position reads are unaffected; the two degrade independently.
    pub fn fail_balance_reads(&self, fail: bool) {
        self.inner.lock().unwrap().fail_balance_reads = fail;
    }

    /// While held, submitted signatures report no status yet.
    pub fn hold_confirmations(&self, hold: bool) {
        self.inner.lock().unwrap().hold_confirmations = hold;
    }

    /// Total trait-level calls that reached this ledger.
    pub fn network_ops(&self) -> u64 {
        self.inner.lock().unwrap().network_ops
    }

    fn first_instruction_is_transfer(&self, transaction: &Transaction) -> bool {
        let message = &transaction.message;
        message
            .instructions
            .first()
            .map(|ix| {
                message
                    .account_keys
                    .get(ix.program_id_index as usize)
                    .map(|program| *program == system_program::id())
                    .unwrap_or(false)
            })
            .unwrap_or(false)
    }
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, RpcError> {
        let mut state = self.inner.lock().unwrap();
        state.network_ops += 1;
        Ok(state.accounts.get(address).map(|entry| entry.data.clone()))
    }

    async fn balance(&self, address: &Pubkey) -> Result<u64, RpcError> {
        let mut state = self.inner.lock().unwrap();
        state.network_ops += 1;
        if state.fail_balance_reads {
            return Err(RpcError::RpcFailure {
                code: -32005,
                message: "Node is behind".to_string(),
                data: None,
            });
        }
        Ok(state
            .accounts
            .get(address)
            .map(|entry| entry.lamports)
            .unwrap_or(0))
    }

    async fn latest_blockhash(&self) -> Result<Hash, RpcError> {
        let mut state = self.inner.lock().unwrap();
        state.network_ops += 1;
        Ok(state.blockhash)
    }

    async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature, RpcError> {
        let is_transfer = self.first_instruction_is_transfer(transaction);

        let mut state = self.inner.lock().unwrap();
        state.network_ops += 1;

        if let Some(message) = state.fail_next_send.take() {
            return Err(RpcError::RpcFailure {
                code: -32002,
                message,
                data: None,
            });
        }
        if state.fail_next_transfer && is_transfer {
            state.fail_next_transfer = false;
            return Err(RpcError::RpcFailure {
                code: -32005,
                message: "Node is behind".to_string(),
                data: None,
            });
        }

        if transaction.signatures.is_empty() || transaction.verify().is_err() {
            return Err(RpcError::RpcFailure {
                code: -32003,
                message: "Transaction signature verification failure".to_string(),
                data: None,
            });
        }

        let signature = transaction.signatures[0];
        if state.statuses.contains_key(&signature) {
            return Err(RpcError::RpcFailure {
                code: -32002,
                message: "Transaction simulation failed: This transaction has already been processed"
                    .to_string(),
                data: None,
            });
        }
        if transaction.message.recent_blockhash != state.blockhash {
            return Err(RpcError::RpcFailure {
                code: -32002,
                message: "Transaction simulation failed: Blockhash not found".to_string(),
                data: None,
            });
        }

        // Execute against a scratch copy so a failing instruction leaves
        // no partial state behind.
        let mut scratch = state.accounts.clone();
        let now = state.now;
        let keys = &transaction.message.account_keys;

        for (index, instruction) in transaction.message.instructions.iter().enumerate() {
            let program = keys
                .get(instruction.program_id_index as usize)
                .copied()
                .unwrap_or_default();

            let result = if program == system_program::id() {
                apply_system_instruction(&mut scratch, keys, &instruction.accounts, &instruction.data)
            } else if program == self.program_id {
                apply_stake_instruction(
                    &mut scratch,
                    &self.program_id,
                    keys,
                    &instruction.accounts,
                    &instruction.data,
                    now,
                )
            } else {
                Err(ExecError::Raw("unknown program".to_string()))
            };

            if let Err(err) = result {
                return Err(err.into_rpc(index));
            }
        }

        state.accounts = scratch;
        state.statuses.insert(
            signature,
            SignatureStatus {
                confirmation: Confirmation::Finalized,
                err: None,
            },
        );
        Ok(signature)
    }

    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, RpcError> {
        let mut state = self.inner.lock().unwrap();
        state.network_ops += 1;
        if state.hold_confirmations {
            return Ok(None);
        }
        Ok(state.statuses.get(signature).cloned())
    }
}

enum ExecError {
    /// Program custom error code, as the runtime would report it.
    Custom(u32),
    /// Any other instruction-level failure.
    Raw(String),
}

impl ExecError {
    fn into_rpc(self, index: usize) -> RpcError {
        match self {
            ExecError::Custom(code) => RpcError::RpcFailure {
                code: -32002,
                message: format!(
                    "Transaction simulation failed: Error processing Instruction {index}: custom program error: {code:#x}"
                ),
                data: Some(json!({
                    "err": {"InstructionError": [index, {"Custom": code}]},
                    "logs": [],
                })),
            },
            ExecError::Raw(reason) => RpcError::RpcFailure {
                code: -32002,
                message: format!(
                    "Transaction simulation failed: Error processing Instruction {index}: {reason}"
                ),
                data: Some(json!({
                    "err": {"InstructionError": [index, reason]},
                    "logs": [],
                })),
            },
        }
    }
}

fn resolved(
    keys: &[Pubkey],
    account_indexes: &[u8],
    position: usize,
) -> Result<Pubkey, ExecError> {
    account_indexes
        .get(position)
        .and_then(|&index| keys.get(index as usize))
        .copied()
        .ok_or_else(|| ExecError::Raw("not enough account keys".to_string()))
}

fn move_lamports(
    accounts: &mut HashMap<Pubkey, AccountEntry>,
    from: &Pubkey,
    to: &Pubkey,
    lamports: u64,
) -> Result<(), ExecError> {
    let source = accounts
        .get_mut(from)
        .filter(|entry| entry.lamports >= lamports)
        .ok_or_else(|| ExecError::Raw("insufficient lamports".to_string()))?;
    source.lamports -= lamports;

    accounts
        .entry(*to)
        .or_insert_with(|| AccountEntry {
            lamports: 0,
            data: Vec::new(),
            owner: system_program::id(),
        })
        .lamports += lamports;
    Ok(())
}

fn apply_system_instruction(
    accounts: &mut HashMap<Pubkey, AccountEntry>,
    keys: &[Pubkey],
    account_indexes: &[u8],
    data: &[u8],
) -> Result<(), ExecError> {
    let decoded: SystemInstruction = bincode::deserialize(data)
        .map_err(|_| ExecError::Raw("invalid instruction data".to_string()))?;

    match decoded {
        SystemInstruction::Transfer { lamports } => {
            let from = resolved(keys, account_indexes, 0)?;
            let to = resolved(keys, account_indexes, 1)?;
            move_lamports(accounts, &from, &to, lamports)
        }
        _ => Err(ExecError::Raw("unsupported system instruction".to_string())),
    }
}

fn apply_stake_instruction(
    accounts: &mut HashMap<Pubkey, AccountEntry>,
    program_id: &Pubkey,
    keys: &[Pubkey],
    account_indexes: &[u8],
    data: &[u8],
    now: u64,
) -> Result<(), ExecError> {
    if data.len() < 8 {
        return Err(ExecError::Raw("invalid instruction data".to_string()));
    }
    let mut discriminator = [0u8; 8];
    discriminator.copy_from_slice(&data[..8]);

    let user = resolved(keys, account_indexes, 0)?;
    let position_key = resolved(keys, account_indexes, 1)?;

    match discriminator {
        INITIALIZE_DISCRIMINATOR => {
            let (expected, bump) = derive_position_address(program_id, &user);
            if expected != position_key {
                return Err(ExecError::Custom(6002));
            }
            if accounts.contains_key(&position_key) {
                return Err(ExecError::Raw("account already in use".to_string()));
            }
            let position = StakePosition {
                owner: user,
                staked_amount: 0,
                total_points: 0,
                last_updated_time: now,
                bump,
            };
            accounts.insert(
                position_key,
                AccountEntry {
                    lamports: 0,
                    data: position.encode(),
                    owner: *program_id,
                },
            );
            Ok(())
        }
        STAKE_DISCRIMINATOR => {
            let amount = read_amount(data)?;
            if amount == 0 {
                return Err(ExecError::Custom(6000));
            }
            let mut position = load_position(accounts, &position_key)?;
            if position.owner != user {
                return Err(ExecError::Custom(6002));
            }
            move_lamports(accounts, &user, &position_key, amount)?;

            position.total_points = accrue(
                position.staked_amount,
                position.last_updated_time,
                position.total_points,
                now,
            );
            position.staked_amount = position
                .staked_amount
                .checked_add(amount)
                .ok_or(ExecError::Custom(6003))?;
            position.last_updated_time = now;
            store_position(accounts, &position_key, &position);
            Ok(())
        }
        UNSTAKE_DISCRIMINATOR => {
            let amount = read_amount(data)?;
            if amount == 0 {
                return Err(ExecError::Custom(6000));
            }
            let mut position = load_position(accounts, &position_key)?;
            if position.owner != user {
                return Err(ExecError::Custom(6002));
            }
            if amount > position.staked_amount {
                return Err(ExecError::Custom(6001));
            }
            move_lamports(accounts, &position_key, &user, amount)?;

            position.total_points = accrue(
                position.staked_amount,
                position.last_updated_time,
                position.total_points,
                now,
            );
            position.staked_amount -= amount;
            position.last_updated_time = now;
            store_position(accounts, &position_key, &position);
            Ok(())
        }
        CLAIM_DISCRIMINATOR => {
            let mut position = load_position(accounts, &position_key)?;
            if position.owner != user {
                return Err(ExecError::Custom(6002));
            }
            // Checkpoint, then consume: the two are atomic on this side.
            position.total_points = 0;
            position.last_updated_time = now;
            store_position(accounts, &position_key, &position);
            Ok(())
        }
        _ => Err(ExecError::Raw("invalid instruction data".to_string())),
    }
}

fn read_amount(data: &[u8]) -> Result<u64, ExecError> {
    if data.len() < 16 {
        return Err(ExecError::Raw("invalid instruction data".to_string()));
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&data[8..16]);
    Ok(u64::from_le_bytes(buf))
}

fn load_position(
    accounts: &HashMap<Pubkey, AccountEntry>,
    position_key: &Pubkey,
) -> Result<StakePosition, ExecError> {
    let entry = accounts
        .get(position_key)
        .ok_or_else(|| ExecError::Raw("position account does not exist".to_string()))?;
    StakePosition::decode(&entry.data)
        .map_err(|e| ExecError::Raw(format!("position account undecodable: {e}")))
}

fn store_position(
    accounts: &mut HashMap<Pubkey, AccountEntry>,
    position_key: &Pubkey,
    position: &StakePosition,
) {
    if let Some(entry) = accounts.get_mut(position_key) {
        entry.data = position.encode();
    }
}
