use soroban_sdk::Env;

use crate::errors::ContractError;
use crate::types::{ConsensusState, DataKey, EscrowConfig, EscrowRecord, ListingKey};

pub fn has_config(env: &Env) -> bool {
    env.storage().instance().has(&DataKey::Config)
}

pub fn config(env: &Env) -> Result<EscrowConfig, ContractError> {
    env.storage()
        .instance()
        .get(&DataKey::Config)
        .ok_or(ContractError::NotInitialized)
}

pub fn set_config(env: &Env, config: &EscrowConfig) {
    env.storage().instance().set(&DataKey::Config, config);
}

/// Hand out the next escrow id. Only called once every precondition of a
/// create has passed, so rejected requests never consume an id.
pub fn take_next_id(env: &Env) -> Result<u64, ContractError> {
    let id = id_ceiling(env);
    let next = id.checked_add(1).ok_or(ContractError::MathOverflow)?;
    env.storage().instance().set(&DataKey::NextId, &next);
    Ok(id)
}

pub fn set_next_id(env: &Env, id: u64) {
    env.storage().instance().set(&DataKey::NextId, &id);
}

// ---------------------------------------------------------------------------
// Escrow records and consensus state
// ---------------------------------------------------------------------------

pub fn find_escrow(env: &Env, escrow_id: u64) -> Option<EscrowRecord> {
    env.storage().persistent().get(&DataKey::Escrow(escrow_id))
}

pub fn escrow(env: &Env, escrow_id: u64) -> Result<EscrowRecord, ContractError> {
    find_escrow(env, escrow_id).ok_or(ContractError::EscrowNotFound)
}

pub fn save_escrow(env: &Env, record: &EscrowRecord) {
    env.storage()
        .persistent()
        .set(&DataKey::Escrow(record.id), record);
}

pub fn find_consensus(env: &Env, escrow_id: u64) -> Option<ConsensusState> {
    env.storage().persistent().get(&DataKey::Consensus(escrow_id))
}

pub fn consensus(env: &Env, escrow_id: u64) -> Result<ConsensusState, ContractError> {
    find_consensus(env, escrow_id).ok_or(ContractError::EscrowNotFound)
}

pub fn save_consensus(env: &Env, escrow_id: u64, state: &ConsensusState) {
    env.storage()
        .persistent()
        .set(&DataKey::Consensus(escrow_id), state);
}

pub fn listing_escrow(env: &Env, listing: &ListingKey) -> Option<u64> {
    env.storage()
        .persistent()
        .get(&DataKey::ListingEscrow(listing.clone()))
}

pub fn set_listing_escrow(env: &Env, listing: &ListingKey, escrow_id: u64) {
    env.storage()
        .persistent()
        .set(&DataKey::ListingEscrow(listing.clone()), &escrow_id);
}

// ---------------------------------------------------------------------------
// Pending index
// ---------------------------------------------------------------------------

/// Escrow ids are handed out from 1 up to, but excluding, this id.
pub fn id_ceiling(env: &Env) -> u64 {
    env.storage()
        .instance()
        .get(&DataKey::NextId)
        .unwrap_or(1)
}

pub fn is_pending(env: &Env, escrow_id: u64) -> bool {
    env.storage().persistent().has(&DataKey::Pending(escrow_id))
}

pub fn pending_count(env: &Env) -> u32 {
    env.storage()
        .instance()
        .get(&DataKey::PendingCount)
        .unwrap_or(0)
}

pub fn add_pending(env: &Env, escrow_id: u64) {
    env.storage()
        .persistent()
        .set(&DataKey::Pending(escrow_id), &true);
    env.storage()
        .instance()
        .set(&DataKey::PendingCount, &(pending_count(env) + 1));
}

pub fn remove_pending(env: &Env, escrow_id: u64) {
    if !is_pending(env, escrow_id) {
        return;
    }
    env.storage()
        .persistent()
        .remove(&DataKey::Pending(escrow_id));
    env.storage()
        .instance()
        .set(&DataKey::PendingCount, &pending_count(env).saturating_sub(1));
}

/// Lowest id that may still be pending, moved past settled escrows by at
/// most `max_steps` ids per call.
pub fn advance_sweep_floor(env: &Env, max_steps: u32) -> u64 {
    let ceiling = id_ceiling(env);
    let mut floor: u64 = env
        .storage()
        .instance()
        .get(&DataKey::SweepFloor)
        .unwrap_or(1);

    let mut steps = 0;
    while floor < ceiling && steps < max_steps && !is_pending(env, floor) {
        floor += 1;
        steps += 1;
    }

    env.storage().instance().set(&DataKey::SweepFloor, &floor);
    floor
}

pub fn sweep_next(env: &Env) -> u64 {
    env.storage()
        .instance()
        .get(&DataKey::SweepNext)
        .unwrap_or(1)
}

pub fn set_sweep_next(env: &Env, escrow_id: u64) {
    env.storage().instance().set(&DataKey::SweepNext, &escrow_id);
}

// ---------------------------------------------------------------------------
// Retained buyer-side fees
// ---------------------------------------------------------------------------

pub fn retained(env: &Env) -> i128 {
    env.storage()
        .instance()
        .get(&DataKey::Retained)
        .unwrap_or(0)
}

pub fn set_retained(env: &Env, amount: i128) {
    env.storage().instance().set(&DataKey::Retained, &amount);
}
