//! Cross-Chain Escrow Contract
//!
//! Routes marketplace trades whose asset lives on a different network than
//! the buyer's settlement into a locked escrow guarded by a committee of up
//! to three validators. The buyer's deposit (`price + fee`) is held by this
//! contract and released exactly once, either to the seller (quorum reached,
//! arbiter ruling, or auto-release) or back to the buyer (arbiter ruling or
//! an unresolved dispute past its grace period).
//!
//! Auto-release: an escrow nobody disputes is paid to the seller once its
//! auto-release height is reached, even with zero confirmations.
//!
//! Collaborators are other contracts: the listing registry (read + status
//! writes), the stats ledger (one `record_sale` per released escrow) and the
//! settlement token.

#![no_std]

use soroban_sdk::{contract, contractimpl, log, symbol_short, Address, Env, Symbol, Vec};

mod bridge;
mod consensus;
mod errors;
mod funds;
mod storage;
mod types;

pub use bridge::{
    ListingRegistryClient, ListingRegistryInterface, StatsLedgerClient, StatsLedgerInterface,
};
pub use errors::ContractError;
pub use types::*;


// ---------------------------------------------------------------------------
// Event symbols
// ---------------------------------------------------------------------------

const EVT_INIT: Symbol = symbol_short!("esc_init");
const EVT_CREATED: Symbol = symbol_short!("esc_crtd");
const EVT_CONFIRMED: Symbol = symbol_short!("esc_conf");
const EVT_DISPUTED: Symbol = symbol_short!("esc_disp");
const EVT_RULED: Symbol = symbol_short!("esc_rule");
const EVT_RELEASED: Symbol = symbol_short!("esc_rel");
const EVT_REFUNDED: Symbol = symbol_short!("esc_rfnd");
const EVT_RELISTED: Symbol = symbol_short!("esc_rlst");
const EVT_SKIPPED: Symbol = symbol_short!("esc_skip");
const EVT_FEE_UPDATED: Symbol = symbol_short!("fee_upd");
const EVT_GRACE_UPDATED: Symbol = symbol_short!("grace_upd");
const EVT_FEES_COLLECTED: Symbol = symbol_short!("fee_coll");

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

#[contract]
pub struct CrossChainEscrow;

#[contractimpl]
impl CrossChainEscrow {
    // ========================================================================
    // Initialization and configuration
    // ========================================================================

    /// Initialize the contract.
    ///
    /// # Arguments
    /// * `admin` - Administrator; also arbitrates disputes
    /// * `token` - Settlement token deposits are held in
    /// * `operator` - Marketplace operator receiving fees
    /// * `registry` - ListingRegistry contract
    /// * `stats` - MarketplaceStats contract
    pub fn initialize(
        env: Env,
        admin: Address,
        token: Address,
        operator: Address,
        registry: Address,
        stats: Address,
    ) -> Result<(), ContractError> {
        if storage::has_config(&env) {
            return Err(ContractError::AlreadyInitialized);
        }

        let config = EscrowConfig::new(admin.clone(), token.clone(), operator, registry, stats);
        storage::set_config(&env, &config);
        storage::set_next_id(&env, 1);

        env.events().publish((EVT_INIT,), (admin, token));
        Ok(())
    }

    /// Update the marketplace fee (admin only). Applies to escrows created
    /// afterwards; existing escrows keep the fee they were opened with.
    pub fn set_fee_bps(env: Env, fee_bps: u32) -> Result<(), ContractError> {
        let mut config = storage::config(&env)?;
        config.admin.require_auth();

        if fee_bps > MAX_FEE_BPS {
            return Err(ContractError::InvalidFee);
        }

        config.fee_bps = fee_bps;
        storage::set_config(&env, &config);

        env.events().publish((EVT_FEE_UPDATED,), (fee_bps,));
        Ok(())
    }

    /// Update the dispute grace period in ledgers (admin only). Applies to
    /// escrows created afterwards.
    pub fn set_dispute_grace(env: Env, grace: u32) -> Result<(), ContractError> {
        let mut config = storage::config(&env)?;
        config.admin.require_auth();

        if grace == 0 {
            return Err(ContractError::InvalidDuration);
        }

        config.dispute_grace = grace;
        storage::set_config(&env, &config);

        env.events().publish((EVT_GRACE_UPDATED,), (grace,));
        Ok(())
    }

    pub fn get_config(env: Env) -> Result<EscrowConfig, ContractError> {
        storage::config(&env)
    }

    /// Deposit a buyer must lock for an escrow at `price` under the current fee.
    pub fn quote_deposit(env: Env, price: i128) -> Result<i128, ContractError> {
        if price <= 0 {
            return Err(ContractError::InvalidPrice);
        }
        let config = storage::config(&env)?;
        let fee = funds::fee_for(price, config.fee_bps)?;
        funds::deposit_for(price, fee)
    }

    // ========================================================================
    // Escrow lifecycle
    // ========================================================================

    /// Open an escrow for a cross-chain listing.
    ///
    /// Every precondition is checked before the buyer's deposit is pulled;
    /// a rejected request leaves no record behind and consumes no escrow id.
    ///
    /// # Arguments
    /// * `seller` - Listing owner opening the escrow (must authorize)
    /// * `listing` - Registry key of the listing being sold
    /// * `buyer` - Account whose deposit is locked (must authorize)
    /// * `source_chain` - Network id of the asset's home ledger
    /// * `target_chain` - Network id the buyer settles on; must match the listing
    /// * `duration` - Ledgers until auto-release; disputes close at half of it
    /// * `committee` - Up to three distinct validators
    pub fn create_escrow(
        env: Env,
        seller: Address,
        listing: ListingKey,
        buyer: Address,
        source_chain: u32,
        target_chain: u32,
        duration: u32,
        committee: Vec<Address>,
    ) -> Result<EscrowReceipt, ContractError> {
        seller.require_auth();
        buyer.require_auth();

        let config = storage::config(&env)?;
        let now = env.ledger().sequence();

        let source = Network::from_id(source_chain).ok_or(ContractError::InvalidChain)?;
        let target = Network::from_id(target_chain).ok_or(ContractError::InvalidChain)?;
        if source == target {
            return Err(ContractError::InvalidChain);
        }
        if duration == 0 {
            return Err(ContractError::InvalidDuration);
        }
        Self::check_committee(&committee)?;

        let record = bridge::checkout(&env, &config.registry, &listing, &seller, target, now)?;
        let fee = funds::fee_for(record.price, config.fee_bps)?;
        let deposit = funds::deposit_for(record.price, fee)?;
        let state = consensus::initialize(&env, committee, duration, config.dispute_grace, now)?;

        funds::lock_deposit(&env, &config.token, &buyer, deposit)?;

        let escrow_id = storage::take_next_id(&env)?;
        let escrow = EscrowRecord {
            id: escrow_id,
            listing: listing.clone(),
            seller: seller.clone(),
            buyer: buyer.clone(),
            price: record.price,
            fee,
            deposit,
            source_network: source,
            target_network: target,
            created_at: now,
            status: EscrowStatus::Pending,
        };
        storage::save_escrow(&env, &escrow);
        storage::save_consensus(&env, escrow_id, &state);
        storage::set_listing_escrow(&env, &listing, escrow_id);
        storage::add_pending(&env, escrow_id);

        bridge::lock(&env, &config.registry, &listing);

        log!(&env, "Escrow {} opened, deposit {}", escrow_id, deposit);
        env.events().publish(
            (EVT_CREATED,),
            (escrow_id, seller, buyer, deposit, state.auto_release_height),
        );

        Ok(EscrowReceipt { escrow_id, deposit })
    }

    /// Record a committee member's confirmation. Re-confirming is a no-op.
    /// Returns the number of confirmations collected so far.
    pub fn confirm(env: Env, escrow_id: u64, validator: Address) -> Result<u32, ContractError> {
        validator.require_auth();

        let mut state = Self::pending_consensus(&env, escrow_id)?;
        let now = env.ledger().sequence();

        if consensus::confirm(&mut state, &validator, now)? {
            storage::save_consensus(&env, escrow_id, &state);
            env.events()
                .publish((EVT_CONFIRMED,), (escrow_id, validator, state.confirmations.len()));
        }

        Ok(state.confirmations.len())
    }

    /// Raise a dispute on a pending escrow. Only committee members may do so,
    /// and only before the dispute deadline. A second dispute is a no-op.
    pub fn raise_dispute(env: Env, escrow_id: u64, validator: Address) -> Result<(), ContractError> {
        validator.require_auth();

        let mut state = Self::pending_consensus(&env, escrow_id)?;
        let now = env.ledger().sequence();

        if consensus::raise_dispute(&mut state, &validator, now)? {
            storage::save_consensus(&env, escrow_id, &state);
            env.events().publish((EVT_DISPUTED,), (escrow_id, validator));
        }

        Ok(())
    }

    /// Arbiter ruling on a disputed escrow, settled immediately.
    ///
    /// # Arguments
    /// * `escrow_id` - Disputed escrow
    /// * `refund` - `true` refunds the buyer, `false` releases to the seller
    pub fn resolve_dispute(
        env: Env,
        escrow_id: u64,
        refund: bool,
    ) -> Result<EscrowStatus, ContractError> {
        let config = storage::config(&env)?;
        config.admin.require_auth();

        let mut state = Self::pending_consensus(&env, escrow_id)?;
        let ruling = if refund { Ruling::Refund } else { Ruling::Release };

        if consensus::record_ruling(&mut state, ruling)? {
            storage::save_consensus(&env, escrow_id, &state);
            env.events().publish((EVT_RULED,), (escrow_id, ruling));
        }

        Self::settle_escrow(&env, &config, escrow_id)
    }

    /// Evaluate the committee at the current height and, on a terminal
    /// decision, perform the single fund disposition. Anyone may call this;
    /// calling it on an undecided or already settled escrow changes nothing.
    pub fn settle(env: Env, escrow_id: u64) -> Result<EscrowStatus, ContractError> {
        let config = storage::config(&env)?;
        Self::settle_escrow(&env, &config, escrow_id)
    }

    /// Settle up to `limit` pending escrows that have reached a terminal
    /// decision. Returns how many were settled.
    ///
    /// Undecided escrows are passed over without counting against `limit`.
    /// Each call scans at most `MAX_SWEEP_SCAN` ids, resuming where the
    /// previous call stopped and wrapping back to the oldest pending escrow.
    /// An escrow whose payout fails is left pending and reported with an
    /// `esc_skip` event; the rest of the batch still settles.
    pub fn settle_due(env: Env, limit: u32) -> Result<u32, ContractError> {
        let config = storage::config(&env)?;
        let now = env.ledger().sequence();
        let ceiling = storage::id_ceiling(&env);
        let floor = storage::advance_sweep_floor(&env, MAX_SWEEP_SCAN);

        let mut escrow_id = storage::sweep_next(&env).max(floor);
        if escrow_id >= ceiling {
            escrow_id = floor;
        }

        let mut settled = 0u32;
        let mut scanned = 0u32;
        while escrow_id < ceiling && settled < limit && scanned < MAX_SWEEP_SCAN {
            scanned += 1;
            if storage::is_pending(&env, escrow_id) {
                let state = storage::consensus(&env, escrow_id)?;
                if consensus::decide(&state, now) != Decision::Undecided {
                    match Self::settle_escrow(&env, &config, escrow_id) {
                        Ok(_) => settled += 1,
                        Err(ContractError::TransferFailed) => {
                            log!(&env, "Escrow {} payout failed, left pending", escrow_id);
                            env.events().publish((EVT_SKIPPED,), (escrow_id,));
                        }
                        Err(err) => return Err(err),
                    }
                }
            }
            escrow_id += 1;
        }

        storage::set_sweep_next(&env, escrow_id);
        Ok(settled)
    }

    /// Put a listing back on the market after its escrow was refunded.
    pub fn relist(env: Env, seller: Address, listing: ListingKey) -> Result<(), ContractError> {
        seller.require_auth();

        let config = storage::config(&env)?;
        let escrow_id =
            storage::listing_escrow(&env, &listing).ok_or(ContractError::EscrowNotFound)?;
        let escrow = storage::escrow(&env, escrow_id)?;

        if escrow.seller != seller {
            return Err(ContractError::Unauthorized);
        }
        if escrow.status != EscrowStatus::Refunded {
            return Err(ContractError::EscrowNotRefunded);
        }

        bridge::reopen(&env, &config.registry, &listing)?;

        env.events().publish((EVT_RELISTED,), (escrow_id, seller));
        Ok(())
    }

    /// Send the buyer-side fees kept from released escrows to the operator
    /// (admin only). Returns the amount collected.
    pub fn collect_retained_fees(env: Env) -> Result<i128, ContractError> {
        let config = storage::config(&env)?;
        config.admin.require_auth();

        let amount = storage::retained(&env);
        if amount <= 0 {
            return Err(ContractError::NothingToCollect);
        }

        storage::set_retained(&env, 0);
        funds::pay_out(&env, &config.token, &config.operator, amount)?;

        env.events()
            .publish((EVT_FEES_COLLECTED,), (config.operator, amount));
        Ok(amount)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn get_escrow(env: Env, escrow_id: u64) -> Option<EscrowRecord> {
        storage::find_escrow(&env, escrow_id)
    }

    pub fn get_consensus(env: Env, escrow_id: u64) -> Option<ConsensusState> {
        storage::find_consensus(&env, escrow_id)
    }

    /// Status as seen by users: a pending escrow is reported as `Disputed`
    /// once a dispute is raised, or `Confirmed` once quorum is reached.
    pub fn escrow_status(env: Env, escrow_id: u64) -> Result<EscrowStatus, ContractError> {
        let escrow = storage::escrow(&env, escrow_id)?;
        if escrow.status != EscrowStatus::Pending {
            return Ok(escrow.status);
        }

        let state = storage::consensus(&env, escrow_id)?;
        if state.dispute_raised {
            Ok(EscrowStatus::Disputed)
        } else if consensus::quorum_reached(&state) {
            Ok(EscrowStatus::Confirmed)
        } else {
            Ok(EscrowStatus::Pending)
        }
    }

    /// Committee decision at the current ledger height.
    pub fn decision(env: Env, escrow_id: u64) -> Result<Decision, ContractError> {
        let state = storage::consensus(&env, escrow_id)?;
        Ok(consensus::decide(&state, env.ledger().sequence()))
    }

    /// Latest escrow opened for `listing`.
    pub fn escrow_for_listing(env: Env, listing: ListingKey) -> Option<u64> {
        storage::listing_escrow(&env, &listing)
    }

    /// Pending escrow ids in `from..from + limit`, looking at no more than
    /// `MAX_SWEEP_SCAN` ids.
    pub fn pending_escrows(env: Env, from: u64, limit: u32) -> Vec<u64> {
        let from = from.max(1);
        let end = from
            .saturating_add(limit.min(MAX_SWEEP_SCAN) as u64)
            .min(storage::id_ceiling(&env));

        let mut ids = Vec::new(&env);
        for escrow_id in from..end {
            if storage::is_pending(&env, escrow_id) {
                ids.push_back(escrow_id);
            }
        }
        ids
    }

    pub fn pending_count(env: Env) -> u32 {
        storage::pending_count(&env)
    }

    pub fn retained_fees(env: Env) -> i128 {
        storage::retained(&env)
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

impl CrossChainEscrow {
    fn check_committee(committee: &Vec<Address>) -> Result<(), ContractError> {
        if committee.len() > MAX_COMMITTEE {
            return Err(ContractError::InvalidCommittee);
        }
        for (i, member) in committee.iter().enumerate() {
            for other in committee.iter().skip(i + 1) {
                if member == other {
                    return Err(ContractError::InvalidCommittee);
                }
            }
        }
        Ok(())
    }

    /// Consensus state of an escrow that can still change.
    fn pending_consensus(env: &Env, escrow_id: u64) -> Result<ConsensusState, ContractError> {
        let escrow = storage::escrow(env, escrow_id)?;
        if escrow.status != EscrowStatus::Pending {
            return Err(ContractError::EscrowNotPending);
        }
        storage::consensus(env, escrow_id)
    }

    fn settle_escrow(
        env: &Env,
        config: &EscrowConfig,
        escrow_id: u64,
    ) -> Result<EscrowStatus, ContractError> {
        let mut escrow = storage::escrow(env, escrow_id)?;
        if escrow.status.is_terminal() {
            return Ok(escrow.status);
        }

        let state = storage::consensus(env, escrow_id)?;
        match consensus::decide(&state, env.ledger().sequence()) {
            Decision::Undecided => Ok(escrow.status),
            Decision::ReleaseToSeller => Self::release(env, config, &mut escrow),
            Decision::RefundToBuyer => Self::refund(env, config, &mut escrow),
        }
    }

    fn release(
        env: &Env,
        config: &EscrowConfig,
        escrow: &mut EscrowRecord,
    ) -> Result<EscrowStatus, ContractError> {
        let payout = funds::seller_payout(escrow.price, escrow.fee)?;

        // The buyer-side fee stays in the contract until collected
        let retained = storage::retained(env)
            .checked_add(escrow.deposit - escrow.price)
            .ok_or(ContractError::MathOverflow)?;
        let retained_with_fee = retained
            .checked_add(escrow.fee)
            .ok_or(ContractError::MathOverflow)?;

        // Nothing is written before the seller payout
        funds::pay_out(env, &config.token, &escrow.seller, payout)?;

        // An operator that cannot receive has its fee kept with the retained fees
        let retained = match funds::pay_out(env, &config.token, &config.operator, escrow.fee) {
            Ok(()) => retained,
            Err(_) => retained_with_fee,
        };
        storage::set_retained(env, retained);

        escrow.status = EscrowStatus::Released;
        storage::save_escrow(env, escrow);
        storage::remove_pending(env, escrow.id);

        bridge::mark_sold(env, &config.registry, &escrow.listing);
        bridge::record_sale(env, &config.stats, &escrow.seller, &escrow.buyer, escrow.price);

        log!(env, "Escrow {} released, seller paid {}", escrow.id, payout);
        env.events()
            .publish((EVT_RELEASED,), (escrow.id, escrow.seller.clone(), payout, escrow.fee));

        Ok(escrow.status)
    }

    fn refund(
        env: &Env,
        config: &EscrowConfig,
        escrow: &mut EscrowRecord,
    ) -> Result<EscrowStatus, ContractError> {
        funds::pay_out(env, &config.token, &escrow.buyer, escrow.deposit)?;

        escrow.status = EscrowStatus::Refunded;
        storage::save_escrow(env, escrow);
        storage::remove_pending(env, escrow.id);

        // Listing stays InEscrow until the seller relists it

        log!(env, "Escrow {} refunded {}", escrow.id, escrow.deposit);
        env.events()
            .publish((EVT_REFUNDED,), (escrow.id, escrow.buyer.clone(), escrow.deposit));

        Ok(escrow.status)
    }
}
