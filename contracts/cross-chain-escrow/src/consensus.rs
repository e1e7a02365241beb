//! Validator committee bookkeeping for a single escrow.
//!
//! Everything in here is pure state manipulation over [`ConsensusState`]:
//! no storage access, no transfers. The engine persists the state and acts on
//! whatever [`decide`] returns, so `decide` may be re-evaluated any number of
//! times for the same height without side effects.
//!
//! An undisputed escrow that has not reached quorum by its auto-release
//! height is released to the seller. Seller finality wins over buyer
//! protection unless a committee member raises a dispute in time.

use soroban_sdk::{Address, Env, Vec};

use crate::errors::ContractError;
use crate::types::{ConsensusState, Decision, Ruling, MAX_COMMITTEE};

/// Quorum for a committee of `committee_size`: `ceil((n + 1) / 2)`.
///
/// An empty committee still requires one confirmation, which it can never
/// collect; such escrows settle through auto-release only.
pub fn required_confirmations(committee_size: u32) -> u32 {
    (committee_size + 2) / 2
}

/// Build the consensus state for an escrow created at height `now`.
///
/// Committee members are expected to be distinct; the engine checks this
/// before calling in.
pub fn initialize(
    env: &Env,
    committee: Vec<Address>,
    duration: u32,
    dispute_grace: u32,
    now: u32,
) -> Result<ConsensusState, ContractError> {
    if duration == 0 {
        return Err(ContractError::InvalidDuration);
    }
    if committee.len() > MAX_COMMITTEE {
        return Err(ContractError::InvalidCommittee);
    }

    let auto_release_height = now
        .checked_add(duration)
        .ok_or(ContractError::InvalidDuration)?;
    // now + duration / 2 <= auto_release_height, cannot overflow
    let dispute_deadline = now + duration / 2;
    let resolution_deadline = dispute_deadline.saturating_add(dispute_grace);

    Ok(ConsensusState {
        required_confirmations: required_confirmations(committee.len()),
        committee,
        confirmations: Vec::new(env),
        dispute_raised: false,
        disputed_by: None,
        auto_release_height,
        dispute_deadline,
        resolution_deadline,
        ruling: Ruling::Pending,
    })
}

/// Record `validator`'s confirmation. Returns `false` when it was already
/// recorded.
pub fn confirm(
    state: &mut ConsensusState,
    validator: &Address,
    now: u32,
) -> Result<bool, ContractError> {
    if !state.committee.contains(validator) {
        return Err(ContractError::NotAValidator);
    }
    if now >= state.auto_release_height {
        return Err(ContractError::WindowClosed);
    }
    if state.confirmations.contains(validator) {
        return Ok(false);
    }

    state.confirmations.push_back(validator.clone());
    Ok(true)
}

/// Flag the escrow as disputed. Returns `false` when a dispute was already
/// raised.
pub fn raise_dispute(
    state: &mut ConsensusState,
    validator: &Address,
    now: u32,
) -> Result<bool, ContractError> {
    if !state.committee.contains(validator) {
        return Err(ContractError::NotAValidator);
    }
    if now >= state.dispute_deadline {
        return Err(ContractError::DeadlinePassed);
    }
    if state.dispute_raised {
        return Ok(false);
    }

    state.dispute_raised = true;
    state.disputed_by = Some(validator.clone());
    Ok(true)
}

/// Attach the arbiter's ruling to a disputed escrow. The first ruling
/// sticks; later ones, and `Ruling::Pending`, return `false`.
pub fn record_ruling(state: &mut ConsensusState, ruling: Ruling) -> Result<bool, ContractError> {
    if !state.dispute_raised {
        return Err(ContractError::DisputeNotRaised);
    }
    if state.ruling != Ruling::Pending || ruling == Ruling::Pending {
        return Ok(false);
    }

    state.ruling = ruling;
    Ok(true)
}

pub fn quorum_reached(state: &ConsensusState) -> bool {
    state.confirmations.len() >= state.required_confirmations
}

/// Evaluate the committee at height `now`.
pub fn decide(state: &ConsensusState, now: u32) -> Decision {
    if state.dispute_raised {
        return match state.ruling {
            Ruling::Release => Decision::ReleaseToSeller,
            Ruling::Refund => Decision::RefundToBuyer,
            Ruling::Pending if now < state.resolution_deadline => Decision::Undecided,
            Ruling::Pending => Decision::RefundToBuyer,
        };
    }

    if quorum_reached(state) || now >= state.auto_release_height {
        Decision::ReleaseToSeller
    } else {
        Decision::Undecided
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use soroban_sdk::{testutils::Address as _, vec};

    const GRACE: u32 = 200;

    fn committee_of(env: &Env, size: u32) -> Vec<Address> {
        let mut committee = Vec::new(env);
        for _ in 0..size {
            committee.push_back(Address::generate(env));
        }
        committee
    }

    #[test]
    fn test_quorum_arithmetic() {
        assert_eq!(required_confirmations(0), 1);
        assert_eq!(required_confirmations(1), 1);
        assert_eq!(required_confirmations(2), 2);
        assert_eq!(required_confirmations(3), 2);
    }

    #[test]
    fn test_initialize_heights() {
        let env = Env::default();
        let state = initialize(&env, committee_of(&env, 3), 1000, GRACE, 0).unwrap();

        assert_eq!(state.auto_release_height, 1000);
        assert_eq!(state.dispute_deadline, 500);
        assert_eq!(state.resolution_deadline, 700);
        assert_eq!(state.required_confirmations, 2);
        assert_eq!(state.confirmations.len(), 0);
        assert!(!state.dispute_raised);
    }

    #[test]
    fn test_initialize_floors_half_duration() {
        let env = Env::default();
        let state = initialize(&env, committee_of(&env, 1), 7, GRACE, 10).unwrap();
        assert_eq!(state.auto_release_height, 17);
        assert_eq!(state.dispute_deadline, 13);
    }

    #[test]
    fn test_initialize_rejects_zero_duration() {
        let env = Env::default();
        assert_eq!(
            initialize(&env, committee_of(&env, 3), 0, GRACE, 0),
            Err(ContractError::InvalidDuration)
        );
    }

    #[test]
    fn test_initialize_rejects_overflowing_duration() {
        let env = Env::default();
        assert_eq!(
            initialize(&env, committee_of(&env, 3), u32::MAX, GRACE, 10),
            Err(ContractError::InvalidDuration)
        );
    }

    #[test]
    fn test_initialize_rejects_large_committee() {
        let env = Env::default();
        assert_eq!(
            initialize(&env, committee_of(&env, 4), 1000, GRACE, 0),
            Err(ContractError::InvalidCommittee)
        );
    }

    #[test]
    fn test_two_confirmations_release() {
        let env = Env::default();
        let committee = committee_of(&env, 3);
        let mut state = initialize(&env, committee.clone(), 1000, GRACE, 0).unwrap();

        assert!(confirm(&mut state, &committee.get(0).unwrap(), 10).unwrap());
        assert_eq!(decide(&state, 10), Decision::Undecided);
        assert!(confirm(&mut state, &committee.get(1).unwrap(), 10).unwrap());
        assert_eq!(decide(&state, 10), Decision::ReleaseToSeller);
    }

    #[test]
    fn test_confirm_is_idempotent() {
        let env = Env::default();
        let committee = committee_of(&env, 3);
        let validator = committee.get(2).unwrap();
        let mut state = initialize(&env, committee, 1000, GRACE, 0).unwrap();

        assert!(confirm(&mut state, &validator, 5).unwrap());
        assert!(!confirm(&mut state, &validator, 6).unwrap());
        assert_eq!(state.confirmations, vec![&env, validator]);
    }

    #[test]
    fn test_confirm_rejects_outsider() {
        let env = Env::default();
        let mut state = initialize(&env, committee_of(&env, 3), 1000, GRACE, 0).unwrap();
        let outsider = Address::generate(&env);

        assert_eq!(
            confirm(&mut state, &outsider, 5),
            Err(ContractError::NotAValidator)
        );
        assert_eq!(state.confirmations.len(), 0);
    }

    #[test]
    fn test_confirm_window_closes_at_auto_release() {
        let env = Env::default();
        let committee = committee_of(&env, 3);
        let mut state = initialize(&env, committee.clone(), 1000, GRACE, 0).unwrap();

        assert_eq!(
            confirm(&mut state, &committee.get(0).unwrap(), 1000),
            Err(ContractError::WindowClosed)
        );
        assert!(confirm(&mut state, &committee.get(0).unwrap(), 999).unwrap());
    }

    #[test]
    fn test_auto_release_boundary() {
        let env = Env::default();
        let state = initialize(&env, committee_of(&env, 3), 1000, GRACE, 0).unwrap();

        assert_eq!(decide(&state, 999), Decision::Undecided);
        assert_eq!(decide(&state, 1000), Decision::ReleaseToSeller);
    }

    #[test]
    fn test_empty_committee_relies_on_auto_release() {
        let env = Env::default();
        let state = initialize(&env, Vec::new(&env), 50, GRACE, 0).unwrap();

        assert_eq!(state.required_confirmations, 1);
        assert_eq!(decide(&state, 49), Decision::Undecided);
        assert_eq!(decide(&state, 50), Decision::ReleaseToSeller);
    }

    #[test]
    fn test_dispute_overrides_auto_release() {
        let env = Env::default();
        let committee = committee_of(&env, 3);
        let mut state = initialize(&env, committee.clone(), 1000, GRACE, 0).unwrap();

        assert!(raise_dispute(&mut state, &committee.get(1).unwrap(), 100).unwrap());
        assert_eq!(decide(&state, 600), Decision::Undecided);
        assert_eq!(state.disputed_by, Some(committee.get(1).unwrap()));
    }

    #[test]
    fn test_dispute_overrides_quorum() {
        let env = Env::default();
        let committee = committee_of(&env, 3);
        let mut state = initialize(&env, committee.clone(), 1000, GRACE, 0).unwrap();

        confirm(&mut state, &committee.get(0).unwrap(), 10).unwrap();
        confirm(&mut state, &committee.get(1).unwrap(), 10).unwrap();
        raise_dispute(&mut state, &committee.get(2).unwrap(), 20).unwrap();

        assert!(quorum_reached(&state));
        assert_eq!(decide(&state, 20), Decision::Undecided);
    }

    #[test]
    fn test_unresolved_dispute_refunds_after_grace() {
        let env = Env::default();
        let committee = committee_of(&env, 3);
        let mut state = initialize(&env, committee.clone(), 1000, GRACE, 0).unwrap();
        raise_dispute(&mut state, &committee.get(0).unwrap(), 100).unwrap();

        assert_eq!(decide(&state, 699), Decision::Undecided);
        assert_eq!(decide(&state, 700), Decision::RefundToBuyer);
        assert_eq!(decide(&state, 5_000), Decision::RefundToBuyer);
    }

    #[test]
    fn test_dispute_rules() {
        let env = Env::default();
        let committee = committee_of(&env, 3);
        let mut state = initialize(&env, committee.clone(), 1000, GRACE, 0).unwrap();
        let validator = committee.get(0).unwrap();

        assert_eq!(
            raise_dispute(&mut state, &Address::generate(&env), 10),
            Err(ContractError::NotAValidator)
        );
        assert_eq!(
            raise_dispute(&mut state, &validator, 500),
            Err(ContractError::DeadlinePassed)
        );
        assert!(!state.dispute_raised);

        assert!(raise_dispute(&mut state, &validator, 499).unwrap());
        assert!(!raise_dispute(&mut state, &committee.get(1).unwrap(), 499).unwrap());
        assert_eq!(state.disputed_by, Some(validator));
    }

    #[test]
    fn test_ruling_settles_dispute() {
        let env = Env::default();
        let committee = committee_of(&env, 3);
        let mut state = initialize(&env, committee.clone(), 1000, GRACE, 0).unwrap();

        assert_eq!(
            record_ruling(&mut state, Ruling::Refund),
            Err(ContractError::DisputeNotRaised)
        );

        raise_dispute(&mut state, &committee.get(0).unwrap(), 10).unwrap();
        assert_eq!(state.ruling, Ruling::Pending);
        assert!(!record_ruling(&mut state, Ruling::Pending).unwrap());
        assert!(record_ruling(&mut state, Ruling::Release).unwrap());
        assert!(!record_ruling(&mut state, Ruling::Refund).unwrap());

        assert_eq!(decide(&state, 11), Decision::ReleaseToSeller);
        assert_eq!(decide(&state, 10_000), Decision::ReleaseToSeller);
    }

    #[test]
    fn test_decide_is_deterministic() {
        let env = Env::default();
        let committee = committee_of(&env, 3);
        let mut state = initialize(&env, committee.clone(), 1000, GRACE, 0).unwrap();
        confirm(&mut state, &committee.get(0).unwrap(), 3).unwrap();
        let snapshot = state.clone();

        for height in [0u32, 500, 999, 1000, 2000] {
            assert_eq!(decide(&state, height), decide(&state, height));
        }
        assert_eq!(state, snapshot);
    }
}
