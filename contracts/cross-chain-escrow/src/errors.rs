use soroban_sdk::contracterror;

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum ContractError {
    // Initialization / access
    Unauthorized = 1,
    AlreadyInitialized = 2,
    NotInitialized = 3,

    // Lookups
    ListingNotFound = 4,
    EscrowNotFound = 5,

    // Listing preconditions
    ListingNotActive = 6,
    ListingExpired = 7,
    NotCrossChain = 8,

    // Input validation
    InvalidChain = 9,
    InvalidDuration = 10,
    InvalidPrice = 11,
    InvalidCommittee = 12,

    // Funds
    InsufficientFunds = 13,

    // Consensus
    NotAValidator = 14,
    WindowClosed = 15,
    DeadlinePassed = 16,
    EscrowNotPending = 17,
    DisputeNotRaised = 18,

    // Relisting / admin
    EscrowNotRefunded = 19,
    InvalidFee = 20,
    MathOverflow = 21,
    NothingToCollect = 22,
    TransferFailed = 23,
    ListingNotInEscrow = 24,
}
