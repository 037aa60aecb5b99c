//! Declarative reward contracts evaluated against ledger events.
//!
//! A contract is an ordered list of rules; a rule fires when all of its
//! conditions hold and then runs its actions in order. Rewards are queued on
//! the ledger as system-minted `contract_reward` transactions.

pub mod defaults;
pub mod engine;
pub mod rule;

pub use defaults::default_contracts;
pub use engine::{
    ActionOutcome, Contract, ContractExecution, ContractSummary, Multiplier, RuleContext,
    RuleEngine, RuleOutcome, RuleState, UserNotification,
};
pub use rule::{Action, Condition, Event, EventKind, RepeatPolicy, Rule};
