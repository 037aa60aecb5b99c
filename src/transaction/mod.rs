pub mod model;

pub use model::{
    Address, ProblemDetails, PurchaseDetails, Transaction, TransactionDetails, TxBody, TxKind,
};
