pub mod coordinator;
pub mod ledger;
pub mod lifecycle;
