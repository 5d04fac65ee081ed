pub mod contract;
pub mod transactions;
pub mod wallet;
