//! Simulated order execution
//!
//! - [`order`]: order requests, orders, fills and rejection reasons
//! - [`book`]: synthetic order books
//! - [`account`]: paper balances settled from fills
//! - [`simulator`]: the seeded execution simulator

pub mod account;
pub mod book;
pub mod order;
pub mod simulator;

pub use account::PaperAccount;
pub use book::{BookConfig, SyntheticBook};
pub use order::{Fill, Order, OrderRequest, OrderStatus, OrderType, RejectReason};
pub use simulator::{ExecutionConfig, ExecutionSimulator, LatencyStats};
