//! Tally
//!
//! An inventory integrity core for commerce backends. Tally keeps three
//! concerns consistent under concurrency: a stock ledger with an append-only
//! movement log, an order lifecycle that reserves, commits and releases that
//! stock, and a promotion engine whose gifts and vouchers are re-validated
//! inside the checkout transaction.
//!
//! Everything runs against one optimistically-versioned store; a checkout is
//! a single transaction, so no observer ever sees a half-reserved cart or an
//! oversold product.

pub mod context;
pub mod fulfillment;
pub mod ids;
pub mod ledger;
pub mod promotions;
pub mod quantity;
pub mod store;

#[cfg(test)]
mod test;
