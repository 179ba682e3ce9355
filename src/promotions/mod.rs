//! Promotion engine
//!
//! Gift rules grant free products when a cart satisfies their conditions;
//! vouchers take a percentage or fixed amount off the subtotal. Both are
//! evaluated read-only while a shopper browses and booked for real inside
//! the checkout transaction, against the same counters either way.

pub mod data;
pub mod definitions;
pub mod errors;
pub(crate) mod eval;
pub mod models;
pub mod records;
pub(crate) mod repository;
pub mod service;

pub use errors::PromotionsServiceError;
pub use service::*;
