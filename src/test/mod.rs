mod context;
mod helpers;

pub(crate) use context::TestContext;
pub(crate) use helpers::{bulk_product, untracked_product};
