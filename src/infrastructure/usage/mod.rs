//! Usage accounting implementations

mod accountant;

pub use accountant::{CostAccountant, UsageTotals};
