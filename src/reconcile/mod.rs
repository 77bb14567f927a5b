// src/reconcile/mod.rs
pub mod period;
pub mod render;

// Re-export key reconciliation types for convenience
pub use period::{
    annual_series, disclosure_window, displayable_range, quotes_within, reconcile, select_window,
    QuarterSlot,
};
