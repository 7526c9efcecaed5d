//! Raw record normalization.
//!
//! Maps every raw record to exactly one table row. A missing quote side means
//! "no quote" and becomes a 0.0 price; nothing here can fail.

use quote_core::{NormalizedRow, QuoteSide, RawRecord};

/// Price of an optional quote side, 0.0 when absent or NaN.
#[inline]
fn side_price(side: Option<&QuoteSide>) -> f64 {
    side.map(|q| q.price).filter(|p| !p.is_nan()).unwrap_or(0.0)
}

/// Normalize a single raw record.
pub fn normalize(raw: &RawRecord) -> NormalizedRow {
    NormalizedRow {
        stock: raw.stock.clone(),
        top_ask_price: side_price(raw.top_ask.as_ref()),
        top_bid_price: side_price(raw.top_bid.as_ref()),
        timestamp: raw.timestamp.clone(),
    }
}

/// Normalize a batch, preserving order.
pub fn normalize_batch(batch: &[RawRecord]) -> Vec<NormalizedRow> {
    batch.iter().map(normalize).collect()
}
