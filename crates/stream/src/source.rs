//! Batch sources.
//!
//! A source hands out one batch per delivery cycle. The cadence is owned by
//! the driver, not the source.

use chrono::{DateTime, Duration, Utc};
use quote_core::{QuoteSide, RawRecord, RawTimestamp, Result, StreamConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::path::Path;

/// Producer of raw record batches.
pub trait BatchSource {
    /// Next batch, or `None` once the source is exhausted.
    fn next_batch(&mut self) -> Option<Vec<RawRecord>>;
}

/// Probability that a simulated quote side is missing (empty book side).
const MISSING_SIDE_PROB: f64 = 0.05;

#[derive(Debug, Clone)]
struct SymbolWalk {
    name: String,
    price: f64,
}

/// Random-walk quote feed.
///
/// Every cycle yields one record per symbol sharing the same timestamp, which
/// then advances by the poll interval.
#[derive(Debug, Clone)]
pub struct SimulatedSource {
    rng: StdRng,
    symbols: Vec<SymbolWalk>,
    clock: DateTime<Utc>,
    step: Duration,
}

impl SimulatedSource {
    /// Create a feed starting at `start`.
    pub fn new(config: &StreamConfig, start: DateTime<Utc>) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            symbols: config
                .symbols
                .iter()
                .map(|name| SymbolWalk {
                    name: name.clone(),
                    price: config.start_price,
                })
                .collect(),
            clock: start,
            step: Duration::milliseconds(config.poll_interval_ms as i64),
        }
    }

    fn quote_side(rng: &mut StdRng, price: f64) -> Option<QuoteSide> {
        if rng.gen_bool(MISSING_SIDE_PROB) {
            return None;
        }
        Some(QuoteSide {
            price: (price * 100.0).round() / 100.0,
            size: rng.gen_range(1..500) as f64,
        })
    }
}

impl BatchSource for SimulatedSource {
    fn next_batch(&mut self) -> Option<Vec<RawRecord>> {
        let timestamp = RawTimestamp::from(self.clock);
        let rng = &mut self.rng;

        let batch = self
            .symbols
            .iter_mut()
            .map(|symbol| {
                symbol.price *= 1.0 + rng.gen_range(-0.002..0.002);
                let half_spread = symbol.price * rng.gen_range(0.0005..0.002);
                RawRecord {
                    stock: symbol.name.clone(),
                    top_ask: Self::quote_side(rng, symbol.price + half_spread),
                    top_bid: Self::quote_side(rng, symbol.price - half_spread),
                    timestamp: timestamp.clone(),
                }
            })
            .collect();

        self.clock += self.step;
        Some(batch)
    }
}

/// Replays recorded batches in order.
#[derive(Debug, Clone, Default)]
pub struct ReplaySource {
    batches: VecDeque<Vec<RawRecord>>,
}

impl ReplaySource {
    /// Replay batches in the given order.
    pub fn from_batches(batches: Vec<Vec<RawRecord>>) -> Self {
        Self {
            batches: batches.into(),
        }
    }

    /// Load a JSON array of batches (each an array of raw records).
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Parse batches from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let batches: Vec<Vec<RawRecord>> = serde_json::from_str(json)?;
        Ok(Self::from_batches(batches))
    }

    /// Batches not yet delivered.
    pub fn remaining(&self) -> usize {
        self.batches.len()
    }
}

impl BatchSource for ReplaySource {
    fn next_batch(&mut self) -> Option<Vec<RawRecord>> {
        self.batches.pop_front()
    }
}
