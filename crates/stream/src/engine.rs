//! Stream engine.
//!
//! Composes the ingestion buffer, the aggregation table and the projector on a
//! single logical writer. A batch is either applied in full and followed by a
//! fresh snapshot, or rejected with the table and snapshot left at their last
//! good state. Fatal rejections halt the engine until [`StreamEngine::resume`].

use quote_core::{Config, Error, PivotConfig, RawRecord, Result, ViewConfig};
use quote_ingestion::{BatchReport, IngestionBuffer, IngestionStats};
use quote_pivot::AggregationTable;
use quote_view::{project, ViewSnapshot, ViewSpec};
use tracing::{error, info, warn};

/// Whether the engine accepts batches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineState {
    /// Accepting batches.
    Running,
    /// Halted by a fatal error, with its message.
    Fatal(String),
}

/// Ingest -> aggregate -> project pipeline.
pub struct StreamEngine {
    buffer: IngestionBuffer,
    table: AggregationTable,
    spec: ViewSpec,
    snapshot: ViewSnapshot,
    state: EngineState,
}

impl StreamEngine {
    /// Create an engine with an empty table.
    pub fn new(config: &Config) -> Result<Self> {
        let table = AggregationTable::new(config.pivot.clone())?;
        let spec = ViewSpec::new(config.view.clone())?;
        let snapshot = project(&table, &spec)?;
        Ok(Self {
            buffer: IngestionBuffer::new(),
            table,
            spec,
            snapshot,
            state: EngineState::Running,
        })
    }

    /// Register an observer of applied batches.
    pub fn on_batch<F>(&mut self, handler: F)
    where
        F: FnMut(&BatchReport<'_>) + Send + 'static,
    {
        self.buffer.on_batch(handler);
    }

    /// Apply one delivered batch and re-project the view.
    pub fn process_batch(&mut self, batch: &[RawRecord]) -> Result<&ViewSnapshot> {
        if let EngineState::Fatal(reason) = &self.state {
            return Err(Error::halted(reason.clone()));
        }

        if let Err(err) = self.buffer.ingest(batch, &mut self.table) {
            if err.is_fatal() {
                self.halt(&err);
            }
            return Err(err);
        }

        match project(&self.table, &self.spec) {
            Ok(snapshot) => {
                self.snapshot = snapshot;
                Ok(&self.snapshot)
            }
            Err(err) => {
                self.halt(&err);
                Err(err)
            }
        }
    }

    fn halt(&mut self, err: &Error) {
        error!(
            error = %err,
            sequence = self.buffer.sequence(),
            "fatal stream error, engine halted"
        );
        self.state = EngineState::Fatal(err.to_string());
    }

    /// Leave the fatal state. Returns whether the engine was halted.
    pub fn resume(&mut self) -> bool {
        match std::mem::replace(&mut self.state, EngineState::Running) {
            EngineState::Fatal(reason) => {
                warn!(%reason, "resuming halted engine");
                true
            }
            EngineState::Running => false,
        }
    }

    /// Swap the view and re-project.
    pub fn set_view(&mut self, view: ViewConfig) -> Result<&ViewSnapshot> {
        let spec = ViewSpec::new(view)?;
        let snapshot = project(&self.table, &spec)?;
        self.spec = spec;
        self.snapshot = snapshot;
        info!("view changed");
        Ok(&self.snapshot)
    }

    /// Regroup the table from its history under new dimensions and re-project.
    ///
    /// Fails without changes if the current view pivots on a dropped dimension.
    pub fn repivot(&mut self, pivot: PivotConfig) -> Result<&ViewSnapshot> {
        let mut table = self.table.clone();
        table.rebuild(pivot)?;
        let snapshot = project(&table, &self.spec)?;
        self.table = table;
        self.snapshot = snapshot;
        info!(buckets = self.table.len(), "table repivoted");
        Ok(&self.snapshot)
    }

    /// Latest snapshot; never reflects a partially applied batch.
    pub fn snapshot(&self) -> &ViewSnapshot {
        &self.snapshot
    }

    /// Aggregation table behind the snapshot.
    pub fn table(&self) -> &AggregationTable {
        &self.table
    }

    /// Active view.
    pub fn spec(&self) -> &ViewSpec {
        &self.spec
    }

    /// Current run state.
    pub fn state(&self) -> &EngineState {
        &self.state
    }

    /// Is the engine refusing batches after a fatal error?
    pub fn is_halted(&self) -> bool {
        matches!(self.state, EngineState::Fatal(_))
    }

    /// Ingestion counters.
    pub fn stats(&self) -> &IngestionStats {
        self.buffer.stats()
    }
}
