//! A pool of simulated oracles answering ledger status requests

use std::sync::Arc;

use flightsure_ledger::{
    Address, FlightSurety, LedgerEvent, SubmissionOutcome, Timestamp, INDEXES_PER_ORACLE,
};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::picker::StatusPicker;
use crate::{HarnessResult, PoolConfig};

/// Counters kept while answering requests
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// OracleRequest events fully answered
    pub requests_handled: usize,
    /// Reports accepted by the ledger
    pub submissions: usize,
    /// Reports that finalized a flight
    pub finalized: usize,
    /// Reports accepted after finalization
    pub late: usize,
    /// Reports the ledger rejected
    pub rejected: usize,
}

/// Registered oracle identities and their cached indices
pub struct OraclePool {
    ledger: Arc<FlightSurety>,
    oracles: Vec<(Address, [u8; INDEXES_PER_ORACLE])>,
    picker: Mutex<Box<dyn StatusPicker>>,
    stats: Mutex<PoolStats>,
}

impl OraclePool {
    /// Register `config.oracle_count` oracles with the ledger
    pub fn register(
        ledger: Arc<FlightSurety>,
        config: &PoolConfig,
        picker: Box<dyn StatusPicker>,
    ) -> HarnessResult<Self> {
        config.validate()?;

        let mut oracles = Vec::with_capacity(config.oracle_count);
        for n in 0..config.oracle_count {
            let address = Address::from_label(&format!("{}-{}", config.label, n));
            ledger.register_oracle(address, config.stake)?;
            // Read back the assignment the way an operator would
            let indexes = ledger.get_my_indexes(&address)?;
            oracles.push((address, indexes));
        }
        info!("Registered {} oracles", oracles.len());

        Ok(Self {
            ledger,
            oracles,
            picker: Mutex::new(picker),
            stats: Mutex::new(PoolStats::default()),
        })
    }

    pub fn oracles(&self) -> &[(Address, [u8; INDEXES_PER_ORACLE])] {
        &self.oracles
    }

    pub fn len(&self) -> usize {
        self.oracles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.oracles.is_empty()
    }

    /// Oracles whose assignment includes `index`
    pub fn holders_of(&self, index: u8) -> Vec<Address> {
        self.oracles
            .iter()
            .filter(|(_, indexes)| indexes.contains(&index))
            .map(|(address, _)| *address)
            .collect()
    }

    pub fn stats(&self) -> PoolStats {
        *self.stats.lock()
    }

    /// React to a ledger event. Only `OracleRequest` is answered.
    pub fn respond(&self, event: &LedgerEvent) {
        if let LedgerEvent::OracleRequest { index, airline, flight_number, timestamp } = event {
            self.answer(*index, *airline, flight_number, *timestamp);
        }
    }

    /// Submit a report from every oracle holding `index`
    pub fn answer(&self, index: u8, airline: Address, flight_number: &str, timestamp: Timestamp) {
        let holders = self.holders_of(index);
        debug!("Answering {} on index {} with {} oracles", flight_number, index, holders.len());

        let mut batch = PoolStats::default();
        for oracle in holders {
            let status = self.picker.lock().pick(&oracle, flight_number);
            match self.ledger.submit_oracle_response(
                oracle,
                index,
                airline,
                flight_number,
                timestamp,
                status.code(),
            ) {
                Ok(outcome) => {
                    batch.submissions += 1;
                    match outcome {
                        SubmissionOutcome::Finalized { status, reports } => {
                            info!("{} finalized as {} with {} reports", flight_number, status, reports);
                            batch.finalized += 1;
                        }
                        SubmissionOutcome::AlreadyFinalized { .. } => batch.late += 1,
                        SubmissionOutcome::Recorded { .. } => {}
                    }
                }
                Err(e) => {
                    warn!("Report from {} on {} rejected: {}", oracle, flight_number, e);
                    batch.rejected += 1;
                }
            }
        }

        let mut stats = self.stats.lock();
        stats.submissions += batch.submissions;
        stats.finalized += batch.finalized;
        stats.late += batch.late;
        stats.rejected += batch.rejected;
        stats.requests_handled += 1;
    }

    /// Answer every event already queued on `events`
    pub fn drain(&self, events: &mut mpsc::UnboundedReceiver<LedgerEvent>) -> usize {
        let mut handled = 0;
        while let Ok(event) = events.try_recv() {
            self.respond(&event);
            handled += 1;
        }
        handled
    }

    /// Answer events until the channel closes
    pub async fn run(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<LedgerEvent>) -> PoolStats {
        info!("Oracle pool listening for requests");
        while let Some(event) = events.recv().await {
            self.respond(&event);
        }
        info!("Event channel closed, oracle pool stopping");
        self.stats()
    }

    /// Spawn `run` on the current runtime
    pub fn spawn(self: &Arc<Self>, events: mpsc::UnboundedReceiver<LedgerEvent>) -> JoinHandle<PoolStats> {
        let pool = self.clone();
        tokio::spawn(async move { pool.run(events).await })
    }
}
