//! How a simulated oracle decides what to report

use flightsure_ledger::{Address, FlightStatus};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

/// Chooses the status an oracle reports for a flight
pub trait StatusPicker: Send {
    fn pick(&mut self, oracle: &Address, flight_number: &str) -> FlightStatus;
}

/// Uniform choice over the statuses a live oracle could observe
pub struct RandomStatusPicker {
    rng: ChaCha20Rng,
    choices: Vec<FlightStatus>,
}

impl RandomStatusPicker {
    /// Statuses reported by default
    pub const DEFAULT_CHOICES: [FlightStatus; 3] =
        [FlightStatus::OnTime, FlightStatus::LateAirline, FlightStatus::Unknown];

    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
            choices: Self::DEFAULT_CHOICES.to_vec(),
        }
    }

    /// Seed from the OS
    pub fn from_entropy() -> Self {
        Self::new(rand::random())
    }

    /// Restrict choices. An empty list falls back to the defaults.
    pub fn with_choices(mut self, choices: &[FlightStatus]) -> Self {
        if !choices.is_empty() {
            self.choices = choices.to_vec();
        }
        self
    }
}

impl StatusPicker for RandomStatusPicker {
    fn pick(&mut self, _oracle: &Address, _flight_number: &str) -> FlightStatus {
        self.choices
            .choose(&mut self.rng)
            .copied()
            .unwrap_or(FlightStatus::Unknown)
    }
}

/// Every oracle reports the same status
#[derive(Clone, Copy, Debug)]
pub struct FixedStatusPicker(pub FlightStatus);

impl StatusPicker for FixedStatusPicker {
    fn pick(&mut self, _oracle: &Address, _flight_number: &str) -> FlightStatus {
        self.0
    }
}
