//! Simulate Command - run the whole insurance flow against a fresh ledger

use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use flightsure_ledger::{
    AdmissionState, Address, Amount, FlightKey, FlightStatus, FlightSurety, LedgerConfig, Timestamp,
};
use flightsure_oracles::{FixedStatusPicker, OraclePool, PoolConfig, RandomStatusPicker, StatusPicker};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::{FlightsureConfig, PickerKind, SimulationSettings};

/// Departure time of the first simulated flight
const FIRST_DEPARTURE: Timestamp = 1_700_000_000;

/// Run airlines, passengers and oracles against a fresh ledger
#[derive(Args)]
pub struct SimulateCommand {
    /// Oracle report strategy
    #[arg(long, value_enum)]
    picker: Option<PickerKind>,

    /// Status code reported by the fixed picker (0, 10, 20, 30, 40, 50)
    #[arg(long)]
    status: Option<u8>,

    /// Seed for the random picker
    #[arg(long)]
    seed: Option<u64>,

    /// Number of simulated oracles
    #[arg(long)]
    oracles: Option<usize>,

    /// Withdraw every passenger's credits at the end
    #[arg(long)]
    withdraw: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

impl SimulateCommand {
    pub async fn execute(self, mut config: FlightsureConfig) -> anyhow::Result<()> {
        if let Some(picker) = self.picker {
            config.simulation.picker = picker;
        }
        if let Some(status) = self.status {
            config.simulation.fixed_status = status;
        }
        if let Some(seed) = self.seed {
            config.simulation.picker_seed = Some(seed);
        }
        if let Some(oracles) = self.oracles {
            config.simulation.oracle_count = oracles;
        }
        config.validate()?;

        let report = run(config.ledger, &config.simulation, self.withdraw).await?;
        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            report.print();
        }
        Ok(())
    }
}

/// Outcome of a simulation run
#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub index_seed: String,
    pub airlines: Vec<AirlineReport>,
    pub flights: Vec<FlightReport>,
    pub passengers: Vec<PassengerReport>,
    pub oracles: OracleReport,
    pub open_requests: usize,
    pub events: usize,
}

#[derive(Debug, Serialize)]
pub struct AirlineReport {
    pub address: String,
    pub name: String,
    pub approved: bool,
    pub participating: bool,
}

#[derive(Debug, Serialize)]
pub struct FlightReport {
    pub key: String,
    pub airline: String,
    pub flight_number: String,
    pub timestamp: Timestamp,
    pub status: FlightStatus,
    pub policies: usize,
}

#[derive(Debug, Serialize)]
pub struct PassengerReport {
    pub address: String,
    pub policies: usize,
    pub credits: Amount,
    pub withdrawn: Amount,
}

#[derive(Debug, Serialize)]
pub struct OracleReport {
    pub registered: usize,
    pub submissions: usize,
    pub finalized: usize,
    pub late: usize,
    pub rejected: usize,
}

impl SimulationReport {
    fn print(&self) {
        println!();
        println!("Index seed: 0x{}", self.index_seed);
        println!();
        println!("Airlines:");
        for airline in &self.airlines {
            println!(
                "  {:<20} {}  approved={} participating={}",
                airline.name, airline.address, airline.approved, airline.participating
            );
        }
        println!();
        println!("Flights:");
        for flight in &self.flights {
            println!(
                "  {:<8} {:<20} {:>3} policies  {}",
                flight.flight_number, flight.airline, flight.policies, flight.status
            );
        }
        println!();
        println!("Passengers:");
        for passenger in &self.passengers {
            println!(
                "  {}  policies={} credits={} withdrawn={}",
                passenger.address, passenger.policies, passenger.credits, passenger.withdrawn
            );
        }
        println!();
        println!(
            "Oracles: {} registered, {} reports, {} finalized, {} late, {} rejected",
            self.oracles.registered,
            self.oracles.submissions,
            self.oracles.finalized,
            self.oracles.late,
            self.oracles.rejected
        );
        println!("Open requests: {}", self.open_requests);
        println!("Events emitted: {}", self.events);
    }
}

fn picker_for(settings: &SimulationSettings) -> anyhow::Result<Box<dyn StatusPicker>> {
    Ok(match settings.picker {
        PickerKind::Fixed => Box::new(FixedStatusPicker(FlightStatus::from_code(settings.fixed_status)?)),
        PickerKind::Random => match settings.picker_seed {
            Some(seed) => Box::new(RandomStatusPicker::new(seed)),
            None => Box::new(RandomStatusPicker::from_entropy()),
        },
    })
}

/// Short carrier code from an airline name
fn carrier_code(name: &str) -> String {
    let code: String = name
        .split_whitespace()
        .filter_map(|word| word.chars().next())
        .map(|c| c.to_ascii_uppercase())
        .take(2)
        .collect();
    if code.len() == 2 { code } else { "XX".to_string() }
}

/// Admit and fund every configured airline
fn bootstrap_airlines(
    ledger: &FlightSurety,
    airlines: &[(Address, String)],
    funding: Amount,
) -> anyhow::Result<()> {
    let Some((seed, _)) = airlines.first() else {
        return Ok(());
    };
    ledger.fund_airline(*seed, *seed, funding)?;

    for (address, name) in &airlines[1..] {
        if ledger.register_airline(*seed, *address, name.as_str())? == AdmissionState::Applied {
            let voters: Vec<Address> = ledger
                .get_approved_airlines()
                .into_iter()
                .map(|(voter, _)| voter)
                .filter(|voter| ledger.is_airline(voter))
                .collect();
            for voter in voters {
                if ledger.approve_airline(voter, *address)?.is_approved() {
                    break;
                }
            }
        }
        ledger.fund_airline(*address, *address, funding)?;
    }
    Ok(())
}

/// Run one simulation and collect its report
pub async fn run(
    ledger_config: LedgerConfig,
    settings: &SimulationSettings,
    withdraw: bool,
) -> anyhow::Result<SimulationReport> {
    let admin = Address::from_label("admin");
    let airlines: Vec<(Address, String)> = settings
        .airlines
        .iter()
        .enumerate()
        .map(|(i, name)| (Address::from_label(&format!("airline-{}", i)), name.clone()))
        .collect();
    let Some((seed_airline, seed_name)) = airlines.first().cloned() else {
        anyhow::bail!("At least one airline is required");
    };

    let ledger = Arc::new(FlightSurety::new(ledger_config, admin, seed_airline, seed_name)?);
    bootstrap_airlines(&ledger, &airlines, settings.airline_funding)?;

    let mut flights: Vec<FlightKey> = Vec::new();
    for (address, name) in &airlines {
        if !ledger.is_airline(address) {
            warn!("{} is not participating, skipping its flights", name);
            continue;
        }
        let code = carrier_code(name);
        for n in 0..settings.flights_per_airline {
            let number = format!("{}{}", code, 100 + n);
            let departure = FIRST_DEPARTURE + (n as Timestamp) * 3_600;
            flights.push(ledger.register_flight(*address, *address, number, departure)?);
        }
    }
    info!("Registered {} flights", flights.len());

    let passengers: Vec<Address> = (0..settings.passengers)
        .map(|n| Address::from_label(&format!("passenger-{}", n)))
        .collect();
    for passenger in &passengers {
        for key in &flights {
            ledger.buy_insurance(*passenger, *key, settings.premium)?;
        }
    }

    let pool_config = PoolConfig::default()
        .with_oracle_count(settings.oracle_count)
        .with_stake(settings.oracle_stake);
    let pool = Arc::new(OraclePool::register(ledger.clone(), &pool_config, picker_for(settings)?)?);
    let handle = pool.spawn(ledger.subscribe_channel());

    for key in &flights {
        ledger.fetch_flight_status_by_key(admin, *key)?;
    }

    let expected = flights.len();
    let waited = tokio::time::timeout(Duration::from_secs(settings.timeout_secs), async {
        while pool.stats().requests_handled < expected {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    if waited.is_err() {
        warn!("Oracle pool did not answer every request within {}s", settings.timeout_secs);
    }
    handle.abort();

    let mut passenger_reports = Vec::with_capacity(passengers.len());
    for passenger in &passengers {
        let credits = ledger.check_credits(passenger);
        let withdrawn = if withdraw && credits > 0 {
            ledger.withdraw_credits(*passenger, credits)?;
            credits
        } else {
            0
        };
        passenger_reports.push(PassengerReport {
            address: passenger.to_string(),
            policies: ledger.get_policies(passenger).len(),
            credits: ledger.check_credits(passenger),
            withdrawn,
        });
    }

    let airline_reports = airlines
        .iter()
        .map(|(address, name)| AirlineReport {
            address: address.to_string(),
            name: name.clone(),
            approved: ledger
                .get_airline(address)
                .map(|a| a.state == AdmissionState::Approved)
                .unwrap_or(false),
            participating: ledger.is_airline(address),
        })
        .collect();

    let flight_reports = flights
        .iter()
        .filter_map(|key| ledger.get_flight(key))
        .map(|flight| FlightReport {
            key: flight.key.to_string(),
            airline: airlines
                .iter()
                .find(|(address, _)| *address == flight.airline)
                .map(|(_, name)| name.clone())
                .unwrap_or_default(),
            flight_number: flight.flight_number.clone(),
            timestamp: flight.timestamp,
            status: flight.status,
            policies: flight.policies().len(),
        })
        .collect();

    let stats = pool.stats();
    Ok(SimulationReport {
        index_seed: hex::encode(ledger.index_seed()),
        airlines: airline_reports,
        flights: flight_reports,
        passengers: passenger_reports,
        oracles: OracleReport {
            registered: pool.len(),
            submissions: stats.submissions,
            finalized: stats.finalized,
            late: stats.late,
            rejected: stats.rejected,
        },
        open_requests: ledger.open_requests().len(),
        events: ledger.events().len(),
    })
}
