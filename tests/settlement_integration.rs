//! Oracle Consensus and Settlement Integration Tests
//!
//! Flight registration, index-bound status requests, quorum finalization,
//! policy settlement and withdrawals, end to end, including a spawned
//! oracle pool answering requests over the event channel.

use std::sync::Arc;

use flightsure::prelude::*;

fn addr(n: u8) -> Address {
    Address::new([n; 20])
}

const ADMIN: u8 = 0xAD;
const AIRLINE: u8 = 1;
const DEPARTURE: Timestamp = 1_700_000_000;

/// Funded seed airline with flight AA100 registered
fn ledger_with_flight(config: LedgerConfig) -> (FlightSurety, FlightKey) {
    let ledger = FlightSurety::new(config, addr(ADMIN), addr(AIRLINE), "X Air").unwrap();
    ledger.fund_airline(addr(AIRLINE), addr(AIRLINE), 10).unwrap();
    let key = ledger
        .register_flight(addr(AIRLINE), addr(AIRLINE), "AA100", DEPARTURE)
        .unwrap();
    (ledger, key)
}

fn default_ledger() -> (FlightSurety, FlightKey) {
    ledger_with_flight(LedgerConfig::default().with_index_seed([0x42; 32]))
}

/// Register oracles until `count` hold `index`; also returns one that does not
fn oracles_for(ledger: &FlightSurety, index: u8, count: usize) -> (Vec<Address>, Address) {
    let mut holders = Vec::new();
    let mut outsider = None;
    let mut n = 0u32;
    while holders.len() < count || outsider.is_none() {
        let oracle = Address::from_label(&format!("oracle-{}", n));
        n += 1;
        let indexes = ledger.register_oracle(oracle, 1).unwrap();
        if indexes.contains(&index) {
            if holders.len() < count {
                holders.push(oracle);
            }
        } else if outsider.is_none() {
            outsider = Some(oracle);
        }
    }
    (holders, outsider.unwrap_or_default())
}

fn submit(ledger: &FlightSurety, oracle: Address, index: u8, code: u8) -> LedgerResult<SubmissionOutcome> {
    ledger.submit_oracle_response(oracle, index, addr(AIRLINE), "AA100", DEPARTURE, code)
}

// ============================================================================
// Oracle Registration Tests
// ============================================================================

mod registration_tests {
    use super::*;

    #[test]
    fn test_three_distinct_indexes() {
        let (ledger, _) = default_ledger();
        for n in 0..20u32 {
            let oracle = Address::from_label(&format!("oracle-{}", n));
            let indexes = ledger.register_oracle(oracle, 1).unwrap();
            assert!(indexes.iter().all(|i| *i < 10));
            assert!(indexes[0] != indexes[1] && indexes[1] != indexes[2] && indexes[0] != indexes[2]);
            assert_eq!(ledger.get_my_indexes(&oracle), Ok(indexes));
        }
    }

    #[test]
    fn test_registration_rules() {
        let (ledger, _) = default_ledger();
        let oracle = addr(0x0A);

        assert!(matches!(
            ledger.register_oracle(oracle, 0),
            Err(LedgerError::InsufficientFunding { provided: 0, required: 1 })
        ));
        assert_eq!(ledger.get_my_indexes(&oracle), Err(LedgerError::OracleNotRegistered(oracle)));

        ledger.register_oracle(oracle, 1).unwrap();
        assert!(matches!(
            ledger.register_oracle(oracle, 1),
            Err(LedgerError::AlreadyRegistered(_))
        ));
    }

    #[test]
    fn test_same_seed_same_assignment() {
        let (a, _) = default_ledger();
        let (b, _) = default_ledger();
        let oracle = addr(0x0A);
        assert_eq!(a.index_seed(), b.index_seed());
        assert_eq!(a.register_oracle(oracle, 1), b.register_oracle(oracle, 1));
    }
}

// ============================================================================
// Consensus Tests
// ============================================================================

mod consensus_tests {
    use super::*;

    #[test]
    fn test_quorum_finalizes_late_airline_and_credits() {
        let (ledger, key) = default_ledger();
        let passenger = addr(0x50);
        ledger.buy_insurance(passenger, key, 1).unwrap();

        let request = ledger
            .fetch_flight_status(passenger, addr(AIRLINE), "AA100", DEPARTURE)
            .unwrap();
        let (oracles, _) = oracles_for(&ledger, request.index, 3);
        for oracle in &oracles {
            submit(&ledger, *oracle, request.index, 20).unwrap();
        }

        assert_eq!(ledger.get_flight_status(&key), Ok(FlightStatus::LateAirline));
        assert!(ledger.check_credits(&passenger) > 0);
    }

    #[test]
    fn test_index_mismatch_leaves_tally_untouched() {
        let (ledger, key) = default_ledger();
        let request = ledger.fetch_flight_status_by_key(addr(0x50), key).unwrap();
        let (_, outsider) = oracles_for(&ledger, request.index, 1);

        assert_eq!(
            submit(&ledger, outsider, request.index, 20),
            Err(LedgerError::IndexMismatch { index: request.index })
        );
        let pending = ledger
            .get_consensus_request(request.index, addr(AIRLINE), "AA100", DEPARTURE)
            .unwrap();
        assert_eq!(pending.total_reports(), 0);
    }

    #[test]
    fn test_late_fourth_report_is_inert() {
        let (ledger, key) = default_ledger();
        let passenger = addr(0x50);
        ledger.buy_insurance(passenger, key, 100).unwrap();
        let request = ledger.fetch_flight_status_by_key(passenger, key).unwrap();
        let (oracles, _) = oracles_for(&ledger, request.index, 4);

        for oracle in &oracles[..3] {
            submit(&ledger, *oracle, request.index, 20).unwrap();
        }
        let credited = ledger.check_credits(&passenger);
        let events = ledger.events().len();

        assert_eq!(
            submit(&ledger, oracles[3], request.index, 10),
            Ok(SubmissionOutcome::AlreadyFinalized { status: FlightStatus::LateAirline })
        );
        assert_eq!(ledger.get_flight_status(&key), Ok(FlightStatus::LateAirline));
        assert_eq!(ledger.check_credits(&passenger), credited);

        // Only the report notification is added
        let added = ledger.events();
        assert_eq!(added.len(), events + 1);
        assert_eq!(added[events].name(), "OracleReport");
        let reports = ledger
            .get_consensus_request(request.index, addr(AIRLINE), "AA100", DEPARTURE)
            .unwrap();
        assert_eq!(reports.reports_for(FlightStatus::OnTime), 0);
    }

    #[test]
    fn test_split_reports_do_not_finalize() {
        let (ledger, key) = default_ledger();
        let request = ledger.fetch_flight_status_by_key(addr(0x50), key).unwrap();
        let (oracles, _) = oracles_for(&ledger, request.index, 4);

        submit(&ledger, oracles[0], request.index, 20).unwrap();
        submit(&ledger, oracles[1], request.index, 20).unwrap();
        submit(&ledger, oracles[2], request.index, 10).unwrap();
        // Resubmission by a counted oracle does not grow the bucket
        submit(&ledger, oracles[0], request.index, 20).unwrap();

        assert_eq!(ledger.get_flight_status(&key), Ok(FlightStatus::Unknown));
        assert_eq!(ledger.open_requests().len(), 1);

        submit(&ledger, oracles[3], request.index, 20).unwrap();
        assert_eq!(ledger.get_flight_status(&key), Ok(FlightStatus::LateAirline));
        assert!(ledger.open_requests().is_empty());
    }

    #[test]
    fn test_unknown_reports_never_settle() {
        let (ledger, key) = default_ledger();
        let request = ledger.fetch_flight_status_by_key(addr(0x50), key).unwrap();
        let (oracles, _) = oracles_for(&ledger, request.index, 3);
        for oracle in &oracles {
            assert!(matches!(
                submit(&ledger, *oracle, request.index, 0),
                Ok(SubmissionOutcome::Recorded { .. })
            ));
        }
        assert_eq!(ledger.get_flight_status(&key), Ok(FlightStatus::Unknown));
        assert!(ledger.buy_insurance(addr(0x50), key, 1).is_ok());
    }

    #[test]
    fn test_submission_rejections() {
        let (ledger, key) = default_ledger();
        let index = ledger.fetch_flight_status_by_key(addr(0x50), key).unwrap().index;
        let (oracles, _) = oracles_for(&ledger, index, 1);

        assert_eq!(
            submit(&ledger, addr(0x77), index, 20),
            Err(LedgerError::OracleNotRegistered(addr(0x77)))
        );
        assert_eq!(submit(&ledger, oracles[0], index, 21), Err(LedgerError::InvalidStatusCode(21)));
        assert!(matches!(
            ledger.submit_oracle_response(oracles[0], index, addr(AIRLINE), "ZZ999", DEPARTURE, 20),
            Err(LedgerError::RequestNotFound { .. })
        ));
    }

    #[test]
    fn test_notifications_reach_channel() {
        let (ledger, key) = default_ledger();
        let mut events = ledger.subscribe_channel();
        let request = ledger.fetch_flight_status_by_key(addr(0x50), key).unwrap();

        assert_eq!(
            events.try_recv().unwrap(),
            LedgerEvent::OracleRequest {
                index: request.index,
                airline: addr(AIRLINE),
                flight_number: "AA100".into(),
                timestamp: DEPARTURE,
            }
        );
    }
}

// ============================================================================
// Settlement Tests
// ============================================================================

mod settlement_tests {
    use super::*;

    fn finalize_as(ledger: &FlightSurety, key: FlightKey, code: u8) {
        let request = ledger.fetch_flight_status_by_key(addr(0x50), key).unwrap();
        let (oracles, _) = oracles_for(ledger, request.index, 3);
        for oracle in &oracles {
            submit(ledger, *oracle, request.index, code).unwrap();
        }
    }

    #[test]
    fn test_late_airline_pays_multiplier() {
        let (ledger, key) = default_ledger();
        ledger.buy_insurance(addr(0x50), key, 100).unwrap();
        ledger.buy_insurance(addr(0x51), key, 7).unwrap();
        finalize_as(&ledger, key, 20);

        assert_eq!(ledger.check_credits(&addr(0x50)), 150);
        // floor(7 * 1.5)
        assert_eq!(ledger.check_credits(&addr(0x51)), 10);
        let policy = &ledger.get_policies(&addr(0x50))[0];
        assert!(policy.settled);
        assert_eq!(policy.credited, 150);
    }

    #[test]
    fn test_other_statuses_pay_nothing() {
        for code in [10u8, 30, 40, 50] {
            let (ledger, key) = default_ledger();
            ledger.buy_insurance(addr(0x50), key, 100).unwrap();
            finalize_as(&ledger, key, code);

            let policy = &ledger.get_policies(&addr(0x50))[0];
            assert!(policy.settled);
            assert_eq!(policy.credited, 0);
            assert_eq!(ledger.check_credits(&addr(0x50)), 0);
        }
    }

    #[test]
    fn test_custom_multiplier() {
        let (ledger, key) = ledger_with_flight(
            LedgerConfig::default()
                .with_index_seed([0x42; 32])
                .with_payout_multiplier_bps(20_000),
        );
        ledger.buy_insurance(addr(0x50), key, 40).unwrap();
        finalize_as(&ledger, key, 20);
        assert_eq!(ledger.check_credits(&addr(0x50)), 80);
    }

    #[test]
    fn test_premium_rules() {
        let (ledger, key) = ledger_with_flight(
            LedgerConfig::default()
                .with_index_seed([0x42; 32])
                .with_max_premium(50),
        );
        assert_eq!(ledger.buy_insurance(addr(0x50), key, 0), Err(LedgerError::InsufficientPayment));
        assert_eq!(
            ledger.buy_insurance(addr(0x50), key, 51),
            Err(LedgerError::PremiumTooHigh { provided: 51, max: 50 })
        );
        let unknown = FlightKey::compute(&addr(AIRLINE), "ZZ999", DEPARTURE);
        assert_eq!(
            ledger.buy_insurance(addr(0x50), unknown, 1),
            Err(LedgerError::FlightNotFound(unknown))
        );
    }

    #[test]
    fn test_withdraw_reduces_balance_exactly() {
        let (ledger, key) = default_ledger();
        let passenger = addr(0x50);
        ledger.buy_insurance(passenger, key, 100).unwrap();
        finalize_as(&ledger, key, 20);

        assert_eq!(ledger.withdraw_credits(passenger, 0), Err(LedgerError::InsufficientPayment));
        assert_eq!(ledger.withdraw_credits(passenger, 100), Ok(50));
        assert_eq!(ledger.check_credits(&passenger), 50);
        assert_eq!(
            ledger.withdraw_credits(passenger, 100),
            Err(LedgerError::InsufficientCredits { requested: 100, available: 50 })
        );
    }

    #[test]
    fn test_exhausted_treasury_rolls_back() {
        let (ledger, key) = default_ledger();
        let treasury = Arc::new(InMemoryTreasury::with_reserve(60));
        let ledger = ledger.with_treasury(treasury.clone());
        let passenger = addr(0x50);
        ledger.buy_insurance(passenger, key, 100).unwrap();
        finalize_as(&ledger, key, 20);

        assert!(matches!(
            ledger.withdraw_credits(passenger, 100),
            Err(LedgerError::WithdrawalFailed(_))
        ));
        assert_eq!(ledger.check_credits(&passenger), 150);

        assert_eq!(ledger.withdraw_credits(passenger, 60), Ok(90));
        assert_eq!(treasury.paid_to(&passenger), 60);
    }
}

// ============================================================================
// Oracle Pool Tests
// ============================================================================

mod oracle_pool_tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_spawned_pool_settles_and_pays_out() {
        let (ledger, key) = default_ledger();
        let ledger = Arc::new(ledger);
        let passenger = addr(0x50);
        ledger.buy_insurance(passenger, key, 100).unwrap();

        let pool = Arc::new(
            OraclePool::register(
                ledger.clone(),
                &PoolConfig::default().with_oracle_count(60),
                Box::new(FixedStatusPicker(FlightStatus::LateAirline)),
            )
            .unwrap(),
        );
        let handle = pool.spawn(ledger.subscribe_channel());

        ledger.fetch_flight_status_by_key(passenger, key).unwrap();

        let settled = tokio::time::timeout(Duration::from_secs(5), async {
            while ledger.check_credits(&passenger) == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(settled.is_ok());
        assert_eq!(ledger.get_flight_status(&key), Ok(FlightStatus::LateAirline));
        assert_eq!(ledger.check_credits(&passenger), 150);
        assert_eq!(pool.stats().finalized, 1);

        assert_eq!(ledger.withdraw_credits(passenger, 150), Ok(0));
        handle.abort();
    }
}
