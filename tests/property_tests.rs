//! Property-Based Tests for the Flightsure Ledger
//!
//! Uses proptest to drive random operation sequences and verify the
//! ledger-wide invariants hold.

use flightsure::prelude::*;
use proptest::prelude::*;

fn addr(n: u8) -> Address {
    Address::new([n; 20])
}

const ADMIN: u8 = 0xAD;

/// Ledger with `count` funded airlines at addr(1..=count), count <= 4
fn ledger_with_airlines(count: u8) -> FlightSurety {
    let ledger = FlightSurety::new(
        LedgerConfig::default().with_index_seed([0x5E; 32]),
        addr(ADMIN),
        addr(1),
        "A1",
    )
    .unwrap();
    ledger.fund_airline(addr(1), addr(1), 10).unwrap();
    for n in 2..=count {
        ledger.register_airline(addr(1), addr(n), format!("A{}", n)).unwrap();
        ledger.fund_airline(addr(n), addr(n), 10).unwrap();
    }
    ledger
}

/// Register oracles until `3 + extra` of them hold `index`
fn quorum_for(ledger: &FlightSurety, index: u8, extra: usize) -> Vec<Address> {
    let mut holders = Vec::new();
    let mut n = 0u32;
    while holders.len() < 3 + extra {
        let oracle = Address::from_label(&format!("prop-oracle-{}", n));
        n += 1;
        if ledger.register_oracle(oracle, 1).unwrap().contains(&index) {
            holders.push(oracle);
        }
    }
    holders
}

// =============================================================================
// PROPTEST STRATEGIES
// =============================================================================

/// Strategy for valid oracle status codes
fn status_code() -> impl Strategy<Value = u8> {
    prop_oneof![Just(0u8), Just(10), Just(20), Just(30), Just(40), Just(50)]
}

/// Governance actions on airlines 1..=8
#[derive(Clone, Debug)]
enum GovernanceOp {
    Register { caller: u8, target: u8 },
    Approve { caller: u8, target: u8 },
    Fund { caller: u8, target: u8, amount: Amount },
}

fn governance_op() -> impl Strategy<Value = GovernanceOp> {
    let id = 1u8..=8;
    prop_oneof![
        (id.clone(), id.clone()).prop_map(|(caller, target)| GovernanceOp::Register { caller, target }),
        (id.clone(), id.clone()).prop_map(|(caller, target)| GovernanceOp::Approve { caller, target }),
        (id.clone(), id, 0u64..20).prop_map(|(caller, target, amount)| GovernanceOp::Fund { caller, target, amount }),
    ]
}

// =============================================================================
// GOVERNANCE PROPERTY TESTS
// =============================================================================

proptest! {
    /// Property: only distinct voters count toward the threshold
    #[test]
    fn repeated_votes_never_count(voters in prop::collection::vec(1u8..=4, 1..12)) {
        let ledger = ledger_with_airlines(4);
        ledger.register_airline(addr(5), addr(5), "A5").unwrap();

        let mut distinct = std::collections::BTreeSet::new();
        for voter in voters {
            let outcome = ledger.approve_airline(addr(voter), addr(5));
            if distinct.len() >= 3 {
                prop_assert_eq!(outcome, Err(LedgerError::NotACandidate(addr(5))));
                continue;
            }
            distinct.insert(voter);
            let outcome = outcome.unwrap();
            prop_assert_eq!(outcome.is_approved(), distinct.len() >= 3);
            prop_assert_eq!(ledger.get_airline(&addr(5)).unwrap().votes(), distinct.len());
        }
    }

    /// Property: isAirline holds exactly for approved and funded airlines
    #[test]
    fn participation_requires_approval_and_funding(
        ops in prop::collection::vec(governance_op(), 1..40)
    ) {
        let ledger = ledger_with_airlines(1);
        for op in ops {
            let _ = match op {
                GovernanceOp::Register { caller, target } => {
                    ledger.register_airline(addr(caller), addr(target), format!("A{}", target)).map(|_| ())
                }
                GovernanceOp::Approve { caller, target } => {
                    ledger.approve_airline(addr(caller), addr(target)).map(|_| ())
                }
                GovernanceOp::Fund { caller, target, amount } => {
                    ledger.fund_airline(addr(caller), addr(target), amount)
                }
            };

            for n in 1..=8u8 {
                let expected = ledger
                    .get_airline(&addr(n))
                    .map(|a| a.state == AdmissionState::Approved && a.funded)
                    .unwrap_or(false);
                prop_assert_eq!(ledger.is_airline(&addr(n)), expected);
            }
        }
    }

    /// Property: a rejected operation leaves the audit log unchanged
    #[test]
    fn rejections_emit_nothing(ops in prop::collection::vec(governance_op(), 1..30)) {
        let ledger = ledger_with_airlines(2);
        for op in ops {
            let before = ledger.events().len();
            let result = match op {
                GovernanceOp::Register { caller, target } => {
                    ledger.register_airline(addr(caller), addr(target), "X").map(|_| ())
                }
                GovernanceOp::Approve { caller, target } => {
                    ledger.approve_airline(addr(caller), addr(target)).map(|_| ())
                }
                GovernanceOp::Fund { caller, target, amount } => {
                    ledger.fund_airline(addr(caller), addr(target), amount)
                }
            };
            if result.is_err() {
                prop_assert_eq!(ledger.events().len(), before);
            } else {
                prop_assert!(ledger.events().len() > before);
            }
        }
    }
}

// =============================================================================
// CONSENSUS PROPERTY TESTS
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: a flight finalizes at most once and never changes afterwards
    #[test]
    fn quorum_finalizes_exactly_once(
        reports in prop::collection::vec((0usize..6, status_code()), 1..30)
    ) {
        let ledger = ledger_with_airlines(1);
        let key = ledger.register_flight(addr(1), addr(1), "AA100", 1_000).unwrap();
        let request = ledger.fetch_flight_status_by_key(addr(9), key).unwrap();
        let oracles = quorum_for(&ledger, request.index, 3);

        let mut finalized: Option<FlightStatus> = None;
        for (oracle, code) in reports {
            let outcome = ledger
                .submit_oracle_response(oracles[oracle], request.index, addr(1), "AA100", 1_000, code)
                .unwrap();
            match outcome {
                SubmissionOutcome::Finalized { status, .. } => {
                    prop_assert!(finalized.is_none());
                    prop_assert!(status != FlightStatus::Unknown);
                    finalized = Some(status);
                }
                SubmissionOutcome::AlreadyFinalized { status } => {
                    prop_assert_eq!(Some(status), finalized);
                }
                SubmissionOutcome::Recorded { .. } => prop_assert!(finalized.is_none()),
            }
            let current = ledger.get_flight_status(&key).unwrap();
            prop_assert_eq!(current, finalized.unwrap_or(FlightStatus::Unknown));
        }

        let notices = ledger
            .events()
            .iter()
            .filter(|e| e.name() == "FlightStatusInfo")
            .count();
        prop_assert_eq!(notices, usize::from(finalized.is_some()));
    }
}

// =============================================================================
// INSURANCE PROPERTY TESTS
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: payouts are the floored multiple of the premium, and
    /// withdrawals never exceed what was credited
    #[test]
    fn withdrawals_never_exceed_credits(
        premiums in prop::collection::vec(1u64..1_000, 1..5),
        bps in 10_000u64..30_000,
        withdrawals in prop::collection::vec(0u64..2_000, 0..10)
    ) {
        let ledger = FlightSurety::new(
            LedgerConfig::default()
                .with_index_seed([0x5E; 32])
                .with_payout_multiplier_bps(bps),
            addr(ADMIN),
            addr(1),
            "A1",
        )
        .unwrap();
        ledger.fund_airline(addr(1), addr(1), 10).unwrap();
        let key = ledger.register_flight(addr(1), addr(1), "AA100", 1_000).unwrap();
        let passenger = addr(0x50);
        for premium in &premiums {
            ledger.buy_insurance(passenger, key, *premium).unwrap();
        }

        let request = ledger.fetch_flight_status_by_key(passenger, key).unwrap();
        for oracle in quorum_for(&ledger, request.index, 0) {
            ledger
                .submit_oracle_response(oracle, request.index, addr(1), "AA100", 1_000, 20)
                .unwrap();
        }

        let credited: u64 = premiums.iter().map(|p| p * bps / 10_000).sum();
        prop_assert_eq!(ledger.check_credits(&passenger), credited);

        let mut withdrawn = 0u64;
        for amount in withdrawals {
            let before = ledger.check_credits(&passenger);
            match ledger.withdraw_credits(passenger, amount) {
                Ok(remaining) => {
                    prop_assert_eq!(remaining, before - amount);
                    withdrawn += amount;
                }
                Err(_) => prop_assert_eq!(ledger.check_credits(&passenger), before),
            }
            prop_assert!(withdrawn <= credited);
            prop_assert_eq!(withdrawn + ledger.check_credits(&passenger), credited);
        }
    }

    /// Property: flight keys are stable and separate distinct flights
    #[test]
    fn flight_keys_are_deterministic(
        airline in any::<[u8; 20]>(),
        number in "[A-Z]{2}[0-9]{1,4}",
        timestamp in any::<u64>(),
        other_timestamp in any::<u64>()
    ) {
        let airline = Address::new(airline);
        let key = FlightKey::compute(&airline, &number, timestamp);
        prop_assert_eq!(key, FlightKey::compute(&airline, &number, timestamp));
        if other_timestamp != timestamp {
            prop_assert_ne!(key, FlightKey::compute(&airline, &number, other_timestamp));
        }
    }
}
