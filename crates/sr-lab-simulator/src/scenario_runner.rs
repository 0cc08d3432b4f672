use anyhow::{Context, anyhow};
use sr_lab_abstract::{SimConfig, SrConfig, TestAction, TestAssertion, TestScenario};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::engine::Simulator;
use crate::trace::SimulationReport;

const DEFAULT_MAX_DURATION_MS: u64 = 10_000;

pub fn load_scenario(path: &Path) -> anyhow::Result<TestScenario> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
    parse_scenario(&content)
}

pub fn parse_scenario(content: &str) -> anyhow::Result<TestScenario> {
    toml::from_str(content).context("Failed to parse scenario")
}

pub fn run_scenario(scenario_path: &Path) -> anyhow::Result<SimulationReport> {
    let scenario = load_scenario(scenario_path)?;
    execute(&scenario)
}

/// Build a Selective-Repeat simulation from the scenario, run it and check
/// every assertion. Fails on the first assertion that does not hold.
pub fn execute(scenario: &TestScenario) -> anyhow::Result<SimulationReport> {
    info!("Running Scenario: {}", scenario.name);
    info!("Description: {}", scenario.description);

    let mut config = SimConfig::default();
    scenario.config.apply_to(&mut config);
    let mut protocol = SrConfig::default();
    scenario.protocol.apply_to(&mut protocol);

    let mut sim = Simulator::selective_repeat(config, protocol)?;
    configure_actions(&mut sim, &scenario.actions);

    let max_duration = scenario
        .assertions
        .iter()
        .find_map(|a| {
            if let TestAssertion::MaxDuration { ms } = a {
                Some(*ms)
            } else {
                None
            }
        })
        .unwrap_or(DEFAULT_MAX_DURATION_MS);

    if !sim.run_until(max_duration)? {
        return Err(anyhow!("Test timed out after {} ms", max_duration));
    }

    let report = sim.export_report();
    check_assertions(&scenario.assertions, &report)?;

    info!("Test Scenario Passed!");
    Ok(report)
}

/// Schedule application sends and register deterministic faults.
pub fn configure_actions(sim: &mut Simulator, actions: &[TestAction]) {
    for action in actions {
        match action {
            TestAction::AppSend { time, data } => {
                sim.schedule_app_send(*time, data.clone());
            }
            TestAction::DropNextFromSenderSeq { seq } => {
                sim.add_drop_sender_seq_once(*seq);
            }
            TestAction::DropNextFromReceiverAck { ack } => {
                sim.add_drop_receiver_ack_once(*ack);
            }
            TestAction::CorruptNextFromSenderSeq { seq } => {
                sim.add_corrupt_sender_seq_once(*seq);
            }
        }
    }
}

fn check_range(what: &str, actual: u32, min: u32, max: Option<u32>) -> anyhow::Result<()> {
    if actual < min {
        return Err(anyhow!(
            "Assertion Failed: {} was {}, expected min {}",
            what,
            actual,
            min
        ));
    }
    if let Some(max) = max
        && actual > max
    {
        return Err(anyhow!(
            "Assertion Failed: {} was {}, expected max {}",
            what,
            actual,
            max
        ));
    }
    Ok(())
}

pub fn check_assertions(
    assertions: &[TestAssertion],
    report: &SimulationReport,
) -> anyhow::Result<()> {
    for assertion in assertions {
        match assertion {
            TestAssertion::DataDelivered { data } => {
                let found = report.delivered_data.iter().any(|d| d == data.as_bytes());
                if !found {
                    return Err(anyhow!(
                        "Assertion Failed: Data {:?} was not delivered",
                        data
                    ));
                }
            }
            TestAssertion::DeliveredInOrder { data } => {
                let delivered: Vec<String> = report
                    .delivered_data
                    .iter()
                    .map(|d| String::from_utf8_lossy(d).into_owned())
                    .collect();
                if &delivered != data {
                    return Err(anyhow!(
                        "Assertion Failed: delivered {:?}, expected {:?}",
                        delivered,
                        data
                    ));
                }
            }
            TestAssertion::SenderPacketCount { min, max } => {
                check_range("sender packet count", report.sender_packet_count, *min, *max)?;
            }
            TestAssertion::Retransmissions { min, max } => {
                let retransmissions =
                    report.last_metric("sender.retransmissions").unwrap_or(0.0) as u32;
                check_range("retransmission count", retransmissions, *min, *max)?;
            }
            TestAssertion::MaxDuration { .. } => {} // Already checked
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const WALKTHROUGH: &str = include_str!("../../../scenarios/sr_walkthrough.toml");
    const LOSSY: &str = include_str!("../../../scenarios/sr_lossy_channel.toml");
    const WRAP: &str = include_str!("../../../scenarios/sr_sequence_wrap.toml");
    const REORDER: &str = include_str!("../../../scenarios/sr_reordering_channel.toml");

    #[test]
    fn walkthrough_scenario_passes() {
        let scenario = parse_scenario(WALKTHROUGH).unwrap();
        assert_eq!(scenario.protocol.modulus, Some(10));
        let report = execute(&scenario).unwrap();
        assert_eq!(report.last_metric("sender.base"), Some(4.0));
    }

    #[test]
    fn lossy_scenario_passes() {
        let scenario = parse_scenario(LOSSY).unwrap();
        execute(&scenario).unwrap();
    }

    #[test]
    fn wrap_scenario_passes() {
        let scenario = parse_scenario(WRAP).unwrap();
        let report = execute(&scenario).unwrap();
        assert_eq!(report.delivered_data.len(), 9);
    }

    #[test]
    fn reordering_scenario_passes() {
        let scenario = parse_scenario(REORDER).unwrap();
        assert!(scenario.config.min_latency < scenario.config.max_latency);
        let report = execute(&scenario).unwrap();
        assert_eq!(report.delivered_data.len(), 16);
    }

    #[test]
    fn failing_assertion_is_reported() {
        let scenario = parse_scenario(
            r#"
            name = "too strict"
            description = "one packet cannot satisfy a minimum of three"

            [config]
            min_latency = 1
            max_latency = 1

            [[actions]]
            type = "app_send"
            time = 0
            data = "solo"

            [[assertions]]
            type = "sender_packet_count"
            min = 3
            "#,
        )
        .unwrap();
        let err = execute(&scenario).unwrap_err();
        assert!(err.to_string().contains("sender packet count"));
    }

    #[test]
    fn invalid_protocol_config_is_an_error() {
        let scenario = parse_scenario(
            r#"
            name = "overlapping windows"
            description = "Ns + Nr > K"
            actions = []

            [protocol]
            modulus = 4
            sender_window = 3
            receiver_window = 3
            "#,
        )
        .unwrap();
        assert!(execute(&scenario).is_err());
    }

    #[test]
    fn run_that_exceeds_max_duration_fails() {
        let scenario = parse_scenario(
            r#"
            name = "dead link"
            description = "every packet is lost, so retransmission never ends"

            [config]
            loss_rate = 1.0

            [[actions]]
            type = "app_send"
            time = 0
            data = "void"

            [[assertions]]
            type = "max_duration"
            ms = 200
            "#,
        )
        .unwrap();
        let err = execute(&scenario).unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
