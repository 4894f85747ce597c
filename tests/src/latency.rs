#![cfg(test)]
use std::collections::HashSet;
use std::time::{Duration, Instant};

use e7mon_common::config::Config;
use e7mon_common::latency::LatencySummary;
use e7mon_common::network::target::TargetHost;
use e7mon_core::scanner::flow::EPHEMERAL_PORTS;
use e7mon_core::Scanner;
use e7mon_protocols::tcp;

use crate::sim::{self, Peer};

fn hosts(list: &[&str]) -> Vec<String> {
    list.iter().map(|h| h.to_string()).collect()
}

fn keys(results: &e7mon_common::latency::LatencyMap) -> HashSet<&str> {
    results.keys().map(String::as_str).collect()
}

#[tokio::test]
async fn only_answering_host_is_reported_at_deadline() {
    let deadline = Duration::from_millis(300);
    let (mut scanner, wire) = sim::scanner(&[("10.0.0.1:9000", Peer::answering())], deadline);
    let started = Instant::now();

    let results = scanner
        .start_latency_scan(&hosts(&["10.0.0.1:9000", "10.0.0.2:9000"]))
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(keys(&results), HashSet::from(["10.0.0.1:9000"]));
    assert!(elapsed >= deadline, "returned after {elapsed:?}, before the deadline");
    assert!(elapsed < deadline + Duration::from_secs(1), "returned after {elapsed:?}");
    assert_eq!(wire.syns().len(), 2);
}

#[tokio::test]
async fn all_hosts_answering_returns_before_deadline() {
    let deadline = Duration::from_secs(5);
    let (mut scanner, _wire) = sim::scanner(
        &[
            ("10.0.0.1:9000", Peer::answering()),
            ("10.0.0.2:13000", Peer::answering()),
        ],
        deadline,
    );
    let started = Instant::now();

    let results = scanner
        .start_latency_scan(&hosts(&["10.0.0.1:9000", "10.0.0.2:13000"]))
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    assert!(started.elapsed() < deadline);
}

#[tokio::test]
async fn latency_covers_the_round_trip() {
    let delay = Duration::from_millis(80);
    let (mut scanner, _wire) = sim::scanner(
        &[("10.0.0.1:9000", Peer::answering_after(delay))],
        Duration::from_secs(2),
    );

    let results = scanner.start_latency_scan(&hosts(&["10.0.0.1:9000"])).await.unwrap();

    let latency = results["10.0.0.1:9000"];
    assert!(latency >= delay, "measured {latency:?}");
    assert!(latency < Duration::from_secs(2));
}

#[tokio::test]
async fn sequential_scans_do_not_share_results() {
    let (mut scanner, _wire) = sim::scanner(
        &[
            ("10.0.0.1:9000", Peer::answering()),
            ("10.0.0.2:9000", Peer::answering()),
            ("10.0.0.3:9000", Peer::answering()),
        ],
        Duration::from_millis(500),
    );

    let first = scanner
        .start_latency_scan(&hosts(&["10.0.0.1:9000"]))
        .await
        .unwrap();
    let second = scanner
        .start_latency_scan(&hosts(&["10.0.0.2:9000", "10.0.0.3:9000"]))
        .await
        .unwrap();

    assert_eq!(keys(&first), HashSet::from(["10.0.0.1:9000"]));
    assert_eq!(keys(&second), HashSet::from(["10.0.0.2:9000", "10.0.0.3:9000"]));
}

#[tokio::test]
async fn late_reply_does_not_leak_into_next_scan() {
    let (mut scanner, wire) = sim::scanner(
        &[
            ("10.0.0.1:9000", Peer::answering_after(Duration::from_millis(300))),
            ("10.0.0.2:9000", Peer::answering()),
        ],
        Duration::from_millis(200),
    );

    let first = scanner
        .start_latency_scan(&hosts(&["10.0.0.1:9000"]))
        .await
        .unwrap();
    assert!(first.is_empty());

    // the first SYN-ACK from 10.0.0.1 lands while this scan is waiting,
    // the answer to its new SYN only after the deadline
    let second = scanner
        .start_latency_scan(&hosts(&["10.0.0.1:9000", "10.0.0.2:9000"]))
        .await
        .unwrap();

    assert_eq!(keys(&second), HashSet::from(["10.0.0.2:9000"]));
    assert_eq!(scanner.descriptor().name, "eth0");
    assert_eq!(wire.syns().len(), 3);
}

#[tokio::test]
async fn scanner_survives_an_abandoned_scan() {
    let (mut scanner, _wire) = sim::scanner(
        &[("10.0.0.1:9000", Peer::answering())],
        Duration::from_secs(2),
    );

    let abandoned = tokio::time::timeout(
        Duration::from_millis(50),
        scanner.start_latency_scan(&hosts(&["10.0.0.2:9000"])),
    )
    .await;
    assert!(abandoned.is_err(), "silent host should keep the scan waiting");

    let results = scanner
        .start_latency_scan(&hosts(&["10.0.0.1:9000"]))
        .await
        .unwrap();
    assert_eq!(keys(&results), HashSet::from(["10.0.0.1:9000"]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_replies_are_all_recorded() {
    let targets: Vec<String> = (1..=64).map(|i| format!("10.0.1.{i}:9000")).collect();
    let peers: Vec<(&str, Peer)> = targets
        .iter()
        .map(|t| (t.as_str(), Peer::answering()))
        .collect();
    let (mut scanner, wire) = sim::scanner(&peers, Duration::from_secs(5));

    let results = scanner.start_latency_scan(&targets).await.unwrap();

    assert_eq!(results.len(), targets.len());
    for target in &targets {
        assert!(results.contains_key(target), "{target} missing");
    }

    let summary = LatencySummary::from_results(&results, targets.len());
    assert_eq!(summary.response_rate(), 1.0);
    assert!(summary.low <= summary.average && summary.average <= summary.high);

    let syns = wire.syns();
    let rsts = wire.wait_for_rsts(targets.len(), Duration::from_secs(2)).await;
    assert_eq!(rsts.len(), targets.len());
    for rst in &rsts {
        let syn = syns
            .iter()
            .find(|syn| syn.src_port == rst.src_port)
            .expect("RST for a port we never probed");
        assert_eq!(rst.dst_addr, syn.dst_addr);
        assert_eq!(rst.dst_port, syn.dst_port);
        // peer acked our ISN + 1, the RST carries ack + 1
        assert_eq!(rst.sequence, syn.sequence.wrapping_add(2));
    }
}

#[tokio::test]
async fn probes_use_distinct_ephemeral_ports_in_caller_order() {
    let targets: Vec<String> = (1..=32).map(|i| format!("10.0.2.{i}:30303")).collect();
    let (mut scanner, wire) = sim::scanner(&[], Duration::from_millis(100));

    let results = scanner.start_latency_scan(&targets).await.unwrap();
    assert!(results.is_empty());

    let syns = wire.syns();
    assert_eq!(syns.len(), targets.len());

    let ports: HashSet<u16> = syns.iter().map(|syn| syn.src_port).collect();
    assert_eq!(ports.len(), syns.len());
    assert!(ports.iter().all(|port| EPHEMERAL_PORTS.contains(port)));

    let sent_to: Vec<String> = syns
        .iter()
        .map(|syn| format!("{}:{}", syn.dst_addr, syn.dst_port))
        .collect();
    assert_eq!(sent_to, targets);
}

#[test]
fn syn_frames_decode_to_their_target() {
    let ctx = e7mon_protocols::SenderContext {
        src_mac: sim::LOCAL_MAC,
        gateway_mac: sim::GATEWAY_MAC,
        src_addr: sim::descriptor().ipv4.ip(),
    };
    for host in ["1.1.1.1:443", "127.0.0.1:1", "255.255.255.254:65535", "10.0.0.7:9000"] {
        let target: TargetHost = host.parse().unwrap();
        let frame = tcp::build_syn(&ctx, 40_000, target.addr()).unwrap();
        let decoded = tcp::decode(&frame).unwrap();
        assert_eq!(decoded.dst_addr, target.ip());
        assert_eq!(decoded.dst_port, target.port());
    }
}

#[tokio::test]
#[ignore = "needs root and a network with a reachable gateway"]
async fn live_scan_against_public_host() {
    let mut scanner = Scanner::new(&Config::default()).expect("scanner setup");
    let results = scanner
        .start_latency_scan(&hosts(&["1.1.1.1:443"]))
        .await
        .expect("scan");
    assert!(results.len() <= 1);
}
