mod common;

use common::{CallCounts, StubBackend};
use hostsweep::config::ScanConfig;
use hostsweep::discovery::{event_channel, DeviceRecord, HostProbe, ScanEvent};
use hostsweep::network::{address, AddressRange};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

fn router() -> Ipv4Addr {
    Ipv4Addr::new(192, 0, 2, 5)
}

#[tokio::test]
async fn test_reachable_host_is_fully_identified() {
    let backend = Arc::new(
        StubBackend::all_up()
            .with_hostname(router(), "router.local")
            .with_open_ports(&[80, 443]),
    );
    let config = ScanConfig::default()
        .with_ports(vec![22, 80, 443])
        .with_port_timeout(500);
    let probe = HostProbe::new(backend.clone(), config);

    let record = probe.identify(u32::from(router()), None).await;

    assert_eq!(
        record,
        DeviceRecord {
            address: "192.0.2.5".to_string(),
            reachable: true,
            hostname: "router.local".to_string(),
            mac: String::new(),
            open_ports: vec![80, 443],
        }
    );
    assert_eq!(CallCounts::get(&backend.calls.probe_port), 3);
}

#[tokio::test]
async fn test_unreachable_host_skips_remaining_steps() {
    let backend = Arc::new(StubBackend::all_down().with_open_ports(&[22, 80]));
    let probe = HostProbe::new(backend.clone(), ScanConfig::default());

    let record = probe.identify(u32::from(router()), None).await;

    assert_eq!(record.address, "192.0.2.5");
    assert!(!record.reachable);
    assert!(record.hostname.is_empty());
    assert!(record.mac.is_empty());
    assert!(record.open_ports.is_empty());

    assert_eq!(CallCounts::get(&backend.calls.ping), 1);
    assert_eq!(CallCounts::get(&backend.calls.reverse_lookup), 0);
    assert_eq!(CallCounts::get(&backend.calls.mac_address), 0);
    assert_eq!(CallCounts::get(&backend.calls.probe_port), 0);
}

#[tokio::test]
async fn test_concurrent_port_probes_keep_configured_order() {
    let backend = Arc::new(StubBackend::all_up().with_open_ports(&[3389, 22, 445]));
    let config = ScanConfig::default().with_port_concurrency(6);
    let probe = HostProbe::new(backend, config);

    let record = probe.identify(u32::from(router()), None).await;

    assert_eq!(record.open_ports, vec![22, 445, 3389]);
}

#[tokio::test]
async fn test_disabled_lookups_are_not_called() {
    let backend = Arc::new(
        StubBackend::all_up()
            .with_hostname(router(), "router.local")
            .with_mac(router(), "AA-BB-CC-DD-EE-FF"),
    );
    let mut config = ScanConfig::default();
    config.resolve_hostnames = false;
    config.resolve_mac = false;
    let probe = HostProbe::new(backend.clone(), config);

    let record = probe.identify(u32::from(router()), None).await;

    assert!(record.reachable);
    assert!(record.hostname.is_empty());
    assert!(record.mac.is_empty());
    assert_eq!(CallCounts::get(&backend.calls.reverse_lookup), 0);
    assert_eq!(CallCounts::get(&backend.calls.mac_address), 0);
}

#[tokio::test]
async fn test_progress_events_follow_the_pipeline() {
    let backend = Arc::new(StubBackend::all_up().with_mac(router(), "AA-BB-CC-DD-EE-FF"));
    let probe = HostProbe::new(backend, ScanConfig::default().with_ports(vec![80]));
    let (tx, mut rx) = event_channel();

    probe.identify(u32::from(router()), Some(&tx)).await;
    drop(tx);

    let mut lines = Vec::new();
    while let Some(event) = rx.recv().await {
        lines.push(event.to_string());
    }

    assert_eq!(
        lines,
        vec![
            "Ping 192.0.2.5...",
            "DNS 192.0.2.5...",
            "MAC 192.0.2.5...",
            "Ports 192.0.2.5...",
            "Done 192.0.2.5: (no name), AA-BB-CC-DD-EE-FF, 0 ports",
        ]
    );
}

#[tokio::test]
async fn test_failed_ping_event() {
    let probe = HostProbe::new(Arc::new(StubBackend::all_down()), ScanConfig::default());
    let (tx, mut rx) = event_channel();

    probe.identify(u32::from(router()), Some(&tx)).await;
    drop(tx);

    assert_eq!(rx.recv().await, Some(ScanEvent::Ping("192.0.2.5".into())));
    assert_eq!(rx.recv().await, Some(ScanEvent::PingFailed("192.0.2.5".into())));
    assert_eq!(rx.recv().await, None);
}

#[tokio::test]
async fn test_sequential_scan_returns_address_order() {
    let up = Ipv4Addr::new(10, 0, 0, 3);
    let backend = Arc::new(
        StubBackend::all_down()
            .with_reachable(up)
            .with_ping_delay(Duration::from_millis(1)),
    );
    let probe = HostProbe::new(backend.clone(), ScanConfig::default());
    let range = AddressRange::parse("10.0.0.1", "10.0.0.5").unwrap();

    let records = probe.scan_sequential(range, None).await.unwrap();

    let addresses: Vec<_> = records.iter().map(|r| r.address.as_str()).collect();
    assert_eq!(
        addresses,
        vec!["10.0.0.1", "10.0.0.2", "10.0.0.3", "10.0.0.4", "10.0.0.5"]
    );
    assert_eq!(
        records.iter().filter(|r| r.reachable).map(|r| r.ordinal()).collect::<Vec<_>>(),
        vec![address::parse("10.0.0.3").ok()]
    );
    assert_eq!(CallCounts::get(&backend.calls.initialize), 1);
    assert_eq!(CallCounts::get(&backend.calls.shutdown), 1);
}

#[tokio::test]
async fn test_sequential_scan_fails_when_network_init_fails() {
    let probe = HostProbe::new(Arc::new(StubBackend::failing_init()), ScanConfig::default());
    let range = AddressRange::single(1);

    assert!(probe.scan_sequential(range, None).await.is_err());
}
