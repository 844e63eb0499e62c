//! End-to-end runs over real loopback sockets.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use event_log::{Channel, FakeEventSink};
use gateway::{Aggregate, Gateway, GatewayConfig};
use sensor_node::{DatagramLink, Producer, ScriptedSampler, StreamLink, Tick};
use simulator::{Network, SimulatorConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use wire::SensorKind;

struct RunningGateway {
    aggregate: Aggregate,
    stream_addr: SocketAddr,
    datagram_addr: SocketAddr,
    report_addr: SocketAddr,
    events: FakeEventSink,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl RunningGateway {
    async fn start() -> Self {
        Self::start_with(GatewayConfig::loopback_ephemeral()).await
    }

    async fn start_with(config: GatewayConfig) -> Self {
        let aggregate = Aggregate::new();
        let events = FakeEventSink::new();
        let gateway = Gateway::bind(&config, aggregate.clone(), Arc::new(events.clone()))
            .await
            .unwrap();
        let report = gateway::ReportServer::bind(&config.report_addr, aggregate.clone(), config.stale_after)
            .await
            .unwrap();

        let stream_addr = gateway.stream_addr().unwrap();
        let datagram_addr = gateway.datagram_addr().unwrap();
        let report_addr = report.local_addr().unwrap();

        let cancel = CancellationToken::new();
        let handle = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                let (gateway, report) = tokio::join!(gateway.run(cancel.clone()), report.run(cancel));
                gateway.unwrap();
                report.unwrap();
            }
        });

        Self {
            aggregate,
            stream_addr,
            datagram_addr,
            report_addr,
            events,
            cancel,
            handle,
        }
    }

    async fn wait_for(&self, kind: SensorKind, n: usize) {
        wait_for(&self.aggregate, kind, n).await;
    }

    async fn stop(self) {
        self.cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("gateway did not stop")
            .unwrap();
    }
}

async fn wait_for(aggregate: &Aggregate, kind: SensorKind, n: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while aggregate.len(kind) < n {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("expected {n} {kind} readings, have {}", aggregate.len(kind)));
}

/// Plain HTTP/1.1 GET; the server closes the connection after the response.
async fn http_get(addr: SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = String::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_string(&mut response))
        .await
        .expect("response not closed")
        .unwrap();
    response
}

#[tokio::test]
async fn whole_network_starts_and_stops() {
    let events = FakeEventSink::new();
    let network = Network::start(&SimulatorConfig::loopback_ephemeral(), Arc::new(events.clone()))
        .await
        .unwrap();

    // Every producer fires on start; the heartbeat and temperature always send.
    wait_for(network.aggregate(), SensorKind::Temperature, 1).await;
    tokio::time::timeout(Duration::from_secs(5), async {
        while network.aggregate().liveness().last_received_at(gateway::ProducerKind::Heartbeat).is_none() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("no heartbeat arrived");

    let page = http_get(network.report_addr(), "/temperature").await;
    assert!(page.starts_with("HTTP/1.1 200"), "{page}");
    assert!(page.contains("Temperature Data"));

    let aggregate = network.aggregate().clone();
    let summary = network.shutdown(Duration::from_secs(2)).await;
    assert!(!summary.timed_out);
    assert!(summary.failures.is_empty(), "{:?}", summary.failures);
    assert!(summary.heartbeats_sent >= 1);
    assert!(!summary.temperature_sent.is_empty());
    assert!(aggregate.len(SensorKind::Temperature) <= summary.temperature_sent.len());
    assert!(summary.humidity_sent.iter().all(|r| r.value > 80.0));

    assert!(events
        .on(Channel::Gateway)
        .iter()
        .any(|e| e.message == "Handshake with Server successful"));
}

#[tokio::test]
async fn concurrent_senders_lose_no_readings() {
    let gw = RunningGateway::start().await;

    let mut senders = Vec::new();
    for sender in 0..10 {
        let stream_addr = gw.stream_addr;
        senders.push(tokio::spawn(async move {
            let mut stream = TcpStream::connect(stream_addr).await.unwrap();
            for i in 0..10 {
                let line = format!("TEMPERATURE|{}.5|14/03/2024 - 09:41\n", 20 + (sender + i) % 10);
                stream.write_all(line.as_bytes()).await.unwrap();
            }
        }));

        let datagram_addr = gw.datagram_addr;
        senders.push(tokio::spawn(async move {
            let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
            for i in 0..10 {
                let record = format!("HUMIDITY|8{}.25|14/03/2024 - 09:41", (sender + i) % 10);
                socket.send_to(record.as_bytes(), datagram_addr).await.unwrap();
                tokio::task::yield_now().await;
            }
        }));
    }
    for sender in senders {
        sender.await.unwrap();
    }

    gw.wait_for(SensorKind::Temperature, 100).await;
    gw.wait_for(SensorKind::Humidity, 100).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(gw.aggregate.len(SensorKind::Temperature), 100);
    assert_eq!(gw.aggregate.len(SensorKind::Humidity), 100);
    gw.stop().await;
}

#[tokio::test]
async fn humidity_at_or_below_threshold_is_never_stored() {
    let gw = RunningGateway::start().await;

    let page = http_get(gw.report_addr, "/gethumidity").await;
    assert!(page.contains("No humidity data available"));

    let link = DatagramLink::bind(gw.datagram_addr.to_string()).await.unwrap();
    let mut producer = Producer::humidity(link, Arc::new(FakeEventSink::new()))
        .with_sampler(ScriptedSampler::new([80.0, 42.0, 85.125, 79.99, 88.0]));
    let ticks = [
        producer.tick().await,
        producer.tick().await,
        producer.tick().await,
        producer.tick().await,
        producer.tick().await,
    ];
    assert_eq!(ticks.iter().filter(|t| **t == Tick::Sent).count(), 2);

    gw.wait_for(SensorKind::Humidity, 2).await;
    let values: Vec<f64> = gw.aggregate.humidity_history().iter().map(|r| r.value).collect();
    assert_eq!(values, vec![85.125, 88.0]);
    assert_eq!(gw.aggregate.last_humidity().map(|r| r.value), Some(88.0));

    let page = http_get(gw.report_addr, "/gethumidity").await;
    assert!(page.contains("Last Humidity Value: 88.00"), "{page}");
    gw.stop().await;
}

#[tokio::test]
async fn malformed_records_do_not_stop_ingest() {
    let gw = RunningGateway::start().await;

    let udp = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    udp.send_to(b"GARBAGE", gw.datagram_addr).await.unwrap();
    udp.send_to(b"HUMIDITY|wet|ts", gw.datagram_addr).await.unwrap();

    let mut tcp = TcpStream::connect(gw.stream_addr).await.unwrap();
    tcp.write_all(b"TEMPERATURE|notanumber|ts\nGARBAGE\nTEMPERATURE|23.5|ts\n")
        .await
        .unwrap();
    udp.send_to(b"HUMIDITY|81.5|ts", gw.datagram_addr).await.unwrap();

    gw.wait_for(SensorKind::Temperature, 1).await;
    gw.wait_for(SensorKind::Humidity, 1).await;
    assert_eq!(gw.aggregate.temperature_history()[0].value, 23.5);
    assert_eq!(gw.aggregate.humidity_history()[0].value, 81.5);

    let dropped = gw
        .events
        .on(Channel::Gateway)
        .into_iter()
        .filter(|e| e.message.contains("Dropped malformed"))
        .count();
    assert_eq!(dropped, 4);
    gw.stop().await;
}

#[tokio::test]
async fn temperature_page_shows_readings_in_order() {
    let gw = RunningGateway::start().await;

    let mut tcp = TcpStream::connect(gw.stream_addr).await.unwrap();
    tcp.write_all(b"TEMPERATURE|23.50|10:00\nTEMPERATURE|24.10|10:01\n")
        .await
        .unwrap();
    gw.wait_for(SensorKind::Temperature, 2).await;

    let page = http_get(gw.report_addr, "/temperature").await;
    let first = page.find("Temperature: 23.50").expect("first reading missing");
    let second = page.find("Temperature: 24.10").expect("second reading missing");
    assert!(first < second);

    let missing = http_get(gw.report_addr, "/nowhere").await;
    assert!(missing.starts_with("HTTP/1.1 404"));
    assert!(missing.contains("<h1>404 Not Found</h1>"));
    gw.stop().await;
}

#[tokio::test]
async fn stream_producer_reconnects_when_gateway_starts_late() {
    let placeholder = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let stream_addr = placeholder.local_addr().unwrap();
    drop(placeholder);

    let mut producer = Producer::temperature(
        StreamLink::new(stream_addr.to_string()),
        Arc::new(FakeEventSink::new()),
    )
    .with_sampler(ScriptedSampler::new([21.0, 22.5]));
    assert_eq!(producer.tick().await, Tick::Failed);

    let gw = RunningGateway::start_with(GatewayConfig {
        stream_addr: stream_addr.to_string(),
        ..GatewayConfig::loopback_ephemeral()
    })
    .await;
    assert_eq!(producer.tick().await, Tick::Sent);

    gw.wait_for(SensorKind::Temperature, 1).await;
    assert_eq!(gw.aggregate.temperature_history()[0].value, 22.5);
    assert_eq!(producer.sent().len(), 1);
    gw.stop().await;
}
