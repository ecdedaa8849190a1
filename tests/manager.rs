use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use wifi_link::config::Config;
use wifi_link::{
    DeviceConfigSink, DhcpLease, EventDispatcher, EventHandler, EventMask, NetEvent, NetworkStack,
    NoopSink, Request, ScanEntry, SecurityType, StackError, WifiError, WifiManager, WifiStatus,
};

/// What the fake stack does with the next request.
struct Reply {
    result: Result<(), StackError>,
    delay: Duration,
    events: Vec<NetEvent>,
}

impl Reply {
    fn ok_then(delay_ms: u64, events: Vec<NetEvent>) -> Self {
        Reply {
            result: Ok(()),
            delay: Duration::from_millis(delay_ms),
            events,
        }
    }

    fn ok_silent() -> Self {
        Reply::ok_then(0, Vec::new())
    }

    fn err(err: StackError) -> Self {
        Reply {
            result: Err(err),
            delay: Duration::ZERO,
            events: Vec::new(),
        }
    }
}

#[derive(Default)]
struct Inner {
    dispatcher: Arc<EventDispatcher>,
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<Request>>,
}

/// A stack that answers requests from a script, dispatching events from
/// its own thread after a delay.
#[derive(Clone, Default)]
struct FakeStack {
    inner: Arc<Inner>,
}

impl FakeStack {
    fn reply(&self, reply: Reply) -> &Self {
        self.inner.replies.lock().unwrap().push_back(reply);
        self
    }

    /// Events raised by the driver on its own, not in answer to a request.
    fn raise(&self, event: NetEvent) {
        self.inner.dispatcher.dispatch(&event);
    }

    fn requests(&self) -> Vec<Request> {
        self.inner.requests.lock().unwrap().clone()
    }
}

impl NetworkStack for FakeStack {
    fn request(&self, request: Request) -> Result<(), StackError> {
        self.inner.requests.lock().unwrap().push(request);

        let reply = self
            .inner
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(Reply::ok_silent);

        if reply.result.is_ok() && !reply.events.is_empty() {
            let dispatcher = Arc::clone(&self.inner.dispatcher);
            let (delay, events) = (reply.delay, reply.events);
            thread::spawn(move || {
                thread::sleep(delay);
                for event in &events {
                    dispatcher.dispatch(event);
                }
            });
        }

        reply.result
    }

    fn add_event_callback(&self, mask: EventMask, handler: EventHandler) {
        self.inner.dispatcher.add_callback(mask, handler);
    }
}

#[derive(Clone, Default)]
struct RecordingSink {
    calls: Arc<Mutex<Vec<(String, Option<String>, SecurityType)>>>,
}

impl DeviceConfigSink for RecordingSink {
    fn set_wifi_config(&self, ssid: &str, psk: Option<&str>, security: SecurityType) {
        self.calls
            .lock()
            .unwrap()
            .push((ssid.to_string(), psk.map(String::from), security));
    }
}

fn manager(stack: &FakeStack) -> WifiManager<FakeStack> {
    WifiManager::new(stack.clone(), Box::new(NoopSink))
}

fn lease(a: u8, b: u8, c: u8, d: u8) -> NetEvent {
    NetEvent::DhcpBound(DhcpLease {
        requested_ip: Ipv4Addr::new(a, b, c, d),
    })
}

const SHORT: Duration = Duration::from_millis(150);
const LONG: Duration = Duration::from_secs(5);

#[test]
fn connect_then_result_marks_connected() {
    let stack = FakeStack::default();
    stack.reply(Reply::ok_then(50, vec![NetEvent::ConnectResult(WifiStatus::OK)]));
    let manager = manager(&stack);

    manager
        .connect("MySSID", Some("password123"), SecurityType::Psk)
        .unwrap();
    assert!(manager.is_connecting() || manager.is_connected());

    manager.wait_connecting(LONG).unwrap();
    assert!(!manager.is_connecting());
    assert!(manager.is_connected());
}

#[test]
fn configured_timeout_beyond_the_clock_waits_without_deadline() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[wait]\nconnect_timeout_secs = 9223372036854775807\n").unwrap();
    let cfg = Config::load_from(&path).unwrap();

    let stack = FakeStack::default();
    stack.reply(Reply::ok_then(20, vec![NetEvent::ConnectResult(WifiStatus::OK)]));
    let manager = manager(&stack);

    manager.connect("x", None, SecurityType::None).unwrap();
    manager.wait_connecting(cfg.wait.connect_timeout()).unwrap();
    assert!(manager.is_connected());
}

#[test]
fn failed_connect_result_resolves_wait_but_not_connected() {
    let stack = FakeStack::default();
    stack.reply(Reply::ok_then(20, vec![NetEvent::ConnectResult(WifiStatus::failed(-2))]));
    let manager = manager(&stack);

    manager.connect("Lab", None, SecurityType::None).unwrap();
    manager.wait_connecting(LONG).unwrap();
    assert!(!manager.is_connected());
}

#[test]
fn wait_connecting_times_out_without_result() {
    let stack = FakeStack::default();
    let manager = manager(&stack);

    manager.connect("Silent", Some("pw"), SecurityType::Psk).unwrap();

    let started = Instant::now();
    assert_eq!(manager.wait_connecting(SHORT), Err(WifiError::Timeout(SHORT)));
    assert!(started.elapsed() >= SHORT);
    assert!(manager.is_connecting());
}

#[test]
fn wait_dhcp_resolves_on_lease() {
    let stack = FakeStack::default();
    stack.reply(Reply::ok_then(
        20,
        vec![NetEvent::ConnectResult(WifiStatus::OK), lease(192, 168, 1, 50)],
    ));
    let manager = manager(&stack);

    manager.connect("Home", Some("pw"), SecurityType::Sae).unwrap();
    manager.wait_connecting(LONG).unwrap();
    manager.wait_dhcp(LONG).unwrap();

    assert!(manager.is_dhcp_configured());
    assert_eq!(manager.dhcp_address(), Some(Ipv4Addr::new(192, 168, 1, 50)));
}

#[test]
fn wait_dhcp_times_out_without_lease() {
    let stack = FakeStack::default();
    stack.reply(Reply::ok_then(0, vec![NetEvent::ConnectResult(WifiStatus::OK)]));
    let manager = manager(&stack);

    manager.connect("Home", Some("pw"), SecurityType::Psk).unwrap();
    manager.wait_connecting(LONG).unwrap();
    assert_eq!(manager.wait_dhcp(SHORT), Err(WifiError::Timeout(SHORT)));
}

#[test]
fn timed_out_wait_does_not_poison_the_next() {
    let stack = FakeStack::default();
    let manager = manager(&stack);

    let timeout = Duration::from_millis(30);
    assert_eq!(manager.wait_dhcp(timeout), Err(WifiError::Timeout(timeout)));

    stack.raise(lease(10, 0, 0, 2));
    manager.wait_dhcp(LONG).unwrap();
}

#[test]
fn concurrent_wait_is_rejected() {
    let stack = FakeStack::default();
    let manager = Arc::new(manager(&stack));
    let started = Arc::new(Barrier::new(2));

    let waiter = {
        let manager = Arc::clone(&manager);
        let started = Arc::clone(&started);
        thread::spawn(move || {
            started.wait();
            manager.wait_dhcp(LONG)
        })
    };

    started.wait();
    // Let the waiter take the slot
    thread::sleep(Duration::from_millis(100));
    assert_eq!(manager.wait_connecting(LONG), Err(WifiError::WaitInProgress));

    stack.raise(lease(172, 16, 0, 9));
    assert_eq!(waiter.join().unwrap(), Ok(()));

    // The slot is free again
    manager.wait_connecting(LONG).unwrap();
}

#[test]
fn solicited_disconnect_clears_connected() {
    let stack = FakeStack::default();
    stack
        .reply(Reply::ok_then(0, vec![NetEvent::ConnectResult(WifiStatus::OK)]))
        .reply(Reply::ok_then(20, vec![NetEvent::DisconnectResult(WifiStatus::OK)]));
    let manager = manager(&stack);

    manager.connect("Home", Some("pw"), SecurityType::Psk).unwrap();
    manager.wait_connecting(LONG).unwrap();
    assert!(manager.is_connected());

    manager.disconnect().unwrap();
    manager.wait_disconnecting(LONG).unwrap();
    assert!(!manager.is_disconnecting());
    assert!(!manager.is_connected());
}

#[test]
fn unsolicited_disconnect_leaves_connected_flag() {
    let stack = FakeStack::default();
    stack.reply(Reply::ok_then(0, vec![NetEvent::ConnectResult(WifiStatus::OK)]));
    let manager = manager(&stack);

    manager.connect("Home", Some("pw"), SecurityType::Psk).unwrap();
    manager.wait_connecting(LONG).unwrap();

    stack.raise(NetEvent::DisconnectResult(WifiStatus::OK));
    assert!(manager.is_connected());
}

#[test]
fn disconnect_while_disconnected_succeeds() {
    let stack = FakeStack::default();
    stack.reply(Reply::err(StackError::Already));
    let manager = manager(&stack);

    assert_eq!(manager.disconnect(), Ok(()));
    assert!(!manager.is_disconnecting());
    assert_eq!(stack.requests(), vec![Request::Disconnect]);
}

#[test]
fn scan_counts_results_and_resets_on_done() {
    let stack = FakeStack::default();
    let entry = |ssid: &str, rssi| {
        NetEvent::ScanResult(ScanEntry {
            ssid: ssid.to_string(),
            security: SecurityType::Psk,
            rssi,
            channel: Some(1),
        })
    };
    stack.reply(Reply::ok_then(
        20,
        vec![
            entry("A", -40),
            entry("A", -70),
            entry("B", -80),
            NetEvent::ScanDone(WifiStatus::failed(-1)),
        ],
    ));
    let manager = manager(&stack);

    manager.scan().unwrap();
    manager.wait_scan_done().unwrap();

    assert!(!manager.is_scanning());
    assert_eq!(manager.scan_result_count(), 0);
}

#[test]
fn empty_ssid_issues_no_request() {
    let stack = FakeStack::default();
    let manager = manager(&stack);

    assert!(matches!(
        manager.connect("", None, SecurityType::None),
        Err(WifiError::InvalidArgument(_))
    ));
    assert!(stack.requests().is_empty());
}

#[test]
fn connect_reports_credentials_to_sink() {
    let stack = FakeStack::default();
    let sink = RecordingSink::default();
    let manager = WifiManager::new(stack.clone(), Box::new(sink.clone()));

    manager.connect("Lab", Some("hunter22"), SecurityType::Sae).unwrap();

    assert_eq!(
        *sink.calls.lock().unwrap(),
        vec![("Lab".to_string(), Some("hunter22".to_string()), SecurityType::Sae)]
    );
    assert!(matches!(&stack.requests()[..], [Request::Connect(p)] if p.ssid == "Lab"));
}

#[test]
fn snapshot_reflects_events() {
    let stack = FakeStack::default();
    let manager = manager(&stack);

    stack.raise(NetEvent::ConnectResult(WifiStatus::OK));
    stack.raise(lease(192, 168, 0, 3));

    let state = manager.snapshot();
    assert!(state.wifi_connected);
    assert!(state.dhcp_configured);
    assert_eq!(state.dhcp_address, Some(Ipv4Addr::new(192, 168, 0, 3)));
}
