//! Per-socket HTTP server
//!
//! One polling loop drives every socket through its lifecycle:
//!
//! | status      | action                                               |
//! |-------------|------------------------------------------------------|
//! | Closed      | open on the server port, then listen                 |
//! | Listen      | wait for a client                                    |
//! | Established | drain the request, send the response, disconnect     |
//! | Close-Wait  | close                                                |
//! | teardown    | close once the cleanup timeout expires               |
//!
//! The action is chosen from the current status every cycle; status changes
//! are only logged.

use netstack_hal::{TickClock, Ticks};

use super::{SocketDriver, SocketId, SocketStatus};
use crate::config::{NetConfig, ServerConfig, SOCKET_COUNT, SPI_MAX_XFER};
use crate::fault::{fault, Fault};
use crate::logger::LogQueue;

const LOG_LABEL: &str = "NET:";

/// Server bookkeeping for one socket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SocketEntry {
    pub index: SocketId,
    /// `None` until the first poll
    pub last_status: Option<SocketStatus>,
    /// Start of the current wait for request data
    pub idle_since: Ticks,
    pub request_seen: bool,
    /// When the server started a graceful disconnect
    pub disconnect_at: Option<Ticks>,
}

impl SocketEntry {
    pub const fn new(index: SocketId) -> Self {
        Self {
            index,
            last_status: None,
            idle_since: 0,
            request_seen: false,
            disconnect_at: None,
        }
    }
}

pub struct SocketServer<D, C, const N: usize = SOCKET_COUNT> {
    driver: D,
    clock: C,
    config: ServerConfig,
    log: &'static LogQueue,
    sockets: [SocketEntry; N],
    rx_buf: [u8; SPI_MAX_XFER],
}

impl<D, C, const N: usize> SocketServer<D, C, N>
where
    D: SocketDriver,
    C: TickClock,
{
    /// Serve sockets `0..N`
    pub fn new(driver: D, clock: C, config: ServerConfig, log: &'static LogQueue) -> Self {
        Self {
            driver,
            clock,
            config,
            log,
            sockets: core::array::from_fn(|i| SocketEntry::new(i as SocketId)),
            rx_buf: [0; SPI_MAX_XFER],
        }
    }

    /// Program the static network configuration and verify it took
    ///
    /// A readback that differs from `net` in any byte is fatal.
    pub async fn configure_network(&mut self, net: &NetConfig) {
        if let Err(e) = self.driver.set_net_info(net).await {
            warn!("net: setting network info failed: {}", e);
        }

        match self.driver.net_info().await {
            Ok(read) if read == *net => {
                info!(
                    "net: static address {}.{}.{}.{}",
                    net.ip[0],
                    net.ip[1],
                    net.ip[2],
                    net.ip[3]
                );
            }
            _ => fault(Fault::NetConfigMismatch),
        }
    }

    /// Poll every socket forever
    pub async fn run(&mut self) -> ! {
        loop {
            self.poll().await;
            self.clock.delay(self.config.poll_interval).await;
        }
    }

    /// One service cycle over all sockets
    pub async fn poll(&mut self) {
        for i in 0..N {
            self.service(i).await;
        }
    }

    pub fn sockets(&self) -> &[SocketEntry; N] {
        &self.sockets
    }

    async fn service(&mut self, i: usize) {
        let sn = self.sockets[i].index;
        let status = match self.driver.status(sn).await {
            Ok(status) => status,
            Err(e) => {
                warn!("net: socket {} status read failed: {}", sn, e);
                return;
            }
        };
        self.track_status(i, status);

        match status {
            SocketStatus::Closed => {
                self.reset_entry(i);
                self.open_and_listen(sn).await;
            }
            SocketStatus::Listen => self.reset_entry(i),
            // Already told to go away; the peer has not acknowledged yet
            SocketStatus::Established if self.sockets[i].disconnect_at.is_some() => {
                self.check_cleanup(i).await;
            }
            SocketStatus::Established => self.serve(i).await,
            SocketStatus::CloseWait => self.force_close(i).await,
            _ => self.check_cleanup(i).await,
        }
    }

    fn track_status(&mut self, i: usize, status: SocketStatus) {
        let entry = &mut self.sockets[i];
        if entry.last_status == Some(status) {
            return;
        }
        entry.last_status = Some(status);

        debug!("net: socket {} status {}", entry.index, status.raw());
        self.log.log_str(LOG_LABEL, "SOCK STATUS CHANGE");
        self.log.log_hex(LOG_LABEL, &[entry.index, status.raw()]);
    }

    fn reset_entry(&mut self, i: usize) {
        let entry = &mut self.sockets[i];
        entry.request_seen = false;
        entry.disconnect_at = None;
    }

    async fn open_and_listen(&mut self, sn: SocketId) {
        if let Err(e) = self.driver.open(sn, self.config.port).await {
            warn!("net: socket {} open failed: {}", sn, e);
            self.log.log_str(LOG_LABEL, "socket() FAIL");
            return;
        }

        if let Err(e) = self.driver.listen(sn).await {
            warn!("net: socket {} listen failed: {}", sn, e);
            self.log.log_str(LOG_LABEL, "listen() FAIL");
            self.close_socket(sn).await;
        }
    }

    /// Drain the request, then answer and disconnect
    async fn serve(&mut self, i: usize) {
        let sn = self.sockets[i].index;
        self.sockets[i].idle_since = self.clock.now();
        self.sockets[i].request_seen = false;

        loop {
            match self.driver.status(sn).await {
                Ok(SocketStatus::Established) => {}
                _ => break,
            }

            let available = match self.driver.rx_available(sn).await {
                Ok(n) => n,
                Err(_) => break,
            };

            if available > 0 {
                self.sockets[i].request_seen = true;
                match self.driver.recv(sn, &mut self.rx_buf).await {
                    Ok(n) if n > 0 => continue,
                    _ => break,
                }
            }

            if self.sockets[i].request_seen {
                break;
            }

            let idle_since = self.sockets[i].idle_since;
            if self.clock.elapsed_since(idle_since) >= self.config.rx_idle_timeout {
                self.log.log_str(LOG_LABEL, "RX IDLE TIMEOUT");
                self.disconnect(i).await;
                return;
            }

            self.clock.delay(1).await;
        }

        if !matches!(self.driver.status(sn).await, Ok(SocketStatus::Established)) {
            return;
        }

        match self.driver.send(sn, self.config.response).await {
            // TODO: loop on a short send once responses can exceed the socket TX buffer
            Ok(_) => self.disconnect(i).await,
            Err(e) => {
                warn!("net: socket {} send failed: {}", sn, e);
                self.log.log_str(LOG_LABEL, "send() FAIL");
                self.force_close(i).await;
            }
        }
    }

    async fn disconnect(&mut self, i: usize) {
        let sn = self.sockets[i].index;
        if let Err(e) = self.driver.disconnect(sn).await {
            warn!("net: socket {} disconnect failed: {}", sn, e);
            self.force_close(i).await;
            return;
        }
        self.sockets[i].disconnect_at = Some(self.clock.now());
    }

    async fn force_close(&mut self, i: usize) {
        self.close_socket(self.sockets[i].index).await;
        self.reset_entry(i);
    }

    async fn close_socket(&mut self, sn: SocketId) {
        if let Err(e) = self.driver.close(sn).await {
            warn!("net: socket {} close failed: {}", sn, e);
            self.log.log_str(LOG_LABEL, "close() FAIL");
        }
    }

    /// Close a socket stuck tearing down after our disconnect
    async fn check_cleanup(&mut self, i: usize) {
        let Some(at) = self.sockets[i].disconnect_at else {
            return;
        };
        if self.clock.elapsed_since(at) >= self.config.cleanup_timeout {
            self.log.log_str(LOG_LABEL, "CLEANUP TIMEOUT");
            self.force_close(i).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HTTP_RESPONSE;
    use crate::error::SocketError;
    use crate::logger::{LogKind, LogRecord};
    use crate::mock::{leaked_log, FakeClock};
    use embassy_futures::block_on;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq)]
    enum Op {
        Open(u16),
        Listen,
        Disconnect,
        Close,
        Send(Vec<u8>),
        Recv(usize),
    }

    struct FakeSocket {
        status: SocketStatus,
        rx: VecDeque<u8>,
        ops: Vec<Op>,
        fail_open: bool,
        fail_listen: bool,
        fail_send: bool,
        fail_close: bool,
    }

    impl Default for FakeSocket {
        fn default() -> Self {
            Self {
                status: SocketStatus::Closed,
                rx: VecDeque::new(),
                ops: Vec::new(),
                fail_open: false,
                fail_listen: false,
                fail_send: false,
                fail_close: false,
            }
        }
    }

    #[derive(Default)]
    struct FakeState {
        sockets: [FakeSocket; 4],
        net: Option<NetConfig>,
        corrupt_readback: bool,
    }

    /// Scripted socket API; tests move sockets between states by hand
    #[derive(Clone, Default)]
    struct FakeSockets(Rc<RefCell<FakeState>>);

    impl FakeSockets {
        fn socket(&self, sn: u8) -> std::cell::RefMut<'_, FakeSocket> {
            std::cell::RefMut::map(self.0.borrow_mut(), |s| &mut s.sockets[usize::from(sn)])
        }

        fn ops(&self, sn: u8) -> Vec<Op> {
            self.0.borrow().sockets[usize::from(sn)].ops.clone()
        }
    }

    impl SocketDriver for FakeSockets {
        async fn open(&mut self, sn: SocketId, port: u16) -> Result<(), SocketError> {
            let mut s = self.socket(sn);
            s.ops.push(Op::Open(port));
            if s.fail_open {
                return Err(SocketError::NotReady);
            }
            s.status = SocketStatus::Init;
            Ok(())
        }

        async fn listen(&mut self, sn: SocketId) -> Result<(), SocketError> {
            let mut s = self.socket(sn);
            s.ops.push(Op::Listen);
            if s.fail_listen {
                return Err(SocketError::ListenFailed);
            }
            s.status = SocketStatus::Listen;
            Ok(())
        }

        async fn disconnect(&mut self, sn: SocketId) -> Result<(), SocketError> {
            let mut s = self.socket(sn);
            s.ops.push(Op::Disconnect);
            s.status = SocketStatus::FinWait;
            Ok(())
        }

        async fn close(&mut self, sn: SocketId) -> Result<(), SocketError> {
            let mut s = self.socket(sn);
            s.ops.push(Op::Close);
            if s.fail_close {
                return Err(SocketError::CommandTimeout);
            }
            s.status = SocketStatus::Closed;
            Ok(())
        }

        async fn send(&mut self, sn: SocketId, data: &[u8]) -> Result<usize, SocketError> {
            let mut s = self.socket(sn);
            if s.fail_send {
                return Err(SocketError::SendTimeout);
            }
            s.ops.push(Op::Send(data.to_vec()));
            Ok(data.len())
        }

        async fn recv(&mut self, sn: SocketId, buf: &mut [u8]) -> Result<usize, SocketError> {
            let mut s = self.socket(sn);
            let n = s.rx.len().min(buf.len());
            for (dst, src) in buf.iter_mut().zip(s.rx.drain(..n)) {
                *dst = src;
            }
            s.ops.push(Op::Recv(n));
            Ok(n)
        }

        async fn status(&mut self, sn: SocketId) -> Result<SocketStatus, SocketError> {
            Ok(self.socket(sn).status)
        }

        async fn rx_available(&mut self, sn: SocketId) -> Result<u16, SocketError> {
            Ok(self.socket(sn).rx.len() as u16)
        }

        async fn set_net_info(&mut self, config: &NetConfig) -> Result<(), SocketError> {
            self.0.borrow_mut().net = Some(*config);
            Ok(())
        }

        async fn net_info(&mut self) -> Result<NetConfig, SocketError> {
            let state = self.0.borrow();
            let mut net = state.net.ok_or(SocketError::NotReady)?;
            if state.corrupt_readback {
                net.gateway[3] ^= 0xFF;
            }
            Ok(net)
        }
    }

    struct Rig {
        chip: FakeSockets,
        log: &'static LogQueue,
        clock: &'static FakeClock,
        server: SocketServer<FakeSockets, &'static FakeClock>,
    }

    fn rig() -> Rig {
        let chip = FakeSockets::default();
        let log = leaked_log();
        let clock: &'static FakeClock = Box::leak(Box::new(FakeClock::new()));
        let server = SocketServer::new(chip.clone(), clock, ServerConfig::default(), log);
        Rig {
            chip,
            log,
            clock,
            server,
        }
    }

    fn drain_log(log: &LogQueue) -> Vec<LogRecord> {
        core::iter::from_fn(|| log.try_dequeue()).collect()
    }

    fn messages(records: &[LogRecord]) -> Vec<String> {
        records
            .iter()
            .filter(|r| r.kind() == LogKind::String)
            .map(|r| String::from_utf8_lossy(r.payload()).into_owned())
            .collect()
    }

    #[test]
    fn test_closed_sockets_are_opened_and_listening() {
        let mut r = rig();
        block_on(r.server.poll());

        for sn in 0..4 {
            assert_eq!(r.chip.ops(sn), vec![Op::Open(8080), Op::Listen]);
            assert_eq!(r.chip.socket(sn).status, SocketStatus::Listen);
        }
    }

    #[test]
    fn test_request_is_answered_then_socket_recycled() {
        let mut r = rig();
        block_on(r.server.poll());

        // A client connects on socket 1 and sends a request
        {
            let mut s = r.chip.socket(1);
            s.status = SocketStatus::Established;
            s.rx.extend(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n".iter());
            s.ops.clear();
        }
        block_on(r.server.poll());

        assert_eq!(
            r.chip.ops(1),
            vec![
                Op::Recv(27),
                Op::Send(HTTP_RESPONSE.to_vec()),
                Op::Disconnect
            ]
        );
        assert_eq!(r.chip.socket(1).status, SocketStatus::FinWait);
        assert!(r.server.sockets()[1].request_seen);
        assert!(r.server.sockets()[1].disconnect_at.is_some());

        // The peer acknowledges the FIN
        r.chip.socket(1).status = SocketStatus::Closed;
        r.chip.socket(1).ops.clear();
        block_on(r.server.poll());

        assert_eq!(r.chip.ops(1), vec![Op::Open(8080), Op::Listen]);
        assert_eq!(r.chip.socket(1).status, SocketStatus::Listen);
        assert_eq!(r.server.sockets()[1].disconnect_at, None);
    }

    #[test]
    fn test_idle_connection_is_dropped_without_response() {
        let mut r = rig();
        block_on(r.server.poll());
        r.chip.socket(0).status = SocketStatus::Established;
        r.chip.socket(0).ops.clear();
        let _ = drain_log(r.log);

        let before = r.clock.peek();
        block_on(r.server.poll());

        assert_eq!(r.chip.ops(0), vec![Op::Disconnect]);
        assert!(r.clock.peek() - before >= 1000);
        assert!(messages(&drain_log(r.log)).contains(&"RX IDLE TIMEOUT".to_string()));
    }

    #[test]
    fn test_status_changes_are_logged() {
        let mut r = rig();
        block_on(r.server.poll());

        let records = drain_log(r.log);
        let hex: Vec<Vec<u8>> = records
            .iter()
            .filter(|r| r.kind() == LogKind::Hex)
            .map(|r| r.payload().to_vec())
            .collect();
        assert_eq!(hex, vec![vec![0, 0x00], vec![1, 0x00], vec![2, 0x00], vec![3, 0x00]]);
        assert!(messages(&records)
            .iter()
            .all(|m| m.as_str() == "SOCK STATUS CHANGE"));

        // Listen is new, then steady
        block_on(r.server.poll());
        assert_eq!(drain_log(r.log).len(), 8);
        block_on(r.server.poll());
        assert!(r.log.is_empty());
    }

    #[test]
    fn test_open_failure_is_logged_and_retried() {
        let mut r = rig();
        r.chip.socket(2).fail_open = true;
        block_on(r.server.poll());
        assert!(messages(&drain_log(r.log)).contains(&"socket() FAIL".to_string()));

        r.chip.socket(2).fail_open = false;
        block_on(r.server.poll());
        assert_eq!(
            r.chip.ops(2),
            vec![Op::Open(8080), Op::Open(8080), Op::Listen]
        );
        assert_eq!(r.chip.socket(2).status, SocketStatus::Listen);
    }

    #[test]
    fn test_listen_failure_closes_socket() {
        let mut r = rig();
        r.chip.socket(3).fail_listen = true;
        block_on(r.server.poll());

        assert_eq!(r.chip.ops(3), vec![Op::Open(8080), Op::Listen, Op::Close]);
        assert_eq!(r.chip.socket(3).status, SocketStatus::Closed);
        assert!(messages(&drain_log(r.log)).contains(&"listen() FAIL".to_string()));
    }

    #[test]
    fn test_close_failure_after_listen_failure_is_logged() {
        let mut r = rig();
        {
            let mut s = r.chip.socket(3);
            s.fail_listen = true;
            s.fail_close = true;
        }
        block_on(r.server.poll());

        assert_eq!(r.chip.ops(3), vec![Op::Open(8080), Op::Listen, Op::Close]);
        let logged = messages(&drain_log(r.log));
        assert!(logged.contains(&"listen() FAIL".to_string()));
        assert!(logged.contains(&"close() FAIL".to_string()));
    }

    #[test]
    fn test_send_failure_force_closes() {
        let mut r = rig();
        block_on(r.server.poll());
        {
            let mut s = r.chip.socket(0);
            s.status = SocketStatus::Established;
            s.rx.extend(b"GET /".iter());
            s.fail_send = true;
            s.ops.clear();
        }
        block_on(r.server.poll());

        assert_eq!(r.chip.ops(0), vec![Op::Recv(5), Op::Close]);
        assert_eq!(r.server.sockets()[0].disconnect_at, None);
        assert!(messages(&drain_log(r.log)).contains(&"send() FAIL".to_string()));
    }

    #[test]
    fn test_close_wait_is_closed() {
        let mut r = rig();
        block_on(r.server.poll());
        r.chip.socket(1).status = SocketStatus::CloseWait;
        r.chip.socket(1).ops.clear();

        block_on(r.server.poll());
        assert_eq!(r.chip.ops(1), vec![Op::Close]);
    }

    #[test]
    fn test_lingering_teardown_is_closed_after_cleanup_timeout() {
        let mut r = rig();
        block_on(r.server.poll());
        r.chip.socket(0).status = SocketStatus::Established;
        block_on(r.server.poll());
        assert_eq!(r.chip.socket(0).status, SocketStatus::FinWait);
        r.chip.socket(0).ops.clear();

        // Still inside the cleanup window
        block_on(r.server.poll());
        assert!(r.chip.ops(0).is_empty());

        block_on(r.clock.delay(250));
        block_on(r.server.poll());
        assert_eq!(r.chip.ops(0), vec![Op::Close]);
        assert!(messages(&drain_log(r.log)).contains(&"CLEANUP TIMEOUT".to_string()));
    }

    #[test]
    fn test_teardown_not_started_by_server_is_left_alone() {
        let mut r = rig();
        block_on(r.server.poll());
        r.chip.socket(2).status = SocketStatus::TimeWait;
        r.chip.socket(2).ops.clear();

        block_on(r.clock.delay(10_000));
        block_on(r.server.poll());
        assert!(r.chip.ops(2).is_empty());
    }

    #[test]
    fn test_configure_network_accepts_matching_readback() {
        let mut r = rig();
        block_on(r.server.configure_network(&NetConfig::default()));
        assert_eq!(r.chip.0.borrow().net, Some(NetConfig::default()));
    }

    #[test]
    #[should_panic(expected = "readback mismatch")]
    fn test_configure_network_mismatch_is_fatal() {
        let mut r = rig();
        r.chip.0.borrow_mut().corrupt_readback = true;
        block_on(r.server.configure_network(&NetConfig::default()));
    }
}
