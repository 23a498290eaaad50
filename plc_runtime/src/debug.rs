//! Debug attach: TCP line protocol for pausing and resuming the cycle.
//!
//! ```text
//! > status
//! < ok running cycles=1200 overruns=0 skipped=0
//! > pause
//! < ok paused
//! > resume
//! < ok running
//! ```
//!
//! The listener runs on its own thread with a current-thread tokio runtime;
//! the cycle thread is only reached through [`SchedulerHandle`]. One client
//! is served at a time. If a client that paused the loop goes away, the loop
//! is resumed. Idle clients are dropped after the timeout.

use std::io;
use std::net::SocketAddr;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::runtime::{Builder, Runtime};
use tokio::sync::watch;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::cycle::{SchedulerHandle, SchedulerState};

const STATE_POLL: Duration = Duration::from_millis(2);

/// Running debug listener. Stops when dropped.
#[derive(Debug)]
pub struct DebugServer {
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    thread: Option<JoinHandle<()>>,
}

impl DebugServer {
    /// Bind `addr` and serve clients on a background thread.
    ///
    /// Bind errors are returned here, before the thread starts.
    pub fn spawn<A: ToSocketAddrs>(
        addr: A,
        timeout: Duration,
        handle: SchedulerHandle,
    ) -> io::Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        let listener = runtime.block_on(TcpListener::bind(addr))?;
        let local_addr = listener.local_addr()?;
        let (shutdown, shutdown_rx) = watch::channel(false);

        let thread = thread::Builder::new()
            .name("debug-attach".into())
            .spawn(move || serve(runtime, listener, timeout, handle, shutdown_rx))?;

        info!(addr = %local_addr, "debug attach listening");
        Ok(Self {
            local_addr,
            shutdown,
            thread: Some(thread),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Disconnect any client, stop accepting and wait for the thread.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.shutdown.send_replace(true);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for DebugServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn serve(
    runtime: Runtime,
    listener: TcpListener,
    timeout: Duration,
    handle: SchedulerHandle,
    shutdown: watch::Receiver<bool>,
) {
    runtime.block_on(accept_loop(listener, timeout, handle, shutdown));
    debug!("debug attach listener stopped");
}

async fn accept_loop(
    listener: TcpListener,
    timeout: Duration,
    handle: SchedulerHandle,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let accepted = tokio::select! {
            _ = shutdown.wait_for(|stop| *stop) => return,
            accepted = listener.accept() => accepted,
        };
        match accepted {
            Ok((stream, peer)) => {
                info!(%peer, "debug client attached");
                if let Err(e) = serve_client(stream, timeout, &handle, &mut shutdown).await {
                    debug!(%peer, error = %e, "debug client I/O error");
                }
                info!(%peer, "debug client detached");
            }
            Err(e) => {
                warn!(error = %e, "debug attach accept failed");
            }
        }
    }
}

async fn serve_client(
    stream: TcpStream,
    timeout: Duration,
    handle: &SchedulerHandle,
    shutdown: &mut watch::Receiver<bool>,
) -> io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();
    let mut session = Session {
        handle,
        timeout,
        paused_by_client: false,
    };

    let mut result = send(&mut writer, &format!("ok {}", handle.state())).await;
    if result.is_ok() {
        result = run_session(&mut lines, &mut writer, &mut session, shutdown).await;
    }
    session.release();
    result
}

async fn run_session(
    lines: &mut Lines<BufReader<OwnedReadHalf>>,
    writer: &mut OwnedWriteHalf,
    session: &mut Session<'_>,
    shutdown: &mut watch::Receiver<bool>,
) -> io::Result<()> {
    loop {
        let next = tokio::select! {
            _ = shutdown.wait_for(|stop| *stop) => {
                let _ = send(writer, "err server shutting down").await;
                return Ok(());
            }
            next = time::timeout(session.timeout, lines.next_line()) => next,
        };
        let line = match next {
            Ok(line) => line?,
            Err(_elapsed) => {
                info!("debug client idle, disconnecting");
                send(writer, "err idle timeout").await?;
                return Ok(());
            }
        };
        let Some(line) = line else {
            return Ok(());
        };

        let command = line.trim();
        if command.is_empty() {
            continue;
        }
        if command.eq_ignore_ascii_case("quit") {
            send(writer, "ok bye").await?;
            return Ok(());
        }
        let reply = session.execute(command).await;
        send(writer, &reply).await?;
    }
}

async fn send(writer: &mut OwnedWriteHalf, line: &str) -> io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await
}

struct Session<'a> {
    handle: &'a SchedulerHandle,
    timeout: Duration,
    paused_by_client: bool,
}

impl Session<'_> {
    async fn execute(&mut self, command: &str) -> String {
        match command.to_ascii_lowercase().as_str() {
            "pause" => self.pause().await,
            "resume" => self.resume().await,
            "status" => {
                let s = self.handle.status();
                format!(
                    "ok {} cycles={} overruns={} skipped={}",
                    s.state, s.cycles, s.overruns, s.skipped
                )
            }
            "help" => "ok commands: pause resume status help quit".to_string(),
            other => format!("err unknown command '{other}'"),
        }
    }

    async fn pause(&mut self) -> String {
        match self.handle.state() {
            SchedulerState::Paused => return "ok paused".to_string(),
            SchedulerState::Running => {}
            state => return format!("err cannot pause while {state}"),
        }
        if self.handle.pause().is_err() {
            return "err scheduler gone".to_string();
        }
        self.paused_by_client = true;
        if self.wait_for(SchedulerState::Paused).await {
            info!("loop paused by debug client");
            "ok paused".to_string()
        } else {
            format!("err pause not acknowledged, state {}", self.handle.state())
        }
    }

    async fn resume(&mut self) -> String {
        match self.handle.state() {
            SchedulerState::Running => return "ok running".to_string(),
            SchedulerState::Paused => {}
            state => return format!("err cannot resume while {state}"),
        }
        if self.handle.resume().is_err() {
            return "err scheduler gone".to_string();
        }
        self.paused_by_client = false;
        if self.wait_for(SchedulerState::Running).await {
            info!("loop resumed by debug client");
            "ok running".to_string()
        } else {
            format!("err resume not acknowledged, state {}", self.handle.state())
        }
    }

    /// Wait for the cycle thread to reach `want` at a cycle boundary.
    async fn wait_for(&self, want: SchedulerState) -> bool {
        let deadline = Instant::now() + self.timeout;
        loop {
            let state = self.handle.state();
            if state == want {
                return true;
            }
            if state == SchedulerState::Stopped || Instant::now() >= deadline {
                return false;
            }
            time::sleep(STATE_POLL).await;
        }
    }

    /// Never leave the loop paused behind a vanished client.
    fn release(&mut self) {
        if self.paused_by_client && self.handle.state() == SchedulerState::Paused {
            info!("debug client left while paused, resuming loop");
            let _ = self.handle.resume();
        }
        self.paused_by_client = false;
    }
}
