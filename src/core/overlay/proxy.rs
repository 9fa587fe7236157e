// Copyright (c) 2026 Bitmesh
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Proxy lifecycle state machine and fail-closed readiness gate
//! (spec §4.5.1).
//!
//! ```text
//! Off ──startIfNeeded──▶ Starting
//! Starting ──socksProbe=ok──▶ SocksUp
//! SocksUp ──bootstrapPoll(progress=100)──▶ Bootstrapped
//! Bootstrapped ──pathChange/timeout/restart──▶ Starting
//! Any ──goDormant──▶ Dormant ──ensureRunning──▶ Starting
//! Starting ──timeout──▶ Failed ──startIfNeeded──▶ Starting
//! ```

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::core::error::CoreError;

/// SOCKS probe per-attempt timeout.
const SOCKS_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(1);
/// SOCKS probe poll interval.
const SOCKS_POLL_INTERVAL: Duration = Duration::from_millis(250);
/// SOCKS probe overall deadline.
const SOCKS_OVERALL_DEADLINE: Duration = Duration::from_secs(60);

/// Bootstrap poll per-iteration timeout.
const BOOTSTRAP_ITERATION_TIMEOUT: Duration = Duration::from_secs(2);
/// Bootstrap poll interval.
const BOOTSTRAP_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Bootstrap poll overall deadline.
const BOOTSTRAP_OVERALL_DEADLINE: Duration = Duration::from_secs(75);
/// Control-channel command timeout.
const CONTROL_COMMAND_TIMEOUT: Duration = Duration::from_secs(3);
/// Grace period for SOCKS to fall during a forced restart.
const RESTART_SETTLE_DEADLINE: Duration = Duration::from_secs(5);

/// Proxy lifecycle states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProxyState {
    /// Not started.
    Off,
    /// Process launching, SOCKS not yet confirmed.
    Starting,
    /// SOCKS entry point accepts connections; bootstrap not yet complete.
    SocksUp,
    /// Fully bootstrapped; overlay I/O is permitted.
    Bootstrapped,
    /// Deliberately suspended (e.g. app backgrounded).
    Dormant,
    /// Startup failed; awaiting a fresh `startIfNeeded`.
    Failed,
}

/// Bootstrap/control errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProxyError {
    /// SOCKS did not come up within the overall deadline.
    #[error("socks probe timed out")]
    SocksProbeTimeout,
    /// Bootstrap did not reach 100% within the overall deadline.
    #[error("bootstrap poll timed out")]
    BootstrapTimeout,
    /// The control channel could not be reached or authenticated.
    #[error("control channel error")]
    ControlChannel,
}

impl From<ProxyError> for CoreError {
    fn from(e: ProxyError) -> Self {
        match e {
            ProxyError::BootstrapTimeout => CoreError::ProxyBootstrapTimeout,
            _ => CoreError::TransportUnavailable,
        }
    }
}

/// Owns the proxy's lifecycle state and publishes readiness to subscribers
/// (spec §5: "Proxy state: owned by the proxy component; readers observe
/// via a published readiness flag.").
pub struct ProxyManager {
    state: Mutex<ProxyState>,
    dev_clearnet_build: bool,
    ready_tx: watch::Sender<bool>,
}

impl ProxyManager {
    /// Build a manager. `dev_clearnet_build` mirrors the `dev-clearnet`
    /// Cargo feature: when true the readiness gate is bypassed, matching
    /// the spec's `devClearnetBuild` escape hatch for local development.
    pub fn new(dev_clearnet_build: bool) -> Self {
        let (ready_tx, _ready_rx) = watch::channel(dev_clearnet_build);
        Self {
            state: Mutex::new(ProxyState::Off),
            dev_clearnet_build,
            ready_tx,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ProxyState {
        *self.state.lock().expect("proxy state mutex poisoned")
    }

    /// The fail-closed readiness gate: every overlay send and outbound
    /// connection must check this before doing any network I/O.
    pub fn network_permitted(&self) -> bool {
        self.dev_clearnet_build || self.state() == ProxyState::Bootstrapped
    }

    /// Subscribe to readiness-flag changes.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.ready_tx.subscribe()
    }

    fn transition(&self, new: ProxyState) {
        {
            let mut state = self.state.lock().expect("proxy state mutex poisoned");
            debug!(from = ?*state, to = ?new, "proxy state transition");
            *state = new;
        }
        let permitted = self.network_permitted();
        let _ = self.ready_tx.send_if_modified(|current| {
            if *current != permitted {
                *current = permitted;
                true
            } else {
                false
            }
        });
    }

    /// `startIfNeeded`: from `Off`/`Failed`/`Dormant`, begin starting.
    pub fn start_if_needed(&self) {
        let cur = self.state();
        if matches!(cur, ProxyState::Off | ProxyState::Failed | ProxyState::Dormant) {
            self.transition(ProxyState::Starting);
        }
    }

    /// `goDormant`: suspend from any state.
    pub fn go_dormant(&self) {
        self.transition(ProxyState::Dormant);
    }

    /// `ensureRunning`: from `Dormant`, resume starting.
    pub fn ensure_running(&self) {
        if self.state() == ProxyState::Dormant {
            self.transition(ProxyState::Starting);
        }
    }

    /// Path-change, timeout, or explicit restart from `Bootstrapped` drops
    /// back to `Starting`.
    pub fn restart(&self) {
        if self.state() == ProxyState::Bootstrapped {
            self.transition(ProxyState::Starting);
        }
    }

    /// Probe the loopback SOCKS port until it accepts a connection or the
    /// overall deadline elapses, transitioning `Starting` -> `SocksUp` on
    /// success and `Starting` -> `Failed` on timeout.
    pub async fn socks_probe(&self, socks_addr: &str) -> Result<(), ProxyError> {
        let deadline = tokio::time::Instant::now() + SOCKS_OVERALL_DEADLINE;
        loop {
            if tokio::time::Instant::now() >= deadline {
                self.transition(ProxyState::Failed);
                return Err(ProxyError::SocksProbeTimeout);
            }
            let attempt = timeout(SOCKS_ATTEMPT_TIMEOUT, TcpStream::connect(socks_addr)).await;
            if let Ok(Ok(_stream)) = attempt {
                self.transition(ProxyState::SocksUp);
                return Ok(());
            }
            tokio::time::sleep(SOCKS_POLL_INTERVAL).await;
        }
    }

    /// Poll the control channel's bootstrap phase until it reaches 100% or
    /// the overall deadline elapses, transitioning `SocksUp` -> `Bootstrapped`
    /// on success.
    pub async fn bootstrap_poll(&self, control_addr: &str, data_dir: &Path) -> Result<(), ProxyError> {
        let cookie = read_control_cookie(data_dir).map_err(|_| ProxyError::ControlChannel)?;
        let deadline = tokio::time::Instant::now() + BOOTSTRAP_OVERALL_DEADLINE;

        loop {
            if tokio::time::Instant::now() >= deadline {
                self.transition(ProxyState::Failed);
                return Err(ProxyError::BootstrapTimeout);
            }

            match timeout(BOOTSTRAP_ITERATION_TIMEOUT, query_bootstrap_progress(control_addr, &cookie)).await {
                Ok(Ok(progress)) if progress >= 100 => {
                    self.transition(ProxyState::Bootstrapped);
                    return Ok(());
                }
                Ok(Ok(progress)) => {
                    debug!(progress, "bootstrap progress");
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "control channel query failed");
                }
                Err(_) => {
                    warn!("control channel query timed out");
                }
            }

            tokio::time::sleep(BOOTSTRAP_POLL_INTERVAL).await;
        }
    }

    /// Foreground recovery: on path-change or app-foreground, try an
    /// `ACTIVE` signal; if the control channel is unresponsive and SOCKS is
    /// also down, force a restart.
    pub async fn foreground_recovery(&self, control_addr: &str, data_dir: &Path, socks_addr: &str) {
        let cookie = match read_control_cookie(data_dir) {
            Ok(c) => c,
            Err(_) => {
                self.force_restart(socks_addr).await;
                return;
            }
        };

        if timeout(CONTROL_COMMAND_TIMEOUT, send_control_command(control_addr, &cookie, "SIGNAL ACTIVE"))
            .await
            .is_ok()
        {
            return;
        }

        if timeout(SOCKS_ATTEMPT_TIMEOUT, TcpStream::connect(socks_addr)).await.is_err() {
            self.force_restart(socks_addr).await;
        }
    }

    async fn force_restart(&self, socks_addr: &str) {
        self.transition(ProxyState::Starting);
        let deadline = tokio::time::Instant::now() + RESTART_SETTLE_DEADLINE;
        while tokio::time::Instant::now() < deadline {
            if TcpStream::connect(socks_addr).await.is_err() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    }
}

fn read_control_cookie(data_dir: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(data_dir.join("control_auth_cookie"))?;
    Ok(hex::encode(bytes))
}

async fn send_control_command(control_addr: &str, cookie_hex: &str, command: &str) -> Result<String, ProxyError> {
    let mut stream = TcpStream::connect(control_addr)
        .await
        .map_err(|_| ProxyError::ControlChannel)?;
    stream
        .write_all(format!("AUTHENTICATE {cookie_hex}\r\n").as_bytes())
        .await
        .map_err(|_| ProxyError::ControlChannel)?;
    let mut buf = [0u8; 256];
    let _ = stream.read(&mut buf).await.map_err(|_| ProxyError::ControlChannel)?;

    stream
        .write_all(format!("{command}\r\n").as_bytes())
        .await
        .map_err(|_| ProxyError::ControlChannel)?;
    let n = stream.read(&mut buf).await.map_err(|_| ProxyError::ControlChannel)?;
    Ok(String::from_utf8_lossy(&buf[..n]).into_owned())
}

async fn query_bootstrap_progress(control_addr: &str, cookie_hex: &str) -> Result<u32, ProxyError> {
    let response = send_control_command(control_addr, cookie_hex, "GETINFO status/bootstrap-phase").await?;
    parse_bootstrap_progress(&response).ok_or(ProxyError::ControlChannel)
}

fn parse_bootstrap_progress(line: &str) -> Option<u32> {
    let marker = "PROGRESS=";
    let start = line.find(marker)? + marker.len();
    let rest = &line[start..];
    let end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    rest[..end].parse().ok()
}
