// Shared test helpers: scripted remote shell, recording sink, captured outputs
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use rpiwatch::commands;
use rpiwatch::device::{DeviceSettings, ShellFactory};
use rpiwatch::error::{SessionError, SinkError};
use rpiwatch::models::*;
use rpiwatch::session::{ExecOutput, RemoteShell};
use rpiwatch::sink::DeviceSink;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const CPU_INFO: &str = "processor\t: 0
model name\t: ARMv7 Processor rev 3 (v7l)
BogoMIPS\t: 108.00

processor\t: 1
model name\t: ARMv7 Processor rev 3 (v7l)

processor\t: 2
model name\t: ARMv7 Processor rev 3 (v7l)

processor\t: 3
model name\t: ARMv7 Processor rev 3 (v7l)

Hardware\t: BCM2711
Revision\t: c03111
Serial\t\t: 10000000a3c2b8f1
Model\t\t: Raspberry Pi 4 Model B Rev 1.1
";

pub const OS_RELEASE: &str = r#"PRETTY_NAME="Raspbian GNU/Linux 10 (buster)"
NAME="Raspbian GNU/Linux"
VERSION_ID="10"
VERSION="10 (buster)"
VERSION_CODENAME=buster
ID=raspbian
"#;

pub const UPTIME: &str = " 14:03:55 up 58 min,  2 users,  load average: 0.17, 0.14, 0.15\n";

pub const FREE: &str = "              total        used        free      shared  buff/cache   available
Mem:           1000         300         200          10         500         500
Swap:        102396           0      102396
";

pub const DF: &str = "Filesystem     1K-blocks    Used Available Use% Mounted on
/dev/root       30358348 6237384  22852528  22% /
";

pub const PS: &str = "  PID TTY      STAT   TIME COMMAND
    1 ?        Ss     0:05 /sbin/init splash
    2 ?        S      0:00 [kthreadd]
  100 ?        I<     0:00 [rcu_gp]
  812 pts/0    R+     0:00 ps ax
";

pub const IFCONFIG_ETH0: &str = "eth0: flags=4163<UP,BROADCAST,RUNNING,MULTICAST>  mtu 1500
        inet 192.168.1.20  netmask 255.255.255.0  broadcast 192.168.1.255
        ether dc:a6:32:00:00:01  txqueuelen 1000  (Ethernet)
        RX packets 123456  bytes 98765432 (94.1 MiB)
        RX errors 0  dropped 0  overruns 0  frame 0
        TX packets 65432  bytes 12345678 (11.7 MiB)
        TX errors 0  dropped 0 overruns 0  carrier 0  collisions 0
";

pub const IFCONFIG_WLAN0_LEGACY: &str = "wlan0     Link encap:Ethernet  HWaddr b8:27:eb:00:00:02
          inet addr:192.168.1.21  Bcast:192.168.1.255  Mask:255.255.255.0
          RX packets:1200 errors:0 dropped:0 overruns:0 frame:0
          TX packets:800 errors:0 dropped:0 overruns:0 carrier:0
          RX bytes:1000 (1.0 KB)  TX bytes:2000 (2.0 KB)
";

pub const GPU_TEMP: &str = "temp=50.1'C\n";
pub const CPU_TEMP: &str = "51608\n";
pub const CPU_CUR_FREQ: &str = "600000\n";
pub const CPU_MAX_FREQ: &str = "1500000\n";

pub const GPIO: &str = "BANK0 (GPIO 0 to 27):
GPIO 0: level=1 fsel=0 func=INPUT pull=UP
GPIO 1: level=1 fsel=0 func=INPUT pull=UP
GPIO 2: level=0 fsel=1 func=OUTPUT pull=NONE
GPIO 3: level=1 fsel=0 func=INPUT pull=UP
GPIO 9: level=0 func=INPUT pull=DOWN
GPIO 17: level=0 fsel=1 func=OUTPUT pull=DOWN
BANK1 (GPIO 28 to 45):
GPIO 28: level=1 alt=5 func=RGMII_MDIO pull=UP
";

pub const LAST_EMPTY: &str = "
wtmp begins Sat Aug  3 13:05:26 2024
";

pub const W: &str = " 14:03:55 up 58 min,  2 users,  load average: 0.17, 0.14, 0.15
USER     TTY      FROM             LOGIN@   IDLE   JCPU   PCPU WHAT
pi       pts/0    192.168.1.10     13:10    0.00s  0.45s  0.01s w
pi                192.168.1.11     13:55    8:00   0.02s  0.02s -bash
";

pub const DOCKER_PS: &str = "CONTAINER ID   IMAGE          COMMAND                  CREATED       STATUS                   PORTS     NAMES
3f4e8a9b2c1d   nginx:alpine   \"/docker-entrypoint.…\"   2 hours ago   Up 2 hours               80/tcp    web
9a8b7c6d5e4f   redis:7        \"docker-entrypoint.s…\"   3 days ago    Exited (0) 2 hours ago   6379/tcp  cache
";

/// A `last` line for `user` logged in at `login` (RFC 3339) that is still open.
pub fn last_open_line(user: &str, tty: &str, host: &str, login: &str) -> String {
    format!("{user:<8} {tty:<12} {host:<16} {login}   still logged in")
}

/// A `last` line for a session that logged out.
pub fn last_closed_line(user: &str, tty: &str, host: &str, login: &str, logout: &str, dur: &str) -> String {
    format!("{user:<8} {tty:<12} {host:<16} {login} - {logout}  ({dur})")
}

pub fn ts(s: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(s).unwrap()
}

/// An open session record.
pub fn open_login(user: &str, login: &str) -> LoginRecord {
    LoginRecord {
        user: user.into(),
        tty: Some("pts/0".into()),
        host: Some("192.168.1.10".into()),
        login_time: ts(login),
        logout_time: None,
        duration: None,
        info: "still logged in".into(),
    }
}

/// A session that has logged out.
pub fn closed_login(user: &str, login: &str, logout: &str) -> LoginRecord {
    LoginRecord {
        logout_time: Some(ts(logout)),
        duration: Some("00:10".into()),
        info: String::new(),
        ..open_login(user, login)
    }
}

/// Scripted `RemoteShell`: commands map to canned outputs, unknown commands
/// exit 127. Every call is recorded.
#[derive(Default)]
pub struct FakeShell {
    responses: Mutex<HashMap<String, ExecOutput>>,
    connect_failures: Mutex<VecDeque<SessionError>>,
    exec_error: Mutex<Option<SessionError>>,
    exec_delay: Mutex<Option<Duration>>,
    connected: Mutex<bool>,
    calls: Mutex<Vec<String>>,
    pub connects: AtomicUsize,
    pub disconnects: AtomicUsize,
}

impl FakeShell {
    pub fn new() -> Self {
        Self::default()
    }

    /// A Raspberry Pi 4 answering every polled command.
    pub fn raspberry_pi() -> Self {
        let shell = Self::new();
        shell.respond(commands::HOST_NAME, "raspberrypi\n");
        shell.respond(commands::OS_ARCH, "armv7l\n");
        shell.respond(commands::CPU_INFO, CPU_INFO);
        shell.respond(commands::CPU_MAX_FREQ, CPU_MAX_FREQ);
        shell.respond(commands::OS_RELEASE, OS_RELEASE);
        shell.respond(commands::UPTIME, UPTIME);
        shell.respond(commands::BOOT_DATE, "2024-08-03 13:05:26\n");
        shell.respond(commands::IFCONFIG_ETH0, IFCONFIG_ETH0);
        shell.respond(commands::IFCONFIG_WLAN0, IFCONFIG_WLAN0_LEGACY);
        shell.respond(commands::GPU_TEMP, GPU_TEMP);
        shell.respond(commands::CPU_TEMP, CPU_TEMP);
        shell.respond(commands::CPU_CUR_FREQ, CPU_CUR_FREQ);
        shell.respond(commands::MEMORY, FREE);
        shell.respond(commands::STORAGE, DF);
        shell.respond(commands::PROCESSES, PS);
        shell.respond(commands::GPIO_GET, GPIO);
        shell.respond(commands::LAST_LOGINS, LAST_EMPTY);
        shell.respond(commands::USERS, W);
        shell.respond(commands::CONTAINER_LIST, DOCKER_PS);
        shell
    }

    pub fn respond(&self, command: &str, stdout: impl Into<String>) {
        self.respond_with(command, ExecOutput::ok(stdout));
    }

    pub fn respond_with(&self, command: &str, output: ExecOutput) {
        self.responses
            .lock()
            .unwrap()
            .insert(command.to_string(), output);
    }

    pub fn fail_next_connect(&self, error: SessionError) {
        self.connect_failures.lock().unwrap().push_back(error);
    }

    /// Every exec fails with `error` until cleared with `None`.
    pub fn set_exec_error(&self, error: Option<SessionError>) {
        *self.exec_error.lock().unwrap() = error;
    }

    /// Every exec sleeps this long first (tokio time, so paused clocks apply).
    pub fn set_exec_delay(&self, delay: Option<Duration>) {
        *self.exec_delay.lock().unwrap() = delay;
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, command: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == command).count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl RemoteShell for FakeShell {
    async fn connect(&self) -> Result<(), SessionError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.connect_failures.lock().unwrap().pop_front() {
            return Err(e);
        }
        *self.connected.lock().unwrap() = true;
        Ok(())
    }

    async fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        *self.connected.lock().unwrap() = false;
    }

    async fn exec(&self, command: &str) -> Result<ExecOutput, SessionError> {
        self.calls.lock().unwrap().push(command.to_string());
        let delay = *self.exec_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(e) = self.exec_error.lock().unwrap().clone() {
            return Err(e);
        }
        if !*self.connected.lock().unwrap() {
            return Err(SessionError::NotConnected);
        }
        Ok(self
            .responses
            .lock()
            .unwrap()
            .get(command)
            .cloned()
            .unwrap_or(ExecOutput {
                exit_code: 127,
                stdout: String::new(),
                stderr: format!("{command}: command not found"),
            }))
    }
}

/// `DeviceSink` that records everything it is told.
#[derive(Default)]
pub struct RecordingSink {
    pub registered: Mutex<Vec<String>>,
    pub writes: Mutex<Vec<(String, CapabilityValue)>>,
    pub events: Mutex<Vec<DeviceEvent>>,
    pub availability: Mutex<Vec<(bool, Option<String>)>>,
    pub identity: Mutex<Option<SystemIdentity>>,
    pub reject: Mutex<HashSet<String>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject_key(&self, key: &str) {
        self.reject.lock().unwrap().insert(key.to_string());
    }

    pub fn writes(&self) -> Vec<(String, CapabilityValue)> {
        self.writes.lock().unwrap().clone()
    }

    pub fn last_value(&self, key: &str) -> Option<CapabilityValue> {
        self.writes()
            .into_iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn events(&self) -> Vec<DeviceEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn availability(&self) -> Vec<(bool, Option<String>)> {
        self.availability.lock().unwrap().clone()
    }

    pub fn unavailable_count(&self) -> usize {
        self.availability().iter().filter(|(a, _)| !a).count()
    }

    pub fn is_available(&self) -> bool {
        self.availability().last().is_some_and(|(a, _)| *a)
    }
}

#[async_trait]
impl DeviceSink for RecordingSink {
    async fn register_capabilities(&self, keys: &[String]) {
        *self.registered.lock().unwrap() = keys.to_vec();
    }

    async fn set_capability(&self, key: &str, value: CapabilityValue) -> Result<(), SinkError> {
        if self.reject.lock().unwrap().contains(key) {
            return Err(SinkError::Rejected {
                key: key.to_string(),
                reason: "rejected by test".into(),
            });
        }
        self.writes.lock().unwrap().push((key.to_string(), value));
        Ok(())
    }

    async fn trigger(&self, event: DeviceEvent) {
        self.events.lock().unwrap().push(event);
    }

    async fn set_available(&self, available: bool, reason: Option<&str>) {
        self.availability
            .lock()
            .unwrap()
            .push((available, reason.map(str::to_string)));
    }

    async fn update_identity(&self, identity: &SystemIdentity) {
        *self.identity.lock().unwrap() = Some(identity.clone());
    }
}

/// Factory handing every (re)created session the same scripted shell.
pub fn fake_factory(shell: Arc<FakeShell>) -> ShellFactory {
    Arc::new(move |_: &DeviceSettings| -> Arc<dyn RemoteShell> { shell.clone() })
}
