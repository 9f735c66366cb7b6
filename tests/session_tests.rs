// Session reconnect behaviour and the remote repository on top of it

mod common;

use chrono::Utc;
use common::FakeShell;
use rpiwatch::commands::{self, ContainerVerb};
use rpiwatch::error::{ActionError, SessionError};
use rpiwatch::remote_repo::RemoteRepo;
use rpiwatch::session::{ExecOutput, Session};
use std::sync::Arc;
use std::sync::atomic::Ordering;

fn session_with(shell: &Arc<FakeShell>) -> Arc<Session> {
    Arc::new(Session::new(shell.clone()))
}

#[tokio::test]
async fn execute_connects_on_demand() {
    let shell = Arc::new(FakeShell::raspberry_pi());
    let session = session_with(&shell);
    assert!(!session.is_connected());

    let out = session.execute(commands::HOST_NAME).await.unwrap();
    assert_eq!(out, "raspberrypi\n");
    assert!(session.is_connected());
    assert_eq!(shell.connects.load(Ordering::SeqCst), 1);

    session.execute(commands::OS_ARCH).await.unwrap();
    assert_eq!(shell.connects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn connect_failure_propagates_and_next_call_retries() {
    let shell = Arc::new(FakeShell::raspberry_pi());
    shell.fail_next_connect(SessionError::Auth("permission denied".into()));
    let session = session_with(&shell);

    let err = session.execute(commands::UPTIME).await.unwrap_err();
    assert_eq!(err, SessionError::Auth("permission denied".into()));
    assert!(!session.is_connected());
    assert!(shell.calls().is_empty());

    session.execute(commands::UPTIME).await.unwrap();
    assert_eq!(shell.connects.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn connection_error_marks_session_down() {
    let shell = Arc::new(FakeShell::raspberry_pi());
    let session = session_with(&shell);
    session.connect().await.unwrap();

    shell.set_exec_error(Some(SessionError::Network("broken pipe".into())));
    let err = session.execute(commands::UPTIME).await.unwrap_err();
    assert!(err.is_connection());
    assert!(!session.is_connected());

    shell.set_exec_error(None);
    session.execute(commands::UPTIME).await.unwrap();
    assert!(session.is_connected());
    assert_eq!(shell.connects.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn non_zero_exit_is_remote_exec_with_output() {
    let shell = Arc::new(FakeShell::new());
    shell.respond_with(
        commands::REBOOT,
        ExecOutput {
            exit_code: 1,
            stdout: String::new(),
            stderr: "sudo: a password is required\n".into(),
        },
    );
    let session = session_with(&shell);

    match session.execute(commands::REBOOT).await {
        Err(SessionError::RemoteExec {
            command,
            code,
            output,
        }) => {
            assert_eq!(command, commands::REBOOT);
            assert_eq!(code, 1);
            assert_eq!(output, "sudo: a password is required");
        }
        other => panic!("expected RemoteExec, got {other:?}"),
    }
    // a failing command does not drop the connection
    assert!(session.is_connected());
}

#[tokio::test]
async fn silent_execute_swallows_only_exit_codes() {
    let shell = Arc::new(FakeShell::new());
    let session = session_with(&shell);
    assert_eq!(session.silent_execute("vcgencmd measure_temp").await, Ok(None));

    shell.set_exec_error(Some(SessionError::Timeout("exec".into())));
    assert!(session.silent_execute("uptime").await.is_err());
}

#[tokio::test]
async fn disconnect_is_safe_when_down() {
    let shell = Arc::new(FakeShell::new());
    let session = session_with(&shell);
    session.disconnect().await;
    session.disconnect().await;
    assert!(!session.is_connected());
    assert_eq!(shell.disconnects.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn repo_reads_identity_and_stats() {
    let shell = Arc::new(FakeShell::raspberry_pi());
    let repo = RemoteRepo::new(session_with(&shell));

    let identity = repo.get_sys_info().await.unwrap();
    assert_eq!(identity.processor_count, Some(4));
    assert_eq!(identity.cpu_max_frequency, Some(1_500_000));

    let stats = repo.get_stats(&identity, Utc::now()).await.unwrap();
    assert!((stats.cpu_usage.unwrap() - 4.25).abs() < 1e-9);
    assert_eq!(stats.cpu_scaling, Some(40.0));
    assert_eq!(stats.mem_usage, Some(50.0));
    assert_eq!(stats.storage_usage, Some(22.0));
    assert_eq!(stats.users, Some(2));
    assert_eq!(stats.gpu_temp, Some(50.1));
    assert_eq!(stats.cpu_temp, Some(51.608));
    assert_eq!(stats.eth0.rx_bytes, 98765432);
    assert_eq!(stats.wlan0.tx_bytes, 2000);
    assert_eq!(stats.processes.map(|p| p.total), Some(4));
    assert!(stats.boot_date.is_some());
}

#[tokio::test]
async fn stats_without_identity_leave_relative_metrics_empty() {
    let shell = Arc::new(FakeShell::raspberry_pi());
    let repo = RemoteRepo::new(session_with(&shell));
    let stats = repo.get_stats(&Default::default(), Utc::now()).await.unwrap();
    assert_eq!(stats.cpu_usage, None);
    assert_eq!(stats.cpu_scaling, None);
    assert_eq!(stats.mem_usage, Some(50.0));
}

#[tokio::test]
async fn missing_tools_yield_none() {
    let shell = Arc::new(FakeShell::new());
    let repo = RemoteRepo::new(session_with(&shell));
    assert_eq!(repo.get_last_logins().await.unwrap(), None);
    assert_eq!(repo.get_gpio_states().await.unwrap(), None);

    let stats = repo.get_stats(&Default::default(), Utc::now()).await.unwrap();
    assert_eq!(stats.uptime, None);
    assert_eq!(stats.eth0.rx_bytes, 0);
}

#[tokio::test]
async fn actions_validate_before_sending() {
    let shell = Arc::new(FakeShell::raspberry_pi());
    let repo = RemoteRepo::new(session_with(&shell));

    let err = repo.container(ContainerVerb::Stop, "web; reboot").await.unwrap_err();
    assert!(matches!(err, ActionError::InvalidArgument(_)));
    assert!(matches!(
        repo.set_gpio(54, true).await,
        Err(ActionError::InvalidArgument(_))
    ));
    assert!(matches!(
        repo.run_command("   ").await,
        Err(ActionError::InvalidArgument(_))
    ));
    assert!(shell.calls().is_empty());
}

#[tokio::test]
async fn actions_surface_remote_failures() {
    let shell = Arc::new(FakeShell::raspberry_pi());
    shell.respond("sudo docker restart web", "web\n");
    let repo = RemoteRepo::new(session_with(&shell));

    repo.container(ContainerVerb::Restart, "web").await.unwrap();
    assert_eq!(shell.count("sudo docker restart web"), 1);

    // not scripted, so the fake answers 127
    let err = repo.set_gpio(17, true).await.unwrap_err();
    assert!(matches!(
        err,
        ActionError::Session(SessionError::RemoteExec { code: 127, .. })
    ));

    let containers = repo.get_containers().await.unwrap();
    assert_eq!(containers.len(), 2);
    let users = repo.get_users().await.unwrap();
    assert_eq!(users.len(), 2);
}
