// SPDX-License-Identifier: MIT OR Apache-2.0
//! Real-process tests for spawning, capture, timeouts and classification.

use bsh_config::Options;
use bsh_runner::{
    CommandError, Runner, ShellProgram, Signal, SpawnSpec, run, send_signal, start,
};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

fn silent() -> Options {
    Options {
        silent: Some(true),
        ..Default::default()
    }
}

fn silent_mayfail() -> Options {
    Options {
        mayfail: Some(true),
        ..silent()
    }
}

// ---------------------------------------------------------------------------
// Exit classification
// ---------------------------------------------------------------------------

#[tokio::test]
async fn exit_status_is_reported() {
    let r = run("exit 123", &silent_mayfail()).await.unwrap();
    assert_eq!(r.status, Some(123));
    assert_eq!(r.signal, None);
    assert!(r.error.is_none());
}

#[tokio::test]
async fn non_zero_exit_raises_without_mayfail() {
    let err = run("exit 123", &silent()).await.unwrap_err();
    assert!(matches!(err, CommandError::NonZeroExit { status: 123, .. }));
    assert_eq!(err.to_string(), "shell process returned non-zero exit code - 123");
}

#[tokio::test]
async fn pid_is_present() {
    let r = run("true", &silent()).await.unwrap();
    assert!(r.pid.is_some_and(|pid| pid > 0));
}

#[tokio::test]
async fn externally_killed_child_reports_signal() {
    let spec = SpawnSpec::from_options(&silent(), ShellProgram::Default).unwrap();
    let running = start("sleep 1", &spec).await;
    let pid = running.pid().expect("spawned");
    tokio::time::sleep(Duration::from_millis(50)).await;
    send_signal(pid, Signal::SIGTERM).unwrap();

    let r = running.wait().await;
    assert_eq!(r.signal.as_deref(), Some("SIGTERM"));
    assert_eq!(r.status, None);
}

#[tokio::test]
async fn missing_program_is_a_spawn_error() {
    let runner = Runner::with_shell(ShellProgram::None);
    let r = runner.run("./nosuchfile", &silent_mayfail()).await.unwrap();
    let err = r.error.as_ref().expect("spawn error");
    assert!(err.is_not_found());
    assert_eq!(r.pid, None);
    assert_eq!(r.status, None);
}

#[tokio::test]
async fn missing_program_raises_spawn_error_without_mayfail() {
    let runner = Runner::with_shell(ShellProgram::None);
    let err = runner.run("./nosuchfile", &silent()).await.unwrap_err();
    assert!(matches!(err, CommandError::Spawn { .. }));
    assert_eq!(err.to_string(), "failed to execute command");
}

#[tokio::test]
async fn missing_command_under_sh_is_status_127() {
    let r = run("./nosuchfile", &silent_mayfail()).await.unwrap();
    assert_eq!(r.status, Some(127));
}

// ---------------------------------------------------------------------------
// Capture
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stdout_is_captured() {
    let r = run("echo 'Hello, world!'", &silent()).await.unwrap();
    assert_eq!(r.stdout, "Hello, world!\n");
    assert_eq!(r.output()[1], Some("Hello, world!\n"));
}

#[tokio::test]
async fn stderr_is_captured() {
    let r = run("echo oops >&2", &silent()).await.unwrap();
    assert_eq!(r.stderr, "oops\n");
    assert_eq!(r.stdout, "");
}

#[tokio::test]
async fn quiet_still_captures_both_streams() {
    let opts = Options {
        quiet: Some(true),
        ..Default::default()
    };
    let r = run("echo out; echo err >&2", &opts).await.unwrap();
    assert_eq!(r.stdout, "out\n");
    assert_eq!(r.stderr, "err\n");
}

#[tokio::test]
async fn large_output_is_captured_whole() {
    let r = run("yes x | head -n 50000", &silent()).await.unwrap();
    assert_eq!(r.stdout.len(), 100_000);
}

#[tokio::test]
async fn failed_result_still_carries_output() {
    let err = run("echo before; exit 4", &silent()).await.unwrap_err();
    assert_eq!(err.result().map(|r| r.stdout.as_str()), Some("before\n"));
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cd_sets_working_directory() {
    let dir = tempfile::tempdir().unwrap();
    let opts = Options {
        cd: Some(dir.path().to_path_buf()),
        ..silent()
    };
    let r = run("pwd", &opts).await.unwrap();
    let expected = dir.path().canonicalize().unwrap();
    let got = std::path::Path::new(r.stdout.trim_end()).canonicalize().unwrap();
    assert_eq!(got, expected);
}

#[tokio::test]
async fn missing_cd_is_a_spawn_error() {
    let opts = Options {
        cd: Some("/definitely/not/here".into()),
        ..silent_mayfail()
    };
    let r = run("true", &opts).await.unwrap();
    assert!(r.error.is_some());
}

#[tokio::test]
async fn env_overlays_inherited_environment() {
    let opts = Options {
        env: BTreeMap::from([("BSH_TEST_VAR".to_string(), "hello".to_string())]),
        ..silent()
    };
    let r = run("echo \"$BSH_TEST_VAR\"; test -n \"$PATH\"", &opts)
        .await
        .unwrap();
    assert_eq!(r.stdout, "hello\n");
}

#[tokio::test]
async fn unknown_user_is_reported_as_spawn_error() {
    let opts = Options {
        user: Some("bsh-no-such-user-xyz".into()),
        ..silent_mayfail()
    };
    let r = run("true", &opts).await.unwrap();
    assert!(r.error.as_ref().is_some_and(|e| e.is_not_found()));
    assert_eq!(r.pid, None);
}

#[tokio::test]
async fn timeout_terminates_with_sigterm() {
    let opts = Options {
        timeout: Some(Duration::from_millis(500)),
        ..silent_mayfail()
    };
    let started = Instant::now();
    let r = run("sleep 5", &opts).await.unwrap();
    assert_eq!(r.signal.as_deref(), Some("SIGTERM"));
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn timeout_raises_signaled_without_mayfail() {
    let opts = Options {
        timeout: Some(Duration::from_millis(200)),
        ..silent()
    };
    let err = run("sleep 5", &opts).await.unwrap_err();
    assert_eq!(err.signal(), Some("SIGTERM"));
    assert_eq!(err.to_string(), "shell process terminated with signal SIGTERM");
}

#[tokio::test]
async fn fast_command_is_unaffected_by_timeout() {
    let opts = Options {
        timeout: Some(Duration::from_secs(5)),
        ..silent()
    };
    let r = run("echo quick", &opts).await.unwrap();
    assert_eq!(r.status, Some(0));
    assert_eq!(r.stdout, "quick\n");
}

#[tokio::test]
async fn background_returns_before_child_exits() {
    let opts = Options {
        bg: Some(true),
        ..Default::default()
    };
    let started = Instant::now();
    let r = run("sleep 3", &opts).await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(r.detached);
    assert!(r.pid.is_some());
    assert_eq!(r.status, None);
    assert_eq!(r.stdout, "");
    if let Some(pid) = r.pid {
        let _ = send_signal(pid, Signal::SIGTERM);
    }
}

#[tokio::test]
async fn lingering_grandchild_does_not_hold_the_result() {
    let started = Instant::now();
    let r = run("echo hi; sleep 5 &", &silent()).await.unwrap();
    assert_eq!(r.stdout, "hi\n");
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn background_child_is_terminated_at_its_timeout() {
    let opts = Options {
        bg: Some(true),
        timeout: Some(Duration::from_millis(100)),
        ..Default::default()
    };
    let r = run("sleep 3", &opts).await.unwrap();
    assert!(r.detached);
    let pid = r.pid.expect("spawned");
    let proc_entry = format!("/proc/{pid}");

    let started = Instant::now();
    while std::path::Path::new(&proc_entry).exists() {
        assert!(
            started.elapsed() < Duration::from_secs(2),
            "detached child {pid} outlived its timeout"
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
