#[path = "common/mod.rs"]
mod common;

use std::{thread, time::Duration};

use bakufu::{config, process::ProcessStatus, service::Service};

fn one_service(body: &str) -> bakufu::config::ServiceConfig {
    let value = config::parse(&format!("service {{ svc {{ {body} }} }}")).unwrap();
    let services = config::build_services(&value).unwrap();
    services.into_iter().next().unwrap().1
}

#[test]
fn restart_on_death_gets_a_fresh_pid() {
    let cfg = one_service(r#"command = "sh -c 'sleep 0.2'";"#);
    let mut service = Service::new("svc".into(), &cfg, false);
    service.start();
    assert_eq!(service.process_count(), 1);
    let original_pid = service.pids()[0];

    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    loop {
        service.watch_processes();
        if service.process_count() == 1 && service.pids()[0] != original_pid {
            break;
        }
        assert!(
            std::time::Instant::now() < deadline,
            "respawn with a fresh pid never happened"
        );
        thread::sleep(Duration::from_millis(20));
    }

    service.stop();
}

#[test]
fn backoff_bound_reaches_fatal_after_max_retry() {
    // `false` exits immediately every time: guaranteed premature death.
    let cfg = one_service(r#"command = "false";"#);
    let mut process = bakufu::process::Process::new(
        cfg.command.clone(),
        cfg.stop_signal,
        3,
        false,
    );

    for _ in 0..3 {
        process.spawn().unwrap();
        thread::sleep(Duration::from_millis(50));
        process.watch();
    }

    assert_eq!(process.status(), ProcessStatus::Fatal);

    // Further spawns are a permanent no-op.
    process.spawn().unwrap();
    assert_eq!(process.status(), ProcessStatus::Fatal);
    assert!(process.pid().is_none());
}

#[test]
fn manual_stop_leaves_no_process_to_respawn() {
    let cfg = one_service(r#"command = "sleep 30";"#);
    let mut service = Service::new("svc".into(), &cfg, false);
    service.start();
    assert_eq!(service.process_count(), 1);

    service.stop();
    assert_eq!(service.process_count(), 0);

    // No processes left for the watchdog to touch.
    service.watch_processes();
    assert_eq!(service.process_count(), 0);
}

#[test]
fn shutting_down_flag_gates_watchdog_during_stop() {
    let cfg = one_service(r#"command = "sleep 30";"#);
    let mut service = Service::new("svc".into(), &cfg, false);
    service.start();
    assert!(!service.is_shutting_down());

    service.stop();
    // stop() clears the flag once it has fully completed.
    assert!(!service.is_shutting_down());
    assert_eq!(service.process_count(), 0);
}
