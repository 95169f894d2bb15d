#[path = "common/mod.rs"]
mod common;

use bakufu::{config, process::Process, service::Service};
use common::{is_process_alive, wait_for_file_value, wait_for_process_exit, write_config};
use nix::sys::signal::Signal;
use tempfile::tempdir;

#[test]
fn replication_starts_exactly_num_processes() {
    let value = config::parse(
        r#"
        service {
            web {
                command = "sleep 5";
                num_processes = 3;
            }
        }
        "#,
    )
    .unwrap();
    let services = config::build_services(&value).unwrap();
    let (_, cfg) = &services[0];

    let mut service = Service::new("web".into(), cfg, false);
    service.start();
    assert_eq!(service.process_count(), 3);

    service.stop();
}

#[test]
fn shutdown_completeness_leaves_no_children() {
    let value = config::parse(
        r#"
        service {
            web {
                command = "sleep 30";
                num_processes = 2;
            }
        }
        "#,
    )
    .unwrap();
    let services = config::build_services(&value).unwrap();
    let (_, cfg) = &services[0];

    let mut service = Service::new("web".into(), cfg, false);
    service.start();
    assert_eq!(service.process_count(), 2);

    service.stop();
    assert_eq!(service.process_count(), 0);
}

#[test]
fn config_loaded_from_file_spawns_real_child() {
    let temp = tempdir().unwrap();
    let marker = temp.path().join("marker.txt");

    let config_path = write_config(
        temp.path(),
        &format!(
            r#"
            service {{
                writer {{
                    command = "sh -c 'echo running > {}'";
                }}
            }}
            "#,
            marker.display()
        ),
    );

    let value = config::load_file(&config_path).unwrap();
    let services = config::build_services(&value).unwrap();
    let (_, cfg) = &services[0];

    let mut service = Service::new("writer".into(), cfg, false);
    service.start();
    wait_for_file_value(&marker, "running");
    service.stop();
}

#[test]
fn killed_child_is_reaped_and_no_longer_alive() {
    let mut process = Process::new("sleep 30".into(), Signal::SIGTERM, 5, false);
    process.spawn().unwrap();
    let pid = process.pid().unwrap();
    assert!(is_process_alive(pid));

    process.kill().unwrap();
    process.reap().unwrap();

    wait_for_process_exit(pid);
    assert!(process.pid().is_none());
}
