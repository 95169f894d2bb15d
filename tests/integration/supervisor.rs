#[path = "common/mod.rs"]
mod common;

use bakufu::supervisor::Supervisor;
use common::write_config;
use tempfile::tempdir;

#[test]
fn construction_rejects_a_config_with_no_service_section() {
    let temp = tempdir().unwrap();
    let config_path = write_config(temp.path(), "foo = 1;");
    let err = Supervisor::from_config_path(&config_path).unwrap_err();
    assert!(matches!(
        err,
        bakufu::error::SupervisorError::Config(bakufu::error::ConfigError::MissingServiceSection)
    ));
}

#[test]
fn construction_rejects_an_unknown_stop_signal() {
    let temp = tempdir().unwrap();
    let config_path = write_config(
        temp.path(),
        r#"
        service {
            web {
                command = "sleep 5";
                stop_signal = "NOPE";
            }
        }
        "#,
    );
    let err = Supervisor::from_config_path(&config_path).unwrap_err();
    assert!(matches!(
        err,
        bakufu::error::SupervisorError::Config(bakufu::error::ConfigError::UnknownSignal { .. })
    ));
}

#[test]
fn construction_succeeds_for_a_well_formed_config() {
    let temp = tempdir().unwrap();
    let config_path = write_config(
        temp.path(),
        r#"
        service {
            web {
                command = "sleep 5";
                num_processes = 2;
                stop_signal = "SIGINT";
            }
        }
        "#,
    );
    Supervisor::from_config_path(&config_path).unwrap();
}
