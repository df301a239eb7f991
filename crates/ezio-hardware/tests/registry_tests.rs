//! Registry fan-out behavior across multiple boards.

use ezio_core::config::IoConfiguration;
use ezio_core::driver::BoardDriver;
use ezio_core::error::EzioError;
use ezio_driver_mock::MockBoard;
use ezio_hardware::{DeviceManager, DeviceRegistry};
use std::sync::Arc;
use std::time::Duration;

const CONFIG: &str = r#"
    [[devices]]
    id = 0
    name = "IOBottom"
    ip = "192.168.0.3"
    input_count = 16
    output_count = 8
    outputs = [{ pin = 3, name = "UV_Head" }]

    [[devices]]
    id = 1
    name = "IOTop"
    ip = "192.168.0.4"
    input_count = 16
    output_count = 8
    inputs = [{ pin = 5, name = "Lid_Open" }]
"#;

fn registry(mock: &MockBoard) -> DeviceRegistry {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let config = IoConfiguration::from_toml_str(CONFIG).unwrap();
    let driver: Arc<dyn BoardDriver> = Arc::new(mock.clone());
    let mut registry = DeviceRegistry::new();
    for descriptor in &config.devices {
        let manager = DeviceManager::from_config(&config, &descriptor.name, Arc::clone(&driver))
            .unwrap()
            .with_poll_period(Duration::from_millis(5));
        registry.add_device(Arc::new(manager)).unwrap();
    }
    registry
}

#[tokio::test]
async fn test_connect_all_and_disconnect_all() {
    let mock = MockBoard::new();
    let registry = registry(&mock);

    registry.connect_all().await.unwrap();
    assert!(mock.is_connected(0).await);
    assert!(mock.is_connected(1).await);

    registry.disconnect_all().await;
    assert!(!mock.is_connected(0).await);
    assert!(!mock.is_connected(1).await);
}

#[tokio::test]
async fn test_connect_all_tolerates_partial_failure() {
    let mock = MockBoard::new();
    let registry = registry(&mock);
    mock.refuse_connect(1, true).await;

    let err = registry.connect_all().await.unwrap_err();
    match err {
        EzioError::ConnectAll(failures) => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].0, "IOTop");
            assert!(matches!(
                failures[0].1,
                EzioError::ConnectionRefused { board: 1 }
            ));
        }
        other => panic!("expected aggregate error, got {other}"),
    }

    // The healthy board stays connected and usable.
    assert!(registry.device("IOBottom").unwrap().is_connected());
    registry.set_output("IOBottom", "UV_Head", true).await.unwrap();
    assert_eq!(mock.output_vector(0).await, 0x800);

    // Retrying picks up the previously failed board without disturbing the
    // connected one.
    mock.refuse_connect(1, false).await;
    registry.connect_all().await.unwrap();
    assert!(registry.device("IOTop").unwrap().is_connected());
}

#[tokio::test]
async fn test_cross_device_lookups() {
    let mock = MockBoard::new();
    let registry = registry(&mock);
    registry.connect_all().await.unwrap();

    assert!(matches!(
        registry.set_output("IOMissing", "UV_Head", true).await,
        Err(EzioError::DeviceNotFound(_))
    ));
    assert!(matches!(
        registry.set_output("IOTop", "UV_Head", true).await,
        Err(EzioError::PinNotFound { .. })
    ));

    assert_eq!(registry.input_state("IOTop", "Lid_Open"), Some(false));
    assert_eq!(registry.input_state("IOTop", "NoSuchPin"), None);
    assert_eq!(registry.output_state("IOBottom", "UV_Head"), Some(false));
}
