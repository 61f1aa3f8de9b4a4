//! Concurrent use of a session from several tasks.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{READ_DELAY, SERIAL_1, SERIAL_2, initialized_session};
use scanbridge_core::{BeepPattern, Error};
use scanbridge_protocol::Opcode;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_scans_on_different_devices_run_together() {
    let (session, handle) = initialized_session().await;
    handle.set_latency(Duration::from_millis(5));
    handle.script_read(SERIAL_1, "111", READ_DELAY);
    handle.script_read(SERIAL_2, "222", READ_DELAY);

    let (first, second) = tokio::join!(
        session.scan(SERIAL_1, Duration::from_millis(800)),
        session.scan(SERIAL_2, Duration::from_millis(800)),
    );

    assert_eq!(first.unwrap(), "111");
    assert_eq!(second.unwrap(), "222");
    assert_eq!(handle.command_count(Opcode::PullTrigger), 2);
    assert_eq!(handle.max_in_flight(), 1);
    session.dispose().await;
}

#[tokio::test]
async fn test_second_scan_on_same_device_rejected() {
    let (session, handle) = initialized_session().await;
    handle.script_read(SERIAL_1, "ONLY", Duration::from_millis(100));

    let first = session.scan(SERIAL_1, Duration::from_millis(800));
    let second = async {
        while !session.is_scanning(SERIAL_1) {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        session.scan(SERIAL_1, Duration::from_millis(800)).await
    };
    let (first, second) = tokio::join!(first, second);

    assert_eq!(first.unwrap(), "ONLY");
    assert_eq!(
        second,
        Err(Error::ScanAlreadyInFlight {
            serial: SERIAL_1.to_string()
        })
    );
    assert_eq!(handle.command_count(Opcode::PullTrigger), 1);
    session.dispose().await;
}

/// Beeps, health checks and scans from many tasks never overlap at the driver.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_mixed_operations_serialize_at_driver() {
    let (session, handle) = initialized_session().await;
    handle.set_latency(Duration::from_millis(2));
    let session = Arc::new(session);

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..12 {
        let session = Arc::clone(&session);
        let serial = if i % 2 == 0 { SERIAL_1 } else { SERIAL_2 };
        tasks.spawn(async move {
            session.beep(serial, BeepPattern::ONE_HIGH_SHORT).await?;
            session.is_healthy(serial).await.map(|_| ())
        });
    }
    while let Some(result) = tasks.join_next().await {
        result.unwrap().unwrap();
    }

    assert_eq!(handle.command_count(Opcode::Beep), 12);
    assert_eq!(handle.command_count(Opcode::AttributeGetAll), 12);
    assert_eq!(handle.max_in_flight(), 1);
    session.dispose().await;
}
