// The process-wide store is shared state, so everything lives in one test.

use bot_param::global::{self, MAX_REFERENCES};
use bot_param::transport::PARAM_UPDATE_CHANNEL;
use bot_param::{ClientConfig, MemoryTransport, ParamError, ParamRequest, ParamUpdate};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

fn serving_transport(server_id: i64, params: &'static str) -> Arc<MemoryTransport> {
    let transport = Arc::new(MemoryTransport::new());
    let seq = AtomicI64::new(1);
    transport.set_responder(Arc::new(move |t: &MemoryTransport, _: &str, _: &ParamRequest| {
        let update = ParamUpdate {
            utime: 0,
            server_id,
            sequence_number: seq.fetch_add(1, Ordering::SeqCst),
            params: params.to_string(),
        };
        t.deliver(PARAM_UPDATE_CHANNEL, &update);
    }));
    transport
}

#[test]
fn test_process_singleton_lifecycle() {
    let config = ClientConfig {
        bootstrap_attempts: 2,
        retry_delay_ms: 10,
        ..ClientConfig::default()
    };

    // A failed bootstrap installs nothing.
    let silent = Arc::new(MemoryTransport::new());
    let err = global::acquire_with(silent.clone(), true, &config).err();
    assert!(matches!(err, Some(ParamError::BootstrapTimeout { .. })));
    assert_eq!(global::reference_count(), 0);
    assert_eq!(silent.subscription_count(), 0);

    // First acquisition bootstraps and keeps the live subscription.
    let transport = serving_transport(4, "speed = 1;");
    let first = global::acquire_with(transport.clone(), true, &config).unwrap();
    assert_eq!(first.get_int("speed").unwrap(), 1);
    assert_eq!(global::reference_count(), 1);
    assert_eq!(transport.subscription_count(), 1);

    // Later acquisitions share the same store and ignore their transport.
    let other = serving_transport(5, "speed = 99;");
    let second = global::acquire_with(other.clone(), true, &config).unwrap();
    assert!(Arc::ptr_eq(&first.store(), &second.store()));
    assert_eq!(second.get_int("speed").unwrap(), 1);
    assert_eq!(other.requests_published(), 0);
    assert_eq!(global::reference_count(), 2);

    // Live updates reach every handle.
    transport.deliver(
        PARAM_UPDATE_CHANNEL,
        &ParamUpdate {
            utime: 0,
            server_id: 4,
            sequence_number: 10,
            params: "speed = 2;".to_string(),
        },
    );
    assert_eq!(first.get_int("speed").unwrap(), 2);
    assert_eq!(second.get_int("speed").unwrap(), 2);

    global::release(second);
    assert_eq!(global::reference_count(), 1);
    assert_eq!(transport.subscription_count(), 1);

    // The last release tears the store down and drops the subscription.
    let store = first.store();
    drop(first);
    assert_eq!(global::reference_count(), 0);
    assert_eq!(transport.subscription_count(), 0);
    assert_eq!(store.get_int("speed").unwrap(), 2);

    // A fresh acquisition builds a new store from the new transport.
    let third = global::acquire_with(other.clone(), false, &config).unwrap();
    assert_eq!(third.get_int("speed").unwrap(), 99);
    assert_eq!(third.server_id(), 5);
    assert_eq!(other.subscription_count(), 0);
    drop(third);
    assert_eq!(global::reference_count(), 0);

    assert_eq!(MAX_REFERENCES, 1 << 60);
}
