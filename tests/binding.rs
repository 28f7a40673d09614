//! Listener rebinding against real sockets.

use std::net::SocketAddr;
use std::time::Duration;

use panel_settings::net::{BindInfo, BindingError};
use panel_settings::store::{SettingKey, SettingsStoreExt};
use panel_settings::{ErrorKind, SettingsError};

mod common;

fn loopback(port: u16) -> BindInfo {
    BindInfo {
        bind_address: "127.0.0.1".to_string(),
        ipv6: false,
        port,
    }
}

#[tokio::test]
async fn test_port_in_use_keeps_original_listener() {
    let t = common::start_panel(false).await;
    let original = t.panel.local_addr;
    assert!(common::probe_status(original).await);

    let holder = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let taken = holder.local_addr().unwrap().port();

    let err = t
        .panel
        .service
        .update_binding(loopback(taken))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SettingsError::Binding(BindingError::PortInUse(_))
    ));
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(common::probe_status(original).await);
    assert_eq!(
        t.store.get_u64(SettingKey::ServerPort).unwrap(),
        u64::from(original.port())
    );
}

#[tokio::test]
async fn test_rebind_moves_traffic_and_persists() {
    let t = common::start_panel(false).await;
    let original = t.panel.local_addr;
    let port = common::free_port();

    let addr = t.panel.service.update_port(port).await.unwrap();

    assert_eq!(addr, SocketAddr::from(([127, 0, 0, 1], port)));
    assert!(common::probe_status(addr).await);
    assert!(common::wait_until_closed(original, Duration::from_secs(3)).await);
    assert_eq!(t.store.get_key(SettingKey::ServerPort).unwrap(), port.to_string());
    assert_eq!(t.panel.service.current_binding().unwrap(), loopback(port));
}

#[tokio::test]
async fn test_rebind_to_same_port_through_generic_update() {
    let t = common::start_panel(false).await;
    let port = t.panel.local_addr.port();

    // Same address, IPv6 toggled off explicitly: persisted value unchanged.
    t.panel.service.update("Ipv6", "disable").await.unwrap();
    assert!(common::probe_status(t.panel.local_addr).await);

    t.panel
        .service
        .update("ServerPort", &port.to_string())
        .await
        .unwrap();
    assert!(common::probe_status(t.panel.local_addr).await);
}

#[tokio::test]
async fn test_persist_failure_discards_new_listener() {
    let t = common::start_panel(false).await;
    let original = t.panel.local_addr;
    let port = common::free_port();
    t.store.fail_on("Ipv6");

    let err = t.panel.service.update_port(port).await.unwrap_err();

    // ServerPort and BindAddress were written, then reverted.
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert_eq!(
        t.store.get_u64(SettingKey::ServerPort).unwrap(),
        u64::from(original.port())
    );
    assert!(common::probe_status(original).await);
    assert!(
        common::wait_until_closed(SocketAddr::from(([127, 0, 0, 1], port)), Duration::from_secs(3))
            .await
    );
}

#[cfg(unix)]
#[tokio::test]
async fn test_port_shared_with_reuse_port_listener_is_conflict() {
    use socket2::{Domain, Protocol, Socket, Type};

    let t = common::start_panel(false).await;
    let holder = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP)).unwrap();
    holder.set_reuse_address(true).unwrap();
    holder.set_reuse_port(true).unwrap();
    holder
        .bind(&SocketAddr::from(([127, 0, 0, 1], 0)).into())
        .unwrap();
    holder.listen(16).unwrap();
    let taken = holder.local_addr().unwrap().as_socket().unwrap().port();

    let err = t.panel.service.update_port(taken).await.unwrap_err();

    assert!(matches!(
        err,
        SettingsError::Binding(BindingError::PortInUse(_))
    ));
    assert_eq!(
        t.store.get_u64(SettingKey::ServerPort).unwrap(),
        u64::from(t.panel.local_addr.port())
    );
}

#[tokio::test]
async fn test_interface_listing_offers_loopback() {
    let t = common::start_panel(false).await;
    let listed = t.panel.service.interface_addresses().unwrap();
    assert!(listed
        .iter()
        .any(|a| a.address == "127.0.0.1".parse::<std::net::IpAddr>().unwrap()));
}

#[tokio::test]
async fn test_non_local_address_is_invalid() {
    let t = common::start_panel(false).await;
    let err = t
        .panel
        .service
        .update_binding(BindInfo {
            bind_address: "203.0.113.10".to_string(),
            ipv6: false,
            port: common::free_port(),
        })
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(common::probe_status(t.panel.local_addr).await);
}
