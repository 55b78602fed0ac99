//! Server Tests
//!
//! Runs a real server on an ephemeral port and talks to it with `Client`.

use std::io::Write;
use std::net::TcpStream;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;

use caskkv::network::{Client, Server};
use caskkv::protocol::{read_response, Status};
use caskkv::{CaskError, Config, Store};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

struct TestServer {
    _temp_dir: TempDir,
    addr: String,
    store: Arc<Store>,
    shutdown: Arc<std::sync::atomic::AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl TestServer {
    fn start() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::builder()
            .data_dir(temp_dir.path())
            .listen_addr("127.0.0.1:0")
            .max_connections(4)
            .read_timeout_ms(500)
            .build();
        let store = Arc::new(Store::open(config.clone()).unwrap());
        let server = Server::bind(config, Arc::clone(&store)).unwrap();
        let addr = server.local_addr().unwrap().to_string();
        let shutdown = server.shutdown_handle();

        let handle = thread::spawn(move || {
            server.run().unwrap();
        });

        Self {
            _temp_dir: temp_dir,
            addr,
            store,
            shutdown,
            handle: Some(handle),
        }
    }

    fn client(&self) -> Client {
        Client::connect(&self.addr).unwrap()
    }

    fn stop(mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            handle.join().unwrap();
        }
    }
}

fn pairs(items: &[(&str, &str)]) -> Vec<(String, Vec<u8>)> {
    items
        .iter()
        .map(|(k, v)| (k.to_string(), v.as_bytes().to_vec()))
        .collect()
}

// =============================================================================
// Client/Server Tests
// =============================================================================

#[test]
fn test_ping() {
    let server = TestServer::start();

    {
        let mut client = server.client();
        client.ping().unwrap();
    }

    server.stop();
}

#[test]
fn test_put_get_delete_over_tcp() {
    let server = TestServer::start();

    {
        let mut client = server.client();
        client.put("k", b"v").unwrap();
        assert_eq!(client.get("k").unwrap(), Some(b"v".to_vec()));

        client.put("empty", b"").unwrap();
        assert_eq!(client.get("empty").unwrap(), Some(Vec::new()));

        client.delete("k").unwrap();
        assert_eq!(client.get("k").unwrap(), None);
        assert_eq!(client.get("never").unwrap(), None);
    }

    assert_eq!(server.store.live_key_count(), 1);
    server.stop();
}

#[test]
fn test_batch_and_range_over_tcp() {
    let server = TestServer::start();

    {
        let mut client = server.client();
        client
            .batch_put(pairs(&[("a", "1"), ("b", "2"), ("c", "3")]))
            .unwrap();
        client.delete("b").unwrap();

        assert_eq!(
            client.range("c", "a").unwrap(),
            pairs(&[("a", "1"), ("c", "3")])
        );
        assert!(client.range("x", "z").unwrap().is_empty());
    }

    server.stop();
}

#[test]
fn test_stats_over_tcp() {
    let server = TestServer::start();

    {
        let mut client = server.client();
        client.put("a", b"1").unwrap();
        client.put("b", b"2").unwrap();

        let stats = client.stats().unwrap();
        assert_eq!(stats.live_keys, 2);
        assert_eq!(stats.sync_policy, "ALWAYS");
        assert_eq!(stats, server.store.stats().unwrap());
    }

    server.stop();
}

#[test]
fn test_multiple_clients_share_store() {
    let server = TestServer::start();

    let handles: Vec<_> = (0..3)
        .map(|t| {
            let addr = server.addr.clone();
            thread::spawn(move || {
                let mut client = Client::connect(&addr).unwrap();
                for i in 0..20 {
                    client
                        .put(&format!("c{}_{:02}", t, i), b"x")
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    {
        let mut client = server.client();
        assert_eq!(client.range("c0", "c9").unwrap().len(), 60);
    }

    server.stop();
}

#[test]
fn test_server_error_status_after_store_closed() {
    let server = TestServer::start();
    server.store.close().unwrap();

    {
        let mut client = server.client();
        let result = client.get("k");
        assert!(matches!(result, Err(CaskError::Network(_))));
    }

    server.stop();
}

fn assert_rejected<T: std::fmt::Debug>(result: caskkv::Result<T>, expected: &str) {
    match result {
        Err(CaskError::Network(message)) => assert!(
            message.contains(expected),
            "message {:?} should mention {:?}",
            message,
            expected
        ),
        other => panic!("Expected error status, got {:?}", other),
    }
}

#[test]
fn test_blank_keys_rejected_over_tcp() {
    let server = TestServer::start();

    {
        let mut client = server.client();
        client.put("kept", b"v").unwrap();

        assert_rejected(client.put("", b"v"), "key must not be blank");
        assert_rejected(client.put("   ", b"v"), "key must not be blank");
        assert_rejected(client.get(""), "key must not be blank");
        assert_rejected(client.delete(" "), "key must not be blank");
        assert_rejected(client.range("", "z"), "range start must not be blank");
        assert_rejected(client.range("a", ""), "range end must not be blank");
        assert_rejected(client.batch_put(Vec::new()), "at least one pair");
        assert_rejected(
            client.batch_put(pairs(&[("ok", "1"), ("", "2")])),
            "batch key #1 must not be blank",
        );

        // Connection stays usable after a rejection
        assert_eq!(client.get("kept").unwrap(), Some(b"v".to_vec()));
        assert_eq!(client.get("ok").unwrap(), None);
    }

    assert_eq!(server.store.live_key_count(), 1);
    assert_eq!(server.store.index_len(), 1);
    server.stop();
}

#[test]
fn test_malformed_frame_gets_error_response() {
    let server = TestServer::start();

    {
        let mut stream = TcpStream::connect(&server.addr).unwrap();
        // Unknown command 0x7F with empty payload
        stream.write_all(&[0x7F, 0x00, 0x00, 0x00, 0x00]).unwrap();
        stream.flush().unwrap();

        let response = read_response(&mut stream).unwrap();
        assert_eq!(response.status, Status::Error);
    }

    server.stop();
}

#[test]
fn test_connect_refused() {
    let server = TestServer::start();
    let addr = server.addr.clone();
    server.stop();

    assert!(matches!(Client::connect(&addr), Err(CaskError::Network(_))));
}
