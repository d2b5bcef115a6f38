//! NATS fixture with JetStream enabled.

use async_nats::{Client, Subscriber};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::nats::Nats;

const CLIENT_PORT: u16 = 4222;

/// A throwaway NATS server for integration tests.
///
/// The container is removed when the value is dropped.
///
/// ```no_run
/// use test_utils::TestNats;
///
/// # async fn example() {
/// let nats = TestNats::new().await;
/// let jetstream = nats.jetstream();
/// nats.publish_event("events.notification.update.analysis", b"{}".to_vec()).await;
/// # }
/// ```
pub struct TestNats {
    _container: ContainerAsync<Nats>,
    client: Client,
    pub url: String,
}

impl TestNats {
    /// Start the server with `-js` and connect a client.
    pub async fn new() -> Self {
        let container = Nats::default()
            .with_tag("latest")
            .with_cmd(["-js"])
            .start()
            .await
            .expect("NATS container did not start");

        let port = container
            .get_host_port_ipv4(CLIENT_PORT)
            .await
            .expect("NATS client port is not mapped");
        let url = format!("nats://127.0.0.1:{port}");

        let client = async_nats::connect(&url)
            .await
            .expect("Could not connect to the NATS container");

        tracing::info!(%url, "NATS fixture ready");

        Self {
            _container: container,
            client,
            url,
        }
    }

    pub fn client(&self) -> Client {
        self.client.clone()
    }

    pub fn jetstream(&self) -> async_nats::jetstream::Context {
        async_nats::jetstream::new(self.client.clone())
    }

    /// Subscribe to a core NATS subject, e.g. `notification.>`.
    pub async fn subscribe(&self, subject: &str) -> Subscriber {
        self.client
            .subscribe(subject.to_string())
            .await
            .expect("Subscription was rejected")
    }

    /// Publish an event into JetStream and return its stream sequence.
    ///
    /// A stream capturing `subject` must already exist.
    pub async fn publish_event(&self, subject: &str, body: Vec<u8>) -> u64 {
        self.jetstream()
            .publish(subject.to_string(), body.into())
            .await
            .expect("Event publish failed")
            .await
            .expect("Event was not acknowledged by the stream")
            .sequence
    }
}
