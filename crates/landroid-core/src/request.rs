// ── Request/response over the broker ──
//
// One exchange: subscribe to the status topic (acknowledged), publish the
// command, take the next reply, unsubscribe. Exchanges on one client never
// overlap; the admission gate queues callers in arrival order.

use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use landroid_api::MqttTopics;

use crate::config::ReplyMatching;
use crate::error::CoreError;
use crate::model::{CommandEnvelope, MowerStatus};
use crate::transport::{MessagingTransport, QoS, Subscription};

pub(crate) struct RequestCoordinator {
    gate: Mutex<()>,
    timeout: Duration,
    language: String,
    matching: ReplyMatching,
}

impl RequestCoordinator {
    pub(crate) fn new(timeout: Duration, language: String, matching: ReplyMatching) -> Self {
        Self {
            gate: Mutex::new(()),
            timeout,
            language,
            matching,
        }
    }

    /// Ask the device for its status and wait for the reply.
    pub(crate) async fn request_status(
        &self,
        transport: &dyn MessagingTransport,
        topics: &MqttTopics,
    ) -> Result<MowerStatus, CoreError> {
        let _admitted = self.gate.lock().await;

        let command = CommandEnvelope::ping(&self.language);
        let payload = command.to_bytes().map_err(|e| CoreError::Transport {
            message: format!("cannot encode command: {e}"),
        })?;

        let mut subscription = transport
            .subscribe(&topics.command_out, QoS::AtLeastOnce)
            .await?;

        debug!(id = command.id, topic = %topics.command_in, "sending status request");
        if let Err(e) = transport
            .publish(&topics.command_in, payload, QoS::AtLeastOnce)
            .await
        {
            release(transport, subscription).await;
            return Err(e.into());
        }

        let outcome = tokio::time::timeout(
            self.timeout,
            await_reply(&mut subscription, command.id, self.matching),
        )
        .await;
        release(transport, subscription).await;

        match outcome {
            Ok(result) => result,
            Err(_) => {
                warn!(id = command.id, timeout = ?self.timeout, "no reply from device");
                Err(CoreError::RequestTimeout {
                    timeout_secs: whole_seconds(self.timeout),
                })
            }
        }
    }
}

async fn await_reply(
    subscription: &mut Subscription,
    command_id: i64,
    matching: ReplyMatching,
) -> Result<MowerStatus, CoreError> {
    loop {
        let Some(message) = subscription.recv().await else {
            return Err(CoreError::Transport {
                message: "connection closed before the device replied".into(),
            });
        };

        if matching == ReplyMatching::FirstMessage {
            return decode(&message.payload);
        }
        match decode(&message.payload) {
            Ok(status) if status.command_id() == Some(command_id) => return Ok(status),
            Err(e) => debug!(error = %e, "ignoring undecodable message"),
            Ok(status) => {
                debug!(
                    expected = command_id,
                    got = ?status.command_id(),
                    "ignoring reply to another command"
                );
            }
        }
    }
}

fn decode(payload: &[u8]) -> Result<MowerStatus, CoreError> {
    std::str::from_utf8(payload).map_err(|e| CoreError::PayloadDecode {
        message: format!("reply is not UTF-8: {e}"),
    })?;
    MowerStatus::from_slice(payload).map_err(|e| CoreError::PayloadDecode {
        message: e.to_string(),
    })
}

/// Seconds for display, rounded up so sub-second timeouts never read as 0.
fn whole_seconds(timeout: Duration) -> u64 {
    timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0)
}

/// Drop the handler and unsubscribe. Failures are logged only.
async fn release(transport: &dyn MessagingTransport, subscription: Subscription) {
    let topic = subscription.topic().to_owned();
    drop(subscription);
    if let Err(e) = transport.unsubscribe(&topic).await {
        warn!(%topic, error = %e, "unsubscribe failed");
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use std::sync::Arc;

    use bytes::Bytes;
    use pretty_assertions::assert_eq;

    use crate::connection::ConnectionConfig;
    use crate::transport::{InMemoryTransport, TransportOp};
    use landroid_api::AccessToken;

    fn topics() -> MqttTopics {
        MqttTopics {
            command_in: "in".into(),
            command_out: "out".into(),
        }
    }

    async fn connected(transport: InMemoryTransport) -> Arc<InMemoryTransport> {
        let config = ConnectionConfig::build(
            &AccessToken::new("h.p.s"),
            1,
            "ep",
            Duration::from_secs(30),
        )
        .unwrap();
        transport.connect(&config).await.unwrap();
        Arc::new(transport)
    }

    fn coordinator(matching: ReplyMatching) -> RequestCoordinator {
        RequestCoordinator::new(Duration::from_secs(30), "de".into(), matching)
    }

    fn exchange_ops(transport: &InMemoryTransport) -> Vec<TransportOp> {
        transport
            .operations()
            .into_iter()
            .filter(|op| !matches!(op, TransportOp::Connect { .. }))
            .collect()
    }

    #[tokio::test]
    async fn first_message_resolves() {
        let transport = connected(
            InMemoryTransport::new().with_device("in", "out", r#"{"cfg":{},"dat":{"bt":{"p":77}}}"#),
        )
        .await;

        let status = coordinator(ReplyMatching::FirstMessage)
            .request_status(transport.as_ref(), &topics())
            .await
            .unwrap();

        assert_eq!(status.battery_percent(), Some(77));
    }

    #[tokio::test]
    async fn subscribes_before_publishing_and_unsubscribes_after() {
        let transport = connected(
            InMemoryTransport::new().with_device("in", "out", r#"{"cfg":{},"dat":{}}"#),
        )
        .await;

        coordinator(ReplyMatching::FirstMessage)
            .request_status(transport.as_ref(), &topics())
            .await
            .unwrap();

        let ops = exchange_ops(&transport);
        assert_eq!(ops.len(), 3);
        assert_eq!(ops[0], TransportOp::Subscribe { topic: "out".into() });
        let TransportOp::Publish { topic, payload } = &ops[1] else {
            panic!("expected publish, got {:?}", ops[1]);
        };
        assert_eq!(topic, "in");
        let sent: serde_json::Value = serde_json::from_slice(payload).unwrap();
        assert_eq!(sent["cmd"], 0);
        assert_eq!(sent["lg"], "de");
        assert_eq!(ops[2], TransportOp::Unsubscribe { topic: "out".into() });
    }

    #[tokio::test]
    async fn malformed_reply_is_decode_error() {
        let transport =
            connected(InMemoryTransport::new().with_device("in", "out", "not json")).await;

        let err = coordinator(ReplyMatching::FirstMessage)
            .request_status(transport.as_ref(), &topics())
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::PayloadDecode { .. }), "got: {err:?}");
        assert_eq!(
            exchange_ops(&transport).last(),
            Some(&TransportOp::Unsubscribe { topic: "out".into() })
        );
    }

    #[tokio::test]
    async fn invalid_utf8_is_decode_error() {
        let transport = connected(
            InMemoryTransport::new().with_device("in", "out", Bytes::from_static(&[0xff, 0xfe])),
        )
        .await;

        let err = coordinator(ReplyMatching::FirstMessage)
            .request_status(transport.as_ref(), &topics())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::PayloadDecode { .. }), "got: {err:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_unsubscribes() {
        let transport = connected(InMemoryTransport::new()).await;

        let err = coordinator(ReplyMatching::FirstMessage)
            .request_status(transport.as_ref(), &topics())
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::RequestTimeout { timeout_secs: 30 }));
        assert_eq!(
            exchange_ops(&transport).last(),
            Some(&TransportOp::Unsubscribe { topic: "out".into() })
        );
        assert_eq!(transport.handler_count("out"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn sub_second_timeout_reports_one_second() {
        let transport = connected(InMemoryTransport::new()).await;
        let coordinator = RequestCoordinator::new(
            Duration::from_millis(50),
            "de".into(),
            ReplyMatching::FirstMessage,
        );

        let err = coordinator
            .request_status(transport.as_ref(), &topics())
            .await
            .unwrap_err();

        assert!(
            matches!(err, CoreError::RequestTimeout { timeout_secs: 1 }),
            "got: {err:?}"
        );
        assert_eq!(err.to_string(), "No reply from device within 1s");
    }

    #[tokio::test]
    async fn publish_failure_unsubscribes() {
        let transport = connected(InMemoryTransport::new().failing_publish("queue full")).await;

        let err = coordinator(ReplyMatching::FirstMessage)
            .request_status(transport.as_ref(), &topics())
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::Transport { .. }), "got: {err:?}");
        assert_eq!(
            exchange_ops(&transport).last(),
            Some(&TransportOp::Unsubscribe { topic: "out".into() })
        );
    }

    #[tokio::test]
    async fn command_id_matching_skips_stale_replies() {
        let transport = connected(InMemoryTransport::new().with_responder(|topic, payload| {
            if topic != "in" {
                return Vec::new();
            }
            let sent: serde_json::Value = serde_json::from_slice(payload).unwrap();
            let stale = r#"{"cfg":{"id":1},"dat":{"bt":{"p":10}}}"#.to_string();
            let fresh = format!(r#"{{"cfg":{{"id":{}}},"dat":{{"bt":{{"p":55}}}}}}"#, sent["id"]);
            vec![
                ("out".to_string(), Bytes::from(stale)),
                ("out".to_string(), Bytes::from(fresh)),
            ]
        }))
        .await;

        let status = coordinator(ReplyMatching::CommandId)
            .request_status(transport.as_ref(), &topics())
            .await
            .unwrap();

        assert_eq!(status.battery_percent(), Some(55));
    }

    #[tokio::test]
    async fn command_id_matching_skips_undecodable_messages() {
        let transport = connected(InMemoryTransport::new().with_responder(|topic, payload| {
            if topic != "in" {
                return Vec::new();
            }
            let sent: serde_json::Value = serde_json::from_slice(payload).unwrap();
            let fresh = format!(r#"{{"cfg":{{"id":{}}},"dat":{{"bt":{{"p":64}}}}}}"#, sent["id"]);
            vec![
                ("out".to_string(), Bytes::from_static(b"firmware banner")),
                ("out".to_string(), Bytes::from(fresh)),
            ]
        }))
        .await;

        let status = coordinator(ReplyMatching::CommandId)
            .request_status(transport.as_ref(), &topics())
            .await
            .unwrap();

        assert_eq!(status.battery_percent(), Some(64));
    }
}
