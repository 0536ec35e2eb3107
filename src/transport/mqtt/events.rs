//! Pure routing of rumqttc events
//!
//! The event pump feeds every event through [`route_event`] and acts on the
//! returned route; keeping the decision separate from the I/O loop keeps it
//! testable.

use bytes::Bytes;
use rumqttc::v5::mqttbytes::v5::{ConnectReturnCode, Packet};
use rumqttc::v5::Event;

/// Routing decision for a single MQTT event
#[derive(Debug, Clone)]
pub enum EventRoute {
    /// ConnAck accepted - connection is usable
    ConnectionAcknowledged,
    /// ConnAck refused, with the broker's reason code
    ConnectionRejected(String),
    /// Message received on a subscribed topic
    MessageReceived { topic: String, payload: Bytes },
    /// Broker closed the connection
    Disconnected,
    /// Keep-alive traffic, acks, outgoing events - nothing to do
    Ignored,
}

pub fn route_event(event: &Event) -> EventRoute {
    match event {
        Event::Incoming(packet) => match packet {
            Packet::ConnAck(ack) => {
                if ack.code == ConnectReturnCode::Success {
                    EventRoute::ConnectionAcknowledged
                } else {
                    EventRoute::ConnectionRejected(format!("{:?}", ack.code))
                }
            }
            Packet::Publish(publish) => EventRoute::MessageReceived {
                topic: String::from_utf8_lossy(&publish.topic).to_string(),
                payload: publish.payload.clone(),
            },
            Packet::Disconnect(_) => EventRoute::Disconnected,
            _ => EventRoute::Ignored,
        },
        Event::Outgoing(_) => EventRoute::Ignored,
    }
}
