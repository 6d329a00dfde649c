//! Contract between background work and the connection gateway

use ocrlink_auth::DeviceId;
use ocrlink_core::DeviceEvent;

/// Destination for events produced on behalf of a device
///
/// Delivery is best effort: `emit` reports whether the event reached a live
/// receiver and never queues it for later.
pub trait EventSink: Send + Sync {
    fn emit(&self, device_id: &DeviceId, event: &DeviceEvent) -> bool;
}
