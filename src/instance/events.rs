use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

use crate::zone::GridPos;

/// Notifications raised by the instance manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ZoneEvent {
    InstanceCreated {
        instance_id: String,
        template_id: String,
        player_id: String,
    },
    WaypointUnlocked {
        instance_id: String,
        template_id: String,
        player_id: String,
    },
    MonsterPackDefeated {
        instance_id: String,
        position: GridPos,
        experience: u32,
    },
    ZoneCleared {
        instance_id: String,
        template_id: String,
        player_id: String,
    },
    InstancesCleaned {
        count: usize,
    },
}

/// Fire-and-forget receiver of zone events.
pub trait ZoneEventSink: Send {
    fn emit(&mut self, event: ZoneEvent);
}

/// Default sink: events only go to the log.
#[derive(Debug, Default)]
pub struct LogSink;

impl ZoneEventSink for LogSink {
    fn emit(&mut self, event: ZoneEvent) {
        log::info!("zone event: {:?}", event);
    }
}

impl ZoneEventSink for UnboundedSender<ZoneEvent> {
    fn emit(&mut self, event: ZoneEvent) {
        log::debug!("zone event: {:?}", event);
        // A dropped receiver just means nobody is listening any more.
        let _ = self.send(event);
    }
}
