//! Domain Events
//!
//! Event definitions for the fleet. Events are immutable facts; aggregate
//! state is a fold over them, so every field an `apply` needs must travel
//! in the event itself.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::money::Money;
use super::slot::{Slot, SnackPile};

/// Behavior shared by all event enums, required by the runtime and the
/// event stream to persist and route events generically.
pub trait DomainEvent:
    std::fmt::Debug + Clone + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Event type name, as stored in the log envelope.
    fn event_type(&self) -> &'static str;
}

/// Machine-related events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MachineEvent {
    /// Machine was put into service
    MachineInitialized {
        machine_id: Uuid,
        money_inside: Money,
        slots: Vec<Slot>,
        created_at: DateTime<Utc>,
        created_by: Option<Uuid>,
    },

    /// Machine was taken out of service (terminal)
    MachineRemoved {
        machine_id: Uuid,
        removed_at: DateTime<Utc>,
        removed_by: Option<Uuid>,
    },

    /// Operator loaded cash into the machine
    MoneyLoaded {
        machine_id: Uuid,
        money: Money,
        loaded_at: DateTime<Utc>,
        loaded_by: Option<Uuid>,
    },

    /// Operator collected all cash from the machine
    MoneyUnloaded {
        machine_id: Uuid,
        collected: Money,
        unloaded_at: DateTime<Utc>,
        unloaded_by: Option<Uuid>,
    },

    /// Customer inserted money toward a purchase
    MoneyInserted {
        machine_id: Uuid,
        money: Money,
        inserted_at: DateTime<Utc>,
        inserted_by: Option<Uuid>,
    },

    /// Machine returned the customer's in-transaction money
    MoneyReturned {
        machine_id: Uuid,
        money: Money,
        returned_at: DateTime<Utc>,
        returned_by: Option<Uuid>,
    },

    /// Operator loaded a pile of snacks into a slot
    SnacksLoaded {
        machine_id: Uuid,
        position: u32,
        pile: SnackPile,
        loaded_at: DateTime<Utc>,
        loaded_by: Option<Uuid>,
    },

    /// Customer bought one snack from a slot
    SnackBought {
        machine_id: Uuid,
        position: u32,
        snack_id: Uuid,
        price: Decimal,
        bought_at: DateTime<Utc>,
        bought_by: Option<Uuid>,
    },
}

impl MachineEvent {
    /// Get the machine ID this event relates to
    pub fn machine_id(&self) -> Uuid {
        match self {
            MachineEvent::MachineInitialized { machine_id, .. } => *machine_id,
            MachineEvent::MachineRemoved { machine_id, .. } => *machine_id,
            MachineEvent::MoneyLoaded { machine_id, .. } => *machine_id,
            MachineEvent::MoneyUnloaded { machine_id, .. } => *machine_id,
            MachineEvent::MoneyInserted { machine_id, .. } => *machine_id,
            MachineEvent::MoneyReturned { machine_id, .. } => *machine_id,
            MachineEvent::SnacksLoaded { machine_id, .. } => *machine_id,
            MachineEvent::SnackBought { machine_id, .. } => *machine_id,
        }
    }
}

impl DomainEvent for MachineEvent {
    fn event_type(&self) -> &'static str {
        match self {
            MachineEvent::MachineInitialized { .. } => "MachineInitialized",
            MachineEvent::MachineRemoved { .. } => "MachineRemoved",
            MachineEvent::MoneyLoaded { .. } => "MoneyLoaded",
            MachineEvent::MoneyUnloaded { .. } => "MoneyUnloaded",
            MachineEvent::MoneyInserted { .. } => "MoneyInserted",
            MachineEvent::MoneyReturned { .. } => "MoneyReturned",
            MachineEvent::SnacksLoaded { .. } => "SnacksLoaded",
            MachineEvent::SnackBought { .. } => "SnackBought",
        }
    }
}

/// Snack-catalog events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SnackEvent {
    /// Snack was added to the catalog
    SnackInitialized {
        snack_id: Uuid,
        name: String,
        picture_url: Option<String>,
        created_at: DateTime<Utc>,
        created_by: Option<Uuid>,
    },

    /// Snack was renamed
    SnackRenamed {
        snack_id: Uuid,
        name: String,
        renamed_at: DateTime<Utc>,
        renamed_by: Option<Uuid>,
    },

    /// Snack picture URL was set or cleared
    SnackPictureChanged {
        snack_id: Uuid,
        picture_url: Option<String>,
        changed_at: DateTime<Utc>,
        changed_by: Option<Uuid>,
    },

    /// Snack was removed from the catalog (terminal)
    SnackRemoved {
        snack_id: Uuid,
        removed_at: DateTime<Utc>,
        removed_by: Option<Uuid>,
    },
}

impl SnackEvent {
    /// Get the snack ID this event relates to
    pub fn snack_id(&self) -> Uuid {
        match self {
            SnackEvent::SnackInitialized { snack_id, .. } => *snack_id,
            SnackEvent::SnackRenamed { snack_id, .. } => *snack_id,
            SnackEvent::SnackPictureChanged { snack_id, .. } => *snack_id,
            SnackEvent::SnackRemoved { snack_id, .. } => *snack_id,
        }
    }
}

impl DomainEvent for SnackEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SnackEvent::SnackInitialized { .. } => "SnackInitialized",
            SnackEvent::SnackRenamed { .. } => "SnackRenamed",
            SnackEvent::SnackPictureChanged { .. } => "SnackPictureChanged",
            SnackEvent::SnackRemoved { .. } => "SnackRemoved",
        }
    }
}

/// Purchase-record events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PurchaseEvent {
    /// A completed sale was recorded; the record never changes afterwards
    PurchaseRecorded {
        purchase_id: Uuid,
        machine_id: Uuid,
        slot_position: u32,
        snack_id: Uuid,
        price: Decimal,
        bought_at: DateTime<Utc>,
        bought_by: Option<Uuid>,
    },
}

impl PurchaseEvent {
    /// Get the purchase ID this event relates to
    pub fn purchase_id(&self) -> Uuid {
        match self {
            PurchaseEvent::PurchaseRecorded { purchase_id, .. } => *purchase_id,
        }
    }
}

impl DomainEvent for PurchaseEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PurchaseEvent::PurchaseRecorded { .. } => "PurchaseRecorded",
        }
    }
}

/// Sale-finalization marker events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SaleEvent {
    /// A specific buy attempt was finalized into a purchase record
    SaleFinalized {
        sale_key: String,
        purchase_id: Uuid,
        finalized_at: DateTime<Utc>,
    },
}

impl DomainEvent for SaleEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SaleEvent::SaleFinalized { .. } => "SaleFinalized",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_machine_event_serialization() {
        let event = MachineEvent::SnackBought {
            machine_id: Uuid::new_v4(),
            position: 1,
            snack_id: Uuid::new_v4(),
            price: dec!(3),
            bought_at: Utc::now(),
            bought_by: None,
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("SnackBought"));

        let deserialized: MachineEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event.event_type(), deserialized.event_type());
        assert_eq!(event.machine_id(), deserialized.machine_id());
    }

    #[test]
    fn test_money_round_trips_inside_event() {
        let event = MachineEvent::MoneyLoaded {
            machine_id: Uuid::new_v4(),
            money: Money::new(1, 2, 3, 4, 5, 6, 7),
            loaded_at: Utc::now(),
            loaded_by: Some(Uuid::new_v4()),
        };

        let json = serde_json::to_value(&event).unwrap();
        let back: MachineEvent = serde_json::from_value(json).unwrap();
        assert_eq!(event, back);
    }

    #[test]
    fn test_snack_event_types() {
        let event = SnackEvent::SnackRenamed {
            snack_id: Uuid::new_v4(),
            name: "Chocolate bar".to_string(),
            renamed_at: Utc::now(),
            renamed_by: None,
        };
        assert_eq!(event.event_type(), "SnackRenamed");
    }
}
