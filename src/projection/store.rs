//! Read-model rows
//!
//! Denormalized copies of aggregate state, keyed by entity id and carrying
//! the version of the last event applied to them. Rows serve the read path
//! only; the Synchronizer is the sole writer, and every row is rebuildable
//! from the event log.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use crate::aggregate::{Aggregate, Purchase, Snack, SnackMachine};

/// Flattened slot state inside a MachineInfo row.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotInfo {
    pub position: u32,
    pub snack_id: Option<Uuid>,
    pub quantity: u32,
    pub price: Decimal,
}

/// Read model for one machine.
#[derive(Debug, Clone, PartialEq)]
pub struct MachineInfo {
    pub id: Uuid,
    pub version: i64,
    pub money_inside: Decimal,
    pub amount_in_transaction: Decimal,
    pub slots: Vec<SlotInfo>,
    pub removed: bool,
}

impl MachineInfo {
    /// Derive the full row from a machine snapshot.
    pub fn from_aggregate(machine: &SnackMachine) -> Self {
        Self {
            id: machine.id(),
            version: machine.version(),
            money_inside: machine.money_inside().amount(),
            amount_in_transaction: machine.amount_in_transaction(),
            slots: machine
                .slots()
                .map(|slot| SlotInfo {
                    position: slot.position(),
                    snack_id: slot.pile().map(|p| p.snack_id()),
                    quantity: slot.pile().map_or(0, |p| p.quantity()),
                    price: slot.pile().map_or(Decimal::ZERO, |p| p.price()),
                })
                .collect(),
            removed: machine.is_removed(),
        }
    }
}

/// Read model for one snack.
#[derive(Debug, Clone, PartialEq)]
pub struct SnackInfo {
    pub id: Uuid,
    pub version: i64,
    pub name: String,
    pub picture_url: Option<String>,
    pub removed: bool,
}

impl SnackInfo {
    pub fn from_aggregate(snack: &Snack) -> Self {
        Self {
            id: snack.id(),
            version: snack.version(),
            name: snack.name().to_string(),
            picture_url: snack.picture_url().map(str::to_string),
            removed: snack.is_removed(),
        }
    }
}

/// Read model for one purchase.
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseInfo {
    pub id: Uuid,
    pub version: i64,
    pub machine_id: Uuid,
    pub slot_position: u32,
    pub snack_id: Uuid,
    pub price: Decimal,
    pub bought_at: Option<DateTime<Utc>>,
    pub bought_by: Option<Uuid>,
}

impl PurchaseInfo {
    pub fn from_aggregate(purchase: &Purchase) -> Self {
        Self {
            id: purchase.id(),
            version: purchase.version(),
            machine_id: purchase.machine_id(),
            slot_position: purchase.slot_position(),
            snack_id: purchase.snack_id(),
            price: purchase.price(),
            bought_at: purchase.bought_at(),
            bought_by: purchase.bought_by(),
        }
    }
}

/// In-memory projection rows. The relational mapping of these rows is an
/// external collaborator; this store is the contract it fulfills.
#[derive(Debug, Default)]
pub struct ProjectionStore {
    machines: RwLock<HashMap<Uuid, MachineInfo>>,
    snacks: RwLock<HashMap<Uuid, SnackInfo>>,
    purchases: RwLock<HashMap<Uuid, PurchaseInfo>>,
}

impl ProjectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn machine(&self, id: Uuid) -> Option<MachineInfo> {
        self.machines
            .read()
            .expect("projection lock poisoned")
            .get(&id)
            .cloned()
    }

    pub fn snack(&self, id: Uuid) -> Option<SnackInfo> {
        self.snacks
            .read()
            .expect("projection lock poisoned")
            .get(&id)
            .cloned()
    }

    pub fn purchase(&self, id: Uuid) -> Option<PurchaseInfo> {
        self.purchases
            .read()
            .expect("projection lock poisoned")
            .get(&id)
            .cloned()
    }

    pub fn machine_ids(&self) -> Vec<Uuid> {
        self.machines
            .read()
            .expect("projection lock poisoned")
            .keys()
            .copied()
            .collect()
    }

    pub fn snack_ids(&self) -> Vec<Uuid> {
        self.snacks
            .read()
            .expect("projection lock poisoned")
            .keys()
            .copied()
            .collect()
    }

    pub fn purchase_ids(&self) -> Vec<Uuid> {
        self.purchases
            .read()
            .expect("projection lock poisoned")
            .keys()
            .copied()
            .collect()
    }

    pub fn put_machine(&self, info: MachineInfo) {
        self.machines
            .write()
            .expect("projection lock poisoned")
            .insert(info.id, info);
    }

    pub fn put_snack(&self, info: SnackInfo) {
        self.snacks
            .write()
            .expect("projection lock poisoned")
            .insert(info.id, info);
    }

    pub fn put_purchase(&self, info: PurchaseInfo) {
        self.purchases
            .write()
            .expect("projection lock poisoned")
            .insert(info.id, info);
    }

    /// Mutate the machine row in place under the write lock. Returns false
    /// when the row does not exist.
    pub fn update_machine<F: FnOnce(&mut MachineInfo)>(&self, id: Uuid, update: F) -> bool {
        let mut machines = self.machines.write().expect("projection lock poisoned");
        match machines.get_mut(&id) {
            Some(info) => {
                update(info);
                true
            }
            None => false,
        }
    }

    /// Mutate the snack row in place under the write lock.
    pub fn update_snack<F: FnOnce(&mut SnackInfo)>(&self, id: Uuid, update: F) -> bool {
        let mut snacks = self.snacks.write().expect("projection lock poisoned");
        match snacks.get_mut(&id) {
            Some(info) => {
                update(info);
                true
            }
            None => false,
        }
    }

    /// Remove a machine row (also used by tests to simulate out-of-band
    /// deletion).
    pub fn remove_machine(&self, id: Uuid) -> Option<MachineInfo> {
        self.machines
            .write()
            .expect("projection lock poisoned")
            .remove(&id)
    }

    pub fn remove_snack(&self, id: Uuid) -> Option<SnackInfo> {
        self.snacks
            .write()
            .expect("projection lock poisoned")
            .remove(&id)
    }

    pub fn remove_purchase(&self, id: Uuid) -> Option<PurchaseInfo> {
        self.purchases
            .write()
            .expect("projection lock poisoned")
            .remove(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn machine_info(id: Uuid, version: i64) -> MachineInfo {
        MachineInfo {
            id,
            version,
            money_inside: dec!(10),
            amount_in_transaction: Decimal::ZERO,
            slots: Vec::new(),
            removed: false,
        }
    }

    #[test]
    fn test_put_and_get() {
        let store = ProjectionStore::new();
        let id = Uuid::new_v4();
        store.put_machine(machine_info(id, 1));

        let row = store.machine(id).unwrap();
        assert_eq!(row.version, 1);
        assert_eq!(row.money_inside, dec!(10));
        assert!(store.machine(Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_update_in_place() {
        let store = ProjectionStore::new();
        let id = Uuid::new_v4();
        store.put_machine(machine_info(id, 1));

        let updated = store.update_machine(id, |info| {
            info.version = 2;
            info.money_inside = dec!(15);
        });
        assert!(updated);
        assert_eq!(store.machine(id).unwrap().version, 2);

        assert!(!store.update_machine(Uuid::new_v4(), |_| {}));
    }

    #[test]
    fn test_remove() {
        let store = ProjectionStore::new();
        let id = Uuid::new_v4();
        store.put_machine(machine_info(id, 1));

        assert!(store.remove_machine(id).is_some());
        assert!(store.machine(id).is_none());
        assert!(store.machine_ids().is_empty());
    }
}
