//! SnackMachine Aggregate
//!
//! The cash-handling and inventory state machine. State is derived from
//! events, never directly mutated; commands validate against the current
//! snapshot and emit the event that `apply` then folds.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;

use crate::domain::{DomainError, MachineEvent, Money, OperationContext, Slot, SnackPile};

use super::{Aggregate, AuditStamp};

/// Commands accepted by a SnackMachine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MachineCommand {
    /// Put a machine into service with its initial cash and slot layout
    Initialize {
        machine_id: Uuid,
        money_inside: Money,
        slots: Vec<Slot>,
    },

    /// Take the machine out of service; terminal
    Remove,

    /// Operator tops up the cash reserve
    LoadMoney { money: Money },

    /// Operator collects all cash
    UnloadMoney,

    /// Customer inserts money toward a purchase
    InsertMoney { money: Money },

    /// Customer asks for their in-transaction money back
    ReturnMoney,

    /// Operator upserts the pile at a slot position
    LoadSnacks { position: u32, pile: SnackPile },

    /// Customer buys one snack from a slot
    BuySnack { position: u32 },
}

/// SnackMachine Aggregate
///
/// Tracks the cash inside the machine, the customer's in-transaction
/// credit, and the slot inventory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnackMachine {
    /// Unique machine ID
    id: Uuid,

    /// Current version (number of events applied)
    version: i64,

    /// Cash held by the machine, by denomination
    money_inside: Money,

    /// Money the customer has inserted but not yet spent or reclaimed
    amount_in_transaction: Decimal,

    /// Slots keyed by position (ordered, unique, non-negative)
    slots: BTreeMap<u32, Slot>,

    /// When the machine was put into service
    created: Option<AuditStamp>,

    /// Last mutation
    modified: Option<AuditStamp>,

    /// Set once the machine is removed; removal is terminal
    removed: Option<AuditStamp>,
}

impl Default for SnackMachine {
    fn default() -> Self {
        Self {
            id: Uuid::nil(),
            version: 0,
            money_inside: Money::none(),
            amount_in_transaction: Decimal::ZERO,
            slots: BTreeMap::new(),
            created: None,
            modified: None,
            removed: None,
        }
    }
}

impl SnackMachine {
    // =========================================================================
    // Getters
    // =========================================================================

    pub fn money_inside(&self) -> &Money {
        &self.money_inside
    }

    pub fn amount_in_transaction(&self) -> Decimal {
        self.amount_in_transaction
    }

    pub fn slots(&self) -> impl Iterator<Item = &Slot> {
        self.slots.values()
    }

    pub fn slot(&self, position: u32) -> Option<&Slot> {
        self.slots.get(&position)
    }

    pub fn is_removed(&self) -> bool {
        self.removed.is_some()
    }

    pub fn created(&self) -> Option<&AuditStamp> {
        self.created.as_ref()
    }

    pub fn modified(&self) -> Option<&AuditStamp> {
        self.modified.as_ref()
    }

    pub fn removed(&self) -> Option<&AuditStamp> {
        self.removed.as_ref()
    }

    /// Guards shared by every post-creation command.
    fn live_guard(&self) -> Vec<DomainError> {
        let mut reasons = Vec::new();
        if !self.is_initialized() {
            reasons.push(DomainError::NotInitialized);
        } else if self.is_removed() {
            reasons.push(DomainError::Removed);
        }
        reasons
    }

    /// Guards specific to buying from a slot, collected so a caller sees
    /// every violated precondition at once.
    fn buy_guard(&self, position: u32) -> Vec<DomainError> {
        let mut reasons = Vec::new();
        match self.slots.get(&position) {
            None => reasons.push(DomainError::SlotNotFound(position)),
            Some(slot) => match slot.pile() {
                None => reasons.push(DomainError::SlotEmpty(position)),
                Some(pile) => {
                    if !pile.has_stock() {
                        reasons.push(DomainError::OutOfStock(position));
                    }
                    if self.amount_in_transaction < pile.price() {
                        reasons.push(DomainError::InsufficientCredit {
                            price: pile.price(),
                            in_transaction: self.amount_in_transaction,
                        });
                    }
                }
            },
        }
        reasons
    }
}

impl Aggregate for SnackMachine {
    type Event = MachineEvent;
    type Command = MachineCommand;
    type Id = Uuid;

    fn aggregate_type() -> &'static str {
        "machine"
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn handle(
        &self,
        command: MachineCommand,
        ctx: &OperationContext,
    ) -> Result<Vec<MachineEvent>, Vec<DomainError>> {
        match command {
            MachineCommand::Initialize {
                machine_id,
                money_inside,
                slots,
            } => {
                let mut reasons = Vec::new();
                if self.is_initialized() {
                    reasons.push(DomainError::AlreadyInitialized);
                }
                let mut seen = HashSet::new();
                for slot in &slots {
                    if !seen.insert(slot.position()) {
                        reasons.push(DomainError::DuplicateSlotPosition(slot.position()));
                    }
                }
                if !reasons.is_empty() {
                    return Err(reasons);
                }
                Ok(vec![MachineEvent::MachineInitialized {
                    machine_id,
                    money_inside,
                    slots,
                    created_at: Utc::now(),
                    created_by: ctx.actor_id,
                }])
            }

            MachineCommand::Remove => {
                let reasons = self.live_guard();
                if !reasons.is_empty() {
                    return Err(reasons);
                }
                Ok(vec![MachineEvent::MachineRemoved {
                    machine_id: self.id,
                    removed_at: Utc::now(),
                    removed_by: ctx.actor_id,
                }])
            }

            MachineCommand::LoadMoney { money } => {
                let mut reasons = self.live_guard();
                if let Err(e) = self.money_inside.add(&money) {
                    reasons.push(DomainError::InvalidMoney(e.to_string()));
                }
                if !reasons.is_empty() {
                    return Err(reasons);
                }
                Ok(vec![MachineEvent::MoneyLoaded {
                    machine_id: self.id,
                    money,
                    loaded_at: Utc::now(),
                    loaded_by: ctx.actor_id,
                }])
            }

            MachineCommand::UnloadMoney => {
                let reasons = self.live_guard();
                if !reasons.is_empty() {
                    return Err(reasons);
                }
                Ok(vec![MachineEvent::MoneyUnloaded {
                    machine_id: self.id,
                    collected: self.money_inside,
                    unloaded_at: Utc::now(),
                    unloaded_by: ctx.actor_id,
                }])
            }

            MachineCommand::InsertMoney { money } => {
                let mut reasons = self.live_guard();
                if let Err(e) = self.money_inside.add(&money) {
                    reasons.push(DomainError::InvalidMoney(e.to_string()));
                }
                if !reasons.is_empty() {
                    return Err(reasons);
                }
                Ok(vec![MachineEvent::MoneyInserted {
                    machine_id: self.id,
                    money,
                    inserted_at: Utc::now(),
                    inserted_by: ctx.actor_id,
                }])
            }

            MachineCommand::ReturnMoney => {
                let reasons = self.live_guard();
                if !reasons.is_empty() {
                    return Err(reasons);
                }
                // Exact change only: when the greedy allocation cannot hit
                // the in-transaction amount exactly, the command is an
                // accepted no-op, not an error.
                match self.money_inside.allocate(self.amount_in_transaction) {
                    Some(allocation) => Ok(vec![MachineEvent::MoneyReturned {
                        machine_id: self.id,
                        money: allocation,
                        returned_at: Utc::now(),
                        returned_by: ctx.actor_id,
                    }]),
                    None => Ok(Vec::new()),
                }
            }

            MachineCommand::LoadSnacks { position, pile } => {
                let reasons = self.live_guard();
                if !reasons.is_empty() {
                    return Err(reasons);
                }
                Ok(vec![MachineEvent::SnacksLoaded {
                    machine_id: self.id,
                    position,
                    pile,
                    loaded_at: Utc::now(),
                    loaded_by: ctx.actor_id,
                }])
            }

            MachineCommand::BuySnack { position } => {
                let mut reasons = self.live_guard();
                if reasons.is_empty() {
                    reasons = self.buy_guard(position);
                }
                if !reasons.is_empty() {
                    return Err(reasons);
                }
                // Guard passed, so the pile is present.
                let pile = self
                    .slots
                    .get(&position)
                    .and_then(|s| s.pile())
                    .cloned()
                    .ok_or_else(|| vec![DomainError::SlotEmpty(position)])?;
                Ok(vec![MachineEvent::SnackBought {
                    machine_id: self.id,
                    position,
                    snack_id: pile.snack_id(),
                    price: pile.price(),
                    bought_at: Utc::now(),
                    bought_by: ctx.actor_id,
                }])
            }
        }
    }

    fn apply(mut self, event: MachineEvent) -> Self {
        match event {
            MachineEvent::MachineInitialized {
                machine_id,
                money_inside,
                slots,
                created_at,
                created_by,
            } => {
                self.id = machine_id;
                self.money_inside = money_inside;
                self.amount_in_transaction = Decimal::ZERO;
                self.slots = slots.into_iter().map(|s| (s.position(), s)).collect();
                self.created = Some(AuditStamp::new(created_at, created_by));
            }

            MachineEvent::MachineRemoved {
                removed_at,
                removed_by,
                ..
            } => {
                self.removed = Some(AuditStamp::new(removed_at, removed_by));
            }

            MachineEvent::MoneyLoaded {
                money,
                loaded_at,
                loaded_by,
                ..
            } => {
                match self.money_inside.add(&money) {
                    Ok(total) => self.money_inside = total,
                    Err(e) => {
                        tracing::error!(
                            "Money overflow during load replay for machine {}: {}",
                            self.id,
                            e
                        );
                    }
                }
                self.modified = Some(AuditStamp::new(loaded_at, loaded_by));
            }

            MachineEvent::MoneyUnloaded {
                unloaded_at,
                unloaded_by,
                ..
            } => {
                self.money_inside = Money::none();
                self.modified = Some(AuditStamp::new(unloaded_at, unloaded_by));
            }

            MachineEvent::MoneyInserted {
                money,
                inserted_at,
                inserted_by,
                ..
            } => {
                match self.money_inside.add(&money) {
                    Ok(total) => self.money_inside = total,
                    Err(e) => {
                        tracing::error!(
                            "Money overflow during insert replay for machine {}: {}",
                            self.id,
                            e
                        );
                    }
                }
                self.amount_in_transaction += money.amount();
                self.modified = Some(AuditStamp::new(inserted_at, inserted_by));
            }

            MachineEvent::MoneyReturned {
                money,
                returned_at,
                returned_by,
                ..
            } => {
                match self.money_inside.subtract(&money) {
                    Ok(rest) => {
                        self.money_inside = rest;
                        self.amount_in_transaction -= money.amount();
                    }
                    Err(e) => {
                        tracing::error!(
                            "Money underflow during return replay for machine {}: {}",
                            self.id,
                            e
                        );
                    }
                }
                self.modified = Some(AuditStamp::new(returned_at, returned_by));
            }

            MachineEvent::SnacksLoaded {
                position,
                pile,
                loaded_at,
                loaded_by,
                ..
            } => {
                self.slots
                    .entry(position)
                    .or_insert_with(|| Slot::empty(position))
                    .set_pile(pile);
                self.modified = Some(AuditStamp::new(loaded_at, loaded_by));
            }

            MachineEvent::SnackBought {
                position,
                price,
                bought_at,
                bought_by,
                ..
            } => {
                if let Some(slot) = self.slots.get_mut(&position) {
                    if let Some(pile) = slot.pile().cloned() {
                        slot.set_pile(pile.subtract_one());
                    }
                }
                self.amount_in_transaction -= price;
                self.modified = Some(AuditStamp::new(bought_at, bought_by));
            }
        }

        self.version += 1;
        self
    }
}
