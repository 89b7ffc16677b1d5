//! Snack Aggregate
//!
//! Catalog entry for a snack product: a name and an optional picture URL.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{DomainError, OperationContext, SnackEvent};

use super::{Aggregate, AuditStamp};

/// Maximum snack name length
const MAX_NAME_LEN: usize = 100;

/// Maximum picture URL length
const MAX_PICTURE_URL_LEN: usize = 500;

/// Commands accepted by a Snack
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SnackCommand {
    /// Add a snack to the catalog
    Initialize {
        snack_id: Uuid,
        name: String,
        picture_url: Option<String>,
    },

    /// Rename the snack
    ChangeName { name: String },

    /// Set or clear the picture URL
    ChangePictureUrl { picture_url: Option<String> },

    /// Remove the snack from the catalog; terminal
    Remove,
}

/// Snack Aggregate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snack {
    id: Uuid,
    version: i64,
    name: String,
    picture_url: Option<String>,
    created: Option<AuditStamp>,
    modified: Option<AuditStamp>,
    removed: Option<AuditStamp>,
}

impl Default for Snack {
    fn default() -> Self {
        Self {
            id: Uuid::nil(),
            version: 0,
            name: String::new(),
            picture_url: None,
            created: None,
            modified: None,
            removed: None,
        }
    }
}

impl Snack {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn picture_url(&self) -> Option<&str> {
        self.picture_url.as_deref()
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

    fn live_guard(&self) -> Vec<DomainError> {
        let mut reasons = Vec::new();
        if !self.is_initialized() {
            reasons.push(DomainError::NotInitialized);
        } else if self.is_removed() {
            reasons.push(DomainError::Removed);
        }
        reasons
    }

    fn name_guard(name: &str, reasons: &mut Vec<DomainError>) {
        if name.trim().is_empty() {
            reasons.push(DomainError::EmptyName);
        } else if name.chars().count() > MAX_NAME_LEN {
            reasons.push(DomainError::NameTooLong {
                length: name.chars().count(),
                max: MAX_NAME_LEN,
            });
        }
    }

    fn picture_url_guard(picture_url: Option<&str>, reasons: &mut Vec<DomainError>) {
        if let Some(url) = picture_url {
            if url.chars().count() > MAX_PICTURE_URL_LEN {
                reasons.push(DomainError::PictureUrlTooLong {
                    length: url.chars().count(),
                    max: MAX_PICTURE_URL_LEN,
                });
            }
        }
    }
}

impl Aggregate for Snack {
    type Event = SnackEvent;
    type Command = SnackCommand;
    type Id = Uuid;

    fn aggregate_type() -> &'static str {
        "snack"
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn handle(
        &self,
        command: SnackCommand,
        ctx: &OperationContext,
    ) -> Result<Vec<SnackEvent>, Vec<DomainError>> {
        match command {
            SnackCommand::Initialize {
                snack_id,
                name,
                picture_url,
            } => {
                let mut reasons = Vec::new();
                if self.is_initialized() {
                    reasons.push(DomainError::AlreadyInitialized);
                }
                Self::name_guard(&name, &mut reasons);
                Self::picture_url_guard(picture_url.as_deref(), &mut reasons);
                if !reasons.is_empty() {
                    return Err(reasons);
                }
                Ok(vec![SnackEvent::SnackInitialized {
                    snack_id,
                    name,
                    picture_url,
                    created_at: Utc::now(),
                    created_by: ctx.actor_id,
                }])
            }

            SnackCommand::ChangeName { name } => {
                let mut reasons = self.live_guard();
                Self::name_guard(&name, &mut reasons);
                if !reasons.is_empty() {
                    return Err(reasons);
                }
                Ok(vec![SnackEvent::SnackRenamed {
                    snack_id: self.id,
                    name,
                    renamed_at: Utc::now(),
                    renamed_by: ctx.actor_id,
                }])
            }

            SnackCommand::ChangePictureUrl { picture_url } => {
                let mut reasons = self.live_guard();
                Self::picture_url_guard(picture_url.as_deref(), &mut reasons);
                if !reasons.is_empty() {
                    return Err(reasons);
                }
                Ok(vec![SnackEvent::SnackPictureChanged {
                    snack_id: self.id,
                    picture_url,
                    changed_at: Utc::now(),
                    changed_by: ctx.actor_id,
                }])
            }

            SnackCommand::Remove => {
                let reasons = self.live_guard();
                if !reasons.is_empty() {
                    return Err(reasons);
                }
                Ok(vec![SnackEvent::SnackRemoved {
                    snack_id: self.id,
                    removed_at: Utc::now(),
                    removed_by: ctx.actor_id,
                }])
            }
        }
    }

    fn apply(mut self, event: SnackEvent) -> Self {
        match event {
            SnackEvent::SnackInitialized {
                snack_id,
                name,
                picture_url,
                created_at,
                created_by,
            } => {
                self.id = snack_id;
                self.name = name;
                self.picture_url = picture_url;
                self.created = Some(AuditStamp::new(created_at, created_by));
            }

            SnackEvent::SnackRenamed {
                name,
                renamed_at,
                renamed_by,
                ..
            } => {
                self.name = name;
                self.modified = Some(AuditStamp::new(renamed_at, renamed_by));
            }

            SnackEvent::SnackPictureChanged {
                picture_url,
                changed_at,
                changed_by,
                ..
            } => {
                self.picture_url = picture_url;
                self.modified = Some(AuditStamp::new(changed_at, changed_by));
            }

            SnackEvent::SnackRemoved {
                removed_at,
                removed_by,
                ..
            } => {
                self.removed = Some(AuditStamp::new(removed_at, removed_by));
            }
        }

        self.version += 1;
        self
    }
}
