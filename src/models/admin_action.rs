use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Audit record for one mutating admin operation. The undo payload is a
/// machine-executable list of reversal steps; `metadata` is free-form
/// diagnostics for humans and is never replayed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminAction {
    pub id: String,
    pub admin_id: String,
    pub action_name: String,
    pub action_type: ActionType,
    pub target_collection: Collection,
    pub target_ids: Vec<String>,
    pub details: String,
    pub metadata: serde_json::Value,
    pub undo_payload: UndoPayload,
    pub status: ActionStatus,
    pub created_at: NaiveDateTime,
    pub undone_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionType {
    Create,
    Update,
    Delete,
    BulkCreate,
    BulkUpdate,
    BulkDelete,
    StatusChange,
    Custom,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Create => "create",
            ActionType::Update => "update",
            ActionType::Delete => "delete",
            ActionType::BulkCreate => "bulk-create",
            ActionType::BulkUpdate => "bulk-update",
            ActionType::BulkDelete => "bulk-delete",
            ActionType::StatusChange => "status-change",
            ActionType::Custom => "custom",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "create" => ActionType::Create,
            "update" => ActionType::Update,
            "delete" => ActionType::Delete,
            "bulk-create" => ActionType::BulkCreate,
            "bulk-update" => ActionType::BulkUpdate,
            "bulk-delete" => ActionType::BulkDelete,
            "status-change" => ActionType::StatusChange,
            _ => ActionType::Custom,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Completed,
    Undone,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::Completed => "completed",
            ActionStatus::Undone => "undone",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "undone" => ActionStatus::Undone,
            _ => ActionStatus::Completed,
        }
    }
}

/// The stores an undo step may touch. A closed set: replaying a step against
/// anything else is refused rather than improvised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Rooms,
    Slots,
    Bookings,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Rooms => "rooms",
            Collection::Slots => "slots",
            Collection::Bookings => "bookings",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "rooms" => Collection::Rooms,
            "bookings" => Collection::Bookings,
            _ => Collection::Slots,
        }
    }
}

/// Ordered reversal steps. `restore` is an upsert-by-id of whole documents,
/// `delete` removes by id list, `update` applies a partial set/unset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UndoPayload {
    pub steps: Vec<UndoStep>,
}

impl UndoPayload {
    pub fn single(step: UndoStep) -> Self {
        Self { steps: vec![step] }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum UndoStep {
    Delete {
        collection: Collection,
        ids: Vec<String>,
    },
    Restore {
        collection: Collection,
        documents: Vec<serde_json::Value>,
    },
    Update {
        collection: Collection,
        id: String,
        #[serde(default)]
        set: serde_json::Map<String, serde_json::Value>,
        #[serde(default)]
        unset: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_type_round_trip() {
        for s in [
            "create",
            "update",
            "delete",
            "bulk-create",
            "bulk-update",
            "bulk-delete",
            "status-change",
            "custom",
        ] {
            assert_eq!(ActionType::parse(s).as_str(), s);
        }
    }

    #[test]
    fn test_undo_step_serialization_shape() {
        let step = UndoStep::Delete {
            collection: Collection::Slots,
            ids: vec!["a".into()],
        };
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["op"], "delete");
        assert_eq!(json["collection"], "slots");

        let parsed: UndoStep =
            serde_json::from_value(serde_json::json!({"op": "restore", "collection": "rooms", "documents": []}))
                .unwrap();
        assert!(matches!(parsed, UndoStep::Restore { collection: Collection::Rooms, .. }));
    }

    #[test]
    fn test_update_step_defaults() {
        let parsed: UndoStep = serde_json::from_value(
            serde_json::json!({"op": "update", "collection": "bookings", "id": "x"}),
        )
        .unwrap();
        match parsed {
            UndoStep::Update { set, unset, .. } => {
                assert!(set.is_empty());
                assert!(unset.is_empty());
            }
            _ => panic!("expected update step"),
        }
    }
}
