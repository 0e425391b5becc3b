pub mod admin_action;
pub mod booking;
pub mod room;
pub mod slot;

pub use admin_action::{ActionStatus, ActionType, AdminAction, Collection, UndoPayload, UndoStep};
pub use booking::{is_valid_phone_number, Booking, BookingStatus};
pub use room::Room;
pub use slot::{Slot, SlotStatus, SlotType};
