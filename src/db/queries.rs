use anyhow::Context;
use chrono::NaiveDateTime;
use rusqlite::{params, params_from_iter, Connection};

use crate::models::{
    ActionStatus, AdminAction, Booking, BookingStatus, Room, Slot, SlotStatus, SlotType,
    UndoPayload,
};
use crate::services::dates::{fmt_dt, parse_dt, DayBounds};
use crate::services::filter::CompiledFilter;

fn in_marks(n: usize) -> String {
    vec!["?"; n].join(", ")
}

// ── Rooms ──

const ROOM_COLUMNS: &str = "id, name, is_enabled, created_at, updated_at";

pub fn insert_room(conn: &Connection, room: &Room) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO rooms (id, name, is_enabled, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            room.id,
            room.name,
            room.is_enabled as i32,
            fmt_dt(&room.created_at),
            fmt_dt(&room.updated_at),
        ],
    )?;
    Ok(())
}

pub fn upsert_room(conn: &Connection, room: &Room) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO rooms (id, name, is_enabled, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
           name = excluded.name,
           is_enabled = excluded.is_enabled,
           created_at = excluded.created_at,
           updated_at = excluded.updated_at",
        params![
            room.id,
            room.name,
            room.is_enabled as i32,
            fmt_dt(&room.created_at),
            fmt_dt(&room.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_room(conn: &Connection, id: &str) -> anyhow::Result<Option<Room>> {
    let result = conn.query_row(
        &format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE id = ?1"),
        params![id],
        |row| Ok(parse_room_row(row)),
    );

    match result {
        Ok(room) => Ok(Some(room?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_rooms(conn: &Connection) -> anyhow::Result<Vec<Room>> {
    let mut stmt =
        conn.prepare(&format!("SELECT {ROOM_COLUMNS} FROM rooms ORDER BY created_at ASC, id ASC"))?;
    let rows = stmt.query_map([], |row| Ok(parse_room_row(row)))?;

    let mut rooms = vec![];
    for row in rows {
        rooms.push(row??);
    }
    Ok(rooms)
}

pub fn update_room(conn: &Connection, room: &Room) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE rooms SET name = ?1, is_enabled = ?2, updated_at = ?3 WHERE id = ?4",
        params![
            room.name,
            room.is_enabled as i32,
            fmt_dt(&room.updated_at),
            room.id,
        ],
    )?;
    Ok(count > 0)
}

pub fn delete_rooms_by_ids(conn: &Connection, ids: &[String]) -> anyhow::Result<usize> {
    if ids.is_empty() {
        return Ok(0);
    }
    let sql = format!("DELETE FROM rooms WHERE id IN ({})", in_marks(ids.len()));
    let count = conn.execute(&sql, params_from_iter(ids.iter()))?;
    Ok(count)
}

fn parse_room_row(row: &rusqlite::Row) -> anyhow::Result<Room> {
    Ok(Room {
        id: row.get(0)?,
        name: row.get(1)?,
        is_enabled: row.get::<_, i32>(2)? != 0,
        created_at: parse_dt(&row.get::<_, String>(3)?),
        updated_at: parse_dt(&row.get::<_, String>(4)?),
    })
}

// ── Slots ──

const SLOT_COLUMNS: &str =
    "id, room_id, start_time, end_time, service_name, provider_name, date, type, status, booked_by, created_at";

#[derive(Debug, Clone, Copy)]
pub enum SlotOrder {
    /// Admin listings: newest day first, earliest start first within a day.
    DateDescStartAsc,
    /// Public listings: chronological.
    DateAscStartAsc,
}

impl SlotOrder {
    fn sql(&self) -> &'static str {
        match self {
            SlotOrder::DateDescStartAsc => "ORDER BY date DESC, start_time ASC",
            SlotOrder::DateAscStartAsc => "ORDER BY date ASC, start_time ASC",
        }
    }
}

pub fn insert_slots(conn: &Connection, slots: &[Slot]) -> anyhow::Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO slots (id, room_id, start_time, end_time, service_name, provider_name, date, type, status, booked_by, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    )?;

    for slot in slots {
        stmt.execute(params![
            slot.id,
            slot.room_id,
            slot.start_time,
            slot.end_time,
            slot.service_name,
            slot.provider_name,
            fmt_dt(&slot.date),
            slot.kind.as_str(),
            slot.status.as_str(),
            slot.booked_by,
            fmt_dt(&slot.created_at),
        ])?;
    }
    Ok(())
}

pub fn insert_slot(conn: &Connection, slot: &Slot) -> anyhow::Result<()> {
    insert_slots(conn, std::slice::from_ref(slot))
}

pub fn upsert_slot(conn: &Connection, slot: &Slot) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO slots (id, room_id, start_time, end_time, service_name, provider_name, date, type, status, booked_by, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT(id) DO UPDATE SET
           room_id = excluded.room_id,
           start_time = excluded.start_time,
           end_time = excluded.end_time,
           service_name = excluded.service_name,
           provider_name = excluded.provider_name,
           date = excluded.date,
           type = excluded.type,
           status = excluded.status,
           booked_by = excluded.booked_by,
           created_at = excluded.created_at",
        params![
            slot.id,
            slot.room_id,
            slot.start_time,
            slot.end_time,
            slot.service_name,
            slot.provider_name,
            fmt_dt(&slot.date),
            slot.kind.as_str(),
            slot.status.as_str(),
            slot.booked_by,
            fmt_dt(&slot.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_slot(conn: &Connection, id: &str) -> anyhow::Result<Option<Slot>> {
    let result = conn.query_row(
        &format!("SELECT {SLOT_COLUMNS} FROM slots WHERE id = ?1"),
        params![id],
        |row| Ok(parse_slot_row(row)),
    );

    match result {
        Ok(slot) => Ok(Some(slot?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_slots_by_ids(conn: &Connection, ids: &[String]) -> anyhow::Result<Vec<Slot>> {
    if ids.is_empty() {
        return Ok(vec![]);
    }
    let sql = format!(
        "SELECT {SLOT_COLUMNS} FROM slots WHERE id IN ({}) ORDER BY date DESC, start_time ASC",
        in_marks(ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(ids.iter()), |row| Ok(parse_slot_row(row)))?;

    let mut slots = vec![];
    for row in rows {
        slots.push(row??);
    }
    Ok(slots)
}

/// Runs the compiled primary filter against the store. Post-filters
/// (daysOfWeek, timeRanges) are the caller's job, in that order.
pub fn find_slots(
    conn: &Connection,
    filter: &CompiledFilter,
    order: SlotOrder,
) -> anyhow::Result<Vec<Slot>> {
    let sql = format!(
        "SELECT {SLOT_COLUMNS} FROM slots {} {}",
        filter.where_clause(),
        order.sql()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(filter.params().iter()), |row| {
        Ok(parse_slot_row(row))
    })?;

    let mut slots = vec![];
    for row in rows {
        slots.push(row??);
    }
    Ok(slots)
}

pub fn slots_for_room(
    conn: &Connection,
    room_id: &str,
    day: Option<&DayBounds>,
) -> anyhow::Result<Vec<Slot>> {
    let mut slots = vec![];
    match day {
        Some(bounds) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SLOT_COLUMNS} FROM slots
                 WHERE room_id = ?1 AND date >= ?2 AND date < ?3
                 ORDER BY date ASC, start_time ASC"
            ))?;
            let rows = stmt.query_map(
                params![room_id, fmt_dt(&bounds.start), fmt_dt(&bounds.next_day)],
                |row| Ok(parse_slot_row(row)),
            )?;
            for row in rows {
                slots.push(row??);
            }
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SLOT_COLUMNS} FROM slots WHERE room_id = ?1 ORDER BY date ASC, start_time ASC"
            ))?;
            let rows = stmt.query_map(params![room_id], |row| Ok(parse_slot_row(row)))?;
            for row in rows {
                slots.push(row??);
            }
        }
    }
    Ok(slots)
}

/// Locates the slot a recurring occurrence would book: exact room, time span,
/// and day. Status is intentionally not part of the predicate; callers decide
/// between rejecting and skipping a booked occurrence.
pub fn find_slot_for_occurrence(
    conn: &Connection,
    room_id: &str,
    start_time: &str,
    end_time: &str,
    day: &NaiveDateTime,
) -> anyhow::Result<Option<Slot>> {
    let result = conn.query_row(
        &format!(
            "SELECT {SLOT_COLUMNS} FROM slots
             WHERE room_id = ?1 AND start_time = ?2 AND end_time = ?3 AND date = ?4
             LIMIT 1"
        ),
        params![room_id, start_time, end_time, fmt_dt(day)],
        |row| Ok(parse_slot_row(row)),
    );

    match result {
        Ok(slot) => Ok(Some(slot?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn update_slot(conn: &Connection, slot: &Slot) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE slots SET room_id = ?1, start_time = ?2, end_time = ?3, service_name = ?4,
           provider_name = ?5, date = ?6, type = ?7, status = ?8, booked_by = ?9
         WHERE id = ?10",
        params![
            slot.room_id,
            slot.start_time,
            slot.end_time,
            slot.service_name,
            slot.provider_name,
            fmt_dt(&slot.date),
            slot.kind.as_str(),
            slot.status.as_str(),
            slot.booked_by,
            slot.id,
        ],
    )?;
    Ok(count > 0)
}

/// Value for the `booked_by` column in a multi-row field update.
#[derive(Debug, Clone)]
pub enum BookedBy<'a> {
    Clear,
    Name(&'a str),
    /// Mirror each row's (current) provider column. Used when a bulk update
    /// books slots without supplying a new provider name.
    CurrentProvider,
}

/// Columns a bulk update may touch; `None` leaves a column untouched.
#[derive(Debug, Default, Clone)]
pub struct SlotFieldUpdate<'a> {
    pub service_name: Option<&'a str>,
    pub provider_name: Option<&'a str>,
    pub kind: Option<SlotType>,
    pub status: Option<SlotStatus>,
    pub booked_by: Option<BookedBy<'a>>,
}

/// Applies one field update to many rows as a single statement. Returns the
/// number of rows the statement touched.
pub fn update_slot_fields(
    conn: &Connection,
    ids: &[String],
    update: &SlotFieldUpdate,
) -> anyhow::Result<usize> {
    if ids.is_empty() {
        return Ok(0);
    }

    let mut sets: Vec<String> = Vec::new();
    let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(v) = update.service_name {
        sets.push("service_name = ?".to_string());
        values.push(Box::new(v.to_string()));
    }
    if let Some(v) = update.provider_name {
        sets.push("provider_name = ?".to_string());
        values.push(Box::new(v.to_string()));
    }
    if let Some(kind) = update.kind {
        sets.push("type = ?".to_string());
        values.push(Box::new(kind.as_str().to_string()));
    }
    if let Some(status) = update.status {
        sets.push("status = ?".to_string());
        values.push(Box::new(status.as_str().to_string()));
    }
    match &update.booked_by {
        Some(BookedBy::Clear) => sets.push("booked_by = NULL".to_string()),
        Some(BookedBy::Name(name)) => {
            sets.push("booked_by = ?".to_string());
            values.push(Box::new(name.to_string()));
        }
        Some(BookedBy::CurrentProvider) => sets.push("booked_by = provider_name".to_string()),
        None => {}
    }

    if sets.is_empty() {
        return Ok(0);
    }

    let sql = format!(
        "UPDATE slots SET {} WHERE id IN ({})",
        sets.join(", "),
        in_marks(ids.len())
    );
    for id in ids {
        values.push(Box::new(id.clone()));
    }

    let value_refs: Vec<&dyn rusqlite::types::ToSql> = values.iter().map(|v| v.as_ref()).collect();
    let count = conn.execute(&sql, value_refs.as_slice())?;
    Ok(count)
}

pub fn delete_slots_by_ids(conn: &Connection, ids: &[String]) -> anyhow::Result<usize> {
    if ids.is_empty() {
        return Ok(0);
    }
    let sql = format!("DELETE FROM slots WHERE id IN ({})", in_marks(ids.len()));
    let count = conn.execute(&sql, params_from_iter(ids.iter()))?;
    Ok(count)
}

pub fn delete_slots_by_room(conn: &Connection, room_id: &str) -> anyhow::Result<usize> {
    let count = conn.execute("DELETE FROM slots WHERE room_id = ?1", params![room_id])?;
    Ok(count)
}

fn parse_slot_row(row: &rusqlite::Row) -> anyhow::Result<Slot> {
    Ok(Slot {
        id: row.get(0)?,
        room_id: row.get(1)?,
        start_time: row.get(2)?,
        end_time: row.get(3)?,
        service_name: row.get(4)?,
        provider_name: row.get(5)?,
        date: parse_dt(&row.get::<_, String>(6)?),
        kind: SlotType::parse(&row.get::<_, String>(7)?),
        status: SlotStatus::parse(&row.get::<_, String>(8)?),
        booked_by: row.get(9)?,
        created_at: parse_dt(&row.get::<_, String>(10)?),
    })
}

// ── Bookings ──

const BOOKING_COLUMNS: &str =
    "id, user_name, phone_number, slot_id, room_id, start_time, end_time, service_name, provider_name, status, date, is_recurring, start_date, end_date, recurring_day_of_week, created_at, updated_at";

pub fn insert_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO bookings (id, user_name, phone_number, slot_id, room_id, start_time, end_time,
           service_name, provider_name, status, date, is_recurring, start_date, end_date,
           recurring_day_of_week, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        booking_param_refs(&booking_params(booking)).as_slice(),
    )?;
    Ok(())
}

pub fn upsert_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO bookings (id, user_name, phone_number, slot_id, room_id, start_time, end_time,
           service_name, provider_name, status, date, is_recurring, start_date, end_date,
           recurring_day_of_week, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
         ON CONFLICT(id) DO UPDATE SET
           user_name = excluded.user_name,
           phone_number = excluded.phone_number,
           slot_id = excluded.slot_id,
           room_id = excluded.room_id,
           start_time = excluded.start_time,
           end_time = excluded.end_time,
           service_name = excluded.service_name,
           provider_name = excluded.provider_name,
           status = excluded.status,
           date = excluded.date,
           is_recurring = excluded.is_recurring,
           start_date = excluded.start_date,
           end_date = excluded.end_date,
           recurring_day_of_week = excluded.recurring_day_of_week,
           created_at = excluded.created_at,
           updated_at = excluded.updated_at",
        booking_param_refs(&booking_params(booking)).as_slice(),
    )?;
    Ok(())
}

fn booking_param_refs(
    values: &[Box<dyn rusqlite::types::ToSql>],
) -> Vec<&dyn rusqlite::types::ToSql> {
    values.iter().map(|v| v.as_ref()).collect()
}

fn booking_params(booking: &Booking) -> Vec<Box<dyn rusqlite::types::ToSql>> {
    vec![
        Box::new(booking.id.clone()),
        Box::new(booking.user_name.clone()),
        Box::new(booking.phone_number.clone()),
        Box::new(booking.slot_id.clone()),
        Box::new(booking.room_id.clone()),
        Box::new(booking.start_time.clone()),
        Box::new(booking.end_time.clone()),
        Box::new(booking.service_name.clone()),
        Box::new(booking.provider_name.clone()),
        Box::new(booking.status.as_str().to_string()),
        Box::new(booking.date.as_ref().map(fmt_dt)),
        Box::new(booking.is_recurring as i32),
        Box::new(booking.start_date.as_ref().map(fmt_dt)),
        Box::new(booking.end_date.as_ref().map(fmt_dt)),
        Box::new(booking.recurring_day_of_week.map(|d| d as i32)),
        Box::new(fmt_dt(&booking.created_at)),
        Box::new(fmt_dt(&booking.updated_at)),
    ]
}

pub fn get_booking(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
        params![id],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_bookings(
    conn: &Connection,
    status: Option<BookingStatus>,
) -> anyhow::Result<Vec<Booking>> {
    let mut bookings = vec![];
    match status {
        Some(status) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings WHERE status = ?1 ORDER BY created_at DESC"
            ))?;
            let rows = stmt.query_map(params![status.as_str()], |row| Ok(parse_booking_row(row)))?;
            for row in rows {
                bookings.push(row??);
            }
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings ORDER BY created_at DESC"
            ))?;
            let rows = stmt.query_map([], |row| Ok(parse_booking_row(row)))?;
            for row in rows {
                bookings.push(row??);
            }
        }
    }
    Ok(bookings)
}

pub fn update_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET user_name = ?2, phone_number = ?3, slot_id = ?4, room_id = ?5,
           start_time = ?6, end_time = ?7, service_name = ?8, provider_name = ?9, status = ?10,
           date = ?11, is_recurring = ?12, start_date = ?13, end_date = ?14,
           recurring_day_of_week = ?15, created_at = ?16, updated_at = ?17
         WHERE id = ?1",
        booking_param_refs(&booking_params(booking)).as_slice(),
    )?;
    Ok(count > 0)
}

pub fn delete_bookings_by_ids(conn: &Connection, ids: &[String]) -> anyhow::Result<usize> {
    if ids.is_empty() {
        return Ok(0);
    }
    let sql = format!("DELETE FROM bookings WHERE id IN ({})", in_marks(ids.len()));
    let count = conn.execute(&sql, params_from_iter(ids.iter()))?;
    Ok(count)
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    Ok(Booking {
        id: row.get(0)?,
        user_name: row.get(1)?,
        phone_number: row.get(2)?,
        slot_id: row.get(3)?,
        room_id: row.get(4)?,
        start_time: row.get(5)?,
        end_time: row.get(6)?,
        service_name: row.get(7)?,
        provider_name: row.get(8)?,
        status: BookingStatus::parse(&row.get::<_, String>(9)?),
        date: row.get::<_, Option<String>>(10)?.map(|s| parse_dt(&s)),
        is_recurring: row.get::<_, i32>(11)? != 0,
        start_date: row.get::<_, Option<String>>(12)?.map(|s| parse_dt(&s)),
        end_date: row.get::<_, Option<String>>(13)?.map(|s| parse_dt(&s)),
        recurring_day_of_week: row.get::<_, Option<i32>>(14)?.map(|d| d as u8),
        created_at: parse_dt(&row.get::<_, String>(15)?),
        updated_at: parse_dt(&row.get::<_, String>(16)?),
    })
}

// ── Admin actions ──

const ACTION_COLUMNS: &str =
    "id, admin_id, action_name, action_type, target_collection, target_ids, details, metadata, undo_payload, status, created_at, undone_at";

pub fn insert_action(conn: &Connection, action: &AdminAction) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO admin_actions (id, admin_id, action_name, action_type, target_collection,
           target_ids, details, metadata, undo_payload, status, created_at, undone_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            action.id,
            action.admin_id,
            action.action_name,
            action.action_type.as_str(),
            action.target_collection.as_str(),
            serde_json::to_string(&action.target_ids)?,
            action.details,
            serde_json::to_string(&action.metadata)?,
            serde_json::to_string(&action.undo_payload)?,
            action.status.as_str(),
            fmt_dt(&action.created_at),
            action.undone_at.as_ref().map(fmt_dt),
        ],
    )?;
    Ok(())
}

pub fn get_action(conn: &Connection, id: &str) -> anyhow::Result<Option<AdminAction>> {
    let result = conn.query_row(
        &format!("SELECT {ACTION_COLUMNS} FROM admin_actions WHERE id = ?1"),
        params![id],
        |row| Ok(parse_action_row(row)),
    );

    match result {
        Ok(action) => Ok(Some(action?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_actions(
    conn: &Connection,
    offset: i64,
    limit: i64,
    status: Option<ActionStatus>,
) -> anyhow::Result<Vec<AdminAction>> {
    let mut actions = vec![];
    match status {
        Some(status) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ACTION_COLUMNS} FROM admin_actions WHERE status = ?1
                 ORDER BY created_at DESC, rowid DESC LIMIT ?2 OFFSET ?3"
            ))?;
            let rows = stmt.query_map(params![status.as_str(), limit, offset], |row| {
                Ok(parse_action_row(row))
            })?;
            for row in rows {
                actions.push(row??);
            }
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ACTION_COLUMNS} FROM admin_actions
                 ORDER BY created_at DESC, rowid DESC LIMIT ?1 OFFSET ?2"
            ))?;
            let rows = stmt.query_map(params![limit, offset], |row| Ok(parse_action_row(row)))?;
            for row in rows {
                actions.push(row??);
            }
        }
    }
    Ok(actions)
}

pub fn count_actions(conn: &Connection, status: Option<ActionStatus>) -> anyhow::Result<i64> {
    let count = match status {
        Some(status) => conn.query_row(
            "SELECT COUNT(*) FROM admin_actions WHERE status = ?1",
            params![status.as_str()],
            |row| row.get(0),
        )?,
        None => conn.query_row("SELECT COUNT(*) FROM admin_actions", [], |row| row.get(0))?,
    };
    Ok(count)
}

pub fn mark_action_undone(
    conn: &Connection,
    id: &str,
    undone_at: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE admin_actions SET status = 'undone', undone_at = ?1 WHERE id = ?2",
        params![fmt_dt(undone_at), id],
    )?;
    Ok(count > 0)
}

fn parse_action_row(row: &rusqlite::Row) -> anyhow::Result<AdminAction> {
    let target_ids_json: String = row.get(5)?;
    let metadata_json: String = row.get(7)?;
    let undo_json: String = row.get(8)?;

    Ok(AdminAction {
        id: row.get(0)?,
        admin_id: row.get(1)?,
        action_name: row.get(2)?,
        action_type: crate::models::ActionType::parse(&row.get::<_, String>(3)?),
        target_collection: crate::models::Collection::parse(&row.get::<_, String>(4)?),
        target_ids: serde_json::from_str(&target_ids_json)
            .context("malformed target id list in admin action")?,
        details: row.get(6)?,
        metadata: serde_json::from_str(&metadata_json)
            .context("malformed metadata in admin action")?,
        undo_payload: serde_json::from_str::<UndoPayload>(&undo_json)
            .context("malformed undo payload in admin action")?,
        status: ActionStatus::parse(&row.get::<_, String>(9)?),
        created_at: parse_dt(&row.get::<_, String>(10)?),
        undone_at: row.get::<_, Option<String>>(11)?.map(|s| parse_dt(&s)),
    })
}
