use shared_models::schedule::SlotTime;

/// Expand a working-hours window into the ordered sequence of slot start
/// times. A slot is emitted only if it fits entirely before `end_of_day`;
/// partial slots never appear. A window shorter than one slot yields an
/// empty sequence, which is a valid result.
pub fn generate_slots(
    start_of_day: SlotTime,
    end_of_day: SlotTime,
    slot_length_minutes: u16,
) -> Vec<SlotTime> {
    if slot_length_minutes == 0 {
        return Vec::new();
    }

    let length = slot_length_minutes as u32;
    let end = end_of_day.as_u32();
    let mut slots = Vec::new();
    let mut current = start_of_day.as_u32();

    while current + length <= end {
        match SlotTime::from_minutes(current as u16) {
            Ok(slot) => slots.push(slot),
            Err(_) => break,
        }
        current += length;
    }

    slots
}

/// Whether `time` is a valid slot start for the given window: aligned to a
/// slot boundary counted from `start_of_day`, and with the full slot length
/// fitting before `end_of_day`. The slot length always comes from the
/// template, never from a fixed appointment duration.
pub fn is_slot_start(
    start_of_day: SlotTime,
    end_of_day: SlotTime,
    slot_length_minutes: u16,
    time: SlotTime,
) -> bool {
    if slot_length_minutes == 0 || time < start_of_day {
        return false;
    }

    let length = slot_length_minutes as u32;
    let offset = time.as_u32() - start_of_day.as_u32();

    offset % length == 0 && time.as_u32() + length <= end_of_day.as_u32()
}
