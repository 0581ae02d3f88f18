#[cfg(test)]
mod tests {
    use crate::logic::{compute_slots, BusyInterval, WorkingHours};
    use proptest::prelude::*;

    fn hhmm(minutes: u32) -> String {
        format!("{:02}:{:02}", minutes / 60, minutes % 60)
    }

    // Working window on a half-hour grid with a break somewhere inside it
    fn working_hours() -> impl Strategy<Value = WorkingHours> {
        (0u32..20, 2u32..8, prop::sample::select(vec![15u32, 20, 30, 45, 60]))
            .prop_flat_map(|(start_half_hours, length_hours, step)| {
                let start = start_half_hours * 30;
                let end = (start + length_hours * 60).min(23 * 60 + 30);
                (Just(start), Just(end), Just(step), start..end)
            })
            .prop_map(|(start, end, step, break_start)| WorkingHours {
                start: hhmm(start),
                end: hhmm(end),
                slot_duration: step,
                break_start: hhmm(break_start),
                break_end: hhmm((break_start + 60).min(end)),
            })
    }

    fn busy_intervals() -> impl Strategy<Value = Vec<BusyInterval>> {
        prop::collection::vec((0u32..(23 * 60), 15u32..120), 0..6).prop_map(|ranges| {
            ranges
                .into_iter()
                .map(|(start, length)| BusyInterval {
                    start: hhmm(start),
                    end: hhmm((start + length).min(23 * 60 + 59)),
                    subject: None,
                })
                .collect()
        })
    }

    proptest! {
        // Slot times stay inside the working window and strictly increase
        #[test]
        fn test_slots_are_ordered_and_within_hours(hours in working_hours(), busy in busy_intervals()) {
            let slots = compute_slots(&busy, &hours);

            for slot in &slots {
                prop_assert!(slot.time >= hours.start);
                prop_assert!(slot.time < hours.end);
            }
            for pair in slots.windows(2) {
                prop_assert!(pair[0].time < pair[1].time);
            }
        }

        // Nothing inside the break is ever emitted
        #[test]
        fn test_break_is_never_emitted(hours in working_hours(), busy in busy_intervals()) {
            let slots = compute_slots(&busy, &hours);

            prop_assert!(slots
                .iter()
                .all(|s| !(s.time >= hours.break_start && s.time < hours.break_end)));
        }

        // A slot is unavailable exactly when some interval covers it
        #[test]
        fn test_availability_matches_busy_cover(hours in working_hours(), busy in busy_intervals()) {
            let slots = compute_slots(&busy, &hours);

            for slot in &slots {
                let covered = busy.iter().any(|b| slot.time >= b.start && slot.time < b.end);
                prop_assert_eq!(slot.available, !covered);
            }
        }

        // Busy intervals never change the shape of the grid
        #[test]
        fn test_grid_shape_ignores_bookings(hours in working_hours(), busy in busy_intervals()) {
            let free: Vec<String> = compute_slots(&[], &hours).into_iter().map(|s| s.time).collect();
            let booked: Vec<String> = compute_slots(&busy, &hours).into_iter().map(|s| s.time).collect();
            prop_assert_eq!(free, booked);
        }
    }
}
