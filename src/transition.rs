use crate::model::Status;

/// Age all timers by one tick and apply the resulting transitions.
///
/// Infected agents count down and recover with `immunity_time` ticks of
/// immunity, which starts ageing on the same tick. Recovered agents whose
/// immunity runs out become susceptible again. An agent infected earlier
/// in the tick is aged too, so with `recovery_time == 1` it recovers on
/// the tick it was infected.
pub fn age_and_transition(status: &mut [Status], recovery_time: u32, immunity_time: u32) {
    debug_assert!(recovery_time > 0 && immunity_time > 0);

    for agt_status in status.iter_mut() {
        if let Status::Infected { timer } = *agt_status {
            let timer = timer.saturating_sub(1);
            *agt_status = if timer == 0 {
                Status::Recovered {
                    timer: immunity_time,
                }
            } else {
                Status::Infected { timer }
            };
        }

        if let Status::Recovered { timer } = *agt_status {
            let timer = timer.saturating_sub(1);
            *agt_status = if timer == 0 {
                Status::Susceptible
            } else {
                Status::Recovered { timer }
            };
        }
    }
}
