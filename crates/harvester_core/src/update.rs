use engine_logging::engine_debug;

use crate::{Effect, HarvestState, Msg, Phase, TerminationReason};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: HarvestState, msg: Msg) -> (HarvestState, Vec<Effect>) {
    if state.is_terminal() {
        engine_debug!("Ignoring {:?} after termination", msg);
        return (state, Vec::new());
    }

    let effects = match msg {
        Msg::Started => {
            if state.phase() == Phase::Starting {
                state.begin();
                vec![Effect::SettleAndDrain]
            } else {
                Vec::new()
            }
        }
        Msg::PassCompleted { written } => {
            if state.phase() != Phase::Iterating {
                return (state, Vec::new());
            }
            state.record_pass(written);
            match state.stop_condition() {
                Some(reason) => terminate(&mut state, reason),
                None => vec![Effect::AdvanceNavigation],
            }
        }
        Msg::NavigationFinished { advanced } => {
            if state.phase() != Phase::Iterating {
                return (state, Vec::new());
            }
            if advanced {
                vec![Effect::SettleAndDrain]
            } else {
                terminate(&mut state, TerminationReason::NavigationDeadEnd)
            }
        }
        Msg::DeadlineElapsed => terminate(&mut state, TerminationReason::DeadlineElapsed),
    };

    (state, effects)
}

fn terminate(state: &mut HarvestState, reason: TerminationReason) -> Vec<Effect> {
    state.terminate(reason);
    vec![Effect::Release { reason }]
}
