use std::path::PathBuf;
use std::sync::Once;

use harvester_core::{
    update, Effect, HarvestLimits, HarvestState, Msg, Phase, TerminationReason, WrittenPage,
};
use pretty_assertions::assert_eq;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

fn page(ordinal: u32) -> WrittenPage {
    WrittenPage {
        ordinal,
        path: PathBuf::from(format!("out/page_{ordinal:03}.svgz")),
    }
}

fn started(limits: HarvestLimits) -> HarvestState {
    let (state, effects) = update(HarvestState::new(limits), Msg::Started);
    assert_eq!(effects, vec![Effect::SettleAndDrain]);
    assert_eq!(state.phase(), Phase::Iterating);
    state
}

#[test]
fn productive_pass_requests_navigation_and_advances_counter() {
    init_logging();
    let state = started(HarvestLimits::default());
    let (state, effects) = update(
        state,
        Msg::PassCompleted {
            written: vec![page(1), page(2)],
        },
    );
    assert_eq!(effects, vec![Effect::AdvanceNavigation]);
    assert_eq!(state.ordinal_counter(), 3);
    assert_eq!(state.consecutive_empty(), 0);

    let (state, effects) = update(state, Msg::NavigationFinished { advanced: true });
    assert_eq!(effects, vec![Effect::SettleAndDrain]);
    assert_eq!(state.view().pages_saved, 2);
}

#[test]
fn three_empty_passes_terminate_without_navigation() {
    init_logging();
    let mut state = started(HarvestLimits::default());
    for _ in 0..2 {
        let (next, effects) = update(state, Msg::PassCompleted { written: vec![] });
        assert_eq!(effects, vec![Effect::AdvanceNavigation]);
        let (next, _) = update(next, Msg::NavigationFinished { advanced: true });
        state = next;
    }
    let (state, effects) = update(state, Msg::PassCompleted { written: vec![] });
    assert_eq!(
        effects,
        vec![Effect::Release {
            reason: TerminationReason::EmptyRunThreshold
        }]
    );
    assert_eq!(
        state.phase(),
        Phase::Terminated(TerminationReason::EmptyRunThreshold)
    );
    assert_eq!(state.passes(), 3);
}

#[test]
fn productive_pass_resets_empty_run() {
    init_logging();
    let state = started(HarvestLimits::default());
    let (state, _) = update(state, Msg::PassCompleted { written: vec![] });
    let (state, _) = update(state, Msg::NavigationFinished { advanced: true });
    let (state, _) = update(state, Msg::PassCompleted { written: vec![] });
    assert_eq!(state.consecutive_empty(), 2);
    let (state, _) = update(state, Msg::NavigationFinished { advanced: true });
    let (state, effects) = update(
        state,
        Msg::PassCompleted {
            written: vec![page(1)],
        },
    );
    assert_eq!(effects, vec![Effect::AdvanceNavigation]);
    assert_eq!(state.consecutive_empty(), 0);
}

#[test]
fn zero_empty_run_threshold_still_navigates_after_productive_pass() {
    init_logging();
    let limits = HarvestLimits {
        empty_run_threshold: 0,
        ..HarvestLimits::default()
    };
    let state = started(limits);
    let (state, effects) = update(
        state,
        Msg::PassCompleted {
            written: vec![page(1)],
        },
    );
    assert_eq!(effects, vec![Effect::AdvanceNavigation]);
    assert_eq!(state.phase(), Phase::Iterating);

    let (state, _) = update(state, Msg::NavigationFinished { advanced: true });
    let (_, effects) = update(state, Msg::PassCompleted { written: vec![] });
    assert_eq!(
        effects,
        vec![Effect::Release {
            reason: TerminationReason::EmptyRunThreshold
        }]
    );
}

#[test]
fn cap_reached_wins_over_navigation() {
    init_logging();
    let limits = HarvestLimits {
        max_pages: Some(2),
        ..HarvestLimits::default()
    };
    let state = started(limits);
    let (state, effects) = update(
        state,
        Msg::PassCompleted {
            written: vec![page(2), page(1)],
        },
    );
    assert_eq!(
        effects,
        vec![Effect::Release {
            reason: TerminationReason::CapReached
        }]
    );
    assert!(!state.has_capacity_for(3, &[]));
    assert!(state.has_capacity_for(1, &[]));
}

#[test]
fn capacity_counts_pages_pending_in_the_current_pass() {
    init_logging();
    let limits = HarvestLimits {
        max_pages: Some(2),
        ..HarvestLimits::default()
    };
    let state = started(limits);
    assert!(state.has_capacity_for(1, &[]));
    assert!(state.has_capacity_for(2, &[page(1)]));
    assert!(!state.has_capacity_for(3, &[page(1), page(2)]));
    // Overwriting a pending ordinal stays within the cap.
    assert!(state.has_capacity_for(2, &[page(1), page(2)]));
}

#[test]
fn dead_end_terminates_immediately() {
    init_logging();
    let state = started(HarvestLimits::default());
    let (state, _) = update(
        state,
        Msg::PassCompleted {
            written: vec![page(1)],
        },
    );
    let (state, effects) = update(state, Msg::NavigationFinished { advanced: false });
    assert_eq!(
        effects,
        vec![Effect::Release {
            reason: TerminationReason::NavigationDeadEnd
        }]
    );
    assert!(state.is_terminal());

    // Nothing moves a terminated harvest.
    let (state, effects) = update(state, Msg::PassCompleted { written: vec![page(2)] });
    assert!(effects.is_empty());
    assert_eq!(state.saved().len(), 1);
}

#[test]
fn saved_paths_are_in_ordinal_order_and_last_write_wins() {
    init_logging();
    let state = started(HarvestLimits::default());
    let replacement = WrittenPage {
        ordinal: 2,
        path: PathBuf::from("out/page_002.svg"),
    };
    let (state, _) = update(
        state,
        Msg::PassCompleted {
            written: vec![page(3), page(1), page(2), replacement],
        },
    );
    assert_eq!(
        state.saved_paths(),
        vec![
            PathBuf::from("out/page_001.svgz"),
            PathBuf::from("out/page_002.svg"),
            PathBuf::from("out/page_003.svgz"),
        ]
    );
    assert_eq!(state.ordinal_counter(), 4);
}

#[test]
fn deadline_terminates_from_any_live_phase() {
    init_logging();
    let (state, effects) = update(HarvestState::default(), Msg::DeadlineElapsed);
    assert_eq!(
        effects,
        vec![Effect::Release {
            reason: TerminationReason::DeadlineElapsed
        }]
    );
    assert_eq!(
        state.view().phase,
        Phase::Terminated(TerminationReason::DeadlineElapsed)
    );
}
