use std::time::Duration;

use engine_logging::{engine_debug, engine_warn};
use harvester_core::{NextControl, SourcePolicy};

use crate::session::ViewerPage;

/// Moves the viewer forward one page.
///
/// Explicit "next" controls are tried first, in the policy's priority order.
/// A key press is the fallback because many viewers silently ignore keys.
pub struct NavigationDriver {
    controls: &'static [NextControl],
    fallback_key: &'static str,
    post_action_delay: Duration,
}

impl NavigationDriver {
    pub fn new(policy: &SourcePolicy, post_action_delay: Duration) -> Self {
        Self {
            controls: policy.next_controls(),
            fallback_key: policy.fallback_key(),
            post_action_delay,
        }
    }

    /// Returns `false` only when no control was clicked and the key press failed.
    pub async fn advance(&self, page: &dyn ViewerPage) -> bool {
        for control in self.controls {
            match page.click_control(control).await {
                Ok(true) => {
                    engine_debug!("Advanced via {:?}", control);
                    tokio::time::sleep(self.post_action_delay).await;
                    return true;
                }
                Ok(false) => continue,
                Err(err) => {
                    engine_debug!("Control {:?} not usable: {}", control, err);
                }
            }
        }

        match page.press_key(self.fallback_key).await {
            Ok(()) => {
                engine_debug!("Advanced via {} key", self.fallback_key);
                tokio::time::sleep(self.post_action_delay).await;
                true
            }
            Err(err) => {
                engine_warn!("No way to advance the viewer: {}", err);
                false
            }
        }
    }
}
