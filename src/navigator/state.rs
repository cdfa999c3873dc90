//! Navigator session state.

use serde::{Deserialize, Serialize};

use super::scene::{Scene, Trigger};

/// Per-session navigator state.
///
/// Only `current_scene` is persisted. `pending` is a snapshot of whether an
/// identity check was in flight when the state was read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigatorState {
    pub current_scene: Scene,
    #[serde(skip)]
    pub pending: bool,
}

impl NavigatorState {
    pub fn at(scene: Scene) -> Self {
        Self {
            current_scene: scene,
            pending: false,
        }
    }

    /// Triggers available from the current scene and where they lead.
    pub fn successors(&self) -> Vec<(Trigger, Scene)> {
        self.current_scene.edges().collect()
    }
}
