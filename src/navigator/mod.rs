//! Scene navigation — a small state machine over the lift/rooms scenes.
//!
//! The visitor moves between scenes by firing triggers. Leaving the entry
//! scene requires a signed-in identity; on the way through, the visitor's
//! profile is provisioned in the background. The current scene is stored
//! per session so a returning visitor resumes where they left off.

pub mod manager;
pub mod scene;
pub mod state;

pub use manager::{AdvanceOutcome, SCENE_KEY, SceneNavigator};
pub use scene::{Scene, TRANSITIONS, Trigger, requires_identity};
pub use state::NavigatorState;
