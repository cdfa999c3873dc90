//! Scenes, triggers and the transition table.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One discrete step of the guided navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scene {
    Entry,
    Intro,
    Hub,
    RoomA,
    RoomB,
    LiftInterior,
    /// Lift arriving at a floor, doors opening.
    Transition,
    DestinationFloor,
}

/// A named user action requesting a scene transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Trigger {
    Next,
    Back,
    GoLeft,
    GoRight,
    EnterLift,
    CallLift,
    ExitLift,
    FloorSelect,
    Exit,
}

/// Directed, trigger-labelled edges. At most one edge per (scene, trigger).
pub static TRANSITIONS: &[(Scene, Trigger, Scene)] = &[
    (Scene::Entry, Trigger::Next, Scene::Intro),
    (Scene::Intro, Trigger::Next, Scene::Hub),
    (Scene::Hub, Trigger::GoLeft, Scene::RoomA),
    (Scene::Hub, Trigger::GoRight, Scene::RoomB),
    (Scene::Hub, Trigger::EnterLift, Scene::LiftInterior),
    (Scene::RoomA, Trigger::Back, Scene::Hub),
    (Scene::RoomB, Trigger::Back, Scene::Hub),
    (Scene::LiftInterior, Trigger::FloorSelect, Scene::DestinationFloor),
    (Scene::LiftInterior, Trigger::CallLift, Scene::Transition),
    (Scene::Transition, Trigger::ExitLift, Scene::DestinationFloor),
    (Scene::DestinationFloor, Trigger::Exit, Scene::Entry),
];

impl Scene {
    pub const ALL: [Scene; 8] = [
        Scene::Entry,
        Scene::Intro,
        Scene::Hub,
        Scene::RoomA,
        Scene::RoomB,
        Scene::LiftInterior,
        Scene::Transition,
        Scene::DestinationFloor,
    ];

    /// Where `trigger` leads from this scene, if anywhere.
    pub fn successor(&self, trigger: Trigger) -> Option<Scene> {
        TRANSITIONS
            .iter()
            .find(|(from, t, _)| from == self && *t == trigger)
            .map(|(_, _, to)| *to)
    }

    /// All outgoing edges of this scene.
    pub fn edges(&self) -> impl Iterator<Item = (Trigger, Scene)> + '_ {
        TRANSITIONS
            .iter()
            .filter(move |(from, _, _)| from == self)
            .map(|(_, t, to)| (*t, *to))
    }

    /// Scenes with an edge into this one.
    pub fn predecessors(&self) -> impl Iterator<Item = Scene> + '_ {
        TRANSITIONS
            .iter()
            .filter(move |(_, _, to)| to == self)
            .map(|(from, _, _)| *from)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::Intro => "intro",
            Self::Hub => "hub",
            Self::RoomA => "room-a",
            Self::RoomB => "room-b",
            Self::LiftInterior => "lift-interior",
            Self::Transition => "transition",
            Self::DestinationFloor => "destination-floor",
        }
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::Entry
    }
}

impl std::fmt::Display for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scene {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|scene| scene.as_str() == s)
            .ok_or_else(|| format!("unknown scene: {s}"))
    }
}

impl Trigger {
    pub const ALL: [Trigger; 9] = [
        Trigger::Next,
        Trigger::Back,
        Trigger::GoLeft,
        Trigger::GoRight,
        Trigger::EnterLift,
        Trigger::CallLift,
        Trigger::ExitLift,
        Trigger::FloorSelect,
        Trigger::Exit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Next => "next",
            Self::Back => "back",
            Self::GoLeft => "go-left",
            Self::GoRight => "go-right",
            Self::EnterLift => "enter-lift",
            Self::CallLift => "call-lift",
            Self::ExitLift => "exit-lift",
            Self::FloorSelect => "floor-select",
            Self::Exit => "exit",
        }
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Trigger {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|trigger| trigger.as_str() == s)
            .ok_or_else(|| format!("unknown trigger: {s}"))
    }
}

/// Whether this edge needs an authenticated visitor.
pub fn requires_identity(from: Scene, trigger: Trigger) -> bool {
    matches!((from, trigger), (Scene::Entry, Trigger::Next))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_transitions() {
        use Scene::*;
        use Trigger::*;
        let edges = [
            (Entry, Next, Intro),
            (Intro, Next, Hub),
            (Hub, GoLeft, RoomA),
            (Hub, GoRight, RoomB),
            (Hub, EnterLift, LiftInterior),
            (RoomA, Back, Hub),
            (RoomB, Back, Hub),
            (LiftInterior, FloorSelect, DestinationFloor),
            (DestinationFloor, Exit, Entry),
        ];
        for (from, trigger, to) in edges {
            assert_eq!(
                from.successor(trigger),
                Some(to),
                "{from} --{trigger}--> {to}"
            );
        }
    }

    #[test]
    fn undefined_triggers_have_no_successor() {
        use Scene::*;
        use Trigger::*;
        assert_eq!(Entry.successor(Back), None);
        assert_eq!(Hub.successor(Next), None);
        assert_eq!(RoomA.successor(GoRight), None);
        assert_eq!(DestinationFloor.successor(Next), None);
    }

    #[test]
    fn table_has_one_edge_per_scene_and_trigger() {
        for scene in Scene::ALL {
            for trigger in Trigger::ALL {
                let count = TRANSITIONS
                    .iter()
                    .filter(|(from, t, _)| *from == scene && *t == trigger)
                    .count();
                assert!(count <= 1, "{scene} has {count} edges for {trigger}");
            }
        }
    }

    #[test]
    fn every_scene_is_reachable_from_entry() {
        let mut seen = vec![Scene::Entry];
        let mut frontier = vec![Scene::Entry];
        while let Some(scene) = frontier.pop() {
            for (_, to) in scene.edges() {
                if !seen.contains(&to) {
                    seen.push(to);
                    frontier.push(to);
                }
            }
        }
        for scene in Scene::ALL {
            assert!(seen.contains(&scene), "{scene} unreachable");
        }
    }

    #[test]
    fn hub_predecessors() {
        let mut preds: Vec<Scene> = Scene::Hub.predecessors().collect();
        preds.sort_by_key(|s| s.as_str());
        assert_eq!(preds, vec![Scene::Intro, Scene::RoomA, Scene::RoomB]);
    }

    #[test]
    fn only_entry_next_is_guarded() {
        for (from, trigger, _) in TRANSITIONS {
            let guarded = requires_identity(*from, *trigger);
            assert_eq!(guarded, *from == Scene::Entry && *trigger == Trigger::Next);
        }
    }

    #[test]
    fn display_matches_serde() {
        for scene in Scene::ALL {
            let json = serde_json::to_string(&scene).unwrap();
            assert_eq!(format!("\"{scene}\""), json);
            assert_eq!(scene.to_string().parse::<Scene>().unwrap(), scene);
        }
        for trigger in Trigger::ALL {
            let json = serde_json::to_string(&trigger).unwrap();
            assert_eq!(format!("\"{trigger}\""), json);
            assert_eq!(trigger.to_string().parse::<Trigger>().unwrap(), trigger);
        }
    }

    #[test]
    fn unknown_labels_do_not_parse() {
        assert!("teleport".parse::<Trigger>().is_err());
        assert!("Next".parse::<Trigger>().is_err());
        assert!("basement".parse::<Scene>().is_err());
    }
}
