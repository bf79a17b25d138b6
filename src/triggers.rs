//! Triggers into the session: shortcut- or UI-sourced, handled alike.

use crate::capture::TargetLanguage;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            "left" => Ok(Direction::Left),
            "right" => Ok(Direction::Right),
            other => Err(format!("Unknown direction: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    Move(Direction),
    Screenshot,
    StartOver,
    ToggleVisibility,
    SolveBatch,
    ToggleDictation,
    Quit,
    Ask(String),
    UploadResume(PathBuf),
    ClearResume,
    Retry,
    SetLanguage(TargetLanguage),
}

impl Trigger {
    /// Map a shortcut action name (plus optional direction) to a trigger.
    pub fn from_shortcut(action: &str, direction: Option<&str>) -> Option<Self> {
        match action {
            "moveWindow" => direction?.parse().ok().map(Trigger::Move),
            "takeScreenshot" => Some(Trigger::Screenshot),
            "startOver" => Some(Trigger::StartOver),
            "toggleVisibility" => Some(Trigger::ToggleVisibility),
            "solveScreenshots" => Some(Trigger::SolveBatch),
            "toggleMic" => Some(Trigger::ToggleDictation),
            "quit" => Some(Trigger::Quit),
            _ => None,
        }
    }
}

/// Default global-shortcut table: accelerator → trigger.
pub fn default_bindings() -> Vec<(&'static str, Trigger)> {
    vec![
        ("Control+Up", Trigger::Move(Direction::Up)),
        ("Control+Down", Trigger::Move(Direction::Down)),
        ("Control+Left", Trigger::Move(Direction::Left)),
        ("Control+Right", Trigger::Move(Direction::Right)),
        ("Control+H", Trigger::Screenshot),
        ("Control+G", Trigger::StartOver),
        ("Control+.", Trigger::ToggleVisibility),
        ("Control+Q", Trigger::Quit),
        ("Control+Enter", Trigger::SolveBatch),
        ("Control+M", Trigger::ToggleDictation),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shortcut_names_map_to_triggers() {
        assert_eq!(Trigger::from_shortcut("solveScreenshots", None), Some(Trigger::SolveBatch));
        assert_eq!(
            Trigger::from_shortcut("moveWindow", Some("left")),
            Some(Trigger::Move(Direction::Left))
        );
        assert_eq!(Trigger::from_shortcut("moveWindow", None), None);
        assert_eq!(Trigger::from_shortcut("dance", None), None);
    }

    #[test]
    fn bindings_are_unique() {
        let bindings = default_bindings();
        let mut keys: Vec<_> = bindings.iter().map(|(k, _)| *k).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), bindings.len());
    }
}
