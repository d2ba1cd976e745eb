use std::fmt;

use serde::Deserialize;

/// Identifier of a scene in the graph. Ids are positive integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(transparent)]
pub struct SceneId(pub u32);

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a terminal scene ends. `win` and `lose` are the outcomes the player
/// understands; anything else is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum Ending {
    Win,
    Lose,
    Other(String),
}

impl From<String> for Ending {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "win" => Self::Win,
            "lose" => Self::Lose,
            _ => Self::Other(tag),
        }
    }
}

impl fmt::Display for Ending {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Win => write!(f, "win"),
            Self::Lose => write!(f, "lose"),
            Self::Other(tag) => write!(f, "{tag}"),
        }
    }
}

/// Declarative role of a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SceneTag {
    /// The label of the `Goto` choice taken here becomes the selected character.
    CharacterSelect,
}

/// A d20 check: roll `roll_needed` or higher to go to `succeed`, otherwise `fail`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Check {
    pub roll_needed: u32,
    pub succeed: SceneId,
    pub fail: SceneId,
}

impl Check {
    pub fn passes(&self, roll: u32) -> bool {
        roll >= self.roll_needed
    }

    pub fn target(&self, success: bool) -> SceneId {
        if success {
            self.succeed
        } else {
            self.fail
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Goto(SceneId),
    Check(Check),
}

impl Action {
    /// Every scene id this action can lead to.
    pub fn targets(&self) -> Vec<SceneId> {
        match self {
            Self::Goto(target) => vec![*target],
            Self::Check(check) => vec![check.succeed, check.fail],
        }
    }
}

/// A labelled action offered to the player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub label: String,
    pub action: Action,
}

/// One narrative unit of the story.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scene {
    pub text: String,
    /// URL/path, keyword or inline glyph. `None` lets the renderer pick one.
    pub image: Option<String>,
    pub ending: Option<Ending>,
    pub tag: Option<SceneTag>,
    /// Empty for terminal scenes.
    pub choices: Vec<Choice>,
}

impl Scene {
    pub fn is_terminal(&self) -> bool {
        self.ending.is_some() || self.choices.is_empty()
    }

    pub fn is_character_select(&self) -> bool {
        self.tag == Some(SceneTag::CharacterSelect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ending_from_tag() {
        assert_eq!(Ending::from("win".to_string()), Ending::Win);
        assert_eq!(Ending::from("lose".to_string()), Ending::Lose);
        assert_eq!(
            Ending::from("draw".to_string()),
            Ending::Other("draw".into())
        );
        assert_eq!(Ending::Other("draw".into()).to_string(), "draw");
    }

    #[test]
    fn test_check_threshold_is_inclusive() {
        let check = Check {
            roll_needed: 10,
            succeed: SceneId(3),
            fail: SceneId(4),
        };
        assert!(check.passes(10));
        assert!(check.passes(20));
        assert!(!check.passes(9));
        assert_eq!(check.target(true), SceneId(3));
        assert_eq!(check.target(false), SceneId(4));
    }

    #[test]
    fn test_scene_without_choices_is_terminal() {
        let scene = Scene {
            text: "The end?".into(),
            image: None,
            ending: None,
            tag: None,
            choices: vec![],
        };
        assert!(scene.is_terminal());
        assert!(!scene.is_character_select());
    }
}
