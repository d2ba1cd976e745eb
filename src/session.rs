use std::fmt;
use std::sync::Arc;

use log::{debug, info};

use crate::dice::{RollSource, D20_SIDES};
use crate::error::SessionError;
use crate::story::{Action, Check, Ending, Scene, SceneGraph, SceneId};

// ---------------------------------------------------------------------------
// Presentation notifications
// ---------------------------------------------------------------------------

/// Receives state changes from a `Session`. The session never renders
/// anything itself; implementors own all visual and audio output.
pub trait Presenter {
    fn scene_changed(
        &mut self,
        _id: SceneId,
        _scene: &Scene,
        _terminal: bool,
        _ending: Option<&Ending>,
    ) {
    }

    /// The player picked a check; the roll waits for their signal.
    fn check_requested(&mut self, _check: &Check) {}

    /// Called with the roll before the session moves to `outcome.next`.
    fn check_resolved(&mut self, _outcome: &CheckOutcome) {}
}

/// Discards every notification.
impl Presenter for () {}

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Displaying(SceneId),
    AwaitingCheck(SceneId, Check),
    Terminal(SceneId, Option<Ending>),
}

impl SessionState {
    pub fn scene_id(&self) -> SceneId {
        match self {
            Self::Displaying(id) | Self::AwaitingCheck(id, _) | Self::Terminal(id, _) => *id,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Displaying(id) => write!(f, "displaying scene {id}"),
            Self::AwaitingCheck(id, check) => write!(
                f,
                "awaiting a roll of {} or higher in scene {id}",
                check.roll_needed
            ),
            Self::Terminal(id, Some(ending)) => write!(f, "at the '{ending}' ending in scene {id}"),
            Self::Terminal(id, None) => write!(f, "at the end of scene {id}"),
        }
    }
}

/// Result of a resolved check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckOutcome {
    pub roll: u32,
    pub success: bool,
    /// Scene the session moves to.
    pub next: SceneId,
}

/// One player's walk through a scene graph.
#[derive(Debug, Clone)]
pub struct Session {
    graph: Arc<SceneGraph>,
    state: SessionState,
    selected_character: Option<String>,
}

impl Session {
    pub fn new(graph: Arc<SceneGraph>) -> Self {
        let state = arrival_state(&graph, graph.start());
        Self {
            graph,
            state,
            selected_character: None,
        }
    }

    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn current_scene_id(&self) -> SceneId {
        self.state.scene_id()
    }

    pub fn current_scene(&self) -> Option<&Scene> {
        self.graph.get(self.current_scene_id())
    }

    pub fn pending_check(&self) -> Option<&Check> {
        match &self.state {
            SessionState::AwaitingCheck(_, check) => Some(check),
            _ => None,
        }
    }

    pub fn selected_character(&self) -> Option<&str> {
        self.selected_character.as_deref()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, SessionState::Terminal(..))
    }

    /// Take the choice at `index` in the current scene.
    ///
    /// Only valid while displaying a scene. An out-of-range index leaves the
    /// session untouched.
    pub fn select_choice(
        &mut self,
        index: usize,
        presenter: &mut impl Presenter,
    ) -> Result<&SessionState, SessionError> {
        let current = match &self.state {
            SessionState::Displaying(id) => *id,
            other => return Err(invalid_state("select a choice", other)),
        };

        let graph = Arc::clone(&self.graph);
        let scene = graph.get(current);
        let choices = scene.map_or(&[][..], |scene| scene.choices.as_slice());
        let choice = choices.get(index).ok_or(SessionError::InvalidChoice {
            scene: current,
            index,
            available: choices.len(),
        })?;

        match choice.action {
            Action::Goto(target) => {
                if scene.is_some_and(Scene::is_character_select) {
                    info!("Selected character: {}", choice.label);
                    self.selected_character = Some(choice.label.clone());
                }
                self.enter(target, presenter);
            }
            Action::Check(check) => {
                info!(
                    "Check requested in scene {current}: '{}' needs {}",
                    choice.label, check.roll_needed
                );
                self.state = SessionState::AwaitingCheck(current, check);
                presenter.check_requested(&check);
            }
        }

        Ok(&self.state)
    }

    /// Roll a d20 for the pending check and move to the matching scene.
    pub fn resolve_check(
        &mut self,
        dice: &mut impl RollSource,
        presenter: &mut impl Presenter,
    ) -> Result<CheckOutcome, SessionError> {
        let check = match &self.state {
            SessionState::AwaitingCheck(_, check) => *check,
            other => return Err(invalid_state("resolve a check", other)),
        };

        let roll = dice.roll(D20_SIDES);
        let success = check.passes(roll);
        let outcome = CheckOutcome {
            roll,
            success,
            next: check.target(success),
        };
        debug!(
            "Rolled {roll} against {} ({})",
            check.roll_needed,
            if success { "success" } else { "failure" }
        );

        presenter.check_resolved(&outcome);
        self.enter(outcome.next, presenter);
        Ok(outcome)
    }

    /// Back to the start scene with no character and no pending check.
    pub fn restart(&mut self, presenter: &mut impl Presenter) {
        info!("Restarting from scene {}", self.graph.start());
        self.selected_character = None;
        self.enter(self.graph.start(), presenter);
    }

    /// Re-send notifications describing the current state.
    pub fn present(&self, presenter: &mut impl Presenter) {
        let id = self.current_scene_id();
        if let Some(scene) = self.graph.get(id) {
            presenter.scene_changed(id, scene, self.is_terminal(), scene.ending.as_ref());
        }
        if let Some(check) = self.pending_check() {
            presenter.check_requested(check);
        }
    }

    fn enter(&mut self, target: SceneId, presenter: &mut impl Presenter) {
        let from = self.current_scene_id();
        self.state = arrival_state(&self.graph, target);
        info!("Transition: {from} -> {target} ({})", self.state);

        if let Some(scene) = self.graph.get(target) {
            presenter.scene_changed(target, scene, self.is_terminal(), scene.ending.as_ref());
        }
    }
}

fn arrival_state(graph: &SceneGraph, id: SceneId) -> SessionState {
    match graph.get(id) {
        Some(scene) if scene.is_terminal() => SessionState::Terminal(id, scene.ending.clone()),
        _ => SessionState::Displaying(id),
    }
}

fn invalid_state(operation: &'static str, state: &SessionState) -> SessionError {
    SessionError::InvalidState {
        operation,
        state: state.to_string(),
    }
}
