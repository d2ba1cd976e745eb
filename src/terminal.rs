use std::io::{BufRead, Write};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, info};
use regex::Regex;

use crate::config::PlayerConfig;
use crate::dice::RollSource;
use crate::session::{CheckOutcome, Presenter, Session, SessionState};
use crate::story::{Check, Ending, Scene, SceneId};

// ---------------------------------------------------------------------------
// Scene images
// ---------------------------------------------------------------------------

const KEYWORD_GLYPHS: &[(&str, &str)] = &[
    ("rat", "🐀"),
    ("giant-rat", "🐀"),
    ("two-rats", "🐀🐀"),
    ("wizard", "🧙‍♀️"),
    ("cat", "🐱"),
    ("wizard-cat", "🐱✨"),
    ("mountain", "🏔️"),
    ("cave", "🕳️"),
    ("traveller", "🧝‍♀️"),
    ("fight", "⚔️"),
    ("victory", "🏆"),
    ("death", "💀"),
    ("queen", "👑🐀"),
    ("welcome", "🎲"),
    ("character", "🧙‍♀️"),
    ("name", "📝"),
];

/// First match wins, so the more specific phrases come first.
const TEXT_RULES: &[(&str, &str)] = &[
    (r"\brat queen\b", "👑🐀"),
    (r"\bwizard cat\b", "🐱✨"),
    (r"\brats?\b", "🐀"),
    (r"\btraveller\b", "🧝‍♀️"),
    (r"\bcave\b", "🕳️"),
    (r"\b(win|congratulations)\b", "🏆"),
    (r"\b(dead|game over)\b", "💀"),
    (r"\bwelcome\b", "🎲"),
    (r"\bcharacter\b", "🧙‍♀️"),
    (r"\bname\b", "📝"),
    (r"\bmountain\b", "🏔️"),
];

const FALLBACK_GLYPH: &str = "⚔️";

/// Turns a scene's image descriptor into something a terminal can show.
pub struct ImageResolver {
    text_rules: Vec<(Regex, &'static str)>,
}

impl ImageResolver {
    pub fn new() -> Result<Self> {
        let text_rules = TEXT_RULES
            .iter()
            .map(|(pattern, glyph)| {
                Regex::new(&format!("(?i){pattern}"))
                    .with_context(|| format!("bad image rule {pattern}"))
                    .map(|re| (re, *glyph))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { text_rules })
    }

    /// URLs and paths are shown as a reference, keywords map to glyphs,
    /// anything else is printed as-is. Without a descriptor the glyph is
    /// guessed from the scene text.
    pub fn resolve(&self, image: Option<&str>, text: &str) -> String {
        match image {
            Some(url) if url.starts_with("http") || url.starts_with('/') => {
                format!("[image: {url}]")
            }
            Some(descriptor) => KEYWORD_GLYPHS
                .iter()
                .find(|(keyword, _)| *keyword == descriptor)
                .map_or_else(|| descriptor.to_string(), |(_, glyph)| glyph.to_string()),
            None => self
                .text_rules
                .iter()
                .find(|(re, _)| re.is_match(text))
                .map_or(FALLBACK_GLYPH, |(_, glyph)| *glyph)
                .to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Terminal presenter
// ---------------------------------------------------------------------------

const RULE: &str = "========================================";

/// Renders session notifications as text.
///
/// Output is buffered in chunks; a chunk boundary marks where the player
/// should see a pause (between a roll result and the scene it leads to).
pub struct TerminalUi {
    title: String,
    images: Option<ImageResolver>,
    show_title: bool,
    chunks: Vec<String>,
}

impl TerminalUi {
    pub fn new(title: &str, show_images: bool) -> Result<Self> {
        let images = if show_images {
            Some(ImageResolver::new()?)
        } else {
            None
        };
        Ok(Self {
            title: title.to_string(),
            images,
            show_title: true,
            chunks: vec![String::new()],
        })
    }

    /// Print the title banner before the next scene.
    pub fn show_title_again(&mut self) {
        self.show_title = true;
    }

    fn line(&mut self, text: &str) {
        if let Some(chunk) = self.chunks.last_mut() {
            chunk.push_str(text);
            chunk.push('\n');
        }
    }

    /// Write everything rendered so far, sleeping `pause` at each chunk boundary.
    pub fn flush_to(&mut self, out: &mut impl Write, pause: Duration) -> Result<()> {
        let chunks = std::mem::replace(&mut self.chunks, vec![String::new()]);
        for (i, chunk) in chunks.iter().enumerate() {
            if i > 0 && !pause.is_zero() {
                out.flush()?;
                thread::sleep(pause);
            }
            out.write_all(chunk.as_bytes())?;
        }
        out.flush()?;
        Ok(())
    }

    fn render_ending(&mut self, ending: Option<&Ending>) {
        let result = match ending {
            Some(Ending::Win) => "  Result: VICTORY - You won!".to_string(),
            Some(Ending::Lose) => "  Result: DEFEAT - Better luck next time.".to_string(),
            Some(Ending::Other(tag)) => format!("  Result: {tag}"),
            None => "  The story ends here.".to_string(),
        };

        self.line("");
        self.line(RULE);
        self.line("             THE END");
        self.line(RULE);
        self.line(&result);
        self.line(RULE);
        self.line("");
        self.line("  [r] Restart    [q] Quit");
    }
}

impl Presenter for TerminalUi {
    fn scene_changed(
        &mut self,
        id: SceneId,
        scene: &Scene,
        terminal: bool,
        ending: Option<&Ending>,
    ) {
        debug!("Rendering scene {id} (terminal={terminal})");

        if self.show_title {
            self.show_title = false;
            let banner = format!("   {}", self.title.to_uppercase());
            self.line("");
            self.line(RULE);
            self.line(&banner);
            self.line(RULE);
        }

        self.line("");
        if let Some(images) = &self.images {
            let glyph = images.resolve(scene.image.as_deref(), &scene.text);
            self.line(&format!("  {glyph}"));
            self.line("");
        }
        self.line(scene.text.trim_end());

        if terminal {
            self.render_ending(ending);
            return;
        }

        self.line("");
        match scene.choices.as_slice() {
            [only] if only.label.eq_ignore_ascii_case("continue") => {
                self.line("  [Enter] continue");
            }
            choices => {
                for (i, choice) in choices.iter().enumerate() {
                    self.line(&format!("  {}. {}", i + 1, choice.label));
                }
            }
        }
    }

    fn check_requested(&mut self, check: &Check) {
        self.line("");
        self.line(&format!(
            "  🎲 Roll {} or higher to succeed!",
            check.roll_needed
        ));
        self.line("  [Enter] Roll the d20");
    }

    fn check_resolved(&mut self, outcome: &CheckOutcome) {
        if outcome.success {
            self.line(&format!("  You rolled {}! Success! 🎉", outcome.roll));
        } else {
            self.line(&format!("  You rolled {}... Failed! 😢", outcome.roll));
        }
        self.chunks.push(String::new());
    }
}

// ---------------------------------------------------------------------------
// Play loop
// ---------------------------------------------------------------------------

/// What happened over a whole play session.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PlaySummary {
    /// Endings reached, in order. `None` for scenes that simply stop.
    pub endings: Vec<Option<Ending>>,
    pub rolls: Vec<CheckOutcome>,
    pub restarts: usize,
}

fn is_quit(input: &str) -> bool {
    ["q", "quit", "exit"]
        .iter()
        .any(|word| input.eq_ignore_ascii_case(word))
}

/// Turn player input into a choice index for a scene with `count` choices.
/// Numbers are 1-based; Enter picks the only choice when there is one.
fn parse_choice(input: &str, count: usize) -> Option<usize> {
    if input.is_empty() {
        return (count == 1).then_some(0);
    }
    input
        .parse::<usize>()
        .ok()
        .filter(|n| (1..=count).contains(n))
        .map(|n| n - 1)
}

fn record_ending(session: &Session, summary: &mut PlaySummary) {
    if let SessionState::Terminal(id, ending) = session.state() {
        info!("Game over at scene {id} ({ending:?})");
        summary.endings.push(ending.clone());
    }
}

fn prompt(session: &Session) -> String {
    let who = session
        .selected_character()
        .map(|name| format!("[{name}] "))
        .unwrap_or_default();
    match session.state() {
        SessionState::Displaying(_) => format!("\n{who}> "),
        SessionState::AwaitingCheck(..) => format!("\n{who}(roll) > "),
        SessionState::Terminal(..) => "\n> ".to_string(),
    }
}

/// Run the game until the player quits or input ends.
pub fn play(
    session: &mut Session,
    dice: &mut impl RollSource,
    input: &mut impl BufRead,
    output: &mut impl Write,
    config: &PlayerConfig,
) -> Result<PlaySummary> {
    let mut ui = TerminalUi::new(session.graph().title(), config.show_images)?;
    let mut summary = PlaySummary::default();

    info!("Game started at scene {}", session.current_scene_id());
    session.present(&mut ui);
    record_ending(session, &mut summary);

    loop {
        ui.flush_to(output, config.reveal_delay)?;
        write!(output, "{}", prompt(session))?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            info!("Input closed, leaving the game");
            break;
        }
        let line = line.trim();

        if is_quit(line) {
            info!("Player quit at scene {}", session.current_scene_id());
            break;
        }

        if line.eq_ignore_ascii_case("restart") {
            ui.show_title_again();
            session.restart(&mut ui);
            summary.restarts += 1;
            record_ending(session, &mut summary);
            continue;
        }

        match session.state() {
            SessionState::Displaying(_) => {
                let count = session.current_scene().map_or(0, |scene| scene.choices.len());
                match parse_choice(line, count) {
                    Some(index) => {
                        session.select_choice(index, &mut ui)?;
                        record_ending(session, &mut summary);
                    }
                    None => writeln!(output, "  Pick a number from 1 to {count}.")?,
                }
            }
            SessionState::AwaitingCheck(..) => {
                if !(line.is_empty() || line.eq_ignore_ascii_case("roll")) {
                    writeln!(output, "  Press [Enter] to roll.")?;
                    continue;
                }
                if !config.roll_delay.is_zero() {
                    writeln!(output, "  Rolling...")?;
                    output.flush()?;
                    thread::sleep(config.roll_delay);
                }
                let outcome = session.resolve_check(dice, &mut ui)?;
                summary.rolls.push(outcome);
                record_ending(session, &mut summary);
            }
            SessionState::Terminal(..) => {
                if line.eq_ignore_ascii_case("r") {
                    info!("Player chose to restart");
                    ui.show_title_again();
                    session.restart(&mut ui);
                    summary.restarts += 1;
                    record_ending(session, &mut summary);
                } else {
                    writeln!(output, "  Press [r] to restart or [q] to quit.")?;
                }
            }
        }
    }

    ui.flush_to(output, Duration::ZERO)?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Cursor;
    use std::sync::Arc;

    use crate::dice::FixedRolls;
    use crate::story::SceneGraph;

    const FORK: &str = r#"
title: The Fork
scenes:
  1:
    text: Welcome to the fork.
    tag: character-select
    choices:
      - Elara: 2
      - Kira: 2
  2:
    text: Two giant rats block the road.
    image: two-rats
    choices:
      - Fight:
          roll_needed: 10
          succeed: 3
          fail: 4
      - continue: 4
  3:
    text: Congratulations, you win!
    ending: win
  4:
    text: You are dead.
    ending: lose
"#;

    fn run(script: &str, rolls: Vec<u32>) -> (PlaySummary, String) {
        let graph = Arc::new(SceneGraph::from_yaml_str(FORK).unwrap());
        let mut session = Session::new(graph);
        let mut dice = FixedRolls::new(rolls);
        let mut input = Cursor::new(script.as_bytes().to_vec());
        let mut output = Vec::new();
        let config = PlayerConfig::default().fast();

        let summary = play(&mut session, &mut dice, &mut input, &mut output, &config).unwrap();
        (summary, String::from_utf8(output).unwrap())
    }

    #[test]
    fn test_image_resolution() {
        let images = ImageResolver::new().unwrap();
        assert_eq!(images.resolve(Some("cave"), ""), "🕳️");
        assert_eq!(
            images.resolve(Some("https://example.com/rat.png"), ""),
            "[image: https://example.com/rat.png]"
        );
        assert_eq!(
            images.resolve(Some("/img/cave.png"), ""),
            "[image: /img/cave.png]"
        );
        assert_eq!(images.resolve(Some("🧀"), ""), "🧀");
    }

    #[test]
    fn test_image_guessed_from_text() {
        let images = ImageResolver::new().unwrap();
        assert_eq!(images.resolve(None, "The Rat Queen awaits."), "👑🐀");
        assert_eq!(images.resolve(None, "Rats everywhere!"), "🐀");
        // Whole words only: "congratulations" is not about rats.
        assert_eq!(images.resolve(None, "Congratulations, hero."), "🏆");
        assert_eq!(images.resolve(None, "A quiet meadow."), FALLBACK_GLYPH);
    }

    #[test]
    fn test_parse_choice() {
        assert_eq!(parse_choice("1", 2), Some(0));
        assert_eq!(parse_choice("2", 2), Some(1));
        assert_eq!(parse_choice("3", 2), None);
        assert_eq!(parse_choice("0", 2), None);
        assert_eq!(parse_choice("fight", 2), None);
        assert_eq!(parse_choice("", 1), Some(0));
        assert_eq!(parse_choice("", 2), None);
    }

    #[test]
    fn test_play_to_victory() {
        let (summary, out) = run("2\n1\n\nq\n", vec![12]);

        assert!(out.contains("THE FORK"));
        assert!(out.contains("1. Elara"));
        assert!(out.contains("[Kira] > "));
        assert!(out.contains("Roll 10 or higher to succeed!"));
        assert!(out.contains("You rolled 12! Success!"));
        assert!(out.contains("VICTORY"));
        assert_eq!(summary.endings, vec![Some(Ending::Win)]);
        assert_eq!(summary.rolls.len(), 1);
        assert!(summary.rolls[0].success);
    }

    #[test]
    fn test_failed_roll_then_restart() {
        let (summary, out) = run("1\n1\n\nr\n1\n2\nq\n", vec![3]);

        assert!(out.contains("You rolled 3... Failed!"));
        assert!(out.contains("DEFEAT"));
        assert_eq!(summary.restarts, 1);
        assert_eq!(summary.endings, vec![Some(Ending::Lose), Some(Ending::Lose)]);
        // The banner is shown again after a restart.
        assert_eq!(out.matches("THE FORK").count(), 2);
    }

    #[test]
    fn test_invalid_input_is_reprompted() {
        let (summary, out) = run("9\nhello\n1\n1\nnope\nq\n", vec![]);

        assert_eq!(out.matches("Pick a number from 1 to 2.").count(), 2);
        assert!(out.contains("Press [Enter] to roll."));
        assert!(summary.endings.is_empty());
        assert!(summary.rolls.is_empty());
    }

    #[test]
    fn test_ending_prompt_and_eof() {
        let (summary, out) = run("1\n2\nwhat\n", vec![]);

        assert!(out.contains("Press [r] to restart or [q] to quit."));
        assert_eq!(summary.endings, vec![Some(Ending::Lose)]);
    }

    #[test]
    fn test_ending_counted_when_starting_or_restarting_at_one() {
        let graph = Arc::new(
            SceneGraph::from_yaml_str("scenes:\n  1:\n    text: Already over.\n    ending: lose\n")
                .unwrap(),
        );
        let mut session = Session::new(graph);
        let mut output = Vec::new();

        let summary = play(
            &mut session,
            &mut FixedRolls::default(),
            &mut Cursor::new(b"r\nrestart\nq\n".to_vec()),
            &mut output,
            &PlayerConfig::default().fast(),
        )
        .unwrap();

        assert_eq!(summary.restarts, 2);
        assert_eq!(summary.endings, vec![Some(Ending::Lose); 3]);
        assert_eq!(
            String::from_utf8(output).unwrap().matches("DEFEAT").count(),
            3
        );
    }

    #[test]
    fn test_images_can_be_disabled() {
        let graph = Arc::new(SceneGraph::from_yaml_str(FORK).unwrap());
        let mut session = Session::new(graph);
        let mut output = Vec::new();
        let config = PlayerConfig {
            show_images: false,
            ..PlayerConfig::default().fast()
        };

        play(
            &mut session,
            &mut FixedRolls::default(),
            &mut Cursor::new(b"1\nq\n".to_vec()),
            &mut output,
            &config,
        )
        .unwrap();

        let out = String::from_utf8(output).unwrap();
        assert!(!out.contains("🐀🐀"));
        assert!(out.contains("Two giant rats block the road."));
    }
}
