//! Headless mode for Word Warrior.
//!
//! A line-oriented protocol over stdin/stdout, suitable for scripted play:
//! - Plain words are game actions (`pick 2`, `mark 0 s`, `submit`, ...)
//! - Lines starting with `#` are driver commands (`#status`, `#map`, `#quit`)
//! - Output lines are tagged (`[STATUS]`, `[QUESTION]`, `[ERROR]`, ...)
//!
//! The session clock is driven from a tokio interval, so countdowns and
//! combat phases advance in real time between inputs.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};
use word_warrior_core::{GameSession, GameSnapshot, GameStatus, Role};

/// Wall-clock interval between clock advances.
const FRAME: Duration = Duration::from_millis(100);

// ============================================================================
// Commands
// ============================================================================

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Go(String),
    Pick(usize),
    Confirm,
    Mark(usize, Role),
    Submit,
    Next,
    Pause,
    Resume,
    Advance,
    Restart,
    Leave,
    Status,
    Map,
    Help,
    Quit,
}

impl Command {
    /// Parse an input line.
    pub fn parse(line: &str) -> Result<Command, String> {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix('#') {
            return match rest.split_whitespace().next() {
                Some("quit") | Some("exit") => Ok(Command::Quit),
                Some("status") => Ok(Command::Status),
                Some("map") => Ok(Command::Map),
                Some("help") => Ok(Command::Help),
                _ => Err("Unknown command. Type #help for help.".to_string()),
            };
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            ["start"] => Ok(Command::Start),
            ["go", node] => Ok(Command::Go((*node).to_string())),
            ["go"] => Err("Usage: go <node-id>".to_string()),
            ["pick", n] => n
                .parse()
                .map(Command::Pick)
                .map_err(|_| format!("Not a card number: {n}")),
            ["pick"] => Err("Usage: pick <n>".to_string()),
            ["confirm"] => Ok(Command::Confirm),
            ["mark", index, role] => {
                let index = index
                    .parse()
                    .map_err(|_| format!("Not a block index: {index}"))?;
                let role = role
                    .chars()
                    .next()
                    .and_then(Role::from_letter)
                    .ok_or_else(|| format!("Unknown role: {role} (use s, v, o or h)"))?;
                Ok(Command::Mark(index, role))
            }
            ["mark", ..] => Err("Usage: mark <index> <s|v|o|h>".to_string()),
            ["submit"] => Ok(Command::Submit),
            ["next"] => Ok(Command::Next),
            ["pause"] => Ok(Command::Pause),
            ["resume"] => Ok(Command::Resume),
            ["advance"] => Ok(Command::Advance),
            ["restart"] => Ok(Command::Restart),
            ["leave"] => Ok(Command::Leave),
            _ => Err(format!("Unknown action: {line}. Type #help for help.")),
        }
    }
}

// ============================================================================
// Driver
// ============================================================================

/// Run the game in headless mode until `#quit` or end of input.
pub async fn run_headless(mut session: GameSession) -> anyhow::Result<()> {
    println!("=== Word Warrior Headless Mode ===");
    print_help();
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(FRAME);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_frame = Instant::now();
    let mut view = ViewState::default();

    view.refresh(&mut session);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    debug!("input closed");
                    break;
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match Command::parse(line) {
                    Ok(Command::Quit) => {
                        println!("Goodbye!");
                        break;
                    }
                    Ok(command) => {
                        if let Err(e) = execute(&mut session, &command) {
                            println!("[ERROR] {e}");
                        }
                    }
                    Err(e) => println!("[ERROR] {e}"),
                }
            }
            now = ticker.tick() => {
                let elapsed = now.saturating_duration_since(last_frame);
                last_frame = now;
                session.advance_clock(elapsed);
            }
        }
        view.refresh(&mut session);
    }

    info!(score = session.score(), level = session.level(), "headless session ended");
    Ok(())
}

fn execute(session: &mut GameSession, command: &Command) -> anyhow::Result<()> {
    let status = session.status();
    let accepted = match command {
        Command::Start => session.start(),
        Command::Go(node) => session.enter_node(node),
        Command::Pick(n) => session.toggle_card(*n),
        Command::Confirm => session.confirm_selection()?,
        Command::Mark(index, role) => session.mark_block(*index, *role),
        Command::Submit => session.submit(),
        Command::Next => session.continue_round(),
        Command::Pause => session.pause(),
        Command::Resume => session.resume(),
        Command::Advance => session.advance(),
        Command::Restart => session.restart(),
        Command::Leave => session.quit(),
        Command::Status => {
            print_status(&session.snapshot());
            true
        }
        Command::Map => {
            print_map(&session.snapshot());
            true
        }
        Command::Help => {
            print_help();
            true
        }
        Command::Quit => true,
    };
    if !accepted {
        anyhow::bail!("{command:?} is not available while {status}");
    }
    Ok(())
}

// ============================================================================
// Rendering
// ============================================================================

/// What has already been shown, so frames only print changes.
#[derive(Default)]
struct ViewState {
    status: Option<GameStatus>,
    question: Option<(String, usize)>,
    picked: Vec<usize>,
    marks: Vec<Option<Role>>,
    whole_seconds: Option<u64>,
}

impl ViewState {
    fn refresh(&mut self, session: &mut GameSession) {
        for line in session.drain_log() {
            println!("[LOG] {line}");
        }

        let snap = session.snapshot();
        let status_changed = self.status != Some(snap.status);
        if status_changed {
            self.status = Some(snap.status);
            print_status(&snap);
            match snap.status {
                GameStatus::Map => print_map(&snap),
                GameStatus::CardSelection => print_candidates(&snap),
                GameStatus::Feedback => print_feedback(&snap),
                GameStatus::Victory => println!("[VICTORY] Type `advance` to continue."),
                GameStatus::GameOver => {
                    println!("[GAME OVER] Score {}. Type `restart` to try again.", snap.score)
                }
                _ => {}
            }
        }

        if snap.status == GameStatus::CardSelection && snap.picked != self.picked {
            self.picked = snap.picked.clone();
            if !status_changed {
                print_candidates(&snap);
            }
        }

        let key = snap
            .question
            .as_ref()
            .filter(|q| !q.is_clearing)
            .map(|q| (q.question_id.clone(), snap.round_progress));
        let marks: Vec<Option<Role>> = snap
            .question
            .as_ref()
            .map(|q| q.blocks.iter().map(|b| b.selected).collect())
            .unwrap_or_default();
        if snap.status == GameStatus::Playing
            && key.is_some()
            && (key != self.question || marks != self.marks)
        {
            self.question = key;
            self.marks = marks;
            print_question(&snap);
        }

        if snap.status == GameStatus::Playing {
            let secs = snap.time_left_secs.ceil() as u64;
            if self.whole_seconds != Some(secs) {
                self.whole_seconds = Some(secs);
                if secs <= 5 || secs % 10 == 0 {
                    println!("[TIME] {secs}s");
                }
            }
        } else {
            self.whole_seconds = None;
        }
    }
}

fn print_status(snap: &GameSnapshot) {
    println!(
        "[STATUS] {} | Floor {} Round {} | Score {} Combo {}",
        snap.status, snap.level, snap.round, snap.score, snap.combo
    );
    let hero = &snap.hero.vitals;
    println!(
        "  Hero: {}/{} HP, {} shield",
        hero.current, hero.maximum, hero.block
    );
    for (i, enemy) in snap.enemies.iter().enumerate() {
        println!(
            "  Enemy {i}: {} {}/{} HP, {} shield, intent {} {}",
            enemy.kind,
            enemy.vitals.current,
            enemy.vitals.maximum,
            enemy.vitals.block,
            enemy.intent,
            enemy.intent_value
        );
    }
    if snap.round_length > 0 {
        let p = &snap.preview;
        println!(
            "  Hand: {}/{} answered, {} perfect | ATK {} x{} | Block {} | Heal {}",
            snap.round_progress,
            snap.round_length,
            snap.perfects_in_round,
            p.final_attack,
            p.total_attack_count,
            p.final_block,
            p.heal
        );
    }
    println!(
        "  Piles: deck {} candidates {} hand {} discard {}",
        snap.piles.deck, snap.piles.candidates, snap.piles.hand, snap.piles.discard
    );
}

fn print_map(snap: &GameSnapshot) {
    println!("[MAP] Floor {}", snap.map.floor);
    let reachable: Vec<&str> = snap
        .map
        .reachable_nodes()
        .into_iter()
        .map(|n| n.id.as_str())
        .collect();
    for node in &snap.map.nodes {
        let marker = if node.id == snap.map.current_node_id {
            ">"
        } else if reachable.contains(&node.id.as_str()) {
            "*"
        } else {
            " "
        };
        let done = if node.completed { " (cleared)" } else { "" };
        println!("  {marker} {} {}{done}", node.id, node.node_type);
    }
}

fn print_candidates(snap: &GameSnapshot) {
    println!(
        "[CARDS] Pick {} of {} ({} picked)",
        snap.max_select,
        snap.candidates.len(),
        snap.picked.len()
    );
    for (i, card) in snap.candidates.iter().enumerate() {
        let mark = match snap.picked.iter().position(|p| *p == i) {
            Some(order) => format!("[{}]", order + 1),
            None => "[ ]".to_string(),
        };
        println!("  {i}: {mark} {card}");
    }
}

fn print_question(snap: &GameSnapshot) {
    let Some(q) = &snap.question else {
        return;
    };
    println!(
        "[QUESTION] {}/{} {} ({} {}), {}s",
        snap.round_progress + 1,
        snap.round_length,
        q.card_name,
        q.rarity,
        q.card_type,
        q.time_limit_secs
    );
    println!("  {}", q.text);
    let blocks: Vec<String> = q
        .blocks
        .iter()
        .enumerate()
        .map(|(i, b)| match b.selected {
            Some(role) => format!("{i}:{}={}", b.ch, role.letter()),
            None => format!("{i}:{}", b.ch),
        })
        .collect();
    println!("  {}", blocks.join(" "));
}

fn print_feedback(snap: &GameSnapshot) {
    let Some(fb) = &snap.feedback else {
        return;
    };
    let verdict = if fb.is_perfect { "PERFECT" } else { "MISSED" };
    println!(
        "[FEEDBACK] {verdict} {} | {}/{} correct, {} wrong, x{:.2} time",
        fb.card_name,
        fb.grade.correct,
        fb.grade.total_targets,
        fb.grade.wrong,
        fb.time_multiplier
    );
    let answer: Vec<String> = fb
        .correct_blocks
        .iter()
        .map(|b| match b.selected {
            Some(role) => format!("{}={}", b.ch, role.letter()),
            None => b.ch.to_string(),
        })
        .collect();
    println!("  Answer: {}", answer.join(" "));
    println!("  Type `next` to continue.");
}

fn print_help() {
    println!("[HELP]");
    println!("  start              - Begin a run");
    println!("  go <node>          - Enter a map node");
    println!("  pick <n>           - Pick or unpick candidate n");
    println!("  confirm            - Confirm the picked cards");
    println!("  mark <i> <s|v|o|h> - Tag block i (again to untag)");
    println!("  submit             - Submit the current answer");
    println!("  next               - Dismiss feedback");
    println!("  pause / resume     - Freeze or thaw the clock");
    println!("  advance            - Leave a won fight");
    println!("  restart            - New run after defeat");
    println!("  leave              - Abandon the run");
    println!("  #status            - Show current game status");
    println!("  #map               - Show the floor map");
    println!("  #help              - Show this help");
    println!("  #quit              - Exit");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_actions() {
        assert_eq!(Command::parse("start"), Ok(Command::Start));
        assert_eq!(
            Command::parse("go node_1_0"),
            Ok(Command::Go("node_1_0".to_string()))
        );
        assert_eq!(Command::parse("pick 3"), Ok(Command::Pick(3)));
        assert_eq!(Command::parse("  mark 2 V "), Ok(Command::Mark(2, Role::Verb)));
        assert_eq!(Command::parse("next"), Ok(Command::Next));
    }

    #[test]
    fn test_parse_driver_commands() {
        assert_eq!(Command::parse("#quit"), Ok(Command::Quit));
        assert_eq!(Command::parse("#exit"), Ok(Command::Quit));
        assert_eq!(Command::parse("#status"), Ok(Command::Status));
        assert!(Command::parse("#save game.json").is_err());
    }

    #[test]
    fn test_parse_rejects_bad_arguments() {
        assert!(Command::parse("pick two").is_err());
        assert!(Command::parse("mark 1").is_err());
        assert!(Command::parse("mark 1 x").is_err());
        assert!(Command::parse("go").is_err());
        assert!(Command::parse("dance").is_err());
    }

    #[test]
    fn test_rejected_action_reports_status() {
        let mut session = GameSession::with_defaults(
            word_warrior_core::GameConfig::default().with_seed(1),
        );
        let err = execute(&mut session, &Command::Submit).unwrap_err();
        assert!(err.to_string().contains("START"));
        assert!(execute(&mut session, &Command::Start).is_ok());
    }
}
