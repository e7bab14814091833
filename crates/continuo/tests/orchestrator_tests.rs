use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use pretty_assertions::assert_eq;

use continuo::{
    orchestrator, ChatBackend, ChatMessage, ChatOutcome, FinishReason, GenerationConfig, Outcome,
    RunLimits, ToolDef, ToolInvocation,
};
use score::{piece_to_midi, read_piece, Measure, Note, Piece, TimeSig};

/// Backend that replays a fixed list of replies in order.
struct ScriptedBackend {
    replies: Mutex<VecDeque<ChatOutcome>>,
    calls: AtomicU32,
}

impl ScriptedBackend {
    fn new(replies: Vec<ChatOutcome>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: AtomicU32::new(0),
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn chat(
        &self,
        _messages: &[ChatMessage],
        _tools: Option<&[ToolDef]>,
        _config: &GenerationConfig,
    ) -> anyhow::Result<ChatOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.replies.lock().unwrap().pop_front();
        Ok(reply.expect("scripted replies exhausted"))
    }
}

fn text(content: &str) -> ChatOutcome {
    ChatOutcome {
        content: Some(content.to_string()),
        tool_calls: Vec::new(),
        finish_reason: FinishReason::Stop,
    }
}

fn tool_call(name: &str, arguments: &str) -> ChatOutcome {
    ChatOutcome {
        content: None,
        tool_calls: vec![ToolInvocation {
            id: format!("call_{name}"),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }],
        finish_reason: FinishReason::ToolCalls,
    }
}

const RULES_JSON: &str = r#"[
    {"name": "stay_in_c", "category": "style", "severity": "soft",
     "text": "Stay in C major throughout the extension."}
]"#;

fn seed_piece(measures: usize) -> Piece {
    let mut piece = Piece::empty(TimeSig::COMMON);
    for i in 0..measures {
        piece.measures.push(Measure {
            notes: vec![
                Note {
                    pitch: 48,
                    velocity: 70,
                    beat: 0.0,
                    duration: 4.0,
                    part: 0,
                },
                Note {
                    pitch: 60 + (i % 5) as u8,
                    velocity: 80,
                    beat: 0.0,
                    duration: 2.0,
                    part: 0,
                },
            ],
        });
    }
    piece
}

fn whole_note_args(measure: usize) -> String {
    format!(r#"{{"measure": {measure}, "notes": [{{"pitch": 60, "beat": 0.0, "duration": 4.0}}]}}"#)
}

/// Composer instruction, one applied edit, handler confirmation.
fn compose_cycle(measure: usize) -> Vec<ChatOutcome> {
    vec![
        text(&format!("Add a whole note C4 in measure {measure}.")),
        tool_call("add_notes", &whole_note_args(measure)),
        text("Added the note."),
    ]
}

fn limits(target: u32) -> RunLimits {
    RunLimits {
        target_measures: target,
        ..RunLimits::default()
    }
}

#[tokio::test]
async fn extends_eight_measures_and_verifies() {
    let mut script = vec![text(RULES_JSON)];
    for measure in 8..16 {
        script.extend(compose_cycle(measure));
    }
    script.push(text("OK"));
    let backend = ScriptedBackend::new(script);
    let mut piece = seed_piece(8);

    let report = orchestrator::run(&backend, &mut piece, &limits(8), "similar style")
        .await
        .unwrap();

    assert_eq!(report.outcome, Outcome::VerifiedClean);
    assert_eq!(report.measures_added, 8);
    assert_eq!(report.review_rounds, 0);
    assert_eq!(report.invocations, 26);
    assert_eq!(backend.calls(), 26);
    assert_eq!(piece.measure_count(), 16);
    // original measures untouched, new measures hold the scripted note
    for measure in &piece.measures[..8] {
        assert_eq!(measure.notes.len(), 2);
    }
    for measure in &piece.measures[8..] {
        assert_eq!(measure.notes.len(), 1);
        assert_eq!(measure.notes[0].pitch, 60);
    }
}

#[tokio::test]
async fn reviewer_waits_until_target_reached() {
    let mut script = vec![text(RULES_JSON)];
    script.extend(compose_cycle(1));
    script.extend(compose_cycle(2));
    script.push(text("OK"));
    let backend = ScriptedBackend::new(script);
    let mut piece = seed_piece(1);

    let report = orchestrator::run(&backend, &mut piece, &limits(2), "style")
        .await
        .unwrap();

    // two full compose cycles ran before the single review call
    assert_eq!(backend.calls(), 8);
    assert_eq!(report.outcome, Outcome::VerifiedClean);
    assert_eq!(piece.measure_count(), 3);
}

#[tokio::test]
async fn clean_first_review_ends_without_corrections() {
    let mut script = vec![text(RULES_JSON)];
    script.extend(compose_cycle(1));
    script.push(text("OK"));
    let backend = ScriptedBackend::new(script);
    let mut piece = seed_piece(1);

    let report = orchestrator::run(&backend, &mut piece, &limits(1), "style")
        .await
        .unwrap();

    assert_eq!(report.outcome, Outcome::VerifiedClean);
    assert_eq!(report.review_rounds, 0);
    assert_eq!(backend.calls(), 5);
    assert_eq!(piece.measure_count(), 2);
}

#[tokio::test]
async fn correction_round_applies_before_sign_off() {
    let mut script = vec![text(RULES_JSON)];
    script.extend(compose_cycle(1));
    script.push(text(
        "Measure 1 is too sparse; replace it with two half notes D4 and E4.",
    ));
    script.push(tool_call(
        "replace_measure",
        r#"{"measure": 1, "notes": [
            {"pitch": 62, "beat": 0.0, "duration": 2.0},
            {"pitch": 64, "beat": 2.0, "duration": 2.0}
        ]}"#,
    ));
    script.push(text("Replaced."));
    script.push(text("OK"));
    let backend = ScriptedBackend::new(script);
    let mut piece = seed_piece(1);

    let report = orchestrator::run(&backend, &mut piece, &limits(1), "style")
        .await
        .unwrap();

    assert_eq!(report.outcome, Outcome::VerifiedClean);
    assert_eq!(report.review_rounds, 1);
    assert_eq!(backend.calls(), 8);
    assert_eq!(piece.measure_count(), 2);
    let pitches: Vec<u8> = piece.measures[1].notes.iter().map(|n| n.pitch).collect();
    assert_eq!(pitches, vec![62, 64]);
}

#[tokio::test]
async fn review_budget_spent_after_three_rounds() {
    let mut script = vec![text(RULES_JSON)];
    script.extend(compose_cycle(1));
    for _ in 0..3 {
        script.push(text("Measure 1 breaks the spacing rule; replace it."));
        script.push(tool_call(
            "replace_measure",
            r#"{"measure": 1, "notes": [{"pitch": 64, "beat": 0.0, "duration": 4.0}]}"#,
        ));
        script.push(text("Replaced."));
    }
    let backend = ScriptedBackend::new(script);
    let mut piece = seed_piece(1);

    let report = orchestrator::run(&backend, &mut piece, &limits(1), "style")
        .await
        .unwrap();

    // the fourth reviewer invocation is never issued
    assert_eq!(report.outcome, Outcome::ReviewBudgetSpent);
    assert_eq!(report.review_rounds, 3);
    assert_eq!(backend.calls(), 13);
    assert_eq!(piece.measure_count(), 2);
}

#[tokio::test]
async fn recursion_limit_one_allows_only_rule_building() {
    let backend = ScriptedBackend::new(vec![text(RULES_JSON)]);
    let mut piece = seed_piece(8);
    let limits = RunLimits {
        target_measures: 8,
        recursion_limit: 1,
        max_review_iterations: 3,
    };

    let report = orchestrator::run(&backend, &mut piece, &limits, "style")
        .await
        .unwrap();

    assert_eq!(report.outcome, Outcome::InvocationLimitReached);
    assert_eq!(report.invocations, 1);
    assert_eq!(backend.calls(), 1);
    assert_eq!(report.measures_added, 0);
    assert_eq!(piece.measure_count(), 8);
}

#[tokio::test]
async fn recursion_limit_cuts_run_mid_composition() {
    let mut script = vec![text(RULES_JSON)];
    script.extend(compose_cycle(1));
    script.push(text("Add a whole note C4 in measure 2."));
    let backend = ScriptedBackend::new(script);
    let mut piece = seed_piece(1);
    let limits = RunLimits {
        target_measures: 8,
        recursion_limit: 5,
        max_review_iterations: 3,
    };

    let report = orchestrator::run(&backend, &mut piece, &limits, "style")
        .await
        .unwrap();

    // the handler turn after the fifth call is blocked before any request
    assert_eq!(report.outcome, Outcome::InvocationLimitReached);
    assert_eq!(report.invocations, 5);
    assert_eq!(backend.calls(), 5);
    assert_eq!(report.measures_added, 1);
    assert_eq!(piece.measure_count(), 2);
}

#[tokio::test]
async fn rejected_edit_is_reported_and_run_continues() {
    let script = vec![
        text(RULES_JSON),
        text("Add a whole note C4 in measure 1."),
        // measure 99 leaves a gap and is rejected by validation
        tool_call("add_notes", &whole_note_args(99)),
        tool_call("add_notes", &whole_note_args(1)),
        text("Added the note."),
        text("OK"),
    ];
    let backend = ScriptedBackend::new(script);
    let mut piece = seed_piece(1);

    let report = orchestrator::run(&backend, &mut piece, &limits(1), "style")
        .await
        .unwrap();

    assert_eq!(report.outcome, Outcome::VerifiedClean);
    assert_eq!(backend.calls(), 6);
    assert_eq!(piece.measure_count(), 2);
    assert_eq!(piece.measures[1].notes.len(), 1);
}

#[tokio::test]
async fn handler_applies_batched_tool_calls() {
    let batched = ChatOutcome {
        content: None,
        tool_calls: vec![
            ToolInvocation {
                id: "call_a".to_string(),
                name: "add_notes".to_string(),
                arguments: whole_note_args(1),
            },
            ToolInvocation {
                id: "call_b".to_string(),
                name: "add_notes".to_string(),
                arguments: r#"{"measure": 1, "notes": [{"pitch": 64, "beat": 2.0, "duration": 2.0}]}"#
                    .to_string(),
            },
        ],
        finish_reason: FinishReason::ToolCalls,
    };
    let script = vec![
        text(RULES_JSON),
        text("Add C4 and E4 in measure 1."),
        batched,
        text("Done."),
        text("OK"),
    ];
    let backend = ScriptedBackend::new(script);
    let mut piece = seed_piece(1);

    let report = orchestrator::run(&backend, &mut piece, &limits(1), "style")
        .await
        .unwrap();

    assert_eq!(report.outcome, Outcome::VerifiedClean);
    let pitches: Vec<u8> = piece.measures[1].notes.iter().map(|n| n.pitch).collect();
    assert_eq!(pitches, vec![60, 64]);
}

#[tokio::test]
async fn unreviewed_output_still_writes_valid_midi() {
    // run that gives up mid-composition; the piece must still serialize
    let mut script = vec![text(RULES_JSON)];
    script.extend(compose_cycle(1));
    script.push(text("Add a whole note C4 in measure 2."));
    let backend = ScriptedBackend::new(script);
    let mut piece = seed_piece(1);
    let limits = RunLimits {
        target_measures: 8,
        recursion_limit: 5,
        max_review_iterations: 3,
    };

    let report = orchestrator::run(&backend, &mut piece, &limits, "style")
        .await
        .unwrap();
    assert_eq!(report.outcome, Outcome::InvocationLimitReached);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.mid");
    std::fs::write(&path, piece_to_midi(&piece)).unwrap();
    let reloaded = read_piece(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(reloaded.measure_count(), piece.measure_count());
    assert_eq!(reloaded.note_count(), piece.note_count());
}

#[tokio::test]
async fn malformed_rule_response_fails_the_run() {
    let backend = ScriptedBackend::new(vec![text("I would rather not produce JSON today.")]);
    let mut piece = seed_piece(1);

    let result = orchestrator::run(&backend, &mut piece, &limits(1), "style").await;

    assert!(result.is_err());
    assert_eq!(backend.calls(), 1);
    assert_eq!(piece.measure_count(), 1);
}

#[tokio::test]
async fn tool_call_turn_without_calls_is_an_error() {
    let empty_call_turn = ChatOutcome {
        content: None,
        tool_calls: Vec::new(),
        finish_reason: FinishReason::ToolCalls,
    };
    let script = vec![
        text(RULES_JSON),
        text("Add a whole note C4 in measure 1."),
        empty_call_turn,
    ];
    let backend = ScriptedBackend::new(script);
    let mut piece = seed_piece(1);

    let result = orchestrator::run(&backend, &mut piece, &limits(1), "style").await;

    assert!(result.is_err());
    assert_eq!(backend.calls(), 3);
}
