// End-to-end tests for the live session plumbing: server message parsing,
// playback scheduling on the timeline, and transcript turn assembly.

use gemini_workbench::live::{parse_server_message, LiveEvent};
use gemini_workbench::timeline::Timeline;
use gemini_workbench::transcript::{Speaker, TurnAssembler};

#[test]
fn test_fragments_scheduled_gaplessly_while_stream_runs_ahead() {
    let mut timeline = Timeline::new();

    // Three fragments arrive in quick succession while the clock barely moves
    let a = timeline.schedule(0.00, 0.5);
    let b = timeline.schedule(0.01, 0.5);
    let c = timeline.schedule(0.02, 0.25);

    assert_eq!(a.start, 0.0);
    assert_eq!(b.start, 0.5);
    assert_eq!(c.start, 1.0);
    assert_eq!(timeline.cursor(), 1.25);
    assert_eq!(timeline.pending_count(), 3);
}

#[test]
fn test_schedule_after_idle_snaps_to_clock() {
    let mut timeline = Timeline::new();

    let a = timeline.schedule(0.0, 0.2);
    timeline.complete(a.id);

    // Playback drained long ago; the next fragment starts now, not at 0.2
    let b = timeline.schedule(5.0, 0.3);
    assert_eq!(b.start, 5.0);
    assert_eq!(timeline.cursor(), 5.3);
}

#[test]
fn test_interruption_resets_schedule_and_pending() {
    let mut timeline = Timeline::new();

    timeline.schedule(0.0, 1.0);
    timeline.schedule(0.0, 1.0);
    let dropped = timeline.interrupt();

    assert_eq!(dropped.len(), 2);
    assert_eq!(timeline.pending_count(), 0);

    // The next response after the interruption schedules from the clock again
    let next = timeline.schedule(3.0, 0.5);
    assert_eq!(next.start, 3.0);
}

#[test]
fn test_conversation_turn_assembles_from_server_messages() {
    let mut assembler = TurnAssembler::new();

    let messages = [
        r#"{"setupComplete": {}}"#,
        r#"{"serverContent": {"inputTranscription": {"text": "What is "}}}"#,
        r#"{"serverContent": {"inputTranscription": {"text": "Rust?"}}}"#,
        r#"{"serverContent": {"outputTranscription": {"text": "A systems "}}}"#,
        r#"{"serverContent": {"outputTranscription": {"text": "language."}, "turnComplete": true}}"#,
    ];

    for message in &messages {
        for event in parse_server_message(message) {
            match event {
                LiveEvent::InputTranscript(text) => assembler.push_input(&text),
                LiveEvent::OutputTranscript(text) => assembler.push_output(&text),
                LiveEvent::TurnComplete => {
                    assembler.complete_turn();
                }
                LiveEvent::SetupComplete => {}
                other => panic!("unexpected event {:?}", other),
            }
        }
    }

    let history = assembler.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].speaker, Speaker::User);
    assert_eq!(history[0].text, "What is Rust?");
    assert_eq!(history[1].speaker, Speaker::Model);
    assert_eq!(history[1].text, "A systems language.");
}

#[test]
fn test_interrupted_turn_keeps_accumulating_until_complete() {
    let mut assembler = TurnAssembler::new();
    let mut timeline = Timeline::new();

    // Model starts speaking
    timeline.schedule(0.0, 1.0);
    assembler.push_output("I was saying");

    // User barges in: playback resets, transcripts survive
    let message = r#"{"serverContent": {"interrupted": true, "inputTranscription": {"text": "stop"}}}"#;
    for event in parse_server_message(message) {
        match event {
            LiveEvent::Interrupted => {
                timeline.interrupt();
            }
            LiveEvent::InputTranscript(text) => assembler.push_input(&text),
            other => panic!("unexpected event {:?}", other),
        }
    }

    assert_eq!(timeline.pending_count(), 0);
    assert_eq!(assembler.partial_output(), "I was saying");
    assert_eq!(assembler.partial_input(), "stop");

    let entries = assembler.complete_turn();
    assert_eq!(entries.len(), 2);
}

#[test]
fn test_audio_and_turn_complete_in_one_message_keep_order() {
    // PCM for one sample: [0, 0]
    let message = r#"{"serverContent": {
        "modelTurn": {"parts": [{"inlineData": {"mimeType": "audio/pcm", "data": "AAA="}}]},
        "turnComplete": true
    }}"#;

    let events = parse_server_message(message);
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], LiveEvent::Audio(_)));
    assert_eq!(events[1], LiveEvent::TurnComplete);
}
