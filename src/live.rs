/// Bidirectional live voice conversation over the Gemini realtime WebSocket
///
/// One socket thread owns the connection: it drains queued microphone frames
/// onto the wire and polls for server messages with a short read timeout.
/// Parsed messages surface as `LiveEvent`s on a channel; the run loop turns
/// them into playback, transcript assembly and interruption handling.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, SyncSender, TrySendError, channel, sync_channel};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

use crate::capture::MicrophoneCapture;
use crate::config::Config;
use crate::constants::audio::{INPUT_MIME, OUTPUT_SAMPLE_RATE};
use crate::constants::live::{MAX_PENDING_FRAMES, SOCKET_READ_TIMEOUT_MS};
use crate::constants::models;
use crate::gemini::{Blob, Content, GenerationConfig};
use crate::media;
use crate::playback::SpeakerPlayback;
use crate::transcript::{Speaker, TurnAssembler};

const LIVE_ENDPOINT: &str =
    "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

/// Event produced by the session's socket thread
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    /// Server accepted the setup message; streaming may begin
    SetupComplete,
    /// One fragment of model speech (raw 24 kHz mono PCM16 bytes)
    Audio(Vec<u8>),
    /// Fragment of the user's transcribed speech
    InputTranscript(String),
    /// Fragment of the model's transcribed speech
    OutputTranscript(String),
    /// The model finished a response turn
    TurnComplete,
    /// The user spoke over the model; pending playback must be discarded
    Interrupted,
    /// The session failed; the caller must tear down
    Error(String),
    /// The server closed the connection
    Closed,
}

// ── Wire format ──────────────────────────────────────────────────────────

#[derive(Serialize)]
struct SetupMessage {
    setup: Setup,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Setup {
    model: String,
    generation_config: GenerationConfig,
    system_instruction: Content,
    input_audio_transcription: Empty,
    output_audio_transcription: Empty,
}

#[derive(Serialize)]
struct Empty {}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RealtimeMessage {
    realtime_input: RealtimeInput,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RealtimeInput {
    media_chunks: Vec<Blob>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerMessage {
    setup_complete: Option<serde_json::Value>,
    server_content: Option<ServerContent>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct ServerContent {
    model_turn: Option<Content>,
    interrupted: bool,
    turn_complete: bool,
    input_transcription: Option<TranscriptionFragment>,
    output_transcription: Option<TranscriptionFragment>,
}

#[derive(Deserialize)]
struct TranscriptionFragment {
    #[serde(default)]
    text: String,
}

/// Translate one server message into events, preserving handling order:
/// audio first, then interruption, then transcriptions, then turn completion.
pub fn parse_server_message(payload: &str) -> Vec<LiveEvent> {
    let message: ServerMessage = match serde_json::from_str(payload) {
        Ok(message) => message,
        Err(e) => return vec![LiveEvent::Error(format!("Unparsable server message: {}", e))],
    };

    let mut events = Vec::new();

    if message.setup_complete.is_some() {
        events.push(LiveEvent::SetupComplete);
    }

    let Some(content) = message.server_content else {
        return events;
    };

    if let Some(turn) = &content.model_turn {
        if let Some(blob) = turn.parts.first().and_then(|p| p.inline_data.as_ref()) {
            match media::base64_decode(&blob.data) {
                Ok(pcm) => events.push(LiveEvent::Audio(pcm)),
                Err(e) => events.push(LiveEvent::Error(e.to_string())),
            }
        }
    }

    if content.interrupted {
        events.push(LiveEvent::Interrupted);
    }

    if let Some(fragment) = content.input_transcription {
        events.push(LiveEvent::InputTranscript(fragment.text));
    }
    if let Some(fragment) = content.output_transcription {
        events.push(LiveEvent::OutputTranscript(fragment.text));
    }

    if content.turn_complete {
        events.push(LiveEvent::TurnComplete);
    }

    events
}

// ── Session ──────────────────────────────────────────────────────────────

pub struct LiveSession {
    frame_tx: SyncSender<Blob>,
    event_rx: Receiver<LiveEvent>,
    closing: Arc<AtomicBool>,
    socket_thread: Option<JoinHandle<()>>,
}

impl LiveSession {
    /// Open the WebSocket, send the setup message and start the socket thread
    pub fn connect(
        api_key: &str,
        model: &str,
        voice: &str,
        system_instruction: &str,
    ) -> Result<Self> {
        let url = format!("{}?key={}", LIVE_ENDPOINT, api_key);
        let (mut socket, _response) =
            tungstenite::connect(url.as_str()).context("Failed to open live session")?;

        set_read_timeout(&socket, Duration::from_millis(SOCKET_READ_TIMEOUT_MS))?;

        let setup = SetupMessage {
            setup: Setup {
                model: format!("models/{}", model),
                generation_config: GenerationConfig::audio_voice(voice),
                system_instruction: Content::system(system_instruction),
                input_audio_transcription: Empty {},
                output_audio_transcription: Empty {},
            },
        };
        let setup_json = serde_json::to_string(&setup).context("Failed to encode setup")?;
        socket
            .send(Message::Text(setup_json))
            .context("Failed to send session setup")?;

        // Bounded: when the socket thread falls behind, fresh frames are
        // dropped rather than buffered (there is no backpressure signal)
        let (frame_tx, frame_rx) = sync_channel::<Blob>(MAX_PENDING_FRAMES);
        let (event_tx, event_rx) = channel();
        let closing = Arc::new(AtomicBool::new(false));

        let thread_closing = Arc::clone(&closing);
        let socket_thread = thread::spawn(move || {
            socket_loop(socket, frame_rx, event_tx, thread_closing);
        });

        Ok(LiveSession {
            frame_tx,
            event_rx,
            closing,
            socket_thread: Some(socket_thread),
        })
    }

    /// Queue one 16 kHz frame of microphone samples for transmission
    pub fn send_frame(&self, samples: &[f32]) {
        let blob = Blob {
            mime_type: INPUT_MIME.to_string(),
            data: media::base64_encode(&media::encode_pcm16(samples)),
        };
        match self.frame_tx.try_send(blob) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                eprintln!("⚠️  Outgoing frame queue full, dropping frame");
            }
            Err(TrySendError::Disconnected(_)) => {
                // Socket thread already exited; its Error/Closed event is
                // waiting in the event channel
            }
        }
    }

    pub fn poll_event(&self) -> Option<LiveEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Close the socket and wait for the socket thread to exit
    pub fn close(mut self) {
        self.closing.store(true, Ordering::SeqCst);
        if let Some(handle) = self.socket_thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        self.closing.store(true, Ordering::SeqCst);
        if let Some(handle) = self.socket_thread.take() {
            let _ = handle.join();
        }
    }
}

fn set_read_timeout(
    socket: &WebSocket<MaybeTlsStream<TcpStream>>,
    timeout: Duration,
) -> Result<()> {
    let result = match socket.get_ref() {
        MaybeTlsStream::Plain(stream) => stream.set_read_timeout(Some(timeout)),
        MaybeTlsStream::NativeTls(stream) => stream.get_ref().set_read_timeout(Some(timeout)),
        _ => Ok(()),
    };
    result.context("Failed to configure socket read timeout")
}

fn socket_loop(
    mut socket: WebSocket<MaybeTlsStream<TcpStream>>,
    frame_rx: Receiver<Blob>,
    event_tx: std::sync::mpsc::Sender<LiveEvent>,
    closing: Arc<AtomicBool>,
) {
    loop {
        if closing.load(Ordering::SeqCst) {
            let _ = socket.close(None);
            break;
        }

        // Push every queued microphone frame onto the wire
        while let Ok(blob) = frame_rx.try_recv() {
            let message = RealtimeMessage {
                realtime_input: RealtimeInput {
                    media_chunks: vec![blob],
                },
            };
            let json = match serde_json::to_string(&message) {
                Ok(json) => json,
                Err(e) => {
                    let _ = event_tx.send(LiveEvent::Error(e.to_string()));
                    return;
                }
            };
            if let Err(e) = socket.send(Message::Text(json)) {
                let _ = event_tx.send(LiveEvent::Error(format!("Send failed: {}", e)));
                return;
            }
        }

        // Read with timeout so the loop keeps draining outgoing frames
        match socket.read() {
            Ok(Message::Text(text)) => {
                for event in parse_server_message(&text) {
                    if event_tx.send(event).is_err() {
                        return;
                    }
                }
            }
            Ok(Message::Binary(bytes)) => {
                // The live endpoint delivers JSON in binary frames as well
                let text = String::from_utf8_lossy(&bytes);
                for event in parse_server_message(&text) {
                    if event_tx.send(event).is_err() {
                        return;
                    }
                }
            }
            Ok(Message::Close(_)) => {
                let _ = event_tx.send(LiveEvent::Closed);
                break;
            }
            Ok(_) => {} // ping/pong handled by tungstenite
            Err(tungstenite::Error::Io(e))
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut => {}
            Err(e) => {
                let _ = event_tx.send(LiveEvent::Error(format!("Session failed: {}", e)));
                break;
            }
        }
    }
}

// ── Conversation run loop ────────────────────────────────────────────────

/// Run one live conversation until the user presses ENTER, the server closes
/// the session, or an error forces teardown.
pub fn run_conversation(config: &Config, api_key: &str) -> Result<()> {
    println!("Connecting live session ({})...", models::LIVE);

    let session = LiveSession::connect(
        api_key,
        models::LIVE,
        &config.speech.live_voice,
        &config.speech.live_instruction,
    )?;

    let mut capture = MicrophoneCapture::new()?;
    capture.start()?;

    let mut playback = SpeakerPlayback::new(OUTPUT_SAMPLE_RATE)?;
    let mut assembler = TurnAssembler::new();

    // ENTER on stdin stops the conversation
    let (stop_tx, stop_rx) = channel();
    thread::spawn(move || {
        let mut line = String::new();
        let _ = std::io::stdin().read_line(&mut line);
        let _ = stop_tx.send(());
    });

    println!();
    println!("🎙️  Listening - speak now. Press ENTER to stop.");
    println!();

    let mut session_error = None;

    'conversation: loop {
        // Capture path: ship complete frames as they are produced
        for frame in capture.drain_frames() {
            session.send_frame(&frame);
        }

        // Playback / transcript path
        while let Some(event) = session.poll_event() {
            match event {
                LiveEvent::SetupComplete => {
                    println!("✓ Session ready");
                }
                LiveEvent::Audio(pcm) => {
                    let samples = media::decode_pcm16(&pcm);
                    playback.enqueue(&samples);
                }
                LiveEvent::Interrupted => {
                    playback.interrupt();
                }
                LiveEvent::InputTranscript(text) => {
                    assembler.push_input(&text);
                }
                LiveEvent::OutputTranscript(text) => {
                    assembler.push_output(&text);
                }
                LiveEvent::TurnComplete => {
                    for entry in assembler.complete_turn() {
                        match entry.speaker {
                            Speaker::User => println!("You:    {}", entry.text),
                            Speaker::Model => println!("Gemini: {}", entry.text),
                        }
                    }
                }
                LiveEvent::Error(message) => {
                    session_error = Some(message);
                    break 'conversation;
                }
                LiveEvent::Closed => {
                    println!("Session closed by server");
                    break 'conversation;
                }
            }
        }

        if stop_rx.try_recv().is_ok() {
            break;
        }

        thread::sleep(Duration::from_millis(10));
    }

    // Teardown in reverse order of acquisition: microphone, session, speaker
    capture.stop();
    session.close();
    playback.stop();

    if let Some(message) = session_error {
        eprintln!("✗ The conversation failed. Please try again. ({})", message);
    } else {
        println!();
        println!("Conversation ended ({} transcript entries)", assembler.history().len());
    }

    Ok(())
}
