/// Application-wide constants for audio formats, models and polling

pub mod audio {
    /// Sample rate the live API expects for microphone input
    pub const INPUT_SAMPLE_RATE: u32 = 16000;

    /// Sample rate of audio returned by the live API and the TTS model
    pub const OUTPUT_SAMPLE_RATE: u32 = 24000;

    /// Samples per realtime input frame (the capture pipeline's buffer quantum)
    pub const FRAME_SAMPLES: usize = 4096;

    /// MIME type attached to outgoing PCM frames
    pub const INPUT_MIME: &str = "audio/pcm;rate=16000";
}

pub mod models {
    /// General chat
    pub const CHAT: &str = "gemini-2.5-flash";

    /// Fast summarization
    pub const SUMMARIZE: &str = "gemini-2.5-flash-lite";

    /// Image analysis
    pub const IMAGE: &str = "gemini-2.5-flash";

    /// Video frame analysis and plugin code generation
    pub const PRO: &str = "gemini-2.5-pro";

    /// Text-to-speech
    pub const TTS: &str = "gemini-2.5-flash-preview-tts";

    /// Live voice conversation
    pub const LIVE: &str = "gemini-2.5-flash-native-audio-preview-09-2025";

    /// Video generation
    pub const VIDEO: &str = "veo-3.1-fast-generate-preview";
}

pub mod video {
    /// Number of evenly spaced frames extracted for video analysis
    pub const FRAME_COUNT: usize = 8;

    /// Seconds between polls of a pending video generation operation
    pub const POLL_INTERVAL_SECS: u64 = 5;
}

pub mod live {
    /// How long the socket thread waits on a read before draining outgoing frames
    pub const SOCKET_READ_TIMEOUT_MS: u64 = 20;

    /// Bound on queued outgoing frames; excess frames are dropped, not buffered
    pub const MAX_PENDING_FRAMES: usize = 32;
}
