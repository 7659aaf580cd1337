mod capture;
mod chat;
mod config;
mod constants;
mod gemini;
mod live;
mod media;
mod playback;
mod plugin;
mod splitter;
mod timeline;
mod transcript;

use anyhow::{Context, Result, bail};
use chat::ChatSession;
use clap::{Parser, Subcommand};
use config::Config;
use constants::audio::OUTPUT_SAMPLE_RATE;
use constants::models;
use constants::video::{FRAME_COUNT, POLL_INTERVAL_SECS};
use gemini::{Content, GeminiClient, Part};
use playback::SpeakerPlayback;
use plugin::{BrowserExtension, PluginRequest, SettingsField, WordPressPlugin};
use std::io::{BufRead, Read, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "gemini-workbench")]
#[command(about = "Command line workbench for the Gemini API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat with streamed replies
    Chat {
        /// Model to chat with
        #[arg(short, long, default_value = models::CHAT)]
        model: String,
    },
    /// Summarize text from a file or stdin
    Summarize {
        /// File to summarize; reads stdin when omitted
        file: Option<PathBuf>,
    },
    /// Ask a question about an image
    AnalyzeImage {
        /// Image file (jpeg, png, gif or webp)
        image: PathBuf,
        /// Question to ask about the image
        #[arg(default_value = "What do you see in this image?")]
        prompt: String,
    },
    /// Ask a question about a video (analyzes evenly spaced key frames)
    AnalyzeVideo {
        /// Video file (mp4, webm or mov)
        video: PathBuf,
        /// Question to ask about the video
        #[arg(default_value = "Summarize what happens in this video.")]
        prompt: String,
    },
    /// Generate a video from a text prompt with Veo
    GenerateVideo {
        /// Description of the video to generate
        prompt: String,
        /// Aspect ratio (16:9 or 9:16)
        #[arg(long, default_value = "16:9")]
        aspect_ratio: String,
        /// Resolution (720p or 1080p)
        #[arg(long, default_value = "720p")]
        resolution: String,
        /// Output file
        #[arg(short, long, default_value = "generated-video.mp4")]
        out: PathBuf,
    },
    /// Speak text aloud, or save it as a WAV file
    Tts {
        /// Text to synthesize
        text: String,
        /// Prebuilt voice (overrides the configured one)
        #[arg(long)]
        voice: Option<String>,
        /// Write a 24 kHz WAV file instead of playing
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Hands-free voice conversation over the live API
    Live,
    /// Generate a plugin project from a declarative description
    BuildPlugin {
        #[command(subcommand)]
        target: PluginTarget,
    },
}

#[derive(Subcommand)]
enum PluginTarget {
    /// Single-file WordPress plugin
    Wordpress {
        /// Plugin name
        name: String,
        #[arg(short, long, default_value = "A brief description of what this plugin does.")]
        description: String,
        #[arg(long, default_value = "1.0.0")]
        version: String,
        #[arg(long, default_value = "Plugin Author")]
        author: String,
        /// Core feature, repeatable (Admin Menu Page, Shortcode, Widget,
        /// Custom Post Type). Defaults to Admin Menu Page.
        #[arg(long = "feature")]
        features: Vec<String>,
        /// Settings page field as label:name[:type], repeatable
        #[arg(long = "field")]
        fields: Vec<SettingsField>,
        /// Output directory (defaults to ./<plugin-slug>)
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Also pack the project into a zip archive
        #[arg(long)]
        zip: bool,
    },
    /// Chrome browser extension (Manifest V3)
    Browser {
        /// Extension name
        name: String,
        #[arg(short, long, default_value = "This extension does something amazing.")]
        description: String,
        /// What the extension should do
        functionality: String,
        /// Output directory (defaults to ./<extension-slug>)
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Also pack the project into a zip archive
        #[arg(long)]
        zip: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load_or_create()?;
    let api_key = config.resolve_api_key()?;

    match cli.command {
        Commands::Chat { model } => chat_command(&config, api_key, &model),
        Commands::Summarize { file } => summarize_command(api_key, file.as_deref()),
        Commands::AnalyzeImage { image, prompt } => {
            analyze_image_command(api_key, &image, &prompt)
        }
        Commands::AnalyzeVideo { video, prompt } => {
            analyze_video_command(api_key, &video, &prompt)
        }
        Commands::GenerateVideo {
            prompt,
            aspect_ratio,
            resolution,
            out,
        } => generate_video_command(api_key, &prompt, &aspect_ratio, &resolution, &out),
        Commands::Tts { text, voice, out } => {
            let voice = voice.unwrap_or_else(|| config.speech.tts_voice.clone());
            tts_command(api_key, &text, &voice, out.as_deref())
        }
        Commands::Live => live::run_conversation(&config, &api_key),
        Commands::BuildPlugin { target } => build_plugin_command(api_key, target),
    }
}

fn chat_command(config: &Config, api_key: String, model: &str) -> Result<()> {
    let client = GeminiClient::new(api_key)?;
    let mut session = ChatSession::new(client, model, &config.chat.system_instruction);

    println!("💬 Chatting with {} (empty line or 'exit' to quit)", model);
    println!();

    let stdin = std::io::stdin();
    loop {
        print!("You: ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF
        }
        let message = line.trim();
        if message.is_empty() || message == "exit" || message == "quit" {
            break;
        }

        print!("Gemini: ");
        std::io::stdout().flush()?;
        let result = session.send_streamed(message, &mut |chunk| {
            print!("{}", chunk);
            let _ = std::io::stdout().flush();
        });
        println!();
        println!();

        if let Err(e) = result {
            // History was rolled back, the same message can be resent
            eprintln!("✗ {}", e);
            eprintln!();
        }
    }

    Ok(())
}

fn summarize_command(api_key: String, file: Option<&std::path::Path>) -> Result<()> {
    let text = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };
    if text.trim().is_empty() {
        bail!("Nothing to summarize");
    }

    let client = GeminiClient::new(api_key)?;
    let contents = [Content::user(vec![Part::text(format!(
        "Please summarize the following text:\n\n{}",
        text
    ))])];

    client.generate_content_stream(models::SUMMARIZE, &contents, None, &mut |chunk| {
        print!("{}", chunk);
        let _ = std::io::stdout().flush();
    })?;
    println!();

    Ok(())
}

fn analyze_image_command(api_key: String, image: &std::path::Path, prompt: &str) -> Result<()> {
    let client = GeminiClient::new(api_key)?;
    let media = media::file_to_inline_media(image)?;

    println!("🖼️  Analyzing {} with {}...", image.display(), models::IMAGE);
    println!();

    let contents = [Content::user(vec![
        Part::text(prompt),
        Part::inline(media),
    ])];
    let response = client.generate_content(models::IMAGE, &contents, None, None)?;
    println!("{}", response.text());

    Ok(())
}

fn analyze_video_command(api_key: String, video: &std::path::Path, prompt: &str) -> Result<()> {
    let client = GeminiClient::new(api_key)?;

    println!("🎞️  Extracting {} key frames from {}...", FRAME_COUNT, video.display());
    let frames = media::extract_video_frames(video, FRAME_COUNT)?;

    println!("   Frames extracted. Analyzing with {}...", models::PRO);
    println!();

    let mut parts = vec![Part::text(prompt)];
    parts.extend(frames.into_iter().map(Part::inline));

    let contents = [Content::user(parts)];
    let response = client.generate_content(models::PRO, &contents, None, None)?;
    println!("{}", response.text());

    Ok(())
}

const VIDEO_LOADING_MESSAGES: [&str; 8] = [
    "Summoning digital actors...",
    "Calibrating the dream machine...",
    "Teaching pixels to dance...",
    "Rendering alternate realities...",
    "This can take a few minutes, hang tight...",
    "Composing a symphony of light and sound...",
    "Weaving timelines into a visual narrative...",
    "Painting with light, please wait...",
];

fn generate_video_command(
    api_key: String,
    prompt: &str,
    aspect_ratio: &str,
    resolution: &str,
    out: &std::path::Path,
) -> Result<()> {
    if !matches!(aspect_ratio, "16:9" | "9:16") {
        bail!("Aspect ratio must be 16:9 or 9:16");
    }
    if !matches!(resolution, "720p" | "1080p") {
        bail!("Resolution must be 720p or 1080p");
    }

    let client = GeminiClient::new(api_key)?;

    println!("🎬 Generating video with {} ({}, {})", models::VIDEO, aspect_ratio, resolution);
    let mut operation = client.generate_video(models::VIDEO, prompt, aspect_ratio, resolution)?;

    let mut poll = 0;
    while !operation.done {
        println!("   {}", VIDEO_LOADING_MESSAGES[poll % VIDEO_LOADING_MESSAGES.len()]);
        poll += 1;
        std::thread::sleep(std::time::Duration::from_secs(POLL_INTERVAL_SECS));
        operation = client.poll_operation(&operation.name)?;
    }

    if let Some(error) = operation.error {
        bail!("Video generation failed: {}", error.message);
    }
    let uri = operation
        .video_uri()
        .context("Video generation finished but no video URI was found")?;

    println!("   Downloading...");
    let bytes = client.download(uri)?;
    std::fs::write(out, bytes)
        .with_context(|| format!("Failed to write {}", out.display()))?;

    println!("✓ Video saved to {}", out.display());
    Ok(())
}

fn tts_command(
    api_key: String,
    text: &str,
    voice: &str,
    out: Option<&std::path::Path>,
) -> Result<()> {
    let client = GeminiClient::new(api_key)?;

    println!("🔊 Synthesizing with voice '{}'...", voice);
    let pcm = client.generate_speech(models::TTS, text, voice)?;
    let samples = media::decode_pcm16(&pcm);

    match out {
        Some(path) => {
            media::write_wav(path, &samples, OUTPUT_SAMPLE_RATE)?;
            println!("✓ Audio saved to {}", path.display());
        }
        None => {
            let mut playback = SpeakerPlayback::new(OUTPUT_SAMPLE_RATE)?;
            playback.enqueue(&samples);
            while !playback.is_idle() {
                std::thread::sleep(std::time::Duration::from_millis(50));
            }
            // Let the device buffer drain before tearing the stream down
            std::thread::sleep(std::time::Duration::from_millis(200));
            playback.stop();
        }
    }

    Ok(())
}

fn build_plugin_command(api_key: String, target: PluginTarget) -> Result<()> {
    let (request, out_dir, zip) = match target {
        PluginTarget::Wordpress {
            name,
            description,
            version,
            author,
            mut features,
            fields,
            out,
            zip,
        } => {
            if features.is_empty() {
                features.push("Admin Menu Page".to_string());
            }
            for feature in &features {
                if !plugin::WORDPRESS_FEATURES.contains(&feature.as_str()) {
                    bail!(
                        "Unknown feature '{}'. Available: {}",
                        feature,
                        plugin::WORDPRESS_FEATURES.join(", ")
                    );
                }
            }
            let request = PluginRequest::WordPress(WordPressPlugin {
                name,
                description,
                version,
                author,
                features,
                fields,
            });
            (request, out, zip)
        }
        PluginTarget::Browser {
            name,
            description,
            functionality,
            out,
            zip,
        } => {
            let request = PluginRequest::Browser(BrowserExtension {
                name,
                description,
                functionality,
            });
            (request, out, zip)
        }
    };

    let client = GeminiClient::new(api_key)?;

    println!("🛠️  Generating plugin code with {}...", models::PRO);
    let mut reported = 0;
    let files = plugin::generate(&client, &request, &mut |files| {
        if files.len() != reported {
            reported = files.len();
            println!(
                "   Receiving {} ({} file{})",
                files.last().map(|f| f.filename.as_str()).unwrap_or(""),
                files.len(),
                if files.len() == 1 { "" } else { "s" }
            );
        }
    })?;

    let out_dir = out_dir.unwrap_or_else(|| PathBuf::from(request.project_slug()));
    plugin::write_files(&out_dir, &files)?;
    println!();
    for file in &files {
        println!("  ✓ {}", out_dir.join(&file.filename).display());
    }

    if zip {
        let archive = PathBuf::from(format!("{}.zip", request.project_slug()));
        plugin::write_zip(&archive, &files)?;
        println!("  ✓ {}", archive.display());
    }

    println!();
    println!("✓ {} files written to {}", files.len(), out_dir.display());
    Ok(())
}
