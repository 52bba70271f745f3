//! `sound-filter` command-line interface.
//!
//! # Startup sequence
//!
//! 1. Initialise logging (`RUST_LOG` overrides the `info` default).
//! 2. Load [`AppConfig`] (defaults on first run, or `--config <file>`).
//! 3. Build the tokio runtime.
//! 4. Build the transcriber, the TTS engines and the selection policy; start
//!    loading the primary engine in the background.
//! 5. Run the subcommand.  Reports go to stdout as JSON.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use sound_filter::{
    audio::OutputFormat,
    config::AppConfig,
    edit::{EditForm, EditKind, EditRequest, FormDefaults},
    locate::{MatchStrategy, PhraseLocator, Timeline},
    service::SoundFilter,
    stt::{NoModelTranscriber, Transcriber},
    tts::{
        spawn_primary_loader, CloningHttpEngine, EnginePreference, Gender, OpenAiSpeechEngine,
        PrimarySynthesizer, ReadinessFlag, VoiceSelectionPolicy,
    },
};
use tokio::task::JoinHandle;

/// Locate spoken phrases and mute, tone-replace or voice-replace them.
#[derive(Parser, Debug)]
#[command(name = "sound-filter")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file (default: the per-user settings.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the word-level transcript of a recording
    Transcribe {
        audio: PathBuf,
    },
    /// Find a phrase in a recording or in a JSON word list
    Locate {
        /// Recording to transcribe (omit when using --words)
        #[arg(required_unless_present = "words")]
        audio: Option<PathBuf>,

        /// JSON timeline: an array of {word, start_time, end_time, confidence}
        #[arg(long, conflicts_with = "audio")]
        words: Option<PathBuf>,

        #[arg(long)]
        phrase: String,

        /// token_sequence or character_overlap
        #[arg(long)]
        strategy: Option<MatchStrategy>,
    },
    /// Replace a time range with silence
    Mute {
        #[command(flatten)]
        edit: EditArgs,
        #[arg(long)]
        end: f64,
    },
    /// Replace a time range with a sine tone
    Tone {
        #[command(flatten)]
        edit: EditArgs,
        #[arg(long)]
        end: f64,
        /// Tone frequency in Hz (default from settings)
        #[arg(long)]
        frequency: Option<f64>,
    },
    /// Replace a time range with synthesized speech
    Speak {
        #[command(flatten)]
        edit: EditArgs,
        /// Omit to make the window as long as the speech
        #[arg(long)]
        end: Option<f64>,
        #[arg(long)]
        text: String,
        /// male or female (default: estimated from the recording)
        #[arg(long)]
        gender: Option<Gender>,
        #[arg(long)]
        language: Option<String>,
        /// auto or secondary
        #[arg(long)]
        engine: Option<EnginePreference>,
        /// Wait for the voice-cloning engine to finish loading first
        #[arg(long)]
        wait_for_primary: bool,
    },
    /// Apply an edit described by a JSON request file
    Apply {
        audio: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// {modification_type, start_time, end_time, tone_frequency, text,
        /// gender, language, use_edge_tts}
        #[arg(long)]
        request: PathBuf,
        #[arg(long)]
        format: Option<OutputFormat>,
    },
    /// Re-encode a recording
    Convert {
        audio: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// wav, mp3, flac, ogg, aac or m4a (default: from the output extension)
        #[arg(long)]
        format: Option<OutputFormat>,
    },
    /// Report the voice-cloning engine's readiness
    TtsStatus {
        /// Wait for loading to finish before reporting
        #[arg(long)]
        wait: bool,
    },
}

#[derive(Args, Debug)]
struct EditArgs {
    audio: PathBuf,
    #[arg(short, long)]
    output: PathBuf,
    /// Window start in seconds
    #[arg(long)]
    start: f64,
    /// wav, mp3, flac, ogg, aac or m4a (default: from the output extension)
    #[arg(long)]
    format: Option<OutputFormat>,
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

#[cfg(feature = "whisper")]
fn build_transcriber(config: &AppConfig) -> Arc<dyn Transcriber> {
    use sound_filter::config::AppPaths;
    use sound_filter::stt::{ModelPaths, TranscribeParams, WhisperTranscriber};

    let models = ModelPaths::from_app_paths(&AppPaths::new());
    let model_path = models.resolve(&config.stt.model);
    let mut params = TranscribeParams {
        language: config.stt.language.clone(),
        use_gpu: config.stt.use_gpu,
        ..TranscribeParams::default()
    };
    if let Some(threads) = config.stt.threads {
        params.n_threads = threads;
    }

    match WhisperTranscriber::load(&model_path, params) {
        Ok(engine) => {
            log::info!("Whisper model loaded: {}", model_path.display());
            Arc::new(engine)
        }
        Err(e) => {
            let local: Vec<&str> = models.list_local_models().iter().map(|m| m.id).collect();
            log::warn!("Whisper model unavailable ({e}); transcription disabled (installed: {local:?})");
            Arc::new(NoModelTranscriber::new(model_path.display().to_string()))
        }
    }
}

#[cfg(not(feature = "whisper"))]
fn build_transcriber(config: &AppConfig) -> Arc<dyn Transcriber> {
    Arc::new(NoModelTranscriber::new(format!(
        "'{}' (rebuild with --features whisper)",
        config.stt.model
    )))
}

/// Policy plus the handle of the primary loader, if one was started.
fn build_policy(config: &AppConfig) -> (Arc<VoiceSelectionPolicy>, Option<JoinHandle<()>>) {
    let secondary = Arc::new(OpenAiSpeechEngine::from_config(&config.tts.secondary));
    let mut policy = VoiceSelectionPolicy::new(secondary);
    let mut loader = None;

    if config.tts.primary.enabled {
        let flag = ReadinessFlag::new();
        let primary: Arc<dyn PrimarySynthesizer> =
            Arc::new(CloningHttpEngine::from_config(&config.tts.primary));
        loader = spawn_primary_loader(&flag, Arc::clone(&primary));
        policy = policy.with_primary(primary, flag);
    } else {
        log::info!("primary TTS disabled in settings");
    }
    (Arc::new(policy), loader)
}

fn output_format(explicit: Option<OutputFormat>, output: &Path, config: &AppConfig) -> OutputFormat {
    explicit
        .or_else(|| {
            output
                .extension()
                .and_then(|ext| ext.to_str())
                .and_then(|ext| ext.parse().ok())
        })
        .unwrap_or(config.edit.output_format)
}

fn read_audio(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("reading {}", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn run(cli: Cli, config: AppConfig) -> Result<()> {
    let transcriber = build_transcriber(&config);
    let (policy, loader) = build_policy(&config);
    let service = SoundFilter::new(&config, transcriber, policy);

    match cli.command {
        Commands::Transcribe { audio } => {
            let result = service.transcribe(read_audio(&audio)?).await?;
            print_json(&result)?;
        }

        Commands::Locate {
            audio,
            words,
            phrase,
            strategy,
        } => {
            let strategy = strategy.unwrap_or(config.locator.strategy);
            let service = service.with_locator(PhraseLocator::new(strategy));
            let report = match (words, audio) {
                (Some(words), _) => {
                    let json = std::fs::read_to_string(&words)
                        .with_context(|| format!("reading {}", words.display()))?;
                    let timeline: Timeline =
                        serde_json::from_str(&json).context("parsing word timeline")?;
                    service.locate_in_timeline(&timeline, &phrase)
                }
                (None, Some(audio)) => service.locate_phrase(read_audio(&audio)?, &phrase).await?,
                (None, None) => anyhow::bail!("either an audio file or --words is required"),
            };
            print_json(&report)?;
        }

        Commands::Mute { edit, end } => {
            let request = EditRequest::mute(edit.start, end);
            write_edit(&service, &edit, &request, &config).await?;
        }

        Commands::Tone {
            edit,
            end,
            frequency,
        } => {
            let frequency = frequency.unwrap_or(config.edit.default_tone_hz);
            let request = EditRequest::tone(edit.start, end, frequency);
            write_edit(&service, &edit, &request, &config).await?;
        }

        Commands::Speak {
            edit,
            end,
            text,
            gender,
            language,
            engine,
            wait_for_primary,
        } => {
            if wait_for_primary {
                if let Some(loader) = loader {
                    log::info!("waiting for the primary TTS engine");
                    loader.await.context("primary TTS loader")?;
                }
            }
            let request = EditRequest {
                start_time: edit.start,
                end_time: end,
                kind: EditKind::SpeechReplace {
                    text,
                    gender,
                    language,
                    engine: engine.unwrap_or(config.tts.default_engine),
                },
            };
            write_edit(&service, &edit, &request, &config).await?;
        }

        Commands::Apply {
            audio,
            output,
            request,
            format,
        } => {
            let json = std::fs::read_to_string(&request)
                .with_context(|| format!("reading {}", request.display()))?;
            let form: EditForm = serde_json::from_str(&json).context("parsing edit request")?;
            let request = form.into_request(FormDefaults {
                tone_frequency_hz: config.edit.default_tone_hz,
                engine: config.tts.default_engine,
            })?;
            let args = EditArgs {
                audio,
                output,
                start: request.start_time,
                format,
            };
            write_edit(&service, &args, &request, &config).await?;
        }

        Commands::Convert {
            audio,
            output,
            format,
        } => {
            let format = output_format(format, &output, &config);
            let encoded = service.convert(read_audio(&audio)?, format).await?;
            std::fs::write(&output, &encoded.bytes)
                .with_context(|| format!("writing {}", output.display()))?;
            log::info!("wrote {} ({})", output.display(), encoded.content_type);
        }

        Commands::TtsStatus { wait } => {
            if wait {
                if let Some(loader) = loader {
                    loader.await.context("primary TTS loader")?;
                }
            }
            print_json(&service.tts_status())?;
        }
    }
    Ok(())
}

async fn write_edit(
    service: &SoundFilter,
    args: &EditArgs,
    request: &EditRequest,
    config: &AppConfig,
) -> Result<()> {
    let format = output_format(args.format, &args.output, config);
    let encoded = service
        .edit(read_audio(&args.audio)?, request, format)
        .await
        .with_context(|| format!("editing {}", args.audio.display()))?;
    std::fs::write(&args.output, &encoded.bytes)
        .with_context(|| format!("writing {}", args.output.display()))?;
    log::info!(
        "wrote {} ({}, {} bytes)",
        args.output.display(),
        encoded.content_type,
        encoded.bytes.len()
    );
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load().unwrap_or_else(|e| {
            log::warn!("Failed to load config ({e}); using defaults");
            AppConfig::default()
        }),
    };

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    rt.block_on(run(cli, config))
}
