use std::path::{Path, PathBuf};

use clap::{ArgAction, CommandFactory, ErrorKind, Parser, Subcommand};

use shotsum::config::{self, EngineConfig, FrameLayout};
use shotsum::data::{self, Analysis};
use shotsum::progress::TracingProgress;
use shotsum::util;
use shotsum::{Engine, Selection};

#[derive(Debug, Subcommand)]
enum Commands {
    #[clap(after_help = "Displays info about shotsum, its dependencies and the default configuration.")]
    Info,

    #[clap(
        arg_required_else_help = true,
        after_help = "Segment a video into shots and analyze each shot for motion, audio energy and presence. The video is given as a directory of raw planar RGB frames and a WAV file with its audio track. The analysis data is written to disk alongside the audio file, and is used by the 'select' command."
    )]
    Analyze {
        #[clap(
            value_parser = clap::value_parser!(PathBuf),
            help = "Directory of raw frames. Frames are ordered by the number in their file name."
        )]
        frames: PathBuf,

        #[clap(
            value_parser = clap::value_parser!(PathBuf),
            help = "PCM WAV file with the audio track of the video."
        )]
        audio: PathBuf,

        #[clap(
            long,
            value_parser = clap::value_parser!(PathBuf),
            help = "JSON file with a list of shot boundaries (frame indices). If not set, shots are detected from the frames."
        )]
        boundaries: Option<PathBuf>,

        #[clap(
            long,
            default_value = "false",
            action(ArgAction::SetTrue),
            help = "Re-analyze the video and ignore any existing analysis data on disk."
        )]
        force: bool,
    },

    #[clap(
        arg_required_else_help = true,
        after_help = "Score the shots of a video and select the highlights that make up its summary. Analysis data can either be pre-computed and stored alongside the audio file using the 'analyze' command, or generated as part of the selection by specifying the --analyze flag. The selection is written as JSON alongside the audio file."
    )]
    Select {
        #[clap(
            value_parser = clap::value_parser!(PathBuf),
            help = "WAV file with the audio track of the video."
        )]
        audio: PathBuf,

        #[clap(
            long,
            value_parser = clap::value_parser!(PathBuf),
            help = "Directory of raw frames. Required with --analyze."
        )]
        frames: Option<PathBuf>,

        #[clap(
            long,
            default_value = "false",
            action(ArgAction::SetTrue),
            help = "Run the analysis step in-place instead of looking for pre-computed analysis data."
        )]
        analyze: bool,

        #[clap(
            long,
            value_parser = clap::value_parser!(PathBuf),
            help = "JSON file with a list of shot boundaries (frame indices). Only used with --analyze."
        )]
        boundaries: Option<PathBuf>,

        #[clap(
            long,
            value_parser = clap::value_parser!(u32),
            help = "Length of the summary, in seconds.",
        )]
        target_seconds: Option<u32>,

        #[clap(
            long,
            value_parser = clap::value_parser!(usize),
            help = "Shots shorter than this many frames are never selected."
        )]
        min_highlight_len: Option<usize>,

        #[clap(
            long,
            value_parser = clap::value_parser!(usize),
            help = "Shots up to this many frames long are selected whole. Longer shots are trimmed down to their most active part."
        )]
        max_single_highlight: Option<usize>,

        #[clap(
            long,
            value_parser = clap::value_parser!(f64),
            help = "Score multiplier for shots with notable content (e.g., faces)."
        )]
        presence_bonus: Option<f64>,

        #[clap(
            long,
            value_parser = clap::value_parser!(PathBuf),
            help = "Where to write the selection. Defaults to a JSON file alongside the audio file."
        )]
        output: Option<PathBuf>,

        #[clap(
            long,
            default_value = "false",
            action(ArgAction::SetTrue),
            help = "Do not display the selected highlights in stdout."
        )]
        no_display: bool,
    },
}

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,

    #[clap(
        long,
        global = true,
        value_parser = clap::value_parser!(PathBuf),
        help = "JSON file with engine settings. Missing settings keep their default values, and command line flags take precedence."
    )]
    config: Option<PathBuf>,

    #[clap(
        long,
        global = true,
        value_parser = clap::value_parser!(u32),
        help = "Frame rate of the video."
    )]
    fps: Option<u32>,

    #[clap(
        long,
        global = true,
        value_parser = clap::value_parser!(u32),
        help = "Width of the raw frames, in pixels."
    )]
    width: Option<u32>,

    #[clap(
        long,
        global = true,
        value_parser = clap::value_parser!(u32),
        help = "Height of the raw frames, in pixels."
    )]
    height: Option<u32>,

    #[clap(
        long,
        global = true,
        default_value = "false",
        action(ArgAction::SetTrue),
        help = "Analyze shots on a single thread."
    )]
    no_threading: bool,

    #[clap(
        short,
        long,
        global = true,
        default_value = "false",
        action(ArgAction::SetTrue),
        help = "Log per-shot results."
    )]
    verbose: bool,
}

impl Cli {
    fn validate(&self) {
        let mut cmd = Cli::command();
        match self.command {
            Commands::Info => (),
            Commands::Analyze { .. } => (),
            Commands::Select {
                ref frames,
                analyze,
                ..
            } => {
                if analyze && frames.is_none() {
                    cmd.error(
                        ErrorKind::MissingRequiredArgument,
                        "--frames is required when --analyze is set",
                    )
                    .exit();
                }
            }
        }
    }

    fn engine_config(&self) -> EngineConfig {
        let mut config = match &self.config {
            Some(path) => match EngineConfig::from_path(path) {
                Ok(config) => config,
                Err(e) => {
                    let mut cmd = Cli::command();
                    cmd.error(ErrorKind::InvalidValue, e.to_string()).exit();
                }
            },
            None => EngineConfig::default(),
        };

        let layout = FrameLayout {
            width: self.width.unwrap_or(config.layout.width),
            height: self.height.unwrap_or(config.layout.height),
        };
        config = config.with_layout(layout);
        if let Some(fps) = self.fps {
            config = config.with_fps(fps);
        }
        if self.no_threading {
            config = config.with_threading(false);
        }

        if let Commands::Select {
            target_seconds,
            min_highlight_len,
            max_single_highlight,
            presence_bonus,
            ..
        } = self.command
        {
            if let Some(target_seconds) = target_seconds {
                config = config.with_target_seconds(target_seconds);
            }
            let min = min_highlight_len.unwrap_or(config.selector.min_highlight_len);
            let max = max_single_highlight.unwrap_or(config.selector.max_single_highlight);
            config = config.with_highlight_limits(min, max);
            if let Some(bonus) = presence_bonus {
                config = config.with_presence_bonus(bonus);
            }
        }

        // Settings from the config file and the command line are checked together.
        if let Err(e) = config.validate() {
            let mut cmd = Cli::command();
            cmd.error(ErrorKind::InvalidValue, e.to_string()).exit();
        }

        config
    }

    fn check_audio_file(&self, audio: &Path) {
        if !cfg!(feature = "ffmpeg") && !util::is_valid_audio_file(audio) {
            let mut cmd = Cli::command();
            cmd.error(
                ErrorKind::InvalidValue,
                format!("{} is not a valid WAV file", audio.display()),
            )
            .exit();
        }
    }
}

fn read_boundaries(path: Option<&PathBuf>) -> shotsum::Result<Option<Vec<usize>>> {
    match path {
        Some(path) => {
            let f = std::fs::File::open(path)?;
            Ok(Some(serde_json::from_reader(f)?))
        }
        None => Ok(None),
    }
}

fn display_selection(selection: &Selection, fps: u32) {
    for (i, highlight) in selection.highlights.iter().enumerate() {
        println!(
            "* Highlight {}: {}-{} (frames {}..{})",
            i + 1,
            util::format_time(util::frame_to_duration(highlight.start, fps)),
            util::format_time(util::frame_to_duration(highlight.end, fps)),
            highlight.start,
            highlight.end,
        );
    }
    println!(
        "Total: {} ({} of {} frames)",
        util::format_time(util::frame_to_duration(selection.selected_frames, fps)),
        selection.selected_frames,
        selection.target_frames,
    );
    for warning in &selection.warnings {
        println!("Warning: {}", warning);
    }
}

fn main() -> shotsum::Result<()> {
    let args = Cli::parse();
    args.validate();

    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(level)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    #[cfg(feature = "ffmpeg")]
    ffmpeg_next::init()?;

    let engine_config = args.engine_config();
    let fps = engine_config.fps;
    let engine = Engine::new(engine_config).with_progress(TracingProgress);

    match args.command {
        Commands::Info => {
            println!("shotsum version: {}", env!("CARGO_PKG_VERSION"));
            #[cfg(feature = "ffmpeg")]
            println!("FFmpeg version: {}", util::ffmpeg_version_string());
            println!(
                "Default summary length: {}",
                util::format_time(std::time::Duration::from_secs(
                    config::DEFAULT_TARGET_SECONDS as u64
                ))
            );
            println!(
                "Configuration:\n{}",
                serde_json::to_string_pretty(engine.config())?
            );
        }
        Commands::Analyze {
            ref frames,
            ref audio,
            ref boundaries,
            force,
        } => {
            args.check_audio_file(audio);
            let boundaries = read_boundaries(boundaries.as_ref())?;
            let analysis =
                Analysis::run(&engine, frames, audio, boundaries.as_deref(), force, true)?;
            tracing::info!(
                num_shots = analysis.shots().len(),
                num_frames = analysis.frame_count(),
                "analysis data written to {}",
                Analysis::path_for(audio).display()
            );
        }
        Commands::Select {
            ref audio,
            ref frames,
            analyze,
            ref boundaries,
            ref output,
            no_display,
            ..
        } => {
            args.check_audio_file(audio);
            let analysis = match frames {
                Some(frames) if analyze => {
                    let boundaries = read_boundaries(boundaries.as_ref())?;
                    Analysis::run(&engine, frames, audio, boundaries.as_deref(), false, false)?
                }
                _ => Analysis::load(&engine, audio)?,
            };

            let summary = analysis.summarize(&engine);
            let output = output
                .clone()
                .unwrap_or_else(|| audio.with_extension(data::SELECTION_FILE_EXT));
            let f = std::fs::File::create(&output)?;
            serde_json::to_writer_pretty(&f, &summary.selection)?;
            tracing::info!("selection written to {}", output.display());

            if !no_display {
                display_selection(&summary.selection, fps);
            }
        }
    }

    Ok(())
}
