use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use dsinfer::{
    segment_from_json, segment_to_json, AcousticConfig, DsError, DurationConfig, InferenceOptions,
    PipelineBuilder, PitchConfig, Segment, StageKind, VarianceConfig, VocoderConfig,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "ds_infer")]
#[command(about = "Run the duration, pitch, variance and acoustic stages over a segment")]
struct Args {
    /// Segment JSON to synthesize.
    segment: PathBuf,
    #[arg(long, env = "DSINFER_DURATION_CONFIG")]
    duration_config: Option<PathBuf>,
    #[arg(long, env = "DSINFER_PITCH_CONFIG")]
    pitch_config: Option<PathBuf>,
    #[arg(long, env = "DSINFER_VARIANCE_CONFIG")]
    variance_config: Option<PathBuf>,
    #[arg(long, env = "DSINFER_ACOUSTIC_CONFIG", requires = "vocoder_config")]
    acoustic_config: Option<PathBuf>,
    #[arg(long, env = "DSINFER_VOCODER_CONFIG")]
    vocoder_config: Option<PathBuf>,
    #[arg(long, short, default_value = "out.wav")]
    out: PathBuf,
    /// Write the segment after each stage to `<stem>.<stage>.json`.
    #[arg(long, default_value_t = false)]
    save_intermediate: bool,
    /// Directory for the per-stage files; defaults to the segment's directory.
    #[arg(long, env = "DSINFER_SAVE_DIR")]
    save_dir: Option<PathBuf>,
    #[arg(long, env = "DSINFER_STEPS", default_value_t = InferenceOptions::DEFAULT_STEPS)]
    steps: i64,
    #[arg(long, env = "DSINFER_DEPTH", default_value_t = InferenceOptions::DEFAULT_DEPTH)]
    depth: f32,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Err(message) = run() {
        eprintln!("ds_infer: {message}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let args = Args::parse();
    let mut segment = load_segment(&args.segment)?;

    let options = InferenceOptions {
        default_steps: args.steps,
        default_depth: args.depth,
    };
    let mut builder = PipelineBuilder::new(options);
    if let Some(path) = args.duration_config.as_ref() {
        builder = builder.with_duration(DurationConfig::from_yaml(path).map_err(|e| e.to_string())?);
    }
    if let Some(path) = args.pitch_config.as_ref() {
        builder = builder.with_pitch(PitchConfig::from_yaml(path).map_err(|e| e.to_string())?);
    }
    if let Some(path) = args.variance_config.as_ref() {
        builder = builder.with_variance(VarianceConfig::from_yaml(path).map_err(|e| e.to_string())?);
    }
    if let (Some(acoustic), Some(vocoder)) =
        (args.acoustic_config.as_ref(), args.vocoder_config.as_ref())
    {
        builder = builder.with_acoustic(
            AcousticConfig::from_yaml(acoustic).map_err(|e| e.to_string())?,
            VocoderConfig::from_yaml(vocoder).map_err(|e| e.to_string())?,
        );
    }

    let mut pipeline = builder.build().map_err(|e| e.to_string())?;
    if pipeline.stages().is_empty() {
        return Err("no stage configured; pass at least one --*-config".to_string());
    }
    pipeline.open().map_err(|e| e.to_string())?;

    let save_intermediate = args.save_intermediate || args.save_dir.is_some();
    let result = pipeline.run_with(&mut segment, &args.out, |kind: StageKind, segment| {
        if save_intermediate {
            let path = intermediate_path(&args.segment, args.save_dir.as_deref(), kind);
            save_segment(&path, segment)?;
            tracing::info!(stage = %kind, path = %path.display(), "segment saved");
        }
        Ok(())
    });
    pipeline.close();
    result.map_err(|e| e.to_string())
}

fn load_segment(path: &Path) -> Result<Segment, String> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    segment_from_json(&text).map_err(|e| format!("failed to parse {}: {e}", path.display()))
}

/// `<dir>/<stem>.<stage>.json`, never the input file itself.
fn intermediate_path(segment: &Path, save_dir: Option<&Path>, kind: StageKind) -> PathBuf {
    let stem = segment
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "segment".to_string());
    let dir = match save_dir {
        Some(dir) => dir.to_path_buf(),
        None => segment.parent().map(Path::to_path_buf).unwrap_or_default(),
    };
    dir.join(format!("{stem}.{kind}.json"))
}

fn save_segment(path: &Path, segment: &Segment) -> Result<(), DsError> {
    let text = segment_to_json(segment)?;
    fs::write(path, text).map_err(|e| DsError::io("save intermediate segment", e))
}
