//! Command-line definition and dispatch.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use mindscope_clinic::{
    AssessmentRequest, ChatRequest, EmotionSnapshot, PatientDetails, PrescriptionRequest, SymptomHistory,
    VideoUpload,
};
use mindscope_rag::Retriever;
use mindscope_telemetry::SharedTraceStorage;
use serde::Serialize;
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

use crate::app;
use crate::config::MindscopeConfig;

#[derive(Debug, Parser)]
#[command(name = "mindscope", version, about = "Clinical retrieval, emotion analysis and assessment")]
pub struct Cli {
    /// Configuration file [default: ./mindscope.toml when present]
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Print the spans recorded for each request to stderr when the command ends
    #[arg(long, global = true)]
    pub trace_dump: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage the vector index
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },
    /// Search the clinical knowledge base
    Retrieve {
        query: String,
        /// Emotion used to expand the query
        #[arg(long)]
        emotion: Option<String>,
        /// Number of results [default: rag.top_k]
        #[arg(short, long)]
        k: Option<usize>,
    },
    /// Assess a recorded session
    AnalyzeVideo {
        file: PathBuf,
        #[command(flatten)]
        patient: PatientArgs,
    },
    /// Assess from known emotion estimates
    Assess {
        #[command(flatten)]
        patient: PatientArgs,
        #[arg(long, default_value = "Unknown")]
        facial_emotion: String,
        #[arg(long, default_value_t = 0.0)]
        facial_confidence: f64,
        #[arg(long, default_value = "Unknown")]
        speech_emotion: String,
        #[arg(long, default_value_t = 0.0)]
        speech_confidence: f64,
        #[arg(long, default_value = "Unknown")]
        combined_emotion: String,
        #[arg(long, default_value_t = 0.0)]
        combined_confidence: f64,
        /// How long the symptoms have lasted, e.g. "3 months"
        #[arg(long, default_value = "Unknown")]
        symptom_duration: String,
        /// Clinician notes passed to the assessment
        #[arg(long, default_value = "")]
        notes: String,
    },
    /// Draft a treatment plan from a saved assessment (JSON file)
    Prescribe {
        assessment: PathBuf,
        #[command(flatten)]
        patient: PatientArgs,
    },
    /// Send one chat message
    Chat {
        message: String,
        #[arg(long, default_value = "Patient")]
        name: String,
        #[arg(long)]
        emotion: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum IndexAction {
    /// Load the cached index or build it from the corpus
    Build {
        /// Rebuild even when a usable cache exists
        #[arg(long)]
        force: bool,
    },
    /// Report whether a usable cache exists
    Status,
}

#[derive(Debug, Clone, Args)]
pub struct PatientArgs {
    #[arg(long, default_value = "Anonymous Patient")]
    pub name: String,
    #[arg(long, default_value = "Unknown")]
    pub age: String,
    #[arg(long, default_value = "Unknown")]
    pub gender: String,
}

impl From<PatientArgs> for PatientDetails {
    fn from(args: PatientArgs) -> Self {
        PatientDetails::new(args.name, args.age, args.gender)
    }
}

impl Command {
    /// Name used for the command's span.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Index { action: IndexAction::Build { .. } } => "index.build",
            Command::Index { action: IndexAction::Status } => "index.status",
            Command::Retrieve { .. } => "retrieve",
            Command::AnalyzeVideo { .. } => "analyze-video",
            Command::Assess { .. } => "assess",
            Command::Prescribe { .. } => "prescribe",
            Command::Chat { .. } => "chat",
        }
    }
}

/// Captured traces as pretty JSON keyed by request id.
pub fn render_traces(storage: &SharedTraceStorage) -> Result<String> {
    Ok(serde_json::to_string_pretty(&storage.snapshot())?)
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Run `command` inside a `cli.command` span with its own `request.id`.
pub async fn run(command: Command, config: &MindscopeConfig) -> Result<()> {
    let span = info_span!("cli.command", request.id = %Uuid::new_v4(), command = command.name());
    execute(command, config).instrument(span).await
}

async fn execute(command: Command, config: &MindscopeConfig) -> Result<()> {
    let handle = app::index_handle(config)?;
    match command {
        Command::Index { action: IndexAction::Build { force } } => {
            let built = if force { handle.rebuild().await } else { handle.ensure().await };
            let index = built.context("failed to build the vector index")?;
            info!(chunk_count = index.len(), model = index.model_id(), "vector index ready");
            println!("Indexed {} chunks into {}", index.len(), config.rag.cache_file().display());
        }
        Command::Index { action: IndexAction::Status } => match handle.load_cached().await {
            Some(index) => {
                println!("Cache {}: {} chunks ({})", config.rag.cache_file().display(), index.len(), index.model_id())
            }
            None => println!("No usable cache at {}", config.rag.cache_file().display()),
        },
        Command::Retrieve { query, emotion, k } => {
            let k = k.unwrap_or(config.rag.settings.top_k);
            let results = Retriever::new(handle)
                .try_retrieve(&query, emotion.as_deref(), k)
                .await
                .context("retrieval failed")?;
            print_json(&results)?;
        }
        Command::AnalyzeVideo { file, patient } => {
            let pipeline = app::pipeline(config, handle).await?;
            let upload = VideoUpload::from_path(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            let reply = pipeline.analyze_video(upload, patient.into()).await?;
            print_json(&reply)?;
        }
        Command::Assess {
            patient,
            facial_emotion,
            facial_confidence,
            speech_emotion,
            speech_confidence,
            combined_emotion,
            combined_confidence,
            symptom_duration,
            notes,
        } => {
            let pipeline = app::pipeline(config, handle).await?;
            let request = AssessmentRequest {
                patient: patient.into(),
                emotions: EmotionSnapshot {
                    facial_emotion,
                    facial_confidence,
                    speech_emotion,
                    speech_confidence,
                    combined_emotion,
                    combined_confidence,
                },
                history: SymptomHistory { symptom_duration, additional_notes: notes },
            };
            print_json(&pipeline.analyze_emotions(request).await)?;
        }
        Command::Prescribe { assessment, patient } => {
            let text = tokio::fs::read_to_string(&assessment)
                .await
                .with_context(|| format!("failed to read {}", assessment.display()))?;
            let mental_assessment = serde_json::from_str(&text).context("assessment must be a JSON object")?;
            let pipeline = app::pipeline(config, handle).await?;
            let request = PrescriptionRequest { patient: patient.into(), mental_assessment };
            print_json(&pipeline.generate_prescription(request).await)?;
        }
        Command::Chat { message, name, emotion } => {
            let pipeline = app::pipeline(config, handle).await?;
            let mut request = ChatRequest::new(message);
            request.user_name = name;
            request.emotion = emotion;
            let response = pipeline.chat(request).await?;
            if let Some(error) = &response.error {
                tracing::warn!(error = %error, "chat generation failed");
            }
            println!("{}", response.message);
        }
    }
    Ok(())
}
