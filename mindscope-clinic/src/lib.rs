//! # mindscope-clinic
//!
//! Clinical workflows on top of retrieval and emotion analysis.
//!
//! ## Overview
//!
//! - [`prompt`] composes assessment, treatment and chat prompts around
//!   retrieved references
//! - [`LlmGateway`] calls a [`GenerativeModel`] once and repairs its JSON
//!   into a [`ModelReply`]
//! - [`ClinicalPipeline`] runs the end-to-end workflows: emotion-based and
//!   video-based assessment, treatment plans, chat and raw generation
//!
//! With the default `gemini` feature, [`GeminiModel`] talks to the Gemini
//! `generateContent` endpoint.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use mindscope_clinic::{ClinicalPipeline, GeminiModel, LlmGateway, AssessmentRequest};
//!
//! let pipeline = ClinicalPipeline::builder()
//!     .retriever(retriever)
//!     .gateway(LlmGateway::new(Arc::new(GeminiModel::from_env()?)))
//!     .build()?;
//! let assessment = pipeline.analyze_emotions(AssessmentRequest::default()).await;
//! ```

pub mod assessment;
pub mod chat;
pub mod error;
pub mod gateway;
pub mod model;
pub mod patient;
pub mod prompt;
pub mod reply;
pub mod validation;
pub mod workflow;

#[cfg(feature = "gemini")]
pub mod gemini;

pub use assessment::{
    AssessmentRequest, EmotionSnapshot, LIST_FIELDS, NOT_PROVIDED, PrescriptionRequest, SymptomHistory, TEXT_FIELDS,
    backfill,
};
pub use chat::{APOLOGY, ChatRequest, ChatResponse, ChatTurn, FALLBACK_REPLY, HISTORY_LIMIT, Role};
pub use error::{ClinicError, Result};
pub use gateway::LlmGateway;
pub use model::{GenerationConfig, GenerativeModel};
pub use patient::PatientDetails;
pub use reply::ModelReply;
pub use workflow::{
    ClinicalPipeline, ClinicalPipelineBuilder, Clock, FixedClock, GENERATION_FAILED_MESSAGE,
    MediaPipeline, SystemClock, VideoUpload,
};

#[cfg(feature = "gemini")]
pub use gemini::GeminiModel;
