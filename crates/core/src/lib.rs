//! # Patient Documents Core
//!
//! Core business logic for generating patient-facing documents.
//!
//! This crate turns one patient's clinical record into a document and files it:
//! - Vital-sign extraction and aggregation into unit-labelled time series
//! - Deterministic document models for the feedback letter, the health data report and the
//!   personal details form
//! - Rendering and upload through the [`DocumentRenderer`], [`ChartRenderer`] and
//!   [`pdoc_files::BlobStore`] seams, with guaranteed scratch-file cleanup
//! - The [`DocumentService`] pipeline tying those stages together
//!
//! **No API concerns**: HTTP servers, request parsing and status codes belong in `api-rest`;
//! argument parsing belongs in `pdoc-cli`.

pub mod builders;
pub mod catalog;
pub mod chart;
pub mod config;
pub mod constants;
pub mod document;
pub mod error;
pub mod persister;
pub mod render;
pub mod service;
pub mod vitals;

pub use builders::{DocumentBuilder, FeedbackDocument, HealthReportDocument, PatientInfoDocument};
pub use catalog::{
    FeedbackQuestionSet, FeedbackText, HealthReportText, PatientInfoLabels, PatientInfoText,
    TextCatalog,
};
pub use chart::{parse_series, parse_timestamp, ChartImage, ChartRenderer};
pub use config::{
    catalog_from_env_value, request_timeout_from_env_value, scratch_dir_from_env_value,
    unit_policy_from_env_value, ContainerNames, CoreConfig,
};
pub use document::{
    Alignment, Block, Cell, DocumentKind, DocumentModel, Image, Paragraph, Table, TextRun,
};
pub use error::{DocumentError, DocumentResult, Stage};
pub use persister::{ArtifactPersister, StoredArtifact};
pub use render::DocumentRenderer;
pub use service::{DocumentService, FeedbackData, FeedbackName, FetchedArtifact, Generated, HealthData};
pub use vitals::{aggregate, extract, SeriesPoint, UnitPolicy, VitalSeriesSet, VitalSignSeries};

pub use pdoc_types::{PatientId, Timestamp};
