//! Application services
//!
//! Each service holds an `Arc<dyn FormStore>` and is cheap to share across
//! request handlers.

pub mod editing;
pub mod export;
pub mod publishing;
pub mod responses;
pub mod submission;

pub use editing::{CreateFormRequest, FormEditor, FormListing, FormPatch, QuestionInput, SaveFormRequest};
pub use export::{CsvExporter, ExportOptions, FormatError};
pub use publishing::{PublishingService, SlugPolicy};
pub use responses::{ExportSource, PageRequest, ResponseAggregator, ResponsePage};
pub use submission::{
    SubmissionInput, SubmissionPolicy, SubmissionService, SubmissionValidator, SubmissionWriter,
    SubmitPayload, ValidatedSubmission,
};
