//! Shared data models for the TubeMarks backend.
//!
//! Everything in this crate is pure data plus the validation and resolution
//! logic that belongs with it. No I/O happens here.

pub mod enrichment;
pub mod field;
pub mod job;
pub mod list;
pub mod progress;
pub mod schema;
pub mod stage;
pub mod tag;
pub mod union;
pub mod video;
pub mod ws;

pub use enrichment::{
    earliest_failed_stage, CaptionSource, Chapter, ChapterSource, Enrichment, EnrichmentFailure,
    EnrichmentStatus,
};
pub use field::{
    CustomField, FieldConfig, FieldConfigError, FieldType, FieldValue, ValueError,
};
pub use job::{IngestionJob, VideoJob};
pub use list::List;
pub use progress::ProgressEvent;
pub use schema::{
    validate_schema_fields, FieldSchema, SchemaField, SchemaInvariantError, MAX_CARD_FIELDS,
};
pub use stage::Stage;
pub use tag::{validate_hex_color, validate_tag_name, Tag, TagValidationError, TAG_NAME_MAX};
pub use union::{resolve_field_union, ResolvedField, SchemaBundle, UnionField};
pub use video::{ProcessingStatus, Video, YoutubeId, YOUTUBE_ID_LEN};
pub use ws::{
    ClientFrame, ServerFrame, CLOSE_AUTH_FAILED, CLOSE_AUTH_TIMEOUT, CLOSE_BACKPRESSURE,
};
