use thiserror::Error;

/// Failure talking to a video provider.
///
/// The `Display` text is user-facing: commands and tools relay it verbatim.
#[derive(Debug, Error)]
pub enum VideoApiError {
    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("video service request failed: {0}")]
    Transport(String),

    #[error(
        "video service returned an empty body (HTTP {status}), so no task id could be read; \
         make sure the provider answers submissions with a JSON body containing the task id"
    )]
    EmptyResponse { status: u16 },

    #[error("video service responded with an error: HTTP {status}, detail={detail}")]
    Http { status: u16, detail: String },

    #[error(
        "provider {provider_id} returned neither a task id nor a video url; \
         check task_id_field / output_url_field"
    )]
    MissingTaskId { provider_id: String },
}
