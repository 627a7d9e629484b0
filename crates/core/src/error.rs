/// Domain error shared by every layer that talks to the verification core.
///
/// `InvalidInput` means no work was done (bad path, unsupported model, or the
/// embedding routine failed). `StorageFailure` is only produced after an
/// update attempt that returned no record. `Internal` covers the service
/// itself being unable to run, such as a runner that has been shut down.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Storage failure: {0}")]
    StorageFailure(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
