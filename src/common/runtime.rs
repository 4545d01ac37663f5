use tokio::runtime::Runtime;

/// Builds the single-threaded runtime a mock server runs its accept loop and all of its
/// connections on.
pub(crate) fn new_current_thread() -> std::io::Result<Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
}
