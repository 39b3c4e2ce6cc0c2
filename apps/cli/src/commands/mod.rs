//! CLI command implementations.

mod auth;
mod books;

pub use auth::{login, logout, signup, status};
pub use books::{BookFields, books_add, books_delete, books_edit, books_list};

use anyhow::{Context as _, Result};
use bookhive_config_and_utils::{Config, ErrorKind, Paths};
use record_sync::RecordSync;
use remote_service_client::{AuthService, FileSessionStore, SupabaseClient};
use session_gate::SessionManager;
use std::fmt::Display;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Everything a command needs: configuration, the client and the session.
pub struct AppContext {
    pub config: Config,
    pub client: Arc<SupabaseClient>,
    pub session: Arc<SessionManager>,
    /// Why a persisted session could not be restored, if it could not.
    pub restore_error: Option<String>,
    listener: JoinHandle<()>,
}

impl Drop for AppContext {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

/// Turn a core error into a CLI error headed by its kind.
pub fn report(kind: ErrorKind, err: impl Display) -> anyhow::Error {
    anyhow::anyhow!("{}: {}", kind, err)
}

/// Session manager subscribed to `auth`, with the persisted session resolved.
struct StartedSession {
    manager: Arc<SessionManager>,
    listener: JoinHandle<()>,
    restore_error: Option<String>,
}

/// Start the notification listener, then restore.
///
/// The listener is subscribed first so a refresh or expiry announced during
/// restore, or later by a row request, reaches the manager.
async fn start_session(auth: Arc<dyn AuthService>) -> Result<StartedSession> {
    let manager = Arc::new(SessionManager::new(auth));
    let listener = manager
        .spawn_listener()
        .map_err(|e| report(e.kind(), e))?;

    let restore_error = match manager.restore().await {
        Ok(_) => None,
        Err(e) => {
            warn!(error = %e, "Could not restore session");
            Some(e.to_string())
        }
    };

    Ok(StartedSession {
        manager,
        listener,
        restore_error,
    })
}

/// Load config, build the client and resolve the persisted session.
pub async fn connect() -> Result<AppContext> {
    let paths = Paths::new()?;
    paths.ensure_dirs()?;
    let config = Config::load(&paths).context("Failed to load configuration")?;
    let url = config.supabase_url()?;
    debug!(url = %url, table = %config.records_table, "Connecting");

    let client = Arc::new(
        SupabaseClient::new(url, config.supabase_anon_key.clone())
            .with_session_store(Arc::new(FileSessionStore::new(paths.session_file()))),
    );
    let started = start_session(client.clone()).await?;

    Ok(AppContext {
        config,
        client,
        session: started.manager,
        restore_error: started.restore_error,
        listener: started.listener,
    })
}

/// Mount the book list for the signed-in user.
pub fn mount_books(ctx: &AppContext) -> Result<Arc<RecordSync>> {
    RecordSync::mount_with_table(
        ctx.session.clone(),
        ctx.client.clone(),
        ctx.config.records_table.clone(),
    )
    .map_err(|e| match &ctx.restore_error {
        Some(reason) => report(e.kind(), format!("{}. Run 'bookhive login'", reason)),
        None => report(e.kind(), "Run 'bookhive login' first"),
    })
}
