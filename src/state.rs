use crate::{config::Config, services::attempts::AttemptService, store::DynStore};
use axum::extract::FromRef;

#[derive(Clone)]
pub struct AppState {
    pub store: DynStore,
    pub config: Config,
    pub attempts: AttemptService,
}

impl AppState {
    /// Wires the services on top of `store`, each with its own log span.
    pub fn new(store: DynStore, config: Config) -> Self {
        let attempts = AttemptService::new(store.clone(), tracing::info_span!("attempts"));
        Self {
            store,
            config,
            attempts,
        }
    }
}

impl FromRef<AppState> for DynStore {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for AttemptService {
    fn from_ref(state: &AppState) -> Self {
        state.attempts.clone()
    }
}
