use std::collections::HashSet;
use std::sync::Arc;

use tabula_core::dispatcher::Dispatcher;
use tabula_core::{Actor, Collab};
use tabula_db::Database;
use tabula_types::api::Claims;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub collab: Arc<Collab>,
    pub dispatcher: Dispatcher,
    pub jwt_secret: String,
    /// Shared secret the host presents on `/hooks` routes.
    pub hook_token: String,
    pub admins: HashSet<String>,
}

impl AppStateInner {
    pub fn actor(&self, claims: &Claims) -> Actor {
        Actor::new(claims.sub.clone(), self.admins.contains(&claims.sub))
    }
}
