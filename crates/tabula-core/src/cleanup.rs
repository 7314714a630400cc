use std::sync::Arc;

use tokio::sync::broadcast::{Receiver, error::RecvError};
use tracing::{error, info};

use tabula_types::events::HostEvent;

use crate::Collab;

/// Background task that removes collaboration data when the host deletes
/// tables or rows.
///
/// Runs until the dispatcher is dropped. Store work happens on the blocking
/// pool. A lagged receiver loses the oldest events and keeps going; every
/// dispatched event is logged with its ids by the hook handler, so the lost
/// ones can be replayed through the hooks.
pub async fn run_cleanup_listener(collab: Arc<Collab>, mut events: Receiver<HostEvent>) {
    info!("Cleanup listener started");

    loop {
        match events.recv().await {
            Ok(event) => {
                let collab = collab.clone();
                if let Err(e) =
                    tokio::task::spawn_blocking(move || collab.handle_host_event(&event)).await
                {
                    error!("Cleanup task failed: {}", e);
                }
            }
            Err(RecvError::Lagged(missed)) => {
                error!(
                    "Cleanup listener lagged: {} host events dropped before cleanup ran; \
                     replay them from the dispatched-event log",
                    missed
                );
            }
            Err(RecvError::Closed) => break,
        }
    }

    info!("Cleanup listener stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabula_db::Database;

    use crate::Actor;
    use crate::dispatcher::Dispatcher;
    use crate::testing::StubFiles;

    #[tokio::test]
    async fn deletes_row_and_table_data_then_stops() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let collab = Arc::new(Collab::new(db.clone(), Arc::new(StubFiles::default())));
        let actor = Actor::new("alice", false);

        let label = collab.labels.create(1, "bug", None, &actor.user_id).unwrap();
        collab.labels.assign(10, label.id, 1, &actor.user_id).unwrap();
        collab.comments.create(10, 1, &actor.user_id, "on row 10", None).unwrap();
        collab.comments.create(11, 1, &actor.user_id, "on row 11", None).unwrap();

        let dispatcher = Dispatcher::new();
        let listener = tokio::spawn(run_cleanup_listener(collab.clone(), dispatcher.subscribe()));

        dispatcher.emit(HostEvent::RowDeleted { table_id: 1, row_id: 10 });
        dispatcher.emit(HostEvent::TableDeleted { table_id: 1 });
        drop(dispatcher);
        listener.await.unwrap();

        assert!(collab.labels.list_for_row(10).unwrap().is_empty());
        assert!(collab.labels.find_all_for_table(1).unwrap().is_empty());
        assert_eq!(collab.comments.count_for_row(10), 0);
        assert_eq!(collab.comments.count_for_row(11), 0);
        assert!(collab.activity.find_all_for_table(1, None, None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn lagged_listener_keeps_processing_newer_events() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let collab = Arc::new(Collab::new(db.clone(), Arc::new(StubFiles::default())));
        collab.comments.create(0, 1, "alice", "oldest", None).unwrap();
        collab.comments.create(999, 1, "alice", "newest", None).unwrap();

        let dispatcher = Dispatcher::new();
        let events = dispatcher.subscribe();
        for row_id in 0..1000 {
            dispatcher.emit(HostEvent::RowDeleted { table_id: 1, row_id });
        }
        drop(dispatcher);
        run_cleanup_listener(collab.clone(), events).await;

        assert_eq!(collab.comments.count_for_row(0), 1);
        assert_eq!(collab.comments.count_for_row(999), 0);
    }
}
