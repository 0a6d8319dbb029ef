//! Notification fan-out and inbox management
//!
//! Lifecycle transitions hand their notifications to a [`NotificationDispatcher`]
//! after the rental state is committed. Dispatch is best-effort: failures are
//! logged and never reach the caller.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        enums::{NotificationReason, NotificationTarget},
        notification::{NewNotification, Notification},
        rental::Rental,
    },
    repository::{NotificationsRepository, Repository},
};

/// Per-party messages for one rental event; `None` means the party is not told
#[derive(Debug, Clone, Default)]
pub struct FanoutMessages {
    pub client: Option<String>,
    pub agency: String,
    pub driver: Option<String>,
}

/// Address the notifications of one rental event.
///
/// The agency is always notified. The client only when the rental has an
/// account holder and a client message was given; walk-ins never receive
/// client notices. The driver only when a driver message was given.
pub fn fanout(rental: &Rental, reason: NotificationReason, messages: FanoutMessages) -> Vec<NewNotification> {
    let build = |target, resource_id, details: String| NewNotification {
        rental_id: rental.id,
        resource_type: target,
        resource_id,
        reason,
        vehicle_id: Some(rental.vehicle_id),
        driver_id: Some(rental.driver_id),
        details,
    };

    let mut batch = vec![build(NotificationTarget::Agency, rental.agency_id, messages.agency)];
    if let (Some(client_id), Some(message)) = (rental.client_id, messages.client) {
        batch.push(build(NotificationTarget::Client, client_id, message));
    }
    if let Some(message) = messages.driver {
        batch.push(build(NotificationTarget::Driver, rental.driver_id, message));
    }
    batch
}

/// Store one notification for one party of a rental
pub async fn notify(repository: &dyn NotificationsRepository, pending: NewNotification) -> AppResult<Notification> {
    let notification = pending.into_notification(Utc::now());
    repository.insert(&notification).await?;
    Ok(notification)
}

async fn persist(repository: &dyn NotificationsRepository, pending: NewNotification) {
    let (rental_id, target) = (pending.rental_id, pending.resource_type);
    if let Err(e) = notify(repository, pending).await {
        tracing::warn!(
            rental_id = %rental_id,
            target = ?target,
            error = %e,
            "Failed to persist notification"
        );
    }
}

#[derive(Clone)]
enum DispatchMode {
    Queued(mpsc::Sender<NewNotification>),
    Inline(Arc<dyn NotificationsRepository>),
}

/// Hands notifications to storage without blocking lifecycle transitions
#[derive(Clone)]
pub struct NotificationDispatcher {
    mode: DispatchMode,
}

impl NotificationDispatcher {
    /// Start a background worker draining a bounded queue.
    ///
    /// The worker stops once every dispatcher clone has been dropped.
    pub fn spawn(repository: Arc<dyn NotificationsRepository>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<NewNotification>(capacity.max(1));
        let handle = tokio::spawn(async move {
            while let Some(pending) = rx.recv().await {
                persist(repository.as_ref(), pending).await;
            }
            tracing::debug!("Notification worker stopped");
        });
        (Self { mode: DispatchMode::Queued(tx) }, handle)
    }

    /// Persist in the caller's task, same best-effort semantics
    pub fn inline(repository: Arc<dyn NotificationsRepository>) -> Self {
        Self { mode: DispatchMode::Inline(repository) }
    }

    pub async fn dispatch(&self, batch: Vec<NewNotification>) {
        match &self.mode {
            DispatchMode::Queued(tx) => {
                for pending in batch {
                    match tx.try_send(pending) {
                        Ok(()) => {}
                        Err(TrySendError::Full(dropped)) => tracing::warn!(
                            rental_id = %dropped.rental_id,
                            target = ?dropped.resource_type,
                            "Notification queue full, dropping notification"
                        ),
                        Err(TrySendError::Closed(dropped)) => tracing::error!(
                            rental_id = %dropped.rental_id,
                            "Notification worker is gone, dropping notification"
                        ),
                    }
                }
            }
            DispatchMode::Inline(repository) => {
                for pending in batch {
                    persist(repository.as_ref(), pending).await;
                }
            }
        }
    }
}

#[derive(Clone)]
pub struct NotificationsService {
    repository: Repository,
    dispatcher: NotificationDispatcher,
}

impl NotificationsService {
    pub fn new(repository: Repository, dispatcher: NotificationDispatcher) -> Self {
        Self { repository, dispatcher }
    }

    /// Fan a rental event out to its parties, best-effort
    pub async fn broadcast(&self, rental: &Rental, reason: NotificationReason, messages: FanoutMessages) {
        self.dispatcher.dispatch(fanout(rental, reason, messages)).await;
    }

    pub async fn inbox(
        &self,
        target: NotificationTarget,
        resource_id: Uuid,
        unread_only: bool,
    ) -> AppResult<Vec<Notification>> {
        self.repository.notifications.list_for(target, resource_id, unread_only).await
    }

    pub async fn unread_count(&self, target: NotificationTarget, resource_id: Uuid) -> AppResult<i64> {
        self.repository.notifications.count_unread(target, resource_id).await
    }

    pub async fn for_rental(&self, rental_id: Uuid) -> AppResult<Vec<Notification>> {
        self.repository.notifications.list_for_rental(rental_id).await
    }

    /// Flip the read flag of a notification owned by the given inbox
    pub async fn mark_read(&self, id: Uuid, target: NotificationTarget, resource_id: Uuid) -> AppResult<Notification> {
        self.owned(id, target, resource_id).await?;
        self.repository.notifications.mark_read(id).await
    }

    pub async fn delete(&self, id: Uuid, target: NotificationTarget, resource_id: Uuid) -> AppResult<()> {
        self.owned(id, target, resource_id).await?;
        self.repository.notifications.delete(id).await
    }

    async fn owned(&self, id: Uuid, target: NotificationTarget, resource_id: Uuid) -> AppResult<Notification> {
        let notification = self.repository.notifications.get_by_id(id).await?;
        if notification.resource_type != target || notification.resource_id != resource_id {
            return Err(crate::repository::notifications::notification_not_found(id));
        }
        Ok(notification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::rental::tests::sample_rental;
    use crate::repository::memory::MemoryStore;

    fn messages(client: bool, driver: bool) -> FanoutMessages {
        FanoutMessages {
            client: client.then(|| "client".to_string()),
            agency: "agency".to_string(),
            driver: driver.then(|| "driver".to_string()),
        }
    }

    fn targets(batch: &[NewNotification]) -> Vec<NotificationTarget> {
        batch.iter().map(|n| n.resource_type).collect()
    }

    #[test]
    fn test_fanout_rules() {
        let rental = sample_rental("100");

        let all = fanout(&rental, NotificationReason::LocationStart, messages(true, true));
        assert_eq!(
            targets(&all),
            vec![NotificationTarget::Agency, NotificationTarget::Client, NotificationTarget::Driver]
        );
        assert_eq!(all[2].resource_id, rental.driver_id);

        let reservation = fanout(&rental, NotificationReason::Reservation, messages(true, false));
        assert_eq!(targets(&reservation), vec![NotificationTarget::Agency, NotificationTarget::Client]);

        let walk_in = Rental { client_id: None, ..rental };
        let batch = fanout(&walk_in, NotificationReason::Reservation, messages(true, false));
        assert_eq!(targets(&batch), vec![NotificationTarget::Agency]);
    }

    #[tokio::test]
    async fn test_queued_dispatch_persists_after_drain() {
        let store = Arc::new(MemoryStore::new());
        let repository = Repository::memory(store);
        let (dispatcher, worker) = NotificationDispatcher::spawn(repository.notifications.clone(), 8);

        let rental = sample_rental("100");
        dispatcher
            .dispatch(fanout(&rental, NotificationReason::LocationEnd, messages(true, true)))
            .await;
        drop(dispatcher);
        worker.await.unwrap();

        let stored = repository.notifications.list_for_rental(rental.id).await.unwrap();
        assert_eq!(stored.len(), 3);
        assert!(stored.iter().all(|n| !n.is_read));
    }

    #[tokio::test]
    async fn test_inbox_ownership() {
        let repository = Repository::memory(Arc::new(MemoryStore::new()));
        let service = NotificationsService::new(
            repository.clone(),
            NotificationDispatcher::inline(repository.notifications.clone()),
        );
        let rental = sample_rental("100");
        let client_id = rental.client_id.unwrap();

        let pending = NewNotification {
            rental_id: rental.id,
            resource_type: NotificationTarget::Client,
            resource_id: client_id,
            reason: NotificationReason::Reservation,
            vehicle_id: Some(rental.vehicle_id),
            driver_id: Some(rental.driver_id),
            details: "hello".to_string(),
        };
        let note = notify(repository.notifications.as_ref(), pending).await.unwrap();
        assert_eq!(service.unread_count(NotificationTarget::Client, client_id).await.unwrap(), 1);

        let stranger = service.mark_read(note.id, NotificationTarget::Client, Uuid::new_v4()).await;
        assert!(matches!(stranger, Err(AppError::NotFound(_))));

        let read = service.mark_read(note.id, NotificationTarget::Client, client_id).await.unwrap();
        assert!(read.is_read);
        assert!(service.inbox(NotificationTarget::Client, client_id, true).await.unwrap().is_empty());

        service.delete(note.id, NotificationTarget::Client, client_id).await.unwrap();
        assert!(service.inbox(NotificationTarget::Client, client_id, false).await.unwrap().is_empty());
    }
}
