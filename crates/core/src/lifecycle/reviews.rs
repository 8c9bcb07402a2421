use std::collections::HashSet;

use chrono::Utc;
use tracing::info;

use super::{ensure_client, lookup_failure, store_failure, LifecycleEngine};
use crate::domain::notification::{Notification, NotificationKind, Recipient};
use crate::domain::order::OrderStatus;
use crate::domain::party::{ClientId, ProviderId};
use crate::domain::reservation::ReservationStatus;
use crate::domain::review::{Rating, Review, ReviewId, ReviewTarget};
use crate::errors::{ApplicationError, DomainError};
use crate::ports::{BookingStore, ChangeSet, Notifier, StoreError, Write};

/// The parties of a review target and whether it has reached the status that
/// opens it to review.
struct ReviewSubject {
    client_id: ClientId,
    provider_id: ProviderId,
    qualifies: bool,
}

impl<S, N> LifecycleEngine<S, N>
where
    S: BookingStore,
    N: Notifier,
{
    /// True when `client` owns the target, the target is finished or
    /// delivered, and the client has not reviewed it yet.
    pub async fn can_review(
        &self,
        client: &ClientId,
        target: &ReviewTarget,
    ) -> Result<bool, ApplicationError> {
        let subject = self.review_subject(target).await?;
        if &subject.client_id != client || !subject.qualifies {
            return Ok(false);
        }
        let existing = self.store.find_review(client, target).await.map_err(lookup_failure)?;
        Ok(existing.is_none())
    }

    pub async fn submit_review(
        &self,
        client: &ClientId,
        target: ReviewTarget,
        rating: i32,
        comment: Option<String>,
    ) -> Result<Review, ApplicationError> {
        let rating = Rating::new(rating)?;
        let subject = self.review_subject(&target).await?;
        ensure_client(client, &subject.client_id, target.entity(), target.id())?;

        if !subject.qualifies {
            return Err(DomainError::NotEligible {
                entity: target.entity(),
                required: target.qualifying_status(),
            }
            .into());
        }
        let existing = self.store.find_review(client, &target).await.map_err(lookup_failure)?;
        if existing.is_some() {
            return Err(DomainError::AlreadyReviewed { entity: target.entity() }.into());
        }

        let review = Review {
            id: ReviewId::generate(),
            client_id: client.clone(),
            provider_id: subject.provider_id,
            target,
            rating,
            comment: comment.map(|c| c.trim().to_owned()).filter(|c| !c.is_empty()),
            created_at: Utc::now(),
        };

        // Two submissions racing past the lookup meet the store's unique index.
        self.store
            .apply(ChangeSet::single(Write::InsertReview(review.clone())))
            .await
            .map_err(|error| match error {
                StoreError::Duplicate { .. } => ApplicationError::from(
                    DomainError::AlreadyReviewed { entity: review.target.entity() },
                ),
                other => store_failure(other, "review"),
            })?;
        info!(
            event_name = "review.submitted",
            review_id = %review.id,
            target = review.target.id(),
            rating = review.rating.value(),
            "review submitted"
        );

        self.notify(Notification::new(
            Recipient::Provider(review.provider_id.clone()),
            NotificationKind::ReviewReceived,
            format!("You received a {}-star review", review.rating.value()),
        ))
        .await;
        Ok(review)
    }

    /// Finished reservations and delivered orders of `client` that still wait
    /// for a review, reservations first.
    pub async fn owed_review_prompts(
        &self,
        client: &ClientId,
    ) -> Result<Vec<ReviewTarget>, ApplicationError> {
        let reviewed: HashSet<ReviewTarget> = self
            .store
            .list_client_reviews(client)
            .await
            .map_err(lookup_failure)?
            .into_iter()
            .map(|review| review.target)
            .collect();

        let reservations = self
            .store
            .list_client_reservations(client, ReservationStatus::Finished)
            .await
            .map_err(lookup_failure)?;
        let orders = self
            .store
            .list_client_orders(client, OrderStatus::Delivered)
            .await
            .map_err(lookup_failure)?;

        Ok(reservations
            .into_iter()
            .map(|reservation| ReviewTarget::Reservation(reservation.id))
            .chain(orders.into_iter().map(|order| ReviewTarget::Order(order.id)))
            .filter(|target| !reviewed.contains(target))
            .collect())
    }

    async fn review_subject(&self, target: &ReviewTarget) -> Result<ReviewSubject, ApplicationError> {
        match target {
            ReviewTarget::Reservation(id) => {
                let reservation = self.load_reservation(id).await?;
                Ok(ReviewSubject {
                    qualifies: reservation.status == ReservationStatus::Finished,
                    client_id: reservation.client_id,
                    provider_id: reservation.provider_id,
                })
            }
            ReviewTarget::Order(id) => {
                let order = self.load_order(id).await?;
                Ok(ReviewSubject {
                    qualifies: order.status == OrderStatus::Delivered,
                    client_id: order.client_id,
                    provider_id: order.provider_id,
                })
            }
        }
    }
}
