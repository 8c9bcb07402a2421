use chrono::{NaiveDateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::{ensure_client, ensure_provider, found, lookup_failure, LifecycleEngine};
use crate::calendar::check_availability;
use crate::domain::notification::{Notification, NotificationKind, Recipient};
use crate::domain::party::{ClientId, ProviderId};
use crate::domain::reservation::{
    DirectBooking, Reservation, ReservationEvent, ReservationId, ReservationStatus,
};
use crate::domain::EntityKind;
use crate::errors::ApplicationError;
use crate::ports::{BookingStore, ChangeSet, Notifier, Write};

/// Outcome of one sweep over elapsed reservations.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FinishReport {
    pub finished: Vec<ReservationId>,
    pub skipped: Vec<SkippedReservation>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SkippedReservation {
    pub id: ReservationId,
    pub reason: String,
}

impl<S, N> LifecycleEngine<S, N>
where
    S: BookingStore,
    N: Notifier,
{
    /// Provider-entered booking. It is firm immediately, so any firm
    /// commitment in the slot rejects it.
    pub async fn book_direct(
        &self,
        provider: &ProviderId,
        booking: DirectBooking,
    ) -> Result<Reservation, ApplicationError> {
        let listing = self.load_listing(&booking.listing_id).await?;
        ensure_provider(provider, &listing.provider_id, EntityKind::Listing, listing.id.as_str())?;
        self.calendar.check_slot(booking.starts_at, booking.duration_minutes)?;

        let reservation =
            Reservation::book_direct(ReservationId::generate(), &listing, booking, Utc::now())?;
        let commitments = self
            .commitments_between(provider, reservation.starts_at, reservation.ends_at())
            .await?;
        check_availability(&commitments, reservation.starts_at, reservation.duration_minutes)?
            .require_free()?;

        self.commit(ChangeSet::single(Write::InsertReservation(reservation.clone())), "book")
            .await?;
        info!(
            event_name = "reservation.booked",
            reservation_id = %reservation.id,
            provider_id = %reservation.provider_id,
            "direct reservation booked"
        );

        self.notify(Notification::new(
            Recipient::Client(reservation.client_id.clone()),
            NotificationKind::ReservationBooked,
            format!(
                "\"{}\" is booked for {}",
                listing.title,
                reservation.starts_at.format("%Y-%m-%d %H:%M")
            ),
        ))
        .await;
        Ok(reservation)
    }

    pub async fn confirm_reservation(
        &self,
        provider: &ProviderId,
        reservation_id: &ReservationId,
    ) -> Result<Reservation, ApplicationError> {
        let mut reservation = self.load_reservation(reservation_id).await?;
        ensure_provider(
            provider,
            &reservation.provider_id,
            EntityKind::Reservation,
            reservation_id.as_str(),
        )?;

        let expected = reservation.status;
        reservation.apply(ReservationEvent::Confirm)?;

        if self.calendar.enforce_on_confirm {
            let others: Vec<_> = self
                .commitments_between(provider, reservation.starts_at, reservation.ends_at())
                .await?
                .into_iter()
                .filter(|commitment| commitment.reservation_id() != Some(&reservation.id))
                .collect();
            check_availability(&others, reservation.starts_at, reservation.duration_minutes)?
                .require_free()?;
        }

        self.persist_reservation(&reservation, expected, ReservationEvent::Confirm).await?;
        self.notify(Notification::new(
            Recipient::Client(reservation.client_id.clone()),
            NotificationKind::ReservationConfirmed,
            format!(
                "Your reservation for {} is confirmed",
                reservation.starts_at.format("%Y-%m-%d %H:%M")
            ),
        ))
        .await;
        Ok(reservation)
    }

    pub async fn refuse_reservation(
        &self,
        provider: &ProviderId,
        reservation_id: &ReservationId,
    ) -> Result<Reservation, ApplicationError> {
        let mut reservation = self.load_reservation(reservation_id).await?;
        ensure_provider(
            provider,
            &reservation.provider_id,
            EntityKind::Reservation,
            reservation_id.as_str(),
        )?;

        let expected = reservation.status;
        reservation.apply(ReservationEvent::Refuse)?;
        self.persist_reservation(&reservation, expected, ReservationEvent::Refuse).await?;

        self.notify(Notification::new(
            Recipient::Client(reservation.client_id.clone()),
            NotificationKind::ReservationRefused,
            format!(
                "Your reservation for {} was declined",
                reservation.starts_at.format("%Y-%m-%d %H:%M")
            ),
        ))
        .await;
        Ok(reservation)
    }

    pub async fn cancel_reservation(
        &self,
        client: &ClientId,
        reservation_id: &ReservationId,
    ) -> Result<Reservation, ApplicationError> {
        let mut reservation = self.load_reservation(reservation_id).await?;
        ensure_client(
            client,
            &reservation.client_id,
            EntityKind::Reservation,
            reservation_id.as_str(),
        )?;

        let expected = reservation.status;
        reservation.apply(ReservationEvent::Cancel)?;
        self.persist_reservation(&reservation, expected, ReservationEvent::Cancel).await?;

        self.notify(Notification::new(
            Recipient::Provider(reservation.provider_id.clone()),
            NotificationKind::ReservationCancelled,
            format!("Reservation {} was cancelled by the client", reservation.id),
        ))
        .await;
        Ok(reservation)
    }

    /// Closes a confirmed reservation once the event is over and prompts the
    /// client to rate it. Driven by the host system, not by a party.
    pub async fn mark_finished(
        &self,
        reservation_id: &ReservationId,
    ) -> Result<Reservation, ApplicationError> {
        let mut reservation = self.load_reservation(reservation_id).await?;

        let expected = reservation.status;
        reservation.apply(ReservationEvent::Finish)?;
        self.persist_reservation(&reservation, expected, ReservationEvent::Finish).await?;

        self.notify(Notification::new(
            Recipient::Client(reservation.client_id.clone()),
            NotificationKind::ReservationFinished,
            "Your event is over. Rate your provider now.",
        ))
        .await;
        Ok(reservation)
    }

    /// Finishes every confirmed reservation that ended at or before `now`.
    /// A reservation that moved concurrently is skipped, not fatal.
    pub async fn finish_elapsed(&self, now: NaiveDateTime) -> Result<FinishReport, ApplicationError> {
        let elapsed = self.store.list_elapsed_reservations(now).await.map_err(lookup_failure)?;
        let mut report = FinishReport::default();

        for reservation in elapsed {
            match self.mark_finished(&reservation.id).await {
                Ok(finished) => report.finished.push(finished.id),
                Err(error) => {
                    warn!(
                        event_name = "reservation.finish_skipped",
                        reservation_id = %reservation.id,
                        error = %error,
                        "elapsed reservation was not finished"
                    );
                    report
                        .skipped
                        .push(SkippedReservation { id: reservation.id, reason: error.to_string() });
                }
            }
        }

        info!(
            event_name = "reservation.finish_sweep",
            finished = report.finished.len(),
            skipped = report.skipped.len(),
            "elapsed reservation sweep completed"
        );
        Ok(report)
    }

    async fn persist_reservation(
        &self,
        reservation: &Reservation,
        expected: ReservationStatus,
        event: ReservationEvent,
    ) -> Result<(), ApplicationError> {
        self.commit(
            ChangeSet::single(Write::UpdateReservation {
                reservation: reservation.clone(),
                expected,
            }),
            event.as_str(),
        )
        .await?;
        let event_name = format!("reservation.{}", reservation.status.as_str());
        info!(
            event_name = event_name.as_str(),
            reservation_id = %reservation.id,
            from = expected.as_str(),
            to = reservation.status.as_str(),
            "reservation status changed"
        );
        Ok(())
    }

    pub(super) async fn load_reservation(
        &self,
        id: &ReservationId,
    ) -> Result<Reservation, ApplicationError> {
        let reservation = self.store.find_reservation(id).await.map_err(lookup_failure)?;
        found(reservation, EntityKind::Reservation, id.as_str())
    }
}
