use chrono::Utc;
use tracing::{info, warn};

use super::{ensure_client, ensure_provider, found, lookup_failure, LifecycleEngine};
use crate::calendar::check_availability;
use crate::domain::listing::{Listing, ListingId};
use crate::domain::notification::{Notification, NotificationKind, Recipient};
use crate::domain::party::{ClientId, ProviderId};
use crate::domain::quote::{Quote, QuoteEvent, QuoteId, QuoteRequest, QuoteResponse};
use crate::domain::reservation::{Reservation, ReservationId};
use crate::domain::EntityKind;
use crate::errors::ApplicationError;
use crate::ports::{BookingStore, ChangeSet, Notifier, Write};

impl<S, N> LifecycleEngine<S, N>
where
    S: BookingStore,
    N: Notifier,
{
    pub async fn request_quote(
        &self,
        client: &ClientId,
        request: QuoteRequest,
    ) -> Result<Quote, ApplicationError> {
        self.calendar.check_slot(request.starts_at, request.duration_minutes)?;
        let listing = self.load_listing(&request.listing_id).await?;
        let quote = Quote::open(QuoteId::generate(), client.clone(), &listing, request, Utc::now())?;

        self.commit(ChangeSet::single(Write::InsertQuote(quote.clone())), "request").await?;
        info!(
            event_name = "quote.requested",
            quote_id = %quote.id,
            client_id = %quote.client_id,
            provider_id = %quote.provider_id,
            "quote requested"
        );

        self.notify(Notification::new(
            Recipient::Provider(quote.provider_id.clone()),
            NotificationKind::QuoteRequested,
            format!(
                "New quote request for \"{}\" on {}",
                listing.title,
                quote.starts_at.format("%Y-%m-%d %H:%M")
            ),
        ))
        .await;
        Ok(quote)
    }

    pub async fn respond_to_quote(
        &self,
        provider: &ProviderId,
        quote_id: &QuoteId,
        response: QuoteResponse,
    ) -> Result<Quote, ApplicationError> {
        let mut quote = self.load_quote(quote_id).await?;
        ensure_provider(provider, &quote.provider_id, EntityKind::Quote, quote_id.as_str())?;
        let listing = self.load_listing(&quote.listing_id).await?;

        let expected = quote.status;
        quote.respond(response, listing.tariff_unit.clone(), Utc::now())?;
        self.commit(
            ChangeSet::single(Write::UpdateQuote { quote: quote.clone(), expected }),
            QuoteEvent::Respond.as_str(),
        )
        .await?;
        info!(event_name = "quote.answered", quote_id = %quote.id, "quote answered");

        let amount = quote.answer.as_ref().map(|answer| answer.amount).unwrap_or_default();
        self.notify(Notification::new(
            Recipient::Client(quote.client_id.clone()),
            NotificationKind::QuoteAnswered,
            format!("Your quote for \"{}\" was answered: {amount}", listing.title),
        ))
        .await;
        Ok(quote)
    }

    /// Accepting a quote turns it into a reservation awaiting the provider's
    /// confirmation. Both writes commit together.
    pub async fn accept_quote(
        &self,
        client: &ClientId,
        quote_id: &QuoteId,
    ) -> Result<Reservation, ApplicationError> {
        let mut quote = self.load_quote(quote_id).await?;
        ensure_client(client, &quote.client_id, EntityKind::Quote, quote_id.as_str())?;

        let expected = quote.status;
        let reservation = quote.accept(ReservationId::generate(), Utc::now())?;

        // Advisory only: the provider decides when confirming.
        let commitments = self
            .commitments_between(&reservation.provider_id, reservation.starts_at, reservation.ends_at())
            .await?;
        let availability =
            check_availability(&commitments, reservation.starts_at, reservation.duration_minutes)?;
        if !availability.available {
            warn!(
                event_name = "quote.accepted_over_conflict",
                quote_id = %quote.id,
                conflicts = availability.conflicts.len(),
                "accepted quote overlaps existing commitments"
            );
        }

        let changes = ChangeSet::single(Write::UpdateQuote { quote: quote.clone(), expected })
            .with_dependent(Write::InsertReservation(reservation.clone()));
        self.commit(changes, QuoteEvent::Accept.as_str()).await?;
        info!(
            event_name = "quote.accepted",
            quote_id = %quote.id,
            reservation_id = %reservation.id,
            "quote accepted"
        );

        self.notify(Notification::new(
            Recipient::Provider(quote.provider_id.clone()),
            NotificationKind::QuoteAccepted,
            format!(
                "Quote accepted, reservation {} awaits your confirmation",
                reservation.id
            ),
        ))
        .await;
        Ok(reservation)
    }

    pub async fn refuse_quote(
        &self,
        client: &ClientId,
        quote_id: &QuoteId,
    ) -> Result<Quote, ApplicationError> {
        let mut quote = self.load_quote(quote_id).await?;
        ensure_client(client, &quote.client_id, EntityKind::Quote, quote_id.as_str())?;

        let expected = quote.status;
        quote.refuse()?;
        self.commit(
            ChangeSet::single(Write::UpdateQuote { quote: quote.clone(), expected }),
            QuoteEvent::Refuse.as_str(),
        )
        .await?;
        info!(event_name = "quote.refused", quote_id = %quote.id, "quote refused");

        self.notify(Notification::new(
            Recipient::Provider(quote.provider_id.clone()),
            NotificationKind::QuoteRefused,
            format!("Quote {} was declined by the client", quote.id),
        ))
        .await;
        Ok(quote)
    }

    pub(super) async fn load_listing(&self, id: &ListingId) -> Result<Listing, ApplicationError> {
        let listing = self.store.find_listing(id).await.map_err(lookup_failure)?;
        found(listing, EntityKind::Listing, id.as_str())
    }

    async fn load_quote(&self, id: &QuoteId) -> Result<Quote, ApplicationError> {
        let quote = self.store.find_quote(id).await.map_err(lookup_failure)?;
        found(quote, EntityKind::Quote, id.as_str())
    }
}
