use serde::{Deserialize, Serialize};

entity_id!(
    /// A private individual booking or buying from providers.
    ClientId
);

entity_id!(
    /// A service or product provider.
    ProviderId
);

/// Whoever is performing an operation. Every lifecycle operation receives its
/// actor explicitly and checks ownership against the target entity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", content = "id", rename_all = "snake_case")]
pub enum Actor {
    Client(ClientId),
    Provider(ProviderId),
}

impl Actor {
    pub fn role(&self) -> &'static str {
        match self {
            Self::Client(_) => "client",
            Self::Provider(_) => "provider",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Client(id) => id.as_str(),
            Self::Provider(id) => id.as_str(),
        }
    }

    /// True when the actor is one of the two parties of an entity.
    pub fn is_party_to(&self, client: &ClientId, provider: &ProviderId) -> bool {
        match self {
            Self::Client(id) => id == client,
            Self::Provider(id) => id == provider,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Actor, ClientId, ProviderId};

    #[test]
    fn actor_matches_only_its_own_side() {
        let client = ClientId("c-1".to_owned());
        let provider = ProviderId("p-1".to_owned());

        assert!(Actor::Client(client.clone()).is_party_to(&client, &provider));
        assert!(Actor::Provider(provider.clone()).is_party_to(&client, &provider));
        assert!(!Actor::Client(ClientId("p-1".to_owned())).is_party_to(&client, &provider));
    }

    #[test]
    fn actor_reports_role_and_id() {
        let actor = Actor::Provider(ProviderId("p-9".to_owned()));
        assert_eq!(actor.role(), "provider");
        assert_eq!(actor.id(), "p-9");
    }
}
