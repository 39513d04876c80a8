//! Who may do what to users, tickets and messages.
//!
//! Every entity policy has the same three tiers:
//!
//! 1. a coarse gate ([`AccessPolicy::can_act`]) that only looks at the actor and the action,
//! 2. an object gate ([`AccessPolicy::can_access_object`]) comparing the actor to the target,
//! 3. field-level checks that run on the submitted values and cannot be skipped by passing 1 and 2.
//!
//! Tickets the actor is not allowed to see are reported as missing, never as forbidden,
//! both on the ticket routes and on the nested message routes.

use uuid::Uuid;

use crate::{
    db::DataStore,
    error::{ErrorMessage, HttpError},
    models::{
        ticketmodel::{Ticket, TicketScope, TicketStatus, TicketWithOwner},
        usermodel::{User, UserChanges, UserRole},
    },
    utils::token::TokenClaims,
};

/// The authenticated identity behind a request, built from access-token claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub email: String,
    pub role: UserRole,
}

impl Actor {
    pub fn from_claims(claims: &TokenClaims) -> Result<Self, HttpError> {
        let id = Uuid::parse_str(&claims.sub)
            .map_err(|_| HttpError::unauthorized(ErrorMessage::InvalidToken.to_string()))?;

        Ok(Actor {
            id,
            email: claims.email.clone(),
            role: claims.role,
        })
    }

    pub fn has_staff_access(&self) -> bool {
        self.role.has_staff_access()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    List,
    Retrieve,
    Create,
    Update,
}

pub trait AccessPolicy {
    type Resource;

    fn can_act(&self, actor: Option<&Actor>, action: Action) -> bool;

    fn can_access_object(
        &self,
        actor: Option<&Actor>,
        action: Action,
        resource: &Self::Resource,
    ) -> bool;
}

/// Runs the coarse gate, then the object gate when a target is known.
pub fn can_access<P: AccessPolicy>(
    policy: &P,
    actor: Option<&Actor>,
    action: Action,
    resource: Option<&P::Resource>,
) -> bool {
    if !policy.can_act(actor, action) {
        return false;
    }

    match resource {
        Some(resource) => policy.can_access_object(actor, action, resource),
        None => true,
    }
}

/// Owner or admin on user records.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserPolicy;

impl AccessPolicy for UserPolicy {
    type Resource = User;

    fn can_act(&self, actor: Option<&Actor>, _action: Action) -> bool {
        actor.is_some()
    }

    fn can_access_object(&self, actor: Option<&Actor>, _action: Action, target: &User) -> bool {
        match actor {
            Some(actor) => actor.id == target.id || actor.role.is_staff(),
            None => false,
        }
    }
}

impl UserPolicy {
    pub fn check_fields(&self, actor: &Actor, changes: &UserChanges) -> Result<(), HttpError> {
        if actor.role.is_staff() {
            return Ok(());
        }

        if changes.role.is_some() {
            return Err(HttpError::validation(
                "role",
                ErrorMessage::RoleChangeNotAllowed.to_string(),
            ));
        }
        if changes.is_active.is_some() {
            return Err(HttpError::validation(
                "is_active",
                ErrorMessage::RoleChangeNotAllowed.to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TicketPolicy;

impl AccessPolicy for TicketPolicy {
    type Resource = Ticket;

    fn can_act(&self, actor: Option<&Actor>, action: Action) -> bool {
        match action {
            Action::Create => actor.is_some(),
            Action::List | Action::Retrieve | Action::Update => true,
        }
    }

    fn can_access_object(&self, actor: Option<&Actor>, _action: Action, ticket: &Ticket) -> bool {
        match actor {
            None => false,
            Some(actor) if actor.has_staff_access() => true,
            Some(actor) => ticket.user_id == actor.id,
        }
    }
}

impl TicketPolicy {
    /// Must select exactly the tickets `can_access_object` would allow one by one.
    pub fn scope(&self, actor: &Actor) -> TicketScope {
        if actor.has_staff_access() {
            TicketScope::All
        } else {
            TicketScope::OwnedBy(actor.id)
        }
    }

    pub fn check_status(&self, actor: &Actor, status: TicketStatus) -> Result<(), HttpError> {
        if status == TicketStatus::Closed && !actor.has_staff_access() {
            tracing::info!(actor = %actor.id, "refused to close ticket without staff role");
            return Err(HttpError::validation(
                "status",
                ErrorMessage::CloseNotAllowed.to_string(),
            ));
        }

        Ok(())
    }
}

/// Access to the messages of a ticket follows access to the ticket itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessagePolicy;

impl AccessPolicy for MessagePolicy {
    type Resource = Ticket;

    fn can_act(&self, actor: Option<&Actor>, _action: Action) -> bool {
        actor.is_some()
    }

    fn can_access_object(&self, actor: Option<&Actor>, _action: Action, ticket: &Ticket) -> bool {
        match actor {
            Some(actor) => ticket.user_id == actor.id || actor.has_staff_access(),
            None => false,
        }
    }
}

impl MessagePolicy {
    /// Server-side value of `is_admin_response`; client input never reaches the store.
    pub fn admin_response_flag(&self, actor: &Actor) -> bool {
        actor.has_staff_access()
    }

    pub fn check_content(&self, content: &str) -> Result<(), HttpError> {
        if content.trim().is_empty() {
            return Err(HttpError::validation(
                "content",
                ErrorMessage::EmptyMessage.to_string(),
            ));
        }

        Ok(())
    }
}

/// The ticket a request operates on, loaded and authorized once per request.
#[derive(Debug, Clone)]
pub struct TicketContext {
    pub ticket: TicketWithOwner,
}

impl TicketContext {
    pub async fn resolve<P>(
        db: &dyn DataStore,
        policy: &P,
        actor: &Actor,
        action: Action,
        ticket_id: Uuid,
    ) -> Result<Self, HttpError>
    where
        P: AccessPolicy<Resource = Ticket> + Sync,
    {
        let ticket = db
            .get_ticket(ticket_id)
            .await?
            .ok_or_else(|| HttpError::not_found(ErrorMessage::TicketNotFound.to_string()))?;

        if !can_access(policy, Some(actor), action, Some(&ticket.ticket)) {
            tracing::info!(
                actor = %actor.id,
                ticket = %ticket_id,
                ?action,
                "ticket hidden from actor"
            );
            return Err(HttpError::not_found(ErrorMessage::TicketNotFound.to_string()));
        }

        Ok(TicketContext { ticket })
    }

    pub fn id(&self) -> Uuid {
        self.ticket.ticket.id
    }
}
