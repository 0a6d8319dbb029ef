//! Authenticated caller identity
//!
//! Tokens are issued by the identity service; this server only verifies them.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::enums::NotificationTarget;
use super::rental::Rental;
use crate::error::AppError;

/// Caller role carried in the token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Client,
    Driver,
    AgencyStaff,
    Admin,
}

/// Client or agency acting on a rental
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Client(Uuid),
    Agency(Uuid),
}

impl Actor {
    pub fn owns(&self, rental: &Rental) -> bool {
        match self {
            Actor::Client(id) => rental.client_id == Some(*id),
            Actor::Agency(id) => rental.agency_id == *id,
        }
    }
}

/// JWT Claims for authenticated users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: String,
    pub user_id: Uuid,
    pub role: Role,
    /// Agency the staff member works for
    pub agency_id: Option<Uuid>,
    pub organization_id: Option<Uuid>,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    /// Require a client account, returning the client id
    pub fn require_client(&self) -> Result<Uuid, AppError> {
        if self.role == Role::Client {
            Ok(self.user_id)
        } else {
            Err(AppError::Authorization("Client account required".to_string()))
        }
    }

    /// Require agency staff (or an admin attached to an agency), returning the agency id
    pub fn require_agency_staff(&self) -> Result<Uuid, AppError> {
        match (self.role, self.agency_id) {
            (Role::AgencyStaff | Role::Admin, Some(agency_id)) => Ok(agency_id),
            _ => Err(AppError::Authorization("Agency staff privileges required".to_string())),
        }
    }

    /// Require staff of an organization, returning the organization id
    pub fn require_organization_staff(&self) -> Result<Uuid, AppError> {
        match (self.role, self.organization_id) {
            (Role::AgencyStaff | Role::Admin, Some(organization_id)) => Ok(organization_id),
            _ => Err(AppError::Authorization("Organization staff privileges required".to_string())),
        }
    }

    /// Whether the caller is a party to the rental
    pub fn can_access_rental(&self, rental: &Rental) -> bool {
        match self.role {
            Role::Client => rental.client_id == Some(self.user_id),
            Role::Driver => rental.driver_id == self.user_id,
            Role::AgencyStaff => self.agency_id == Some(rental.agency_id),
            Role::Admin => self
                .organization_id
                .map_or(true, |org| org == rental.organization_id),
        }
    }

    /// Party on whose behalf a lifecycle action is taken
    pub fn actor(&self) -> Result<Actor, AppError> {
        match (self.role, self.agency_id) {
            (Role::Client, _) => Ok(Actor::Client(self.user_id)),
            (Role::AgencyStaff | Role::Admin, Some(agency_id)) => Ok(Actor::Agency(agency_id)),
            _ => Err(AppError::Authorization(
                "Only clients and agency staff act on rentals".to_string(),
            )),
        }
    }

    /// Notification inbox of the caller
    pub fn inbox(&self) -> Result<(NotificationTarget, Uuid), AppError> {
        match self.role {
            Role::Client => Ok((NotificationTarget::Client, self.user_id)),
            Role::Driver => Ok((NotificationTarget::Driver, self.user_id)),
            Role::AgencyStaff | Role::Admin => self
                .agency_id
                .map(|agency_id| (NotificationTarget::Agency, agency_id))
                .ok_or_else(|| AppError::Authorization("No agency attached to this account".to_string())),
        }
    }
}
