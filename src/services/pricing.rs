//! Pricing lookup service

use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        enums::ResourceType,
        pricing::{Pricing, SetPricing},
    },
    repository::Repository,
};

const DEFAULT_CURRENCY: &str = "XOF";

#[derive(Clone)]
pub struct PricingService {
    repository: Repository,
}

impl PricingService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Get the active price of a resource
    pub async fn get_price(&self, resource_type: ResourceType, resource_id: Uuid) -> AppResult<Pricing> {
        self.repository.pricing.get(resource_type, resource_id).await
    }

    /// Set the price of a resource, creating the record on first use
    pub async fn set_price(
        &self,
        organization_id: Uuid,
        resource_type: ResourceType,
        resource_id: Uuid,
        data: &SetPricing,
    ) -> AppResult<Pricing> {
        if data.price_per_hour.is_sign_negative() || data.price_per_day.is_sign_negative() {
            return Err(AppError::Validation("Prices cannot be negative".to_string()));
        }

        let existing = self.repository.pricing.find(resource_type, resource_id).await?;
        if let Some(ref current) = existing {
            if current.organization_id != organization_id {
                return Err(AppError::NotFound(format!(
                    "No price set for {} {}",
                    resource_type, resource_id
                )));
            }
        }

        let currency = match (&data.currency, &existing) {
            (Some(code), _) => {
                let code = code.trim().to_uppercase();
                if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
                    return Err(AppError::Validation(format!("Invalid currency code '{}'", code)));
                }
                code
            }
            (None, Some(current)) => current.currency.clone(),
            (None, None) => DEFAULT_CURRENCY.to_string(),
        };

        let pricing = Pricing {
            organization_id,
            resource_type,
            resource_id,
            price_per_hour: data.price_per_hour,
            price_per_day: data.price_per_day,
            currency,
            updated_at: Utc::now(),
        };

        let saved = self.repository.pricing.upsert(&pricing).await?;
        tracing::info!(
            resource_type = %resource_type,
            %resource_id,
            per_day = %saved.price_per_day,
            "Price updated"
        );
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory::MemoryStore;
    use rust_decimal::Decimal;
    use std::sync::Arc;

    fn service() -> PricingService {
        PricingService::new(Repository::memory(Arc::new(MemoryStore::new())))
    }

    #[tokio::test]
    async fn test_set_then_update_in_place() {
        let service = service();
        let org = Uuid::new_v4();
        let vehicle = Uuid::new_v4();

        assert!(matches!(
            service.get_price(ResourceType::Vehicle, vehicle).await,
            Err(AppError::NotFound(_))
        ));

        let first = SetPricing {
            price_per_hour: Decimal::new(100, 0),
            price_per_day: Decimal::new(1000, 0),
            currency: Some("eur".to_string()),
        };
        service.set_price(org, ResourceType::Vehicle, vehicle, &first).await.unwrap();

        let second = SetPricing {
            price_per_hour: Decimal::new(120, 0),
            price_per_day: Decimal::new(1100, 0),
            currency: None,
        };
        service.set_price(org, ResourceType::Vehicle, vehicle, &second).await.unwrap();

        let stored = service.get_price(ResourceType::Vehicle, vehicle).await.unwrap();
        assert_eq!(stored.price_per_day, Decimal::new(1100, 0));
        assert_eq!(stored.currency, "EUR");
    }

    #[tokio::test]
    async fn test_rejects_negative_price() {
        let service = service();
        let data = SetPricing {
            price_per_hour: Decimal::new(-1, 0),
            price_per_day: Decimal::new(10, 0),
            currency: None,
        };
        let result = service
            .set_price(Uuid::new_v4(), ResourceType::Driver, Uuid::new_v4(), &data)
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
