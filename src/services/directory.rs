use std::sync::Arc;

use serde_json::json;

use crate::db::{Collection, EntityStore, Filter, ListQuery};
use crate::errors::AppError;
use crate::models::{Provider, Service};
use crate::services::coordinator::{CacheStats, CancelToken, CoordinatorSettings, RequestCoordinator};

/// Provider and service records, read through the request coordinators.
pub struct Directory {
    store: Arc<dyn EntityStore>,
    providers: RequestCoordinator<Provider>,
    services: RequestCoordinator<Service>,
}

pub fn validate_id(id: &str) -> Result<(), AppError> {
    if id.trim().is_empty() || id.contains('/') {
        return Err(AppError::InvalidInput(format!("malformed id: {id:?}")));
    }
    Ok(())
}

impl Directory {
    pub fn new(
        store: Arc<dyn EntityStore>,
        provider_settings: CoordinatorSettings,
        service_settings: CoordinatorSettings,
    ) -> Self {
        Self {
            store,
            providers: RequestCoordinator::new("providers", provider_settings),
            services: RequestCoordinator::new("services", service_settings),
        }
    }

    pub async fn get_provider(&self, id: &str, token: Option<&CancelToken>) -> Result<Provider, AppError> {
        validate_id(id)?;
        let store = Arc::clone(&self.store);
        let owned = id.to_string();
        let loader = move || {
            let store = Arc::clone(&store);
            let id = owned.clone();
            async move {
                match store.get(Collection::Providers, &id).await? {
                    Some(doc) => doc.decode(Collection::Providers).map(Some),
                    None => Ok(None),
                }
            }
        };
        self.providers
            .fetch(id, token, loader)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("provider {id}")))
    }

    pub async fn get_service(&self, id: &str, token: Option<&CancelToken>) -> Result<Service, AppError> {
        validate_id(id)?;
        let store = Arc::clone(&self.store);
        let owned = id.to_string();
        let loader = move || {
            let store = Arc::clone(&store);
            let id = owned.clone();
            async move {
                match store.get(Collection::Services, &id).await? {
                    Some(doc) => doc.decode(Collection::Services).map(Some),
                    None => Ok(None),
                }
            }
        };
        self.services
            .fetch(id, token, loader)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("service {id}")))
    }

    /// Active services of a provider, newest first. Degrades to an empty list.
    pub async fn provider_services(&self, provider_id: &str) -> Vec<Service> {
        let query = ListQuery::new(
            Collection::Services,
            vec![Filter::eq("providerId", provider_id), Filter::eq("isActive", true)],
        );
        let docs = match query.execute(self.store.as_ref()).await {
            Ok(docs) => docs,
            Err(e) => {
                tracing::error!(provider_id, error = %e, "failed to list provider services");
                return Vec::new();
            }
        };
        docs.into_iter()
            .filter_map(|doc| match doc.decode::<Service>(Collection::Services) {
                Ok(service) => Some(service),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable service");
                    None
                }
            })
            .collect()
    }

    /// Administrative approval: makes the provider bookable.
    pub async fn approve_provider(&self, id: &str) -> Result<(), AppError> {
        validate_id(id)?;
        self.store
            .update(
                Collection::Providers,
                id,
                json!({ "isApproved": true, "isActive": true }),
            )
            .await?;
        self.providers.clear(Some(id));
        tracing::info!(provider_id = id, "provider approved");
        Ok(())
    }

    pub fn forget_provider(&self, id: &str) {
        self.providers.clear(Some(id));
    }

    pub fn clear_cache(&self, key: Option<&str>) {
        self.providers.clear(key);
        self.services.clear(key);
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.providers.stats() + self.services.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{IndexSet, MemoryStore};
    use crate::services::retry::RetryPolicy;
    use std::time::Duration;

    fn settings() -> CoordinatorSettings {
        CoordinatorSettings {
            ttl: Duration::from_secs(30),
            timeout: Duration::from_secs(15),
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(10),
            },
        }
    }

    fn setup() -> (Arc<MemoryStore>, Directory) {
        let store = Arc::new(MemoryStore::new(IndexSet::new()));
        store.seed(
            Collection::Providers,
            "prov-1",
            json!({"userId": "u1", "businessName": "Pipes Inc", "category": "plumbing"}),
        );
        store.seed(
            Collection::Services,
            "svc-1",
            json!({"providerId": "prov-1", "name": "Leak repair", "pricingType": "fixed",
                   "basePrice": 80.0, "duration": 60, "isActive": true, "createdAt": 1}),
        );
        store.seed(
            Collection::Services,
            "svc-2",
            json!({"providerId": "prov-1", "name": "Old offer", "pricingType": "fixed",
                   "duration": 60, "isActive": false}),
        );
        let directory = Directory::new(store.clone(), settings(), settings());
        (store, directory)
    }

    #[tokio::test]
    async fn test_repeated_provider_reads_hit_store_once() {
        let (store, directory) = setup();
        let first = directory.get_provider("prov-1", None).await.unwrap();
        let second = directory.get_provider("prov-1", None).await.unwrap();
        assert_eq!(first.id, "prov-1");
        assert_eq!(second.business_name, "Pipes Inc");
        assert_eq!(store.calls(), 1);
        assert_eq!(directory.cache_stats().valid, 1);
    }

    #[tokio::test]
    async fn test_missing_provider_is_not_found() {
        let (_, directory) = setup();
        let err = directory.get_provider("nobody", None).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_malformed_id_skips_store() {
        let (store, directory) = setup();
        let err = directory.get_service("a/b", None).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn test_provider_services_lists_active_only() {
        let (_, directory) = setup();
        let services = directory.provider_services("prov-1").await;
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].id, "svc-1");
    }

    #[tokio::test]
    async fn test_provider_services_degrades_to_empty() {
        let (store, directory) = setup();
        store.set_offline(true);
        assert!(directory.provider_services("prov-1").await.is_empty());
    }

    #[tokio::test]
    async fn test_approve_refreshes_cached_provider() {
        let (_, directory) = setup();
        assert!(!directory.get_provider("prov-1", None).await.unwrap().is_bookable());
        directory.approve_provider("prov-1").await.unwrap();
        assert!(directory.get_provider("prov-1", None).await.unwrap().is_bookable());
    }

    #[tokio::test]
    async fn test_clear_cache() {
        let (_, directory) = setup();
        directory.get_provider("prov-1", None).await.unwrap();
        directory.get_service("svc-1", None).await.unwrap();
        assert_eq!(directory.cache_stats().total, 2);
        directory.clear_cache(Some("svc-1"));
        assert_eq!(directory.cache_stats().total, 1);
        directory.clear_cache(None);
        assert_eq!(directory.cache_stats().total, 0);
    }
}
