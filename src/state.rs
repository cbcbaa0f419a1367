use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::EntityStore;
use crate::services::bookings::BookingManager;
use crate::services::directory::Directory;
use crate::services::messaging::MessagingProvider;
use crate::services::scheduling::Scheduler;

pub struct AppState {
    pub config: AppConfig,
    pub directory: Arc<Directory>,
    pub bookings: Arc<BookingManager>,
    pub scheduler: Scheduler,
}

impl AppState {
    /// Wires the coordinators, lifecycle manager and scheduler around one store.
    pub fn new(
        config: AppConfig,
        store: Arc<dyn EntityStore>,
        messaging: Arc<dyn MessagingProvider>,
    ) -> Self {
        let (provider_settings, service_settings) = config.coordinator_settings();
        let directory = Arc::new(Directory::new(
            Arc::clone(&store),
            provider_settings,
            service_settings,
        ));
        let bookings = Arc::new(BookingManager::new(store, Arc::clone(&directory), messaging));
        let scheduler = Scheduler::new(
            Arc::clone(&directory),
            bookings.clone(),
            config.default_days_ahead,
        );
        Self {
            config,
            directory,
            bookings,
            scheduler,
        }
    }
}
