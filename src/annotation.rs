use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::error::FetchError;
use crate::scanner::MethodSite;
use crate::settings::LensSettings;
use crate::sparkline;
use crate::statistics::{CallStatistics, StatisticsClient, StatisticsQuery};

pub const NEVER_CALLED: &str = "Never called";

/// Label for a method with recorded calls, sparkline included.
pub fn count_label(statistics: &CallStatistics, settings: &LensSettings) -> String {
    let days = statistics.window_days.unwrap_or(settings.number_of_days);
    let noun = if statistics.count == 1 { "call" } else { "calls" };
    format!(
        "{} {} in the last {} days{}",
        statistics.count,
        noun,
        days,
        sparkline::render(statistics.history.as_deref(), settings)
    )
}

/// Turns the outcome of a fetch into the text shown above the method. Every
/// outcome produces some label.
pub fn label_for(
    outcome: &Result<Option<CallStatistics>, FetchError>,
    settings: &LensSettings,
) -> String {
    match outcome {
        Ok(Some(statistics)) => count_label(statistics, settings),
        Ok(None) => NEVER_CALLED.to_string(),
        Err(e) => e.label(),
    }
}

/// Annotates method sites with call statistics, one site at a time.
///
/// Any number of sites may be annotated concurrently; at most
/// `max_concurrent_requests` requests are in flight at once.
#[derive(Debug)]
pub struct AnnotationResolver {
    client: StatisticsClient,
    settings: LensSettings,
    permits: Arc<Semaphore>,
}

impl AnnotationResolver {
    pub fn new(settings: LensSettings) -> Result<Self, FetchError> {
        let client = StatisticsClient::new(&settings)?;
        Ok(Self::with_client(client, settings))
    }

    pub fn with_client(client: StatisticsClient, settings: LensSettings) -> Self {
        let permits = Arc::new(Semaphore::new(settings.max_concurrent_requests.max(1)));
        Self {
            client,
            settings,
            permits,
        }
    }

    /// Builds a resolver for new settings. Requests still in flight hold
    /// permits from this resolver's semaphore, so it is shared whenever the
    /// bound is unchanged.
    pub fn reconfigure(&self, settings: LensSettings) -> Result<Self, FetchError> {
        let client = StatisticsClient::new(&settings)?;
        if settings.max_concurrent_requests.max(1) != self.settings.max_concurrent_requests.max(1)
        {
            return Ok(Self::with_client(client, settings));
        }
        Ok(Self {
            client,
            settings,
            permits: self.permits.clone(),
        })
    }

    pub fn settings(&self) -> &LensSettings {
        &self.settings
    }

    async fn fetch(&self, qualified_name: &str) -> Result<Option<CallStatistics>, FetchError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| FetchError::ShuttingDown)?;
        let query = StatisticsQuery::new(qualified_name, &self.settings);
        self.client.fetch(&query).await
    }

    /// Fetches statistics for `site` and returns its label.
    ///
    /// Returns `None` if `cancel` fires first; the site is left untouched.
    pub async fn annotate(
        &self,
        site: &mut MethodSite,
        cancel: &CancellationToken,
    ) -> Option<String> {
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(site = %site.qualified_name, "annotation cancelled");
                return None;
            }
            outcome = self.fetch(&site.qualified_name) => outcome,
        };

        match &outcome {
            Ok(Some(statistics)) => site.record(statistics),
            Ok(None) => (),
            Err(e) => tracing::warn!(site = %site.qualified_name, "couldn't fetch statistics: {}", e),
        }
        Some(label_for(&outcome, &self.settings))
    }
}

#[cfg(test)]
mod tests {
    use rowan::TextRange;

    use super::*;

    fn statistics(count: u64) -> CallStatistics {
        CallStatistics {
            count,
            window_days: None,
            history: None,
        }
    }

    #[test]
    fn singular_and_plural_wording() {
        let settings = LensSettings::default();

        assert_eq!(count_label(&statistics(1), &settings), "1 call in the last 30 days");
        assert_eq!(count_label(&statistics(5), &settings), "5 calls in the last 30 days");
        assert_eq!(count_label(&statistics(0), &settings), "0 calls in the last 30 days");
    }

    #[test]
    fn window_from_response_wins_over_configured_days() {
        let settings = LensSettings::default();
        let mut stats = statistics(2);
        stats.window_days = Some(7);

        assert_eq!(count_label(&stats, &settings), "2 calls in the last 7 days");
    }

    #[test]
    fn sparkline_is_appended() {
        let settings = LensSettings::default();
        let mut stats = statistics(3);
        stats.history = Some(vec![0.0, 100.0]);

        assert_eq!(count_label(&stats, &settings), "3 calls in the last 30 days    ▁█");
    }

    #[test]
    fn no_data_and_errors_have_distinct_labels() {
        let settings = LensSettings::default();

        assert_eq!(label_for(&Ok(None), &settings), "Never called");
        assert_eq!(
            label_for(&Err(FetchError::NotConfigured), &settings),
            "Data server not available"
        );
        assert_eq!(
            label_for(&Err(FetchError::EmptyResponse), &settings),
            "There was no response from the server."
        );
        assert!(label_for(&Err(FetchError::ShuttingDown), &settings)
            .starts_with("The following error occurred: "));
    }

    #[tokio::test]
    async fn unconfigured_hostname_still_yields_a_label() {
        let resolver = AnnotationResolver::new(LensSettings::default()).unwrap();
        let mut site = MethodSite::new("Foo()".to_string(), TextRange::empty(0.into()));

        let label = resolver.annotate(&mut site, &CancellationToken::new()).await;

        assert_eq!(label.as_deref(), Some("Data server not available"));
        assert!(!site.is_annotated());
    }

    #[tokio::test]
    async fn reconfigured_resolver_counts_requests_in_flight() {
        let resolver = AnnotationResolver::new(LensSettings {
            max_concurrent_requests: 2,
            ..LensSettings::default()
        })
        .unwrap();
        let _in_flight = resolver.permits.acquire().await.unwrap();

        let same_bound = resolver
            .reconfigure(LensSettings {
                max_concurrent_requests: 2,
                number_of_days: 7,
                ..LensSettings::default()
            })
            .unwrap();
        let new_bound = resolver
            .reconfigure(LensSettings {
                max_concurrent_requests: 4,
                ..LensSettings::default()
            })
            .unwrap();

        assert_eq!(same_bound.settings().number_of_days, 7);
        assert_eq!(same_bound.permits.available_permits(), 1);
        assert_eq!(new_bound.permits.available_permits(), 4);
    }

    #[tokio::test]
    async fn cancelled_annotation_returns_nothing() {
        let resolver = AnnotationResolver::new(LensSettings::default()).unwrap();
        let mut site = MethodSite::new("Foo()".to_string(), TextRange::empty(0.into()));
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert_eq!(resolver.annotate(&mut site, &cancel).await, None);
    }
}
