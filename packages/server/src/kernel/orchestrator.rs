//! Per-job scrape pipeline.
//!
//! Runs sequentially inside one spawned task: niche expansion, output
//! preparation and dedup seeding, the optional map-listing stage, then the
//! site-targeted search stage. The search stage gets one irreversible
//! engine switch: when the primary goes unrecoverable the current unit is
//! retried on the fallback and every remaining unit uses it; if the
//! fallback also goes unrecoverable the job fails.
//!
//! Terminal events are not emitted here; the scheduler derives them from
//! the returned [`Outcome`] so a job transitions exactly once.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use extraction::{
    build_email_query, build_phone_query, expand_niches, extract_email, extract_phones,
};

use crate::kernel::engines::{EngineSet, StageResult};
use crate::kernel::jobs::{JobEvent, JobParams};
use crate::kernel::output::{JobOutput, Listing, OutputError, ALL_EMAILS_FILE, ALL_PHONES_FILE};
use crate::kernel::stage::{StageError, StageRunner};

const MAP_SITE_LABEL: &str = "google.com/maps";

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Output(#[from] OutputError),

    #[error("search stage unrecoverable: {0}")]
    SearchExhausted(String),
}

/// How the pipeline ended when it didn't error.
pub enum Outcome {
    Completed(Vec<String>),
    Stopped,
}

enum Flow {
    Continue,
    Cancelled,
}

#[derive(Clone, Copy)]
enum SearchPass {
    Email,
    Phone,
}

impl SearchPass {
    fn label(&self) -> &'static str {
        match self {
            SearchPass::Email => "Email",
            SearchPass::Phone => "Phone",
        }
    }
}

pub struct ScrapeOrchestrator {
    job_id: Uuid,
    params: JobParams,
    engines: EngineSet,
    events: mpsc::Sender<JobEvent>,
    cancel: CancellationToken,
    output_root: PathBuf,
    unit_timeout: Duration,
}

impl ScrapeOrchestrator {
    pub fn new(
        job_id: Uuid,
        params: JobParams,
        engines: EngineSet,
        events: mpsc::Sender<JobEvent>,
        cancel: CancellationToken,
        output_root: PathBuf,
        unit_timeout: Duration,
    ) -> Self {
        Self {
            job_id,
            params,
            engines,
            events,
            cancel,
            output_root,
            unit_timeout,
        }
    }

    pub async fn run(self) -> Result<Outcome, OrchestratorError> {
        let niches = expand_niches(&self.params.niches);
        let mut output = JobOutput::prepare(&self.output_root, &self.params.country).await?;

        self.emit(JobEvent::JobStart {
            message: format!(
                "Starting scrape job for {} ({} cities, {} niche variants)",
                self.params.country,
                self.params.cities.len(),
                niches.len()
            ),
        })
        .await;

        if niches.len() > self.params.niches.len() {
            self.emit(JobEvent::Log {
                message: format!(
                    "Expanded {} niches into {} search variants",
                    self.params.niches.len(),
                    niches.len()
                ),
            })
            .await;
        }

        if self.params.include_map_stage {
            if let Flow::Cancelled = self.map_stage(&mut output, &niches).await? {
                return Ok(Outcome::Stopped);
            }
        }

        if let Flow::Cancelled = self.search_stage(&mut output, &niches).await? {
            return Ok(Outcome::Stopped);
        }

        if self.cancel.is_cancelled() {
            return Ok(Outcome::Stopped);
        }
        let files = output.file_list().await?;
        Ok(Outcome::Completed(files))
    }

    /// Map-listing stage: one query per city × niche. Has no fallback
    /// engine; if the map engine goes unrecoverable the stage is abandoned
    /// and the job moves on to the search stage.
    async fn map_stage(
        &self,
        output: &mut JobOutput,
        niches: &[String],
    ) -> Result<Flow, OrchestratorError> {
        let mut runner = StageRunner::new(
            self.engines.map.clone(),
            self.unit_timeout,
            self.cancel.clone(),
        );
        self.emit(JobEvent::Log {
            message: "Starting map listing stage".to_string(),
        })
        .await;

        'stage: for city in &self.params.cities {
            for niche in niches {
                if self.cancel.is_cancelled() {
                    return Ok(Flow::Cancelled);
                }

                let query = format!("{niche} in {city}, {}", self.params.country);
                self.emit(JobEvent::SearchQuery {
                    query: query.clone(),
                    message: format!("[Maps] {query}"),
                })
                .await;

                let results = match runner.run(&query).await {
                    Ok(results) => results,
                    Err(StageError::Cancelled) => return Ok(Flow::Cancelled),
                    Err(StageError::Failed(reason)) => {
                        self.emit(JobEvent::Log {
                            message: format!("[Maps] Error: {reason}"),
                        })
                        .await;
                        continue;
                    }
                    Err(StageError::Unrecoverable(reason)) => {
                        tracing::warn!(job_id = %self.job_id, reason = %reason, "Map stage abandoned");
                        self.emit(JobEvent::Log {
                            message: format!("[Maps] Abandoning map stage: {reason}"),
                        })
                        .await;
                        break 'stage;
                    }
                };

                let new_rows = self
                    .process_listings(output, city, niche, &results)
                    .await?;

                if new_rows > 0 {
                    if let Some((csv_name, json_name, rows)) =
                        output.flush_city_listings(city).await?
                    {
                        self.emit(JobEvent::CsvSaved {
                            city: city.clone(),
                            file_name: csv_name,
                            json_file_name: json_name,
                            rows,
                            message: format!("[Maps] {rows} listings saved for {city}"),
                        })
                        .await;
                    }
                }
            }
            self.emit(JobEvent::CityUpdate {
                city: city.clone(),
                message: format!("[Maps] Finished {city}"),
            })
            .await;
        }

        Ok(Flow::Continue)
    }

    async fn process_listings(
        &self,
        output: &mut JobOutput,
        city: &str,
        niche: &str,
        results: &[StageResult],
    ) -> Result<usize, OrchestratorError> {
        let mut new_rows = 0;

        for result in results {
            if !output.is_new_listing(&result.title) {
                continue;
            }

            let text = format!("{} {}", result.title, result.detail);
            let email = extract_email(&text);
            let phone = extract_phones(&text, &self.params.country)
                .into_iter()
                .next();

            // Elevated tiers only keep fully-contactable listings.
            if self.params.tier.strict_listing_filter() && (email.is_none() || phone.is_none()) {
                continue;
            }

            let new_email = match &email {
                Some(email) => output.record_email(city, email).await?,
                None => false,
            };
            if let Some(phone) = &phone {
                if output.record_phone(phone).await? {
                    self.emit(JobEvent::PhoneSaved {
                        phone: phone.clone(),
                        city: city.to_string(),
                        niche: niche.to_string(),
                        site: MAP_SITE_LABEL.to_string(),
                        title: result.title.clone(),
                        phone_file_name: output.phone_file_name(),
                        all_phones_file_name: ALL_PHONES_FILE.to_string(),
                        message: format!("[Maps] Found: {phone}"),
                    })
                    .await;
                }
            }

            output.add_listing(Listing {
                name: result.title.clone(),
                niche: niche.to_string(),
                city: city.to_string(),
                link: result.link.clone(),
                phone,
                email: email.clone(),
            });
            new_rows += 1;

            if new_email {
                self.emit(JobEvent::LeadSaved {
                    title: result.title.clone(),
                    city: city.to_string(),
                    niche: niche.to_string(),
                    site: MAP_SITE_LABEL.to_string(),
                    file_name: output.email_file_name(city),
                    total_saved_for_file: output.city_listing_count(city),
                    email: email.clone(),
                    email_file_name: Some(output.email_file_name(city)),
                    all_emails_file_name: Some(ALL_EMAILS_FILE.to_string()),
                    message: format!("[Maps] Saved: {}", truncate(&result.title, 30)),
                })
                .await;
            }
        }

        Ok(new_rows)
    }

    /// Search stage: email and/or phone passes per city × niche × site.
    async fn search_stage(
        &self,
        output: &mut JobOutput,
        niches: &[String],
    ) -> Result<Flow, OrchestratorError> {
        let mut runner = StageRunner::new(
            self.engines.search_primary.clone(),
            self.unit_timeout,
            self.cancel.clone(),
        );
        let mut on_fallback = false;

        self.emit(JobEvent::Log {
            message: format!("Starting search stage on {}", runner.engine_name()),
        })
        .await;

        for city in &self.params.cities {
            for niche in niches {
                for site in &self.params.sites {
                    if self.cancel.is_cancelled() {
                        return Ok(Flow::Cancelled);
                    }

                    if self.params.scrape_mode.wants_emails() {
                        let query = build_email_query(niche, city, site);
                        if let Flow::Cancelled = self
                            .search_unit(
                                &mut runner,
                                &mut on_fallback,
                                &query,
                                SearchPass::Email,
                                output,
                                city,
                                niche,
                                site,
                            )
                            .await?
                        {
                            return Ok(Flow::Cancelled);
                        }
                    }

                    if self.params.scrape_mode.wants_phones() {
                        let query = build_phone_query(niche, city, site, &self.params.country);
                        if let Flow::Cancelled = self
                            .search_unit(
                                &mut runner,
                                &mut on_fallback,
                                &query,
                                SearchPass::Phone,
                                output,
                                city,
                                niche,
                                site,
                            )
                            .await?
                        {
                            return Ok(Flow::Cancelled);
                        }
                    }
                }
            }
            self.emit(JobEvent::CityUpdate {
                city: city.clone(),
                message: format!("Finished searches for {city}"),
            })
            .await;
        }

        Ok(Flow::Continue)
    }

    /// One query on the current engine, switching to the fallback (once)
    /// when the engine goes unrecoverable.
    #[allow(clippy::too_many_arguments)]
    async fn search_unit(
        &self,
        runner: &mut StageRunner,
        on_fallback: &mut bool,
        query: &str,
        pass: SearchPass,
        output: &mut JobOutput,
        city: &str,
        niche: &str,
        site: &str,
    ) -> Result<Flow, OrchestratorError> {
        let label = pass.label();
        self.emit(JobEvent::SearchQuery {
            query: query.to_string(),
            message: format!("[{}/{label}] {query}", runner.engine_name()),
        })
        .await;

        loop {
            match runner.run(query).await {
                Ok(results) => {
                    self.emit(JobEvent::Log {
                        message: format!("[{label}] Found {} for query.", results.len()),
                    })
                    .await;
                    match pass {
                        SearchPass::Email => {
                            self.process_email_results(output, city, niche, site, &results)
                                .await?
                        }
                        SearchPass::Phone => {
                            self.process_phone_results(output, city, niche, site, &results)
                                .await?
                        }
                    }
                    return Ok(Flow::Continue);
                }
                Err(StageError::Cancelled) => return Ok(Flow::Cancelled),
                Err(StageError::Failed(reason)) => {
                    self.emit(JobEvent::Log {
                        message: format!("[{label}] Error: {reason}"),
                    })
                    .await;
                    return Ok(Flow::Continue);
                }
                Err(StageError::Unrecoverable(reason)) => {
                    if *on_fallback {
                        return Err(OrchestratorError::SearchExhausted(reason));
                    }
                    *on_fallback = true;
                    let fallback = self.engines.search_fallback.clone();
                    tracing::warn!(
                        job_id = %self.job_id,
                        reason = %reason,
                        fallback = fallback.name(),
                        "Switching search stage to fallback engine"
                    );
                    self.emit(JobEvent::Log {
                        message: format!(
                            "Primary engine failed critically ({reason}); switching to {}",
                            fallback.name()
                        ),
                    })
                    .await;
                    *runner =
                        StageRunner::new(fallback, self.unit_timeout, self.cancel.clone());
                    // Retry the same query on the fallback.
                }
            }
        }
    }

    async fn process_email_results(
        &self,
        output: &mut JobOutput,
        city: &str,
        niche: &str,
        site: &str,
        results: &[StageResult],
    ) -> Result<(), OrchestratorError> {
        for result in results {
            let text = format!("{} {}", result.title, result.detail);
            let email = extract_email(&text);

            if let Some(email) = &email {
                output.record_email(city, email).await?;
            }
            let count = output
                .record_lead(city, niche, site, &result.title, &result.detail, &result.link)
                .await?;

            self.emit(JobEvent::LeadSaved {
                title: result.title.clone(),
                city: city.to_string(),
                niche: niche.to_string(),
                site: site.to_string(),
                file_name: output.leads_file_name(city),
                total_saved_for_file: count,
                email: email.clone(),
                email_file_name: email.as_ref().map(|_| output.email_file_name(city)),
                all_emails_file_name: email.as_ref().map(|_| ALL_EMAILS_FILE.to_string()),
                message: format!("[Email] Saved: {}", truncate(&result.title, 30)),
            })
            .await;
        }
        Ok(())
    }

    async fn process_phone_results(
        &self,
        output: &mut JobOutput,
        city: &str,
        niche: &str,
        site: &str,
        results: &[StageResult],
    ) -> Result<(), OrchestratorError> {
        for result in results {
            let text = format!("{} {}", result.title, result.detail);
            for phone in extract_phones(&text, &self.params.country) {
                if output.record_phone(&phone).await? {
                    self.emit(JobEvent::PhoneSaved {
                        phone: phone.clone(),
                        city: city.to_string(),
                        niche: niche.to_string(),
                        site: site.to_string(),
                        title: result.title.clone(),
                        phone_file_name: output.phone_file_name(),
                        all_phones_file_name: ALL_PHONES_FILE.to_string(),
                        message: format!("[Phone] Found: {phone}"),
                    })
                    .await;
                }
            }
        }
        Ok(())
    }

    async fn emit(&self, event: JobEvent) {
        if self.events.send(event).await.is_err() {
            tracing::debug!(job_id = %self.job_id, "Event channel closed, dropping event");
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max).collect();
        format!("{cut}...")
    }
}
