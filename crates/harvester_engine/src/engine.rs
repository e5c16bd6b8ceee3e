use std::collections::{BTreeMap, VecDeque};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use engine_logging::{engine_debug, engine_info, engine_warn};
use harvester_core::{
    update, AssetClassifier, Effect, HarvestLimits, HarvestState, Msg, Ordinal,
    PageOrdinalResolver, Resolution, SourcePolicy, TerminationReason, WrittenPage,
};
use sha2::{Digest, Sha256};

use crate::collect::PassCollector;
use crate::intercept::ResponseInterceptor;
use crate::manifest::write_manifest;
use crate::navigate::NavigationDriver;
use crate::persist::{ensure_output_dir, AssetWriter};
use crate::session::{SessionLauncher, ViewerPage, ViewerSession};
use crate::{
    CapturedAsset, HarvestError, HarvestReport, HarvestRequest, HarvestSettings, ResolvedAsset,
    RetrievalStrategy, SavedPage,
};

/// Drives one browser session through a paginated viewer and saves every
/// page asset it observes.
pub struct Harvester<L> {
    launcher: L,
    settings: HarvestSettings,
}

impl<L: SessionLauncher> Harvester<L> {
    pub fn new(launcher: L, settings: HarvestSettings) -> Self {
        Self { launcher, settings }
    }

    /// Harvest `request.target_url` into `request.output_dir`.
    ///
    /// Only invalid settings, launch failures, an unusable output directory
    /// and a target that never loads are errors. A harvest that saves nothing
    /// still succeeds with an empty report.
    pub async fn run(&self, request: &HarvestRequest) -> Result<HarvestReport, HarvestError> {
        self.settings.validate()?;
        let policy = SourcePolicy::for_url(&request.target_url)?;
        ensure_output_dir(&request.output_dir)?;
        engine_info!(
            "Harvesting {} ({:?}, vector_only={}, strategy={}) into {}",
            request.target_url,
            policy.kind,
            policy.vector_only,
            self.settings.strategy,
            request.output_dir.display()
        );

        let mut session = self.launcher.acquire(&self.settings).await?;
        let mut run = RetrievalRun::new(request, policy, &self.settings);

        let outcome = match self.settings.deadline() {
            Some(limit) => {
                let timed = tokio::time::timeout(limit, run.drive(session.as_mut())).await;
                match timed {
                    Ok(result) => result,
                    Err(_) => {
                        engine_warn!("Deadline of {:?} elapsed; stopping harvest", limit);
                        run.apply(Msg::DeadlineElapsed);
                        Ok(TerminationReason::DeadlineElapsed)
                    }
                }
            }
            None => run.drive(session.as_mut()).await,
        };
        session.release().await;

        let termination = outcome?;
        Ok(run.finish(termination))
    }
}

/// Everything owned by a single harvest. Never shared between harvests.
struct RetrievalRun<'a> {
    target_url: &'a str,
    output_dir: PathBuf,
    settings: &'a HarvestSettings,
    /// Gate applied to captured bytes. Screenshots are raster by nature, so
    /// that strategy never applies the vector-only rule.
    capture_policy: SourcePolicy,
    state: HarvestState,
    classifier: AssetClassifier,
    resolver: PageOrdinalResolver,
    writer: AssetWriter,
    navigator: NavigationDriver,
    pages: BTreeMap<Ordinal, SavedPage>,
}

impl<'a> RetrievalRun<'a> {
    fn new(request: &'a HarvestRequest, policy: SourcePolicy, settings: &'a HarvestSettings) -> Self {
        let limits = HarvestLimits {
            max_pages: request.max_pages,
            empty_run_threshold: settings.empty_run_threshold,
        };
        let capture_policy = match settings.strategy {
            RetrievalStrategy::Screenshot => SourcePolicy {
                vector_only: false,
                ..policy
            },
            RetrievalStrategy::Intercept | RetrievalStrategy::Download => policy,
        };
        Self {
            target_url: &request.target_url,
            output_dir: request.output_dir.clone(),
            settings,
            capture_policy,
            state: HarvestState::new(limits),
            classifier: AssetClassifier::new(settings.min_asset_bytes),
            resolver: PageOrdinalResolver::new(),
            writer: AssetWriter::new(request.output_dir.clone()),
            navigator: NavigationDriver::new(&policy, settings.post_action_delay()),
            pages: BTreeMap::new(),
        }
    }

    fn apply(&mut self, msg: Msg) -> Vec<Effect> {
        let (next, effects) = update(std::mem::take(&mut self.state), msg);
        self.state = next;
        effects
    }

    async fn drive(
        &mut self,
        session: &mut dyn ViewerSession,
    ) -> Result<TerminationReason, HarvestError> {
        let mut collector = match self.settings.strategy {
            RetrievalStrategy::Intercept => {
                let source = session.responses().await.map_err(|err| {
                    HarvestError::LaunchFailure(format!(
                        "could not observe network responses: {err}"
                    ))
                })?;
                PassCollector::Intercept(ResponseInterceptor::attach(
                    source,
                    self.settings.capture_queue_capacity,
                ))
            }
            RetrievalStrategy::Screenshot => PassCollector::screenshot(),
            RetrievalStrategy::Download => PassCollector::download(),
        };

        self.open_target(session.page()).await?;
        tokio::time::sleep(self.settings.initial_settle()).await;

        let mut effects: VecDeque<Effect> = self.apply(Msg::Started).into();
        while let Some(effect) = effects.pop_front() {
            let follow_up = match effect {
                Effect::SettleAndDrain => {
                    self.settle_and_drain(&mut collector, session.page()).await
                }
                Effect::AdvanceNavigation => {
                    let advanced = self.navigator.advance(session.page()).await;
                    self.apply(Msg::NavigationFinished { advanced })
                }
                Effect::Release { reason } => {
                    engine_info!(
                        "Harvest of {} finished: {} ({} pages in {} passes)",
                        self.target_url,
                        reason,
                        self.pages.len(),
                        self.state.passes()
                    );
                    return Ok(reason);
                }
            };
            effects.extend(follow_up);
        }
        // `update` always ends a live harvest with a Release effect.
        Ok(TerminationReason::NavigationDeadEnd)
    }

    async fn open_target(&self, page: &dyn ViewerPage) -> Result<(), HarvestError> {
        let attempts = self.settings.initial_navigation_retries + 1;
        let mut last_error = None;
        for attempt in 1..=attempts {
            match page.goto(self.target_url).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    engine_warn!(
                        "Loading {} failed (attempt {}/{}): {}",
                        self.target_url,
                        attempt,
                        attempts,
                        err
                    );
                    last_error = Some(err);
                    if attempt < attempts {
                        tokio::time::sleep(self.settings.post_action_delay()).await;
                    }
                }
            }
        }
        Err(HarvestError::InitialNavigation {
            url: self.target_url.to_string(),
            message: last_error.map(|e| e.to_string()).unwrap_or_default(),
        })
    }

    async fn settle_and_drain(
        &mut self,
        collector: &mut PassCollector,
        page: &dyn ViewerPage,
    ) -> Vec<Effect> {
        tokio::time::sleep(self.settings.settle_delay()).await;
        let batch = collector.collect(page).await;
        let drained = batch.len();
        let written = self.process_batch(batch, collector.is_positional());
        let written_count = written.len();
        let effects = self.apply(Msg::PassCompleted { written });
        let view = self.state.view();
        engine_info!(
            "Pass {}: drained {}, wrote {}, {} pages total, empty run {}",
            view.passes,
            drained,
            written_count,
            view.pages_saved,
            view.consecutive_empty
        );
        effects
    }

    /// Resolve, classify and write each captured asset in arrival order.
    ///
    /// Positional assets take the running counter. The others are resolved
    /// from their origin; unresolved intercepted responses share the counter,
    /// while unresolved downloads each take the next free position.
    fn process_batch(&mut self, batch: Vec<CapturedAsset>, positional: bool) -> Vec<WrittenPage> {
        let sequential_fallback = self.settings.strategy == RetrievalStrategy::Download;
        let mut next_fallback = self.state.ordinal_counter();
        let mut written: Vec<WrittenPage> = Vec::new();
        for CapturedAsset { origin, bytes } in batch {
            let ordinal = if positional {
                self.state.ordinal_counter()
            } else {
                let resolution = self.resolver.resolve(&origin, next_fallback);
                match resolution {
                    Resolution::Matched { ordinal, rule } => {
                        engine_debug!("Page {} from {} ({})", ordinal, origin, rule);
                    }
                    Resolution::Fallback { .. } if sequential_fallback => next_fallback += 1,
                    Resolution::Fallback { .. } => {}
                }
                resolution.ordinal()
            };
            let format = match self.classifier.classify(&bytes, &self.capture_policy) {
                Ok(format) => format,
                Err(rejection) => {
                    engine_debug!(
                        "Rejected {} (page {}): {} [{}]",
                        origin,
                        ordinal,
                        rejection,
                        rejection.reason()
                    );
                    continue;
                }
            };
            if !self.state.has_capacity_for(ordinal, &written) {
                engine_debug!("Skipping page {} from {}: page cap reached", ordinal, origin);
                continue;
            }

            let asset = ResolvedAsset {
                ordinal,
                bytes,
                format,
            };
            let Some(path) = self.writer.write(&asset) else {
                continue;
            };
            self.forget_superseded_file(ordinal, &path);
            self.pages.insert(
                ordinal,
                SavedPage {
                    ordinal,
                    path: path.clone(),
                    format,
                    byte_len: asset.bytes.len() as u64,
                    sha256: sha256_hex(&asset.bytes),
                    origin,
                },
            );
            written.push(WrittenPage { ordinal, path });
        }
        written
    }

    /// A recapture with a different format leaves a file under another
    /// extension; only the latest capture of an ordinal stays on disk.
    fn forget_superseded_file(&self, ordinal: Ordinal, path: &Path) {
        let Some(previous) = self.pages.get(&ordinal) else {
            return;
        };
        if previous.path.as_path() != path {
            if let Err(err) = fs::remove_file(&previous.path) {
                engine_warn!(
                    "Could not remove superseded {}: {}",
                    previous.path.display(),
                    err
                );
            }
        }
    }

    fn finish(self, termination: TerminationReason) -> HarvestReport {
        let pages: Vec<SavedPage> = self.pages.into_values().collect();
        let passes = self.state.passes();
        let manifest_path = match write_manifest(
            &self.output_dir,
            self.target_url,
            termination,
            passes,
            &pages,
        ) {
            Ok(path) => Some(path),
            Err(err) => {
                engine_warn!("Failed to write harvest manifest: {}", err);
                None
            }
        };
        HarvestReport {
            target_url: self.target_url.to_string(),
            paths: pages.iter().map(|page| page.path.clone()).collect(),
            pages,
            termination,
            passes,
            manifest_path,
        }
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest.iter() {
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}
