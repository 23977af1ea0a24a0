//! CLI command implementations

use crate::output::{self, OutputFormat};
use anyhow::{anyhow, bail, Context};
use campuscast_core::sim::{
    RecordingObserver, ScriptedEngineFactory, SimulatedFullscreen, SimulatedMedia,
};
use campuscast_core::source::wait_until_ready;
use campuscast_core::{
    HlsPlayer, HttpSourceResolver, MediaElement, PlaybackMode, PlaybackSource, PlayerOptions,
    QualityLevel, QualityMenu, QualityPreference, QualityState, RawEngineEvent, SourceResolver,
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Simulated lecture length
const SIMULATED_DURATION_SEC: f64 = 3600.0;
/// Bandwidth estimate reported by the simulated engine
const SIMULATED_BANDWIDTH_BPS: u64 = 4_500_000;

/// Read player options from a JSON file, or use the defaults
pub fn load_options(path: Option<&Path>) -> anyhow::Result<PlayerOptions> {
    let Some(path) = path else {
        return Ok(PlayerOptions::default());
    };
    let json =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let options =
        PlayerOptions::from_json(&json).with_context(|| format!("parsing {}", path.display()))?;
    Ok(options)
}

/// `1080,720,480` into heights
pub fn parse_heights(list: &str) -> anyhow::Result<Vec<u32>> {
    let heights = list
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<u32>().with_context(|| format!("invalid height '{}'", s)))
        .collect::<anyhow::Result<Vec<_>>>()?;
    if heights.is_empty() {
        bail!("at least one level height is required");
    }
    Ok(heights)
}

/// `auto`, `#2` (level index) or `720` (height)
pub fn parse_preference(value: &str) -> anyhow::Result<QualityPreference> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("auto") {
        return Ok(QualityPreference::Auto);
    }
    if let Some(index) = value.strip_prefix('#') {
        let index = index.parse().with_context(|| format!("invalid level index '{}'", value))?;
        return Ok(QualityPreference::LevelIndex(index));
    }
    let height = value
        .trim_end_matches('p')
        .parse()
        .with_context(|| format!("invalid quality '{}'", value))?;
    Ok(QualityPreference::Height(height))
}

/// Arguments of `campuscast resolve`
pub struct ResolveRequest {
    pub content_id: String,
    pub api_base: String,
    pub wait: bool,
    pub interval: Duration,
    pub retries: u32,
}

impl ResolveRequest {
    fn resolver(&self) -> anyhow::Result<HttpSourceResolver> {
        Ok(HttpSourceResolver::new(&self.api_base)?.with_retries(self.retries))
    }
}

/// Resolve a content id
pub async fn resolve(request: ResolveRequest, format: &str) -> anyhow::Result<()> {
    let resolver = request.resolver()?;

    let resolved = if request.wait {
        wait_until_ready(&resolver, &request.content_id, request.interval).await?
    } else {
        resolver.resolve(&request.content_id).await?
    };

    match OutputFormat::from(format) {
        OutputFormat::Json => println!("{}", output::format_output(&resolved, "json")),
        OutputFormat::Text => {
            println!("Content: {}", resolved.content_id);
            println!("  Status: {}", resolved.status);
            if let Some(detail) = &resolved.status_detail {
                println!("  Detail: {}", detail);
            }
            println!("  Ready: {}", resolved.ready);
            println!("  Manifest: {}", resolved.uri.as_deref().unwrap_or("-"));
            println!("  Poster: {}", resolved.poster_uri.as_deref().unwrap_or("-"));
        }
    }

    // Surface the same error the player would see
    resolved.playback_source()?;
    Ok(())
}

/// Inputs of a simulated playback session
pub struct Scenario {
    pub heights: Vec<u32>,
    pub buffer_sec: f64,
    pub position_sec: f64,
    pub preference: QualityPreference,
    pub native: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulationReport {
    mode: PlaybackMode,
    outcome: String,
    state: QualityState,
    actual_level: Option<usize>,
    levels: Vec<QualityLevel>,
    menu: QualityMenu,
    level_commits: usize,
    play_calls: usize,
    playing: bool,
    errors: usize,
}

/// Load a simulated source, apply the quality selection and report what the
/// controller did
pub async fn simulate(
    scenario: Scenario,
    options: PlayerOptions,
    format: &str,
) -> anyhow::Result<()> {
    let factory = Arc::new(
        ScriptedEngineFactory::with_heights(&scenario.heights)
            .with_bandwidth(SIMULATED_BANDWIDTH_BPS),
    );
    let media = Arc::new(SimulatedMedia::new().with_native_hls(scenario.native));
    let observer = Arc::new(RecordingObserver::new());
    let player = HlsPlayer::new(
        media.clone(),
        factory.clone(),
        Arc::new(SimulatedFullscreen::new()),
        options,
    )
    .with_observer(observer.clone());

    let mode = player
        .load(PlaybackSource::new("https://media.campuscast.local/sim/master.m3u8"))
        .await?;

    let engine = factory.last();
    if let Some(engine) = &engine {
        player.handle_engine_event(engine.manifest_parsed()).await;
    }

    media.set_duration(SIMULATED_DURATION_SEC);
    media.set_position(scenario.position_sec);
    media.set_buffered_end(Some(scenario.position_sec + scenario.buffer_sec));
    media.set_playing(true);
    media.clear_calls();

    let outcome = player.set_quality(scenario.preference).await?;

    if let Some(engine) = &engine {
        // Until pinned, the engine's ABR starts on its first level
        let level = engine.current_level().unwrap_or(0);
        player.handle_engine_event(RawEngineEvent::LevelSwitched { level }).await;
    } else if mode == PlaybackMode::Engine {
        return Err(anyhow!("engine mode without an engine instance"));
    }

    let view = player.view().await;
    let report = SimulationReport {
        mode,
        outcome: format!("{:?}", outcome),
        state: player.quality_state().await,
        actual_level: player.actual_level().await,
        levels: player.levels().await,
        menu: view.quality_menu.clone(),
        level_commits: engine.as_ref().map(|e| e.commit_count()).unwrap_or(0),
        play_calls: media.play_calls(),
        playing: !media.is_paused(),
        errors: observer.errors().len(),
    };
    player.destroy().await;

    match OutputFormat::from(format) {
        OutputFormat::Json => println!("{}", output::format_output(&report, "json")),
        OutputFormat::Text => {
            println!("Mode: {:?}", report.mode);
            println!("Outcome: {}", report.outcome);
            println!("Quality: {}", report.state);
            match &report.menu {
                QualityMenu::Levels(entries) => {
                    if let Some(auto) = entries.first() {
                        println!("Menu: {}{}", auto.label, if auto.selected { " *" } else { "" });
                    }
                    println!("{}", output::levels_table(&report.levels, entries));
                }
                other => println!("Menu: {}", other.placeholder().unwrap_or("-")),
            }
            println!("Level commits: {}", report.level_commits);
            println!("Resume play calls: {}", report.play_calls);
            println!("Playing: {}", report.playing);
        }
    }

    Ok(())
}
