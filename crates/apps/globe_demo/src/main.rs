use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use catalog::{CityDirectory, CityId};
use clap::Parser;
use formats::{Geometry, build_feature_collection};
use foundation::time::Millis;
use layers::{CIRCLE_LAYER_ID, LayerDirectory, LayerKind};
use orchestrator::{
    ClickedFeature, EngineConfig, HeadlessFactory, HeadlessProbe, MapEngine, SurfaceEvent,
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const BUNDLED_CITIES: &str = include_str!("../data/cities.json");

/// Realtime mode advances the virtual clock in steps of this size.
const REALTIME_QUANTUM_MS: u64 = 10;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Replays a scripted globe session against a headless map surface"
)]
struct Args {
    /// City directory JSON (bundled Indian cities if omitted)
    #[arg(long)]
    cities: Option<PathBuf>,

    /// Layer directory JSON (built-in ramps if omitted)
    #[arg(long)]
    layers: Option<PathBuf>,

    /// Engine config JSON; absent fields keep their defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// When the surface finishes loading; it never does if omitted
    #[arg(long)]
    load_after_ms: Option<u64>,

    /// Select a city: `<city-id>@<ms>` (repeatable)
    #[arg(long = "select")]
    selects: Vec<At<String>>,

    /// Toggle a data layer: `<air|water|land|all>@<ms>` (repeatable)
    #[arg(long = "toggle")]
    toggles: Vec<At<String>>,

    /// Click the n-th zone marker of the focused city: `<index>@<ms>` (repeatable)
    #[arg(long = "click")]
    clicks: Vec<At<usize>>,

    /// Total session length
    #[arg(long, default_value_t = 6_000)]
    run_ms: u64,

    /// Pace the virtual clock against the wall clock
    #[arg(long)]
    realtime: bool,
}

/// A value scheduled at a point of the session, parsed from `value@ms`.
#[derive(Debug, Clone, PartialEq)]
struct At<T> {
    value: T,
    at: u64,
}

impl<T: FromStr> FromStr for At<T> {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (value, at) = s
            .rsplit_once('@')
            .ok_or_else(|| format!("expected <value>@<ms>, got {s:?}"))?;
        let value = value
            .parse()
            .map_err(|_| format!("invalid value {value:?} in {s:?}"))?;
        let at = at
            .parse()
            .map_err(|_| format!("invalid time {at:?} in {s:?}"))?;
        Ok(Self { value, at })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Action {
    Load,
    Select(CityId),
    Toggle(LayerKind),
    Click(usize),
}

/// Merges the scripted inputs into one list ordered by time. Inputs at the
/// same instant keep flag order: load, selects, toggles, clicks.
fn timeline(args: &Args) -> Result<Vec<(u64, Action)>, String> {
    let mut steps = Vec::new();
    if let Some(at) = args.load_after_ms {
        steps.push((at, Action::Load));
    }
    for s in &args.selects {
        steps.push((s.at, Action::Select(CityId::new(s.value.as_str()))));
    }
    for t in &args.toggles {
        let kind = LayerKind::parse(&t.value).ok_or_else(|| format!("unknown layer {:?}", t.value))?;
        steps.push((t.at, Action::Toggle(kind)));
    }
    for c in &args.clicks {
        steps.push((c.at, Action::Click(c.value)));
    }
    steps.sort_by_key(|(at, _)| *at);
    Ok(steps)
}

fn read(path: &Path) -> Result<String, String> {
    fs::read_to_string(path).map_err(|e| format!("read {path:?}: {e}"))
}

fn load_inputs(args: &Args) -> Result<(EngineConfig, CityDirectory, LayerDirectory), String> {
    let config = match &args.config {
        Some(path) => EngineConfig::from_json(&read(path)?).map_err(|e| format!("{path:?}: {e}"))?,
        None => {
            let mut config = EngineConfig::default();
            config.surface.initial_city = Some(CityId::new("mumbai"));
            config
        }
    };
    let cities = match &args.cities {
        Some(path) => read(path)?,
        None => BUNDLED_CITIES.to_string(),
    };
    let cities = CityDirectory::from_json(&cities).map_err(|e| e.to_string())?;
    let layers = match &args.layers {
        Some(path) => LayerDirectory::from_json(&read(path)?).map_err(|e| format!("{path:?}: {e}"))?,
        None => LayerDirectory::builtin(),
    };
    Ok((config, cities, layers))
}

/// Zone marker features as the rendering engine would report them under the
/// pointer, for whichever city the session is looking at.
fn zone_under_pointer(engine: &MapEngine<HeadlessFactory>, index: usize) -> Option<ClickedFeature> {
    let focus = engine.focus();
    let id = focus
        .target()
        .or(focus.pending_city())
        .cloned()
        .or_else(|| engine.config().surface.initial_city.clone())?;
    let city = engine.cities().get(&id)?;
    let feature = build_feature_collection(city).features.into_iter().nth(index)?;
    let Geometry::Point { coordinates } = feature.geometry;
    let properties = serde_json::to_value(&feature.properties).ok()?;
    Some(ClickedFeature {
        coordinates,
        properties,
    })
}

async fn advance_clock(engine: &mut MapEngine<HeadlessFactory>, until: u64, realtime: bool) {
    let until = Millis(until);
    if !realtime {
        engine.advance_to(until);
        return;
    }
    let mut interval = tokio::time::interval(Duration::from_millis(REALTIME_QUANTUM_MS));
    while engine.now() < until {
        interval.tick().await;
        let step = until.saturating_since(engine.now()).min(REALTIME_QUANTUM_MS);
        engine.advance(step);
    }
}

fn apply(engine: &mut MapEngine<HeadlessFactory>, probe: &HeadlessProbe, action: Action) {
    match action {
        Action::Load => {
            probe.set_ready(true);
            engine.handle_event(SurfaceEvent::Loaded);
        }
        Action::Select(id) => match engine.select_city(&id) {
            Ok(outcome) => info!(?outcome, "city selected"),
            Err(e) => warn!(error = %e, "city selection rejected"),
        },
        Action::Toggle(kind) => match engine.toggle_layer(kind) {
            Some(outcome) => info!(layer = %kind, ?outcome, "layer toggled"),
            None => info!(layer = %kind, "toggle refused, last active layer"),
        },
        Action::Click(index) => match zone_under_pointer(engine, index) {
            Some(feature) => {
                engine.handle_event(SurfaceEvent::Click {
                    layer_id: CIRCLE_LAYER_ID.to_string(),
                    features: vec![feature],
                });
            }
            None => warn!(index, "no zone marker at that index"),
        },
    }
}

async fn run(args: Args) -> Result<(), String> {
    let steps = timeline(&args)?;
    let (config, cities, layers) = load_inputs(&args)?;
    info!(cities = cities.len(), steps = steps.len(), "starting session");

    let probe = HeadlessProbe::new();
    let mut engine = MapEngine::new(config, HeadlessFactory::new(probe.clone()), cities, layers);
    engine.on_zone_selected(|zone| {
        info!(
            zone = %zone.name,
            severity = zone.severity,
            class = zone.severity_class().label(),
            "zone selected"
        )
    });
    engine.mount().map_err(|e| e.to_string())?;

    for (at, action) in steps.into_iter().filter(|(at, _)| *at <= args.run_ms) {
        advance_clock(&mut engine, at, args.realtime).await;
        debug!(at, ?action, "scripted input");
        apply(&mut engine, &probe, action);
    }
    advance_clock(&mut engine, args.run_ms, args.realtime).await;
    engine.teardown();

    for event in engine.trace().events() {
        debug!(at = %event.at, kind = event.kind, message = %event.message, "trace");
    }
    for call in probe.calls() {
        let line = serde_json::to_string(&call).map_err(|e| format!("encode call: {e}"))?;
        println!("{line}");
    }
    let focused = engine
        .trace()
        .last("focus.applied")
        .map(|e| e.message.clone())
        .unwrap_or_else(|| "none".to_string());
    info!(
        calls = probe.calls().len(),
        events = engine.trace().events().len(),
        %focused,
        "session finished"
    );
    Ok(())
}

fn real_main() -> Result<(), String> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .map_err(|e| format!("start runtime: {e}"))?;
    runtime.block_on(run(args))
}

fn main() {
    if let Err(e) = real_main() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["globe-demo"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn parses_scheduled_values() {
        assert_eq!(
            "mumbai@1200".parse::<At<String>>(),
            Ok(At {
                value: "mumbai".to_string(),
                at: 1200
            })
        );
        assert!("mumbai".parse::<At<String>>().is_err());
        assert!("x@200".parse::<At<usize>>().is_err());
    }

    #[test]
    fn timeline_is_time_ordered() {
        let a = args(&[
            "--load-after-ms",
            "900",
            "--select",
            "delhi@400",
            "--select",
            "mumbai@0",
            "--toggle",
            "water@900",
            "--click",
            "1@2500",
        ]);
        assert_eq!(
            timeline(&a).unwrap(),
            vec![
                (0, Action::Select(CityId::new("mumbai"))),
                (400, Action::Select(CityId::new("delhi"))),
                (900, Action::Load),
                (900, Action::Toggle(LayerKind::Water)),
                (2500, Action::Click(1)),
            ]
        );
    }

    #[test]
    fn rejects_unknown_layer() {
        assert!(timeline(&args(&["--toggle", "noise@10"])).is_err());
    }

    #[test]
    fn bundled_cities_are_valid() {
        let dir = CityDirectory::from_json(BUNDLED_CITIES).unwrap();
        assert!(dir.get(&CityId::new("mumbai")).is_some());
        assert!(dir.iter().all(|c| !c.zones.is_empty()));
    }

    #[test]
    fn scripted_session_focuses_last_selection() {
        let a = args(&["--load-after-ms", "700", "--select", "mumbai@0", "--select", "delhi@300"]);
        let (config, cities, layers) = load_inputs(&a).unwrap();
        let probe = HeadlessProbe::new();
        let mut engine = MapEngine::new(config, HeadlessFactory::new(probe.clone()), cities, layers);
        engine.mount().unwrap();

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        rt.block_on(async {
            for (at, action) in timeline(&a).unwrap() {
                advance_clock(&mut engine, at, false).await;
                apply(&mut engine, &probe, action);
            }
            advance_clock(&mut engine, 5_000, false).await;
        });

        let flights = probe.calls_named("fly_to");
        assert_eq!(flights.len(), 1);
        let json = serde_json::to_value(&flights[0]).unwrap();
        assert_eq!(json["call"], "fly_to");
        assert_eq!(json["center"], serde_json::json!([77.209, 28.6139]));
        assert_eq!(engine.trace().count("focus.superseded"), 1);
    }
}
