//! Rendering of route answers for the terminal.

use std::fmt::Write as _;

use clap::ValueEnum;
use serde::Serialize;
use wayfinder_lib::{ClosestSystemResult, ConnectionKind, RouteResult, SystemId, Universe};

/// Output format for route answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// One system per line with the connection used to enter it.
    #[default]
    Text,
    /// A single JSON document.
    Json,
}

/// Route with system names attached, as emitted in JSON output.
#[derive(Debug, Clone, Serialize)]
pub struct RouteView {
    pub source: SystemView,
    pub target: SystemView,
    pub jumps: usize,
    pub cost: f64,
    pub steps: Vec<StepView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemView {
    pub id: SystemId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepView {
    pub id: SystemId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub via: Option<ConnectionKind>,
}

fn system_view(universe: &Universe, id: SystemId) -> SystemView {
    SystemView {
        id,
        name: display_name(universe, id),
    }
}

fn display_name(universe: &Universe, id: SystemId) -> String {
    universe.system_name(id).unwrap_or("<unknown>").to_string()
}

impl RouteView {
    pub fn new(universe: &Universe, route: &RouteResult) -> Self {
        let steps: Vec<StepView> = route
            .steps
            .iter()
            .map(|step| StepView {
                id: step.solarsystem_id,
                name: display_name(universe, step.solarsystem_id),
                via: step.via,
            })
            .collect();
        let endpoint = |id: Option<SystemId>| {
            id.map(|id| system_view(universe, id))
                .unwrap_or_else(|| SystemView {
                    id: 0,
                    name: "<unknown>".to_string(),
                })
        };

        Self {
            source: endpoint(route.source()),
            target: endpoint(route.target()),
            jumps: route.jumps,
            cost: route.cost,
            steps,
        }
    }
}

/// Render a route in the requested format.
pub fn render_route(
    universe: &Universe,
    route: &RouteResult,
    format: OutputFormat,
) -> anyhow::Result<String> {
    let view = RouteView::new(universe, route);
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&view)?),
        OutputFormat::Text => Ok(route_text(&view)),
    }
}

/// Render a closest-system answer in the requested format.
pub fn render_closest(
    universe: &Universe,
    closest: &ClosestSystemResult,
    format: OutputFormat,
) -> anyhow::Result<String> {
    let view = RouteView::new(universe, &closest.route);
    match format {
        OutputFormat::Json => {
            #[derive(Serialize)]
            struct ClosestView<'a> {
                closest: SystemView,
                route: &'a RouteView,
            }
            let closest = ClosestView {
                closest: system_view(universe, closest.target),
                route: &view,
            };
            Ok(serde_json::to_string_pretty(&closest)?)
        }
        OutputFormat::Text => {
            let mut out = format!(
                "Closest system: {} ({})\n",
                display_name(universe, closest.target),
                closest.target
            );
            out.push_str(&route_text(&view));
            Ok(out)
        }
    }
}

fn route_text(view: &RouteView) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Route from {} to {} ({} jump{}, cost {:.2}):",
        view.source.name,
        view.target.name,
        view.jumps,
        if view.jumps == 1 { "" } else { "s" },
        view.cost
    );
    for step in &view.steps {
        match step.via {
            None => {
                let _ = writeln!(out, "  {} ({})", step.name, step.id);
            }
            Some(kind) => {
                let _ = writeln!(out, "  -> {} ({}) via {}", step.name, step.id, kind);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use wayfinder_lib::{RouteStep, SolarSystem};

    fn sample() -> (Universe, RouteResult) {
        let universe = Universe::from_parts(
            [
                SolarSystem::new(1, "Jita", Some(0.95)),
                SolarSystem::new(2, "Perimeter", Some(0.95)),
                SolarSystem::new(3, "J123456", Some(-1.0)),
            ],
            [(1, 2)],
        );
        let route = RouteResult {
            steps: vec![
                RouteStep {
                    solarsystem_id: 1,
                    via: None,
                },
                RouteStep {
                    solarsystem_id: 2,
                    via: Some(ConnectionKind::Stargate),
                },
                RouteStep {
                    solarsystem_id: 3,
                    via: Some(ConnectionKind::Wormhole),
                },
            ],
            jumps: 2,
            cost: 2.0,
        };
        (universe, route)
    }

    #[test]
    fn text_lists_each_hop() {
        let (universe, route) = sample();
        let text = render_route(&universe, &route, OutputFormat::Text).unwrap();

        assert!(text.starts_with("Route from Jita to J123456 (2 jumps, cost 2.00):"));
        assert!(text.contains("  Jita (1)\n"));
        assert!(text.contains("  -> Perimeter (2) via stargate\n"));
        assert!(text.contains("  -> J123456 (3) via wormhole\n"));
    }

    #[test]
    fn json_carries_names_and_kinds() {
        let (universe, route) = sample();
        let json = render_route(&universe, &route, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["jumps"], 2);
        assert_eq!(value["source"]["name"], "Jita");
        assert_eq!(value["steps"][2]["via"], "wormhole");
        assert!(value["steps"][0].get("via").is_none());
    }

    #[test]
    fn closest_text_names_the_winner() {
        let (universe, route) = sample();
        let closest = ClosestSystemResult { target: 3, route };
        let text = render_closest(&universe, &closest, OutputFormat::Text).unwrap();
        assert!(text.starts_with("Closest system: J123456 (3)\n"));
    }
}
