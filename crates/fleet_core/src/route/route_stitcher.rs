use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::{
    engine::{EngineError, SimulationEngine},
    route::route::Route,
    vehicle::{EdgeId, LocationId, RouteId, VehicleClass},
};

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("A route needs at least two waypoints, got {0}")]
    TooFewWaypoints(usize),

    #[error("No path between {0} and {1}")]
    NoPath(LocationId, LocationId),

    #[error("Path query {from} -> {to} failed: {source}")]
    Query {
        from: LocationId,
        to: LocationId,
        #[source]
        source: EngineError,
    },

    #[error("Route {route_id} was rejected by the engine: {source}")]
    Registration {
        route_id: RouteId,
        #[source]
        source: EngineError,
    },
}

impl RouteError {
    pub fn is_fatal(&self) -> bool {
        match self {
            RouteError::Query { source, .. } | RouteError::Registration { source, .. } => {
                source.is_fatal()
            }
            _ => false,
        }
    }
}

/// Appends `segment` to `path`, skipping the first edge of the segment when it
/// is the junction edge already ending `path`.
fn append_segment(path: &mut Vec<EdgeId>, segment: Vec<EdgeId>) {
    let skip = match (path.last(), segment.first()) {
        (Some(last), Some(first)) if last == first => 1,
        _ => 0,
    };

    path.extend(segment.into_iter().skip(skip));
}

/// Builds one contiguous route through `waypoints` by querying the engine for
/// every consecutive pair. Nothing is registered.
#[instrument(level = "debug", skip(engine, waypoints), fields(waypoints = waypoints.len()))]
pub fn stitch<E>(
    engine: &mut E,
    waypoints: &[LocationId],
    vehicle_class: &VehicleClass,
) -> Result<Route, RouteError>
where
    E: SimulationEngine + ?Sized,
{
    if waypoints.len() < 2 {
        return Err(RouteError::TooFewWaypoints(waypoints.len()));
    }

    let mut edges: Vec<EdgeId> = Vec::new();

    for pair in waypoints.windows(2) {
        let (from, to) = (&pair[0], &pair[1]);

        let segment = engine
            .find_path(from, to, vehicle_class)
            .map_err(|source| RouteError::Query {
                from: from.clone(),
                to: to.clone(),
                source,
            })?;

        if segment.is_empty() {
            return Err(RouteError::NoPath(from.clone(), to.clone()));
        }

        debug!("Segment {} -> {}: {} edges", from, to, segment.len());
        append_segment(&mut edges, segment);
    }

    Ok(Route::new(edges))
}

/// Stitches a route and registers it under `route_id`. A failed stitch leaves
/// the engine untouched.
pub fn stitch_and_register<E>(
    engine: &mut E,
    route_id: &RouteId,
    waypoints: &[LocationId],
    vehicle_class: &VehicleClass,
) -> Result<Route, RouteError>
where
    E: SimulationEngine + ?Sized,
{
    let route = stitch(engine, waypoints, vehicle_class)?;

    engine
        .register_route(route_id, route.edges())
        .map_err(|source| RouteError::Registration {
            route_id: route_id.clone(),
            source,
        })?;

    info!("Route {} registered ({} edges)", route_id, route.len());

    Ok(route)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{ScriptedEngine, edges, locations};

    fn bus() -> VehicleClass {
        VehicleClass::new("pt_bus")
    }

    #[test]
    fn test_stitch_drops_shared_junction_edge() {
        let mut engine = ScriptedEngine::default();
        engine.add_path("A", "B", &["A", "x", "B"]);
        engine.add_path("B", "C", &["B", "y", "C"]);

        let route = stitch(&mut engine, &locations(&["A", "B", "C"]), &bus()).unwrap();

        assert_eq!(route.edges(), edges(&["A", "x", "B", "y", "C"]).as_slice());
        // 3 + 3 segment edges, one shared
        assert!(route.len() < 6);
    }

    #[test]
    fn test_stitch_keeps_non_overlapping_segments() {
        let mut engine = ScriptedEngine::default();
        engine.add_path("A", "B", &["A", "x"]);
        engine.add_path("B", "C", &["B", "C"]);

        let route = stitch(&mut engine, &locations(&["A", "B", "C"]), &bus()).unwrap();

        assert_eq!(route.edges(), edges(&["A", "x", "B", "C"]).as_slice());
    }

    #[test]
    fn test_stitch_no_consecutive_duplicates_at_boundaries() {
        let mut engine = ScriptedEngine::default();
        engine.add_path("A", "B", &["A", "B"]);
        engine.add_path("B", "C", &["B", "C"]);
        engine.add_path("C", "D", &["C", "z", "D"]);

        let route = stitch(&mut engine, &locations(&["A", "B", "C", "D"]), &bus()).unwrap();

        assert_eq!(route.len(), 5);
        assert!(route.edges().windows(2).all(|pair| pair[0] != pair[1]));
    }

    #[test]
    fn test_stitch_fails_on_unresolvable_pair_without_registering() {
        let mut engine = ScriptedEngine::default();
        engine.add_path("A", "B", &["A", "B"]);
        // B -> C is unknown, the scripted engine answers with an empty path

        let result = stitch_and_register(
            &mut engine,
            &RouteId::new("route_1"),
            &locations(&["A", "B", "C"]),
            &bus(),
        );

        assert!(matches!(
            result,
            Err(RouteError::NoPath(from, to)) if from.as_str() == "B" && to.as_str() == "C"
        ));
        assert!(engine.registered_routes().is_empty());
    }

    #[test]
    fn test_stitch_requires_two_waypoints() {
        let mut engine = ScriptedEngine::default();

        let result = stitch(&mut engine, &locations(&["A"]), &bus());

        assert!(matches!(result, Err(RouteError::TooFewWaypoints(1))));
    }

    #[test]
    fn test_stitch_and_register_can_be_repeated() {
        let mut engine = ScriptedEngine::default();
        engine.add_path("A", "B", &["A", "B"]);
        let route_id = RouteId::new("route_1");

        for _ in 0..3 {
            stitch_and_register(&mut engine, &route_id, &locations(&["A", "B"]), &bus()).unwrap();
        }

        assert_eq!(engine.registered_routes().len(), 1);
        assert_eq!(
            engine.registered_routes()[&route_id],
            edges(&["A", "B"])
        );
    }

    #[test]
    fn test_stitch_wraps_engine_errors() {
        let mut engine = ScriptedEngine::default();
        engine.fail_path_queries();

        let result = stitch(&mut engine, &locations(&["A", "B"]), &bus());

        assert!(matches!(result, Err(RouteError::Query { .. })));
    }
}
