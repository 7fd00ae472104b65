//! Entity graph browser routes

use crate::graph::{Degree, EntityGraph, GraphStats, Subgraph, MAX_NEIGHBORHOOD_DEPTH};
use crate::knowledge_store::{Entity, EntityEdge, EntityFilter, EntityGraphStore};

use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use super::extract::{ApiPath, ApiQuery};
use super::session::AccessSession;
use super::state::ServerState;

#[derive(Deserialize, Debug)]
struct EntitiesQuery {
    entity_type: Option<String>,
    domain: Option<String>,
}

#[derive(Deserialize, Debug)]
struct NeighborhoodQuery {
    depth: Option<u32>,
}

#[derive(Serialize, Debug)]
struct EntityWithDegree {
    #[serde(flatten)]
    entity: Entity,
    degree: Degree,
}

#[derive(Serialize, Debug)]
struct EntityDetail {
    code: String,
    /// Absent when the code is only known from edges.
    entity: Option<Entity>,
    degree: Degree,
    outgoing: Vec<EntityEdge>,
    incoming: Vec<EntityEdge>,
}

fn load_graph(state: &ServerState) -> Result<EntityGraph, ApiError> {
    let entities = state.store.list_entities(&EntityFilter::default())?;
    let edges = state.store.list_edges()?;
    Ok(EntityGraph::from_edges(entities, edges))
}

async fn get_entities(
    _session: AccessSession,
    State(state): State<ServerState>,
    ApiQuery(query): ApiQuery<EntitiesQuery>,
) -> Result<Json<Vec<EntityWithDegree>>, ApiError> {
    let filter = EntityFilter {
        entity_type: query.entity_type.filter(|t| !t.trim().is_empty()),
        domain: query.domain.filter(|d| !d.trim().is_empty()),
    };
    let entities = state.store.list_entities(&filter)?;
    let graph = EntityGraph::from_edges(Vec::new(), state.store.list_edges()?);
    let views = entities
        .into_iter()
        .map(|entity| EntityWithDegree {
            degree: graph.degree(&entity.code),
            entity,
        })
        .collect();
    Ok(Json(views))
}

async fn get_entity(
    _session: AccessSession,
    State(state): State<ServerState>,
    ApiPath(code): ApiPath<String>,
) -> Result<Json<EntityDetail>, ApiError> {
    let entity = state.store.get_entity(&code)?;
    let edges = state.store.edges_for(&code)?;
    if entity.is_none() && edges.is_empty() {
        return Err(ApiError::NotFound(format!("entity {} not found", code)));
    }
    let graph = EntityGraph::from_edges(Vec::new(), edges);
    let outgoing = graph.outgoing_edges(&code).into_iter().cloned().collect();
    let incoming = graph.incoming_edges(&code).into_iter().cloned().collect();
    Ok(Json(EntityDetail {
        degree: graph.degree(&code),
        code,
        entity,
        outgoing,
        incoming,
    }))
}

async fn get_neighborhood(
    _session: AccessSession,
    State(state): State<ServerState>,
    ApiPath(code): ApiPath<String>,
    ApiQuery(query): ApiQuery<NeighborhoodQuery>,
) -> Result<Json<Subgraph>, ApiError> {
    let depth = query.depth.unwrap_or(1);
    if depth == 0 || depth > MAX_NEIGHBORHOOD_DEPTH {
        return Err(ApiError::BadRequest(format!(
            "depth must be between 1 and {}",
            MAX_NEIGHBORHOOD_DEPTH
        )));
    }
    load_graph(&state)?
        .neighborhood(&code, depth)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("entity {} not found", code)))
}

async fn get_stats(
    _session: AccessSession,
    State(state): State<ServerState>,
) -> Result<Json<GraphStats>, ApiError> {
    Ok(Json(load_graph(&state)?.stats()))
}

pub fn make_graph_routes(state: ServerState) -> Router {
    Router::new()
        .route("/entities", get(get_entities))
        .route("/entities/{code}", get(get_entity))
        .route("/entities/{code}/neighborhood", get(get_neighborhood))
        .route("/stats", get(get_stats))
        .with_state(state)
}
