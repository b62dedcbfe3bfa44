//! Minimal HTTP operator surface: one route per command plus a static
//! index page. Grounded on `control/webServer.py`'s flat GET-only route
//! table; rebuilt here on `axum` per the corpus's usual choice for a small
//! JSON/GET facade.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::Router;
use tracing::info;

use crate::doors::DoorId;
use crate::error::HouseError;
use crate::scene::rooms::RoomId;
use crate::state::DoorState;
use crate::supervisor::Supervisor;

use super::operator::OperatorCommands;

const INDEX_HTML: &str = include_str!("index.html");

pub fn router(supervisor: Arc<Supervisor>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/START", get(start))
        .route("/EMERGENCY_SHUTOFF", get(emergency_shutoff))
        .route("/SOFT_SHUTDOWN", get(soft_shutdown))
        .route("/ToggleHouseLights", get(toggle_house_lights))
        .route("/:cmd", get(dispatch))
        .with_state(supervisor)
}

pub async fn serve(addr: SocketAddr, supervisor: Arc<Supervisor>) -> anyhow::Result<()> {
    info!("HTTP operator surface listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(supervisor)).await?;
    Ok(())
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn start(State(sup): State<Arc<Supervisor>>) -> Result<&'static str, HouseError> {
    sup.start()?;
    Ok("OK")
}

async fn emergency_shutoff(State(sup): State<Arc<Supervisor>>) -> &'static str {
    sup.emergency_shutoff();
    "OK"
}

async fn soft_shutdown(State(sup): State<Arc<Supervisor>>) -> &'static str {
    sup.soft_shutdown();
    "OK"
}

async fn toggle_house_lights(State(sup): State<Arc<Supervisor>>) -> &'static str {
    sup.toggle_house_lights();
    "OK"
}

/// Handles the two families of path-encoded commands the original flat
/// route table used: `Door{1,2}{Open,Close}` and `Demo<Room>`.
async fn dispatch(State(sup): State<Arc<Supervisor>>, Path(cmd): Path<String>) -> impl IntoResponse {
    if let Some(rest) = cmd.strip_prefix("Door") {
        return match parse_door_command(rest) {
            Some((door, target)) => {
                sup.set_door_target(door, target);
                Ok("OK")
            }
            None => Err(HouseError::UnknownDoor(cmd.clone())),
        };
    }

    if let Some(room_name) = cmd.strip_prefix("Demo") {
        return match RoomId::parse(room_name) {
            Some(room) => sup.demo(room).map(|_| "OK"),
            None => Err(HouseError::UnknownRoom(room_name.to_string())),
        };
    }

    Err(HouseError::UnknownRoom(cmd))
}

fn parse_door_command(rest: &str) -> Option<(DoorId, DoorState)> {
    let (door, action) = if let Some(action) = rest.strip_prefix('1') {
        (DoorId::Door1, action)
    } else if let Some(action) = rest.strip_prefix('2') {
        (DoorId::Door2, action)
    } else {
        return None;
    };

    let target = match action {
        "Open" => DoorState::Open,
        "Close" => DoorState::Closed,
        _ => return None,
    };
    Some((door, target))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_door_open_and_close() {
        assert_eq!(parse_door_command("1Open"), Some((DoorId::Door1, DoorState::Open)));
        assert_eq!(parse_door_command("2Close"), Some((DoorId::Door2, DoorState::Closed)));
    }

    #[test]
    fn rejects_unknown_door_suffix() {
        assert_eq!(parse_door_command("3Open"), None);
        assert_eq!(parse_door_command("1Explode"), None);
    }
}
