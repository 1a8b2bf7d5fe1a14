use crate::{auth::auth::AuthUser, realtime::BusEvent, registry::AppRegistry};
use actix_web::{HttpResponse, http::header, web};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

/// Server-sent event frame named after the bus event.
pub fn event_to_bytes(event: &BusEvent) -> web::Bytes {
    let payload = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    web::Bytes::from(format!("event: {}\ndata: {}\n\n", event.name(), payload))
}

/// Live stream of the bus events addressed to the caller, plus broadcasts.
#[utoipa::path(
    get,
    path = "/api/events",
    responses((status = 200, description = "text/event-stream of permission, session and inventory changes")),
    tag = "Realtime",
    security(("bearer_auth" = []))
)]
pub async fn stream_events(auth: AuthUser, registry: web::Data<AppRegistry>) -> HttpResponse {
    let user_id = auth.user_id;
    let rx = registry.bus().subscribe();

    // lagged receivers skip the missed events
    let stream = BroadcastStream::new(rx).filter_map(move |result| match result {
        Ok(event) if event.is_for(user_id) => {
            Some(Ok::<web::Bytes, actix_web::Error>(event_to_bytes(&event)))
        }
        _ => None,
    });

    HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, "text/event-stream"))
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .streaming(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_uses_event_name() {
        let event = BusEvent::ForceLogout {
            user_id: 4,
            reason: "Account banned".into(),
        };
        let frame = event_to_bytes(&event);
        let text = std::str::from_utf8(&frame).unwrap();
        assert!(text.starts_with("event: forceLogout\ndata: {"));
        assert!(text.contains("\"reason\":\"Account banned\""));
        assert!(text.ends_with("\n\n"));
    }
}
