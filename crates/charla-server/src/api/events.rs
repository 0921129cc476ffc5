//! `GET /api/events`: Server-Sent Events carrying [`ChangeEvent`] snapshots.

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::sse::{Event, KeepAlive, Sse},
};
use serde::Deserialize;
use tokio_stream::{Stream, StreamExt};
use tracing::debug;

use charla_shared::events::{ChangeEvent, Topic};

use super::AppState;
use crate::auth::Caller;
use crate::error::ServerError;
use crate::realtime::Subscription;

/// What an end user may follow.
const USER_TOPICS: [Topic; 3] = [Topic::Messages, Topic::Statuses, Topic::AdminProfile];

#[derive(Deserialize, Default)]
#[serde(default)]
pub(super) struct EventsQuery {
    /// Comma-separated topic names; empty means all allowed topics.
    topic: String,
    chat: Option<String>,
}

fn parse_topics(raw: &str) -> Result<Vec<Topic>, ServerError> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| Topic::parse(t).ok_or_else(|| ServerError::BadRequest(format!("Unknown topic: {t}"))))
        .collect()
}

/// Narrow `sub` to what `caller` is allowed to see.
fn authorize(caller: &Caller, mut sub: Subscription) -> Result<Subscription, ServerError> {
    match caller {
        Caller::Admin => Ok(sub),
        Caller::User(phone) => {
            if sub.topics.is_empty() {
                sub.topics = USER_TOPICS.to_vec();
            }
            if sub.topics.iter().any(|t| !USER_TOPICS.contains(t)) {
                return Err(ServerError::Forbidden("Admin access required".into()));
            }
            if sub.chat_id.as_deref().is_some_and(|c| c != phone.digits()) {
                return Err(ServerError::Forbidden("Not your chat".into()));
            }
            sub.chat_id = Some(phone.digits().to_string());
            Ok(sub)
        }
        Caller::Anonymous => Err(ServerError::Unauthorized),
    }
}

/// Current state of every slice `sub` covers.
fn snapshot(state: &AppState, sub: &Subscription) -> Result<Vec<ChangeEvent>, ServerError> {
    let now = state.now();
    let mut events = Vec::new();
    for topic in Topic::ALL.into_iter().filter(|t| sub.wants(*t)) {
        let event = match topic {
            Topic::Chats => ChangeEvent::Chats(state.with_db(|db| db.fetch_chats())?),
            Topic::Messages => {
                let Some(chat_id) = &sub.chat_id else {
                    continue;
                };
                ChangeEvent::Messages {
                    chat_id: chat_id.clone(),
                    messages: state.with_db(|db| db.fetch_messages(chat_id))?,
                }
            }
            Topic::Statuses => {
                ChangeEvent::Statuses(state.with_db(|db| db.fetch_active_statuses(now))?)
            }
            Topic::Categories => ChangeEvent::Categories(state.with_db(|db| db.fetch_categories())?),
            Topic::AdminProfile => {
                ChangeEvent::AdminProfile(state.with_db(|db| db.fetch_admin_profile())?)
            }
        };
        events.push(event);
    }
    Ok(events)
}

pub(super) async fn subscribe(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<EventsQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ServerError> {
    let caller = state.caller(&headers).await;
    let sub = authorize(
        &caller,
        Subscription {
            topics: parse_topics(&query.topic)?,
            chat_id: query.chat.filter(|c| !c.is_empty()),
        },
    )?;

    // Subscribe before reading the snapshot so no write falls in between.
    let live = state.feed.subscribe(sub.clone());
    let initial = snapshot(&state, &sub)?;
    debug!(?sub, initial = initial.len(), "Event subscriber connected");

    let stream = tokio_stream::iter(initial)
        .chain(live)
        .map(|event| Event::default().event(event.topic().as_str()).json_data(&event));

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use charla_shared::PhoneNumber;

    #[test]
    fn topics_parse_from_query() {
        assert_eq!(
            parse_topics("chats, messages").unwrap(),
            vec![Topic::Chats, Topic::Messages]
        );
        assert!(parse_topics("").unwrap().is_empty());
        assert!(matches!(parse_topics("chats,bogus"), Err(ServerError::BadRequest(_))));
    }

    #[test]
    fn users_are_pinned_to_their_chat() {
        let phone = PhoneNumber::parse("5491123456789").unwrap();
        let user = Caller::User(phone);

        let sub = authorize(&user, Subscription::default()).unwrap();
        assert_eq!(sub.topics, USER_TOPICS.to_vec());
        assert_eq!(sub.chat_id.as_deref(), Some("5491123456789"));

        assert!(matches!(
            authorize(&user, Subscription::topic(Topic::Chats)),
            Err(ServerError::Forbidden(_))
        ));
        assert!(matches!(
            authorize(&user, Subscription::messages_of("5491100000000")),
            Err(ServerError::Forbidden(_))
        ));
        assert!(matches!(
            authorize(&Caller::Anonymous, Subscription::default()),
            Err(ServerError::Unauthorized)
        ));
    }
}
