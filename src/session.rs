//! Resolves which conversation a chat view is bound to.

use percent_encoding::percent_decode_str;
use url::Url;

use crate::error::SessionError;

const DEFAULT_PEER_NAME: &str = "Match";

/// The signed-in user, as handed over by the auth collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalUser {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    /// Match/session id; keys both the socket endpoint and the backlog.
    pub session_key: String,
    pub peer_id: String,
    pub peer_name: String,
    pub local_user_id: String,
    pub local_user_name: String,
}

/// Parses a navigation route such as `/realtime-chat/{matchId}?name=..&userId=..`.
/// The last non-empty path segment is the session key.
pub fn resolve(route: &str, local: &LocalUser) -> Result<SessionIdentity, SessionError> {
    if local.id.trim().is_empty() {
        return Err(SessionError::MissingLocalUser);
    }

    // Routes are relative; anchor them on a dummy origin so `Url` can split
    // path and query for us.
    let base = Url::parse("app://local/").map_err(|err| SessionError::InvalidRoute {
        route: route.to_string(),
        reason: err.to_string(),
    })?;
    let url = base.join(route).map_err(|err| SessionError::InvalidRoute {
        route: route.to_string(),
        reason: err.to_string(),
    })?;

    let session_key = url
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(percent_decode)
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| SessionError::MissingSessionKey(route.to_string()))?;

    let mut peer_name = None;
    let mut peer_id = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "name" if !value.is_empty() => peer_name = Some(value.into_owned()),
            "userId" => peer_id = Some(value.into_owned()),
            _ => {}
        }
    }

    let local_user_name = if local.name.trim().is_empty() {
        "Me".to_string()
    } else {
        local.name.clone()
    };

    Ok(SessionIdentity {
        session_key,
        peer_id: peer_id.unwrap_or_default(),
        peer_name: peer_name.unwrap_or_else(|| DEFAULT_PEER_NAME.to_string()),
        local_user_id: local.id.clone(),
        local_user_name,
    })
}

/// Builds `{ws_base}/ws/chat/{sessionKey}?userId={localUserId}`.
pub fn ws_url(ws_base: &str, identity: &SessionIdentity) -> Result<Url, SessionError> {
    let mut url =
        Url::parse(ws_base).map_err(|_| SessionError::InvalidWsBase(ws_base.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(SessionError::InvalidWsBase(ws_base.to_string()));
    }
    url.path_segments_mut()
        .map_err(|_| SessionError::InvalidWsBase(ws_base.to_string()))?
        .pop_if_empty()
        .extend(["ws", "chat", identity.session_key.as_str()]);
    url.query_pairs_mut()
        .clear()
        .append_pair("userId", &identity.local_user_id);
    Ok(url)
}

fn percent_decode(segment: &str) -> String {
    percent_decode_str(segment).decode_utf8_lossy().into_owned()
}
