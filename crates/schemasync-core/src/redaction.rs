use serde::{Deserialize, Serialize};

/// Connection URL split into its non-secret parts, plus a masked rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactedConnection {
    pub scheme: Option<String>,
    pub user: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub redacted: String,
}

/// Mask the password and secret query parameters of a connection URL.
///
/// Accepts `mysql://`, `mariadb://` and `postgres://` style URLs. Input
/// without a scheme is returned unchanged apart from query masking.
pub fn redact_connection_string(conn: &str) -> RedactedConnection {
    let Some((scheme, rest)) = conn.split_once("://") else {
        return RedactedConnection {
            scheme: None,
            user: None,
            host: None,
            port: None,
            database: None,
            redacted: mask_query(conn),
        };
    };

    // Passwords may contain `/`, `?` or `@`, so the credentials end at the
    // last `@` and the host part is only searched after it.
    let (auth, after_auth) = match rest.rfind('@') {
        Some(at) => (Some(&rest[..at]), &rest[at + 1..]),
        None => (None, rest),
    };
    let authority_end = after_auth.find(['/', '?']).unwrap_or(after_auth.len());
    let (host_port, tail) = after_auth.split_at(authority_end);
    let (path_part, query) = match tail.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (tail, None),
    };
    let has_path = path_part.starts_with('/');
    let path = path_part.strip_prefix('/').unwrap_or(path_part);

    let (user, masked_auth) = match auth {
        Some(auth) => match auth.split_once(':') {
            Some((user, _)) => (Some(user.to_string()), format!("{user}:***@")),
            None => (Some(auth.to_string()), format!("{auth}@")),
        },
        None => (None, String::new()),
    };

    let (host, port) = match host_port.rsplit_once(':') {
        Some((host, port)) => (host.to_string(), port.parse::<u16>().ok()),
        None => (host_port.to_string(), None),
    };

    let mut redacted = format!("{scheme}://{masked_auth}{host_port}");
    if has_path {
        redacted.push('/');
        redacted.push_str(path);
    }
    if let Some(query) = query {
        redacted.push('?');
        redacted.push_str(&mask_query_pairs(query));
    }

    RedactedConnection {
        scheme: Some(scheme.to_string()),
        user,
        host: (!host.is_empty()).then_some(host),
        port,
        database: (!path.is_empty()).then(|| path.to_string()),
        redacted,
    }
}

/// Mask every connection URL embedded in free text, such as the stderr of an
/// external tool.
pub fn redact_urls(text: &str) -> String {
    text.split_inclusive(char::is_whitespace)
        .map(|chunk| {
            let token = chunk.trim_end();
            let Some(scheme_sep) = token.find("://") else {
                return chunk.to_string();
            };
            let start = token[..scheme_sep]
                .rfind(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')))
                .map_or(0, |index| index + 1);
            let (prefix, url) = token.split_at(start);
            let trailing = &chunk[token.len()..];
            format!("{prefix}{}{trailing}", redact_connection_string(url).redacted)
        })
        .collect()
}

fn mask_query(conn: &str) -> String {
    match conn.split_once('?') {
        Some((base, query)) => format!("{base}?{}", mask_query_pairs(query)),
        None => conn.to_string(),
    }
}

fn mask_query_pairs(query: &str) -> String {
    query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((key, _)) if is_sensitive_key(key) => format!("{key}=***"),
            Some((key, value)) if !value.is_empty() => format!("{key}={value}"),
            Some((key, _)) => key.to_string(),
            None => pair.to_string(),
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn is_sensitive_key(key: &str) -> bool {
    matches!(
        key.to_lowercase().as_str(),
        "password" | "pass" | "pwd" | "sslpassword" | "token"
    )
}
