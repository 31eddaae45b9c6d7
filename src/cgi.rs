// CGI transport - one request per process
//
// Reads the request from the CGI environment:
//   REQUEST_METHOD  (defaults to GET)
//   QUERY_STRING    (userId, challengeDate)
//   CONTENT_LENGTH  (bytes of body to read from stdin)
// and writes a CGI response to stdout: headers, a Status line, a blank line,
// then the JSON body. Logs go to stderr so they never mix with the response.

use anyhow::{Context, Result};
use axum::http::{Method, StatusCode};
use bytes::Bytes;
use std::io::{Read, Write};

use crate::handler::{
    StatsError, StatsHandler, StatsQuery, StatsRequest, StatsResponse, CONTENT_TYPE_JSON,
    CORS_HEADERS, MAX_BODY_BYTES,
};

/// Build a request from CGI variables and the body stream
///
/// `env` looks up a variable; injected so tests don't touch the process env.
pub fn read_request(
    env: impl Fn(&str) -> Option<String>,
    mut stdin: impl Read,
) -> Result<StatsRequest, StatsError> {
    let method = env("REQUEST_METHOD")
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| "GET".to_string());
    let method = Method::from_bytes(method.as_bytes())
        .map_err(|_| StatsError::Validation(format!("Invalid REQUEST_METHOD {:?}", method)))?;

    let query = StatsQuery::parse(env("QUERY_STRING").as_deref());

    // Missing or garbage CONTENT_LENGTH means no body
    let content_length = env("CONTENT_LENGTH")
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(0);
    if content_length > MAX_BODY_BYTES as u64 {
        return Err(StatsError::body_too_large());
    }

    let mut body = Vec::new();
    stdin
        .by_ref()
        .take(content_length)
        .read_to_end(&mut body)
        .map_err(|e| StatsError::Rejected {
            status: StatusCode::BAD_REQUEST,
            message: format!("Failed to read request body: {}", e),
        })?;

    Ok(StatsRequest {
        method,
        query,
        body: Bytes::from(body),
    })
}

/// Write `response` in CGI format
pub fn write_response(response: &StatsResponse, out: &mut impl Write) -> Result<()> {
    writeln!(out, "Content-Type: {}", CONTENT_TYPE_JSON)?;
    for (name, value) in CORS_HEADERS {
        writeln!(out, "{}: {}", name, value)?;
    }
    writeln!(out, "Status: {}", response.status)?;
    writeln!(out)?;

    let body =
        serde_json::to_string_pretty(&response.body).context("Failed to serialize response")?;
    writeln!(out, "{}", body)?;
    out.flush()?;
    Ok(())
}

/// Read one request, handle it and write the response. A request that cannot
/// be read still gets a JSON error response.
pub fn respond(
    handler: &StatsHandler,
    env: impl Fn(&str) -> Option<String>,
    stdin: impl Read,
    out: &mut impl Write,
) -> Result<()> {
    let response = match read_request(env, stdin) {
        Ok(request) => {
            tracing::debug!(method = %request.method, "CGI request");
            handler.handle(request)
        }
        Err(err) => {
            tracing::warn!(error = %err, "Unreadable CGI request");
            err.into()
        }
    };
    write_response(&response, out)
}

/// Report a failure that happened before a handler could be built
pub fn write_failure(err: &anyhow::Error, out: &mut impl Write) -> Result<()> {
    let response = StatsResponse::from(StatsError::Storage(format!("{:#}", err)));
    write_response(&response, out)
}

/// Handle the single request this process was started for
pub fn run(handler: &StatsHandler) -> Result<()> {
    respond(
        handler,
        |name| std::env::var(name).ok(),
        std::io::stdin().lock(),
        &mut std::io::stdout().lock(),
    )
}
