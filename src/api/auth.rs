use log::{debug, info};

use super::constants::{PARTNER_NS, SOAP_ENV_NS, headers, login_endpoint};
use super::soap::{child_text, escape_xml, parse_response, result_node};
use crate::auth::Credentials;
use crate::error::{CopierError, CopierResult};

/// An authenticated Salesforce session
#[derive(Clone)]
pub struct Session {
    pub session_id: String,
    /// Scheme and host of the org, e.g. `https://acme.my.salesforce.com`
    pub instance_url: String,
    pub user_id: Option<String>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("session_id", &"***")
            .field("instance_url", &self.instance_url)
            .field("user_id", &self.user_id)
            .finish()
    }
}

/// Username/password login through the partner SOAP API
pub async fn login(
    http: &reqwest::Client,
    credentials: &Credentials,
    api_version: &str,
) -> CopierResult<Session> {
    let url = login_endpoint(&credentials.login_host(), api_version);
    info!("Logging in to {} as {}", url, credentials.username);

    let envelope = login_envelope(&credentials.username, &credentials.login_password());
    let response = http
        .post(&url)
        .header(reqwest::header::CONTENT_TYPE, headers::CONTENT_TYPE_SOAP)
        .header(headers::SOAP_ACTION, "login")
        .body(envelope)
        .send()
        .await?;

    let status = response.status();
    debug!("Login response status: {}", status);
    let body = response.text().await?;

    // Faults arrive with HTTP 500, so parse before looking at the status
    let session = match parse_login_response(&body) {
        Ok(session) => session,
        Err(e) if status.is_success() => return Err(e),
        Err(CopierError::UpstreamUnavailable { message, .. }) => {
            return Err(CopierError::upstream(message));
        }
        Err(_) => {
            return Err(CopierError::upstream(format!(
                "login failed with HTTP {}",
                status
            )));
        }
    };

    info!("Authenticated against {}", session.instance_url);
    Ok(session)
}

fn login_envelope(username: &str, password: &str) -> String {
    format!(
        concat!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>",
            "<soapenv:Envelope xmlns:soapenv=\"{env}\" xmlns:urn=\"{partner}\">",
            "<soapenv:Body><urn:login>",
            "<urn:username>{username}</urn:username>",
            "<urn:password>{password}</urn:password>",
            "</urn:login></soapenv:Body></soapenv:Envelope>"
        ),
        env = SOAP_ENV_NS,
        partner = PARTNER_NS,
        username = escape_xml(username),
        password = escape_xml(password),
    )
}

pub(crate) fn parse_login_response(xml: &str) -> CopierResult<Session> {
    let doc = parse_response(xml, "login")?;
    let result = result_node(&doc, "login")?;

    let session_id = child_text(result, "sessionId")
        .filter(|s| !s.is_empty())
        .ok_or_else(|| CopierError::upstream("login response has no sessionId"))?;
    let server_url = child_text(result, "serverUrl")
        .ok_or_else(|| CopierError::upstream("login response has no serverUrl"))?;

    let parsed = reqwest::Url::parse(server_url)
        .map_err(|e| CopierError::upstream(format!("invalid serverUrl '{}': {}", server_url, e)))?;

    Ok(Session {
        session_id: session_id.to_string(),
        instance_url: parsed.origin().ascii_serialization(),
        user_id: child_text(result, "userId").map(str::to_string),
    })
}
