//! Minimal SOAP envelope helpers for the login and Metadata API calls

use roxmltree::{Document, Node};

use super::constants::{METADATA_NS, SOAP_ENV_NS};
use crate::error::{CopierError, CopierResult};

/// Escape text for inclusion in element content or attribute values
pub fn escape_xml(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Wrap a Metadata API call body in an envelope carrying the session header
pub fn metadata_envelope(session_id: &str, body: &str) -> String {
    format!(
        concat!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>",
            "<soapenv:Envelope xmlns:soapenv=\"{env}\" xmlns:met=\"{met}\">",
            "<soapenv:Header><met:SessionHeader><met:sessionId>{session}</met:sessionId></met:SessionHeader></soapenv:Header>",
            "<soapenv:Body>{body}</soapenv:Body>",
            "</soapenv:Envelope>"
        ),
        env = SOAP_ENV_NS,
        met = METADATA_NS,
        session = escape_xml(session_id),
        body = body,
    )
}

/// Parse a SOAP response, turning a `<soapenv:Fault>` into an upstream error
pub fn parse_response<'a>(xml: &'a str, call: &str) -> CopierResult<Document<'a>> {
    let doc = Document::parse(xml).map_err(|e| CopierError::xml(format!("{} response", call), e))?;

    if let Some(fault) = doc.descendants().find(|n| n.tag_name().name() == "Fault") {
        let code = child_text(fault, "faultcode").unwrap_or("unknown");
        let message = child_text(fault, "faultstring").unwrap_or("no fault message");
        return Err(CopierError::upstream(format!(
            "{} failed: {} ({})",
            call, message, code
        )));
    }
    Ok(doc)
}

/// The `<result>` element of a SOAP response
pub fn result_node<'a, 'input>(
    doc: &'a Document<'input>,
    call: &str,
) -> CopierResult<Node<'a, 'input>> {
    doc.descendants()
        .find(|n| n.tag_name().name() == "result")
        .ok_or_else(|| CopierError::xml(format!("{} response", call), "missing <result>"))
}

/// Trimmed text of the first direct child element named `name`
pub fn child_text<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
        .and_then(|n| n.text())
        .map(str::trim)
}

pub fn child_bool(node: Node<'_, '_>, name: &str) -> bool {
    child_text(node, name) == Some("true")
}

pub fn child_u32(node: Node<'_, '_>, name: &str) -> u32 {
    child_text(node, name)
        .and_then(|t| t.parse().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("a<b & 'c' \"d\">"), "a&lt;b &amp; &apos;c&apos; &quot;d&quot;&gt;");
        assert_eq!(escape_xml("plain"), "plain");
    }

    #[test]
    fn test_envelope_escapes_session() {
        let envelope = metadata_envelope("00D!a&b", "<met:deploy/>");
        assert!(envelope.contains("<met:sessionId>00D!a&amp;b</met:sessionId>"));
        assert!(envelope.contains("<soapenv:Body><met:deploy/></soapenv:Body>"));
    }

    #[test]
    fn test_fault_is_upstream_error() {
        let xml = r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/">
            <soapenv:Body><soapenv:Fault>
                <faultcode>sf:INVALID_SESSION_ID</faultcode>
                <faultstring>Invalid Session ID found in SessionHeader</faultstring>
            </soapenv:Fault></soapenv:Body></soapenv:Envelope>"#;
        let err = parse_response(xml, "deploy").unwrap_err();
        match err {
            CopierError::UpstreamUnavailable { message, .. } => {
                assert!(message.contains("INVALID_SESSION_ID"));
                assert!(message.contains("Invalid Session ID"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_result_helpers() {
        let xml = r#"<Envelope><Body><deployResponse><result>
            <id>0Af1</id><done>true</done><numberComponentsTotal>3</numberComponentsTotal>
        </result></deployResponse></Body></Envelope>"#;
        let doc = parse_response(xml, "deploy").unwrap();
        let result = result_node(&doc, "deploy").unwrap();
        assert_eq!(child_text(result, "id"), Some("0Af1"));
        assert!(child_bool(result, "done"));
        assert_eq!(child_u32(result, "numberComponentsTotal"), 3);
        assert_eq!(child_u32(result, "missing"), 0);
    }
}
