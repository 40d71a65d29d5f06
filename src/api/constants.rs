//! API Constants and Configuration for the Salesforce endpoints this tool uses

/// Default Salesforce API version
pub const DEFAULT_API_VERSION: &str = "58.0";

/// Production login host
pub const LOGIN_HOST: &str = "https://login.salesforce.com";

/// Sandbox login host
pub const SANDBOX_LOGIN_HOST: &str = "https://test.salesforce.com";

/// Metadata API XML namespace, also used by `package.xml` and component bodies
pub const METADATA_NS: &str = "http://soap.sforce.com/2006/04/metadata";

/// Partner API namespace for the SOAP login call
pub const PARTNER_NS: &str = "urn:partner.soap.sforce.com";

/// SOAP 1.1 envelope namespace
pub const SOAP_ENV_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// Maximum ids per `WHERE Id IN (...)` clause
pub const SOQL_ID_CHUNK: usize = 200;

/// Standard headers for Salesforce requests
pub mod headers {
    /// Content type for SOAP requests
    pub const CONTENT_TYPE_SOAP: &str = "text/xml; charset=UTF-8";

    /// Content type for REST JSON requests
    pub const CONTENT_TYPE_JSON: &str = "application/json";

    /// SOAPAction header name
    pub const SOAP_ACTION: &str = "SOAPAction";
}

/// Login endpoint for a host, e.g. `https://login.salesforce.com/services/Soap/u/58.0`
pub fn login_endpoint(host: &str, api_version: &str) -> String {
    format!("{}/services/Soap/u/{}", host.trim_end_matches('/'), api_version)
}

/// REST query endpoint
pub fn query_endpoint(instance_url: &str, api_version: &str) -> String {
    format!(
        "{}/services/data/v{}/query",
        instance_url.trim_end_matches('/'),
        api_version
    )
}

/// REST sObject collection endpoint
pub fn sobject_endpoint(instance_url: &str, api_version: &str, sobject: &str) -> String {
    format!(
        "{}/services/data/v{}/sobjects/{}",
        instance_url.trim_end_matches('/'),
        api_version,
        sobject
    )
}

/// Metadata SOAP endpoint, derived from the instance URL
pub fn metadata_endpoint(instance_url: &str, api_version: &str) -> String {
    format!(
        "{}/services/Soap/m/{}",
        instance_url.trim_end_matches('/'),
        api_version
    )
}
