//! Value Objects - Immutable domain primitives
//!
//! Value objects are identified by their value rather than identity.
//! They are immutable and can be freely shared.

use crate::domain::error::EndpointError;
use serde::{Deserialize, Serialize};

/// Traffic class used to pick a round-robin cursor.
///
/// Authenticated calls (a parent session identifier is present) and anonymous
/// calls (service description, info-only lookups) rotate independently so that
/// with two endpoints every logged-in user does not land on the endpoint the
/// preceding anonymous call just picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrafficClass {
    Authenticated,
    Anonymous,
}

impl TrafficClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authenticated => "authenticated",
            Self::Anonymous => "anonymous",
        }
    }
}

/// Protocol version advertised by a producer's service description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolVersion {
    V1,
    V2,
}

impl ProtocolVersion {
    const V1_NAMESPACE: &'static str = "urn:oasis:names:tc:wsrp:v1";
    const V2_NAMESPACE: &'static str = "urn:oasis:names:tc:wsrp:v2";

    /// Detect the version from a service description document.
    ///
    /// V2 wins when both namespaces are present, since V2 producers commonly
    /// re-export the V1 bindings for older consumers.
    pub fn detect(description: &str) -> Option<Self> {
        if description.contains(Self::V2_NAMESPACE) {
            Some(Self::V2)
        } else if description.contains(Self::V1_NAMESPACE) {
            Some(Self::V1)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V1 => "1.0",
            Self::V2 => "2.0",
        }
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ordered, de-duplicated list of endpoint URLs parsed from a configuration string.
///
/// URLs are separated by one or more whitespace characters. Duplicates are
/// collapsed and the first occurrence keeps its position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointUrls(Vec<String>);

impl EndpointUrls {
    /// Parse an endpoint string.
    ///
    /// # Errors
    /// `EndpointError::Configuration` if the string holds no URL or if any
    /// entry is not an absolute URL with a host.
    ///
    /// # Examples
    /// ```
    /// use producer_endpoints::EndpointUrls;
    ///
    /// let urls = EndpointUrls::parse("http://a/wsdl http://b/wsdl http://a/wsdl").unwrap();
    /// assert_eq!(urls.as_slice(), ["http://a/wsdl", "http://b/wsdl"]);
    /// ```
    pub fn parse(raw: &str) -> Result<Self, EndpointError> {
        let mut urls: Vec<String> = Vec::new();

        for candidate in raw.split_whitespace() {
            Self::validate(candidate)?;
            if !urls.iter().any(|u| u == candidate) {
                urls.push(candidate.to_string());
            }
        }

        if urls.is_empty() {
            return Err(EndpointError::Configuration(
                "endpoint string contains no URL".to_string(),
            ));
        }

        Ok(Self(urls))
    }

    fn validate(candidate: &str) -> Result<(), EndpointError> {
        let url = reqwest::Url::parse(candidate).map_err(|e| {
            EndpointError::Configuration(format!("malformed endpoint URL {}: {}", candidate, e))
        })?;
        if !url.has_host() {
            return Err(EndpointError::Configuration(format!(
                "endpoint URL {} has no host",
                candidate
            )));
        }
        Ok(())
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> &str {
        // parse() never builds an empty list
        &self.0[0]
    }

    pub fn contains(&self, url: &str) -> bool {
        self.0.iter().any(|u| u == url)
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }
}
