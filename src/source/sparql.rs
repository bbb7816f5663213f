/*!
 * SPARQL record source.
 *
 * Posts a SELECT query to a SPARQL 1.1 endpoint and reads the
 * `application/sparql-results+json` response. Each solution becomes one
 * record; solution order is the endpoint's order, so queries should carry
 * an ORDER BY when reproducible runs matter.
 */

use async_trait::async_trait;
use log::{debug, info};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;

use super::{RecordIter, RecordSource};
use crate::errors::SourceError;
use crate::record::SourceRecord;

/// Content type requested from the endpoint
pub const SPARQL_RESULTS_JSON: &str = "application/sparql-results+json";

/// SPARQL JSON results document
#[derive(Debug, Deserialize)]
pub struct SparqlResults {
    /// Result header
    pub head: SparqlHead,
    /// Solutions
    pub results: SparqlSolutions,
}

/// Header listing the projected variables
#[derive(Debug, Deserialize)]
pub struct SparqlHead {
    /// Variable names without the leading `?`
    #[serde(default)]
    pub vars: Vec<String>,
}

/// Solution sequence
#[derive(Debug, Deserialize)]
pub struct SparqlSolutions {
    /// One map of variable bindings per solution
    pub bindings: Vec<HashMap<String, SparqlTerm>>,
}

/// A bound RDF term
#[derive(Debug, Deserialize)]
pub struct SparqlTerm {
    /// `uri`, `literal`, `typed-literal` or `bnode`
    #[serde(rename = "type")]
    pub term_type: String,
    /// Lexical value
    pub value: String,
    /// Language tag of a literal
    #[serde(rename = "xml:lang", default)]
    pub language: Option<String>,
}

/// Title records from a SPARQL endpoint
#[derive(Debug, Clone)]
pub struct SparqlRecordSource {
    client: Client,
    endpoint: String,
    query: String,
    identifier_variable: String,
    title_variable: String,
    strip_namespace: bool,
}

impl SparqlRecordSource {
    /// Create a source binding `?id` and `?title`
    pub fn new(endpoint: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            query: query.into(),
            identifier_variable: "id".to_string(),
            title_variable: "title".to_string(),
            strip_namespace: true,
        }
    }

    /// Bind different variables
    pub fn with_variables(mut self, identifier_variable: impl Into<String>, title_variable: impl Into<String>) -> Self {
        self.identifier_variable = identifier_variable.into().trim_start_matches('?').to_string();
        self.title_variable = title_variable.into().trim_start_matches('?').to_string();
        self
    }

    /// Whether identifier URIs are shortened to their local name
    pub fn with_strip_namespace(mut self, strip_namespace: bool) -> Self {
        self.strip_namespace = strip_namespace;
        self
    }

    /// Turn a results document into records
    pub fn parse_results(&self, body: &str) -> Result<Vec<SourceRecord>, SourceError> {
        let results: SparqlResults =
            serde_json::from_str(body).map_err(|e| SourceError::Parse(e.to_string()))?;

        for variable in [&self.identifier_variable, &self.title_variable] {
            if !results.head.vars.iter().any(|v| v == variable) {
                return Err(SourceError::MissingField(variable.clone()));
            }
        }

        results
            .results
            .bindings
            .iter()
            .enumerate()
            .map(|(index, solution)| -> Result<SourceRecord, SourceError> {
                let identifier = solution.get(&self.identifier_variable).ok_or_else(|| {
                    SourceError::Parse(format!(
                        "solution {} has no binding for ?{}",
                        index, self.identifier_variable
                    ))
                })?;

                let identifier = if self.strip_namespace && identifier.term_type == "uri" {
                    local_name(&identifier.value).to_string()
                } else {
                    identifier.value.clone()
                };

                // An unbound title (OPTIONAL) is an empty title
                let title = solution
                    .get(&self.title_variable)
                    .map(|term| term.value.clone())
                    .unwrap_or_default();

                Ok(SourceRecord::new(identifier, title))
            })
            .collect()
    }
}

/// Local part of a URI, after the last `#` or `/`
pub fn local_name(uri: &str) -> &str {
    let trimmed = uri.trim_end_matches(['/', '#']);
    match trimmed.rfind(['/', '#']) {
        Some(index) if index + 1 < trimmed.len() => &trimmed[index + 1..],
        _ => trimmed,
    }
}

#[async_trait]
impl RecordSource for SparqlRecordSource {
    async fn fetch(&self) -> Result<RecordIter, SourceError> {
        info!("Querying SPARQL endpoint {}", self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, SPARQL_RESULTS_JSON)
            .form(&[("query", self.query.as_str())])
            .send()
            .await
            .map_err(|e| SourceError::Endpoint(format!("{}: {}", self.endpoint, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SourceError::Endpoint(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(SourceError::Endpoint(format!("HTTP {}: {}", status.as_u16(), body)));
        }

        let records = self.parse_results(&body)?;
        debug!("SPARQL endpoint returned {} solutions", records.len());

        Ok(Box::new(records.into_iter().map(Ok)))
    }

    fn describe(&self) -> String {
        format!("SPARQL endpoint {}", self.endpoint)
    }
}
